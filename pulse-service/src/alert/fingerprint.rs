//! Stable content hash of a pulse record, used to recognise a row that has
//! already been alerted on.

use pulse_client::domain::{join_payment_modes, PulseRecord};

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_opt_str(hasher: &mut blake3::Hasher, s: Option<&str>) {
    match s {
        Some(v) => {
            hasher.update(&[1]);
            hash_str(hasher, v);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

/// Hex blake3 over every field. Records are immutable, so equal
/// fingerprints mean the same submission (or an exact duplicate of it).
pub fn record_fingerprint(r: &PulseRecord) -> String {
    let mut h = blake3::Hasher::new();
    h.update(&r.timestamp.unix_timestamp_nanos().to_le_bytes());
    hash_str(&mut h, r.temple.as_str());
    hash_opt_str(&mut h, r.zone.as_deref());
    h.update(&r.visitor_count.to_le_bytes());
    h.update(&r.queue_time.to_bits().to_le_bytes());
    hash_str(&mut h, &r.top_services);
    hash_str(&mut h, &join_payment_modes(&r.payment_modes));
    h.update(&[r.crowd_index]);
    h.update(&[match r.peak_hour_flag {
        None => 0,
        Some(false) => 1,
        Some(true) => 2,
    }]);
    h.finalize().to_hex().to_string()
}
