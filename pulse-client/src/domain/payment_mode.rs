use std::{fmt, str::FromStr};

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PaymentMode {
    Cash,
    Card,
    #[cfg_attr(feature = "serde", serde(rename = "UPI"))]
    Upi,
    Wallet,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 4] = [PaymentMode::Cash, PaymentMode::Card, PaymentMode::Upi, PaymentMode::Wallet];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Card => "Card",
            PaymentMode::Upi => "UPI",
            PaymentMode::Wallet => "Wallet",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        PaymentMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DomainError::UnknownPaymentMode(trimmed.to_string()))
    }
}

/// Joins tags the way they are stored on disk: `Cash,UPI`.
pub fn join_payment_modes(modes: &[PaymentMode]) -> String {
    modes.iter().map(PaymentMode::as_str).collect::<Vec<_>>().join(",")
}

/// Parses a comma-joined tag list. Empty segments are skipped and repeats
/// collapse onto their first occurrence.
pub fn parse_payment_modes(s: &str) -> Result<Vec<PaymentMode>, DomainError> {
    collect_payment_modes(s.split(',').map(str::trim).filter(|p| !p.is_empty()))
}

/// Parses individual tags, keeping the first occurrence of each mode.
pub fn collect_payment_modes<I, T>(tags: I) -> Result<Vec<PaymentMode>, DomainError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut out = Vec::new();
    for tag in tags {
        let mode: PaymentMode = tag.as_ref().parse()?;
        if !out.contains(&mode) {
            out.push(mode);
        }
    }
    Ok(out)
}
