//! Flat CSV store holding the full submission history.
//!
//! Every read loads the whole file; every write rewrites it. Writers are
//! serialized through one mutex per store handle and land via temp-file +
//! rename, so readers never observe a half-written file.

pub mod row;

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use pulse_client::domain::PulseRecord;
use tokio::sync::Mutex;

pub use row::{PulseRow, COLUMNS};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error("timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),
    #[error("store task failed: {0}")]
    Task(String),
}

/// Parses a full CSV document (header + rows) into records.
pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<PulseRecord>, StoreError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();

    for (idx, result) in rdr.deserialize::<PulseRow>().enumerate() {
        let row = result?;
        // Row numbers are 1-based and count the header line.
        let record = PulseRecord::try_from(row).map_err(|reason| StoreError::InvalidRow { row: idx + 2, reason })?;
        out.push(record);
    }

    Ok(out)
}

/// Writes the header and one row per record.
pub fn write_records<W: io::Write>(writer: W, records: &[PulseRecord]) -> Result<(), StoreError> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for r in records {
        wtr.serialize(PulseRow::from_record(r)?)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

fn load_file(path: &Path) -> Result<Vec<PulseRecord>, StoreError> {
    match std::fs::File::open(path) {
        Ok(file) => read_records(io::BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn save_file(path: &Path, records: &[PulseRecord]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let file = std::fs::File::create(&tmp).map_err(io_err)?;
    write_records(io::BufWriter::new(file), records)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

struct Inner {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// Cheap-to-clone handle on the CSV file.
#[derive(Clone)]
pub struct PulseStore {
    inner: Arc<Inner>,
}

impl PulseStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The full history. A store whose file does not exist yet is empty.
    pub async fn load(&self) -> Result<Vec<PulseRecord>, StoreError> {
        let path = self.inner.path.clone();
        tokio::task::spawn_blocking(move || load_file(&path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Replaces the whole file with `records`.
    pub async fn save(&self, records: Vec<PulseRecord>) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        self.save_unlocked(records).await
    }

    /// Loads, extends and rewrites the file. Returns the new row count.
    pub async fn append(&self, new_records: Vec<PulseRecord>) -> Result<usize, StoreError> {
        let _guard = self.inner.write_lock.lock().await;

        let mut records = self.load().await?;
        records.extend(new_records);
        let total = records.len();
        self.save_unlocked(records).await?;

        Ok(total)
    }

    async fn save_unlocked(&self, records: Vec<PulseRecord>) -> Result<(), StoreError> {
        let path = self.inner.path.clone();
        tokio::task::spawn_blocking(move || save_file(&path, &records))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{record, temp_path};
    use super::*;
    use pulse_client::domain::Temple;

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let store = PulseStore::new(temp_path("missing.csv"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_grows_row_count_by_one_per_record() {
        let path = temp_path("append.csv");
        let store = PulseStore::new(&path);

        assert_eq!(store.append(vec![record(Temple::Somnath, "Gate", 10, 5.0, 3)]).await.unwrap(), 1);
        assert_eq!(store.append(vec![record(Temple::Dwarka, "Hall", 20, 7.5, 4)]).await.unwrap(), 2);

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].temple, Temple::Somnath);
        assert_eq!(loaded[1].queue_time, 7.5);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let path = temp_path("concurrent.csv");
        let store = PulseStore::new(&path);

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                s.append(vec![record(Temple::Ambaji, "Gate", u64::from(i), 1.0, i)]).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().len(), 8);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn reads_file_written_by_the_legacy_dashboard() {
        let csv = "\
timestamp,temple,zone,visitor_count,queue_time,top_services,payment_modes,crowd_index,peak_hour_flag
2024-05-01 08:00:00.000001,Somnath,Entry Gate,120,15,Darshan,\"Cash,UPI\",4,False
2024-05-01 09:30:00,Pavagadh,,80,7.5,,,2,True
";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payment_modes.len(), 2);
        assert_eq!(records[1].zone, None);
        assert!(records[1].payment_modes.is_empty());
        assert_eq!(records[1].peak_hour_flag, Some(true));
    }

    #[test]
    fn bad_row_reports_its_line() {
        let csv = "\
timestamp,temple,zone,visitor_count,queue_time,top_services,payment_modes,crowd_index,peak_hour_flag
2024-05-01 08:00:00,Somnath,Gate,120,15,Darshan,Cash,4,False
2024-05-01 09:00:00,Nowhere,Gate,120,15,Darshan,Cash,4,False
";
        match read_records(csv.as_bytes()) {
            Err(StoreError::InvalidRow { row, .. }) => assert_eq!(row, 3),
            other => panic!("expected InvalidRow, got {other:?}"),
        }
    }

    #[test]
    fn written_document_starts_with_header() {
        let mut buf = Vec::new();
        write_records(&mut buf, &[record(Temple::Dwarka, "Hall", 5, 2.0, 1)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with(
            "timestamp,temple,zone,visitor_count,queue_time,top_services,payment_modes,crowd_index,peak_hour_flag\n"
        ));
        assert_eq!(text.lines().count(), 2);
    }
}
