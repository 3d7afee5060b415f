//! Full-store downloads: CSV in store column order, or a single-sheet
//! workbook with numeric columns written as numbers.

use pulse_client::domain::{join_payment_modes, PulseRecord};
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::Deserialize;

use crate::store::{self, row::format_timestamp, StoreError, COLUMNS};

pub const SHEET_NAME: &str = "TemplePulse";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    #[serde(alias = "excel")]
    Xlsx,
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),
    #[error("too many rows for a spreadsheet: {0}")]
    TooManyRows(usize),
}

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

pub fn export(records: &[PulseRecord], format: ExportFormat) -> Result<ExportFile, ExportError> {
    let file = match format {
        ExportFormat::Csv => ExportFile {
            file_name: "temple_pulse.csv",
            content_type: "text/csv; charset=utf-8",
            bytes: to_csv(records)?,
        },
        ExportFormat::Xlsx => ExportFile {
            file_name: "temple_pulse.xlsx",
            content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            bytes: to_xlsx(records)?,
        },
    };
    metrics::counter!("exports_total").increment(1);
    Ok(file)
}

pub fn to_csv(records: &[PulseRecord]) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    store::write_records(&mut buf, records)?;
    Ok(buf)
}

pub fn to_xlsx(records: &[PulseRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }

    for (i, r) in records.iter().enumerate() {
        let row = u32::try_from(i + 1).map_err(|_| ExportError::TooManyRows(records.len()))?;

        sheet.write_string(row, 0, format_timestamp(r.timestamp)?)?;
        sheet.write_string(row, 1, r.temple.as_str())?;
        sheet.write_string(row, 2, r.zone_label())?;
        sheet.write_number(row, 3, r.visitor_count as f64)?;
        sheet.write_number(row, 4, r.queue_time)?;
        sheet.write_string(row, 5, r.top_services.as_str())?;
        sheet.write_string(row, 6, join_payment_modes(&r.payment_modes))?;
        sheet.write_number(row, 7, f64::from(r.crowd_index))?;
        if let Some(flag) = r.peak_hour_flag {
            sheet.write_boolean(row, 8, flag)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
