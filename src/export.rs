use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use derive_setters::Setters;
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::domain::{TVConfig, TVError};

pub const SHEET_NAME: &str = "Sheet1";

/// Row major table handed to a spreadsheet encoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Project the visible rows onto the selected columns, in selection order.
pub fn to_table(dataset: &Dataset, visible: &[usize], selected: &[String]) -> ExportTable {
    let rows = dataset
        .rows(visible)
        .map(|r| selected.iter().map(|f| r.get(f).to_string()).collect())
        .collect();
    ExportTable {
        header: selected.to_vec(),
        rows,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileName {
    Fixed(String),
    Timestamped,
}

impl FileName {
    pub fn resolve(&self, now: DateTime<Utc>) -> String {
        match self {
            FileName::Fixed(name) => name.clone(),
            FileName::Timestamped => {
                let stamp = now
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
                    .replace([':', '.'], "-");
                format!("export_{stamp}.xlsx")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Setters)]
#[setters(prefix = "with_")]
pub struct ExportOptions {
    pub file_name: FileName,
    pub directory: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            file_name: FileName::Timestamped,
            directory: PathBuf::from("."),
        }
    }
}

impl ExportOptions {
    pub fn from_config(cfg: &TVConfig) -> Self {
        let file_name = match &cfg.output {
            Some(name) => FileName::Fixed(name.clone()),
            None => FileName::Timestamped,
        };
        let directory = PathBuf::from(shellexpand::tilde(&cfg.export_dir.to_string_lossy()).as_ref());
        ExportOptions {
            file_name,
            directory,
        }
    }

    pub fn path(&self, now: DateTime<Utc>) -> PathBuf {
        self.directory.join(self.file_name.resolve(now))
    }
}

/// Turns a table into the bytes of a spreadsheet file.
pub trait SpreadsheetEncoder {
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, TVError>;
}

/// Single sheet xlsx workbook, every cell written as a string.
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxEncoder;

impl SpreadsheetEncoder for XlsxEncoder {
    fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, TVError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        for (cidx, name) in table.header.iter().enumerate() {
            sheet.write_string(0, column_index(cidx)?, name)?;
        }
        for (ridx, row) in table.rows.iter().enumerate() {
            let xrow = u32::try_from(ridx + 1)
                .map_err(|_| TVError::ExportFailed(format!("row {ridx} exceeds sheet limits")))?;
            for (cidx, value) in row.iter().enumerate() {
                sheet.write_string(xrow, column_index(cidx)?, value)?;
            }
        }
        Ok(workbook.save_to_buffer()?)
    }
}

fn column_index(cidx: usize) -> Result<u16, TVError> {
    u16::try_from(cidx)
        .map_err(|_| TVError::ExportFailed(format!("column {cidx} exceeds sheet limits")))
}

/// Encode the visible rows and write them next to `options.directory`.
pub fn export_view(
    encoder: &dyn SpreadsheetEncoder,
    dataset: &Dataset,
    visible: &[usize],
    selected: &[String],
    options: &ExportOptions,
    now: DateTime<Utc>,
) -> Result<PathBuf, TVError> {
    let table = to_table(dataset, visible, selected);
    debug!(
        "Exporting {} rows x {} columns",
        table.rows.len(),
        table.header.len()
    );
    let bytes = encoder.encode(&table)?;
    let path = options.path(now);
    write_file(&path, &bytes)?;
    info!("Exported {} rows to {}", table.rows.len(), path.display());
    Ok(path)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), TVError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
