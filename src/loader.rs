use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::dataset::Record;
use crate::domain::TVError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    CSV,
    TSV,
    TXT,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub file_type: FileType,
}

/// Output of the parser: field names in header order and one record per row.
#[derive(Debug)]
pub struct ParsedTable {
    pub fields: Vec<String>,
    pub records: Vec<Record>,
}

struct Column {
    name: Arc<str>,
    data: Vec<Option<String>>,
}

/// Read a delimited text file. Every cell is kept as text.
pub fn load_file(path: &Path, separator: u8) -> Result<ParsedTable, TVError> {
    let file_info = get_file_info(path)?;
    debug!(
        "Loading {:?} file {} ({} bytes)",
        file_info.file_type,
        file_info.path.display(),
        file_info.file_size
    );

    let start_time = Instant::now();
    let df = load_csv(&file_info.path, separator)
        .and_then(|frame| frame.collect())
        .map_err(TVError::parse)?;

    // Each column is converted in its own task, the records are assembled afterwards.
    let columns = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect::<Result<Vec<Column>, PolarsError>>()
        .map_err(TVError::parse)?;

    let table = assemble(columns, df.height());
    info!(
        "Parsed {} rows x {} columns in {}ms",
        table.records.len(),
        table.fields.len(),
        start_time.elapsed().as_millis()
    );
    Ok(table)
}

fn load_csv(path: &Path, separator: u8) -> Result<LazyFrame, PolarsError> {
    // No schema inference: every column is read as a string.
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_separator(separator)
        .with_infer_schema_length(Some(0))
        .finish()
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<Column, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let data = col
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(Column {
        name: Arc::from(col_name),
        data,
    })
}

fn assemble(columns: Vec<Column>, nrows: usize) -> ParsedTable {
    let fields = columns.iter().map(|c| c.name.to_string()).collect();
    let records = (0..nrows)
        .map(|ridx| {
            columns
                .iter()
                .filter_map(|c| {
                    c.data
                        .get(ridx)
                        .and_then(|v| v.clone())
                        .map(|v| (Arc::clone(&c.name), v))
                })
                .collect()
        })
        .collect();
    ParsedTable { fields, records }
}

pub fn detect_file_type(path: &Path) -> Result<FileType, TVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("TSV") | Some("TAB") => Ok(FileType::TSV),
        Some("TXT") => Ok(FileType::TXT),
        _ => Err(TVError::UnknownFileType),
    }
}

pub fn get_file_info(path: &Path) -> Result<FileInfo, TVError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TVError::FileNotFound,
        ErrorKind::PermissionDenied => TVError::PermissionDenied,
        _ => TVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TVError::LoadingFailed("Not a file!".into()));
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        file_size: metadata.len(),
        file_type: detect_file_type(path)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_types_by_extension() {
        assert_eq!(detect_file_type(Path::new("a.csv")).unwrap(), FileType::CSV);
        assert_eq!(detect_file_type(Path::new("a.TSV")).unwrap(), FileType::TSV);
        assert_eq!(detect_file_type(Path::new("a.txt")).unwrap(), FileType::TXT);
        assert!(matches!(
            detect_file_type(Path::new("a.parquet")),
            Err(TVError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            get_file_info(Path::new("/does/not/exist.csv")),
            Err(TVError::FileNotFound)
        ));
    }

    #[test]
    fn directories_are_rejected() {
        let dir = std::env::temp_dir();
        assert!(matches!(
            get_file_info(&dir),
            Err(TVError::LoadingFailed(_))
        ));
    }

    #[test]
    fn nulls_become_missing_fields() {
        let columns = vec![
            Column {
                name: Arc::from("a"),
                data: vec![Some("1".into()), None],
            },
            Column {
                name: Arc::from("b"),
                data: vec![Some("x".into()), Some("y".into())],
            },
        ];
        let table = assemble(columns, 2);
        assert_eq!(table.fields, ["a", "b"]);
        assert_eq!(table.records[0].get("a"), "1");
        assert_eq!(table.records[1].len(), 1);
        assert_eq!(table.records[1].get("a"), "");
        assert_eq!(table.records[1].get("b"), "y");
    }
}
