use std::path::PathBuf;

use clap::Parser;
use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TVError {
    #[error("dataset has no rows or no columns")]
    EmptyDataset,
    #[error("failed to parse input: {0}")]
    ParseError(String),
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("xlsx error: {0}")]
    XlsxError(#[from] XlsxError),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("export failed: {0}")]
    ExportFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl TVError {
    pub fn parse(err: impl std::fmt::Display) -> Self {
        TVError::ParseError(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveLeft,
    MoveRight,
    CycleSort,
    Filter,
    CycleMatchMode,
    ToggleCaseSensitive,
    ColumnPicker,
    ToggleColumn,
    Export,
    Help,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
q              quit
up/down, k/j   move row
pgup/pgdn      move page
g/G, home/end  first/last row
left/right     move column
s              sort current column (asc, desc, off)
/              edit filter of current column
m              cycle filter mode (contains, exact, starts with)
i              toggle case sensitive filter
c              select columns (space toggles)
x              export visible rows to xlsx
?              this help
esc            close";

/// Runtime configuration, parsed from the command line.
#[derive(Parser, Debug, Clone, Setters)]
#[command(version, about = "View, filter, sort and export delimited text files.")]
#[setters(prefix = "with_")]
pub struct TVConfig {
    /// File to open (csv, tsv or txt)
    pub path: PathBuf,

    /// Field separator, defaults to tab for .tsv files and ',' otherwise
    #[arg(short, long)]
    pub separator: Option<char>,

    /// Fixed export file name, a timestamped name is used if omitted
    #[arg(short, long)]
    #[setters(strip_option)]
    pub output: Option<String>,

    /// Directory exports are written to
    #[arg(short = 'd', long, default_value = ".")]
    pub export_dir: PathBuf,

    /// Maximum rendered width of a column in characters
    #[arg(long, default_value_t = 40)]
    pub max_column_width: usize,

    /// Event poll timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    pub event_poll_time: u64,

    /// Log file, the terminal is owned by the ui
    #[arg(long, default_value = "tabx.log")]
    pub log_file: PathBuf,
}

impl TVConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TVConfig {
            path: path.into(),
            separator: None,
            output: None,
            export_dir: PathBuf::from("."),
            max_column_width: 40,
            event_poll_time: 100,
            log_file: PathBuf::from("tabx.log"),
        }
    }

    /// Separator as a single byte, falling back on the file extension.
    pub fn separator_byte(&self) -> Result<u8, TVError> {
        let sep = self.separator.unwrap_or_else(|| {
            match self
                .path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_ascii_lowercase())
                .as_deref()
            {
                Some("tsv") => '\t',
                _ => ',',
            }
        });
        if sep.is_ascii() {
            Ok(sep as u8)
        } else {
            Err(TVError::LoadingFailed(format!(
                "separator {sep:?} is not a single ascii character"
            )))
        }
    }
}
