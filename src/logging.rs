use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::domain::TVError;

/// Log to `log_file`, the terminal belongs to the ui.
///
/// The level comes from `RUST_LOG` and defaults to `info`.
pub fn init(log_file: &Path) -> Result<(), TVError> {
    let file = File::create(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_line_number(true),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| TVError::Logging(e.to_string()))
}
