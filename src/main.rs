use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};

use tabx::controller::Controller;
use tabx::domain::{Message, TVConfig, TVError};
use tabx::logging;
use tabx::model::{Model, Status};
use tabx::ui::TableUI;

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run() -> Result<(), TVError> {
    let cfg = TVConfig::parse();
    logging::init(&cfg.log_file)?;
    info!("Starting tabx with {:?}", cfg);

    let path = shellexpand::full(&cfg.path.to_string_lossy())
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TVError::LoadingFailed(e.to_string()))?;

    // Load before taking over the terminal, so errors print normally.
    let mut model = Model::init(&cfg, 0, 0)?;
    model.load_data_file(path)?;

    let mut terminal = ratatui::init();
    let result = event_loop(&cfg, &mut model, &mut terminal);
    ratatui::restore();
    result
}

fn event_loop(
    cfg: &TVConfig,
    model: &mut Model,
    terminal: &mut DefaultTerminal,
) -> Result<(), TVError> {
    let size = terminal.size()?;
    model.update(Some(Message::Resize(
        size.width as usize,
        size.height as usize,
    )))?;

    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
