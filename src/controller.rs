use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TVConfig, TVError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        Some(Message::RawKey(key))
                    } else {
                        self.handle_key(key)
                    }
                }
                Event::Resize(width, height) => {
                    Some(Message::Resize(width as usize, height as usize))
                }
                _ => None,
            });
        }
        Ok(None)
    }

    pub fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Message::Quit),
                KeyCode::Char('f') => Some(Message::MovePageDown),
                KeyCode::Char('b') => Some(Message::MovePageUp),
                _ => None,
            };
        }
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Home | KeyCode::Char('g') => Some(Message::MoveBeginning),
            KeyCode::End | KeyCode::Char('G') => Some(Message::MoveEnd),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
            KeyCode::Char('s') => Some(Message::CycleSort),
            KeyCode::Char('/') => Some(Message::Filter),
            KeyCode::Char('m') => Some(Message::CycleMatchMode),
            KeyCode::Char('i') => Some(Message::ToggleCaseSensitive),
            KeyCode::Char('c') => Some(Message::ColumnPicker),
            KeyCode::Char(' ') => Some(Message::ToggleColumn),
            KeyCode::Char('x') => Some(Message::Export),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode) -> Option<Message> {
        Controller::new(&TVConfig::new("a.csv")).handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn keys_map_to_messages() {
        assert_eq!(map(KeyCode::Char('q')), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('j')), Some(Message::MoveDown));
        assert_eq!(map(KeyCode::Up), Some(Message::MoveUp));
        assert_eq!(map(KeyCode::Char('G')), Some(Message::MoveEnd));
        assert_eq!(map(KeyCode::Char('s')), Some(Message::CycleSort));
        assert_eq!(map(KeyCode::Char('/')), Some(Message::Filter));
        assert_eq!(map(KeyCode::Char(' ')), Some(Message::ToggleColumn));
        assert_eq!(map(KeyCode::Char('x')), Some(Message::Export));
        assert_eq!(map(KeyCode::Esc), Some(Message::Exit));
        assert_eq!(map(KeyCode::Char('z')), None);
    }

    #[test]
    fn control_keys() {
        let controller = Controller::new(&TVConfig::new("a.csv"));
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(controller.handle_key(key), Some(Message::Quit));
    }
}
