use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TVCConfig, TVCError};
use crate::model::Model;
use crate::selection::BulkAction;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TVCConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Waits at most `event_poll_time` ms for an event. `None` still lets the
    /// model run its timers.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TVCError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(self.handle_key(key, model.raw_keyevents()));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent, raw: bool) -> Option<Message> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Message::Quit);
        }
        if raw {
            return Some(Message::RawKey(key));
        }
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('h') | KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Message::MoveRight),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::MoveBeginning),
            KeyCode::Char('G') | KeyCode::End => Some(Message::MoveEnd),
            KeyCode::Char('s') => Some(Message::Sort),
            KeyCode::Char('S') => Some(Message::ClearSort),
            KeyCode::Char(' ') => Some(Message::ToggleRow),
            KeyCode::Char('a') => Some(Message::ToggleAll),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('f') => Some(Message::CycleFilter),
            KeyCode::Char('m') => Some(Message::LowerBound),
            KeyCode::Char('M') => Some(Message::UpperBound),
            KeyCode::Char('c') => Some(Message::ClearFilters),
            KeyCode::Char('A') => Some(Message::Bulk(BulkAction::Activate)),
            KeyCode::Char('U') => Some(Message::Bulk(BulkAction::Suspend)),
            KeyCode::Char('D') => Some(Message::Bulk(BulkAction::Delete)),
            KeyCode::Char('n') => Some(Message::NewRecord),
            KeyCode::Char('e') => Some(Message::EditRecord),
            KeyCode::Char('y') => Some(Message::CopyRow),
            KeyCode::Char('E') => Some(Message::Export),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
