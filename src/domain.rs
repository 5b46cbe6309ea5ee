use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::selection::BulkAction;

#[derive(Debug)]
pub enum TVCError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    EmptyDataset,
    LoggingFailed(String),
}

impl fmt::Display for TVCError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVCError::IoError(e) => write!(f, "io error: {e}"),
            TVCError::PolarsError(e) => write!(f, "could not read data: {e}"),
            TVCError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            TVCError::FileNotFound => write!(f, "file not found"),
            TVCError::PermissionDenied => write!(f, "permission denied"),
            TVCError::UnknownFileType => {
                write!(f, "unknown file type (expected csv, parquet or arrow)")
            }
            TVCError::EmptyDataset => write!(f, "dataset has no columns"),
            TVCError::LoggingFailed(msg) => write!(f, "could not set up logging: {msg}"),
        }
    }
}

impl std::error::Error for TVCError {}

impl From<Error> for TVCError {
    fn from(err: Error) -> Self {
        TVCError::IoError(err)
    }
}

impl From<PolarsError> for TVCError {
    fn from(err: PolarsError) -> Self {
        TVCError::PolarsError(err)
    }
}

/// Runtime configuration, built from the command line.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TVCConfig {
    pub event_poll_time: u64,
    pub debounce_ms: u64,
    pub persist_delay_ms: u64,
    pub status_timeout_ms: u64,
    pub max_column_width: usize,
    pub export_dir: PathBuf,
}

impl Default for TVCConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            debounce_ms: 300,
            persist_delay_ms: 1500,
            status_timeout_ms: 5000,
            max_column_width: 32,
            export_dir: PathBuf::from("."),
        }
    }
}

/// What the command line prompt is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Search,
    LowerBound,
    UpperBound,
}

impl PromptMode {
    pub fn label(self) -> &'static str {
        match self {
            PromptMode::Search => "/",
            PromptMode::LowerBound => "min: ",
            PromptMode::UpperBound => "max: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Resize(usize, usize),
    Sort,
    ClearSort,
    ToggleRow,
    ToggleAll,
    Search,
    CycleFilter,
    LowerBound,
    UpperBound,
    ClearFilters,
    Enter,
    Exit,
    NewRecord,
    EditRecord,
    Bulk(BulkAction),
    CopyRow,
    Export,
    Help,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Navigation
  j/k, ↑/↓       move row          h/l, ←/→   move column
  PgUp/PgDn      page              g/G        first/last row
Sorting
  s              sort by column (again to reverse)
  S              back to insertion order
Filtering
  /              search name, username and email
  f              cycle category filter of the column
  m/M            lower/upper bound of the column
  c              clear all filters
Selection
  space          toggle row        a          toggle all visible
  A/U/D          activate, suspend, delete selected
Records
  enter          details           n/e        new/edit record
  y              copy row          E          export visible rows
  ?              help              esc        close      q   quit";
