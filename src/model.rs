use std::time::{Duration, Instant};

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, error, info, trace, warn};

use crate::domain::{HELP_TEXT, Message, PromptMode, TVCConfig, TVCError};
use crate::export::{self, ClipboardSink};
use crate::filter::{self, FilterCriteria};
use crate::form::{FormEvent, FormMode, FormView, RecordForm};
use crate::inputter::{InputResult, Inputter};
use crate::record::{Dataset, RecordId, format_currency};
use crate::selection::{BulkAction, BulkTarget, Selection};
use crate::sort::{self, SortIndicator, SortState};
use crate::task::{Debouncer, SubmitGuard, TaskQueue};
use crate::ui::{
    BORDER_SIZE, CHECKBOX_WIDTH, CMDLINE_HEIGHT, COLUMN_SPACING, SCROLLBAR_WIDTH,
    STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    CMDINPUT,
    FORM,
    DETAILS,
    CONFIRM,
    POPUP,
}

/// Simulated backend call waiting in the task queue.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistJob {
    Save { mode: FormMode, name: String },
    Bulk { action: BulkAction, ids: Vec<RecordId> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub indicator: SortIndicator,
    pub filtered: bool,
    pub numeric: bool,
    pub width: usize,
    pub data: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopupView {
    pub title: String,
    pub lines: Vec<String>,
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Default)]
pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub checked: Vec<bool>,
    pub all_checked: bool,
    pub nrows: usize, // Rows left after filtering
    pub total: usize,
    pub selected_count: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub filter_summary: String,
    pub status_message: String,
    pub cmdinput: InputResult,
    pub prompt: Option<PromptMode>,
    pub popup: Option<PopupView>,
    pub form: Option<FormView>,
    pub layout: UILayout,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_width =
            ui_width.saturating_sub(BORDER_SIZE + SCROLLBAR_WIDTH + CHECKBOX_WIDTH + COLUMN_SPACING);
        let table_height = ui_height
            .saturating_sub(BORDER_SIZE + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT + CMDLINE_HEIGHT)
            .max(1);

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Derived figures shown in the details of a trader.
pub fn trader_stats(dataset: &Dataset, row: usize) -> Vec<(&'static str, String)> {
    let number = |name: &str| dataset.named_value(row, name).as_number();
    let mut stats = Vec::new();
    if let (Some(profit), Some(balance)) = (number("profit"), number("balance"))
        && balance > 0.0
    {
        stats.push((
            "Profit",
            format!("{} ({:.1}% of balance)", format_currency(profit), profit / balance * 100.0),
        ));
    }
    if let (Some(balance), Some(trades)) = (number("balance"), number("trades"))
        && trades > 0.0
    {
        stats.push(("Avg. trade", format_currency(balance / trades)));
    }
    if let Some(success) = number("success_rate") {
        stats.push(("Rating", format!("{:.1} / 5", success / 20.0)));
    }
    stats
}

fn fit_text(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('…');
    out
}

pub struct Model {
    config: TVCConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    dataset: Dataset,
    // View state. `rows` is always re-derived from insertion order.
    rows: Vec<usize>,
    sort: SortState,
    criteria: FilterCriteria,
    selection: Selection,
    visible_columns: Vec<usize>, // Dataset columns not hidden
    rendered_columns: Vec<usize>, // Positions in visible_columns that fit the screen
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    details_row: usize,
    last_update: Instant,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: ClipboardSink,
    input: Inputter,
    prompt: Option<PromptMode>,
    prompt_column: usize,
    prompt_backup: String,
    last_input: InputResult,
    search_debounce: Debouncer,
    tasks: TaskQueue<PersistJob>,
    form: Option<RecordForm>,
    popup: Option<PopupView>,
    pending_bulk: Option<(BulkAction, Vec<RecordId>)>,
    bulk_submit: SubmitGuard,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &TVCConfig,
        dataset: Dataset,
        clipboard: ClipboardSink,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, TVCError> {
        if dataset.columns.is_empty() {
            return Err(TVCError::EmptyDataset);
        }
        let visible_columns = dataset
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.visible)
            .map(|(idx, _)| idx)
            .collect::<Vec<usize>>();
        if visible_columns.is_empty() {
            return Err(TVCError::EmptyDataset);
        }

        let now = Instant::now();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            rows: (0..dataset.len()).collect(),
            dataset,
            sort: SortState::default(),
            criteria: FilterCriteria::default(),
            selection: Selection::default(),
            visible_columns,
            rendered_columns: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            details_row: 0,
            last_update: now,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::default(),
            clipboard,
            input: Inputter::default(),
            prompt: None,
            prompt_column: 0,
            prompt_backup: String::new(),
            last_input: InputResult::default(),
            search_debounce: Debouncer::new(Duration::from_millis(config.debounce_ms)),
            tasks: TaskQueue::new(Duration::from_millis(config.persist_delay_ms)),
            form: None,
            popup: None,
            pending_bulk: None,
            bulk_submit: SubmitGuard::default(),
            status_message: String::new(),
            last_status_message_update: now,
        };
        let message = if model.dataset.is_empty() {
            format!("No {} to show", model.dataset.entity)
        } else {
            format!("Loaded {} {} ...", model.dataset.len(), model.dataset.entity)
        };
        model.set_status_message(message);
        model.update_table_data();
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::CMDINPUT | Modus::FORM | Modus::CONFIRM)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = self.last_update;
        debug!("Status: {}", self.status_message);
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVCError> {
        self.update_at(message, Instant::now());
        Ok(())
    }

    fn update_at(&mut self, message: Option<Message>, now: Instant) {
        self.last_update = now;
        self.poll_timers(now);

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MoveBeginning => self.curser_row = 0,
                    Message::MoveEnd => self.curser_row = self.rows.len().saturating_sub(1),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Sort => self.sort_current_column(),
                    Message::ClearSort => self.clear_sort(),
                    Message::ToggleRow => self.toggle_row(),
                    Message::ToggleAll => self.toggle_all(),
                    Message::Search => self.enter_cmd_mode(PromptMode::Search),
                    Message::CycleFilter => self.cycle_filter(),
                    Message::LowerBound => self.enter_cmd_mode(PromptMode::LowerBound),
                    Message::UpperBound => self.enter_cmd_mode(PromptMode::UpperBound),
                    Message::ClearFilters => self.clear_filters(),
                    Message::Enter => self.show_details(),
                    Message::NewRecord => self.open_form(false),
                    Message::EditRecord => self.open_form(true),
                    Message::Bulk(action) => self.request_bulk(action),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Export => self.export_rows(),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                Modus::DETAILS => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::MoveUp | Message::MoveLeft => self.step_details(false),
                    Message::MoveDown | Message::MoveRight => self.step_details(true),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Enter | Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Enter | Message::Exit | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT | Modus::FORM | Modus::CONFIRM => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::RawKey(key) => self.raw_input(key, now),
                    _ => (),
                },
            }
        }

        self.update_table_data();
    }

    // -------------------- Timers ---------------------- //

    fn poll_timers(&mut self, now: Instant) {
        let timeout = Duration::from_millis(self.config.status_timeout_ms);
        if !self.status_message.is_empty()
            && now.saturating_duration_since(self.last_status_message_update) >= timeout
        {
            trace!("Status message expired");
            self.status_message.clear();
        }

        if self.search_debounce.fire(now) {
            self.apply_search(self.last_input.input.clone());
        }

        if !self.tasks.is_empty() {
            trace!("{} tasks pending", self.tasks.len());
        }
        for job in self.tasks.poll(now) {
            self.complete(job);
        }
    }

    fn complete(&mut self, job: PersistJob) {
        match job {
            PersistJob::Save { mode, name } => {
                if let FormMode::Edit(id) = mode
                    && self.dataset.position(id).is_none()
                {
                    trace!("Record {id} is gone, skipping save");
                    return;
                }
                let Some(form) = self.form.as_mut() else {
                    trace!("Form already closed, skipping save of {name}");
                    return;
                };
                form.submit.finish();
                self.form = None;
                self.modus = Modus::TABLE;
                info!("Saved {name} ({mode:?})");
                match mode {
                    FormMode::Add => self.set_status_message(format!("{name} added")),
                    FormMode::Edit(id) => self.set_status_message(format!("{name} ({id}) updated")),
                }
            }
            PersistJob::Bulk { action, ids } => {
                self.bulk_submit.finish();
                let affected = ids
                    .iter()
                    .filter(|id| self.dataset.position(**id).is_some())
                    .count();
                if affected == 0 {
                    trace!("No record of {ids:?} left, skipping {}", action.verb());
                    return;
                }
                self.selection.remove_all(&ids);
                info!("Bulk {} of {affected} records done", action.verb());
                self.set_status_message(format!(
                    "{affected} {} {}",
                    self.dataset.entity,
                    action.past_tense()
                ));
            }
        }
    }

    // -------------------- View state ---------------------- //

    fn current_row(&self) -> Option<usize> {
        self.rows.get(self.curser_row).copied()
    }

    fn current_column(&self) -> Option<usize> {
        self.visible_columns.get(self.curser_column).copied()
    }

    /// Recomputes `rows` from scratch: filter in insertion order, then sort.
    /// The cursor follows its record if it is still visible.
    fn rederive(&mut self) {
        let focused = self.current_row().map(|r| self.dataset.records[r].id);

        let base: Vec<usize> = (0..self.dataset.len()).collect();
        let outcome = filter::filter(&self.dataset, &base, &self.criteria);
        self.rows = match self.sort.column {
            Some(column) => sort::sort(&self.dataset, &outcome.rows, column, self.sort.direction),
            None => outcome.rows,
        };

        let visible_ids: Vec<RecordId> = self.rows.iter().map(|&r| self.dataset.records[r].id).collect();
        let dropped = self.selection.retain_visible(&visible_ids);
        if dropped > 0 {
            debug!("{dropped} selected records got hidden and were deselected");
        }

        self.curser_row = focused
            .and_then(|id| visible_ids.iter().position(|v| *v == id))
            .unwrap_or(0);
        trace!(
            "View: {} of {} rows, sort {:?}, criteria {:?}",
            outcome.matched, outcome.total, self.sort, self.criteria
        );
    }

    fn sort_current_column(&mut self) {
        let Some(column) = self.current_column() else {
            return;
        };
        self.sort.activate(column);
        self.rederive();
        let title = self.dataset.columns[column].title.clone();
        self.set_status_message(format!(
            "Sorted by {title} {}",
            self.sort.indicator(column).symbol()
        ));
    }

    fn clear_sort(&mut self) {
        self.sort.clear();
        self.rederive();
        self.set_status_message("Insertion order restored");
    }

    fn toggle_row(&mut self) {
        if let Some(row) = self.current_row() {
            self.selection.toggle_one(self.dataset.records[row].id);
            self.move_table_selection_down(1);
        }
    }

    fn toggle_all(&mut self) {
        let visible: Vec<RecordId> = self.rows.iter().map(|&r| self.dataset.records[r].id).collect();
        let checked = !self.selection.all_selected(&visible);
        self.selection.toggle_all(&visible, checked);
    }

    fn apply_search(&mut self, term: String) {
        self.criteria.set_text(&term);
        self.rederive();
    }

    fn cycle_filter(&mut self) {
        let Some(column) = self.current_column() else {
            return;
        };
        let descriptor = &self.dataset.columns[column];
        if descriptor.choices.is_empty() {
            let message = format!("{} has no categories to filter by", descriptor.title);
            self.set_status_message(message);
            return;
        }
        let current = self.criteria.equals.get(&column).map(String::as_str);
        let next = descriptor.next_choice(current).map(|c| (c.key.clone(), c.label.clone()));
        self.criteria.set_equals(column, next.as_ref().map(|(key, _)| key.as_str()));
        self.rederive();

        let title = self.dataset.columns[column].title.clone();
        match next {
            Some((_, label)) => self.set_status_message(format!(
                "{title} = {label}: showing {} of {}",
                self.rows.len(),
                self.dataset.len()
            )),
            None => self.set_status_message(format!("{title}: all")),
        }
    }

    fn clear_filters(&mut self) {
        self.search_debounce.cancel();
        self.criteria.clear();
        self.rederive();
        self.set_status_message("Filters cleared");
    }

    // -------------------- Command line ---------------------- //

    fn enter_cmd_mode(&mut self, mode: PromptMode) {
        let prefill = match mode {
            PromptMode::Search => self.criteria.text.clone(),
            PromptMode::LowerBound | PromptMode::UpperBound => {
                let Some(column) = self.current_column() else {
                    return;
                };
                let kind = self.dataset.columns[column].kind;
                if !kind.is_ranged() {
                    let message = format!("{} has no range", self.dataset.columns[column].title);
                    self.set_status_message(message);
                    return;
                }
                self.prompt_column = column;
                let range = self.criteria.ranges.get(&column).copied().unwrap_or_default();
                let bound = if mode == PromptMode::LowerBound { range.min } else { range.max };
                bound.map(|b| filter::render_bound(kind, b)).unwrap_or_default()
            }
        };
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.prompt = Some(mode);
        self.prompt_backup = prefill.clone();
        self.input.clear();
        self.input.set(&prefill);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent, now: Instant) {
        match self.modus {
            Modus::CMDINPUT => {
                self.last_input = self.input.read(key);
                if self.last_input.finished {
                    self.handle_cmd_input();
                } else if self.last_input.changed && self.prompt == Some(PromptMode::Search) {
                    self.search_debounce.arm(now);
                }
            }
            Modus::FORM => self.form_input(key, now),
            Modus::CONFIRM => self.confirm_input(key, now),
            _ => trace!("Raw key {key:?} outside of an input modus"),
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let input = self.last_input.input.clone();
        let canceled = self.last_input.canceled;
        match self.prompt.take() {
            Some(PromptMode::Search) => {
                if self.search_debounce.flush() {
                    trace!("Applying pending search now");
                }
                let term = if canceled { self.prompt_backup.clone() } else { input };
                self.apply_search(term);
                if !self.criteria.text.trim().is_empty() {
                    self.set_status_message(format!(
                        "Found {} of {}",
                        self.rows.len(),
                        self.dataset.len()
                    ));
                }
            }
            Some(mode @ (PromptMode::LowerBound | PromptMode::UpperBound)) if !canceled => {
                self.apply_bound(mode, &input)
            }
            Some(mode) => trace!("Prompt {mode:?} canceled"),
            None => info!("Cmd mode is none!"),
        }
    }

    fn apply_bound(&mut self, mode: PromptMode, input: &str) {
        let column = self.prompt_column;
        let kind = self.dataset.columns[column].kind;
        let bound = filter::parse_bound(kind, input);
        if bound.is_none() && !input.trim().is_empty() {
            warn!("Ignoring invalid bound {input:?} for column {column}");
            self.set_status_message(format!("Ignoring invalid bound \"{}\"", input.trim()));
        }
        match mode {
            PromptMode::LowerBound => self.criteria.set_lower(column, bound),
            _ => self.criteria.set_upper(column, bound),
        }
        self.rederive();
        if bound.is_some() {
            self.set_status_message(format!(
                "{}: showing {} of {}",
                self.criteria.summary(&self.dataset),
                self.rows.len(),
                self.dataset.len()
            ));
        }
    }

    // -------------------- Popups ---------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::DETAILS | Modus::POPUP | Modus::CONFIRM => {
                trace!("Close popup ...");
                self.popup = None;
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
            Modus::FORM => self.close_form(),
            Modus::TABLE | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup = Some(PopupView {
            title: " Help ".to_string(),
            lines: HELP_TEXT.lines().map(str::to_string).collect(),
        });
    }

    fn show_details(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        self.details_row = self.curser_row;
        self.previous_modus = Modus::TABLE;
        self.modus = Modus::DETAILS;
        self.popup = Some(self.build_details());
    }

    fn step_details(&mut self, forward: bool) {
        let last = self.rows.len().saturating_sub(1);
        self.details_row = if forward {
            std::cmp::min(self.details_row + 1, last)
        } else {
            self.details_row.saturating_sub(1)
        };
        self.curser_row = self.details_row;
        self.popup = Some(self.build_details());
    }

    fn build_details(&self) -> PopupView {
        let Some(&row) = self.rows.get(self.details_row) else {
            return PopupView::default();
        };
        let record = &self.dataset.records[row];
        let stats = trader_stats(&self.dataset, row);
        let label_width = self
            .dataset
            .columns
            .iter()
            .map(|c| c.title.chars().count())
            .chain(stats.iter().map(|(label, _)| label.chars().count()))
            .max()
            .unwrap_or(0);

        let mut lines: Vec<String> = self
            .dataset
            .columns
            .iter()
            .enumerate()
            .map(|(cidx, c)| {
                format!("{:>label_width$}  {}", c.title, self.dataset.value(row, cidx).render())
            })
            .collect();
        if !stats.is_empty() {
            lines.push(String::new());
            lines.extend(
                stats
                    .into_iter()
                    .map(|(label, value)| format!("{label:>label_width$}  {value}")),
            );
        }
        PopupView {
            title: format!(" {} {} ", self.dataset.entity, record.id),
            lines,
        }
    }

    // -------------------- Forms and bulk actions ---------------------- //

    fn open_form(&mut self, edit: bool) {
        let form = if edit {
            match self.current_row() {
                Some(row) => RecordForm::for_edit(&self.dataset, row),
                None => return,
            }
        } else {
            RecordForm::for_new(&self.dataset)
        };
        match form {
            Some(form) => {
                debug!("Open form {:?}", form.mode);
                self.form = Some(form);
                self.previous_modus = Modus::TABLE;
                self.modus = Modus::FORM;
            }
            None => {
                let message = format!("{} cannot be edited", self.dataset.name);
                self.set_status_message(message);
            }
        }
    }

    fn form_input(&mut self, key: KeyEvent, now: Instant) {
        let Some(form) = self.form.as_mut() else {
            self.modus = Modus::TABLE;
            return;
        };
        match form.handle_key(key) {
            FormEvent::None => {}
            FormEvent::Close => self.close_form(),
            FormEvent::Submit => self.submit_form(now),
        }
    }

    fn submit_form(&mut self, now: Instant) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        if !form.submit.is_enabled() {
            trace!("Save already in flight, ignoring submit");
            return;
        }
        if !form.validate() {
            self.set_status_message("Please fix the highlighted fields");
            return;
        }
        let job = PersistJob::Save {
            mode: form.mode,
            name: form.name(),
        };
        let token = self.tasks.spawn(job, now);
        form.submit.try_begin(token);
        self.set_status_message("Saving ...");
    }

    fn close_form(&mut self) {
        if let Some(mut form) = self.form.take() {
            form.submit.cancel();
            debug!("Closed form {:?}", form.mode);
        }
        self.modus = Modus::TABLE;
    }

    fn request_bulk(&mut self, action: BulkAction) {
        if !self.bulk_submit.is_enabled() {
            trace!("Bulk job still running, ignoring {}", action.verb());
            self.set_status_message("Bulk action in progress");
            return;
        }
        match self.selection.bulk_action(action) {
            BulkTarget::NoTargets => {
                let message = format!("No {} selected", self.dataset.entity);
                self.set_status_message(message);
            }
            BulkTarget::Targets { action, ids } => {
                let verb = action.verb();
                let mut title = verb.to_string();
                title[..1].make_ascii_uppercase();
                self.popup = Some(PopupView {
                    title: format!(" {title} "),
                    lines: vec![
                        format!("{title} {} selected {}?", ids.len(), self.dataset.entity),
                        String::new(),
                        "y: confirm   n: cancel".to_string(),
                    ],
                });
                self.pending_bulk = Some((action, ids));
                self.previous_modus = Modus::TABLE;
                self.modus = Modus::CONFIRM;
            }
        }
    }

    fn confirm_input(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                if let Some((action, ids)) = self.pending_bulk.take() {
                    let count = ids.len();
                    let token = self.tasks.spawn(PersistJob::Bulk { action, ids }, now);
                    self.bulk_submit.try_begin(token);
                    self.set_status_message(format!(
                        "Applying {} to {count} {} ...",
                        action.verb(),
                        self.dataset.entity
                    ));
                }
                self.exit();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.pending_bulk = None;
                self.set_status_message("Cancelled");
                self.exit();
            }
            _ => trace!("Waiting for confirmation, ignoring {key:?}"),
        }
    }

    // -------------------- Clipboard and export ---------------------- //

    fn copy_table_row(&mut self) {
        let row = match self.modus {
            Modus::DETAILS => self.rows.get(self.details_row).copied(),
            _ => self.current_row(),
        };
        let Some(row) = row else {
            return;
        };
        let content = export::csv_row(&self.dataset, row);
        trace!("Row content: {content}");
        let id = self.dataset.records[row].id;
        if self.clipboard.copy(content) {
            self.set_status_message(format!("Copied {id} to clipboard"));
        } else {
            self.set_status_message("Clipboard not available");
        }
    }

    fn export_rows(&mut self) {
        match export::export_rows(&self.dataset, &self.rows, &self.config.export_dir) {
            Ok(path) => {
                let message = format!("Exported {} rows to {}", self.rows.len(), path.display());
                self.set_status_message(message);
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    // -------------------- Movement ---------------------- //

    fn move_table_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        if !self.rows.is_empty() {
            self.curser_row = std::cmp::min(self.curser_row + size, self.rows.len() - 1);
        }
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    fn move_table_selection_right(&mut self) {
        self.curser_column = std::cmp::min(self.curser_column + 1, self.visible_columns.len() - 1);
    }

    fn column_width(&self, column: usize) -> usize {
        let c = &self.dataset.columns[column];
        // Leave room for the sort indicator behind the title.
        let wanted = std::cmp::max(c.max_width, c.title.chars().count() + 2);
        std::cmp::min(wanted, self.config.max_column_width)
    }

    fn columns_fit(&self, from: usize, to: usize) -> bool {
        let needed: usize = self.visible_columns[from..=to]
            .iter()
            .map(|&c| self.column_width(c) + COLUMN_SPACING)
            .sum();
        needed <= self.uilayout.table_width
    }

    // -------------------- Presentation ---------------------- //

    fn update_table_data(&mut self) {
        let height = self.uilayout.table_height.max(1);

        // Keep the cursor inside the data and the viewport around the cursor.
        self.curser_row = std::cmp::min(self.curser_row, self.rows.len().saturating_sub(1));
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }
        self.offset_row = std::cmp::min(self.offset_row, self.rows.len().saturating_sub(height));

        self.curser_column = std::cmp::min(self.curser_column, self.visible_columns.len() - 1);
        self.offset_column = std::cmp::min(self.offset_column, self.curser_column);
        while self.offset_column < self.curser_column
            && !self.columns_fit(self.offset_column, self.curser_column)
        {
            self.offset_column += 1;
        }

        // Columns that fit the table, the last one possibly cut.
        let mut widths = Vec::new();
        self.rendered_columns.clear();
        let mut used = 0;
        for pos in self.offset_column..self.visible_columns.len() {
            let width = self.column_width(self.visible_columns[pos]);
            if used + width + COLUMN_SPACING <= self.uilayout.table_width {
                used += width + COLUMN_SPACING;
            } else if used < self.uilayout.table_width {
                self.rendered_columns.push(pos);
                widths.push(self.uilayout.table_width - used);
                break;
            } else {
                break;
            }
            self.rendered_columns.push(pos);
            widths.push(width);
        }

        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + height, self.rows.len());
        let page = &self.rows[rbegin..rend];

        trace!(
            "Table: Cr {}, Cc {}, Or {}, Oc {}, Rb {}, Re {}, tw: {}, th:{}",
            self.curser_row,
            self.curser_column,
            self.offset_row,
            self.offset_column,
            rbegin,
            rend,
            self.uilayout.table_width,
            height
        );

        let table = self
            .rendered_columns
            .iter()
            .zip(widths)
            .map(|(&pos, width)| {
                let cidx = self.visible_columns[pos];
                let column = &self.dataset.columns[cidx];
                let indicator = self.sort.indicator(cidx);
                ColumnView {
                    name: fit_text(&format!("{} {}", column.title, indicator.symbol()), width),
                    indicator,
                    filtered: self.criteria.equals.contains_key(&cidx)
                        || self.criteria.ranges.contains_key(&cidx),
                    numeric: column.kind.is_numeric(),
                    width,
                    data: page
                        .iter()
                        .map(|&row| fit_text(&self.dataset.value(row, cidx).render(), width))
                        .collect(),
                }
            })
            .collect();

        let visible_ids: Vec<RecordId> = self.rows.iter().map(|&r| self.dataset.records[r].id).collect();
        self.uidata = UIData {
            name: self.dataset.name.clone(),
            table,
            checked: page
                .iter()
                .map(|&row| self.selection.contains(self.dataset.records[row].id))
                .collect(),
            all_checked: self.selection.all_selected(&visible_ids),
            nrows: self.rows.len(),
            total: self.dataset.len(),
            selected_count: self.selection.len(),
            selected_row: self.curser_row - self.offset_row,
            selected_column: self.curser_column - self.offset_column,
            abs_selected_row: self.curser_row,
            filter_summary: self.criteria.summary(&self.dataset),
            status_message: self.status_message.clone(),
            cmdinput: self.last_input.clone(),
            prompt: self.prompt,
            popup: self.popup.clone(),
            form: self.form.as_ref().map(|f| f.view(&self.dataset.entity)),
            layout: self.uilayout.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DataProvider, SampleOperations, SampleTraders};
    use ratatui::crossterm::event::KeyModifiers;

    const MS: Duration = Duration::from_millis(1);

    fn traders() -> Model {
        let dataset = SampleTraders.load().unwrap();
        Model::init(&TVCConfig::default(), dataset, ClipboardSink::disabled(), 160, 30).unwrap()
    }

    fn key(code: KeyCode) -> Option<Message> {
        Some(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn type_str(model: &mut Model, s: &str, now: Instant) {
        for c in s.chars() {
            model.update_at(key(KeyCode::Char(c)), now);
        }
    }

    fn column(model: &mut Model, name: &str, now: Instant) {
        let target = model.dataset.column_index(name).unwrap();
        let pos = model.visible_columns.iter().position(|&c| c == target).unwrap();
        model.update_at(Some(Message::MoveBeginning), now);
        for _ in 0..model.visible_columns.len() {
            model.update_at(Some(Message::MoveLeft), now);
        }
        for _ in 0..pos {
            model.update_at(Some(Message::MoveRight), now);
        }
        assert_eq!(model.current_column(), Some(target));
    }

    fn names(model: &Model) -> Vec<String> {
        model
            .rows
            .iter()
            .map(|&r| model.dataset.named_value(r, "name").render())
            .collect()
    }

    fn balances(model: &Model) -> Vec<f64> {
        model
            .rows
            .iter()
            .filter_map(|&r| model.dataset.named_value(r, "balance").as_number())
            .collect()
    }

    #[test]
    fn starts_in_insertion_order_with_counts() {
        let model = traders();
        let ui = model.get_uidata();
        assert_eq!(ui.nrows, 5);
        assert_eq!(ui.total, 5);
        assert_eq!(ui.selected_count, 0);
        assert_eq!(ui.table[0].data[0], "#001");
        assert!(ui.table.iter().all(|c| c.indicator == SortIndicator::Unsorted));
        // Hidden columns are not drawn.
        assert!(!ui.table.iter().any(|c| c.name.starts_with("Profit")));
        assert_eq!(ui.status_message, "Loaded 5 traders ...");
    }

    #[test]
    fn sorting_by_name_twice_reverses() {
        let t0 = Instant::now();
        let mut model = traders();
        column(&mut model, "name", t0);

        model.update_at(Some(Message::Sort), t0);
        assert_eq!(
            names(&model),
            vec!["Алексей Козлов", "Дмитрий Новиков", "Елена Волкова", "Иван Петров", "Мария Сидорова"]
        );
        assert_eq!(model.get_uidata().table[1].indicator, SortIndicator::Ascending);

        model.update_at(Some(Message::Sort), t0);
        assert_eq!(
            names(&model),
            vec!["Мария Сидорова", "Иван Петров", "Елена Волкова", "Дмитрий Новиков", "Алексей Козлов"]
        );
        assert!(model.get_uidata().table[1].name.ends_with('▼'));

        model.update_at(Some(Message::ClearSort), t0);
        assert_eq!(model.rows, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn balance_bounds_keep_the_inclusive_range() {
        let t0 = Instant::now();
        let mut model = traders();
        column(&mut model, "balance", t0);

        model.update_at(Some(Message::LowerBound), t0);
        assert!(model.raw_keyevents());
        type_str(&mut model, "5000", t0);
        model.update_at(key(KeyCode::Enter), t0);
        model.update_at(Some(Message::UpperBound), t0);
        type_str(&mut model, "30000", t0);
        model.update_at(key(KeyCode::Enter), t0);

        assert!(!model.raw_keyevents());
        assert_eq!(balances(&model), vec![15250.0, 8750.5, 22100.0]);
        assert_eq!(model.get_uidata().nrows, 3);
        assert!(model.get_uidata().table.iter().any(|c| c.filtered));
    }

    #[test]
    fn garbage_bounds_are_ignored() {
        let t0 = Instant::now();
        let mut model = traders();
        column(&mut model, "balance", t0);
        model.update_at(Some(Message::LowerBound), t0);
        type_str(&mut model, "lots", t0);
        model.update_at(key(KeyCode::Enter), t0);
        assert_eq!(model.rows.len(), 5);
        assert!(model.criteria.ranges.is_empty());
        assert!(model.get_uidata().status_message.contains("Ignoring invalid bound"));
    }

    #[test]
    fn bounds_need_a_ranged_column() {
        let t0 = Instant::now();
        let mut model = traders();
        column(&mut model, "email", t0);
        model.update_at(Some(Message::LowerBound), t0);
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().status_message, "Email has no range");
    }

    #[test]
    fn search_is_debounced() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::Search), t0);
        model.update_at(key(KeyCode::Char('c')), t0);
        model.update_at(key(KeyCode::Char('r')), t0 + 100 * MS);
        model.update_at(key(KeyCode::Char('y')), t0 + 200 * MS);

        model.update_at(None, t0 + 400 * MS);
        assert_eq!(model.rows.len(), 5);
        model.update_at(None, t0 + 500 * MS);
        // maria_crypto and elena_crypto
        assert_eq!(model.rows, vec![1, 3]);
        assert!(model.raw_keyevents());

        model.update_at(key(KeyCode::Enter), t0 + 600 * MS);
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().status_message, "Found 2 of 5");
    }

    #[test]
    fn enter_applies_the_search_without_waiting() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::Search), t0);
        type_str(&mut model, "ИВАН", t0);
        model.update_at(key(KeyCode::Enter), t0);
        assert_eq!(model.rows, vec![0]);
        assert!(!model.search_debounce.flush());
    }

    #[test]
    fn escape_restores_the_previous_search() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::Search), t0);
        type_str(&mut model, "trader", t0);
        model.update_at(key(KeyCode::Enter), t0);
        let found = model.rows.clone();
        assert_eq!(found, vec![0, 4]);

        model.update_at(Some(Message::Search), t0);
        model.update_at(key(KeyCode::Backspace), t0);
        model.update_at(None, t0 + 300 * MS);
        model.update_at(key(KeyCode::Esc), t0 + 400 * MS);
        assert_eq!(model.criteria.text, "trader");
        assert_eq!(model.rows, found);
    }

    #[test]
    fn category_filter_cycles_and_resets() {
        let t0 = Instant::now();
        let mut model = traders();
        column(&mut model, "status", t0);

        model.update_at(Some(Message::CycleFilter), t0);
        assert_eq!(model.rows, vec![0, 1, 3, 4]);
        model.update_at(Some(Message::CycleFilter), t0);
        assert_eq!(model.rows, vec![2]);
        model.update_at(Some(Message::CycleFilter), t0);
        assert!(model.rows.is_empty());
        assert_eq!(model.get_uidata().nrows, 0);
        model.update_at(Some(Message::CycleFilter), t0);
        assert_eq!(model.rows.len(), 5);
        assert!(model.criteria.is_empty());
    }

    #[test]
    fn hidden_rows_drop_out_of_the_selection() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::ToggleAll), t0);
        assert_eq!(model.get_uidata().selected_count, 5);
        assert!(model.get_uidata().all_checked);

        column(&mut model, "balance", t0);
        model.update_at(Some(Message::LowerBound), t0);
        type_str(&mut model, "20000", t0);
        model.update_at(key(KeyCode::Enter), t0);

        assert_eq!(model.get_uidata().nrows, 2);
        assert!(model.get_uidata().selected_count <= 2);
        assert_eq!(
            model.selection.bulk_action(BulkAction::Suspend),
            BulkTarget::Targets {
                action: BulkAction::Suspend,
                ids: vec![RecordId(3), RecordId(5)]
            }
        );
    }

    #[test]
    fn toggle_row_checks_and_advances() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::ToggleRow), t0);
        assert_eq!(model.get_uidata().checked, vec![true, false, false, false, false]);
        assert_eq!(model.curser_row, 1);
        model.update_at(Some(Message::ToggleAll), t0);
        model.update_at(Some(Message::ToggleAll), t0);
        assert_eq!(model.get_uidata().selected_count, 0);
    }

    #[test]
    fn empty_dataset_still_opens() {
        let t0 = Instant::now();
        let traders = SampleTraders.load().unwrap();
        let dataset = Dataset::new(&traders.name, &traders.entity, traders.columns, Vec::new());
        let mut model =
            Model::init(&TVCConfig::default(), dataset, ClipboardSink::disabled(), 160, 30).unwrap();
        assert_eq!(model.get_uidata().status_message, "No traders to show");
        model.update_at(Some(Message::ToggleRow), t0);
        model.update_at(Some(Message::MoveDown), t0);
        assert_eq!(model.get_uidata().nrows, 0);
        assert_eq!(model.get_uidata().selected_count, 0);
    }

    #[test]
    fn bulk_action_without_selection_only_reports() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::Bulk(BulkAction::Delete)), t0);
        assert!(!model.raw_keyevents());
        assert!(model.tasks.is_empty());
        assert_eq!(model.get_uidata().status_message, "No traders selected");
    }

    #[test]
    fn confirmed_bulk_action_completes_after_the_delay() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::ToggleRow), t0);
        model.update_at(Some(Message::ToggleRow), t0);
        model.update_at(Some(Message::Bulk(BulkAction::Suspend)), t0);
        assert!(model.get_uidata().popup.is_some());

        model.update_at(key(KeyCode::Char('y')), t0);
        assert!(model.get_uidata().popup.is_none());
        assert_eq!(model.tasks.len(), 1);
        assert_eq!(model.selection.len(), 2);

        model.update_at(None, t0 + 1500 * MS);
        assert_eq!(model.get_uidata().status_message, "2 traders suspended");
        assert!(model.selection.is_empty());
    }

    #[test]
    fn bulk_action_cannot_be_triggered_twice() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::ToggleRow), t0);
        model.update_at(Some(Message::Bulk(BulkAction::Suspend)), t0);
        model.update_at(key(KeyCode::Char('y')), t0);

        model.update_at(Some(Message::Bulk(BulkAction::Suspend)), t0 + 100 * MS);
        assert!(model.get_uidata().popup.is_none());
        model.update_at(key(KeyCode::Char('y')), t0 + 100 * MS);
        assert_eq!(model.tasks.len(), 1);
        assert_eq!(model.get_uidata().status_message, "Bulk action in progress");

        model.update_at(None, t0 + 1500 * MS);
        assert_eq!(model.get_uidata().status_message, "1 traders suspended");
        assert!(model.tasks.is_empty());

        model.update_at(Some(Message::ToggleRow), t0 + 1600 * MS);
        model.update_at(Some(Message::Bulk(BulkAction::Suspend)), t0 + 1600 * MS);
        assert!(model.get_uidata().popup.is_some());
    }

    #[test]
    fn bulk_completion_keeps_later_selection() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::ToggleRow), t0);
        model.update_at(Some(Message::Bulk(BulkAction::Suspend)), t0);
        model.update_at(key(KeyCode::Char('y')), t0);

        // Cursor moved on to #002 after the first toggle.
        model.update_at(Some(Message::ToggleRow), t0 + 100 * MS);
        assert_eq!(model.selection.ids(), vec![RecordId(1), RecordId(2)]);

        model.update_at(None, t0 + 1500 * MS);
        assert_eq!(model.get_uidata().status_message, "1 traders suspended");
        assert_eq!(model.selection.ids(), vec![RecordId(2)]);
        assert_eq!(model.get_uidata().checked, vec![false, true, false, false, false]);
    }

    #[test]
    fn declined_bulk_action_schedules_nothing() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::ToggleAll), t0);
        model.update_at(Some(Message::Bulk(BulkAction::Activate)), t0);
        model.update_at(key(KeyCode::Char('n')), t0);
        assert!(model.tasks.is_empty());
        assert_eq!(model.selection.len(), 5);
        assert!(!model.raw_keyevents());
    }

    fn fill_new_trader(model: &mut Model, t0: Instant) {
        model.update_at(Some(Message::NewRecord), t0);
        assert!(model.raw_keyevents());
        type_str(model, "Ольга Смирнова", t0);
        model.update_at(key(KeyCode::Tab), t0);
        model.update_at(key(KeyCode::Tab), t0);
        type_str(model, "olga@example.com", t0);
        model.update_at(key(KeyCode::Tab), t0);
        model.update_at(key(KeyCode::Tab), t0);
        type_str(model, "secret1", t0);
    }

    #[test]
    fn saving_a_new_trader_disables_submit_until_done() {
        let t0 = Instant::now();
        let mut model = traders();
        fill_new_trader(&mut model, t0);
        let form = model.get_uidata().form.as_ref().unwrap();
        assert_eq!(form.rows[1].value, "ольга_смирнова");
        assert_eq!(form.rows[4].value, "•••••••");

        model.update_at(key(KeyCode::Enter), t0);
        assert_eq!(model.tasks.len(), 1);
        assert!(!model.get_uidata().form.as_ref().unwrap().submit_enabled);

        model.update_at(key(KeyCode::Enter), t0 + 100 * MS);
        assert_eq!(model.tasks.len(), 1);

        model.update_at(None, t0 + 1500 * MS);
        assert!(model.get_uidata().form.is_none());
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().status_message, "Ольга Смирнова added");
    }

    #[test]
    fn closing_the_form_cancels_the_save() {
        let t0 = Instant::now();
        let mut model = traders();
        fill_new_trader(&mut model, t0);
        model.update_at(key(KeyCode::Enter), t0);
        model.update_at(key(KeyCode::Esc), t0 + 100 * MS);
        assert!(model.get_uidata().form.is_none());

        model.update_at(None, t0 + 1600 * MS);
        assert!(model.tasks.is_empty());
        assert_eq!(model.get_uidata().status_message, "Saving ...");
    }

    #[test]
    fn invalid_form_is_not_submitted() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::NewRecord), t0);
        model.update_at(key(KeyCode::Enter), t0);
        assert!(model.tasks.is_empty());
        let form = model.get_uidata().form.as_ref().unwrap();
        assert!(form.rows[0].error.is_some());
        assert_eq!(model.get_uidata().status_message, "Please fix the highlighted fields");
    }

    #[test]
    fn operations_cannot_be_edited() {
        let dataset = SampleOperations.load().unwrap();
        let mut model =
            Model::init(&TVCConfig::default(), dataset, ClipboardSink::disabled(), 160, 30).unwrap();
        model.update_at(Some(Message::EditRecord), Instant::now());
        assert!(model.form.is_none());
        assert_eq!(model.get_uidata().status_message, "Operations cannot be edited");
    }

    #[test]
    fn details_show_trader_statistics() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::MoveEnd), t0);
        model.update_at(Some(Message::Enter), t0);
        let popup = model.get_uidata().popup.clone().unwrap();
        assert_eq!(popup.title, " traders #005 ");
        assert!(popup.lines.iter().any(|l| l.ends_with("Rating  4.6 / 5")));

        model.update_at(Some(Message::MoveUp), t0);
        assert_eq!(model.get_uidata().popup.as_ref().unwrap().title, " traders #004 ");
        model.update_at(Some(Message::Exit), t0);
        assert!(model.get_uidata().popup.is_none());
        assert_eq!(model.curser_row, 3);
    }

    #[test]
    fn trader_stats_derive_from_balance() {
        let dataset = SampleTraders.load().unwrap();
        let stats = trader_stats(&dataset, 4);
        assert_eq!(
            stats,
            vec![
                ("Profit", "$8,900.00 (19.8% of balance)".to_string()),
                ("Avg. trade", "$101.12".to_string()),
                ("Rating", "4.6 / 5".to_string()),
            ]
        );
        let operations = SampleOperations.load().unwrap();
        assert!(trader_stats(&operations, 0).is_empty());
    }

    #[test]
    fn status_messages_expire() {
        let t0 = Instant::now();
        let mut model = traders();
        model.update_at(Some(Message::ClearFilters), t0);
        assert_eq!(model.get_uidata().status_message, "Filters cleared");
        model.update_at(None, t0 + 4999 * MS);
        assert_eq!(model.get_uidata().status_message, "Filters cleared");
        model.update_at(None, t0 + 5000 * MS);
        assert_eq!(model.get_uidata().status_message, "");
    }

    #[test]
    fn cursor_follows_its_record_through_a_sort() {
        let t0 = Instant::now();
        let mut model = traders();
        column(&mut model, "balance", t0);
        // `column` jumped to the first row.
        model.update_at(Some(Message::MoveDown), t0);
        model.update_at(Some(Message::MoveDown), t0);
        model.update_at(Some(Message::Sort), t0);
        // Алексей has the fourth lowest balance.
        assert_eq!(model.curser_row, 3);
        assert_eq!(model.get_uidata().abs_selected_row, 3);
    }

    #[test]
    fn small_screens_scroll_rows_and_columns() {
        let dataset = SampleTraders.load().unwrap();
        let mut model =
            Model::init(&TVCConfig::default(), dataset, ClipboardSink::disabled(), 40, 8).unwrap();
        let t0 = Instant::now();
        model.update_at(Some(Message::MoveEnd), t0);
        let ui = model.get_uidata();
        assert_eq!(ui.layout.table_height, 3);
        assert_eq!(ui.checked.len(), 3);
        assert_eq!(ui.selected_row, 2);
        assert_eq!(ui.table[0].data[2], "#005");

        for _ in 0..7 {
            model.update_at(Some(Message::MoveRight), t0);
        }
        let ui = model.get_uidata();
        assert!(ui.table[ui.selected_column].name.starts_with("Registered"));
        assert!(ui.table.iter().map(|c| c.width + COLUMN_SPACING).sum::<usize>() <= ui.layout.table_width + COLUMN_SPACING);
    }

    #[test]
    fn export_writes_the_visible_rows() {
        let dir = std::env::temp_dir().join(format!("tvc-model-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = TVCConfig::default().with_export_dir(dir.clone());
        let dataset = SampleTraders.load().unwrap();
        let mut model = Model::init(&config, dataset, ClipboardSink::disabled(), 160, 30).unwrap();
        let t0 = Instant::now();

        column(&mut model, "level", t0);
        model.update_at(Some(Message::CycleFilter), t0);
        model.update_at(Some(Message::Export), t0);

        let text = std::fs::read_to_string(dir.join("traders.csv")).unwrap();
        // header and the single beginner
        assert_eq!(text.lines().count(), 2);
        assert!(model.get_uidata().status_message.starts_with("Exported 1 rows"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn copy_without_clipboard_reports() {
        let mut model = traders();
        model.update_at(Some(Message::CopyRow), Instant::now());
        assert_eq!(model.get_uidata().status_message, "Clipboard not available");
    }

    #[test]
    fn quit_from_anywhere() {
        let mut model = traders();
        model.update_at(Some(Message::Help), Instant::now());
        assert!(model.get_uidata().popup.is_some());
        model.update_at(Some(Message::Quit), Instant::now());
        assert_eq!(model.status, Status::QUITTING);
    }
}
