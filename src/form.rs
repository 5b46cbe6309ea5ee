use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tracing::trace;

use crate::record::{Category, Dataset, RecordId};
use crate::task::SubmitGuard;
use crate::validation::{Field, Rule, validate_form};

const NAME: usize = 0;
const USERNAME: usize = 1;
const EMAIL: usize = 2;
const BALANCE: usize = 3;

const USERNAME_MAX_CHARS: usize = 20;
pub const SECRET_MIN_CHARS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit(RecordId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEvent {
    None,
    Submit,
    Close,
}

pub struct ChoiceField {
    pub label: &'static str,
    pub choices: Vec<Category>,
    pub selected: usize,
}

impl ChoiceField {
    fn cycle(&mut self, forward: bool) {
        let n = self.choices.len();
        if n == 0 {
            return;
        }
        self.selected = if forward {
            (self.selected + 1) % n
        } else {
            (self.selected + n - 1) % n
        };
    }

    pub fn current(&self) -> Option<&Category> {
        self.choices.get(self.selected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRow {
    pub label: String,
    pub value: String,
    pub cursor: Option<usize>,
    pub error: Option<String>,
    pub focused: bool,
    pub required: bool,
}

/// Rendering model of the open form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    pub title: String,
    pub rows: Vec<FormRow>,
    pub submit_enabled: bool,
}

/// Add/edit form for trader records.
pub struct RecordForm {
    pub mode: FormMode,
    pub fields: Vec<Field>,
    pub choices: Vec<ChoiceField>,
    pub submit: SubmitGuard,
    focus: usize,
    username_edited: bool,
}

/// Username proposal derived from a display name: lowercase letters and
/// spaces are kept, whitespace runs become `_`, at most 20 characters.
pub fn generate_username(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || ('а'..='я').contains(c) || c.is_whitespace())
        .collect();
    let mut out = String::new();
    let mut in_space = false;
    for c in kept.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out.chars().take(USERNAME_MAX_CHARS).collect()
}

impl RecordForm {
    /// Forms exist only for tables that carry the trader columns.
    fn supported(dataset: &Dataset) -> bool {
        ["name", "username", "email", "balance", "level", "status"]
            .iter()
            .all(|c| dataset.column_index(c).is_some())
    }

    fn build(dataset: &Dataset, mode: FormMode) -> Self {
        let taken: Vec<String> = dataset
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| mode != FormMode::Edit(r.id))
            .map(|(row, _)| dataset.named_value(row, "email").raw())
            .filter(|e| !e.is_empty())
            .collect();

        let mut fields = vec![
            Field::new("Name", vec![Rule::Required]),
            Field::new("Username", vec![Rule::Required]),
            Field::new("Email", vec![Rule::Required, Rule::Email, Rule::Unique(taken)]),
            Field::new("Balance", vec![Rule::Required, Rule::NonNegative]),
        ];
        if mode == FormMode::Add {
            fields.push(
                Field::new("Password", vec![Rule::Required, Rule::MinLength(SECRET_MIN_CHARS)]).secret(),
            );
        }

        let choice = |label: &'static str, column: &str| ChoiceField {
            label,
            choices: dataset
                .column_index(column)
                .map(|c| dataset.columns[c].choices.clone())
                .unwrap_or_default(),
            selected: 0,
        };

        Self {
            mode,
            fields,
            choices: vec![choice("Level", "level"), choice("Status", "status")],
            submit: SubmitGuard::default(),
            focus: 0,
            username_edited: false,
        }
    }

    pub fn for_new(dataset: &Dataset) -> Option<Self> {
        if !Self::supported(dataset) {
            return None;
        }
        let mut form = Self::build(dataset, FormMode::Add);
        form.fields[BALANCE].set_value("0");
        Some(form)
    }

    pub fn for_edit(dataset: &Dataset, row: usize) -> Option<Self> {
        if !Self::supported(dataset) {
            return None;
        }
        let record = dataset.records.get(row)?;
        let mut form = Self::build(dataset, FormMode::Edit(record.id));
        for (idx, column) in [(NAME, "name"), (USERNAME, "username"), (EMAIL, "email"), (BALANCE, "balance")] {
            form.fields[idx].set_value(&dataset.named_value(row, column).raw());
        }
        for (choice, column) in form.choices.iter_mut().zip(["level", "status"]) {
            if let Some(current) = dataset.named_value(row, column).as_category() {
                choice.selected = choice
                    .choices
                    .iter()
                    .position(|c| c.key == current.key)
                    .unwrap_or(0);
            }
        }
        form.username_edited = true;
        Some(form)
    }

    pub fn name(&self) -> String {
        self.fields[NAME].value().trim().to_string()
    }

    fn slots(&self) -> usize {
        self.fields.len() + self.choices.len()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn focus_next(&mut self) {
        self.blur();
        self.focus = (self.focus + 1) % self.slots();
    }

    pub fn focus_prev(&mut self) {
        self.blur();
        self.focus = (self.focus + self.slots() - 1) % self.slots();
    }

    // Leaving a text field validates it.
    fn blur(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.check();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => return FormEvent::Close,
            (KeyCode::Enter, _) => return FormEvent::Submit,
            (KeyCode::Tab, _) | (KeyCode::Down, _) => {
                self.focus_next();
                return FormEvent::None;
            }
            (KeyCode::BackTab, _) | (KeyCode::Up, _) => {
                self.focus_prev();
                return FormEvent::None;
            }
            _ => {}
        }

        if self.focus < self.fields.len() {
            let result = self.fields[self.focus].input.read(key);
            if result.changed {
                self.fields[self.focus].check();
                match self.focus {
                    NAME if !self.username_edited => {
                        let proposal = generate_username(&result.input);
                        self.fields[USERNAME].set_value(&proposal);
                        self.fields[USERNAME].check();
                    }
                    USERNAME => self.username_edited = true,
                    _ => {}
                }
            }
        } else if let Some(choice) = self.choices.get_mut(self.focus - self.fields.len()) {
            match key.code {
                KeyCode::Left => choice.cycle(false),
                KeyCode::Right | KeyCode::Char(' ') => choice.cycle(true),
                _ => trace!("Ignoring {:?} on choice field", key.code),
            }
        }
        FormEvent::None
    }

    /// Validates every field; the form may be submitted iff this returns true.
    pub fn validate(&mut self) -> bool {
        validate_form(&mut self.fields)
    }

    pub fn view(&self, entity: &str) -> FormView {
        let title = match self.mode {
            FormMode::Add => format!(" New {entity} "),
            FormMode::Edit(id) => format!(" Edit {entity} {id} "),
        };
        let mut rows: Vec<FormRow> = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let input = field.input.get();
                let value = if field.secret {
                    "•".repeat(input.input.chars().count())
                } else {
                    input.input
                };
                FormRow {
                    label: field.label.to_string(),
                    value,
                    cursor: (idx == self.focus).then_some(input.cursor_pos),
                    error: field.error_message().map(str::to_string),
                    focused: idx == self.focus,
                    required: field.is_required(),
                }
            })
            .collect();
        for (idx, choice) in self.choices.iter().enumerate() {
            let focused = self.fields.len() + idx == self.focus;
            rows.push(FormRow {
                label: choice.label.to_string(),
                value: format!(
                    "◀ {} ▶",
                    choice.current().map(|c| c.label.as_str()).unwrap_or("-")
                ),
                cursor: None,
                error: None,
                focused,
                required: false,
            });
        }
        FormView {
            title,
            rows,
            submit_enabled: self.submit.is_enabled(),
        }
    }
}
