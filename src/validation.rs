//! Field validation.
//!
//! Rules are checked against the trimmed value. `Required` always wins over the
//! other rules, which accept an empty value so that optional fields may stay blank.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::inputter::Inputter;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub const REQUIRED_MESSAGE: &str = "This field is required";
pub const EMAIL_MESSAGE: &str = "Enter a valid email address";
pub const NON_NEGATIVE_MESSAGE: &str = "Enter a valid non-negative number";
pub const TAKEN_MESSAGE: &str = "This value is already in use";

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(msg) => Some(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Email,
    NonNegative,
    MinLength(usize),
    /// Rejects values found in the list, compared case-insensitively.
    Unique(Vec<String>),
}

impl Rule {
    fn check(&self, value: &str) -> ValidationResult {
        let ok = match self {
            Rule::Required => !value.is_empty(),
            Rule::Email => EMAIL_PATTERN.is_match(value),
            Rule::NonNegative => value.parse::<f64>().is_ok_and(|n| n.is_finite() && n >= 0.0),
            Rule::MinLength(min) => value.chars().count() >= *min,
            Rule::Unique(taken) => !taken.iter().any(|t| t.eq_ignore_ascii_case(value)),
        };
        if ok {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(self.message())
        }
    }

    fn message(&self) -> String {
        match self {
            Rule::Required => REQUIRED_MESSAGE.to_string(),
            Rule::Email => EMAIL_MESSAGE.to_string(),
            Rule::NonNegative => NON_NEGATIVE_MESSAGE.to_string(),
            Rule::MinLength(min) => format!("Must be at least {min} characters"),
            Rule::Unique(_) => TAKEN_MESSAGE.to_string(),
        }
    }
}

/// Checks `value` against `rules`, reporting the first failing rule.
pub fn validate(value: &str, rules: &[Rule]) -> ValidationResult {
    let value = value.trim();
    if rules.contains(&Rule::Required) && value.is_empty() {
        return Rule::Required.check(value);
    }
    if value.is_empty() {
        return ValidationResult::Valid;
    }
    rules
        .iter()
        .map(|rule| rule.check(value))
        .find(|result| !result.is_valid())
        .unwrap_or(ValidationResult::Valid)
}

/// Untouched → Validating → {Valid, Invalid}; every edit or blur goes back to Validating.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldState {
    #[default]
    Untouched,
    Validating,
    Valid,
    Invalid(String),
}

pub struct Field {
    pub label: &'static str,
    pub input: Inputter,
    pub rules: Vec<Rule>,
    pub secret: bool,
    state: FieldState,
}

impl Field {
    pub fn new(label: &'static str, rules: Vec<Rule>) -> Self {
        Self {
            label,
            input: Inputter::default(),
            rules,
            secret: false,
            state: FieldState::Untouched,
        }
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn value(&self) -> String {
        self.input.get().input
    }

    pub fn set_value(&mut self, value: &str) {
        self.input.clear();
        self.input.set(value);
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub fn is_required(&self) -> bool {
        self.rules.contains(&Rule::Required)
    }

    /// Marks a value change or blur; the field stays `Validating` until resolved.
    pub fn touch(&mut self) {
        self.state = FieldState::Validating;
    }

    pub fn resolve(&mut self) -> bool {
        let result = validate(&self.value(), &self.rules);
        trace!("Field {} validated: {:?}", self.label, result);
        self.state = match result.error_message() {
            None => FieldState::Valid,
            Some(msg) => FieldState::Invalid(msg.to_string()),
        };
        result.is_valid()
    }

    pub fn check(&mut self) -> bool {
        self.touch();
        self.resolve()
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            FieldState::Invalid(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Validates every field (no short-circuit, so each one shows its state).
pub fn validate_form(fields: &mut [Field]) -> bool {
    fields.iter_mut().fold(true, |valid, field| field.check() && valid)
}
