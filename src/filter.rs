use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use tracing::trace;

use crate::record::{Dataset, FieldValue, ValueKind};
use crate::sort::probe_number;

/// Inclusive bounds on a numeric or date column. Dates are kept as days since CE.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Range {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, key: f64) -> bool {
        self.min.is_none_or(|min| key >= min) && self.max.is_none_or(|max| key <= max)
    }
}

/// Conjunction of optional criteria. An empty criterion never excludes a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub text: String,
    pub equals: BTreeMap<usize, String>,
    pub ranges: BTreeMap<usize, Range>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub rows: Vec<usize>,
    pub matched: usize,
    pub total: usize,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.equals.is_empty() && self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        *self = FilterCriteria::default();
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    /// `None` or a blank key removes the constraint.
    pub fn set_equals(&mut self, column: usize, key: Option<&str>) {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => {
                self.equals.insert(column, k.to_string());
            }
            None => {
                self.equals.remove(&column);
            }
        }
    }

    pub fn set_lower(&mut self, column: usize, min: Option<f64>) {
        let mut range = self.ranges.get(&column).copied().unwrap_or_default();
        range.min = min;
        self.store_range(column, range);
    }

    pub fn set_upper(&mut self, column: usize, max: Option<f64>) {
        let mut range = self.ranges.get(&column).copied().unwrap_or_default();
        range.max = max;
        self.store_range(column, range);
    }

    fn store_range(&mut self, column: usize, range: Range) {
        if range.is_empty() {
            self.ranges.remove(&column);
        } else {
            self.ranges.insert(column, range);
        }
    }

    pub fn matches(&self, dataset: &Dataset, row: usize) -> bool {
        self.matches_text(dataset, row)
            && self.equals.iter().all(|(&column, key)| {
                dataset
                    .value(row, column)
                    .as_category()
                    .is_some_and(|c| c.key.eq_ignore_ascii_case(key))
            })
            && self.ranges.iter().all(|(&column, range)| {
                range_key(dataset.value(row, column)).is_some_and(|key| range.contains(key))
            })
    }

    fn matches_text(&self, dataset: &Dataset, row: usize) -> bool {
        let needle = self.text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let any_searchable = dataset.columns.iter().any(|c| c.searchable);
        dataset
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.searchable || !any_searchable)
            .any(|(cidx, _)| dataset.value(row, cidx).render().to_lowercase().contains(&needle))
    }

    /// Short human readable description for the status line.
    pub fn summary(&self, dataset: &Dataset) -> String {
        let mut parts = Vec::new();
        if !self.text.trim().is_empty() {
            parts.push(format!("\"{}\"", self.text.trim()));
        }
        for (&column, key) in self.equals.iter() {
            if let Some(c) = dataset.columns.get(column) {
                parts.push(format!("{} = {}", c.title, c.category(key).render()));
            }
        }
        for (&column, range) in self.ranges.iter() {
            if let Some(c) = dataset.columns.get(column) {
                let show = |b: Option<f64>| b.map(|v| render_bound(c.kind, v)).unwrap_or_default();
                parts.push(format!("{} {}..{}", c.title, show(range.min), show(range.max)));
            }
        }
        parts.join(", ")
    }
}

/// Keeps the rows (in their given order) that satisfy every criterion.
pub fn filter(dataset: &Dataset, rows: &[usize], criteria: &FilterCriteria) -> FilterOutcome {
    let kept: Vec<usize> = if criteria.is_empty() {
        rows.to_vec()
    } else {
        rows.iter()
            .copied()
            .filter(|&row| criteria.matches(dataset, row))
            .collect()
    };
    trace!("Filter kept {} of {} rows", kept.len(), rows.len());
    FilterOutcome {
        matched: kept.len(),
        total: rows.len(),
        rows: kept,
    }
}

/// Comparable key of a value for range filtering.
pub fn range_key(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) | FieldValue::Currency(n) => Some(*n),
        FieldValue::Date(d) => Some(d.num_days_from_ce() as f64),
        _ => None,
    }
}

/// Parses user input for a bound. Blank or unparsable input yields `None`,
/// which disables the bound.
pub fn parse_bound(kind: ValueKind, input: &str) -> Option<f64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match kind {
        ValueKind::Date => NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(input, "%d.%m.%Y"))
            .ok()
            .map(|d| d.num_days_from_ce() as f64),
        ValueKind::Numeric | ValueKind::Currency => probe_number(input),
        ValueKind::Text | ValueKind::Enum => None,
    }
}

pub fn render_bound(kind: ValueKind, value: f64) -> String {
    match kind {
        ValueKind::Date => NaiveDate::from_num_days_from_ce_opt(value as i32)
            .map(|d| FieldValue::Date(d).render())
            .unwrap_or_default(),
        ValueKind::Currency => FieldValue::Currency(value).render(),
        _ => FieldValue::Number(value).render(),
    }
}
