use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;

use crate::sort;

pub const MISSING_VALUE: &str = "∅";
pub const DATE_FORMAT: &str = "%d.%m.%Y";

static MISSING: FieldValue = FieldValue::Missing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u32);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:03}", self.0)
    }
}

/// Value kind of a column. Decides how the column is compared and filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Numeric,
    Currency,
    Date,
    Enum,
}

impl ValueKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Numeric | ValueKind::Currency)
    }

    /// Kinds that accept lower/upper bounds in a filter.
    pub fn is_ranged(self) -> bool {
        matches!(self, ValueKind::Numeric | ValueKind::Currency | ValueKind::Date)
    }
}

/// One member of an enumerated column, e.g. the trader level `expert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub key: String,
    pub label: String,
    pub rank: usize,
}

impl Category {
    pub fn new(key: &str, label: &str, rank: usize) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Currency(f64),
    Date(NaiveDate),
    Category(Category),
    Missing,
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    /// Rendered representation as shown in the table.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Currency(n) => format_currency(*n),
            FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            FieldValue::Category(c) => c.label.clone(),
            FieldValue::Missing => MISSING_VALUE.to_string(),
        }
    }

    /// Raw representation used for exports and edit forms.
    pub fn raw(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) | FieldValue::Currency(n) => format_number(*n),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Category(c) => c.key.clone(),
            FieldValue::Missing => String::new(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) | FieldValue::Currency(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&Category> {
        match self {
            FieldValue::Category(c) => Some(c),
            _ => None,
        }
    }
}

/// Comparator resolved from a column's value kind.
pub type Comparator = fn(&FieldValue, &FieldValue) -> Ordering;

pub struct Column {
    pub name: String,
    pub title: String,
    pub kind: ValueKind,
    pub searchable: bool,
    pub visible: bool,
    pub choices: Vec<Category>,
    pub max_width: usize,
    compare: Comparator,
}

impl Column {
    pub fn new(name: &str, title: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            kind,
            searchable: false,
            visible: true,
            choices: Vec::new(),
            max_width: title.chars().count(),
            compare: sort::comparator_for(kind),
        }
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_choices(mut self, choices: Vec<Category>) -> Self {
        self.choices = choices;
        self
    }

    pub fn compare(&self, a: &FieldValue, b: &FieldValue) -> Ordering {
        (self.compare)(a, b)
    }

    pub fn category(&self, key: &str) -> FieldValue {
        self.choices
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
            .cloned()
            .map(FieldValue::Category)
            .unwrap_or(FieldValue::Missing)
    }

    /// Choice following `current` in rank order, wrapping to `None` after the last.
    pub fn next_choice(&self, current: Option<&str>) -> Option<&Category> {
        match current {
            None => self.choices.first(),
            Some(key) => {
                let pos = self
                    .choices
                    .iter()
                    .position(|c| c.key.eq_ignore_ascii_case(key))?;
                self.choices.get(pos + 1)
            }
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" ({}), {:?}, searchable: {}, visible: {}, width_max: {}",
            self.name, self.title, self.kind, self.searchable, self.visible, self.max_width
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub values: Vec<FieldValue>,
}

#[derive(Debug)]
pub struct Dataset {
    pub name: String,
    pub entity: String,
    pub columns: Vec<Column>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(name: &str, entity: &str, columns: Vec<Column>, records: Vec<Record>) -> Self {
        let mut dataset = Self {
            name: name.to_string(),
            entity: entity.to_string(),
            columns,
            records,
        };
        dataset.measure_columns();
        dataset
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn value(&self, row: usize, column: usize) -> &FieldValue {
        self.records
            .get(row)
            .and_then(|r| r.values.get(column))
            .unwrap_or(&MISSING)
    }

    pub fn named_value(&self, row: usize, name: &str) -> &FieldValue {
        match self.column_index(name) {
            Some(column) => self.value(row, column),
            None => &MISSING,
        }
    }

    fn measure_columns(&mut self) {
        for (cidx, column) in self.columns.iter_mut().enumerate() {
            let widest = self
                .records
                .iter()
                .filter_map(|r| r.values.get(cidx))
                .map(|v| v.render().chars().count())
                .max()
                .unwrap_or(0);
            column.max_width = std::cmp::max(column.title.chars().count(), widest);
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        let s = format!("{n:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Formats an amount as `$15,250.00`.
pub fn format_currency(n: f64) -> String {
    let fixed = format!("{:.2}", n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if n < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_is_grouped_by_thousands() {
        assert_eq!(format_currency(15250.0), "$15,250.00");
        assert_eq!(format_currency(8750.5), "$8,750.50");
        assert_eq!(format_currency(450.0), "$450.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(-1200.0), "-$1,200.00");
    }

    #[test]
    fn numbers_drop_needless_decimals() {
        assert_eq!(format_number(156.0), "156");
        assert_eq!(format_number(8750.5), "8750.5");
        assert_eq!(format_number(0.126), "0.13");
    }

    #[test]
    fn record_ids_are_zero_padded() {
        assert_eq!(RecordId(1).to_string(), "#001");
        assert_eq!(RecordId(1234).to_string(), "#1234");
    }

    #[test]
    fn next_choice_walks_ranks_and_wraps_to_none() {
        let column = Column::new("level", "Level", ValueKind::Enum).with_choices(vec![
            Category::new("beginner", "Beginner", 0),
            Category::new("expert", "Expert", 1),
        ]);
        assert_eq!(column.next_choice(None).map(|c| c.key.as_str()), Some("beginner"));
        assert_eq!(
            column.next_choice(Some("beginner")).map(|c| c.key.as_str()),
            Some("expert")
        );
        assert_eq!(column.next_choice(Some("expert")), None);
        assert_eq!(column.category("EXPERT").render(), "Expert");
        assert_eq!(column.category("unknown"), FieldValue::Missing);
    }
}
