use std::cmp::Ordering;

use tracing::trace;

use crate::record::{Comparator, Dataset, FieldValue, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Header decoration of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortIndicator {
    Unsorted,
    Ascending,
    Descending,
}

impl SortIndicator {
    pub fn symbol(self) -> &'static str {
        match self {
            SortIndicator::Unsorted => "⇅",
            SortIndicator::Ascending => "▲",
            SortIndicator::Descending => "▼",
        }
    }
}

/// Active sort column, `None` meaning insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<usize>,
    pub direction: SortDirection,
}

impl SortState {
    /// Header activation: same column flips the direction, a new column starts ascending.
    pub fn activate(&mut self, column: usize) {
        if self.column == Some(column) {
            self.direction = self.direction.toggled();
        } else {
            self.column = Some(column);
            self.direction = SortDirection::Ascending;
        }
    }

    pub fn clear(&mut self) {
        *self = SortState::default();
    }

    pub fn indicator(&self, column: usize) -> SortIndicator {
        match (self.column, self.direction) {
            (Some(c), SortDirection::Ascending) if c == column => SortIndicator::Ascending,
            (Some(c), SortDirection::Descending) if c == column => SortIndicator::Descending,
            _ => SortIndicator::Unsorted,
        }
    }
}

/// Orders `rows` (indices into the dataset) by `column`.
///
/// The sort is stable in both directions: rows comparing equal keep the order
/// they have in `rows`. An unknown column leaves the order untouched.
pub fn sort(dataset: &Dataset, rows: &[usize], column: usize, direction: SortDirection) -> Vec<usize> {
    let Some(descriptor) = dataset.columns.get(column) else {
        trace!("Sort on unknown column {column}, keeping order");
        return rows.to_vec();
    };

    let mut indexed_rows: Vec<(usize, &FieldValue)> = rows
        .iter()
        .map(|&row_idx| (row_idx, dataset.value(row_idx, column)))
        .collect();

    // Reversing the comparator instead of the output keeps ties in input order.
    match direction {
        SortDirection::Ascending => indexed_rows.sort_by(|(_, a), (_, b)| descriptor.compare(a, b)),
        SortDirection::Descending => indexed_rows.sort_by(|(_, a), (_, b)| descriptor.compare(b, a)),
    }

    indexed_rows.into_iter().map(|(i, _)| i).collect()
}

pub fn comparator_for(kind: ValueKind) -> Comparator {
    match kind {
        ValueKind::Text => compare_text,
        ValueKind::Numeric | ValueKind::Currency => compare_numeric,
        ValueKind::Date => compare_date,
        ValueKind::Enum => compare_enum,
    }
}

/// Numeric value of a rendered cell once formatting characters are stripped.
/// `"$15,250.00"` becomes `15250.0`, `"#003"` becomes `3`.
pub fn probe_number(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<f64>().ok()
}

/// Case-insensitive ordering that places `ё` with `е`, falling back to a
/// case-sensitive comparison for otherwise equal strings.
pub fn collate(a: &str, b: &str) -> Ordering {
    fn primary(s: &str) -> impl Iterator<Item = char> + '_ {
        s.chars()
            .flat_map(char::to_lowercase)
            .map(|c| if c == 'ё' { 'е' } else { c })
    }
    primary(a)
        .cmp(primary(b))
        .then_with(|| a.chars().flat_map(char::to_lowercase).cmp(b.chars().flat_map(char::to_lowercase)))
        .then_with(|| a.cmp(b))
}

// Values that parse as numbers sort before the ones that don't, keeping the
// comparison a total order on mixed columns.
fn compare_text(a: &FieldValue, b: &FieldValue) -> Ordering {
    let (a, b) = (a.render(), b.render());
    match (probe_number(&a), probe_number(&b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| collate(&a, &b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => collate(&a, &b),
    }
}

fn compare_numeric(a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_text(a, b),
    }
}

fn compare_date(a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a.as_date(), b.as_date()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_text(a, b),
    }
}

fn compare_enum(a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a.as_category(), b.as_category()) {
        (Some(x), Some(y)) => x.rank.cmp(&y.rank).then_with(|| collate(&x.key, &y.key)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_text(a, b),
    }
}
