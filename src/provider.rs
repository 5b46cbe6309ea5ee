use chrono::NaiveDate;
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::domain::TVCError;
use crate::record::{Category, Column, Dataset, FieldValue, Record, RecordId, ValueKind};
use crate::sort::probe_number;

/// Enum detection: at most this many distinct values ...
const ENUM_MAX_DISTINCT: usize = 8;
/// ... each appearing on average at least this often.
const ENUM_MIN_REPEAT: usize = 2;

const CURRENCY_HINTS: [&str; 6] = ["balance", "amount", "profit", "price", "deposit", "withdraw"];

/// Source of the records shown by the table. Called once at start-up.
pub trait DataProvider {
    fn load(&self) -> Result<Dataset, TVCError>;
}

pub struct SampleTraders;

pub struct SampleOperations;

pub struct FileProvider {
    path: PathBuf,
}

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

struct RawColumn {
    idx: usize,
    name: String,
    data: Vec<Option<String>>,
    dtype: DataType,
}

fn level_choices() -> Vec<Category> {
    vec![
        Category::new("beginner", "Beginner", 0),
        Category::new("intermediate", "Intermediate", 1),
        Category::new("advanced", "Advanced", 2),
        Category::new("expert", "Expert", 3),
    ]
}

fn trader_status_choices() -> Vec<Category> {
    vec![
        Category::new("active", "Active", 0),
        Category::new("inactive", "Inactive", 1),
        Category::new("suspended", "Suspended", 2),
    ]
}

fn date(s: &str) -> FieldValue {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(FieldValue::Date)
        .unwrap_or(FieldValue::Missing)
}

impl DataProvider for SampleTraders {
    fn load(&self) -> Result<Dataset, TVCError> {
        let columns = vec![
            Column::new("id", "ID", ValueKind::Text),
            Column::new("name", "Name", ValueKind::Text).searchable(),
            Column::new("username", "Username", ValueKind::Text).searchable(),
            Column::new("email", "Email", ValueKind::Text).searchable(),
            Column::new("level", "Level", ValueKind::Enum).with_choices(level_choices()),
            Column::new("balance", "Balance", ValueKind::Currency),
            Column::new("status", "Status", ValueKind::Enum).with_choices(trader_status_choices()),
            Column::new("registration", "Registered", ValueKind::Date),
            Column::new("profit", "Profit", ValueKind::Currency).hidden(),
            Column::new("trades", "Trades", ValueKind::Numeric).hidden(),
            Column::new("success_rate", "Success %", ValueKind::Numeric).hidden(),
        ];

        let rows = [
            (1, "Иван Петров", "ivan_trader", "ivan@example.com", "expert", 15250.00, "active", "2024-01-15", 2450.00, 156, 89),
            (2, "Мария Сидорова", "maria_crypto", "maria@example.com", "intermediate", 8750.50, "active", "2024-01-14", 1200.00, 89, 76),
            (3, "Алексей Козлов", "alex_trading", "alex@example.com", "advanced", 22100.00, "inactive", "2024-01-13", 3200.00, 234, 82),
            (4, "Елена Волкова", "elena_crypto", "elena@example.com", "beginner", 1500.00, "active", "2024-01-12", 150.00, 23, 65),
            (5, "Дмитрий Новиков", "dmitry_trader", "dmitry@example.com", "expert", 45000.00, "active", "2024-01-11", 8900.00, 445, 92),
        ];

        let records = rows
            .iter()
            .map(
                |&(id, name, username, email, level, balance, status, registered, profit, trades, success)| {
                    let id = RecordId(id);
                    Record {
                        id,
                        values: vec![
                            FieldValue::text(id.to_string()),
                            FieldValue::text(name),
                            FieldValue::text(username),
                            FieldValue::text(email),
                            columns[4].category(level),
                            FieldValue::Currency(balance),
                            columns[6].category(status),
                            date(registered),
                            FieldValue::Currency(profit),
                            FieldValue::Number(trades as f64),
                            FieldValue::Number(success as f64),
                        ],
                    }
                },
            )
            .collect();

        Ok(Dataset::new("Traders", "traders", columns, records))
    }
}

impl DataProvider for SampleOperations {
    fn load(&self) -> Result<Dataset, TVCError> {
        let columns = vec![
            Column::new("id", "ID", ValueKind::Text),
            Column::new("trader", "Trader", ValueKind::Text).searchable(),
            Column::new("type", "Type", ValueKind::Text).searchable(),
            Column::new("amount", "Amount", ValueKind::Currency),
            Column::new("status", "Status", ValueKind::Enum).with_choices(vec![
                Category::new("success", "Completed", 0),
                Category::new("warning", "In progress", 1),
            ]),
            Column::new("date", "Date", ValueKind::Date),
        ];

        let rows = [
            (1, "Иван Петров", "Покупка BTC", 1250.00, "success", "2024-01-15"),
            (2, "Мария Сидорова", "Продажа ETH", 2100.00, "warning", "2024-01-15"),
            (3, "Алексей Козлов", "Покупка BNB", 850.00, "success", "2024-01-14"),
            (4, "Дмитрий Новиков", "Продажа BTC", 5400.00, "success", "2024-01-14"),
            (5, "Елена Волкова", "Покупка ETH", 300.00, "warning", "2024-01-13"),
        ];

        let records = rows
            .iter()
            .map(|&(id, trader, kind, amount, status, day)| {
                let id = RecordId(id);
                Record {
                    id,
                    values: vec![
                        FieldValue::text(id.to_string()),
                        FieldValue::text(trader),
                        FieldValue::text(kind),
                        FieldValue::Currency(amount),
                        columns[4].category(status),
                        date(day),
                    ],
                }
            })
            .collect();

        Ok(Dataset::new("Operations", "operations", columns, records))
    }
}

impl FileProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn get_file_info(path: &Path) -> Result<FileInfo, TVCError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TVCError::FileNotFound,
            ErrorKind::PermissionDenied => TVCError::PermissionDenied,
            _ => TVCError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(TVCError::LoadingFailed("Not a file!".into()));
        }

        Ok(FileInfo {
            path: path.to_path_buf(),
            file_size: metadata.len(),
            file_type: Self::detect_file_type(path)?,
        })
    }

    fn detect_file_type(path: &Path) -> Result<FileType, TVCError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(TVCError::UnknownFileType),
        }
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }

    fn load_column(df: &DataFrame, idx: usize, col_name: &str) -> Result<RawColumn, PolarsError> {
        let dtype = df.column(col_name)?.dtype().clone();
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let data = col
            .str()?
            .into_iter()
            .map(|value| value.map(|s| s.replace("\r\n", " ↵ ").replace('\n', " ↵ ")))
            .collect();

        Ok(RawColumn {
            idx,
            name: col_name.to_string(),
            data,
            dtype,
        })
    }
}

impl DataProvider for FileProvider {
    fn load(&self) -> Result<Dataset, TVCError> {
        let file_info = Self::get_file_info(&self.path)?;
        debug!("Loading {:?}", file_info);
        let frame = match file_info.file_type {
            FileType::CSV => Self::load_csv(&file_info.path)?,
            FileType::PARQUET => Self::load_parquet(&file_info.path)?,
            FileType::ARROW => Self::load_arrow(&file_info.path)?,
        };

        let start_time = Instant::now();

        // Each column is converted in its own rayon task.
        let df = Arc::new(frame.collect()?);
        let raw: Result<Vec<RawColumn>, _> = df
            .get_column_names()
            .par_iter()
            .enumerate()
            .map(|(idx, name)| Self::load_column(&df, idx, name))
            .collect();
        let raw = raw?;
        if raw.is_empty() {
            return Err(TVCError::EmptyDataset);
        }

        let typed: Vec<(Column, Vec<FieldValue>)> = raw.par_iter().map(infer_column).collect();
        let dataset = assemble(&file_info.path, typed);

        info!(
            "Loading {} rows from {} bytes took {}ms ...",
            dataset.len(),
            file_info.file_size,
            start_time.elapsed().as_millis()
        );
        for c in dataset.columns.iter() {
            debug!("Column: {c:?}");
        }
        Ok(dataset)
    }
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolves the value kind of a loaded column and converts its cells.
fn infer_column(raw: &RawColumn) -> (Column, Vec<FieldValue>) {
    let present: Vec<&str> = raw.data.iter().flatten().map(String::as_str).collect();
    let lower_name = raw.name.to_lowercase();
    let currency_hint = CURRENCY_HINTS.iter().any(|h| lower_name.contains(h));

    let kind = if is_numeric_type(&raw.dtype) {
        if currency_hint { ValueKind::Currency } else { ValueKind::Numeric }
    } else if raw.dtype == DataType::Date {
        ValueKind::Date
    } else if !present.is_empty() && present.iter().all(|s| parse_date(s).is_some()) {
        ValueKind::Date
    } else if !present.is_empty() && present.iter().all(|s| probe_number(s).is_some()) {
        if currency_hint || present.iter().any(|s| s.contains('$')) {
            ValueKind::Currency
        } else {
            ValueKind::Numeric
        }
    } else {
        let distinct: HashSet<&str> = present.iter().copied().collect();
        if !distinct.is_empty()
            && distinct.len() <= ENUM_MAX_DISTINCT
            && distinct.len() * ENUM_MIN_REPEAT <= present.len()
        {
            ValueKind::Enum
        } else {
            ValueKind::Text
        }
    };
    trace!("Column {} \"{}\" ({:?}) resolved as {:?}", raw.idx, raw.name, raw.dtype, kind);

    let mut column = Column::new(&raw.name, &raw.name, kind);
    if kind == ValueKind::Enum {
        let mut choices: Vec<Category> = Vec::new();
        for value in present.iter() {
            if !choices.iter().any(|c| c.key == *value) {
                choices.push(Category::new(value, &capitalize(value), choices.len()));
            }
        }
        column = column.with_choices(choices);
    }

    let values = raw
        .data
        .iter()
        .map(|cell| match cell.as_deref() {
            None => FieldValue::Missing,
            Some(s) => match kind {
                ValueKind::Text => FieldValue::text(s),
                ValueKind::Numeric => probe_number(s).map(FieldValue::Number).unwrap_or(FieldValue::Missing),
                ValueKind::Currency => probe_number(s).map(FieldValue::Currency).unwrap_or(FieldValue::Missing),
                ValueKind::Date => parse_date(s).map(FieldValue::Date).unwrap_or(FieldValue::Missing),
                ValueKind::Enum => column.category(s),
            },
        })
        .collect();

    (column, values)
}

fn assemble(path: &Path, typed: Vec<(Column, Vec<FieldValue>)>) -> Dataset {
    let nrows = typed.first().map(|(_, v)| v.len()).unwrap_or(0);
    let (mut columns, mut data): (Vec<Column>, Vec<Vec<FieldValue>>) = typed.into_iter().unzip();

    let is_search_candidate = |c: &Column| {
        let name = c.name.to_lowercase();
        c.kind == ValueKind::Text && (name.contains("name") || name.contains("email"))
    };
    let any_candidate = columns.iter().any(is_search_candidate);
    for column in columns.iter_mut() {
        column.searchable = if any_candidate {
            is_search_candidate(column)
        } else {
            column.kind == ValueKind::Text
        };
    }

    let id_column = columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case("id") && c.kind == ValueKind::Numeric);

    let mut records = Vec::with_capacity(nrows);
    let mut seen = HashSet::new();
    for row in 0..nrows {
        let values: Vec<FieldValue> = data
            .iter_mut()
            .map(|col| std::mem::replace(&mut col[row], FieldValue::Missing))
            .collect();
        let mut id = id_column
            .and_then(|c| values[c].as_number())
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
            .map(|n| RecordId(n as u32))
            .unwrap_or(RecordId(row as u32 + 1));
        // Duplicate ids would break selection, take the highest free one instead.
        let mut fallback = u32::MAX;
        while !seen.insert(id) {
            id = RecordId(fallback);
            fallback = fallback.saturating_sub(1);
        }
        records.push(Record { id, values });
    }

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    Dataset::new(&name, "rows", columns, records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, dtype: DataType, cells: &[Option<&str>]) -> RawColumn {
        RawColumn {
            idx: 0,
            name: name.to_string(),
            data: cells.iter().map(|c| c.map(str::to_string)).collect(),
            dtype,
        }
    }

    #[test]
    fn sample_traders_match_the_back_office_fixture() {
        let dataset = SampleTraders.load().unwrap();
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.named_value(1, "balance"), &FieldValue::Currency(8750.5));
        assert_eq!(dataset.named_value(0, "level").render(), "Expert");
        assert_eq!(dataset.named_value(0, "registration").render(), "15.01.2024");
        assert_eq!(dataset.named_value(2, "id").render(), "#003");
        let searchable: Vec<&str> = dataset
            .columns
            .iter()
            .filter(|c| c.searchable)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(searchable, vec!["name", "username", "email"]);
    }

    #[test]
    fn sample_operations_resolve_their_statuses() {
        let dataset = SampleOperations.load().unwrap();
        assert_eq!(dataset.named_value(1, "status").render(), "In progress");
        assert_eq!(dataset.named_value(0, "amount").render(), "$1,250.00");
    }

    #[test]
    fn file_types_come_from_the_extension() {
        assert!(matches!(
            FileProvider::detect_file_type(Path::new("a/b.CSV")),
            Ok(FileType::CSV)
        ));
        assert!(matches!(
            FileProvider::detect_file_type(Path::new("b.pq")),
            Ok(FileType::PARQUET)
        ));
        assert!(matches!(
            FileProvider::detect_file_type(Path::new("b.xlsx")),
            Err(TVCError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let result = FileProvider::new(PathBuf::from("/nonexistent/traders.csv")).load();
        assert!(matches!(result, Err(TVCError::FileNotFound)));
    }

    #[test]
    fn column_kinds_are_inferred_once() {
        let (c, v) = infer_column(&raw("balance", DataType::Float64, &[Some("1.5"), None]));
        assert_eq!(c.kind, ValueKind::Currency);
        assert_eq!(v, vec![FieldValue::Currency(1.5), FieldValue::Missing]);

        let (c, _) = infer_column(&raw("joined", DataType::String, &[Some("2024-01-15"), Some("2024-02-01")]));
        assert_eq!(c.kind, ValueKind::Date);

        let (c, _) = infer_column(&raw("amount", DataType::String, &[Some("$1,250.00"), Some("$850.00")]));
        assert_eq!(c.kind, ValueKind::Currency);

        let (c, v) = infer_column(&raw(
            "status",
            DataType::String,
            &[Some("active"), Some("inactive"), Some("active"), Some("active")],
        ));
        assert_eq!(c.kind, ValueKind::Enum);
        assert_eq!(c.choices.len(), 2);
        assert_eq!(v[1].render(), "Inactive");

        let (c, _) = infer_column(&raw("name", DataType::String, &[Some("Ann"), Some("Bob")]));
        assert_eq!(c.kind, ValueKind::Text);
    }

    #[test]
    fn assembled_dataset_uses_id_column_and_search_candidates() {
        let typed = vec![
            infer_column(&raw("id", DataType::Int64, &[Some("7"), Some("9")])),
            infer_column(&raw("name", DataType::String, &[Some("Ann"), Some("Bob")])),
            infer_column(&raw("note", DataType::String, &[Some("first"), Some("second")])),
        ];
        let dataset = assemble(Path::new("/tmp/people.csv"), typed);
        assert_eq!(dataset.name, "people.csv");
        assert_eq!(dataset.records[0].id, RecordId(7));
        assert_eq!(dataset.records[1].id, RecordId(9));
        assert!(dataset.columns[1].searchable);
        assert!(!dataset.columns[2].searchable);
    }

    #[test]
    fn duplicate_ids_get_unique_replacements() {
        let max = u32::MAX.to_string();
        let below = (u32::MAX - 1).to_string();
        let typed = vec![infer_column(&raw(
            "id",
            DataType::Int64,
            &[Some(&below), Some(&max), Some(&below), Some("3"), Some("3")],
        ))];
        let dataset = assemble(Path::new("/tmp/dupes.csv"), typed);
        let ids: Vec<RecordId> = dataset.records.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                RecordId(u32::MAX - 1),
                RecordId(u32::MAX),
                RecordId(u32::MAX - 2),
                RecordId(3),
                RecordId(u32::MAX - 3),
            ]
        );
    }
}
