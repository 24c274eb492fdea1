pub mod value;

use crate::error::{JournalError, Result};
use crate::journal::value::CellValue;
use crate::registry::validate_child_name;
use crate::store::{self, FileLock};
use chrono::{NaiveDateTime, Timelike};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DATE_COLUMN: &str = "Date/Time";
pub const CHILD_COLUMN: &str = "Child Name";
pub const FIXED_COLUMNS: [&str; 2] = [DATE_COLUMN, CHILD_COLUMN];
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Header prefix for cells found past the end of the stored header.
pub const PLACEHOLDER_COLUMN: &str = "Unlabeled column";

pub fn is_fixed_column(name: &str) -> bool {
    FIXED_COLUMNS.contains(&name.trim())
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.with_nanosecond(0)
        .unwrap_or(at)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalRow {
    pub recorded_at: String,
    pub child: String,
    pub values: BTreeMap<String, CellValue>,
}

impl JournalRow {
    pub fn value(&self, question: &str) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.values.get(question).unwrap_or(&EMPTY)
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.recorded_at.trim(), TIMESTAMP_FORMAT).ok()
    }
}

/// A point-in-time copy of the table. Holds no lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalSnapshot {
    pub header: Vec<String>,
    pub rows: Vec<JournalRow>,
}

impl JournalSnapshot {
    /// Header columns other than the fixed ones, in file order.
    pub fn question_columns(&self) -> impl Iterator<Item = &str> {
        self.header
            .iter()
            .map(String::as_str)
            .filter(|column| !is_fixed_column(column))
    }

    pub fn filtered(self, child: &str) -> Self {
        let child = child.trim();
        Self {
            header: self.header,
            rows: self
                .rows
                .into_iter()
                .filter(|row| row.child.trim() == child)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Placeholder columns were added on load for rows wider than the header.
    widened: bool,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    fn column_or_insert(&mut self, name: &str) -> usize {
        if let Some(index) = self.column(name) {
            return index;
        }

        self.header.push(name.to_string());
        self.rows.iter_mut().for_each(|row| row.push(String::new()));
        self.header.len() - 1
    }

    /// Appends missing columns in the given order. Returns whether any was added.
    fn ensure_columns<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let before = self.header.len();
        for name in names.into_iter().filter(|name| !name.trim().is_empty()) {
            self.column_or_insert(name);
        }
        self.header.len() != before
    }

    fn snapshot(&self) -> JournalSnapshot {
        let date_index = self.column(DATE_COLUMN);
        let child_index = self.column(CHILD_COLUMN);
        let cell = |row: &[String], index: Option<usize>| {
            index
                .and_then(|index| row.get(index))
                .cloned()
                .unwrap_or_default()
        };

        let rows = self
            .rows
            .iter()
            .map(|row| JournalRow {
                recorded_at: cell(row, date_index),
                child: cell(row, child_index),
                values: self
                    .header
                    .iter()
                    .zip(row.iter())
                    .filter(|(column, _)| !is_fixed_column(column))
                    .map(|(column, raw)| (column.clone(), CellValue::from_cell(raw)))
                    .collect(),
            })
            .collect();

        JournalSnapshot {
            header: self.header.clone(),
            rows,
        }
    }
}

/// The journal CSV: one row per (child, second-resolution timestamp).
#[derive(Debug, Clone)]
pub struct JournalTable {
    path: PathBuf,
}

impl JournalTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Makes the header a superset of the fixed columns and `questions`.
    ///
    /// Existing columns keep their position; new ones are appended with empty
    /// cells. The file is only rewritten when the header actually changes.
    pub fn ensure_schema<I, S>(&self, questions: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let questions = questions
            .into_iter()
            .map(|question| question.as_ref().to_string())
            .collect::<Vec<_>>();

        let _lock = FileLock::acquire(&self.path)?;
        let mut table = self.load_unlocked()?.unwrap_or_default();

        let fixed_added = table.ensure_columns(FIXED_COLUMNS);
        let questions_added = table.ensure_columns(
            questions
                .iter()
                .map(String::as_str)
                .filter(|question| !is_fixed_column(question)),
        );
        let changed = table.widened || fixed_added || questions_added;

        if changed {
            self.write_unlocked(&table)?;
            info!(
                path = %self.path.display(),
                columns = table.header.len(),
                "journal header updated"
            );
        }

        Ok(changed)
    }

    /// Merges one record by exact (child, timestamp) key.
    ///
    /// A matching row gets only the named cells overwritten; otherwise a new
    /// row is appended. Unknown answer columns are added to the header first.
    pub fn upsert_record(
        &self,
        child: &str,
        recorded_at: NaiveDateTime,
        answers: &[(String, CellValue)],
    ) -> Result<UpsertOutcome> {
        let child = validate_child_name(child)?;
        if let Some((question, _)) = answers
            .iter()
            .find(|(question, _)| is_fixed_column(question))
        {
            return Err(JournalError::SchemaConflict(question.clone()));
        }
        let timestamp = format_timestamp(recorded_at);

        let _lock = FileLock::acquire(&self.path)?;
        let mut table = self.load_unlocked()?.unwrap_or_default();
        table.ensure_columns(FIXED_COLUMNS);
        table.ensure_columns(answers.iter().map(|(question, _)| question.as_str()));

        let date_index = table.column_or_insert(DATE_COLUMN);
        let child_index = table.column_or_insert(CHILD_COLUMN);
        let answer_cells = answers
            .iter()
            .filter(|(question, _)| !question.trim().is_empty())
            .map(|(question, value)| (table.column_or_insert(question), value.to_cell()))
            .collect::<Vec<_>>();

        let existing = table
            .rows
            .iter_mut()
            .find(|row| row[date_index] == timestamp && row[child_index].trim() == child);

        let outcome = match existing {
            Some(row) => {
                for (index, cell) in answer_cells {
                    row[index] = cell;
                }
                UpsertOutcome::Updated
            }
            None => {
                let mut row = vec![String::new(); table.header.len()];
                row[date_index] = timestamp.clone();
                row[child_index] = child.clone();
                for (index, cell) in answer_cells {
                    row[index] = cell;
                }
                table.rows.push(row);
                UpsertOutcome::Inserted
            }
        };

        self.write_unlocked(&table)?;
        info!(child = %child, recorded_at = %timestamp, ?outcome, "journal record stored");

        Ok(outcome)
    }

    pub fn read_all(&self) -> Result<JournalSnapshot> {
        let _lock = FileLock::acquire(&self.path)?;
        let mut table = self.load_unlocked()?.unwrap_or_default();
        table.ensure_columns(FIXED_COLUMNS);

        Ok(table.snapshot())
    }

    pub fn read_for_child(&self, child: &str) -> Result<JournalSnapshot> {
        Ok(self.read_all()?.filtered(child))
    }

    fn load_unlocked(&self) -> Result<Option<Table>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let records = match reader.records().collect::<Result<Vec<StringRecord>, _>>() {
            Ok(records) => records,
            Err(error) => {
                store::quarantine(&self.path, &format!("journal CSV is malformed: {error}"));
                return Ok(None);
            }
        };

        let mut records = records.into_iter();
        let Some(header) = records.next() else {
            return Ok(None);
        };
        let mut header = header.iter().map(ToOwned::to_owned).collect::<Vec<_>>();
        let mut rows = records
            .map(|record| record.iter().map(ToOwned::to_owned).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let width = rows.iter().map(Vec::len).max().unwrap_or_default();
        let widened = width > header.len();
        if widened {
            let added = width - header.len();
            let mut placeholder = 0;
            while header.len() < width {
                placeholder += 1;
                let name = format!("{PLACEHOLDER_COLUMN} {placeholder}");
                if !header.contains(&name) {
                    header.push(name);
                }
            }
            warn!(
                path = %self.path.display(),
                added,
                "journal rows have more cells than the header; placeholder columns added"
            );
        }

        for row in &mut rows {
            row.resize(header.len(), String::new());
        }

        Ok(Some(Table {
            header,
            rows,
            widened,
        }))
    }

    fn write_unlocked(&self, table: &Table) -> Result<()> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&table.header)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }

        let content = writer
            .into_inner()
            .map_err(|error| JournalError::Io(error.into_error()))?;
        store::write_atomic(&self.path, &content)
    }
}
