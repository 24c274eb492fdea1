use crate::config::Config;
use crate::error::{JournalError, Result};
use crate::journal::value::{self, CellValue};
use crate::journal::{JournalSnapshot, JournalTable, UpsertOutcome, format_timestamp};
use crate::registry::QuestionRegistry;
use crate::registry::question::{Question, QuestionKind};
use crate::report::{self, TrendReport};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct StoredAnswer {
    pub field: String,
    pub question: String,
    pub kind: QuestionKind,
    pub value: CellValue,
}

/// A raw answer that was discarded during coercion.
#[derive(Debug, Clone, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub question: String,
    pub raw: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub child: String,
    pub recorded_at: String,
    pub outcome: UpsertOutcome,
    pub answers: Vec<StoredAnswer>,
    pub issues: Vec<FieldIssue>,
}

/// Form field name for the question at `index` (`q0`, `q1`, ...).
pub fn field_name(index: usize) -> String {
    format!("q{index}")
}

pub struct JournalService {
    registry: QuestionRegistry,
    table: JournalTable,
}

impl JournalService {
    pub fn new(registry: QuestionRegistry, table: JournalTable) -> Self {
        Self { registry, table }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            QuestionRegistry::new(&config.registry_path),
            JournalTable::new(&config.journal_path),
        )
    }

    pub fn registry(&self) -> &QuestionRegistry {
        &self.registry
    }

    pub fn table(&self) -> &JournalTable {
        &self.table
    }

    /// Creates missing backing files and brings the journal header up to date.
    pub fn bootstrap(&self) -> Result<()> {
        self.registry.ensure_exists()?;
        self.sync_schema()?;
        Ok(())
    }

    pub fn sync_schema(&self) -> Result<bool> {
        let questions = self.registry.all_questions()?;
        self.table
            .ensure_schema(questions.iter().map(|question| question.text.as_str()))
    }

    pub fn list_children(&self) -> Result<Vec<String>> {
        self.registry.get_children()
    }

    pub fn child_questions(&self, child: &str) -> Result<Vec<Question>> {
        self.registry.get_questions(child)
    }

    pub fn add_child(&self, name: &str) -> Result<String> {
        self.registry.add_child(name)
    }

    pub fn set_questions(
        &self,
        child: &str,
        predefined: &[String],
        custom: &[Question],
    ) -> Result<Vec<Question>> {
        let questions = self.registry.set_questions(child, predefined, custom)?;
        self.sync_schema()?;
        Ok(questions)
    }

    /// Stores one set of answers for `child`, keyed by `at` (second precision).
    ///
    /// `form` maps `q0`, `q1`, ... to raw values for the child's questions in
    /// registry order. Values that fail their question's rules are stored as
    /// empty and reported in `issues`; they never fail the submission.
    pub fn submit(
        &self,
        child: &str,
        form: &HashMap<String, String>,
        at: NaiveDateTime,
    ) -> Result<Submission> {
        let child = crate::registry::validate_child_name(child)?;
        if !self.registry.contains(&child)? {
            return Err(JournalError::UnknownChild(child));
        }

        let questions = self.registry.get_questions(&child)?;
        let mut answers = Vec::with_capacity(questions.len());
        let mut issues = Vec::new();

        for (index, question) in questions.iter().enumerate() {
            let field = field_name(index);
            let raw = form.get(&field).map(String::as_str).unwrap_or_default();

            let value = value::coerce(question.kind, raw).unwrap_or_else(|error| {
                warn!(
                    child = %child,
                    field = %field,
                    kind = %question.kind,
                    error = %error,
                    "answer discarded"
                );
                issues.push(FieldIssue {
                    field: field.clone(),
                    question: question.text.clone(),
                    raw: raw.to_string(),
                    reason: error.to_string(),
                });
                CellValue::Empty
            });

            answers.push(StoredAnswer {
                field,
                question: question.text.clone(),
                kind: question.kind,
                value,
            });
        }

        self.sync_schema()?;

        let cells = answers
            .iter()
            .map(|answer| (answer.question.clone(), answer.value.clone()))
            .collect::<Vec<_>>();
        let outcome = self.table.upsert_record(&child, at, &cells)?;

        info!(
            child = %child,
            answers = answers.len(),
            discarded = issues.len(),
            "submission saved"
        );

        Ok(Submission {
            child,
            recorded_at: format_timestamp(at),
            outcome,
            answers,
            issues,
        })
    }

    pub fn snapshot(&self, child: Option<&str>) -> Result<JournalSnapshot> {
        match child.map(str::trim).filter(|child| !child.is_empty()) {
            Some(child) => self.table.read_for_child(child),
            None => self.table.read_all(),
        }
    }

    /// Per-day aggregates for one child (its registered questions) or for
    /// everyone (every question column). Read failures degrade to `NoData`.
    pub fn trends(&self, child: Option<&str>) -> TrendReport {
        let child = child.map(str::trim).filter(|child| !child.is_empty());

        let snapshot = match self.snapshot(child) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(error = %error, "journal unreadable; reporting no data");
                return TrendReport::NoData;
            }
        };

        let registered = child
            .map(|child| {
                self.registry.get_questions(child).unwrap_or_else(|error| {
                    warn!(error = %error, child, "registry unreadable; charting every column");
                    Vec::new()
                })
            })
            .unwrap_or_default();

        let questions = if registered.is_empty() {
            snapshot
                .question_columns()
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>()
        } else {
            registered
                .into_iter()
                .map(|question| question.text)
                .collect::<Vec<_>>()
        };

        report::build_trends(&snapshot, &questions)
    }
}

#[cfg(test)]
mod tests {
    use super::JournalService;
    use crate::error::JournalError;
    use crate::journal::value::CellValue;
    use crate::journal::{JournalTable, UpsertOutcome};
    use crate::registry::QuestionRegistry;
    use crate::registry::question::Question;
    use crate::report::TrendReport;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::HashMap;
    use std::fs;

    const MELTDOWNS: &str = "How many meltdowns did your child have today?";
    const MOOD: &str = "On a scale of 1–5, how stable was your child’s mood today?";
    const PROPERTY: &str = "Did any meltdowns involve damaging property?";

    fn service() -> (tempfile::TempDir, JournalService) {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = JournalService::new(
            QuestionRegistry::new(dir.path().join("child_questions.json")),
            JournalTable::new(dir.path().join("child_journal.csv")),
        );
        (dir, service)
    }

    fn at(day: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|date| date.and_hms_opt(19, 30, second))
            .expect("valid timestamp")
    }

    fn form(values: &[(&str, &str)]) -> HashMap<String, String> {
        values
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn out_of_range_rating_is_stored_as_unset() {
        let (_dir, service) = service();
        service.add_child("Alex").expect("add");
        service
            .set_questions("Alex", &[], &[Question::new(MELTDOWNS), Question::new(MOOD)])
            .expect("questions");

        let submission = service
            .submit("Alex", &form(&[("q0", "3"), ("q1", "7")]), at(9, 0))
            .expect("submit");

        assert_eq!(submission.outcome, UpsertOutcome::Inserted);
        assert_eq!(submission.answers[0].value, CellValue::Text("3".to_string()));
        assert_eq!(submission.answers[1].value, CellValue::Empty);
        assert_eq!(submission.issues.len(), 1);
        assert_eq!(submission.issues[0].field, "q1");

        let snapshot = service.snapshot(Some("Alex")).expect("snapshot");
        assert_eq!(snapshot.rows[0].value(MELTDOWNS), &CellValue::Integer(3));
        assert_eq!(snapshot.rows[0].value(MOOD), &CellValue::Empty);

        let csv = fs::read_to_string(service.table().path()).expect("read csv");
        assert!(csv.lines().nth(1).expect("data row").ends_with(",3,"));
    }

    #[test]
    fn free_text_answers_read_back_unchanged() {
        let (_dir, service) = service();
        let wake = "What time did your child wake up?";
        service
            .set_questions("Alex", &[], &[Question::new(wake)])
            .expect("questions");

        service
            .submit("Alex", &form(&[("q0", "0700")]), at(9, 0))
            .expect("submit");

        let snapshot = service.snapshot(Some("Alex")).expect("snapshot");
        assert_eq!(
            snapshot.rows[0].value(wake),
            &CellValue::Text("0700".to_string())
        );
        assert_eq!(service.trends(Some("Alex")), TrendReport::Ready(Vec::new()));
    }

    #[test]
    fn yes_no_answers_accept_only_digits() {
        let (_dir, service) = service();
        service
            .set_questions("Alex", &[], &[Question::new(PROPERTY)])
            .expect("questions");

        let rejected = service
            .submit("Alex", &form(&[("q0", "yes")]), at(9, 0))
            .expect("submit yes");
        let accepted = service
            .submit("Alex", &form(&[("q0", "1")]), at(9, 1))
            .expect("submit 1");

        assert_eq!(rejected.answers[0].value, CellValue::Empty);
        assert_eq!(accepted.answers[0].value, CellValue::Integer(1));
    }

    #[test]
    fn submit_rejects_unknown_and_blank_children() {
        let (_dir, service) = service();

        assert!(matches!(
            service.submit("Nobody", &HashMap::new(), at(9, 0)),
            Err(JournalError::UnknownChild(_))
        ));
        assert!(matches!(
            service.submit("  ", &HashMap::new(), at(9, 0)),
            Err(JournalError::InvalidInput(_))
        ));
    }

    #[test]
    fn header_is_union_of_every_registered_question() {
        let (_dir, service) = service();
        service
            .set_questions("Alex", &[], &[Question::new("A"), Question::new("Shared")])
            .expect("alex");
        service
            .set_questions("Sam", &[], &[Question::new("Shared"), Question::new("S")])
            .expect("sam");
        service
            .set_questions("Alex", &[], &[Question::new("Later")])
            .expect("alex again");

        let header = service.snapshot(None).expect("snapshot").header;
        assert_eq!(header, vec!["Date/Time", "Child Name", "A", "Shared", "S", "Later"]);
    }

    #[test]
    fn old_answers_survive_question_changes() {
        let (_dir, service) = service();
        service
            .set_questions("Alex", &[], &[Question::new(MELTDOWNS)])
            .expect("first list");
        service
            .submit("Alex", &form(&[("q0", "2")]), at(9, 0))
            .expect("first submit");

        service
            .set_questions("Alex", &[], &[Question::new(MOOD)])
            .expect("second list");
        service
            .submit("Alex", &form(&[("q0", "4")]), at(10, 0))
            .expect("second submit");

        let snapshot = service.snapshot(Some("Alex")).expect("snapshot");
        assert_eq!(snapshot.rows[0].value(MELTDOWNS), &CellValue::Integer(2));
        assert_eq!(snapshot.rows[1].value(MOOD), &CellValue::Integer(4));
        assert_eq!(snapshot.rows[1].value(MELTDOWNS), &CellValue::Empty);
    }

    #[test]
    fn trends_cover_registered_questions() {
        let (_dir, service) = service();
        service
            .set_questions("Alex", &[], &[Question::new(MELTDOWNS), Question::new(MOOD)])
            .expect("questions");
        service
            .submit("Alex", &form(&[("q0", "2"), ("q1", "4")]), at(9, 0))
            .expect("first");
        service
            .submit("Alex", &form(&[("q0", "4"), ("q1", "2")]), at(9, 5))
            .expect("second");

        let TrendReport::Ready(series) = service.trends(Some("Alex")) else {
            panic!("expected series");
        };
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].question, MELTDOWNS);
        assert_eq!(series[0].points[0].mean, 3.0);
        assert_eq!(series[0].points[0].sum, 6);
    }

    #[test]
    fn trends_without_rows_report_no_data() {
        let (_dir, service) = service();
        service.add_child("Alex").expect("add");

        assert_eq!(service.trends(Some("Alex")), TrendReport::NoData);
        assert_eq!(service.trends(None), TrendReport::NoData);
    }
}
