use crate::journal::JournalSnapshot;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

pub const NO_DATA_MESSAGE: &str = "No data available to visualize.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub mean: f64,
    pub sum: i128,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionSeries {
    pub question: String,
    pub points: Vec<DayPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "series", rename_all = "snake_case")]
pub enum TrendReport {
    NoData,
    Ready(Vec<QuestionSeries>),
}

/// Per-day mean, sum and count of every integer answer to `questions`.
///
/// Rows with an unparseable timestamp are skipped, as are questions without a
/// single integer answer.
pub fn build_trends<S: AsRef<str>>(snapshot: &JournalSnapshot, questions: &[S]) -> TrendReport {
    if snapshot.is_empty() {
        return TrendReport::NoData;
    }

    let dated_rows = snapshot
        .rows
        .iter()
        .filter_map(|row| row.timestamp().map(|at| (at.date(), row)))
        .collect::<Vec<_>>();

    let series = questions
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter_map(|question| {
            let per_day = dated_rows.iter().fold(
                BTreeMap::<NaiveDate, (i128, usize)>::new(),
                |mut acc, (date, row)| {
                    if let Some(value) = row.value(question).as_integer() {
                        let entry = acc.entry(*date).or_default();
                        entry.0 += i128::from(value);
                        entry.1 += 1;
                    }
                    acc
                },
            );

            (!per_day.is_empty()).then(|| QuestionSeries {
                question: question.to_string(),
                points: per_day
                    .into_iter()
                    .map(|(date, (sum, count))| DayPoint {
                        date,
                        mean: sum as f64 / count as f64,
                        sum,
                        count,
                    })
                    .collect(),
            })
        })
        .collect();

    TrendReport::Ready(series)
}

pub fn render_text(report: &TrendReport) -> String {
    let series = match report {
        TrendReport::NoData => return NO_DATA_MESSAGE.to_string(),
        TrendReport::Ready(series) if series.is_empty() => {
            return "No numeric answers to chart yet.".to_string();
        }
        TrendReport::Ready(series) => series,
    };

    series
        .iter()
        .map(|entry| {
            let rows = entry
                .points
                .iter()
                .map(|point| {
                    format!(
                        "| {} | {:.2} | {} | {} |",
                        point.date.format("%Y-%m-%d"),
                        point.mean,
                        point.sum,
                        point.count
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");

            format!(
                "## {}\n| Date | Average | Total | Answers |\n|------|---------|-------|---------|\n{}",
                entry.question, rows
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::{TrendReport, build_trends, render_text};
    use crate::journal::value::CellValue;
    use crate::journal::{JournalRow, JournalSnapshot};
    use std::collections::BTreeMap;

    fn row(recorded_at: &str, child: &str, values: &[(&str, CellValue)]) -> JournalRow {
        JournalRow {
            recorded_at: recorded_at.to_string(),
            child: child.to_string(),
            values: values
                .iter()
                .map(|(question, value)| (question.to_string(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn snapshot(rows: Vec<JournalRow>) -> JournalSnapshot {
        JournalSnapshot {
            header: vec![
                "Date/Time".to_string(),
                "Child Name".to_string(),
                "Mood".to_string(),
                "Notes".to_string(),
            ],
            rows,
        }
    }

    #[test]
    fn empty_snapshot_is_no_data() {
        assert_eq!(build_trends(&snapshot(Vec::new()), &["Mood"]), TrendReport::NoData);
        assert!(render_text(&TrendReport::NoData).contains("No data"));
    }

    #[test]
    fn groups_integer_answers_by_day() {
        let rows = vec![
            row("2024-03-01 08:00:00", "Alex", &[("Mood", CellValue::Integer(2))]),
            row("2024-03-01 20:00:00", "Alex", &[("Mood", CellValue::Integer(4))]),
            row("2024-03-02 08:00:00", "Alex", &[("Mood", CellValue::Empty)]),
            row("2024-03-03 08:00:00", "Alex", &[("Mood", CellValue::Integer(5))]),
            row("not a date", "Alex", &[("Mood", CellValue::Integer(1))]),
        ];

        let TrendReport::Ready(series) = build_trends(&snapshot(rows), &["Mood", "Notes"]) else {
            panic!("expected series");
        };

        assert_eq!(series.len(), 1);
        let points = &series[0].points;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].mean, 3.0);
        assert_eq!(points[0].sum, 6);
        assert_eq!(points[0].count, 2);
        assert_eq!(points[1].date.to_string(), "2024-03-03");
    }

    #[test]
    fn text_answers_do_not_produce_series() {
        let rows = vec![row(
            "2024-03-01 08:00:00",
            "Alex",
            &[("Notes", CellValue::Text("calm".to_string()))],
        )];

        assert_eq!(
            build_trends(&snapshot(rows), &["Notes"]),
            TrendReport::Ready(Vec::new())
        );
    }

    #[test]
    fn extreme_answers_sum_without_overflow() {
        let rows = vec![
            row("2024-03-01 08:00:00", "Alex", &[("Mood", CellValue::Integer(i64::MAX))]),
            row("2024-03-01 09:00:00", "Alex", &[("Mood", CellValue::Integer(i64::MAX))]),
        ];

        let TrendReport::Ready(series) = build_trends(&snapshot(rows), &["Mood"]) else {
            panic!("expected series");
        };

        let point = &series[0].points[0];
        assert_eq!(point.sum, i128::from(i64::MAX) * 2);
        assert_eq!(point.count, 2);
        assert_eq!(point.mean, i64::MAX as f64);
    }
}
