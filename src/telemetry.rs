//! Telemetry CSV reader
//!
//! The simulation prints one header line followed by one record per task:
//!
//! ```text
//! TaskID,Priority,SubmissionTime,ExecutionStartTime,QueueWaitTime,TotalSimTimeMs,TotalTasks
//! 5f0c...,HIGH,1712,1950,238,612,50
//! ```
//!
//! Fields are comma-separated with RFC 4180 double quoting. Only
//! `QueueWaitTime` and `TotalSimTimeMs` are required and must be non-negative
//! integers. `Priority` and `TotalTasks` are picked up when present but never
//! fail a run; everything else is ignored.

use tracing::warn;

use crate::error::{HarnessError, Result};

pub const QUEUE_WAIT_TIME: &str = "QueueWaitTime";
pub const TOTAL_SIM_TIME_MS: &str = "TotalSimTimeMs";
pub const PRIORITY: &str = "Priority";
pub const TOTAL_TASKS: &str = "TotalTasks";

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Parsed CSV: header plus raw records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryTable {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl TelemetryTable {
    /// Parse CSV text. Empty input yields a table with no header and no records.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = split_records(text)?.into_iter();
        let headers = lines.next().unwrap_or_default();
        let records = lines.collect();
        Ok(Self { headers, records })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index of a column by exact header name
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Resolve the columns the analyzer understands
    pub fn layout(&self) -> Result<ColumnLayout> {
        let required = |name: &str| {
            self.column(name).ok_or_else(|| HarnessError::MissingColumn {
                column: name.to_string(),
            })
        };
        Ok(ColumnLayout {
            queue_wait_time: required(QUEUE_WAIT_TIME)?,
            total_sim_time_ms: required(TOTAL_SIM_TIME_MS)?,
            priority: self.column(PRIORITY),
            total_tasks: self.column(TOTAL_TASKS),
        })
    }

    /// Iterate records as typed rows; row numbers are 1-based data rows
    pub fn rows(&self) -> Result<impl Iterator<Item = Result<TelemetryRow>> + '_> {
        let layout = self.layout()?;
        Ok(self
            .records
            .iter()
            .enumerate()
            .map(move |(idx, record)| layout.row(idx + 1, record)))
    }
}

/// Column positions of the known telemetry fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub queue_wait_time: usize,
    pub total_sim_time_ms: usize,
    pub priority: Option<usize>,
    pub total_tasks: Option<usize>,
}

impl ColumnLayout {
    fn row(&self, row: usize, record: &[String]) -> Result<TelemetryRow> {
        Ok(TelemetryRow {
            queue_wait_ns: integer_field(row, record, self.queue_wait_time, QUEUE_WAIT_TIME)?,
            total_sim_time_ms: integer_field(
                row,
                record,
                self.total_sim_time_ms,
                TOTAL_SIM_TIME_MS,
            )?,
            priority: self.priority.and_then(|i| record.get(i)).cloned(),
            total_tasks: self
                .total_tasks
                .and_then(|i| record.get(i))
                .and_then(|value| optional_count(row, value)),
        })
    }
}

/// One completed task as reported by the simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRow {
    /// Time the task waited for a worker, in nanoseconds
    pub queue_wait_ns: u64,
    /// Wall-clock duration of the whole run, in milliseconds
    pub total_sim_time_ms: u64,
    pub priority: Option<String>,
    /// Number of tasks the run was asked to submit
    pub total_tasks: Option<u64>,
}

/// `TotalTasks` is advisory: anything unparsable is treated as absent
fn optional_count(row: usize, value: &str) -> Option<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(count) => Some(count),
        Err(_) => {
            warn!(row, value, "ignoring non-integer {} value", TOTAL_TASKS);
            None
        }
    }
}

fn integer_field(row: usize, record: &[String], index: usize, column: &str) -> Result<u64> {
    let value = record.get(index).ok_or_else(|| HarnessError::MissingField {
        row,
        column: column.to_string(),
    })?;
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| HarnessError::InvalidNumber {
            row,
            column: column.to_string(),
            value: value.clone(),
        })
}

/// Split CSV text into records of fields, honoring quotes.
///
/// Blank lines outside quotes are skipped.
fn split_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // Whether the current line has produced anything yet
    let mut line_started = false;
    let mut line = 1;
    let mut quote_line = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                QUOTE if chars.peek() == Some(&QUOTE) => {
                    chars.next();
                    field.push(QUOTE);
                }
                QUOTE => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            QUOTE if field.is_empty() => {
                in_quotes = true;
                quote_line = line;
                line_started = true;
            }
            QUOTE => {
                return Err(HarnessError::MalformedCsv {
                    line,
                    reason: "quote inside unquoted field".to_string(),
                })
            }
            DELIMITER => {
                record.push(std::mem::take(&mut field));
                line_started = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if line_started {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                line_started = false;
                line += 1;
            }
            _ => {
                field.push(c);
                line_started = true;
            }
        }
    }

    if in_quotes {
        return Err(HarnessError::MalformedCsv {
            line: quote_line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    if line_started {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMULATION_OUTPUT: &str = "\
TaskID,Priority,SubmissionTime,ExecutionStartTime,QueueWaitTime,TotalSimTimeMs,TotalTasks
a1,HIGH,100,1100,1000,612,2
b2,LOW,200,5200,5000,612,2
";

    #[test]
    fn test_parse_header_and_records() {
        let table = TelemetryTable::parse(SIMULATION_OUTPUT).unwrap();
        assert_eq!(table.headers().len(), 7);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column(QUEUE_WAIT_TIME), Some(4));
        assert_eq!(table.column(TOTAL_SIM_TIME_MS), Some(5));
    }

    #[test]
    fn test_typed_rows() {
        let table = TelemetryTable::parse(SIMULATION_OUTPUT).unwrap();
        let rows: Vec<_> = table.rows().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows[0].queue_wait_ns, 1000);
        assert_eq!(rows[0].total_sim_time_ms, 612);
        assert_eq!(rows[0].priority.as_deref(), Some("HIGH"));
        assert_eq!(rows[1].priority.as_deref(), Some("LOW"));
        assert_eq!(rows[1].total_tasks, Some(2));
    }

    #[test]
    fn test_header_only_is_empty() {
        let table = TelemetryTable::parse("QueueWaitTime,TotalSimTimeMs\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers().len(), 2);
    }

    #[test]
    fn test_empty_text() {
        let table = TelemetryTable::parse("").unwrap();
        assert!(table.headers().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_quoted_delimiter_and_escaped_quote() {
        let text = "Note,QueueWaitTime,TotalSimTimeMs\n\"a, \"\"b\"\"\",10,20\n";
        let table = TelemetryTable::parse(text).unwrap();
        assert_eq!(table.records()[0][0], "a, \"b\"");
        assert_eq!(table.records()[0][1], "10");
    }

    #[test]
    fn test_quoted_newline() {
        let text = "Note,QueueWaitTime,TotalSimTimeMs\n\"two\nlines\",1,2\n";
        let table = TelemetryTable::parse(text).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0][0], "two\nlines");
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let text = "QueueWaitTime,TotalSimTimeMs\r\n1,2\r\n\r\n3,4\r\n\n";
        let table = TelemetryTable::parse(text).unwrap();
        assert_eq!(
            table.records(),
            &[
                vec!["1".to_string(), "2".to_string()],
                vec!["3".to_string(), "4".to_string()]
            ]
        );
    }

    #[test]
    fn test_no_trailing_newline() {
        let table = TelemetryTable::parse("QueueWaitTime,TotalSimTimeMs\n1,2").unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_trailing_empty_field_kept() {
        let table = TelemetryTable::parse("a,b\n1,\n").unwrap();
        assert_eq!(table.records()[0], vec!["1".to_string(), String::new()]);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = TelemetryTable::parse("a,b\n\"open,1\n").unwrap_err();
        assert!(matches!(err, HarnessError::MalformedCsv { line: 2, .. }));
    }

    #[test]
    fn test_stray_quote() {
        let err = TelemetryTable::parse("a,b\nx\"y,1\n").unwrap_err();
        assert!(matches!(err, HarnessError::MalformedCsv { .. }));
    }

    #[test]
    fn test_missing_required_column() {
        let table = TelemetryTable::parse("QueueWaitTime\n1\n").unwrap();
        let err = table.layout().unwrap_err();
        match err {
            HarnessError::MissingColumn { column } => assert_eq!(column, TOTAL_SIM_TIME_MS),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_record_is_missing_field() {
        let table = TelemetryTable::parse("QueueWaitTime,TotalSimTimeMs\n1,2\n3\n").unwrap();
        let results: Vec<_> = table.rows().unwrap().collect();
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(HarnessError::MissingField { row: 2, .. })
        ));
    }

    #[test]
    fn test_non_integer_is_invalid_number() {
        let table = TelemetryTable::parse("QueueWaitTime,TotalSimTimeMs\n1.5,2\n").unwrap();
        let err = table.rows().unwrap().next().unwrap().unwrap_err();
        assert!(matches!(err, HarnessError::InvalidNumber { row: 1, .. }));
    }

    #[test]
    fn test_negative_is_invalid_number() {
        let table = TelemetryTable::parse("QueueWaitTime,TotalSimTimeMs\n-4,2\n").unwrap();
        assert!(table.rows().unwrap().next().unwrap().is_err());
    }

    #[test]
    fn test_unparsable_total_tasks_is_absent() {
        let table =
            TelemetryTable::parse("QueueWaitTime,TotalSimTimeMs,TotalTasks\n1000000,100,n/a\n7,100,\n")
                .unwrap();
        let rows: Vec<_> = table.rows().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows[0].queue_wait_ns, 1_000_000);
        assert_eq!(rows[0].total_tasks, None);
        assert_eq!(rows[1].total_tasks, None);
    }

    #[test]
    fn test_optional_columns_absent() {
        let table = TelemetryTable::parse("TotalSimTimeMs,QueueWaitTime\n9,8\n").unwrap();
        let row = table.rows().unwrap().next().unwrap().unwrap();
        assert_eq!(row.queue_wait_ns, 8);
        assert_eq!(row.total_sim_time_ms, 9);
        assert_eq!(row.priority, None);
        assert_eq!(row.total_tasks, None);
    }
}
