//! JSON writer for run reports.
//!
//! The schema matches what the external orchestrator consumes: `camelCase`
//! keys, durations in whole milliseconds and a one-element `assertions`
//! array per record.

use std::io::Write;
use std::time::Duration;

use serde::Serialize;

use super::{Assertion, ResultRecord, RunReport};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    failed_count: usize,
    spec_results: Vec<JsonRecord<'a>>,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    description: &'a str,
    assertions: Vec<JsonAssertion<'a>>,
    duration: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonAssertion<'a> {
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_msg: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack_trace: Option<&'a str>,
}

impl<'a> From<&'a RunReport> for JsonReport<'a> {
    fn from(report: &'a RunReport) -> Self {
        Self {
            failed_count: report.failed_count(),
            spec_results: report.spec_results().iter().map(JsonRecord::from).collect(),
        }
    }
}

impl<'a> From<&'a ResultRecord> for JsonRecord<'a> {
    fn from(record: &'a ResultRecord) -> Self {
        Self {
            description: record.description(),
            assertions: record.assertions().iter().map(JsonAssertion::from).collect(),
            duration: millis(record.duration()),
        }
    }
}

impl<'a> From<&'a Assertion> for JsonAssertion<'a> {
    fn from(assertion: &'a Assertion) -> Self {
        Self {
            passed: assertion.is_passed(),
            error_msg: assertion.error_msg(),
            stack_trace: assertion.stack_trace(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Serialize the report into the supplied writer.
///
/// # Examples
/// ```rust
/// use bdd_flow::reporting::{json, RunReport};
///
/// let mut buffer = Vec::new();
/// json::write(&mut buffer, &RunReport::new(0, Vec::new())).unwrap();
/// let output = String::from_utf8(buffer).unwrap();
/// assert_eq!(output, r#"{"failedCount":0,"specResults":[]}"#);
/// ```
///
/// # Errors
/// Returns an error when serialization fails.
pub fn write<W: Write>(writer: &mut W, report: &RunReport) -> serde_json::Result<()> {
    serde_json::to_writer(writer, &JsonReport::from(report))
}

/// Produce a JSON string representation of the report.
///
/// # Errors
/// Returns an error when serialization fails.
pub fn to_string(report: &RunReport) -> serde_json::Result<String> {
    serde_json::to_string(&JsonReport::from(report))
}

/// Produce the report as a [`serde_json::Value`].
///
/// # Errors
/// Returns an error when serialization fails.
pub fn to_value(report: &RunReport) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(JsonReport::from(report))
}
