//! `JUnit` XML writer for run reports.
//!
//! Every record becomes one `<testcase>`; failing records carry a
//! `<failure>` child whose body is the stack trace.

use std::fmt::{self, Write};

use super::{Assertion, RunReport};

/// Render the report as a `JUnit` XML document.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use bdd_flow::reporting::{junit, Assertion, ResultRecord, RunReport};
///
/// let report = RunReport::new(
///     0,
///     vec![ResultRecord::new("Login --> admin", Assertion::Passed, Duration::ZERO)],
/// );
/// let mut output = String::new();
/// junit::write(&mut output, &report).unwrap();
/// assert!(output.contains("<testcase name=\"Login --&gt; admin\""));
/// ```
///
/// # Errors
/// Returns an error if writing to the provided formatter fails.
pub fn write<W: Write>(writer: &mut W, report: &RunReport) -> fmt::Result {
    let tests = report.spec_results().len();
    let failures = report.failing_records();
    writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
    writeln!(
        writer,
        "<testsuite name=\"bdd-flow\" tests=\"{tests}\" failures=\"{failures}\">",
    )?;
    for record in report.spec_results() {
        writer.write_str("  <testcase name=\"")?;
        write_escaped(writer, record.description())?;
        write!(writer, "\" time=\"{:.3}\"", record.duration().as_secs_f64())?;
        match record.assertion() {
            Assertion::Passed => writer.write_str(" />\n")?,
            Assertion::Failed {
                error_msg,
                stack_trace,
            } => {
                writer.write_str(">\n    <failure message=\"")?;
                write_escaped(writer, error_msg)?;
                writer.write_str("\">")?;
                write_escaped(writer, stack_trace)?;
                writer.write_str("</failure>\n  </testcase>\n")?;
            }
        }
    }
    writer.write_str("</testsuite>\n")
}

/// Render the report into a new string.
#[must_use]
pub fn to_string(report: &RunReport) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write(&mut output, report);
    output
}

fn write_escaped<W: Write>(writer: &mut W, value: &str) -> fmt::Result {
    const INVALID_REPLACEMENT: &str = "&#xFFFD;";
    for character in value.chars() {
        if !is_valid_xml_character(character) {
            writer.write_str(INVALID_REPLACEMENT)?;
            continue;
        }
        match character {
            '&' => writer.write_str("&amp;")?,
            '<' => writer.write_str("&lt;")?,
            '>' => writer.write_str("&gt;")?,
            '"' => writer.write_str("&quot;")?,
            '\'' => writer.write_str("&apos;")?,
            other => writer.write_char(other)?,
        }
    }
    Ok(())
}

fn is_valid_xml_character(character: char) -> bool {
    matches!(
        u32::from(character),
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x1_0000..=0x10_FFFF
    )
}
