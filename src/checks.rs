//! Assertions over the output of a finished notification service run.
//!
//! Line checks compare against [CapturedOutput::lines], which have the coverage warning removed.
//! Text checks search the raw output with tabs expanded to four spaces, except for [check_logs],
//! which searches the raw output as is.

use crate::age::MaxAge;
use crate::output::CapturedOutput;
use crate::table::{ScenarioTable, TableError};
use thiserror::Error;

/// Flag lines printed by `--help`.
pub const HELP_LINES: [&str; 11] = [
    "  -cleanup-on-startup",
    "  -instant-reports",
    "  -max-age string",
    "  -new-reports-cleanup",
    "  -old-reports-cleanup",
    "  -print-new-reports-for-cleanup",
    "  -print-old-reports-for-cleanup",
    "  -show-authors",
    "  -show-configuration",
    "  -show-version",
    "  -weekly-reports",
];

pub const VERSION_LINE: &str = "Notification service version 1.0";

pub const AUTHORS_LINE: &str = "Pavel Tisnovsky, Papa Bakary Camara, Red Hat Inc.";

/// Fragments printed by `--show-configuration`.
pub const CONFIGURATION_SECTIONS: [&str; 7] = [
    "parsing configuration file",
    "Broker configuration",
    "Storage configuration",
    "Logging configuration",
    "Notifications configuration",
    "Metrics configuration",
    "ServiceLog configuration",
];

const PRINT_FOR_CLEANUP: &str = "PrintReportsForCleanup operation";
const CLEANUP_ALL_ORGANIZATIONS: &str = "Cleanup operation for all organizations";

/// Tables holding reports. Not yet notified reports live in `new_reports`.
pub const NEW_REPORTS_TABLE: &str = "new_reports";
pub const REPORTED_TABLE: &str = "reported";

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("'{line}' not in {lines:?}")]
    MissingLine { line: String, lines: Vec<String> },

    #[error("'{text}' not found in output:\n{output}")]
    MissingText { text: String, output: String },

    #[error("'{text}' found in output:\n{output}")]
    UnexpectedText { text: String, output: String },

    #[error(
        "Return code is {}, but {expected} is expected. Check the logs:\n{output}",
        describe_code(.actual)
    )]
    StatusCode {
        actual: Option<i32>,
        expected: i32,
        output: String,
    },

    #[error("Retrieved {retrieved} events when {expected} was expected")]
    EventCount { retrieved: usize, expected: usize },

    #[error("Event {index} is not valid JSON: {source}")]
    MalformedEvent {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event {index} does not match: {reason}")]
    EventMismatch { index: usize, reason: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown (terminated by signal)".to_owned(),
    }
}

/// Raw output text with expanded tabs, searched by the text checks.
struct Text(String);

impl Text {
    fn of(output: &CapturedOutput) -> Self {
        Self(output.text_with_expanded_tabs())
    }

    fn require(&self, text: &str) -> Result<(), CheckError> {
        match self.0.contains(text) {
            true => Ok(()),
            false => Err(CheckError::MissingText {
                text: text.to_owned(),
                output: self.0.clone(),
            }),
        }
    }

    fn reject(&self, text: &str) -> Result<(), CheckError> {
        match self.0.contains(text) {
            true => Err(CheckError::UnexpectedText {
                text: text.to_owned(),
                output: self.0.clone(),
            }),
            false => Ok(()),
        }
    }
}

fn require_line(output: &CapturedOutput, line: &str) -> Result<(), CheckError> {
    match output.contains_line(line) {
        true => Ok(()),
        false => Err(CheckError::MissingLine {
            line: line.to_owned(),
            lines: output.lines.clone(),
        }),
    }
}

pub fn check_help(output: &CapturedOutput) -> Result<(), CheckError> {
    HELP_LINES
        .iter()
        .try_for_each(|line| require_line(output, line))
}

pub fn check_version(output: &CapturedOutput) -> Result<(), CheckError> {
    require_line(output, VERSION_LINE)
}

pub fn check_authors(output: &CapturedOutput) -> Result<(), CheckError> {
    require_line(output, AUTHORS_LINE)
}

pub fn check_configuration(output: &CapturedOutput) -> Result<(), CheckError> {
    let text = Text::of(output);
    CONFIGURATION_SECTIONS
        .iter()
        .try_for_each(|section| text.require(section))
}

fn check_print_for_cleanup(
    output: &CapturedOutput,
    table: &str,
    max_age: &MaxAge,
) -> Result<(), CheckError> {
    let text = Text::of(output);
    text.require(PRINT_FOR_CLEANUP)?;
    text.require(&format!("FROM {table}"))?;
    text.require(&max_age.to_string())
}

fn check_cleanup(
    output: &CapturedOutput,
    table: &str,
    max_age: &MaxAge,
) -> Result<(), CheckError> {
    let text = Text::of(output);
    text.require(CLEANUP_ALL_ORGANIZATIONS)?;
    text.require(&format!("FROM {table}"))?;
    text.require(&max_age.to_string())?;
    text.require(&format!("Cleanup `{table}` finished"))
}

/// Reports not notified yet and older than `max_age` were listed.
pub fn check_print_new_reports_for_cleanup(
    output: &CapturedOutput,
    max_age: &MaxAge,
) -> Result<(), CheckError> {
    check_print_for_cleanup(output, NEW_REPORTS_TABLE, max_age)
}

/// Reports not notified yet and older than `max_age` were removed.
pub fn check_new_reports_cleanup(
    output: &CapturedOutput,
    max_age: &MaxAge,
) -> Result<(), CheckError> {
    check_cleanup(output, NEW_REPORTS_TABLE, max_age)
}

/// Notified reports older than `max_age` were listed.
pub fn check_print_old_reports_for_cleanup(
    output: &CapturedOutput,
    max_age: &MaxAge,
) -> Result<(), CheckError> {
    check_print_for_cleanup(output, REPORTED_TABLE, max_age)
}

/// Notified reports older than `max_age` were removed.
pub fn check_old_reports_cleanup(
    output: &CapturedOutput,
    max_age: &MaxAge,
) -> Result<(), CheckError> {
    check_cleanup(output, REPORTED_TABLE, max_age)
}

/// Old reports of `table` were printed for every cluster in `clusters`.
///
/// `clusters` needs the columns `org id`, `account number` and `cluster name`.
pub fn check_old_reports_in_table(
    output: &CapturedOutput,
    table: &str,
    clusters: &ScenarioTable,
) -> Result<(), CheckError> {
    let text = Text::of(output);
    text.require(&format!("Old report from `{table}` table"))?;
    for row in clusters.rows() {
        text.require(row.get("org id")?)?;
        text.require(row.get("account number")?)?;
        text.require(row.get("cluster name")?)?;
    }
    Ok(())
}

pub fn check_no_old_reports(output: &CapturedOutput, table: &str) -> Result<(), CheckError> {
    let text = Text::of(output);
    text.reject(&format!("Old report from `{table}` table"))?;
    text.reject("ClusterName")
}

pub fn check_status_code(output: &CapturedOutput, expected: i32) -> Result<(), CheckError> {
    match output.exit_code() {
        Some(code) if code == expected => Ok(()),
        actual => Err(CheckError::StatusCode {
            actual,
            expected,
            output: output.text().into_owned(),
        }),
    }
}

/// Items of `table` older than `max_age` were removed.
pub fn check_cleaned_items(
    output: &CapturedOutput,
    table: &str,
    max_age: &MaxAge,
) -> Result<(), CheckError> {
    let text = Text::of(output);
    text.require(CLEANUP_ALL_ORGANIZATIONS)?;
    text.require(&format!("Cleanup `{table}` finished"))?;
    text.require(&max_age.to_string())
}

/// Checks the output against a table with the columns `log` and `contains`.
///
/// A `contains` value of `yes` requires the log fragment to be part of the output, `no` requires
/// it to be absent. Any other value is rejected.
pub fn check_logs(output: &CapturedOutput, expectations: &ScenarioTable) -> Result<(), CheckError> {
    let text = output.text();
    for row in expectations.rows() {
        let log = row.get("log")?;
        let present = text.contains(log);
        match row.get("contains")? {
            "yes" if !present => {
                return Err(CheckError::MissingText {
                    text: log.to_owned(),
                    output: text.into_owned(),
                });
            }
            "no" if present => {
                return Err(CheckError::UnexpectedText {
                    text: log.to_owned(),
                    output: text.into_owned(),
                });
            }
            "yes" | "no" => {}
            other => {
                return Err(CheckError::InvalidArgument {
                    reason: format!("option \"{other}\" is other than \"yes\" or \"no\""),
                });
            }
        }
    }
    Ok(())
}
