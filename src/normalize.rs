//! Removal of instrumentation noise from captured output.
//!
//! Go binaries compiled with `-cover` print a warning on every run in which the `GOCOVERDIR`
//! environment variable is not set. That line must not take part in any comparison against the
//! expected output of the binary.

use std::borrow::Cow;

macro_rules! coverage_message {
    () => {
        "warning: GOCOVERDIR not set, no coverage data emitted"
    };
}

/// The warning line printed by coverage-instrumented binaries when `GOCOVERDIR` is not set.
pub const COVERAGE_MESSAGE: &str = coverage_message!();

/// [COVERAGE_MESSAGE] including its line terminator.
const COVERAGE_LINE: &str = concat!(coverage_message!(), "\n");

/// Removes every occurrence of [COVERAGE_MESSAGE] followed by `\n` from `output`.
///
/// Everything else, including other line terminators, is left untouched. When nothing had to be
/// removed, the input is handed back borrowed.
///
/// Occurrences are searched in `output` only. Text that forms a new occurrence once its
/// surroundings were removed is kept.
pub fn filter_coverage_message(output: &str) -> Cow<'_, str> {
    match output.contains(COVERAGE_LINE) {
        true => Cow::Owned(output.replace(COVERAGE_LINE, "")),
        false => Cow::Borrowed(output),
    }
}

/// Drops all lines equal to [COVERAGE_MESSAGE], keeping the order of all others.
///
/// Lines are expected to be split already, without their terminators.
pub fn normalize_lines<I>(lines: I) -> impl Iterator<Item = I::Item> + Clone
where
    I: IntoIterator,
    I::IntoIter: Clone,
    I::Item: AsRef<str>,
{
    lines
        .into_iter()
        .filter(|line| line.as_ref() != COVERAGE_MESSAGE)
}
