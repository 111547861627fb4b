use crate::normalize::normalize_lines;
use bytes::Bytes;
use std::borrow::Cow;
use std::process::ExitStatus;

/// Everything a finished process wrote, together with how it exited.
///
/// Standard output and standard error are captured through one channel, so `raw` holds both in
/// the order the process wrote them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Status the process exited with.
    pub status: ExitStatus,

    /// The output decoded as UTF-8 and split on `\n`.
    ///
    /// Output ending with a newline yields a trailing empty line. Depending on how the output was
    /// captured, the coverage warning of instrumented binaries was removed.
    pub lines: Vec<String>,

    /// The output exactly as read from the process.
    pub raw: Bytes,
}

impl CapturedOutput {
    /// Splits `raw` into lines. Invalid UTF-8 sequences are replaced, not rejected.
    pub fn new(status: ExitStatus, raw: Bytes, filter_coverage_message: bool) -> Self {
        let lines = {
            let text = String::from_utf8_lossy(&raw);
            let lines = text.split('\n').map(str::to_owned);
            match filter_coverage_message {
                true => normalize_lines(lines).collect(),
                false => lines.collect(),
            }
        };
        Self { status, lines, raw }
    }

    /// `None` if the process was terminated by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// The raw output as text.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    /// The raw output as text, with every tab replaced by four spaces.
    pub fn text_with_expanded_tabs(&self) -> String {
        self.text().replace('\t', "    ")
    }

    /// Whether one of the captured lines equals `line` exactly.
    pub fn contains_line(&self, line: &str) -> bool {
        self.lines.iter().any(|captured| captured == line)
    }
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use crate::normalize::COVERAGE_MESSAGE;
    use assertr::prelude::*;
    use std::os::unix::process::ExitStatusExt;

    pub(crate) fn exited_with(code: i32) -> ExitStatus {
        ExitStatus::from_raw(code << 8)
    }

    pub(crate) fn captured(code: i32, text: &str) -> CapturedOutput {
        CapturedOutput::new(exited_with(code), Bytes::copy_from_slice(text.as_bytes()), true)
    }

    #[test]
    fn splits_into_lines_keeping_trailing_empty_line() {
        let output = captured(0, "foo\nbar\n");
        assert_that(output.lines).is_equal_to(vec![
            "foo".to_owned(),
            "bar".to_owned(),
            String::new(),
        ]);
    }

    #[test]
    fn filters_coverage_message_from_lines_only() {
        let text = format!("{COVERAGE_MESSAGE}\nUsage of service:\n");
        let output = captured(0, &text);

        assert_that(output.contains_line(COVERAGE_MESSAGE)).is_false();
        assert_that(output.contains_line("Usage of service:")).is_true();
        assert_that(output.text().into_owned()).is_equal_to(text);
    }

    #[test]
    fn keeps_coverage_message_when_not_filtering() {
        let text = format!("{COVERAGE_MESSAGE}\n");
        let output = CapturedOutput::new(exited_with(0), Bytes::from(text), false);
        assert_that(output.contains_line(COVERAGE_MESSAGE)).is_true();
    }

    #[test]
    fn reports_exit_code() {
        assert_that(captured(5, "").exit_code()).is_equal_to(Some(5));
        let killed = CapturedOutput::new(ExitStatus::from_raw(9), Bytes::new(), true);
        assert_that(killed.exit_code()).is_none();
    }

    #[test]
    fn expands_tabs() {
        let output = captured(0, "Broker configuration\n\tAddress: localhost\n");
        assert_that(output.text_with_expanded_tabs().as_str()).contains("    Address: localhost");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let raw = Bytes::from_static(b"valid utf8\xF0\x28\x8C\xBC invalid utf8\n");
        let output = CapturedOutput::new(exited_with(0), raw, true);
        assert_that(output.lines[0].as_str()).contains("valid utf8");
        assert_that(output.lines[0].as_str()).contains("invalid utf8");
    }
}
