use std::fmt;

/// Sink for the failures and diagnostics produced by
/// [`Expecter::assert_satisfied_with`](crate::Expecter::assert_satisfied_with).
///
/// `report_failure` is called once per problem found; `log` carries
/// supporting output such as the verbose trace dump. Implement it to route
/// expectation failures into a custom test framework.
pub trait Reporter {
    fn report_failure(&mut self, failure: String);
    fn log(&mut self, line: String);
}

/// A [`Reporter`] that keeps everything in memory.
///
/// Used by [`Expecter::assert_satisfied`](crate::Expecter::assert_satisfied)
/// and handy when asserting on the reported text itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recorder {
    failures: Vec<String>,
    logs: Vec<String>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    #[inline]
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn has_failed(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl Reporter for Recorder {
    fn report_failure(&mut self, failure: String) {
        self.failures.push(failure);
    }

    fn log(&mut self, line: String) {
        self.logs.push(line);
    }
}

/// Renders logs first, then failures, one per block.
impl fmt::Display for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.logs {
            writeln!(f, "{line}")?;
        }
        for failure in &self.failures {
            writeln!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report_failure(&mut self, failure: String) {
        (**self).report_failure(failure);
    }

    fn log(&mut self, line: String) {
        (**self).log(line);
    }
}
