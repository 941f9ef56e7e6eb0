use std::{fmt, sync::Arc, time::Duration};

/// The single error type for all chanexpect operations.
///
/// Two families share this enum. Configuration errors (`NoLayers`,
/// `EmptyCombiner`, ...) are returned directly from the call that detected
/// them. Expectation errors (`Terminated`, `Rejection`, `Unsatisfied`) are
/// never raised while messages flow: they are collected after the consumer
/// stops and returned in bulk by
/// [`Expecter::await_satisfied`](crate::Expecter::await_satisfied).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("expecter did not become satisfied within {0:?} and was terminated")]
    Terminated(Duration),

    #[error("message #{index} ({message}) was unexpected by layer #{layer}")]
    Rejection {
        index: usize,
        message: String,
        layer: usize,
    },

    #[error("layer #{layer} did not become satisfied")]
    Unsatisfied { layer: usize },

    #[error("no layers specified, nothing to expect")]
    NoLayers,

    #[error("layer #{layer} has no combiners")]
    EmptyLayer { layer: usize },

    #[error("a combiner requires at least one matcher")]
    EmptyCombiner,

    #[error("combiner minimum ({min}) exceeds its maximum ({max})")]
    InvalidBounds { min: usize, max: usize },

    #[error("expecter is already listening")]
    AlreadyListening,

    #[error("expecter was never started, call listen() first")]
    NotListening,

    #[error("consumer did not stop within {0:?} of cancellation and was aborted")]
    Abandoned(Duration),

    #[error("Internal chanexpect error {0}")]
    Internal(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn internal(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Internal(Arc::new(e))
    }

    /// Returns `true` for [`Error::Rejection`].
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Rejection { .. })
    }

    /// Returns `true` for [`Error::Unsatisfied`].
    pub fn is_unsatisfied(&self) -> bool {
        matches!(self, Error::Unsatisfied { .. })
    }

    /// Returns `true` for [`Error::Terminated`].
    pub fn is_terminated(&self) -> bool {
        matches!(self, Error::Terminated(_))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Terminated(a), Self::Terminated(b)) => a == b,
            (
                Self::Rejection {
                    index: ai,
                    message: am,
                    layer: al,
                },
                Self::Rejection {
                    index: bi,
                    message: bm,
                    layer: bl,
                },
            ) => ai == bi && am == bm && al == bl,
            (Self::Unsatisfied { layer: a }, Self::Unsatisfied { layer: b }) => a == b,
            (Self::NoLayers, Self::NoLayers) => true,
            (Self::EmptyLayer { layer: a }, Self::EmptyLayer { layer: b }) => a == b,
            (Self::EmptyCombiner, Self::EmptyCombiner) => true,
            (
                Self::InvalidBounds { min: a1, max: a2 },
                Self::InvalidBounds { min: b1, max: b2 },
            ) => a1 == b1 && a2 == b2,
            (Self::AlreadyListening, Self::AlreadyListening) => true,
            (Self::NotListening, Self::NotListening) => true,
            (Self::Abandoned(a), Self::Abandoned(b)) => a == b,
            (Self::Internal(a), Self::Internal(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Error {}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::internal(e)
    }
}

/// Every error found while inspecting a finished expecter.
///
/// Returned by [`Expecter::await_satisfied`](crate::Expecter::await_satisfied).
/// Errors appear in a fixed order: termination first, then one rejection per
/// rejected message (in arrival order), then the unsatisfied active layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub(crate) fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Error] {
        &self.0
    }

    /// Iterates over the [`Error::Rejection`] entries only.
    pub fn rejections(&self) -> impl Iterator<Item = &Error> {
        self.0.iter().filter(|e| e.is_rejection())
    }

    pub fn has_terminated(&self) -> bool {
        self.0.iter().any(Error::is_terminated)
    }

    pub fn has_unsatisfied(&self) -> bool {
        self.0.iter().any(Error::is_unsatisfied)
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ExpecterErrors {{")?;
        for e in &self.0 {
            writeln!(f, "  - {e}")?;
        }
        writeln!(f, "}}")
    }
}

impl From<Vec<Error>> for Errors {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
