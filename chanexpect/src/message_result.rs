use std::fmt;

use crate::Trace;

/// How the expecter classified a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageStatus {
    /// The active layer accepted the message.
    Accepted,
    /// An ignore matcher removed the message before any layer saw it.
    Ignored,
    /// The active layer could not match the message.
    Rejected,
}

impl MessageStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MessageStatus::Accepted)
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, MessageStatus::Ignored)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, MessageStatus::Rejected)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Accepted => write!(f, "ACCEPTED"),
            MessageStatus::Ignored => write!(f, "IGNORED"),
            MessageStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// The record of one processed message.
///
/// One entry is appended per message read from the source, in arrival order,
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageResult<T> {
    message: T,
    layer: Option<usize>,
    status: MessageStatus,
    trace: Trace,
}

impl<T> MessageResult<T> {
    pub(crate) fn new(message: T, layer: Option<usize>, status: MessageStatus, trace: Trace) -> Self {
        Self {
            message,
            layer,
            status,
            trace,
        }
    }

    #[inline]
    pub fn message(&self) -> &T {
        &self.message
    }

    /// Index of the layer the message was presented to, `None` if ignored.
    #[inline]
    pub fn layer(&self) -> Option<usize> {
        self.layer
    }

    #[inline]
    pub fn status(&self) -> MessageStatus {
        self.status
    }

    #[inline]
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn into_message(self) -> T {
        self.message
    }
}

impl<T: fmt::Debug> MessageResult<T> {
    /// Write the status header followed by the trace, indented one level.
    pub fn write_to<W: fmt::Write>(&self, w: &mut W, verbose: bool) -> fmt::Result {
        writeln!(w, "Message {:?} - {}:", self.message, self.status)?;
        self.trace.write_to(w, 1, verbose)?;
        writeln!(w)
    }
}
