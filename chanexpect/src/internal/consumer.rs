use std::fmt;

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::{BoxMatcher, Layer, MessageResult, MessageStatus, Source, Trace};

/// Why the consumer loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    Satisfied,
    SourceClosed,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Satisfied => write!(f, "all layers satisfied"),
            StopReason::SourceClosed => write!(f, "source closed"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Everything the consumer owned, handed back once it stops.
pub(crate) struct Outcome<T> {
    pub(crate) layers: Vec<Layer<T>>,
    pub(crate) active: usize,
    pub(crate) results: Vec<MessageResult<T>>,
    pub(crate) reason: StopReason,
}

/// Background task draining the source into the active layer.
///
/// The consumer is the only mutator of the layers and the result log while
/// it runs; both move back to the caller through the task's return value.
pub(crate) struct Consumer<T, S> {
    pub(crate) source: S,
    pub(crate) ignores: Vec<BoxMatcher<T>>,
    pub(crate) layers: Vec<Layer<T>>,
    pub(crate) cancel: CancellationToken,
}

impl<T, S> Consumer<T, S>
where
    T: fmt::Debug + Send + 'static,
    S: Source<T>,
{
    pub(crate) async fn run(mut self) -> Outcome<T> {
        let mut active = 0;
        let mut results = Vec::new();

        let reason = loop {
            let Some(layer) = self.layers.get_mut(active) else {
                break StopReason::Satisfied;
            };
            layer.begin();

            let next = select! {
                biased;
                _ = self.cancel.cancelled() => None,
                message = self.source.recv() => Some(message),
            };
            let message = match next {
                None => break StopReason::Cancelled,
                Some(None) => break StopReason::SourceClosed,
                Some(Some(message)) => message,
            };

            let index = results.len();
            if let Some(trace) = ignored_by(&self.ignores, &message) {
                tracing::trace!(index, status = %MessageStatus::Ignored, "message classified");
                results.push(MessageResult::new(message, None, MessageStatus::Ignored, trace));
                continue;
            }

            let (matched, trace) = layer.try_match(&message);
            let status = if matched {
                MessageStatus::Accepted
            } else {
                MessageStatus::Rejected
            };
            tracing::trace!(index, layer = active, status = %status, "message classified");
            results.push(MessageResult::new(message, Some(active), status, trace));

            if matched && layer.is_satisfied() {
                tracing::debug!(layer = active, "layer satisfied, advancing");
                active += 1;
            }
        };

        tracing::info!(%reason, processed = results.len(), "expecter consumer finished");
        Outcome {
            layers: self.layers,
            active,
            results,
            reason,
        }
    }
}

fn ignored_by<T>(ignores: &[BoxMatcher<T>], message: &T) -> Option<Trace> {
    ignores
        .iter()
        .position(|m| m.matches(message))
        .map(|idx| Trace::info(format!("Ignore matcher #{idx} ACCEPTED")))
}
