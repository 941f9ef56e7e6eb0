use std::{collections::BTreeSet, fmt, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    BoxMatcher, Combiner, Config, Error, Errors, Layer, LayerMode, MessageResult, Reporter,
    Recorder, Result, Source,
    internal::{Consumer, Outcome, StopReason},
};

/// Declares the messages expected from a [`Source`] and checks them.
///
/// An expecter is built in three phases:
///
/// 1. **Declare**: add layers with [`expect`](Self::expect) /
///    [`expect_any`](Self::expect_any) (and their `_timeout` variants) and
///    global filters with [`ignore`](Self::ignore).
/// 2. **Listen**: [`listen`](Self::listen) spawns a background task that
///    drains the source, classifying each message against the active layer.
/// 3. **Inspect**: [`await_satisfied`](Self::await_satisfied) waits for the
///    task to finish (or cancels it) and returns every problem found.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use chanexpect::{Expecter, all_of, eq};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> chanexpect::Result {
/// let (tx, rx) = tokio::sync::mpsc::channel(8);
/// let mut expecter = Expecter::new(rx)
///     .ignore([eq("heartbeat")])
///     .expect([all_of([eq("hello"), eq("world")])?]);
/// expecter.listen()?;
///
/// for m in ["hello", "heartbeat", "world"] {
///     tx.send(m).await.unwrap();
/// }
///
/// let errors = expecter.await_satisfied(Duration::from_secs(1)).await;
/// assert!(errors.is_empty(), "{errors}");
/// # Ok(())
/// # }
/// ```
///
/// Messages are processed strictly in arrival order. Each one is
/// [`Ignored`](crate::MessageStatus::Ignored) if an ignore matcher accepts it,
/// otherwise presented to the active layer and recorded as accepted or
/// rejected. Once an accepted message leaves its layer satisfied the next
/// layer becomes active; the task stops when every layer is satisfied, the
/// source closes, or it is cancelled.
pub struct Expecter<T, S> {
    config: Config,
    source: Option<S>,
    ignores: Vec<BoxMatcher<T>>,
    layers: Vec<Layer<T>>,
    running: Option<Running<T>>,
    finished: Option<Finished<T>>,
}

struct Running<T> {
    handle: JoinHandle<Outcome<T>>,
    cancel: CancellationToken,
}

struct Finished<T> {
    layers: Vec<Layer<T>>,
    active: usize,
    results: Vec<MessageResult<T>>,
    errors: Errors,
}

impl<T> Finished<T> {
    /// The consumer's state was lost; only the errors remain.
    fn lost(errors: Errors) -> Self {
        Self {
            layers: Vec::new(),
            active: 0,
            results: Vec::new(),
            errors,
        }
    }
}

impl<T: fmt::Debug> Finished<T> {
    fn from_outcome(outcome: Outcome<T>, mut errors: Errors) -> Self {
        let Outcome {
            layers,
            active,
            results,
            ..
        } = outcome;

        for (index, result) in results.iter().enumerate() {
            if result.status().is_rejected() {
                errors.push(Error::Rejection {
                    index,
                    message: format!("{:?}", result.message()),
                    layer: result.layer().unwrap_or(active),
                });
            }
        }

        if let Some(layer) = layers.get(active)
            && !layer.is_satisfied()
        {
            errors.push(Error::Unsatisfied { layer: active });
        }

        Self {
            layers,
            active,
            results,
            errors,
        }
    }
}

impl<T, S> fmt::Debug for Expecter<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expecter")
            .field("config", &self.config)
            .field("ignores", &self.ignores.len())
            .field("layers", &self.layers.len())
            .field("listening", &self.running.is_some())
            .field("finished", &self.finished.is_some())
            .finish_non_exhaustive()
    }
}

impl<T, S> Expecter<T, S>
where
    T: fmt::Debug + Send + 'static,
    S: Source<T>,
{
    /// Create an expecter over `source` with the default [`Config`].
    pub fn new(source: S) -> Self {
        Self::with_config(source, Config::default())
    }

    pub fn with_config(source: S, config: Config) -> Self {
        Self {
            config,
            source: Some(source),
            ignores: Vec::new(),
            layers: Vec::new(),
            running: None,
            finished: None,
        }
    }

    /// Shortcut for enabling [`Config::verbose`].
    pub fn verbose(mut self) -> Self {
        self.config = self.config.clone().with_verbose(true);
        self
    }

    /// Register matchers that remove messages before any layer sees them.
    ///
    /// Ignored messages are still recorded, with no layer index, and never
    /// advance or reject the active layer.
    pub fn ignore(mut self, matchers: impl IntoIterator<Item = BoxMatcher<T>>) -> Self {
        self.ignores.extend(matchers);
        self
    }

    /// Append a layer satisfied once **all** of its combiners are.
    pub fn expect(self, combiners: impl IntoIterator<Item = Combiner<T>>) -> Self {
        self.add_layer(LayerMode::And, None, combiners)
    }

    /// Append a layer satisfied once **any** of its combiners is.
    pub fn expect_any(self, combiners: impl IntoIterator<Item = Combiner<T>>) -> Self {
        self.add_layer(LayerMode::Or, None, combiners)
    }

    /// Like [`expect`](Self::expect), but every message reaching the layer
    /// after `timeout` has passed since it became active is rejected.
    pub fn expect_timeout(
        self,
        timeout: Duration,
        combiners: impl IntoIterator<Item = Combiner<T>>,
    ) -> Self {
        self.add_layer(LayerMode::And, Some(timeout), combiners)
    }

    /// Like [`expect_any`](Self::expect_any), with a layer timeout.
    pub fn expect_any_timeout(
        self,
        timeout: Duration,
        combiners: impl IntoIterator<Item = Combiner<T>>,
    ) -> Self {
        self.add_layer(LayerMode::Or, Some(timeout), combiners)
    }

    fn add_layer(
        mut self,
        mode: LayerMode,
        timeout: Option<Duration>,
        combiners: impl IntoIterator<Item = Combiner<T>>,
    ) -> Self {
        let index = self.layers.len();
        self.layers.push(Layer::new(
            index,
            mode,
            timeout,
            combiners.into_iter().collect(),
        ));
        self
    }

    /// Spawn the background consumer on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::NoLayers`] if nothing was declared with `expect*`.
    /// - [`Error::EmptyLayer`] if a layer has no combiners.
    /// - [`Error::AlreadyListening`] on a second call.
    pub fn listen(&mut self) -> Result {
        if self.source.is_none() {
            return Err(Error::AlreadyListening);
        }
        if self.layers.is_empty() {
            return Err(Error::NoLayers);
        }
        if let Some(layer) = self.layers.iter().find(|l| l.combiners().is_empty()) {
            return Err(Error::EmptyLayer {
                layer: layer.index(),
            });
        }
        let Some(source) = self.source.take() else {
            return Err(Error::AlreadyListening);
        };

        let cancel = CancellationToken::new();
        let consumer = Consumer {
            source,
            ignores: std::mem::take(&mut self.ignores),
            layers: std::mem::take(&mut self.layers),
            cancel: cancel.clone(),
        };

        tracing::debug!(layers = consumer.layers.len(), "expecter listening");
        let handle = tokio::spawn(consumer.run());
        self.running = Some(Running { handle, cancel });
        Ok(())
    }

    /// Wait up to `timeout` for the consumer to finish, then report.
    ///
    /// If the timeout elapses first the consumer is cancelled and
    /// [`Error::Terminated`] is reported. Then every rejected message yields
    /// an [`Error::Rejection`], and an unsatisfied active layer yields
    /// [`Error::Unsatisfied`]. An empty result means every layer was
    /// satisfied without a single rejection.
    ///
    /// The outcome is kept: later calls return the same errors immediately.
    pub async fn await_satisfied(&mut self, timeout: Duration) -> Errors {
        if let Some(finished) = &self.finished {
            return finished.errors.clone();
        }
        let Some(running) = self.running.take() else {
            return Errors::from(vec![Error::NotListening]);
        };

        let finished = Self::join(running, timeout, self.config.cancel_grace()).await;
        let errors = finished.errors.clone();
        self.finished = Some(finished);
        errors
    }

    /// [`await_satisfied`](Self::await_satisfied) with [`Config::await_timeout`].
    pub async fn await_satisfied_default(&mut self) -> Errors {
        self.await_satisfied(self.config.await_timeout()).await
    }

    async fn join(running: Running<T>, timeout: Duration, grace: Duration) -> Finished<T> {
        let Running { mut handle, cancel } = running;
        let mut errors = Errors::default();

        let joined = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(?timeout, "expecter not satisfied in time, cancelling consumer");
                errors.push(Error::Terminated(timeout));
                cancel.cancel();

                match tokio::time::timeout(grace, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!(?grace, "consumer ignored cancellation, aborting");
                        handle.abort();
                        errors.push(Error::Abandoned(grace));
                        return Finished::lost(errors);
                    }
                }
            }
        };

        match joined {
            Ok(outcome) => {
                if outcome.reason != StopReason::Satisfied {
                    tracing::debug!(reason = %outcome.reason, active = outcome.active, "expecter stopped early");
                }
                Finished::from_outcome(outcome, errors)
            }
            Err(e) => {
                tracing::error!(error = %e, "expecter consumer failed");
                errors.push(Error::from(e));
                Finished::lost(errors)
            }
        }
    }

    /// Await satisfaction and forward every failure to `reporter`.
    ///
    /// Returns `true` when nothing was reported. Failures are reported in
    /// this order:
    ///
    /// 1. a summary line when any message was rejected;
    /// 2. one `expecter error: ...` line per error, each rejection followed
    ///    by that message's trace unless the expecter is verbose;
    /// 3. a closing `failed to become satisfied` line.
    ///
    /// A verbose expecter then logs its full trace.
    pub async fn assert_satisfied_with<R: Reporter>(
        &mut self,
        mut reporter: R,
        timeout: Duration,
    ) -> bool {
        let errors = self.await_satisfied(timeout).await;
        if errors.is_empty() {
            return true;
        }

        let verbose = self.config.verbose();
        let rejected: Vec<(usize, usize)> = errors
            .rejections()
            .filter_map(|e| match e {
                Error::Rejection { index, layer, .. } => Some((*index, *layer)),
                _ => None,
            })
            .collect();
        if !rejected.is_empty() {
            let layers: BTreeSet<usize> = rejected.iter().map(|(_, layer)| *layer).collect();
            reporter.report_failure(format!(
                "received messages which could not be matched ({} messages, across {} layers)",
                rejected.len(),
                layers.len()
            ));
        }

        for error in &errors {
            let mut failure = format!("expecter error: {error}");
            if !verbose
                && let Error::Rejection { index, .. } = error
                && let Some(result) = self.processed_messages().get(*index)
            {
                failure.push('\n');
                let _ = result.write_to(&mut failure, false);
            }
            reporter.report_failure(failure);
        }

        if verbose {
            reporter.report_failure("failed to become satisfied".to_string());
            reporter.log(self.trace_string());
        } else {
            reporter.report_failure(
                "failed to become satisfied: HINT: enable verbose mode to trace every processed message"
                    .to_string(),
            );
        }
        false
    }

    /// Await satisfaction and panic with every failure if unsatisfied.
    ///
    /// Logs (the verbose trace) are printed to stderr first.
    pub async fn assert_satisfied(&mut self, timeout: Duration) {
        let mut recorder = Recorder::new();
        if self.assert_satisfied_with(&mut recorder, timeout).await {
            return;
        }

        for line in recorder.logs() {
            eprintln!("{line}");
        }
        panic!("{}", recorder.failures().join("\n"));
    }

    /// [`assert_satisfied`](Self::assert_satisfied) with [`Config::await_timeout`].
    pub async fn assert_satisfied_default(&mut self) {
        self.assert_satisfied(self.config.await_timeout()).await;
    }
}

impl<T, S> Expecter<T, S> {
    /// One entry per message read from the source, in arrival order.
    ///
    /// Empty until [`await_satisfied`](Self::await_satisfied) has collected
    /// the consumer's results.
    pub fn processed_messages(&self) -> &[MessageResult<T>] {
        self.finished
            .as_ref()
            .map(|f| f.results.as_slice())
            .unwrap_or_default()
    }

    /// Index of the layer active when the consumer stopped. Equals the
    /// number of layers once every layer was satisfied.
    pub fn active_layer(&self) -> Option<usize> {
        self.finished.as_ref().map(|f| f.active)
    }

    /// The layers, declared or finished. Empty while the consumer runs.
    pub fn layers(&self) -> &[Layer<T>] {
        match &self.finished {
            Some(finished) => &finished.layers,
            None => &self.layers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_listening(&self) -> bool {
        self.running.is_some()
    }
}

impl<T: fmt::Debug, S> Expecter<T, S> {
    /// Write a header followed by every processed message and its trace.
    pub fn write_trace<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        let verbose = self.config.verbose();
        if verbose {
            writeln!(w, "EXPECTER: verbose trace of processed messages follows:")?;
        } else {
            writeln!(w, "EXPECTER: trace of processed messages follows:")?;
        }
        for result in self.processed_messages() {
            result.write_to(w, verbose)?;
        }
        Ok(())
    }

    /// Print the trace to stdout.
    pub fn print_trace(&self) {
        print!("{}", self.trace_string());
    }

    fn trace_string(&self) -> String {
        let mut out = String::new();
        let _ = self.write_trace(&mut out);
        out
    }
}

impl<T, S> Drop for Expecter<T, S> {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}
