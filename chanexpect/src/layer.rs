use std::{fmt, time::Duration};

use tokio::time::Instant;

use crate::{Combiner, LayerMode, Trace, trace::index_list};

/// One stage of an ordered expectation sequence.
///
/// A layer groups combiners under [`LayerMode::And`] or [`LayerMode::Or`].
/// The expecter presents every non-ignored message to the active layer only;
/// once an accepted message leaves the layer satisfied, the expecter moves on
/// to the next layer and never returns.
///
/// # Timeouts
///
/// A layer may carry a timeout measured from its activation ([`begin`](Self::begin)).
/// Once it has elapsed every message is rejected without consulting the
/// combiners. Expiry does not retire the layer: it stays active and can no
/// longer become satisfied.
pub struct Layer<T> {
    combiners: Vec<Combiner<T>>,
    mode: LayerMode,
    index: usize,
    timeout: Option<Duration>,
    started_at: Option<Instant>,
    satisfied: bool,
    rejections: usize,
}

impl<T> fmt::Debug for Layer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("index", &self.index)
            .field("mode", &self.mode)
            .field("combiners", &self.combiners)
            .field("timeout", &self.timeout)
            .field("satisfied", &self.satisfied)
            .field("rejections", &self.rejections)
            .finish_non_exhaustive()
    }
}

impl<T: fmt::Debug> Layer<T> {
    pub fn new(
        index: usize,
        mode: LayerMode,
        timeout: Option<Duration>,
        combiners: Vec<Combiner<T>>,
    ) -> Self {
        Self {
            combiners,
            mode,
            index,
            timeout,
            started_at: None,
            satisfied: false,
            rejections: 0,
        }
    }

    /// Mark the layer as active. Only the first call has any effect: it
    /// starts the timeout clock, if the layer has one.
    pub fn begin(&mut self) {
        if self.timeout.is_none() || self.started_at.is_some() {
            return;
        }

        tracing::debug!(layer = self.index, timeout = ?self.timeout, "layer timeout started");
        self.started_at = Some(Instant::now());
    }

    /// Present a message to this layer's combiners.
    ///
    /// The first combiner to accept wins; later combiners are not tried.
    pub fn try_match(&mut self, message: &T) -> (bool, Trace) {
        let (ok, mut trace) = self.match_message(message);
        if !ok {
            self.rejections += 1;
        }

        trace.push(self.status_trace());
        (ok, trace)
    }

    fn match_message(&mut self, message: &T) -> (bool, Trace) {
        if self.timeout_elapsed() {
            return (
                false,
                Trace::info(format!(
                    "Message {message:?} REJECTED, timeout of layer ({:?}) has been reached",
                    self.timeout.unwrap_or_default()
                )),
            );
        }

        let mut traces = Vec::with_capacity(self.combiners.len());
        let mut accepted = None;
        for (idx, combiner) in self.combiners.iter_mut().enumerate() {
            let (ok, mut trace) = combiner.try_match(message);
            trace.prefix(&format!("Combiner #{idx}: "));
            traces.push(trace);

            if ok {
                accepted = Some(idx);
                break;
            }
        }
        self.update_satisfied();

        match accepted {
            Some(idx) => (
                true,
                Trace::info(format!(
                    "Layer #{} matched message against combiner #{idx}",
                    self.index
                ))
                .with_children(traces),
            ),
            None => (
                false,
                Trace::info(format!(
                    "Layer #{} could not match message against any combiners",
                    self.index
                ))
                .with_children(traces),
            ),
        }
    }

    fn update_satisfied(&mut self) {
        self.satisfied = match self.mode {
            LayerMode::And => self.combiners.iter().all(Combiner::is_satisfied),
            LayerMode::Or => self.combiners.iter().any(Combiner::is_satisfied),
        };
    }

    fn timeout_elapsed(&self) -> bool {
        match (self.timeout, self.started_at) {
            (Some(timeout), Some(started_at)) => started_at.elapsed() > timeout,
            _ => false,
        }
    }

    fn status_trace(&self) -> Trace {
        Trace::debug("Layer status").with_children(vec![
            Trace::info(format!("{} mode", self.mode)),
            self.combiners_trace(),
        ])
    }

    fn combiners_trace(&self) -> Trace {
        let (satisfied, pending): (Vec<usize>, Vec<usize>) =
            (0..self.combiners.len()).partition(|&i| self.combiners[i].is_satisfied());
        let total = self.combiners.len();

        let text = match self.mode {
            LayerMode::And if satisfied.is_empty() => {
                format!("NOT satisfied: no combiners satisfied (of {total})")
            }
            LayerMode::And if pending.is_empty() => {
                format!("SATISFIED: all combiners satisfied ({total})")
            }
            LayerMode::And => format!(
                "NOT satisfied: only combiners {} satisfied, {} NOT yet satisfied",
                index_list(&satisfied),
                index_list(&pending)
            ),
            LayerMode::Or if satisfied.is_empty() => {
                format!("NOT satisfied: no combiners satisfied (of {total})")
            }
            LayerMode::Or => format!(
                "SATISFIED: combiners {} satisfied, OR mode needs only one",
                index_list(&satisfied)
            ),
        };
        Trace::info(text)
    }
}

impl<T> Layer<T> {
    #[inline]
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    /// Position of this layer in the expecter.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mode(&self) -> LayerMode {
        self.mode
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns true once `begin` has started the timeout clock.
    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Number of messages this layer rejected, timeouts included.
    pub fn rejections(&self) -> usize {
        self.rejections
    }

    pub fn combiners(&self) -> &[Combiner<T>] {
        &self.combiners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoxMatcher, all_of, eq, exactly_n_of, one_of};

    fn needs(word: &'static str) -> Combiner<&'static str> {
        let matchers: Vec<BoxMatcher<&'static str>> = vec![eq(word)];
        all_of(matchers).unwrap()
    }

    fn layer(mode: LayerMode, combiners: Vec<Combiner<&'static str>>) -> Layer<&'static str> {
        let mut layer = Layer::new(0, mode, None, combiners);
        layer.begin();
        layer
    }

    #[test]
    fn and_layer_is_satisfied_in_any_delivery_order() {
        for order in [["a", "b"], ["b", "a"]] {
            let mut l = layer(LayerMode::And, vec![needs("a"), needs("b")]);
            assert!(l.try_match(&order[0]).0);
            assert!(!l.is_satisfied());
            assert!(l.try_match(&order[1]).0);
            assert!(l.is_satisfied(), "order {order:?} should satisfy");
        }
    }

    #[test]
    fn or_layer_is_satisfied_by_one_combiner() {
        let mut l = layer(LayerMode::Or, vec![needs("a"), needs("b")]);
        assert!(l.try_match(&"b").0);
        assert!(l.is_satisfied());
    }

    #[test]
    fn first_accepting_combiner_wins() {
        let both: Vec<BoxMatcher<&'static str>> = vec![eq("x")];
        let mut l = layer(
            LayerMode::And,
            vec![exactly_n_of(1, both).unwrap(), needs("x")],
        );

        let (ok, trace) = l.try_match(&"x");
        assert!(ok);
        assert!(trace.contains("matched message against combiner #0"));
        assert_eq!(l.combiners()[1].counts(), &[0]);

        // First combiner is saturated now, so the second one takes it.
        let (ok, trace) = l.try_match(&"x");
        assert!(ok);
        assert!(trace.contains("matched message against combiner #1"));
        assert!(l.is_satisfied());
    }

    #[test]
    fn unmatched_messages_count_as_rejections() {
        let mut l = layer(LayerMode::And, vec![needs("a")]);
        let (ok, trace) = l.try_match(&"zzz");
        assert!(!ok);
        assert_eq!(l.rejections(), 1);
        assert!(trace.contains("could not match message against any combiners"));
        assert!(trace.contains("Combiner #0: Combiner failed to match message"));
    }

    #[test]
    fn status_trace_is_debug_only() {
        let mut l = layer(LayerMode::And, vec![needs("a"), needs("b")]);
        let (_, trace) = l.try_match(&"a");
        assert!(!trace.render(false).contains("Layer status"));

        let verbose = trace.render(true);
        assert!(verbose.contains("- Layer status\n"));
        assert!(verbose.contains("- AND mode\n"));
        assert!(verbose.contains("NOT satisfied: only combiners [#0] satisfied, [#1] NOT yet satisfied"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rejects_without_consulting_combiners() {
        let mut l = Layer::new(
            0,
            LayerMode::And,
            Some(Duration::from_millis(500)),
            vec![one_of(vec![eq("hello")]).unwrap()],
        );
        l.begin();
        assert!(l.has_started());

        tokio::time::advance(Duration::from_millis(600)).await;
        l.begin();

        let (ok, trace) = l.try_match(&"hello");
        assert!(!ok);
        assert!(!l.is_satisfied());
        assert_eq!(l.combiners()[0].counts(), &[0]);
        assert_eq!(l.rejections(), 1);
        assert!(
            trace.contains("Message \"hello\" REJECTED, timeout of layer (500ms) has been reached")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn messages_before_timeout_are_matched() {
        let mut l = Layer::new(
            0,
            LayerMode::And,
            Some(Duration::from_millis(500)),
            vec![needs("hello")],
        );
        l.begin();
        tokio::time::advance(Duration::from_millis(499)).await;

        assert!(l.try_match(&"hello").0);
        assert!(l.is_satisfied());
    }

    #[tokio::test(start_paused = true)]
    async fn message_at_exact_timeout_is_accepted() {
        let mut l = Layer::new(
            0,
            LayerMode::And,
            Some(Duration::from_millis(500)),
            vec![needs("hello")],
        );
        l.begin();
        tokio::time::advance(Duration::from_millis(500)).await;

        assert!(!l.timeout_elapsed());
        assert!(l.try_match(&"hello").0);
        assert!(l.is_satisfied());
    }

    #[test]
    fn begin_without_timeout_is_a_no_op() {
        let mut l = Layer::new(3, LayerMode::Or, None, vec![needs("a")]);
        l.begin();
        assert!(!l.has_started());
        assert_eq!(l.index(), 3);
        assert!(l.mode().is_or());
    }
}
