use std::fmt;

use crate::{BoxMatcher, CombinerMode, Error, Result, Trace, trace::index_list};

/// A quantified rule over a fixed set of matchers.
///
/// A combiner counts how many messages each of its matchers accepted and
/// compares those counts against `[min, max]` according to its
/// [`CombinerMode`]. It reports two derived flags after every attempt:
///
/// - **satisfied**: the minimum has been met, so the owning layer may move on.
/// - **saturated**: the maximum has been met, so every further message is
///   rejected without consulting the matchers.
///
/// Matchers are tried in declaration order and the first one that accepts
/// is credited. With overlapping matchers this is greedy: a broad matcher
/// declared first can take a message that a later, narrower matcher needed.
///
/// Use the constructor functions rather than [`Combiner::new`]:
///
/// ```ignore
/// use chanexpect::*;
///
/// let handshake = all_of([eq("hello"), eq("world")])?;
/// let heartbeat = at_least_n_of(3, [eq("ping")])?;
/// let reply = one_of([eq("ok"), eq("done")])?;
/// ```
pub struct Combiner<T> {
    matchers: Vec<BoxMatcher<T>>,
    counts: Vec<usize>,
    mode: CombinerMode,
    min: usize,
    max: Option<usize>,
    satisfied: bool,
    saturated: bool,
}

impl<T> fmt::Debug for Combiner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combiner")
            .field("mode", &self.mode)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("counts", &self.counts)
            .field("satisfied", &self.satisfied)
            .field("saturated", &self.saturated)
            .finish_non_exhaustive()
    }
}

impl<T> Combiner<T> {
    /// Create a combiner with explicit mode and bounds. `max: None` means unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCombiner`] if no matchers are given and
    /// [`Error::InvalidBounds`] if `min > max`.
    pub fn new(
        mode: CombinerMode,
        min: usize,
        max: Option<usize>,
        matchers: impl IntoIterator<Item = BoxMatcher<T>>,
    ) -> Result<Self> {
        let matchers: Vec<_> = matchers.into_iter().collect();
        if matchers.is_empty() {
            return Err(Error::EmptyCombiner);
        }
        if let Some(max) = max
            && min > max
        {
            return Err(Error::InvalidBounds { min, max });
        }

        Ok(Self {
            counts: vec![0; matchers.len()],
            matchers,
            mode,
            min,
            max,
            satisfied: false,
            saturated: false,
        })
    }

    /// Attempt to match a message, returning whether it was accepted along
    /// with a trace of the decision and the combiner's resulting status.
    pub fn try_match(&mut self, message: &T) -> (bool, Trace) {
        let (ok, mut trace) = self.match_message(message);

        let satisfied = self.update_satisfied();
        let saturated = self.update_saturated();
        trace.push(Trace::info("Combiner status").with_children(vec![
            Trace::info(format!(
                "{} mode with minimum of {} and maximum of {}",
                self.mode,
                self.min,
                self.max_label()
            )),
            satisfied,
            saturated,
            self.counts_trace(),
        ]));

        (ok, trace)
    }

    fn match_message(&mut self, message: &T) -> (bool, Trace) {
        if self.saturated {
            return (
                false,
                Trace::info("Combiner is fully saturated, accepting no further messages"),
            );
        }

        let mut attempts = Vec::with_capacity(self.matchers.len());
        for (i, matcher) in self.matchers.iter().enumerate() {
            if !matcher.matches(message) {
                attempts.push(Trace::info(format!("Matcher #{i} REJECT: no match")));
                continue;
            }

            if self.mode == CombinerMode::Each && self.reached_max(self.counts[i]) {
                attempts.push(Trace::info(format!(
                    "Matcher #{i} REJECT: matcher has already matched maximum allowed messages"
                )));
                continue;
            }

            self.counts[i] += 1;
            attempts.push(Trace::info(format!("Matcher #{i} ACCEPT")));
            return (
                true,
                Trace::info(format!("Combiner matched on matcher #{i}")).with_children(attempts),
            );
        }

        (
            false,
            Trace::info("Combiner failed to match message").with_children(attempts),
        )
    }

    fn update_satisfied(&mut self) -> Trace {
        let (satisfied, reason) = match self.mode {
            CombinerMode::Each => {
                let missing = self.indexes_where(|c| c == 0);
                if self.min > 0 && !missing.is_empty() {
                    (
                        false,
                        format!(
                            "EACH matcher needs to match at least {} messages, but matchers {} have yet to match any messages",
                            self.min,
                            index_list(&missing)
                        ),
                    )
                } else {
                    let outside = self.indexes_where(|c| !self.within(c));
                    if outside.is_empty() {
                        (
                            true,
                            format!("EACH matcher has matched at least {} messages", self.min),
                        )
                    } else {
                        (
                            false,
                            format!(
                                "EACH matcher needs to match between {} and {} messages, but matchers {} have not",
                                self.min,
                                self.max_label(),
                                index_list(&outside)
                            ),
                        )
                    }
                }
            }
            CombinerMode::Any => match self.counts.iter().position(|&c| self.within(c)) {
                Some(i) => (
                    true,
                    format!(
                        "Matcher #{i} has matched against minimum messages ({})",
                        self.min
                    ),
                ),
                None => (
                    false,
                    format!(
                        "ANY matcher needs to match at least {} messages, but none have",
                        self.min
                    ),
                ),
            },
            CombinerMode::Sum => {
                let total = self.total();
                if self.within(total) {
                    (
                        true,
                        format!(
                            "SUM of all matched messages ({total}) has met minimum ({}) messages",
                            self.min
                        ),
                    )
                } else {
                    (
                        false,
                        format!(
                            "SUM of all matched messages ({total}) must be between {} and {}",
                            self.min,
                            self.max_label()
                        ),
                    )
                }
            }
        };

        self.satisfied = satisfied;
        let label = if satisfied { "Satisfied" } else { "NOT satisfied" };
        Trace::info(label).with_children(vec![Trace::debug(reason)])
    }

    fn update_saturated(&mut self) -> Trace {
        let (saturated, reason) = match (self.mode, self.max) {
            (_, None) => (
                false,
                format!("{} mode has no maximum, never saturates", self.mode),
            ),
            (CombinerMode::Each, Some(max)) => {
                let pending = self.indexes_where(|c| c < max);
                if pending.is_empty() {
                    (
                        true,
                        format!("EACH matcher has matched maximum allowed messages ({max})"),
                    )
                } else {
                    (
                        false,
                        format!(
                            "EACH matcher needs to match {max} messages, but matchers {} have not",
                            index_list(&pending)
                        ),
                    )
                }
            }
            (CombinerMode::Any, Some(max)) => match self.counts.iter().position(|&c| c >= max) {
                Some(i) => (
                    true,
                    format!("Matcher #{i} has matched against maximum messages ({max})"),
                ),
                None => (
                    false,
                    format!("ANY matcher needs to match {max} messages, but none have"),
                ),
            },
            (CombinerMode::Sum, Some(max)) => {
                let total = self.total();
                if total >= max {
                    (
                        true,
                        format!(
                            "SUM of all matched messages ({total}) has met maximum ({max}) messages"
                        ),
                    )
                } else {
                    (
                        false,
                        format!("SUM of all matched messages ({total}) must reach {max}"),
                    )
                }
            }
        };

        self.saturated = saturated;
        let label = if saturated { "Saturated" } else { "NOT saturated" };
        Trace::info(label).with_children(vec![Trace::debug(reason)])
    }

    fn counts_trace(&self) -> Trace {
        let details = self
            .counts
            .iter()
            .enumerate()
            .map(|(i, &c)| match c {
                0 => Trace::info(format!("Matcher #{i} => 0 messages")),
                c => Trace::info(format!("Matcher #{i} => {c} message(s)")),
            })
            .collect();
        Trace::debug("Matcher counts").with_children(details)
    }

    fn indexes_where(&self, pred: impl Fn(usize) -> bool) -> Vec<usize> {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| pred(c))
            .map(|(i, _)| i)
            .collect()
    }

    #[inline]
    fn within(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }

    #[inline]
    fn reached_max(&self, count: usize) -> bool {
        self.max.is_some_and(|max| count >= max)
    }

    fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    fn max_label(&self) -> String {
        match self.max {
            Some(max) => max.to_string(),
            None => "unbounded".to_string(),
        }
    }

    /// Returns true once the minimum number of matches has been met.
    #[inline]
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    /// Returns true once the combiner can accept no further messages.
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    /// Per-matcher match counts, indexed by declaration order.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn mode(&self) -> CombinerMode {
        self.mode
    }

    /// Returns `(min, max)`; `max` is `None` when unbounded.
    pub fn bounds(&self) -> (usize, Option<usize>) {
        (self.min, self.max)
    }

    /// Number of matchers.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

/// Satisfied once every matcher has matched exactly one message.
///
/// A matcher that already matched rejects duplicates; use
/// [`at_least_n_of_each`] to allow them.
pub fn all_of<T>(matchers: impl IntoIterator<Item = BoxMatcher<T>>) -> Result<Combiner<T>> {
    exactly_n_of_each(1, matchers)
}

/// Satisfied by the first message any matcher accepts; accepts nothing after.
pub fn one_of<T>(matchers: impl IntoIterator<Item = BoxMatcher<T>>) -> Result<Combiner<T>> {
    exactly_n_of(1, matchers)
}

/// Satisfied once each matcher has matched at least `n` messages.
pub fn at_least_n_of_each<T>(
    n: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Each, n, None, matchers)
}

/// Satisfied once each matcher has matched between `min` and `max` messages.
pub fn between_n_of_each<T>(
    min: usize,
    max: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Each, min, Some(max), matchers)
}

/// Satisfied once each matcher has matched exactly `n` messages.
pub fn exactly_n_of_each<T>(
    n: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Each, n, Some(n), matchers)
}

/// Satisfied once any single matcher has matched at least `n` messages.
pub fn at_least_n_of_any<T>(
    n: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Any, n, None, matchers)
}

/// Satisfied once any single matcher has matched between `min` and `max` messages.
pub fn between_n_of_any<T>(
    min: usize,
    max: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Any, min, Some(max), matchers)
}

/// Satisfied once any single matcher has matched exactly `n` messages.
pub fn exactly_n_of_any<T>(
    n: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Any, n, Some(n), matchers)
}

/// Satisfied once the matchers together have matched at least `n` messages.
pub fn at_least_n_of<T>(
    n: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Sum, n, None, matchers)
}

/// Satisfied once the matchers together have matched between `min` and `max` messages.
pub fn between_n_of<T>(
    min: usize,
    max: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Sum, min, Some(max), matchers)
}

/// Satisfied once the matchers together have matched exactly `n` messages.
pub fn exactly_n_of<T>(
    n: usize,
    matchers: impl IntoIterator<Item = BoxMatcher<T>>,
) -> Result<Combiner<T>> {
    Combiner::new(CombinerMode::Sum, n, Some(n), matchers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{contains, eq};

    /// Feed `messages` and check acceptance and satisfaction after each one.
    fn run(combiner: &mut Combiner<&'static str>, steps: &[(&'static str, bool, bool)]) {
        for (i, (msg, accept, satisfied)) in steps.iter().enumerate() {
            let (ok, trace) = combiner.try_match(msg);
            assert_eq!(
                ok,
                *accept,
                "message #{i} ({msg:?}) acceptance mismatch\n{}",
                trace.render(true)
            );
            assert_eq!(
                combiner.is_satisfied(),
                *satisfied,
                "message #{i} ({msg:?}) satisfaction mismatch\n{}",
                trace.render(true)
            );
        }
    }

    fn hello_world() -> Vec<BoxMatcher<&'static str>> {
        vec![eq("hello"), eq("world")]
    }

    #[test]
    fn empty_matchers_are_rejected() {
        let err = all_of::<&str>([]).unwrap_err();
        assert_eq!(err, Error::EmptyCombiner);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = between_n_of(3, 1, hello_world()).unwrap_err();
        assert_eq!(err, Error::InvalidBounds { min: 3, max: 1 });
    }

    #[test]
    fn all_of_rejects_duplicates_of_exhausted_matcher() {
        let mut c = all_of(hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("hello", true, false),
                ("hello", false, false),
                ("world", true, true),
            ],
        );
        assert!(c.is_saturated());
        assert_eq!(c.counts(), &[1, 1]);
    }

    #[test]
    fn all_of_accepts_any_order_and_ignores_noise() {
        let mut c = all_of(hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("foo", false, false),
                ("world", true, false),
                ("bar", false, false),
                ("hello", true, true),
                ("baz", false, true),
            ],
        );
    }

    #[test]
    fn one_of_accepts_single_message_then_saturates() {
        let mut c = one_of(hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("foo", false, false),
                ("world", true, true),
                ("hello", false, true),
            ],
        );
        assert!(c.is_saturated());
    }

    #[test]
    fn exactly_n_of_rejects_the_extra_message() {
        let mut c = exactly_n_of(3, hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("hello", true, false),
                ("world", true, false),
                ("hello", true, true),
                ("world", false, true),
            ],
        );
        assert_eq!(c.counts(), &[2, 1]);
    }

    #[test]
    fn at_least_n_of_each_keeps_accepting() {
        let mut c = at_least_n_of_each(2, hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("hello", true, false),
                ("hello", true, false),
                ("world", true, false),
                ("world", true, true),
                ("hello", true, true),
            ],
        );
        assert!(!c.is_saturated());
    }

    #[test]
    fn between_n_of_each_exhausts_matchers_individually() {
        let mut c = between_n_of_each(1, 2, hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("hello", true, false),
                ("hello", true, false),
                ("hello", false, false),
                ("world", true, true),
                ("world", true, true),
            ],
        );
        assert!(c.is_saturated());
        let (ok, trace) = c.try_match(&"world");
        assert!(!ok);
        assert!(trace.contains("fully saturated"));
    }

    #[test]
    fn any_mode_needs_one_matcher_within_bounds() {
        let mut c = exactly_n_of_any(2, hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("hello", true, false),
                ("world", true, false),
                ("world", true, true),
                ("hello", false, true),
            ],
        );
        assert!(c.is_saturated());
    }

    #[test]
    fn between_n_of_any_is_satisfied_before_saturation() {
        let mut c = between_n_of_any(1, 3, hello_world()).unwrap();
        run(&mut c, &[("world", true, true), ("world", true, true)]);
        assert!(!c.is_saturated());
    }

    #[test]
    fn at_least_n_of_any_never_saturates() {
        let mut c = at_least_n_of_any(2, hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("hello", true, false),
                ("world", true, false),
                ("hello", true, true),
                ("hello", true, true),
            ],
        );
        assert!(!c.is_saturated());
    }

    #[test]
    fn sum_mode_pools_all_matchers() {
        let mut c = between_n_of(2, 3, hello_world()).unwrap();
        run(
            &mut c,
            &[
                ("hello", true, false),
                ("world", true, true),
                ("hello", true, true),
                ("world", false, true),
            ],
        );

        let mut c = at_least_n_of(2, hello_world()).unwrap();
        run(
            &mut c,
            &[("hello", true, false), ("hello", true, true), ("world", true, true)],
        );
    }

    #[test]
    fn overlapping_matchers_are_credited_greedily() {
        let matchers: Vec<BoxMatcher<&'static str>> =
            vec![contains("foo"), contains("foo"), contains("fo"), contains("fooey")];

        let mut in_order = all_of(matchers).unwrap();
        for msg in ["foo", "foo", "fo", "fooey"] {
            assert!(in_order.try_match(&msg).0, "{msg} should be accepted");
        }
        assert!(in_order.is_satisfied());

        let matchers: Vec<BoxMatcher<&'static str>> =
            vec![contains("foo"), contains("foo"), contains("fo"), contains("fooey")];
        let mut out_of_order = all_of(matchers).unwrap();
        assert!(out_of_order.try_match(&"foo").0);
        // "fooey" is taken by the second "foo" matcher, not the "fooey" one.
        assert!(out_of_order.try_match(&"fooey").0);
        assert!(out_of_order.try_match(&"fo").0);
        assert!(!out_of_order.try_match(&"foo").0);
        assert!(!out_of_order.is_satisfied());
        assert_eq!(out_of_order.counts(), &[1, 1, 1, 0]);
    }

    #[test]
    fn zero_minimum_each_is_satisfied_after_first_attempt() {
        let mut c = between_n_of_each(0, 1, hello_world()).unwrap();
        assert!(!c.is_satisfied());
        let (ok, _) = c.try_match(&"nope");
        assert!(!ok);
        assert!(c.is_satisfied());
    }

    #[test]
    fn trace_describes_accept_and_status() {
        let mut c = all_of(hello_world()).unwrap();
        let (_, trace) = c.try_match(&"world");

        let expected = "\
- Combiner matched on matcher #1
  - Matcher #0 REJECT: no match
  - Matcher #1 ACCEPT
  - Combiner status
    - EACH mode with minimum of 1 and maximum of 1
    - NOT satisfied
    - NOT saturated
";
        assert_eq!(trace.render(false), expected);

        let verbose = trace.render(true);
        assert!(verbose.contains(
            "EACH matcher needs to match at least 1 messages, but matchers [#0] have yet to match any messages"
        ));
        assert!(verbose.contains("- Matcher counts\n"));
        assert!(verbose.contains("- Matcher #0 => 0 messages\n"));
        assert!(verbose.contains("- Matcher #1 => 1 message(s)\n"));
    }

    #[test]
    fn unbounded_maximum_is_labelled() {
        let mut c = at_least_n_of(1, hello_world()).unwrap();
        let (_, trace) = c.try_match(&"hello");
        assert!(trace.contains("SUM mode with minimum of 1 and maximum of unbounded"));
        assert_eq!(c.bounds(), (1, None));
        assert_eq!(c.mode(), CombinerMode::Sum);
        assert_eq!(c.len(), 2);
    }
}
