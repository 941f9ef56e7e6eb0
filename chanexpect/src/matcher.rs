//! Leaf predicates tested against individual messages.

use std::fmt;

/// A stateless predicate deciding whether one message has a given shape.
///
/// Matchers never keep state between calls; all counting happens in the
/// [`Combiner`](crate::Combiner) that owns them. Implement this trait for
/// domain-specific comparisons, or use the constructors in this module:
///
/// - [`eq`] - equality against a value
/// - [`contains`] - substring test for string-like messages
/// - [`predicate`] - arbitrary closure
/// - [`not`] - negation of another matcher
/// - `subset` - JSON field-subset comparison (requires the `serde` feature)
pub trait Matcher<T>: Send + Sync {
    /// Returns true if the message matches.
    fn matches(&self, message: &T) -> bool;
}

/// Type-erased matcher, as stored by combiners and ignore lists.
pub type BoxMatcher<T> = Box<dyn Matcher<T>>;

/// Matches messages equal to a target value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equal<V> {
    target: V,
}

impl<T, V> Matcher<T> for Equal<V>
where
    T: PartialEq<V>,
    V: Send + Sync + 'static,
{
    fn matches(&self, message: &T) -> bool {
        *message == self.target
    }
}

/// Matches string-like messages containing a substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contains {
    needle: String,
}

impl<T: AsRef<str>> Matcher<T> for Contains {
    fn matches(&self, message: &T) -> bool {
        message.as_ref().contains(self.needle.as_str())
    }
}

/// Matches messages for which a closure returns `true`.
pub struct Predicate<F> {
    predicate: F,
}

impl<F> fmt::Debug for Predicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").finish_non_exhaustive()
    }
}

impl<T, F> Matcher<T> for Predicate<F>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn matches(&self, message: &T) -> bool {
        (self.predicate)(message)
    }
}

/// Inverts another matcher.
pub struct Not<T> {
    inner: BoxMatcher<T>,
}

impl<T> fmt::Debug for Not<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Not").finish_non_exhaustive()
    }
}

impl<T: 'static> Matcher<T> for Not<T> {
    fn matches(&self, message: &T) -> bool {
        !self.inner.matches(message)
    }
}

/// Match messages equal to `value`.
///
/// The message type only needs `PartialEq<V>`, so `eq("hello")` works for
/// `String` messages.
pub fn eq<T, V>(value: V) -> BoxMatcher<T>
where
    T: PartialEq<V> + 'static,
    V: Send + Sync + 'static,
{
    Box::new(Equal { target: value })
}

/// Match string-like messages containing `needle`.
pub fn contains<T: AsRef<str> + 'static>(needle: impl Into<String>) -> BoxMatcher<T> {
    Box::new(Contains {
        needle: needle.into(),
    })
}

/// Match messages using a custom predicate.
///
/// ```ignore
/// let big = predicate(|n: &u32| *n > 100);
/// ```
pub fn predicate<T, F>(f: F) -> BoxMatcher<T>
where
    T: 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Box::new(Predicate { predicate: f })
}

/// Match messages the given matcher rejects.
pub fn not<T: 'static>(matcher: BoxMatcher<T>) -> BoxMatcher<T> {
    Box::new(Not { inner: matcher })
}

#[cfg(feature = "serde")]
mod subset {
    use serde::Serialize;
    use serde_json::Value;

    use super::{BoxMatcher, Matcher};

    /// Matches serializable messages whose JSON form contains every field of
    /// the target.
    ///
    /// Objects are compared field by field (extra message fields are
    /// ignored, nested objects recurse). Every other JSON value, arrays
    /// included, must be equal.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Subset {
        target: Value,
    }

    impl<T: Serialize> Matcher<T> for Subset {
        fn matches(&self, message: &T) -> bool {
            match serde_json::to_value(message) {
                Ok(value) => is_subset(&self.target, &value),
                Err(e) => {
                    tracing::warn!(error = %e, "subset matcher failed to serialize message");
                    false
                }
            }
        }
    }

    fn is_subset(target: &Value, actual: &Value) -> bool {
        match (target, actual) {
            (Value::Object(want), Value::Object(have)) => want
                .iter()
                .all(|(k, v)| have.get(k).is_some_and(|h| is_subset(v, h))),
            _ => target == actual,
        }
    }

    /// Match messages whose serialized form contains every field in `target`.
    ///
    /// ```ignore
    /// let matcher = subset(serde_json::json!({ "kind": "order", "qty": 2 }));
    /// ```
    pub fn subset<T: Serialize + 'static>(target: Value) -> BoxMatcher<T> {
        Box::new(Subset { target })
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub use subset::{Subset, subset};

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Order {
        id: u32,
        side: &'static str,
    }

    #[test]
    fn eq_matches_equal_values() {
        let m: BoxMatcher<String> = eq("hello");
        assert!(m.matches(&"hello".to_string()));
        assert!(!m.matches(&"world".to_string()));

        let m: BoxMatcher<i64> = eq(42);
        assert!(m.matches(&42));
        assert!(!m.matches(&-42));
    }

    #[test]
    fn eq_compares_whole_structs() {
        let m = eq(Order { id: 1, side: "buy" });
        assert!(m.matches(&Order { id: 1, side: "buy" }));
        assert!(!m.matches(&Order { id: 1, side: "sell" }));
    }

    #[test]
    fn contains_checks_substring() {
        let m: BoxMatcher<&str> = contains("oo");
        assert!(m.matches(&"foo"));
        assert!(m.matches(&"fooey"));
        assert!(!m.matches(&"fo"));
    }

    #[test]
    fn predicate_uses_closure() {
        let m = predicate(|o: &Order| o.id > 10);
        assert!(m.matches(&Order { id: 11, side: "buy" }));
        assert!(!m.matches(&Order { id: 3, side: "buy" }));
    }

    #[test]
    fn not_inverts_inner_matcher() {
        let m: BoxMatcher<String> = not(eq("ping"));
        assert!(m.matches(&"pong".to_string()));
        assert!(!m.matches(&"ping".to_string()));
    }

    #[test]
    fn matchers_work_on_borrowed_messages() {
        let owned = String::from("abc");
        let message: &str = owned.as_str();

        let m = Contains { needle: "b".into() };
        assert!(Matcher::<&str>::matches(&m, &message));

        let m = Equal { target: "abc" };
        assert!(Matcher::<&str>::matches(&m, &message));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn subset_ignores_extra_fields() {
        use serde_json::json;

        #[derive(serde::Serialize)]
        struct Fill {
            id: u32,
            side: &'static str,
            meta: Meta,
        }

        #[derive(serde::Serialize)]
        struct Meta {
            venue: &'static str,
            latency_us: u64,
        }

        let fill = Fill {
            id: 7,
            side: "buy",
            meta: Meta {
                venue: "x",
                latency_us: 12,
            },
        };

        assert!(subset::<Fill>(json!({ "side": "buy" })).matches(&fill));
        assert!(subset::<Fill>(json!({ "meta": { "venue": "x" } })).matches(&fill));
        assert!(!subset::<Fill>(json!({ "side": "sell" })).matches(&fill));
        assert!(!subset::<Fill>(json!({ "missing": 1 })).matches(&fill));
    }
}
