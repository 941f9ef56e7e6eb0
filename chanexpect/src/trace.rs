use std::fmt;

/// Verbosity of a [`Trace`] entry.
///
/// `Info` entries are always rendered. `Debug` entries (and everything nested
/// under them) are only rendered when the expecter is verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TraceLevel {
    #[default]
    Info,
    Debug,
}

/// A nested diagnostic record explaining one match decision.
///
/// Built fresh for every message the expecter processes and attached to its
/// [`MessageResult`](crate::MessageResult).
///
/// # Rendering
///
/// Each entry renders as one line, indented by two spaces per nesting level
/// and prefixed with `- `:
///
/// ```text
/// - Layer #0 matched message against combiner #0
///   - Combiner #0: Combiner matched on matcher #1
///     - Matcher #0 REJECT: no match
///     - Matcher #1 ACCEPT
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Trace {
    message: String,
    children: Vec<Trace>,
    level: TraceLevel,
}

impl Trace {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            children: Vec::new(),
            level: TraceLevel::Info,
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            children: Vec::new(),
            level: TraceLevel::Debug,
        }
    }

    /// Attach nested entries, replacing any existing children.
    pub fn with_children(mut self, children: Vec<Trace>) -> Self {
        self.children = children;
        self
    }

    pub(crate) fn push(&mut self, child: Trace) {
        self.children.push(child);
    }

    pub(crate) fn prefix(&mut self, prefix: &str) {
        self.message.insert_str(0, prefix);
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn children(&self) -> &[Trace] {
        &self.children
    }

    #[inline]
    pub fn level(&self) -> TraceLevel {
        self.level
    }

    /// Returns `true` if this entry or any descendant contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.message.contains(needle) || self.children.iter().any(|c| c.contains(needle))
    }

    /// Write this trace at the given nesting depth.
    ///
    /// Debug entries are skipped unless `verbose` is set.
    pub fn write_to<W: fmt::Write>(&self, w: &mut W, depth: usize, verbose: bool) -> fmt::Result {
        if self.level == TraceLevel::Debug && !verbose {
            return Ok(());
        }

        writeln!(w, "{}- {}", "  ".repeat(depth), self.message)?;
        for child in &self.children {
            child.write_to(w, depth + 1, verbose)?;
        }
        Ok(())
    }

    /// Render to a string starting at depth 0.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        let _ = self.write_to(&mut out, 0, verbose);
        out
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f, 0, f.alternate())
    }
}

/// Formats matcher/combiner indexes as `[#0, #2]`.
pub(crate) fn index_list(indexes: &[usize]) -> String {
    let items: Vec<String> = indexes.iter().map(|i| format!("#{i}")).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_list_formats_hash_prefixed_entries() {
        assert_eq!(index_list(&[]), "[]");
        assert_eq!(index_list(&[0, 2]), "[#0, #2]");
    }

    fn sample() -> Trace {
        Trace::info("root").with_children(vec![
            Trace::info("child").with_children(vec![Trace::info("grandchild")]),
            Trace::debug("details").with_children(vec![Trace::info("hidden unless verbose")]),
        ])
    }

    #[test]
    fn renders_nested_entries_with_indentation() {
        let expected = "- root\n  - child\n    - grandchild\n";
        assert_eq!(sample().render(false), expected);
    }

    #[test]
    fn verbose_renders_debug_entries_and_their_children() {
        let expected = "- root\n  - child\n    - grandchild\n  - details\n    - hidden unless verbose\n";
        assert_eq!(sample().render(true), expected);
    }

    #[test]
    fn write_to_honours_starting_depth() {
        let mut out = String::new();
        Trace::info("x").write_to(&mut out, 2, false).unwrap();
        assert_eq!(out, "    - x\n");
    }

    #[test]
    fn display_alternate_is_verbose() {
        let trace = sample();
        assert_eq!(format!("{trace}"), trace.render(false));
        assert_eq!(format!("{trace:#}"), trace.render(true));
    }

    #[test]
    fn prefix_and_push_modify_in_place() {
        let mut trace = Trace::info("matched");
        trace.prefix("Combiner #3: ");
        trace.push(Trace::debug("status"));

        assert_eq!(trace.message(), "Combiner #3: matched");
        assert_eq!(trace.children().len(), 1);
        assert_eq!(trace.children()[0].level(), TraceLevel::Debug);
        assert!(trace.contains("status"));
        assert!(!trace.contains("missing"));
    }
}
