use std::fmt;

/// How a [`Combiner`](crate::Combiner) counts matches against its bounds.
///
/// | Mode | Satisfied when | Saturated when |
/// |------|----------------|----------------|
/// | [`Each`](Self::Each) | every matcher's count is within `[min, max]` | every matcher reached `max` |
/// | [`Any`](Self::Any) | at least one matcher's count is within `[min, max]` | any matcher reached `max` |
/// | [`Sum`](Self::Sum) | the total of all counts is within `[min, max]` | the total reached `max` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CombinerMode {
    Each,
    Any,
    Sum,
}

impl fmt::Display for CombinerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinerMode::Each => write!(f, "EACH"),
            CombinerMode::Any => write!(f, "ANY"),
            CombinerMode::Sum => write!(f, "SUM"),
        }
    }
}

/// How a [`Layer`](crate::Layer) composes its combiners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayerMode {
    /// Satisfied once every combiner is satisfied.
    #[default]
    And,
    /// Satisfied once any combiner is satisfied.
    Or,
}

impl LayerMode {
    pub fn is_and(&self) -> bool {
        matches!(self, LayerMode::And)
    }

    pub fn is_or(&self) -> bool {
        matches!(self, LayerMode::Or)
    }
}

impl fmt::Display for LayerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerMode::And => write!(f, "AND"),
            LayerMode::Or => write!(f, "OR"),
        }
    }
}
