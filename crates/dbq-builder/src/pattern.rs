//! LIKE pattern helper

/// Builds a `%`-wildcard pattern for `LIKE` comparisons.
///
/// An explicit [`with_pattern`](Pattern::with_pattern) wins over the
/// prefix/contains/suffix parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    pattern: Option<String>,
    starts_with: Option<String>,
    ends_with: Option<String>,
    contains: Option<String>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn starts_with(mut self, prefix: impl Into<String>) -> Self {
        self.starts_with = Some(prefix.into());
        self
    }

    pub fn ends_with(mut self, suffix: impl Into<String>) -> Self {
        self.ends_with = Some(suffix.into());
        self
    }

    pub fn contains(mut self, infix: impl Into<String>) -> Self {
        self.contains = Some(infix.into());
        self
    }

    /// `prefix%infix%suffix`, leaving out the parts that are not set
    pub fn build(&self) -> String {
        if let Some(pattern) = &self.pattern {
            return pattern.clone();
        }

        let mut out = String::new();
        if let Some(prefix) = &self.starts_with {
            out.push_str(prefix);
        }
        out.push('%');
        if let Some(infix) = &self.contains {
            out.push_str(infix);
            out.push('%');
        }
        if let Some(suffix) = &self.ends_with {
            out.push_str(suffix);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_parts() {
        assert_eq!(Pattern::new().starts_with("Al").build(), "Al%");
        assert_eq!(Pattern::new().ends_with(".com").build(), "%.com");
        assert_eq!(Pattern::new().contains("ic").build(), "%ic%");
        assert_eq!(
            Pattern::new().starts_with("A").contains("l").ends_with("e").build(),
            "A%l%e"
        );
    }

    #[test]
    fn test_explicit_pattern_wins() {
        let pattern = Pattern::new().starts_with("x").with_pattern("_b%");
        assert_eq!(pattern.build(), "_b%");
    }
}
