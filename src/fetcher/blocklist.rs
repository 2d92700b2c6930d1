use crate::config::DEFAULT_BLOCKED_PATTERNS;

/// URL fragments the fetcher refuses to request
///
/// Matching is a case-insensitive substring test on the full URL, which is
/// coarse but enough to keep analytics and tracking endpoints out.
#[derive(Debug, Clone, Default)]
pub struct BlockList {
    patterns: Vec<String>,
}

impl BlockList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Block list with the analytics and tracking hosts blocked by default
    pub fn tracking_defaults() -> Self {
        Self::new(DEFAULT_BLOCKED_PATTERNS.iter().copied())
    }

    /// Returns the first rule matching `url`, if any
    pub fn matching_rule(&self, url: &str) -> Option<&str> {
        let url = url.to_lowercase();
        self.patterns
            .iter()
            .find(|pattern| url.contains(pattern.as_str()))
            .map(String::as_str)
    }

    pub fn is_blocked(&self, url: &str) -> bool {
        self.matching_rule(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
