//! Caller-supplied set of provider identifiers a manager accepts.

use std::collections::BTreeSet;

/// Provider identifiers accepted at manager construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SupportedProviders {
    ids: BTreeSet<String>,
}

impl SupportedProviders {
    /// Creates a set from any collection of identifiers. Identifiers are
    /// trimmed and empty entries are ignored.
    #[must_use]
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter().collect()
    }

    /// Returns `true` when `provider` is supported.
    #[must_use]
    pub fn contains(&self, provider: &str) -> bool {
        self.ids.contains(provider)
    }

    /// Supported identifiers in ascending order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Number of supported identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` when no provider is supported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for SupportedProviders {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter
                .into_iter()
                .map(|id| id.as_ref().trim().to_owned())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }
}
