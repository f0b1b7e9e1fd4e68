//! Role set types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::WardenError;

/// Least-privileged role handed to authenticated users with no stored roles
pub const DEFAULT_ROLE: &str = "user";

/// Set of authorization labels assigned to a user.
///
/// Labels are unique and kept in sorted order. Absence of roles is the empty
/// set, never a missing value.
///
/// A valid label is non-empty and contains no whitespace. Every constructor
/// applies that rule, deserialization included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "BTreeSet<String>", from = "BTreeSet<String>")]
pub struct RoleSet(BTreeSet<String>);

fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && !label.chars().any(char::is_whitespace)
}

/// Trim `label` and keep it if what remains is valid
fn normalize(label: &str) -> Option<String> {
    let label = label.trim();
    is_valid_label(label).then(|| label.to_string())
}

impl RoleSet {
    /// Create an empty role set
    pub fn new() -> Self {
        Self::default()
    }

    /// Role set holding only `label`
    pub fn single(label: impl Into<String>) -> Self {
        let mut set = Self::new();
        set.0.insert(label.into());
        set
    }

    /// The fail-open default, `{"user"}`
    pub fn default_user() -> Self {
        Self::single(DEFAULT_ROLE)
    }

    /// Build a role set from raw labels.
    ///
    /// Labels are trimmed. Blank labels and labels with inner whitespace
    /// are dropped, and duplicates collapse.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            labels
                .into_iter()
                .filter_map(|label| normalize(label.as_ref()))
                .collect(),
        )
    }

    /// Insert a validated label. Returns whether it was newly added.
    pub fn insert(&mut self, label: impl Into<String>) -> Result<bool, WardenError> {
        let label = label.into();
        if !is_valid_label(&label) {
            return Err(WardenError::InvalidRole(label));
        }
        Ok(self.0.insert(label))
    }

    /// Check whether the set holds `label`
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    /// Check whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate labels in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for RoleSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::from_labels(iter)
    }
}

impl From<BTreeSet<String>> for RoleSet {
    fn from(labels: BTreeSet<String>) -> Self {
        Self::from_labels(labels)
    }
}

impl From<RoleSet> for BTreeSet<String> {
    fn from(roles: RoleSet) -> Self {
        roles.0
    }
}

impl IntoIterator for RoleSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{label}")?;
        }
        write!(f, "}}")
    }
}
