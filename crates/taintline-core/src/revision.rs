use serde::{Deserialize, Serialize};
use std::fmt;

/// The single branch, commit or tag a remote fetch is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RevisionSelector {
    Branch(String),
    Commit(String),
    Tag(String),
    #[default]
    Unspecified,
}

impl RevisionSelector {
    /// Resolve the optional revision flags into one selector.
    ///
    /// Preference order is branch, then commit, then tag. Callers are
    /// expected to have rejected more than one populated field already, so
    /// in practice this only ever sees zero or one value.
    pub fn select(branch: Option<&str>, commit: Option<&str>, tag: Option<&str>) -> Self {
        let populated = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(String::from);

        if let Some(name) = populated(branch) {
            return RevisionSelector::Branch(name);
        }
        if let Some(hash) = populated(commit) {
            return RevisionSelector::Commit(hash);
        }
        if let Some(name) = populated(tag) {
            return RevisionSelector::Tag(name);
        }
        RevisionSelector::Unspecified
    }

    pub fn kind(&self) -> Option<&'static str> {
        match self {
            RevisionSelector::Branch(_) => Some("branch"),
            RevisionSelector::Commit(_) => Some("commit"),
            RevisionSelector::Tag(_) => Some("tag"),
            RevisionSelector::Unspecified => None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            RevisionSelector::Branch(v) | RevisionSelector::Commit(v) | RevisionSelector::Tag(v) => {
                Some(v)
            }
            RevisionSelector::Unspecified => None,
        }
    }

    pub fn is_specified(&self) -> bool {
        !matches!(self, RevisionSelector::Unspecified)
    }

    /// A filesystem-safe label for report names, e.g. `feature-x` for
    /// `feature/x` or a 12 character prefix for commits.
    pub fn slug(&self) -> Option<String> {
        let raw: String = match self {
            RevisionSelector::Commit(hash) => hash.chars().take(12).collect(),
            other => other.value()?.to_string(),
        };
        Some(sanitize(&raw))
    }
}

impl fmt::Display for RevisionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind(), self.value()) {
            (Some(kind), Some(value)) => write!(f, "{kind} {value}"),
            _ => f.write_str("default revision"),
        }
    }
}

pub(crate) fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_branch() {
        let sel = RevisionSelector::select(Some("main"), None, None);
        assert_eq!(sel, RevisionSelector::Branch("main".into()));
        assert_eq!(sel.kind(), Some("branch"));
        assert_eq!(sel.value(), Some("main"));
    }

    #[test]
    fn test_select_none_is_unspecified() {
        let sel = RevisionSelector::select(None, None, None);
        assert_eq!(sel, RevisionSelector::Unspecified);
        assert!(!sel.is_specified());
        assert_eq!(sel.to_string(), "default revision");
    }

    #[test]
    fn test_preference_order() {
        assert_eq!(
            RevisionSelector::select(Some("dev"), Some("abc"), Some("v1")),
            RevisionSelector::Branch("dev".into())
        );
        assert_eq!(
            RevisionSelector::select(None, Some("abc"), Some("v1")),
            RevisionSelector::Commit("abc".into())
        );
        assert_eq!(
            RevisionSelector::select(None, None, Some("v1")),
            RevisionSelector::Tag("v1".into())
        );
    }

    #[test]
    fn test_empty_values_are_skipped() {
        assert_eq!(
            RevisionSelector::select(Some(""), None, Some("v2")),
            RevisionSelector::Tag("v2".into())
        );
    }

    #[test]
    fn test_slug() {
        assert_eq!(
            RevisionSelector::Branch("feature/x".into()).slug().as_deref(),
            Some("feature-x")
        );
        assert_eq!(
            RevisionSelector::Commit("0123456789abcdef0123".into()).slug().as_deref(),
            Some("0123456789ab")
        );
        assert_eq!(RevisionSelector::Unspecified.slug(), None);
    }
}
