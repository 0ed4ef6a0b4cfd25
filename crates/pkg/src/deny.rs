use camino::Utf8Path;
use gitzip_workdir::clean_path;

use crate::WalkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

/// One entry as seen by a deny predicate.
#[derive(Debug)]
pub struct Visit<'a> {
    /// Absolute, slash separated path of the entry.
    pub path: &'a Utf8Path,
    /// Path below the walk root; empty for the root itself.
    pub relative: &'a str,
    pub is_dir: bool,
    /// Set when the traversal failed to read this entry.
    pub error: Option<&'a walkdir::Error>,
}

/// Per-entry policy consulted by the walker.
///
/// `Deny` skips the entry only: a denied directory is still descended
/// into, so a predicate that wants to drop a whole subtree has to deny the
/// descendants as well. Returning `Err` aborts the walk with that error.
pub trait DenyPredicate {
    fn check(&mut self, visit: &Visit<'_>) -> Result<Verdict, WalkError>;
}

impl<F> DenyPredicate for F
where
    F: FnMut(&Visit<'_>) -> Result<Verdict, WalkError>,
{
    fn check(&mut self, visit: &Visit<'_>) -> Result<Verdict, WalkError> {
        self(visit)
    }
}

/// Denies every entry at or below any of the given relative paths.
#[derive(Debug, Clone, Default)]
pub struct DenyPrefixes {
    prefixes: Vec<String>,
}

impl DenyPrefixes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|p| clean_path(p.as_ref()).trim_start_matches('/').to_string())
            .filter(|p| !p.is_empty() && p != ".")
            .collect();
        Self { prefixes }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn matches(&self, relative: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            relative == prefix
                || relative
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

impl DenyPredicate for DenyPrefixes {
    fn check(&mut self, visit: &Visit<'_>) -> Result<Verdict, WalkError> {
        Ok(if self.matches(visit.relative) {
            Verdict::Deny
        } else {
            Verdict::Allow
        })
    }
}

/// Denies `.git` directories and everything inside them, at any depth.
pub fn deny_git_dir(visit: &Visit<'_>) -> Result<Verdict, WalkError> {
    if visit.relative.split('/').any(|segment| segment == ".git") {
        Ok(Verdict::Deny)
    } else {
        Ok(Verdict::Allow)
    }
}
