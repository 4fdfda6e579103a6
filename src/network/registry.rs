//! Identity and Host Registries
//!
//! Process-wide bookkeeping owned by the lobby: which usernames are
//! connected, and which of them are advertising an open game.

use std::collections::BTreeSet;
use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::network::protocol::HostInfo;

// =============================================================================
// USERNAME
// =============================================================================

/// A connected player's identity. Compared byte-for-byte, no case folding.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Wrap a raw name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// IDENTITY REGISTRY
// =============================================================================

/// Why a connection was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// No username supplied, or an empty one.
    #[error("username missing")]
    Missing,
    /// Name already held by a live connection.
    #[error("username already in use: {0}")]
    Duplicate(Username),
    /// First frame was not an auth request.
    #[error("expected auth handshake")]
    NoHandshake,
}

/// Set of currently connected usernames.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    names: BTreeSet<Username>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a name, or reject it if empty or already taken.
    pub fn admit(&mut self, name: &Username) -> Result<(), AdmissionError> {
        if name.is_empty() {
            return Err(AdmissionError::Missing);
        }
        if !self.names.insert(name.clone()) {
            return Err(AdmissionError::Duplicate(name.clone()));
        }
        Ok(())
    }

    /// Forget a name. Absent names are ignored.
    pub fn remove(&mut self, name: &Username) {
        self.names.remove(name);
    }

    /// Whether the name is connected.
    pub fn contains(&self, name: &Username) -> bool {
        self.names.contains(name)
    }

    /// Number of connected names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// =============================================================================
// HOST REGISTRY
// =============================================================================

/// An open game waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Hosting player.
    pub host: Username,
    /// Labels for discovery.
    pub tags: Vec<String>,
}

impl HostEntry {
    /// Whether this entry carries every tag in `filter`.
    pub fn has_all_tags(&self, filter: &[String]) -> bool {
        filter.iter().all(|tag| self.tags.contains(tag))
    }

    /// Wire form of this entry.
    pub fn to_info(&self) -> HostInfo {
        HostInfo {
            host_name: self.host.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Trim tags, drop empty ones, collapse duplicates keeping first occurrence.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Hosted games in the order they were announced.
#[derive(Debug, Default)]
pub struct HostRegistry {
    entries: Vec<HostEntry>,
}

impl HostRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise a game. Re-hosting replaces the earlier entry's tags in place.
    pub fn add_host(&mut self, host: Username, tags: Vec<String>) {
        let tags = normalize_tags(tags);
        match self.entries.iter_mut().find(|e| e.host == host) {
            Some(entry) => entry.tags = tags,
            None => self.entries.push(HostEntry { host, tags }),
        }
    }

    /// Withdraw a game. Returns whether an entry was removed.
    pub fn remove_host(&mut self, host: &Username) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.host != host);
        self.entries.len() != before
    }

    /// Look up a hosted game.
    pub fn find_host(&self, host: &Username) -> Option<&HostEntry> {
        self.entries.iter().find(|e| &e.host == host)
    }

    /// Full host list in wire form.
    pub fn list_hosts(&self) -> Vec<HostInfo> {
        self.entries.iter().map(HostEntry::to_info).collect()
    }

    /// Hosts carrying every tag in `filter`, in wire form.
    pub fn matching(&self, filter: &[String]) -> Vec<HostInfo> {
        let filter = normalize_tags(filter);
        self.entries
            .iter()
            .filter(|e| e.has_all_tags(&filter))
            .map(HostEntry::to_info)
            .collect()
    }

    /// Number of open games.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no game is open.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_admit_rejects_duplicate() {
        let mut registry = IdentityRegistry::new();
        let alice = Username::from("alice");

        assert!(registry.admit(&alice).is_ok());
        assert_eq!(
            registry.admit(&alice),
            Err(AdmissionError::Duplicate(alice.clone()))
        );
        assert!(registry.contains(&alice));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_admit_rejects_empty() {
        let mut registry = IdentityRegistry::new();
        assert_eq!(registry.admit(&Username::from("")), Err(AdmissionError::Missing));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_admit_is_case_sensitive() {
        let mut registry = IdentityRegistry::new();
        registry.admit(&Username::from("alice")).unwrap();
        assert!(registry.admit(&Username::from("Alice")).is_ok());
    }

    #[test]
    fn test_remove_frees_name() {
        let mut registry = IdentityRegistry::new();
        let bob = Username::from("bob");
        registry.admit(&bob).unwrap();
        registry.remove(&bob);
        registry.remove(&bob);
        assert!(registry.admit(&bob).is_ok());
    }

    #[test]
    fn test_remove_absent_host_is_noop() {
        let mut hosts = HostRegistry::new();
        assert!(!hosts.remove_host(&Username::from("bob")));
        assert!(hosts.is_empty());
        assert!(hosts.list_hosts().is_empty());
    }

    #[test]
    fn test_rehost_replaces_tags() {
        let mut hosts = HostRegistry::new();
        hosts.add_host(Username::from("alice"), tags(&["casual"]));
        hosts.add_host(Username::from("carol"), tags(&[]));
        hosts.add_host(Username::from("alice"), tags(&["ranked"]));

        assert_eq!(hosts.len(), 2);
        let list = hosts.list_hosts();
        assert_eq!(list[0].host_name, Username::from("alice"));
        assert_eq!(list[0].tags, tags(&["ranked"]));
        assert_eq!(list[1].host_name, Username::from("carol"));
    }

    #[test]
    fn test_find_and_remove() {
        let mut hosts = HostRegistry::new();
        let alice = Username::from("alice");
        hosts.add_host(alice.clone(), tags(&["casual"]));

        assert_eq!(hosts.find_host(&alice).map(|e| e.tags.clone()), Some(tags(&["casual"])));
        assert!(hosts.remove_host(&alice));
        assert!(hosts.find_host(&alice).is_none());
    }

    #[test]
    fn test_tags_are_normalized() {
        assert_eq!(
            normalize_tags(["  casual ", "", "casual", "fast", "   "]),
            tags(&["casual", "fast"])
        );
    }

    #[test]
    fn test_matching_requires_every_tag() {
        let mut hosts = HostRegistry::new();
        hosts.add_host(Username::from("alice"), tags(&["casual", "eu"]));
        hosts.add_host(Username::from("bob"), tags(&["casual"]));
        hosts.add_host(Username::from("carol"), tags(&["ranked", "eu"]));

        let names = |list: Vec<HostInfo>| -> Vec<String> {
            list.into_iter().map(|h| h.host_name.to_string()).collect()
        };

        assert_eq!(names(hosts.matching(&tags(&["casual"]))), vec!["alice", "bob"]);
        assert_eq!(names(hosts.matching(&tags(&["eu", "casual"]))), vec!["alice"]);
        assert_eq!(names(hosts.matching(&[])).len(), 3);
    }
}
