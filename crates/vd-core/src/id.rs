use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide interner backing every `NodeId`.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Next numeric suffix handed out by [`NodeId::with_prefix`].
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// A lightweight, interned identifier for scene nodes.
///
/// Internally a 4-byte `Spur` index, so comparing and hashing ids is O(1).
/// Fresh ids are never reused: every id that enters the process through
/// [`NodeId::intern`] pushes the fresh-id counter past its numeric suffix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern a string as a NodeId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        observe_suffix(s);
        NodeId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a unique anonymous ID.
    pub fn anonymous() -> Self {
        Self::with_prefix("node")
    }

    /// Generate a unique ID with a kind prefix (e.g. `shape_1`, `text_2`).
    pub fn with_prefix(prefix: &str) -> Self {
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{n}");
            // An imported document may already hold this exact string.
            if INTERNER.get(&candidate).is_none() {
                return NodeId(INTERNER.get_or_intern(candidate));
            }
        }
    }
}

/// Keep the fresh-id counter ahead of any `<prefix>_<n>` id seen so far.
fn observe_suffix(s: &str) {
    if let Some((_, tail)) = s.rsplit_once('_')
        && let Ok(n) = tail.parse::<u64>()
    {
        COUNTER.fetch_max(n.saturating_add(1), Ordering::Relaxed);
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.as_str())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = NodeId::intern("hero_banner");
        let b = NodeId::intern("hero_banner");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "hero_banner");
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = NodeId::anonymous();
        let b = NodeId::anonymous();
        assert_ne!(a, b);
    }

    #[test]
    fn fresh_ids_skip_past_imported_suffixes() {
        let imported = NodeId::intern("shape_900000");
        let fresh = NodeId::with_prefix("shape");
        assert_ne!(imported, fresh);
        let n: u64 = fresh.as_str().rsplit_once('_').unwrap().1.parse().unwrap();
        assert!(n > 900_000, "fresh id {fresh} should be past the imported one");
    }
}
