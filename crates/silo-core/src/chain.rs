//! Chains of suspended callers
//!
//! TigerStyle: Extending a chain is O(1); the chain is shared, never copied.
//!
//! Every nested call carries the identities whose turns are waiting on it.
//! Each hop adds one link pointing at its caller's chain, so a chain of depth
//! n costs n links in total, however many turns are suspended along it.

use crate::actor::ActorId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

struct ChainLink {
    id: ActorId,
    parent: Option<Arc<ChainLink>>,
    /// Links from the root to here, inclusive
    depth: usize,
}

/// Identities suspended on a call, outermost first
///
/// Cheap to clone. The empty chain marks a call entering from outside the host.
#[derive(Clone, Default)]
pub struct CallChain {
    head: Option<Arc<ChainLink>>,
}

impl CallChain {
    /// The empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// This chain with `id` appended as the innermost caller
    pub fn extend(&self, id: ActorId) -> Self {
        let depth = self.len() + 1;
        Self {
            head: Some(Arc::new(ChainLink {
                id,
                parent: self.head.clone(),
                depth,
            })),
        }
    }

    /// Number of suspended callers
    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |link| link.depth)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Innermost caller, if any
    pub fn innermost(&self) -> Option<&ActorId> {
        self.head.as_ref().map(|link| &link.id)
    }

    /// Whether `id` is suspended anywhere on this chain
    pub fn contains(&self, id: &ActorId) -> bool {
        self.iter().any(|candidate| candidate == id)
    }

    /// Walk the chain innermost first
    pub fn iter(&self) -> impl Iterator<Item = &ActorId> {
        let mut next = self.head.as_deref();
        std::iter::from_fn(move || {
            let link = next?;
            next = link.parent.as_deref();
            Some(&link.id)
        })
    }

    /// Copy the chain out, outermost first
    pub fn to_vec(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.iter().cloned().collect();
        ids.reverse();
        ids
    }
}

impl Drop for CallChain {
    // Unlink iteratively so dropping a deep chain never recurses per link
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(link) = next {
            next = match Arc::try_unwrap(link) {
                Ok(mut owned) => owned.parent.take(),
                Err(_) => None,
            };
        }
    }
}

impl FromIterator<ActorId> for CallChain {
    /// Build from identities given outermost first
    fn from_iter<I: IntoIterator<Item = ActorId>>(ids: I) -> Self {
        ids.into_iter()
            .fold(CallChain::new(), |chain, id| chain.extend(id))
    }
}

impl PartialEq for CallChain {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for CallChain {}

impl fmt::Display for CallChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.to_vec().iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CallChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl Serialize for CallChain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.to_vec())
    }
}

impl<'de> Deserialize<'de> for CallChain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ids = Vec::<ActorId>::deserialize(deserializer)?;
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fac(key: i64) -> ActorId {
        ActorId::new("fac", key).unwrap()
    }

    #[test]
    fn test_empty_chain() {
        let chain = CallChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
        assert!(chain.innermost().is_none());
        assert!(!chain.contains(&fac(1)));
        assert_eq!(chain.to_string(), "");
    }

    #[test]
    fn test_extend_shares_the_parent() {
        let outer = CallChain::new().extend(fac(9));
        let left = outer.extend(fac(8));
        let right = outer.extend(fac(7));

        assert_eq!(outer.len(), 1);
        assert_eq!(left.to_vec(), vec![fac(9), fac(8)]);
        assert_eq!(right.to_vec(), vec![fac(9), fac(7)]);
        assert!(!left.contains(&fac(7)));
        assert_eq!(right.innermost(), Some(&fac(7)));
    }

    #[test]
    fn test_from_iter_is_outermost_first() {
        let chain: CallChain = vec![fac(3), fac(2), fac(1)].into_iter().collect();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.innermost(), Some(&fac(1)));
        assert_eq!(chain.to_string(), "fac/3 -> fac/2 -> fac/1");
    }

    #[test]
    fn test_serde_as_list() {
        let chain: CallChain = vec![fac(2), fac(1)].into_iter().collect();
        let json = serde_json::to_string(&chain).unwrap();
        let back: CallChain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);
    }

    #[test]
    fn test_deep_chain_drops_without_overflow() {
        let chain: CallChain = (0..200_000).map(fac).collect();
        assert_eq!(chain.len(), 200_000);
        drop(chain);
    }
}
