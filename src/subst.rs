//! Substitution tables for back references.
//!
//! The decoder appends every completed substitutable node to `Substitutions`;
//! `S<index>` refers back into it. The encoder keeps its own, fresh
//! `SubstitutionCache` and must fill it in exactly the order the decoder will,
//! so that the indices it emits resolve to the same nodes on re-parsing.

use crate::ast::{NodeId, Tree};
use crate::error::{malformed, Malformed, Result};

#[derive(Default)]
pub struct Substitutions {
    entries: Vec<NodeId>,
}

impl Substitutions {
    pub fn new() -> Substitutions {
        Substitutions {
            entries: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn register(&mut self, node: NodeId) -> u64 {
        self.entries.push(node);
        (self.entries.len() - 1) as u64
    }

    /// `offset` is only used for the error report.
    pub fn resolve(&self, index: u64, offset: usize) -> Result<NodeId> {
        if index < self.entries.len() as u64 {
            Ok(self.entries[index as usize])
        } else {
            malformed(
                offset,
                Malformed::BadBackReference {
                    index,
                    len: self.entries.len(),
                },
            )
        }
    }
}

/// The encoder side: nodes are matched structurally, not by identity, since a
/// tree may contain equal subtrees that were spelled out twice.
#[derive(Default)]
pub struct SubstitutionCache {
    entries: Vec<NodeId>,
}

impl SubstitutionCache {
    pub fn new() -> SubstitutionCache {
        SubstitutionCache {
            entries: Vec::new(),
        }
    }

    pub fn lookup(&self, tree: &Tree, node: NodeId) -> Option<u64> {
        self.entries
            .iter()
            .position(|&entry| tree.same_subtree(entry, tree, node))
            .map(|index| index as u64)
    }

    pub fn register(&mut self, node: NodeId) {
        self.entries.push(node);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
