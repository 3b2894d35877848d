use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::{Descriptor, TypeId};

use super::Inference;

impl Inference {
    /// Generic union: splice member unions in, deduplicate, intern.
    // (number | string), null -> (number | string | null)
    pub(super) fn merge_union(&mut self, members: BTreeSet<TypeId>) -> Result<TypeId> {
        let mut flat = BTreeSet::new();
        for id in members {
            match id.node().and_then(|node| self.registry.get(node)) {
                Some(Descriptor::Union(inner)) => flat.extend(inner.iter().copied()),
                _ => {
                    flat.insert(id);
                }
            }
        }

        // splicing the bottom type in can leave a single member
        if flat.len() == 1 {
            if let Some(only) = flat.first() {
                return Ok(*only);
            }
        }
        self.registry.intern(Descriptor::Union(flat))
    }
}
