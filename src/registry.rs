//! Hash-consed store of type descriptors.
//!
//! Lookup is by structural equality; the digest is only the public id. Two
//! different descriptors that happen to share a digest are reported, never
//! merged.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::{InferenceError, Result};
use crate::types::{Descriptor, NodeId, TypeId};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    nodes: IndexMap<NodeId, Descriptor>,
    by_shape: HashMap<Descriptor, NodeId>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    /// Return the id of an existing descriptor with identical content, or
    /// register `shape` and return its new id.
    pub fn intern(&mut self, shape: Descriptor) -> Result<TypeId> {
        if let Some(id) = self.by_shape.get(&shape) {
            return Ok(TypeId::Node(*id));
        }
        let id = shape.digest();
        if self.nodes.contains_key(&id) {
            return Err(InferenceError::IdCollision { id });
        }
        self.nodes.insert(id, shape.clone());
        self.by_shape.insert(shape, id);
        Ok(TypeId::Node(id))
    }

    pub fn get(&self, id: NodeId) -> Option<&Descriptor> { self.nodes.get(&id) }

    pub fn contains(&self, id: NodeId) -> bool { self.nodes.contains_key(&id) }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Descriptor)> {
        self.nodes.iter().map(|(id, d)| (*id, d))
    }

    /// Keep only the ids for which `keep` holds, preserving relative order.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        self.nodes.retain(|id, _| keep(*id));
        let nodes = &self.nodes;
        self.by_shape.retain(|_, id| nodes.contains_key(id));
    }
}

impl Serialize for Registry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}
