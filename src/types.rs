// Canonical type graph. No serde_json::Value here.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use crate::registry::Registry;

// ------------------------------ Sentinels -------------------------------- //

/// Scalar kinds that never enter the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SimpleKind {
    String,
    Number,
    Boolean,
    Null,
    Undefined,
    Date,
    RecordId,
    Uuid,
}

impl SimpleKind {
    pub const ALL: [SimpleKind; 8] = [
        SimpleKind::String,
        SimpleKind::Number,
        SimpleKind::Boolean,
        SimpleKind::Null,
        SimpleKind::Undefined,
        SimpleKind::Date,
        SimpleKind::RecordId,
        SimpleKind::Uuid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SimpleKind::String => "string",
            SimpleKind::Number => "number",
            SimpleKind::Boolean => "boolean",
            SimpleKind::Null => "null",
            SimpleKind::Undefined => "undefined",
            SimpleKind::Date => "Date",
            SimpleKind::RecordId => "RecordId",
            SimpleKind::Uuid => "UUID",
        }
    }
}

// --------------------------------- Ids ----------------------------------- //

/// Content digest of a registry descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeId {
    Simple(SimpleKind),
    Node(NodeId),
}

impl TypeId {
    pub const STRING: TypeId = TypeId::Simple(SimpleKind::String);
    pub const NUMBER: TypeId = TypeId::Simple(SimpleKind::Number);
    pub const BOOLEAN: TypeId = TypeId::Simple(SimpleKind::Boolean);
    pub const NULL: TypeId = TypeId::Simple(SimpleKind::Null);
    pub const UNDEFINED: TypeId = TypeId::Simple(SimpleKind::Undefined);

    pub fn node(self) -> Option<NodeId> {
        match self {
            TypeId::Node(id) => Some(id),
            TypeId::Simple(_) => None,
        }
    }

    pub fn is_sentinel(self) -> bool { matches!(self, TypeId::Simple(_)) }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeId::Simple(kind) => f.write_str(kind.name()),
            TypeId::Node(id) => id.fmt(f),
        }
    }
}

impl Serialize for TypeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ------------------------------ Descriptors ------------------------------ //

/// Object field record. `Optional` means the field was absent in some sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "presence", content = "type", rename_all = "lowercase")]
pub enum Field {
    Required(TypeId),
    Optional(TypeId),
}

impl Field {
    pub fn ty(&self) -> TypeId {
        match self {
            Field::Required(ty) | Field::Optional(ty) => *ty,
        }
    }

    pub fn is_optional(&self) -> bool { matches!(self, Field::Optional(_)) }
}

pub type ObjectShape = BTreeMap<String, Field>;

/// A canonical node of the type graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Descriptor {
    Object(ObjectShape),
    /// Array whose element type is the referenced id.
    Array(TypeId),
    /// Alternatives; the empty union is the bottom type.
    Union(BTreeSet<TypeId>),
}

impl Descriptor {
    pub fn empty_union() -> Self { Descriptor::Union(BTreeSet::new()) }

    /// Deterministic digest over the canonical content. Children are hashed by
    /// their own digests, so the result is independent of insertion order.
    pub fn digest(&self) -> NodeId {
        use std::collections::hash_map::DefaultHasher;
        let mut h = DefaultHasher::new();
        self.hash(&mut h);
        NodeId(h.finish())
    }

    /// Ids this descriptor references directly.
    pub fn children(&self) -> Vec<TypeId> {
        match self {
            Descriptor::Object(fields) => fields.values().map(Field::ty).collect(),
            Descriptor::Array(inner) => vec![*inner],
            Descriptor::Union(members) => members.iter().copied().collect(),
        }
    }
}

// ------------------------------- Structure ------------------------------- //

/// Result of one inference run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStructure {
    pub root_type_id: TypeId,
    pub types: Registry,
}

impl TypeStructure {
    pub fn optimized(mut self) -> Self {
        crate::optimize::optimize(&mut self);
        self
    }

    pub fn get(&self, id: TypeId) -> Option<&Descriptor> {
        id.node().and_then(|node| self.types.get(node))
    }
}
