use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::{Descriptor, Field, ObjectShape, TypeId};

use super::Inference;

impl Inference {
    /// Structural object merge over the union of all keys.
    ///
    /// A key present (and required) in every member stays required. A key
    /// missing from some member, or already optional in one, is optional.
    /// Either way its type is the fold of the types of the members defining it.
    pub(super) fn merge_objects(&mut self, shapes: Vec<ObjectShape>) -> Result<TypeId> {
        let keys: BTreeSet<&String> = shapes.iter().flat_map(|s| s.keys()).collect();
        let mut out = ObjectShape::new();

        for key in keys {
            let defining: Vec<&Field> = shapes.iter().filter_map(|s| s.get(key)).collect();
            let optional = defining.len() < shapes.len() || defining.iter().any(|f| f.is_optional());
            let types: BTreeSet<TypeId> = defining.iter().map(|f| f.ty()).collect();
            let ty = self.fold(types)?;
            let field = if optional { Field::Optional(ty) } else { Field::Required(ty) };
            out.insert(key.clone(), field);
        }

        self.registry.intern(Descriptor::Object(out))
    }
}
