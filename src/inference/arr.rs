use crate::error::Result;
use crate::types::{Descriptor, TypeId};

use super::Inference;

impl Inference {
    /// Fold every element type of the merged arrays into one and re-wrap it.
    pub(super) fn merge_arrays(&mut self, items: Vec<TypeId>) -> Result<TypeId> {
        let item = self.fold(items.into_iter().collect())?;
        self.registry.intern(Descriptor::Array(item))
    }
}
