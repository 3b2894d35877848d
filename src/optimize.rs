//! Reachability pruning.
//!
//! Folding leaves scratch descriptors behind (intermediate objects, unions
//! that were later spliced). Keep only what the root reaches, in original
//! order. Sentinel ids end the walk.

use std::collections::HashSet;

use tracing::debug;

use crate::types::{NodeId, TypeId, TypeStructure};

/// Node ids reachable from `root`, walked with an explicit stack.
pub fn reachable(structure: &TypeStructure) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<NodeId> = structure.root_type_id.node().into_iter().collect();

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(desc) = structure.types.get(id) else { continue };
        stack.extend(
            desc.children()
                .into_iter()
                .filter_map(TypeId::node)
                .filter(|child| !seen.contains(child)),
        );
    }
    seen
}

pub fn optimize(structure: &mut TypeStructure) {
    let keep = reachable(structure);
    let before = structure.types.len();
    structure.types.retain(|id| keep.contains(&id));
    let pruned = before - structure.types.len();
    if pruned > 0 {
        debug!(pruned, kept = structure.types.len(), "pruned unreachable descriptors");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::Inference;
    use crate::types::Descriptor;
    use serde_json::json;

    #[test]
    fn drops_scratch_descriptors_and_keeps_order() {
        let mut inf = Inference::default();
        let root = inf
            .observe_value(&json!([{"a": 1}, {"a": 2, "b": [true]}, {"c": null}]))
            .unwrap();
        let built = inf.registry().len();
        let raw = TypeStructure { root_type_id: root, types: inf.registry().clone() };

        let optimized = raw.clone().optimized();
        assert!(optimized.types.len() < built);
        assert_eq!(optimized.root_type_id, root);

        // every kept node is reachable and every reachable node is kept
        let reach = reachable(&raw);
        assert_eq!(reach.len(), optimized.types.len());
        for (id, _) in optimized.types.iter() {
            assert!(reach.contains(&id));
        }

        // relative order survives
        let raw_order: Vec<NodeId> = raw.types.iter().map(|(id, _)| id).filter(|id| reach.contains(id)).collect();
        let kept_order: Vec<NodeId> = optimized.types.iter().map(|(id, _)| id).collect();
        assert_eq!(raw_order, kept_order);
    }

    #[test]
    fn idempotent() {
        let mut inf = Inference::default();
        let root = inf.observe_value(&json!([[1], ["a"], {"x": [null]}])).unwrap();
        let once = inf.finish(root);
        let twice = once.clone().optimized();
        let a: Vec<_> = once.types.iter().map(|(id, d)| (id, d.clone())).collect();
        let b: Vec<_> = twice.types.iter().map(|(id, d)| (id, d.clone())).collect();
        assert_eq!(a, b);
        assert_eq!(once.root_type_id, twice.root_type_id);
    }

    #[test]
    fn sentinel_root_empties_the_registry() {
        let mut inf = Inference::default();
        inf.observe_value(&json!({"scratch": true})).unwrap();
        let s = inf.finish(TypeId::STRING);
        assert!(s.types.is_empty());
    }

    #[test]
    fn deep_chains_are_walked_with_a_stack() {
        let mut inf = Inference::new(crate::inference::InferenceConfig { max_depth: 1_000 });
        let mut v = json!(1);
        for _ in 0..500 {
            v = json!({ "next": v });
        }
        let root = inf.observe_value(&v).unwrap();
        let s = inf.finish(root);
        assert_eq!(s.types.len(), 500);
        assert!(matches!(s.get(root), Some(Descriptor::Object(_))));
    }
}
