//! Structural inference engine.
//!
//! Feed sample values in, get a hash-consed type graph out. Each sample is
//! built bottom-up into registry descriptors; arrays (and multi-sample runs)
//! fold the distinct ids of their elements into one summary id.
//!
//! Fold rules, in priority order, for two or more distinct members:
//! 1. all arrays → one array over the fold of every element type
//! 2. all objects → one object; fields missing from some member become optional
//! 3. arrays plus `undefined` → merged array | undefined
//! 4. objects plus `undefined` → merged object | undefined
//! 5. anything else → flat union (member unions are spliced in, never nested)
mod arr;
mod obj;
mod union;

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{InferenceError, Result};
use crate::registry::Registry;
use crate::sample::{JsonPath, ShapeKind, classify_at};
use crate::types::{Descriptor, Field, ObjectShape, SimpleKind, TypeId, TypeStructure};

// ------------------------------- Policy ---------------------------------- //

pub const DEFAULT_MAX_DEPTH: usize = 256;

static QUERY_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Za-z0-9_]*$").expect("query id pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceConfig {
    /// Deepest nesting accepted before the run fails.
    pub max_depth: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self { Self { max_depth: DEFAULT_MAX_DEPTH } }
}

// ------------------------------ Fold rules ------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldRule {
    Bottom,
    Identity,
    MergeArrays,
    MergeObjects,
    OptionalArray,
    OptionalObject,
    MixedUnion,
}

/// What a member set is made of, resolved against the registry.
#[derive(Debug, Default)]
struct Census {
    total: usize,
    array_items: Vec<TypeId>,
    objects: Vec<ObjectShape>,
    has_undefined: bool,
}

fn select_rule(c: &Census) -> Option<FoldRule> {
    let n = c.total;
    match n {
        0 => Some(FoldRule::Bottom),
        1 => Some(FoldRule::Identity),
        _ if c.array_items.len() == n => Some(FoldRule::MergeArrays),
        _ if c.objects.len() == n => Some(FoldRule::MergeObjects),
        _ if c.has_undefined && c.array_items.len() + 1 == n => Some(FoldRule::OptionalArray),
        _ if c.has_undefined && c.objects.len() + 1 == n => Some(FoldRule::OptionalObject),
        _ if n >= 2 => Some(FoldRule::MixedUnion),
        _ => None,
    }
}

// ------------------------------- Engine ---------------------------------- //

/// One inference run. Owns its registry exclusively.
#[derive(Debug, Default)]
pub struct Inference {
    config: InferenceConfig,
    registry: Registry,
}

impl Inference {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config, registry: Registry::new() }
    }

    pub fn registry(&self) -> &Registry { &self.registry }

    /// Build the type of one sample and return its root id.
    pub fn observe_value(&mut self, v: &Value) -> Result<TypeId> {
        let mut path = JsonPath::root();
        self.build(v, &mut path)
    }

    /// Treat `values` as the elements of one array and return the array's id.
    pub fn observe_samples<'a, I>(&mut self, values: I) -> Result<TypeId>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut path = JsonPath::root();
        self.build_elements(values, &mut path)
    }

    /// Prune to what `root` reaches and hand the graph over.
    pub fn finish(self, root: TypeId) -> TypeStructure {
        let built = self.registry.len();
        let structure = TypeStructure { root_type_id: root, types: self.registry }.optimized();
        debug!(root = %root, built, kept = structure.types.len(), "inference run finished");
        structure
    }

    fn build(&mut self, v: &Value, path: &mut JsonPath) -> Result<TypeId> {
        if path.depth() > self.config.max_depth {
            return Err(InferenceError::DepthExceeded {
                path: path.to_string(),
                limit: self.config.max_depth,
            });
        }
        match (classify_at(v, path)?, v) {
            (ShapeKind::Primitive(kind), _) => Ok(TypeId::Simple(kind)),
            (ShapeKind::Date, _) => Ok(TypeId::Simple(SimpleKind::Date)),
            (ShapeKind::RecordId, _) => Ok(TypeId::Simple(SimpleKind::RecordId)),
            (ShapeKind::Uuid, _) => Ok(TypeId::Simple(SimpleKind::Uuid)),
            (ShapeKind::Array, Value::Array(xs)) => self.build_elements(xs, path),
            (ShapeKind::Object, Value::Object(map)) => self.build_object(map, path),
            (kind, _) => Err(InferenceError::classification(
                path.to_string(),
                format!("classified as {kind:?} but the value disagrees"),
            )),
        }
    }

    fn build_object(&mut self, map: &Map<String, Value>, path: &mut JsonPath) -> Result<TypeId> {
        let mut shape = ObjectShape::new();
        for (key, child) in map {
            path.push_key(key);
            let id = self.build(child, path)?;
            path.pop();
            shape.insert(key.clone(), Field::Required(id));
        }
        self.registry.intern(Descriptor::Object(shape))
    }

    fn build_elements<'a, I>(&mut self, xs: I, path: &mut JsonPath) -> Result<TypeId>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut members = BTreeSet::new();
        for (i, el) in xs.into_iter().enumerate() {
            path.push_index(i);
            members.insert(self.build(el, path)?);
            path.pop();
        }
        let item = self.fold(members)?;
        self.registry.intern(Descriptor::Array(item))
    }

    // ------------------------------ Fold --------------------------------- //

    /// Merge a set of member ids into one summary id.
    pub fn fold(&mut self, members: BTreeSet<TypeId>) -> Result<TypeId> {
        let census = self.census(&members)?;
        let rule = select_rule(&census).ok_or_else(|| {
            InferenceError::internal_merge(format!("no fold rule covers {} members", census.total))
        })?;
        trace!(?rule, members = census.total, "fold");

        match rule {
            FoldRule::Bottom => self.registry.intern(Descriptor::empty_union()),
            FoldRule::Identity => members
                .first()
                .copied()
                .ok_or_else(|| InferenceError::internal_merge("identity rule on an empty set")),
            FoldRule::MergeArrays => self.merge_arrays(census.array_items),
            FoldRule::MergeObjects => self.merge_objects(census.objects),
            FoldRule::OptionalArray => {
                let merged = self.merge_arrays(census.array_items)?;
                self.merge_union([merged, TypeId::UNDEFINED].into())
            }
            FoldRule::OptionalObject => {
                let merged = self.merge_objects(census.objects)?;
                self.merge_union([merged, TypeId::UNDEFINED].into())
            }
            FoldRule::MixedUnion => self.merge_union(members),
        }
    }

    fn census(&self, members: &BTreeSet<TypeId>) -> Result<Census> {
        let mut c = Census { total: members.len(), ..Census::default() };
        for id in members {
            match id {
                TypeId::Simple(SimpleKind::Undefined) => c.has_undefined = true,
                TypeId::Simple(_) => {}
                TypeId::Node(node) => match self.registry.get(*node) {
                    Some(Descriptor::Array(item)) => c.array_items.push(*item),
                    Some(Descriptor::Object(shape)) => c.objects.push(shape.clone()),
                    Some(Descriptor::Union(_)) => {}
                    None => {
                        return Err(InferenceError::internal_merge(format!(
                            "member {node} is not in this run's registry"
                        )));
                    }
                },
            }
        }
        Ok(c)
    }
}

// ------------------------------- Front API -------------------------------- //

/// Infer the structure of a single sample.
pub fn infer_type_structure(value: &Value, config: &InferenceConfig) -> Result<TypeStructure> {
    let mut inf = Inference::new(*config);
    let root = inf.observe_value(value)?;
    Ok(inf.finish(root))
}

/// Infer one logical root from several samples; the root is an array of them.
pub fn infer_from_values<'a, I>(values: I, config: &InferenceConfig) -> Result<TypeStructure>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut inf = Inference::new(*config);
    let root = inf.observe_samples(values)?;
    Ok(inf.finish(root))
}

/// Infer the result of a multi-statement query: statement `n` (1-based)
/// becomes field `<query_id>_query<n>` of the root object.
pub fn infer_query_results(
    query_id: &str,
    results: &[Value],
    config: &InferenceConfig,
) -> Result<TypeStructure> {
    if !QUERY_ID.is_match(query_id) {
        return Err(InferenceError::InvalidQueryId { id: query_id.to_owned() });
    }
    let mut inf = Inference::new(*config);
    let mut path = JsonPath::root();
    let mut shape = ObjectShape::new();
    for (i, result) in results.iter().enumerate() {
        let key = format!("{query_id}_query{}", i + 1);
        path.push_key(&key);
        let id = inf.build(result, &mut path)?;
        path.pop();
        shape.insert(key, Field::Required(id));
    }
    let root = inf.registry.intern(Descriptor::Object(shape))?;
    Ok(inf.finish(root))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;
    use serde_json::json;

    fn infer(v: Value) -> TypeStructure {
        infer_type_structure(&v, &InferenceConfig::default()).unwrap()
    }

    fn object(s: &TypeStructure, id: TypeId) -> &ObjectShape {
        match s.get(id) {
            Some(Descriptor::Object(shape)) => shape,
            other => panic!("expected object, got {other:?}"),
        }
    }

    fn array_item(s: &TypeStructure, id: TypeId) -> TypeId {
        match s.get(id) {
            Some(Descriptor::Array(item)) => *item,
            other => panic!("expected array, got {other:?}"),
        }
    }

    fn union(s: &TypeStructure, id: TypeId) -> &BTreeSet<TypeId> {
        match s.get(id) {
            Some(Descriptor::Union(members)) => members,
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn homogeneous_rows_collapse_to_one_object() {
        let s = infer(json!([{"id": 1, "name": "a"}, {"id": 3, "name": "c"}]));
        let item = array_item(&s, s.root_type_id);
        let obj = object(&s, item);
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["id"], Field::Required(TypeId::NUMBER));
        assert_eq!(obj["name"], Field::Required(TypeId::STRING));
        assert_eq!(s.types.len(), 2);
    }

    #[test]
    fn missing_fields_become_optional() {
        let s = infer(json!([{"id": 1}, {"id": 2, "extra": "x"}]));
        let obj = object(&s, array_item(&s, s.root_type_id));
        assert_eq!(obj["id"], Field::Required(TypeId::NUMBER));
        assert_eq!(obj["extra"], Field::Optional(TypeId::STRING));
    }

    #[test]
    fn optional_even_when_types_agree() {
        let s = infer(json!([{"a": 1, "b": "x"}, {"a": 2}]));
        let obj = object(&s, array_item(&s, s.root_type_id));
        assert_eq!(obj["a"], Field::Required(TypeId::NUMBER));
        assert_eq!(obj["b"], Field::Optional(TypeId::STRING));
    }

    #[test]
    fn empty_array_is_array_of_bottom() {
        let s = infer(json!([]));
        let item = array_item(&s, s.root_type_id);
        assert!(union(&s, item).is_empty());
        assert_eq!(s.types.len(), 2);
    }

    #[test]
    fn mixed_scalars_make_a_flat_union() {
        let s = infer(json!([1, "a", null]));
        let item = array_item(&s, s.root_type_id);
        let expected: BTreeSet<TypeId> = [TypeId::NUMBER, TypeId::STRING, TypeId::NULL].into();
        assert_eq!(union(&s, item), &expected);
    }

    #[test]
    fn common_field_with_differing_types_is_folded() {
        let s = infer(json!([{"v": 1}, {"v": "one"}]));
        let obj = object(&s, array_item(&s, s.root_type_id));
        let Field::Required(v) = obj["v"] else { panic!("v should stay required") };
        let expected: BTreeSet<TypeId> = [TypeId::NUMBER, TypeId::STRING].into();
        assert_eq!(union(&s, v), &expected);
    }

    #[test]
    fn nested_arrays_merge_element_types() {
        let s = infer(json!([[1, 2], ["x"], []]));
        let outer_item = array_item(&s, s.root_type_id);
        let inner_item = array_item(&s, outer_item);
        // the bottom type drops out of the union
        let expected: BTreeSet<TypeId> = [TypeId::NUMBER, TypeId::STRING].into();
        assert_eq!(union(&s, inner_item), &expected);
    }

    #[test]
    fn single_member_is_returned_unchanged() {
        let mut inf = Inference::default();
        let obj = inf.observe_value(&json!({"a": 1})).unwrap();
        assert_eq!(inf.fold([obj].into()).unwrap(), obj);
        assert_eq!(inf.fold([TypeId::STRING].into()).unwrap(), TypeId::STRING);
        assert!(inf.registry().iter().all(|(_, d)| match d {
            Descriptor::Union(m) => m.len() != 1,
            _ => true,
        }));
    }

    #[test]
    fn unions_are_flattened_not_nested() {
        let mut inf = Inference::default();
        let ab = inf.fold([TypeId::NUMBER, TypeId::STRING].into()).unwrap();
        let abc = inf.fold([ab, TypeId::BOOLEAN].into()).unwrap();
        let s = inf.finish(abc);
        let expected: BTreeSet<TypeId> = [TypeId::NUMBER, TypeId::STRING, TypeId::BOOLEAN].into();
        assert_eq!(union(&s, abc), &expected);
        assert_eq!(s.types.len(), 1);
    }

    #[test]
    fn two_unions_splice_together() {
        let mut inf = Inference::default();
        let ab = inf.fold([TypeId::NUMBER, TypeId::STRING].into()).unwrap();
        let cd = inf.fold([TypeId::NULL, TypeId::BOOLEAN].into()).unwrap();
        let all = inf.fold([ab, cd].into()).unwrap();
        let s = inf.finish(all);
        assert_eq!(union(&s, all).len(), 4);
    }

    #[test]
    fn array_or_undefined() {
        let mut inf = Inference::default();
        let nums = inf.observe_value(&json!([1])).unwrap();
        let strs = inf.observe_value(&json!(["a"])).unwrap();
        let id = inf.fold([nums, strs, TypeId::UNDEFINED].into()).unwrap();
        let s = inf.finish(id);
        let members = union(&s, id);
        assert_eq!(members.len(), 2);
        assert!(members.contains(&TypeId::UNDEFINED));
        let merged = members.iter().copied().find(|m| !m.is_sentinel()).unwrap();
        assert_eq!(union(&s, array_item(&s, merged)).len(), 2);
    }

    #[test]
    fn object_or_undefined() {
        let s = infer(json!([{"a": 1}, {"b": true}, {"$undefined": true}]));
        let members = union(&s, array_item(&s, s.root_type_id));
        assert_eq!(members.len(), 2);
        let merged = members.iter().copied().find(|m| !m.is_sentinel()).unwrap();
        let obj = object(&s, merged);
        assert_eq!(obj["a"], Field::Optional(TypeId::NUMBER));
        assert_eq!(obj["b"], Field::Optional(TypeId::BOOLEAN));
    }

    #[test]
    fn three_way_mix_falls_back_to_union() {
        let s = infer(json!([[1], {"a": 1}, "x"]));
        let members = union(&s, array_item(&s, s.root_type_id));
        assert_eq!(members.len(), 3);
        assert!(members.contains(&TypeId::STRING));
    }

    #[test]
    fn optional_marker_survives_later_merges() {
        let s = infer(json!([[{"a": 1}, {"a": 1, "b": 2}], [{"a": 1, "b": 2}]]));
        let inner = array_item(&s, array_item(&s, s.root_type_id));
        let obj = object(&s, inner);
        assert_eq!(obj["b"], Field::Optional(TypeId::NUMBER));
    }

    #[test]
    fn opaque_scalars_stay_sentinels() {
        let s = infer(json!({
            "id": {"$recordId": "user:tobie"},
            "token": {"$uuid": "0190f8a2-52c4-7c47-9b3b-3f4e0c1f0a11"},
            "at": {"$date": "2024-05-01T10:00:00Z"},
        }));
        let obj = object(&s, s.root_type_id);
        assert_eq!(obj["id"], Field::Required(TypeId::Simple(SimpleKind::RecordId)));
        assert_eq!(obj["token"], Field::Required(TypeId::Simple(SimpleKind::Uuid)));
        assert_eq!(obj["at"], Field::Required(TypeId::Simple(SimpleKind::Date)));
        assert_eq!(s.types.len(), 1);
    }

    #[test]
    fn ids_are_shared_across_runs() {
        let a = infer(json!({"x": [1, "a"], "y": {"z": null}}));
        let b = infer(json!({"y": {"z": null}, "x": ["b", 2, 3]}));
        assert_eq!(a.root_type_id, b.root_type_id);
        let ids_a: BTreeSet<_> = a.types.iter().map(|(id, _)| id).collect();
        let ids_b: BTreeSet<_> = b.types.iter().map(|(id, _)| id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn sample_order_does_not_matter() {
        let rows = [json!({"a": 1}), json!({"b": "x"}), json!([true])];
        let cfg = InferenceConfig::default();
        let fwd = infer_from_values(rows.iter(), &cfg).unwrap();
        let rev = infer_from_values(rows.iter().rev(), &cfg).unwrap();
        assert_eq!(fwd.root_type_id, rev.root_type_id);
    }

    #[test]
    fn multiple_samples_fold_like_array_elements() {
        let cfg = InferenceConfig::default();
        let rows = [json!({"id": 1}), json!({"id": 2, "extra": "x"})];
        let from_samples = infer_from_values(rows.iter(), &cfg).unwrap();
        let from_array = infer(json!([{"id": 1}, {"id": 2, "extra": "x"}]));
        assert_eq!(from_samples.root_type_id, from_array.root_type_id);
    }

    #[test]
    fn classification_errors_carry_the_path() {
        let err = infer_type_structure(
            &json!({"rows": [{"at": {"$date": "soon"}}]}),
            &InferenceConfig::default(),
        )
        .unwrap_err();
        match err {
            InferenceError::Classification { path, .. } => assert_eq!(path, "rows[0].at"),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut v = json!(1);
        for _ in 0..10 {
            v = json!([v]);
        }
        let cfg = InferenceConfig { max_depth: 4 };
        let err = infer_type_structure(&v, &cfg).unwrap_err();
        assert!(matches!(err, InferenceError::DepthExceeded { limit: 4, .. }));
        assert!(infer_type_structure(&v, &InferenceConfig::default()).is_ok());
    }

    #[test]
    fn dangling_member_is_an_internal_error() {
        let mut inf = Inference::default();
        let err = inf.fold([TypeId::Node(NodeId(42)), TypeId::NUMBER].into()).unwrap_err();
        assert!(err.is_internal(), "{err}");
    }

    #[test]
    fn rule_selection_order() {
        let census = |total, arrays: usize, objects: usize, undef| Census {
            total,
            array_items: vec![TypeId::NUMBER; arrays],
            objects: vec![ObjectShape::new(); objects],
            has_undefined: undef,
        };
        assert_eq!(select_rule(&census(0, 0, 0, false)), Some(FoldRule::Bottom));
        assert_eq!(select_rule(&census(1, 1, 0, false)), Some(FoldRule::Identity));
        assert_eq!(select_rule(&census(2, 2, 0, false)), Some(FoldRule::MergeArrays));
        assert_eq!(select_rule(&census(3, 0, 3, false)), Some(FoldRule::MergeObjects));
        assert_eq!(select_rule(&census(3, 2, 0, true)), Some(FoldRule::OptionalArray));
        assert_eq!(select_rule(&census(2, 0, 1, true)), Some(FoldRule::OptionalObject));
        assert_eq!(select_rule(&census(3, 1, 1, true)), Some(FoldRule::MixedUnion));
        assert_eq!(select_rule(&census(3, 1, 0, true)), Some(FoldRule::MixedUnion));
    }

    #[test]
    fn query_results_are_keyed_per_statement() {
        let results = [json!([{"id": {"$recordId": "user:a"}}]), json!([])];
        let s = infer_query_results("Users", &results, &InferenceConfig::default()).unwrap();
        let obj = object(&s, s.root_type_id);
        assert_eq!(obj.keys().collect::<Vec<_>>(), ["Users_query1", "Users_query2"]);
        let err = infer_query_results("users", &results, &InferenceConfig::default()).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidQueryId { .. }));
    }
}
