//! TypeScript declaration emitter.
//!
//! Objects become named declarations; arrays and unions render inline.
//! Sentinel kinds are rendered through a caller-supplied literal table.

use std::collections::{BTreeMap, HashSet, VecDeque};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CodegenError;
use crate::types::{Descriptor, Field, NodeId, SimpleKind, TypeId, TypeStructure};

static IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern compiles")
});

const TS_GLOBALS: &[&str] = &[
    "Array", "ArrayBuffer", "BigInt", "Boolean", "DataView", "Date", "Error", "Function", "JSON",
    "Map", "Math", "Number", "Object", "Promise", "Record", "RegExp", "Set", "String", "Symbol",
    "WeakMap", "WeakSet", "Partial", "Readonly", "Required", "Pick", "Omit",
];

// ————————————————————————————————————————————————————————————————————————————
// OPTIONS
// ————————————————————————————————————————————————————————————————————————————

/// Literal used for every sentinel kind, plus the bottom type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelLiterals {
    literals: BTreeMap<SimpleKind, String>,
    bottom: String,
}

impl Default for SentinelLiterals {
    fn default() -> Self {
        Self {
            literals: SimpleKind::ALL.iter().map(|k| (*k, k.name().to_owned())).collect(),
            bottom: "never".to_owned(),
        }
    }
}

impl SentinelLiterals {
    pub fn literal(&self, kind: SimpleKind) -> &str {
        self.literals.get(&kind).map(String::as_str).unwrap_or(kind.name())
    }

    pub fn set(&mut self, kind: SimpleKind, literal: impl Into<String>) {
        self.literals.insert(kind, literal.into());
    }

    pub fn bottom(&self) -> &str { &self.bottom }

    pub fn set_bottom(&mut self, literal: impl Into<String>) { self.bottom = literal.into(); }

    /// Every literal this mapping can print, bottom included.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.literals.values().map(String::as_str).chain([self.bottom.as_str()])
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    /// `export type X = {..};` instead of `export interface X {..}`
    pub use_type_alias: bool,
    /// Render an object root as a positional tuple of its field types.
    pub root_as_tuple: bool,
    pub literals: SentinelLiterals,
}

// ————————————————————————————————————————————————————————————————————————————
// CODEGEN
// ————————————————————————————————————————————————————————————————————————————

pub struct Codegen {
    options: CodegenOptions,
    taken: HashSet<String>,
    decls: Vec<String>,
}

impl Codegen {
    /// Sentinel literals and TypeScript globals are never handed out as
    /// declaration names; a clashing key gets a numeric suffix instead.
    pub fn new(options: CodegenOptions) -> Self {
        let taken = TS_GLOBALS
            .iter()
            .copied()
            .chain(options.literals.all())
            .map(str::to_owned)
            .collect();
        Self { options, taken, decls: Vec::new() }
    }

    /// Emit declarations for the root of `structure` and everything it reaches.
    /// Names stay unique across repeated calls.
    pub fn emit(&mut self, structure: &TypeStructure, root_name: &str) -> Result<(), CodegenError> {
        if !IDENT.is_match(root_name) {
            return Err(CodegenError::InvalidName { name: root_name.to_owned() });
        }
        let root = structure.root_type_id;
        let root_name = self.unique(root_name);
        let names = self.assign_names(structure, root, &root_name)?;
        let root_is_object = matches!(structure.get(root), Some(Descriptor::Object(_)));

        if !root_is_object {
            let body = self.render(structure, &names, root)?;
            self.decls.push(format!("export type {root_name} = {body};\n"));
        }

        for (node, name) in &names {
            let Some(Descriptor::Object(fields)) = structure.types.get(*node) else { continue };
            let decl = if TypeId::Node(*node) == root && self.options.root_as_tuple {
                self.tuple_decl(structure, &names, name, fields)?
            } else {
                self.object_decl(structure, &names, name, fields)?
            };
            self.decls.push(decl);
        }
        Ok(())
    }

    pub fn into_string(self) -> String { self.decls.join("\n") }

    fn unique(&mut self, base: &str) -> String {
        let mut candidate = base.to_owned();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}{n}");
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    /// Breadth-first from the root; each object node gets one name, the first
    /// hint that reaches it.
    fn assign_names(
        &mut self,
        structure: &TypeStructure,
        root: TypeId,
        root_name: &str,
    ) -> Result<IndexMap<NodeId, String>, CodegenError> {
        let mut names = IndexMap::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([(root, root_name.to_owned(), true)]);

        while let Some((id, hint, is_root)) = queue.pop_front() {
            let Some(node) = id.node() else { continue };
            if !seen.insert(node) {
                continue;
            }
            match structure.types.get(node).ok_or(CodegenError::MissingType(node))? {
                Descriptor::Object(fields) => {
                    let name = if is_root { hint } else { self.unique(&hint) };
                    names.insert(node, name);
                    for (key, field) in fields {
                        queue.push_back((field.ty(), pascal_case(key), false));
                    }
                }
                Descriptor::Array(item) => queue.push_back((*item, format!("{hint}Item"), false)),
                Descriptor::Union(members) => {
                    for m in members {
                        queue.push_back((*m, hint.clone(), false));
                    }
                }
            }
        }
        Ok(names)
    }

    fn render(
        &self,
        structure: &TypeStructure,
        names: &IndexMap<NodeId, String>,
        id: TypeId,
    ) -> Result<String, CodegenError> {
        let node = match id {
            TypeId::Simple(kind) => return Ok(self.options.literals.literal(kind).to_owned()),
            TypeId::Node(node) => node,
        };
        match structure.types.get(node).ok_or(CodegenError::MissingType(node))? {
            Descriptor::Object(_) => names.get(&node).cloned().ok_or(CodegenError::MissingType(node)),
            Descriptor::Array(item) => {
                let inner = self.render(structure, names, *item)?;
                let needs_parens = matches!(
                    structure.get(*item),
                    Some(Descriptor::Union(members)) if members.len() > 1
                );
                Ok(if needs_parens { format!("({inner})[]") } else { format!("{inner}[]") })
            }
            Descriptor::Union(members) if members.is_empty() => Ok(self.options.literals.bottom().to_owned()),
            Descriptor::Union(members) => {
                // null and undefined read best at the tail
                let mut ordered: Vec<TypeId> = members.iter().copied().collect();
                ordered.sort_by_key(|m| matches!(m, TypeId::Simple(SimpleKind::Null | SimpleKind::Undefined)));
                let arms = ordered
                    .into_iter()
                    .map(|m| self.render(structure, names, m))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(arms.join(" | "))
            }
        }
    }

    fn object_decl(
        &self,
        structure: &TypeStructure,
        names: &IndexMap<NodeId, String>,
        name: &str,
        fields: &BTreeMap<String, Field>,
    ) -> Result<String, CodegenError> {
        let (open, close) = if self.options.use_type_alias {
            (format!("export type {name} = {{"), "};")
        } else {
            (format!("export interface {name} {{"), "}")
        };
        if fields.is_empty() {
            return Ok(format!("{open}{close}\n"));
        }
        let mut out = open;
        out.push('\n');
        for (key, field) in fields {
            let ty = self.render(structure, names, field.ty())?;
            let marker = if field.is_optional() { "?" } else { "" };
            out.push_str(&format!("  {}{marker}: {ty};\n", property_key(key)));
        }
        out.push_str(close);
        out.push('\n');
        Ok(out)
    }

    fn tuple_decl(
        &self,
        structure: &TypeStructure,
        names: &IndexMap<NodeId, String>,
        name: &str,
        fields: &BTreeMap<String, Field>,
    ) -> Result<String, CodegenError> {
        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort_by(|a, b| natural_key(a).cmp(&natural_key(b)));
        let elems = keys
            .into_iter()
            .map(|k| self.render(structure, names, fields[k].ty()))
            .collect::<Result<Vec<_>, _>>()?;
        if elems.is_empty() {
            return Ok(format!("export type {name} = [];\n"));
        }
        Ok(format!("export type {name} = [\n  {}\n];\n", elems.join(",\n  ")))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn property_key(key: &str) -> String {
    if IDENT.is_match(key) {
        key.to_owned()
    } else {
        serde_json::Value::from(key).to_string()
    }
}

/// `created_at` → `CreatedAt`; falls back to `Type` when nothing usable is left.
pub fn pascal_case(key: &str) -> String {
    let mut out = String::new();
    for part in key.split(|c: char| !c.is_ascii_alphanumeric()).filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    match out.chars().next() {
        None => "Type".to_owned(),
        Some(c) if c.is_ascii_digit() => format!("T{out}"),
        Some(_) => out,
    }
}

/// Orders `q_query2` before `q_query10`.
fn natural_key(s: &str) -> (&str, u64, &str) {
    let digits = s.len() - s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (prefix, tail) = s.split_at(s.len() - digits);
    (prefix, tail.parse().unwrap_or(u64::MAX), s)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
