//! Runtime type tags.
//!
//! Every array and object produced by a maker records which schema types it
//! satisfies. The set belongs to the value it is attached to: it is cloned with
//! the value and only ever grows. Serialization reads it for wire names,
//! intersections merge it, re-validation uses it to detect already-converted
//! input, and `Traversal` matches named types against it.

use std::fmt;

use crate::ty::Type;
use crate::value::Value;

/// Append-only, insertion-ordered set of types, compared by identity.
#[derive(Clone, Default)]
pub struct TypeSet(Vec<Type>);

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, ty: &Type) -> bool {
        self.0.iter().any(|t| t.same(ty))
    }

    /// Returns `false` when the type was already a member.
    pub fn insert(&mut self, ty: Type) -> bool {
        if self.contains(&ty) {
            return false;
        }
        self.0.push(ty);
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Type> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<Type> {
        self.0.clone()
    }
}

impl Extend<Type> for TypeSet {
    fn extend<I: IntoIterator<Item = Type>>(&mut self, iter: I) {
        for ty in iter {
            self.insert(ty);
        }
    }
}

impl<'a> Extend<&'a Type> for TypeSet {
    fn extend<I: IntoIterator<Item = &'a Type>>(&mut self, iter: I) {
        for ty in iter {
            self.insert(ty.clone());
        }
    }
}

impl FromIterator<Type> for TypeSet {
    fn from_iter<I: IntoIterator<Item = Type>>(iter: I) -> Self {
        let mut set = TypeSet::new();
        set.extend(iter);
        set
    }
}

impl fmt::Debug for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter().map(|t| t.to_string())).finish()
    }
}

/// Merges `types` into the value's tag set. Scalars carry no tags, so this is
/// a no-op for them, as it is for an empty `types`.
pub fn with_type<I: IntoIterator<Item = Type>>(value: &mut Value, types: I) {
    let set = match value {
        Value::Array(a) => a.tags_mut(),
        Value::Object(o) => o.tags_mut(),
        _ => return,
    };
    set.extend(types);
}

/// The attached tag set, if the value can carry one.
pub fn get_type_set(value: &Value) -> Option<&TypeSet> {
    match value {
        Value::Array(a) => Some(a.tags()),
        Value::Object(o) => Some(o.tags()),
        _ => None,
    }
}

/// The tag set as an ordered list; empty for scalars and untagged values.
pub fn get_type(value: &Value) -> Vec<Type> {
    get_type_set(value).map(TypeSet::to_vec).unwrap_or_default()
}
