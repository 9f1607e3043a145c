//! Union discriminator inference.
//!
//! Trying every option of a union is quadratic in the worst case and produces
//! noisy errors. Most real unions are tagged: each variant requires some
//! property whose value is a fixed literal. [`discriminate_union`] finds such a
//! key when one exists, and the union maker then dispatches on it directly.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::ValidationError;
use crate::make::{from_reflection, make_one_of, Make, Maker};
use crate::ty::{render_literals, Literal, Type};
use crate::value::Value;

/// Nested unions deeper than this contribute no candidates.
const MAX_NESTING: usize = 8;

/// The dispatch plan for a union.
#[derive(Debug, Clone)]
pub struct Differentiator {
    /// Property name read from the input.
    pub key: String,
    /// Wire name of `key`, when it has one.
    pub network_key: Option<String>,
    pub value_to_type: IndexMap<Literal, Type>,
    /// Variants with no literal at `key`; tried one-of style when dispatch misses.
    pub undiscriminated: Vec<Type>,
    value_to_index: IndexMap<Literal, usize>,
    undiscriminated_index: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Candidate {
    key: String,
    network_name: Option<String>,
    values: Vec<Literal>,
}

/// Literal values a property type can take, if it is restricted to literals.
fn property_literals(ty: &Type) -> Option<Vec<Literal>> {
    if let Some(lits) = ty.literals() {
        return Some(lits.to_vec());
    }
    let Type::Union(options) = ty.resolve() else {
        return None;
    };
    let mut out = Vec::new();
    for option in options.iter() {
        for lit in option.literals()? {
            if !out.contains(lit) {
                out.push(lit.clone());
            }
        }
    }
    (!out.is_empty()).then_some(out)
}

/// Required literal-valued properties of a variant, in declaration order.
fn candidates(ty: &Type, depth: usize) -> Vec<Candidate> {
    if depth > MAX_NESTING {
        return Vec::new();
    }
    match ty.resolve() {
        Type::Object(o) => o
            .properties
            .iter()
            .filter(|(_, p)| p.required)
            .filter_map(|(name, p)| {
                property_literals(&p.value).map(|values| Candidate {
                    key: name.clone(),
                    network_name: p.network_name.clone(),
                    values,
                })
            })
            .collect(),
        Type::Intersection(parts) => {
            let mut out: Vec<Candidate> = Vec::new();
            for part in parts.iter() {
                for c in candidates(part, depth + 1) {
                    if !out.iter().any(|o| o.key == c.key) {
                        out.push(c);
                    }
                }
            }
            out
        }
        // A nested union only keeps keys on which every branch agrees exactly.
        Type::Union(branches) => {
            let mut iter = branches.iter();
            let Some(first) = iter.next() else {
                return Vec::new();
            };
            let mut common = candidates(first, depth + 1);
            for branch in iter {
                let theirs = candidates(branch, depth + 1);
                common.retain(|c| {
                    theirs
                        .iter()
                        .any(|t| t.key == c.key && t.values == c.values && t.network_name == c.network_name)
                });
            }
            common
        }
        _ => Vec::new(),
    }
}

/// Proposes a dispatch key for `variants`, or `None` when trial matching is
/// the only option.
///
/// Keys are tried in the order they first appear. A key qualifies when every
/// tagged variant declares it and no literal value is shared by two variants.
pub fn discriminate_union(variants: &[Type]) -> Option<Differentiator> {
    let per_variant = variants.iter().map(|v| candidates(v, 0)).collect::<Vec<_>>();
    let tagged = (0..variants.len()).filter(|&i| !per_variant[i].is_empty()).collect::<Vec<_>>();
    if tagged.len() < 2 {
        return None;
    }

    let mut keys: Vec<&str> = Vec::new();
    for &i in &tagged {
        for c in &per_variant[i] {
            if !keys.contains(&c.key.as_str()) {
                keys.push(&c.key);
            }
        }
    }

    'keys: for key in keys {
        let mut value_to_index: IndexMap<Literal, usize> = IndexMap::new();
        let mut network_key: Option<Option<&String>> = None;
        for &i in &tagged {
            let Some(c) = per_variant[i].iter().find(|c| c.key == key) else {
                continue 'keys;
            };
            match network_key {
                None => network_key = Some(c.network_name.as_ref()),
                Some(seen) if seen != c.network_name.as_ref() => continue 'keys,
                Some(_) => {}
            }
            for lit in &c.values {
                if value_to_index.insert(lit.clone(), i).is_some_and(|prev| prev != i) {
                    continue 'keys;
                }
            }
        }

        let undiscriminated_index = (0..variants.len()).filter(|i| !tagged.contains(i)).collect::<Vec<_>>();
        return Some(Differentiator {
            key: key.to_string(),
            network_key: network_key.flatten().cloned(),
            value_to_type: value_to_index.iter().map(|(lit, &i)| (lit.clone(), variants[i].clone())).collect(),
            undiscriminated: undiscriminated_index.iter().map(|&i| variants[i].clone()).collect(),
            value_to_index,
            undiscriminated_index,
        });
    }
    None
}

/// Maker for a `union` node: discriminator dispatch when one exists, plain
/// one-of otherwise.
pub(crate) fn union_maker(options: &[Type]) -> Maker {
    let makers = options.iter().map(from_reflection).collect::<Vec<_>>();
    let Some(diff) = discriminate_union(options) else {
        return make_one_of(makers);
    };
    debug!(key = %diff.key, variants = options.len(), "union discriminator selected");

    let fallback = (!diff.undiscriminated_index.is_empty())
        .then(|| make_one_of(diff.undiscriminated_index.iter().map(|&i| makers[i].clone()).collect()));
    let dispatch = diff
        .value_to_index
        .iter()
        .map(|(lit, &i)| (lit.clone(), makers[i].clone()))
        .collect::<HashMap<_, _>>();
    let expected = render_literals(&diff.value_to_index.keys().cloned().collect::<Vec<_>>());
    let Differentiator { key, network_key, .. } = diff;
    let variants = options.to_vec();

    Maker::new(move |value, opts| {
        let Value::Object(input) = value else {
            return match &fallback {
                Some(fallback) => fallback.make(value, opts),
                None => Make::fail(ValidationError::new(format!("expected object, got {}", value.kind_name()))),
            };
        };
        let read_key = match &network_key {
            Some(wire) if opts.convert_from_network && !variants.iter().any(|v| input.tags().contains(v)) => {
                wire.as_str()
            }
            _ => key.as_str(),
        };
        let found = input.get(read_key).unwrap_or(&Value::Undefined);
        if let Some(maker) = Literal::of(found).and_then(|lit| dispatch.get(&lit)) {
            return maker.make(value, opts);
        }
        if let Some(fallback) = &fallback {
            trace!(key = %key, "discriminator missed, trying undiscriminated variants");
            return fallback.make(value, opts);
        }
        let got = Literal::of(found).map_or_else(|| found.kind_name().to_string(), |l| l.to_string());
        Make::fail(
            ValidationError::new(format!("invalid value for discriminator '{key}': got {got}, expected one of {expected}"))
                .at(key.as_str()),
        )
    })
}
