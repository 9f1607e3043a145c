//! Schema type model.
//!
//! A `Type` is the read-only description of a schema node that every other
//! part of the crate consumes. It is built once (by whatever loads the schema
//! document) and then only inspected. Children sit behind `Arc`, so cloning a
//! `Type` is cheap and every non-unit node has a reference identity that type
//! tags use to tell "this exact schema node" apart from a structurally equal
//! one.
//!
//! Recursive schemas go through [`NamedType`]: the definition is attached
//! after the handle exists, so a definition may mention its own name.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use ordered_float::OrderedFloat;
use regex::Regex;

use crate::error::{Error, Result};
use crate::make::Maker;
use crate::tags::get_type_set;
use crate::value::Value;

/// Upper bound on `named -> named` alias hops followed by [`Type::resolve`].
const MAX_ALIAS_DEPTH: usize = 64;

static UNKNOWN: Type = Type::Unknown;

// ------------------------------- Literals --------------------------------- //

/// A scalar constant usable in an `enum` and as a discriminator key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

impl Literal {
    /// The literal a value denotes, if it is a scalar.
    pub fn of(value: &Value) -> Option<Literal> {
        match value {
            Value::Null => Some(Literal::Null),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|f| Literal::Number(OrderedFloat(f))),
            Value::String(s) => Some(Literal::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) => write!(f, "{}", n.0),
            Literal::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(OrderedFloat(n))
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Number(OrderedFloat(n as f64))
    }
}

pub(crate) fn render_literals(lits: &[Literal]) -> String {
    let parts = lits.iter().map(|l| l.to_string()).collect::<Vec<_>>();
    format!("[{}]", parts.join(", "))
}

// ------------------------------ Scalar nodes ------------------------------ //

#[derive(Debug, Clone, Default)]
pub struct StringType {
    pub format: Option<String>,
    pub pattern: Option<Regex>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub enum_: Vec<Literal>,
}

impl StringType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, name: impl Into<String>) -> Self {
        self.format = Some(name.into());
        self
    }

    /// Compiles `pattern` now; a malformed pattern is a schema bug, not a
    /// validation outcome.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        let rx = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.pattern = Some(rx);
        Ok(self)
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn enum_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_ = values.into_iter().map(|s| Literal::String(s.into())).collect();
        self
    }
}

/// Shared by `integer` and `number`; bounds are inclusive unless marked exclusive.
#[derive(Debug, Clone, Default)]
pub struct NumberType {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub enum_: Vec<Literal>,
}

impl NumberType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minimum(mut self, m: f64) -> Self {
        self.minimum = Some(m);
        self
    }

    pub fn maximum(mut self, m: f64) -> Self {
        self.maximum = Some(m);
        self
    }

    pub fn exclusive_minimum(mut self, m: f64) -> Self {
        self.exclusive_minimum = Some(m);
        self
    }

    pub fn exclusive_maximum(mut self, m: f64) -> Self {
        self.exclusive_maximum = Some(m);
        self
    }

    pub fn enum_of<I: IntoIterator<Item = f64>>(mut self, values: I) -> Self {
        self.enum_ = values.into_iter().map(Literal::from).collect();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct BooleanType {
    pub enum_: Vec<Literal>,
}

// ----------------------------- Composite nodes ---------------------------- //

#[derive(Debug, Clone)]
pub struct ArrayType {
    pub items: Type,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl ArrayType {
    pub fn new(items: Type) -> Self {
        Self { items, min_items: None, max_items: None }
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }
}

/// What an object does with keys it does not declare.
#[derive(Debug, Clone, Default)]
pub enum AdditionalProperties {
    /// Keep them as they are.
    #[default]
    Any,
    /// Reject them ("unexpected property") unless the caller asks to drop them.
    Deny,
    /// Validate each against this type.
    Schema(Type),
}

#[derive(Debug, Clone)]
pub struct PropType {
    pub required: bool,
    pub value: Type,
    /// Wire-format name, when it differs from the property name.
    pub network_name: Option<String>,
}

impl PropType {
    pub fn required(value: Type) -> Self {
        Self { required: true, value, network_name: None }
    }

    pub fn optional(value: Type) -> Self {
        Self { required: false, value, network_name: None }
    }

    pub fn network_name(mut self, name: impl Into<String>) -> Self {
        self.network_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectType {
    /// Declaration order is kept; it is the tie-break for validation order.
    pub properties: IndexMap<String, PropType>,
    pub additional_properties: AdditionalProperties,
}

impl ObjectType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, prop: PropType) -> Self {
        self.properties.insert(name.into(), prop);
        self
    }

    pub fn required(self, name: impl Into<String>, value: Type) -> Self {
        self.property(name, PropType::required(value))
    }

    pub fn optional(self, name: impl Into<String>, value: Type) -> Self {
        self.property(name, PropType::optional(value))
    }

    pub fn additional(mut self, additional: AdditionalProperties) -> Self {
        self.additional_properties = additional;
        self
    }

    pub fn deny_unknown(self) -> Self {
        self.additional(AdditionalProperties::Deny)
    }
}

// ---------------------------------- Type ---------------------------------- //

#[derive(Debug, Clone)]
pub enum Type {
    Unknown,
    Void,
    Null,
    Boolean(Arc<BooleanType>),
    Integer(Arc<NumberType>),
    Number(Arc<NumberType>),
    String(Arc<StringType>),
    Array(Arc<ArrayType>),
    Object(Arc<ObjectType>),
    Union(Arc<[Type]>),
    Intersection(Arc<[Type]>),
    Named(NamedType),
}

impl Type {
    pub fn boolean() -> Self {
        Type::Boolean(Arc::new(BooleanType::default()))
    }

    pub fn integer() -> Self {
        Type::Integer(Arc::new(NumberType::default()))
    }

    pub fn integer_with(n: NumberType) -> Self {
        Type::Integer(Arc::new(n))
    }

    pub fn number() -> Self {
        Type::Number(Arc::new(NumberType::default()))
    }

    pub fn number_with(n: NumberType) -> Self {
        Type::Number(Arc::new(n))
    }

    pub fn string() -> Self {
        Type::String(Arc::new(StringType::default()))
    }

    pub fn string_with(s: StringType) -> Self {
        Type::String(Arc::new(s))
    }

    /// `string` restricted to the given literals.
    pub fn string_enum<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Type::string_with(StringType::new().enum_of(values))
    }

    pub fn array(items: Type) -> Self {
        Type::Array(Arc::new(ArrayType::new(items)))
    }

    pub fn array_with(a: ArrayType) -> Self {
        Type::Array(Arc::new(a))
    }

    pub fn object(o: ObjectType) -> Self {
        Type::Object(Arc::new(o))
    }

    pub fn union<I: IntoIterator<Item = Type>>(options: I) -> Self {
        Type::Union(options.into_iter().collect())
    }

    pub fn intersection<I: IntoIterator<Item = Type>>(options: I) -> Self {
        Type::Intersection(options.into_iter().collect())
    }

    pub fn named(n: &NamedType) -> Self {
        Type::Named(n.clone())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Type::Unknown => "unknown",
            Type::Void => "void",
            Type::Null => "null",
            Type::Boolean(_) => "boolean",
            Type::Integer(_) => "integer",
            Type::Number(_) => "number",
            Type::String(_) => "string",
            Type::Array(_) => "array",
            Type::Object(_) => "object",
            Type::Union(_) => "union",
            Type::Intersection(_) => "intersection",
            Type::Named(_) => "named",
        }
    }

    /// Reference identity: the same schema node, not merely an equal one.
    pub fn same(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Unknown, Type::Unknown) | (Type::Void, Type::Void) | (Type::Null, Type::Null) => true,
            (Type::Boolean(a), Type::Boolean(b)) => Arc::ptr_eq(a, b),
            (Type::Integer(a), Type::Integer(b)) | (Type::Number(a), Type::Number(b)) => Arc::ptr_eq(a, b),
            (Type::String(a), Type::String(b)) => Arc::ptr_eq(a, b),
            (Type::Array(a), Type::Array(b)) => Arc::ptr_eq(a, b),
            (Type::Object(a), Type::Object(b)) => Arc::ptr_eq(a, b),
            (Type::Union(a), Type::Union(b)) | (Type::Intersection(a), Type::Intersection(b)) => {
                std::ptr::eq(a.as_ptr(), b.as_ptr()) && a.len() == b.len()
            }
            (Type::Named(a), Type::Named(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Follows `named` references down to the first structural node.
    /// Undefined names and alias cycles resolve to `unknown`.
    pub fn resolve(&self) -> &Type {
        let mut current = self;
        for _ in 0..MAX_ALIAS_DEPTH {
            match current {
                Type::Named(n) => current = n.definition(),
                other => return other,
            }
        }
        &UNKNOWN
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.resolve(),
            Type::Null | Type::Boolean(_) | Type::Integer(_) | Type::Number(_) | Type::String(_)
        )
    }

    /// The non-empty literal set of a scalar `enum`, if any.
    pub fn literals(&self) -> Option<&[Literal]> {
        let lits = match self.resolve() {
            Type::Boolean(b) => &b.enum_,
            Type::Integer(n) | Type::Number(n) => &n.enum_,
            Type::String(s) => &s.enum_,
            _ => return None,
        };
        if lits.is_empty() { None } else { Some(lits) }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self.resolve() {
            Type::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Named(n) => f.write_str(n.name()),
            Type::Array(a) => write!(f, "array<{}>", a.items),
            other => f.write_str(other.kind()),
        }
    }
}

// ------------------------------- Named types ------------------------------ //

/// A named schema entity, the unit of recursion and of runtime identity.
///
/// Definitions are expected to live as long as the program: a self-referential
/// definition holds a strong reference to itself.
pub struct NamedTypeDefinition {
    name: String,
    definition: OnceCell<Type>,
    maker: OnceCell<Maker>,
}

/// Shared handle to a [`NamedTypeDefinition`].
#[derive(Clone)]
pub struct NamedType(Arc<NamedTypeDefinition>);

impl NamedType {
    /// A name whose definition is supplied later with [`NamedType::define`].
    pub fn new(name: impl Into<String>) -> Self {
        NamedType(Arc::new(NamedTypeDefinition {
            name: name.into(),
            definition: OnceCell::new(),
            maker: OnceCell::new(),
        }))
    }

    pub fn with_definition(name: impl Into<String>, definition: Type) -> Self {
        let named = NamedType::new(name);
        // fresh cell, cannot already be set
        let _ = named.0.definition.set(definition);
        named
    }

    pub fn define(&self, definition: Type) -> Result<()> {
        self.0
            .definition
            .set(definition)
            .map_err(|_| Error::AlreadyDefined(self.0.name.clone()))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The definition, or `unknown` while it has not been supplied.
    pub fn definition(&self) -> &Type {
        self.0.definition.get().unwrap_or(&UNKNOWN)
    }

    /// Compiled once, on first use.
    pub fn maker(&self) -> Maker {
        self.0
            .maker
            .get_or_init(|| crate::make::compile_named(self))
            .clone()
    }

    /// Runtime identity check.
    ///
    /// Objects and arrays are recognised by their type tags; scalars by
    /// running the maker. Unions and other shapes have no identity to check.
    pub fn is_a(&self, value: &Value) -> Option<bool> {
        match self.definition().resolve() {
            Type::Object(_) | Type::Array(_) => {
                let me = Type::Named(self.clone());
                Some(get_type_set(value).is_some_and(|set| set.contains(&me)))
            }
            t if t.is_scalar() => Some(self.maker().call(value).is_success()),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &NamedType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity key for lookup tables.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedType").field(&self.0.name).finish()
    }
}
