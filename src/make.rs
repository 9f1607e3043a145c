//! Validation engine.
//!
//! A [`Maker`] checks an untyped [`Value`] against a schema node and returns a
//! [`Make`]: either the normalized value (tagged with the types it satisfies)
//! or the reasons it was rejected. [`from_reflection`] compiles a whole
//! [`Type`] tree into one maker; the `make_*` functions are the building
//! blocks it uses, exposed for hand-assembled schemas.
//!
//! Compilation never recurses through a named type: a `named` node becomes a
//! maker that looks up the definition's own (memoized) maker when it first
//! runs, which is what lets recursive schemas compile.
pub mod arr;
pub mod num;
pub mod obj;
pub mod string;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{ValidationError, ValidationFailure};
use crate::options::MakeOptions;
use crate::tags::{get_type_set, with_type, TypeSet};
use crate::ty::{render_literals, BooleanType, Literal, NamedType, Type};
use crate::value::Value;

pub use arr::make_array;
pub use num::{make_integer, make_number};
pub use obj::make_object;
pub use string::make_string;

// ---------------------------------- Make ---------------------------------- //

/// Outcome of one validation: exactly one value, or a non-empty error list.
#[derive(Debug, Clone)]
pub enum Make<V = Value> {
    Success(V),
    Error(Vec<ValidationError>),
}

impl<V> Make<V> {
    pub fn success(value: V) -> Self {
        Make::Success(value)
    }

    pub fn fail(error: ValidationError) -> Self {
        Make::Error(vec![error])
    }

    pub fn fail_all(errors: Vec<ValidationError>) -> Self {
        debug_assert!(!errors.is_empty(), "a failed Make needs at least one error");
        Make::Error(errors)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Make::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Make::Error(_))
    }

    pub fn success_value(&self) -> Option<&V> {
        match self {
            Make::Success(v) => Some(v),
            Make::Error(_) => None,
        }
    }

    /// Empty on success.
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Make::Success(_) => &[],
            Make::Error(errors) => errors,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> Make<U> {
        match self {
            Make::Success(v) => Make::Success(f(v)),
            Make::Error(errors) => Make::Error(errors),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(V) -> Make<U>) -> Make<U> {
        match self {
            Make::Success(v) => f(v),
            Make::Error(errors) => Make::Error(errors),
        }
    }

    /// Re-paths every error under `segment`.
    pub fn prepend_path(self, segment: &str) -> Self {
        match self {
            Make::Success(v) => Make::Success(v),
            Make::Error(errors) => {
                Make::Error(errors.into_iter().map(|e| e.at(segment)).collect())
            }
        }
    }

    /// The success value, or whatever `handler` makes of the errors.
    pub fn success_or_else(self, handler: impl FnOnce(Vec<ValidationError>) -> V) -> V {
        match self {
            Make::Success(v) => v,
            Make::Error(errors) => handler(errors),
        }
    }

    /// The unchecked accessor: a failure becomes one aggregate error listing
    /// every underlying `ValidationError`.
    pub fn into_result(self) -> Result<V, ValidationFailure> {
        match self {
            Make::Success(v) => Ok(v),
            Make::Error(errors) => Err(ValidationFailure { errors }),
        }
    }
}

impl<V> From<Make<V>> for Result<V, ValidationFailure> {
    fn from(make: Make<V>) -> Self {
        make.into_result()
    }
}

// ---------------------------------- Maker --------------------------------- //

type MakeFn = dyn Fn(&Value, &MakeOptions) -> Make + Send + Sync;
type BuildFn = dyn Fn() -> Maker + Send + Sync;

enum Body {
    Ready(Box<MakeFn>),
    Deferred { compiled: OnceCell<Maker>, build: Box<BuildFn> },
}

/// A compiled validator. Cheap to clone; stateless apart from one-time
/// compilation of deferred bodies.
#[derive(Clone)]
pub struct Maker {
    body: Arc<Body>,
    nominal: Option<NamedType>,
}

impl Maker {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &MakeOptions) -> Make + Send + Sync + 'static,
    {
        Self { body: Arc::new(Body::Ready(Box::new(f))), nominal: None }
    }

    pub fn make(&self, value: &Value, options: &MakeOptions) -> Make {
        match &*self.body {
            Body::Ready(f) => f(value, options),
            Body::Deferred { compiled, build } => compiled.get_or_init(|| build()).make(value, options),
        }
    }

    /// `make` with default options.
    pub fn call(&self, value: &Value) -> Make {
        self.make(value, &MakeOptions::default())
    }

    /// The named type this maker validates, if it was built from one.
    pub fn nominal(&self) -> Option<&NamedType> {
        self.nominal.as_ref()
    }

    pub(crate) fn with_nominal(mut self, named: NamedType) -> Self {
        self.nominal = Some(named);
        self
    }
}

impl fmt::Debug for Maker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Maker").field("nominal", &self.nominal).finish_non_exhaustive()
    }
}

/// A maker whose body is built on first use and cached.
pub fn create_maker<F>(build: F) -> Maker
where
    F: Fn() -> Maker + Send + Sync + 'static,
{
    Maker {
        body: Arc::new(Body::Deferred { compiled: OnceCell::new(), build: Box::new(build) }),
        nominal: None,
    }
}

// ------------------------------- Reflection ------------------------------- //

/// Compiles a schema node into its maker.
pub fn from_reflection(ty: &Type) -> Maker {
    match ty {
        Type::Unknown => make_any(),
        Type::Void => make_void(),
        Type::Null => make_null(),
        Type::Boolean(b) => boolean_maker(b.clone()),
        Type::Integer(n) => num::number_maker(n.clone(), true),
        Type::Number(n) => num::number_maker(n.clone(), false),
        Type::String(s) => string::string_maker(s.clone()),
        Type::Array(a) => arr::array_maker(from_reflection(&a.items), a.min_items, a.max_items, Some(ty.clone())),
        Type::Object(o) => obj::object_maker(o.clone(), None, ty.clone()),
        Type::Union(options) => crate::discriminate::union_maker(options),
        Type::Intersection(options) => make_all_of(options.iter().map(from_reflection).collect()),
        Type::Named(named) => {
            let target = named.clone();
            create_maker(move || target.maker()).with_nominal(named.clone())
        }
    }
}

/// Body of `NamedType::maker`. Everything it produces is tagged with the name.
pub(crate) fn compile_named(named: &NamedType) -> Maker {
    tracing::debug!(name = named.name(), kind = named.definition().kind(), "compiling named type");
    let tag = Type::Named(named.clone());
    let maker = match named.definition() {
        Type::Object(o) => obj::object_maker(o.clone(), None, tag),
        Type::Array(a) => arr::array_maker(from_reflection(&a.items), a.min_items, a.max_items, Some(tag)),
        other => {
            let inner = from_reflection(other);
            Maker::new(move |value, options| {
                inner.make(value, options).map(|mut out| {
                    with_type(&mut out, [tag.clone()]);
                    out
                })
            })
        }
    };
    maker.with_nominal(named.clone())
}

// ------------------------------- Combinators ------------------------------ //

pub fn make_any() -> Maker {
    Maker::new(|value, _| Make::success(value.clone()))
}

/// Accepts only the absence of a value.
pub fn make_void() -> Maker {
    Maker::new(|value, _| match value {
        Value::Undefined => Make::success(Value::Undefined),
        other => Make::fail(ValidationError::new(format!("expected no value, got {}", other.kind_name()))),
    })
}

pub fn make_null() -> Maker {
    Maker::new(|value, _| match value {
        Value::Null => Make::success(Value::Null),
        other => Make::fail(ValidationError::new(format!("expected null, got {}", other.kind_name()))),
    })
}

/// `undefined` passes through; anything else goes to `inner`.
pub fn make_optional(inner: Maker) -> Maker {
    Maker::new(move |value, options| match value {
        Value::Undefined => Make::success(Value::Undefined),
        other => inner.make(other, options),
    })
}

/// `null` passes through; anything else goes to `inner`.
pub fn make_nullable(inner: Maker) -> Maker {
    Maker::new(move |value, options| match value {
        Value::Null => Make::success(Value::Null),
        other => inner.make(other, options),
    })
}

pub fn make_enum(values: Vec<Literal>) -> Maker {
    Maker::new(move |value, _| match check_enum(&values, value) {
        None => Make::success(value.clone()),
        Some(err) => Make::fail(err),
    })
}

pub(crate) fn check_enum(values: &[Literal], value: &Value) -> Option<ValidationError> {
    if values.is_empty() {
        return None;
    }
    match Literal::of(value) {
        Some(lit) if values.contains(&lit) => None,
        _ => Some(ValidationError::new(format!("must be one of {}", render_literals(values)))),
    }
}

pub fn make_boolean(ty: BooleanType) -> Maker {
    boolean_maker(Arc::new(ty))
}

fn boolean_maker(ty: Arc<BooleanType>) -> Maker {
    Maker::new(move |value, options| {
        let b = match value {
            Value::Bool(b) => *b,
            Value::String(s) if options.parse_boolean_strings && s == "true" => true,
            Value::String(s) if options.parse_boolean_strings && s == "false" => false,
            other => {
                return Make::fail(ValidationError::new(format!("expected boolean, got {}", other.kind_name())));
            }
        };
        let out = Value::Bool(b);
        match check_enum(&ty.enum_, &out) {
            None => Make::success(out),
            Some(err) => Make::fail(err),
        }
    })
}

/// Exactly-one-of semantics.
///
/// An option is *preferred* when it is a named type the input already carries
/// as a tag and it hands the input back unchanged. One preferred match wins
/// outright; otherwise exactly one ordinary match must succeed.
pub fn make_one_of(options: Vec<Maker>) -> Maker {
    Maker::new(move |value, opts| {
        let mut preferred = Vec::new();
        let mut matched = Vec::new();
        let mut failures = Vec::new();

        for (i, option) in options.iter().enumerate() {
            match option.make(value, opts) {
                Make::Success(out) => {
                    if is_preferred(option, value, &out) {
                        preferred.push((i, out));
                    } else {
                        matched.push((i, out));
                    }
                }
                Make::Error(errors) => {
                    failures.push(ValidationError::group(format!("option {}", i + 1), errors));
                }
            }
        }

        if preferred.len() > 1 {
            return Make::fail(ValidationError::new(format!(
                "multiple preferred options match ({})",
                option_list(&preferred)
            )));
        }
        if let Some((_, out)) = preferred.pop() {
            return Make::success(out);
        }
        if matched.len() > 1 {
            return Make::fail(ValidationError::new(format!("multiple options match ({})", option_list(&matched))));
        }
        match matched.pop() {
            Some((_, out)) => Make::success(out),
            None => Make::fail(ValidationError::group("no option of oneOf matched", failures)),
        }
    })
}

fn is_preferred(option: &Maker, input: &Value, output: &Value) -> bool {
    let Some(named) = option.nominal() else {
        return false;
    };
    let me = Type::Named(named.clone());
    get_type_set(input).is_some_and(|set| set.contains(&me)) && output == input
}

fn option_list(hits: &[(usize, Value)]) -> String {
    let names = hits.iter().map(|(i, _)| (i + 1).to_string()).collect::<Vec<_>>();
    format!("options {}", names.join(", "))
}

/// Threads the value through every component in order; the result carries
/// the tags every component contributed.
pub fn make_all_of(components: Vec<Maker>) -> Maker {
    Maker::new(move |value, options| {
        let mut current = value.clone();
        let mut tags = TypeSet::new();
        for (i, component) in components.iter().enumerate() {
            match component.make(&current, options) {
                Make::Success(out) => {
                    if let Some(set) = get_type_set(&out) {
                        tags.extend(set.iter());
                    }
                    current = out;
                }
                Make::Error(errors) => {
                    return Make::fail(ValidationError::group(format!("allOf component {} failed", i + 1), errors));
                }
            }
        }
        with_type(&mut current, tags.to_vec());
        Make::success(current)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{ObjectType, PropType};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn one_of_accepts_the_single_match() {
        let m = make_one_of(vec![from_reflection(&Type::string()), from_reflection(&Type::number())]);
        assert_eq!(m.call(&v(json!("x"))).success_value(), Some(&v(json!("x"))));
    }

    #[test]
    fn one_of_groups_every_failure() {
        let m = make_one_of(vec![from_reflection(&Type::string()), from_reflection(&Type::number())]);
        let res = m.call(&v(json!(true)));
        let errors = res.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "no option of oneOf matched");
        let children = errors[0].children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].message(), "option 1");
        assert_eq!(children[1].message(), "option 2");
        assert!(errors[0].to_string().contains("- option 2: expected number, got boolean"));
    }

    #[test]
    fn one_of_rejects_ambiguous_matches() {
        let m = make_one_of(vec![make_any(), from_reflection(&Type::string())]);
        let res = m.call(&v(json!("x")));
        assert!(res.errors()[0].message().starts_with("multiple options match"));
    }

    #[test]
    fn preferred_match_wins_over_ordinary_matches() {
        let shape = ObjectType::new().required("id", Type::string());
        let a = NamedType::with_definition("A", Type::object(shape.clone()));
        let b = NamedType::with_definition("B", Type::object(shape));
        let union = from_reflection(&Type::union([Type::named(&a), Type::named(&b)]));

        let raw = v(json!({"id": "1"}));
        assert!(union.call(&raw).is_error());

        let built_a = a.maker().call(&raw).into_result().unwrap();
        let out = union.call(&built_a).into_result().unwrap();
        assert_eq!(a.is_a(&out), Some(true));
    }

    #[test]
    fn value_tagged_with_two_options_is_rejected() {
        let shape = ObjectType::new().required("id", Type::string());
        let a = NamedType::with_definition("A", Type::object(shape.clone()));
        let b = NamedType::with_definition("B", Type::object(shape));
        let both = make_all_of(vec![a.maker(), b.maker()]).call(&v(json!({"id": "1"}))).into_result().unwrap();
        assert_eq!(a.is_a(&both), Some(true));
        assert_eq!(b.is_a(&both), Some(true));

        let res = from_reflection(&Type::union([Type::named(&a), Type::named(&b)])).call(&both);
        assert_eq!(res.errors().len(), 1);
        assert_eq!(res.errors()[0].message(), "multiple preferred options match (options 1, 2)");
    }

    #[test]
    fn all_of_narrows_and_merges_tags() {
        let left = NamedType::with_definition("Left", Type::object(ObjectType::new().required("a", Type::number())));
        let right = NamedType::with_definition(
            "Right",
            Type::object(ObjectType::new().required("b", Type::integer())),
        );
        let both = make_all_of(vec![left.maker(), right.maker()]);
        let opts = MakeOptions { parse_numeric_strings: true, ..MakeOptions::default() };
        let out = both.make(&v(json!({"a": 1.5, "b": "2"})), &opts).into_result().unwrap();
        assert_eq!(out.get("b"), Some(&v(json!(2))));
        assert_eq!(left.is_a(&out), Some(true));
        assert_eq!(right.is_a(&out), Some(true));
    }

    #[test]
    fn all_of_reports_failing_component() {
        let both = make_all_of(vec![make_any(), from_reflection(&Type::string())]);
        let res = both.call(&v(json!(1)));
        assert_eq!(res.errors()[0].message(), "allOf component 2 failed");
    }

    #[test]
    fn create_maker_compiles_once() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);
        let m = create_maker(|| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            make_any()
        });
        assert_eq!(BUILDS.load(Ordering::SeqCst), 0);
        m.call(&Value::Null);
        m.clone().call(&Value::Null);
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recursive_named_types_compile_and_validate() {
        let node = NamedType::new("Node");
        node.define(Type::object(
            ObjectType::new()
                .required("value", Type::integer())
                .property("children", PropType::optional(Type::array(Type::named(&node)))),
        ))
        .unwrap();
        let tree = v(json!({"value": 1, "children": [{"value": 2}, {"value": 3, "children": []}]}));
        assert!(node.maker().call(&tree).is_success());

        let bad = v(json!({"value": 1, "children": [{"value": "x"}]}));
        let errors = node.maker().call(&bad).errors().to_vec();
        assert_eq!(errors[0].path_string(), "children[0].value");
    }

    #[test]
    fn optional_nullable_void_and_enum() {
        let opt = make_optional(from_reflection(&Type::string()));
        assert!(opt.call(&Value::Undefined).is_success());
        assert!(opt.call(&Value::Null).is_error());

        let nullable = make_nullable(from_reflection(&Type::string()));
        assert!(nullable.call(&Value::Null).is_success());

        assert!(make_void().call(&Value::Undefined).is_success());
        assert!(make_void().call(&Value::Null).is_error());

        let e = make_enum(vec![Literal::from("a"), Literal::from(1i64)]);
        assert!(e.call(&v(json!(1))).is_success());
        assert_eq!(e.call(&v(json!("b"))).errors()[0].message(), "must be one of [\"a\", 1]");
    }

    #[test]
    fn booleans_parse_strings_only_when_asked() {
        let m = make_boolean(BooleanType::default());
        assert!(m.call(&v(json!("true"))).is_error());
        let opts = MakeOptions { parse_boolean_strings: true, ..MakeOptions::default() };
        assert_eq!(m.make(&v(json!("false")), &opts).success_value(), Some(&Value::Bool(false)));
        assert!(m.make(&v(json!("yes")), &opts).is_error());
    }

    #[test]
    fn into_result_aggregates_errors() {
        let failure = from_reflection(&Type::string()).call(&v(json!(1))).into_result().unwrap_err();
        assert_eq!(failure.errors.len(), 1);
        assert!(failure.to_string().contains("expected string, got number"));
    }
}
