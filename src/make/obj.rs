use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::ValidationError;
use crate::make::{from_reflection, Make, Maker};
use crate::options::UnknownField;
use crate::ty::{AdditionalProperties, NamedType, ObjectType, PropType, Type};
use crate::value::{Object, Value};

/// Input keys rejected regardless of schema.
const MAGIC_FIELDS: [&str; 2] = ["__proto__", "constructor"];

struct CompiledProp {
    name: String,
    network_name: Option<String>,
    required: bool,
    maker: Maker,
}

enum Additional {
    Any,
    Deny,
    Schema(Maker),
}

/// `props` and `additional` describe the object; `comparison_order` overrides
/// the validation order for the names it lists; the result is tagged with
/// `named_type` when given, else with the anonymous object type.
pub fn make_object(
    props: IndexMap<String, PropType>,
    additional: AdditionalProperties,
    comparison_order: Option<Vec<String>>,
    named_type: Option<&NamedType>,
) -> Maker {
    let object = Arc::new(ObjectType { properties: props, additional_properties: additional });
    let tag = match named_type {
        Some(named) => Type::Named(named.clone()),
        None => Type::Object(object.clone()),
    };
    object_maker(object, comparison_order, tag)
}

/// Cheap discriminating checks first, nested structures last:
/// single-valued enums, other enums, patterned strings, required scalars,
/// other scalars, everything else.
fn priority(prop: &PropType) -> u8 {
    let resolved = prop.value.resolve();
    match resolved.literals() {
        Some(lits) if lits.len() == 1 => return 0,
        Some(_) => return 1,
        None => {}
    }
    match resolved {
        Type::String(s) if s.pattern.is_some() => 2,
        t if t.is_scalar() && prop.required => 3,
        t if t.is_scalar() => 4,
        _ => 5,
    }
}

fn validation_order(object: &ObjectType, comparison_order: Option<&[String]>) -> Vec<usize> {
    let mut order = Vec::with_capacity(object.properties.len());
    if let Some(names) = comparison_order {
        order.extend(names.iter().filter_map(|n| object.properties.get_index_of(n)));
    }
    let mut rest = (0..object.properties.len())
        .filter(|i| !order.contains(i))
        .collect::<Vec<_>>();
    rest.sort_by_key(|&i| object.properties.get_index(i).map(|(_, p)| priority(p)).unwrap_or(u8::MAX));
    order.extend(rest);
    order
}

pub(crate) fn object_maker(object: Arc<ObjectType>, comparison_order: Option<Vec<String>>, tag: Type) -> Maker {
    let props = object
        .properties
        .iter()
        .map(|(name, p)| CompiledProp {
            name: name.clone(),
            network_name: p.network_name.clone(),
            required: p.required,
            maker: from_reflection(&p.value),
        })
        .collect::<Vec<_>>();
    let order = validation_order(&object, comparison_order.as_deref());
    let additional = match &object.additional_properties {
        AdditionalProperties::Any => Additional::Any,
        AdditionalProperties::Deny => Additional::Deny,
        AdditionalProperties::Schema(t) => Additional::Schema(from_reflection(t)),
    };

    Maker::new(move |value, options| {
        let Value::Object(input) = value else {
            return Make::fail(ValidationError::new(format!("expected object, got {}", value.kind_name())));
        };
        if let Some(key) = input.keys().find(|k| MAGIC_FIELDS.contains(&k.as_str())) {
            return Make::fail(ValidationError::new("forbidden field name").at(key.as_str()));
        }

        // Input already produced by this type uses internal names. Tags from
        // other types (an earlier allOf component) do not count.
        let from_network = options.convert_from_network && !input.tags().contains(&tag);

        let mut produced: Vec<Option<Value>> = vec![None; props.len()];
        let mut consumed: HashSet<&str> = HashSet::with_capacity(props.len());
        for &idx in &order {
            let prop = &props[idx];
            let key = match (&prop.network_name, from_network) {
                (Some(wire), true) => wire.as_str(),
                _ => prop.name.as_str(),
            };
            consumed.insert(key);
            match input.get(key) {
                None | Some(Value::Undefined) => {
                    if prop.required {
                        return Make::fail(ValidationError::new("missing required property").at(prop.name.as_str()));
                    }
                }
                Some(v) => match prop.maker.make(v, options) {
                    Make::Success(out) => produced[idx] = Some(out),
                    Make::Error(errors) => return Make::Error(errors).prepend_path(&prop.name),
                },
            }
        }

        let mut fields = IndexMap::with_capacity(input.len());
        for (prop, out) in props.iter().zip(produced) {
            if let Some(out) = out {
                fields.insert(prop.name.clone(), out);
            }
        }

        for (key, v) in input.iter() {
            if consumed.contains(key.as_str()) || object.properties.contains_key(key) || v.is_undefined() {
                continue;
            }
            match &additional {
                Additional::Any => {
                    fields.insert(key.clone(), v.clone());
                }
                Additional::Deny => {
                    if options.unknown_field == UnknownField::Drop {
                        continue;
                    }
                    return Make::fail(ValidationError::new("unexpected property").at(key.as_str()));
                }
                Additional::Schema(maker) => match maker.make(v, options) {
                    Make::Success(out) => {
                        fields.insert(key.clone(), out);
                    }
                    Make::Error(errors) => return Make::Error(errors).prepend_path(key),
                },
            }
        }

        let mut tags = input.tags().clone();
        tags.insert(tag.clone());
        Make::success(Value::Object(Object::with_tags(fields, tags)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MakeOptions;
    use crate::ty::StringType;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn strict_a() -> Maker {
        let mut props = IndexMap::new();
        props.insert("a".to_string(), PropType::required(Type::number()));
        make_object(props, AdditionalProperties::Deny, None, None)
    }

    #[test]
    fn unexpected_property_fails_at_its_path() {
        let res = strict_a().call(&v(json!({"a": 1, "missing": "x"})));
        let errors = res.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, vec!["missing".to_string()]);
        assert_eq!(errors[0].message(), "unexpected property");
    }

    #[test]
    fn undefined_extra_keys_are_dropped() {
        let mut input = Object::new();
        input.insert("a", Value::from(1));
        input.insert("missing", Value::Undefined);
        let out = strict_a().call(&Value::Object(input)).into_result().unwrap();
        assert_eq!(out.as_object().unwrap().len(), 1);
        assert!(out.get("missing").is_none());
    }

    #[test]
    fn unknown_fields_can_be_dropped() {
        let opts = MakeOptions { unknown_field: UnknownField::Drop, ..MakeOptions::default() };
        let out = strict_a().make(&v(json!({"a": 1, "b": 2})), &opts).into_result().unwrap();
        assert_eq!(out.to_json(), json!({"a": 1}));
    }

    #[test]
    fn magic_fields_are_always_rejected() {
        let open = from_reflection(&Type::object(ObjectType::new()));
        let res = open.call(&v(json!({"__proto__": {}})));
        assert_eq!(res.errors()[0].message(), "forbidden field name");
        assert!(open.call(&v(json!({"constructor": 1}))).is_error());
    }

    #[test]
    fn first_failing_property_stops_validation() {
        let ty = Type::object(
            ObjectType::new()
                .required("b", Type::string())
                .required("a", Type::string()),
        );
        let res = from_reflection(&ty).call(&v(json!({"a": 1, "b": 2})));
        assert_eq!(res.errors().len(), 1);
        assert_eq!(res.errors()[0].path, vec!["b".to_string()]);
    }

    #[test]
    fn enum_properties_are_checked_before_nested_ones() {
        let ty = Type::object(
            ObjectType::new()
                .required("payload", Type::object(ObjectType::new().required("x", Type::string())))
                .required("name", Type::string())
                .required("kind", Type::string_enum(["event"])),
        );
        let res = from_reflection(&ty).call(&v(json!({"payload": {}, "name": 1, "kind": "other"})));
        assert_eq!(res.errors()[0].path, vec!["kind".to_string()]);
    }

    #[test]
    fn pattern_properties_precede_plain_scalars() {
        let object = ObjectType::new()
            .required("plain", Type::string())
            .required("id", Type::string_with(StringType::new().pattern("^id-").unwrap()));
        assert_eq!(validation_order(&object, None), vec![1, 0]);
        assert_eq!(validation_order(&object, Some(&["plain".to_string()])), vec![0, 1]);
    }

    #[test]
    fn missing_required_and_optional_properties() {
        let ty = Type::object(
            ObjectType::new()
                .required("id", Type::string())
                .optional("note", Type::string()),
        );
        let m = from_reflection(&ty);
        assert_eq!(m.call(&v(json!({}))).errors()[0].message(), "missing required property");
        let out = m.call(&v(json!({"id": "x"}))).into_result().unwrap();
        assert_eq!(out.to_json(), json!({"id": "x"}));
    }

    #[test]
    fn additional_property_schema_validates_extras() {
        let ty = Type::object(ObjectType::new().additional(AdditionalProperties::Schema(Type::integer())));
        let m = from_reflection(&ty);
        assert!(m.call(&v(json!({"x": 1, "y": 2}))).is_success());
        let res = m.call(&v(json!({"x": 1, "y": "two"})));
        assert_eq!(res.errors()[0].path, vec!["y".to_string()]);
    }

    #[test]
    fn network_names_are_read_once() {
        let ty = Type::object(
            ObjectType::new()
                .property("someProperty", PropType::required(Type::string()).network_name("some_property"))
                .deny_unknown(),
        );
        let m = from_reflection(&ty);
        let opts = MakeOptions::from_network();

        let out = m.make(&v(json!({"some_property": "x"})), &opts).into_result().unwrap();
        assert_eq!(out.to_json(), json!({"someProperty": "x"}));

        let again = m.make(&out, &opts).into_result().unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn every_intersection_component_reads_its_own_wire_names() {
        let wire = |name: &str, network: &str| {
            Type::object(ObjectType::new().property(name, PropType::required(Type::integer()).network_name(network)))
        };
        let m = from_reflection(&Type::intersection([wire("aProp", "a_prop"), wire("bProp", "b_prop")]));
        let opts = MakeOptions::from_network();

        let out = m.make(&v(json!({"a_prop": 1, "b_prop": 2})), &opts).into_result().unwrap();
        assert_eq!(out.to_json(), json!({"aProp": 1, "bProp": 2}));
        assert_eq!(crate::tags::get_type(&out).len(), 2);

        let again = m.make(&out, &opts).into_result().unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn output_is_tagged_and_keeps_input_tags() {
        let named = NamedType::with_definition("Thing", Type::object(ObjectType::new()));
        let props = IndexMap::new();
        let m = make_object(props, AdditionalProperties::Any, None, Some(&named));
        let out = m.call(&v(json!({"k": true}))).into_result().unwrap();
        assert_eq!(named.is_a(&out), Some(true));

        let other = from_reflection(&Type::object(ObjectType::new()));
        let twice = other.call(&out).into_result().unwrap();
        assert_eq!(named.is_a(&twice), Some(true));
        assert_eq!(crate::tags::get_type(&twice).len(), 2);
    }
}
