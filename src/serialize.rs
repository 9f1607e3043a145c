//! Back to the wire format.

use serde_json::{Map, Value as JsonValue};

use crate::ty::Type;
use crate::value::{Object, Value};

/// Converts a validated value to plain JSON, renaming properties to their
/// wire names.
///
/// Renaming is driven by the object's type tags, so only values produced by a
/// maker are renamed. An untagged object keeps its own keys but is still
/// descended into, so tagged values placed inside it by hand come out with
/// their wire names.
pub fn serialize(value: &Value) -> JsonValue {
    match value {
        Value::Array(a) => JsonValue::Array(a.iter().map(serialize).collect()),
        Value::Object(o) if !o.tags().is_empty() => serialize_object(o),
        Value::Object(o) => {
            let map = o
                .iter()
                .filter(|(_, v)| !v.is_undefined())
                .map(|(k, v)| (k.clone(), serialize(v)))
                .collect::<Map<_, _>>();
            JsonValue::Object(map)
        }
        other => other.to_json(),
    }
}

fn serialize_object(o: &Object) -> JsonValue {
    let schemas = o.tags().iter().filter_map(Type::as_object).collect::<Vec<_>>();
    let mut map = Map::with_capacity(o.len());
    for (key, v) in o.iter() {
        if v.is_undefined() {
            continue;
        }
        let wire = schemas
            .iter()
            .find_map(|s| s.properties.get(key))
            .and_then(|p| p.network_name.clone())
            .unwrap_or_else(|| key.clone());
        map.insert(wire, serialize(v));
    }
    JsonValue::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make::from_reflection;
    use crate::options::MakeOptions;
    use crate::ty::{NamedType, ObjectType, PropType};
    use serde_json::json;

    fn inner() -> NamedType {
        NamedType::with_definition(
            "Inner",
            Type::object(
                ObjectType::new().property("innerValue", PropType::required(Type::integer()).network_name("inner_value")),
            ),
        )
    }

    #[test]
    fn renames_nested_properties() {
        let inner = inner();
        let outer = Type::object(
            ObjectType::new()
                .property("someProperty", PropType::required(Type::string()).network_name("some_property"))
                .property("items", PropType::required(Type::array(Type::named(&inner))).network_name("the_items")),
        );
        let wire = json!({"some_property": "x", "the_items": [{"inner_value": 1}, {"inner_value": 2}]});
        let made = from_reflection(&outer)
            .make(&Value::from(wire.clone()), &MakeOptions::from_network())
            .into_result()
            .unwrap();
        assert_eq!(made.get("someProperty"), Some(&Value::from("x")));
        assert_eq!(serialize(&made), wire);
    }

    #[test]
    fn untagged_values_pass_through() {
        let v = Value::from(json!({"some_property": [1, {"a": null}]}));
        assert_eq!(serialize(&v), json!({"some_property": [1, {"a": null}]}));
    }

    #[test]
    fn tagged_values_inside_untagged_wrappers_are_renamed() {
        let inner = inner();
        let made = inner.maker().call(&Value::from(json!({"innerValue": 3}))).into_result().unwrap();
        let mut envelope = Object::new();
        envelope.insert("someProperty", made);
        assert_eq!(serialize(&Value::Object(envelope)), json!({"someProperty": {"inner_value": 3}}));
    }

    #[test]
    fn undefined_fields_are_omitted() {
        let mut o = Object::new();
        o.insert("kept", Value::from(true));
        o.insert("gone", Value::Undefined);
        assert_eq!(serialize(&Value::Object(o)), json!({"kept": true}));
    }
}
