use serde_json::json;
use tyval::{
    discriminate_union, from_reflection, serialize, AdditionalProperties, MakeOptions, NamedType, ObjectType,
    PropType, Type, Value,
};

fn v(json: serde_json::Value) -> Value {
    Value::from(json)
}

fn account() -> NamedType {
    let address = NamedType::with_definition(
        "Address",
        Type::object(
            ObjectType::new()
                .property("streetName", PropType::required(Type::string()).network_name("street_name"))
                .optional("zip", Type::string())
                .deny_unknown(),
        ),
    );
    NamedType::with_definition(
        "Account",
        Type::object(
            ObjectType::new()
                .required("id", Type::integer())
                .property("displayName", PropType::required(Type::string()).network_name("display_name"))
                .optional("addresses", Type::array(Type::named(&address)))
                .optional("status", Type::string_enum(["active", "closed"]))
                .deny_unknown(),
        ),
    )
}

#[test]
fn revalidation_is_idempotent() {
    let account = account();
    let maker = account.maker();
    let lenient = MakeOptions { parse_numeric_strings: true, ..MakeOptions::from_network() };

    let input = v(json!({
        "id": "7",
        "display_name": "Ada",
        "addresses": [{"street_name": "Main"}],
        "status": "active"
    }));
    let first = maker.make(&input, &lenient).into_result().unwrap();
    let second = maker.make(&first, &lenient).into_result().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.get("id"), Some(&v(json!(7))));
    assert_eq!(account.is_a(&second), Some(true));
}

#[test]
fn strict_objects_reject_extras_and_drop_undefined() {
    let ty = Type::object(ObjectType::new().required("a", Type::number()).deny_unknown());
    let maker = from_reflection(&ty);

    let res = maker.call(&v(json!({"a": 1, "missing": "x"})));
    let errors = res.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path_string(), "missing");
    assert_eq!(errors[0].to_string(), "missing: unexpected property");

    let mut input = tyval::Object::new();
    input.insert("a", Value::from(1));
    input.insert("missing", Value::Undefined);
    let out = maker.call(&Value::Object(input)).into_result().unwrap();
    assert_eq!(out.to_json(), json!({"a": 1}));
}

#[test]
fn unions_match_at_most_one_option() {
    let open = |key: &str| Type::object(ObjectType::new().required(key, Type::string()));
    let union = from_reflection(&Type::union([open("a"), open("b")]));

    assert!(union.call(&v(json!({"a": "x"}))).is_success());
    let both = union.call(&v(json!({"a": "x", "b": "y"})));
    assert_eq!(both.errors()[0].message(), "multiple options match (options 1, 2)");

    let none = union.call(&v(json!({"c": 1})));
    let rendered = none.errors()[0].to_string();
    assert!(rendered.starts_with("no option of oneOf matched"));
    assert!(rendered.contains("- option 1: a: missing required property"));
    assert!(rendered.contains("- option 2: b: missing required property"));
}

#[test]
fn discriminator_prefers_the_informative_key() {
    let variant = |tag: &str| {
        Type::object(
            ObjectType::new()
                .required("tag", Type::string_enum([tag]))
                .required("unionTag", Type::string_enum(["b"]))
                .optional("payload", Type::Unknown),
        )
    };
    let variants = [variant("a"), variant("b")];
    let diff = discriminate_union(&variants).unwrap();
    assert_eq!(diff.key, "tag");

    let out = from_reflection(&Type::union(variants.clone()))
        .call(&v(json!({"tag": "a", "unionTag": "b"})))
        .into_result()
        .unwrap();
    let tags = tyval::get_type(&out);
    assert_eq!(tags.len(), 1);
    assert!(tags[0].same(&variants[0]));
}

#[test]
fn network_names_round_trip() {
    let ty = Type::object(
        ObjectType::new()
            .property("someProperty", PropType::required(Type::string()).network_name("some_property"))
            .additional(AdditionalProperties::Deny),
    );
    let wire = json!({"some_property": "value"});
    let made = from_reflection(&ty)
        .make(&v(wire.clone()), &MakeOptions::from_network())
        .into_result()
        .unwrap();
    assert_eq!(made.to_json(), json!({"someProperty": "value"}));
    assert_eq!(serialize(&made), wire);
}

#[test]
fn nested_errors_carry_full_paths() {
    let account = account();
    let res = account.maker().make(
        &v(json!({"id": 1, "display_name": "Ada", "addresses": [{"street_name": "Main"}, {"street_name": 4}]})),
        &MakeOptions::from_network(),
    );
    let errors = res.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "addresses[1].streetName: expected string, got number");
}

#[test]
fn network_names_round_trip_through_intersections() {
    let wired = |name: &str, prop: &str, wire: &str| {
        NamedType::with_definition(
            name,
            Type::object(ObjectType::new().property(prop, PropType::required(Type::string()).network_name(wire))),
        )
    };
    let meta = wired("Meta", "createdAt", "created_at");
    let body = wired("Body", "kindName", "kind_name");
    let ty = Type::array(Type::intersection([Type::named(&meta), Type::named(&body)]));

    let wire = json!([{"created_at": "today", "kind_name": "note"}]);
    let made = from_reflection(&ty)
        .make(&v(wire.clone()), &MakeOptions::from_network())
        .into_result()
        .unwrap();
    let first = &made.as_array().unwrap().items()[0];
    assert_eq!(first.to_json(), json!({"createdAt": "today", "kindName": "note"}));
    assert_eq!(meta.is_a(first), Some(true));
    assert_eq!(body.is_a(first), Some(true));
    assert_eq!(serialize(&made), wire);
}
