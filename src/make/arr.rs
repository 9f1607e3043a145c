use crate::error::ValidationError;
use crate::make::{Make, Maker};
use crate::tags::TypeSet;
use crate::ty::Type;
use crate::value::{Array, Value};

pub fn make_array(items: Maker) -> Maker {
    array_maker(items, None, None, None)
}

/// Elements are validated in order; the first failing element fails the array.
pub(crate) fn array_maker(items: Maker, min_items: Option<usize>, max_items: Option<usize>, tag: Option<Type>) -> Maker {
    Maker::new(move |value, options| {
        let wrapped;
        let input: &[Value] = match value {
            Value::Array(a) => a.items(),
            Value::Bool(_) | Value::Number(_) | Value::String(_) if options.allow_convert_for_array_type => {
                wrapped = [value.clone()];
                &wrapped
            }
            other => {
                return Make::fail(ValidationError::new(format!("expected array, got {}", other.kind_name())));
            }
        };

        if let Some(min) = min_items {
            if input.len() < min {
                return Make::fail(ValidationError::new(format!("must have at least {min} items")));
            }
        }
        if let Some(max) = max_items {
            if input.len() > max {
                return Make::fail(ValidationError::new(format!("must have at most {max} items")));
            }
        }

        let mut out = Vec::with_capacity(input.len());
        for (i, item) in input.iter().enumerate() {
            match items.make(item, options) {
                Make::Success(v) => out.push(v),
                Make::Error(errors) => return Make::Error(errors).prepend_path(&format!("[{i}]")),
            }
        }

        let mut tags = match value {
            Value::Array(a) => a.tags().clone(),
            _ => TypeSet::new(),
        };
        if let Some(tag) = &tag {
            tags.insert(tag.clone());
        }
        Make::success(Value::Array(Array::with_tags(out, tags)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make::from_reflection;
    use crate::options::MakeOptions;
    use crate::ty::ArrayType;
    use serde_json::json;

    #[test]
    fn element_errors_carry_their_index() {
        let m = make_array(from_reflection(&Type::integer()));
        let res = m.call(&Value::from(json!([1, 2, "x", "y"])));
        assert_eq!(res.errors().len(), 1);
        assert_eq!(res.errors()[0].path, vec!["[2]".to_string()]);
    }

    #[test]
    fn scalars_wrap_only_when_allowed() {
        let m = make_array(from_reflection(&Type::string()));
        assert!(m.call(&Value::from("a")).is_error());
        let opts = MakeOptions { allow_convert_for_array_type: true, ..MakeOptions::default() };
        let out = m.make(&Value::from("a"), &opts).into_result().unwrap();
        assert_eq!(out.to_json(), json!(["a"]));
    }

    #[test]
    fn item_counts_and_tagging() {
        let ty = Type::array_with(ArrayType::new(Type::number()).min_items(1).max_items(2));
        let m = from_reflection(&ty);
        assert!(m.call(&Value::from(json!([]))).errors()[0].message().contains("at least 1"));
        assert!(m.call(&Value::from(json!([1, 2, 3]))).errors()[0].message().contains("at most 2"));
        let out = m.call(&Value::from(json!([1]))).into_result().unwrap();
        assert!(crate::tags::get_type_set(&out).unwrap().contains(&ty));
    }
}
