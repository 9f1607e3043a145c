use std::sync::Arc;

use crate::error::ValidationError;
use crate::format::lookup_format;
use crate::make::{check_enum, Make, Maker};
use crate::ty::StringType;
use crate::value::Value;

pub fn make_string(ty: StringType) -> Maker {
    string_maker(Arc::new(ty))
}

/// Checks run cheapest first: kind, length, enum, format, pattern.
pub(crate) fn string_maker(ty: Arc<StringType>) -> Maker {
    Maker::new(move |value, options| {
        let Value::String(s) = value else {
            return Make::fail(ValidationError::new(format!("expected string, got {}", value.kind_name())));
        };
        let len = s.chars().count();
        if let Some(min) = ty.min_length {
            if len < min {
                return Make::fail(ValidationError::new(format!("must be at least {min} characters long")));
            }
        }
        if let Some(max) = ty.max_length {
            if len > max {
                return Make::fail(ValidationError::new(format!("must be at most {max} characters long")));
            }
        }
        if let Some(err) = check_enum(&ty.enum_, value) {
            return Make::fail(err);
        }

        let mut out = value.clone();
        if let Some(name) = &ty.format {
            let Some(format) = lookup_format(name) else {
                return Make::fail(ValidationError::new(format!("unknown format '{name}'")));
            };
            match format.make(value, options) {
                Make::Success(v) => out = v,
                Make::Error(errors) => {
                    return Make::fail(ValidationError::group(format!("not a valid {name}"), errors));
                }
            }
        }
        if let Some(rx) = &ty.pattern {
            let text = out.as_str().unwrap_or(s);
            if !rx.is_match(text) {
                return Make::fail(ValidationError::new(format!("does not match pattern /{}/", rx.as_str())));
            }
        }
        Make::success(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::register_format;
    use crate::options::MakeOptions;

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn min_length_counts_characters() {
        let m = make_string(StringType::new().min_length(3));
        let res = m.call(&s("a"));
        assert!(res.errors()[0].message().contains("at least 3"));
        assert!(m.call(&s("abc")).is_success());
        assert!(m.call(&s("äöü")).is_success());
    }

    #[test]
    fn max_length_and_kind() {
        let m = make_string(StringType::new().max_length(2));
        assert!(m.call(&s("abc")).errors()[0].message().contains("at most 2"));
        assert_eq!(m.call(&Value::from(1)).errors()[0].message(), "expected string, got number");
    }

    #[test]
    fn pattern_is_applied() {
        let m = make_string(StringType::new().pattern("^[a-z]+-[0-9]+$").unwrap());
        assert!(m.call(&s("abc-12")).is_success());
        let res = m.call(&s("ABC"));
        assert!(res.errors()[0].message().starts_with("does not match pattern"));
    }

    #[test]
    fn enum_restricts_values() {
        let m = make_string(StringType::new().enum_of(["on", "off"]));
        assert!(m.call(&s("on")).is_success());
        assert!(m.call(&s("dim")).is_error());
    }

    #[test]
    fn formats_resolve_at_validation_time() {
        let m = make_string(StringType::new().format("tyval-test-upper"));
        assert!(m.call(&s("ABC")).errors()[0].message().contains("unknown format"));

        register_format(
            "tyval-test-upper",
            Maker::new(|v, _| match v.as_str() {
                Some(t) if t.chars().all(|c| c.is_ascii_uppercase()) => Make::success(v.clone()),
                _ => Make::fail(ValidationError::new("expected upper case")),
            }),
        )
        .unwrap();

        assert!(m.make(&s("ABC"), &MakeOptions::default()).is_success());
        let res = m.call(&s("abc"));
        assert_eq!(res.errors()[0].message(), "not a valid tyval-test-upper");
    }

    #[test]
    fn builtin_date_time_format() {
        let m = make_string(StringType::new().format("date-time"));
        assert!(m.call(&s("2024-05-01T12:30:00Z")).is_success());
        assert!(m.call(&s("yesterday")).is_error());
    }
}
