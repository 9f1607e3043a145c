use std::sync::Arc;

use serde_json::Number;

use crate::error::ValidationError;
use crate::make::{check_enum, Make, Maker};
use crate::options::MakeOptions;
use crate::ty::NumberType;
use crate::value::Value;

pub fn make_number(ty: NumberType) -> Maker {
    number_maker(Arc::new(ty), false)
}

pub fn make_integer(ty: NumberType) -> Maker {
    number_maker(Arc::new(ty), true)
}

pub(crate) fn number_maker(ty: Arc<NumberType>, integer: bool) -> Maker {
    let expected = if integer { "integer" } else { "number" };
    Maker::new(move |value, options| {
        let Some((n, f)) = coerce(value, options) else {
            return Make::fail(ValidationError::new(format!("expected {expected}, got {}", value.kind_name())));
        };
        if integer && f.fract() != 0.0 {
            return Make::fail(ValidationError::new(format!("expected integer, got {f}")));
        }
        if let Some(err) = check_bounds(&ty, f) {
            return Make::fail(err);
        }
        // string input is re-encoded; integers as integers
        let out = match n {
            Some(n) => Value::Number(n),
            None if integer && f.abs() < i64::MAX as f64 => Value::Number(Number::from(f as i64)),
            None => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        };
        match check_enum(&ty.enum_, &out) {
            None => Make::success(out),
            Some(err) => Make::fail(err),
        }
    })
}

/// The original `Number` when the input already was one, plus its `f64`.
fn coerce(value: &Value, options: &MakeOptions) -> Option<(Option<Number>, f64)> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| (Some(n.clone()), f)),
        Value::String(s) if options.parse_numeric_strings => {
            let f = s.trim().parse::<f64>().ok()?;
            f.is_finite().then_some((None, f))
        }
        _ => None,
    }
}

fn check_bounds(ty: &NumberType, f: f64) -> Option<ValidationError> {
    if let Some(min) = ty.minimum {
        if f < min {
            return Some(ValidationError::new(format!("must be >= {min}")));
        }
    }
    if let Some(max) = ty.maximum {
        if f > max {
            return Some(ValidationError::new(format!("must be <= {max}")));
        }
    }
    if let Some(min) = ty.exclusive_minimum {
        if f <= min {
            return Some(ValidationError::new(format!("must be > {min}")));
        }
    }
    if let Some(max) = ty.exclusive_maximum {
        if f >= max {
            return Some(ValidationError::new(format!("must be < {max}")));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lenient() -> MakeOptions {
        MakeOptions { parse_numeric_strings: true, ..MakeOptions::default() }
    }

    #[test]
    fn numeric_strings_need_the_option() {
        let m = make_number(NumberType::new());
        assert!(m.call(&Value::from("1.5")).is_error());
        assert_eq!(m.make(&Value::from(" 1.5 "), &lenient()).success_value(), Some(&Value::from(1.5)));
        assert!(m.make(&Value::from("abc"), &lenient()).is_error());
        assert!(m.make(&Value::from("NaN"), &lenient()).is_error());
    }

    #[test]
    fn integers_reject_fractions() {
        let m = make_integer(NumberType::new());
        assert!(m.call(&Value::from(3)).is_success());
        assert_eq!(m.call(&Value::from(3.5)).errors()[0].message(), "expected integer, got 3.5");
        let out = m.make(&Value::from("42"), &lenient()).into_result().unwrap();
        assert_eq!(out.to_json(), json!(42));
    }

    #[test]
    fn bounds_are_enforced() {
        let m = make_number(NumberType::new().minimum(0.0).exclusive_maximum(10.0));
        assert!(m.call(&Value::from(0)).is_success());
        assert_eq!(m.call(&Value::from(-1)).errors()[0].message(), "must be >= 0");
        assert_eq!(m.call(&Value::from(10)).errors()[0].message(), "must be < 10");
    }

    #[test]
    fn number_enum() {
        let m = make_number(NumberType::new().enum_of([1.0, 2.0]));
        assert!(m.call(&Value::from(2)).is_success());
        assert!(m.call(&Value::from(3)).is_error());
    }
}
