//! Field validation after a successful scalar bind.
//!
//! The binder hands the bound value to the process-wide validator whenever
//! the field's annotation carries the validator's directive (by default
//! `expr:"…"`). The shipped validator evaluates the expression with
//! [`evalexpr`], with `$` standing for the bound value:
//! `expr:"$ > 0 && $ < 10"`.

use std::fmt;

use crate::error::ConfError;
use crate::registry;
use crate::tag::tag_lookup;

/// A scalar produced by the binder, as seen by the validator.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::Uint(v) => write!(f, "{v}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::Str(v) => write!(f, "{v}"),
        }
    }
}

/// The pluggable validation hook. `name()` is the annotation directive the
/// validator consumes; `field` receives that directive's value and the bound
/// scalar.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;
    fn field(&self, tag: &str, value: &ScalarValue) -> Result<(), ConfError>;
}

/// Run the registered validator against a freshly bound scalar, if the
/// field annotation asks for it.
pub(crate) fn run(annotation: &str, value: &ScalarValue) -> Result<(), ConfError> {
    if annotation.is_empty() {
        return Ok(());
    }
    let validator = registry::validator();
    let Some(tag) = tag_lookup(annotation, validator.name()) else {
        return Ok(());
    };
    if tag.is_empty() {
        return Ok(());
    }
    validator.field(tag, value)
}

/// Default validator: evaluates the directive as a boolean expression, with
/// `$` bound to the value.
pub struct ExprValidator;

impl Validator for ExprValidator {
    fn name(&self) -> &str {
        "expr"
    }

    fn field(&self, tag: &str, value: &ScalarValue) -> Result<(), ConfError> {
        use evalexpr::{ContextWithMutableVariables, HashMapContext, Value};

        // evalexpr identifiers cannot contain '$'; rewrite it to a variable
        let expr = tag.replace('$', "value");
        let bound = match value {
            ScalarValue::Int(v) => Value::Int(*v),
            ScalarValue::Uint(v) => Value::Int(*v as i64),
            ScalarValue::Float(v) => Value::Float(*v),
            ScalarValue::Bool(v) => Value::Boolean(*v),
            ScalarValue::Str(v) => Value::String(v.clone()),
        };
        let mut ctx = HashMapContext::new();
        ctx.set_value("value".to_string(), bound)
            .map_err(|e| ConfError::EvalError {
                tag: tag.to_string(),
                reason: e.to_string(),
            })?;
        match evalexpr::eval_with_context(&expr, &ctx) {
            Ok(Value::Boolean(true)) => Ok(()),
            Ok(Value::Boolean(false)) => Err(ConfError::ValidateFailed {
                tag: tag.to_string(),
                value: value.to_string(),
            }),
            Ok(_) => Err(ConfError::EvalNotBool {
                tag: tag.to_string(),
            }),
            Err(e) => Err(ConfError::EvalError {
                tag: tag.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_passes() {
        let v = ExprValidator;
        v.field("$>0&&$<10", &ScalarValue::Int(1)).unwrap();
    }

    #[test]
    fn out_of_range_fails() {
        let v = ExprValidator;
        let err = v.field("$>0&&$<10", &ScalarValue::Int(11)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validate failed on \"$>0&&$<10\" for value 11"
        );
    }

    #[test]
    fn string_compare() {
        let v = ExprValidator;
        v.field("len($) == 3", &ScalarValue::Str("abc".into()))
            .unwrap();
    }

    #[test]
    fn non_bool_result_fails() {
        let v = ExprValidator;
        let err = v
            .field("len($)", &ScalarValue::Str("abc".into()))
            .unwrap_err();
        assert_eq!(err.to_string(), "eval \"len($)\" doesn't return bool value");
    }

    #[test]
    fn eval_error_reported() {
        let v = ExprValidator;
        let err = v.field("$ >", &ScalarValue::Int(1)).unwrap_err();
        assert!(err.to_string().starts_with("eval \"$ >\" returns error, "));
    }

    #[test]
    fn float_and_bool_values() {
        let v = ExprValidator;
        v.field("$ >= 0.5", &ScalarValue::Float(0.75)).unwrap();
        v.field("$ == true", &ScalarValue::Bool(true)).unwrap();
    }

    #[test]
    fn run_skips_without_directive() {
        run("", &ScalarValue::Int(1)).unwrap();
        run("value:\"${n}\"", &ScalarValue::Int(1)).unwrap();
    }

    #[test]
    fn run_applies_directive() {
        let err = run("value:\"${n}\" expr:\"$>0\"", &ScalarValue::Int(-1)).unwrap_err();
        assert!(err.to_string().contains("validate failed"));
    }
}
