//! Tree-walking evaluator over [`SafeExpr`].
//!
//! Values follow ECMAScript semantics closely enough that templates written for
//! a JavaScript engine render the same text. `+` concatenates when either side
//! is a string and `&&`/`||`/`??` return one of their operands.
//! The only namespace is the [`Context`]; there is nothing callable.

use std::cmp::Ordering;
use thiserror::Error;
use crate::ast::{BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use crate::context::Context;
use crate::json::JsonValue;
use crate::sandbox::{is_denied, SafeExpr};


#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Insertion-ordered; keys are unique.
    Object(Vec<(String, Value)>),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cannot read property `{property}` of {base}")]
    PropertyOfNothing {
        property: String,
        base: &'static str,
    },
    #[error("cannot use `in` to search for `{key}` in {found}")]
    InOperand {
        key: String,
        found: &'static str,
    },
}

impl Value {
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
        }
    }

    /// `String(value)` for plain data.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_owned(),
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|it| if it.is_nullish() { String::new() } else { it.to_js_string() })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_owned(),
        }
    }

    /// The text a template shows for this value, `None` for undefined and null.
    pub fn render(&self) -> Option<String> {
        if self.is_nullish() {
            None
        } else {
            Some(self.to_js_string())
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => if *b { 1.0 } else { 0.0 },
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_js_string()),
            Value::Object(_) => f64::NAN,
        }
    }

    fn to_primitive(self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) => Value::String(self.to_js_string()),
            other => other
        }
    }

    /// Own-property read. Denied names always read as undefined.
    pub fn member(self, property: &str) -> Result<Value, EvalError> {
        if is_denied(property) {
            return Ok(Value::Undefined);
        }
        Ok(match self {
            Value::Undefined => return Err(EvalError::PropertyOfNothing {
                property: property.to_owned(),
                base: "undefined"
            }),
            Value::Null => return Err(EvalError::PropertyOfNothing {
                property: property.to_owned(),
                base: "null"
            }),
            Value::Object(entries) => entries
                .into_iter()
                .find(|(key, _)| key == property)
                .map_or(Value::Undefined, |(_, value)| value),
            Value::Array(mut items) => {
                if property == "length" {
                    Value::Number(items.len() as f64)
                } else {
                    match array_index(property) {
                        Some(i) if i < items.len() => items.swap_remove(i),
                        _ => Value::Undefined
                    }
                }
            },
            Value::String(s) => {
                let units = s.encode_utf16().collect::<Vec<_>>();
                if property == "length" {
                    Value::Number(units.len() as f64)
                } else {
                    match array_index(property).and_then(|i| units.get(i)) {
                        Some(unit) => Value::String(String::from_utf16_lossy(&[*unit])),
                        None => Value::Undefined
                    }
                }
            },
            Value::Bool(_) | Value::Number(_) => Value::Undefined,
        })
    }

    fn has_own(&self, key: &str) -> Option<bool> {
        match self {
            Value::Object(entries) => Some(!is_denied(key) && entries.iter().any(|(k, _)| k == key)),
            Value::Array(items) => Some(
                key == "length" || array_index(key).is_some_and(|i| i < items.len())
            ),
            _ => None
        }
    }
}

/// Evaluates a checked expression against the own keys of `context`.
pub fn evaluate(expr: &SafeExpr, context: &Context) -> Result<Value, EvalError> {
    Evaluator { context }.eval(expr.expr())
}

struct Evaluator<'a> {
    context: &'a Context,
}

impl<'a> Evaluator<'a> {
    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),
            Expr::Identifier(_) | Expr::Member(..) => self.resolve(expr).map(Resolved::into_value),
            Expr::Unary(op, operand) => self.unary(*op, operand),
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            },
            Expr::Logical(op, left, right) => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Coalesce => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            },
            Expr::Conditional(test, consequent, alternate) => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            },
            Expr::Array(elements) => elements
                .iter()
                .map(|element| match element {
                    Some(element) => self.eval(element),
                    None => Ok(Value::Undefined)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(entries) => {
                let mut object: Vec<(String, Value)> = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    match object.iter_mut().find(|(k, _)| k == key) {
                        Some(slot) => slot.1 = value,
                        None => object.push((key.clone(), value))
                    }
                }
                Ok(Value::Object(object))
            },
        }
    }

    // Member chains stay on the borrowed data until the last step.
    fn resolve(&self, expr: &Expr) -> Result<Resolved<'a>, EvalError> {
        match expr {
            Expr::Identifier(name) => Ok(match self.context.get(name) {
                Some(json) if !is_denied(name) => Resolved::Borrowed(json),
                _ => Resolved::Owned(Value::Undefined)
            }),
            Expr::Member(object, property) => match self.resolve(object)? {
                Resolved::Borrowed(json) => json_member(json, property),
                Resolved::Owned(value) => value.member(property).map(Resolved::Owned),
            },
            other => self.eval(other).map(Resolved::Owned),
        }
    }

    fn unary(&self, op: UnaryOp, operand: &Expr) -> Result<Value, EvalError> {
        let value = self.eval(operand)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.is_truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::BitNot => Value::Number(!to_int32(value.to_number()) as f64),
            UnaryOp::TypeOf => Value::String(value.type_of().to_owned()),
            UnaryOp::Void => Value::Undefined,
        })
    }
}

enum Resolved<'a> {
    Borrowed(&'a JsonValue),
    Owned(Value),
}

impl Resolved<'_> {
    fn into_value(self) -> Value {
        match self {
            Resolved::Borrowed(json) => Value::from(json),
            Resolved::Owned(value) => value,
        }
    }
}

fn json_member<'a>(json: &'a JsonValue, property: &str) -> Result<Resolved<'a>, EvalError> {
    if is_denied(property) {
        return Ok(Resolved::Owned(Value::Undefined));
    }
    let found = match json {
        JsonValue::Object(map) => map.get(property),
        JsonValue::Array(items) if property == "length" => {
            return Ok(Resolved::Owned(Value::Number(items.len() as f64)));
        },
        JsonValue::Array(items) => array_index(property).and_then(|i| items.get(i)),
        scalar => return Value::from(scalar).member(property).map(Resolved::Owned),
    };
    Ok(found.map_or(Resolved::Owned(Value::Undefined), Resolved::Borrowed))
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    Ok(match op {
        BinaryOp::Add => match (left.to_primitive(), right.to_primitive()) {
            (l @ Value::String(_), r) | (l, r @ Value::String(_)) => {
                Value::String(l.to_js_string() + &r.to_js_string())
            },
            (l, r) => Value::Number(l.to_number() + r.to_number())
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => Value::Number(pow(left.to_number(), right.to_number())),
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr
        | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            Value::Number(bitwise(op, to_int32(left.to_number()), to_uint32(right.to_number())))
        },
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(left, right), Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(left, right), Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_equals(&left, &right)),
        BinaryOp::StrictNe => Value::Bool(!strict_equals(&left, &right)),
        BinaryOp::In => {
            let key = left.to_js_string();
            match right.has_own(&key) {
                Some(found) => Value::Bool(found),
                None => return Err(EvalError::InOperand { key, found: right.type_of() })
            }
        },
    })
}

fn bitwise(op: BinaryOp, a: i32, b: u32) -> f64 {
    let shift = b & 31;
    match op {
        BinaryOp::Shl => a.wrapping_shl(shift) as f64,
        BinaryOp::Shr => (a >> shift) as f64,
        BinaryOp::UShr => ((a as u32) >> shift) as f64,
        BinaryOp::BitAnd => (a & b as i32) as f64,
        BinaryOp::BitOr => (a | b as i32) as f64,
        _ => (a ^ b as i32) as f64,
    }
}

fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}

fn compare(left: Value, right: Value) -> Option<Ordering> {
    match (left.to_primitive(), right.to_primitive()) {
        (Value::String(a), Value::String(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
        (a, b) => a.to_number().partial_cmp(&b.to_number())
    }
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_equals(x, y))
        },
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len() && a.iter().all(|(key, x)| {
                b.iter().any(|(k, y)| k == key && strict_equals(x, y))
            })
        },
        (a, b) => a == b
    }
}

fn loose_equals(left: Value, right: Value) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (a @ Value::Bool(_), b) | (b, a @ Value::Bool(_)) => {
            loose_equals(Value::Number(a.to_number()), b)
        },
        (Value::Number(a), b @ Value::String(_)) | (b @ Value::String(_), Value::Number(a)) => {
            a == b.to_number()
        },
        (a @ (Value::Array(_) | Value::Object(_)), b @ (Value::Number(_) | Value::String(_)))
        | (b @ (Value::Number(_) | Value::String(_)), a @ (Value::Array(_) | Value::Object(_))) => {
            loose_equals(a.to_primitive(), b)
        },
        (a, b) => strict_equals(&a, &b)
    }
}

fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let n = n.trunc() % 4_294_967_296.0;
    let n = if n < 0.0 { n + 4_294_967_296.0 } else { n };
    n as u32
}

fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

pub(crate) fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None
    };
    if let Some(radix) = radix {
        let digits = &s[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return f64::NAN;
        }
        return digits.chars().fold(0.0, |acc, d| {
            acc * radix as f64 + d.to_digit(radix).unwrap_or(0) as f64
        });
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if !s.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')) {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

/// `Number.prototype.toString()` for finite and non-finite numbers.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return n.to_string();
    }
    let formatted = format!("{:e}", n);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        },
        _ => formatted
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::parser::parse_expression;

    fn eval_with(source: &str, data: serde_json::Value) -> Result<Value, EvalError> {
        let expr = SafeExpr::new(parse_expression(source).unwrap()).unwrap();
        evaluate(&expr, &Context::from(data))
    }

    fn eval(source: &str) -> Value {
        eval_with(source, json!({})).unwrap()
    }

    fn text(source: &str) -> String {
        eval(source).to_js_string()
    }

    #[test]
    fn member_chains_read_the_data_in_place() {
        let data = json!({
            "user": { "name": "Ann", "roles": ["admin", "dev"] },
            "items": [1, 2, 3],
            "nothing": null,
            "s": "ab"
        });
        assert_eq!(eval_with("user.name", data.clone()), Ok(Value::String("Ann".to_owned())));
        assert_eq!(eval_with("user.roles.length", data.clone()), Ok(Value::Number(2.0)));
        assert_eq!(eval_with("items.length > 0", data.clone()), Ok(Value::Bool(true)));
        assert_eq!(eval_with("s.length", data.clone()), Ok(Value::Number(2.0)));
        assert_eq!(eval_with("user.age", data.clone()), Ok(Value::Undefined));
        assert_eq!(
            eval_with("items", data.clone()),
            Ok(Value::Array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]))
        );
        assert_eq!(
            eval_with("nothing.x", data.clone()),
            Err(EvalError::PropertyOfNothing { property: "x".to_owned(), base: "null" })
        );
        assert_eq!(
            eval_with("missing.x", data.clone()),
            Err(EvalError::PropertyOfNothing { property: "x".to_owned(), base: "undefined" })
        );
        assert_eq!(eval_with("({ a: user }).a.name", data), Ok(Value::String("Ann".to_owned())));
    }

    #[test]
    fn ternary_picks_branch() {
        let value = eval_with("a > 1 ? 'big' : 'small'", json!({ "a": 5 })).unwrap();
        assert_eq!(value, Value::String("big".to_owned()));
    }

    #[test]
    fn plus_concatenates_when_either_side_is_a_string() {
        assert_eq!(text("1 + 2"), "3");
        assert_eq!(text("'1' + 2"), "12");
        assert_eq!(text("1 + 2 + '3'"), "33");
        assert_eq!(text("[1, 2] + 1"), "1,21");
        assert_eq!(text("{} + 'x'"), "[object Object]x");
    }

    #[test]
    fn arithmetic_follows_number_semantics() {
        assert_eq!(text("7 / 2"), "3.5");
        assert_eq!(text("1 / 0"), "Infinity");
        assert_eq!(text("'a' * 2"), "NaN");
        assert_eq!(text("-7 % 3"), "-1");
        assert_eq!(text("2 ** 10"), "1024");
        assert_eq!(text("0.1 + 0.2"), "0.30000000000000004");
        assert_eq!(text("' 42 ' - 0"), "42");
        assert_eq!(text("null + 1"), "1");
    }

    #[test]
    fn bitwise_operators_use_int32() {
        assert_eq!(text("5 & 3"), "1");
        assert_eq!(text("1 << 31"), "-2147483648");
        assert_eq!(text("-1 >>> 28"), "15");
        assert_eq!(text("~5"), "-6");
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("'b' > 'a'"), Value::Bool(true));
        assert_eq!(eval("'10' < 9"), Value::Bool(false));
        assert_eq!(eval("1 == '1'"), Value::Bool(true));
        assert_eq!(eval("1 === '1'"), Value::Bool(false));
        assert_eq!(eval("null == undefined"), Value::Bool(true));
        assert_eq!(eval("null === undefined"), Value::Bool(false));
        assert_eq!(eval("true == 1"), Value::Bool(true));
        assert_eq!(eval("undefined < 1"), Value::Bool(false));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(text("'' || 'fallback'"), "fallback");
        assert_eq!(text("0 && missing.deep"), "0");
        assert_eq!(text("null ?? 'x'"), "x");
        assert_eq!(text("0 ?? 'x'"), "0");
    }

    #[test]
    fn missing_names_are_undefined() {
        assert_eq!(eval("nothing"), Value::Undefined);
        assert_eq!(eval("typeof nothing"), Value::String("undefined".to_owned()));
    }

    #[test]
    fn member_of_undefined_is_an_error() {
        assert!(eval_with("nothing.deep", json!({})).is_err());
        assert!(eval_with("'k' in 5", json!({})).is_err());
    }

    #[test]
    fn own_properties_only() {
        let data = json!({ "user": { "name": "Ann", "tags": ["a", "b"] } });
        assert_eq!(
            eval_with("user.name", data.clone()).unwrap(),
            Value::String("Ann".to_owned())
        );
        assert_eq!(eval_with("user.tags.length", data.clone()).unwrap(), Value::Number(2.0));
        assert_eq!(eval_with("user.name.length", data.clone()).unwrap(), Value::Number(3.0));
        assert_eq!(eval_with("user.toString", data.clone()).unwrap(), Value::Undefined);
        assert_eq!(eval_with("'name' in user", data).unwrap(), Value::Bool(true));
    }

    #[test]
    fn denied_names_read_as_undefined_at_runtime() {
        let value = Value::Object(vec![("constructor".to_owned(), Value::Number(1.0))]);
        assert_eq!(value.member("constructor").unwrap(), Value::Undefined);
    }

    #[test]
    fn literals_build_values() {
        assert_eq!(text("[1, null, , 'x']"), "1,,,x");
        assert_eq!(
            eval("{ a: 1, a: 2 }.a"),
            Value::Number(2.0)
        );
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(123456789012.0), "123456789012");
    }
}
