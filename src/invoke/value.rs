//! Coercion of script results to native values.

use mlua::Value;

/// Integer reading of a script value.
///
/// Booleans read as `0`/`1`, floats only when they hold an exact integer,
/// strings when they parse as a number. Everything else reads as `0`.
#[must_use]
pub fn to_integer(value: &Value) -> i64 {
    match value {
        Value::Boolean(flag) => i64::from(*flag),
        Value::Integer(n) => *n,
        Value::Number(n) => float_to_integer(*n).unwrap_or(0),
        Value::String(text) => parse_integer(&text.to_string_lossy()).unwrap_or(0),
        _ => 0,
    }
}

/// Script truthiness: only `nil` and `false` are false.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Boolean(false))
}

/// Integer value of a float, if it is exactly representable.
#[must_use]
pub fn float_to_integer(n: f64) -> Option<i64> {
    // 2^63 as f64; i64::MAX itself is not representable
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if n.fract() == 0.0 && (-LIMIT..LIMIT).contains(&n) {
        Some(n as i64)
    } else {
        None
    }
}

/// Parse a numeric string the way scripts convert them.
#[must_use]
pub fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let n = u64::from_str_radix(hex, 16).ok()? as i64;
        return Some(if negative { n.wrapping_neg() } else { n });
    }
    text.parse::<f64>().ok().and_then(float_to_integer)
}
