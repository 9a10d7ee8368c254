//! Structural comparison of applied and active documents.
//!
//! The engine fills in defaults and may render numbers differently, so the
//! check is one-sided: every value we sent must be present and equal in what
//! the engine reports. Extra fields on the engine side are ignored, and empty
//! values we sent may be dropped by the engine.

use serde_json::Value;

/// Maximum differences reported per comparison.
const MAX_DIFFERENCES: usize = 20;

/// JSON-pointer paths where `actual` does not contain `expected`.
pub fn differences(expected: &Value, actual: &Value) -> Vec<String> {
    let mut out = Vec::new();
    walk("", expected, actual, &mut out);
    out
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn walk(path: &str, expected: &Value, actual: &Value, out: &mut Vec<String>) {
    if out.len() >= MAX_DIFFERENCES {
        return;
    }
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_value) in exp {
                let child = format!("{}/{}", path, key.replace('~', "~0").replace('/', "~1"));
                match act.get(key) {
                    Some(act_value) => walk(&child, exp_value, act_value, out),
                    None if is_empty(exp_value) => {}
                    None => out.push(format!("{}: missing", child)),
                }
            }
        }
        (Value::Array(exp), Value::Array(act)) => {
            if exp.len() != act.len() {
                out.push(format!("{}: expected {} items, found {}", path, exp.len(), act.len()));
                return;
            }
            for (i, (e, a)) in exp.iter().zip(act).enumerate() {
                walk(&format!("{}/{}", path, i), e, a, out);
            }
        }
        (Value::Number(e), Value::Number(a)) if e.as_f64() == a.as_f64() => {}
        (e, a) if e == a => {}
        (e, Value::Null) if is_empty(e) => {}
        (e, a) => out.push(format!("{}: expected {}, found {}", path, e, a)),
    }
}
