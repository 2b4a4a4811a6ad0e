//! JSON interop and formatting for [`Value`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number};
use time::format_description::well_known::Rfc3339;

use super::{Composite, NodeId, Value};
use crate::error::ValueError;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Value {
    /// Convert to a `serde_json::Value`.
    ///
    /// `Undefined` and functions become `null` (object properties holding
    /// them are omitted), dates become RFC 3339 strings, regexes become
    /// `/source/flags`, sets become arrays, and maps become objects when
    /// every key is a string and arrays of pairs otherwise.
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        to_json_inner(self, &mut Vec::new())
    }
}

fn omitted(value: &Value) -> bool {
    matches!(value, Value::Undefined | Value::Function(_))
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

fn to_json_inner(value: &Value, stack: &mut Vec<NodeId>) -> Result<serde_json::Value, ValueError> {
    Ok(match value {
        Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Date(date) => serde_json::Value::String(
            date.format(&Rfc3339)
                .map_err(|err| ValueError::Date(err.to_string()))?,
        ),
        Value::Regex(regex) => {
            serde_json::Value::String(format!("/{}/{}", regex.source, regex.flags))
        }
        Value::Composite(node) => {
            if stack.contains(&node.id()) {
                return Err(ValueError::Cyclic);
            }
            stack.push(node.id());
            let converted = composite_to_json(node.entries(), stack);
            stack.pop();
            converted?
        }
    })
}

fn composite_to_json(
    body: Composite,
    stack: &mut Vec<NodeId>,
) -> Result<serde_json::Value, ValueError> {
    match body {
        Composite::Object(map) => {
            let mut out = Map::new();
            for (key, child) in map.iter().filter(|(_, v)| !omitted(v)) {
                out.insert(key.clone(), to_json_inner(child, stack)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        Composite::Array(items) | Composite::Set(items) => items
            .iter()
            .map(|item| to_json_inner(item, stack))
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array),
        Composite::Map(entries) => {
            if entries.iter().all(|(k, _)| matches!(k, Value::String(_))) {
                let mut out = Map::new();
                for (key, child) in entries.iter().filter(|(_, v)| !omitted(v)) {
                    if let Value::String(key) = key {
                        out.insert(key.clone(), to_json_inner(child, stack)?);
                    }
                }
                Ok(serde_json::Value::Object(out))
            } else {
                entries
                    .iter()
                    .map(|(k, v)| {
                        Ok(serde_json::Value::Array(vec![
                            to_json_inner(k, stack)?,
                            to_json_inner(v, stack)?,
                        ]))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(serde_json::Value::Array)
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

// ----------------------------------------------------------------------------
// Formatting
// ----------------------------------------------------------------------------

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, stack: &mut Vec<NodeId>) -> fmt::Result {
    match value {
        Value::Undefined => f.write_str("undefined"),
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => write_number(f, *n),
        Value::String(s) => write!(f, "{s:?}"),
        Value::Date(date) => match date.format(&Rfc3339) {
            Ok(text) => write!(f, "Date({text})"),
            Err(_) => write!(f, "Date({date})"),
        },
        Value::Regex(regex) => write!(f, "/{}/{}", regex.source, regex.flags),
        Value::Function(func) => write!(f, "{func:?}"),
        Value::Composite(node) => {
            if stack.contains(&node.id()) {
                return f.write_str("[Circular]");
            }
            stack.push(node.id());
            let result = write_composite(f, &node.entries(), stack);
            stack.pop();
            result
        }
    }
}

fn write_composite(f: &mut fmt::Formatter<'_>, body: &Composite, stack: &mut Vec<NodeId>) -> fmt::Result {
    match body {
        Composite::Object(map) => {
            f.write_str("{")?;
            for (i, (key, child)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key:?}: ")?;
                write_value(f, child, stack)?;
            }
            f.write_str("}")
        }
        Composite::Array(items) => {
            f.write_str("[")?;
            write_list(f, items, stack)?;
            f.write_str("]")
        }
        Composite::Set(items) => {
            f.write_str("Set {")?;
            write_list(f, items, stack)?;
            f.write_str("}")
        }
        Composite::Map(entries) => {
            f.write_str("Map {")?;
            for (i, (key, child)) in entries.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, key, stack)?;
                f.write_str(" => ")?;
                write_value(f, child, stack)?;
            }
            f.write_str("}")
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value], stack: &mut Vec<NodeId>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_value(f, item, stack)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
