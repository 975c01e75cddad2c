use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A scalar the scripting language can compute with and store.
///
/// Untagged, so a variable snapshot round-trips as plain JSON scalars.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    /// Type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Integral numbers print without a trailing ".0" so interpolated
            // counters read naturally in dialogue text.
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Mutable variable state, shared across every run on one `Runner`.
///
/// A name that was never set reads as `None`, the language's "undefined".
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(transparent)]
pub struct VariableStore {
    values: HashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        VariableStore::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_drops_trailing_zero_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-12.0).to_string(), "-12");
        assert_eq!(Value::Number(4.5).to_string(), "4.5");
        assert_eq!(Value::Number(-123.4).to_string(), "-123.4");
    }

    #[test]
    fn display_strings_and_bools() {
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }

    #[test]
    fn store_reads_back_what_was_set() {
        let mut vars = VariableStore::new();
        assert!(vars.get("gold").is_none());

        vars.set("gold", 50);
        vars.set("name", "Arlen");
        vars.set("met_guard", true);

        assert_eq!(vars.get("gold"), Some(&Value::Number(50.0)));
        assert_eq!(vars.get("name"), Some(&Value::Str("Arlen".to_string())));
        assert_eq!(vars.get("met_guard"), Some(&Value::Bool(true)));

        vars.unset("gold");
        assert!(vars.get("gold").is_none());
    }

    #[test]
    fn store_round_trips_as_plain_json() {
        let mut vars = VariableStore::new();
        vars.set("hp", 7);
        vars.set("title", "sir");
        let json = serde_json::to_string(&vars).expect("serializable");
        let back: VariableStore = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back.get("hp"), Some(&Value::Number(7.0)));
        assert_eq!(back.get("title"), Some(&Value::Str("sir".to_string())));
    }
}
