//! Raw request attributes as received from callers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute name to value, no fixed schema.
///
/// Keys may be missing, extra or mistyped; the encoder decides what survives.
pub type RawAttributes = BTreeMap<String, AttributeValue>;

/// A single scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Numeric view of the value.
    ///
    /// Strings (form submissions) are trimmed and parsed, booleans map to 1/0.
    /// Non-finite results are rejected.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            AttributeValue::Null => return None,
            AttributeValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            AttributeValue::Number(n) => *n,
            AttributeValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    /// Label used to name the one-hot column for a categorical value
    pub fn category_label(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(true) => Some("True".to_string()),
            AttributeValue::Bool(false) => Some("False".to_string()),
            AttributeValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            AttributeValue::Number(n) => Some(format!("{}", n)),
            AttributeValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_mixed_payload() {
        let raw: RawAttributes = serde_json::from_value(json!({
            "person_age": 30,
            "person_income": "50000",
            "loan_grade": "B",
            "flag": true,
            "note": null
        }))
        .unwrap();

        assert_eq!(raw["person_age"], AttributeValue::Number(30.0));
        assert_eq!(raw["person_income"], AttributeValue::Text("50000".into()));
        assert_eq!(raw["flag"], AttributeValue::Bool(true));
        assert!(raw["note"].is_null());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(AttributeValue::from(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(AttributeValue::from(true).as_number(), Some(1.0));
        assert_eq!(AttributeValue::from("abc").as_number(), None);
        assert_eq!(AttributeValue::from("NaN").as_number(), None);
        assert_eq!(AttributeValue::from("inf").as_number(), None);
        assert_eq!(AttributeValue::Null.as_number(), None);
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(AttributeValue::from("RENT").category_label().unwrap(), "RENT");
        assert_eq!(AttributeValue::from(1.0).category_label().unwrap(), "1");
        assert_eq!(AttributeValue::from(2.5).category_label().unwrap(), "2.5");
        assert_eq!(AttributeValue::from(false).category_label().unwrap(), "False");
        assert!(AttributeValue::Null.category_label().is_none());
    }
}
