use crate::error::Result;
use serde_json::{self, Value};
use std::fs;
use std::path::Path;

/// Path-based accessors over loosely typed JSON records.
///
/// Inbound rows, polygon payloads and config files all arrive as
/// `serde_json::Value`; these helpers keep the lookups in one place.
pub struct JsonParser;

impl JsonParser {
    /// Load JSON data from a file path
    pub fn load_json<P: AsRef<Path>>(file_path: P) -> Result<Value> {
        let json_str = fs::read_to_string(file_path.as_ref())?;
        Ok(serde_json::from_str(&json_str)?)
    }

    /// Parse JSON data from a string
    pub fn load_json_str(json_str: &str) -> Result<Value> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Get a nested value from JSON using a path of keys
    pub fn get_value<'a>(json: &'a Value, path: &[&str]) -> Option<&'a Value> {
        let mut current = json;
        for &key in path {
            current = current.get(key)?;
        }
        Some(current)
    }

    /// Get a nested f64 value from JSON using a path of keys
    pub fn get_f64(json: &Value, path: &[&str]) -> Option<f64> {
        Self::get_value(json, path).and_then(|v| v.as_f64())
    }

    /// Get a nested string value from JSON using a path of keys
    pub fn get_str<'a>(json: &'a Value, path: &[&str]) -> Option<&'a str> {
        Self::get_value(json, path).and_then(|v| v.as_str())
    }

    /// Get a nested unsigned integer value from JSON using a path of keys
    pub fn get_u64(json: &Value, path: &[&str]) -> Option<u64> {
        Self::get_value(json, path).and_then(|v| v.as_u64())
    }

    /// First non-null field among `keys`, checked in order.
    pub fn first_present<'a>(json: &'a Value, keys: &[&str]) -> Option<&'a Value> {
        let object = json.as_object()?;
        keys.iter()
            .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
    }

    /// Interpret a JSON value as a coordinate pair; extra components are ignored.
    pub fn get_pair(json: &Value) -> Option<[f64; 2]> {
        match json.as_array()?.as_slice() {
            [a, b, ..] => Some([a.as_f64()?, b.as_f64()?]),
            _ => None,
        }
    }
}
