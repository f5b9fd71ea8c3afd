//! Plain key-value export of engine results.
//!
//! The engine defines only the logical schema; whatever persists these
//! records chooses the file encoding.

use serde::Serialize;
use serde_json::{Map, Value};

/// A flat-or-nested key-value record.
pub type Record = Map<String, Value>;

/// Export as a [`Record`].
pub trait ToRecord {
    fn to_record(&self) -> Record;
}

impl<T: Serialize> ToRecord for T {
    fn to_record(&self) -> Record {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
            Err(e) => {
                let mut map = Map::new();
                map.insert("error".to_string(), Value::String(e.to_string()));
                map
            }
        }
    }
}
