//! SObject Collections wire types.

use forcelink_client::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sobject::{DmlError, DmlResult};

/// Body of a collections insert, update or upsert.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRequest {
    #[serde(rename = "allOrNone")]
    pub all_or_none: bool,
    pub records: Vec<Value>,
}

/// One entry of a collections response, in request order.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionResult {
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<DmlError>,
    pub created: Option<bool>,
}

impl CollectionResult {
    pub fn into_dml_result(self, original_index: usize) -> DmlResult {
        DmlResult {
            original_index,
            id: self.id,
            success: self.success,
            created: self.created,
            errors: self.errors,
        }
    }
}

/// Nested JSON body of a record tagged with its sObject type.
pub fn typed_record(object: &str, record: &Record) -> Value {
    let mut body = Map::new();
    body.insert("attributes".to_string(), serde_json::json!({ "type": object }));
    body.extend(record.to_json_object());
    Value::Object(body)
}
