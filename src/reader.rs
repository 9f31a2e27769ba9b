/*!
 * Payload parsing and record normalization
 *
 * This module turns a directory endpoint response (`{ "physicians": [...] }`
 * or `{ "error": "..." }`) into provider records, and normalizes those records
 * so that keys and text values carry no stray whitespace.
 */

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::data_types::{FieldValue, ProviderRecord};
use crate::fetch::ProviderSource;
use crate::{LocatorError, Result};

/// Trim every key and every text value of a record
///
/// Numbers pass through untouched. Applying this twice yields the same record.
pub fn normalize_record(record: &ProviderRecord) -> ProviderRecord {
    record
        .iter()
        .map(|(key, value)| {
            let value = match value {
                FieldValue::Text(s) => FieldValue::Text(s.trim().to_string()),
                other => other.clone(),
            };
            (key.trim().to_string(), value)
        })
        .collect()
}

/// Normalize a whole fetch; output order matches input order
pub fn normalize_records(records: &[ProviderRecord]) -> Vec<ProviderRecord> {
    records.iter().map(normalize_record).collect()
}

/// Parser for directory endpoint payloads
#[derive(Debug, Clone)]
pub struct ProviderReader {
    /// Whether to drop rows that are not JSON objects (true) or reject the payload (false)
    skip_invalid_rows: bool,
}

impl Default for ProviderReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderReader {
    pub fn new() -> Self {
        Self {
            skip_invalid_rows: true,
        }
    }

    /// Enable or disable skipping rows that are not objects
    pub fn with_skip_invalid_rows(mut self, skip: bool) -> Self {
        self.skip_invalid_rows = skip;
        self
    }

    /// Parse a response body
    pub fn parse_str(&self, body: &str) -> Result<Vec<ProviderRecord>> {
        let value: Value = serde_json::from_str(body).map_err(|e| LocatorError::MalformedResponse {
            message: format!("response is not valid JSON ({})", e),
        })?;
        self.parse_value(value)
    }

    /// Parse an already-decoded response envelope
    pub fn parse_value(&self, value: Value) -> Result<Vec<ProviderRecord>> {
        let Value::Object(mut envelope) = value else {
            return Err(LocatorError::MalformedResponse {
                message: "expected a JSON object".to_string(),
            });
        };

        if let Some(error) = envelope.get("error").filter(|e| is_truthy(e)) {
            let text = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(LocatorError::endpoint_reported(&text));
        }

        let rows = match envelope.remove("physicians") {
            Some(Value::Array(rows)) => rows,
            Some(_) => {
                return Err(LocatorError::MalformedResponse {
                    message: "`physicians` is not an array".to_string(),
                })
            }
            None => {
                return Err(LocatorError::MalformedResponse {
                    message: "missing `physicians` field".to_string(),
                })
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            match row {
                Value::Object(map) => records.push(record_from_json(map)),
                other if self.skip_invalid_rows => {
                    tracing::warn!(row = index, kind = json_kind(&other), "skipping non-object provider row");
                }
                other => {
                    return Err(LocatorError::MalformedResponse {
                        message: format!("row {} is a {}, expected an object", index, json_kind(&other)),
                    })
                }
            }
        }

        Ok(records)
    }

    /// Load a saved payload from disk
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ProviderRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LocatorError::Custom {
                message: format!("File not found: {}", path.display()),
                suggestion: Some("Provide a JSON file shaped like {\"physicians\": [...]}".to_string()),
            });
        }
        let body = std::fs::read_to_string(path)?;
        self.parse_str(&body)
    }
}

/// Provider source backed by a JSON file, for offline use
#[derive(Debug, Clone)]
pub struct FileProviderSource {
    path: PathBuf,
    reader: ProviderReader,
}

impl FileProviderSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reader: ProviderReader::new(),
        }
    }

    pub fn with_reader(mut self, reader: ProviderReader) -> Self {
        self.reader = reader;
        self
    }
}

#[async_trait]
impl ProviderSource for FileProviderSource {
    async fn fetch(&self) -> Result<Vec<ProviderRecord>> {
        tracing::info!(path = %self.path.display(), "loading providers from file");
        self.reader.load_file(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn record_from_json(map: Map<String, Value>) -> ProviderRecord {
    map.into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) => FieldValue::Text(s),
                Value::Number(n) => FieldValue::Number(n.as_f64()?),
                Value::Bool(b) => FieldValue::Text(b.to_string()),
                nested => FieldValue::Text(nested.to_string()),
            };
            Some((key, value))
        })
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_trims_keys_and_text() {
        let raw = ProviderRecord::new()
            .with(" Full Name ", "  Dr. A ")
            .with("Latitude ", 29.7);
        let normalized = normalize_record(&raw);

        assert_eq!(normalized.get("Full Name"), Some(&FieldValue::Text("Dr. A".into())));
        assert_eq!(normalized.get("Latitude"), Some(&FieldValue::Number(29.7)));
        assert!(normalized.get(" Full Name ").is_none());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = vec![
            ProviderRecord::new().with(" Name", "Dr. A  ").with("Specialty ", " Cardiology"),
            ProviderRecord::new().with("LanguagesSpoken", " English, Spanish ").with("Longitude", -95.3),
            ProviderRecord::new(),
        ];
        let once = normalize_records(&raw);
        let twice = normalize_records(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_physicians_payload() {
        let body = r#"{"physicians": [
            {"Name": "Dr. A", "Latitude": 29.7, "Longitude": -95.3, "Zip": 77002, "Notes": null},
            {"Name": "Dr. B", "Accepting": true}
        ]}"#;
        let records = ProviderReader::new().parse_str(body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Latitude"), Some(&FieldValue::Number(29.7)));
        assert_eq!(records[0].text("Zip").as_deref(), Some("77002"));
        assert!(records[0].get("Notes").is_none());
        assert_eq!(records[1].text("Accepting").as_deref(), Some("true"));
    }

    #[test]
    fn test_endpoint_error_is_fetch_failure() {
        let err = ProviderReader::new()
            .parse_str(r#"{"error": "Sheet not found"}"#)
            .unwrap_err();
        assert!(matches!(err, LocatorError::Fetch { status: None, .. }));
        assert_eq!(err.to_string(), "Data fetching error: Sheet not found");
    }

    #[test]
    fn test_malformed_envelopes() {
        let reader = ProviderReader::new();
        for body in [r#"{"physicians": {}}"#, r#"{"data": []}"#, "[]", "not json"] {
            let err = reader.parse_str(body).unwrap_err();
            assert!(matches!(err, LocatorError::MalformedResponse { .. }), "body {}", body);
        }
    }

    #[test]
    fn test_non_object_rows() {
        let body = r#"{"physicians": [{"Name": "Dr. A"}, "oops", 3]}"#;
        assert_eq!(ProviderReader::new().parse_str(body).unwrap().len(), 1);

        let strict = ProviderReader::new().with_skip_invalid_rows(false);
        assert!(strict.parse_str(body).is_err());
    }

    #[tokio::test]
    async fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"physicians": [{{"Name": " Dr. File "}}]}}"#).unwrap();

        let source = FileProviderSource::new(file.path());
        let records = source.fetch().await.unwrap();
        assert_eq!(records.len(), 1);

        let missing = FileProviderSource::new("/definitely/not/here.json");
        assert!(missing.fetch().await.is_err());
    }
}
