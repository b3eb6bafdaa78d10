//! Data models for cutoff-server

pub mod cutoff_record;
pub mod prediction;

pub use cutoff_record::{CutoffRecord, ExtractedRecord, RecordRejection};
pub use prediction::{PredictFilters, PredictQuery, PredictRequest, PredictResponse, PredictedCollege, Suggestions};

/// Lenient field deserializers for loosely typed JSON input
///
/// Extraction output and browser forms send numbers as strings and
/// vice versa; these accept either.
pub(crate) mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// String, number or bool as text; null/missing/other as None
    pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Number or numeric string as f64; anything else as None
    pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite()))
    }
}
