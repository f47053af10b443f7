//! API documentation entries and their on-disk JSON schema

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// One API document loaded from the corpus.
///
/// Every field is optional on disk. Missing or `null` fields fall back to
/// an empty string, map or list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    #[serde(default, deserialize_with = "nullable")]
    pub api_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub library: String,
    #[serde(default, deserialize_with = "nullable")]
    pub signature: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub returns: String,
    #[serde(default, deserialize_with = "nullable")]
    pub example: String,
    #[serde(default, deserialize_with = "nullable")]
    pub usage_context: String,
    #[serde(default, deserialize_with = "nullable")]
    pub related_apis: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub common_pitfalls: String,
    /// Populated during the load cycle, never read from disk
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl DocumentEntry {
    /// Text fed to the embedding provider for this document
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {}",
            self.api_name, self.description, self.usage_context
        )
    }

    /// Lowercased haystack for the keyword strategy
    pub fn keyword_text(&self) -> String {
        format!("{} {} {}", self.api_name, self.description, self.signature).to_lowercase()
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Split a JSON file body into its document values.
///
/// A file holds either one document object or an array of them. Each
/// element is decoded on its own so one bad entry does not poison the
/// rest of the file.
pub fn parse_documents(
    value: serde_json::Value,
) -> Vec<Result<DocumentEntry, serde_json::Error>> {
    match value {
        serde_json::Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        other => vec![serde_json::from_value(other)],
    }
}
