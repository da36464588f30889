use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform document: system fields plus the collection's own attributes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Document<T> {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DocumentList<T> {
    pub total: u64,
    pub documents: Vec<T>,
}
