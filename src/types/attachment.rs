use serde::{Deserialize, Serialize};

/// Metadata of an uploaded question attachment.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub bucket_id: String,
    pub name: String,
    #[serde(default)]
    pub size_original: u64,
}
