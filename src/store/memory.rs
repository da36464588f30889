use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use handle_errors::{APILayerError, Error};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use super::{query::Query, Backend};
use crate::schema::{Attribute, BucketSpec, CollectionSpec};
use crate::types::document::DocumentList;

const DEFAULT_LIMIT: usize = 25;

#[derive(Default)]
struct State {
    database: bool,
    /// collection id -> attribute keys
    collections: HashMap<String, Vec<String>>,
    /// collection id -> documents in insertion order
    documents: HashMap<String, Vec<Value>>,
    /// bucket id -> allowed extensions
    buckets: HashMap<String, Vec<String>>,
    /// bucket id -> file metadata in upload order
    files: HashMap<String, Vec<Value>>,
    users: HashMap<String, Value>,
    sessions: HashMap<String, String>,
}

/// In-process platform stand-in. Local runs and tests use it.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

fn not_found(what: &str) -> Error {
    Error::ClientError(APILayerError::not_found(format!(
        "{} with the requested ID could not be found.",
        what
    )))
}

fn conflict(what: &str) -> Error {
    Error::ClientError(APILayerError::conflict(format!(
        "{} with the requested ID already exists.",
        what
    )))
}

impl MemoryBackend {
    pub async fn add_user(&self, id: &str, name: &str) {
        self.state.lock().await.users.insert(
            id.to_string(),
            json!({ "$id": id, "name": name, "prefs": {} }),
        );
    }

    /// Makes `jwt` resolve to `user_id`.
    pub async fn add_session(&self, jwt: &str, user_id: &str) {
        self.state
            .lock()
            .await
            .sessions
            .insert(jwt.to_string(), user_id.to_string());
    }

    /// Number of stored documents in `collection`.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .await
            .documents
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl State {
    fn collection(&self, collection: &str) -> Result<&Vec<Value>, Error> {
        if !self.collections.contains_key(collection) {
            return Err(not_found("Collection"));
        }
        Ok(self.documents.get(collection).unwrap_or(&EMPTY))
    }

    fn collection_mut(&mut self, collection: &str) -> Result<&mut Vec<Value>, Error> {
        if !self.collections.contains_key(collection) {
            return Err(not_found("Collection"));
        }
        Ok(self.documents.entry(collection.to_string()).or_default())
    }
}

static EMPTY: Vec<Value> = Vec::new();

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn document_id(document: &Value) -> Option<&str> {
    document.get("$id").and_then(Value::as_str)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Value, Error> {
        let state = self.state.lock().await;
        state
            .collection(collection)?
            .iter()
            .find(|d| document_id(d) == Some(id))
            .cloned()
            .ok_or_else(|| not_found("Document"))
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Value, Error> {
        let mut state = self.state.lock().await;
        let documents = state.collection_mut(collection)?;
        if documents.iter().any(|d| document_id(d) == Some(id)) {
            return Err(conflict("Document"));
        }

        let now = timestamp();
        let mut document = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        document.insert("$id".to_string(), json!(id));
        document.insert("$collectionId".to_string(), json!(collection));
        document.insert("$createdAt".to_string(), json!(now));
        document.insert("$updatedAt".to_string(), json!(now));

        let document = Value::Object(document);
        documents.push(document.clone());
        Ok(document)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Value, Error> {
        let mut state = self.state.lock().await;
        let document = state
            .collection_mut(collection)?
            .iter_mut()
            .find(|d| document_id(d) == Some(id))
            .ok_or_else(|| not_found("Document"))?;

        if let (Some(target), Value::Object(changes)) = (document.as_object_mut(), data) {
            for (key, value) in changes {
                if !key.starts_with('$') {
                    target.insert(key, value);
                }
            }
            target.insert("$updatedAt".to_string(), json!(timestamp()));
        }
        Ok(document.clone())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let documents = state.collection_mut(collection)?;
        let position = documents
            .iter()
            .position(|d| document_id(d) == Some(id))
            .ok_or_else(|| not_found("Document"))?;
        documents.remove(position);
        Ok(())
    }

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> Result<DocumentList<Value>, Error> {
        let state = self.state.lock().await;
        let mut matching: Vec<Value> = state
            .collection(collection)?
            .iter()
            .filter(|d| queries.iter().all(|q| q.matches(d)))
            .cloned()
            .collect();

        let mut limit = DEFAULT_LIMIT;
        let mut offset = 0usize;
        for query in queries {
            match query {
                Query::OrderDesc(attribute) => {
                    // Newest insert first among equal keys.
                    matching.reverse();
                    matching.sort_by(|a, b| {
                        let a = a.get(attribute).map(Value::to_string).unwrap_or_default();
                        let b = b.get(attribute).map(Value::to_string).unwrap_or_default();
                        b.cmp(&a)
                    });
                }
                Query::Limit(n) => limit = *n as usize,
                Query::Offset(n) => offset = *n as usize,
                Query::Equal { .. } | Query::Contains { .. } => {}
            }
        }

        let total = matching.len() as u64;
        let documents = matching.into_iter().skip(offset).take(limit).collect();
        Ok(DocumentList { total, documents })
    }

    async fn get_user(&self, user_id: &str) -> Result<Value, Error> {
        self.state
            .lock()
            .await
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| not_found("User"))
    }

    async fn get_prefs(&self, user_id: &str) -> Result<Value, Error> {
        let user = self.get_user(user_id).await?;
        Ok(user.get("prefs").cloned().unwrap_or_else(|| json!({})))
    }

    async fn update_prefs(&self, user_id: &str, prefs: Value) -> Result<Value, Error> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found("User"))?;
        user["prefs"] = prefs.clone();
        Ok(prefs)
    }

    async fn account_from_jwt(&self, jwt: &str) -> Result<Value, Error> {
        let state = self.state.lock().await;
        state
            .sessions
            .get(jwt)
            .and_then(|user_id| state.users.get(user_id))
            .cloned()
            .ok_or_else(|| Error::from_status(401, "Invalid token passed in the request."))
    }

    async fn database_exists(&self) -> Result<bool, Error> {
        Ok(self.state.lock().await.database)
    }

    async fn create_database(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.database {
            return Err(conflict("Database"));
        }
        state.database = true;
        Ok(())
    }

    async fn create_collection(&self, collection: &CollectionSpec) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if !state.database {
            return Err(not_found("Database"));
        }
        if state.collections.contains_key(collection.id) {
            return Err(conflict("Collection"));
        }
        state.collections.insert(collection.id.to_string(), Vec::new());
        Ok(())
    }

    async fn create_attribute(&self, collection: &str, attribute: &Attribute) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let keys = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| not_found("Collection"))?;
        if keys.iter().any(|k| k == attribute.key()) {
            return Err(conflict("Attribute"));
        }
        keys.push(attribute.key().to_string());
        Ok(())
    }

    async fn bucket_exists(&self, bucket_id: &str) -> Result<bool, Error> {
        Ok(self.state.lock().await.buckets.contains_key(bucket_id))
    }

    async fn create_bucket(&self, bucket: &BucketSpec) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.buckets.contains_key(bucket.id) {
            return Err(conflict("Bucket"));
        }
        let extensions = bucket
            .allowed_extensions
            .iter()
            .map(|e| e.to_string())
            .collect();
        state.buckets.insert(bucket.id.to_string(), extensions);
        Ok(())
    }

    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<Value, Error> {
        let mut state = self.state.lock().await;
        let allowed = state
            .buckets
            .get(bucket_id)
            .ok_or_else(|| not_found("Storage bucket"))?;
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        if !allowed.is_empty() && !allowed.contains(&extension) {
            return Err(Error::from_status(
                400,
                "The given file extension is not supported.",
            ));
        }

        let files = state.files.entry(bucket_id.to_string()).or_default();
        if files.iter().any(|f| document_id(f) == Some(file_id)) {
            return Err(conflict("File"));
        }
        let now = timestamp();
        let file = json!({
            "$id": file_id,
            "bucketId": bucket_id,
            "$createdAt": now,
            "$updatedAt": now,
            "name": filename,
            "sizeOriginal": contents.len(),
        });
        files.push(file.clone());
        Ok(file)
    }

    async fn get_file(&self, bucket_id: &str, file_id: &str) -> Result<Value, Error> {
        let state = self.state.lock().await;
        if !state.buckets.contains_key(bucket_id) {
            return Err(not_found("Storage bucket"));
        }
        state
            .files
            .get(bucket_id)
            .and_then(|files| files.iter().find(|f| document_id(f) == Some(file_id)))
            .cloned()
            .ok_or_else(|| not_found("File"))
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let files = state
            .files
            .get_mut(bucket_id)
            .ok_or_else(|| not_found("File"))?;
        let position = files
            .iter()
            .position(|f| document_id(f) == Some(file_id))
            .ok_or_else(|| not_found("File"))?;
        files.remove(position);
        Ok(())
    }
}
