use async_trait::async_trait;
use handle_errors::{APILayerError, Error};
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use serde_json::{json, Value};
use tracing::{event, instrument, Level};

use super::{query::Query, Backend};
use crate::schema::{Attribute, BucketSpec, CollectionSpec};
use crate::types::document::DocumentList;

/// REST client for an Appwrite-compatible platform.
#[derive(Debug, Clone)]
pub struct AppwriteBackend {
    client: Client,
    endpoint: String,
    project_id: String,
    api_key: String,
    database_id: String,
}

impl AppwriteBackend {
    pub fn new(
        endpoint: &str,
        project_id: &str,
        api_key: &str,
        database_id: &str,
    ) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(concat!("stackflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::ExternalAPIError)?;
        Ok(AppwriteBackend {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            api_key: api_key.to_string(),
            database_id: database_id.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn files_url(&self, bucket_id: &str) -> String {
        self.url(&format!("/storage/buckets/{}/files", bucket_id))
    }

    fn collection_url(&self, collection: &str) -> String {
        self.url(&format!(
            "/databases/{}/collections/{}",
            self.database_id, collection
        ))
    }

    /// Request authorized with the server API key.
    fn admin(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, Error> {
        let res = self
            .admin(request)
            .send()
            .await
            .map_err(Error::ExternalAPIError)?;
        read_body(res).await
    }

    /// `true` on 2xx, `false` on 404, error otherwise.
    async fn exists(&self, url: String) -> Result<bool, Error> {
        match self.send(self.client.get(url)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

async fn read_body(res: Response) -> Result<Value, Error> {
    if !res.status().is_success() {
        let err = transform_error(res).await;
        event!(Level::WARN, "{}", err);
        return Err(Error::from_status(err.status, err.message));
    }
    if res.status() == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    let body = res.text().await.map_err(Error::ExternalAPIError)?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(Error::InvalidDocument)
}

async fn transform_error(res: Response) -> APILayerError {
    let status = res.status();
    let message = res
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
    APILayerError {
        status: status.as_u16(),
        message,
    }
}

fn permission_strings(permissions: &[crate::schema::Permission]) -> Vec<String> {
    permissions.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl Backend for AppwriteBackend {
    #[instrument(skip(self))]
    async fn get_document(&self, collection: &str, id: &str) -> Result<Value, Error> {
        let url = format!("{}/documents/{}", self.collection_url(collection), id);
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self, data))]
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Value, Error> {
        let url = format!("{}/documents", self.collection_url(collection));
        let body = json!({ "documentId": id, "data": data });
        self.send(self.client.post(url).json(&body)).await
    }

    #[instrument(skip(self, data))]
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Value, Error> {
        let url = format!("{}/documents/{}", self.collection_url(collection), id);
        self.send(self.client.patch(url).json(&json!({ "data": data })))
            .await
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), Error> {
        let url = format!("{}/documents/{}", self.collection_url(collection), id);
        self.send(self.client.delete(url)).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn list_documents(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> Result<DocumentList<Value>, Error> {
        let url = format!("{}/documents", self.collection_url(collection));
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|q| ("queries[]", q.to_json().to_string()))
            .collect();
        let body = self.send(self.client.get(url).query(&params)).await?;
        serde_json::from_value(body).map_err(Error::InvalidDocument)
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: &str) -> Result<Value, Error> {
        self.send(self.client.get(self.url(&format!("/users/{}", user_id))))
            .await
    }

    #[instrument(skip(self))]
    async fn get_prefs(&self, user_id: &str) -> Result<Value, Error> {
        self.send(
            self.client
                .get(self.url(&format!("/users/{}/prefs", user_id))),
        )
        .await
    }

    #[instrument(skip(self, prefs))]
    async fn update_prefs(&self, user_id: &str, prefs: Value) -> Result<Value, Error> {
        self.send(
            self.client
                .patch(self.url(&format!("/users/{}/prefs", user_id)))
                .json(&json!({ "prefs": prefs })),
        )
        .await
    }

    /// Account lookups act as the user, so the API key is not sent.
    #[instrument(skip(self, jwt))]
    async fn account_from_jwt(&self, jwt: &str) -> Result<Value, Error> {
        let res = self
            .client
            .get(self.url("/account"))
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-JWT", jwt)
            .send()
            .await
            .map_err(Error::ExternalAPIError)?;
        read_body(res).await
    }

    async fn database_exists(&self) -> Result<bool, Error> {
        self.exists(self.url(&format!("/databases/{}", self.database_id)))
            .await
    }

    async fn create_database(&self) -> Result<(), Error> {
        let body = json!({ "databaseId": self.database_id, "name": self.database_id });
        self.send(self.client.post(self.url("/databases")).json(&body))
            .await
            .map(|_| ())
    }

    async fn create_collection(&self, collection: &CollectionSpec) -> Result<(), Error> {
        let body = json!({
            "collectionId": collection.id,
            "name": collection.id,
            "permissions": permission_strings(&collection.permissions),
            "documentSecurity": false,
        });
        let url = self.url(&format!("/databases/{}/collections", self.database_id));
        self.send(self.client.post(url).json(&body)).await.map(|_| ())
    }

    async fn create_attribute(&self, collection: &str, attribute: &Attribute) -> Result<(), Error> {
        let (kind, body) = match attribute {
            Attribute::String {
                key,
                size,
                required,
                array,
            } => (
                "string",
                json!({ "key": key, "size": size, "required": required, "array": array }),
            ),
            Attribute::Enum {
                key,
                elements,
                required,
            } => (
                "enum",
                json!({ "key": key, "elements": elements, "required": required }),
            ),
        };
        let url = format!("{}/attributes/{}", self.collection_url(collection), kind);
        self.send(self.client.post(url).json(&body)).await.map(|_| ())
    }

    async fn bucket_exists(&self, bucket_id: &str) -> Result<bool, Error> {
        self.exists(self.url(&format!("/storage/buckets/{}", bucket_id)))
            .await
    }

    async fn create_bucket(&self, bucket: &BucketSpec) -> Result<(), Error> {
        let body = json!({
            "bucketId": bucket.id,
            "name": bucket.id,
            "permissions": permission_strings(&bucket.permissions),
            "fileSecurity": false,
            "allowedFileExtensions": bucket.allowed_extensions,
        });
        self.send(self.client.post(self.url("/storage/buckets")).json(&body))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, contents))]
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<Value, Error> {
        let form = Form::new()
            .text("fileId", file_id.to_string())
            .part("file", Part::bytes(contents).file_name(filename.to_string()));
        self.send(self.client.post(self.files_url(bucket_id)).multipart(form))
            .await
    }

    #[instrument(skip(self))]
    async fn get_file(&self, bucket_id: &str, file_id: &str) -> Result<Value, Error> {
        let url = format!("{}/{}", self.files_url(bucket_id), file_id);
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self))]
    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), Error> {
        let url = format!("{}/{}", self.files_url(bucket_id), file_id);
        self.send(self.client.delete(url)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> AppwriteBackend {
        AppwriteBackend::new(&server.uri(), "proj", "secret", "main-stackflow").unwrap()
    }

    #[tokio::test]
    async fn sends_project_and_key_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/databases/main-stackflow/collections/questions/documents/q1"))
            .and(header("X-Appwrite-Project", "proj"))
            .and(header("X-Appwrite-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "$id": "q1" })))
            .expect(1)
            .mount(&server)
            .await;

        let doc = backend(&server).get_document("questions", "q1").await.unwrap();
        assert_eq!(doc["$id"], "q1");
    }

    #[tokio::test]
    async fn client_errors_keep_platform_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Document with the requested ID could not be found.",
                "code": 404,
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .get_document("answers", "missing")
            .await
            .unwrap_err();
        match err {
            Error::ClientError(e) => {
                assert_eq!(e.status, 404);
                assert_eq!(e.message, "Document with the requested ID could not be found.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn server_errors_map_to_server_variant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = backend(&server).get_user("u1").await.unwrap_err();
        assert!(matches!(err, Error::ServerError(APILayerError { status: 503, .. })));
    }

    #[tokio::test]
    async fn list_sends_json_queries() {
        let server = MockServer::start().await;
        let equal = Query::equal("typeId", "a1").to_json().to_string();
        Mock::given(method("GET"))
            .and(path("/databases/main-stackflow/collections/votes/documents"))
            .and(query_param("queries[]", equal.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 2,
                "documents": [],
            })))
            .mount(&server)
            .await;

        let list = backend(&server)
            .list_documents("votes", &[Query::equal("typeId", "a1")])
            .await
            .unwrap();
        assert_eq!(list.total, 2);
    }

    #[tokio::test]
    async fn missing_database_reports_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/databases/main-stackflow"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "nope" })))
            .mount(&server)
            .await;

        assert!(!backend(&server).database_exists().await.unwrap());
    }

    #[tokio::test]
    async fn delete_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/databases/main-stackflow/collections/comments/documents/c1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        backend(&server).delete_document("comments", "c1").await.unwrap();
    }

    #[tokio::test]
    async fn uploads_files_as_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/buckets/question-attachment/files"))
            .and(header("X-Appwrite-Key", "secret"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "$id": "f1",
                "bucketId": "question-attachment",
                "name": "shot.png",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = backend(&server)
            .create_file("question-attachment", "f1", "shot.png", b"png-bytes".to_vec())
            .await
            .unwrap();
        assert_eq!(file["$id"], "f1");

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"fileId\""));
        assert!(body.contains("filename=\"shot.png\""));
        assert!(body.contains("png-bytes"));
    }

    #[tokio::test]
    async fn deletes_files_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/buckets/question-attachment/files/f1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        backend(&server)
            .delete_file("question-attachment", "f1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn jwt_lookup_omits_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account"))
            .and(header("X-Appwrite-JWT", "token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "$id": "u1",
                "name": "ana",
                "prefs": {},
            })))
            .mount(&server)
            .await;

        let account = backend(&server).account_from_jwt("token").await.unwrap();
        assert_eq!(account["$id"], "u1");
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("X-Appwrite-Key").is_none());
    }
}
