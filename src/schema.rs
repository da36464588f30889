//! Database, collection and bucket layout, and the check-then-create
//! bootstrap that brings a fresh project up to it.
use handle_errors::Error;
use tracing::{event, instrument, Level};

use crate::store::Backend;

pub const DATABASE: &str = "main-stackflow";
pub const QUESTIONS: &str = "questions";
pub const ANSWERS: &str = "answers";
pub const COMMENTS: &str = "comments";
pub const VOTES: &str = "votes";
pub const ATTACHMENT_BUCKET: &str = "question-attachment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Any,
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read(Role),
    Create(Role),
    Update(Role),
    Delete(Role),
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (action, role) = match self {
            Permission::Read(r) => ("read", r),
            Permission::Create(r) => ("create", r),
            Permission::Update(r) => ("update", r),
            Permission::Delete(r) => ("delete", r),
        };
        let role = match role {
            Role::Any => "any",
            Role::Users => "users",
        };
        write!(f, "{}(\"{}\")", action, role)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    String {
        key: &'static str,
        size: u32,
        required: bool,
        array: bool,
    },
    Enum {
        key: &'static str,
        elements: &'static [&'static str],
        required: bool,
    },
}

impl Attribute {
    fn string(key: &'static str, size: u32, required: bool) -> Self {
        Attribute::String {
            key,
            size,
            required,
            array: false,
        }
    }

    fn enumeration(key: &'static str, elements: &'static [&'static str]) -> Self {
        Attribute::Enum {
            key,
            elements,
            required: true,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Attribute::String { key, .. } | Attribute::Enum { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub id: &'static str,
    pub permissions: Vec<Permission>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSpec {
    pub id: &'static str,
    pub permissions: Vec<Permission>,
    pub allowed_extensions: &'static [&'static str],
}

const TARGET_TYPES: &[&str] = &["question", "answer"];
const VOTE_STATUSES: &[&str] = &["upvoted", "downvoted"];

/// Anyone reads, signed-in users write.
fn user_content_permissions() -> Vec<Permission> {
    vec![
        Permission::Read(Role::Any),
        Permission::Read(Role::Users),
        Permission::Create(Role::Users),
        Permission::Update(Role::Users),
        Permission::Delete(Role::Users),
    ]
}

pub fn collections() -> Vec<CollectionSpec> {
    vec![
        CollectionSpec {
            id: QUESTIONS,
            permissions: user_content_permissions(),
            attributes: vec![
                Attribute::string("title", 100, true),
                Attribute::string("content", 10000, true),
                Attribute::string("authorId", 50, true),
                Attribute::String {
                    key: "tags",
                    size: 50,
                    required: true,
                    array: true,
                },
                Attribute::string("attachmentId", 50, false),
                Attribute::string("bestAnswerId", 50, false),
            ],
        },
        CollectionSpec {
            id: ANSWERS,
            permissions: user_content_permissions(),
            attributes: vec![
                Attribute::string("content", 10000, true),
                Attribute::string("questionId", 50, true),
                Attribute::string("authorId", 50, true),
            ],
        },
        CollectionSpec {
            id: COMMENTS,
            permissions: user_content_permissions(),
            attributes: vec![
                Attribute::string("content", 10000, true),
                Attribute::enumeration("type", TARGET_TYPES),
                Attribute::string("typeId", 50, true),
                Attribute::string("authorId", 50, true),
            ],
        },
        CollectionSpec {
            id: VOTES,
            permissions: user_content_permissions(),
            attributes: vec![
                Attribute::enumeration("type", TARGET_TYPES),
                Attribute::string("typeId", 50, true),
                Attribute::enumeration("voteStatus", VOTE_STATUSES),
                Attribute::string("votedById", 50, true),
            ],
        },
    ]
}

pub fn attachment_bucket() -> BucketSpec {
    BucketSpec {
        id: ATTACHMENT_BUCKET,
        permissions: user_content_permissions(),
        allowed_extensions: &["jpg", "png", "gif", "jpeg", "webp", "heic"],
    }
}

/// Creates the database and every collection when the database is missing.
/// Returns whether anything was created.
#[instrument(skip(backend))]
pub async fn ensure_database(backend: &dyn Backend) -> Result<bool, Error> {
    if backend.database_exists().await? {
        event!(Level::DEBUG, "database present");
        return Ok(false);
    }

    backend.create_database().await?;
    event!(Level::INFO, "database created");

    for collection in collections() {
        backend.create_collection(&collection).await?;
        for attribute in &collection.attributes {
            backend.create_attribute(collection.id, attribute).await?;
        }
        event!(Level::INFO, collection = collection.id, "collection created");
    }
    Ok(true)
}

#[instrument(skip(backend))]
pub async fn ensure_storage(backend: &dyn Backend) -> Result<bool, Error> {
    let bucket = attachment_bucket();
    if backend.bucket_exists(bucket.id).await? {
        event!(Level::DEBUG, "bucket present");
        return Ok(false);
    }
    backend.create_bucket(&bucket).await?;
    event!(Level::INFO, bucket = bucket.id, "bucket created");
    Ok(true)
}

pub async fn bootstrap(backend: &dyn Backend) -> Result<(), Error> {
    let (database, storage) = tokio::join!(ensure_database(backend), ensure_storage(backend));
    database?;
    storage?;
    Ok(())
}
