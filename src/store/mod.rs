use std::sync::Arc;

use async_trait::async_trait;
use handle_errors::Error;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{event, Level};

pub mod appwrite;
pub mod memory;
pub mod query;

use crate::schema::{
    Attribute, BucketSpec, CollectionSpec, ANSWERS, ATTACHMENT_BUCKET, COMMENTS, QUESTIONS, VOTES,
};
use crate::types::{
    answer::{Answer, AnswerId},
    attachment::Attachment,
    comment::{Comment, CommentId},
    document::{Document, DocumentList},
    pagination::Pagination,
    question::{Question, QuestionId, QuestionUpdate},
    target::Target,
    user::{reputation_value, Account, UserId},
    vote::{Vote, VoteStatus},
};
use query::Query;

/// Document-level access to the hosted platform.
///
/// Documents travel as JSON; [`Store`] layers typed, per-collection
/// functions on top.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Value, Error>;
    async fn create_document(&self, collection: &str, id: &str, data: Value)
        -> Result<Value, Error>;
    /// Partial update: only the given attributes change.
    async fn update_document(&self, collection: &str, id: &str, data: Value)
        -> Result<Value, Error>;
    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), Error>;
    async fn list_documents(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> Result<DocumentList<Value>, Error>;

    async fn get_user(&self, user_id: &str) -> Result<Value, Error>;
    async fn get_prefs(&self, user_id: &str) -> Result<Value, Error>;
    /// Replaces the whole preference object.
    async fn update_prefs(&self, user_id: &str, prefs: Value) -> Result<Value, Error>;
    /// Resolves a session JWT to the account that owns it.
    async fn account_from_jwt(&self, jwt: &str) -> Result<Value, Error>;

    async fn database_exists(&self) -> Result<bool, Error>;
    async fn create_database(&self) -> Result<(), Error>;
    async fn create_collection(&self, collection: &CollectionSpec) -> Result<(), Error>;
    async fn create_attribute(&self, collection: &str, attribute: &Attribute)
        -> Result<(), Error>;
    async fn bucket_exists(&self, bucket_id: &str) -> Result<bool, Error>;
    async fn create_bucket(&self, bucket: &BucketSpec) -> Result<(), Error>;

    /// Uploads `contents` as `filename`. The bucket decides which extensions
    /// it accepts.
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<Value, Error>;
    async fn get_file(&self, bucket_id: &str, file_id: &str) -> Result<Value, Error>;
    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(Error::InvalidDocument)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(Error::InvalidDocument)
}

/// Page size used when walking a whole result set.
const PAGE_SIZE: u32 = 100;

fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Store { backend }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Document<T>, Error> {
        decode(self.backend.get_document(collection, id).await?)
    }

    async fn create<T: Serialize + DeserializeOwned>(
        &self,
        collection: &str,
        data: &T,
    ) -> Result<Document<T>, Error> {
        let id = unique_id();
        let created = self
            .backend
            .create_document(collection, &id, encode(data)?)
            .await?;
        event!(Level::DEBUG, collection, id = %id, "document created");
        decode(created)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> Result<DocumentList<Document<T>>, Error> {
        let list = self.backend.list_documents(collection, queries).await?;
        let documents = list
            .documents
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentList {
            total: list.total,
            documents,
        })
    }

    /// Every matching document. The platform caps a single list call, so
    /// this keeps requesting pages until `total` is reached.
    async fn list_all<T: DeserializeOwned>(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> Result<DocumentList<Document<T>>, Error> {
        let mut documents = Vec::new();
        loop {
            let mut page_queries = queries.to_vec();
            page_queries.push(Query::limit(PAGE_SIZE));
            page_queries.push(Query::offset(documents.len() as u32));
            let page = self.list::<T>(collection, &page_queries).await?;
            let fetched = page.documents.len();
            documents.extend(page.documents);
            if fetched == 0 || documents.len() as u64 >= page.total {
                return Ok(DocumentList {
                    total: page.total,
                    documents,
                });
            }
        }
    }

    // Questions

    pub async fn get_question(&self, id: &QuestionId) -> Result<Document<Question>, Error> {
        self.fetch(QUESTIONS, &id.0).await
    }

    pub async fn add_question(&self, question: Question) -> Result<Document<Question>, Error> {
        self.create(QUESTIONS, &question).await
    }

    /// Newest first, optionally narrowed to one tag.
    pub async fn list_questions(
        &self,
        pagination: Pagination,
        tag: Option<&str>,
    ) -> Result<DocumentList<Document<Question>>, Error> {
        let mut queries = vec![Query::order_desc("$createdAt")];
        if let Some(tag) = tag {
            queries.push(Query::contains("tags", tag));
        }
        if let Some(limit) = pagination.limit {
            queries.push(Query::limit(limit));
        }
        if pagination.offset > 0 {
            queries.push(Query::offset(pagination.offset));
        }
        self.list(QUESTIONS, &queries).await
    }

    /// Partial update; fields not in `update` keep their stored value.
    pub async fn update_question(
        &self,
        id: &QuestionId,
        update: &QuestionUpdate,
    ) -> Result<Document<Question>, Error> {
        let updated = self
            .backend
            .update_document(QUESTIONS, &id.0, encode(update)?)
            .await?;
        decode(updated)
    }

    pub async fn set_best_answer(
        &self,
        question_id: &QuestionId,
        answer_id: &AnswerId,
    ) -> Result<Document<Question>, Error> {
        let updated = self
            .backend
            .update_document(QUESTIONS, &question_id.0, json!({ "bestAnswerId": answer_id }))
            .await?;
        decode(updated)
    }

    // Answers

    pub async fn get_answer(&self, id: &AnswerId) -> Result<Document<Answer>, Error> {
        self.fetch(ANSWERS, &id.0).await
    }

    pub async fn add_answer(&self, answer: Answer) -> Result<Document<Answer>, Error> {
        self.create(ANSWERS, &answer).await
    }

    pub async fn delete_answer(&self, id: &AnswerId) -> Result<(), Error> {
        self.backend.delete_document(ANSWERS, &id.0).await
    }

    pub async fn answers_for(
        &self,
        question_id: &QuestionId,
    ) -> Result<DocumentList<Document<Answer>>, Error> {
        self.list_all(
            ANSWERS,
            &[
                Query::equal("questionId", question_id.0.as_str()),
                Query::order_desc("$createdAt"),
            ],
        )
        .await
    }

    // Comments

    pub async fn get_comment(&self, id: &CommentId) -> Result<Document<Comment>, Error> {
        self.fetch(COMMENTS, &id.0).await
    }

    pub async fn add_comment(&self, comment: Comment) -> Result<Document<Comment>, Error> {
        self.create(COMMENTS, &comment).await
    }

    pub async fn delete_comment(&self, id: &CommentId) -> Result<(), Error> {
        self.backend.delete_document(COMMENTS, &id.0).await
    }

    pub async fn comments_for(
        &self,
        target: &Target,
    ) -> Result<DocumentList<Document<Comment>>, Error> {
        self.list_all(
            COMMENTS,
            &[
                Query::equal("type", target.kind.as_str()),
                Query::equal("typeId", target.id.as_str()),
                Query::order_desc("$createdAt"),
            ],
        )
        .await
    }

    // Attachments

    pub async fn add_attachment(
        &self,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<Document<Attachment>, Error> {
        let id = unique_id();
        let file = self
            .backend
            .create_file(ATTACHMENT_BUCKET, &id, filename, contents)
            .await?;
        event!(Level::DEBUG, id = %id, filename, "attachment stored");
        decode(file)
    }

    pub async fn get_attachment(&self, id: &str) -> Result<Document<Attachment>, Error> {
        decode(self.backend.get_file(ATTACHMENT_BUCKET, id).await?)
    }

    pub async fn delete_attachment(&self, id: &str) -> Result<(), Error> {
        self.backend.delete_file(ATTACHMENT_BUCKET, id).await
    }

    // Votes

    /// The voter's vote on `target`, if any. When the vote race has left
    /// duplicates behind, the first one listed wins.
    pub async fn find_vote(
        &self,
        voter: &UserId,
        target: &Target,
    ) -> Result<Option<Document<Vote>>, Error> {
        let list = self
            .list::<Vote>(
                VOTES,
                &[
                    Query::equal("type", target.kind.as_str()),
                    Query::equal("typeId", target.id.as_str()),
                    Query::equal("votedById", voter.0.as_str()),
                ],
            )
            .await?;
        if list.documents.len() > 1 {
            event!(
                Level::WARN,
                voter = %voter,
                target = %target.id,
                count = list.documents.len(),
                "duplicate votes for one voter"
            );
        }
        Ok(list.documents.into_iter().next())
    }

    pub async fn add_vote(&self, vote: Vote) -> Result<Document<Vote>, Error> {
        self.create(VOTES, &vote).await
    }

    pub async fn update_vote_status(
        &self,
        id: &str,
        status: VoteStatus,
    ) -> Result<Document<Vote>, Error> {
        let updated = self
            .backend
            .update_document(VOTES, id, json!({ "voteStatus": status }))
            .await?;
        decode(updated)
    }

    pub async fn delete_vote(&self, id: &str) -> Result<(), Error> {
        self.backend.delete_document(VOTES, id).await
    }

    pub async fn count_votes(&self, target: &Target, status: VoteStatus) -> Result<u64, Error> {
        let list = self
            .backend
            .list_documents(
                VOTES,
                &[
                    Query::equal("type", target.kind.as_str()),
                    Query::equal("typeId", target.id.as_str()),
                    Query::equal("voteStatus", status.as_str()),
                    Query::limit(1),
                ],
            )
            .await?;
        Ok(list.total)
    }

    /// Upvotes minus downvotes.
    ///
    /// Both counts come from the platform's list `total`, which Appwrite stops
    /// counting at 5000 matches by default; past that the score saturates.
    pub async fn score(&self, target: &Target) -> Result<i64, Error> {
        let (up, down) = tokio::try_join!(
            self.count_votes(target, VoteStatus::Upvoted),
            self.count_votes(target, VoteStatus::Downvoted),
        )?;
        Ok(up as i64 - down as i64)
    }

    // Users

    pub async fn get_user(&self, id: &UserId) -> Result<Account, Error> {
        decode(self.backend.get_user(&id.0).await?)
    }

    pub async fn account_from_jwt(&self, jwt: &str) -> Result<Account, Error> {
        decode(self.backend.account_from_jwt(jwt).await?)
    }

    pub async fn reputation(&self, id: &UserId) -> Result<i64, Error> {
        let prefs = self.backend.get_prefs(&id.0).await?;
        Ok(prefs.get("reputation").and_then(reputation_value).unwrap_or(0))
    }

    /// Writes the reputation while keeping every other preference.
    pub async fn set_reputation(&self, id: &UserId, reputation: i64) -> Result<(), Error> {
        let mut prefs = self.backend.get_prefs(&id.0).await?;
        match prefs.as_object_mut() {
            Some(map) => {
                map.insert("reputation".to_string(), json!(reputation));
            }
            None => prefs = json!({ "reputation": reputation }),
        }
        self.backend.update_prefs(&id.0, prefs).await?;
        Ok(())
    }

    /// Read-modify-write; concurrent adjustments can lose updates.
    pub async fn adjust_reputation(&self, id: &UserId, delta: i64) -> Result<i64, Error> {
        let reputation = self.reputation(id).await? + delta;
        self.set_reputation(id, reputation).await?;
        event!(Level::INFO, user = %id, delta, reputation, "reputation changed");
        Ok(reputation)
    }
}
