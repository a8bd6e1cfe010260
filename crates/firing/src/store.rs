//! The message-service collaborator consumed by the exercise generator.

use async_trait::async_trait;

use navwarn_core::types::DbId;
use navwarn_db::models::message::{CreateMessage, MessageStatus, MessageWithAreas};
use navwarn_db::repositories::MessageRepo;
use navwarn_db::DbPool;

use crate::error::FiringError;

/// Message persistence as seen by the exercise generator: create, status
/// transition and published-message search. The generator only consumes
/// this contract, which keeps it testable against an in-memory fake.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, input: CreateMessage) -> Result<MessageWithAreas, FiringError>;

    async fn update_status(&self, uid: &str, status: MessageStatus) -> Result<bool, FiringError>;

    async fn search_published(
        &self,
        domain_id: DbId,
        series_id: Option<&str>,
        area_ids: &[DbId],
    ) -> Result<Vec<MessageWithAreas>, FiringError>;
}

/// [`MessageStore`] backed by the `messages` tables.
pub struct PgMessageStore {
    pool: DbPool,
}

impl PgMessageStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create_message(&self, input: CreateMessage) -> Result<MessageWithAreas, FiringError> {
        Ok(MessageRepo::create(&self.pool, &input).await?)
    }

    async fn update_status(&self, uid: &str, status: MessageStatus) -> Result<bool, FiringError> {
        Ok(MessageRepo::update_status(&self.pool, uid, status).await?)
    }

    async fn search_published(
        &self,
        domain_id: DbId,
        series_id: Option<&str>,
        area_ids: &[DbId],
    ) -> Result<Vec<MessageWithAreas>, FiringError> {
        Ok(MessageRepo::search_published(&self.pool, domain_id, series_id, area_ids).await?)
    }
}
