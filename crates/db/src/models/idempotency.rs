use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};

use crate::entities::idempotency_record;

pub const IDEMPOTENCY_STATUS_IN_PROCESS: &str = "in_process";
pub const IDEMPOTENCY_STATUS_COMPLETED: &str = "completed";

/// A durable reservation for one idempotency key. The status only ever moves
/// `in_process` -> `completed`; a completed record carries the cached response
/// that every later retry of the same request must receive verbatim.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub key: String,
    pub fingerprint: String,
    pub status: String,
    pub response_body: Option<String>,
    pub response_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// No record existed; an `in_process` marker was inserted and the caller
    /// now owns the creation attempt.
    Began,
    /// The key exists with a different payload fingerprint. Takes precedence
    /// over status.
    HashMismatch,
    /// The key exists with the same fingerprint but another attempt has not
    /// finished yet.
    InProgress,
    /// The key already completed; serve the cached response and write nothing.
    Replay {
        response_code: i32,
        response_body: String,
    },
}

impl IdempotencyRecord {
    fn from_model(model: idempotency_record::Model) -> Self {
        Self {
            key: model.key,
            fingerprint: model.fingerprint,
            status: model.status,
            response_body: model.response_body,
            response_code: model.response_code,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_by_key<C: ConnectionTrait>(
        db: &C,
        key: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = idempotency_record::Entity::find()
            .filter(idempotency_record::Column::Key.eq(key))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        idempotency_record::Entity::find().count(db).await
    }

    /// Maps an existing record to the outcome a new attempt with `fingerprint`
    /// must observe.
    pub fn classify(&self, fingerprint: &str) -> Result<BeginOutcome, DbErr> {
        if self.fingerprint != fingerprint {
            return Ok(BeginOutcome::HashMismatch);
        }
        match self.status.as_str() {
            IDEMPOTENCY_STATUS_COMPLETED => match (self.response_code, &self.response_body) {
                (Some(response_code), Some(response_body)) => Ok(BeginOutcome::Replay {
                    response_code,
                    response_body: response_body.clone(),
                }),
                _ => Err(DbErr::Custom(
                    "Idempotency record is completed but has no cached response".to_string(),
                )),
            },
            IDEMPOTENCY_STATUS_IN_PROCESS => Ok(BeginOutcome::InProgress),
            other => Err(DbErr::Custom(format!(
                "Unknown idempotency record status: {other}"
            ))),
        }
    }
}

/// Single entry point for an attempt on `key`. Either reserves the key with an
/// `in_process` marker or reports what the existing record dictates.
///
/// A lost insert race (unique index on `key`) surfaces as the underlying
/// `DbErr`; the losing transaction cannot see the winner's row, so callers
/// must re-read on a fresh connection to classify it.
pub async fn begin<C: ConnectionTrait>(
    db: &C,
    key: &str,
    fingerprint: &str,
) -> Result<BeginOutcome, DbErr> {
    if let Some(existing) = IdempotencyRecord::find_by_key(db, key).await? {
        return existing.classify(fingerprint);
    }

    let now = Utc::now();
    let active = idempotency_record::ActiveModel {
        key: Set(key.to_string()),
        fingerprint: Set(fingerprint.to_string()),
        status: Set(IDEMPOTENCY_STATUS_IN_PROCESS.to_string()),
        response_body: Set(None),
        response_code: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };
    active.insert(db).await?;
    Ok(BeginOutcome::Began)
}

/// Transitions `key` from `in_process` to `completed`, caching the response.
/// Completed is terminal; completing twice is an error, as is completing a
/// key that was never reserved. Must run inside the same transaction as the
/// resource creation it guards.
pub async fn complete<C: ConnectionTrait>(
    db: &C,
    key: &str,
    response_code: i32,
    response_body: String,
) -> Result<(), DbErr> {
    let record = idempotency_record::Entity::find()
        .filter(idempotency_record::Column::Key.eq(key))
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound(
            "Idempotency record not found".to_string(),
        ))?;

    if record.status == IDEMPOTENCY_STATUS_COMPLETED {
        return Err(DbErr::Custom(
            "Idempotency record is already completed".to_string(),
        ));
    }

    let now = Utc::now();
    let mut active: idempotency_record::ActiveModel = record.into();
    active.status = Set(IDEMPOTENCY_STATUS_COMPLETED.to_string());
    active.response_code = Set(Some(response_code));
    active.response_body = Set(Some(response_body));
    active.updated_at = Set(now.into());
    active.update(db).await?;
    Ok(())
}
