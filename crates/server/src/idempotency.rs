use axum::http::HeaderMap;
use db::{
    DbErr, DbPool, SqlErr, TransactionTrait,
    models::{
        idempotency::{self, BeginOutcome, IdempotencyRecord},
        ledger::LedgerEntry,
        order::{CreateOrder, Order},
    },
};
use serde_json::{Value, json};

use crate::error::ApiError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
/// Debug-only fault injection: forces a failure after the commit so the
/// retry-and-replay path can be exercised. Never alters durable state.
pub const DEBUG_FAIL_AFTER_COMMIT_HEADER: &str = "X-Debug-Fail-After-Commit";

pub fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn fail_after_commit(headers: &HeaderMap) -> bool {
    headers
        .get(DEBUG_FAIL_AFTER_COMMIT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Two-phase result of an idempotent create. `Created` means this attempt
/// committed the order; `Replayed` means the cached response of an earlier
/// commit is being served. Whether the response is then delivered is a
/// separate concern and never undoes the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { response_body: Value },
    Replayed { response_code: i32, response_body: Value },
}

/// Runs the whole first-sight path in one transaction: reserve the key,
/// insert the order and its ledger entry, cache the response on the marker,
/// commit. Any failure before the commit drops the transaction, which also
/// rolls the `in_process` marker back out of existence, so the key stays
/// retryable.
pub async fn create_order_idempotent(
    pool: &DbPool,
    key: &str,
    payload: &CreateOrder,
    fingerprint: &str,
) -> Result<CreateOutcome, ApiError> {
    let tx = pool.begin().await?;

    let outcome = match idempotency::begin(&tx, key, fingerprint).await {
        Ok(outcome) => outcome,
        Err(err) => {
            // Another attempt won the insert race on the key's unique index.
            // This transaction cannot see the winner's row; classify from a
            // fresh read outside it.
            tx.rollback().await?;
            return classify_insert_race(pool, key, fingerprint, err).await;
        }
    };

    match outcome {
        BeginOutcome::Began => {
            let order = Order::create(&tx, payload).await?;
            LedgerEntry::create(&tx, order.order_id).await?;
            let response_body = json!({"order_id": order.order_id, "status": "created"});
            idempotency::complete(&tx, key, 201, response_body.to_string()).await?;
            tx.commit().await?;
            Ok(CreateOutcome::Created { response_body })
        }
        BeginOutcome::HashMismatch => {
            tx.rollback().await?;
            Err(ApiError::PayloadMismatch)
        }
        BeginOutcome::InProgress => {
            tx.rollback().await?;
            Err(ApiError::RequestInProgress)
        }
        BeginOutcome::Replay {
            response_code,
            response_body,
        } => {
            tx.rollback().await?;
            replayed(response_code, &response_body)
        }
    }
}

async fn classify_insert_race(
    pool: &DbPool,
    key: &str,
    fingerprint: &str,
    err: DbErr,
) -> Result<CreateOutcome, ApiError> {
    if let Some(record) = IdempotencyRecord::find_by_key(pool, key).await? {
        return match record.classify(fingerprint)? {
            BeginOutcome::HashMismatch => Err(ApiError::PayloadMismatch),
            BeginOutcome::InProgress => Err(ApiError::RequestInProgress),
            BeginOutcome::Replay {
                response_code,
                response_body,
            } => replayed(response_code, &response_body),
            BeginOutcome::Began => Err(ApiError::InsertRaceConflict),
        };
    }

    if is_contention_err(&err) {
        // The winner has not committed yet; its row is not visible.
        tracing::debug!(key, "Lost idempotency insert race to an uncommitted attempt");
        return Err(ApiError::InsertRaceConflict);
    }

    Err(ApiError::Database(err))
}

fn replayed(response_code: i32, response_body: &str) -> Result<CreateOutcome, ApiError> {
    let response_body: Value = serde_json::from_str(response_body)
        .map_err(|err| ApiError::Internal(format!("Failed to parse cached response: {err}")))?;
    Ok(CreateOutcome::Replayed {
        response_code,
        response_body,
    })
}

fn is_contention_err(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string();
    message.contains("database is locked") || message.contains("database is busy")
}
