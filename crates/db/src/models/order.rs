use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::{ledger_entry, order};

pub const ORDER_STATUS_CREATED: &str = "created";

#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Order not found")]
    OrderNotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub order_id: i64,
    pub status: String,
    pub customer_id: String,
    pub item_id: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated, normalized order payload. Field values are exactly what the
/// request fingerprint is computed over; transport metadata never enters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub customer_id: String,
    pub item_id: String,
    pub quantity: i32,
}

impl Order {
    fn from_model(model: order::Model) -> Self {
        Self {
            order_id: model.id,
            status: model.status,
            customer_id: model.customer_id,
            item_id: model.item_id,
            quantity: model.quantity,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateOrder) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = order::ActiveModel {
            status: Set(ORDER_STATUS_CREATED.to_string()),
            customer_id: Set(data.customer_id.clone()),
            item_id: Set(data.item_id.clone()),
            quantity: Set(data.quantity),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<Self>, DbErr> {
        let record = order::Entity::find()
            .filter(order::Column::Id.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn get<C: ConnectionTrait>(db: &C, id: i64) -> Result<Self, OrderError> {
        Self::find_by_id(db, id)
            .await?
            .ok_or(OrderError::OrderNotFound)
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        order::Entity::find().count(db).await
    }

    /// An order exclusively owns its ledger entry: both rows are removed
    /// together. Callers are expected to pass a transaction.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        ledger_entry::Entity::delete_many()
            .filter(ledger_entry::Column::OrderId.eq(id))
            .exec(db)
            .await?;
        let result = order::Entity::delete_many()
            .filter(order::Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_db;

    fn sample_order() -> CreateOrder {
        CreateOrder {
            customer_id: "c1".to_string(),
            item_id: "i1".to_string(),
            quantity: 3,
        }
    }

    #[tokio::test]
    async fn create_assigns_monotonic_ids_and_created_status() {
        let (db, db_path) = test_db::connect().await;

        let first = Order::create(&db.pool, &sample_order()).await.unwrap();
        let second = Order::create(&db.pool, &sample_order()).await.unwrap();
        assert_eq!(first.status, ORDER_STATUS_CREATED);
        assert!(second.order_id > first.order_id);

        let found = Order::find_by_id(&db.pool, first.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.customer_id, "c1");
        assert_eq!(found.item_id, "i1");
        assert_eq!(found.quantity, 3);

        drop(db);
        test_db::cleanup(db_path);
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_unknown_order() {
        let (db, db_path) = test_db::connect().await;

        assert!(Order::find_by_id(&db.pool, 42).await.unwrap().is_none());

        drop(db);
        test_db::cleanup(db_path);
    }
}
