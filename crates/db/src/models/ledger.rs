use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::ledger_entry;

/// Immutable audit companion of an order. The unique index on `order_id`
/// guarantees no order ever gets a second entry.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub order_id: i64,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn from_model(model: ledger_entry::Model) -> Self {
        Self {
            id: model.uuid,
            order_id: model.order_id,
            created_at: model.created_at.into(),
        }
    }

    /// Must run in the same transaction as the order insert it audits.
    pub async fn create<C: ConnectionTrait>(db: &C, order_id: i64) -> Result<Self, DbErr> {
        let active = ledger_entry::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_by_order_id<C: ConnectionTrait>(
        db: &C,
        order_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        let record = ledger_entry::Entity::find()
            .filter(ledger_entry::Column::OrderId.eq(order_id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        ledger_entry::Entity::find().count(db).await
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::TransactionTrait;

    use super::*;
    use crate::models::{
        order::{CreateOrder, Order},
        test_db,
    };

    async fn create_order(db: &crate::DbPool) -> Order {
        Order::create(
            db,
            &CreateOrder {
                customer_id: "c1".to_string(),
                item_id: "i1".to_string(),
                quantity: 1,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn one_entry_per_order_is_enforced() {
        let (db, db_path) = test_db::connect().await;

        let order = create_order(&db.pool).await;
        LedgerEntry::create(&db.pool, order.order_id).await.unwrap();

        let err = LedgerEntry::create(&db.pool, order.order_id).await;
        assert!(err.is_err());
        assert_eq!(LedgerEntry::count(&db.pool).await.unwrap(), 1);

        drop(db);
        test_db::cleanup(db_path);
    }

    #[tokio::test]
    async fn deleting_an_order_removes_its_ledger_entry() {
        let (db, db_path) = test_db::connect().await;

        let order = create_order(&db.pool).await;
        LedgerEntry::create(&db.pool, order.order_id).await.unwrap();

        let tx = db.pool.begin().await.unwrap();
        let removed = Order::delete(&tx, order.order_id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(removed, 1);
        assert!(
            LedgerEntry::find_by_order_id(&db.pool, order.order_id)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(Order::count(&db.pool).await.unwrap(), 0);

        drop(db);
        test_db::cleanup(db_path);
    }
}
