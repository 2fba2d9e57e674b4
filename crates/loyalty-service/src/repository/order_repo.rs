//! 订单仓储

use accrual_worker::OrderNumber;
use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::OrderRepositoryTrait;
use crate::error::{ApiError, Result};
use crate::models::{Order, OrderRow, OrderUpload};

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    async fn upload(&self, login: &str, number: OrderNumber) -> Result<OrderUpload> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (number, login)
            VALUES ($1, $2)
            ON CONFLICT (number) DO NOTHING
            "#,
        )
        .bind(number)
        .bind(login)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(OrderUpload::Created);
        }

        let owner: String = sqlx::query_scalar("SELECT login FROM orders WHERE number = $1")
            .bind(number)
            .fetch_one(&self.pool)
            .await?;

        Ok(if owner == login {
            OrderUpload::AlreadyUploaded
        } else {
            OrderUpload::OwnedByAnother
        })
    }

    async fn list_by_user(&self, login: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT number, login, status, accrual, credited, uploaded_at
            FROM orders
            WHERE login = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(login)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Order::try_from(row).map_err(ApiError::Internal))
            .collect()
    }
}
