//! 余额与提现仓储
//!
//! 提现在单个事务内完成：锁定余额行、校验余额、扣减并写入提现记录。

use accrual_worker::Points;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument};

use super::traits::BalanceRepositoryTrait;
use crate::error::{ApiError, Result};
use crate::models::{Balance, WithdrawOutcome, Withdrawal};

#[derive(Debug, FromRow)]
struct WithdrawalRow {
    order_number: String,
    sum: i64,
    processed_at: DateTime<Utc>,
}

pub struct BalanceRepository {
    pool: PgPool,
}

impl BalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceRepositoryTrait for BalanceRepository {
    async fn balance(&self, login: &str) -> Result<Balance> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT current, withdrawn FROM user_balances WHERE login = $1")
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .map(|(current, withdrawn)| Balance {
                current: Points::from_hundredths(current),
                withdrawn: Points::from_hundredths(withdrawn),
            })
            .unwrap_or_default())
    }

    #[instrument(skip(self, sum), fields(sum = %sum))]
    async fn withdraw(&self, login: &str, order: &str, sum: Points) -> Result<WithdrawOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT current FROM user_balances WHERE login = $1 FOR UPDATE")
                .bind(login)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current
            .map(Points::from_hundredths)
            .ok_or_else(|| ApiError::Internal(format!("用户 {login} 缺少余额记录")))?;

        if current < sum {
            return Ok(WithdrawOutcome::InsufficientFunds);
        }

        sqlx::query(
            r#"
            UPDATE user_balances
            SET current = current - $2, withdrawn = withdrawn + $2
            WHERE login = $1
            "#,
        )
        .bind(login)
        .bind(sum.hundredths())
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO withdrawals (login, order_number, sum) VALUES ($1, $2, $3)")
            .bind(login)
            .bind(order)
            .bind(sum.hundredths())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("积分提现完成");
        Ok(WithdrawOutcome::Completed)
    }

    async fn list_withdrawals(&self, login: &str) -> Result<Vec<Withdrawal>> {
        let rows = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            SELECT order_number, sum, processed_at
            FROM withdrawals
            WHERE login = $1
            ORDER BY processed_at DESC, id DESC
            "#,
        )
        .bind(login)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Withdrawal {
                order: row.order_number,
                sum: Points::from_hundredths(row.sum),
                processed_at: row.processed_at,
            })
            .collect())
    }
}
