//! PostgreSQL 余额账本
//!
//! `credit_once` 在同一事务中完成两步：以 `credited = FALSE` 为条件翻转订单的入账标记，
//! 翻转成功后再增加余额。并发的多个入账只有一个能翻转标记，其余看到的是已入账。

use accrual_worker::{BalanceLedger, CreditResult, LedgerError, OrderNumber, OrderStatus, Points};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

pub struct PgBalanceLedger {
    pool: PgPool,
}

impl PgBalanceLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(err: sqlx::Error) -> LedgerError {
    LedgerError::Storage(err.to_string())
}

#[async_trait]
impl BalanceLedger for PgBalanceLedger {
    #[instrument(skip(self, accrual), fields(accrual = %accrual))]
    async fn credit_once(
        &self,
        user_key: &str,
        order_number: OrderNumber,
        accrual: Points,
    ) -> Result<CreditResult, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let flipped: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET credited = TRUE, accrual = $3
            WHERE number = $1 AND login = $2 AND credited = FALSE
            RETURNING number
            "#,
        )
        .bind(order_number)
        .bind(user_key)
        .bind(accrual.hundredths())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        if flipped.is_none() {
            let owner: Option<String> =
                sqlx::query_scalar("SELECT login FROM orders WHERE number = $1")
                    .bind(order_number)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(storage)?;

            return match owner {
                None => Err(LedgerError::OrderNotFound(order_number)),
                Some(owner) if owner != user_key => Err(LedgerError::OwnerMismatch {
                    order_number,
                    user_key: user_key.to_string(),
                }),
                Some(_) => {
                    debug!("订单此前已入账");
                    Ok(CreditResult::AlreadyCredited)
                }
            };
        }

        let updated = sqlx::query(
            "UPDATE user_balances SET current = current + $2 WHERE login = $1",
        )
        .bind(user_key)
        .bind(accrual.hundredths())
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected();

        if updated != 1 {
            // 事务随 tx 丢弃回滚，入账标记保持未翻转
            return Err(LedgerError::Storage(format!("用户 {user_key} 缺少余额记录")));
        }

        tx.commit().await.map_err(storage)?;
        Ok(CreditResult::Credited)
    }

    async fn update_order(
        &self,
        order_number: OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), LedgerError> {
        // 终态订单不会被覆盖；积分为 0 时保留已有值
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                accrual = CASE WHEN $3 = 0 THEN accrual ELSE $3 END
            WHERE number = $1 AND status NOT IN ('PROCESSED', 'INVALID')
            "#,
        )
        .bind(order_number)
        .bind(status.as_str())
        .bind(accrual.hundredths())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE number = $1)")
                    .bind(order_number)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(storage)?;
            if !exists {
                return Err(LedgerError::OrderNotFound(order_number));
            }
        }

        Ok(())
    }
}
