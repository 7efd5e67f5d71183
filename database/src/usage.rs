use crate::Database;
use commentquick_core::{CoreError, DatabaseError, QuotaError, UsageSnapshot};
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Lifetime reply counter per identity. Reservation is one conditional
/// increment inside the store, so concurrent requests for the same identity
/// serialize here and can never jointly pass the ceiling.
#[derive(Debug, Clone)]
pub struct UsageStore {
    pool: SqlitePool,
    ceiling: i64,
}

impl UsageStore {
    pub fn new(database: &Database, ceiling: i64) -> Self {
        Self {
            pool: database.pool().clone(),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    /// Reserves `count` replies against the identity's lifetime ceiling,
    /// creating the counter row at zero on first use. Rejection leaves the
    /// counter untouched.
    pub async fn reserve(&self, user_id: &str, count: i64) -> Result<(), CoreError> {
        if count <= 0 {
            return Err(CoreError::InvalidInput {
                message: format!("reservation count must be positive, got {}", count),
            });
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed {
                reason: e.to_string(),
            })?;

        sqlx::query(
            "INSERT INTO user_usage (user_id, total_replies_generated) VALUES (?1, 0) \
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Sql)?;

        let updated = sqlx::query(
            "UPDATE user_usage \
             SET total_replies_generated = total_replies_generated + ?2, \
                 updated_at = datetime('now') \
             WHERE user_id = ?1 AND total_replies_generated + ?2 <= ?3",
        )
        .bind(user_id)
        .bind(count)
        .bind(self.ceiling)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Sql)?
        .rows_affected();

        if updated == 0 {
            let used: i64 = sqlx::query_scalar(
                "SELECT total_replies_generated FROM user_usage WHERE user_id = ?1",
            )
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::Sql)?
            .unwrap_or(0);

            if let Err(e) = tx.rollback().await {
                warn!("Failed to roll back rejected reservation: {}", e);
            }
            return Err(CoreError::Quota(QuotaError::LimitExceeded {
                used,
                requested: count,
                limit: self.ceiling,
            }));
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed {
                reason: e.to_string(),
            })?;
        debug!("Reserved {} replies for {}", count, user_id);
        Ok(())
    }

    /// Settles a reservation once the model has delivered. When fewer
    /// replies came back than were reserved, the difference is returned to
    /// the identity; the counter never stays ahead of what was delivered.
    pub async fn commit(
        &self,
        user_id: &str,
        reserved: i64,
        delivered: i64,
    ) -> Result<(), CoreError> {
        if delivered < reserved {
            self.decrement(user_id, reserved - delivered).await?;
        }
        debug!(
            "Committed {} of {} reserved replies for {}",
            delivered, reserved, user_id
        );
        Ok(())
    }

    /// Returns a whole reservation after a failed generation.
    pub async fn release(&self, user_id: &str, reserved: i64) -> Result<(), CoreError> {
        self.decrement(user_id, reserved).await
    }

    async fn decrement(&self, user_id: &str, amount: i64) -> Result<(), CoreError> {
        if amount <= 0 {
            return Ok(());
        }
        sqlx::query(
            "UPDATE user_usage \
             SET total_replies_generated = MAX(total_replies_generated - ?2, 0), \
                 updated_at = datetime('now') \
             WHERE user_id = ?1",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        Ok(())
    }

    /// Current counter value and ceiling for display.
    pub async fn usage(&self, user_id: &str) -> Result<UsageSnapshot, CoreError> {
        let used: Option<i64> = sqlx::query_scalar(
            "SELECT total_replies_generated FROM user_usage WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;

        Ok(UsageSnapshot {
            used: used.unwrap_or(0),
            limit: self.ceiling,
        })
    }
}
