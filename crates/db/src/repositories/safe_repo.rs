//! Repository for the single-row `sys_safe` table.

use sqlx::PgPool;

use crate::models::base::BaseFields;
use crate::models::safe::{SafetyPolicy, SaveSafetyPolicy};

const COLUMNS: &str = "id, creator_id, create_time, update_id, update_time, \
                       pwd_cycle, pwd_login_limit, idle_time_setting";

pub struct SafeRepo;

impl SafeRepo {
    /// The current policy, or `None` before one has been saved.
    pub async fn get(pool: &PgPool) -> Result<Option<SafetyPolicy>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sys_safe ORDER BY create_time LIMIT 1");
        sqlx::query_as::<_, SafetyPolicy>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Update the existing policy row, inserting one if none exists.
    pub async fn save(
        pool: &PgPool,
        input: &SaveSafetyPolicy,
        actor: Option<&str>,
    ) -> Result<SafetyPolicy, sqlx::Error> {
        if let Some(current) = Self::get(pool).await? {
            let query = format!(
                "UPDATE sys_safe SET
                    pwd_cycle = $2,
                    pwd_login_limit = $3,
                    idle_time_setting = $4,
                    update_id = $5,
                    update_time = NOW()
                 WHERE id = $1
                 RETURNING {COLUMNS}"
            );
            return sqlx::query_as::<_, SafetyPolicy>(&query)
                .bind(&current.base.id)
                .bind(input.pwd_cycle)
                .bind(input.pwd_login_limit)
                .bind(input.idle_time_setting)
                .bind(actor)
                .fetch_one(pool)
                .await;
        }

        let base = BaseFields::created_by(actor);
        let query = format!(
            "INSERT INTO sys_safe (id, creator_id, pwd_cycle, pwd_login_limit, idle_time_setting)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SafetyPolicy>(&query)
            .bind(&base.id)
            .bind(&base.creator_id)
            .bind(input.pwd_cycle)
            .bind(input.pwd_login_limit)
            .bind(input.idle_time_setting)
            .fetch_one(pool)
            .await
    }
}
