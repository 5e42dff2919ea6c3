//! Repository for the append-only `sys_log` table.

use keystone_core::types::new_id;
use sqlx::PgPool;

use crate::models::log::{AuditLog, NewAuditLog};

const COLUMNS: &str = "id, ip, title, log_type, method, url, info, state, creator_id, create_time";

pub struct LogRepo;

impl LogRepo {
    pub async fn insert(pool: &PgPool, entry: &NewAuditLog) -> Result<AuditLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO sys_log (id, ip, title, log_type, method, url, info, state, creator_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(new_id())
            .bind(&entry.ip)
            .bind(&entry.title)
            .bind(&entry.log_type)
            .bind(&entry.method)
            .bind(&entry.url)
            .bind(&entry.info)
            .bind(&entry.state)
            .bind(&entry.creator_id)
            .fetch_one(pool)
            .await
    }
}
