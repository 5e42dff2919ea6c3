//! Repository for the `sys_role` table.

use keystone_core::paging::{Page, PageParams};
use sqlx::PgPool;

use crate::filter::Conditions;
use crate::models::base::BaseFields;
use crate::models::role::{Role, RoleQuery, SaveRole};

const COLUMNS: &str = "id, creator_id, create_time, update_id, update_time, \
                       role_key, role_name, is_open, state, remark";

/// Provides CRUD operations for roles.
pub struct RoleRepo;

impl RoleRepo {
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Role>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sys_role WHERE id = $1");
        sqlx::query_as::<_, Role>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Every role, for select boxes.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Role>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sys_role ORDER BY create_time");
        sqlx::query_as::<_, Role>(&query).fetch_all(pool).await
    }

    /// One page of roles, newest first.
    pub async fn page(
        pool: &PgPool,
        query: &RoleQuery,
        params: PageParams,
    ) -> Result<Page<Role>, sqlx::Error> {
        let apply = |conditions: &mut Conditions<'_>| {
            conditions
                .contains("role_name", query.role_name.as_deref())
                .contains("role_key", query.role_key.as_deref());
        };

        let mut count = Conditions::new("SELECT COUNT(*) FROM sys_role");
        apply(&mut count);
        let total: i64 = count
            .into_builder()
            .build_query_scalar()
            .fetch_one(pool)
            .await?;

        let mut rows = Conditions::new(format!("SELECT {COLUMNS} FROM sys_role"));
        apply(&mut rows);
        rows.tail()
            .push(" ORDER BY create_time DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());
        let list = rows
            .into_builder()
            .build_query_as::<Role>()
            .fetch_all(pool)
            .await?;

        Ok(Page { list, total })
    }

    pub async fn name_taken(
        pool: &PgPool,
        role_name: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM sys_role
                 WHERE role_name = $1 AND ($2::varchar IS NULL OR id <> $2)
             )",
        )
        .bind(role_name)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    pub async fn key_taken(
        pool: &PgPool,
        role_key: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM sys_role
                 WHERE role_key = $1 AND ($2::varchar IS NULL OR id <> $2)
             )",
        )
        .bind(role_key)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        base: &BaseFields,
        input: &SaveRole,
    ) -> Result<Role, sqlx::Error> {
        let query = format!(
            "INSERT INTO sys_role (id, creator_id, role_key, role_name, is_open, state, remark)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Role>(&query)
            .bind(&base.id)
            .bind(&base.creator_id)
            .bind(&input.role_key)
            .bind(&input.role_name)
            .bind(input.is_open)
            .bind(input.state)
            .bind(&input.remark)
            .fetch_one(pool)
            .await
    }

    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: &str,
        input: &SaveRole,
        updater: Option<&str>,
    ) -> Result<Option<Role>, sqlx::Error> {
        let query = format!(
            "UPDATE sys_role SET
                role_key = $2,
                role_name = $3,
                is_open = $4,
                state = $5,
                remark = $6,
                update_id = $7,
                update_time = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Role>(&query)
            .bind(id)
            .bind(&input.role_key)
            .bind(&input.role_name)
            .bind(input.is_open)
            .bind(input.state)
            .bind(&input.remark)
            .bind(updater)
            .fetch_optional(pool)
            .await
    }

    pub async fn update_state(pool: &PgPool, id: &str, state: i32) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE sys_role SET state = $2, update_time = NOW() WHERE id = $1")
                .bind(id)
                .bind(state)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete roles and their menu links in one transaction.
    pub async fn delete_many(pool: &PgPool, ids: &[String]) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM sys_role_menu WHERE role_id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM sys_role WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
