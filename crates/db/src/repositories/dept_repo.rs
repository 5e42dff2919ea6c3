//! Repository for the `sys_dept` table.

use keystone_core::scope::ScopeFilter;
use sqlx::{PgExecutor, PgPool};

use crate::filter::Conditions;
use crate::models::base::BaseFields;
use crate::models::dept::{Dept, DeptRef, SaveDept};

const COLUMNS: &str = "id, creator_id, create_time, update_id, update_time, \
                       name, parent_id, level, sort";

/// Provides tree queries and CRUD for departments.
pub struct DeptRepo;

impl DeptRepo {
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Dept>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sys_dept WHERE id = $1");
        sqlx::query_as::<_, Dept>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The department followed by all of its descendants, shallowest first.
    ///
    /// Empty when `id` does not exist.
    pub async fn descendants(pool: &PgPool, id: &str) -> Result<Vec<DeptRef>, sqlx::Error> {
        sqlx::query_as::<_, DeptRef>(
            "WITH RECURSIVE subtree AS (
                 SELECT id, name, sort, 0 AS depth FROM sys_dept WHERE id = $1
                 UNION ALL
                 SELECT d.id, d.name, d.sort, s.depth + 1
                 FROM sys_dept d
                 JOIN subtree s ON d.parent_id = s.id
             )
             SELECT id, name FROM subtree ORDER BY depth, sort, id",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    /// Strict ancestors of the department, root first.
    pub async fn ancestors(pool: &PgPool, id: &str) -> Result<Vec<DeptRef>, sqlx::Error> {
        Ok(Self::ancestor_rows(pool, id)
            .await?
            .into_iter()
            .map(|d| DeptRef {
                id: d.base.id,
                name: d.name,
            })
            .collect())
    }

    /// Full rows of the strict ancestors, root first.
    pub async fn ancestor_rows(pool: &PgPool, id: &str) -> Result<Vec<Dept>, sqlx::Error> {
        let query = format!(
            "WITH RECURSIVE chain AS (
                 SELECT {COLUMNS} FROM sys_dept WHERE id = $1
                 UNION ALL
                 SELECT d.id, d.creator_id, d.create_time, d.update_id, d.update_time,
                        d.name, d.parent_id, d.level, d.sort
                 FROM sys_dept d
                 JOIN chain c ON d.id = c.parent_id
             )
             SELECT {COLUMNS} FROM chain WHERE id <> $1 ORDER BY level, parent_id"
        );
        sqlx::query_as::<_, Dept>(&query)
            .bind(id)
            .fetch_all(pool)
            .await
    }

    /// All departments passing `filter`, ordered for tree building.
    pub async fn list(pool: &PgPool, filter: &ScopeFilter) -> Result<Vec<Dept>, sqlx::Error> {
        let mut conditions = Conditions::new(format!("SELECT {COLUMNS} FROM sys_dept"));
        conditions.scope(filter);
        conditions.tail().push(" ORDER BY level, parent_id, sort");
        conditions
            .into_builder()
            .build_query_as::<Dept>()
            .fetch_all(pool)
            .await
    }

    /// Whether a sibling under `parent_id` already uses `name`.
    pub async fn name_taken(
        pool: &PgPool,
        name: &str,
        parent_id: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM sys_dept
                 WHERE name = $1 AND parent_id = $2 AND ($3::varchar IS NULL OR id <> $3)
             )",
        )
        .bind(name)
        .bind(parent_id)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    pub async fn has_children(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sys_dept WHERE parent_id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn create(
        pool: &PgPool,
        base: &BaseFields,
        input: &SaveDept,
        level: i32,
    ) -> Result<Dept, sqlx::Error> {
        let query = format!(
            "INSERT INTO sys_dept (id, creator_id, name, parent_id, level, sort)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Dept>(&query)
            .bind(&base.id)
            .bind(&base.creator_id)
            .bind(&input.name)
            .bind(&input.parent_id)
            .bind(level)
            .bind(input.sort)
            .fetch_one(pool)
            .await
    }

    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        executor: impl PgExecutor<'_>,
        id: &str,
        input: &SaveDept,
        level: i32,
        updater: Option<&str>,
    ) -> Result<Option<Dept>, sqlx::Error> {
        let query = format!(
            "UPDATE sys_dept SET
                name = $2,
                parent_id = $3,
                level = $4,
                sort = $5,
                update_id = $6,
                update_time = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Dept>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.parent_id)
            .bind(level)
            .bind(input.sort)
            .bind(updater)
            .fetch_optional(executor)
            .await
    }

    /// Update `id` at `level` and shift its subtree by `delta` levels in one
    /// transaction. Returns `None` and changes nothing when `id` is missing.
    pub async fn move_to(
        pool: &PgPool,
        id: &str,
        input: &SaveDept,
        level: i32,
        delta: i32,
        updater: Option<&str>,
    ) -> Result<Option<Dept>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let Some(updated) = Self::update(&mut *tx, id, input, level, updater).await? else {
            return Ok(None);
        };
        Self::shift_descendant_levels(&mut *tx, id, delta).await?;
        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Shift the levels of every strict descendant of `id` by `delta`.
    pub async fn shift_descendant_levels(
        executor: impl PgExecutor<'_>,
        id: &str,
        delta: i32,
    ) -> Result<u64, sqlx::Error> {
        if delta == 0 {
            return Ok(0);
        }
        let result = sqlx::query(
            "WITH RECURSIVE subtree AS (
                 SELECT id FROM sys_dept WHERE parent_id = $1
                 UNION ALL
                 SELECT d.id FROM sys_dept d JOIN subtree s ON d.parent_id = s.id
             )
             UPDATE sys_dept SET level = level + $2 WHERE id IN (SELECT id FROM subtree)",
        )
        .bind(id)
        .bind(delta)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sys_dept WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
