//! Repository for the `sys_menu` table.

use sqlx::PgPool;

use crate::filter::Conditions;
use crate::models::base::BaseFields;
use crate::models::menu::{Menu, MenuQuery, SaveMenu};

const COLUMNS: &str = "m.id, m.creator_id, m.create_time, m.update_id, m.update_time, \
                       m.parent_id, m.name, m.sort, m.url, m.path, m.menu_type, m.state, \
                       m.perms, m.visible, m.icon, m.active_menu, m.is_frame, m.remark";

/// Provides tree queries and CRUD for menus.
pub struct MenuRepo;

impl MenuRepo {
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Menu>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sys_menu m WHERE m.id = $1");
        sqlx::query_as::<_, Menu>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Menus matching `query`, ordered for tree building.
    pub async fn list(pool: &PgPool, query: &MenuQuery) -> Result<Vec<Menu>, sqlx::Error> {
        let mut conditions = match &query.role_id {
            Some(role_id) => {
                let mut c = Conditions::new(format!(
                    "SELECT {COLUMNS} FROM sys_menu m JOIN sys_role_menu rm ON rm.menu_id = m.id"
                ));
                c.and().push("rm.role_id = ").push_bind(role_id.clone());
                c
            }
            None => Conditions::new(format!("SELECT {COLUMNS} FROM sys_menu m")),
        };
        conditions.contains("m.name", query.name.as_deref());
        if let Some(state) = query.state.filter(|s| *s != 0) {
            conditions.and().push("m.state = ").push_bind(state);
        }
        conditions.tail().push(" ORDER BY m.parent_id, m.sort");
        conditions
            .into_builder()
            .build_query_as::<Menu>()
            .fetch_all(pool)
            .await
    }

    /// Enabled directories and pages linked to a role, for the router view.
    pub async fn routable_for_role(pool: &PgPool, role_id: &str) -> Result<Vec<Menu>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sys_menu m
             JOIN sys_role_menu rm ON rm.menu_id = m.id
             WHERE rm.role_id = $1 AND m.menu_type IN ('M', 'C') AND m.state = 1
             ORDER BY m.parent_id, m.sort"
        );
        sqlx::query_as::<_, Menu>(&query)
            .bind(role_id)
            .fetch_all(pool)
            .await
    }

    /// The menu followed by all of its descendants.
    pub async fn subtree_ids(pool: &PgPool, id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "WITH RECURSIVE subtree AS (
                 SELECT id FROM sys_menu WHERE id = $1
                 UNION ALL
                 SELECT m.id FROM sys_menu m JOIN subtree s ON m.parent_id = s.id
             )
             SELECT id FROM subtree",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    pub async fn name_taken(
        pool: &PgPool,
        name: &str,
        parent_id: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM sys_menu
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
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sys_menu WHERE parent_id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Insert a menu under `parent_id` (already normalized).
    pub async fn create(
        pool: &PgPool,
        base: &BaseFields,
        parent_id: &str,
        input: &SaveMenu,
    ) -> Result<Menu, sqlx::Error> {
        let query = format!(
            "INSERT INTO sys_menu AS m
                 (id, creator_id, parent_id, name, sort, url, path, menu_type, state,
                  perms, visible, icon, active_menu, is_frame, remark)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Menu>(&query)
            .bind(&base.id)
            .bind(&base.creator_id)
            .bind(parent_id)
            .bind(&input.name)
            .bind(input.sort)
            .bind(&input.url)
            .bind(&input.path)
            .bind(&input.menu_type)
            .bind(input.state)
            .bind(&input.perms)
            .bind(input.visible)
            .bind(&input.icon)
            .bind(&input.active_menu)
            .bind(input.is_frame)
            .bind(&input.remark)
            .fetch_one(pool)
            .await
    }

    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: &str,
        parent_id: &str,
        input: &SaveMenu,
        updater: Option<&str>,
    ) -> Result<Option<Menu>, sqlx::Error> {
        let query = format!(
            "UPDATE sys_menu AS m SET
                parent_id = $2, name = $3, sort = $4, url = $5, path = $6,
                menu_type = $7, state = $8, perms = $9, visible = $10, icon = $11,
                active_menu = $12, is_frame = $13, remark = $14,
                update_id = $15, update_time = NOW()
             WHERE m.id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Menu>(&query)
            .bind(id)
            .bind(parent_id)
            .bind(&input.name)
            .bind(input.sort)
            .bind(&input.url)
            .bind(&input.path)
            .bind(&input.menu_type)
            .bind(input.state)
            .bind(&input.perms)
            .bind(input.visible)
            .bind(&input.icon)
            .bind(&input.active_menu)
            .bind(input.is_frame)
            .bind(&input.remark)
            .bind(updater)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sys_menu WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
