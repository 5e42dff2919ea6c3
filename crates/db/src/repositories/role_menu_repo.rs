//! Repository for the `sys_role_menu` link table.

use sqlx::PgPool;

use crate::models::role::RolePermission;

/// Role-to-menu links and the permission strings they grant.
pub struct RoleMenuRepo;

impl RoleMenuRepo {
    pub async fn menu_ids_for_role(pool: &PgPool, role_id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT menu_id FROM sys_role_menu WHERE role_id = $1 ORDER BY menu_id")
            .bind(role_id)
            .fetch_all(pool)
            .await
    }

    /// Replace the role's menu links with `menu_ids`.
    pub async fn relink(pool: &PgPool, role_id: &str, menu_ids: &[String]) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM sys_role_menu WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        if !menu_ids.is_empty() {
            sqlx::query(
                "INSERT INTO sys_role_menu (role_id, menu_id)
                 SELECT $1, m FROM UNNEST($2::varchar[]) AS m
                 ON CONFLICT DO NOTHING",
            )
            .bind(role_id)
            .bind(menu_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Non-empty permission strings of every role, ordered by menu position.
    pub async fn all_permissions(pool: &PgPool) -> Result<Vec<RolePermission>, sqlx::Error> {
        sqlx::query_as::<_, RolePermission>(
            "SELECT rm.role_id, m.perms
             FROM sys_role_menu rm
             JOIN sys_menu m ON m.id = rm.menu_id
             WHERE m.perms <> ''
             ORDER BY rm.role_id, m.parent_id, m.sort",
        )
        .fetch_all(pool)
        .await
    }

    /// Non-empty permission strings granted to one role.
    pub async fn permissions_for_role(pool: &PgPool, role_id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT m.perms
             FROM sys_role_menu rm
             JOIN sys_menu m ON m.id = rm.menu_id
             WHERE rm.role_id = $1 AND m.perms <> ''
             ORDER BY m.parent_id, m.sort",
        )
        .bind(role_id)
        .fetch_all(pool)
        .await
    }

    /// Roles linked to `menu_id`.
    pub async fn roles_for_menu(pool: &PgPool, menu_id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT role_id FROM sys_role_menu WHERE menu_id = $1 ORDER BY role_id")
            .bind(menu_id)
            .fetch_all(pool)
            .await
    }

    pub async fn menu_assigned(pool: &PgPool, menu_id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sys_role_menu WHERE menu_id = $1)")
            .bind(menu_id)
            .fetch_one(pool)
            .await
    }
}
