//! Repository for the `sys_user` table.

use keystone_core::paging::{Page, PageParams};
use keystone_core::scope::ScopeFilter;
use sqlx::PgPool;

use crate::filter::Conditions;
use crate::models::base::BaseFields;
use crate::models::user::{SaveUser, UserCredentials, UserQuery, UserView};

/// Joined projection shared by every read.
const VIEW_SELECT: &str = "SELECT u.id, u.creator_id, u.create_time, u.update_id, u.update_time, \
                           u.user_name, u.real_name, u.dept_id, d.name AS dept_name, \
                           u.role_id, r.role_key, r.role_name, u.phone, u.state, u.picture";

const VIEW_FROM: &str = " FROM sys_user u \
                         LEFT JOIN sys_dept d ON d.id = u.dept_id \
                         LEFT JOIN sys_role r ON r.id = u.role_id";

/// Scoped column used by the data-scope filter on user queries.
pub const USER_DEPT_COLUMN: &str = "u.dept_id";

/// Provides lookups and CRUD for users.
pub struct UserRepo;

impl UserRepo {
    /// Find a user and password hash by username (case-sensitive).
    pub async fn find_credentials_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<UserCredentials>, sqlx::Error> {
        let query = format!("{VIEW_SELECT}, u.password{VIEW_FROM} WHERE u.user_name = $1");
        sqlx::query_as::<_, UserCredentials>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_credentials_by_id(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<UserCredentials>, sqlx::Error> {
        let query = format!("{VIEW_SELECT}, u.password{VIEW_FROM} WHERE u.id = $1");
        sqlx::query_as::<_, UserCredentials>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by id, restricted by `filter`.
    pub async fn find_by_id(
        pool: &PgPool,
        id: &str,
        filter: &ScopeFilter,
    ) -> Result<Option<UserView>, sqlx::Error> {
        let mut conditions = Conditions::new(format!("{VIEW_SELECT}{VIEW_FROM}"));
        conditions.and().push("u.id = ").push_bind(id.to_string());
        conditions.scope(filter);
        conditions
            .into_builder()
            .build_query_as::<UserView>()
            .fetch_optional(pool)
            .await
    }

    /// One page of users, newest first.
    ///
    /// `subtree` restricts results to those department ids when present.
    pub async fn page(
        pool: &PgPool,
        query: &UserQuery,
        subtree: Option<Vec<String>>,
        filter: &ScopeFilter,
        params: PageParams,
    ) -> Result<Page<UserView>, sqlx::Error> {
        let apply = |conditions: &mut Conditions<'_>| {
            conditions
                .contains("u.user_name", query.user_name.as_deref())
                .contains("u.real_name", query.real_name.as_deref());
            if let Some(ids) = subtree.clone() {
                conditions
                    .and()
                    .push("u.dept_id = ANY(")
                    .push_bind(ids)
                    .push(")");
            }
            conditions.scope(filter);
        };

        let mut count = Conditions::new(format!("SELECT COUNT(*){VIEW_FROM}"));
        apply(&mut count);
        let total: i64 = count
            .into_builder()
            .build_query_scalar()
            .fetch_one(pool)
            .await?;

        let mut rows = Conditions::new(format!("{VIEW_SELECT}{VIEW_FROM}"));
        apply(&mut rows);
        rows.tail()
            .push(" ORDER BY u.create_time DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());
        let list = rows
            .into_builder()
            .build_query_as::<UserView>()
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(UserView::masked)
            .collect();

        Ok(Page { list, total })
    }

    pub async fn username_taken(
        pool: &PgPool,
        username: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM sys_user
                 WHERE user_name = $1 AND ($2::varchar IS NULL OR id <> $2)
             )",
        )
        .bind(username)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    pub async fn phone_taken(
        pool: &PgPool,
        phone: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM sys_user
                 WHERE phone = $1 AND ($2::varchar IS NULL OR id <> $2)
             )",
        )
        .bind(phone)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        base: &BaseFields,
        input: &SaveUser,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sys_user
                 (id, creator_id, user_name, real_name, password, dept_id, role_id, phone, state)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, 1))",
        )
        .bind(&base.id)
        .bind(&base.creator_id)
        .bind(&input.user_name)
        .bind(&input.real_name)
        .bind(password_hash)
        .bind(&input.dept_id)
        .bind(&input.role_id)
        .bind(&input.phone)
        .bind(input.state)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Returns `true` if the row was updated.
    pub async fn update(
        pool: &PgPool,
        id: &str,
        input: &SaveUser,
        updater: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sys_user SET
                user_name = $2,
                real_name = $3,
                dept_id = $4,
                role_id = $5,
                phone = $6,
                state = COALESCE($7, state),
                update_id = $8,
                update_time = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&input.user_name)
        .bind(&input.real_name)
        .bind(&input.dept_id)
        .bind(&input.role_id)
        .bind(&input.phone)
        .bind(input.state)
        .bind(updater)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `(user id, department id)` for each existing id in `ids`.
    pub async fn dept_ids_of(
        pool: &PgPool,
        ids: &[String],
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as("SELECT id, dept_id FROM sys_user WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    pub async fn delete_many(pool: &PgPool, ids: &[String]) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sys_user WHERE id = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_password(
        pool: &PgPool,
        id: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sys_user SET password = $2, update_time = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sys_user")
            .fetch_one(pool)
            .await
    }

    pub async fn exists_in_dept(pool: &PgPool, dept_id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sys_user WHERE dept_id = $1)")
            .bind(dept_id)
            .fetch_one(pool)
            .await
    }

    /// Name of the first role in `role_ids` that is still assigned to a user.
    pub async fn first_assigned_role(
        pool: &PgPool,
        role_ids: &[String],
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT r.role_name FROM sys_role r
             WHERE r.id = ANY($1)
               AND EXISTS(SELECT 1 FROM sys_user u WHERE u.role_id = r.id)
             ORDER BY r.role_name
             LIMIT 1",
        )
        .bind(role_ids)
        .fetch_optional(pool)
        .await
    }
}
