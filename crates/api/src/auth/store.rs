//! Credential store seam.
//!
//! The session core reads users, department closures, role permissions and
//! the safety policy through [`CredentialStore`], so it can run against
//! Postgres in production and against [`MemoryCredentialStore`] in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use keystone_core::tree::{ancestors, descendants};
use keystone_db::models::dept::Dept;
use keystone_db::models::log::NewAuditLog;
use keystone_db::models::role::RolePermission;
use keystone_db::models::safe::SafetyPolicy;
use keystone_db::models::user::UserCredentials;
use keystone_db::repositories::{DeptRepo, LogRepo, RoleMenuRepo, SafeRepo, UserRepo};
use keystone_db::DbPool;
use tokio::sync::RwLock;

/// `(id, name)` of a department.
pub type DeptPair = (String, String);

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// User and password hash by exact username.
    async fn find_by_username(&self, username: &str)
        -> Result<Option<UserCredentials>, sqlx::Error>;

    /// The saved safety policy, or the default one.
    async fn safety_policy(&self) -> Result<SafetyPolicy, sqlx::Error>;

    /// The department followed by its descendants.
    async fn dept_subtree(&self, dept_id: &str) -> Result<Vec<DeptPair>, sqlx::Error>;

    /// Strict ancestors of the department, root first.
    async fn dept_ancestors(&self, dept_id: &str) -> Result<Vec<DeptPair>, sqlx::Error>;

    /// Every non-empty `(role, permission)` pair.
    async fn all_role_permissions(&self) -> Result<Vec<RolePermission>, sqlx::Error>;

    /// Non-empty permissions of one role.
    async fn role_permissions(&self, role_id: &str) -> Result<Vec<String>, sqlx::Error>;

    async fn append_log(&self, entry: &NewAuditLog) -> Result<(), sqlx::Error>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`CredentialStore`] over the repositories.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, sqlx::Error> {
        UserRepo::find_credentials_by_username(&self.pool, username).await
    }

    async fn safety_policy(&self) -> Result<SafetyPolicy, sqlx::Error> {
        Ok(SafeRepo::get(&self.pool).await?.unwrap_or_default())
    }

    async fn dept_subtree(&self, dept_id: &str) -> Result<Vec<DeptPair>, sqlx::Error> {
        let rows = DeptRepo::descendants(&self.pool, dept_id).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn dept_ancestors(&self, dept_id: &str) -> Result<Vec<DeptPair>, sqlx::Error> {
        let rows = DeptRepo::ancestors(&self.pool, dept_id).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn all_role_permissions(&self) -> Result<Vec<RolePermission>, sqlx::Error> {
        RoleMenuRepo::all_permissions(&self.pool).await
    }

    async fn role_permissions(&self, role_id: &str) -> Result<Vec<String>, sqlx::Error> {
        RoleMenuRepo::permissions_for_role(&self.pool, role_id).await
    }

    async fn append_log(&self, entry: &NewAuditLog) -> Result<(), sqlx::Error> {
        LogRepo::insert(&self.pool, entry).await.map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryData {
    users: HashMap<String, UserCredentials>,
    depts: Vec<Dept>,
    permissions: Vec<RolePermission>,
    policy: SafetyPolicy,
    logs: Vec<NewAuditLog>,
}

/// [`CredentialStore`] held in process memory.
///
/// Department closures are computed by walking the adjacency list.
#[derive(Default)]
pub struct MemoryCredentialStore {
    data: RwLock<MemoryData>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: UserCredentials) {
        let mut data = self.data.write().await;
        data.users.insert(user.user.user_name.clone(), user);
    }

    pub async fn add_dept(&self, dept: Dept) {
        self.data.write().await.depts.push(dept);
    }

    /// Give `role_id` the listed permissions.
    pub async fn grant(&self, role_id: &str, perms: &[&str]) {
        let mut data = self.data.write().await;
        data.permissions.extend(perms.iter().map(|p| RolePermission {
            role_id: role_id.to_string(),
            perms: p.to_string(),
        }));
    }

    /// Drop every permission of `role_id`.
    pub async fn revoke_all(&self, role_id: &str) {
        self.data
            .write()
            .await
            .permissions
            .retain(|p| p.role_id != role_id);
    }

    pub async fn set_policy(&self, policy: SafetyPolicy) {
        self.data.write().await.policy = policy;
    }

    /// Audit entries appended so far.
    pub async fn logs(&self) -> Vec<NewAuditLog> {
        self.data.read().await.logs.clone()
    }
}

fn pair(dept: &Dept) -> DeptPair {
    (dept.base.id.clone(), dept.name.clone())
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, sqlx::Error> {
        Ok(self.data.read().await.users.get(username).cloned())
    }

    async fn safety_policy(&self) -> Result<SafetyPolicy, sqlx::Error> {
        Ok(self.data.read().await.policy.clone())
    }

    async fn dept_subtree(&self, dept_id: &str) -> Result<Vec<DeptPair>, sqlx::Error> {
        let data = self.data.read().await;
        Ok(descendants(&data.depts, dept_id).into_iter().map(pair).collect())
    }

    async fn dept_ancestors(&self, dept_id: &str) -> Result<Vec<DeptPair>, sqlx::Error> {
        let data = self.data.read().await;
        Ok(ancestors(&data.depts, dept_id).into_iter().map(pair).collect())
    }

    async fn all_role_permissions(&self) -> Result<Vec<RolePermission>, sqlx::Error> {
        let data = self.data.read().await;
        Ok(data
            .permissions
            .iter()
            .filter(|p| !p.perms.is_empty())
            .cloned()
            .collect())
    }

    async fn role_permissions(&self, role_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let data = self.data.read().await;
        Ok(data
            .permissions
            .iter()
            .filter(|p| p.role_id == role_id && !p.perms.is_empty())
            .map(|p| p.perms.clone())
            .collect())
    }

    async fn append_log(&self, entry: &NewAuditLog) -> Result<(), sqlx::Error> {
        self.data.write().await.logs.push(entry.clone());
        Ok(())
    }
}
