//! Role permission cache.
//!
//! A single hash maps each role id to its `;`-joined permission strings. The
//! hash is loaded wholesale on the first miss and kept current by the
//! incremental updates below, which only rewrite an already-loaded hash.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use keystone_cache::SessionCache;
use keystone_core::scope::intersects;

use super::store::CredentialStore;
use crate::error::AppResult;

pub const ROLE_PERMISSION_KEY: &str = "rolePermList";

const PERM_SEPARATOR: char = ';';

#[derive(Clone)]
pub struct PermissionCache {
    cache: Arc<dyn SessionCache>,
    store: Arc<dyn CredentialStore>,
    ttl: Duration,
}

impl PermissionCache {
    pub fn new(cache: Arc<dyn SessionCache>, store: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    /// Permissions held by `role_id`.
    pub async fn permissions(&self, role_id: &str) -> AppResult<Vec<String>> {
        if !self.cache.exists(ROLE_PERMISSION_KEY).await? {
            let all = self.load().await?;
            return Ok(all.get(role_id).cloned().unwrap_or_default());
        }
        let joined = self
            .cache
            .hget(ROLE_PERMISSION_KEY, role_id)
            .await?
            .unwrap_or_default();
        Ok(split(&joined))
    }

    /// Whether `role_id` satisfies a route requirement.
    ///
    /// The requirement is a `;`-separated list of alternatives; an empty one
    /// always passes.
    pub async fn is_granted(&self, role_id: &str, requirement: &str) -> AppResult<bool> {
        let required = split(requirement);
        if required.is_empty() {
            return Ok(true);
        }
        let held = self.permissions(role_id).await?;
        Ok(intersects(&required, &held))
    }

    /// Rename a permission string in every role.
    pub async fn rename(&self, old: &str, new: &str) -> AppResult<()> {
        if old == new || old.is_empty() {
            return Ok(());
        }
        let all = self.cache.hgetall(ROLE_PERMISSION_KEY).await?;
        let mut changed = Vec::new();
        for (role_id, joined) in all {
            let perms = split(&joined);
            if !perms.iter().any(|p| p == old) {
                continue;
            }
            let renamed: Vec<String> = perms
                .into_iter()
                .filter_map(|p| match p {
                    p if p == old => (!new.is_empty()).then(|| new.to_string()),
                    p => Some(p),
                })
                .collect();
            changed.push((role_id, join(&renamed)));
        }
        if !changed.is_empty() {
            self.cache.hset_multiple(ROLE_PERMISSION_KEY, &changed).await?;
            tracing::info!(old = %old, new = %new, roles = changed.len(), "Permission renamed");
        }
        Ok(())
    }

    /// Apply a menu's permission change to the cache.
    ///
    /// A menu that gains its first permission string has nothing to rename,
    /// so the roles linked to it are recomputed instead.
    pub async fn menu_changed(&self, old: &str, new: &str, linked_roles: &[String]) -> AppResult<()> {
        if old.trim().is_empty() {
            for role_id in linked_roles {
                self.reload_role(role_id).await?;
            }
            return Ok(());
        }
        self.rename(old, new).await
    }

    /// Recompute one role's entry from the store.
    pub async fn reload_role(&self, role_id: &str) -> AppResult<()> {
        if !self.cache.exists(ROLE_PERMISSION_KEY).await? {
            return Ok(());
        }
        let perms = self.store.role_permissions(role_id).await?;
        self.cache
            .hset(ROLE_PERMISSION_KEY, role_id, &join(&perms))
            .await?;
        tracing::info!(role_id = %role_id, count = perms.len(), "Role permissions reloaded");
        Ok(())
    }

    /// Drop the entries of deleted roles.
    pub async fn remove_roles(&self, role_ids: &[String]) -> AppResult<()> {
        for role_id in role_ids {
            self.cache.hdel(ROLE_PERMISSION_KEY, role_id).await?;
        }
        tracing::info!(roles = role_ids.len(), "Role permissions removed");
        Ok(())
    }

    async fn load(&self) -> AppResult<BTreeMap<String, Vec<String>>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in self.store.all_role_permissions().await? {
            grouped.entry(row.role_id).or_default().push(row.perms);
        }
        let fields: Vec<(String, String)> = grouped
            .iter()
            .map(|(role_id, perms)| (role_id.clone(), join(perms)))
            .collect();
        if !fields.is_empty() {
            self.cache.hset_multiple(ROLE_PERMISSION_KEY, &fields).await?;
            self.cache.expire(ROLE_PERMISSION_KEY, self.ttl).await?;
        }
        tracing::debug!(roles = grouped.len(), "Permission cache loaded");
        Ok(grouped)
    }
}

fn split(joined: &str) -> Vec<String> {
    joined
        .split(PERM_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn join(perms: &[String]) -> String {
    let mut out = String::new();
    for (i, perm) in perms.iter().enumerate() {
        if i > 0 {
            out.push(PERM_SEPARATOR);
        }
        out.push_str(perm);
    }
    out
}

#[cfg(test)]
mod tests {
    use keystone_cache::MemoryCache;

    use super::*;
    use crate::auth::store::MemoryCredentialStore;

    async fn setup() -> (PermissionCache, Arc<MemoryCache>, Arc<MemoryCredentialStore>) {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .grant("r1", &["system:user:view", "system:dept:view"])
            .await;
        store.grant("r2", &["system:user:view"]).await;
        let perms = PermissionCache::new(cache.clone(), store.clone(), Duration::from_secs(60));
        (perms, cache, store)
    }

    #[tokio::test]
    async fn loads_lazily_on_first_lookup() {
        let (perms, cache, _) = setup().await;
        assert!(!cache.exists(ROLE_PERMISSION_KEY).await.unwrap());
        assert_eq!(
            perms.permissions("r1").await.unwrap(),
            vec!["system:user:view", "system:dept:view"]
        );
        assert_eq!(
            cache.hget(ROLE_PERMISSION_KEY, "r2").await.unwrap().as_deref(),
            Some("system:user:view")
        );
        assert!(perms.permissions("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn requirement_alternatives_are_or_ed() {
        let (perms, _, _) = setup().await;
        assert!(perms
            .is_granted("r2", "system:dept:view;system:user:view")
            .await
            .unwrap());
        assert!(!perms.is_granted("r2", "system:dept:view").await.unwrap());
        assert!(perms.is_granted("nobody", "").await.unwrap());
    }

    #[tokio::test]
    async fn rename_rewrites_every_role() {
        let (perms, _, _) = setup().await;
        perms.permissions("r1").await.unwrap();
        perms
            .rename("system:user:view", "system:user:list")
            .await
            .unwrap();
        assert_eq!(
            perms.permissions("r1").await.unwrap(),
            vec!["system:user:list", "system:dept:view"]
        );
        assert_eq!(perms.permissions("r2").await.unwrap(), vec!["system:user:list"]);
    }

    #[tokio::test]
    async fn reload_role_recomputes_one_entry() {
        let (perms, _, store) = setup().await;
        perms.permissions("r1").await.unwrap();
        store.revoke_all("r2").await;
        store.grant("r2", &["system:role:view"]).await;
        perms.reload_role("r2").await.unwrap();
        assert_eq!(perms.permissions("r2").await.unwrap(), vec!["system:role:view"]);
    }

    #[tokio::test]
    async fn first_permission_on_a_menu_reaches_linked_roles() {
        let (perms, _, store) = setup().await;
        perms.permissions("r1").await.unwrap();
        store.grant("r2", &["system:menu:view"]).await;

        perms
            .menu_changed("", "system:menu:view", &["r2".to_string()])
            .await
            .unwrap();
        assert_eq!(
            perms.permissions("r2").await.unwrap(),
            vec!["system:user:view", "system:menu:view"]
        );
        assert!(!perms.is_granted("r1", "system:menu:view").await.unwrap());
    }

    #[tokio::test]
    async fn changed_menu_permission_is_renamed() {
        let (perms, _, _) = setup().await;
        perms.permissions("r1").await.unwrap();
        perms
            .menu_changed("system:dept:view", "system:dept:list", &[])
            .await
            .unwrap();
        assert!(perms.is_granted("r1", "system:dept:list").await.unwrap());
        assert!(!perms.is_granted("r1", "system:dept:view").await.unwrap());
    }

    #[tokio::test]
    async fn updates_skip_an_unloaded_cache() {
        let (perms, cache, _) = setup().await;
        perms.reload_role("r1").await.unwrap();
        perms.rename("system:user:view", "x").await.unwrap();
        assert!(!cache.exists(ROLE_PERMISSION_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn removed_roles_lose_their_permissions() {
        let (perms, _, _) = setup().await;
        perms.permissions("r1").await.unwrap();
        perms.remove_roles(&["r1".to_string()]).await.unwrap();
        assert!(perms.permissions("r1").await.unwrap().is_empty());
        assert!(!perms.permissions("r2").await.unwrap().is_empty());
    }
}
