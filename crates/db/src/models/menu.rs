//! Menu tree and the front-end router view derived from it.

use keystone_core::tree::TreeNode;
use keystone_core::types::{DbId, ROOT_PARENT_ID};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::base::BaseFields;

/// Directory entry; groups child menus.
pub const MENU_TYPE_DIRECTORY: &str = "M";
/// Page entry.
pub const MENU_TYPE_PAGE: &str = "C";
/// Button; carries a permission string only.
pub const MENU_TYPE_BUTTON: &str = "F";

/// Component name of a directory that only nests its children.
pub const PARENT_VIEW: &str = "ParentView";

/// A row from `sys_menu`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseFields,
    pub parent_id: DbId,
    pub name: String,
    pub sort: i32,
    /// Front-end component.
    pub url: String,
    /// Route path segment.
    pub path: String,
    #[serde(rename = "type")]
    pub menu_type: String,
    pub state: i32,
    /// Permission string checked by the authorization filter.
    pub perms: String,
    pub visible: bool,
    pub icon: String,
    pub active_menu: String,
    pub is_frame: bool,
    pub remark: String,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Menu>,
}

impl TreeNode for Menu {
    fn node_id(&self) -> &str {
        &self.base.id
    }

    fn parent_id(&self) -> &str {
        &self.parent_id
    }

    fn set_children(&mut self, children: Vec<Self>) {
        self.children = children;
    }
}

/// List filters for the menu tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuQuery {
    /// Only menus linked to this role.
    pub role_id: Option<DbId>,
    pub name: Option<String>,
    pub state: Option<i32>,
}

/// Body of a menu insert or update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveMenu {
    #[validate(length(min = 1, message = "Parent is required"))]
    pub parent_id: DbId,
    #[validate(length(min = 1, max = 100, message = "Name must be between 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type")]
    #[validate(custom(function = "validate_menu_type"))]
    pub menu_type: String,
    #[serde(default = "default_state")]
    pub state: i32,
    #[serde(default)]
    pub perms: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub active_menu: String,
    #[serde(default)]
    pub is_frame: bool,
    #[serde(default)]
    pub remark: String,
}

impl SaveMenu {
    /// The admin UI sends `"0"` for a top-level menu.
    pub fn normalized_parent(&self) -> &str {
        if self.parent_id == "0" {
            ROOT_PARENT_ID
        } else {
            &self.parent_id
        }
    }
}

fn validate_menu_type(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        MENU_TYPE_DIRECTORY | MENU_TYPE_PAGE | MENU_TYPE_BUTTON => Ok(()),
        _ => Err(validator::ValidationError::new("menu_type")
            .with_message("Menu type must be M, C or F".into())),
    }
}

fn default_true() -> bool {
    true
}

fn default_state() -> i32 {
    keystone_core::roles::STATE_ENABLED
}

// ---------------------------------------------------------------------------
// Router view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterMeta {
    pub title: String,
    pub icon: String,
    pub active_menu: String,
}

/// One front-end route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub name: String,
    pub path: String,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    pub component: String,
    pub always_show: bool,
    pub meta: RouterMeta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Router>,
}

impl Menu {
    fn meta(&self) -> RouterMeta {
        RouterMeta {
            title: self.name.clone(),
            icon: self.icon.clone(),
            active_menu: self.active_menu.clone(),
        }
    }

    fn is_top_level_page(&self) -> bool {
        self.menu_type == MENU_TYPE_PAGE && self.parent_id == ROOT_PARENT_ID
    }

    fn router_path(&self) -> String {
        if self.menu_type == MENU_TYPE_DIRECTORY && self.url != PARENT_VIEW {
            format!("/{}", self.path)
        } else if self.is_top_level_page() {
            "/".to_string()
        } else {
            self.path.clone()
        }
    }
}

/// Convert a built menu tree into front-end routes.
///
/// Directories with children nest them; a top-level page is wrapped in a
/// layout route at `/` so it renders inside the shell.
pub fn build_routers(menus: &[Menu]) -> Vec<Router> {
    menus
        .iter()
        .map(|menu| {
            let mut router = Router {
                name: capitalize(&menu.path),
                path: menu.router_path(),
                hidden: !menu.visible,
                redirect: None,
                component: menu.url.clone(),
                always_show: false,
                meta: menu.meta(),
                children: Vec::new(),
            };
            if menu.menu_type == MENU_TYPE_DIRECTORY && !menu.children.is_empty() {
                router.always_show = true;
                router.redirect = Some("noRedirect".to_string());
                router.children = build_routers(&menu.children);
            } else if menu.is_top_level_page() {
                router.children = vec![Router {
                    name: capitalize(&menu.path),
                    path: menu.path.clone(),
                    hidden: false,
                    redirect: None,
                    component: menu.url.clone(),
                    always_show: false,
                    meta: menu.meta(),
                    children: Vec::new(),
                }];
            }
            router
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use keystone_core::tree::build_tree;

    use super::*;

    fn menu(id: &str, parent: &str, menu_type: &str, path: &str, url: &str) -> Menu {
        Menu {
            base: BaseFields {
                id: id.into(),
                ..BaseFields::default()
            },
            parent_id: parent.into(),
            name: id.to_uppercase(),
            sort: 0,
            url: url.into(),
            path: path.into(),
            menu_type: menu_type.into(),
            state: 1,
            perms: String::new(),
            visible: true,
            icon: String::new(),
            active_menu: String::new(),
            is_frame: false,
            remark: String::new(),
            children: Vec::new(),
        }
    }

    #[test]
    fn directory_nests_children() {
        let flat = vec![
            menu("sys", ROOT_PARENT_ID, "M", "system", "Layout"),
            menu("user", "sys", "C", "user", "system/user/index"),
        ];
        let routers = build_routers(&build_tree(&flat, ROOT_PARENT_ID));
        assert_eq!(routers.len(), 1);
        let dir = &routers[0];
        assert_eq!(dir.path, "/system");
        assert_eq!(dir.name, "System");
        assert!(dir.always_show);
        assert_eq!(dir.redirect.as_deref(), Some("noRedirect"));
        assert_eq!(dir.children[0].path, "user");
    }

    #[test]
    fn top_level_page_is_wrapped() {
        let flat = vec![menu("home", ROOT_PARENT_ID, "C", "home", "home/index")];
        let routers = build_routers(&flat);
        assert_eq!(routers[0].path, "/");
        assert_eq!(routers[0].children.len(), 1);
        assert_eq!(routers[0].children[0].path, "home");
    }

    #[test]
    fn parent_view_directory_keeps_relative_path() {
        let flat = vec![menu("nested", "sys", "M", "nested", PARENT_VIEW)];
        assert_eq!(build_routers(&flat)[0].path, "nested");
    }

    #[test]
    fn menu_type_validation() {
        assert!(validate_menu_type("F").is_ok());
        assert!(validate_menu_type("X").is_err());
    }
}
