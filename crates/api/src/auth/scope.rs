//! Data-scope checks for the current caller.
//!
//! Super admins see everything unless a call sets `ignore_admin`; everyone
//! else is confined to their department subtree.

use keystone_core::error::CoreError;
use keystone_core::scope::{Scope, ScopeFilter, ScopeMode, ScopeSubject};

use crate::middleware::auth::CurrentUser;

impl CurrentUser {
    /// Department ids (or names) this caller may touch.
    pub fn scope(&self, ignore_admin: bool, by_id: bool) -> Scope {
        Scope::resolve(&self.user.scope, self.is_super_admin, ignore_admin, by_id)
    }

    /// The scope as a comma-joined list, empty when unrestricted.
    pub fn scope_list(&self, ignore_admin: bool, by_id: bool) -> String {
        match self.scope(ignore_admin, by_id) {
            Scope::Unrestricted => String::new(),
            Scope::Within(values) => values.join(","),
        }
    }

    /// Row predicate over `column` for a listing in `mode`.
    pub fn scope_filter(
        &self,
        column: &str,
        mode: ScopeMode,
        ignore_admin: bool,
        by_id: bool,
    ) -> ScopeFilter {
        let user = &self.user.user;
        let subject = ScopeSubject {
            user_id: &user.base.id,
            username: &user.user_name,
            dept_id: &user.dept_id,
            dept_name: user.dept_name.as_deref().unwrap_or_default(),
        };
        ScopeFilter::build(&self.scope(ignore_admin, by_id), subject, column, mode, by_id)
    }

    /// Whether `candidate` lies inside the caller's scope.
    pub fn check_scope(&self, candidate: &str, ignore_admin: bool, by_id: bool) -> bool {
        self.scope(ignore_admin, by_id).permits(candidate)
    }

    /// Write gate on a department id.
    pub fn require_dept(&self, dept_id: &str) -> Result<(), CoreError> {
        if self.check_scope(dept_id, false, true) {
            Ok(())
        } else {
            tracing::warn!(user = %self.user_name(), dept_id = %dept_id, "Outside data scope");
            Err(CoreError::PermissionDenied("No data permission".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use keystone_core::scope::DataScope;
    use keystone_db::models::base::BaseFields;
    use keystone_db::models::user::UserView;

    use super::*;
    use crate::auth::session::SessionUser;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    fn caller(dept: &str, scope: DataScope, is_super_admin: bool) -> CurrentUser {
        CurrentUser {
            token: "t".into(),
            user: SessionUser {
                user: UserView {
                    base: BaseFields {
                        id: "u1".into(),
                        ..BaseFields::default()
                    },
                    user_name: "alice".into(),
                    real_name: String::new(),
                    dept_id: dept.into(),
                    dept_name: Some(format!("Dept {dept}")),
                    role_id: "r1".into(),
                    role_key: None,
                    role_name: None,
                    phone: None,
                    state: 1,
                    picture: None,
                },
                scope,
            },
            is_super_admin,
        }
    }

    fn in_a() -> CurrentUser {
        let scope = DataScope::from_closures(
            &[],
            &pairs(&[("A", "Dept A"), ("B", "Dept B"), ("C", "Dept C")]),
        );
        caller("A", scope, false)
    }

    fn in_c() -> CurrentUser {
        let scope = DataScope::from_closures(
            &pairs(&[("A", "Dept A"), ("B", "Dept B")]),
            &pairs(&[("C", "Dept C")]),
        );
        caller("C", scope, false)
    }

    #[test]
    fn leaf_department_sees_only_itself() {
        let user = in_c();
        assert_eq!(user.scope(false, true), Scope::Within(vec!["C".into()]));
        assert!(user.check_scope("C", false, true));
        assert!(!user.check_scope("B", false, true));
    }

    #[test]
    fn root_department_sees_its_subtree() {
        let user = in_a();
        assert_eq!(user.scope_list(false, true), "A,B,C");
        assert_eq!(user.scope_list(false, false), "Dept A,Dept B,Dept C");
    }

    #[test]
    fn super_admin_is_unrestricted_unless_ignored() {
        let mut user = in_c();
        user.is_super_admin = true;
        assert_eq!(user.scope_list(false, true), "");
        assert!(user.check_scope("anything", false, true));
        assert_eq!(user.scope_list(true, true), "C");
    }

    #[test]
    fn filters_per_mode() {
        let user = in_a();
        assert_eq!(
            user.scope_filter("u.dept_id", ScopeMode::DeptAndChildren, false, true),
            ScopeFilter::In {
                column: "u.dept_id".into(),
                values: vec!["A".into(), "B".into(), "C".into()],
            }
        );
        assert_eq!(
            user.scope_filter("u.dept_id", ScopeMode::DeptOnly, false, true),
            ScopeFilter::Eq {
                column: "u.dept_id".into(),
                value: "A".into(),
            }
        );
        assert_eq!(
            user.scope_filter("creator", ScopeMode::SelfOnly, false, false),
            ScopeFilter::Eq {
                column: "creator".into(),
                value: "alice".into(),
            }
        );
        assert!(user
            .scope_filter("u.dept_id", ScopeMode::All, false, true)
            .is_none());
    }

    #[test]
    fn require_dept_denies_outside_scope() {
        assert!(in_c().require_dept("C").is_ok());
        assert!(matches!(
            in_c().require_dept("A"),
            Err(CoreError::PermissionDenied(_))
        ));
    }
}
