//! Department-based data scope.
//!
//! Every department has a cached [`DataScope`]: the id/name lists of its strict
//! ancestors and of its own subtree. A caller's [`Scope`] is derived from the
//! scope of their department and decides which rows they may read or write.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Hash field names of a cached data-scope entry.
pub const FIELD_ANCESTOR_ID: &str = "ancestorId";
pub const FIELD_ANCESTOR_NAME: &str = "ancestorName";
pub const FIELD_CHILD_ID: &str = "childId";
pub const FIELD_CHILD_NAME: &str = "childName";

const LIST_SEPARATOR: &str = ",";

/// Ancestor and subtree closures of one department, comma-joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataScope {
    pub ancestor_id: String,
    pub ancestor_name: String,
    pub child_id: String,
    pub child_name: String,
}

impl DataScope {
    /// Build from `(id, name)` closures: strict ancestors root first, and the
    /// department itself followed by its descendants.
    pub fn from_closures(ancestors: &[(String, String)], subtree: &[(String, String)]) -> Self {
        let (ancestor_id, ancestor_name) = join_pairs(ancestors);
        let (child_id, child_name) = join_pairs(subtree);
        Self {
            ancestor_id,
            ancestor_name,
            child_id,
            child_name,
        }
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            (FIELD_ANCESTOR_ID.to_string(), self.ancestor_id.clone()),
            (FIELD_ANCESTOR_NAME.to_string(), self.ancestor_name.clone()),
            (FIELD_CHILD_ID.to_string(), self.child_id.clone()),
            (FIELD_CHILD_NAME.to_string(), self.child_name.clone()),
        ]
    }

    /// Decode a cached entry. An empty hash means the entry is missing.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        let get = |name: &str| fields.get(name).cloned().unwrap_or_default();
        Some(Self {
            ancestor_id: get(FIELD_ANCESTOR_ID),
            ancestor_name: get(FIELD_ANCESTOR_NAME),
            child_id: get(FIELD_CHILD_ID),
            child_name: get(FIELD_CHILD_NAME),
        })
    }

    /// Ids or names of the department subtree.
    pub fn children(&self, by_id: bool) -> Vec<String> {
        split_list(if by_id { &self.child_id } else { &self.child_name })
    }

    pub fn ancestor_ids(&self) -> Vec<String> {
        split_list(&self.ancestor_id)
    }
}

fn join_pairs(items: &[(String, String)]) -> (String, String) {
    let ids: Vec<&str> = items.iter().map(|(id, _)| id.as_str()).collect();
    let names: Vec<&str> = items.iter().map(|(_, name)| name.as_str()).collect();
    (ids.join(LIST_SEPARATOR), names.join(LIST_SEPARATOR))
}

fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(LIST_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Caller scope
// ---------------------------------------------------------------------------

/// What a caller is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// No filtering at all.
    Unrestricted,
    /// Only rows whose scoped column is one of these values.
    Within(Vec<String>),
}

impl Scope {
    /// Resolve the scope of a caller whose department scope is `scope`.
    ///
    /// Super admins are unrestricted unless `ignore_admin` asks for filtering
    /// regardless of role.
    pub fn resolve(scope: &DataScope, is_super_admin: bool, ignore_admin: bool, by_id: bool) -> Self {
        if is_super_admin && !ignore_admin {
            Scope::Unrestricted
        } else {
            Scope::Within(scope.children(by_id))
        }
    }

    /// Whether `candidate` may be written by this caller.
    pub fn permits(&self, candidate: &str) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::Within(values) => contains(values.as_slice(), candidate),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Scope::Unrestricted)
    }
}

/// Generic membership test.
pub fn contains<T, Q>(items: &[T], needle: &Q) -> bool
where
    T: PartialEq<Q>,
    Q: ?Sized,
{
    items.iter().any(|item| item == needle)
}

/// True when the two slices share at least one element.
pub fn intersects<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.iter().any(|x| b.contains(x))
}

// ---------------------------------------------------------------------------
// Query filters
// ---------------------------------------------------------------------------

/// Which rows a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum ScopeMode {
    All = 1,
    DeptAndChildren = 2,
    DeptOnly = 3,
    SelfOnly = 4,
    /// Reserved; produces no filter.
    Custom = 5,
}

impl TryFrom<i32> for ScopeMode {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::All),
            2 => Ok(Self::DeptAndChildren),
            3 => Ok(Self::DeptOnly),
            4 => Ok(Self::SelfOnly),
            5 => Ok(Self::Custom),
            other => Err(format!("unknown data scope mode {other}")),
        }
    }
}

impl From<ScopeMode> for i32 {
    fn from(mode: ScopeMode) -> Self {
        mode as i32
    }
}

/// Caller attributes needed to build a filter.
#[derive(Debug, Clone, Copy)]
pub struct ScopeSubject<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub dept_id: &'a str,
    pub dept_name: &'a str,
}

/// A row predicate over a single column, rendered by the db layer with bound
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// No additional filtering.
    None,
    /// `column = ANY(values)`.
    In { column: String, values: Vec<String> },
    /// `column = value`.
    Eq { column: String, value: String },
}

impl ScopeFilter {
    /// Build the predicate for `mode` over `column`.
    ///
    /// An unrestricted caller never gets a filter.
    pub fn build(
        scope: &Scope,
        subject: ScopeSubject<'_>,
        column: &str,
        mode: ScopeMode,
        by_id: bool,
    ) -> Self {
        let Scope::Within(values) = scope else {
            return ScopeFilter::None;
        };
        match mode {
            ScopeMode::All | ScopeMode::Custom => ScopeFilter::None,
            ScopeMode::DeptAndChildren => ScopeFilter::In {
                column: column.to_string(),
                values: values.clone(),
            },
            ScopeMode::DeptOnly => ScopeFilter::Eq {
                column: column.to_string(),
                value: if by_id { subject.dept_id } else { subject.dept_name }.to_string(),
            },
            ScopeMode::SelfOnly => ScopeFilter::Eq {
                column: column.to_string(),
                value: if by_id { subject.user_id } else { subject.username }.to_string(),
            },
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ScopeFilter::None)
    }

    /// Column names are interpolated into SQL, so only plain identifiers
    /// (optionally table-qualified) are accepted.
    pub fn column_is_safe(column: &str) -> bool {
        !column.is_empty()
            && column.split('.').all(|part| {
                !part.is_empty()
                    && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && !part.starts_with(|c: char| c.is_ascii_digit())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    fn scope_of_a() -> DataScope {
        DataScope::from_closures(&[], &pairs(&[("A", "Head"), ("B", "Ops"), ("C", "Field")]))
    }

    fn subject() -> ScopeSubject<'static> {
        ScopeSubject {
            user_id: "u1",
            username: "alice",
            dept_id: "A",
            dept_name: "Head",
        }
    }

    #[test]
    fn closures_are_comma_joined() {
        let scope = DataScope::from_closures(
            &pairs(&[("A", "Head"), ("B", "Ops")]),
            &pairs(&[("C", "Field")]),
        );
        assert_eq!(scope.ancestor_id, "A,B");
        assert_eq!(scope.ancestor_name, "Head,Ops");
        assert_eq!(scope.child_id, "C");
        assert_eq!(scope.children(true), ["C"]);
        assert_eq!(scope.ancestor_ids(), ["A", "B"]);
    }

    #[test]
    fn fields_roundtrip() {
        let scope = scope_of_a();
        let fields: HashMap<String, String> = scope.to_fields().into_iter().collect();
        assert_eq!(DataScope::from_fields(&fields), Some(scope));
        assert_eq!(DataScope::from_fields(&HashMap::new()), None);
    }

    #[test]
    fn super_admin_is_unrestricted_unless_ignored() {
        let scope = scope_of_a();
        assert_eq!(Scope::resolve(&scope, true, false, true), Scope::Unrestricted);
        assert_eq!(
            Scope::resolve(&scope, true, true, true),
            Scope::Within(vec!["A".into(), "B".into(), "C".into()])
        );
        assert_eq!(
            Scope::resolve(&scope, false, false, false),
            Scope::Within(vec!["Head".into(), "Ops".into(), "Field".into()])
        );
    }

    #[test]
    fn permits_checks_membership() {
        let scope = Scope::resolve(&scope_of_a(), false, false, true);
        assert!(scope.permits("B"));
        assert!(!scope.permits("Z"));
        assert!(Scope::Unrestricted.permits("Z"));
        assert!(!Scope::Within(Vec::new()).permits("A"));
    }

    #[test]
    fn filters_per_mode() {
        let scope = Scope::resolve(&scope_of_a(), false, false, true);
        let f = |mode| ScopeFilter::build(&scope, subject(), "dept_id", mode, true);

        assert_eq!(f(ScopeMode::All), ScopeFilter::None);
        assert_eq!(f(ScopeMode::Custom), ScopeFilter::None);
        assert_eq!(
            f(ScopeMode::DeptAndChildren),
            ScopeFilter::In {
                column: "dept_id".into(),
                values: vec!["A".into(), "B".into(), "C".into()],
            }
        );
        assert_eq!(
            f(ScopeMode::DeptOnly),
            ScopeFilter::Eq {
                column: "dept_id".into(),
                value: "A".into(),
            }
        );
        assert_eq!(
            ScopeFilter::build(&scope, subject(), "creator_id", ScopeMode::SelfOnly, true),
            ScopeFilter::Eq {
                column: "creator_id".into(),
                value: "u1".into(),
            }
        );
    }

    #[test]
    fn unrestricted_never_filters() {
        let filter = ScopeFilter::build(
            &Scope::Unrestricted,
            subject(),
            "dept_id",
            ScopeMode::DeptAndChildren,
            true,
        );
        assert!(filter.is_none());
    }

    #[test]
    fn scope_mode_from_int() {
        assert_eq!(ScopeMode::try_from(2), Ok(ScopeMode::DeptAndChildren));
        assert!(ScopeMode::try_from(9).is_err());
    }

    #[test]
    fn column_names_are_checked() {
        assert!(ScopeFilter::column_is_safe("dept_id"));
        assert!(ScopeFilter::column_is_safe("u.dept_id"));
        assert!(!ScopeFilter::column_is_safe("dept_id; drop table"));
        assert!(!ScopeFilter::column_is_safe("1abc"));
        assert!(!ScopeFilter::column_is_safe(""));
    }

    #[test]
    fn generic_membership() {
        assert!(contains(&["a".to_string()], "a"));
        assert!(contains(&[1, 2, 3], &2));
        assert!(intersects(&["x", "y"], &["y"]));
        assert!(!intersects::<&str>(&[], &["y"]));
    }
}
