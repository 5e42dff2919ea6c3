//! Dynamic `WHERE` clauses with bound parameters.

use keystone_core::scope::ScopeFilter;
use sqlx::{Postgres, QueryBuilder};

/// A [`QueryBuilder`] that tracks whether a `WHERE` has been emitted yet.
pub struct Conditions<'a> {
    builder: QueryBuilder<'a, Postgres>,
    has_where: bool,
}

impl<'a> Conditions<'a> {
    /// Start from a statement that has no `WHERE` clause.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            builder: QueryBuilder::new(sql),
            has_where: false,
        }
    }

    /// Open the next condition and return the builder to finish it.
    pub fn and(&mut self) -> &mut QueryBuilder<'a, Postgres> {
        self.builder
            .push(if self.has_where { " AND " } else { " WHERE " });
        self.has_where = true;
        &mut self.builder
    }

    /// `column ILIKE %value%` when a non-blank value is given.
    pub fn contains(&mut self, column: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            let pattern = format!("%{}%", escape_like(v));
            self.and()
                .push(column)
                .push(" ILIKE ")
                .push_bind(pattern);
        }
        self
    }

    /// Apply a data-scope predicate.
    ///
    /// A column name that is not a plain identifier matches nothing.
    pub fn scope(&mut self, filter: &ScopeFilter) -> &mut Self {
        match filter {
            ScopeFilter::None => {}
            ScopeFilter::In { column, .. } | ScopeFilter::Eq { column, .. }
                if !ScopeFilter::column_is_safe(column) =>
            {
                tracing::warn!(column = %column, "Rejected unsafe scope column");
                self.and().push("FALSE");
            }
            ScopeFilter::In { column, values } => {
                self.and()
                    .push(column.as_str())
                    .push(" = ANY(")
                    .push_bind(values.clone())
                    .push(")");
            }
            ScopeFilter::Eq { column, value } => {
                self.and()
                    .push(column.as_str())
                    .push(" = ")
                    .push_bind(value.clone());
            }
        }
        self
    }

    /// Append raw SQL after the conditions (ordering, paging).
    pub fn tail(&mut self) -> &mut QueryBuilder<'a, Postgres> {
        &mut self.builder
    }

    pub fn into_builder(self) -> QueryBuilder<'a, Postgres> {
        self.builder
    }
}

/// Escape `%`, `_` and `\` for use inside a `LIKE` pattern.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
