//! Query builder utilities for list endpoints
//!
//! Every list endpoint is the same shape: a base `SELECT` with a
//! `WHERE TRUE`, optional equality filters, an optional case-insensitive
//! text search across a few columns, and an ordering.

use sqlx::query::QueryAs;
use sqlx::{Postgres, QueryBuilder};

/// Escape `LIKE` metacharacters so user input matches literally
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Search query builder for consistent list query construction
///
/// Example usage:
/// ```rust,ignore
/// let mut query = SearchQuery::new(
///     "SELECT h.* FROM historia h JOIN cliente c ON c.id = h.cliente_id WHERE TRUE",
/// );
/// query
///     .filter_eq("h.cliente_id", params.cliente_id)
///     .search(&["h.observaciones", "c.nombre", "c.cedula"], params.search.as_deref())
///     .order_by("h.fecha", "DESC")
///     .order_by("h.id", "DESC");
///
/// let historias: Vec<Historia> = query.build_query_as().fetch_all(&pool).await?;
/// ```
pub struct SearchQuery<'a> {
    query: QueryBuilder<'a, Postgres>,
    ordered: bool,
}

impl<'a> SearchQuery<'a> {
    /// Create a new builder; the base query must end in an open `WHERE` clause
    pub fn new(base_query: &'static str) -> Self {
        Self {
            query: QueryBuilder::new(base_query),
            ordered: false,
        }
    }

    /// Add an equality filter (only if value is Some)
    pub fn filter_eq<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Sync + 'a,
    {
        if let Some(val) = value {
            self.query.push(format!(" AND {} = ", column));
            self.query.push_bind(val);
        }
        self
    }

    /// Case-insensitive substring search across columns (only if term is non-blank)
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() && !columns.is_empty() => t,
            _ => return self,
        };
        let pattern = like_pattern(term);

        self.query.push(" AND (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.query.push(" OR ");
            }
            self.query.push(format!("{} ILIKE ", column));
            self.query.push_bind(pattern.clone());
        }
        self.query.push(")");
        self
    }

    /// Add ORDER BY clause; later calls add tie-breakers
    pub fn order_by(&mut self, column: &str, direction: &str) -> &mut Self {
        let keyword = if self.ordered { "," } else { " ORDER BY" };
        self.query
            .push(format!("{} {} {}", keyword, column, direction));
        self.ordered = true;
        self
    }

    /// SQL text built so far
    pub fn sql(&self) -> &str {
        self.query.sql()
    }

    /// Build the final query as a typed query for fetching specific types
    pub fn build_query_as<T>(&mut self) -> QueryAs<'_, Postgres, T, sqlx::postgres::PgArguments>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
    {
        self.query.build_query_as()
    }
}
