//! Shared database schema, migrations, and query builders.
//!
//! Every statement the server runs is built here with sea-query so the SQL
//! and its bound values travel together as a [`Built`] pair.

pub mod announcements;
pub mod attendance;
pub mod classes;
pub mod leads;
pub mod migrations;
pub mod payments;
pub mod plans;
pub mod students;
pub mod tables;
pub mod teachers;
pub mod tenants;
pub mod users;

// Re-export tables for convenience
pub use tables::*;

/// SQL text plus bound values, ready for execution.
pub type Built = (String, sea_query::Values);

/// `datetime('now')` as a value expression for timestamp columns.
pub(crate) fn now_expr() -> sea_query::SimpleExpr {
    sea_query::Expr::cust("datetime('now')")
}

#[cfg(test)]
pub(crate) mod testing {
    //! Executes built statements against an in-memory SQLite database.

    use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};

    use super::Built;

    pub fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        for (_, sql) in super::migrations::MIGRATIONS {
            conn.execute_batch(sql).unwrap();
        }
        conn
    }

    fn to_sql(values: sea_query::Values) -> Vec<SqlValue> {
        values
            .0
            .into_iter()
            .map(|v| match v {
                sea_query::Value::Bool(b) => b.map_or(SqlValue::Null, |b| SqlValue::Integer(b.into())),
                sea_query::Value::Int(n) => n.map_or(SqlValue::Null, |n| SqlValue::Integer(n.into())),
                sea_query::Value::BigInt(n) => n.map_or(SqlValue::Null, SqlValue::Integer),
                sea_query::Value::Unsigned(n) => {
                    n.map_or(SqlValue::Null, |n| SqlValue::Integer(n.into()))
                }
                sea_query::Value::BigUnsigned(n) => n.map_or(SqlValue::Null, |n| {
                    SqlValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
                }),
                sea_query::Value::Double(f) => f.map_or(SqlValue::Null, SqlValue::Real),
                sea_query::Value::String(s) => s.map_or(SqlValue::Null, |s| SqlValue::Text(*s)),
                _ => SqlValue::Null,
            })
            .collect()
    }

    pub fn exec(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
        conn.execute(&sql, params_from_iter(to_sql(values)))
    }

    pub fn count(conn: &Connection, (sql, values): Built) -> i64 {
        conn.query_row(&sql, params_from_iter(to_sql(values)), |r| r.get(0))
            .unwrap()
    }

    /// Integer column `idx` of the first row.
    pub fn int_at(conn: &Connection, (sql, values): Built, idx: usize) -> i64 {
        conn.query_row(&sql, params_from_iter(to_sql(values)), |r| r.get(idx))
            .unwrap()
    }

    /// First column of every row, as text.
    pub fn column(conn: &Connection, (sql, values): Built) -> Vec<String> {
        let mut stmt = conn.prepare(&sql).unwrap();
        stmt.query_map(params_from_iter(to_sql(values)), |r| r.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    pub fn seed_tenant(conn: &Connection, id: &str, slug: &str) {
        exec(
            conn,
            super::tenants::insert(
                id,
                &crate::CreateTenantRequest {
                    name: format!("School {slug}"),
                    slug: slug.to_string(),
                    email: format!("office@{slug}.edu"),
                    phone: None,
                    address: None,
                    plan_id: None,
                },
            ),
        )
        .unwrap();
    }
}
