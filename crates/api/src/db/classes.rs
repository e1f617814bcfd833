//! Class query builders. Every statement is scoped to one tenant.

use sea_query::{
    Asterisk, Cond, Expr, Func, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder,
};

use super::Built;
use super::tables::{Classes, Students, Teachers};
use crate::{CreateClassRequest, UpdateClassRequest};

/// Class columns + teacher names + enrolled (non-deleted) student count.
/// Order must match `class_from_row()`.
fn class_select(tenant_id: &str) -> SelectStatement {
    Query::select()
        .column((Classes::Table, Classes::Id))
        .column((Classes::Table, Classes::Name))
        .column((Classes::Table, Classes::Level))
        .column((Classes::Table, Classes::TeacherId))
        .column((Teachers::Table, Teachers::FirstName))
        .column((Teachers::Table, Teachers::LastName))
        .expr(Func::count(Expr::col((Students::Table, Students::Id))))
        .column((Classes::Table, Classes::CreatedAt))
        .from(Classes::Table)
        .left_join(
            Teachers::Table,
            Expr::col((Teachers::Table, Teachers::Id)).equals((Classes::Table, Classes::TeacherId)),
        )
        .left_join(
            Students::Table,
            Cond::all()
                .add(
                    Expr::col((Students::Table, Students::ClassId))
                        .equals((Classes::Table, Classes::Id)),
                )
                .add(Expr::col((Students::Table, Students::DeletedAt)).is_null()),
        )
        .and_where(Expr::col((Classes::Table, Classes::TenantId)).eq(tenant_id))
        .group_by_col((Classes::Table, Classes::Id))
        .to_owned()
}

pub fn insert(tenant_id: &str, id: &str, req: &CreateClassRequest) -> Built {
    Query::insert()
        .into_table(Classes::Table)
        .columns([
            Classes::Id,
            Classes::TenantId,
            Classes::Name,
            Classes::Level,
            Classes::TeacherId,
        ])
        .values_panic([
            id.into(),
            tenant_id.into(),
            req.name.as_str().into(),
            req.level.clone().into(),
            req.teacher_id.clone().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(tenant_id: &str, id: &str) -> Built {
    class_select(tenant_id)
        .and_where(Expr::col((Classes::Table, Classes::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn list(tenant_id: &str) -> Built {
    class_select(tenant_id)
        .order_by((Classes::Table, Classes::Level), Order::Asc)
        .order_by((Classes::Table, Classes::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn exists(tenant_id: &str, id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Classes::Table)
        .and_where(Expr::col(Classes::TenantId).eq(tenant_id))
        .and_where(Expr::col(Classes::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn update(tenant_id: &str, id: &str, req: &UpdateClassRequest) -> Option<Built> {
    let mut values: Vec<(Classes, SimpleExpr)> = Vec::new();
    if let Some(ref name) = req.name {
        values.push((Classes::Name, name.as_str().into()));
    }
    if let Some(ref level) = req.level {
        values.push((Classes::Level, level.as_str().into()));
    }
    if let Some(ref teacher_id) = req.teacher_id {
        values.push((Classes::TeacherId, teacher_id.clone().into()));
    }
    if values.is_empty() {
        return None;
    }
    Some(
        Query::update()
            .table(Classes::Table)
            .values(values)
            .and_where(Expr::col(Classes::TenantId).eq(tenant_id))
            .and_where(Expr::col(Classes::Id).eq(id))
            .build(SqliteQueryBuilder),
    )
}

pub fn delete(tenant_id: &str, id: &str) -> Built {
    Query::delete()
        .from_table(Classes::Table)
        .and_where(Expr::col(Classes::TenantId).eq(tenant_id))
        .and_where(Expr::col(Classes::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn count_for_tenant(tenant_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Classes::Table)
        .and_where(Expr::col(Classes::TenantId).eq(tenant_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn class(name: &str) -> CreateClassRequest {
        CreateClassRequest {
            name: name.into(),
            level: Some("Grade 5".into()),
            teacher_id: None,
        }
    }

    #[test]
    fn class_names_unique_per_tenant_only() {
        let conn = testing::open();
        testing::seed_tenant(&conn, "t1", "alpha");
        testing::seed_tenant(&conn, "t2", "beta");
        testing::exec(&conn, insert("t1", "c1", &class("5A"))).unwrap();
        assert!(testing::exec(&conn, insert("t1", "c2", &class("5A"))).is_err());
        testing::exec(&conn, insert("t2", "c3", &class("5A"))).unwrap();
        assert_eq!(testing::column(&conn, list("t1")), vec!["c1"]);
        assert_eq!(testing::count(&conn, exists("t2", "c1")), 0);
    }

    #[test]
    fn student_count_skips_deleted_students() {
        let conn = testing::open();
        testing::seed_tenant(&conn, "t1", "alpha");
        testing::exec(&conn, insert("t1", "c1", &class("5A"))).unwrap();
        testing::exec(&conn, insert("t1", "c2", &class("5B"))).unwrap();
        conn.execute_batch(
            "INSERT INTO students (id, tenant_id, class_id, first_name, last_name) VALUES
                ('s1', 't1', 'c1', 'A', 'A'),
                ('s2', 't1', 'c1', 'B', 'B'),
                ('s3', 't1', 'c1', 'C', 'C');
             UPDATE students SET deleted_at = datetime('now') WHERE id = 's3';",
        )
        .unwrap();
        let count = testing::int_at(&conn, get_by_id("t1", "c1"), 6);
        assert_eq!(count, 2);
        assert_eq!(testing::column(&conn, list("t1")), vec!["c1", "c2"]);
    }
}
