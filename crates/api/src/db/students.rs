//! Student record query builders.
//!
//! Soft-deleted students (`deleted_at IS NOT NULL`) are invisible to every
//! builder here; their payments and attendance rows stay in place.

use sea_query::{
    Asterisk, Cond, Expr, Func, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder,
};

use super::tables::{Classes, Students};
use super::{Built, now_expr};
use crate::service::paginate;
use crate::{CreateStudentRequest, StudentListQuery, StudentStatus, UpdateStudentRequest};

/// Student columns + class name. Order must match `student_from_row()`.
fn student_select() -> SelectStatement {
    Query::select()
        .column((Students::Table, Students::Id))
        .column((Students::Table, Students::FirstName))
        .column((Students::Table, Students::LastName))
        .column((Students::Table, Students::ClassId))
        .column((Classes::Table, Classes::Name))
        .column((Students::Table, Students::AdmissionNumber))
        .column((Students::Table, Students::DateOfBirth))
        .column((Students::Table, Students::Gender))
        .column((Students::Table, Students::GuardianName))
        .column((Students::Table, Students::GuardianPhone))
        .column((Students::Table, Students::Status))
        .column((Students::Table, Students::CreatedAt))
        .from(Students::Table)
        .left_join(
            Classes::Table,
            Expr::col((Classes::Table, Classes::Id)).equals((Students::Table, Students::ClassId)),
        )
        .to_owned()
}

/// Tenant scope plus the soft-delete filter.
fn visible(q: &mut SelectStatement, tenant_id: &str) {
    q.and_where(Expr::col((Students::Table, Students::TenantId)).eq(tenant_id))
        .and_where(Expr::col((Students::Table, Students::DeletedAt)).is_null());
}

fn apply_filters(q: &mut SelectStatement, filters: &StudentListQuery) {
    if let Some(class_id) = filters.class_id.as_deref().filter(|s| !s.is_empty()) {
        q.and_where(Expr::col((Students::Table, Students::ClassId)).eq(class_id));
    }
    if let Some(status) = filters.status {
        q.and_where(Expr::col((Students::Table, Students::Status)).eq(status.as_str()));
    }
    if let Some(search) = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{search}%");
        q.cond_where(
            Cond::any()
                .add(Expr::col((Students::Table, Students::FirstName)).like(pattern.clone()))
                .add(Expr::col((Students::Table, Students::LastName)).like(pattern.clone()))
                .add(Expr::col((Students::Table, Students::AdmissionNumber)).like(pattern)),
        );
    }
}

pub fn insert(tenant_id: &str, id: &str, req: &CreateStudentRequest) -> Built {
    Query::insert()
        .into_table(Students::Table)
        .columns([
            Students::Id,
            Students::TenantId,
            Students::ClassId,
            Students::FirstName,
            Students::LastName,
            Students::AdmissionNumber,
            Students::DateOfBirth,
            Students::Gender,
            Students::GuardianName,
            Students::GuardianPhone,
            Students::Status,
        ])
        .values_panic([
            id.into(),
            tenant_id.into(),
            req.class_id.clone().into(),
            req.first_name.as_str().into(),
            req.last_name.as_str().into(),
            req.admission_number.clone().into(),
            req.date_of_birth.clone().into(),
            req.gender.clone().into(),
            req.guardian_name.clone().into(),
            req.guardian_phone.clone().into(),
            StudentStatus::Active.as_str().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(tenant_id: &str, id: &str) -> Built {
    let mut q = student_select();
    visible(&mut q, tenant_id);
    q.and_where(Expr::col((Students::Table, Students::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// One page of students matching `filters`, ordered by name.
pub fn list(tenant_id: &str, filters: &StudentListQuery) -> Built {
    let (_, per_page, offset) = paginate(filters.page, filters.per_page);
    let mut q = student_select();
    visible(&mut q, tenant_id);
    apply_filters(&mut q, filters);
    q.order_by((Students::Table, Students::LastName), Order::Asc)
        .order_by((Students::Table, Students::FirstName), Order::Asc)
        .order_by((Students::Table, Students::Id), Order::Asc)
        .limit(u64::from(per_page))
        .offset(offset)
        .build(SqliteQueryBuilder)
}

/// Total matching `filters`, ignoring pagination.
pub fn count(tenant_id: &str, filters: &StudentListQuery) -> Built {
    let mut q = Query::select();
    q.expr(Func::count(Expr::col((Students::Table, Students::Id))))
        .from(Students::Table);
    visible(&mut q, tenant_id);
    apply_filters(&mut q, filters);
    q.build(SqliteQueryBuilder)
}

/// Active students enrolled in a class, ordered by name.
pub fn list_for_class(tenant_id: &str, class_id: &str) -> Built {
    let mut q = student_select();
    visible(&mut q, tenant_id);
    q.and_where(Expr::col((Students::Table, Students::ClassId)).eq(class_id))
        .and_where(
            Expr::col((Students::Table, Students::Status)).eq(StudentStatus::Active.as_str()),
        )
        .order_by((Students::Table, Students::LastName), Order::Asc)
        .order_by((Students::Table, Students::FirstName), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Number of active students in a class.
pub fn count_active_in_class(tenant_id: &str, class_id: &str) -> Built {
    let mut q = Query::select();
    q.expr(Func::count(Expr::col(Asterisk))).from(Students::Table);
    visible(&mut q, tenant_id);
    q.and_where(Expr::col((Students::Table, Students::ClassId)).eq(class_id))
        .and_where(
            Expr::col((Students::Table, Students::Status)).eq(StudentStatus::Active.as_str()),
        )
        .build(SqliteQueryBuilder)
}

pub fn exists(tenant_id: &str, id: &str) -> Built {
    let mut q = Query::select();
    q.expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Students::Table);
    visible(&mut q, tenant_id);
    q.and_where(Expr::col((Students::Table, Students::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// How many of `ids` are visible students of the tenant.
pub fn count_existing(tenant_id: &str, ids: &[String]) -> Built {
    let mut q = Query::select();
    q.expr(Func::count(Expr::col(Asterisk))).from(Students::Table);
    visible(&mut q, tenant_id);
    q.and_where(Expr::col((Students::Table, Students::Id)).is_in(ids.iter().map(String::as_str)))
        .build(SqliteQueryBuilder)
}

/// How many of `ids` are visible students enrolled in `class_id`.
pub fn count_enrolled(tenant_id: &str, class_id: &str, ids: &[String]) -> Built {
    let mut q = Query::select();
    q.expr(Func::count(Expr::col(Asterisk))).from(Students::Table);
    visible(&mut q, tenant_id);
    q.and_where(Expr::col((Students::Table, Students::ClassId)).eq(class_id))
        .and_where(Expr::col((Students::Table, Students::Id)).is_in(ids.iter().map(String::as_str)))
        .build(SqliteQueryBuilder)
}

/// Check whether an admission number is already used by another student.
/// Soft-deleted students still hold their number.
pub fn admission_number_taken(tenant_id: &str, number: &str, except_id: Option<&str>) -> Built {
    let mut q = Query::select();
    q.expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Students::Table)
        .and_where(Expr::col(Students::TenantId).eq(tenant_id))
        .and_where(Expr::col(Students::AdmissionNumber).eq(number));
    if let Some(id) = except_id {
        q.and_where(Expr::col(Students::Id).ne(id));
    }
    q.build(SqliteQueryBuilder)
}

pub fn update(tenant_id: &str, id: &str, req: &UpdateStudentRequest) -> Option<Built> {
    let mut values: Vec<(Students, SimpleExpr)> = Vec::new();
    let fields = [
        (Students::FirstName, &req.first_name),
        (Students::LastName, &req.last_name),
        (Students::AdmissionNumber, &req.admission_number),
        (Students::DateOfBirth, &req.date_of_birth),
        (Students::Gender, &req.gender),
        (Students::GuardianName, &req.guardian_name),
        (Students::GuardianPhone, &req.guardian_phone),
    ];
    for (column, value) in fields {
        if let Some(v) = value {
            values.push((column, v.as_str().into()));
        }
    }
    if let Some(ref class_id) = req.class_id {
        values.push((Students::ClassId, class_id.clone().into()));
    }
    if let Some(status) = req.status {
        values.push((Students::Status, status.as_str().into()));
    }
    if values.is_empty() {
        return None;
    }
    Some(
        Query::update()
            .table(Students::Table)
            .values(values)
            .and_where(Expr::col(Students::TenantId).eq(tenant_id))
            .and_where(Expr::col(Students::Id).eq(id))
            .and_where(Expr::col(Students::DeletedAt).is_null())
            .build(SqliteQueryBuilder),
    )
}

/// Soft delete. Affects zero rows if the student is already gone.
pub fn soft_delete(tenant_id: &str, id: &str) -> Built {
    Query::update()
        .table(Students::Table)
        .value(Students::DeletedAt, now_expr())
        .and_where(Expr::col(Students::TenantId).eq(tenant_id))
        .and_where(Expr::col(Students::Id).eq(id))
        .and_where(Expr::col(Students::DeletedAt).is_null())
        .build(SqliteQueryBuilder)
}

pub fn count_for_tenant(tenant_id: &str) -> Built {
    let mut q = Query::select();
    q.expr(Func::count(Expr::col(Asterisk))).from(Students::Table);
    visible(&mut q, tenant_id);
    q.build(SqliteQueryBuilder)
}

pub fn count_all() -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Students::Table)
        .and_where(Expr::col(Students::DeletedAt).is_null())
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn student(first: &str, last: &str, adm: &str) -> CreateStudentRequest {
        CreateStudentRequest {
            first_name: first.into(),
            last_name: last.into(),
            class_id: None,
            admission_number: Some(adm.into()),
            date_of_birth: None,
            gender: None,
            guardian_name: None,
            guardian_phone: None,
        }
    }

    fn seed(conn: &rusqlite::Connection) {
        testing::seed_tenant(conn, "t1", "alpha");
        testing::seed_tenant(conn, "t2", "beta");
        testing::exec(conn, insert("t1", "s1", &student("Amara", "Okafor", "A-001"))).unwrap();
        testing::exec(conn, insert("t1", "s2", &student("Kwame", "Mensah", "A-002"))).unwrap();
        testing::exec(conn, insert("t1", "s3", &student("Zainab", "Bello", "A-003"))).unwrap();
        testing::exec(conn, insert("t2", "s4", &student("Other", "School", "A-001"))).unwrap();
    }

    #[test]
    fn soft_deleted_students_disappear() {
        let conn = testing::open();
        seed(&conn);
        assert_eq!(testing::exec(&conn, soft_delete("t1", "s2")).unwrap(), 1);
        assert_eq!(testing::exec(&conn, soft_delete("t1", "s2")).unwrap(), 0);
        assert_eq!(testing::count(&conn, exists("t1", "s2")), 0);
        assert_eq!(testing::count(&conn, count_for_tenant("t1")), 2);
        assert_eq!(
            testing::column(&conn, list("t1", &StudentListQuery::default())),
            vec!["s3", "s1"]
        );
        // Row is still there for payment history.
        let raw: i64 = conn
            .query_row("SELECT COUNT(*) FROM students WHERE id = 's2'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(raw, 1);
    }

    #[test]
    fn list_is_tenant_scoped_and_paginated() {
        let conn = testing::open();
        seed(&conn);
        let page2 = StudentListQuery {
            page: 2,
            per_page: 2,
            ..Default::default()
        };
        assert_eq!(testing::column(&conn, list("t1", &page2)), vec!["s1"]);
        assert_eq!(testing::count(&conn, count("t1", &page2)), 3);
        assert_eq!(testing::count(&conn, exists("t2", "s1")), 0);
    }

    #[test]
    fn search_matches_admission_number() {
        let conn = testing::open();
        seed(&conn);
        let q = StudentListQuery {
            search: Some("A-002".into()),
            ..Default::default()
        };
        assert_eq!(testing::column(&conn, list("t1", &q)), vec!["s2"]);
        assert_eq!(testing::count(&conn, count("t1", &q)), 1);
    }

    #[test]
    fn admission_numbers_are_unique_per_tenant() {
        let conn = testing::open();
        seed(&conn);
        assert_eq!(
            testing::count(&conn, admission_number_taken("t1", "A-001", None)),
            1
        );
        assert_eq!(
            testing::count(&conn, admission_number_taken("t1", "A-001", Some("s1"))),
            0
        );
        assert!(testing::exec(&conn, insert("t1", "s9", &student("Dup", "Dup", "A-001"))).is_err());
    }

    #[test]
    fn count_existing_ignores_foreign_and_deleted() {
        let conn = testing::open();
        seed(&conn);
        testing::exec(&conn, soft_delete("t1", "s3")).unwrap();
        let ids = vec!["s1".to_string(), "s3".to_string(), "s4".to_string()];
        assert_eq!(testing::count(&conn, count_existing("t1", &ids)), 1);
    }

    #[test]
    fn class_roster_lists_active_only() {
        let conn = testing::open();
        seed(&conn);
        conn.execute_batch(
            "INSERT INTO classes (id, tenant_id, name) VALUES ('c1', 't1', '5A');
             UPDATE students SET class_id = 'c1' WHERE id IN ('s1', 's2', 's3');",
        )
        .unwrap();
        let inactive = UpdateStudentRequest {
            status: Some(StudentStatus::Inactive),
            ..Default::default()
        };
        testing::exec(&conn, update("t1", "s1", &inactive).unwrap()).unwrap();
        assert_eq!(
            testing::column(&conn, list_for_class("t1", "c1")),
            vec!["s3", "s2"]
        );
        assert_eq!(testing::count(&conn, count_active_in_class("t1", "c1")), 2);
    }

    #[test]
    fn count_enrolled_only_counts_the_class() {
        let conn = testing::open();
        seed(&conn);
        conn.execute_batch(
            "INSERT INTO classes (id, tenant_id, name) VALUES ('c1', 't1', '5A'), ('c2', 't1', '5B');
             UPDATE students SET class_id = 'c1' WHERE id IN ('s1', 's2');
             UPDATE students SET class_id = 'c2' WHERE id = 's3';",
        )
        .unwrap();
        let ids = vec!["s1".to_string(), "s3".to_string()];
        assert_eq!(testing::count(&conn, count_existing("t1", &ids)), 2);
        assert_eq!(testing::count(&conn, count_enrolled("t1", "c1", &ids)), 1);
        assert_eq!(testing::count(&conn, count_enrolled("t1", "c2", &ids)), 1);
    }

    #[test]
    fn null_class_unassigns_student() {
        let conn = testing::open();
        seed(&conn);
        conn.execute_batch(
            "INSERT INTO classes (id, tenant_id, name) VALUES ('c1', 't1', '5A');
             UPDATE students SET class_id = 'c1' WHERE id = 's1';",
        )
        .unwrap();

        let rename = UpdateStudentRequest {
            first_name: Some("Ama".into()),
            ..Default::default()
        };
        testing::exec(&conn, update("t1", "s1", &rename).unwrap()).unwrap();
        assert_eq!(testing::count(&conn, count_active_in_class("t1", "c1")), 1);

        let unassign = UpdateStudentRequest {
            class_id: Some(None),
            ..Default::default()
        };
        testing::exec(&conn, update("t1", "s1", &unassign).unwrap()).unwrap();
        assert_eq!(testing::count(&conn, count_active_in_class("t1", "c1")), 0);
    }
}
