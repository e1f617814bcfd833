//! Attendance register query builders.
//!
//! One row per (student, class, date). Marking the same student again for
//! the same class and day overwrites the earlier mark.

use sea_query::{
    Asterisk, Expr, Func, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder,
};

use super::tables::{Attendance, Students};
use super::{Built, now_expr};
use crate::{AttendanceEntry, AttendanceHistoryQuery};

/// Attendance columns + student names. Order must match `attendance_from_row()`.
fn attendance_select(tenant_id: &str) -> SelectStatement {
    Query::select()
        .column((Attendance::Table, Attendance::Id))
        .column((Attendance::Table, Attendance::StudentId))
        .column((Students::Table, Students::FirstName))
        .column((Students::Table, Students::LastName))
        .column((Attendance::Table, Attendance::ClassId))
        .column((Attendance::Table, Attendance::Date))
        .column((Attendance::Table, Attendance::Status))
        .column((Attendance::Table, Attendance::Remarks))
        .column((Attendance::Table, Attendance::MarkedBy))
        .column((Attendance::Table, Attendance::UpdatedAt))
        .from(Attendance::Table)
        .inner_join(
            Students::Table,
            Expr::col((Students::Table, Students::Id))
                .equals((Attendance::Table, Attendance::StudentId)),
        )
        .and_where(Expr::col((Attendance::Table, Attendance::TenantId)).eq(tenant_id))
        .to_owned()
}

/// Where a mark is being written.
pub struct Register<'a> {
    pub tenant_id: &'a str,
    pub class_id: &'a str,
    pub date: &'a str,
    pub marked_by: &'a str,
}

/// Insert a mark, or overwrite status/remarks/marker of the existing one.
pub fn upsert(reg: &Register<'_>, id: &str, entry: &AttendanceEntry) -> Built {
    Query::insert()
        .into_table(Attendance::Table)
        .columns([
            Attendance::Id,
            Attendance::TenantId,
            Attendance::StudentId,
            Attendance::ClassId,
            Attendance::Date,
            Attendance::Status,
            Attendance::Remarks,
            Attendance::MarkedBy,
        ])
        .values_panic([
            id.into(),
            reg.tenant_id.into(),
            entry.student_id.as_str().into(),
            reg.class_id.into(),
            reg.date.into(),
            entry.status.as_str().into(),
            entry.remarks.clone().into(),
            reg.marked_by.into(),
        ])
        .on_conflict(
            OnConflict::columns([Attendance::StudentId, Attendance::ClassId, Attendance::Date])
                .update_columns([Attendance::Status, Attendance::Remarks, Attendance::MarkedBy])
                .value(Attendance::UpdatedAt, now_expr())
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// The register for one class on one day, ordered by student name.
pub fn list_for_class(tenant_id: &str, class_id: &str, date: &str) -> Built {
    attendance_select(tenant_id)
        .and_where(Expr::col((Attendance::Table, Attendance::ClassId)).eq(class_id))
        .and_where(Expr::col((Attendance::Table, Attendance::Date)).eq(date))
        .order_by((Students::Table, Students::LastName), Order::Asc)
        .order_by((Students::Table, Students::FirstName), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Rows of `(status, count)` for one class on one day.
pub fn summary(tenant_id: &str, class_id: &str, date: &str) -> Built {
    Query::select()
        .column(Attendance::Status)
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Attendance::Table)
        .and_where(Expr::col(Attendance::TenantId).eq(tenant_id))
        .and_where(Expr::col(Attendance::ClassId).eq(class_id))
        .and_where(Expr::col(Attendance::Date).eq(date))
        .group_by_col(Attendance::Status)
        .build(SqliteQueryBuilder)
}

/// One student's marks across all classes, newest day first.
pub fn history_for_student(tenant_id: &str, student_id: &str, q: &AttendanceHistoryQuery) -> Built {
    let mut select = attendance_select(tenant_id);
    select.and_where(Expr::col((Attendance::Table, Attendance::StudentId)).eq(student_id));
    if let Some(from) = q.from.as_deref() {
        select.and_where(Expr::col((Attendance::Table, Attendance::Date)).gte(from));
    }
    if let Some(to) = q.to.as_deref() {
        select.and_where(Expr::col((Attendance::Table, Attendance::Date)).lte(to));
    }
    select
        .order_by((Attendance::Table, Attendance::Date), Order::Desc)
        .order_by((Attendance::Table, Attendance::ClassId), Order::Asc)
        .build(SqliteQueryBuilder)
}
