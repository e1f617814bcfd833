//! Teacher roster query builders. Every statement is scoped to one tenant.

use sea_query::{Asterisk, Cond, Expr, Func, Order, Query, SimpleExpr, SqliteQueryBuilder};

use super::Built;
use super::tables::Teachers;
use crate::{CreateTeacherRequest, TeacherListQuery, UpdateTeacherRequest};

const TEACHER_COLUMNS: [Teachers; 7] = [
    Teachers::Id,
    Teachers::FirstName,
    Teachers::LastName,
    Teachers::Email,
    Teachers::Phone,
    Teachers::Subject,
    Teachers::CreatedAt,
];

pub fn insert(tenant_id: &str, id: &str, req: &CreateTeacherRequest) -> Built {
    Query::insert()
        .into_table(Teachers::Table)
        .columns([
            Teachers::Id,
            Teachers::TenantId,
            Teachers::FirstName,
            Teachers::LastName,
            Teachers::Email,
            Teachers::Phone,
            Teachers::Subject,
        ])
        .values_panic([
            id.into(),
            tenant_id.into(),
            req.first_name.as_str().into(),
            req.last_name.as_str().into(),
            req.email.clone().into(),
            req.phone.clone().into(),
            req.subject.clone().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(tenant_id: &str, id: &str) -> Built {
    Query::select()
        .columns(TEACHER_COLUMNS)
        .from(Teachers::Table)
        .and_where(Expr::col(Teachers::TenantId).eq(tenant_id))
        .and_where(Expr::col(Teachers::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn list(tenant_id: &str, q: &TeacherListQuery) -> Built {
    let mut select = Query::select();
    select
        .columns(TEACHER_COLUMNS)
        .from(Teachers::Table)
        .and_where(Expr::col(Teachers::TenantId).eq(tenant_id));
    if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        select.cond_where(
            Cond::any()
                .add(Expr::col(Teachers::FirstName).like(pattern.clone()))
                .add(Expr::col(Teachers::LastName).like(pattern.clone()))
                .add(Expr::col(Teachers::Subject).like(pattern)),
        );
    }
    select
        .order_by(Teachers::LastName, Order::Asc)
        .order_by(Teachers::FirstName, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn exists(tenant_id: &str, id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Teachers::Table)
        .and_where(Expr::col(Teachers::TenantId).eq(tenant_id))
        .and_where(Expr::col(Teachers::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn update(tenant_id: &str, id: &str, req: &UpdateTeacherRequest) -> Option<Built> {
    let mut values: Vec<(Teachers, SimpleExpr)> = Vec::new();
    let fields = [
        (Teachers::FirstName, &req.first_name),
        (Teachers::LastName, &req.last_name),
        (Teachers::Email, &req.email),
        (Teachers::Phone, &req.phone),
        (Teachers::Subject, &req.subject),
    ];
    for (column, value) in fields {
        if let Some(v) = value {
            values.push((column, v.as_str().into()));
        }
    }
    if values.is_empty() {
        return None;
    }
    Some(
        Query::update()
            .table(Teachers::Table)
            .values(values)
            .and_where(Expr::col(Teachers::TenantId).eq(tenant_id))
            .and_where(Expr::col(Teachers::Id).eq(id))
            .build(SqliteQueryBuilder),
    )
}

pub fn delete(tenant_id: &str, id: &str) -> Built {
    Query::delete()
        .from_table(Teachers::Table)
        .and_where(Expr::col(Teachers::TenantId).eq(tenant_id))
        .and_where(Expr::col(Teachers::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn count_for_tenant(tenant_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Teachers::Table)
        .and_where(Expr::col(Teachers::TenantId).eq(tenant_id))
        .build(SqliteQueryBuilder)
}
