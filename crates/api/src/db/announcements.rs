//! Announcement query builders. A NULL `tenant_id` marks a platform-wide notice.

use sea_query::{Cond, Expr, Order, Query, SelectStatement, SqliteQueryBuilder};

use super::Built;
use super::tables::Announcements;

fn announcement_select() -> SelectStatement {
    Query::select()
        .columns([
            Announcements::Id,
            Announcements::TenantId,
            Announcements::Title,
            Announcements::Body,
            Announcements::CreatedBy,
            Announcements::CreatedAt,
        ])
        .from(Announcements::Table)
        .to_owned()
}

pub fn insert(
    id: &str,
    tenant_id: Option<&str>,
    title: &str,
    body: &str,
    created_by: &str,
) -> Built {
    Query::insert()
        .into_table(Announcements::Table)
        .columns([
            Announcements::Id,
            Announcements::TenantId,
            Announcements::Title,
            Announcements::Body,
            Announcements::CreatedBy,
        ])
        .values_panic([
            id.into(),
            tenant_id.map(str::to_string).into(),
            title.into(),
            body.into(),
            created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    announcement_select()
        .and_where(Expr::col(Announcements::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// The tenant's own notices plus platform-wide ones, newest first.
pub fn list_for_tenant(tenant_id: &str) -> Built {
    announcement_select()
        .cond_where(
            Cond::any()
                .add(Expr::col(Announcements::TenantId).eq(tenant_id))
                .add(Expr::col(Announcements::TenantId).is_null()),
        )
        .order_by(Announcements::CreatedAt, Order::Desc)
        .order_by(Announcements::Id, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn list_all() -> Built {
    announcement_select()
        .order_by(Announcements::CreatedAt, Order::Desc)
        .order_by(Announcements::Id, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Delete one of a tenant's notices, or a platform-wide one when `tenant_id` is `None`.
pub fn delete(tenant_id: Option<&str>, id: &str) -> Built {
    let mut q = Query::delete();
    q.from_table(Announcements::Table)
        .and_where(Expr::col(Announcements::Id).eq(id));
    match tenant_id {
        Some(t) => q.and_where(Expr::col(Announcements::TenantId).eq(t)),
        None => q.and_where(Expr::col(Announcements::TenantId).is_null()),
    };
    q.build(SqliteQueryBuilder)
}
