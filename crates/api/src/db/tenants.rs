//! Tenant (school account) query builders.

use sea_query::{
    Asterisk, Cond, Expr, Func, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder,
};

use super::Built;
use super::tables::{Plans, Tenants};
use crate::{CreateTenantRequest, TenantListQuery, TenantStatus, UpdateTenantRequest};

/// Columns for tenant SELECTs (with plan name). Order must match `tenant_from_row()`.
fn tenant_select() -> SelectStatement {
    Query::select()
        .column((Tenants::Table, Tenants::Id))
        .column((Tenants::Table, Tenants::Name))
        .column((Tenants::Table, Tenants::Slug))
        .column((Tenants::Table, Tenants::Email))
        .column((Tenants::Table, Tenants::Phone))
        .column((Tenants::Table, Tenants::Address))
        .column((Tenants::Table, Tenants::PlanId))
        .column((Plans::Table, Plans::Name))
        .column((Tenants::Table, Tenants::Status))
        .column((Tenants::Table, Tenants::CreatedAt))
        .from(Tenants::Table)
        .left_join(
            Plans::Table,
            Expr::col((Plans::Table, Plans::Id)).equals((Tenants::Table, Tenants::PlanId)),
        )
        .to_owned()
}

pub fn insert(id: &str, req: &CreateTenantRequest) -> Built {
    Query::insert()
        .into_table(Tenants::Table)
        .columns([
            Tenants::Id,
            Tenants::Name,
            Tenants::Slug,
            Tenants::Email,
            Tenants::Phone,
            Tenants::Address,
            Tenants::PlanId,
            Tenants::Status,
        ])
        .values_panic([
            id.into(),
            req.name.as_str().into(),
            req.slug.as_str().into(),
            req.email.as_str().into(),
            req.phone.clone().into(),
            req.address.clone().into(),
            req.plan_id.clone().into(),
            TenantStatus::Active.as_str().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    tenant_select()
        .and_where(Expr::col((Tenants::Table, Tenants::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn list(q: &TenantListQuery) -> Built {
    let mut select = tenant_select();
    if let Some(status) = q.status {
        select.and_where(Expr::col((Tenants::Table, Tenants::Status)).eq(status.as_str()));
    }
    if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        select.cond_where(
            Cond::any()
                .add(Expr::col((Tenants::Table, Tenants::Name)).like(pattern.clone()))
                .add(Expr::col((Tenants::Table, Tenants::Slug)).like(pattern.clone()))
                .add(Expr::col((Tenants::Table, Tenants::Email)).like(pattern)),
        );
    }
    select
        .order_by((Tenants::Table, Tenants::CreatedAt), Order::Desc)
        .order_by((Tenants::Table, Tenants::Slug), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Check whether a slug is taken.
pub fn slug_exists(slug: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Tenants::Table)
        .and_where(Expr::col(Tenants::Slug).eq(slug))
        .build(SqliteQueryBuilder)
}

/// Check whether a contact email is taken by a tenant other than `except_id`.
pub fn email_taken(email: &str, except_id: Option<&str>) -> Built {
    let mut q = Query::select();
    q.expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Tenants::Table)
        .and_where(Expr::col(Tenants::Email).eq(email));
    if let Some(id) = except_id {
        q.and_where(Expr::col(Tenants::Id).ne(id));
    }
    q.build(SqliteQueryBuilder)
}

/// Apply the present fields of `req`. Returns `None` if nothing would change.
pub fn update(id: &str, req: &UpdateTenantRequest) -> Option<Built> {
    let mut values: Vec<(Tenants, SimpleExpr)> = Vec::new();
    if let Some(ref name) = req.name {
        values.push((Tenants::Name, name.as_str().into()));
    }
    if let Some(ref email) = req.email {
        values.push((Tenants::Email, email.as_str().into()));
    }
    if let Some(ref phone) = req.phone {
        values.push((Tenants::Phone, phone.as_str().into()));
    }
    if let Some(ref address) = req.address {
        values.push((Tenants::Address, address.as_str().into()));
    }
    if let Some(ref plan_id) = req.plan_id {
        values.push((Tenants::PlanId, plan_id.clone().into()));
    }
    if let Some(status) = req.status {
        values.push((Tenants::Status, status.as_str().into()));
    }
    if values.is_empty() {
        return None;
    }
    Some(
        Query::update()
            .table(Tenants::Table)
            .values(values)
            .and_where(Expr::col(Tenants::Id).eq(id))
            .build(SqliteQueryBuilder),
    )
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Tenants::Table)
        .and_where(Expr::col(Tenants::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn count_all() -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Tenants::Table)
        .build(SqliteQueryBuilder)
}

pub fn count_by_status(status: TenantStatus) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Tenants::Table)
        .and_where(Expr::col(Tenants::Status).eq(status.as_str()))
        .build(SqliteQueryBuilder)
}
