//! User / auth query builders.

use sea_query::{Asterisk, Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder};

use super::Built;
use super::tables::{Tenants, Users};

/// Profile columns. Order must match the server's `user_from_row()`.
fn user_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((Users::Table, Users::Id))
        .column((Users::Table, Users::TenantId))
        .column((Users::Table, Users::Email))
        .column((Users::Table, Users::Name))
        .column((Users::Table, Users::Role))
        .column((Users::Table, Users::CreatedAt))
}

fn with_tenant_status(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((Tenants::Table, Tenants::Status))
        .from(Users::Table)
        .left_join(
            Tenants::Table,
            Expr::col((Tenants::Table, Tenants::Id)).equals((Users::Table, Users::TenantId)),
        )
}

// ── User lookups ───────────────────────────────────────────────────────────

/// Profile plus owning tenant's status (NULL for platform admins).
pub fn get_for_auth(user_id: &str) -> Built {
    let mut q = Query::select();
    user_columns(&mut q);
    with_tenant_status(&mut q)
        .and_where(Expr::col((Users::Table, Users::Id)).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Profile, tenant status, then `password_hash`, `password_salt`.
pub fn get_by_email_for_login(email: &str) -> Built {
    let mut q = Query::select();
    user_columns(&mut q);
    with_tenant_status(&mut q)
        .column((Users::Table, Users::PasswordHash))
        .column((Users::Table, Users::PasswordSalt))
        .and_where(Expr::col((Users::Table, Users::Email)).eq(email))
        .build(SqliteQueryBuilder)
}

/// Check email existence.
pub fn email_exists(email: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Users of one school, oldest first.
pub fn list_for_tenant(tenant_id: &str) -> Built {
    let mut q = Query::select();
    user_columns(&mut q);
    q.from(Users::Table)
        .and_where(Expr::col((Users::Table, Users::TenantId)).eq(tenant_id))
        .order_by((Users::Table, Users::CreatedAt), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Get password hash/salt for a user.
pub fn get_password_fields(user_id: &str) -> Built {
    Query::select()
        .columns([Users::PasswordHash, Users::PasswordSalt])
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn count_all() -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Users::Table)
        .build(SqliteQueryBuilder)
}

// ── User writes ────────────────────────────────────────────────────────────

/// Parameters for inserting a user.
pub struct InsertParams<'a> {
    pub id: &'a str,
    pub tenant_id: Option<&'a str>,
    pub email: &'a str,
    pub name: &'a str,
    pub role: crate::UserRole,
    pub password_hash: &'a str,
    pub password_salt: &'a str,
}

pub fn insert(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::Id,
            Users::TenantId,
            Users::Email,
            Users::Name,
            Users::Role,
            Users::PasswordHash,
            Users::PasswordSalt,
        ])
        .values_panic([
            p.id.into(),
            p.tenant_id.map(str::to_string).into(),
            p.email.into(),
            p.name.into(),
            p.role.as_str().into(),
            p.password_hash.into(),
            p.password_salt.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Update password.
pub fn update_password(user_id: &str, password_hash: &str, password_salt: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::PasswordHash, password_hash)
        .value(Users::PasswordSalt, password_salt)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}
