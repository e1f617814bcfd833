//! Platform back office: school accounts and their users.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    CreateTenantRequest, CreateUserRequest, ListTenantsResponse, ListUsersResponse, OkResponse,
    TenantListQuery, TenantResponse, UpdateTenantRequest, UserResponse, crypto, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::{AuthUser, run_blocking};
use crate::storage::{Db, sq_count, sq_execute, sq_query_map, sq_query_row, tenant_from_row, user_from_row};

fn load(conn: &Connection, id: &str) -> Result<TenantResponse, ApiErr> {
    sq_query_row(conn, db::tenants::get_by_id(id), tenant_from_row)
        .map_err(ApiErr::from_lookup("get tenant", "tenant not found"))
}

fn ensure_plan(conn: &Connection, plan_id: Option<&str>) -> Result<(), ApiErr> {
    let Some(plan_id) = plan_id else {
        return Ok(());
    };
    let found = sq_count(conn, db::plans::exists(plan_id)).map_err(ApiErr::from_db("plan exists"))?;
    if found == 0 {
        return Err(ApiErr::not_found("plan not found"));
    }
    Ok(())
}

fn ensure_email_free(conn: &Connection, email: &str, except_id: Option<&str>) -> Result<(), ApiErr> {
    let taken = sq_count(conn, db::tenants::email_taken(email, except_id))
        .map_err(ApiErr::from_db("tenant email check"))?;
    if taken > 0 {
        return Err(ApiErr::conflict("a school with this email already exists"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

/// GET /api/admin/tenants: filter by status, search name / slug / email.
pub async fn list_tenants(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<TenantListQuery>,
) -> Result<Json<ListTenantsResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let tenants = sq_query_map(&conn, db::tenants::list(&q), tenant_from_row)
        .map_err(ApiErr::from_db("list tenants"))?;
    Ok(Json(ListTenantsResponse { tenants }))
}

/// GET /api/admin/tenants/:id
pub async fn get_tenant(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TenantResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load(&conn, &id).map(Json)
}

/// POST /api/admin/tenants: provision a school. Slug and email must be unique.
pub async fn create_tenant(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<TenantResponse>), ApiErr> {
    user.require_platform_admin()?;
    let req = service::validate_create_tenant(req)?;
    let conn = db.conn();

    let slug_taken = sq_count(&conn, db::tenants::slug_exists(&req.slug))
        .map_err(ApiErr::from_db("tenant slug check"))?;
    if slug_taken > 0 {
        return Err(ApiErr::conflict(format!("slug '{}' is already taken", req.slug)));
    }
    ensure_email_free(&conn, &req.email, None)?;
    ensure_plan(&conn, req.plan_id.as_deref())?;

    let id = Uuid::new_v4().to_string();
    sq_execute(&conn, db::tenants::insert(&id, &req))
        .map_err(ApiErr::from_write("insert tenant", "slug or email already taken"))?;

    tracing::info!(tenant_id = %id, slug = %req.slug, "tenant created");
    Ok((StatusCode::CREATED, Json(load(&conn, &id)?)))
}

/// PUT /api/admin/tenants/:id: partial update, including suspend / reactivate.
pub async fn update_tenant(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTenantRequest>,
) -> Result<Json<TenantResponse>, ApiErr> {
    user.require_platform_admin()?;
    let req = service::validate_update_tenant(req)?;
    let conn = db.conn();
    load(&conn, &id)?;

    if let Some(ref email) = req.email {
        ensure_email_free(&conn, email, Some(&id))?;
    }
    ensure_plan(&conn, req.plan_id.as_ref().and_then(Option::as_deref))?;

    if let Some(built) = db::tenants::update(&id, &req) {
        sq_execute(&conn, built)
            .map_err(ApiErr::from_write("update tenant", "email already taken"))?;
    }
    if let Some(status) = req.status {
        tracing::info!(tenant_id = %id, %status, "tenant status changed");
    }
    Ok(Json(load(&conn, &id)?))
}

/// DELETE /api/admin/tenants/:id: removes the school and all its records.
pub async fn delete_tenant(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let affected =
        sq_execute(&conn, db::tenants::delete(&id)).map_err(ApiErr::from_db("delete tenant"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("tenant not found"));
    }
    tracing::info!(tenant_id = %id, "tenant deleted");
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Tenant users
// ---------------------------------------------------------------------------

/// GET /api/admin/tenants/:id/users
pub async fn list_tenant_users(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ListUsersResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load(&conn, &id)?;
    let users = sq_query_map(&conn, db::users::list_for_tenant(&id), user_from_row)
        .map_err(ApiErr::from_db("list tenant users"))?;
    Ok(Json(ListUsersResponse { users }))
}

/// POST /api/admin/tenants/:id/users: create a school admin or staff account.
pub async fn create_tenant_user(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiErr> {
    user.require_platform_admin()?;
    let req = service::validate_create_user(req)?;

    {
        let conn = db.conn();
        load(&conn, &id)?;
        let taken = sq_count(&conn, db::users::email_exists(&req.email))
            .map_err(ApiErr::from_db("user email check"))?;
        if taken > 0 {
            return Err(ApiErr::conflict("email already registered"));
        }
    }

    let password = req.password.clone();
    let (hash, salt) = run_blocking(move || crypto::hash_password(&password)).await??;
    let user_id = Uuid::new_v4().to_string();
    let conn = db.conn();
    sq_execute(
        &conn,
        db::users::insert(&db::users::InsertParams {
            id: &user_id,
            tenant_id: Some(&id),
            email: &req.email,
            name: &req.name,
            role: req.role,
            password_hash: &hash,
            password_salt: &salt,
        }),
    )
    .map_err(ApiErr::from_write("insert user", "email already registered"))?;

    tracing::info!(tenant_id = %id, user_id = %user_id, role = %req.role, "tenant user created");
    let created = sq_query_row(&conn, db::users::get_for_auth(&user_id), user_from_row)
        .map_err(ApiErr::from_db("reload user"))?;
    Ok((StatusCode::CREATED, Json(created)))
}
