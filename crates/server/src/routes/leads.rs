use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    CreateLeadRequest, LeadListQuery, LeadResponse, ListLeadsResponse, OkResponse,
    UpdateLeadRequest, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, lead_from_row, sq_execute, sq_query_map, sq_query_row};

fn load(conn: &Connection, id: &str) -> Result<LeadResponse, ApiErr> {
    sq_query_row(conn, db::leads::get_by_id(id), lead_from_row)
        .map_err(ApiErr::from_lookup("get lead", "lead not found"))
}

/// GET /api/admin/leads: optionally filtered by pipeline stage.
pub async fn list_leads(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<LeadListQuery>,
) -> Result<Json<ListLeadsResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let leads =
        sq_query_map(&conn, db::leads::list(&q), lead_from_row).map_err(ApiErr::from_db("list leads"))?;
    Ok(Json(ListLeadsResponse { leads }))
}

/// GET /api/admin/leads/:id
pub async fn get_lead(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LeadResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load(&conn, &id).map(Json)
}

/// POST /api/admin/leads
pub async fn create_lead(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<LeadResponse>), ApiErr> {
    user.require_platform_admin()?;
    let req = service::validate_create_lead(req)?;
    let id = Uuid::new_v4().to_string();
    let conn = db.conn();
    sq_execute(&conn, db::leads::insert(&id, &req)).map_err(ApiErr::from_db("insert lead"))?;
    Ok((StatusCode::CREATED, Json(load(&conn, &id)?)))
}

/// PUT /api/admin/leads/:id
pub async fn update_lead(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateLeadRequest>,
) -> Result<Json<LeadResponse>, ApiErr> {
    user.require_platform_admin()?;
    let req = service::validate_update_lead(req)?;
    let conn = db.conn();
    load(&conn, &id)?;
    if let Some(built) = db::leads::update(&id, &req) {
        sq_execute(&conn, built).map_err(ApiErr::from_db("update lead"))?;
    }
    Ok(Json(load(&conn, &id)?))
}

/// DELETE /api/admin/leads/:id
pub async fn delete_lead(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let affected =
        sq_execute(&conn, db::leads::delete(&id)).map_err(ApiErr::from_db("delete lead"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("lead not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}
