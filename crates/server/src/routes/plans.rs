use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    CreatePlanRequest, ListPlansResponse, OkResponse, PlanResponse, UpdatePlanRequest, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, plan_from_row, sq_execute, sq_query_map, sq_query_row};

const DUPLICATE_PLAN: &str = "a plan with this name already exists";

fn load(conn: &Connection, id: &str) -> Result<PlanResponse, ApiErr> {
    sq_query_row(conn, db::plans::get_by_id(id), plan_from_row)
        .map_err(ApiErr::from_lookup("get plan", "plan not found"))
}

/// GET /api/admin/plans
pub async fn list_plans(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListPlansResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let plans =
        sq_query_map(&conn, db::plans::list(), plan_from_row).map_err(ApiErr::from_db("list plans"))?;
    Ok(Json(ListPlansResponse { plans }))
}

/// GET /api/admin/plans/:id
pub async fn get_plan(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PlanResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load(&conn, &id).map(Json)
}

/// POST /api/admin/plans
pub async fn create_plan(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<PlanResponse>), ApiErr> {
    user.require_platform_admin()?;
    let req = service::validate_create_plan(req)?;
    let id = Uuid::new_v4().to_string();
    let conn = db.conn();
    sq_execute(&conn, db::plans::insert(&id, &req))
        .map_err(ApiErr::from_write("insert plan", DUPLICATE_PLAN))?;
    Ok((StatusCode::CREATED, Json(load(&conn, &id)?)))
}

/// PUT /api/admin/plans/:id
pub async fn update_plan(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePlanRequest>,
) -> Result<Json<PlanResponse>, ApiErr> {
    user.require_platform_admin()?;
    let req = service::validate_update_plan(req)?;
    let conn = db.conn();
    load(&conn, &id)?;
    if let Some(built) = db::plans::update(&id, &req) {
        sq_execute(&conn, built).map_err(ApiErr::from_write("update plan", DUPLICATE_PLAN))?;
    }
    Ok(Json(load(&conn, &id)?))
}

/// DELETE /api/admin/plans/:id: tenants on the plan are left without one.
pub async fn delete_plan(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let affected =
        sq_execute(&conn, db::plans::delete(&id)).map_err(ApiErr::from_db("delete plan"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("plan not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}
