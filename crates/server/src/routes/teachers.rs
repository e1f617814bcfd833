use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    CreateTeacherRequest, ListTeachersResponse, OkResponse, TeacherListQuery, TeacherResponse,
    UpdateTeacherRequest, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, sq_execute, sq_query_map, sq_query_row, teacher_from_row};

fn load(conn: &Connection, tenant_id: &str, id: &str) -> Result<TeacherResponse, ApiErr> {
    sq_query_row(conn, db::teachers::get_by_id(tenant_id, id), teacher_from_row)
        .map_err(ApiErr::from_lookup("get teacher", "teacher not found"))
}

/// GET /api/teachers: roster, optionally filtered by name or subject.
pub async fn list_teachers(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<TeacherListQuery>,
) -> Result<Json<ListTeachersResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();
    let teachers = sq_query_map(&conn, db::teachers::list(tenant_id, &q), teacher_from_row)
        .map_err(ApiErr::from_db("list teachers"))?;
    Ok(Json(ListTeachersResponse { teachers }))
}

/// GET /api/teachers/:id
pub async fn get_teacher(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TeacherResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();
    load(&conn, tenant_id, &id).map(Json)
}

/// POST /api/teachers
pub async fn create_teacher(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateTeacherRequest>,
) -> Result<(StatusCode, Json<TeacherResponse>), ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let req = service::validate_create_teacher(req)?;
    let id = Uuid::new_v4().to_string();
    let conn = db.conn();
    sq_execute(&conn, db::teachers::insert(tenant_id, &id, &req))
        .map_err(ApiErr::from_db("insert teacher"))?;
    Ok((StatusCode::CREATED, Json(load(&conn, tenant_id, &id)?)))
}

/// PUT /api/teachers/:id
pub async fn update_teacher(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTeacherRequest>,
) -> Result<Json<TeacherResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let req = service::validate_update_teacher(req)?;
    let conn = db.conn();
    load(&conn, tenant_id, &id)?;
    if let Some(built) = db::teachers::update(tenant_id, &id, &req) {
        sq_execute(&conn, built).map_err(ApiErr::from_db("update teacher"))?;
    }
    Ok(Json(load(&conn, tenant_id, &id)?))
}

/// DELETE /api/teachers/:id: classes they taught keep existing without a teacher.
pub async fn delete_teacher(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let conn = db.conn();
    let affected = sq_execute(&conn, db::teachers::delete(tenant_id, &id))
        .map_err(ApiErr::from_db("delete teacher"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("teacher not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}
