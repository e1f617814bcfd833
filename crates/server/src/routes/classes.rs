use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    ClassResponse, CreateClassRequest, ListClassesResponse, OkResponse, StudentResponse,
    UpdateClassRequest, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, class_from_row, sq_count, sq_execute, sq_query_map, sq_query_row, student_from_row,
};

const DUPLICATE_CLASS: &str = "a class with this name already exists";

fn load(conn: &Connection, tenant_id: &str, id: &str) -> Result<ClassResponse, ApiErr> {
    sq_query_row(conn, db::classes::get_by_id(tenant_id, id), class_from_row)
        .map_err(ApiErr::from_lookup("get class", "class not found"))
}

fn ensure_teacher(conn: &Connection, tenant_id: &str, teacher_id: Option<&str>) -> Result<(), ApiErr> {
    let Some(teacher_id) = teacher_id else {
        return Ok(());
    };
    let found = sq_count(conn, db::teachers::exists(tenant_id, teacher_id))
        .map_err(ApiErr::from_db("teacher exists"))?;
    if found == 0 {
        return Err(ApiErr::not_found("teacher not found"));
    }
    Ok(())
}

/// GET /api/classes: with teacher names and enrolment counts.
pub async fn list_classes(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListClassesResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();
    let classes = sq_query_map(&conn, db::classes::list(tenant_id), class_from_row)
        .map_err(ApiErr::from_db("list classes"))?;
    Ok(Json(ListClassesResponse { classes }))
}

/// GET /api/classes/:id
pub async fn get_class(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ClassResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();
    load(&conn, tenant_id, &id).map(Json)
}

/// GET /api/classes/:id/students: active students enrolled in the class.
pub async fn class_students(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<StudentResponse>>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();
    load(&conn, tenant_id, &id)?;
    let students = sq_query_map(
        &conn,
        db::students::list_for_class(tenant_id, &id),
        student_from_row,
    )
    .map_err(ApiErr::from_db("class students"))?;
    Ok(Json(students))
}

/// POST /api/classes
pub async fn create_class(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<ClassResponse>), ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let req = service::validate_create_class(req)?;
    let conn = db.conn();
    ensure_teacher(&conn, tenant_id, req.teacher_id.as_deref())?;

    let id = Uuid::new_v4().to_string();
    sq_execute(&conn, db::classes::insert(tenant_id, &id, &req))
        .map_err(ApiErr::from_write("insert class", DUPLICATE_CLASS))?;
    Ok((StatusCode::CREATED, Json(load(&conn, tenant_id, &id)?)))
}

/// PUT /api/classes/:id
pub async fn update_class(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateClassRequest>,
) -> Result<Json<ClassResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let req = service::validate_update_class(req)?;
    let conn = db.conn();
    load(&conn, tenant_id, &id)?;
    ensure_teacher(&conn, tenant_id, req.teacher_id.as_ref().and_then(Option::as_deref))?;

    if let Some(built) = db::classes::update(tenant_id, &id, &req) {
        sq_execute(&conn, built).map_err(ApiErr::from_write("update class", DUPLICATE_CLASS))?;
    }
    Ok(Json(load(&conn, tenant_id, &id)?))
}

/// DELETE /api/classes/:id: students stay enrolled in the school, unassigned.
pub async fn delete_class(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let conn = db.conn();
    let affected = sq_execute(&conn, db::classes::delete(tenant_id, &id))
        .map_err(ApiErr::from_db("delete class"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("class not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}
