use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    AttendanceHistoryQuery, CreateStudentRequest, ListAttendanceResponse, OkResponse,
    StudentListQuery, StudentListResponse, StudentResponse, UpdateStudentRequest, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, attendance_from_row, sq_count, sq_execute, sq_query_map, sq_query_row, student_from_row,
};

/// Referenced class must belong to the tenant.
fn ensure_class(conn: &Connection, tenant_id: &str, class_id: Option<&str>) -> Result<(), ApiErr> {
    let Some(class_id) = class_id else {
        return Ok(());
    };
    let found =
        sq_count(conn, db::classes::exists(tenant_id, class_id)).map_err(ApiErr::from_db("class exists"))?;
    if found == 0 {
        return Err(ApiErr::not_found("class not found"));
    }
    Ok(())
}

fn ensure_admission_number_free(
    conn: &Connection,
    tenant_id: &str,
    number: Option<&str>,
    except_id: Option<&str>,
) -> Result<(), ApiErr> {
    let Some(number) = number else {
        return Ok(());
    };
    let taken = sq_count(
        conn,
        db::students::admission_number_taken(tenant_id, number, except_id),
    )
    .map_err(ApiErr::from_db("admission number check"))?;
    if taken > 0 {
        return Err(ApiErr::conflict("admission number already in use"));
    }
    Ok(())
}

fn load(conn: &Connection, tenant_id: &str, id: &str) -> Result<StudentResponse, ApiErr> {
    sq_query_row(conn, db::students::get_by_id(tenant_id, id), student_from_row)
        .map_err(ApiErr::from_lookup("get student", "student not found"))
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

/// GET /api/students: paginated, filtered by class, status or name.
pub async fn list_students(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<StudentListQuery>,
) -> Result<Json<StudentListResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let (page, per_page, _) = service::paginate(q.page, q.per_page);
    let conn = db.conn();

    let total = sq_count(&conn, db::students::count(tenant_id, &q))
        .map_err(ApiErr::from_db("count students"))?;
    let students = sq_query_map(&conn, db::students::list(tenant_id, &q), student_from_row)
        .map_err(ApiErr::from_db("list students"))?;

    Ok(Json(StudentListResponse {
        students,
        total,
        page,
        per_page,
    }))
}

/// GET /api/students/:id
pub async fn get_student(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<StudentResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();
    load(&conn, tenant_id, &id).map(Json)
}

// ---------------------------------------------------------------------------
// Create / update / delete
// ---------------------------------------------------------------------------

/// POST /api/students: enroll a student (school admin only).
pub async fn create_student(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<StudentResponse>), ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let req = service::validate_create_student(req)?;
    let conn = db.conn();

    ensure_class(&conn, tenant_id, req.class_id.as_deref())?;
    ensure_admission_number_free(&conn, tenant_id, req.admission_number.as_deref(), None)?;

    let id = Uuid::new_v4().to_string();
    sq_execute(&conn, db::students::insert(tenant_id, &id, &req))
        .map_err(ApiErr::from_write("insert student", "admission number already in use"))?;

    tracing::info!(tenant_id, student_id = %id, "student created");
    Ok((StatusCode::CREATED, Json(load(&conn, tenant_id, &id)?)))
}

/// PUT /api/students/:id: partial update (school admin only).
pub async fn update_student(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStudentRequest>,
) -> Result<Json<StudentResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let req = service::validate_update_student(req)?;
    let conn = db.conn();

    load(&conn, tenant_id, &id)?;
    ensure_class(&conn, tenant_id, req.class_id.as_ref().and_then(Option::as_deref))?;
    ensure_admission_number_free(&conn, tenant_id, req.admission_number.as_deref(), Some(&id))?;

    if let Some(built) = db::students::update(tenant_id, &id, &req) {
        sq_execute(&conn, built)
            .map_err(ApiErr::from_write("update student", "admission number already in use"))?;
    }

    Ok(Json(load(&conn, tenant_id, &id)?))
}

/// DELETE /api/students/:id: soft delete; payment history is kept.
pub async fn delete_student(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let conn = db.conn();
    let affected = sq_execute(&conn, db::students::soft_delete(tenant_id, &id))
        .map_err(ApiErr::from_db("delete student"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("student not found"));
    }
    tracing::info!(tenant_id, student_id = %id, "student deleted");
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Attendance history
// ---------------------------------------------------------------------------

/// GET /api/students/:id/attendance: marks across all classes, newest first.
pub async fn student_attendance(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Query(q): Query<AttendanceHistoryQuery>,
) -> Result<Json<ListAttendanceResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let q = AttendanceHistoryQuery {
        from: q
            .from
            .map(|d| service::validate_date("from", &d))
            .transpose()?,
        to: q.to.map(|d| service::validate_date("to", &d)).transpose()?,
    };
    let conn = db.conn();
    load(&conn, tenant_id, &id)?;

    let records = sq_query_map(
        &conn,
        db::attendance::history_for_student(tenant_id, &id, &q),
        attendance_from_row,
    )
    .map_err(ApiErr::from_db("student attendance"))?;
    Ok(Json(ListAttendanceResponse { records }))
}
