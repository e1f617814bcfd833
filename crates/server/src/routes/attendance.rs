use axum::{
    Json,
    extract::{Query, State},
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    AttendanceQuery, AttendanceStatus, AttendanceSummaryResponse, BulkAttendanceRequest,
    BulkAttendanceResponse, ListAttendanceResponse, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, attendance_from_row, sq_count, sq_execute, sq_query_map};

fn ensure_class(conn: &Connection, tenant_id: &str, class_id: &str) -> Result<(), ApiErr> {
    let found = sq_count(conn, db::classes::exists(tenant_id, class_id))
        .map_err(ApiErr::from_db("class exists"))?;
    if found == 0 {
        return Err(ApiErr::not_found("class not found"));
    }
    Ok(())
}

/// GET /api/attendance?classId=&date=: the register for one class on one day.
pub async fn list_attendance(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<AttendanceQuery>,
) -> Result<Json<ListAttendanceResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let date = service::validate_date("date", &q.date)?;
    let conn = db.conn();
    ensure_class(&conn, tenant_id, &q.class_id)?;

    let records = sq_query_map(
        &conn,
        db::attendance::list_for_class(tenant_id, &q.class_id, &date),
        attendance_from_row,
    )
    .map_err(ApiErr::from_db("list attendance"))?;
    Ok(Json(ListAttendanceResponse { records }))
}

/// POST /api/attendance/bulk: save a class register in one transaction.
///
/// Each entry is an upsert on (student, class, date): marking a student again
/// overwrites the earlier status. A repeated student inside one submission
/// keeps only its last entry. Every student must be enrolled in the class.
pub async fn save_attendance(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<BulkAttendanceRequest>,
) -> Result<Json<BulkAttendanceResponse>, ApiErr> {
    let tenant_id = user.attendance_tenant()?;
    let class_id = service::validate_required("classId", &req.class_id, 64)?;
    let date = service::validate_date("date", &req.date)?;
    let entries = service::normalize_attendance(req.records)?;

    let mut conn = db.conn();
    ensure_class(&conn, tenant_id, &class_id)?;

    let student_ids: Vec<String> = entries.iter().map(|e| e.student_id.clone()).collect();
    let known = sq_count(&conn, db::students::count_existing(tenant_id, &student_ids))
        .map_err(ApiErr::from_db("check students"))?;
    if usize::try_from(known).unwrap_or(0) != student_ids.len() {
        return Err(ApiErr::not_found("one or more students not found"));
    }
    let enrolled = sq_count(
        &conn,
        db::students::count_enrolled(tenant_id, &class_id, &student_ids),
    )
    .map_err(ApiErr::from_db("check enrolment"))?;
    if enrolled != known {
        return Err(ApiErr::bad_request(
            "one or more students are not enrolled in this class",
        ));
    }

    let register = db::attendance::Register {
        tenant_id,
        class_id: &class_id,
        date: &date,
        marked_by: &user.user_id,
    };
    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("begin attendance"))?;
    for entry in &entries {
        let id = Uuid::new_v4().to_string();
        sq_execute(&tx, db::attendance::upsert(&register, &id, entry))
            .map_err(ApiErr::from_db("upsert attendance"))?;
    }
    tx.commit().map_err(ApiErr::from_db("commit attendance"))?;

    let records = sq_query_map(
        &conn,
        db::attendance::list_for_class(tenant_id, &class_id, &date),
        attendance_from_row,
    )
    .map_err(ApiErr::from_db("list attendance"))?;

    tracing::info!(
        tenant_id,
        class_id = %class_id,
        date = %date,
        saved = entries.len(),
        "attendance saved"
    );
    Ok(Json(BulkAttendanceResponse {
        saved: entries.len(),
        records,
    }))
}

/// GET /api/attendance/summary?classId=&date=: head count per status.
pub async fn attendance_summary(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<AttendanceQuery>,
) -> Result<Json<AttendanceSummaryResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let date = service::validate_date("date", &q.date)?;
    let conn = db.conn();
    ensure_class(&conn, tenant_id, &q.class_id)?;

    let rows: Vec<(String, i64)> = sq_query_map(
        &conn,
        db::attendance::summary(tenant_id, &q.class_id, &date),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .map_err(ApiErr::from_db("attendance summary"))?;
    let enrolled = sq_count(&conn, db::students::count_active_in_class(tenant_id, &q.class_id))
        .map_err(ApiErr::from_db("count class students"))?;

    let mut summary = AttendanceSummaryResponse {
        class_id: q.class_id,
        date,
        ..Default::default()
    };
    let mut marked = 0;
    for (status, count) in rows {
        marked += count;
        match AttendanceStatus::parse(&status) {
            Some(AttendanceStatus::Present) => summary.present = count,
            Some(AttendanceStatus::Absent) => summary.absent = count,
            Some(AttendanceStatus::Late) => summary.late = count,
            Some(AttendanceStatus::Excused) => summary.excused = count,
            None => tracing::warn!("unknown attendance status in summary: {status}"),
        }
    }
    summary.unmarked = (enrolled - marked).max(0);
    Ok(Json(summary))
}
