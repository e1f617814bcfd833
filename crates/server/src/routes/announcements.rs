use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    AnnouncementResponse, CreateAnnouncementRequest, ListAnnouncementsResponse, OkResponse,
    UserRole, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, announcement_from_row, sq_execute, sq_query_map, sq_query_row};

fn insert(
    conn: &Connection,
    tenant_id: Option<&str>,
    author: &str,
    req: CreateAnnouncementRequest,
) -> Result<AnnouncementResponse, ApiErr> {
    let title = service::validate_required("title", &req.title, 200)?;
    let body = service::validate_required("body", &req.body, 5000)?;
    let id = Uuid::new_v4().to_string();
    sq_execute(
        conn,
        db::announcements::insert(&id, tenant_id, &title, &body, author),
    )
    .map_err(ApiErr::from_db("insert announcement"))?;
    sq_query_row(conn, db::announcements::get_by_id(&id), announcement_from_row)
        .map_err(ApiErr::from_db("reload announcement"))
}

/// GET /api/announcements: own school's notices plus platform-wide ones.
/// Platform admins see everything.
pub async fn list_announcements(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListAnnouncementsResponse>, ApiErr> {
    let built = match (user.role, user.tenant_id.as_deref()) {
        (UserRole::PlatformAdmin, _) => db::announcements::list_all(),
        (_, Some(tenant_id)) => db::announcements::list_for_tenant(tenant_id),
        (_, None) => return Err(ApiErr::forbidden("this endpoint requires a school account")),
    };
    let conn = db.conn();
    let announcements = sq_query_map(&conn, built, announcement_from_row)
        .map_err(ApiErr::from_db("list announcements"))?;
    Ok(Json(ListAnnouncementsResponse { announcements }))
}

/// POST /api/announcements: notice for the caller's school.
pub async fn create_announcement(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<AnnouncementResponse>), ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let conn = db.conn();
    let created = insert(&conn, Some(tenant_id), &user.user_id, req)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/announcements/:id: only the school's own notices.
pub async fn delete_announcement(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let conn = db.conn();
    let affected = sq_execute(&conn, db::announcements::delete(Some(tenant_id), &id))
        .map_err(ApiErr::from_db("delete announcement"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("announcement not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}

/// POST /api/admin/announcements: platform-wide notice (platform admin only).
pub async fn create_platform_announcement(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<AnnouncementResponse>), ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let created = insert(&conn, None, &user.user_id, req)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/admin/announcements/:id
pub async fn delete_platform_announcement(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let affected = sq_execute(&conn, db::announcements::delete(None, &id))
        .map_err(ApiErr::from_db("delete announcement"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("announcement not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}
