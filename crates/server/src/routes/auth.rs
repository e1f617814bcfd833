use axum::{
    Json,
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts},
};

use schoolhub_api::{
    AuthTokenResponse, ChangePasswordRequest, LoginRequest, OkResponse, TenantStatus,
    UserResponse, UserRole, crypto, db, service,
};

use crate::AppConfig;
use crate::error::ApiErr;
use crate::storage::{Db, sq_execute, sq_query_row, user_from_row, user_tenant_status};

pub(crate) fn now_unix() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Run PBKDF2 work on the blocking pool so it does not stall async workers.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiErr>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiErr::from_db("password task"))
}

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Authenticated user extracted from the `Authorization: Bearer <jwt>` header.
///
/// Users of a suspended school are rejected here, so every handler taking
/// an `AuthUser` is closed to them.
pub struct AuthUser {
    pub user_id: String,
    pub tenant_id: Option<String>,
    pub role: UserRole,
}

impl AuthUser {
    /// The caller's school. Platform admins have none.
    pub fn tenant(&self) -> Result<&str, ApiErr> {
        self.tenant_id
            .as_deref()
            .ok_or_else(|| ApiErr::forbidden("this endpoint requires a school account"))
    }

    /// The caller's school, if they may write its records.
    pub fn manager_tenant(&self) -> Result<&str, ApiErr> {
        let tenant = self.tenant()?;
        if !self.role.can_manage_records() {
            return Err(ApiErr::forbidden("school admin role required"));
        }
        Ok(tenant)
    }

    /// The caller's school, if they may mark attendance in it.
    pub fn attendance_tenant(&self) -> Result<&str, ApiErr> {
        let tenant = self.tenant()?;
        if !self.role.can_mark_attendance() {
            return Err(ApiErr::forbidden("not allowed to mark attendance"));
        }
        Ok(tenant)
    }

    pub fn require_platform_admin(&self) -> Result<(), ApiErr> {
        if self.role != UserRole::PlatformAdmin {
            return Err(ApiErr::forbidden("platform admin only"));
        }
        Ok(())
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = Db::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(service::bearer_token)
            .ok_or_else(|| ApiErr::unauthorized("missing or invalid Authorization header"))?;

        let user_id = service::resolve_auth_token(token, &config.jwt_secret, now_unix())?;

        let conn = db.conn();
        let (user, tenant_status) = sq_query_row(&conn, db::users::get_for_auth(&user_id), |row| {
            Ok((user_from_row(row)?, user_tenant_status(row)?))
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => ApiErr::unauthorized("user no longer exists"),
            e => ApiErr::from_db("load auth user")(e),
        })?;

        if tenant_status == Some(TenantStatus::Suspended) {
            return Err(ApiErr::forbidden("school account is suspended"));
        }

        Ok(AuthUser {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
        })
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// POST /api/auth/login: exchange email + password for an access token.
pub async fn login(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let email = service::validate_email(&req.email)?;

    let found = {
        let conn = db.conn();
        sq_query_row(&conn, db::users::get_by_email_for_login(&email), |row| {
            Ok((
                user_from_row(row)?,
                user_tenant_status(row)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })
    };
    let (user, tenant_status, hash, salt) = match found {
        Ok(found) => found,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(ApiErr::unauthorized("invalid email or password"));
        }
        Err(e) => return Err(ApiErr::from_db("login lookup")(e)),
    };

    let password = req.password;
    let valid = run_blocking(move || crypto::verify_password(&password, &hash, &salt)).await?;
    if !valid {
        return Err(ApiErr::unauthorized("invalid email or password"));
    }
    if tenant_status == Some(TenantStatus::Suspended) {
        return Err(ApiErr::forbidden("school account is suspended"));
    }

    tracing::info!(user_id = %user.id, role = %user.role, "login");
    let tokens = service::issue_access_token(&config.jwt_secret, user, now_unix())?;
    Ok(Json(tokens))
}

// ---------------------------------------------------------------------------
// Current user
// ---------------------------------------------------------------------------

/// GET /api/auth/me: profile of the authenticated user.
pub async fn me(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<UserResponse>, ApiErr> {
    let conn = db.conn();
    sq_query_row(&conn, db::users::get_for_auth(&user.user_id), user_from_row)
        .map(Json)
        .map_err(ApiErr::from_lookup("me", "user not found"))
}

// ---------------------------------------------------------------------------
// Change password
// ---------------------------------------------------------------------------

/// PUT /api/auth/password: change own password (current password required).
pub async fn change_password(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    service::validate_password(&req.new_password)?;

    let (hash, salt): (String, String) = {
        let conn = db.conn();
        sq_query_row(&conn, db::users::get_password_fields(&user.user_id), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(ApiErr::from_lookup("password fields", "user not found"))?
    };

    let current = req.current_password;
    let valid = run_blocking(move || crypto::verify_password(&current, &hash, &salt)).await?;
    if !valid {
        return Err(ApiErr::unauthorized("current password is incorrect"));
    }

    let new_password = req.new_password;
    let (new_hash, new_salt) = run_blocking(move || crypto::hash_password(&new_password)).await??;
    let conn = db.conn();
    sq_execute(
        &conn,
        db::users::update_password(&user.user_id, &new_hash, &new_salt),
    )
    .map_err(ApiErr::from_db("update password"))?;

    tracing::info!(user_id = %user.user_id, "password changed");
    Ok(Json(OkResponse { ok: true }))
}
