mod error;
mod routes;
mod storage;

#[cfg(test)]
mod tests;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post, put},
};
use std::path::{Path, PathBuf};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use schoolhub_api::{UserRole, crypto, db, service};
use storage::{Db, sq_count, sq_execute};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
}

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub jwt_secret: String,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// All `/api` routes.
fn api_router() -> Router<AppState> {
    use routes::{
        announcements, attendance, auth, classes, dashboard, health, leads, payments, plans,
        students, teachers, tenants,
    };

    Router::new()
        // Health
        .route("/health", get(health::health))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::change_password))
        // Students
        .route(
            "/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/students/{id}",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .route(
            "/students/{id}/attendance",
            get(students::student_attendance),
        )
        // Teachers
        .route(
            "/teachers",
            get(teachers::list_teachers).post(teachers::create_teacher),
        )
        .route(
            "/teachers/{id}",
            get(teachers::get_teacher)
                .put(teachers::update_teacher)
                .delete(teachers::delete_teacher),
        )
        // Classes
        .route(
            "/classes",
            get(classes::list_classes).post(classes::create_class),
        )
        .route(
            "/classes/{id}",
            get(classes::get_class)
                .put(classes::update_class)
                .delete(classes::delete_class),
        )
        .route("/classes/{id}/students", get(classes::class_students))
        // Payments
        .route(
            "/payments",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route(
            "/payments/{id}",
            get(payments::get_payment)
                .put(payments::update_payment)
                .delete(payments::delete_payment),
        )
        .route(
            "/payments/{id}/installments",
            post(payments::add_installment),
        )
        // Attendance
        .route("/attendance", get(attendance::list_attendance))
        .route("/attendance/bulk", post(attendance::save_attendance))
        .route("/attendance/summary", get(attendance::attendance_summary))
        // Announcements
        .route(
            "/announcements",
            get(announcements::list_announcements).post(announcements::create_announcement),
        )
        .route(
            "/announcements/{id}",
            axum::routing::delete(announcements::delete_announcement),
        )
        // Dashboard
        .route("/dashboard", get(dashboard::school_dashboard))
        // Platform admin
        .route("/admin/stats", get(dashboard::admin_stats))
        .route(
            "/admin/tenants",
            get(tenants::list_tenants).post(tenants::create_tenant),
        )
        .route(
            "/admin/tenants/{id}",
            get(tenants::get_tenant)
                .put(tenants::update_tenant)
                .delete(tenants::delete_tenant),
        )
        .route(
            "/admin/tenants/{id}/users",
            get(tenants::list_tenant_users).post(tenants::create_tenant_user),
        )
        .route("/admin/plans", get(plans::list_plans).post(plans::create_plan))
        .route(
            "/admin/plans/{id}",
            get(plans::get_plan)
                .put(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route("/admin/leads", get(leads::list_leads).post(leads::create_lead))
        .route(
            "/admin/leads/{id}",
            get(leads::get_lead)
                .put(leads::update_lead)
                .delete(leads::delete_lead),
        )
        .route(
            "/admin/announcements",
            post(announcements::create_platform_announcement),
        )
        .route(
            "/admin/announcements/{id}",
            axum::routing::delete(announcements::delete_platform_announcement),
        )
}

/// Full application: `/api`, optional static front end, tracing and CORS.
pub fn build_app(state: AppState, web_dir: Option<&Path>) -> Router {
    let mut app = Router::new().nest("/api", api_router());

    // Serve static files from web build if present
    if let Some(web_dir) = web_dir.filter(|d| d.exists()) {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(web_dir).fallback(ServeFile::new(index_html)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Create the first platform admin if the email is not registered yet.
/// Returns `true` when an account was created.
fn seed_platform_admin(db: &Db, email: &str, password: &str) -> anyhow::Result<bool> {
    let email = service::validate_email(email)?;
    service::validate_password(password)?;

    if sq_count(&db.conn(), db::users::email_exists(&email))? > 0 {
        return Ok(false);
    }

    let (hash, salt) = crypto::hash_password(password)?;
    let id = Uuid::new_v4().to_string();
    sq_execute(
        &db.conn(),
        db::users::insert(&db::users::InsertParams {
            id: &id,
            tenant_id: None,
            email: &email,
            name: "Platform Admin",
            role: UserRole::PlatformAdmin,
            password_hash: &hash,
            password_salt: &salt,
        }),
    )?;
    Ok(true)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schoolhub_server=info,tower_http=info".into()),
        )
        .init();

    // Data directory
    let data_dir = std::env::var("SCHOOLHUB_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    tracing::info!("data directory: {}", data_dir.display());

    // Initialize database
    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    let base_url = env_non_empty("BASE_URL").unwrap_or_else(|| "http://localhost:3000".into());

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET not set, login and authenticated endpoints are disabled");
    }

    if let (Some(email), Some(password)) = (
        env_non_empty("SCHOOLHUB_ADMIN_EMAIL"),
        env_non_empty("SCHOOLHUB_ADMIN_PASSWORD"),
    ) {
        if seed_platform_admin(&db, &email, &password)? {
            tracing::info!("seeded platform admin {email}");
        }
    }

    let config = AppConfig {
        base_url: base_url.clone(),
        jwt_secret,
    };
    let state = AppState { db, config };

    let web_dir = std::env::var("SCHOOLHUB_WEB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("web/build"));
    let app = build_app(state, Some(&web_dir));

    tracing::info!("starting server at {base_url}");

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
