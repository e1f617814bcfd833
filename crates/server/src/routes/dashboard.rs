use axum::{Json, extract::State};

use schoolhub_api::{
    AdminStatsResponse, DashboardResponse, FeeTotals, PaymentStatus, TenantStatus, db,
    service::round_money,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, sq_count, sq_query_map};

/// GET /api/dashboard: head counts and fee totals for the caller's school.
pub async fn school_dashboard(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();

    let student_count = sq_count(&conn, db::students::count_for_tenant(tenant_id))
        .map_err(ApiErr::from_db("count students"))?;
    let teacher_count = sq_count(&conn, db::teachers::count_for_tenant(tenant_id))
        .map_err(ApiErr::from_db("count teachers"))?;
    let class_count = sq_count(&conn, db::classes::count_for_tenant(tenant_id))
        .map_err(ApiErr::from_db("count classes"))?;

    let rows: Vec<(String, i64, f64, f64)> = sq_query_map(
        &conn,
        db::payments::totals_by_status(tenant_id),
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )
    .map_err(ApiErr::from_db("fee totals"))?;

    let mut fees = FeeTotals::default();
    for (status, count, billed, collected) in rows {
        fees.billed += billed;
        fees.collected += collected;
        match PaymentStatus::parse(&status) {
            Some(PaymentStatus::Paid) => fees.paid = count,
            Some(PaymentStatus::Partial) => fees.partial = count,
            Some(PaymentStatus::Pending) => fees.pending = count,
            None => tracing::warn!("unknown payment status in totals: {status}"),
        }
    }
    fees.billed = round_money(fees.billed);
    fees.collected = round_money(fees.collected);
    fees.outstanding = round_money(fees.billed - fees.collected);

    Ok(Json(DashboardResponse {
        tenant_id: tenant_id.to_string(),
        student_count,
        teacher_count,
        class_count,
        fees,
    }))
}

/// GET /api/admin/stats: platform-wide totals (platform admin only).
pub async fn admin_stats(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<AdminStatsResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let count = |built, what: &str| sq_count(&conn, built).map_err(ApiErr::from_db(what));

    Ok(Json(AdminStatsResponse {
        tenant_count: count(db::tenants::count_all(), "count tenants")?,
        active_tenant_count: count(
            db::tenants::count_by_status(TenantStatus::Active),
            "count active tenants",
        )?,
        user_count: count(db::users::count_all(), "count users")?,
        student_count: count(db::students::count_all(), "count students")?,
        plan_count: count(db::plans::count_all(), "count plans")?,
        open_lead_count: count(db::leads::count_open(), "count leads")?,
    }))
}

