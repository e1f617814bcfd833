use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use schoolhub_api::{
    CreatePaymentRequest, InstallmentRequest, ListPaymentsResponse, OkResponse,
    PaymentListQuery, PaymentResponse, UpdatePaymentRequest, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, payment_from_row, sq_count, sq_execute, sq_query_map, sq_query_row};

fn load(conn: &Connection, tenant_id: &str, id: &str) -> Result<PaymentResponse, ApiErr> {
    sq_query_row(conn, db::payments::get_by_id(tenant_id, id), payment_from_row)
        .map_err(ApiErr::from_lookup("get payment", "payment not found"))
}

/// Current `(amount, paid_amount)` of a payment.
fn load_figures(conn: &Connection, tenant_id: &str, id: &str) -> Result<(f64, f64), ApiErr> {
    sq_query_row(conn, db::payments::get_figures(tenant_id, id), |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .map_err(ApiErr::from_lookup("payment figures", "payment not found"))
}

/// GET /api/payments: filter by student or status.
pub async fn list_payments(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<PaymentListQuery>,
) -> Result<Json<ListPaymentsResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();
    let payments = sq_query_map(&conn, db::payments::list(tenant_id, &q), payment_from_row)
        .map_err(ApiErr::from_db("list payments"))?;
    Ok(Json(ListPaymentsResponse { payments }))
}

/// GET /api/payments/:id
pub async fn get_payment(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiErr> {
    let tenant_id = user.tenant()?;
    let conn = db.conn();
    load(&conn, tenant_id, &id).map(Json)
}

/// POST /api/payments: record a fee; status and balance are derived.
pub async fn create_payment(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let payment = service::validate_create_payment(req)?;
    let conn = db.conn();

    let student_found = sq_count(&conn, db::students::exists(tenant_id, &payment.student_id))
        .map_err(ApiErr::from_db("student exists"))?;
    if student_found == 0 {
        return Err(ApiErr::not_found("student not found"));
    }

    let id = Uuid::new_v4().to_string();
    sq_execute(&conn, db::payments::insert(tenant_id, &id, &payment))
        .map_err(ApiErr::from_db("insert payment"))?;

    tracing::info!(
        tenant_id,
        payment_id = %id,
        status = %payment.figures.status,
        "payment recorded"
    );
    Ok((StatusCode::CREATED, Json(load(&conn, tenant_id, &id)?)))
}

/// PUT /api/payments/:id: amounts are merged with the stored ones and the
/// status recomputed.
pub async fn update_payment(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let conn = db.conn();
    let (amount, paid) = load_figures(&conn, tenant_id, &id)?;
    let changes = service::validate_update_payment(amount, paid, req)?;

    sq_execute(&conn, db::payments::update(tenant_id, &id, &changes))
        .map_err(ApiErr::from_db("update payment"))?;
    Ok(Json(load(&conn, tenant_id, &id)?))
}

/// POST /api/payments/:id/installments: add to the paid amount.
pub async fn add_installment(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<InstallmentRequest>,
) -> Result<Json<PaymentResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let conn = db.conn();
    let (amount, paid) = load_figures(&conn, tenant_id, &id)?;
    let figures = service::apply_installment(amount, paid, req.amount)?;

    sq_execute(&conn, db::payments::update_figures(tenant_id, &id, &figures))
        .map_err(ApiErr::from_db("record installment"))?;

    tracing::info!(
        tenant_id,
        payment_id = %id,
        installment = req.amount,
        status = %figures.status,
        "installment recorded"
    );
    Ok(Json(load(&conn, tenant_id, &id)?))
}

/// DELETE /api/payments/:id
pub async fn delete_payment(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let tenant_id = user.manager_tenant()?;
    let conn = db.conn();
    let affected = sq_execute(&conn, db::payments::delete(tenant_id, &id))
        .map_err(ApiErr::from_db("delete payment"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("payment not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}
