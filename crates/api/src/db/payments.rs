//! Fee / payment query builders.
//!
//! `status` is stored so lists can filter on it; it is always written
//! together with the amounts it was derived from.

use sea_query::{Asterisk, Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder};

use super::tables::{Payments, Students};
use super::{Built, now_expr};
use crate::PaymentListQuery;
use crate::service::{NewPayment, PaymentChanges, PaymentFigures};

/// Payment columns + student names. Order must match `payment_from_row()`.
fn payment_select(tenant_id: &str) -> SelectStatement {
    Query::select()
        .column((Payments::Table, Payments::Id))
        .column((Payments::Table, Payments::StudentId))
        .column((Students::Table, Students::FirstName))
        .column((Students::Table, Students::LastName))
        .column((Payments::Table, Payments::Description))
        .column((Payments::Table, Payments::Amount))
        .column((Payments::Table, Payments::PaidAmount))
        .column((Payments::Table, Payments::Status))
        .column((Payments::Table, Payments::DueDate))
        .column((Payments::Table, Payments::CreatedAt))
        .column((Payments::Table, Payments::UpdatedAt))
        .from(Payments::Table)
        .inner_join(
            Students::Table,
            Expr::col((Students::Table, Students::Id)).equals((Payments::Table, Payments::StudentId)),
        )
        .and_where(Expr::col((Payments::Table, Payments::TenantId)).eq(tenant_id))
        .to_owned()
}

pub fn insert(tenant_id: &str, id: &str, p: &NewPayment) -> Built {
    Query::insert()
        .into_table(Payments::Table)
        .columns([
            Payments::Id,
            Payments::TenantId,
            Payments::StudentId,
            Payments::Description,
            Payments::Amount,
            Payments::PaidAmount,
            Payments::Status,
            Payments::DueDate,
        ])
        .values_panic([
            id.into(),
            tenant_id.into(),
            p.student_id.as_str().into(),
            p.description.clone().into(),
            p.figures.amount.into(),
            p.figures.paid_amount.into(),
            p.figures.status.as_str().into(),
            p.due_date.clone().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(tenant_id: &str, id: &str) -> Built {
    payment_select(tenant_id)
        .and_where(Expr::col((Payments::Table, Payments::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Newest first.
pub fn list(tenant_id: &str, q: &PaymentListQuery) -> Built {
    let mut select = payment_select(tenant_id);
    if let Some(student_id) = q.student_id.as_deref().filter(|s| !s.is_empty()) {
        select.and_where(Expr::col((Payments::Table, Payments::StudentId)).eq(student_id));
    }
    if let Some(status) = q.status {
        select.and_where(Expr::col((Payments::Table, Payments::Status)).eq(status.as_str()));
    }
    select
        .order_by((Payments::Table, Payments::CreatedAt), Order::Desc)
        .order_by((Payments::Table, Payments::Id), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// `amount`, `paid_amount` of one payment.
pub fn get_figures(tenant_id: &str, id: &str) -> Built {
    Query::select()
        .columns([Payments::Amount, Payments::PaidAmount])
        .from(Payments::Table)
        .and_where(Expr::col(Payments::TenantId).eq(tenant_id))
        .and_where(Expr::col(Payments::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn update(tenant_id: &str, id: &str, changes: &PaymentChanges) -> Built {
    let mut q = Query::update();
    q.table(Payments::Table);
    if let Some(ref description) = changes.description {
        q.value(Payments::Description, description.as_str());
    }
    if let Some(ref due_date) = changes.due_date {
        q.value(Payments::DueDate, due_date.as_str());
    }
    set_figures(&mut q, &changes.figures);
    q.and_where(Expr::col(Payments::TenantId).eq(tenant_id))
        .and_where(Expr::col(Payments::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Overwrite only the amounts and status, e.g. after an installment.
pub fn update_figures(tenant_id: &str, id: &str, figures: &PaymentFigures) -> Built {
    let mut q = Query::update();
    q.table(Payments::Table);
    set_figures(&mut q, figures);
    q.and_where(Expr::col(Payments::TenantId).eq(tenant_id))
        .and_where(Expr::col(Payments::Id).eq(id))
        .build(SqliteQueryBuilder)
}

fn set_figures(q: &mut sea_query::UpdateStatement, figures: &PaymentFigures) {
    q.value(Payments::Amount, figures.amount)
        .value(Payments::PaidAmount, figures.paid_amount)
        .value(Payments::Status, figures.status.as_str())
        .value(Payments::UpdatedAt, now_expr());
}

pub fn delete(tenant_id: &str, id: &str) -> Built {
    Query::delete()
        .from_table(Payments::Table)
        .and_where(Expr::col(Payments::TenantId).eq(tenant_id))
        .and_where(Expr::col(Payments::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Rows of `(status, count, billed, collected)` per payment status.
pub fn totals_by_status(tenant_id: &str) -> Built {
    Query::select()
        .column(Payments::Status)
        .expr(Func::count(Expr::col(Asterisk)))
        .expr(Func::sum(Expr::col(Payments::Amount)))
        .expr(Func::sum(Expr::col(Payments::PaidAmount)))
        .from(Payments::Table)
        .and_where(Expr::col(Payments::TenantId).eq(tenant_id))
        .group_by_col(Payments::Status)
        .order_by(Payments::Status, Order::Asc)
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PaymentStatus;
    use crate::db::testing;
    use crate::service::{apply_installment, compute_payment};

    fn seed(conn: &rusqlite::Connection) {
        testing::seed_tenant(conn, "t1", "alpha");
        testing::seed_tenant(conn, "t2", "beta");
        conn.execute_batch(
            "INSERT INTO students (id, tenant_id, first_name, last_name) VALUES
                ('s1', 't1', 'Amara', 'Okafor'),
                ('s2', 't2', 'Kwame', 'Mensah');",
        )
        .unwrap();
    }

    fn fee(student: &str, amount: f64, paid: f64) -> NewPayment {
        NewPayment {
            student_id: student.into(),
            description: Some("Term 1 tuition".into()),
            due_date: None,
            figures: compute_payment(amount, paid).unwrap(),
        }
    }

    fn stored_status(conn: &rusqlite::Connection, id: &str) -> String {
        conn.query_row("SELECT status FROM payments WHERE id = ?1", [id], |r| {
            r.get(0)
        })
        .unwrap()
    }

    #[test]
    fn full_payment_is_stored_as_paid() {
        let conn = testing::open();
        seed(&conn);
        testing::exec(&conn, insert("t1", "p1", &fee("s1", 500.0, 500.0))).unwrap();
        assert_eq!(stored_status(&conn, "p1"), "Paid");
        assert_eq!(testing::column(&conn, get_by_id("t1", "p1")), vec!["p1"]);
        assert!(testing::column(&conn, get_by_id("t2", "p1")).is_empty());
    }

    #[test]
    fn schema_rejects_overpayment() {
        let conn = testing::open();
        seed(&conn);
        let mut bad = fee("s1", 100.0, 0.0);
        bad.figures.paid_amount = 150.0;
        assert!(testing::exec(&conn, insert("t1", "p1", &bad)).is_err());
    }

    #[test]
    fn installment_moves_status_forward() {
        let conn = testing::open();
        seed(&conn);
        testing::exec(&conn, insert("t1", "p1", &fee("s1", 300.0, 0.0))).unwrap();
        assert_eq!(stored_status(&conn, "p1"), "Pending");

        let figures = apply_installment(300.0, 0.0, 100.0).unwrap();
        testing::exec(&conn, update_figures("t1", "p1", &figures)).unwrap();
        assert_eq!(stored_status(&conn, "p1"), "Partial");

        let figures = apply_installment(300.0, 100.0, 200.0).unwrap();
        testing::exec(&conn, update_figures("t1", "p1", &figures)).unwrap();
        assert_eq!(stored_status(&conn, "p1"), "Paid");
    }

    #[test]
    fn list_filters_by_status() {
        let conn = testing::open();
        seed(&conn);
        testing::exec(&conn, insert("t1", "p1", &fee("s1", 100.0, 100.0))).unwrap();
        testing::exec(&conn, insert("t1", "p2", &fee("s1", 100.0, 20.0))).unwrap();
        testing::exec(&conn, insert("t2", "p3", &fee("s2", 100.0, 100.0))).unwrap();
        let q = PaymentListQuery {
            student_id: None,
            status: Some(PaymentStatus::Paid),
        };
        assert_eq!(testing::column(&conn, list("t1", &q)), vec!["p1"]);
        assert_eq!(
            testing::column(&conn, list("t1", &PaymentListQuery::default())).len(),
            2
        );
    }

    #[test]
    fn totals_group_by_status() {
        let conn = testing::open();
        seed(&conn);
        testing::exec(&conn, insert("t1", "p1", &fee("s1", 100.0, 100.0))).unwrap();
        testing::exec(&conn, insert("t1", "p2", &fee("s1", 200.0, 50.0))).unwrap();
        testing::exec(&conn, insert("t1", "p3", &fee("s1", 80.0, 20.0))).unwrap();
        let (sql, _) = totals_by_status("t1");
        assert!(sql.contains("GROUP BY"));
        assert_eq!(testing::column(&conn, totals_by_status("t1")), vec!["Paid", "Partial"]);
    }
}
