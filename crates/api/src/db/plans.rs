//! Subscription plan query builders.

use sea_query::{Asterisk, Expr, Func, Order, Query, SimpleExpr, SqliteQueryBuilder};

use super::Built;
use super::tables::Plans;
use crate::{CreatePlanRequest, UpdatePlanRequest};

const PLAN_COLUMNS: [Plans; 6] = [
    Plans::Id,
    Plans::Name,
    Plans::PriceMonthly,
    Plans::MaxStudents,
    Plans::Description,
    Plans::CreatedAt,
];

pub fn insert(id: &str, req: &CreatePlanRequest) -> Built {
    Query::insert()
        .into_table(Plans::Table)
        .columns([
            Plans::Id,
            Plans::Name,
            Plans::PriceMonthly,
            Plans::MaxStudents,
            Plans::Description,
        ])
        .values_panic([
            id.into(),
            req.name.as_str().into(),
            req.price_monthly.into(),
            req.max_students.into(),
            req.description.clone().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .columns(PLAN_COLUMNS)
        .from(Plans::Table)
        .and_where(Expr::col(Plans::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Cheapest first.
pub fn list() -> Built {
    Query::select()
        .columns(PLAN_COLUMNS)
        .from(Plans::Table)
        .order_by(Plans::PriceMonthly, Order::Asc)
        .order_by(Plans::Name, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn exists(id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Plans::Table)
        .and_where(Expr::col(Plans::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn update(id: &str, req: &UpdatePlanRequest) -> Option<Built> {
    let mut values: Vec<(Plans, SimpleExpr)> = Vec::new();
    if let Some(ref name) = req.name {
        values.push((Plans::Name, name.as_str().into()));
    }
    if let Some(price) = req.price_monthly {
        values.push((Plans::PriceMonthly, price.into()));
    }
    if let Some(max) = req.max_students {
        values.push((Plans::MaxStudents, max.into()));
    }
    if let Some(ref description) = req.description {
        values.push((Plans::Description, description.as_str().into()));
    }
    if values.is_empty() {
        return None;
    }
    Some(
        Query::update()
            .table(Plans::Table)
            .values(values)
            .and_where(Expr::col(Plans::Id).eq(id))
            .build(SqliteQueryBuilder),
    )
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Plans::Table)
        .and_where(Expr::col(Plans::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn count_all() -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Plans::Table)
        .build(SqliteQueryBuilder)
}
