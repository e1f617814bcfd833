//! Sales lead query builders (platform back office).

use sea_query::{Asterisk, Expr, Func, Order, Query, SimpleExpr, SqliteQueryBuilder};

use super::Built;
use super::tables::Leads;
use crate::{CreateLeadRequest, LeadListQuery, LeadStage, UpdateLeadRequest};

const LEAD_COLUMNS: [Leads; 9] = [
    Leads::Id,
    Leads::SchoolName,
    Leads::ContactName,
    Leads::Email,
    Leads::Phone,
    Leads::Stage,
    Leads::Value,
    Leads::Notes,
    Leads::CreatedAt,
];

pub fn insert(id: &str, req: &CreateLeadRequest) -> Built {
    Query::insert()
        .into_table(Leads::Table)
        .columns([
            Leads::Id,
            Leads::SchoolName,
            Leads::ContactName,
            Leads::Email,
            Leads::Phone,
            Leads::Stage,
            Leads::Value,
            Leads::Notes,
        ])
        .values_panic([
            id.into(),
            req.school_name.as_str().into(),
            req.contact_name.clone().into(),
            req.email.clone().into(),
            req.phone.clone().into(),
            req.stage.unwrap_or_default().as_str().into(),
            req.value.into(),
            req.notes.clone().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .columns(LEAD_COLUMNS)
        .from(Leads::Table)
        .and_where(Expr::col(Leads::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Newest first.
pub fn list(q: &LeadListQuery) -> Built {
    let mut select = Query::select();
    select.columns(LEAD_COLUMNS).from(Leads::Table);
    if let Some(stage) = q.stage {
        select.and_where(Expr::col(Leads::Stage).eq(stage.as_str()));
    }
    select
        .order_by(Leads::CreatedAt, Order::Desc)
        .order_by(Leads::SchoolName, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn update(id: &str, req: &UpdateLeadRequest) -> Option<Built> {
    let mut values: Vec<(Leads, SimpleExpr)> = Vec::new();
    let fields = [
        (Leads::SchoolName, &req.school_name),
        (Leads::ContactName, &req.contact_name),
        (Leads::Email, &req.email),
        (Leads::Phone, &req.phone),
        (Leads::Notes, &req.notes),
    ];
    for (column, value) in fields {
        if let Some(v) = value {
            values.push((column, v.as_str().into()));
        }
    }
    if let Some(stage) = req.stage {
        values.push((Leads::Stage, stage.as_str().into()));
    }
    if let Some(value) = req.value {
        values.push((Leads::Value, value.into()));
    }
    if values.is_empty() {
        return None;
    }
    Some(
        Query::update()
            .table(Leads::Table)
            .values(values)
            .and_where(Expr::col(Leads::Id).eq(id))
            .build(SqliteQueryBuilder),
    )
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Leads::Table)
        .and_where(Expr::col(Leads::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Leads not yet won or lost.
pub fn count_open() -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Leads::Table)
        .and_where(
            Expr::col(Leads::Stage)
                .is_not_in([LeadStage::Won.as_str(), LeadStage::Lost.as_str()]),
        )
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn lead(name: &str, stage: Option<LeadStage>) -> CreateLeadRequest {
        CreateLeadRequest {
            school_name: name.into(),
            contact_name: None,
            email: None,
            phone: None,
            stage,
            value: Some(1200.0),
            notes: None,
        }
    }

    #[test]
    fn stage_defaults_to_new() {
        let conn = testing::open();
        testing::exec(&conn, insert("l1", &lead("Hilltop Academy", None))).unwrap();
        let q = LeadListQuery {
            stage: Some(LeadStage::New),
        };
        assert_eq!(testing::column(&conn, list(&q)), vec!["l1"]);
    }

    #[test]
    fn open_count_excludes_closed_stages() {
        let conn = testing::open();
        testing::exec(&conn, insert("l1", &lead("A", Some(LeadStage::Demo)))).unwrap();
        testing::exec(&conn, insert("l2", &lead("B", Some(LeadStage::Won)))).unwrap();
        testing::exec(&conn, insert("l3", &lead("C", Some(LeadStage::Lost)))).unwrap();
        assert_eq!(testing::count(&conn, count_open()), 1);

        let reopen = UpdateLeadRequest {
            stage: Some(LeadStage::Contacted),
            ..Default::default()
        };
        testing::exec(&conn, update("l3", &reopen).unwrap()).unwrap();
        assert_eq!(testing::count(&conn, count_open()), 2);
    }
}
