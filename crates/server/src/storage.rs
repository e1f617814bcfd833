use anyhow::{Context, Result};
use rusqlite::{Connection, Row, params_from_iter, types::Type, types::Value as SqlValue};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use schoolhub_api::db::Built;
use schoolhub_api::db::migrations::MIGRATIONS;
use schoolhub_api::service::round_money;
use schoolhub_api::{
    AnnouncementResponse, AttendanceResponse, AttendanceStatus, ClassResponse, LeadResponse,
    LeadStage, PaymentResponse, PaymentStatus, PlanResponse, StudentResponse, StudentStatus,
    TeacherResponse, TenantResponse, TenantStatus, UserResponse, UserRole,
};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Fresh in-memory database with all migrations applied.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let db_path = data_dir.join("schoolhub.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // Enable WAL mode for better concurrent read performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query execution
// ---------------------------------------------------------------------------

fn to_sql_values(values: sea_query::Values) -> Vec<SqlValue> {
    values
        .0
        .into_iter()
        .map(|v| match v {
            sea_query::Value::Bool(b) => b.map_or(SqlValue::Null, |b| SqlValue::Integer(b.into())),
            sea_query::Value::Int(n) => n.map_or(SqlValue::Null, |n| SqlValue::Integer(n.into())),
            sea_query::Value::BigInt(n) => n.map_or(SqlValue::Null, SqlValue::Integer),
            sea_query::Value::Unsigned(n) => {
                n.map_or(SqlValue::Null, |n| SqlValue::Integer(n.into()))
            }
            sea_query::Value::BigUnsigned(n) => n.map_or(SqlValue::Null, |n| {
                SqlValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
            }),
            sea_query::Value::Float(f) => f.map_or(SqlValue::Null, |f| SqlValue::Real(f.into())),
            sea_query::Value::Double(f) => f.map_or(SqlValue::Null, SqlValue::Real),
            sea_query::Value::String(s) => s.map_or(SqlValue::Null, |s| SqlValue::Text(*s)),
            other => {
                tracing::warn!("unsupported bind value {other:?}, binding NULL");
                SqlValue::Null
            }
        })
        .collect()
}

/// Execute a built statement. Returns the number of affected rows.
pub fn sq_execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, params_from_iter(to_sql_values(values)))
}

/// Run a built query expected to return one row.
pub fn sq_query_row<T>(
    conn: &Connection,
    (sql, values): Built,
    f: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    conn.query_row(&sql, params_from_iter(to_sql_values(values)), f)
}

/// Run a built query and map every row.
pub fn sq_query_map<T>(
    conn: &Connection,
    (sql, values): Built,
    f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(params_from_iter(to_sql_values(values)), f)?
        .collect()
}

/// Single integer result, e.g. `COUNT(*)` or `COUNT(*) > 0`.
pub fn sq_count(conn: &Connection, built: Built) -> rusqlite::Result<i64> {
    sq_query_row(conn, built, |row| row.get(0))
}

// ---------------------------------------------------------------------------
// Row mappers (column order is defined by the builders in `schoolhub_api::db`)
// ---------------------------------------------------------------------------

fn enum_col<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized value {raw:?}").into(),
        )
    })
}

fn full_name(first: Option<String>, last: Option<String>) -> Option<String> {
    match (first, last) {
        (Some(f), Some(l)) => Some(format!("{f} {l}")),
        (Some(n), None) | (None, Some(n)) => Some(n),
        (None, None) => None,
    }
}

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserResponse> {
    Ok(UserResponse {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        role: enum_col(row, 4, UserRole::parse)?,
        created_at: row.get(5)?,
    })
}

/// Status of the user's tenant, read from the column after the profile.
pub fn user_tenant_status(row: &Row<'_>) -> rusqlite::Result<Option<TenantStatus>> {
    let raw: Option<String> = row.get(6)?;
    match raw {
        Some(_) => enum_col(row, 6, TenantStatus::parse).map(Some),
        None => Ok(None),
    }
}

pub fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<TenantResponse> {
    Ok(TenantResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        plan_id: row.get(6)?,
        plan_name: row.get(7)?,
        status: enum_col(row, 8, TenantStatus::parse)?,
        created_at: row.get(9)?,
    })
}

pub fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<PlanResponse> {
    Ok(PlanResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        price_monthly: row.get(2)?,
        max_students: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn teacher_from_row(row: &Row<'_>) -> rusqlite::Result<TeacherResponse> {
    Ok(TeacherResponse {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        subject: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn class_from_row(row: &Row<'_>) -> rusqlite::Result<ClassResponse> {
    Ok(ClassResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        level: row.get(2)?,
        teacher_id: row.get(3)?,
        teacher_name: full_name(row.get(4)?, row.get(5)?),
        student_count: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn student_from_row(row: &Row<'_>) -> rusqlite::Result<StudentResponse> {
    Ok(StudentResponse {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        class_id: row.get(3)?,
        class_name: row.get(4)?,
        admission_number: row.get(5)?,
        date_of_birth: row.get(6)?,
        gender: row.get(7)?,
        guardian_name: row.get(8)?,
        guardian_phone: row.get(9)?,
        status: enum_col(row, 10, StudentStatus::parse)?,
        created_at: row.get(11)?,
    })
}

pub fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentResponse> {
    let amount: f64 = row.get(5)?;
    let paid_amount: f64 = row.get(6)?;
    Ok(PaymentResponse {
        id: row.get(0)?,
        student_id: row.get(1)?,
        student_name: full_name(row.get(2)?, row.get(3)?).unwrap_or_default(),
        description: row.get(4)?,
        amount,
        paid_amount,
        balance_owed: round_money(amount - paid_amount),
        status: enum_col(row, 7, PaymentStatus::parse)?,
        due_date: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn attendance_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceResponse> {
    Ok(AttendanceResponse {
        id: row.get(0)?,
        student_id: row.get(1)?,
        student_name: full_name(row.get(2)?, row.get(3)?).unwrap_or_default(),
        class_id: row.get(4)?,
        date: row.get(5)?,
        status: enum_col(row, 6, AttendanceStatus::parse)?,
        remarks: row.get(7)?,
        marked_by: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<LeadResponse> {
    Ok(LeadResponse {
        id: row.get(0)?,
        school_name: row.get(1)?,
        contact_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        stage: enum_col(row, 5, LeadStage::parse)?,
        value: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn announcement_from_row(row: &Row<'_>) -> rusqlite::Result<AnnouncementResponse> {
    Ok(AnnouncementResponse {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
    })
}
