//! Shared business logic: framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters: they parse the request, call into
//! this module to validate and normalize it, then hand the result to a
//! `db` query builder.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{
    AttendanceEntry, AuthTokenResponse, CreateClassRequest, CreateLeadRequest,
    CreatePaymentRequest, CreatePlanRequest, CreateStudentRequest, CreateTeacherRequest,
    CreateTenantRequest, CreateUserRequest, PaymentStatus, ServiceError, UpdateClassRequest,
    UpdateLeadRequest, UpdatePaymentRequest, UpdatePlanRequest, UpdateStudentRequest,
    UpdateTeacherRequest, UpdateTenantRequest, UserResponse, UserRole,
};

// ─── Field validation ───────────────────────────────────────────────────────

/// Trim a required text field and bound its length.
pub fn validate_required(field: &str, value: &str, max_len: usize) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::BadRequest(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ServiceError::BadRequest(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank values collapse to `None`.
pub fn optional_text(
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> Result<Option<String>, ServiceError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => validate_required(field, v, max_len).map(Some),
    }
}

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    let valid_shape = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_shape || email.len() > 254 || email.contains(char::is_whitespace) {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(email)
}

/// Like [`optional_text`] for fields an update may clear. `Some(None)`
/// (explicit `null` or a blank string) means "unset".
fn clearable_text(
    field: &str,
    value: Option<Option<String>>,
    max_len: usize,
) -> Result<Option<Option<String>>, ServiceError> {
    value
        .map(|v| optional_text(field, v, max_len))
        .transpose()
}

fn optional_email(value: Option<String>) -> Result<Option<String>, ServiceError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => validate_email(v).map(Some),
    }
}

/// Validate a password (8-128 characters).
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if len < 8 {
        return Err(ServiceError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    if len > 128 {
        return Err(ServiceError::BadRequest(
            "password must be at most 128 characters".into(),
        ));
    }
    Ok(())
}

/// Normalize a tenant slug: lowercase, 3-63 chars of `[a-z0-9-]`, no edge hyphens.
pub fn validate_slug(slug: &str) -> Result<String, ServiceError> {
    let slug = slug.trim().to_lowercase();
    if !(3..=63).contains(&slug.len()) {
        return Err(ServiceError::BadRequest(
            "slug must be 3-63 characters".into(),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ServiceError::BadRequest(
            "slug may only contain a-z, 0-9 and '-'".into(),
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(ServiceError::BadRequest(
            "slug must not start or end with '-'".into(),
        ));
    }
    Ok(slug)
}

/// Parse a calendar date and return it in canonical `YYYY-MM-DD` form.
pub fn validate_date(field: &str, value: &str) -> Result<String, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| ServiceError::BadRequest(format!("{field} must be a YYYY-MM-DD date")))
}

fn optional_date(field: &str, value: Option<String>) -> Result<Option<String>, ServiceError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => validate_date(field, v).map(Some),
    }
}

/// Maximum page size for paginated listings.
pub const MAX_PER_PAGE: u32 = 100;

/// Clamp pagination input. Returns `(page, per_page, offset)`.
pub fn paginate(page: u32, per_page: u32) -> (u32, u32, u64) {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let offset = u64::from(page - 1) * u64::from(per_page);
    (page, per_page, offset)
}

// ─── Payments ───────────────────────────────────────────────────────────────

/// Round a currency value to cents.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Largest accepted currency value. Keeps cent rounding exact and finite.
pub const MAX_MONEY: f64 = 1e12;

/// Round `value` to cents and reject anything not finite or above [`MAX_MONEY`].
fn money(field: &str, value: f64) -> Result<f64, ServiceError> {
    let rounded = round_money(value);
    if !rounded.is_finite() || rounded.abs() > MAX_MONEY {
        return Err(ServiceError::BadRequest(format!(
            "{field} must be a number no larger than {MAX_MONEY:.0}"
        )));
    }
    Ok(rounded)
}

/// Derived figures for one fee.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentFigures {
    pub amount: f64,
    pub paid_amount: f64,
    pub balance_owed: f64,
    pub status: PaymentStatus,
}

/// Status of a fee given its figures. Callers must have validated
/// `0 <= paid_amount <= amount` and `amount > 0`.
pub fn payment_status(amount: f64, paid_amount: f64) -> PaymentStatus {
    let balance = round_money(amount - paid_amount);
    if balance <= 0.0 {
        PaymentStatus::Paid
    } else if paid_amount <= 0.0 {
        PaymentStatus::Pending
    } else {
        PaymentStatus::Partial
    }
}

/// Validate a fee's amounts and derive `balance_owed` and `status`.
pub fn compute_payment(amount: f64, paid_amount: f64) -> Result<PaymentFigures, ServiceError> {
    let amount = money("amount", amount)?;
    let paid_amount = money("paidAmount", paid_amount)?;
    if amount <= 0.0 {
        return Err(ServiceError::BadRequest(
            "amount must be greater than 0".into(),
        ));
    }
    if paid_amount < 0.0 {
        return Err(ServiceError::BadRequest(
            "paidAmount must not be negative".into(),
        ));
    }
    if paid_amount > amount {
        return Err(ServiceError::BadRequest(
            "paidAmount must not exceed amount".into(),
        ));
    }
    Ok(PaymentFigures {
        amount,
        paid_amount,
        balance_owed: round_money(amount - paid_amount),
        status: payment_status(amount, paid_amount),
    })
}

/// Add an installment to an existing fee.
pub fn apply_installment(
    amount: f64,
    paid_amount: f64,
    installment: f64,
) -> Result<PaymentFigures, ServiceError> {
    let installment = money("amount", installment)?;
    if installment <= 0.0 {
        return Err(ServiceError::BadRequest(
            "installment amount must be greater than 0".into(),
        ));
    }
    let balance = round_money(amount - paid_amount);
    if installment > balance {
        return Err(ServiceError::BadRequest(format!(
            "installment exceeds outstanding balance of {balance:.2}"
        )));
    }
    compute_payment(amount, paid_amount + installment)
}

/// Normalized payment creation input plus its derived figures.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub student_id: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub figures: PaymentFigures,
}

pub fn validate_create_payment(req: CreatePaymentRequest) -> Result<NewPayment, ServiceError> {
    Ok(NewPayment {
        student_id: validate_required("studentId", &req.student_id, 64)?,
        description: optional_text("description", req.description, 500)?,
        due_date: optional_date("dueDate", req.due_date)?,
        figures: compute_payment(req.amount, req.paid_amount)?,
    })
}

/// Normalized payment update. `figures` is always recomputed from the merged
/// amounts so the stored status can never drift from them.
#[derive(Debug, Clone)]
pub struct PaymentChanges {
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub figures: PaymentFigures,
}

pub fn validate_update_payment(
    current_amount: f64,
    current_paid: f64,
    req: UpdatePaymentRequest,
) -> Result<PaymentChanges, ServiceError> {
    let amount = req.amount.unwrap_or(current_amount);
    let paid = req.paid_amount.unwrap_or(current_paid);
    Ok(PaymentChanges {
        description: optional_text("description", req.description, 500)?,
        due_date: optional_date("dueDate", req.due_date)?,
        figures: compute_payment(amount, paid)?,
    })
}

// ─── Attendance ─────────────────────────────────────────────────────────────

/// Normalize a register submission: trim ids and remarks, and collapse
/// repeated students so the last mark wins while keeping first-seen order.
pub fn normalize_attendance(
    entries: Vec<AttendanceEntry>,
) -> Result<Vec<AttendanceEntry>, ServiceError> {
    if entries.is_empty() {
        return Err(ServiceError::BadRequest(
            "records must contain at least one entry".into(),
        ));
    }

    let mut out: Vec<AttendanceEntry> = Vec::with_capacity(entries.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        let student_id = validate_required("studentId", &entry.student_id, 64)?;
        let normalized = AttendanceEntry {
            student_id: student_id.clone(),
            status: entry.status,
            remarks: optional_text("remarks", entry.remarks, 500)?,
        };
        match index.get(&student_id) {
            Some(&i) => out[i] = normalized,
            None => {
                index.insert(student_id, out.len());
                out.push(normalized);
            }
        }
    }
    Ok(out)
}

// ─── Record normalization ───────────────────────────────────────────────────

pub fn validate_create_tenant(req: CreateTenantRequest) -> Result<CreateTenantRequest, ServiceError> {
    Ok(CreateTenantRequest {
        name: validate_required("name", &req.name, 200)?,
        slug: validate_slug(&req.slug)?,
        email: validate_email(&req.email)?,
        phone: optional_text("phone", req.phone, 32)?,
        address: optional_text("address", req.address, 500)?,
        plan_id: optional_text("planId", req.plan_id, 64)?,
    })
}

pub fn validate_update_tenant(req: UpdateTenantRequest) -> Result<UpdateTenantRequest, ServiceError> {
    Ok(UpdateTenantRequest {
        name: req
            .name
            .map(|n| validate_required("name", &n, 200))
            .transpose()?,
        email: req.email.map(|e| validate_email(&e)).transpose()?,
        phone: optional_text("phone", req.phone, 32)?,
        address: optional_text("address", req.address, 500)?,
        plan_id: clearable_text("planId", req.plan_id, 64)?,
        status: req.status,
    })
}

/// Tenant accounts may only hold school roles.
pub fn validate_create_user(req: CreateUserRequest) -> Result<CreateUserRequest, ServiceError> {
    if req.role == UserRole::PlatformAdmin {
        return Err(ServiceError::BadRequest(
            "school users must be school_admin or staff".into(),
        ));
    }
    validate_password(&req.password)?;
    Ok(CreateUserRequest {
        email: validate_email(&req.email)?,
        name: validate_required("name", &req.name, 200)?,
        password: req.password,
        role: req.role,
    })
}

fn validate_price(field: &str, value: f64) -> Result<f64, ServiceError> {
    let value = money(field, value)?;
    if value < 0.0 {
        return Err(ServiceError::BadRequest(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(value)
}

fn validate_capacity(value: Option<i64>) -> Result<Option<i64>, ServiceError> {
    match value {
        Some(n) if n <= 0 => Err(ServiceError::BadRequest(
            "maxStudents must be greater than 0".into(),
        )),
        other => Ok(other),
    }
}

pub fn validate_create_plan(req: CreatePlanRequest) -> Result<CreatePlanRequest, ServiceError> {
    Ok(CreatePlanRequest {
        name: validate_required("name", &req.name, 100)?,
        price_monthly: validate_price("priceMonthly", req.price_monthly)?,
        max_students: validate_capacity(req.max_students)?,
        description: optional_text("description", req.description, 1000)?,
    })
}

pub fn validate_update_plan(req: UpdatePlanRequest) -> Result<UpdatePlanRequest, ServiceError> {
    Ok(UpdatePlanRequest {
        name: req
            .name
            .map(|n| validate_required("name", &n, 100))
            .transpose()?,
        price_monthly: req
            .price_monthly
            .map(|p| validate_price("priceMonthly", p))
            .transpose()?,
        max_students: validate_capacity(req.max_students)?,
        description: optional_text("description", req.description, 1000)?,
    })
}

pub fn validate_create_teacher(
    req: CreateTeacherRequest,
) -> Result<CreateTeacherRequest, ServiceError> {
    Ok(CreateTeacherRequest {
        first_name: validate_required("firstName", &req.first_name, 100)?,
        last_name: validate_required("lastName", &req.last_name, 100)?,
        email: optional_email(req.email)?,
        phone: optional_text("phone", req.phone, 32)?,
        subject: optional_text("subject", req.subject, 100)?,
    })
}

pub fn validate_update_teacher(
    req: UpdateTeacherRequest,
) -> Result<UpdateTeacherRequest, ServiceError> {
    Ok(UpdateTeacherRequest {
        first_name: req
            .first_name
            .map(|v| validate_required("firstName", &v, 100))
            .transpose()?,
        last_name: req
            .last_name
            .map(|v| validate_required("lastName", &v, 100))
            .transpose()?,
        email: optional_email(req.email)?,
        phone: optional_text("phone", req.phone, 32)?,
        subject: optional_text("subject", req.subject, 100)?,
    })
}

pub fn validate_create_class(req: CreateClassRequest) -> Result<CreateClassRequest, ServiceError> {
    Ok(CreateClassRequest {
        name: validate_required("name", &req.name, 100)?,
        level: optional_text("level", req.level, 50)?,
        teacher_id: optional_text("teacherId", req.teacher_id, 64)?,
    })
}

pub fn validate_update_class(req: UpdateClassRequest) -> Result<UpdateClassRequest, ServiceError> {
    Ok(UpdateClassRequest {
        name: req
            .name
            .map(|v| validate_required("name", &v, 100))
            .transpose()?,
        level: optional_text("level", req.level, 50)?,
        teacher_id: clearable_text("teacherId", req.teacher_id, 64)?,
    })
}

pub fn validate_create_student(
    req: CreateStudentRequest,
) -> Result<CreateStudentRequest, ServiceError> {
    Ok(CreateStudentRequest {
        first_name: validate_required("firstName", &req.first_name, 100)?,
        last_name: validate_required("lastName", &req.last_name, 100)?,
        class_id: optional_text("classId", req.class_id, 64)?,
        admission_number: optional_text("admissionNumber", req.admission_number, 50)?,
        date_of_birth: optional_date("dateOfBirth", req.date_of_birth)?,
        gender: optional_text("gender", req.gender, 20)?,
        guardian_name: optional_text("guardianName", req.guardian_name, 200)?,
        guardian_phone: optional_text("guardianPhone", req.guardian_phone, 32)?,
    })
}

pub fn validate_update_student(
    req: UpdateStudentRequest,
) -> Result<UpdateStudentRequest, ServiceError> {
    Ok(UpdateStudentRequest {
        first_name: req
            .first_name
            .map(|v| validate_required("firstName", &v, 100))
            .transpose()?,
        last_name: req
            .last_name
            .map(|v| validate_required("lastName", &v, 100))
            .transpose()?,
        class_id: clearable_text("classId", req.class_id, 64)?,
        admission_number: optional_text("admissionNumber", req.admission_number, 50)?,
        date_of_birth: optional_date("dateOfBirth", req.date_of_birth)?,
        gender: optional_text("gender", req.gender, 20)?,
        guardian_name: optional_text("guardianName", req.guardian_name, 200)?,
        guardian_phone: optional_text("guardianPhone", req.guardian_phone, 32)?,
        status: req.status,
    })
}

pub fn validate_create_lead(req: CreateLeadRequest) -> Result<CreateLeadRequest, ServiceError> {
    Ok(CreateLeadRequest {
        school_name: validate_required("schoolName", &req.school_name, 200)?,
        contact_name: optional_text("contactName", req.contact_name, 200)?,
        email: optional_email(req.email)?,
        phone: optional_text("phone", req.phone, 32)?,
        stage: req.stage,
        value: req.value.map(|v| validate_price("value", v)).transpose()?,
        notes: optional_text("notes", req.notes, 2000)?,
    })
}

pub fn validate_update_lead(req: UpdateLeadRequest) -> Result<UpdateLeadRequest, ServiceError> {
    Ok(UpdateLeadRequest {
        school_name: req
            .school_name
            .map(|v| validate_required("schoolName", &v, 200))
            .transpose()?,
        contact_name: optional_text("contactName", req.contact_name, 200)?,
        email: optional_email(req.email)?,
        phone: optional_text("phone", req.phone, 32)?,
        stage: req.stage,
        value: req.value.map(|v| validate_price("value", v)).transpose()?,
        notes: optional_text("notes", req.notes, 2000)?,
    })
}

// ─── Auth ───────────────────────────────────────────────────────────────────

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve a bearer token into the user id it was issued for.
pub fn resolve_auth_token(token: &str, jwt_secret: &str, now: u64) -> Result<String, ServiceError> {
    if jwt_secret.is_empty() {
        return Err(ServiceError::Unauthorized(
            "token authentication not configured".into(),
        ));
    }
    crate::crypto::verify_jwt(token, jwt_secret, now)
}

/// Sign an access token for `user` and wrap it in the login response.
pub fn issue_access_token(
    jwt_secret: &str,
    user: UserResponse,
    now_unix: u64,
) -> Result<AuthTokenResponse, ServiceError> {
    if jwt_secret.is_empty() {
        return Err(ServiceError::Internal(
            "token authentication not configured".into(),
        ));
    }
    Ok(AuthTokenResponse {
        access_token: crate::crypto::sign_jwt(&user.id, jwt_secret, now_unix),
        expires_in: crate::crypto::JWT_EXPIRY_SECS,
        user,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttendanceStatus;

    #[test]
    fn full_payment_is_paid_with_zero_balance() {
        let f = compute_payment(500.0, 500.0).unwrap();
        assert_eq!(f.status, PaymentStatus::Paid);
        assert_eq!(f.balance_owed, 0.0);
    }

    #[test]
    fn payment_status_partitions_by_paid_amount() {
        assert_eq!(compute_payment(500.0, 0.0).unwrap().status, PaymentStatus::Pending);
        let partial = compute_payment(500.0, 120.25).unwrap();
        assert_eq!(partial.status, PaymentStatus::Partial);
        assert_eq!(partial.balance_owed, 379.75);
        assert_eq!(compute_payment(0.3, 0.1 + 0.2).unwrap().status, PaymentStatus::Paid);
    }

    #[test]
    fn balance_equals_amount_minus_paid() {
        for (amount, paid) in [(100.0, 0.0), (100.0, 33.33), (99.99, 99.99), (1500.5, 750.25)] {
            let f = compute_payment(amount, paid).unwrap();
            assert_eq!(f.balance_owed, round_money(amount - paid));
            assert_eq!(f.status == PaymentStatus::Paid, f.balance_owed == 0.0);
            assert_eq!(f.status == PaymentStatus::Pending, paid == 0.0);
        }
    }

    #[test]
    fn invalid_payment_amounts_are_rejected() {
        assert!(compute_payment(0.0, 0.0).is_err());
        assert!(compute_payment(-5.0, 0.0).is_err());
        assert!(compute_payment(100.0, -1.0).is_err());
        assert!(compute_payment(100.0, 100.01).is_err());
        assert!(compute_payment(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn huge_amounts_are_rejected_before_they_overflow() {
        assert!(round_money(1.7e308).is_infinite());
        let err = compute_payment(1.7e308, 0.0).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(compute_payment(MAX_MONEY * 2.0, 0.0).is_err());
        assert!(compute_payment(100.0, f64::INFINITY).is_err());

        let f = compute_payment(MAX_MONEY, 0.0).unwrap();
        assert!(f.amount.is_finite());
        assert_eq!(f.balance_owed, MAX_MONEY);

        assert!(apply_installment(300.0, 0.0, 1.7e308).is_err());
        assert!(validate_price("priceMonthly", 1.7e308).is_err());
        assert_eq!(validate_price("priceMonthly", 19.999).unwrap(), 20.0);
    }

    #[test]
    fn installment_moves_status_forward() {
        let f = apply_installment(300.0, 0.0, 100.0).unwrap();
        assert_eq!(f.status, PaymentStatus::Partial);
        assert_eq!(f.paid_amount, 100.0);
        let f = apply_installment(300.0, f.paid_amount, 200.0).unwrap();
        assert_eq!(f.status, PaymentStatus::Paid);
        assert_eq!(f.balance_owed, 0.0);
    }

    #[test]
    fn installment_cannot_overpay_or_be_empty() {
        assert!(apply_installment(300.0, 250.0, 60.0).is_err());
        assert!(apply_installment(300.0, 0.0, 0.0).is_err());
        assert!(apply_installment(300.0, 0.0, -10.0).is_err());
    }

    #[test]
    fn update_merges_with_current_amounts() {
        let changes = validate_update_payment(
            400.0,
            100.0,
            UpdatePaymentRequest {
                paid_amount: Some(400.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(changes.figures.status, PaymentStatus::Paid);

        let err = validate_update_payment(
            400.0,
            300.0,
            UpdatePaymentRequest {
                amount: Some(200.0),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    fn entry(student: &str, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            student_id: student.to_string(),
            status,
            remarks: None,
        }
    }

    #[test]
    fn attendance_duplicates_collapse_to_last_mark() {
        let out = normalize_attendance(vec![
            entry("s1", AttendanceStatus::Present),
            entry("s2", AttendanceStatus::Late),
            entry(" s1 ", AttendanceStatus::Absent),
        ])
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], entry("s1", AttendanceStatus::Absent));
        assert_eq!(out[1], entry("s2", AttendanceStatus::Late));
    }

    #[test]
    fn attendance_rejects_empty_submission() {
        assert!(normalize_attendance(vec![]).is_err());
        assert!(normalize_attendance(vec![entry("  ", AttendanceStatus::Present)]).is_err());
    }

    #[test]
    fn slug_validation() {
        assert_eq!(validate_slug("  Green-Valley ").unwrap(), "green-valley");
        assert!(validate_slug("ab").is_err());
        assert!(validate_slug("-school").is_err());
        assert!(validate_slug("school-").is_err());
        assert!(validate_slug("st. mary").is_err());
        assert!(validate_slug(&"a".repeat(64)).is_err());
    }

    #[test]
    fn email_validation() {
        assert_eq!(validate_email(" Admin@School.ORG ").unwrap(), "admin@school.org");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@school.org").is_err());
        assert!(validate_email("a@localhost").is_err());
    }

    #[test]
    fn date_validation_canonicalizes() {
        assert_eq!(validate_date("date", "2024-03-05").unwrap(), "2024-03-05");
        assert!(validate_date("date", "2024-02-30").is_err());
        assert!(validate_date("date", "05/03/2024").is_err());
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(paginate(0, 0), (1, 1, 0));
        assert_eq!(paginate(3, 20), (3, 20, 40));
        assert_eq!(paginate(2, 1000), (2, MAX_PER_PAGE, 100));
    }

    #[test]
    fn optional_text_drops_blanks() {
        assert_eq!(optional_text("x", Some("   ".into()), 10).unwrap(), None);
        assert_eq!(optional_text("x", Some(" hi ".into()), 10).unwrap(), Some("hi".into()));
        assert!(optional_text("x", Some("abcdefghijk".into()), 10).is_err());
    }

    #[test]
    fn tenant_users_cannot_be_platform_admins() {
        let req = CreateUserRequest {
            email: "root@school.org".into(),
            name: "Root".into(),
            password: "long-enough".into(),
            role: UserRole::PlatformAdmin,
        };
        assert!(validate_create_user(req).is_err());
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  xyz "), Some("xyz"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[test]
    fn issued_token_resolves_to_user() {
        let user = UserResponse {
            id: "u1".into(),
            tenant_id: None,
            email: "a@b.co".into(),
            name: "A".into(),
            role: UserRole::PlatformAdmin,
            created_at: "2024-01-01 00:00:00".into(),
        };
        let resp = issue_access_token("secret", user, 10).unwrap();
        assert_eq!(resolve_auth_token(&resp.access_token, "secret", 20).unwrap(), "u1");
        assert!(resolve_auth_token(&resp.access_token, "", 20).is_err());
    }
}
