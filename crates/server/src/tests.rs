use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use schoolhub_api::crypto;

use crate::routes::auth::now_unix;
use crate::storage::Db;
use crate::{AppConfig, AppState, build_app};

const SECRET: &str = "test-secret";

struct Harness {
    app: Router,
    db: Db,
}

impl Harness {
    fn new() -> Self {
        let db = Db::open_in_memory().unwrap();
        let state = AppState {
            db: db.clone(),
            config: AppConfig {
                base_url: "http://localhost:3000".into(),
                jwt_secret: SECRET.into(),
            },
        };
        Self {
            app: build_app(state, None),
            db,
        }
    }

    fn exec(&self, sql: &str) {
        self.db.conn().execute_batch(sql).unwrap();
    }

    fn tenant(&self, id: &str, status: &str) {
        self.exec(&format!(
            "INSERT INTO tenants (id, name, slug, email, status)
             VALUES ('{id}', 'School {id}', '{id}', '{id}@school.test', '{status}');"
        ));
    }

    /// Insert a user with a placeholder password and return a bearer token for them.
    fn user(&self, id: &str, tenant: Option<&str>, role: &str) -> String {
        let tenant = tenant.map_or("NULL".to_string(), |t| format!("'{t}'"));
        self.exec(&format!(
            "INSERT INTO users (id, tenant_id, email, name, role, password_hash, password_salt)
             VALUES ('{id}', {tenant}, '{id}@users.test', 'User {id}', '{role}', 'x', 'x');"
        ));
        crypto::sign_jwt(id, SECRET, now_unix())
    }

    fn class(&self, tenant: &str, id: &str) {
        self.exec(&format!(
            "INSERT INTO classes (id, tenant_id, name) VALUES ('{id}', '{tenant}', 'Class {id}');"
        ));
    }

    fn student(&self, tenant: &str, class: &str, id: &str) {
        self.exec(&format!(
            "INSERT INTO students (id, tenant_id, class_id, first_name, last_name)
             VALUES ('{id}', '{tenant}', '{class}', 'First', 'Last {id}');"
        ));
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

#[tokio::test]
async fn health_is_public() {
    let h = Harness::new();
    let (status, body) = h.send("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let h = Harness::new();
    let (status, body) = h.send("GET", "/api/students", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn login_returns_token_for_valid_credentials() {
    let h = Harness::new();
    h.tenant("t1", "active");
    crate::seed_platform_admin(&h.db, "root@schoolhub.test", "correct-horse-1").unwrap();

    let (status, body) = h
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "root@schoolhub.test", "password": "correct-horse-1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "platform_admin");

    let token = body["accessToken"].as_str().unwrap().to_string();
    let (status, me) = h.send("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "root@schoolhub.test");

    let (status, _) = h
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "root@schoolhub.test", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn seeding_admin_twice_is_a_noop() {
    let h = Harness::new();
    assert!(crate::seed_platform_admin(&h.db, "root@schoolhub.test", "correct-horse-1").unwrap());
    assert!(!crate::seed_platform_admin(&h.db, "root@schoolhub.test", "correct-horse-1").unwrap());
}

#[tokio::test]
async fn staff_cannot_create_students() {
    let h = Harness::new();
    h.tenant("t1", "active");
    let staff = h.user("u-staff", Some("t1"), "staff");

    let (status, _) = h
        .send(
            "POST",
            "/api/students",
            Some(&staff),
            Some(json!({"firstName": "Ada", "lastName": "Obi"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.send("GET", "/api/students", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn suspended_school_is_locked_out() {
    let h = Harness::new();
    h.tenant("t1", "suspended");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, _) = h.send("GET", "/api/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn records_of_another_school_are_not_found() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.tenant("t2", "active");
    h.class("t1", "c1");
    h.student("t1", "c1", "s1");
    let other = h.user("u2", Some("t2"), "school_admin");

    let (status, _) = h.send("GET", "/api/students/s1", Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h.send("GET", "/api/classes/c1", Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h.send("GET", "/api/students", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["students"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn student_crud_and_soft_delete() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.class("t1", "c1");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, created) = h
        .send(
            "POST",
            "/api/students",
            Some(&admin),
            Some(json!({
                "firstName": "Ada",
                "lastName": "Obi",
                "classId": "c1",
                "admissionNumber": "A-001"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["className"], "Class c1");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .send(
            "POST",
            "/api/students",
            Some(&admin),
            Some(json!({"firstName": "Ben", "lastName": "Eze", "admissionNumber": "A-001"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, updated) = h
        .send(
            "PUT",
            &format!("/api/students/{id}"),
            Some(&admin),
            Some(json!({"guardianName": "Mrs Obi"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["guardianName"], "Mrs Obi");
    assert_eq!(updated["firstName"], "Ada");

    let (status, _) = h
        .send("DELETE", &format!("/api/students/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .send("GET", &format!("/api/students/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn student_list_filters_by_class() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.class("t1", "c1");
    h.class("t1", "c2");
    h.student("t1", "c1", "s1");
    h.student("t1", "c1", "s2");
    h.student("t1", "c2", "s3");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, body) = h
        .send("GET", "/api/students?classId=c1&perPage=1", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["perPage"], 1);
    assert_eq!(body["students"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn full_payment_is_paid_with_nothing_owed() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.class("t1", "c1");
    h.student("t1", "c1", "s1");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, body) = h
        .send(
            "POST",
            "/api/payments",
            Some(&admin),
            Some(json!({"studentId": "s1", "amount": 500, "paidAmount": 500})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Paid");
    assert_eq!(body["balanceOwed"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn installments_move_payment_to_paid() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.class("t1", "c1");
    h.student("t1", "c1", "s1");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (_, created) = h
        .send(
            "POST",
            "/api/payments",
            Some(&admin),
            Some(json!({"studentId": "s1", "amount": 300})),
        )
        .await;
    assert_eq!(created["status"], "Pending");
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/api/payments/{id}/installments");

    let (status, partial) = h
        .send("POST", &uri, Some(&admin), Some(json!({"amount": 120.5})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(partial["status"], "Partial");
    assert_eq!(partial["balanceOwed"].as_f64(), Some(179.5));

    let (status, body) = h
        .send("POST", &uri, Some(&admin), Some(json!({"amount": 200})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, paid) = h
        .send("POST", &uri, Some(&admin), Some(json!({"amount": 179.5})))
        .await;
    assert_eq!(paid["status"], "Paid");
    assert_eq!(paid["balanceOwed"].as_f64(), Some(0.0));

    let (_, dashboard) = h.send("GET", "/api/dashboard", Some(&admin), None).await;
    assert_eq!(dashboard["fees"]["paid"], 1);
    assert_eq!(dashboard["fees"]["outstanding"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn overpayment_is_rejected() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.class("t1", "c1");
    h.student("t1", "c1", "s1");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, _) = h
        .send(
            "POST",
            "/api/payments",
            Some(&admin),
            Some(json!({"studentId": "s1", "amount": 100, "paidAmount": 150})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h
        .send(
            "POST",
            "/api/payments",
            Some(&admin),
            Some(json!({"studentId": "s1", "amount": 1.7e308, "paidAmount": 0})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = h.send("GET", "/api/payments", Some(&admin), None).await;
    assert_eq!(list["payments"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn marking_attendance_again_overwrites() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.class("t1", "c1");
    h.student("t1", "c1", "s1");
    h.student("t1", "c1", "s2");
    let staff = h.user("u-staff", Some("t1"), "staff");

    let save = |status: &str| {
        json!({
            "classId": "c1",
            "date": "2024-03-04",
            "records": [{"studentId": "s1", "status": status}]
        })
    };

    let (status, first) = h
        .send("POST", "/api/attendance/bulk", Some(&staff), Some(save("Present")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["saved"], 1);

    let (status, second) = h
        .send("POST", "/api/attendance/bulk", Some(&staff), Some(save("Absent")))
        .await;
    assert_eq!(status, StatusCode::OK);
    let records = second["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "Absent");

    let (_, summary) = h
        .send(
            "GET",
            "/api/attendance/summary?classId=c1&date=2024-03-04",
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(summary["absent"], 1);
    assert_eq!(summary["present"], 0);
    assert_eq!(summary["unmarked"], 1);
}

#[tokio::test]
async fn attendance_for_foreign_student_writes_nothing() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.tenant("t2", "active");
    h.class("t1", "c1");
    h.class("t2", "c2");
    h.student("t1", "c1", "s1");
    h.student("t2", "c2", "s-other");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, _) = h
        .send(
            "POST",
            "/api/attendance/bulk",
            Some(&admin),
            Some(json!({
                "classId": "c1",
                "date": "2024-03-04",
                "records": [
                    {"studentId": "s1", "status": "Present"},
                    {"studentId": "s-other", "status": "Present"}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = h
        .send(
            "GET",
            "/api/attendance?classId=c1&date=2024-03-04",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(list["records"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn duplicate_tenant_slug_conflicts() {
    let h = Harness::new();
    let root = h.user("root", None, "platform_admin");
    let body = |email: &str| json!({"name": "Hill School", "slug": "hill", "email": email});

    let (status, created) = h
        .send("POST", "/api/admin/tenants", Some(&root), Some(body("a@hill.test")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "active");

    let (status, err) = h
        .send("POST", "/api/admin/tenants", Some(&root), Some(body("b@hill.test")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(err["error"].as_str().unwrap().contains("hill"));
}

#[tokio::test]
async fn school_users_cannot_reach_admin_routes() {
    let h = Harness::new();
    h.tenant("t1", "active");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, _) = h.send("GET", "/api/admin/tenants", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let root = h.user("root", None, "platform_admin");
    let (status, _) = h.send("GET", "/api/students", Some(&root), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn suspending_a_tenant_locks_its_users() {
    let h = Harness::new();
    h.tenant("t1", "active");
    let root = h.user("root", None, "platform_admin");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, _) = h.send("GET", "/api/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, updated) = h
        .send(
            "PUT",
            "/api/admin/tenants/t1",
            Some(&root),
            Some(json!({"status": "suspended"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "suspended");

    let (status, _) = h.send("GET", "/api/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn announcements_include_platform_wide_posts() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.tenant("t2", "active");
    let root = h.user("root", None, "platform_admin");
    let a1 = h.user("u1", Some("t1"), "school_admin");
    let a2 = h.user("u2", Some("t2"), "school_admin");

    let (status, _) = h
        .send(
            "POST",
            "/api/admin/announcements",
            Some(&root),
            Some(json!({"title": "Maintenance", "body": "Down at noon"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = h
        .send(
            "POST",
            "/api/announcements",
            Some(&a1),
            Some(json!({"title": "Sports day", "body": "Friday"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, t1) = h.send("GET", "/api/announcements", Some(&a1), None).await;
    assert_eq!(t1["announcements"].as_array().unwrap().len(), 2);

    let (_, t2) = h.send("GET", "/api/announcements", Some(&a2), None).await;
    let t2 = t2["announcements"].as_array().unwrap();
    assert_eq!(t2.len(), 1);
    assert_eq!(t2[0]["title"], "Maintenance");
}

#[tokio::test]
async fn attendance_rejects_students_of_another_class() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.class("t1", "c1");
    h.class("t1", "c2");
    h.student("t1", "c1", "s1");
    h.student("t1", "c2", "s2");
    let staff = h.user("u-staff", Some("t1"), "staff");

    let (status, body) = h
        .send(
            "POST",
            "/api/attendance/bulk",
            Some(&staff),
            Some(json!({
                "classId": "c1",
                "date": "2024-03-04",
                "records": [{"studentId": "s2", "status": "Present"}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("enrolled"));

    let (_, summary) = h
        .send(
            "GET",
            "/api/attendance/summary?classId=c1&date=2024-03-04",
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(summary["present"], 0);
    assert_eq!(summary["unmarked"], 1);
}

#[tokio::test]
async fn duplicate_tenant_email_conflicts() {
    let h = Harness::new();
    let root = h.user("root", None, "platform_admin");

    let (status, _) = h
        .send(
            "POST",
            "/api/admin/tenants",
            Some(&root),
            Some(json!({"name": "Hill School", "slug": "hill", "email": "office@hill.test"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, err) = h
        .send(
            "POST",
            "/api/admin/tenants",
            Some(&root),
            Some(json!({"name": "Vale School", "slug": "vale", "email": "Office@Hill.test"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(err["error"].as_str().unwrap().contains("email"));

    let (status, vale) = h
        .send(
            "POST",
            "/api/admin/tenants",
            Some(&root),
            Some(json!({"name": "Vale School", "slug": "vale", "email": "office@vale.test"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let vale_id = vale["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .send(
            "PUT",
            &format!("/api/admin/tenants/{vale_id}"),
            Some(&root),
            Some(json!({"email": "office@hill.test"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, same) = h
        .send(
            "PUT",
            &format!("/api/admin/tenants/{vale_id}"),
            Some(&root),
            Some(json!({"email": "office@vale.test", "name": "Vale Academy"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(same["name"], "Vale Academy");
}

#[tokio::test]
async fn null_class_unassigns_a_student() {
    let h = Harness::new();
    h.tenant("t1", "active");
    h.class("t1", "c1");
    h.student("t1", "c1", "s1");
    let admin = h.user("u1", Some("t1"), "school_admin");

    let (status, renamed) = h
        .send(
            "PUT",
            "/api/students/s1",
            Some(&admin),
            Some(json!({"firstName": "Ama"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["classId"], "c1");

    let (status, moved) = h
        .send(
            "PUT",
            "/api/students/s1",
            Some(&admin),
            Some(json!({"classId": null})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(moved["classId"].is_null());
    assert!(moved["className"].is_null());

    let (_, roster) = h
        .send("GET", "/api/classes/c1/students", Some(&admin), None)
        .await;
    assert_eq!(roster.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn new_school_user_can_log_in_and_change_password() {
    let h = Harness::new();
    h.tenant("t1", "active");
    let root = h.user("root", None, "platform_admin");

    let (status, created) = h
        .send(
            "POST",
            "/api/admin/tenants/t1/users",
            Some(&root),
            Some(json!({
                "email": "clerk@t1.test",
                "name": "Clerk",
                "password": "first-pass-1",
                "role": "staff"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "staff");

    let login = |password: &str| json!({"email": "clerk@t1.test", "password": password});
    let (status, body) = h
        .send("POST", "/api/auth/login", None, Some(login("first-pass-1")))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["accessToken"].as_str().unwrap().to_string();

    let (status, _) = h
        .send(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({"currentPassword": "not-my-pass", "newPassword": "second-pass-2"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h
        .send(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({"currentPassword": "first-pass-1", "newPassword": "second-pass-2"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .send("POST", "/api/auth/login", None, Some(login("first-pass-1")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = h
        .send("POST", "/api/auth/login", None, Some(login("second-pass-2")))
        .await;
    assert_eq!(status, StatusCode::OK);
}
