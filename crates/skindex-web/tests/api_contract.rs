use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use skindex_core::{QualityStatus, Role};
use skindex_database::{MemoryRepository, NewUser, Repository};
use skindex_storage::ImageStore;
use skindex_web::{create_app, AppState, AuthService, AuthSettings};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "skindex-test-boundary";

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        Self::with_upload_limit(skindex_web::state::DEFAULT_MAX_UPLOAD_BYTES)
    }

    fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let auth = AuthService::new(AuthSettings {
            jwt_secret: "contract-test-secret".to_string(),
            bcrypt_cost: 4,
            ..AuthSettings::default()
        });
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let state = AppState::new(repo, ImageStore::in_memory(), auth)
            .unwrap()
            .with_max_upload_bytes(max_upload_bytes);
        Self {
            router: create_app(state.clone()),
            state,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body, content_type)
    }

    async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, bytes, _) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(&self, email: &str, password: &str, role: &str) -> (StatusCode, Value) {
        self.json(
            Method::POST,
            "/register",
            None,
            Some(json!({ "email": email, "password": password, "name": "Test User", "role": role })),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .json(Method::POST, "/login", None, Some(json!({ "email": email, "password": password })))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_admin(&self) -> String {
        let hash = self.state.auth.hash_password("admin-pass").await.unwrap();
        self.state
            .repo
            .create_user(&NewUser {
                role: Role::Admin,
                name: "Admin".to_string(),
                email: "admin@skindex.org".to_string(),
                password_hash: hash,
                doctor_id: None,
            })
            .await
            .unwrap();
        self.login("admin@skindex.org", "admin-pass").await
    }

    async fn add_patient(&self, doctor_token: &str, email: &str) -> i32 {
        let (status, body) = self
            .json(
                Method::POST,
                "/add-patient",
                Some(doctor_token),
                Some(json!({ "email": email, "name": "Patient", "password": "patient-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "add patient failed: {}", body);
        id_from_message(&body)
    }

    async fn upload(&self, token: &str, patient_id: Option<i32>) -> (StatusCode, Value) {
        let mut body = Vec::new();
        if let Some(patient_id) = patient_id {
            body.extend_from_slice(
                format!(
                    "--{b}\r\nContent-Disposition: form-data; name=\"patientId\"\r\n\r\n{p}\r\n",
                    b = BOUNDARY,
                    p = patient_id
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"lesion.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
                b = BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"fake-jpeg-data");
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload-image")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, bytes, _) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// 注册并登录一名医生，返回其令牌
    async fn doctor(&self, email: &str) -> String {
        let (status, _) = self.register(email, "doctor-pass", "doctor").await;
        assert_eq!(status, StatusCode::CREATED);
        self.login(email, "doctor-pass").await
    }
}

fn id_from_message(body: &Value) -> i32 {
    body["message"]
        .as_str()
        .and_then(|m| m.rsplit(": ").next())
        .and_then(|id| id.parse().ok())
        .unwrap_or_else(|| panic!("no id in {}", body))
}

#[tokio::test]
async fn root_and_health_are_public() {
    let app = TestApp::new();

    let (status, body) = app.json(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK");

    app.register("doc@clinic.org", "doctor-pass", "doctor").await;
    let (status, body) = app.json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["userCount"], 1);
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new();

    let (status, body) = app.register("not-an-email", "secret1", "doctor").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid email format");
    assert_eq!(body["status"], 400);

    let (status, body) = app.register("a@clinic.org", "123", "doctor").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters");

    let (status, body) = app.register("a@clinic.org", "secret1", "nurse").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid role. Must be 'doctor', 'patient', or 'admin'");

    let (status, _) = app.register("a@clinic.org", "secret1", "admin").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_email_returns_conflict() {
    let app = TestApp::new();

    let (status, body) = app.register("Doc@Clinic.org", "secret1", "doctor").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User created with ID: 1");

    // 邮箱不区分大小写
    let (status, body) = app.register("doc@clinic.org", "secret2", "patient").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn login_issues_token_or_rejects() {
    let app = TestApp::new();
    app.register("doc@clinic.org", "doctor-pass", "doctor").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "doc@clinic.org", "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Wrong email or password");

    let (status, body) = app
        .json(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "DOC@clinic.org", "password": "doctor-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successful entry for doc@clinic.org");

    let claims = app.state.auth.verify_token(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.role, "doctor");
    assert_eq!(claims.user_id, 1);
}

#[tokio::test]
async fn protected_routes_require_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.json(Method::GET, "/images", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing token");

    let (status, _) = app.json(Method::GET, "/images", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_and_ids_are_bad_requests() {
    let app = TestApp::new();
    let token = app.doctor("doc@clinic.org").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/add-patient")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, bytes, _) = app.send(request).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid input:"));

    let (status, body) = app.json(Method::GET, "/images/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid ID");
}

#[tokio::test]
async fn doctor_manages_own_patients() {
    let app = TestApp::new();
    let doctor = app.doctor("doc@clinic.org").await;
    let other_doctor = app.doctor("other@clinic.org").await;

    let patient_id = app.add_patient(&doctor, "pat@clinic.org").await;

    let (status, body) = app.json(Method::GET, "/patients", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["doctorId"], 1);

    let (_, body) = app.json(Method::GET, "/patients", Some(&other_doctor), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let uri = format!("/users/{}", patient_id);
    let (status, _) = app.json(Method::GET, &uri, Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::GET, &uri, Some(&other_doctor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let patient = app.login("pat@clinic.org", "patient-pass").await;
    let (status, _) = app.json(Method::GET, "/patients", Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn user_updates_own_name() {
    let app = TestApp::new();
    let doctor = app.doctor("doc@clinic.org").await;

    let (status, body) = app.json(Method::PUT, "/users/1", Some(&doctor), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name required");

    let (status, _) = app
        .json(Method::PUT, "/users/1", Some(&doctor), Some(json!({ "name": "Dr. Grey" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.json(Method::GET, "/users/1", Some(&doctor), None).await;
    assert_eq!(body["data"]["name"], "Dr. Grey");
    assert!(body["data"].get("passwordHash").is_none());

    let other = app.doctor("other@clinic.org").await;
    let (status, _) = app
        .json(Method::PUT, "/users/1", Some(&other), Some(json!({ "name": "Hijack" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn upload_rules_by_role() {
    let app = TestApp::new();
    let doctor = app.doctor("doc@clinic.org").await;
    let other_doctor = app.doctor("other@clinic.org").await;
    let patient_id = app.add_patient(&doctor, "pat@clinic.org").await;

    let (status, body) = app.upload(&doctor, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "patientId is required");

    let (status, _) = app.upload(&doctor, Some(999)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.upload(&doctor, Some(2)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "doctor id is not a patient: {}", body);

    let (status, _) = app.upload(&other_doctor, Some(patient_id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.upload(&doctor, Some(patient_id)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["message"].as_str().unwrap().starts_with("Image uploaded with ID: "));

    // 患者只能为自己上传
    let patient = app.login("pat@clinic.org", "patient-pass").await;
    let (status, body) = app.upload(&patient, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let image_id = id_from_message(&body);
    let (_, body) = app
        .json(Method::GET, &format!("/images/{}", image_id), Some(&patient), None)
        .await;
    assert_eq!(body["data"]["patientId"], patient_id);
    assert_eq!(body["data"]["qualityStatus"], "pending");
}

#[tokio::test]
async fn patient_cannot_view_other_patients_images() {
    let app = TestApp::new();
    let doctor = app.doctor("doc@clinic.org").await;
    let alice_id = app.add_patient(&doctor, "alice@clinic.org").await;
    app.add_patient(&doctor, "bob@clinic.org").await;

    let (_, body) = app.upload(&doctor, Some(alice_id)).await;
    let image_id = id_from_message(&body);
    let uri = format!("/images/{}", image_id);

    let bob = app.login("bob@clinic.org", "patient-pass").await;
    let (status, body) = app.json(Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");
    let (_, body) = app.json(Method::GET, "/images", Some(&bob), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let alice = app.login("alice@clinic.org", "patient-pass").await;
    let (status, _) = app.json(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.json(Method::GET, "/images", Some(&alice), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let request = Request::builder()
        .uri(format!("{}/file", uri))
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .body(Body::empty())
        .unwrap();
    let (status, bytes, content_type) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"fake-jpeg-data");
    assert_eq!(content_type.as_deref(), Some("image/jpeg"));
}

#[tokio::test]
async fn diagnosis_requires_accepted_image() {
    let app = TestApp::new();
    let doctor = app.doctor("doc@clinic.org").await;
    let patient_id = app.add_patient(&doctor, "pat@clinic.org").await;
    let (_, body) = app.upload(&doctor, Some(patient_id)).await;
    let image_id = id_from_message(&body);

    let diagnosis = json!({ "imageId": image_id, "diagnosis": "Melanoma", "probability": 0.8734 });
    let (status, _) = app
        .json(Method::POST, "/diagnoses", Some(&doctor), Some(diagnosis.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(Method::PUT, &format!("/images/{}", image_id), Some(&doctor), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Quality status required");

    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/images/{}", image_id),
            Some(&doctor),
            Some(json!({ "qualityStatus": "accepted" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .json(Method::POST, "/diagnoses", Some(&doctor), Some(diagnosis))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let diagnosis_id = id_from_message(&body);

    let (_, body) = app
        .json(Method::GET, &format!("/diagnoses?imageId={}", image_id), Some(&doctor), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["probability"], 0.87);

    let uri = format!("/diagnoses/{}", diagnosis_id);
    let (status, _) = app
        .json(Method::PUT, &uri, Some(&doctor), Some(json!({ "diagnosis": "Mole" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.json(Method::GET, &uri, Some(&doctor), None).await;
    assert_eq!(body["data"]["diagnosis"], "Mole");
    assert_eq!(body["data"]["probability"], 1.0);

    let patient = app.login("pat@clinic.org", "patient-pass").await;
    let (status, _) = app.json(Method::GET, &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::DELETE, &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_user_cascades_to_images_and_diagnoses() {
    let app = TestApp::new();
    let doctor = app.doctor("doc@clinic.org").await;
    let patient_id = app.add_patient(&doctor, "pat@clinic.org").await;
    let (_, body) = app.upload(&doctor, Some(patient_id)).await;
    let image_id = id_from_message(&body);
    app.json(
        Method::PUT,
        &format!("/images/{}", image_id),
        Some(&doctor),
        Some(json!({ "qualityStatus": "accepted" })),
    )
    .await;
    app.json(
        Method::POST,
        "/diagnoses",
        Some(&doctor),
        Some(json!({ "imageId": image_id, "diagnosis": "Eczema", "probability": 0.5 })),
    )
    .await;

    let stored = app.state.repo.get_image(image_id).await.unwrap().unwrap().file_path;

    let (status, body) = app
        .json(Method::DELETE, &format!("/users/{}", patient_id), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = app
        .json(Method::GET, &format!("/images/{}", image_id), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.json(Method::GET, "/diagnoses", Some(&doctor), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    assert!(app.state.store.read(&stored).await.is_err());

    let (status, _) = app
        .json(Method::GET, &format!("/users/{}", patient_id), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logs_are_admin_only() {
    let app = TestApp::new();
    let doctor = app.doctor("doc@clinic.org").await;

    let (status, body) = app.json(Method::GET, "/logs", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only admins can access");

    let admin = app.create_admin().await;
    let (status, body) = app.json(Method::GET, "/logs", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = body["data"].as_array().unwrap();
    assert!(logs.iter().any(|l| l["action"] == "Registered"));

    let log_id = logs[0]["id"].as_i64().unwrap();
    let (status, body) = app
        .json(Method::GET, &format!("/logs/{}", log_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], log_id);

    let (status, _) = app.json(Method::GET, "/logs/9999", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_creates_users() {
    let app = TestApp::new();
    let admin = app.create_admin().await;
    let doctor = app.doctor("doc@clinic.org").await;

    let request = json!({ "email": "p@clinic.org", "name": "P", "role": "patient", "doctorId": 2 });
    let (status, _) = app.json(Method::POST, "/users", Some(&doctor), Some(request.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.json(Method::POST, "/users", Some(&admin), Some(request)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = app
        .json(
            Method::POST,
            "/users",
            Some(&admin),
            Some(json!({ "email": "d2@clinic.org", "name": "D2", "role": "doctor" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters");

    let (_, body) = app.json(Method::GET, "/users", Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, body) = app.json(Method::GET, "/patients", Some(&doctor), None).await;
    assert_eq!(body["data"][0]["email"], "p@clinic.org");
}

#[tokio::test]
async fn metrics_are_exposed() {
    let app = TestApp::new();
    app.json(Method::GET, "/", None, None).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, bytes, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("skindex_http_requests_total"));
}

/// 上传、审核并添加诊断，返回 (影像ID, 诊断ID)
async fn diagnosed_image(app: &TestApp, doctor: &str, patient_id: i32) -> (i32, i32) {
    let (_, body) = app.upload(doctor, Some(patient_id)).await;
    let image_id = id_from_message(&body);
    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/images/{}", image_id),
            Some(doctor),
            Some(json!({ "qualityStatus": "accepted" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .json(
            Method::POST,
            "/diagnoses",
            Some(doctor),
            Some(json!({ "imageId": image_id, "diagnosis": "Mole", "probability": 0.6 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    (image_id, id_from_message(&body))
}

#[tokio::test]
async fn diagnosed_image_stays_accepted() {
    let app = TestApp::new();
    let doctor = app.doctor("doc@clinic.org").await;
    let patient_id = app.add_patient(&doctor, "pat@clinic.org").await;
    let (image_id, diagnosis_id) = diagnosed_image(&app, &doctor, patient_id).await;
    let image_uri = format!("/images/{}", image_id);
    let diagnosis_uri = format!("/diagnoses/{}", diagnosis_id);

    let (status, body) = app
        .json(Method::PUT, &image_uri, Some(&doctor), Some(json!({ "qualityStatus": "rejected" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Image has diagnoses; delete them before changing its status");
    let (_, body) = app.json(Method::GET, &image_uri, Some(&doctor), None).await;
    assert_eq!(body["data"]["qualityStatus"], "accepted");

    // 绕过接口直接降级后，诊断也不能再修改
    app.state
        .repo
        .update_image_quality(image_id, QualityStatus::Pending, None)
        .await
        .unwrap();
    let (status, body) = app
        .json(Method::PUT, &diagnosis_uri, Some(&doctor), Some(json!({ "diagnosis": "Eczema" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Image must be accepted before adding a diagnosis");

    let (status, _) = app.json(Method::DELETE, &diagnosis_uri, Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .json(Method::PUT, &image_uri, Some(&doctor), Some(json!({ "qualityStatus": "rejected" })))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn deleting_image_removes_diagnoses_and_file() {
    let app = TestApp::new();
    let admin = app.create_admin().await;
    let doctor = app.doctor("doc@clinic.org").await;
    let patient_id = app.add_patient(&doctor, "pat@clinic.org").await;
    let (image_id, diagnosis_id) = diagnosed_image(&app, &doctor, patient_id).await;
    let stored = app.state.repo.get_image(image_id).await.unwrap().unwrap().file_path;

    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/diagnoses/{}", diagnosis_id),
            Some(&doctor),
            Some(json!({ "diagnosis": "Psoriasis & Lichen", "probability": 0.7 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .json(
            Method::POST,
            "/diagnoses",
            Some(&doctor),
            Some(json!({ "imageId": image_id, "diagnosis": "Eczema", "probability": 0.2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let extra_id = id_from_message(&body);
    let (status, _) = app
        .json(Method::DELETE, &format!("/diagnoses/{}", extra_id), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::DELETE, &format!("/images/{}", image_id), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::GET, &format!("/images/{}", image_id), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app
        .json(Method::GET, &format!("/diagnoses?imageId={}", image_id), Some(&doctor), None)
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());
    let (status, _) = app
        .json(Method::GET, &format!("/diagnoses/{}", diagnosis_id), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.state.store.read(&stored).await.is_err());

    let (status, _) = app
        .json(Method::PUT, "/users/2", Some(&doctor), Some(json!({ "name": "Dr. Grey" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app
        .json(
            Method::POST,
            "/users",
            Some(&admin),
            Some(json!({ "email": "temp@clinic.org", "name": "Temp", "role": "patient" })),
        )
        .await;
    let temp_id = id_from_message(&body);
    let (status, _) = app
        .json(Method::DELETE, &format!("/users/{}", temp_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.json(Method::GET, "/logs", Some(&admin), None).await;
    let actions: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["action"].as_str())
        .collect();
    for expected in [
        "Added patient",
        "Uploaded image",
        "Updated image",
        "Added diagnosis",
        "Updated diagnosis",
        "Deleted diagnosis",
        "Deleted image",
        "Updated user",
        "Created user",
        "Deleted user",
    ] {
        assert!(actions.contains(&expected), "missing audit action {}: {:?}", expected, actions);
    }
}

#[tokio::test]
async fn oversized_upload_is_reported() {
    let app = TestApp::with_upload_limit(8);
    let doctor = app.doctor("doc@clinic.org").await;
    let patient_id = app.add_patient(&doctor, "pat@clinic.org").await;

    let (status, body) = app.upload(&doctor, Some(patient_id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Image exceeds upload limit");
}
