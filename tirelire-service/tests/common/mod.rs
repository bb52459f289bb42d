//! Shared harness for the HTTP integration tests.
//!
//! Drives the real router with `oneshot` over the in-memory store, the
//! recording mail mock, a fixed-answer face matcher and a temp upload dir.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use std::{net::SocketAddr, sync::Arc};
use tempfile::TempDir;
use tirelire_service::{
    build_router,
    config::{
        Environment, FaceMatchConfig, JwtConfig, MongoConfig, PublicUrls, RateLimitConfig,
        SecurityConfig, SmtpConfig, StoreBackend, SwaggerConfig, SwaggerMode, TirelireConfig,
        UploadConfig,
    },
    models::Role,
    services::{
        email::SentEmailKind, InMemoryStore, JwtService, LocalImageStorage, MockEmailService,
        MockFaceMatcher,
    },
    AppState,
};
use tower::util::ServiceExt;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-with-at-least-32-bytes";
pub const PASSWORD: &str = "motdepasse";

pub fn test_config(upload_dir: &str) -> TirelireConfig {
    TirelireConfig {
        common: CommonConfig::default(),
        environment: Environment::Dev,
        service_name: "tirelire-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        store: StoreBackend::Memory,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "tirelire_test".to_string(),
        },
        jwt: JwtConfig {
            secret: Some(TEST_JWT_SECRET.to_string()),
            private_key_path: None,
            public_key_path: None,
            access_token_expiry_minutes: 60,
            email_token_expiry_hours: 24,
            reset_token_expiry_minutes: 60,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 1025,
            user: None,
            password: None,
            from: "Tirelire <no-reply@tirelire.test>".to_string(),
        },
        urls: PublicUrls {
            api_url: "http://api.tirelire.test".to_string(),
            frontend_url: "http://app.tirelire.test".to_string(),
        },
        uploads: UploadConfig {
            dir: upload_dir.to_string(),
            max_image_bytes: 5 * 1024 * 1024,
        },
        face_match: FaceMatchConfig {
            url: "http://127.0.0.1:9/compare".to_string(),
            timeout_seconds: 1,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://app.tirelire.test".to_string()],
            trusted_proxies: Vec::new(),
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            register_attempts: 100,
            register_window_seconds: 60,
            password_reset_attempts: 100,
            password_reset_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub mail: MockEmailService,
    pub config: TirelireConfig,
    uploads: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::builder().build().await
    }

    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            matcher: MockFaceMatcher::matching(0.92),
            mail: MockEmailService::new(),
            tweak: None,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Send a request as if it arrived over a socket from `peer`.
    pub async fn send_from(&self, peer: &str, mut request: Request<Body>) -> (StatusCode, Value) {
        let addr: SocketAddr = format!("{}:40000", peer).parse().expect("bad peer address");
        request.extensions_mut().insert(ConnectInfo(addr));
        self.send(request).await
    }

    /// Files currently present in the upload directory.
    pub fn upload_count(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .expect("upload dir missing")
            .count()
    }

    pub async fn post_json(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        form: MultipartBody,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let (content_type, body) = form.finish();
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn register(&self, email: &str) -> (StatusCode, Value) {
        self.post_json(
            "/api/auth/register",
            json!({
                "email": email,
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
                "firstName": "Amina",
                "lastName": "Benali"
            }),
            None,
        )
        .await
    }

    /// Register, redeem the mailed verification token and return the session token.
    pub async fn verified_user(&self, email: &str) -> String {
        let (status, _) = self.register(email).await;
        assert_eq!(status, StatusCode::CREATED);

        let token = self
            .mail
            .last_token(SentEmailKind::Verification, email)
            .expect("verification mail not sent");
        let (status, body) = self
            .post_json("/api/auth/validate", json!({ "token": token }), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        session_token(&body)
    }

    /// A verified user promoted to admin directly in the store.
    pub async fn admin(&self, email: &str) -> String {
        let token = self.verified_user(email).await;
        let promoted = self
            .store
            .update_user(email, |user| user.role = Role::Admin)
            .expect("store update failed");
        assert!(promoted);
        token
    }
}

pub struct TestAppBuilder {
    matcher: MockFaceMatcher,
    mail: MockEmailService,
    tweak: Option<Box<dyn FnOnce(&mut TirelireConfig)>>,
}

impl TestAppBuilder {
    pub fn matcher(mut self, matcher: MockFaceMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn mail(mut self, mail: MockEmailService) -> Self {
        self.mail = mail;
        self
    }

    pub fn config(mut self, tweak: impl FnOnce(&mut TirelireConfig) + 'static) -> Self {
        self.tweak = Some(Box::new(tweak));
        self
    }

    pub async fn build(self) -> TestApp {
        let uploads = TempDir::new().expect("failed to create upload dir");
        let mut config = test_config(&uploads.path().to_string_lossy());
        if let Some(tweak) = self.tweak {
            tweak(&mut config);
        }

        let store = Arc::new(InMemoryStore::new());
        let storage = LocalImageStorage::new(
            uploads.path(),
            &config.urls.api_url,
            config.uploads.max_image_bytes,
        )
        .await
        .expect("failed to create storage");
        let jwt = JwtService::new(&config.jwt).expect("failed to create JWT service");

        let state = AppState::build(
            config.clone(),
            store.clone(),
            Arc::new(self.mail.clone()),
            Arc::new(self.matcher),
            Arc::new(storage),
            jwt,
        );

        TestApp {
            router: build_router(state),
            store,
            mail: self.mail,
            config,
            uploads,
        }
    }
}

pub fn session_token(body: &Value) -> String {
    body["data"]["token"]
        .as_str()
        .expect("response carries no session token")
        .to_string()
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "tirelire-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn png(self, name: &str) -> Self {
        self.file(name, "photo.png", "image/png", b"\x89PNG\r\n\x1a\nfake-image-bytes")
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

/// A complete, valid KYC submission form.
pub fn kyc_form(national_id: &str) -> MultipartBody {
    MultipartBody::new()
        .text("firstName", "Yassine")
        .text("lastName", "Zahraoui")
        .text("nationalIdNumber", national_id)
        .text("dateOfBirth", "1990-04-12")
        .text("street", "12 avenue Hassan II")
        .text("city", "Rabat")
        .text("postalCode", "10000")
        .text("country", "Maroc")
        .png("nationalIdImage")
}
