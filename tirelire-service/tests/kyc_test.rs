mod common;

use axum::http::StatusCode;
use common::{kyc_form, MultipartBody, TestApp};
use tirelire_service::services::MockFaceMatcher;

async fn submitted_kyc(app: &TestApp, email: &str, national_id: &str) -> (String, String) {
    let token = app.verified_user(email).await;
    let (status, body) = app
        .post_multipart("/service/kyc", kyc_form(national_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let kyc_id = body["data"]["id"].as_str().unwrap().to_string();
    (token, kyc_id)
}

fn selfie() -> MultipartBody {
    MultipartBody::new().png("selfieImage")
}

#[tokio::test]
async fn submission_is_unique_per_user_and_national_id() {
    let app = TestApp::spawn().await;
    let (token_u, _) = submitted_kyc(&app, "u@x.com", "123").await;

    let (status, body) = app
        .post_multipart("/service/kyc", kyc_form("456"), Some(&token_u))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Vous avez déjà soumis vos informations KYC");

    let token_v = app.verified_user("v@x.com").await;
    let (status, body) = app
        .post_multipart("/service/kyc", kyc_form("123"), Some(&token_v))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "Cette carte nationale d'identité est déjà utilisée"
    );
    assert_eq!(app.upload_count(), 1);
}

#[tokio::test]
async fn submission_creates_a_pending_case() {
    let app = TestApp::spawn().await;
    let token = app.verified_user("pending@x.com").await;

    let (status, body) = app
        .post_multipart("/service/kyc", kyc_form("AB123456"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let data = &body["data"];
    assert_eq!(data["status"], "pending");
    assert_eq!(data["facialVerificationCompleted"], false);
    assert_eq!(data["birthDate"], "1990-04-12");
    assert_eq!(data["address"]["city"], "Rabat");

    let image_url = data["nationalIdImageUrl"].as_str().unwrap();
    let prefix = format!("{}/uploads/tirelire-image-", app.config.urls.api_url);
    assert!(image_url.starts_with(&prefix), "{image_url}");
    assert!(image_url.ends_with(".png"));

    let file_name = image_url.rsplit('/').next().unwrap();
    let (status, _) = app.get(&format!("/uploads/{}", file_name), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn submission_input_is_validated() {
    let app = TestApp::spawn().await;
    let token = app.verified_user("invalid@x.com").await;

    let missing_image = MultipartBody::new()
        .text("firstName", "Yassine")
        .text("lastName", "Zahraoui")
        .text("nationalIdNumber", "X1")
        .text("dateOfBirth", "1990-04-12")
        .text("street", "1 rue")
        .text("city", "Rabat")
        .text("postalCode", "10000")
        .text("country", "Maroc");
    let (status, _) = app
        .post_multipart("/service/kyc", missing_image, Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let future_birth = MultipartBody::new()
        .text("firstName", "Yassine")
        .text("lastName", "Zahraoui")
        .text("nationalIdNumber", "X2")
        .text("dateOfBirth", "2999-01-01")
        .text("street", "1 rue")
        .text("city", "Rabat")
        .text("postalCode", "10000")
        .text("country", "Maroc")
        .png("nationalIdImage");
    let (status, _) = app
        .post_multipart("/service/kyc", future_birth, Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let wrong_type = MultipartBody::new()
        .text("firstName", "Yassine")
        .text("lastName", "Zahraoui")
        .text("nationalIdNumber", "X3")
        .text("dateOfBirth", "1990-04-12")
        .text("street", "1 rue")
        .text("city", "Rabat")
        .text("postalCode", "10000")
        .text("country", "Maroc")
        .file("nationalIdImage", "id.pdf", "application/pdf", b"%PDF-1.4");
    let (status, _) = app
        .post_multipart("/service/kyc", wrong_type, Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_multipart(
            "/service/kyc",
            MultipartBody::new().text("firstName", "Yassine"),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was persisted by the rejected attempts.
    let (status, _) = app.get("/service/kyc", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn selfie_mismatch_leaves_case_pending() {
    let app = TestApp::builder()
        .matcher(MockFaceMatcher::mismatching(0.2))
        .build()
        .await;
    let (token, _) = submitted_kyc(&app, "mismatch@x.com", "M1").await;

    let (status, body) = app
        .post_multipart("/service/kyc/validate", selfie(), Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app.get("/service/kyc", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["facialVerificationCompleted"], false);
}

#[tokio::test]
async fn selfie_match_approves_once() {
    let app = TestApp::builder()
        .matcher(MockFaceMatcher::matching(0.93))
        .build()
        .await;
    let (token, _) = submitted_kyc(&app, "match@x.com", "M2").await;

    let (status, body) = app
        .post_multipart("/service/kyc/validate", selfie(), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Image correspond à la carte nationale d'identité");
    let data = &body["data"];
    assert_eq!(data["status"], "approved");
    assert_eq!(data["facialVerificationCompleted"], true);
    assert_eq!(data["facialVerificationScore"], 0.93);
    assert_eq!(data["reviewedBy"]["source"], "ai");
    assert!(data["reviewedBy"]["user"].is_null());
    assert!(data["selfieImageUrl"].as_str().is_some());

    let (status, body) = app
        .post_multipart("/service/kyc/validate", selfie(), Some(&token))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Vous avez déjà vérifié votre identité");
}

#[tokio::test]
async fn scorer_failure_is_a_server_error() {
    let app = TestApp::builder()
        .matcher(MockFaceMatcher::unavailable())
        .build()
        .await;
    let (token, _) = submitted_kyc(&app, "down@x.com", "M3").await;

    let (status, _) = app
        .post_multipart("/service/kyc/validate", selfie(), Some(&token))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, body) = app.get("/service/kyc", Some(&token)).await;
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(app.upload_count(), 1);
}

#[tokio::test]
async fn rejected_selfies_leave_no_files_behind() {
    let app = TestApp::builder()
        .matcher(MockFaceMatcher::mismatching(0.1))
        .build()
        .await;
    let (token, _) = submitted_kyc(&app, "spam@x.com", "S1").await;
    assert_eq!(app.upload_count(), 1);

    for _ in 0..5 {
        let (status, _) = app
            .post_multipart("/service/kyc/validate", selfie(), Some(&token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    assert_eq!(app.upload_count(), 1);
}

#[tokio::test]
async fn self_validation_without_case_or_selfie() {
    let app = TestApp::spawn().await;
    let token = app.verified_user("nocase@x.com").await;

    let (status, _) = app
        .post_multipart("/service/kyc/validate", selfie(), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post_multipart("/service/kyc/validate", MultipartBody::new(), Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn kyc_read_access_control() {
    let app = TestApp::spawn().await;
    let (owner, kyc_id) = submitted_kyc(&app, "owner@x.com", "R1").await;
    let stranger = app.verified_user("stranger@x.com").await;
    let admin = app.admin("admin@x.com").await;

    let (status, _) = app
        .get(&format!("/service/kyc?kycId={}", kyc_id), Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .get(&format!("/service/kyc?kycId={}", kyc_id), Some(&stranger))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .get(&format!("/service/kyc?kycId={}", kyc_id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], kyc_id.as_str());

    let (status, _) = app
        .get("/service/kyc?kycId=does-not-exist", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/service/kyc", Some(&stranger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/service/kyc", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let app = TestApp::spawn().await;
    let user = app.verified_user("plain@x.com").await;

    let (status, _) = app.get("/service/kyc/admin", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let form = MultipartBody::new()
        .text("kycId", "whatever")
        .text("status", "approved");
    let (status, _) = app
        .post_multipart("/service/kyc/admin/validate", form, Some(&user))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/service/kyc/admin", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_lists_cases_newest_first() {
    let app = TestApp::spawn().await;
    let admin = app.admin("admin@x.com").await;

    let (status, body) = app.get("/service/kyc/admin", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let (_, first) = submitted_kyc(&app, "first@x.com", "L1").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (_, second) = submitted_kyc(&app, "second@x.com", "L2").await;

    let (status, body) = app.get("/service/kyc/admin", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
}

#[tokio::test]
async fn admin_review_decisions() {
    let app = TestApp::spawn().await;
    let admin = app.admin("admin@x.com").await;
    let (owner, kyc_id) = submitted_kyc(&app, "reviewed@x.com", "A1").await;

    let review = |status: &str| {
        MultipartBody::new()
            .text("kycId", &kyc_id)
            .text("status", status)
    };

    let (status, _) = app
        .post_multipart("/service/kyc/admin/validate", review("rejected"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_multipart("/service/kyc/admin/validate", review("maybe"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_multipart(
            "/service/kyc/admin/validate",
            review("rejected").text("rejectionReason", "Photo illisible"),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["status"], "rejected");
    assert_eq!(data["rejectionReason"], "Photo illisible");
    assert_eq!(data["facialVerificationCompleted"], true);
    assert_eq!(data["facialVerificationScore"], 1.0);
    assert_eq!(data["reviewedBy"]["source"], "human");
    assert!(data["reviewedBy"]["user"].as_str().is_some());

    let (status, body) = app
        .post_multipart(
            "/service/kyc/admin/validate",
            review("approved").png("selfieImage"),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert!(body["data"].get("rejectionReason").is_none());
    assert!(body["data"]["selfieImageUrl"].as_str().is_some());

    let (status, body) = app
        .post_multipart("/service/kyc/admin/validate", review("pending"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["facialVerificationCompleted"], false);
    assert!(body["data"].get("facialVerificationScore").is_none());

    // Reopened, so the owner may try the selfie check again.
    let (status, _) = app
        .post_multipart("/service/kyc/validate", selfie(), Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);

    let unknown = MultipartBody::new()
        .text("kycId", "missing")
        .text("status", "approved");
    let (status, _) = app
        .post_multipart("/service/kyc/admin/validate", unknown, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
