use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use futures_util::future::join;
use integration_tests::{bearer, init_app, send, Harness, Outbox, Sent, JWT_SECRET, PASSWORD};
use serde_json::json;
use sm_auth_simple::SimpleAuthProvider;
use sm_core::otp::OtpPurpose;
use sm_core::traits::{AuthProvider, MockMailer, UserRepo};

fn post(uri: &str, body: serde_json::Value) -> TestRequest {
    TestRequest::post().uri(uri).set_json(body)
}

#[actix_web::test]
async fn health_check_answers() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let (status, body) = send(&app, TestRequest::get().uri("/api/").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ShopMate API is running");
}

#[actix_web::test]
async fn registration_requires_verification_before_login() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let register = json!({ "name": "Asha Rao", "email": "Asha@Example.com", "password": "secret1" });
    let (status, body) = send(&app, post("/api/auth/register", register).to_request()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "asha@example.com");
    assert_eq!(body["user"]["verified"], false);
    assert!(body["user"].get("password_hash").is_none());

    let login = json!({ "email": "asha@example.com", "password": "secret1" });
    let (status, body) = send(&app, post("/api/auth/login", login.clone()).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "FORBIDDEN");

    let wrong = json!({ "email": "asha@example.com", "code": "not-it" });
    let (status, body) = send(&app, post("/api/auth/verify-otp", wrong).to_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "OTP_INVALID_CODE");

    let code = harness.outbox.last_code("asha@example.com").unwrap();
    let verify = json!({ "email": "asha@example.com", "otp": code });
    let (status, body) = send(&app, post("/api/auth/verify-otp", verify.clone()).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["verified"], true);
    let token = body["access_token"].as_str().unwrap().to_string();

    // The code is consumed.
    let (status, body) = send(&app, post("/api/auth/verify-otp", verify).to_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "OTP_NOT_ISSUED");

    let (status, body) = send(
        &app,
        TestRequest::get().uri("/api/auth/me").insert_header(bearer(&token)).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "asha@example.com");

    let (status, body) = send(&app, post("/api/auth/login", login).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
}

#[actix_web::test]
async fn duplicate_email_conflicts() {
    let harness = Harness::new().await;
    harness.user("taken@example.com").await;
    let app = init_app!(harness);

    let register = json!({ "name": "Someone", "email": "taken@example.com", "password": "secret1" });
    let (status, body) = send(&app, post("/api/auth/register", register).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
}

#[actix_web::test]
async fn codes_only_unlock_their_own_purpose() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let register = json!({ "name": "Ravi", "email": "ravi@example.com", "password": "secret1" });
    send(&app, post("/api/auth/register", register).to_request()).await;
    let code = harness.outbox.last_code("ravi@example.com").unwrap();

    let reset = json!({ "email": "ravi@example.com", "code": code, "new_password": "another1" });
    let (status, body) = send(&app, post("/api/auth/reset-password", reset).to_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "OTP_INVALID_PURPOSE");
}

#[actix_web::test]
async fn password_reset_replaces_the_hash() {
    let harness = Harness::new().await;
    harness.user("meera@example.com").await;
    let app = init_app!(harness);

    let (status, _) = send(
        &app,
        post("/api/auth/forgot-password", json!({ "email": "meera@example.com" })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let code = harness.outbox.last_code("meera@example.com").unwrap();
    assert!(harness.outbox.all().contains(&Sent::Otp {
        to: "meera@example.com".into(),
        code: code.clone(),
        purpose: OtpPurpose::Reset,
    }));

    let reset = json!({ "email": "meera@example.com", "code": code, "new_password": "fresh-pass" });
    let (status, _) = send(&app, post("/api/auth/reset-password", reset).to_request()).await;
    assert_eq!(status, StatusCode::OK);

    let old = json!({ "email": "meera@example.com", "password": PASSWORD });
    let (status, body) = send(&app, post("/api/auth/login", old).to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "UNAUTHORIZED");

    let new = json!({ "email": "meera@example.com", "password": "fresh-pass" });
    let (status, _) = send(&app, post("/api/auth/login", new).to_request()).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn resend_supersedes_the_previous_code() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let register = json!({ "name": "Nila", "email": "nila@example.com", "password": "secret1" });
    send(&app, post("/api/auth/register", register).to_request()).await;
    let first = harness.outbox.last_code("nila@example.com").unwrap();

    let resend = json!({ "email": "nila@example.com" });
    let (status, _) = send(&app, post("/api/auth/resend-otp", resend.clone()).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let second = harness.outbox.last_code("nila@example.com").unwrap();

    if first != second {
        let stale = json!({ "email": "nila@example.com", "code": first });
        let (status, body) = send(&app, post("/api/auth/verify-otp", stale).to_request()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "OTP_INVALID_CODE");
    }

    let fresh = json!({ "email": "nila@example.com", "code": second });
    let (status, _) = send(&app, post("/api/auth/verify-otp", fresh).to_request()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post("/api/auth/resend-otp", resend).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let unknown = json!({ "email": "nobody@example.com" });
    let (status, _) = send(&app, post("/api/auth/resend-otp", unknown).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn a_reset_code_is_redeemed_once_under_contention() {
    let harness = Harness::new().await;
    harness.user("dual@example.com").await;
    let app = init_app!(harness);

    send(
        &app,
        post("/api/auth/forgot-password", json!({ "email": "dual@example.com" })).to_request(),
    )
    .await;
    let code = harness.outbox.last_code("dual@example.com").unwrap();

    let reset = |password: &str| {
        post(
            "/api/auth/reset-password",
            json!({ "email": "dual@example.com", "code": code, "new_password": password }),
        )
        .to_request()
    };
    let ((first, _), (second, _)) = join(send(&app, reset("first-pass")), send(&app, reset("second-pass"))).await;

    let statuses = [first, second];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 1);

    // Exactly the winning password is in effect.
    let mut accepted = 0;
    for password in ["first-pass", "second-pass"] {
        let login = json!({ "email": "dual@example.com", "password": password });
        let (status, _) = send(&app, post("/api/auth/login", login).to_request()).await;
        if status == StatusCode::OK {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

#[actix_web::test]
async fn password_change_waits_for_the_emailed_code() {
    let harness = Harness::new().await;
    let (_, token) = harness.user("kiran@example.com").await;
    let app = init_app!(harness);

    let wrong = json!({ "current_password": "nope", "new_password": "changed1" });
    let (status, _) = send(
        &app,
        post("/api/auth/change-password", wrong).insert_header(bearer(&token)).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let change = json!({ "current_password": PASSWORD, "new_password": "changed1" });
    let (status, _) = send(
        &app,
        post("/api/auth/change-password", change).insert_header(bearer(&token)).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Nothing is committed until the code is redeemed.
    let login = json!({ "email": "kiran@example.com", "password": PASSWORD });
    let (status, _) = send(&app, post("/api/auth/login", login).to_request()).await;
    assert_eq!(status, StatusCode::OK);

    let code = harness.outbox.last_code("kiran@example.com").unwrap();
    let (status, _) = send(
        &app,
        post("/api/auth/change-password/confirm", json!({ "code": code }))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let login = json!({ "email": "kiran@example.com", "password": "changed1" });
    let (status, _) = send(&app, post("/api/auth/login", login).to_request()).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn logins_are_recorded_newest_first() {
    let harness = Harness::new().await;
    let (_, token) = harness.user("log@example.com").await;
    let app = init_app!(harness);

    for agent in ["first-agent", "second-agent"] {
        let login = json!({ "email": "log@example.com", "password": PASSWORD });
        let req = post("/api/auth/login", login).insert_header(("User-Agent", agent));
        let (status, _) = send(&app, req.to_request()).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &app,
        TestRequest::get()
            .uri("/api/auth/login-history")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = body.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["client"], "second-agent");
}

#[actix_web::test]
async fn access_gate_distinguishes_credential_failures() {
    let harness = Harness::new().await;
    let (user, token) = harness.user("gate@example.com").await;
    let app = init_app!(harness);

    let me = |header: Option<String>| {
        let req = TestRequest::get().uri("/api/auth/me");
        match header {
            Some(value) => req.insert_header(("Authorization", value)).to_request(),
            None => req.to_request(),
        }
    };

    let (status, body) = send(&app, me(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "CREDENTIAL_MISSING");

    let (status, body) = send(&app, me(Some("Bearer not.a.jwt".into()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "CREDENTIAL_MALFORMED");

    let expired = SimpleAuthProvider::new(JWT_SECRET)
        .with_ttl(chrono::Duration::seconds(-60))
        .issue_token(&user)
        .unwrap();
    let (status, body) = send(&app, me(Some(format!("Bearer {expired}")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "CREDENTIAL_EXPIRED");

    let (status, body) = send(
        &app,
        TestRequest::get().uri("/api/admin/orders").insert_header(bearer(&token)).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    assert!(harness.state.repo.delete_user(user.id).await.unwrap());
    let (status, body) = send(&app, me(Some(format!("Bearer {token}")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "UNKNOWN_SUBJECT");
}

#[actix_web::test]
async fn registration_survives_mail_failure() {
    let mut mailer = MockMailer::new();
    mailer
        .expect_send_otp()
        .times(1)
        .returning(|_, _, _, _| Err(anyhow::anyhow!("smtp unreachable")));
    let harness = Harness::with_mailer(Box::new(mailer), Outbox::default()).await;
    let app = init_app!(harness);

    let register = json!({ "name": "Offline", "email": "offline@example.com", "password": "secret1" });
    let (status, body) = send(&app, post("/api/auth/register", register).to_request()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["verified"], false);

    let stored = harness
        .state
        .repo
        .find_user_by_email("offline@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.pending_otp.is_some());
}
