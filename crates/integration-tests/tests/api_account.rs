use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use integration_tests::{address, bearer, init_app, send, Harness};
use rust_decimal::Decimal;
use serde_json::json;
use sm_core::traits::{OrderRepo, TicketRepo};
use uuid::Uuid;

#[actix_web::test]
async fn profile_mobile_must_be_ten_digits() {
    let harness = Harness::new().await;
    let (_, token) = harness.user("profile@example.com").await;
    let app = init_app!(harness);

    let (status, body) = send(
        &app,
        TestRequest::put()
            .uri("/api/account/profile")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Asha R", "mobile": "98765" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        TestRequest::put()
            .uri("/api/account/profile")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Asha R", "mobile": "9876543210" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Asha R");
    assert_eq!(body["mobile"], "9876543210");
}

#[actix_web::test]
async fn address_is_validated_and_stored() {
    let harness = Harness::new().await;
    let (_, token) = harness.user("addr@example.com").await;
    let app = init_app!(harness);

    let mut bad = address();
    bad.postal_code = "41100".into();
    let (status, _) = send(
        &app,
        TestRequest::put()
            .uri("/api/account/address")
            .insert_header(bearer(&token))
            .set_json(&bad)
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut good = address();
    good.city = "Mumbai".into();
    let (status, body) = send(
        &app,
        TestRequest::put()
            .uri("/api/account/address")
            .insert_header(bearer(&token))
            .set_json(&good)
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"]["city"], "Mumbai");
}

#[actix_web::test]
async fn malformed_json_is_a_validation_error() {
    let harness = Harness::new().await;
    let (_, token) = harness.user("json@example.com").await;
    let app = init_app!(harness);

    let (status, body) = send(
        &app,
        TestRequest::put()
            .uri("/api/account/profile")
            .insert_header(bearer(&token))
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{ not json")
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn deleting_the_account_removes_owned_records() {
    let harness = Harness::new().await;
    let (user, token) = harness.user("leaving@example.com").await;
    let product = harness.product("Kettle", Decimal::new(1500, 2), 5).await;
    let app = init_app!(harness);

    let (status, order) = send(
        &app,
        TestRequest::post()
            .uri("/api/orders/buy-now")
            .insert_header(bearer(&token))
            .set_json(json!({ "items": [{ "product_id": product.id, "quantity": 1 }] }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id: Uuid = order["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = send(
        &app,
        TestRequest::post()
            .uri("/api/support/tickets")
            .insert_header(bearer(&token))
            .set_json(json!({ "subject": "Bye", "description": "Closing my account" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        TestRequest::delete().uri("/api/account").insert_header(bearer(&token)).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(harness.state.repo.get_order(order_id).await.unwrap().is_none());
    assert!(harness.state.repo.list_tickets(Some(user.id)).await.unwrap().is_empty());

    let (status, body) = send(
        &app,
        TestRequest::get().uri("/api/auth/me").insert_header(bearer(&token)).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "UNKNOWN_SUBJECT");
}
