use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use bigdecimal::BigDecimal;
use serde_json::{Value, json};
use tower::ServiceExt;
use transfer_saga::domain::Account;
use transfer_saga::workflow::EventPublisher;
use transfer_saga::{AppState, create_app};

async fn seeded_state() -> AppState {
    let state = AppState::in_memory(EventPublisher::new(16));
    for (number, balance) in [("ACC-001", 1000), ("ACC-002", 0)] {
        state
            .service
            .accounts()
            .insert(&Account::new(
                number.to_string(),
                format!("Holder {}", number),
                BigDecimal::from(balance),
            ))
            .await
            .unwrap();
    }
    state
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_store() {
    let app = create_app(seeded_state().await);

    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "connected");
}

#[tokio::test]
async fn test_execute_transfer_then_fetch_record() {
    let state = seeded_state().await;

    let res = create_app(state.clone())
        .oneshot(post_json(
            "/delegates/executeTransfer",
            json!({
                "processInstanceId": "proc-1",
                "activityId": "task_transfer",
                "variables": {
                    "sourceAccount": "ACC-001",
                    "destAccount": "ACC-002",
                    "amount": "250.00"
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["variables"]["transferSuccess"], true);
    assert_eq!(body["variables"]["sourceAccount"], "ACC-001");
    let transaction_id = body["variables"]["transactionId"].as_str().unwrap().to_string();

    let res = create_app(state)
        .oneshot(
            Request::builder()
                .uri(format!("/transactions/{}", transaction_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let record = json_body(res).await;
    assert_eq!(record["transaction_id"], transaction_id.as_str());
    assert_eq!(record["status"], "COMPLETED");
    assert_eq!(record["saga_state"], "CREDITED");
}

#[tokio::test]
async fn test_business_fault_is_unprocessable() {
    let app = create_app(seeded_state().await);

    let res = app
        .oneshot(post_json(
            "/delegates/executeTransfer",
            json!({
                "variables": {
                    "sourceAccount": "ACC-002",
                    "destAccount": "ACC-001",
                    "amount": 10
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(res).await;
    assert_eq!(body["errorCode"], "TRANSFER_FAILED");
    assert_eq!(body["variables"]["transferSuccess"], false);
    assert!(body["variables"]["transactionId"].is_string());
}

#[tokio::test]
async fn test_missing_amount_is_validation_fault() {
    let app = create_app(seeded_state().await);

    let res = app
        .oneshot(post_json(
            "/delegates/checkBalance",
            json!({"variables": {"sourceAccount": "ACC-001"}}),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(res).await;
    assert_eq!(body["errorCode"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_transaction_is_not_found() {
    let app = create_app(seeded_state().await);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/transactions/TXN-MISSING")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_numeric_amount_in_body_is_not_rounded() {
    let app = create_app(seeded_state().await);

    let req = Request::builder()
        .method("POST")
        .uri("/delegates/checkBalance")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"variables": {"sourceAccount": "ACC-001", "amount": 12345678901234.5678}}"#,
        ))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["variables"]["balanceSufficient"], false);
    let shortfall: BigDecimal = body["variables"]["balanceShortfall"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(shortfall, "12345678900234.5678".parse::<BigDecimal>().unwrap());
}
