use std::sync::Arc;

use autoshop_api::app::{build_app, services::AppServices};
use autoshop_auth::{JwtClaims, Role};
use autoshop_core::UserId;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over an empty in-memory shop, on an ephemeral port.
        let services = Arc::new(AppServices::in_memory().expect("failed to build services"));
        let app = build_app(services, SECRET.to_string());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// POST expecting 201 and return the created id.
    async fn create(&self, token: &str, path: &str, body: Value) -> String {
        let res = self.post(token, path, body).await;
        assert_eq!(res.status(), StatusCode::CREATED, "POST {path}");
        let created: Value = res.json().await.unwrap();
        created["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Client, vehicle and a 20.00 service; returns (vehicle_id, service_id).
async fn seed_shop(srv: &TestServer, token: &str) -> (String, String) {
    let client_id = srv
        .create(token, "/clients", json!({ "name": "Maria Lopez", "phone": "555-0101" }))
        .await;
    let vehicle_id = srv
        .create(
            token,
            "/vehicles",
            json!({
                "client_id": client_id,
                "make": "Toyota",
                "model": "Corolla",
                "year": 2018,
                "plate": "ABC-123"
            }),
        )
        .await;
    let service_id = srv
        .create(token, "/services", json!({ "name": "Oil change", "price": "20.00" }))
        .await;
    (vehicle_id, service_id)
}

#[tokio::test]
async fn health_and_metrics_are_public() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["backend"], "in_memory");

    let res = srv.client.get(srv.url("/metrics")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let text = res.text().await.unwrap();
    assert!(text.contains("autoshop_http_requests_total"), "{text}");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let res = srv.get("not-a-jwt", "/whoami").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reflects_token_roles() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(vec![Role::staff()]);

    let res = srv.get(&token, "/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["principal_id"].as_str().is_some());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "staff"));
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "orders.write"));
}

#[tokio::test]
async fn order_to_invoice_flow() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(vec![Role::admin()]);
    let (vehicle_id, service_id) = seed_shop(&srv, &token).await;

    let order_id = srv
        .create(
            &token,
            "/orders",
            json!({
                "vehicle_id": vehicle_id,
                "services": [{ "service_id": service_id, "quantity": 2 }]
            }),
        )
        .await;

    let res = srv.get(&token, &format!("/orders/{order_id}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let order: Value = res.json().await.unwrap();
    assert_eq!(order["state"], "pending");
    assert_eq!(order["line_items"].as_array().unwrap().len(), 1);

    let res = srv
        .client
        .patch(srv.url(&format!("/orders/{order_id}")))
        .bearer_auth(&token)
        .json(&json!({ "state": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .post(&token, "/invoices", json!({ "order_id": order_id, "payment_method": "card" }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let invoice: Value = res.json().await.unwrap();
    let total: f64 = invoice["total"].as_str().unwrap().parse().unwrap();
    assert!((total - 44.80).abs() < 1e-9, "total was {total}");
    assert_eq!(invoice["payment_method"], "card");

    let res = srv.post(&token, "/invoices", json!({ "order_id": order_id })).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");

    let res = srv.get(&token, &format!("/invoices/order/{order_id}")).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Line items are frozen once the order is completed.
    let res = srv
        .post(
            &token,
            &format!("/orders/{order_id}/line-items"),
            json!({ "service_id": service_id }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = srv.get(&token, "/dashboard/stats").await;
    assert_eq!(res.status(), StatusCode::OK);
    let stats: Value = res.json().await.unwrap();
    assert!(stats.is_object());

    let res = srv.get(&token, "/dashboard/top-services?by=revenue").await;
    assert_eq!(res.status(), StatusCode::OK);
    let ranked: Value = res.json().await.unwrap();
    assert_eq!(ranked["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn roles_gate_writes_and_deletes() {
    let srv = TestServer::spawn().await;
    let admin = mint_jwt(vec![Role::admin()]);
    let staff = mint_jwt(vec![Role::staff()]);
    let viewer = mint_jwt(vec![Role::new("viewer")]);

    let res = srv
        .post(&viewer, "/clients", json!({ "name": "Read Only", "phone": "555-0199" }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.get(&viewer, "/clients").await;
    assert_eq!(res.status(), StatusCode::OK);

    let client_id = srv
        .create(&staff, "/clients", json!({ "name": "Pedro Ruiz", "phone": "555-0102" }))
        .await;

    let res = srv
        .client
        .delete(srv.url(&format!("/clients/{client_id}")))
        .bearer_auth(&staff)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .delete(srv.url(&format!("/clients/{client_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = srv.get(&admin, &format!("/clients/{client_id}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(vec![Role::admin()]);

    let res = srv.get(&token, "/orders/not-a-uuid").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.get(&token, "/orders?state=archived").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.get(&token, "/invoices/period?from=2024-01-01").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
