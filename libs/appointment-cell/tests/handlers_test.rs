// libs/appointment-cell/tests/handlers_test.rs
use axum::body::{to_bytes, Body};
use axum::Router;
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use shared_utils::test_utils::{ClinicFixture, JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    router: Router,
    config: TestConfig,
}

impl TestApp {
    fn new(fixture: &ClinicFixture) -> Self {
        let config = TestConfig::default();
        let state = config.to_state(fixture.store.clone());
        let router = Router::new()
            .nest("/doctors", doctor_routes(state.clone()))
            .nest("/appointments", appointment_routes(state));
        Self { router, config }
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, None)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
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

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn free_slots(&self, doctor_id: uuid::Uuid, date: &str) -> Vec<String> {
        let (status, body) = self
            .call(
                Method::GET,
                &format!("/doctors/{}/slots?date={}", doctor_id, date),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(body).unwrap()
    }
}

#[tokio::test]
async fn requests_without_a_valid_token_are_rejected() {
    let fixture = ClinicFixture::new().await;
    let app = TestApp::new(&fixture);

    let (status, _) = app.call(Method::GET, "/appointments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = JwtTestUtils::create_expired_token(&fixture.patient_user(), &app.config.jwt_secret);
    let (status, _) = app.call(Method::GET, "/appointments", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = JwtTestUtils::create_invalid_signature_token(&fixture.patient_user());
    let (status, _) = app.call(Method::GET, "/appointments", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unlinked = app.token(&TestUser::new("ghost@example.com", "patient", json!({})));
    let (status, _) = app.call(Method::GET, "/appointments", Some(&unlinked), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn taken_slot_answers_conflict_with_free_slots() {
    let fixture = ClinicFixture::new().await;
    let app = TestApp::new(&fixture);
    let token = app.token(&fixture.patient_user());
    let body = json!({ "doctor_id": fixture.doctor_id, "date_time": "2024-06-10 10:00" });

    let (status, created) = app
        .call(Method::POST, "/appointments", Some(&token), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["booking"]["status"], "Scheduled");

    let (status, rejected) = app
        .call(Method::POST, "/appointments", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let free = rejected["free_slots"].as_array().unwrap();
    assert_eq!(free.len(), 17);
    assert!(!free.contains(&json!("10:00")));
}

#[tokio::test]
async fn malformed_date_time_is_bad_request() {
    let fixture = ClinicFixture::new().await;
    let app = TestApp::new(&fixture);
    let token = app.token(&fixture.patient_user());

    let (status, body) = app
        .call(
            Method::POST,
            "/appointments",
            Some(&token),
            Some(json!({ "doctor_id": fixture.doctor_id, "date_time": "10/06/2024 10:00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("YYYY-MM-DD HH:MM"));
}

#[tokio::test]
async fn patient_cannot_complete_and_doctor_can() {
    let fixture = ClinicFixture::new().await;
    let app = TestApp::new(&fixture);
    let patient_token = app.token(&fixture.patient_user());
    let doctor_token = app.token(&fixture.doctor_user());

    let (_, created) = app
        .call(
            Method::POST,
            "/appointments",
            Some(&patient_token),
            Some(json!({ "doctor_id": fixture.doctor_id, "date_time": "2024-06-10 11:30" })),
        )
        .await;
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();
    let payload = json!({
        "diagnosis_id": fixture.diagnosis_id,
        "complaints": "Headache",
        "services": [{ "service_id": fixture.consultation_id }]
    });

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/appointments/{}/complete", booking_id),
            Some(&patient_token),
            Some(payload.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, completed) = app
        .call(
            Method::POST,
            &format!("/appointments/{}/complete", booking_id),
            Some(&doctor_token),
            Some(payload.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["booking"]["status"], "Completed");
    assert_eq!(completed["performed_services"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/appointments/{}/complete", booking_id),
            Some(&doctor_token),
            Some(payload),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, outcome) = app
        .call(
            Method::GET,
            &format!("/appointments/{}/outcome", booking_id),
            Some(&patient_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["total_cost_cents"], 1_500_00);
    assert_eq!(outcome["appointment"]["complaints"], "Headache");
}

#[tokio::test]
async fn unknown_service_in_completion_is_unprocessable() {
    let fixture = ClinicFixture::new().await;
    let app = TestApp::new(&fixture);
    let staff_token = app.token(&TestUser::staff("desk@example.com"));

    let (status, created) = app
        .call(
            Method::POST,
            "/appointments",
            Some(&staff_token),
            Some(json!({
                "doctor_id": fixture.doctor_id,
                "patient_id": fixture.patient_id,
                "date_time": "2024-06-10 15:00"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/appointments/{}/complete", booking_id),
            Some(&staff_token),
            Some(json!({ "services": [{ "service_id": uuid::Uuid::new_v4() }] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, detail) = app
        .call(Method::GET, &format!("/appointments/{}", booking_id), Some(&staff_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["booking"]["status"], "Scheduled");
}

/// A scheduled 10:00 booking hides that slot; canceling it brings it back.
#[tokio::test]
async fn cancel_returns_the_slot_to_the_free_list() {
    let fixture = ClinicFixture::new().await;
    let app = TestApp::new(&fixture);
    let token = app.token(&fixture.patient_user());

    let (_, created) = app
        .call(
            Method::POST,
            "/appointments",
            Some(&token),
            Some(json!({ "doctor_id": fixture.doctor_id, "date_time": "2024-06-10 10:00" })),
        )
        .await;
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();

    let free = app.free_slots(fixture.doctor_id, "2024-06-10").await;
    assert!(!free.contains(&"10:00".to_string()));
    assert!(free.contains(&"09:00".to_string()));
    assert!(free.contains(&"17:30".to_string()));

    let (status, canceled) = app
        .call(
            Method::POST,
            &format!("/appointments/{}/cancel", booking_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["booking"]["status"], "Canceled");

    let free = app.free_slots(fixture.doctor_id, "2024-06-10").await;
    assert!(free.contains(&"10:00".to_string()));

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/appointments/{}/cancel", booking_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, listing) = app.call(Method::GET, "/appointments", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 1);
}
