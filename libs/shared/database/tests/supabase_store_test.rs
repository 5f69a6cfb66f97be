use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::{AppConfig, ClinicHours, StorageBackend};
use shared_database::{ClinicStore, StoreError, SupabaseStore};
use shared_models::clinic::{BookingStatus, NewBooking};

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-secret".to_string(),
        storage: StorageBackend::Supabase,
        clinic_hours: ClinicHours::default(),
        server_port: 3000,
    }
}

fn booking_row(id: Uuid, doctor_id: Uuid, patient_id: Uuid, date_time: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "doctor_id": doctor_id,
        "patient_id": patient_id,
        "date_time": date_time,
        "status": status,
        "created_at": "2024-06-01T08:00:00Z"
    })
}

async fn mount_reference_rows(server: &MockServer, doctor_id: Uuid, patient_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": doctor_id,
            "full_name": "Anna Petrova",
            "license_number": "LIC-1",
            "specialization_id": Uuid::new_v4(),
            "office_id": null
        }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": patient_id,
            "full_name": "Ivan Sidorov",
            "address": null,
            "birth_date": "1990-01-01",
            "med_card_number": "MC-1",
            "phone": "+100"
        }])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn bookings_for_a_day_are_filtered_by_date_range() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_row(Uuid::new_v4(), doctor_id, patient_id, "2024-06-10T10:00:00", "Scheduled"),
            booking_row(Uuid::new_v4(), doctor_id, patient_id, "2024-06-10T11:00:00", "Canceled"),
        ])))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let bookings = store
        .bookings_for_doctor_on(doctor_id, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap())
        .await
        .unwrap();

    assert_eq!(bookings.len(), 2);
    assert_eq!(bookings[1].status, BookingStatus::Canceled);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("date_time=gte.2024-06-10T00:00:00"));
    assert!(query.contains("date_time=lt.2024-06-11T00:00:00"));
}

#[tokio::test]
async fn unique_violation_becomes_conflict() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    mount_reference_rows(&server, doctor_id, patient_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_bookings"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"bookings_active_slot\""
        })))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let date_time = NaiveDateTime::parse_from_str("2024-06-10 10:00", "%Y-%m-%d %H:%M").unwrap();
    let result = store
        .reserve_slot(NewBooking { doctor_id, patient_id, date_time })
        .await;

    assert_matches!(result, Err(StoreError::Conflict { doctor_id: d, .. }) if d == doctor_id);
}

#[tokio::test]
async fn reserving_for_unknown_doctor_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let date_time = NaiveDateTime::parse_from_str("2024-06-10 10:00", "%Y-%m-%d %H:%M").unwrap();
    let result = store
        .reserve_slot(NewBooking {
            doctor_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            date_time,
        })
        .await;

    assert_matches!(result, Err(StoreError::NotFound { entity: "Doctor", .. }));
}

#[tokio::test]
async fn stale_transition_reports_current_status() {
    let server = MockServer::start().await;
    let booking_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointment_bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_row(booking_id, Uuid::new_v4(), Uuid::new_v4(), "2024-06-10T10:00:00", "Completed")
        ])))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let result = store
        .transition_booking(booking_id, BookingStatus::Scheduled, BookingStatus::Canceled)
        .await;

    assert_matches!(
        result,
        Err(StoreError::InvalidState { current: BookingStatus::Completed, .. })
    );
}

#[tokio::test]
async fn completion_commits_in_one_rpc_call() {
    let server = MockServer::start().await;
    let booking_id = Uuid::new_v4();
    let service_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_row(booking_id, Uuid::new_v4(), Uuid::new_v4(), "2024-06-10T10:00:00", "Scheduled")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/complete_booking"))
        .and(body_partial_json(json!({ "payload": { "booking_id": booking_id } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let mut tx = store.begin_completion(booking_id).await.unwrap();
    let appointment = tx.insert_appointment("headache".into(), None).await.unwrap();
    tx.insert_performed_service(appointment.id, service_id, 1).await.unwrap();
    tx.insert_performed_service(appointment.id, service_id, 2).await.unwrap();
    tx.mark_completed().await.unwrap();
    tx.commit().await.unwrap();

    let rpc = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/rest/v1/rpc/complete_booking")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&rpc.body).unwrap();
    assert_eq!(body["payload"]["performed_services"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn rpc_state_error_maps_to_invalid_state() {
    let server = MockServer::start().await;
    let booking_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    // First read opens the transaction, later reads see the concurrent cancel.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_row(booking_id, doctor_id, patient_id, "2024-06-10T10:00:00", "Scheduled")
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_row(booking_id, doctor_id, patient_id, "2024-06-10T10:00:00", "Canceled")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/complete_booking"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "55000",
            "message": "booking is not scheduled"
        })))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let mut tx = store.begin_completion(booking_id).await.unwrap();
    tx.insert_appointment(String::new(), None).await.unwrap();
    tx.mark_completed().await.unwrap();

    assert_matches!(
        tx.commit().await,
        Err(StoreError::InvalidState { current: BookingStatus::Canceled, .. })
    );
}
