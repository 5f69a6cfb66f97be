use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, ClinicHours, StorageBackend};
use shared_database::{AppState, InMemoryStore};
use shared_models::auth::{Actor, User};
use shared_models::clinic::{Diagnosis, Doctor, Patient, Service};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub clinic_hours: ClinicHours,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            clinic_hours: ClinicHours::default(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage: StorageBackend::Memory,
            clinic_hours: self.clinic_hours,
            server_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    pub fn to_state(&self, store: InMemoryStore) -> AppState {
        AppState::new(self.to_arc(), Arc::new(store))
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub metadata: Value,
}

impl TestUser {
    pub fn new(email: &str, role: &str, metadata: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            metadata,
        }
    }

    pub fn doctor(email: &str, doctor_id: Uuid) -> Self {
        Self::new(email, "doctor", json!({ "doctor_id": doctor_id.to_string() }))
    }

    pub fn patient(email: &str, patient_id: Uuid) -> Self {
        Self::new(email, "patient", json!({ "patient_id": patient_id.to_string() }))
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "admin", json!({}))
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: Some(self.metadata.clone()),
            created_at: Some(Utc::now()),
        }
    }

    /// Resolves the user the same way the auth middleware does.
    pub fn to_actor(&self) -> Actor {
        Actor::from_user(&self.to_user()).unwrap_or_else(|e| panic!("test user has no actor: {}", e))
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "app_metadata": user.metadata,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        Self::create_token_with_claims(&payload, secret)
    }

    /// Signs arbitrary claims with HS256.
    pub fn create_token_with_claims(claims: &Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .unwrap_or_else(|_| panic!("HMAC can take key of any size"));
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// A small clinic: two doctors in two specializations, one patient, one
/// diagnosis and two services, all in an in-memory store.
pub struct ClinicFixture {
    pub store: InMemoryStore,
    pub therapy: Uuid,
    pub cardiology: Uuid,
    pub doctor_id: Uuid,
    pub other_doctor_id: Uuid,
    pub patient_id: Uuid,
    pub diagnosis_id: Uuid,
    pub consultation_id: Uuid,
    pub ecg_id: Uuid,
}

impl ClinicFixture {
    pub async fn new() -> Self {
        let store = InMemoryStore::new();
        let fixture = Self {
            store,
            therapy: Uuid::new_v4(),
            cardiology: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            other_doctor_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            diagnosis_id: Uuid::new_v4(),
            consultation_id: Uuid::new_v4(),
            ecg_id: Uuid::new_v4(),
        };

        fixture
            .store
            .insert_doctor(Doctor {
                id: fixture.doctor_id,
                full_name: "Anna Petrova".to_string(),
                license_number: "LIC-001".to_string(),
                specialization_id: fixture.therapy,
                office_id: Some(Uuid::new_v4()),
            })
            .await;
        fixture
            .store
            .insert_doctor(Doctor {
                id: fixture.other_doctor_id,
                full_name: "Boris Volkov".to_string(),
                license_number: "LIC-002".to_string(),
                specialization_id: fixture.cardiology,
                office_id: None,
            })
            .await;
        fixture
            .store
            .insert_patient(Patient {
                id: fixture.patient_id,
                full_name: "Ivan Sidorov".to_string(),
                address: Some("Lenina 1".to_string()),
                birth_date: NaiveDate::from_ymd_opt(1985, 3, 14).unwrap_or_default(),
                med_card_number: "MC-0001".to_string(),
                phone: "+7 900 000 00 00".to_string(),
            })
            .await;
        fixture
            .store
            .insert_diagnosis(Diagnosis {
                id: fixture.diagnosis_id,
                name: "Acute nasopharyngitis".to_string(),
                code_icd: "J00".to_string(),
                description: None,
            })
            .await;
        fixture
            .store
            .insert_service(Service {
                id: fixture.consultation_id,
                name: "Consultation".to_string(),
                cost_cents: 1_500_00,
            })
            .await;
        fixture
            .store
            .insert_service(Service {
                id: fixture.ecg_id,
                name: "ECG".to_string(),
                cost_cents: 800_00,
            })
            .await;

        fixture
    }

    pub fn patient_user(&self) -> TestUser {
        TestUser::patient("patient@example.com", self.patient_id)
    }

    pub fn doctor_user(&self) -> TestUser {
        TestUser::doctor("doctor@example.com", self.doctor_id)
    }

    pub fn other_doctor_user(&self) -> TestUser {
        TestUser::doctor("cardio@example.com", self.other_doctor_id)
    }
}

/// Parses `YYYY-MM-DD HH:MM`; panics on malformed input.
pub fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .unwrap_or_else(|e| panic!("bad test date-time {}: {}", raw, e))
}
