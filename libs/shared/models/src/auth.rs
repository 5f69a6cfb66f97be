use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    fn metadata_uuid(&self, key: &str) -> Option<Uuid> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// Who is calling, resolved once from the token at the edge of the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Patient { user_id: String, patient_id: Uuid },
    Doctor { user_id: String, doctor_id: Uuid },
    Staff { user_id: String },
}

impl Actor {
    pub fn from_user(user: &User) -> Result<Self, AppError> {
        let user_id = user.id.clone();

        match user.role.as_deref() {
            Some("patient") => {
                let patient_id = user.metadata_uuid("patient_id").ok_or_else(|| {
                    AppError::Forbidden("Patient profile not linked to this account".to_string())
                })?;
                Ok(Actor::Patient { user_id, patient_id })
            }
            Some("doctor") => {
                let doctor_id = user.metadata_uuid("doctor_id").ok_or_else(|| {
                    AppError::Forbidden("Doctor profile not linked to this account".to_string())
                })?;
                Ok(Actor::Doctor { user_id, doctor_id })
            }
            Some("admin") | Some("staff") => Ok(Actor::Staff { user_id }),
            Some(other) => Err(AppError::Auth(format!("Unsupported role: {}", other))),
            None => Err(AppError::Auth("Token carries no role".to_string())),
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Actor::Patient { user_id, .. }
            | Actor::Doctor { user_id, .. }
            | Actor::Staff { user_id } => user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn user(role: Option<&str>, metadata: Option<Value>) -> User {
        User {
            id: "user-1".to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata,
            created_at: None,
        }
    }

    #[test]
    fn patient_role_needs_linked_patient_id() {
        let patient_id = Uuid::new_v4();
        let actor = Actor::from_user(&user(
            Some("patient"),
            Some(json!({ "patient_id": patient_id.to_string() })),
        ))
        .unwrap();
        assert_eq!(actor, Actor::Patient { user_id: "user-1".into(), patient_id });

        assert_matches!(
            Actor::from_user(&user(Some("patient"), None)),
            Err(AppError::Forbidden(_))
        );
    }

    #[test]
    fn doctor_and_staff_roles_resolve() {
        let doctor_id = Uuid::new_v4();
        let actor = Actor::from_user(&user(
            Some("doctor"),
            Some(json!({ "doctor_id": doctor_id.to_string() })),
        ))
        .unwrap();
        assert_matches!(actor, Actor::Doctor { doctor_id: id, .. } if id == doctor_id);

        for role in ["admin", "staff"] {
            assert_matches!(
                Actor::from_user(&user(Some(role), None)),
                Ok(Actor::Staff { .. })
            );
        }
    }

    #[test]
    fn unknown_or_missing_roles_are_rejected() {
        assert_matches!(Actor::from_user(&user(Some("nurse"), None)), Err(AppError::Auth(_)));
        assert_matches!(Actor::from_user(&user(None, None)), Err(AppError::Auth(_)));
    }
}
