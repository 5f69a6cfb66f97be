use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotQuery {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorListQuery {
    pub spec_id: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlotError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::InvalidArgument(msg) => AppError::BadRequest(msg),
            SlotError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}
