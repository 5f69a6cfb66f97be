use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_database::{AppState, ClinicStore, StoreResult};
use shared_models::clinic::{Doctor, DoctorSummary};

pub struct DoctorService {
    store: Arc<dyn ClinicStore>,
}

impl DoctorService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(state.store.clone())
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// `{id, full_name}` of every doctor, or of one specialization only.
    pub async fn doctors_by_specialization(
        &self,
        specialization_id: Option<Uuid>,
    ) -> StoreResult<Vec<DoctorSummary>> {
        debug!("Listing doctors for specialization {:?}", specialization_id);
        let doctors = self.store.doctors(specialization_id).await?;
        Ok(doctors.iter().map(DoctorSummary::from).collect())
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>> {
        self.store.doctor(doctor_id).await
    }
}
