use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::{AppointmentFilter, AppointmentGateway, GatewayResult};
use crate::models::{Appointment, AppointmentPatch, AppointmentStatus, PetProfile, UserProfile};

/// Process-local gateway. Enforces the same pet/vet references a relational
/// store would, and counts every call so callers can assert on storage traffic.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    pets: RwLock<HashMap<Uuid, PetProfile>>,
    vets: RwLock<HashMap<Uuid, UserProfile>>,
    calls: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_pet(&self, pet: PetProfile) {
        self.pets.write().await.insert(pet.id, pet);
    }

    pub async fn register_vet(&self, vet: UserProfile) {
        self.vets.write().await.insert(vet.id, vet);
    }

    /// Number of gateway operations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn check_references(&self, pet_id: Uuid, vet_id: Option<Uuid>) -> GatewayResult<()> {
        if !self.pets.read().await.contains_key(&pet_id) {
            return Err(GatewayError::Constraint(format!("pet {pet_id} does not exist")));
        }
        if let Some(vet_id) = vet_id {
            if !self.vets.read().await.contains_key(&vet_id) {
                return Err(GatewayError::Constraint(format!("vet {vet_id} does not exist")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AppointmentGateway for MemoryGateway {
    async fn insert(&self, record: &Appointment) -> GatewayResult<Uuid> {
        self.touch();
        self.check_references(record.pet_id, record.vet_id).await?;

        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&record.id) {
            return Err(GatewayError::Constraint(format!("duplicate id {}", record.id)));
        }
        appointments.insert(record.id, record.clone());
        debug!(id = %record.id, "memory insert");
        Ok(record.id)
    }

    async fn find_by_id(&self, id: Uuid) -> GatewayResult<Option<Appointment>> {
        self.touch();
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_many(&self, filter: &AppointmentFilter) -> GatewayResult<Vec<Appointment>> {
        self.touch();
        // pets lock is released before the appointments lock is taken
        let owners: HashMap<Uuid, Uuid> = self
            .pets
            .read()
            .await
            .values()
            .map(|p| (p.id, p.owner.id))
            .collect();
        let owner_of = |pet_id: Uuid| owners.get(&pet_id).copied();

        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| filter.matches(a, owner_of))
            .cloned()
            .collect())
    }

    async fn update_fields(&self, id: Uuid, patch: &AppointmentPatch) -> GatewayResult<bool> {
        self.touch();
        let mut appointments = self.appointments.write().await;
        let Some(record) = appointments.get_mut(&id) else {
            return Ok(false);
        };

        if let Some(pet_id) = patch.pet_id {
            self.check_references(pet_id, None).await?;
        }
        if let Some(Some(vet_id)) = patch.vet_id {
            if !self.vets.read().await.contains_key(&vet_id) {
                return Err(GatewayError::Constraint(format!("vet {vet_id} does not exist")));
            }
        }

        record.apply(patch);
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> GatewayResult<bool> {
        self.touch();
        let mut appointments = self.appointments.write().await;
        let Some(record) = appointments.get_mut(&id) else {
            return Ok(false);
        };
        record.status = status;
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> GatewayResult<bool> {
        self.touch();
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(record) if record.status == expected => {
                record.status = next;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_pets(&self, ids: &[Uuid]) -> GatewayResult<Vec<PetProfile>> {
        self.touch();
        let pets = self.pets.read().await;
        Ok(ids.iter().filter_map(|id| pets.get(id).cloned()).collect())
    }

    async fn find_vets(&self, ids: &[Uuid]) -> GatewayResult<Vec<UserProfile>> {
        self.touch();
        let vets = self.vets.read().await;
        Ok(ids.iter().filter_map(|id| vets.get(id).cloned()).collect())
    }
}
