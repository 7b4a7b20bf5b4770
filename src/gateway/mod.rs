//! Persistence boundary for appointment records.
//!
//! The lifecycle manager only talks to storage through [`AppointmentGateway`].
//! Directory lookups (pets with owner and species, vets with role) live on the
//! same trait because the read projections need them in the same round.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::models::{Appointment, AppointmentPatch, AppointmentStatus, PetProfile, UserProfile};

pub mod memory;
pub mod postgres;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Closed set of selections the lifecycle manager issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentFilter {
    All,
    Status(AppointmentStatus),
    /// Any of `statuses` AND on `date`.
    StatusesOnDate {
        statuses: Vec<AppointmentStatus>,
        date: NaiveDate,
    },
    PetWithStatus {
        pet_id: Uuid,
        status: AppointmentStatus,
    },
    /// Appointments of every pet owned by this user.
    Owner(Uuid),
}

impl AppointmentFilter {
    /// Evaluates the filter against a record. `owner_of` maps a pet id to its owner.
    pub fn matches<F>(&self, appt: &Appointment, owner_of: F) -> bool
    where
        F: Fn(Uuid) -> Option<Uuid>,
    {
        match self {
            AppointmentFilter::All => true,
            AppointmentFilter::Status(s) => appt.status == *s,
            AppointmentFilter::StatusesOnDate { statuses, date } => {
                appt.date == *date && statuses.contains(&appt.status)
            }
            AppointmentFilter::PetWithStatus { pet_id, status } => {
                appt.pet_id == *pet_id && appt.status == *status
            }
            AppointmentFilter::Owner(user_id) => owner_of(appt.pet_id) == Some(*user_id),
        }
    }
}

#[async_trait]
pub trait AppointmentGateway: Send + Sync {
    async fn insert(&self, record: &Appointment) -> GatewayResult<Uuid>;

    async fn find_by_id(&self, id: Uuid) -> GatewayResult<Option<Appointment>>;

    async fn find_many(&self, filter: &AppointmentFilter) -> GatewayResult<Vec<Appointment>>;

    /// Returns `false` when no record has this id.
    async fn update_fields(&self, id: Uuid, patch: &AppointmentPatch) -> GatewayResult<bool>;

    /// Returns `false` when no record has this id.
    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> GatewayResult<bool>;

    /// Writes `next` only if the stored status is still `expected`.
    /// Returns `false` when the compare failed or the record is gone.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> GatewayResult<bool>;

    async fn find_pets(&self, ids: &[Uuid]) -> GatewayResult<Vec<PetProfile>>;

    async fn find_vets(&self, ids: &[Uuid]) -> GatewayResult<Vec<UserProfile>>;
}
