//! Appointment lifecycle manager.
//!
//! Owns the status state machine (create, set status, active/cancelled
//! toggle, sparse updates) and the denormalized read projections. All
//! durable state lives behind the [`AppointmentGateway`]; the service itself
//! holds nothing between calls and can be cloned into any task.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppointmentError, ValidationError};
use crate::gateway::{AppointmentFilter, AppointmentGateway};
use crate::identity::AuthContext;
use crate::models::{
    Appointment, AppointmentPatch, AppointmentPatchRequest, AppointmentRequest,
    AppointmentStatus, AppointmentView, NewAppointment, ToggleOutcome,
};
use crate::validator::{AppointmentValidator, Clock};

pub mod attach;


/// Statuses listed on a day's agenda.
const AGENDA_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Active, AppointmentStatus::Completed];

#[derive(Clone)]
pub struct AppointmentService {
    gateway: Arc<dyn AppointmentGateway>,
    validator: Arc<AppointmentValidator>,
    clock: Arc<dyn Clock>,
}

impl AppointmentService {
    pub fn new(
        gateway: Arc<dyn AppointmentGateway>,
        validator: AppointmentValidator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            validator: Arc::new(validator),
            clock,
        }
    }

    pub fn validator(&self) -> &AppointmentValidator {
        &self.validator
    }

    /// Runs the booking rules against the service clock.
    pub fn validate(&self, req: &AppointmentRequest) -> Result<NewAppointment, ValidationError> {
        self.validator.validate(req, self.clock.now())
    }

    /* ============================================================
       Writes
       ============================================================ */

    /// Validates and creates in one step, returning the attached view.
    pub async fn book(&self, req: &AppointmentRequest) -> Result<AppointmentView, AppointmentError> {
        let new = self.validate(req)?;
        let created = self.create(new).await?;
        self.get_by_id(created.id).await
    }

    /// Persists a validated appointment. New records always start `Active`.
    pub async fn create(&self, new: NewAppointment) -> Result<Appointment, AppointmentError> {
        let record = Appointment::book(new, self.clock.now());
        let id = self.gateway.insert(&record).await.map_err(|e| {
            warn!(pet_id = %record.pet_id, error = %e, "appointment insert rejected");
            e
        })?;
        info!(%id, pet_id = %record.pet_id, date = %record.date, "appointment booked");
        Ok(record)
    }

    /// Applies a sparse field change. Status is never touched here.
    pub async fn update(&self, id: Uuid, patch: &AppointmentPatch) -> Result<(), AppointmentError> {
        if patch.is_empty() {
            debug!(%id, "empty patch, nothing to write");
            return Ok(());
        }
        if !self.gateway.update_fields(id, patch).await? {
            return Err(AppointmentError::NotFound(id));
        }
        info!(%id, "appointment updated");
        Ok(())
    }

    /// Validates a raw partial update and applies it.
    ///
    /// The not-in-the-past rule only runs when the patch carries both `date`
    /// and `time`; a patch with just one of them can move a visit into the past.
    pub async fn amend(
        &self,
        id: Uuid,
        req: &AppointmentPatchRequest,
    ) -> Result<(), AppointmentError> {
        let patch = self.validator.validate_patch(req, self.clock.now())?;
        self.update(id, &patch).await
    }

    /// Overwrites the status. The only path to `Completed`.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !self.gateway.update_status(id, status).await? {
            return Err(AppointmentError::NotFound(id));
        }
        info!(%id, %status, "appointment status set");
        Ok(())
    }

    /// Flips `Active` and `Cancelled`. The write is conditional on the status
    /// read, so two racing toggles cannot both land.
    pub async fn toggle_active(&self, id: Uuid) -> Result<ToggleOutcome, AppointmentError> {
        let current = self
            .gateway
            .find_by_id(id)
            .await?
            .ok_or(AppointmentError::NotFound(id))?;

        let next = current.status.toggled().ok_or(AppointmentError::InvalidTransition {
            id,
            from: current.status,
        })?;

        if !self
            .gateway
            .compare_and_set_status(id, current.status, next)
            .await?
        {
            warn!(%id, expected = %current.status, "status changed under toggle");
            return Err(AppointmentError::StateConflict(id));
        }

        info!(%id, from = %current.status, to = %next, "appointment toggled");
        Ok(ToggleOutcome { id, status: next })
    }

    /* ============================================================
       Reads
       ============================================================ */

    pub async fn get_by_id(&self, id: Uuid) -> Result<AppointmentView, AppointmentError> {
        let record = self
            .gateway
            .find_by_id(id)
            .await?
            .ok_or(AppointmentError::NotFound(id))?;
        let mut views = self.project(vec![record]).await?;
        views.pop().ok_or(AppointmentError::NotFound(id))
    }

    pub async fn get_all(&self) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.find(AppointmentFilter::All).await
    }

    /// Appointments of every pet the user owns.
    pub async fn get_by_user_id(&self, user_id: Uuid) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.find(AppointmentFilter::Owner(user_id)).await
    }

    pub async fn get_by_status(
        &self,
        status: AppointmentStatus,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.find(AppointmentFilter::Status(status)).await
    }

    /// The agenda for `date`: active or completed visits on that day.
    pub async fn get_by_status_and_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.find(AppointmentFilter::StatusesOnDate {
            statuses: AGENDA_STATUSES.to_vec(),
            date,
        })
        .await
    }

    /// Completed visits of one pet.
    pub async fn get_medical_history_by_pet_id(
        &self,
        pet_id: Uuid,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.find(AppointmentFilter::PetWithStatus {
            pet_id,
            status: AppointmentStatus::Completed,
        })
        .await
    }

    /// Owners see their own pets' appointments; staff see everything.
    pub async fn visible_to(&self, auth: &AuthContext) -> Result<Vec<AppointmentView>, AppointmentError> {
        if auth.role.is_staff() {
            self.get_all().await
        } else {
            self.get_by_user_id(auth.user_id).await
        }
    }

    async fn find(&self, filter: AppointmentFilter) -> Result<Vec<AppointmentView>, AppointmentError> {
        let records = self.gateway.find_many(&filter).await?;
        debug!(?filter, count = records.len(), "appointments loaded");
        self.project(records).await
    }

    /// Orders records and attaches their directory entities.
    async fn project(
        &self,
        mut records: Vec<Appointment>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        records.sort_by(|a, b| (a.date, a.time, a.id).cmp(&(b.date, b.time, b.id)));

        let (pet_ids, vet_ids) = attach::related_ids(&records);
        let pets = if pet_ids.is_empty() {
            Vec::new()
        } else {
            self.gateway.find_pets(&pet_ids).await?
        };
        let vets = if vet_ids.is_empty() {
            Vec::new()
        } else {
            self.gateway.find_vets(&vet_ids).await?
        };

        Ok(attach::attach(records, pets, vets))
    }
}
