use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::{AppointmentFilter, AppointmentGateway, GatewayResult};
use crate::models::{
    Appointment, AppointmentPatch, AppointmentStatus, PetProfile, Species, UserProfile, UserRole,
};

/// Postgres-backed gateway. Every statement is bounded by `timeout`.
#[derive(Clone, Debug)]
pub struct PgGateway {
    db: PgPool,
    timeout: Duration,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    id: Uuid,
    pet_id: Uuid,
    vet_id: Option<Uuid>,
    date: NaiveDate,
    time: NaiveTime,
    status_id: i16,
    weight_kg: Option<f64>,
    temperature: Option<f64>,
    reason: Option<String>,
    vaccination_status: Option<String>,
    medications_prescribed: Option<String>,
    additional_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = GatewayError;

    fn try_from(r: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::try_from(r.status_id)
            .map_err(|e| GatewayError::Corrupt(format!("appointment {}: {e}", r.id)))?;
        Ok(Appointment {
            id: r.id,
            pet_id: r.pet_id,
            vet_id: r.vet_id,
            date: r.date,
            time: r.time,
            status,
            weight_kg: r.weight_kg,
            temperature: r.temperature,
            reason: r.reason,
            vaccination_status: r.vaccination_status,
            medications_prescribed: r.medications_prescribed,
            additional_notes: r.additional_notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PetRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    owner_full_name: String,
    owner_email: String,
    owner_phone: Option<String>,
    owner_role_id: i64,
    owner_role: String,
    species_id: i64,
    species_name: String,
    species_image_url: Option<String>,
}

impl From<PetRow> for PetProfile {
    fn from(r: PetRow) -> Self {
        PetProfile {
            id: r.id,
            name: r.name,
            owner: UserProfile {
                id: r.owner_id,
                full_name: r.owner_full_name,
                email: r.owner_email,
                phone: r.owner_phone,
                role: UserRole {
                    id: r.owner_role_id,
                    role: r.owner_role,
                },
            },
            species: Species {
                id: r.species_id,
                name: r.species_name,
                image_url: r.species_image_url,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VetRow {
    id: Uuid,
    full_name: String,
    email: String,
    phone: Option<String>,
    role_id: i64,
    role: String,
}

impl From<VetRow> for UserProfile {
    fn from(r: VetRow) -> Self {
        UserProfile {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            phone: r.phone,
            role: UserRole {
                id: r.role_id,
                role: r.role,
            },
        }
    }
}

const APPOINTMENT_SELECT: &str = r#"
    SELECT
      a.id,
      a.pet_id,
      a.vet_id,
      a."date",
      a."time",
      a.status_id,
      a.weight_kg,
      a.temperature,
      a.reason,
      a.vaccination_status,
      a.medications_prescribed,
      a.additional_notes,
      a.created_at,
      a.updated_at
    FROM appointments a
"#;

const APPOINTMENT_ORDER: &str = r#" ORDER BY a."date" ASC, a."time" ASC, a.id ASC"#;

impl PgGateway {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> GatewayResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| GatewayError::TimedOut(self.timeout))?
            .map_err(GatewayError::from)
    }

    async fn fetch_appointments(
        &self,
        sql: String,
        filter: &AppointmentFilter,
    ) -> GatewayResult<Vec<AppointmentRow>> {
        let query = sqlx::query_as::<_, AppointmentRow>(&sql);
        let query = match filter {
            AppointmentFilter::All => query,
            AppointmentFilter::Status(status) => query.bind(status.code()),
            AppointmentFilter::StatusesOnDate { statuses, date } => query
                .bind(statuses.iter().map(|s| s.code()).collect::<Vec<i16>>())
                .bind(*date),
            AppointmentFilter::PetWithStatus { pet_id, status } => {
                query.bind(*pet_id).bind(status.code())
            }
            AppointmentFilter::Owner(user_id) => query.bind(*user_id),
        };
        self.bounded(query.fetch_all(&self.db)).await
    }
}

fn where_clause(filter: &AppointmentFilter) -> &'static str {
    match filter {
        AppointmentFilter::All => "",
        AppointmentFilter::Status(_) => " WHERE a.status_id = $1",
        AppointmentFilter::StatusesOnDate { .. } => {
            r#" WHERE a.status_id = ANY($1) AND a."date" = $2"#
        }
        AppointmentFilter::PetWithStatus { .. } => " WHERE a.pet_id = $1 AND a.status_id = $2",
        AppointmentFilter::Owner(_) => " JOIN pets p ON p.id = a.pet_id WHERE p.owner_id = $1",
    }
}

#[async_trait]
impl AppointmentGateway for PgGateway {
    async fn insert(&self, record: &Appointment) -> GatewayResult<Uuid> {
        let query = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO appointments (
              id,
              pet_id,
              vet_id,
              "date",
              "time",
              status_id,
              weight_kg,
              temperature,
              reason,
              vaccination_status,
              medications_prescribed,
              additional_notes,
              created_at,
              updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$13)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(record.pet_id)
        .bind(record.vet_id)
        .bind(record.date)
        .bind(record.time)
        .bind(record.status.code())
        .bind(record.weight_kg)
        .bind(record.temperature)
        .bind(record.reason.as_deref())
        .bind(record.vaccination_status.as_deref())
        .bind(record.medications_prescribed.as_deref())
        .bind(record.additional_notes.as_deref())
        .bind(record.created_at);

        let id = self.bounded(query.fetch_one(&self.db)).await?;
        debug!(%id, "appointment row inserted");
        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> GatewayResult<Option<Appointment>> {
        let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = $1");
        let query = sqlx::query_as::<_, AppointmentRow>(&sql).bind(id);
        self.bounded(query.fetch_optional(&self.db))
            .await?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn find_many(&self, filter: &AppointmentFilter) -> GatewayResult<Vec<Appointment>> {
        let sql = format!("{APPOINTMENT_SELECT}{}{APPOINTMENT_ORDER}", where_clause(filter));
        self.fetch_appointments(sql, filter)
            .await?
            .into_iter()
            .map(Appointment::try_from)
            .collect()
    }

    async fn update_fields(&self, id: Uuid, patch: &AppointmentPatch) -> GatewayResult<bool> {
        // COALESCE for required columns; CASE + presence flag for nullable ones
        // so that an explicit clear can be told apart from "leave as is".
        let query = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE appointments
            SET
              pet_id = COALESCE($2, pet_id),
              vet_id = CASE WHEN $3 THEN $4 ELSE vet_id END,
              "date" = COALESCE($5, "date"),
              "time" = COALESCE($6, "time"),
              weight_kg   = CASE WHEN $7 THEN $8 ELSE weight_kg END,
              temperature = CASE WHEN $9 THEN $10 ELSE temperature END,
              reason = CASE WHEN $11 THEN $12 ELSE reason END,
              vaccination_status = CASE WHEN $13 THEN $14 ELSE vaccination_status END,
              medications_prescribed = CASE WHEN $15 THEN $16 ELSE medications_prescribed END,
              additional_notes = CASE WHEN $17 THEN $18 ELSE additional_notes END,
              updated_at = now()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(patch.pet_id)
        .bind(patch.vet_id.is_some())
        .bind(patch.vet_id.flatten())
        .bind(patch.date)
        .bind(patch.time)
        .bind(patch.weight_kg.is_some())
        .bind(patch.weight_kg.flatten())
        .bind(patch.temperature.is_some())
        .bind(patch.temperature.flatten())
        .bind(patch.reason.is_some())
        .bind(patch.reason.clone().flatten())
        .bind(patch.vaccination_status.is_some())
        .bind(patch.vaccination_status.clone().flatten())
        .bind(patch.medications_prescribed.is_some())
        .bind(patch.medications_prescribed.clone().flatten())
        .bind(patch.additional_notes.is_some())
        .bind(patch.additional_notes.clone().flatten());

        Ok(self.bounded(query.fetch_optional(&self.db)).await?.is_some())
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> GatewayResult<bool> {
        let query = sqlx::query(
            r#"
            UPDATE appointments
            SET status_id = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.code());

        let result = self.bounded(query.execute(&self.db)).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> GatewayResult<bool> {
        let query = sqlx::query(
            r#"
            UPDATE appointments
            SET status_id = $3,
                updated_at = now()
            WHERE id = $1
              AND status_id = $2
            "#,
        )
        .bind(id)
        .bind(expected.code())
        .bind(next.code());

        let result = self.bounded(query.execute(&self.db)).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_pets(&self, ids: &[Uuid]) -> GatewayResult<Vec<PetProfile>> {
        let query = sqlx::query_as::<_, PetRow>(
            r#"
            SELECT
              p.id,
              p.name,
              o.id        AS owner_id,
              o.full_name AS owner_full_name,
              o.email     AS owner_email,
              o.phone     AS owner_phone,
              r.id        AS owner_role_id,
              r.role      AS owner_role,
              s.id        AS species_id,
              s.name      AS species_name,
              s.image_url AS species_image_url
            FROM pets p
            JOIN users o ON o.id = p.owner_id
            JOIN user_roles r ON r.id = o.role_id
            JOIN species s ON s.id = p.species_id
            WHERE p.id = ANY($1)
            "#,
        )
        .bind(ids.to_vec());

        let rows = self.bounded(query.fetch_all(&self.db)).await?;
        Ok(rows.into_iter().map(PetProfile::from).collect())
    }

    async fn find_vets(&self, ids: &[Uuid]) -> GatewayResult<Vec<UserProfile>> {
        let query = sqlx::query_as::<_, VetRow>(
            r#"
            SELECT
              u.id,
              u.full_name,
              u.email,
              u.phone,
              r.id   AS role_id,
              r.role AS role
            FROM users u
            JOIN user_roles r ON r.id = u.role_id
            WHERE u.id = ANY($1)
            "#,
        )
        .bind(ids.to_vec());

        let rows = self.bounded(query.fetch_all(&self.db)).await?;
        Ok(rows.into_iter().map(UserProfile::from).collect())
    }
}
