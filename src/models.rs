use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire format for appointment dates (DD-MM-YYYY).
pub const DATE_FORMAT: &str = "%d-%m-%Y";
/// Wire format for appointment times (24h HH:MM).
pub const TIME_FORMAT: &str = "%H:%M";

/* -------------------------
   Status
--------------------------*/

/// Stored as smallint `status_id`:
/// 1 Active, 2 Completed, 3 Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum AppointmentStatus {
    Active = 1,
    Completed = 2,
    Cancelled = 3,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 3] = [
        AppointmentStatus::Active,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(AppointmentStatus::Active),
            2 => Some(AppointmentStatus::Completed),
            3 => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    /// Next state of the active/cancelled toggle. `None` for completed visits.
    pub fn toggled(self) -> Option<Self> {
        match self {
            AppointmentStatus::Active => Some(AppointmentStatus::Cancelled),
            AppointmentStatus::Cancelled => Some(AppointmentStatus::Active),
            AppointmentStatus::Completed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Active => "active",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl From<AppointmentStatus> for i16 {
    fn from(status: AppointmentStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i16> for AppointmentStatus {
    type Error = String;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        AppointmentStatus::from_code(code.into()).ok_or_else(|| format!("unknown status_id {code}"))
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/* -------------------------
   Stored record
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub pet_id: Uuid,
    pub vet_id: Option<Uuid>,
    #[serde(with = "wire_date")]
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub time: NaiveTime,
    #[serde(rename = "status_id")]
    pub status: AppointmentStatus,
    pub weight_kg: Option<f64>,
    pub temperature: Option<f64>,
    pub reason: Option<String>,
    pub vaccination_status: Option<String>,
    pub medications_prescribed: Option<String>,
    pub additional_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Builds a fresh `Active` record from validated input.
    pub fn book(new: NewAppointment, now: DateTime<Utc>) -> Self {
        Appointment {
            id: Uuid::new_v4(),
            pet_id: new.pet_id,
            vet_id: new.vet_id,
            date: new.date,
            time: new.time,
            status: AppointmentStatus::Active,
            weight_kg: new.weight_kg,
            temperature: new.temperature,
            reason: new.reason,
            vaccination_status: new.vaccination_status,
            medications_prescribed: new.medications_prescribed,
            additional_notes: new.additional_notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the present slots of a patch in place. Status is never touched.
    pub fn apply(&mut self, patch: &AppointmentPatch) {
        if let Some(pet_id) = patch.pet_id {
            self.pet_id = pet_id;
        }
        if let Some(vet_id) = patch.vet_id {
            self.vet_id = vet_id;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        if let Some(w) = patch.weight_kg {
            self.weight_kg = w;
        }
        if let Some(t) = patch.temperature {
            self.temperature = t;
        }
        if let Some(v) = &patch.reason {
            self.reason = v.clone();
        }
        if let Some(v) = &patch.vaccination_status {
            self.vaccination_status = v.clone();
        }
        if let Some(v) = &patch.medications_prescribed {
            self.medications_prescribed = v.clone();
        }
        if let Some(v) = &patch.additional_notes {
            self.additional_notes = v.clone();
        }
    }
}

/* -------------------------
   API DTOs (incoming)
--------------------------*/

/// Booking request as submitted by the API layer; everything is still raw.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentRequest {
    pub pet_id: Option<String>,
    pub vet_id: Option<String>,
    pub date: String,
    pub time: String,
    pub status_id: Option<i64>,
    pub weight_kg: Option<f64>,
    pub temperature: Option<f64>,
    pub reason: Option<String>,
    pub vaccination_status: Option<String>,
    pub medications_prescribed: Option<String>,
    pub additional_notes: Option<String>,
}

/// Partial update as submitted. A field that is present but `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentPatchRequest {
    pub pet_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub vet_id: Option<Option<String>>,
    pub date: Option<String>,
    pub time: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub weight_kg: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub temperature: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub reason: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub vaccination_status: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub medications_prescribed: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub additional_notes: Option<Option<String>>,
}

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    // only called when the key is present: null => Some(None)
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/* -------------------------
   Validated values
--------------------------*/

/// Output of the validator: typed and ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub pet_id: Uuid,
    pub vet_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub weight_kg: Option<f64>,
    pub temperature: Option<f64>,
    pub reason: Option<String>,
    pub vaccination_status: Option<String>,
    pub medications_prescribed: Option<String>,
    pub additional_notes: Option<String>,
}

/// One optional slot per mutable attribute. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub pet_id: Option<Uuid>,
    pub vet_id: Option<Option<Uuid>>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub weight_kg: Option<Option<f64>>,
    pub temperature: Option<Option<f64>>,
    pub reason: Option<Option<String>>,
    pub vaccination_status: Option<Option<String>>,
    pub medications_prescribed: Option<Option<String>>,
    pub additional_notes: Option<Option<String>>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        self == &AppointmentPatch::default()
    }
}

/* -------------------------
   Directory entities (read-only)
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRole {
    pub id: i64,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Species {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PetProfile {
    pub id: Uuid,
    pub name: String,
    pub owner: UserProfile,
    pub species: Species,
}

/* -------------------------
   Projections (outgoing)
--------------------------*/

/// Appointment with its pet (owner + species) and vet (with role) attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub pet: Option<PetProfile>,
    pub vet: Option<UserProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub id: Uuid,
    #[serde(rename = "status_id")]
    pub status: AppointmentStatus,
}

impl ToggleOutcome {
    pub fn message(&self) -> &'static str {
        match self.status {
            AppointmentStatus::Active => "Appointment reactivated successfully",
            AppointmentStatus::Cancelled => "Appointment cancelled successfully",
            AppointmentStatus::Completed => "Appointment completed successfully",
        }
    }
}

/* -------------------------
   Helpers
--------------------------*/

mod wire_date {
    use chrono::NaiveDate;
    use serde::Serializer;

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&date.format(DATE_FORMAT))
    }
}

mod wire_time {
    use chrono::NaiveTime;
    use serde::Serializer;

    use super::TIME_FORMAT;

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(TIME_FORMAT))
    }
}
