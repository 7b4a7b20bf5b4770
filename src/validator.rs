use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{
    AppointmentPatch, AppointmentPatchRequest, AppointmentRequest, AppointmentStatus,
    NewAppointment, DATE_FORMAT, TIME_FORMAT,
};

/// Source of "now" for the not-in-the-past rule.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimit {
    pub field: &'static str,
    pub max: usize,
}

impl TextLimit {
    fn check(&self, value: Option<&str>) -> Result<(), ValidationError> {
        match value {
            Some(v) if v.chars().count() > self.max => Err(ValidationError::FieldTooLong {
                field: self.field,
                max: self.max,
            }),
            _ => Ok(()),
        }
    }
}

/// Rule table for appointment submissions. Built once at startup and handed
/// to the [`AppointmentValidator`].
#[derive(Debug, Clone)]
pub struct ValidationRules {
    /// Shape of the date: `d` = ASCII digit, anything else must match literally.
    pub date_shape: &'static str,
    pub date_format: &'static str,
    pub time_shape: &'static str,
    pub time_format: &'static str,
    pub statuses: Vec<AppointmentStatus>,
    pub reason: TextLimit,
    pub vaccination_status: TextLimit,
    pub medications_prescribed: TextLimit,
    pub additional_notes: TextLimit,
}

impl ValidationRules {
    pub fn standard() -> Self {
        ValidationRules {
            date_shape: "dd-dd-dddd",
            date_format: DATE_FORMAT,
            time_shape: "dd:dd",
            time_format: TIME_FORMAT,
            statuses: AppointmentStatus::ALL.to_vec(),
            reason: TextLimit { field: "reason", max: 300 },
            vaccination_status: TextLimit { field: "vaccination_status", max: 500 },
            medications_prescribed: TextLimit { field: "medications_prescribed", max: 300 },
            additional_notes: TextLimit { field: "additional_notes", max: 500 },
        }
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        ValidationRules::standard()
    }
}

fn matches_shape(value: &str, shape: &str) -> bool {
    value.len() == shape.len()
        && value.bytes().zip(shape.bytes()).all(|(v, s)| match s {
            b'd' => v.is_ascii_digit(),
            lit => v == lit,
        })
}

fn patched_text(value: &Option<Option<String>>) -> Option<&str> {
    value.as_ref().and_then(|inner| inner.as_deref())
}

fn non_negative(value: Option<f64>, err: ValidationError) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.is_nan() || v < 0.0 => Err(err),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentValidator {
    rules: ValidationRules,
}

impl AppointmentValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn parse_date(&self, raw: &str) -> Result<NaiveDate, ValidationError> {
        if !matches_shape(raw, self.rules.date_shape) {
            return Err(ValidationError::InvalidDateFormat);
        }
        NaiveDate::parse_from_str(raw, self.rules.date_format)
            .map_err(|_| ValidationError::InvalidDateFormat)
    }

    pub fn parse_time(&self, raw: &str) -> Result<NaiveTime, ValidationError> {
        if !matches_shape(raw, self.rules.time_shape) {
            return Err(ValidationError::InvalidTimeFormat);
        }
        NaiveTime::parse_from_str(raw, self.rules.time_format)
            .map_err(|_| ValidationError::InvalidTimeFormat)
    }

    fn parse_vet_id(raw: Option<&str>) -> Result<Option<Uuid>, ValidationError> {
        match raw {
            None | Some("") => Ok(None),
            Some(s) => Uuid::parse_str(s)
                .map(Some)
                .map_err(|_| ValidationError::InvalidVetId),
        }
    }

    fn ensure_not_past(
        date: NaiveDate,
        time: NaiveTime,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        if date.and_time(time).and_utc() < now {
            return Err(ValidationError::DateTimeInPast);
        }
        Ok(())
    }

    fn check_texts(
        &self,
        reason: Option<&str>,
        vaccination_status: Option<&str>,
        medications_prescribed: Option<&str>,
        additional_notes: Option<&str>,
    ) -> Result<(), ValidationError> {
        self.rules.reason.check(reason)?;
        self.rules.vaccination_status.check(vaccination_status)?;
        self.rules.medications_prescribed.check(medications_prescribed)?;
        self.rules.additional_notes.check(additional_notes)
    }

    /// Checks a booking request and returns its typed form. Reports only the
    /// first rule that fails.
    pub fn validate(
        &self,
        req: &AppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<NewAppointment, ValidationError> {
        let pet_id = req
            .pet_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(ValidationError::InvalidPetId)?;
        let vet_id = Self::parse_vet_id(req.vet_id.as_deref())?;

        let date = self.parse_date(&req.date)?;
        let time = self.parse_time(&req.time)?;
        Self::ensure_not_past(date, time, now)?;

        let code = req.status_id.unwrap_or(AppointmentStatus::Active.code().into());
        let status = AppointmentStatus::from_code(code)
            .filter(|s| self.rules.statuses.contains(s))
            .ok_or(ValidationError::InvalidStatus(code))?;

        non_negative(req.weight_kg, ValidationError::InvalidWeight)?;
        non_negative(req.temperature, ValidationError::InvalidTemperature)?;

        self.check_texts(
            req.reason.as_deref(),
            req.vaccination_status.as_deref(),
            req.medications_prescribed.as_deref(),
            req.additional_notes.as_deref(),
        )?;

        Ok(NewAppointment {
            pet_id,
            vet_id,
            date,
            time,
            status,
            weight_kg: req.weight_kg,
            temperature: req.temperature,
            reason: req.reason.clone(),
            vaccination_status: req.vaccination_status.clone(),
            medications_prescribed: req.medications_prescribed.clone(),
            additional_notes: req.additional_notes.clone(),
        })
    }

    /// Checks only the fields present in a partial update. The past check
    /// needs both halves of the moment, so it runs only when date and time
    /// are supplied together.
    pub fn validate_patch(
        &self,
        req: &AppointmentPatchRequest,
        now: DateTime<Utc>,
    ) -> Result<AppointmentPatch, ValidationError> {
        let pet_id = req
            .pet_id
            .as_deref()
            .map(|s| Uuid::parse_str(s).map_err(|_| ValidationError::InvalidPetId))
            .transpose()?;
        let vet_id = req
            .vet_id
            .as_ref()
            .map(|v| Self::parse_vet_id(v.as_deref()))
            .transpose()?;

        let date = req.date.as_deref().map(|d| self.parse_date(d)).transpose()?;
        let time = req.time.as_deref().map(|t| self.parse_time(t)).transpose()?;
        if let (Some(date), Some(time)) = (date, time) {
            Self::ensure_not_past(date, time, now)?;
        }

        non_negative(req.weight_kg.flatten(), ValidationError::InvalidWeight)?;
        non_negative(req.temperature.flatten(), ValidationError::InvalidTemperature)?;

        self.check_texts(
            patched_text(&req.reason),
            patched_text(&req.vaccination_status),
            patched_text(&req.medications_prescribed),
            patched_text(&req.additional_notes),
        )?;

        Ok(AppointmentPatch {
            pet_id,
            vet_id,
            date,
            time,
            weight_kg: req.weight_kg,
            temperature: req.temperature,
            reason: req.reason.clone(),
            vaccination_status: req.vaccination_status.clone(),
            medications_prescribed: req.medications_prescribed.clone(),
            additional_notes: req.additional_notes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn request(date: &str, time: &str) -> AppointmentRequest {
        AppointmentRequest {
            pet_id: Some(Uuid::new_v4().to_string()),
            date: date.to_string(),
            time: time.to_string(),
            status_id: Some(1),
            ..Default::default()
        }
    }

    fn validator() -> AppointmentValidator {
        AppointmentValidator::new(ValidationRules::standard())
    }

    #[test]
    fn accepts_future_booking() {
        let new = validator()
            .validate(&request("01-01-2099", "10:00"), now_2024())
            .unwrap();
        assert_eq!(new.date, NaiveDate::from_ymd_opt(2099, 1, 1).unwrap());
        assert_eq!(new.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(new.status, AppointmentStatus::Active);
        assert_eq!(new.vet_id, None);
    }

    #[test]
    fn rejects_booking_in_the_past() {
        let err = validator()
            .validate(&request("01-01-2020", "10:00"), now_2024())
            .unwrap_err();
        assert_eq!(err, ValidationError::DateTimeInPast);
    }

    #[test]
    fn exact_now_is_not_in_the_past() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        assert!(validator().validate(&request("15-06-2024", "12:00"), now).is_ok());
        let err = validator()
            .validate(&request("15-06-2024", "11:59"), now)
            .unwrap_err();
        assert_eq!(err, ValidationError::DateTimeInPast);
    }

    #[test]
    fn pet_id_is_required_and_must_parse() {
        let mut req = request("01-01-2099", "10:00");
        req.pet_id = None;
        assert_eq!(validator().validate(&req, now_2024()), Err(ValidationError::InvalidPetId));
        req.pet_id = Some("not-a-uuid".into());
        assert_eq!(validator().validate(&req, now_2024()), Err(ValidationError::InvalidPetId));
    }

    #[test]
    fn empty_vet_id_means_unassigned() {
        let mut req = request("01-01-2099", "10:00");
        req.vet_id = Some(String::new());
        assert_eq!(validator().validate(&req, now_2024()).unwrap().vet_id, None);
        req.vet_id = Some("vet-7".into());
        assert_eq!(validator().validate(&req, now_2024()), Err(ValidationError::InvalidVetId));
    }

    #[test]
    fn date_and_time_shapes_are_strict() {
        let v = validator();
        for bad in ["2099-01-01", "1-1-2099", "01/01/2099", "32-01-2099", "01-13-2099", ""] {
            assert_eq!(
                v.validate(&request(bad, "10:00"), now_2024()),
                Err(ValidationError::InvalidDateFormat),
                "{bad}"
            );
        }
        for bad in ["10.00", "9:00", "24:00", "10:60", "10:00:00"] {
            assert_eq!(
                v.validate(&request("01-01-2099", bad), now_2024()),
                Err(ValidationError::InvalidTimeFormat),
                "{bad}"
            );
        }
    }

    #[test]
    fn first_failing_rule_wins() {
        let mut req = request("01-01-2020", "bad");
        req.weight_kg = Some(-1.0);
        assert_eq!(validator().validate(&req, now_2024()), Err(ValidationError::InvalidTimeFormat));
    }

    #[test]
    fn status_must_be_known() {
        let mut req = request("01-01-2099", "10:00");
        req.status_id = Some(4);
        assert_eq!(validator().validate(&req, now_2024()), Err(ValidationError::InvalidStatus(4)));
        req.status_id = None;
        assert_eq!(
            validator().validate(&req, now_2024()).unwrap().status,
            AppointmentStatus::Active
        );
    }

    #[test]
    fn rule_table_can_narrow_statuses() {
        let mut rules = ValidationRules::standard();
        rules.statuses = vec![AppointmentStatus::Active];
        let mut req = request("01-01-2099", "10:00");
        req.status_id = Some(2);
        assert_eq!(
            AppointmentValidator::new(rules).validate(&req, now_2024()),
            Err(ValidationError::InvalidStatus(2))
        );
    }

    #[test]
    fn measurements_must_be_non_negative() {
        let mut req = request("01-01-2099", "10:00");
        req.weight_kg = Some(0.0);
        req.temperature = Some(38.5);
        assert!(validator().validate(&req, now_2024()).is_ok());
        req.weight_kg = Some(-0.1);
        assert_eq!(validator().validate(&req, now_2024()), Err(ValidationError::InvalidWeight));
        req.weight_kg = None;
        req.temperature = Some(f64::NAN);
        assert_eq!(
            validator().validate(&req, now_2024()),
            Err(ValidationError::InvalidTemperature)
        );
    }

    #[test]
    fn each_text_field_has_its_own_cap() {
        let mut req = request("01-01-2099", "10:00");
        req.vaccination_status = Some("v".repeat(500));
        req.additional_notes = Some("n".repeat(500));
        req.medications_prescribed = Some("m".repeat(300));
        assert!(validator().validate(&req, now_2024()).is_ok());

        req.medications_prescribed = Some("m".repeat(301));
        assert_eq!(
            validator().validate(&req, now_2024()),
            Err(ValidationError::FieldTooLong { field: "medications_prescribed", max: 300 })
        );
        req.medications_prescribed = None;
        req.additional_notes = Some("n".repeat(501));
        assert_eq!(
            validator().validate(&req, now_2024()),
            Err(ValidationError::FieldTooLong { field: "additional_notes", max: 500 })
        );
    }

    #[test]
    fn patch_checks_only_present_fields() {
        let v = validator();
        let empty = v.validate_patch(&AppointmentPatchRequest::default(), now_2024()).unwrap();
        assert!(empty.is_empty());

        let req = AppointmentPatchRequest {
            date: Some("01-01-2020".into()),
            ..Default::default()
        };
        // date alone cannot be placed in time
        assert!(v.validate_patch(&req, now_2024()).is_ok());

        let req = AppointmentPatchRequest {
            date: Some("01-01-2020".into()),
            time: Some("10:00".into()),
            ..Default::default()
        };
        assert_eq!(v.validate_patch(&req, now_2024()), Err(ValidationError::DateTimeInPast));

        let req = AppointmentPatchRequest {
            vet_id: Some(Some(String::new())),
            reason: Some(Some("r".repeat(301))),
            ..Default::default()
        };
        assert_eq!(
            v.validate_patch(&req, now_2024()),
            Err(ValidationError::FieldTooLong { field: "reason", max: 300 })
        );
    }

    #[test]
    fn patch_clearing_vet_yields_explicit_none() {
        let req = AppointmentPatchRequest {
            vet_id: Some(None),
            weight_kg: Some(Some(4.2)),
            ..Default::default()
        };
        let patch = validator().validate_patch(&req, now_2024()).unwrap();
        assert_eq!(patch.vet_id, Some(None));
        assert_eq!(patch.weight_kg, Some(Some(4.2)));
    }

    proptest! {
        #[test]
        fn future_bookings_always_validate(
            year in 2025i32..2200,
            month in 1u32..=12,
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
        ) {
            let req = request(
                &format!("{day:02}-{month:02}-{year:04}"),
                &format!("{hour:02}:{minute:02}"),
            );
            prop_assert!(validator().validate(&req, now_2024()).is_ok());
        }

        #[test]
        fn past_bookings_fail_whatever_else_is_valid(
            year in 1971i32..2024,
            month in 1u32..=12,
            day in 1u32..=28,
            weight in 0.0f64..200.0,
        ) {
            let mut req = request(&format!("{day:02}-{month:02}-{year:04}"), "10:00");
            req.weight_kg = Some(weight);
            prop_assert_eq!(
                validator().validate(&req, now_2024()),
                Err(ValidationError::DateTimeInPast)
            );
        }

        #[test]
        fn reason_cap_is_inclusive_and_counts_characters(len in 0usize..600) {
            let mut req = request("01-01-2099", "10:00");
            req.reason = Some("ñ".repeat(len));
            let result = validator().validate(&req, now_2024());
            if len <= 300 {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(
                    result,
                    Err(ValidationError::FieldTooLong { field: "reason", max: 300 })
                );
            }
        }
    }
}
