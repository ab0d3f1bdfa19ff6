use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upper bound of the nominal sleep range, in hours.
pub const MAX_SLEEP_HOURS: f64 = 12.0;

/// Upper bound of the nominal exercise range, in minutes.
pub const MAX_EXERCISE_MINUTES: f64 = 300.0;

/// One self-reported health log entry.
///
/// Nominal ranges: severity and stress 1-10, sleep 0-12 hours,
/// exercise 0-300 minutes. Values outside those ranges are carried
/// through as-is; only non-finite or negative quantities are rejected.
///
/// The timestamp keeps the offset it was logged with, so hour and
/// weekday are always read in the user's local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub severity: u8,
    pub sleep: f64,
    pub stress: u8,
    pub exercise: f64,
    #[serde(default)]
    pub diet: String,
    #[serde(default)]
    pub notes: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl HealthRecord {
    /// Create a record with no symptoms, diet or notes.
    pub fn new(
        severity: u8,
        sleep: f64,
        stress: u8,
        exercise: f64,
        timestamp: impl Into<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            symptoms: Vec::new(),
            severity,
            sleep,
            stress,
            exercise,
            diet: String::new(),
            notes: String::new(),
            timestamp: timestamp.into(),
        }
    }

    pub fn with_symptoms<I, S>(mut self, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symptoms = symptoms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_diet(mut self, diet: impl Into<String>) -> Self {
        self.diet = diet.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Reject quantities that would poison downstream statistics.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [("sleep", self.sleep), ("exercise", self.exercise)] {
            if !value.is_finite() {
                return Err(CoreError::InvalidRecord(format!("{name} is not finite: {value}")));
            }
            if value < 0.0 {
                return Err(CoreError::InvalidRecord(format!("{name} is negative: {value}")));
            }
        }
        Ok(())
    }

    /// Names of the fields sitting above their nominal upper bound.
    pub fn out_of_nominal_range(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if !(1..=10).contains(&self.severity) {
            fields.push("severity");
        }
        if !(1..=10).contains(&self.stress) {
            fields.push("stress");
        }
        if self.sleep > MAX_SLEEP_HOURS {
            fields.push("sleep");
        }
        if self.exercise > MAX_EXERCISE_MINUTES {
            fields.push("exercise");
        }
        fields
    }
}

/// A user's ordered history, as exchanged with the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecords {
    pub user_id: String,
    #[serde(default)]
    pub records: Vec<HealthRecord>,
}

impl UserRecords {
    /// Keep only the most recent `max` records (0 = keep everything).
    pub fn truncate_to_recent(&mut self, max: usize) {
        if max > 0 && self.records.len() > max {
            let excess = self.records.len() - max;
            self.records.drain(..excess);
        }
    }
}
