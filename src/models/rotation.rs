use std::fmt;
use std::num::NonZeroU32;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InvalidRequest;

pub const ROTATION_TIME_ZONE: &str = "UTC";

/// Validated input of one scheduling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationRequest {
    members: Vec<String>,
    start_date: NaiveDate,
    duration_weeks: u32,
    title: String,
    cycles: Option<NonZeroU32>,
}

impl RotationRequest {
    pub fn new(
        members: Vec<String>,
        start_date: NaiveDate,
        duration_weeks: i64,
        title: impl Into<String>,
    ) -> Result<Self, InvalidRequest> {
        if members.is_empty() {
            return Err(InvalidRequest::EmptyMembers);
        }
        if duration_weeks < 1 {
            return Err(InvalidRequest::NonPositiveDuration(duration_weeks));
        }
        let duration_weeks =
            u32::try_from(duration_weeks).map_err(|_| InvalidRequest::DateOutOfRange)?;
        Ok(Self {
            members,
            start_date,
            duration_weeks,
            title: title.into(),
            cycles: None,
        })
    }

    /// Ends every member's series after `cycles` occurrences.
    pub fn with_cycles(mut self, cycles: Option<NonZeroU32>) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn duration_weeks(&self) -> u32 {
        self.duration_weeks
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cycles(&self) -> Option<NonZeroU32> {
        self.cycles
    }
}

/// Weekly recurrence shared by every event of one rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub interval_weeks: u32,
    pub count: Option<u32>,
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RRULE:FREQ=WEEKLY;INTERVAL={}", self.interval_weeks)?;
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        Ok(())
    }
}

/// One member's block. `end_date` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    pub member: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub time_zone: String,
    pub recurrence: RecurrenceRule,
    pub color_tag: u32,
}
