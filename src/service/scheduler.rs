use chrono::{Days, NaiveDate};

use crate::error::InvalidRequest;
use crate::models::rotation::{RecurrenceRule, RotationEvent, RotationRequest, ROTATION_TIME_ZONE};

/// Lays the team out back to back from the start date, one block per member,
/// in ordinal name order. Every event shares one rule that repeats after the
/// whole team has served once.
pub fn schedule(request: &RotationRequest) -> Result<Vec<RotationEvent>, InvalidRequest> {
    let mut members = request.members().to_vec();
    if members.is_empty() {
        return Err(InvalidRequest::EmptyMembers);
    }
    members.sort();

    let weeks = request.duration_weeks();
    if weeks == 0 {
        return Err(InvalidRequest::NonPositiveDuration(0));
    }
    let block_days = u64::from(weeks) * 7;

    let member_count = u32::try_from(members.len()).map_err(|_| InvalidRequest::DateOutOfRange)?;
    let recurrence = RecurrenceRule {
        interval_weeks: weeks
            .checked_mul(member_count)
            .ok_or(InvalidRequest::DateOutOfRange)?,
        count: request.cycles().map(|c| c.get()),
    };

    let mut events = Vec::with_capacity(members.len());
    let mut member_start = request.start_date();
    for (i, member) in members.into_iter().enumerate() {
        let member_end = add_days(member_start, block_days)?;
        events.push(RotationEvent {
            title: format!("{}: {}", request.title(), member),
            member,
            start_date: member_start,
            end_date: member_end,
            time_zone: ROTATION_TIME_ZONE.to_string(),
            recurrence,
            color_tag: i as u32 + 1,
        });
        member_start = member_end;
    }
    Ok(events)
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, InvalidRequest> {
    date.checked_add_days(Days::new(days))
        .ok_or(InvalidRequest::DateOutOfRange)
}
