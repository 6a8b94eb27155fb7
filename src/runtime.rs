use std::num::NonZeroU32;

use crate::cli::{self, Cli};
use crate::clients::google_auth::GoogleAuthorizer;
use crate::clients::google_calendar::GoogleCalendarClient;
use crate::config::Settings;
use crate::error::AppError;
use crate::models::rotation::RotationEvent;
use crate::service::publisher::{print_report, publish_all, BatchReport, CalendarSink};
use crate::service::resolver::Resolver;
use crate::service::scheduler::schedule;
use crate::shutdown::Shutdown;

pub async fn run(cli: Cli, settings: Settings, shutdown: Shutdown) -> Result<(), AppError> {
    let resolver = cli.resolver(&settings);
    let events = plan(resolver.as_ref(), cli.cycles, &shutdown).await?;
    print_schedule(&events);

    if cli.dry_run {
        tracing::info!("dry run, nothing created");
        return Ok(());
    }
    if cli.is_prompt() && !cli.yes && !cli::confirm_schedule()? {
        return Err(AppError::Declined);
    }
    if shutdown.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    let authorizer = GoogleAuthorizer::new(
        settings.credentials_file.clone(),
        settings.token_file.clone(),
        settings.callback_port,
        settings.auth_timeout,
    );
    let access_token = authorizer.access_token(&shutdown).await?;

    let client = GoogleCalendarClient::new(&settings.calendar_api, access_token);
    let calendar_name = cli.calendar.as_deref().unwrap_or(&settings.calendar_name);
    let calendar_id = client.find_calendar_id(calendar_name).await?;

    publish_planned(&client, &calendar_id, &events, &shutdown).await
}

/// Publishes the planned events. An interrupt that arrived during auth or
/// the calendar lookup aborts the run before anything is created.
pub async fn publish_planned<S: CalendarSink + ?Sized>(
    sink: &S,
    calendar_id: &str,
    events: &[RotationEvent],
    shutdown: &Shutdown,
) -> Result<(), AppError> {
    if shutdown.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    let report = publish_all(sink, calendar_id, events, shutdown).await;
    print_report(&report);
    finish(&report)
}

/// Resolves the parameters and computes the schedule. Nothing is created.
pub async fn plan(
    resolver: &dyn Resolver,
    cycles: Option<NonZeroU32>,
    shutdown: &Shutdown,
) -> Result<Vec<RotationEvent>, AppError> {
    let mut shutdown = shutdown.clone();
    let request = tokio::select! {
        resolved = resolver.resolve() => resolved?,
        _ = shutdown.cancelled() => return Err(AppError::Cancelled),
    };
    let request = request.with_cycles(cycles);
    tracing::info!(
        members = request.members().len(),
        start_date = %request.start_date(),
        duration_weeks = request.duration_weeks(),
        title = request.title(),
        "scheduling rotation"
    );
    Ok(schedule(&request)?)
}

pub fn finish(report: &BatchReport) -> Result<(), AppError> {
    if report.is_success() {
        return Ok(());
    }
    Err(AppError::Incomplete {
        failed: report.failed(),
        skipped: report.skipped(),
        total: report.outcomes.len(),
    })
}

fn print_schedule(events: &[RotationEvent]) {
    for event in events {
        println!(
            "{}  {} -> {}  color {}",
            event.title, event.start_date, event.end_date, event.color_tag
        );
    }
    if let Some(first) = events.first() {
        println!("recurrence: {}", first.recurrence);
    }
}
