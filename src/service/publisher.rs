use async_trait::async_trait;

use crate::error::PublishError;
use crate::models::rotation::RotationEvent;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHandle {
    pub id: String,
    pub html_link: Option<String>,
}

/// Persists rotation events in an external calendar.
#[async_trait]
pub trait CalendarSink: Send + Sync {
    async fn publish(
        &self,
        event: &RotationEvent,
        calendar_id: &str,
    ) -> Result<EventHandle, PublishError>;
}

#[derive(Debug)]
pub enum PublishStatus {
    Created(EventHandle),
    Failed(PublishError),
    Skipped,
}

#[derive(Debug)]
pub struct MemberOutcome {
    pub member: String,
    pub title: String,
    pub status: PublishStatus,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<MemberOutcome>,
}

impl BatchReport {
    pub fn created(&self) -> usize {
        self.count(|s| matches!(s, PublishStatus::Created(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, PublishStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, PublishStatus::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.created() == self.outcomes.len()
    }

    fn count(&self, pred: impl Fn(&PublishStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Publishes every event once, in order. A failure does not stop the batch;
/// after cancellation the remaining members are skipped.
pub async fn publish_all<S: CalendarSink + ?Sized>(
    sink: &S,
    calendar_id: &str,
    events: &[RotationEvent],
    shutdown: &Shutdown,
) -> BatchReport {
    let mut report = BatchReport::default();
    for event in events {
        let status = if shutdown.is_cancelled() {
            PublishStatus::Skipped
        } else {
            tracing::info!(
                member = %event.member,
                start_date = %event.start_date,
                "creating event"
            );
            match sink.publish(event, calendar_id).await {
                Ok(handle) => PublishStatus::Created(handle),
                Err(err) => {
                    tracing::warn!(member = %event.member, error = %err, "event creation failed");
                    PublishStatus::Failed(err)
                }
            }
        };
        report.outcomes.push(MemberOutcome {
            member: event.member.clone(),
            title: event.title.clone(),
            status,
        });
    }
    report
}

pub fn print_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        match &outcome.status {
            PublishStatus::Created(handle) => println!(
                "created  {}  {}",
                outcome.title,
                handle.html_link.as_deref().unwrap_or(&handle.id)
            ),
            PublishStatus::Failed(err) => println!("failed   {}  {}", outcome.title, err),
            PublishStatus::Skipped => println!("skipped  {}", outcome.title),
        }
    }
    println!(
        "{} created, {} failed, {} skipped",
        report.created(),
        report.failed(),
        report.skipped()
    );
}
