use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use rotationCalendar::error::{AppError, InvalidRequest, ResolutionError};
use rotationCalendar::runtime::plan;
use rotationCalendar::service::generator_service::TextGenerator;
use rotationCalendar::service::resolver::{DirectParams, PromptDerivedParams, Resolver};
use rotationCalendar::shutdown::{self, Shutdown};

struct ScriptedGenerator {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_flags(
        &self,
        _prompt: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(body) => Ok(body.clone()),
            Err(err) => Err(err.clone().into()),
        }
    }
}

/// Never answers; used to check cancellation while the model runs.
struct HangingGenerator;

#[async_trait::async_trait]
impl TextGenerator for HangingGenerator {
    async fn generate_flags(
        &self,
        _prompt: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

#[tokio::test]
async fn prompt_reply_becomes_schedule() {
    let generator = ScriptedGenerator::replying("-t Mulham,Juan,Bryan -s 2024-07-02 -d 1 -n Interrupt-catcher\n");
    let resolver = PromptDerivedParams::new(
        "Create an event called Interrupt-catcher for Mulham, Juan and Bryan".to_string(),
        generator.clone(),
    );

    let events = plan(&resolver, None, &Shutdown::never()).await.unwrap();
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Interrupt-catcher: Bryan",
            "Interrupt-catcher: Juan",
            "Interrupt-catcher: Mulham"
        ]
    );
    assert_eq!(
        events[0].start_date,
        NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
    );
}

#[tokio::test]
async fn chatty_reply_is_a_parse_failure() {
    let generator = ScriptedGenerator::replying("Sure! Use: -t Cesar,Seth -s 2024-07-01 -d 3 -n SRE-ROLE");
    let resolver = PromptDerivedParams::new("rotate".to_string(), generator);
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, ResolutionError::ParseFailure { .. }));
}

#[tokio::test]
async fn generator_failure_is_reported() {
    let resolver = PromptDerivedParams::new("rotate".to_string(), ScriptedGenerator::failing("model not found"));
    let err = plan(&resolver, None, &Shutdown::never()).await.unwrap_err();
    match err {
        AppError::Resolution(ResolutionError::Generator(msg)) => assert!(msg.contains("model not found")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn zero_week_reply_is_an_invalid_request() {
    let resolver = PromptDerivedParams::new(
        "rotate".to_string(),
        ScriptedGenerator::replying("-t A,B -s 2024-07-01 -d 0 -n X"),
    );
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(
        err,
        ResolutionError::Invalid(InvalidRequest::NonPositiveDuration(0))
    ));
}

#[tokio::test]
async fn direct_params_with_bad_duration_never_schedule() {
    let resolver = DirectParams {
        members: vec!["Cesar".to_string(), "Seth".to_string()],
        start_date: "2024-07-01".to_string(),
        duration: -2,
        title: "SRE-ROLE".to_string(),
    };
    let err = plan(&resolver, None, &Shutdown::never()).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Resolution(ResolutionError::Invalid(InvalidRequest::NonPositiveDuration(-2)))
    ));
}

#[tokio::test]
async fn interrupt_while_generating_cancels_plan() {
    let (trigger, shutdown) = shutdown::channel();
    let resolver = PromptDerivedParams::new("rotate".to_string(), Arc::new(HangingGenerator));
    trigger.cancel();
    let err = plan(&resolver, None, &shutdown).await.unwrap_err();
    assert!(matches!(err, AppError::Cancelled));
}
