use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ResolutionError;
use crate::models::rotation::RotationRequest;
use crate::service::generator_service::TextGenerator;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self) -> Result<RotationRequest, ResolutionError>;
}

/// Parameters given explicitly on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectParams {
    pub members: Vec<String>,
    pub start_date: String,
    pub duration: i64,
    pub title: String,
}

impl DirectParams {
    fn to_request(&self) -> Result<RotationRequest, ResolutionError> {
        let members: Vec<String> = self
            .members
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(|m| m.to_string())
            .collect();
        let start_date = NaiveDate::parse_from_str(self.start_date.trim(), DATE_FORMAT).map_err(
            |source| ResolutionError::InvalidDate {
                value: self.start_date.clone(),
                source,
            },
        )?;
        Ok(RotationRequest::new(
            members,
            start_date,
            self.duration,
            self.title.trim(),
        )?)
    }
}

#[async_trait]
impl Resolver for DirectParams {
    async fn resolve(&self) -> Result<RotationRequest, ResolutionError> {
        self.to_request()
    }
}

/// Parameters derived from a free-text request by a text generator.
pub struct PromptDerivedParams {
    prompt: String,
    generator: Arc<dyn TextGenerator>,
}

impl PromptDerivedParams {
    pub fn new(prompt: String, generator: Arc<dyn TextGenerator>) -> Self {
        Self { prompt, generator }
    }
}

#[async_trait]
impl Resolver for PromptDerivedParams {
    async fn resolve(&self) -> Result<RotationRequest, ResolutionError> {
        let reply = self
            .generator
            .generate_flags(&self.prompt)
            .await
            .map_err(|e| ResolutionError::Generator(e.to_string()))?;
        let params = parse_generated_flags(&reply)?;
        tracing::info!(
            members = ?params.members,
            start_date = %params.start_date,
            duration = params.duration,
            event_name = %params.title,
            "parameters parsed from generated reply"
        );
        params.to_request()
    }
}

/// Parses `-t <csv-members> -s <YYYY-MM-DD> -d <int-weeks> -n <event-name>`.
///
/// The first three flags may be spread over several lines. The event name is
/// the rest of the `-n` line, so it may contain spaces, and nothing may follow
/// that line.
pub fn parse_generated_flags(reply: &str) -> Result<DirectParams, ResolutionError> {
    let sanitized = reply.trim().trim_matches('`').trim();
    let fail = || ResolutionError::ParseFailure {
        reply: sanitized.to_string(),
    };

    let mut tokens = sanitized
        .lines()
        .enumerate()
        .flat_map(|(line, text)| text.split_whitespace().map(move |token| (line, token)));
    let mut value_of = |flag: &str| match (tokens.next(), tokens.next()) {
        (Some((_, f)), Some((_, value))) if f == flag => Some(value.to_string()),
        _ => None,
    };

    let members_csv = value_of("-t").ok_or_else(fail)?;
    let start_date = value_of("-s").ok_or_else(fail)?;
    let duration = value_of("-d").ok_or_else(fail)?;

    NaiveDate::parse_from_str(&start_date, DATE_FORMAT).map_err(|_| fail())?;
    let duration: i64 = duration.parse().map_err(|_| fail())?;

    let name_line = match tokens.next() {
        Some((line, "-n")) => line,
        _ => return Err(fail()),
    };
    let mut name = Vec::new();
    for (line, token) in tokens {
        if line != name_line {
            return Err(fail());
        }
        name.push(token);
    }
    let title = name.join(" ");
    if title.is_empty() {
        return Err(fail());
    }

    let members = members_csv
        .split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();

    Ok(DirectParams {
        members,
        start_date,
        duration,
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidRequest;

    #[test]
    fn parses_single_line_reply() {
        let params = parse_generated_flags("-t Cesar,Seth -s 2024-07-01 -d 3 -n SRE-ROLE").unwrap();
        assert_eq!(params.members, vec!["Cesar", "Seth"]);
        assert_eq!(params.start_date, "2024-07-01");
        assert_eq!(params.duration, 3);
        assert_eq!(params.title, "SRE-ROLE");
    }

    #[test]
    fn tolerates_surrounding_whitespace_and_line_breaks() {
        let params =
            parse_generated_flags("\n  -t Mulham,Juan,Bryan\n -s 2024-07-02 -d 1\n -n Interrupt catcher \n")
                .unwrap();
        assert_eq!(params.members, vec!["Mulham", "Juan", "Bryan"]);
        assert_eq!(params.title, "Interrupt catcher");

        let fenced = parse_generated_flags("```\n-t A,B -s 2024-07-01 -d 3 -n X\n```").unwrap();
        assert_eq!(fenced.title, "X");
    }

    #[test]
    fn rejects_prose_and_reordered_flags() {
        for reply in [
            "Sure! Here are your flags: -t A,B -s 2024-07-01 -d 3 -n X",
            "-s 2024-07-01 -t A,B -d 3 -n X",
            "-t A,B -s 2024-07-01 -d three -n X",
            "-t A,B -s 07/01/2024 -d 3 -n X",
            "-t A,B -s 2024-07-01 -d 3",
            "-t A,B -s 2024-07-01 -d 3 -n",
            "-t A,B -s 2024-07-01 -d 3 -n\nSRE-ROLE",
            "-t Cesar,Seth -s 2024-07-01 -d 3 -n SRE-ROLE\nLet me know if you need anything else!",
            "```\n-t A,B -s 2024-07-01 -d 3 -n X\n```\nHope this helps.",
            "",
        ] {
            let err = parse_generated_flags(reply).unwrap_err();
            assert!(
                matches!(err, ResolutionError::ParseFailure { .. }),
                "expected parse failure for {:?}",
                reply
            );
        }
    }

    #[tokio::test]
    async fn direct_params_trim_members_and_validate() {
        let params = DirectParams {
            members: vec![" Seth".to_string(), "".to_string(), "Cesar ".to_string()],
            start_date: "2024-07-01".to_string(),
            duration: 3,
            title: "SRE-ROLE".to_string(),
        };
        let request = params.resolve().await.unwrap();
        assert_eq!(request.members(), ["Seth", "Cesar"]);

        let empty = DirectParams {
            members: vec![" ".to_string()],
            ..params.clone()
        };
        assert!(matches!(
            empty.resolve().await.unwrap_err(),
            ResolutionError::Invalid(InvalidRequest::EmptyMembers)
        ));

        let bad_date = DirectParams {
            start_date: "July 1st".to_string(),
            ..params
        };
        assert!(matches!(
            bad_date.resolve().await.unwrap_err(),
            ResolutionError::InvalidDate { .. }
        ));
    }
}
