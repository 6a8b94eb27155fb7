// Values come from the CONFIG_FILE when set, otherwise from the environment.
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CALENDAR_NAME: &str = "team-roles-test";
pub const DEFAULT_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(format!("Invalid config line {}: {}", idx + 1, line));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub calendar_name: String,
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    pub callback_port: u16,
    pub auth_timeout: Duration,
    pub ollama_bin: String,
    pub ollama_model: String,
    pub calendar_api: String,
}

impl Settings {
    /// File values win over the process environment.
    pub fn load(config: &AppConfig) -> Self {
        Self::from_lookup(|key| config.get(key).or_else(|| std::env::var(key).ok()))
    }

    pub fn from_lookup(get_prop: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            calendar_name: get_prop("CALENDAR_NAME").unwrap_or(DEFAULT_CALENDAR_NAME.to_string()),
            credentials_file: get_prop("GOOGLE_CREDENTIALS_FILE")
                .unwrap_or("credentials.json".to_string())
                .into(),
            token_file: get_prop("GOOGLE_TOKEN_FILE")
                .unwrap_or("token.json".to_string())
                .into(),
            callback_port: parse_or("OAUTH_CALLBACK_PORT", get_prop("OAUTH_CALLBACK_PORT"), 8080),
            auth_timeout: Duration::from_secs(parse_or(
                "OAUTH_TIMEOUT_SECS",
                get_prop("OAUTH_TIMEOUT_SECS"),
                300,
            )),
            ollama_bin: get_prop("OLLAMA_BIN").unwrap_or("ollama".to_string()),
            ollama_model: get_prop("OLLAMA_MODEL").unwrap_or("llama3".to_string()),
            calendar_api: get_prop("GOOGLE_CALENDAR_API").unwrap_or(DEFAULT_CALENDAR_API.to_string()),
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting, using {}", default);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_exports_and_quotes() {
        let config = AppConfig::parse(
            "# rotation settings\n\
             export CALENDAR_NAME=\"on-call\"\n\
             \n\
             OLLAMA_MODEL = 'llama3.1'\n\
             OAUTH_CALLBACK_PORT=9090\n",
        )
        .unwrap();
        assert_eq!(config.get("CALENDAR_NAME").as_deref(), Some("on-call"));
        assert_eq!(config.get("OLLAMA_MODEL").as_deref(), Some("llama3.1"));
        assert_eq!(config.get("OAUTH_CALLBACK_PORT").as_deref(), Some("9090"));
    }

    #[test]
    fn rejects_lines_without_assignment() {
        let err = AppConfig::parse("CALENDAR_NAME\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn reads_config_file_from_disk() {
        let path = std::env::temp_dir().join(format!("rotation_config_{}", uuid::Uuid::new_v4()));
        fs::write(&path, "GOOGLE_TOKEN_FILE=/tmp/tok.json\n").unwrap();
        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.get("GOOGLE_TOKEN_FILE").as_deref(), Some("/tmp/tok.json"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn settings_defaults() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.calendar_name, DEFAULT_CALENDAR_NAME);
        assert_eq!(settings.credentials_file, PathBuf::from("credentials.json"));
        assert_eq!(settings.token_file, PathBuf::from("token.json"));
        assert_eq!(settings.callback_port, 8080);
        assert_eq!(settings.auth_timeout, Duration::from_secs(300));
        assert_eq!(settings.ollama_bin, "ollama");
        assert_eq!(settings.ollama_model, "llama3");
        assert_eq!(settings.calendar_api, DEFAULT_CALENDAR_API);
    }

    #[test]
    fn settings_overrides_and_bad_numbers() {
        let config = AppConfig::parse("OAUTH_CALLBACK_PORT=not-a-port\nOAUTH_TIMEOUT_SECS=30\nCALENDAR_NAME=sre").unwrap();
        let settings = Settings::from_lookup(|key| config.get(key));
        assert_eq!(settings.callback_port, 8080);
        assert_eq!(settings.auth_timeout, Duration::from_secs(30));
        assert_eq!(settings.calendar_name, "sre");
    }
}
