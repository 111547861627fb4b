//! Harness configuration, read from `ACCEPTANCE__*` environment variables.
//!
//! A `.env` file in the working directory is loaded first, if present. Variables that are unset or
//! empty keep their defaults.

use crate::message_bus::{KafkacatReader, MessageBusConfig};
use crate::process::Executable;
use crate::service::NotificationService;
use crate::service_log::{ServiceLogClient, ServiceLogError};
use std::time::Duration;
use thiserror::Error;

pub const SERVICE_BINARY: &str = "ACCEPTANCE__SERVICE_BINARY";
pub const PROCESS_TIMEOUT_SECS: &str = "ACCEPTANCE__PROCESS_TIMEOUT_SECS";
pub const KAFKACAT: &str = "ACCEPTANCE__KAFKACAT";
pub const KAFKA_BROKER: &str = "ACCEPTANCE__KAFKA_BROKER";
pub const KAFKA_TOPIC: &str = "ACCEPTANCE__KAFKA_TOPIC";
pub const SERVICE_LOG_URL: &str = "ACCEPTANCE__SERVICE_LOG_URL";
pub const SERVICE_LOG_TOKEN: &str = "ACCEPTANCE__SERVICE_LOG_TOKEN";

pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where configuration values come from.
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// How to launch the notification service.
    pub service: Executable,

    /// Upper bound for every process run. `None` waits indefinitely.
    pub process_timeout: Option<Duration>,

    pub message_bus: MessageBusConfig,

    pub service_log_url: String,

    /// Sent as `Authorization` header to the service log.
    pub service_log_token: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            service: Executable::new("ccx-notification-service"),
            process_timeout: Some(DEFAULT_PROCESS_TIMEOUT),
            message_bus: MessageBusConfig::default(),
            service_log_url: "http://localhost:8000".to_owned(),
            service_log_token: "TEST_TOKEN".to_owned(),
        }
    }
}

impl HarnessConfig {
    /// Reads the configuration from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded environment file");
        }
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(source: &impl EnvSource) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let service = lookup(source, SERVICE_BINARY);
        if let Some(service) = service.as_deref().and_then(Executable::parse) {
            config.service = service;
        }
        let tool = lookup(source, KAFKACAT);
        if let Some(tool) = tool.as_deref().and_then(Executable::parse) {
            config.message_bus.tool = tool;
        }
        if let Some(secs) = lookup(source, PROCESS_TIMEOUT_SECS) {
            config.process_timeout = parse_timeout(&secs)?;
        }
        if let Some(broker) = lookup(source, KAFKA_BROKER) {
            config.message_bus.broker = broker;
        }
        if let Some(topic) = lookup(source, KAFKA_TOPIC) {
            config.message_bus.topic = topic;
        }
        if let Some(url) = lookup(source, SERVICE_LOG_URL) {
            config.service_log_url = url;
        }
        if let Some(token) = lookup(source, SERVICE_LOG_TOKEN) {
            config.service_log_token = token;
        }

        tracing::debug!(?config, "Loaded harness configuration");
        Ok(config)
    }

    pub fn notification_service(&self) -> NotificationService {
        NotificationService::new(self.service.clone()).with_timeout(self.process_timeout)
    }

    pub fn kafkacat_reader(&self) -> KafkacatReader {
        KafkacatReader::new(self.message_bus.clone()).with_timeout(self.process_timeout)
    }

    pub fn service_log_client(&self) -> Result<ServiceLogClient, ServiceLogError> {
        ServiceLogClient::new(&self.service_log_url, &self.service_log_token)
    }
}

fn lookup(source: &impl EnvSource, key: &str) -> Option<String> {
    source
        .var(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Zero disables the timeout.
fn parse_timeout(secs: &str) -> Result<Option<Duration>, ConfigError> {
    match secs.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(err) => Err(ConfigError::InvalidValue {
            key: PROCESS_TIMEOUT_SECS,
            value: secs.to_owned(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;
    use mockall::predicate::*;
    use std::collections::HashMap;

    fn source(vars: &[(&str, &str)]) -> MockEnvSource {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let mut source = MockEnvSource::new();
        source
            .expect_var()
            .returning(move |key| vars.get(key).cloned());
        source
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = HarnessConfig::from_source(&source(&[])).unwrap();
        assert_that(config).is_equal_to(HarnessConfig::default());
    }

    #[test]
    fn every_key_is_read() {
        let mut source = MockEnvSource::new();
        for key in [
            SERVICE_BINARY,
            PROCESS_TIMEOUT_SECS,
            KAFKACAT,
            KAFKA_BROKER,
            KAFKA_TOPIC,
            SERVICE_LOG_URL,
            SERVICE_LOG_TOKEN,
        ] {
            source
                .expect_var()
                .with(function(move |name: &str| name == key))
                .times(1)
                .returning(|_| None);
        }
        assert_that(HarnessConfig::from_source(&source).is_ok()).is_true();
    }

    #[test]
    fn variables_override_defaults() {
        let config = HarnessConfig::from_source(&source(&[
            (SERVICE_BINARY, "sh ./fake-service.sh"),
            (PROCESS_TIMEOUT_SECS, "30"),
            (KAFKACAT, "kcat"),
            (KAFKA_BROKER, "kafka:29092"),
            (KAFKA_TOPIC, "notifications"),
            (SERVICE_LOG_URL, "http://service-log:8000"),
            (SERVICE_LOG_TOKEN, "secret"),
        ]))
        .unwrap();

        assert_that(config).is_equal_to(HarnessConfig {
            service: Executable::new("sh").with_leading_args(["./fake-service.sh"]),
            process_timeout: Some(Duration::from_secs(30)),
            message_bus: MessageBusConfig {
                tool: Executable::new("kcat"),
                broker: "kafka:29092".to_owned(),
                topic: "notifications".to_owned(),
            },
            service_log_url: "http://service-log:8000".to_owned(),
            service_log_token: "secret".to_owned(),
        });
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = HarnessConfig::from_source(&source(&[
            (SERVICE_BINARY, "   "),
            (PROCESS_TIMEOUT_SECS, ""),
            (KAFKA_BROKER, ""),
        ]))
        .unwrap();
        assert_that(config).is_equal_to(HarnessConfig::default());
    }

    #[test]
    fn zero_timeout_disables_timeout() {
        let config = HarnessConfig::from_source(&source(&[(PROCESS_TIMEOUT_SECS, "0")])).unwrap();
        assert_that(config.process_timeout).is_none();
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let err = HarnessConfig::from_source(&source(&[(PROCESS_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        let ConfigError::InvalidValue { key, value, .. } = err;
        assert_that(key).is_equal_to(PROCESS_TIMEOUT_SECS);
        assert_that(value).is_equal_to("soon".to_owned());
    }

    #[test]
    fn builds_collaborators() {
        let config = HarnessConfig::default();
        assert_that(
            config
                .kafkacat_reader()
                .command_line(1)
                .contains(&"localhost:9092".to_owned()),
        )
        .is_true();
        assert_that(config.service_log_client().is_ok()).is_true();
        assert_that(config.notification_service().command_line("--show-version"))
            .is_equal_to(vec!["--show-version".to_owned()]);
    }
}
