//! Reading the notifications the service published to the message bus.
//!
//! Messages are consumed with the `kafkacat` command line tool, so the harness needs no Kafka
//! client of its own.

use crate::checks::CheckError;
use crate::error::RunError;
use crate::process::{Executable, Invocation};
use crate::table::{ScenarioTable, TableError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::time::Duration;

/// Printed by `kafkacat` when the topic does not exist yet, which happens before the first
/// notification was ever sent.
const UNKNOWN_TOPIC: &str = "Unknown topic or partition";

pub const EXPECTED_BUNDLE: &str = "openshift";
pub const EXPECTED_APPLICATION: &str = "advisor";
pub const EXPECTED_EVENT_TYPE: &str = "new-recommendation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBusConfig {
    pub tool: Executable,
    pub broker: String,
    pub topic: String,
}

impl Default for MessageBusConfig {
    fn default() -> Self {
        Self {
            tool: Executable::new("kafkacat"),
            broker: "localhost:9092".to_owned(),
            topic: "platform.notifications.ingress".to_owned(),
        }
    }
}

/// Reads the most recent messages of a topic using `kafkacat`.
#[derive(Debug, Clone)]
pub struct KafkacatReader {
    config: MessageBusConfig,
    timeout: Option<Duration>,
}

impl KafkacatReader {
    pub fn new(config: MessageBusConfig) -> Self {
        Self {
            config,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments consuming the last `count` messages of the topic and exiting at its end.
    pub fn command_line(&self, count: usize) -> Vec<String> {
        let offset = -(count as i64);
        vec![
            "-b".to_owned(),
            self.config.broker.clone(),
            "-C".to_owned(),
            "-t".to_owned(),
            self.config.topic.clone(),
            "-c".to_owned(),
            count.to_string(),
            "-o".to_owned(),
            offset.to_string(),
            "-e".to_owned(),
        ]
    }

    /// Retrieves up to `count` of the latest messages, each one a line of JSON.
    ///
    /// The exit code of the tool is not checked. Its diagnostics share the output with the
    /// messages and are dropped by [extract_messages].
    pub async fn last_messages(&self, count: usize) -> Result<Vec<String>, RunError> {
        let output = Invocation::new(self.config.tool.clone())
            .args(self.command_line(count))
            .maybe_timeout(self.timeout)
            .run()
            .await?;
        let messages = extract_messages(&output.text());
        tracing::debug!(
            topic = %self.config.topic,
            requested = count,
            retrieved = messages.len(),
            "Read messages from bus"
        );
        Ok(messages)
    }
}

/// Picks the messages out of `kafkacat` output: all lines starting with `{`.
///
/// Output reporting an unknown topic yields no messages at all.
pub fn extract_messages(output: &str) -> Vec<String> {
    if output.contains(UNKNOWN_TOPIC) {
        return Vec::new();
    }
    output
        .split('\n')
        .filter(|line| line.starts_with('{'))
        .map(str::to_owned)
        .collect()
}

/// A notification as published by the service.
///
/// Only the fields verified by [check_notification_events] are modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub bundle: Option<String>,
    pub application: Option<String>,
    pub event_type: Option<String>,
    pub account_id: Option<Value>,
    pub context: Option<Value>,
    #[serde(default)]
    pub events: Vec<NotificationEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub payload: Option<Value>,
}

/// What a scenario expects the n-th notification to carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedEvent {
    pub account_number: String,
    pub cluster_name: String,
    pub total_risk: String,
}

impl ExpectedEvent {
    /// Reads the columns `account number`, `cluster name` and `total risk`, one event per row.
    pub fn from_table(table: &ScenarioTable) -> Result<Vec<Self>, TableError> {
        table
            .rows()
            .map(|row| {
                Ok(Self {
                    account_number: row.get("account number")?.to_owned(),
                    cluster_name: row.get("cluster name")?.to_owned(),
                    total_risk: row.get("total risk")?.to_owned(),
                })
            })
            .collect()
    }
}

pub fn check_event_count(messages: &[String], expected: usize) -> Result<(), CheckError> {
    match messages.len() == expected {
        true => Ok(()),
        false => Err(CheckError::EventCount {
            retrieved: messages.len(),
            expected,
        }),
    }
}

/// Verifies that there is one message per expected event and that the n-th message matches the
/// n-th expected event.
pub fn check_notification_events(
    messages: &[String],
    expected: &[ExpectedEvent],
) -> Result<(), CheckError> {
    check_event_count(messages, expected.len())?;

    for (index, (line, expected)) in messages.iter().zip(expected).enumerate() {
        let message: NotificationMessage = serde_json::from_str(line)
            .map_err(|source| CheckError::MalformedEvent { index, source })?;
        verify_message(&message, expected)
            .map_err(|reason| CheckError::EventMismatch { index, reason })?;
    }
    Ok(())
}

fn verify_message(message: &NotificationMessage, expected: &ExpectedEvent) -> Result<(), String> {
    require_field(&message.bundle, EXPECTED_BUNDLE, "bundle")?;
    require_field(&message.application, EXPECTED_APPLICATION, "application")?;
    require_field(&message.event_type, EXPECTED_EVENT_TYPE, "event type")?;

    match &message.account_id {
        None => return Err("Expected `account_id` to be included in the event".to_owned()),
        Some(Value::String(account_id)) if *account_id == expected.account_number => {}
        Some(account_id) => {
            return Err(format!(
                "Expected account id to be {:?}, got {account_id}",
                expected.account_number
            ));
        }
    }

    let context = message.context.as_ref().map(as_text).unwrap_or_default();
    if !context.contains(&expected.cluster_name) {
        return Err(format!(
            "Expected cluster name in event to be {}",
            expected.cluster_name
        ));
    }

    let risk = format!("\"total_risk\":\"{}\"", expected.total_risk);
    let payload = message
        .events
        .first()
        .and_then(|event| event.payload.as_ref())
        .map(as_text)
        .unwrap_or_default();
    if !payload.contains(&risk) {
        return Err(format!("{risk} not in {payload}"));
    }
    Ok(())
}

fn require_field(actual: &Option<String>, expected: &str, field: &str) -> Result<(), String> {
    match actual.as_deref() {
        Some(actual) if actual == expected => Ok(()),
        _ => Err(format!(
            "Expected event to contain the `{expected}` {field}, got {actual:?}"
        )),
    }
}

/// Strings as they are, anything else as compact JSON.
fn as_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(text) => Cow::Borrowed(text),
        other => Cow::Owned(other.to_string()),
    }
}
