use std::collections::BTreeSet;

/// The service could not reach the content service.
pub const CONTENT_SERVICE_UNAVAILABLE: i32 = 4;

/// The service could not reach the Kafka broker.
pub const KAFKA_BROKER_UNAVAILABLE: i32 = 5;

/// The service could not reach the Prometheus push gateway.
pub const PUSH_GATEWAY_UNAVAILABLE: i32 = 9;

/// Decides which exit codes of a finished process are acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExitCodePolicy {
    /// Every outcome is accepted, including termination by a signal.
    #[default]
    Any,

    /// Exit code `0` and every code in the set are accepted.
    SuccessOr(BTreeSet<i32>),
}

impl ExitCodePolicy {
    pub fn success_only() -> Self {
        Self::SuccessOr(BTreeSet::new())
    }

    pub fn success_or(codes: impl IntoIterator<Item = i32>) -> Self {
        Self::SuccessOr(codes.into_iter().collect())
    }

    /// Tolerates the service failing because one of its dependencies is not running. Scenarios
    /// that only look at the output do not care.
    pub fn dependency_unavailable() -> Self {
        Self::success_or([
            CONTENT_SERVICE_UNAVAILABLE,
            KAFKA_BROKER_UNAVAILABLE,
            PUSH_GATEWAY_UNAVAILABLE,
        ])
    }

    /// `code` is `None` when the process was terminated by a signal.
    pub fn accepts(&self, code: Option<i32>) -> bool {
        match self {
            ExitCodePolicy::Any => true,
            ExitCodePolicy::SuccessOr(codes) => match code {
                Some(0) => true,
                Some(code) => codes.contains(&code),
                None => false,
            },
        }
    }
}
