use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::pool::MAX_THREADS;

/// Placeholder carried in optional wire fields that are not set.
pub const UNUSED: &str = "unused";

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Issue a fixed number of requests as fast as capacity allows.
    #[default]
    #[value(name = "bymessage")]
    ByMessage,
    /// Simulate a population of users with think time between requests.
    #[value(name = "byuser")]
    ByUser,
}

impl RequestMode {
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            RequestMode::ByMessage => "ByMessage",
            RequestMode::ByUser => "ByUser",
        }
    }
}

impl std::str::FromStr for RequestMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bymessage" | "message" => Ok(RequestMode::ByMessage),
            "byuser" | "user" | "users" => Ok(RequestMode::ByUser),
            _ => Err(ValidationError::InvalidRequestMode {
                value: s.to_owned(),
            }),
        }
    }
}

/// Everything a test run needs to know about its load shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TestSettings {
    /// Operations to run; contains "set" and/or "get" for the Get/Set adapter.
    pub scenario: String,
    /// Opaque connection string handed to the request type.
    pub connection: String,
    /// Smallest generated payload, in bytes.
    pub message_min: u64,
    /// Largest generated payload, in bytes.
    pub message_max: u64,
    /// Requests to issue in `ByMessage` mode.
    pub total_requests: u64,
    /// Aggregate requests per second; 0 disables pacing.
    pub request_rate: u64,
    /// Worker threads in the pool.
    pub workers: usize,
    pub user_data: String,
    pub trigger_ip: String,
    pub request_mode: RequestMode,
    /// Simulated users in `ByUser` mode.
    pub users: u64,
    pub ramp_up_secs: u64,
    pub duration_secs: u64,
    /// Lower bound of a simulated user's think time.
    pub rate_min_secs: u64,
    /// Upper bound (exclusive) of a simulated user's think time.
    pub rate_max_secs: u64,
    /// Per-request timeout; 0 disables it.
    pub max_allowed_latency_ms: u64,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            scenario: "SetGet".to_owned(),
            connection: String::new(),
            message_min: 100,
            message_max: 100,
            total_requests: 1000,
            request_rate: 0,
            workers: 10,
            user_data: String::new(),
            trigger_ip: UNUSED.to_owned(),
            request_mode: RequestMode::ByMessage,
            users: 10,
            ramp_up_secs: 0,
            duration_secs: 60,
            rate_min_secs: 1,
            rate_max_secs: 5,
            max_allowed_latency_ms: 0,
        }
    }
}

impl TestSettings {
    /// Checks the cross-field constraints a run depends on.
    ///
    /// # Errors
    ///
    /// Returns an error when the worker count is out of range or a min/max
    /// pair is inverted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::ValueTooSmall { min: 1 });
        }
        if self.workers > MAX_THREADS {
            return Err(ValidationError::ValueTooLarge {
                max: MAX_THREADS as u64,
            });
        }
        if self.message_min > self.message_max {
            return Err(ValidationError::RangeInverted {
                min_field: "message_min",
                max_field: "message_max",
            });
        }
        if self.rate_min_secs > self.rate_max_secs {
            return Err(ValidationError::RangeInverted {
                min_field: "rate_min",
                max_field: "rate_max",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn scenario_has(&self, operation: &str) -> bool {
        self.scenario
            .to_ascii_lowercase()
            .contains(&operation.to_ascii_lowercase())
    }
}
