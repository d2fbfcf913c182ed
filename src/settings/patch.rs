use serde::{Deserialize, Serialize};

use super::{RequestMode, TestSettings};

/// A sparse set of setting overrides, as carried by CLI flags and control
/// frames. `None` leaves the target field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub scenario: Option<String>,
    pub connection: Option<String>,
    pub message_min: Option<u64>,
    pub message_max: Option<u64>,
    pub total_requests: Option<u64>,
    pub request_rate: Option<u64>,
    pub workers: Option<usize>,
    pub user_data: Option<String>,
    pub trigger_ip: Option<String>,
    pub request_mode: Option<RequestMode>,
    pub users: Option<u64>,
    pub ramp_up_secs: Option<u64>,
    pub duration_secs: Option<u64>,
    pub rate_min_secs: Option<u64>,
    pub rate_max_secs: Option<u64>,
    pub max_allowed_latency_ms: Option<u64>,
}

macro_rules! patch_fields {
    ($patch:expr, $target:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field.clone() {
                $target.$field = value;
            }
        )+
    };
}

impl SettingsPatch {
    /// Captures every field of `settings`.
    #[must_use]
    pub fn full(settings: &TestSettings) -> Self {
        Self {
            scenario: Some(settings.scenario.clone()),
            connection: Some(settings.connection.clone()),
            message_min: Some(settings.message_min),
            message_max: Some(settings.message_max),
            total_requests: Some(settings.total_requests),
            request_rate: Some(settings.request_rate),
            workers: Some(settings.workers),
            user_data: Some(settings.user_data.clone()),
            trigger_ip: Some(settings.trigger_ip.clone()),
            request_mode: Some(settings.request_mode),
            users: Some(settings.users),
            ramp_up_secs: Some(settings.ramp_up_secs),
            duration_secs: Some(settings.duration_secs),
            rate_min_secs: Some(settings.rate_min_secs),
            rate_max_secs: Some(settings.rate_max_secs),
            max_allowed_latency_ms: Some(settings.max_allowed_latency_ms),
        }
    }

    /// Keeps only the fields an Update frame may change.
    #[must_use]
    pub fn updatable(&self) -> Self {
        Self {
            message_min: self.message_min,
            message_max: self.message_max,
            total_requests: self.total_requests,
            request_rate: self.request_rate,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, settings: &mut TestSettings) {
        patch_fields!(
            self,
            settings,
            scenario,
            connection,
            message_min,
            message_max,
            total_requests,
            request_rate,
            workers,
            user_data,
            trigger_ip,
            request_mode,
            users,
            ramp_up_secs,
            duration_secs,
            rate_min_secs,
            rate_max_secs,
            max_allowed_latency_ms,
        );
    }
}
