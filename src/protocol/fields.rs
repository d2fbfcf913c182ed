use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};

use crate::error::FrameError;
use crate::settings::{SettingsPatch, UNUSED};

use super::body::TestBody;

pub(super) const TIME: &str = "time";
pub(super) const TARGET_IP: &str = "targetIP";
pub(super) const CLASS: &str = "Class";

/// Timestamp stamped on outbound commands.
#[must_use]
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether a frame carrying `target` is meant for the agent at `local`.
#[must_use]
pub fn addressed_to(target: &str, local: Ipv4Addr) -> bool {
    let target = target.trim();
    if target.is_empty() || target.eq_ignore_ascii_case(UNUSED) {
        return true;
    }
    target.parse::<Ipv4Addr>().is_ok_and(|ip| ip == local)
}

pub(super) fn required<'body>(body: &'body TestBody, element: &'static str) -> Result<&'body str, FrameError> {
    body.child(element)
        .map(str::trim)
        .ok_or(FrameError::MissingElement { element })
}

fn parsed<T: FromStr>(body: &TestBody, element: &'static str) -> Result<Option<T>, FrameError> {
    body.child(element)
        .map(|text| {
            text.trim().parse().map_err(|_err| FrameError::InvalidField {
                field: element,
                value: text.to_owned(),
            })
        })
        .transpose()
}

fn text(body: &TestBody, element: &str) -> Option<String> {
    body.child(element).map(str::to_owned)
}

/// Wire element names, in the order a Start body lists them.
const SCENARIO: &str = "Scenario";
const CONNECTION: &str = "Connection";
const MESSAGE_MIN: &str = "MessageMin";
const MESSAGE_MAX: &str = "MessageMax";
const TOTAL_REQUESTS: &str = "TotalRequests";
const REQUEST_RATE: &str = "RequestRate";
const WORKERS: &str = "Workers";
const USER_DATA: &str = "UserData";
const TRIGGER_IP: &str = "TriggerIP";
const RAMP_UP: &str = "RampUp";
const DURATION: &str = "Duration";
const RATE_MIN: &str = "RateMin";
const RATE_MAX: &str = "RateMax";
const MAX_ALLOWED_LATENCY: &str = "MaxAllowedLatency";
const USERS: &str = "Users";
const REQUEST_MODE: &str = "RequestMode";

fn put<V: ToString>(body: TestBody, element: &str, value: Option<V>) -> TestBody {
    match value {
        Some(value) => body.with_child(element, &value.to_string()),
        None => body,
    }
}

/// Appends one element per set field of `patch`.
pub(super) fn render_patch(body: TestBody, patch: &SettingsPatch) -> TestBody {
    let body = put(body, SCENARIO, patch.scenario.as_ref());
    let body = put(body, CONNECTION, patch.connection.as_ref());
    let body = put(body, MESSAGE_MIN, patch.message_min);
    let body = put(body, MESSAGE_MAX, patch.message_max);
    let body = put(body, TOTAL_REQUESTS, patch.total_requests);
    let body = put(body, REQUEST_RATE, patch.request_rate);
    let body = put(body, WORKERS, patch.workers);
    let body = put(body, USER_DATA, patch.user_data.as_ref());
    let body = put(body, TRIGGER_IP, patch.trigger_ip.as_ref());
    let body = put(body, RAMP_UP, patch.ramp_up_secs);
    let body = put(body, DURATION, patch.duration_secs);
    let body = put(body, RATE_MIN, patch.rate_min_secs);
    let body = put(body, RATE_MAX, patch.rate_max_secs);
    let body = put(body, MAX_ALLOWED_LATENCY, patch.max_allowed_latency_ms);
    let body = put(body, USERS, patch.users);
    put(
        body,
        REQUEST_MODE,
        patch.request_mode.map(|mode| mode.as_wire()),
    )
}

/// Reads every settings element present in `body`.
pub(super) fn parse_patch(body: &TestBody) -> Result<SettingsPatch, FrameError> {
    Ok(SettingsPatch {
        scenario: text(body, SCENARIO),
        connection: text(body, CONNECTION),
        message_min: parsed(body, MESSAGE_MIN)?,
        message_max: parsed(body, MESSAGE_MAX)?,
        total_requests: parsed(body, TOTAL_REQUESTS)?,
        request_rate: parsed(body, REQUEST_RATE)?,
        workers: parsed(body, WORKERS)?,
        user_data: text(body, USER_DATA),
        trigger_ip: text(body, TRIGGER_IP),
        request_mode: parsed(body, REQUEST_MODE)?,
        users: parsed(body, USERS)?,
        ramp_up_secs: parsed(body, RAMP_UP)?,
        duration_secs: parsed(body, DURATION)?,
        rate_min_secs: parsed(body, RATE_MIN)?,
        rate_max_secs: parsed(body, RATE_MAX)?,
        max_allowed_latency_ms: parsed(body, MAX_ALLOWED_LATENCY)?,
    })
}
