use std::net::Ipv4Addr;

use crate::error::FrameError;
use crate::settings::{SettingsPatch, TestSettings, UNUSED};

use super::body::TestBody;
use super::fields::{
    CLASS, TARGET_IP, TIME, addressed_to, parse_patch, render_patch, required, timestamp,
};
use super::{FINISH_TAG, START_TAG, UPDATE_TAG};

/// Launches (or relaunches) a test on every addressed agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCommand {
    pub time: String,
    pub target_ip: String,
    pub class: String,
    pub settings: SettingsPatch,
}

impl StartCommand {
    /// A broadcast Start carrying every field of `settings`.
    #[must_use]
    pub fn new(class: &str, settings: &TestSettings) -> Self {
        Self {
            time: timestamp(),
            target_ip: UNUSED.to_owned(),
            class: class.to_owned(),
            settings: SettingsPatch::full(settings),
        }
    }

    #[must_use]
    pub fn targeted(mut self, target: Option<Ipv4Addr>) -> Self {
        if let Some(target) = target {
            self.target_ip = target.to_string();
        }
        self
    }

    #[must_use]
    pub fn targets(&self, local: Ipv4Addr) -> bool {
        addressed_to(&self.target_ip, local)
    }

    #[must_use]
    pub fn to_payload(&self) -> String {
        let body = header(&self.time, &self.target_ip).with_child(CLASS, &self.class);
        let body = render_patch(body, &self.settings);
        format!("{}{}", START_TAG, body.render())
    }

    /// Parses the body that follows the `S` tag.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is malformed, has no class or carries
    /// a field that does not parse.
    pub fn parse(body: &str) -> Result<Self, FrameError> {
        let body = TestBody::parse(body)?;
        Ok(Self {
            time: attribute(&body, TIME),
            target_ip: attribute(&body, TARGET_IP),
            class: required(&body, CLASS)?.to_owned(),
            settings: parse_patch(&body)?,
        })
    }
}

/// Changes the load shape of a running test without restarting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCommand {
    pub time: String,
    pub target_ip: String,
    pub class: String,
    pub settings: SettingsPatch,
}

impl UpdateCommand {
    /// Only the updatable fields of `settings` are kept.
    #[must_use]
    pub fn new(class: &str, settings: &SettingsPatch) -> Self {
        Self {
            time: timestamp(),
            target_ip: UNUSED.to_owned(),
            class: class.to_owned(),
            settings: settings.updatable(),
        }
    }

    #[must_use]
    pub fn targeted(mut self, target: Option<Ipv4Addr>) -> Self {
        if let Some(target) = target {
            self.target_ip = target.to_string();
        }
        self
    }

    #[must_use]
    pub fn targets(&self, local: Ipv4Addr) -> bool {
        addressed_to(&self.target_ip, local)
    }

    #[must_use]
    pub fn to_payload(&self) -> String {
        let body = header(&self.time, &self.target_ip).with_child(CLASS, &self.class);
        let body = render_patch(body, &self.settings.updatable());
        format!("{}{}", UPDATE_TAG, body.render())
    }

    /// Parses the body that follows the `U` tag. Fields an Update may not
    /// change are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is malformed, has no class or carries
    /// a field that does not parse.
    pub fn parse(body: &str) -> Result<Self, FrameError> {
        let body = TestBody::parse(body)?;
        Ok(Self {
            time: attribute(&body, TIME),
            target_ip: attribute(&body, TARGET_IP),
            class: required(&body, CLASS)?.to_owned(),
            settings: parse_patch(&body)?.updatable(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishCommand {
    pub time: String,
    pub target_ip: String,
    pub class: String,
}

impl FinishCommand {
    #[must_use]
    pub fn new(class: &str) -> Self {
        Self {
            time: timestamp(),
            target_ip: UNUSED.to_owned(),
            class: class.to_owned(),
        }
    }

    #[must_use]
    pub fn targeted(mut self, target: Option<Ipv4Addr>) -> Self {
        if let Some(target) = target {
            self.target_ip = target.to_string();
        }
        self
    }

    #[must_use]
    pub fn targets(&self, local: Ipv4Addr) -> bool {
        addressed_to(&self.target_ip, local)
    }

    #[must_use]
    pub fn to_payload(&self) -> String {
        let body = header(&self.time, &self.target_ip).with_child(CLASS, &self.class);
        format!("{}{}", FINISH_TAG, body.render())
    }

    /// Parses the body that follows the `F` tag.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is malformed or has no class.
    pub fn parse(body: &str) -> Result<Self, FrameError> {
        let body = TestBody::parse(body)?;
        Ok(Self {
            time: attribute(&body, TIME),
            target_ip: attribute(&body, TARGET_IP),
            class: required(&body, CLASS)?.to_owned(),
        })
    }
}

fn header(time: &str, target_ip: &str) -> TestBody {
    TestBody::new()
        .with_attribute(TIME, time)
        .with_attribute(TARGET_IP, target_ip)
}

fn attribute(body: &TestBody, name: &str) -> String {
    body.attribute(name).unwrap_or_default().to_owned()
}
