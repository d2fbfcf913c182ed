use serde::Deserialize;

use crate::settings::SettingsPatch;

/// Contents of `squawk.toml` / `squawk.json`. Every key is optional.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
pub struct ConfigFile {
    /// Control group endpoint, `a.b.c.d:port`.
    pub multicast: Option<String>,
    pub local_ip: Option<String>,
    pub squawk_interval_ms: Option<u64>,
    pub loopback: Option<bool>,
    pub ttl: Option<u32>,
    pub settle_ms: Option<u64>,
    pub metrics_interval_ms: Option<u64>,
    /// Base settings for every test started from this process.
    pub test: Option<SettingsPatch>,
}
