//! Machine and preset configuration structs.
//! Field names on the wire are camelCase to stay compatible with existing
//! machines.json files.

use serde::{Deserialize, Serialize};

use crate::ipmi::IpmiConnection;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Recurrence expression. Classic 5-field crontab and 6-field
    /// (with seconds) forms are both accepted.
    pub cron: String,
    pub ipmi_config: IpmiConnection,
    /// Static fallback speed applied when no preset is active.
    pub fan_speed: u8,
    /// Must be None or the id of one of `presets`; the apply cycle verifies
    /// this at use time, the store does not enforce it.
    pub active_preset_id: Option<String>,
    pub presets: Vec<Preset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub fan_curve: Vec<FanCurvePoint>,
}

/// One point of a fan curve: at or above `temperature` degrees C, run the
/// fans at `fan_speed` percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanCurvePoint {
    pub temperature: f64,
    pub fan_speed: u8,
}
