//! One apply cycle for a single machine: load config, sample temperatures,
//! evaluate the active curve (or the static fallback), actuate.
//!
//! The sequence is deliberately not transactional. A transport failure
//! between the mode switch and the speed command leaves the BMC in manual
//! mode at its previous speed; the next scheduled run converges it.

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ipmi::transport::IpmiTransport;
use crate::ipmi::{IpmiClient, IpmiConnection, IpmiError};
use crate::machine::curve::{evaluate_fan_speed, max_cpu_temperature, DEFAULT_BASELINE_SPEED};
use crate::machine::store::MachineStore;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("machine not found: {0}")]
    MachineNotFound(String),

    #[error("active preset {preset} not found on machine {machine}")]
    PresetNotFound { machine: String, preset: String },

    #[error(transparent)]
    Ipmi(#[from] IpmiError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyOutcome {
    /// Fan override issued at this speed.
    Applied { fan_speed: u8 },
    /// Machine is disabled; nothing was sampled or actuated.
    Skipped,
}

/// Run one apply cycle for `machine_id`. The transport is built through
/// `make_transport` so scheduled runs use ipmitool while tests inject a
/// scripted fake.
pub async fn apply_machine<T, F>(
    store: &RwLock<MachineStore>,
    machine_id: &str,
    make_transport: F,
) -> Result<ApplyOutcome, ApplyError>
where
    T: IpmiTransport,
    F: FnOnce(&IpmiConnection) -> T,
{
    debug!("running apply cycle for machine id {}", machine_id);

    // Clone the config out so no lock is held across BMC I/O.
    let machine = {
        let store = store.read().await;
        store
            .find_by_id(machine_id)
            .cloned()
            .ok_or_else(|| ApplyError::MachineNotFound(machine_id.to_string()))?
    };

    if !machine.enabled {
        return Ok(ApplyOutcome::Skipped);
    }

    let client = IpmiClient::new(make_transport(&machine.ipmi_config));

    let readings = client.get_temperatures().await?;

    let target = match &machine.active_preset_id {
        Some(preset_id) => {
            let preset = machine
                .presets
                .iter()
                .find(|p| &p.id == preset_id)
                .ok_or_else(|| ApplyError::PresetNotFound {
                    machine: machine.id.clone(),
                    preset: preset_id.clone(),
                })?;

            let max_temp = max_cpu_temperature(&readings);
            match max_temp {
                Some(t) => info!("max CPU temperature on {}: {:.1}C", machine.name, t),
                None => warn!(
                    "no CPU temperature readings on {}, falling back to baseline speed",
                    machine.name
                ),
            }

            evaluate_fan_speed(max_temp, &preset.fan_curve, DEFAULT_BASELINE_SPEED)
        }
        None => machine.fan_speed,
    };

    info!("applying fan speed {}% to {}", target, machine.name);
    client.set_fan_control(false).await?;
    client.set_fan_speed(i64::from(target)).await?;

    Ok(ApplyOutcome::Applied { fan_speed: target })
}
