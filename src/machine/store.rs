//! File-backed machine store.
//! A JSON array of machines, loaded once at startup and flushed on every
//! mutation. First run bootstraps an empty file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use crate::ipmi::IpmiConnection;
use crate::machine::curve::DEFAULT_BASELINE_SPEED;
use crate::machine::types::{FanCurvePoint, Machine, Preset};

pub const DEFAULT_STORE_FILE: &str = "machines.json";

/// Parameters for registering a new machine.
pub struct NewMachine {
    pub name: String,
    pub host: String,
    pub user: String,
    pub password: String,
    pub cron: String,
}

pub struct MachineStore {
    path: PathBuf,
    machines: HashMap<String, Machine>,
}

impl MachineStore {
    /// Load the store from disk, creating an empty one if the file is
    /// missing.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            tokio::fs::write(path, "[]")
                .await
                .with_context(|| format!("failed to bootstrap machine store at {:?}", path))?;
            info!("created empty machine store at {:?}", path);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read machine store {:?}", path))?;
        let configs: Vec<Machine> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse machine store {:?}", path))?;

        let machines = configs.into_iter().map(|m| (m.id.clone(), m)).collect();

        Ok(Self {
            path: path.to_path_buf(),
            machines,
        })
    }

    async fn flush(&self) -> Result<()> {
        // Stable order keeps the file diffable across flushes.
        let mut all: Vec<&Machine> = self.machines.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));

        let content = serde_json::to_string_pretty(&all)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("failed to write machine store {:?}", self.path))?;
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Machine> {
        self.machines.get(id)
    }

    pub fn find_all(&self) -> Vec<&Machine> {
        let mut all: Vec<&Machine> = self.machines.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn find_enabled(&self) -> Vec<&Machine> {
        self.find_all().into_iter().filter(|m| m.enabled).collect()
    }

    /// Upsert by id and flush.
    pub async fn save(&mut self, machine: Machine) -> Result<Machine> {
        self.machines.insert(machine.id.clone(), machine.clone());
        self.flush().await?;
        Ok(machine)
    }

    /// Register a new machine. It starts disabled with the static fallback
    /// speed at baseline and a conservative default curve as its active
    /// preset.
    pub async fn create_machine(&mut self, new: NewMachine) -> Result<Machine> {
        let preset_id = Uuid::new_v4().to_string();
        let machine = Machine {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            enabled: false,
            cron: new.cron,
            ipmi_config: IpmiConnection {
                host: new.host,
                user: new.user,
                password: new.password,
            },
            fan_speed: DEFAULT_BASELINE_SPEED,
            active_preset_id: Some(preset_id.clone()),
            presets: vec![Preset {
                id: preset_id,
                name: "Default Preset".to_string(),
                fan_curve: vec![
                    FanCurvePoint { temperature: 30.0, fan_speed: 10 },
                    FanCurvePoint { temperature: 40.0, fan_speed: 30 },
                    FanCurvePoint { temperature: 50.0, fan_speed: 50 },
                    FanCurvePoint { temperature: 60.0, fan_speed: 70 },
                    FanCurvePoint { temperature: 70.0, fan_speed: 90 },
                ],
            }],
        };

        info!("registered machine {} ({})", machine.name, machine.id);
        self.save(machine).await
    }

    pub async fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<Machine> {
        let machine = self
            .machines
            .get_mut(id)
            .with_context(|| format!("machine not found: {}", id))?;
        machine.enabled = enabled;
        let updated = machine.clone();
        self.flush().await?;
        info!(
            "machine {} is now {}",
            updated.name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(updated)
    }
}
