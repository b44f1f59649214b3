//! Cron scheduler: one recurring job per enabled machine.
//!
//! Jobs are tokio tasks that sleep until the next cron fire and then run an
//! apply cycle. A job's failure is logged and isolated to that machine; the
//! scheduler itself never exits because a job failed. The job map is only
//! mutated under a single mutex, so reconcile and remove cannot race.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use cron::Schedule;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ipmi::transport::{IpmitoolFactory, TransportFactory};
use crate::machine::apply::{apply_machine, ApplyOutcome};
use crate::machine::store::MachineStore;
use crate::machine::types::Machine;

struct Job {
    handle: JoinHandle<()>,
}

pub struct Scheduler<F: TransportFactory = IpmitoolFactory> {
    store: Arc<RwLock<MachineStore>>,
    factory: Arc<F>,
    jobs: Mutex<HashMap<String, Job>>,
}

impl Scheduler<IpmitoolFactory> {
    pub fn new(store: Arc<RwLock<MachineStore>>) -> Self {
        Self::with_factory(store, IpmitoolFactory)
    }
}

impl<F: TransportFactory> Scheduler<F> {
    /// Scheduler over an arbitrary transport factory. Scheduled fires go
    /// through the factory, so tests can substitute a scripted transport.
    pub fn with_factory(store: Arc<RwLock<MachineStore>>, factory: F) -> Self {
        Self {
            store,
            factory: Arc::new(factory),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Create jobs for every enabled machine in the store.
    pub async fn start(&self) -> Result<()> {
        let machines: Vec<Machine> = {
            let store = self.store.read().await;
            store.find_enabled().into_iter().cloned().collect()
        };

        for machine in &machines {
            if let Err(e) = self.reconcile(machine).await {
                error!("failed to schedule machine {}: {:#}", machine.name, e);
            }
        }

        info!("created {} scheduled jobs", self.scheduled_machines().await.len());
        Ok(())
    }

    /// Create-or-replace the job for a machine, or remove it when the
    /// machine is disabled. An existing job is always aborted before the
    /// replacement is installed, so at most one job per machine id exists.
    pub async fn reconcile(&self, machine: &Machine) -> Result<()> {
        if !machine.enabled {
            self.remove(&machine.id).await;
            return Ok(());
        }

        let schedule = parse_cron(&machine.cron)
            .with_context(|| format!("invalid cron expression for machine {}", machine.name))?;

        let mut jobs = self.jobs.lock().await;
        if let Some(old) = jobs.remove(&machine.id) {
            old.handle.abort();
            debug!("replaced existing job for machine {}", machine.name);
        }

        let handle = self.spawn_job(machine, schedule);
        jobs.insert(machine.id.clone(), Job { handle });

        info!(
            "scheduled job for machine {} with cron '{}'",
            machine.name, machine.cron
        );
        Ok(())
    }

    /// Stop and discard the job for a machine id. Absence is not an error.
    pub async fn remove(&self, machine_id: &str) {
        let mut jobs = self.jobs.lock().await;
        match jobs.remove(machine_id) {
            Some(job) => {
                job.handle.abort();
                info!("removed job for machine {}", machine_id);
            }
            None => debug!("no job to remove for machine {}", machine_id),
        }
    }

    /// Ids of machines that currently have an active job.
    pub async fn scheduled_machines(&self) -> Vec<String> {
        let jobs = self.jobs.lock().await;
        let mut ids: Vec<String> = jobs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Abort every job. Called on daemon shutdown.
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.handle.abort();
        }
        info!("scheduler stopped");
    }

    fn spawn_job(&self, machine: &Machine, schedule: Schedule) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let factory = Arc::clone(&self.factory);
        let id = machine.id.clone();
        let name = machine.name.clone();

        tokio::spawn(async move {
            loop {
                // The next fire is computed after the previous apply has
                // completed, so two applies for one machine never overlap;
                // fires missed during a slow apply are skipped.
                let now = Local::now();
                let Some(next) = schedule.after(&now).next() else {
                    warn!("schedule for machine {} has no upcoming fires, stopping job", name);
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                debug!("running job for machine {}", name);
                let result = apply_machine(&store, &id, |conn| factory.connect(conn)).await;
                match result {
                    Ok(ApplyOutcome::Applied { fan_speed }) => {
                        info!("job completed for machine {}: fan speed {}%", name, fan_speed);
                    }
                    Ok(ApplyOutcome::Skipped) => {
                        debug!("machine {} is disabled, nothing applied", name);
                    }
                    Err(e) => {
                        error!("job failed for machine {}: {}", name, e);
                    }
                }
            }
        })
    }
}

/// Parse a cron expression, accepting both the 6/7-field form with seconds
/// and the classic 5-field crontab form (seconds assumed 0).
fn parse_cron(expr: &str) -> Result<Schedule> {
    match Schedule::from_str(expr) {
        Ok(schedule) => Ok(schedule),
        Err(_) if expr.split_whitespace().count() == 5 => {
            Schedule::from_str(&format!("0 {}", expr))
                .with_context(|| format!("failed to parse cron expression '{}'", expr))
        }
        Err(e) => Err(e).with_context(|| format!("failed to parse cron expression '{}'", expr)),
    }
}
