//! fleetfand entry point: CLI dispatch, machine store, scheduler lifecycle.

mod app;
mod ipmi;
mod machine;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::RwLock;
use tracing::info;

use app::cli::{Args, Command};
use app::logging::init_tracing;
use ipmi::{IpmiClient, IpmitoolTransport};
use machine::store::NewMachine;
use machine::{apply_machine, ApplyOutcome, MachineStore, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let mut store = MachineStore::open(&args.store).await?;

    match args.command {
        None => run_daemon(store).await,

        Some(Command::List) => {
            for machine in store.find_all() {
                println!(
                    "{}  {:<20} {:<9} cron='{}' host={}",
                    machine.id,
                    machine.name,
                    if machine.enabled { "enabled" } else { "disabled" },
                    machine.cron,
                    machine.ipmi_config.host,
                );
            }
            Ok(())
        }

        Some(Command::CreateMachine {
            name,
            host,
            user,
            password,
            cron,
        }) => {
            let machine = store
                .create_machine(NewMachine {
                    name,
                    host,
                    user,
                    password,
                    cron,
                })
                .await?;
            println!("{}", machine.id);
            println!("machine created disabled; enable it with: fleetfand enable {}", machine.id);
            Ok(())
        }

        Some(Command::Enable { id }) => {
            store.set_enabled(&id, true).await?;
            println!("restart a running daemon to pick up the change");
            Ok(())
        }

        Some(Command::Disable { id }) => {
            store.set_enabled(&id, false).await?;
            println!("restart a running daemon to pick up the change");
            Ok(())
        }

        Some(Command::Apply { id }) => {
            let store = RwLock::new(store);
            let outcome =
                apply_machine(&store, &id, |conn| IpmitoolTransport::new(conn.clone())).await?;
            match outcome {
                ApplyOutcome::Applied { fan_speed } => {
                    println!("applied fan speed {}%", fan_speed)
                }
                ApplyOutcome::Skipped => println!("machine is disabled, nothing applied"),
            }
            Ok(())
        }

        Some(Command::Status { id }) => {
            let client = client_for(&store, &id)?;
            let chassis = client.get_chassis_status().await?;
            let power = client.get_power_consumption().await?;
            let temperatures = client.get_temperatures().await?;
            let fans = client.get_fan_speeds().await?;
            let power_supplies = client.get_power_supplies().await?;
            let sensors = client.get_all_sensors().await?;

            let report = serde_json::json!({
                "chassis": chassis,
                "power": power,
                "temperatures": temperatures,
                "fans": fans,
                "powerSupplies": power_supplies,
                "sensors": sensors,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Some(Command::Sel { id, lines, clear }) => {
            let client = client_for(&store, &id)?;
            if clear {
                client.clear_system_event_log().await?;
            } else {
                print!("{}", client.get_system_event_log(lines).await?);
            }
            Ok(())
        }
    }
}

fn client_for(store: &MachineStore, id: &str) -> Result<IpmiClient<IpmitoolTransport>> {
    let machine = store
        .find_by_id(id)
        .with_context(|| format!("machine not found: {}", id))?;
    Ok(IpmiClient::new(IpmitoolTransport::new(
        machine.ipmi_config.clone(),
    )))
}

async fn run_daemon(store: MachineStore) -> Result<()> {
    info!("fleetfand {} starting", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(RwLock::new(store));
    let scheduler = Scheduler::new(Arc::clone(&store));
    scheduler.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    scheduler.shutdown().await;
    Ok(())
}
