//! `devices` command implementation.

use anyhow::{Context, Result};
use contracts::DeviceContext;
use serde::Serialize;
use tracing::info;

use super::{build_context, load_config};
use crate::cli::DevicesArgs;

/// Device listing for JSON output
#[derive(Debug, Serialize)]
struct DeviceListing {
    serial: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    firmware: Option<String>,
    sensors: Vec<SensorListing>,
}

#[derive(Debug, Serialize)]
struct SensorListing {
    name: String,
    profiles: Vec<ProfileListing>,
}

#[derive(Debug, Serialize)]
struct ProfileListing {
    profile: String,
    /// First listed profile of its stream
    default: bool,
}

/// Execute the `devices` command
pub fn run_devices(args: &DevicesArgs) -> Result<()> {
    info!(config = %args.config.display(), "Listing devices");

    let config = load_config(&args.config)?;
    let listings = list_devices(build_context(&config).as_ref());

    if args.json {
        let json =
            serde_json::to_string_pretty(&listings).context("Failed to serialize device list")?;
        println!("{}", json);
    } else {
        print_devices(&listings);
    }

    Ok(())
}

fn list_devices(context: &dyn DeviceContext) -> Vec<DeviceListing> {
    context
        .query_devices()
        .iter()
        .map(|device| {
            let info = device.info();
            DeviceListing {
                serial: info.serial.to_string(),
                name: info.name.clone(),
                firmware: info.firmware.clone(),
                sensors: device
                    .sensors()
                    .iter()
                    .map(|sensor| SensorListing {
                        name: sensor.name.clone(),
                        profiles: sensor
                            .profiles
                            .iter()
                            .map(|p| ProfileListing {
                                profile: p.to_string(),
                                default: device.default_profile(p.key()) == Some(*p),
                            })
                            .collect(),
                    })
                    .collect(),
            }
        })
        .collect()
}

fn print_devices(devices: &[DeviceListing]) {
    println!("Devices ({}):", devices.len());
    for device in devices {
        match &device.firmware {
            Some(firmware) => println!("\n{} ({}, firmware {})", device.name, device.serial, firmware),
            None => println!("\n{} ({})", device.name, device.serial),
        }
        for sensor in &device.sensors {
            println!("  {}:", sensor.name);
            for p in &sensor.profiles {
                println!("    {} {}", if p.default { "*" } else { "-" }, p.profile);
            }
        }
    }
    println!();
}
