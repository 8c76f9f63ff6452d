use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use eshim_device::{Readings, Snapshot};
use eshim_frame::CHANNEL_COUNT;
use eshim_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_snapshot(snapshot: &Snapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(snapshot),
        OutputFormat::Table => {
            let mut link = new_table(vec!["ENABLED", "CONNECTED", "LAST ERROR"]);
            link.add_row(vec![
                snapshot.enabled.to_string(),
                snapshot.connected.to_string(),
                snapshot.last_error.clone(),
            ]);
            println!("{link}");

            if let Some(readings) = &snapshot.readings {
                let mut device = new_table(vec![
                    "BUS V",
                    "MAX OUT V",
                    "MAX OUT P",
                    "MAX TOTAL P",
                    "COIL",
                    "STATUS",
                ]);
                device.add_row(vec![
                    readings.bus_voltage.to_string(),
                    readings.max_out_voltage.to_string(),
                    readings.max_out_power.to_string(),
                    readings.max_total_power.to_string(),
                    readings.coil_state.clone(),
                    readings.device_status.join("\n"),
                ]);
                println!("{device}");
                println!("{}", channel_table(readings));
            }
        }
        OutputFormat::Pretty => {
            println!(
                "enabled={} connected={} last_error={:?}",
                snapshot.enabled, snapshot.connected, snapshot.last_error
            );
            if let Some(readings) = &snapshot.readings {
                println!(
                    "bus_voltage={} max_out_voltage={} max_out_power={} max_total_power={}",
                    readings.bus_voltage,
                    readings.max_out_voltage,
                    readings.max_out_power,
                    readings.max_total_power
                );
                println!(
                    "coil={} status=[{}]",
                    readings.coil_state,
                    readings.device_status.join(", ")
                );
                for i in 0..CHANNEL_COUNT {
                    println!(
                        "ch{} set={} act={} voltage={} power={} error={:?}",
                        i + 1,
                        readings.ch_set_current[i],
                        readings.ch_act_current[i],
                        readings.ch_voltage[i],
                        readings.ch_power[i],
                        readings.ch_error[i]
                    );
                }
            }
        }
    }
}

fn channel_table(readings: &Readings) -> Table {
    let mut table = new_table(vec!["CH", "SET I", "ACT I", "VOLTAGE", "POWER", "ERROR"]);
    for i in 0..CHANNEL_COUNT {
        table.add_row(vec![
            (i + 1).to_string(),
            readings.ch_set_current[i].to_string(),
            readings.ch_act_current[i].to_string(),
            readings.ch_voltage[i].to_string(),
            readings.ch_power[i].to_string(),
            readings.ch_error[i].clone(),
        ]);
    }
    table
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ports),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "TYPE", "VID:PID", "SERIAL", "PRODUCT"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    usb_id(port),
                    port.serial_number.clone().unwrap_or_default(),
                    port.product.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!("{} ({}) {}", port.name, port.kind, usb_id(port));
            }
        }
    }
}

fn usb_id(port: &PortInfo) -> String {
    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}"),
        _ => String::new(),
    }
}

/// One reply recovered by the offline decoder.
#[derive(Debug, Serialize)]
pub struct DecodedFrame {
    pub frame: String,
    pub address: u8,
    pub register: Option<String>,
    pub value: i32,
    pub decoded: Option<String>,
}

pub fn print_decoded(frames: &[DecodedFrame], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&frames),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FRAME", "REGISTER", "VALUE", "DECODED"]);
            for frame in frames {
                table.add_row(vec![
                    frame.frame.clone(),
                    frame
                        .register
                        .clone()
                        .unwrap_or_else(|| format!("unknown ({:#04x})", frame.address)),
                    frame.value.to_string(),
                    frame.decoded.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                println!(
                    "{} register={} value={} decoded={}",
                    frame.frame,
                    frame.register.as_deref().unwrap_or("unknown"),
                    frame.value,
                    frame.decoded.as_deref().unwrap_or("-")
                );
            }
        }
    }
}
