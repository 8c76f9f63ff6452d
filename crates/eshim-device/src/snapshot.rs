use eshim_frame::CHANNEL_COUNT;
use serde::Serialize;

use crate::decode::Locale;
use crate::state::DeviceState;

/// Serializable view of the device state for presentation layers.
///
/// Readings are present only while the device is enabled and connected;
/// otherwise the snapshot carries just the link flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub enabled: bool,
    pub connected: bool,
    pub last_error: String,
    #[serde(flatten)]
    pub readings: Option<Readings>,
}

/// Device readings with messages rendered in the configured locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readings {
    pub bus_voltage: i32,
    pub max_out_voltage: i32,
    pub max_out_power: i32,
    pub max_total_power: i32,
    pub device_status: Vec<String>,
    pub coil_state: String,
    pub ch_set_current: [i32; CHANNEL_COUNT],
    pub ch_act_current: [i32; CHANNEL_COUNT],
    pub ch_voltage: [i32; CHANNEL_COUNT],
    pub ch_power: [i32; CHANNEL_COUNT],
    pub ch_error: [String; CHANNEL_COUNT],
}

impl Snapshot {
    /// Render `state` with messages in `locale`.
    pub fn from_state(state: &DeviceState, locale: Locale) -> Self {
        let readings = (state.enabled && state.connected).then(|| Readings {
            bus_voltage: state.bus_voltage,
            max_out_voltage: state.max_out_voltage,
            max_out_power: state.max_out_power,
            max_total_power: state.max_total_power,
            device_status: state
                .status
                .iter()
                .map(|flag| flag.message(locale).to_string())
                .collect(),
            coil_state: state
                .coil
                .map(|coil| coil.label().to_string())
                .unwrap_or_default(),
            ch_set_current: state.ch_set_current,
            ch_act_current: state.ch_act_current,
            ch_voltage: state.ch_voltage,
            ch_power: state.ch_power,
            ch_error: std::array::from_fn(|i| {
                state.ch_error[i]
                    .map(|fault| fault.message(locale).to_string())
                    .unwrap_or_default()
            }),
        });

        Self {
            enabled: state.enabled,
            connected: state.connected,
            last_error: state.last_error.clone(),
            readings,
        }
    }

    /// JSON value of this snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
