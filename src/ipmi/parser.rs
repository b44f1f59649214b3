//! Parsers for ipmitool's semi-structured text output.
//!
//! The protocol has no schema: every line is treated independently and
//! missing fields decode to defaults instead of failing, so one unparsable
//! sensor cannot abort a whole read. Malformed numeric fields parse to NaN;
//! callers filter on finiteness before using a value.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub sensor: String,
    pub identifier: String,
    pub status: String,
    pub degrees: f64,
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanReading {
    pub sensor: String,
    pub identifier: String,
    pub status: String,
    pub rpm: f64,
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSupplyReading {
    pub sensor: String,
    pub identifier: String,
    pub status: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerConsumption {
    pub current_watts: u32,
    pub minimum_watts: u32,
    pub maximum_watts: u32,
    pub average_watts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChassisStatus {
    pub power_on: bool,
    pub power_overload: bool,
    pub power_interlock: bool,
    pub power_fault: bool,
    pub power_control_fault: bool,
    pub last_power_event: String,
    pub chassis_intrusion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor: String,
    pub value: String,
    pub units: String,
    pub status: String,
}

/// Parse `sdr type temperature` output. Lines are pipe-delimited with five
/// fields; the fifth is e.g. "45 degrees C". Lines without the unit marker
/// are skipped.
pub fn parse_temperatures(output: &str) -> Vec<TemperatureReading> {
    output
        .lines()
        .filter(|line| line.contains("degrees"))
        .filter_map(parse_temperature_line)
        .collect()
}

fn parse_temperature_line(line: &str) -> Option<TemperatureReading> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.len() != 5 {
        return None;
    }
    let (degrees, units) = parts[4].split_once("degrees")?;
    Some(TemperatureReading {
        sensor: parts[0].to_string(),
        identifier: parts[1].to_string(),
        status: parts[2].to_string(),
        degrees: degrees.trim().parse().unwrap_or(f64::NAN),
        units: units.trim().to_string(),
    })
}

/// Parse `sdr type Fan` output, filtered on lines carrying an RPM value.
pub fn parse_fans(output: &str) -> Vec<FanReading> {
    output
        .lines()
        .filter(|line| line.contains("RPM"))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            if parts.len() != 5 {
                return None;
            }
            let (rpm, _) = parts[4].split_once("RPM")?;
            Some(FanReading {
                sensor: parts[0].to_string(),
                identifier: parts[1].to_string(),
                status: parts[2].to_string(),
                rpm: rpm.trim().parse().unwrap_or(f64::NAN),
                units: "RPM".to_string(),
            })
        })
        .collect()
}

/// Parse `sdr type "Power Supply"` output. A missing value field defaults
/// to the empty string.
pub fn parse_power_supplies(output: &str) -> Vec<PowerSupplyReading> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            if parts.len() < 4 {
                return None;
            }
            Some(PowerSupplyReading {
                sensor: parts[0].to_string(),
                identifier: parts[1].to_string(),
                status: parts[2].to_string(),
                value: parts.get(3).copied().unwrap_or("").to_string(),
            })
        })
        .collect()
}

/// Parse `sensor list` output. Trailing fields default to "N/A" / "" / "ok".
pub fn parse_sensors(output: &str) -> Vec<SensorReading> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            if parts.len() < 3 {
                return None;
            }
            Some(SensorReading {
                sensor: parts[0].to_string(),
                value: non_empty_or(parts.get(1), "N/A"),
                units: non_empty_or(parts.get(2), ""),
                status: non_empty_or(parts.get(3), "ok"),
            })
        })
        .collect()
}

fn non_empty_or(part: Option<&&str>, default: &str) -> String {
    match part {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => default.to_string(),
    }
}

fn watts(re: &Regex, output: &str) -> u32 {
    re.captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse `dcmi power reading` output. Absent labels decode to 0; BMCs omit
/// fields depending on sampling state, so this is a default, not an error.
pub fn parse_power_consumption(output: &str) -> PowerConsumption {
    static CURRENT: OnceLock<Regex> = OnceLock::new();
    static MINIMUM: OnceLock<Regex> = OnceLock::new();
    static MAXIMUM: OnceLock<Regex> = OnceLock::new();
    static AVERAGE: OnceLock<Regex> = OnceLock::new();

    let current =
        CURRENT.get_or_init(|| Regex::new(r"Current Power\s+:\s+(\d+)\s+Watts").unwrap());
    let minimum = MINIMUM.get_or_init(|| {
        Regex::new(r"Minimum Power over sampling duration\s+:\s+(\d+)\s+Watts").unwrap()
    });
    let maximum = MAXIMUM.get_or_init(|| {
        Regex::new(r"Maximum Power over sampling duration\s+:\s+(\d+)\s+Watts").unwrap()
    });
    let average = AVERAGE.get_or_init(|| {
        Regex::new(r"Average Power over sampling duration\s+:\s+(\d+)\s+Watts").unwrap()
    });

    PowerConsumption {
        current_watts: watts(current, output),
        minimum_watts: watts(minimum, output),
        maximum_watts: watts(maximum, output),
        average_watts: watts(average, output),
    }
}

/// Parse `chassis status` output. The boolean flags are exact substring
/// matches against the fixed label:value strings the firmware prints; any
/// whitespace deviation yields a false negative. That brittleness is the
/// wire contract for the modeled hardware family.
pub fn parse_chassis_status(output: &str) -> ChassisStatus {
    ChassisStatus {
        power_on: output.contains("System Power         : on"),
        power_overload: output.contains("Power Overload       : true"),
        power_interlock: output.contains("Power Interlock      : active"),
        power_fault: output.contains("Main Power Fault     : true"),
        power_control_fault: output.contains("Power Control Fault  : true"),
        last_power_event: extract_labeled_value(output, "Last Power Event"),
        chassis_intrusion: extract_labeled_value(output, "Chassis Intrusion"),
    }
}

/// Pull the free-text value after `<label> :` out of a chassis status blob,
/// defaulting to "unknown" when the label is absent.
fn extract_labeled_value(output: &str, label: &str) -> String {
    static LAST_POWER_EVENT: OnceLock<Regex> = OnceLock::new();
    static CHASSIS_INTRUSION: OnceLock<Regex> = OnceLock::new();

    let re = match label {
        "Last Power Event" => LAST_POWER_EVENT
            .get_or_init(|| Regex::new(r"Last Power Event\s*:\s*(.+)").unwrap()),
        "Chassis Intrusion" => CHASSIS_INTRUSION
            .get_or_init(|| Regex::new(r"Chassis Intrusion\s*:\s*(.+)").unwrap()),
        _ => return "unknown".to_string(),
    };

    re.captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_line_parses_to_typed_reading() {
        let readings = parse_temperatures("Temp | 0Eh | ok | 1 | 45 degrees C");
        assert_eq!(
            readings,
            vec![TemperatureReading {
                sensor: "Temp".to_string(),
                identifier: "0Eh".to_string(),
                status: "ok".to_string(),
                degrees: 45.0,
                units: "C".to_string(),
            }]
        );
    }

    #[test]
    fn temperature_lines_without_unit_marker_are_skipped() {
        let output = "Inlet Temp | 04h | ok | 7.1 | 24 degrees C\n\
                      Fan1 | 30h | ok | 7.1 | 5880 RPM\n\
                      \n\
                      Temp | 0Fh | ok | 3.2 | 38 degrees C";
        let readings = parse_temperatures(output);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].sensor, "Inlet Temp");
        assert_eq!(readings[1].degrees, 38.0);
    }

    #[test]
    fn malformed_degrees_field_parses_to_nan() {
        let readings = parse_temperatures("Temp | 0Eh | ns | 1 | no reading degrees C");
        assert_eq!(readings.len(), 1);
        assert!(readings[0].degrees.is_nan());
    }

    #[test]
    fn ragged_temperature_lines_are_dropped() {
        let readings = parse_temperatures("Temp | 0Eh | 45 degrees C");
        assert!(readings.is_empty());
    }

    #[test]
    fn fan_lines_parse_rpm() {
        let output = "Fan1 | 30h | ok | 7.1 | 5880 RPM\nFan2 | 31h | ok | 7.1 | 5640 RPM";
        let fans = parse_fans(output);
        assert_eq!(fans.len(), 2);
        assert_eq!(fans[0].rpm, 5880.0);
        assert_eq!(fans[1].units, "RPM");
    }

    #[test]
    fn power_supply_missing_value_defaults_to_empty() {
        let supplies = parse_power_supplies("PS Redundancy | 77h | ok |  | \nVoltage 1 | 6ah");
        assert_eq!(supplies.len(), 1);
        assert_eq!(supplies[0].sensor, "PS Redundancy");
        assert_eq!(supplies[0].value, "");
    }

    #[test]
    fn sensor_list_fills_trailing_defaults() {
        let sensors = parse_sensors("Ambient Temp | 24.000 | degrees C | ok\nIntrusion |  | ");
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].value, "24.000");
        assert_eq!(sensors[1].value, "N/A");
        assert_eq!(sensors[1].status, "ok");
    }

    #[test]
    fn power_consumption_extracts_all_labels() {
        let output = "\
    Instantaneous power reading:                    77 Watts
    Current Power                        :          77 Watts
    Minimum Power over sampling duration :          66 Watts
    Maximum Power over sampling duration :         188 Watts
    Average Power over sampling duration :          79 Watts";
        let power = parse_power_consumption(output);
        assert_eq!(
            power,
            PowerConsumption {
                current_watts: 77,
                minimum_watts: 66,
                maximum_watts: 188,
                average_watts: 79,
            }
        );
    }

    #[test]
    fn power_consumption_defaults_missing_labels_to_zero() {
        let power = parse_power_consumption("Current Power                        : 91 Watts");
        assert_eq!(power.current_watts, 91);
        assert_eq!(power.minimum_watts, 0);
        assert_eq!(power.maximum_watts, 0);
        assert_eq!(power.average_watts, 0);
    }

    #[test]
    fn chassis_status_flags_require_exact_labels() {
        let output = "\
System Power         : on
Power Overload       : false
Power Interlock      : inactive
Main Power Fault     : false
Power Control Fault  : false
Last Power Event     : command
Chassis Intrusion    : inactive";
        let status = parse_chassis_status(output);
        assert!(status.power_on);
        assert!(!status.power_overload);
        assert!(!status.power_fault);
        assert_eq!(status.last_power_event, "command");
        assert_eq!(status.chassis_intrusion, "inactive");
    }

    #[test]
    fn chassis_free_text_defaults_to_unknown() {
        let status = parse_chassis_status("System Power         : off");
        assert!(!status.power_on);
        assert_eq!(status.last_power_event, "unknown");
        assert_eq!(status.chassis_intrusion, "unknown");
    }
}
