//! Fan curve evaluation.

use crate::ipmi::parser::TemperatureReading;
use crate::machine::types::FanCurvePoint;

/// Speed applied when no curve point qualifies.
pub const DEFAULT_BASELINE_SPEED: u8 = 20;

/// SDR sensor name of the CPU package temperature on the modeled hardware.
/// Inlet/exhaust sensors carry distinct names and never drive the curve.
pub const CPU_TEMP_SENSOR: &str = "Temp";

/// Evaluate a fan curve against the sampled maximum CPU temperature.
///
/// The curve is scanned in the order given and the last point whose
/// threshold is at or below the temperature wins. Callers supply curves
/// sorted ascending by threshold; unsorted input is tolerated but the
/// result then depends on the given order, not on the highest qualifying
/// threshold. `None` (no usable reading) and an empty curve both fall back
/// to `baseline`.
pub fn evaluate_fan_speed(max_temp: Option<f64>, curve: &[FanCurvePoint], baseline: u8) -> u8 {
    let Some(max_temp) = max_temp else {
        return baseline;
    };

    let mut target = baseline;
    for point in curve {
        if max_temp >= point.temperature {
            target = point.fan_speed;
        }
    }
    target
}

/// Maximum finite CPU temperature among the readings, ignoring non-CPU
/// sensors and NaN sentinels from malformed lines.
pub fn max_cpu_temperature(readings: &[TemperatureReading]) -> Option<f64> {
    readings
        .iter()
        .filter(|r| r.sensor == CPU_TEMP_SENSOR)
        .map(|r| r.degrees)
        .filter(|d| d.is_finite())
        .fold(None, |max, d| Some(max.map_or(d, |m: f64| m.max(d))))
}
