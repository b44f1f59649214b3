//! Typed IPMI client: telemetry reads and fan actuation over a transport.
//! Command vocabulary targets the Dell iDRAC raw dialect.

use tracing::info;

use crate::ipmi::parser::{
    self, ChassisStatus, FanReading, PowerConsumption, PowerSupplyReading, SensorReading,
    TemperatureReading,
};
use crate::ipmi::transport::IpmiTransport;
use crate::ipmi::IpmiError;

pub struct IpmiClient<T: IpmiTransport> {
    transport: T,
}

impl<T: IpmiTransport> IpmiClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn get_temperatures(&self) -> Result<Vec<TemperatureReading>, IpmiError> {
        let output = self.transport.execute(&["sdr", "type", "temperature"]).await?;
        Ok(parser::parse_temperatures(&output))
    }

    pub async fn get_fan_speeds(&self) -> Result<Vec<FanReading>, IpmiError> {
        let output = self.transport.execute(&["sdr", "type", "Fan"]).await?;
        Ok(parser::parse_fans(&output))
    }

    pub async fn get_power_supplies(&self) -> Result<Vec<PowerSupplyReading>, IpmiError> {
        let output = self
            .transport
            .execute(&["sdr", "type", "Power Supply"])
            .await?;
        Ok(parser::parse_power_supplies(&output))
    }

    pub async fn get_power_consumption(&self) -> Result<PowerConsumption, IpmiError> {
        let output = self.transport.execute(&["dcmi", "power", "reading"]).await?;
        Ok(parser::parse_power_consumption(&output))
    }

    pub async fn get_chassis_status(&self) -> Result<ChassisStatus, IpmiError> {
        let output = self.transport.execute(&["chassis", "status"]).await?;
        Ok(parser::parse_chassis_status(&output))
    }

    pub async fn get_all_sensors(&self) -> Result<Vec<SensorReading>, IpmiError> {
        let output = self.transport.execute(&["sensor", "list"]).await?;
        Ok(parser::parse_sensors(&output))
    }

    /// Tail of the system event log, raw text.
    pub async fn get_system_event_log(&self, lines: u32) -> Result<String, IpmiError> {
        self.transport
            .execute(&["sel", "list", "last", &lines.to_string()])
            .await
    }

    pub async fn clear_system_event_log(&self) -> Result<(), IpmiError> {
        info!("clearing system event log");
        self.transport.execute(&["sel", "clear"]).await?;
        Ok(())
    }

    /// Switch fan control between firmware-automatic and manual override.
    /// Manual overrides are ignored until the BMC is in manual mode.
    pub async fn set_fan_control(&self, automatic: bool) -> Result<(), IpmiError> {
        let mode = if automatic { "0x01" } else { "0x00" };
        info!(
            "setting fan control to {}",
            if automatic { "automatic" } else { "manual" }
        );
        self.transport
            .execute(&["raw", "0x30", "0x30", "0x01", mode])
            .await?;
        Ok(())
    }

    /// Set all fans to a fixed percentage, encoded as a two-digit hex byte.
    /// Values outside 0-100 are rejected before any command is issued.
    pub async fn set_fan_speed(&self, percent: i64) -> Result<(), IpmiError> {
        if !(0..=100).contains(&percent) {
            return Err(IpmiError::InvalidFanSpeed(percent));
        }

        let encoded = format!("0x{:02x}", percent);
        info!("setting fan speed to {}%", percent);
        self.transport
            .execute(&["raw", "0x30", "0x30", "0x02", "0xff", &encoded])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipmi::transport::testing::ScriptedTransport;

    #[tokio::test]
    async fn set_fan_speed_encodes_percent_as_hex_byte() {
        let transport = std::sync::Arc::new(ScriptedTransport::new());
        let client = IpmiClient::new(transport.clone());

        client.set_fan_speed(50).await.unwrap();

        assert_eq!(
            transport.recorded_calls(),
            vec!["raw 0x30 0x30 0x02 0xff 0x32".to_string()]
        );
    }

    #[tokio::test]
    async fn out_of_range_fan_speed_issues_no_command() {
        let transport = std::sync::Arc::new(ScriptedTransport::new());
        let client = IpmiClient::new(transport.clone());

        for percent in [101, -1] {
            let err = client.set_fan_speed(percent).await.unwrap_err();
            assert!(matches!(err, IpmiError::InvalidFanSpeed(p) if p == percent));
        }

        assert!(transport.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn fan_control_toggle_selects_mode_byte() {
        let transport = std::sync::Arc::new(ScriptedTransport::new());
        let client = IpmiClient::new(transport.clone());

        client.set_fan_control(false).await.unwrap();
        client.set_fan_control(true).await.unwrap();

        assert_eq!(
            transport.recorded_calls(),
            vec![
                "raw 0x30 0x30 0x01 0x00".to_string(),
                "raw 0x30 0x30 0x01 0x01".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn temperature_read_goes_through_sdr() {
        let transport = std::sync::Arc::new(
            ScriptedTransport::new()
                .respond("sdr type temperature", "Temp | 0Eh | ok | 1 | 45 degrees C"),
        );
        let client = IpmiClient::new(transport.clone());

        let readings = client.get_temperatures().await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].degrees, 45.0);
        assert_eq!(
            transport.recorded_calls(),
            vec!["sdr type temperature".to_string()]
        );
    }
}
