use serde::{Deserialize, Serialize};

use crate::{card::CardFormat, thermostat::ThresholdComparison};

pub const MIN_VOLUME: u8 = 0;
pub const MAX_VOLUME: u8 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookerConfig {
    pub tick_interval_ms: u64,
    pub state_publish_interval_ms: u64,
    pub hysteresis_f: f32,
    pub comparison: ThresholdComparison,
    pub reminder_interval_ms: u64,
    pub max_reminders: u8,
    pub cooling_allowance_ms: u64,
    pub card_time_unit_ms: u64,
    pub card_temp_calibration_f: i32,
    pub absolute_max_temp_f: f32,
    pub min_valid_temp_f: f32,
    pub max_valid_temp_f: f32,
    pub max_consecutive_sensor_faults: u32,
    pub sleep_enabled: bool,
    pub sleep_timeout_ms: u64,
}

impl Default for CookerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            state_publish_interval_ms: 10_000,
            hysteresis_f: 10.0,
            comparison: ThresholdComparison::Strict,
            reminder_interval_ms: 20_000,
            max_reminders: 3,
            cooling_allowance_ms: 900_000,
            card_time_unit_ms: 60_000,
            card_temp_calibration_f: 0,
            absolute_max_temp_f: 550.0,
            min_valid_temp_f: -40.0,
            max_valid_temp_f: 1_000.0,
            max_consecutive_sensor_faults: 10,
            sleep_enabled: true,
            sleep_timeout_ms: 7_200_000,
        }
    }
}

impl CookerConfig {
    pub fn card_format(&self) -> CardFormat {
        CardFormat {
            time_unit_ms: self.card_time_unit_ms,
            temp_calibration_f: self.card_temp_calibration_f,
            temp_ceiling_f: self.absolute_max_temp_f as i32,
        }
    }

    pub fn sanitize(&mut self) {
        self.tick_interval_ms = self.tick_interval_ms.clamp(100, 60_000);
        self.state_publish_interval_ms = self.state_publish_interval_ms.max(self.tick_interval_ms);
        if !self.hysteresis_f.is_finite() {
            self.hysteresis_f = 10.0;
        }
        self.hysteresis_f = self.hysteresis_f.clamp(0.0, 25.0);
        if !self.absolute_max_temp_f.is_finite() {
            self.absolute_max_temp_f = 550.0;
        }
        self.absolute_max_temp_f = self.absolute_max_temp_f.clamp(100.0, 1_000.0);
        self.reminder_interval_ms = self.reminder_interval_ms.max(1_000);
        self.max_reminders = self.max_reminders.clamp(1, 10);
        self.card_time_unit_ms = self.card_time_unit_ms.max(1);
        self.card_temp_calibration_f = self.card_temp_calibration_f.clamp(-50, 50);
        self.max_consecutive_sensor_faults = self.max_consecutive_sensor_faults.max(1);
        self.sleep_timeout_ms = self.sleep_timeout_ms.max(1_000);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub volume: u8,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self { volume: 20 }
    }
}

impl PersistedSettings {
    pub fn sanitize(&mut self) {
        self.volume = self.volume.clamp(MIN_VOLUME, MAX_VOLUME);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "io.adafruit.com".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "smartcooker-controller".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LightConfig {
    pub pixel_count: u16,
    pub brightness: u8,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            pixel_count: 12,
            brightness: 35,
        }
    }
}

impl LightConfig {
    pub fn sanitize(&mut self) {
        if self.pixel_count == 0 {
            self.pixel_count = 12;
        }
        self.brightness = self.brightness.max(1);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub cooker: CookerConfig,
    #[serde(default)]
    pub settings: PersistedSettings,
    pub timezone: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub light: LightConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cooker: CookerConfig::default(),
            settings: PersistedSettings::default(),
            timezone: "America/New_York".to_string(),
            network: NetworkConfig::default(),
            light: LightConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_slice(raw)?;
        config.sanitize();
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn sanitize(&mut self) {
        self.cooker.sanitize();
        self.settings.sanitize();
        self.light.sanitize();
    }
}
