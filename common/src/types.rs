use serde::{Deserialize, Serialize};

use crate::recipe::CookRecipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    ShuttingDown,
    Heating,
    AwaitingLoad,
    Cooking,
    Cooling,
    AwaitingUnload,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Heating => "HEATING",
            Self::AwaitingLoad => "AWAITING_LOAD",
            Self::Cooking => "COOKING",
            Self::Cooling => "COOLING",
            Self::AwaitingUnload => "AWAITING_UNLOAD",
        }
    }

    /// Phases in which the thermostat drives the relay.
    pub fn is_regulating(self) -> bool {
        matches!(self, Self::Heating | Self::AwaitingLoad | Self::Cooking)
    }

    /// Phases that require an active recipe.
    pub fn requires_recipe(self) -> bool {
        !matches!(self, Self::Idle | Self::ShuttingDown)
    }

    pub fn light_color(self) -> Color {
        match self {
            Self::Idle => Color::Green,
            Self::ShuttingDown => Color::Blue,
            Self::Heating => Color::Yellow,
            Self::AwaitingLoad => Color::Orange,
            Self::Cooking => Color::Red,
            Self::Cooling => Color::Indigo,
            Self::AwaitingUnload => Color::Violet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayCommand {
    Energize,
    DeEnergize,
}

impl RelayCommand {
    pub fn is_energized(self) -> bool {
        self == Self::Energize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Blue,
    Purple,
    Yellow,
    Orange,
    Red,
    Indigo,
    Violet,
}

impl Color {
    pub fn hex(self) -> u32 {
        match self {
            Self::Green => 0x00FF00,
            Self::Blue => 0x0000FF,
            Self::Purple => 0x800080,
            Self::Yellow => 0xFFFF00,
            Self::Orange => 0xFFA500,
            Self::Red => 0xFF0000,
            Self::Indigo => 0x4B0082,
            Self::Violet => 0xEE82EE,
        }
    }

    /// Calm colours stay steady; everything else blinks to draw attention.
    pub fn blinks(self) -> bool {
        !matches!(self, Self::Blue | Self::Green | Self::Purple)
    }
}

/// Audio clips stored on the player's SD card, numbered by track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioClip {
    SystemOff,
    SystemReady,
    PutFoodIn,
    TakeFoodOut,
    CardError,
}

impl AudioClip {
    pub fn track(self) -> u16 {
        match self {
            Self::SystemOff => 1,
            Self::SystemReady => 2,
            Self::PutFoodIn => 3,
            Self::TakeFoodOut => 4,
            Self::CardError => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorStatus {
    Ok,
    Fault,
}

/// One raw thermocouple sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermocoupleReading {
    pub status: SensorStatus,
    pub celsius: f32,
}

impl ThermocoupleReading {
    pub fn ok(celsius: f32) -> Self {
        Self {
            status: SensorStatus::Ok,
            celsius,
        }
    }

    pub fn fault() -> Self {
        Self {
            status: SensorStatus::Fault,
            celsius: f32::NAN,
        }
    }

    pub fn fahrenheit(&self) -> f32 {
        celsius_to_fahrenheit(self.celsius)
    }
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WakeReason {
    /// Card reader IRQ or on/off button edge.
    Gpio,
    /// Remote command arrived over the telemetry feed.
    Network,
    Timeout,
}

impl WakeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpio => "GPIO",
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub phase: &'static str,
    pub recipe: Option<CookRecipe>,
    #[serde(rename = "currentTemp")]
    pub current_temp_f: Option<f32>,
    #[serde(rename = "targetTemp")]
    pub target_temp_f: Option<i32>,
    #[serde(rename = "relayOn")]
    pub relay_on: bool,
    #[serde(rename = "sensorOk")]
    pub sensor_ok: bool,
    #[serde(rename = "sensorFaults")]
    pub consecutive_sensor_faults: u32,
    pub reminders: u8,
    #[serde(rename = "maxReminders")]
    pub max_reminders: u8,
    #[serde(rename = "cookRemainingMs")]
    pub cook_remaining_ms: u64,
    #[serde(rename = "coolRemainingMs")]
    pub cool_remaining_ms: u64,
    #[serde(rename = "waitRemainingMs")]
    pub wait_remaining_ms: u64,
    pub volume: u8,
    #[serde(rename = "lastShutdown")]
    pub last_shutdown: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatePayload {
    pub phase: &'static str,
    pub recipe: Option<String>,
    pub temp: Option<f32>,
    pub target: Option<i32>,
    pub relay: bool,
    pub reminders: u8,
    #[serde(rename = "cookRemainingMin")]
    pub cook_remaining_min: u64,
}
