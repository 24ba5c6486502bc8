pub mod card;
pub mod config;
pub mod engine;
pub mod recipe;
pub mod reminder;
pub mod remote;
pub mod thermostat;
pub mod timer;
pub mod topics;
pub mod types;

pub use card::{CardError, CardFormat, RecipeCardReader};
pub use config::{
    CookerConfig, LightConfig, NetworkConfig, PersistedSettings, RuntimeConfig, MAX_VOLUME,
    MIN_VOLUME,
};
pub use engine::{CookCycleEngine, EngineAction, ShutdownReason, TickInput};
pub use recipe::{CookRecipe, Preset};
pub use remote::{RemoteCommand, RemoteCommandError};
pub use thermostat::{Thermostat, ThresholdComparison};
pub use topics::*;
pub use types::{
    AudioClip, Color, ControllerStatePayload, ControllerStatus, Phase, RelayCommand,
    SensorStatus, ThermocoupleReading, WakeReason,
};
