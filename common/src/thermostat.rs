use serde::{Deserialize, Serialize};

use crate::types::RelayCommand;

/// How the band edges compare against the current temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdComparison {
    /// Cut off above `target + offset`, call for heat below `target - offset`.
    Strict,
    /// Same band, but the edges themselves also switch the relay.
    Inclusive,
}

/// Bang-bang regulator with a symmetric dead band around the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thermostat {
    offset_f: f32,
    comparison: ThresholdComparison,
}

impl Thermostat {
    pub fn new(offset_f: f32, comparison: ThresholdComparison) -> Self {
        Self {
            offset_f: offset_f.abs(),
            comparison,
        }
    }

    /// Inside the band the prior command is held so the relay does not chatter.
    pub fn command(&self, current_f: f32, target_f: f32, prior: RelayCommand) -> RelayCommand {
        let upper = target_f + self.offset_f;
        let lower = target_f - self.offset_f;

        let (too_hot, too_cold) = match self.comparison {
            ThresholdComparison::Strict => (current_f > upper, current_f < lower),
            ThresholdComparison::Inclusive => (current_f >= upper, current_f <= lower),
        };

        if too_hot {
            RelayCommand::DeEnergize
        } else if too_cold {
            RelayCommand::Energize
        } else {
            prior
        }
    }
}
