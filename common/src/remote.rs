use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recipe::Preset;

/// Commands delivered over the remote feed. Distinct from [`crate::Phase`];
/// the numeric codes are only a wire detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCommand {
    VolumeDown,
    VolumeUp,
    Sleep,
    Cook(Preset),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteCommandError {
    #[error("remote payload is not a command code: '{0}'")]
    Malformed(String),
    #[error("unknown remote command code {0}")]
    UnknownCode(i64),
}

impl RemoteCommand {
    pub fn from_code(code: i64) -> Result<Self, RemoteCommandError> {
        let command = match code {
            0 => Self::VolumeDown,
            2 => Self::VolumeUp,
            6 => Self::Sleep,
            16 => Self::Cook(Preset::Lasagna),
            17 => Self::Cook(Preset::BakedChicken),
            18 => Self::Cook(Preset::MacAndCheese),
            20 => Self::Cook(Preset::SalisburySteak),
            21 => Self::Cook(Preset::RoastedTurkey),
            other => return Err(RemoteCommandError::UnknownCode(other)),
        };
        Ok(command)
    }

    pub fn code(self) -> i64 {
        match self {
            Self::VolumeDown => 0,
            Self::VolumeUp => 2,
            Self::Sleep => 6,
            Self::Cook(Preset::Lasagna) => 16,
            Self::Cook(Preset::BakedChicken) => 17,
            Self::Cook(Preset::MacAndCheese) => 18,
            Self::Cook(Preset::SalisburySteak) => 20,
            Self::Cook(Preset::RoastedTurkey) => 21,
        }
    }

    /// Parse a feed payload. Dashboards send the code as text, sometimes as a
    /// float (`"16.0"`).
    pub fn parse_payload(payload: &str) -> Result<Self, RemoteCommandError> {
        let trimmed = payload.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }

        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() && value.fract() == 0.0 => Self::from_code(value as i64),
            _ => Err(RemoteCommandError::Malformed(trimmed.to_string())),
        }
    }

    pub fn is_safety_override(self) -> bool {
        self == Self::Sleep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_codes_to_commands() {
        assert_eq!(RemoteCommand::from_code(0), Ok(RemoteCommand::VolumeDown));
        assert_eq!(RemoteCommand::from_code(2), Ok(RemoteCommand::VolumeUp));
        assert_eq!(RemoteCommand::from_code(6), Ok(RemoteCommand::Sleep));
        assert_eq!(
            RemoteCommand::from_code(16),
            Ok(RemoteCommand::Cook(Preset::Lasagna))
        );
        assert_eq!(
            RemoteCommand::from_code(21),
            Ok(RemoteCommand::Cook(Preset::RoastedTurkey))
        );
        assert_eq!(
            RemoteCommand::from_code(19),
            Err(RemoteCommandError::UnknownCode(19))
        );
    }

    #[test]
    fn codes_are_stable_both_ways() {
        for code in [0, 2, 6, 16, 17, 18, 20, 21] {
            assert_eq!(RemoteCommand::from_code(code).unwrap().code(), code);
        }
    }

    #[test]
    fn parses_text_payloads() {
        assert_eq!(
            RemoteCommand::parse_payload(" 17\n"),
            Ok(RemoteCommand::Cook(Preset::BakedChicken))
        );
        assert_eq!(
            RemoteCommand::parse_payload("6.0"),
            Ok(RemoteCommand::Sleep)
        );
        assert!(matches!(
            RemoteCommand::parse_payload("lasagna"),
            Err(RemoteCommandError::Malformed(_))
        ));
        assert!(matches!(
            RemoteCommand::parse_payload("16.5"),
            Err(RemoteCommandError::Malformed(_))
        ));
    }
}
