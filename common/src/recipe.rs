use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookRecipe {
    pub name: String,
    #[serde(rename = "targetTemp")]
    pub target_temp_f: i32,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

impl CookRecipe {
    pub fn new(name: impl Into<String>, target_temp_f: i32, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            target_temp_f,
            duration_ms,
        }
    }
}

/// Recipes that can be started remotely without a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Lasagna,
    BakedChicken,
    MacAndCheese,
    SalisburySteak,
    RoastedTurkey,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Self::Lasagna,
        Self::BakedChicken,
        Self::MacAndCheese,
        Self::SalisburySteak,
        Self::RoastedTurkey,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Lasagna => "Lasagna",
            Self::BakedChicken => "Baked Chicken",
            Self::MacAndCheese => "Mac & Cheese",
            Self::SalisburySteak => "Salisbury Steak and Mac & Cheese",
            Self::RoastedTurkey => "Roasted Turkey",
        }
    }

    pub fn target_temp_f(self) -> i32 {
        match self {
            Self::Lasagna => 375,
            _ => 350,
        }
    }

    pub fn duration_min(self) -> u64 {
        match self {
            Self::Lasagna => 40,
            Self::BakedChicken | Self::MacAndCheese => 36,
            Self::SalisburySteak | Self::RoastedTurkey => 35,
        }
    }

    pub fn recipe(self) -> CookRecipe {
        CookRecipe::new(self.name(), self.target_temp_f(), self.duration_min() * 60_000)
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        let normalized = slug.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "lasagna" => Some(Self::Lasagna),
            "baked_chicken" | "chicken" => Some(Self::BakedChicken),
            "mac_and_cheese" | "mac_cheese" | "mac_&_cheese" => Some(Self::MacAndCheese),
            "salisbury_steak" | "steak" => Some(Self::SalisburySteak),
            "roasted_turkey" | "turkey" => Some(Self::RoastedTurkey),
            _ => None,
        }
    }
}
