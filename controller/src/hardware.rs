//! Host stand-ins for the oven's peripherals.
//!
//! On the appliance these wrap the relay GPIO, the MAX6675 thermocouple, the
//! hall-effect door sensor, the PN532 card reader, the WS2812 strip and the
//! DFPlayer. Here they are simple models so the controller can run end to end.

use std::time::Duration;

use cooker_common::{
    card::{
        self, Block, CardError, CardFormat, RecipeCardReader, NAME_BLOCK, TEMP_BLOCK, TIME_BLOCK,
    },
    types::fahrenheit_to_celsius,
    AudioClip, Color, CookRecipe, ThermocoupleReading,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct ThermalModel {
    pub ambient_f: f32,
    /// Equilibrium temperature with the element on and the door shut.
    pub element_ceiling_f: f32,
    pub time_constant_s: f32,
    pub door_open_time_constant_s: f32,
}

impl Default for ThermalModel {
    fn default() -> Self {
        Self {
            ambient_f: 70.0,
            element_ceiling_f: 650.0,
            time_constant_s: 300.0,
            door_open_time_constant_s: 60.0,
        }
    }
}

/// First-order oven cavity: relay in, thermocouple and door latch out.
#[derive(Debug)]
pub struct SimulatedOven {
    model: ThermalModel,
    temp_f: f32,
    relay_on: bool,
    door_open: bool,
    fault_injected: bool,
    last_update_ms: Option<u64>,
}

impl SimulatedOven {
    pub fn new(model: ThermalModel) -> Self {
        Self {
            temp_f: model.ambient_f,
            model,
            relay_on: false,
            door_open: false,
            fault_injected: false,
            last_update_ms: None,
        }
    }

    pub fn set_relay(&mut self, on: bool) {
        self.relay_on = on;
    }

    pub fn set_door(&mut self, open: bool) {
        self.door_open = open;
    }

    pub fn door_open(&self) -> bool {
        self.door_open
    }

    pub fn inject_fault(&mut self, fault: bool) {
        self.fault_injected = fault;
    }

    pub fn advance(&mut self, now_ms: u64) {
        let Some(last) = self.last_update_ms.replace(now_ms) else {
            return;
        };
        let dt_s = now_ms.saturating_sub(last) as f32 / 1_000.0;
        if dt_s <= 0.0 {
            return;
        }

        let mut equilibrium = if self.relay_on {
            self.model.element_ceiling_f
        } else {
            self.model.ambient_f
        };
        let time_constant = if self.door_open {
            equilibrium = (equilibrium + self.model.ambient_f) / 2.0;
            self.model.door_open_time_constant_s
        } else {
            self.model.time_constant_s
        };

        let alpha = 1.0 - (-dt_s / time_constant).exp();
        self.temp_f += (equilibrium - self.temp_f) * alpha;
    }

    /// MAX6675-style read: quarter-degree Celsius resolution.
    pub fn read_thermocouple(&self) -> ThermocoupleReading {
        if self.fault_injected {
            return ThermocoupleReading::fault();
        }
        let celsius = fahrenheit_to_celsius(self.temp_f);
        ThermocoupleReading::ok((celsius * 4.0).round() / 4.0)
    }
}

/// A single card that is read once per tap.
#[derive(Debug, Default)]
pub struct SimulatedCardSlot {
    card: Option<[Block; 3]>,
    tapped: bool,
    failing_block: Option<u8>,
}

impl SimulatedCardSlot {
    pub fn tap(&mut self, blocks: [Block; 3], failing_block: Option<u8>) {
        self.card = Some(blocks);
        self.failing_block = failing_block;
        self.tapped = true;
    }

    /// Hold a blank card against the reader, write `recipe`, and take it away.
    pub fn provision(
        &mut self,
        recipe: &CookRecipe,
        format: CardFormat,
    ) -> Result<[Block; 3], CardError> {
        self.card = Some([[0; card::BLOCK_SIZE]; 3]);
        self.failing_block = None;
        self.tapped = true;

        let written = card::write_recipe(self, recipe, format);
        self.tapped = false;
        let blocks = self.card.take();

        match (written, blocks) {
            (Ok(true), Some(blocks)) => Ok(blocks),
            (Err(err), _) => Err(err),
            _ => Err(CardError::BlockWrite(NAME_BLOCK)),
        }
    }

    fn slot(block: u8) -> Option<usize> {
        match block {
            NAME_BLOCK => Some(0),
            TEMP_BLOCK => Some(1),
            TIME_BLOCK => Some(2),
            _ => None,
        }
    }
}

impl RecipeCardReader for SimulatedCardSlot {
    fn scan(&mut self) -> bool {
        std::mem::take(&mut self.tapped) && self.card.is_some()
    }

    fn read_block(&mut self, block: u8) -> Result<Block, CardError> {
        if self.failing_block == Some(block) {
            return Err(CardError::BlockRead(block));
        }
        let index = Self::slot(block).ok_or(CardError::BlockRead(block))?;
        self.card
            .as_ref()
            .map(|blocks| blocks[index])
            .ok_or(CardError::BlockRead(block))
    }

    fn write_block(&mut self, block: u8, data: &Block) -> Result<(), CardError> {
        let index = Self::slot(block).ok_or(CardError::BlockWrite(block))?;
        let blocks = self.card.as_mut().ok_or(CardError::BlockWrite(block))?;
        blocks[index] = *data;
        Ok(())
    }
}

#[derive(Debug)]
pub struct LedStrip {
    pixels: Vec<u32>,
    brightness: u8,
    blinking: bool,
}

impl LedStrip {
    pub fn new(pixel_count: u16, brightness: u8) -> Self {
        Self {
            pixels: vec![0; pixel_count as usize],
            brightness,
            blinking: false,
        }
    }

    pub fn fill(&mut self, start: u16, end: u16, color: Color) {
        let end = (end as usize).min(self.pixels.len());
        let start = (start as usize).min(end);
        for pixel in &mut self.pixels[start..end] {
            *pixel = color.hex();
        }
        self.blinking = color.blinks();
        debug!(
            "led strip {start}..{end} = #{:06X} (brightness {}, blinking {})",
            color.hex(),
            self.brightness,
            self.blinking
        );
    }
}

/// DFPlayer stand-in. Clips play on their own task so the control loop keeps
/// ticking while audio runs.
#[derive(Debug)]
pub struct AudioPlayer {
    volume: u8,
    clip_length: Duration,
}

impl AudioPlayer {
    pub fn new(volume: u8) -> Self {
        Self {
            volume,
            clip_length: Duration::from_secs(6),
        }
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
        info!("audio volume set to {volume}");
    }

    pub fn play(&self, clip: AudioClip) {
        let volume = self.volume;
        let length = self.clip_length;
        tokio::spawn(async move {
            info!("playing clip {clip:?} (track {}) at volume {volume}", clip.track());
            tokio::time::sleep(length).await;
            debug!("clip {clip:?} finished");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oven_heats_with_relay_and_cools_without() {
        let mut oven = SimulatedOven::new(ThermalModel::default());
        oven.advance(0);
        oven.set_relay(true);
        oven.advance(300_000);
        let hot = oven.read_thermocouple().fahrenheit();
        assert!(hot > 350.0 && hot < 650.0, "{hot}");

        oven.set_relay(false);
        oven.advance(1_200_000);
        assert!(oven.read_thermocouple().fahrenheit() < hot);
    }

    #[test]
    fn injected_fault_reads_as_fault() {
        let mut oven = SimulatedOven::new(ThermalModel::default());
        oven.inject_fault(true);
        assert_eq!(
            oven.read_thermocouple().status,
            cooker_common::SensorStatus::Fault
        );
    }

    #[test]
    fn tapped_card_is_read_once() {
        let recipe = CookRecipe::new("Pizza", 425, 12 * 60_000);
        let (name, temp, time) = card::encode_recipe(&recipe, CardFormat::default()).unwrap();
        let mut slot = SimulatedCardSlot::default();
        slot.tap([name, temp, time], None);

        assert_eq!(
            card::read_recipe(&mut slot, CardFormat::default()),
            Ok(Some(recipe))
        );
        assert_eq!(card::read_recipe(&mut slot, CardFormat::default()), Ok(None));
    }

    #[test]
    fn provisioned_card_decodes() {
        let recipe = CookRecipe::new("Roasted Turkey", 350, 35 * 60_000);
        let mut slot = SimulatedCardSlot::default();
        let blocks = slot.provision(&recipe, CardFormat::default()).unwrap();

        let decoded =
            card::decode_recipe(&blocks[0], &blocks[1], &blocks[2], CardFormat::default()).unwrap();
        assert_eq!(decoded, recipe);

        // Provisioning does not leave a tapped card behind.
        assert!(!slot.scan());
    }
}
