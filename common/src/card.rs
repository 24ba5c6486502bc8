//! NFC recipe cards.
//!
//! A card stores one recipe across three 16-byte data blocks, each holding
//! NUL-padded ASCII: the recipe name, the target temperature in °F, and the
//! cook time in card units (minutes unless configured otherwise).

use thiserror::Error;

use crate::recipe::CookRecipe;

pub const BLOCK_SIZE: usize = 16;
pub const NAME_BLOCK: u8 = 1;
pub const TEMP_BLOCK: u8 = 2;
pub const TIME_BLOCK: u8 = 4;

pub type Block = [u8; BLOCK_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    Name,
    Temperature,
    Time,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("block {0} read failure")]
    BlockRead(u8),
    #[error("block {0} write failure")]
    BlockWrite(u8),
    #[error("invalid {field:?} field: {reason}")]
    InvalidField { field: CardField, reason: String },
}

/// Reader/writer for the card hardware. Block I/O is blocking on real
/// hardware, so callers should keep it off latency-sensitive paths.
pub trait RecipeCardReader {
    /// True when a card is present in the field.
    fn scan(&mut self) -> bool;
    fn read_block(&mut self, block: u8) -> Result<Block, CardError>;
    fn write_block(&mut self, block: u8, data: &Block) -> Result<(), CardError>;
}

/// Decoding parameters for raw card contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardFormat {
    pub time_unit_ms: u64,
    pub temp_calibration_f: i32,
    /// Calibrated targets must stay below this; the oven cuts out at it.
    pub temp_ceiling_f: i32,
}

impl Default for CardFormat {
    fn default() -> Self {
        Self {
            time_unit_ms: 60_000,
            temp_calibration_f: 0,
            temp_ceiling_f: 550,
        }
    }
}

/// Scan for a card and read a recipe from it.
///
/// `Ok(None)` means no card was presented. Any block failure aborts the whole
/// read, so a partially read card never produces a recipe.
pub fn read_recipe<R: RecipeCardReader + ?Sized>(
    reader: &mut R,
    format: CardFormat,
) -> Result<Option<CookRecipe>, CardError> {
    if !reader.scan() {
        return Ok(None);
    }

    let name_block = reader.read_block(NAME_BLOCK)?;
    let temp_block = reader.read_block(TEMP_BLOCK)?;
    let time_block = reader.read_block(TIME_BLOCK)?;

    decode_recipe(&name_block, &temp_block, &time_block, format).map(Some)
}

pub fn decode_recipe(
    name_block: &Block,
    temp_block: &Block,
    time_block: &Block,
    format: CardFormat,
) -> Result<CookRecipe, CardError> {
    let name = block_text(name_block, CardField::Name)?;
    if name.is_empty() {
        return Err(invalid(CardField::Name, "empty"));
    }

    let raw_temp: i32 = parse_number(temp_block, CardField::Temperature)?;
    let target_temp_f = raw_temp
        .checked_add(format.temp_calibration_f)
        .ok_or_else(|| invalid(CardField::Temperature, "out of range"))?;
    if target_temp_f <= 0 {
        return Err(invalid(CardField::Temperature, "must be positive"));
    }
    if target_temp_f >= format.temp_ceiling_f {
        return Err(invalid(
            CardField::Temperature,
            &format!("{target_temp_f} F is at or above the {} F cut-off", format.temp_ceiling_f),
        ));
    }

    let raw_time: u64 = parse_number(time_block, CardField::Time)?;
    if raw_time == 0 {
        return Err(invalid(CardField::Time, "must be positive"));
    }

    Ok(CookRecipe::new(
        name,
        target_temp_f,
        raw_time.saturating_mul(format.time_unit_ms),
    ))
}

/// Encode a recipe into card blocks, the inverse of [`decode_recipe`] without
/// calibration. Durations are rounded down to whole card units.
pub fn encode_recipe(
    recipe: &CookRecipe,
    format: CardFormat,
) -> Result<(Block, Block, Block), CardError> {
    let units = recipe.duration_ms / format.time_unit_ms.max(1);
    Ok((
        text_block(&recipe.name, CardField::Name)?,
        text_block(&recipe.target_temp_f.to_string(), CardField::Temperature)?,
        text_block(&units.to_string(), CardField::Time)?,
    ))
}

/// Provision a presented card with `recipe`.
pub fn write_recipe<R: RecipeCardReader + ?Sized>(
    reader: &mut R,
    recipe: &CookRecipe,
    format: CardFormat,
) -> Result<bool, CardError> {
    let (name, temp, time) = encode_recipe(recipe, format)?;
    if !reader.scan() {
        return Ok(false);
    }

    reader.write_block(NAME_BLOCK, &name)?;
    reader.write_block(TEMP_BLOCK, &temp)?;
    reader.write_block(TIME_BLOCK, &time)?;
    Ok(true)
}

pub fn block_text(block: &Block, field: CardField) -> Result<String, CardError> {
    let end = block.iter().position(|byte| *byte == 0).unwrap_or(BLOCK_SIZE);
    std::str::from_utf8(&block[..end])
        .map(|text| text.trim().to_string())
        .map_err(|_| invalid(field, "not valid text"))
}

fn parse_number<T: std::str::FromStr>(block: &Block, field: CardField) -> Result<T, CardError> {
    let text = block_text(block, field)?;
    text.parse::<T>()
        .map_err(|_| invalid(field, &format!("'{text}' is not a number")))
}

/// Pack `text` into a NUL-padded block.
pub fn text_block(text: &str, field: CardField) -> Result<Block, CardError> {
    let bytes = text.as_bytes();
    // Keep one trailing NUL so readers always find a terminator.
    if bytes.len() >= BLOCK_SIZE {
        return Err(invalid(field, "does not fit in one block"));
    }
    let mut block = [0u8; BLOCK_SIZE];
    block[..bytes.len()].copy_from_slice(bytes);
    Ok(block)
}

fn invalid(field: CardField, reason: &str) -> CardError {
    CardError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct MockCard {
        present: bool,
        blocks: HashMap<u8, Block>,
        failing_block: Option<u8>,
    }

    impl MockCard {
        fn with_text(name: &str, temp: &str, time: &str) -> Self {
            let mut blocks = HashMap::new();
            blocks.insert(NAME_BLOCK, text_block(name, CardField::Name).unwrap());
            blocks.insert(TEMP_BLOCK, text_block(temp, CardField::Temperature).unwrap());
            blocks.insert(TIME_BLOCK, text_block(time, CardField::Time).unwrap());
            Self {
                present: true,
                blocks,
                failing_block: None,
            }
        }
    }

    impl RecipeCardReader for MockCard {
        fn scan(&mut self) -> bool {
            self.present
        }

        fn read_block(&mut self, block: u8) -> Result<Block, CardError> {
            if self.failing_block == Some(block) {
                return Err(CardError::BlockRead(block));
            }
            self.blocks
                .get(&block)
                .copied()
                .ok_or(CardError::BlockRead(block))
        }

        fn write_block(&mut self, block: u8, data: &Block) -> Result<(), CardError> {
            if self.failing_block == Some(block) {
                return Err(CardError::BlockWrite(block));
            }
            self.blocks.insert(block, *data);
            Ok(())
        }
    }

    #[test]
    fn reads_recipe_and_converts_minutes() {
        let mut card = MockCard::with_text("Mac & Cheese", "350", "40");
        let recipe = read_recipe(&mut card, CardFormat::default()).unwrap();

        assert_eq!(
            recipe,
            Some(CookRecipe::new("Mac & Cheese", 350, 40 * 60_000))
        );
    }

    #[test]
    fn applies_temperature_calibration() {
        let mut card = MockCard::with_text("Pizza", "425", "12");
        let format = CardFormat {
            temp_calibration_f: -10,
            ..CardFormat::default()
        };
        let recipe = read_recipe(&mut card, format).unwrap().unwrap();

        assert_eq!(recipe.target_temp_f, 415);
    }

    #[test]
    fn no_card_is_not_an_error() {
        let mut card = MockCard::default();
        assert_eq!(read_recipe(&mut card, CardFormat::default()), Ok(None));
    }

    #[test]
    fn any_failed_block_aborts_scan() {
        for block in [NAME_BLOCK, TEMP_BLOCK, TIME_BLOCK] {
            let mut card = MockCard::with_text("Pizza", "425", "12");
            card.failing_block = Some(block);

            assert_eq!(
                read_recipe(&mut card, CardFormat::default()),
                Err(CardError::BlockRead(block))
            );
        }
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let mut card = MockCard::with_text("Pizza", "hot", "12");
        let err = read_recipe(&mut card, CardFormat::default()).unwrap_err();
        assert!(matches!(
            err,
            CardError::InvalidField {
                field: CardField::Temperature,
                ..
            }
        ));

        let mut card = MockCard::with_text("Pizza", "425", "0");
        let err = read_recipe(&mut card, CardFormat::default()).unwrap_err();
        assert!(matches!(
            err,
            CardError::InvalidField {
                field: CardField::Time,
                ..
            }
        ));
    }

    #[test]
    fn huge_temperature_is_rejected_not_overflowed() {
        let mut card = MockCard::with_text("Pizza", "2147483647", "12");
        let format = CardFormat {
            temp_calibration_f: 5,
            ..CardFormat::default()
        };
        let err = read_recipe(&mut card, format).unwrap_err();
        assert!(matches!(
            err,
            CardError::InvalidField {
                field: CardField::Temperature,
                ..
            }
        ));
    }

    #[test]
    fn targets_at_or_above_cut_off_are_rejected() {
        for temp in ["900", "550"] {
            let mut card = MockCard::with_text("Broil", temp, "10");
            let err = read_recipe(&mut card, CardFormat::default()).unwrap_err();
            assert!(matches!(
                err,
                CardError::InvalidField {
                    field: CardField::Temperature,
                    ..
                }
            ));
        }

        // Calibration that pushes a legal card over the cut-off counts too.
        let mut card = MockCard::with_text("Pizza", "545", "12");
        let format = CardFormat {
            temp_calibration_f: 10,
            ..CardFormat::default()
        };
        assert!(read_recipe(&mut card, format).is_err());

        let mut card = MockCard::with_text("Pizza", "545", "12");
        assert_eq!(
            read_recipe(&mut card, CardFormat::default()),
            Ok(Some(CookRecipe::new("Pizza", 545, 12 * 60_000)))
        );
    }

    #[test]
    fn written_card_reads_back() {
        let mut card = MockCard {
            present: true,
            ..MockCard::default()
        };
        let recipe = CookRecipe::new("Roasted Turkey", 350, 35 * 60_000);

        assert_eq!(write_recipe(&mut card, &recipe, CardFormat::default()), Ok(true));
        assert_eq!(
            read_recipe(&mut card, CardFormat::default()),
            Ok(Some(recipe))
        );
    }

    #[test]
    fn long_names_do_not_fit() {
        let recipe = CookRecipe::new("Salisbury Steak and Mac & Cheese", 350, 60_000);
        assert!(matches!(
            encode_recipe(&recipe, CardFormat::default()),
            Err(CardError::InvalidField {
                field: CardField::Name,
                ..
            })
        ));
    }
}
