//! Bus configuration
//!
//! A [`BusConfig`] is the plain value a board hands to the dispatcher: pin
//! assignment plus transaction settings. Firmware embeds it as a small TOML
//! file and parses it with [`parse_bus_config`].
//!
//! Supported subset:
//! - `[spi]` section header
//! - Key = value pairs (string, integer)
//! - Comments (# ...)
//!
//! ```toml
//! [spi]
//! tx = "gpio11"
//! rx = "gpio12"
//! sck = "gpio10"
//! cs = "gpio13"
//! frequency = 1_000_000
//! mode = 0
//! bit_order = "msb_first"
//! ```

use piospi_hal::{BitOrder, Mode, PinId, SpiPins, SpiSettings};

/// Number of user GPIOs on the RP2040
pub const NUM_PINS: u8 = 30;

/// Complete configuration of one SPI bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusConfig {
    /// Pin assignment
    pub pins: SpiPins,
    /// Clock rate, mode and bit order
    pub settings: SpiSettings,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            pins: SpiPins {
                tx: 11,
                rx: 12,
                sck: 10,
                cs: 13,
            },
            settings: SpiSettings {
                frequency: 1_000_000,
                ..SpiSettings::default()
            },
        }
    }
}

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// No `[spi]` section
    MissingSection,
    /// Invalid or unknown section header
    InvalidSection,
    /// Unknown key in the `[spi]` section
    UnknownKey,
    /// Invalid value type
    InvalidValue,
    /// Invalid pin string or pin number out of range
    InvalidPin,
    /// Two signals assigned to the same pin
    PinConflict,
}

/// Parse a `bus.toml` document
///
/// Keys that are absent keep their [`BusConfig::default`] value.
pub fn parse_bus_config(input: &str) -> Result<BusConfig, ParseError> {
    let mut config = BusConfig::default();
    let mut in_spi = false;
    let mut seen_spi = false;

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Check for section header
        if line.starts_with('[') && line.ends_with(']') {
            match line[1..line.len() - 1].trim() {
                "spi" => {
                    in_spi = true;
                    seen_spi = true;
                }
                _ => return Err(ParseError::InvalidSection),
            }
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ParseError::InvalidValue)?;
        if !in_spi {
            return Err(ParseError::UnknownKey);
        }
        apply_value(&mut config, key, value)?;
    }

    if !seen_spi {
        return Err(ParseError::MissingSection);
    }

    validate_pins(&config.pins)?;
    Ok(config)
}

fn apply_value(config: &mut BusConfig, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "tx" => config.pins.tx = parse_pin(value)?,
        "rx" => config.pins.rx = parse_pin(value)?,
        "sck" => config.pins.sck = parse_pin(value)?,
        "cs" => config.pins.cs = parse_pin(value)?,
        "frequency" => config.settings.frequency = parse_int(value)?,
        "mode" => {
            config.settings.mode =
                Mode::from_index(parse_int(value)?).ok_or(ParseError::InvalidValue)?
        }
        "bit_order" => config.settings.bit_order = parse_bit_order(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

fn validate_pins(pins: &SpiPins) -> Result<(), ParseError> {
    let all = [pins.tx, pins.rx, pins.sck, pins.cs];
    for (i, a) in all.iter().enumerate() {
        if all[i + 1..].contains(a) {
            return Err(ParseError::PinConflict);
        }
    }
    Ok(())
}

/// Split `key = value`, dropping an inline comment
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = if let Some(hash_pos) = value.find('#') {
        // Make sure # is not inside a string
        let quote_count = value[..hash_pos].matches('"').count();
        if quote_count % 2 == 0 {
            value[..hash_pos].trim()
        } else {
            value
        }
    } else {
        value
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

/// Parse an integer value, allowing `_` digit separators
fn parse_int<T: TryFrom<u64>>(value: &str) -> Result<T, ParseError> {
    let mut acc: u64 = 0;
    let mut digits = 0;
    for c in value.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(10).ok_or(ParseError::InvalidValue)?;
        acc = acc
            .checked_mul(10)
            .and_then(|v| v.checked_add(d as u64))
            .ok_or(ParseError::InvalidValue)?;
        digits += 1;
    }
    if digits == 0 {
        return Err(ParseError::InvalidValue);
    }
    T::try_from(acc).map_err(|_| ParseError::InvalidValue)
}

/// Parse a pin string like "gpio11" or a bare pin number
fn parse_pin(value: &str) -> Result<PinId, ParseError> {
    let s = parse_string(value);
    let digits = s.strip_prefix("gpio").unwrap_or(s);
    let pin: PinId = parse_int(digits).map_err(|_| ParseError::InvalidPin)?;
    if pin >= NUM_PINS {
        return Err(ParseError::InvalidPin);
    }
    Ok(pin)
}

fn parse_bit_order(value: &str) -> Result<BitOrder, ParseError> {
    match parse_string(value) {
        "msb" | "msb_first" => Ok(BitOrder::MsbFirst),
        "lsb" | "lsb_first" => Ok(BitOrder::LsbFirst),
        _ => Err(ParseError::InvalidValue),
    }
}
