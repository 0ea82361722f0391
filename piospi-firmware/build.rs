//! Build script for piospi-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates bus.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Number of user GPIOs on the RP2040
const NUM_PINS: i64 = 30;

/// Fastest clock the 4-cycle programs reach at 125 MHz
const MAX_FREQUENCY_HZ: i64 = 125_000_000 / 4;

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate bus.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=bus.toml");

    let config_path = Path::new("bus.toml");

    if !config_path.exists() {
        fail(
            "bus.toml not found!",
            &["The firmware embeds bus.toml; create one next to Cargo.toml".to_string()],
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => fail("Failed to read bus.toml", &[e.to_string()]),
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => fail(
            "Invalid TOML syntax in bus.toml",
            &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
        ),
    };

    let spi = match config.get("spi") {
        Some(toml::Value::Table(t)) => t,
        Some(_) => fail("Invalid bus.toml", &["[spi] must be a table".to_string()]),
        None => fail("Invalid bus.toml", &["Missing [spi] section".to_string()]),
    };

    let errors = validate_spi(spi);
    if !errors.is_empty() {
        fail("Invalid [spi] configuration", &errors);
    }

    println!("cargo:warning=bus.toml validated successfully");
}

/// Check every key of the `[spi]` table, collecting all problems
fn validate_spi(spi: &toml::Table) -> Vec<String> {
    let mut errors = Vec::new();
    let mut pins: Vec<(&str, i64)> = Vec::new();

    for (key, value) in spi {
        match key.as_str() {
            "tx" | "rx" | "sck" | "cs" => match pin_number(value) {
                Some(pin) if (0..NUM_PINS).contains(&pin) => pins.push((key.as_str(), pin)),
                _ => errors.push(format!("'{}' must be \"gpio0\"-\"gpio29\" or 0-29", key)),
            },
            "frequency" => match value {
                toml::Value::Integer(hz) if *hz > 0 && *hz <= MAX_FREQUENCY_HZ => {}
                _ => errors.push(format!("'frequency' must be 1-{} Hz", MAX_FREQUENCY_HZ)),
            },
            "mode" => match value {
                toml::Value::Integer(mode) if (0..=3).contains(mode) => {}
                _ => errors.push("'mode' must be 0-3".to_string()),
            },
            "bit_order" => match value.as_str() {
                Some("msb" | "msb_first" | "lsb" | "lsb_first") => {}
                _ => errors.push("'bit_order' must be \"msb_first\" or \"lsb_first\"".to_string()),
            },
            other => errors.push(format!("unknown key '{}'", other)),
        }
    }

    for (i, (name, pin)) in pins.iter().enumerate() {
        for (other, other_pin) in &pins[i + 1..] {
            if pin == other_pin {
                errors.push(format!("'{}' and '{}' both use GPIO{}", name, other, pin));
            }
        }
    }

    errors
}

/// Accept `"gpioN"` strings and bare integers
fn pin_number(value: &toml::Value) -> Option<i64> {
    match value {
        toml::Value::Integer(n) => Some(*n),
        toml::Value::String(s) => s.strip_prefix("gpio").unwrap_or(s).parse().ok(),
        _ => None,
    }
}

/// Abort the build with a boxed error report
fn fail(title: &str, lines: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        lines
            .iter()
            .map(|line| {
                let truncated = if line.len() > 62 {
                    format!("{}...", &line[..59])
                } else {
                    line.clone()
                };
                format!("║  • {:<62} ║", truncated)
            })
            .collect::<Vec<_>>()
            .join("\n")
    );
}
