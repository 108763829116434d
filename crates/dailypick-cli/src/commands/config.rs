use std::error::Error;

use clap::Subcommand;
use dailypick_core::{Config, ConfigError};
use serde::Serialize;

use super::print_json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show one setting
    Get {
        /// Dot-separated key (e.g. "timezone.utc_offset_minutes")
        key: String,
    },
    /// Change one setting and save it
    Set {
        key: String,
        /// Parsed as JSON when possible, else taken as a string
        value: String,
    },
    /// Show every setting
    List,
    /// Overwrite the config file with defaults
    Reset,
}

#[derive(Serialize)]
struct Entry {
    key: String,
    value: serde_json::Value,
}

fn entry(config: &Config, key: &str) -> Result<Entry, Box<dyn Error>> {
    let pointer = format!("/{}", key.replace('.', "/"));
    let value = serde_json::to_value(config)?
        .pointer(&pointer)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    Ok(Entry {
        key: key.to_string(),
        value,
    })
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            print_json(&entry(&config, &key)?)
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            tracing::debug!(key = %key, "config saved");
            print_json(&entry(&config, &key)?)
        }
        ConfigAction::List => print_json(&Config::load()?),
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            print_json(&config)
        }
    }
}
