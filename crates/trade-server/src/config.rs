//! Party-spec file parsing and CLI configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;
use trade_core::dex::{PartySpec, PokemonSpec};

/// Logging verbosity, independent of the CLI crate so `ServerConfig` stays
/// a plain value type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Where the party this server trades with should come from.
#[derive(Debug, Clone)]
pub enum PartySource {
    /// The built-in demo party, named for the given trainer.
    Demo { trainer_name: String },
    /// A TOML spec file on disk, loaded via [`load_party_spec`].
    File(PathBuf),
}

/// Fully resolved server configuration, built from parsed CLI flags.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub log_level: LogLevel,
    pub party_source: PartySource,
}

impl ServerConfig {
    /// Resolves [`PartySource`] into a concrete [`PartySpec`], reading a
    /// spec file from disk if one was configured.
    pub fn resolve_party(&self) -> Result<PartySpec, ConfigError> {
        match &self.party_source {
            PartySource::Demo { trainer_name } => Ok(demo_party_spec(trainer_name)),
            PartySource::File(path) => load_party_spec(path),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9999)),
            log_level: LogLevel::Info,
            party_source: PartySource::Demo { trainer_name: "TRADER".into() },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartySpecFile {
    pub trainer_name: String,
    pub pokemon: Vec<PokemonSpecFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonSpecFile {
    pub species_id: u8,
    pub ivs: [u8; 5],
    pub held_item_id: Option<u8>,
    pub ot_id: Option<u16>,
    pub nickname: Option<String>,
}

impl From<PartySpecFile> for PartySpec {
    fn from(file: PartySpecFile) -> Self {
        PartySpec {
            trainer_name: file.trainer_name,
            slots: file
                .pokemon
                .into_iter()
                .map(|p| PokemonSpec {
                    species_id: p.species_id,
                    ivs: p.ivs,
                    held_item_id: p.held_item_id,
                    ot_id: p.ot_id,
                    nickname: p.nickname,
                })
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read party spec file {0:?}: {1}")]
    Read(std::path::PathBuf, std::io::Error),
    #[error("failed to parse party spec file {0:?}: {1}")]
    Parse(std::path::PathBuf, toml::de::Error),
}

pub fn load_party_spec(path: &Path) -> Result<PartySpec, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let file: PartySpecFile = toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
    Ok(file.into())
}

/// A small built-in party used when no `--party` file is given, so the
/// server is runnable out of the box.
pub fn demo_party_spec(trainer_name: &str) -> PartySpec {
    PartySpec {
        trainer_name: trainer_name.to_string(),
        slots: vec![
            PokemonSpec { species_id: 155, ivs: [15, 15, 15, 15, 15], held_item_id: None, ot_id: None, nickname: Some("CYNDAQUIL".into()) },
            PokemonSpec { species_id: 158, ivs: [15, 15, 15, 15, 15], held_item_id: None, ot_id: None, nickname: Some("TOTODILE".into()) },
            PokemonSpec { species_id: 152, ivs: [15, 15, 15, 15, 15], held_item_id: None, ot_id: None, nickname: Some("CHIKORITA".into()) },
        ],
    }
}
