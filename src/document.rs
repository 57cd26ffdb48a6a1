//! Persisted configuration documents (JSON import/export).
//!
//! Version 4 documents map one-to-one onto [`Config`]. Version 3 documents
//! predate per-mapping layer sets, per-layer passthrough and macros, and
//! are upgraded on load.

use std::path::Path;

use serde::Deserialize;

use crate::config::{Config, LayerSet, MacroSlot, Mapping, Usage};
use crate::constants::{CONFIG_VERSION, DEFAULT_SCALING, LEGACY_CONFIG_VERSION, NMACROS};
use crate::error::{Error, Result};

#[derive(Deserialize)]
struct VersionProbe {
    version: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ConfigV3 {
    #[serde(default)]
    unmapped_passthrough: bool,
    partial_scroll_timeout: u32,
    #[serde(default)]
    interval_override: u8,
    mappings: Vec<MappingV3>,
}

#[derive(Debug, Deserialize)]
struct MappingV3 {
    target_usage: Usage,
    source_usage: Usage,
    #[serde(default = "default_scaling")]
    scaling: i32,
    layer: u8,
    #[serde(default)]
    sticky: bool,
}

fn default_scaling() -> i32 {
    DEFAULT_SCALING
}

impl ConfigV3 {
    fn migrate(self) -> Result<Config> {
        let mappings = self
            .mappings
            .into_iter()
            .map(|m| {
                Ok(Mapping {
                    target_usage: m.target_usage,
                    source_usage: m.source_usage,
                    scaling: m.scaling,
                    layers: LayerSet::single(m.layer)?,
                    sticky: m.sticky,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Config {
            version: CONFIG_VERSION,
            unmapped_passthrough_layers: if self.unmapped_passthrough {
                LayerSet::from_mask(1)
            } else {
                LayerSet::empty()
            },
            partial_scroll_timeout: self.partial_scroll_timeout,
            interval_override: self.interval_override,
            mappings,
            macros: vec![MacroSlot::default(); NMACROS],
        })
    }
}

/// Parse a document of any supported version into a current [`Config`].
pub fn from_json(json: &str) -> Result<Config> {
    let VersionProbe { version } = serde_json::from_str(json)?;
    match version.as_u64() {
        Some(v) if v == CONFIG_VERSION as u64 => {
            let mut config: Config = serde_json::from_str(json)?;
            config.pad_macros();
            Ok(config)
        }
        Some(v) if v == LEGACY_CONFIG_VERSION as u64 => {
            log::info!("Migrating config from version {} to {}", v, CONFIG_VERSION);
            serde_json::from_str::<ConfigV3>(json)?.migrate()
        }
        _ => Err(Error::UnsupportedDocumentVersion(version)),
    }
}

pub fn to_json(config: &Config) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let p = path.as_ref();
    let raw = std::fs::read_to_string(p)?;
    let config = from_json(&raw)?;
    log::info!(
        "Read {}: {} mappings, {} macros",
        p.display(),
        config.mappings.len(),
        config.macros.iter().filter(|m| !m.is_empty()).count()
    );
    Ok(config)
}

pub fn write_to_file<P: AsRef<Path>>(path: P, config: &Config) -> Result<()> {
    let mut json = to_json(config)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}
