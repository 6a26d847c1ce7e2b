// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime tunables for the node-map serialization core. This is ambient
//! infrastructure the distilled spec leaves to "the CLI/configuration that
//! populates the node pool" (SPEC_FULL.md §1, §4.6) — this crate covers
//! only the core's own knobs, not allocation discovery or a CLI surface.

use serde::{Deserialize, Serialize};

/// Gates the compressor's heuristic opt-out (`ndmap_compress::Lz4Compressor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Payloads shorter than this are never even attempted for compression.
    pub min_bytes_to_compress: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { min_bytes_to_compress: 128 }
    }
}

/// Top-level configuration for `ndmap_runtime`'s codec-sequencing entry
/// points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Whether the master hosts application processes. Feeds the NODEINFO
    /// topology-scan starting index (SPEC_FULL.md §4.3).
    #[serde(default)]
    pub allow_master_procs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { compression: CompressionConfig::default(), allow_master_procs: false }
    }
}

impl RuntimeConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.compression.min_bytes_to_compress, 128);
        assert!(!cfg.allow_master_procs);
    }

    #[test]
    fn yaml_round_trip() {
        let cfg = RuntimeConfig {
            compression: CompressionConfig { min_bytes_to_compress: 256 },
            allow_master_procs: true,
        };
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: RuntimeConfig = RuntimeConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_yaml_applies_defaults() {
        let cfg = RuntimeConfig::from_yaml_str("allow_master_procs: true\n").unwrap();
        assert!(cfg.allow_master_procs);
        assert_eq!(cfg.compression.min_bytes_to_compress, 128);
    }
}
