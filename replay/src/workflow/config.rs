use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use motocore::prelude::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .pipeline
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(jump_sigma: f64, dt_per_tick: f64, seed: u64) -> Self {
        Self {
            pipeline: PipelineConfig {
                jump_sigma,
                dt_per_tick,
                ..Default::default()
            },
            generator: GeneratorConfig {
                seed,
                ..Default::default()
            },
            bind_address: default_bind_address(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_overrides_pipeline() {
        let cfg = WorkflowConfig::from_args(3.0, 0.02, 7);
        assert_eq!(cfg.pipeline.jump_sigma, 3.0);
        assert_eq!(cfg.pipeline.dt_per_tick, 0.02);
        assert_eq!(cfg.pipeline.interpolate_limit, 10);
        assert_eq!(cfg.generator.seed, 7);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"pipeline:\n  jump_sigma: 4.0\n  throttle_rates:\n    up: 5.0\n    down: 6.0\ngenerator:\n  laps: 3\nbind_address: 127.0.0.1:9100\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.pipeline.jump_sigma, 4.0);
        assert_eq!(cfg.pipeline.throttle_rates.up, 5.0);
        assert_eq!(cfg.pipeline.max_dt, 0.20);
        assert_eq!(cfg.generator.laps, 3);
        assert_eq!(cfg.bind_address.port(), 9100);
    }

    #[test]
    fn config_load_rejects_invalid_pipeline() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"pipeline:\n  min_dt: 0.5\n  max_dt: 0.1\n")
            .unwrap();
        let path = temp.into_temp_path();
        let err = WorkflowConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("min_dt"));
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"{}\n").unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.pipeline, PipelineConfig::default());
        assert_eq!(cfg.bind_address, default_bind_address());
    }
}
