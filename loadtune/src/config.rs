use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use loadtune_audio::EngineConfig;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    paths: PathsConfig,
    #[serde(default)]
    runtime: RuntimeConfig,
}

#[derive(Deserialize, Default)]
struct PathsConfig {
    state_file: Option<PathBuf>,
    marker_file: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct RuntimeConfig {
    rotate_seconds: Option<u64>,
    initial_preset: Option<usize>,
}

pub struct Config {
    paths: PathsConfig,
    runtime: RuntimeConfig,
}

impl Config {
    /// Embedded defaults, overlaid with the user's config file when one
    /// exists. A malformed user file is logged and ignored.
    pub fn load() -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => {
                            merge_paths(&mut base.paths, user.paths);
                            merge_runtime(&mut base.runtime, user.runtime);
                        }
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            paths: base.paths,
            runtime: base.runtime,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::with_defaults();
        EngineConfig {
            state_path: self.paths.state_file.clone().unwrap_or(defaults.state_path),
            marker_path: self
                .paths
                .marker_file
                .clone()
                .unwrap_or(defaults.marker_path),
            rotate_window: self
                .runtime
                .rotate_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.rotate_window),
            initial_preset: self
                .runtime
                .initial_preset
                .unwrap_or(defaults.initial_preset),
            rng_seed: defaults.rng_seed,
        }
    }
}

fn merge_paths(base: &mut PathsConfig, user: PathsConfig) {
    if user.state_file.is_some() {
        base.state_file = user.state_file;
    }
    if user.marker_file.is_some() {
        base.marker_file = user.marker_file;
    }
}

fn merge_runtime(base: &mut RuntimeConfig, user: RuntimeConfig) {
    if user.rotate_seconds.is_some() {
        base.rotate_seconds = user.rotate_seconds;
    }
    if user.initial_preset.is_some() {
        base.initial_preset = user.initial_preset;
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("loadtune").join("config.toml"))
}
