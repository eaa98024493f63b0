use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "seglayers.toml";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub defaults: DefaultsSection,
    #[serde(default)]
    pub filters: FiltersSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DefaultsSection {
    /// Source language code (e.g. en-US); CLI flags override.
    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
}

/// Per-filter toggles for the Layer0 -> Layer1 chain. Everything defaults
/// to enabled; a `false` entry removes the stage before the chain runs.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FiltersSection {
    #[serde(default)]
    pub twig: Option<bool>,
    #[serde(default)]
    pub ruby_on_rails: Option<bool>,
    #[serde(default)]
    pub percentages: Option<bool>,
    #[serde(default)]
    pub double_square: Option<bool>,
    #[serde(default)]
    pub sprintf: Option<bool>,
}

impl FiltersSection {
    pub fn disabled_handler_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let toggles = [
            (self.twig, "twig-to-ph"),
            (self.ruby_on_rails, "ruby-on-rails-to-ph"),
            (self.percentages, "percentages-to-ph"),
            (self.double_square, "double-square-to-ph"),
            (self.sprintf, "sprintf-to-ph"),
        ];
        for (toggle, name) in toggles {
            if toggle == Some(false) {
                names.push(name);
            }
        }
        names
    }
}

fn nearest_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .take(6)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.exists())
}

/// Loads the config from an explicit path, or from the nearest
/// `seglayers.toml` at or above the current directory. A missing file
/// yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => nearest_config_file(),
    };
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let text =
        fs::read_to_string(&path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}
