use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const APP_DIR_NAME: &str = "docquiz";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_PROVIDER: &str = "ollama";
pub const DEFAULT_MODEL: &str = "gemma3:12b";
pub const DEFAULT_OUTPUT_DIR: &str = "analysis_results";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: std::collections::BTreeMap<String, Profile>,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Tunables for the chunking and budgeting pipeline. Every field is
/// optional in the file; missing fields fall back to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub min_chunk_len: Option<usize>,
    pub question_cap: Option<usize>,
    pub output_dir: Option<String>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let base = config_dir().context("unable to resolve OS config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn ensure_config_parent_exists(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config dir: {}", parent.display()))?;
    }
    Ok(())
}

pub fn load_config_if_exists(path: &PathBuf) -> Result<Option<AppConfig>> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&text).context("parsing config TOML")?;
        Ok(Some(cfg))
    } else {
        Ok(None)
    }
}

pub fn write_config(path: &PathBuf, cfg: &AppConfig) -> Result<()> {
    ensure_config_parent_exists(path)?;
    let text = toml::to_string_pretty(cfg).context("serializing config to TOML")?;
    fs::write(path, text).with_context(|| format!("writing config file: {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub provider: String,
    pub model: String,
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
    pub min_chunk_len: usize,
    pub question_cap: usize,
    pub output_dir: String,
}

/// Resolution order per field: CLI flag, then the selected profile (or
/// `[generation]` table), then the built-in default.
pub fn resolve_effective_settings(
    profile_override: Option<&str>,
    cli_provider: Option<&str>,
    cli_model: Option<&str>,
    cli_min_chunk_len: Option<usize>,
    cli_question_cap: Option<usize>,
    cli_output_dir: Option<&str>,
) -> Result<EffectiveSettings> {
    let path = default_config_path()?;
    let cfg = load_config_if_exists(&path)?;

    let mut provider: Option<String> = None;
    let mut model: Option<String> = None;
    let mut api_base: Option<String> = None;
    let mut timeout_secs: Option<u64> = None;
    let mut min_chunk_len: Option<usize> = None;
    let mut question_cap: Option<usize> = None;
    let mut output_dir: Option<String> = None;

    if let Some(cfg) = cfg {
        let profile_name = profile_override
            .map(|s| s.to_string())
            .or(cfg.default_profile)
            .unwrap_or_else(|| "default".to_string());
        if let Some(p) = cfg.profiles.get(&profile_name) {
            provider = p.provider.clone();
            model = p.model.clone();
            api_base = p.api_base.clone();
            timeout_secs = p.timeout_secs;
        }
        min_chunk_len = cfg.generation.min_chunk_len;
        question_cap = cfg.generation.question_cap;
        output_dir = cfg.generation.output_dir;
    }

    if let Some(cp) = cli_provider {
        provider = Some(cp.to_string());
    }
    if let Some(cm) = cli_model {
        model = Some(cm.to_string());
    }
    if let Some(v) = cli_min_chunk_len {
        min_chunk_len = Some(v);
    }
    if let Some(v) = cli_question_cap {
        question_cap = Some(v);
    }
    if let Some(v) = cli_output_dir {
        output_dir = Some(v.to_string());
    }

    Ok(EffectiveSettings {
        provider: provider.unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
        model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        api_base,
        timeout_secs,
        min_chunk_len: min_chunk_len.unwrap_or(crate::chunker::DEFAULT_MIN_CHUNK_LEN),
        question_cap: question_cap.unwrap_or(crate::planner::DEFAULT_QUESTION_CAP),
        output_dir: output_dir.unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
    })
}
