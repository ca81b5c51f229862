//! Configuration handling for emag-audit

use crate::context::ProbeOptions;
use crate::results::Impact;
use crate::rules::{Mode, RulePatch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("Failed to parse JSON config: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("Failed to parse YAML config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("Invalid value in config: {0}")]
    InvalidValue(String),
}

/// Language of the failure summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    PtBr,
    En,
}

impl Locale {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Ok(Locale::PtBr),
            "en" | "en-us" => Ok(Locale::En),
            other => Err(ConfigError::InvalidValue(format!("locale: {other}"))),
        }
    }

    /// Summary header for a failed any-group
    pub fn fix_any(&self) -> &'static str {
        match self {
            Locale::PtBr => "Corrija qualquer um dos seguintes:",
            Locale::En => "Fix any of the following:",
        }
    }

    /// Summary header for failed all/none checks
    pub fn fix_all(&self) -> &'static str {
        match self {
            Locale::PtBr => "Corrija todos os seguintes:",
            Locale::En => "Fix all of the following:",
        }
    }
}

/// Runtime audit configuration
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Default rule set when the caller does not pick one
    pub mode: Mode,
    /// Only run these rules (if Some)
    pub enabled_rules: Option<Vec<String>>,
    /// Rules to skip entirely
    pub disabled_rules: Vec<String>,
    /// Per-rule partial overrides (extra tags, impact, enablement)
    pub rule_patches: HashMap<String, RulePatch>,
    /// Whether the link-reachability rule runs
    pub probe_links: bool,
    /// Probe pool settings; `base_url` doubles as the audited page URL
    pub probe: ProbeOptions,
    pub locale: Locale,
    /// Engine name override in reports
    pub branding: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Both,
            enabled_rules: None,
            disabled_rules: Vec::new(),
            rule_patches: HashMap::new(),
            probe_links: true,
            probe: ProbeOptions::default(),
            locale: Locale::default(),
            branding: None,
        }
    }
}

/// CLI options to merge into config
#[derive(Debug, Default)]
pub struct CliOptions {
    pub mode: Option<Mode>,
    /// Rules to run exclusively (replaces config if set)
    pub enabled_rules: Option<Vec<String>>,
    pub disabled_rules: Vec<String>,
    pub no_probe: bool,
    pub base_url: Option<String>,
}

/// Configuration file format (.emagauditrc.json or .emagauditrc.yaml)
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Default run mode: "emag", "wcag" or "both"
    #[serde(default)]
    pub mode: Option<String>,

    /// Rules to enable (if specified, only these run)
    #[serde(default)]
    pub select: Vec<String>,

    /// Rules to disable
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Per-rule partial overrides: {"css-inline": {"impact": "moderate"}}
    #[serde(default)]
    pub rules: HashMap<String, RulePatchFile>,

    /// Probe links for reachability (default true)
    #[serde(default)]
    pub probe_links: Option<bool>,

    #[serde(default)]
    pub probe_timeout_secs: Option<u64>,

    #[serde(default)]
    pub probe_concurrency: Option<usize>,

    /// "pt-BR" (default) or "en"
    #[serde(default)]
    pub locale: Option<String>,

    #[serde(default)]
    pub branding: Option<String>,
}

/// Partial rule override as written in a config file
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RulePatchFile {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AuditConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let file: ConfigFile = if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Self::from_config_file(file)
    }

    /// Try to find and load config from standard locations, walking up
    /// from `start_dir`
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let config_names = [
            ".emagauditrc.json",
            ".emagauditrc.yaml",
            ".emagauditrc.yml",
            ".emagauditrc",
            "emag-audit.json",
            "emag-audit.yaml",
        ];

        let mut current = start_dir.to_path_buf();
        loop {
            for name in &config_names {
                let config_path = current.join(name);
                if config_path.exists() {
                    let config = Self::from_file(&config_path)?;
                    return Ok(Some((config_path, config)));
                }
            }
            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Build config from a parsed ConfigFile
    pub fn from_config_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ref mode) = file.mode {
            config.mode = mode
                .parse()
                .map_err(|e: String| ConfigError::InvalidValue(e))?;
        }
        if !file.select.is_empty() {
            config.enabled_rules = Some(file.select);
        }
        config.disabled_rules = file.ignore;

        for (id, patch) in file.rules {
            let impact = match patch.impact {
                Some(ref s) => Some(
                    s.parse::<Impact>()
                        .map_err(ConfigError::InvalidValue)?,
                ),
                None => None,
            };
            config.rule_patches.insert(
                id,
                RulePatch {
                    enabled: patch.enabled,
                    impact,
                    tags: patch.tags,
                    ..Default::default()
                },
            );
        }

        if let Some(probe) = file.probe_links {
            config.probe_links = probe;
        }
        if let Some(secs) = file.probe_timeout_secs {
            config.probe.timeout = Duration::from_secs(secs);
        }
        if let Some(concurrency) = file.probe_concurrency {
            config.probe.concurrency = concurrency;
        }
        if let Some(ref locale) = file.locale {
            config.locale = Locale::parse(locale)?;
        }
        config.branding = file.branding;

        Ok(config)
    }

    /// Merge CLI options over whatever the config file set
    pub fn merge_cli(&mut self, cli: CliOptions) {
        if let Some(mode) = cli.mode {
            self.mode = mode;
        }
        if cli.enabled_rules.is_some() {
            self.enabled_rules = cli.enabled_rules;
        }
        self.disabled_rules.extend(cli.disabled_rules);
        if cli.no_probe {
            self.probe_links = false;
        }
        if cli.base_url.is_some() {
            self.probe.base_url = cli.base_url;
        }
    }
}
