//! Rule definitions and registry

mod builtin;

pub use builtin::{default_rules, emag_profile_patches};

use crate::results::{Impact, RuleInfo};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Tag set that defines the WCAG run mode, mirroring the upstream
/// run configuration
pub const WCAG_TAGS: &[&str] = &["wcag2a", "wcag2aa", "wcag21a", "wcag21aa", "best-practice"];

#[derive(Error, Debug)]
pub enum RuleRegistryError {
    #[error("unknown rule id: {0}")]
    UnknownRule(String),
}

/// Which rule set a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Emag,
    Wcag,
    #[default]
    Both,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emag" => Ok(Mode::Emag),
            "wcag" => Ok(Mode::Wcag),
            "both" => Ok(Mode::Both),
            other => Err(format!("modo desconhecido: {other}")),
        }
    }
}

impl Mode {
    /// Whether a rule with these tags runs in this mode
    pub fn includes(&self, tags: &[String]) -> bool {
        let emag = tags.iter().any(|t| t == "emag");
        let wcag = tags.iter().any(|t| WCAG_TAGS.contains(&t.as_str()));
        match self {
            Mode::Emag => emag,
            Mode::Wcag => wcag,
            Mode::Both => emag || wcag,
        }
    }
}

/// Reporting metadata attached to a rule
#[derive(Debug, Clone, Default)]
pub struct RuleMetadata {
    pub help: String,
    pub help_url: String,
    pub description: String,
    /// Page-level rules are skipped by the screenshot annotator
    pub page_level: bool,
}

/// A declarative audit rule: a selector bound to check groups
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub selector: String,
    /// Passes when at least one referenced check passes
    pub any: Vec<String>,
    /// Passes when every referenced check passes
    pub all: Vec<String>,
    /// Passes when every referenced check evaluates false
    pub none: Vec<String>,
    pub enabled: bool,
    pub tags: Vec<String>,
    pub impact: Impact,
    pub metadata: RuleMetadata,
}

impl Rule {
    pub fn new(id: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            selector: selector.into(),
            any: Vec::new(),
            all: Vec::new(),
            none: Vec::new(),
            enabled: true,
            tags: Vec::new(),
            impact: Impact::default(),
            metadata: RuleMetadata::default(),
        }
    }

    /// Every check id this rule references, across all three groups
    pub fn check_ids(&self) -> impl Iterator<Item = &String> {
        self.any.iter().chain(self.all.iter()).chain(self.none.iter())
    }

    /// Snapshot of the reporting metadata for aggregation
    pub fn info(&self) -> RuleInfo {
        RuleInfo {
            id: self.id.clone(),
            help: self.metadata.help.clone(),
            help_url: self.metadata.help_url.clone(),
            description: self.metadata.description.clone(),
            impact: self.impact,
            tags: self.tags.clone(),
            page_level: self.metadata.page_level,
        }
    }
}

/// A partial rule used to extend an already-registered rule without
/// redefining its selector or checks. Scalar fields replace, tags union.
#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub enabled: Option<bool>,
    pub impact: Option<Impact>,
    pub tags: Vec<String>,
    pub help: Option<String>,
    pub help_url: Option<String>,
    pub description: Option<String>,
}

/// Registration-ordered rule store with upsert semantics
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, replacing any earlier registration of the same id
    /// (last writer wins). Registration order is preserved for the
    /// original slot.
    pub fn register(&mut self, rule: Rule) {
        match self.index.get(&rule.id) {
            Some(&i) => self.rules[i] = rule,
            None => {
                self.index.insert(rule.id.clone(), self.rules.len());
                self.rules.push(rule);
            }
        }
    }

    /// Merge a partial onto an existing rule. Tags are unioned, scalar
    /// fields replaced when present.
    pub fn patch(&mut self, id: &str, patch: &RulePatch) -> Result<(), RuleRegistryError> {
        let &i = self
            .index
            .get(id)
            .ok_or_else(|| RuleRegistryError::UnknownRule(id.to_string()))?;
        let rule = &mut self.rules[i];
        if let Some(enabled) = patch.enabled {
            rule.enabled = enabled;
        }
        if let Some(impact) = patch.impact {
            rule.impact = impact;
        }
        for tag in &patch.tags {
            if !rule.tags.contains(tag) {
                rule.tags.push(tag.clone());
            }
        }
        if let Some(ref help) = patch.help {
            rule.metadata.help = help.clone();
        }
        if let Some(ref help_url) = patch.help_url {
            rule.metadata.help_url = help_url.clone();
        }
        if let Some(ref description) = patch.description {
            rule.metadata.description = description.clone();
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    /// Enabled rules matching the mode's tag filter, in registration order
    pub fn list(&self, mode: Mode) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.enabled && mode.includes(&r.tags))
            .collect()
    }

    /// Every registered rule, regardless of mode or enablement
    pub fn all(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
