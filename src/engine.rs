//! Audit engine - validates configuration and orchestrates rule evaluation

use crate::checks::{
    default_checks, Check, CheckRegistry, CheckRegistryError, CheckStatus,
};
use crate::config::AuditConfig;
use crate::context::{DisabledProber, EvalContext, HttpProber, UrlProber};
use crate::document::AuditDocument;
use crate::results::{
    aggregate, CheckMessage, EngineInfo, NodeResult, RuleOutcome, RunResult, Verdict,
};
use crate::rules::{
    default_rules, emag_profile_patches, Mode, Rule, RulePatch, RuleRegistry, RuleRegistryError,
};
use chrono::Utc;
use scraper::Selector;
use std::collections::HashMap;
use thiserror::Error;

/// Configuration-time failures. The engine refuses to start on any of
/// these instead of silently skipping a broken rule.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Check(#[from] CheckRegistryError),
    #[error(transparent)]
    Rule(#[from] RuleRegistryError),
    #[error("rule {rule}: invalid selector {selector:?}: {message}")]
    InvalidSelector {
        rule: String,
        selector: String,
        message: String,
    },
    #[error("rules reference unknown checks: {}", .0.join(", "))]
    MissingChecks(Vec<String>),
}

/// A validated, read-only engine ready to run audits
#[derive(Debug)]
pub struct AuditEngine {
    checks: CheckRegistry,
    rules: RuleRegistry,
    selectors: HashMap<String, Selector>,
    config: AuditConfig,
}

impl AuditEngine {
    /// Build an engine from explicit check and rule sets
    pub fn build(
        checks: Vec<Check>,
        rules: Vec<Rule>,
        config: AuditConfig,
    ) -> Result<Self, BuildError> {
        Self::build_with_patches(checks, rules, Vec::new(), config)
    }

    /// Build the default engine: built-in checks and rules, the eMAG
    /// profile patches, then whatever the configuration overrides
    pub fn with_defaults(config: AuditConfig) -> Result<Self, BuildError> {
        Self::build_with_patches(
            default_checks(),
            default_rules(),
            emag_profile_patches(),
            config,
        )
    }

    fn build_with_patches(
        checks: Vec<Check>,
        rules: Vec<Rule>,
        patches: Vec<(String, RulePatch)>,
        config: AuditConfig,
    ) -> Result<Self, BuildError> {
        let mut check_registry = CheckRegistry::new();
        for check in checks {
            check_registry.register(check)?;
        }

        let mut rule_registry = RuleRegistry::new();
        for rule in rules {
            rule_registry.register(rule);
        }
        for (id, patch) in &patches {
            rule_registry.patch(id, patch)?;
        }
        for (id, patch) in &config.rule_patches {
            rule_registry.patch(id, patch)?;
        }
        for id in &config.disabled_rules {
            if rule_registry.get(id).is_none() {
                log::warn!("regra desabilitada inexistente: {id}");
                continue;
            }
            rule_registry.patch(
                id,
                &RulePatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )?;
        }
        if !config.probe_links && rule_registry.get("emag-broken-links").is_some() {
            rule_registry.patch(
                "emag-broken-links",
                &RulePatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )?;
        }

        // Referential integrity: collect every dangling reference, not
        // just the first
        let mut missing = Vec::new();
        for rule in rule_registry.all() {
            for check_id in rule.check_ids() {
                if !check_registry.contains(check_id) {
                    missing.push(format!("{} -> {}", rule.id, check_id));
                }
            }
        }
        if !missing.is_empty() {
            return Err(BuildError::MissingChecks(missing));
        }

        let mut selectors = HashMap::new();
        for rule in rule_registry.all() {
            let selector =
                Selector::parse(&rule.selector).map_err(|e| BuildError::InvalidSelector {
                    rule: rule.id.clone(),
                    selector: rule.selector.clone(),
                    message: e.to_string(),
                })?;
            selectors.insert(rule.id.clone(), selector);
        }

        Ok(Self {
            checks: check_registry,
            rules: rule_registry,
            selectors,
            config,
        })
    }

    /// Number of registered rules (enabled or not)
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run the audit in the engine's default mode
    pub fn run_default(&self, doc: &AuditDocument) -> RunResult {
        self.run(doc, self.config.mode)
    }

    /// Run every enabled rule matching the mode against the document.
    ///
    /// Always returns a well-formed result: check failures degrade the
    /// affected elements, never the run.
    pub fn run(&self, doc: &AuditDocument, mode: Mode) -> RunResult {
        let prober: Box<dyn UrlProber> = if self.config.probe_links {
            match HttpProber::new(self.config.probe.timeout) {
                Ok(p) => Box::new(p),
                Err(e) => {
                    log::warn!("cliente HTTP indisponível ({e}); links não serão sondados");
                    Box::new(DisabledProber)
                }
            }
        } else {
            Box::new(DisabledProber)
        };
        let ctx = EvalContext::new(doc, prober.as_ref(), self.config.probe.clone());

        let selected = |rule: &&Rule| match &self.config.enabled_rules {
            Some(ids) => ids.iter().any(|id| id == &rule.id),
            None => true,
        };
        let mut outcomes = Vec::new();
        for rule in self.rules.list(mode).into_iter().filter(selected) {
            // Cache entries built while this rule runs are released when
            // the scope drops, on every exit path
            let scope = ctx.rule_scope();
            let outcome = self.evaluate_rule(rule, doc, &ctx);
            drop(scope);
            log::debug!("regra {}: {} nós avaliados", rule.id, outcome.nodes.len());
            outcomes.push(outcome);
        }

        let buckets = aggregate(outcomes);
        RunResult {
            url: self.config.probe.base_url.clone(),
            timestamp: Utc::now(),
            engine: EngineInfo {
                name: self
                    .config
                    .branding
                    .clone()
                    .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            mode,
            violations: buckets.violations,
            passes: buckets.passes,
            incomplete: buckets.incomplete,
            inapplicable: buckets.inapplicable,
        }
    }

    fn evaluate_rule(&self, rule: &Rule, doc: &AuditDocument, ctx: &EvalContext) -> RuleOutcome {
        let Some(selector) = self.selectors.get(&rule.id) else {
            // Should have been rejected at build time; degrade instead of
            // crashing the run
            return RuleOutcome {
                info: rule.info(),
                nodes: Vec::new(),
                diagnostic: Some(format!(
                    "seletor {:?} não pôde ser avaliado",
                    rule.selector
                )),
            };
        };

        let matched = doc.select(selector);
        let mut nodes = Vec::with_capacity(matched.len());
        for node in matched {
            nodes.push(self.evaluate_element(rule, node, ctx));
        }
        RuleOutcome {
            info: rule.info(),
            nodes,
            diagnostic: None,
        }
    }

    /// Combine the any/all/none groups for one element
    fn evaluate_element(
        &self,
        rule: &Rule,
        node: &crate::document::AuditNode,
        ctx: &EvalContext,
    ) -> (Verdict, NodeResult) {
        let any = self.eval_group(&rule.any, node, ctx);
        let all = self.eval_group(&rule.all, node, ctx);
        let none = self.eval_group(&rule.none, node, ctx);

        let undecided = any.undecided() || all.undecided() || none.undecided();
        let any_ok = rule.any.is_empty() || any.statuses.contains(&CheckStatus::Pass);
        let all_ok = all.statuses.iter().all(|s| *s == CheckStatus::Pass);
        let none_ok = none.statuses.iter().all(|s| *s == CheckStatus::Fail);

        let verdict = if undecided {
            Verdict::CantTell
        } else if any_ok && all_ok && none_ok {
            Verdict::Pass
        } else {
            Verdict::Fail
        };

        let failure_summary = (verdict == Verdict::Fail)
            .then(|| self.failure_summary(rule, &any, &all, &none, any_ok))
            .filter(|s| !s.is_empty());

        (
            verdict,
            NodeResult {
                target: node.target.clone(),
                html: node.html.clone(),
                failure_summary,
                any: any.messages,
                all: all.messages,
                none: none.messages,
                screenshot: None,
            },
        )
    }

    fn eval_group(
        &self,
        ids: &[String],
        node: &crate::document::AuditNode,
        ctx: &EvalContext,
    ) -> GroupEval {
        let mut group = GroupEval::default();
        for id in ids {
            let check = match self.checks.get(id) {
                Ok(check) => check,
                Err(e) => {
                    // Build-time validation makes this unreachable, but a
                    // stale engine must degrade, not crash
                    group.errored = true;
                    group.messages.push(CheckMessage {
                        id: id.clone(),
                        message: Some(e.to_string()),
                        data: None,
                    });
                    continue;
                }
            };
            match check.run(node, ctx) {
                Ok(result) => {
                    group.statuses.push(result.status);
                    group.messages.push(CheckMessage {
                        id: id.clone(),
                        message: result.message,
                        data: result.data,
                    });
                }
                Err(e) => {
                    group.errored = true;
                    group.messages.push(CheckMessage {
                        id: id.clone(),
                        message: Some(e.to_string()),
                        data: None,
                    });
                }
            }
        }
        group
    }

    /// Human summary of why an element failed, in the configured locale
    fn failure_summary(
        &self,
        rule: &Rule,
        any: &GroupEval,
        all: &GroupEval,
        none: &GroupEval,
        any_ok: bool,
    ) -> String {
        let locale = self.config.locale;
        let mut sections = Vec::new();

        if !rule.any.is_empty() && !any_ok {
            let lines = messages_with_status(any, CheckStatus::Fail);
            if !lines.is_empty() {
                sections.push(format!("{}\n  {}", locale.fix_any(), lines.join("\n  ")));
            }
        }

        let mut must_fix = messages_with_status(all, CheckStatus::Fail);
        // none-group checks that returned true detected a disqualifying
        // condition
        must_fix.extend(messages_with_status(none, CheckStatus::Pass));
        if !must_fix.is_empty() {
            sections.push(format!("{}\n  {}", locale.fix_all(), must_fix.join("\n  ")));
        }

        sections.join("\n\n")
    }
}

fn messages_with_status(group: &GroupEval, status: CheckStatus) -> Vec<String> {
    group
        .statuses
        .iter()
        .zip(group.messages.iter())
        .filter(|(s, _)| **s == status)
        .filter_map(|(_, m)| m.message.clone())
        .filter(|m| !m.is_empty())
        .collect()
}

#[derive(Default)]
struct GroupEval {
    messages: Vec<CheckMessage>,
    statuses: Vec<CheckStatus>,
    errored: bool,
}

impl GroupEval {
    /// A check errored or came back ambiguous
    fn undecided(&self) -> bool {
        self.errored || self.statuses.contains(&CheckStatus::Incomplete)
    }
}

/// Parse an HTML snapshot and audit it with the default engine
pub fn run_audit(html: &str, mode: Mode, config: AuditConfig) -> Result<RunResult, BuildError> {
    let engine = AuditEngine::with_defaults(config)?;
    let doc = AuditDocument::parse(html);
    Ok(engine.run(&doc, mode))
}
