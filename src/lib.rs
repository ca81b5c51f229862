//! emag-audit: accessibility audit engine for eMAG/WCAG conformance
//!
//! Evaluates a rendered page snapshot against a declarative rule set
//! (Brazil's eMAG 3.1 profile layered over WCAG-style checks) and reports
//! violations, passes, incomplete and inapplicable rules with supporting
//! evidence.

pub mod checks;
pub mod config;
pub mod context;
pub mod document;
pub mod engine;
pub mod output;
pub mod page;
pub mod results;
pub mod rules;

pub use checks::{Check, CheckRegistry, CheckResult, CheckStatus};
pub use config::{AuditConfig, ConfigError, Locale};
pub use context::{EvalContext, UrlProber};
pub use document::{AuditDocument, AuditNode};
pub use engine::{run_audit, AuditEngine, BuildError};
pub use page::{annotate_screenshots, PageBrowser, ScreenshotStore};
pub use results::{Impact, NodeResult, RuleResult, RunResult};
pub use rules::{Mode, Rule, RulePatch, RuleRegistry};
