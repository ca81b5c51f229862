//! Result model and aggregation into the four report buckets

use crate::rules::Mode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// How much a rule's failure matters
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    #[default]
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minor" => Ok(Impact::Minor),
            "moderate" => Ok(Impact::Moderate),
            "serious" => Ok(Impact::Serious),
            "critical" => Ok(Impact::Critical),
            other => Err(format!("impacto desconhecido: {other}")),
        }
    }
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Minor => "minor",
            Impact::Moderate => "moderate",
            Impact::Serious => "serious",
            Impact::Critical => "critical",
        }
    }
}

/// Per (rule, element) outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// A check errored or returned an ambiguous result
    CantTell,
}

/// One check's retained message/data for a node report
#[derive(Debug, Clone, Serialize)]
pub struct CheckMessage {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One matched element's report inside a rule result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub target: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
    pub any: Vec<CheckMessage>,
    pub all: Vec<CheckMessage>,
    pub none: Vec<CheckMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// Rule metadata snapshot attached to every bucket entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub id: String,
    pub help: String,
    pub help_url: String,
    pub description: String,
    pub impact: Impact,
    pub tags: Vec<String>,
    pub page_level: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub nodes: Vec<NodeResult>,
}

/// Metadata carried from the rule into aggregation
#[derive(Debug, Clone)]
pub struct RuleInfo {
    pub id: String,
    pub help: String,
    pub help_url: String,
    pub description: String,
    pub impact: Impact,
    pub tags: Vec<String>,
    pub page_level: bool,
}

/// Raw per-rule evaluation output, before bucketing
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub info: RuleInfo,
    /// Per-element verdicts in DOM order
    pub nodes: Vec<(Verdict, NodeResult)>,
    /// Late-failure note (rule reported inapplicable with this attached)
    pub diagnostic: Option<String>,
}

/// Identity of the engine that produced a result
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
}

/// The complete outcome of one audit run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub engine: EngineInfo,
    pub mode: Mode,
    pub violations: Vec<RuleResult>,
    pub passes: Vec<RuleResult>,
    pub incomplete: Vec<RuleResult>,
    pub inapplicable: Vec<RuleResult>,
}

impl RunResult {
    pub fn statistics(&self) -> RunStatistics {
        let mut per_impact: HashMap<Impact, usize> = HashMap::new();
        let mut violation_nodes = 0;
        for rule in &self.violations {
            violation_nodes += rule.nodes.len();
            *per_impact.entry(rule.impact).or_insert(0) += rule.nodes.len();
        }
        RunStatistics {
            violations: self.violations.len(),
            passes: self.passes.len(),
            incomplete: self.incomplete.len(),
            inapplicable: self.inapplicable.len(),
            violation_nodes,
            per_impact,
        }
    }
}

/// Counts derived from a run, for the summary output
#[derive(Debug, Default, Clone)]
pub struct RunStatistics {
    pub violations: usize,
    pub passes: usize,
    pub incomplete: usize,
    pub inapplicable: usize,
    pub violation_nodes: usize,
    pub per_impact: HashMap<Impact, usize>,
}

/// The four report buckets
#[derive(Debug, Default, Clone)]
pub struct Buckets {
    pub violations: Vec<RuleResult>,
    pub passes: Vec<RuleResult>,
    pub incomplete: Vec<RuleResult>,
    pub inapplicable: Vec<RuleResult>,
}

/// Group rule outcomes into buckets.
///
/// A rule contributes one entry per bucket it has nodes for, so mixed
/// verdicts split across buckets instead of tainting the whole rule.
/// Duplicate (rule, target) pairs are dropped, keeping the first.
pub fn aggregate(outcomes: Vec<RuleOutcome>) -> Buckets {
    let mut buckets = Buckets::default();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for outcome in outcomes {
        let mut failed = Vec::new();
        let mut passed = Vec::new();
        let mut cant_tell = Vec::new();

        for (verdict, node) in outcome.nodes {
            if !seen.insert((outcome.info.id.clone(), node.target.clone())) {
                continue;
            }
            match verdict {
                Verdict::Fail => failed.push(node),
                Verdict::Pass => passed.push(node),
                Verdict::CantTell => cant_tell.push(node),
            }
        }

        let empty = failed.is_empty() && passed.is_empty() && cant_tell.is_empty();
        if empty {
            buckets
                .inapplicable
                .push(to_rule_result(&outcome.info, outcome.diagnostic, Vec::new()));
            continue;
        }
        if !failed.is_empty() {
            buckets
                .violations
                .push(to_rule_result(&outcome.info, None, failed));
        }
        if !cant_tell.is_empty() {
            buckets
                .incomplete
                .push(to_rule_result(&outcome.info, None, cant_tell));
        }
        if !passed.is_empty() {
            buckets.passes.push(to_rule_result(&outcome.info, None, passed));
        }
    }

    buckets
}

fn to_rule_result(
    info: &RuleInfo,
    diagnostic: Option<String>,
    nodes: Vec<NodeResult>,
) -> RuleResult {
    RuleResult {
        id: info.id.clone(),
        help: info.help.clone(),
        help_url: info.help_url.clone(),
        description: info.description.clone(),
        impact: info.impact,
        tags: info.tags.clone(),
        page_level: info.page_level,
        diagnostic,
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str) -> RuleInfo {
        RuleInfo {
            id: id.to_string(),
            help: "ajuda".to_string(),
            help_url: "https://example.com".to_string(),
            description: "descrição".to_string(),
            impact: Impact::Serious,
            tags: vec!["emag".to_string()],
            page_level: false,
        }
    }

    fn node(target: &str) -> NodeResult {
        NodeResult {
            target: target.to_string(),
            html: format!("<p id=\"{target}\"></p>"),
            failure_summary: None,
            any: Vec::new(),
            all: Vec::new(),
            none: Vec::new(),
            screenshot: None,
        }
    }

    #[test]
    fn test_impact_parse_and_order() {
        assert_eq!("serious".parse::<Impact>().unwrap(), Impact::Serious);
        assert_eq!("CRITICAL".parse::<Impact>().unwrap(), Impact::Critical);
        assert!("fatal".parse::<Impact>().is_err());
        assert!(Impact::Critical > Impact::Serious);
        assert!(Impact::Moderate > Impact::Minor);
    }

    #[test]
    fn test_aggregate_mixed_verdicts_split_buckets() {
        let outcome = RuleOutcome {
            info: info("r"),
            nodes: vec![
                (Verdict::Fail, node("#a")),
                (Verdict::Pass, node("#b")),
                (Verdict::CantTell, node("#c")),
            ],
            diagnostic: None,
        };
        let buckets = aggregate(vec![outcome]);
        assert_eq!(buckets.violations.len(), 1);
        assert_eq!(buckets.violations[0].nodes[0].target, "#a");
        assert_eq!(buckets.passes.len(), 1);
        assert_eq!(buckets.passes[0].nodes[0].target, "#b");
        assert_eq!(buckets.incomplete.len(), 1);
        assert_eq!(buckets.incomplete[0].nodes[0].target, "#c");
        assert!(buckets.inapplicable.is_empty());
    }

    #[test]
    fn test_aggregate_empty_rule_is_inapplicable() {
        let outcome = RuleOutcome {
            info: info("r"),
            nodes: Vec::new(),
            diagnostic: None,
        };
        let buckets = aggregate(vec![outcome]);
        assert_eq!(buckets.inapplicable.len(), 1);
        assert!(buckets.violations.is_empty());
        assert!(buckets.passes.is_empty());
    }

    #[test]
    fn test_aggregate_keeps_metadata() {
        let outcome = RuleOutcome {
            info: info("r"),
            nodes: vec![(Verdict::Fail, node("#a"))],
            diagnostic: None,
        };
        let buckets = aggregate(vec![outcome]);
        let rule = &buckets.violations[0];
        assert_eq!(rule.help, "ajuda");
        assert_eq!(rule.impact, Impact::Serious);
        assert_eq!(rule.tags, vec!["emag"]);
    }

    #[test]
    fn test_aggregate_dedupes_rule_target_pairs() {
        let outcome = RuleOutcome {
            info: info("r"),
            nodes: vec![(Verdict::Fail, node("#a")), (Verdict::Fail, node("#a"))],
            diagnostic: None,
        };
        let buckets = aggregate(vec![outcome]);
        assert_eq!(buckets.violations[0].nodes.len(), 1);
    }

    #[test]
    fn test_aggregate_preserves_node_order() {
        let outcome = RuleOutcome {
            info: info("r"),
            nodes: vec![
                (Verdict::Fail, node("#x")),
                (Verdict::Fail, node("#y")),
                (Verdict::Fail, node("#z")),
            ],
            diagnostic: None,
        };
        let buckets = aggregate(vec![outcome]);
        let targets: Vec<_> = buckets.violations[0]
            .nodes
            .iter()
            .map(|n| n.target.as_str())
            .collect();
        assert_eq!(targets, vec!["#x", "#y", "#z"]);
    }

    #[test]
    fn test_diagnostic_attached_to_inapplicable() {
        let outcome = RuleOutcome {
            info: info("r"),
            nodes: Vec::new(),
            diagnostic: Some("seletor falhou em tempo de execução".to_string()),
        };
        let buckets = aggregate(vec![outcome]);
        assert!(buckets.inapplicable[0].diagnostic.is_some());
    }

    #[test]
    fn test_node_result_serializes_camel_case() {
        let mut n = node("#a");
        n.failure_summary = Some("Corrija todos os seguintes: alt ausente".to_string());
        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("failureSummary").is_some());
        assert!(json.get("failure_summary").is_none());
    }
}
