//! Integration tests for emag-audit

use emag_audit::{
    output::format_json, AuditConfig, AuditDocument, AuditEngine, Check, CheckResult, Impact, Mode,
    Rule, RunResult,
};
use std::path::PathBuf;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(name: &str) -> AuditDocument {
    let html = std::fs::read_to_string(fixtures_path().join(name)).unwrap();
    AuditDocument::parse(&html)
}

fn offline_config() -> AuditConfig {
    AuditConfig {
        probe_links: false,
        ..Default::default()
    }
}

fn run_fixture(name: &str, mode: Mode) -> RunResult {
    let engine = AuditEngine::with_defaults(offline_config()).unwrap();
    engine.run(&load_fixture(name), mode)
}

fn find<'a>(bucket: &'a [emag_audit::RuleResult], id: &str) -> Option<&'a emag_audit::RuleResult> {
    bucket.iter().find(|r| r.id == id)
}

#[test]
fn test_compliant_page_has_no_violations() {
    let result = run_fixture("compliant.html", Mode::Both);
    let ids: Vec<_> = result.violations.iter().map(|r| r.id.clone()).collect();
    assert!(ids.is_empty(), "unexpected violations: {ids:?}");
}

#[test]
fn test_compliant_page_passes_core_rules() {
    let result = run_fixture("compliant.html", Mode::Both);
    for id in [
        "img-sem-alt-emag",
        "document-title",
        "html-has-lang",
        "emag-ancoras-primeiro-link",
        "emag-semantic-landmarks-missing",
        "emag-content-before-menu",
        "emag-heading-hierarchy",
    ] {
        assert!(find(&result.passes, id).is_some(), "{id} should pass");
    }
    // nothing on the page to match these against
    for id in ["css-inline", "emag-video-presence", "frame-title"] {
        assert!(
            find(&result.inapplicable, id).is_some(),
            "{id} should be inapplicable"
        );
    }
}

#[test]
fn test_image_alt_scenario() {
    let result = run_fixture("violations.html", Mode::Emag);

    let violation = find(&result.violations, "img-sem-alt-emag").unwrap();
    assert_eq!(violation.impact, Impact::Serious);
    assert_eq!(violation.nodes.len(), 1);
    assert_eq!(violation.nodes[0].target, "#sem-alt");
    assert!(violation.nodes[0]
        .failure_summary
        .as_deref()
        .unwrap()
        .contains("Corrija"));

    let pass = find(&result.passes, "img-sem-alt-emag").unwrap();
    assert_eq!(pass.nodes.len(), 1);
    assert_eq!(pass.nodes[0].target, "#com-alt");
}

#[test]
fn test_duplicate_link_text_scenario() {
    let result = run_fixture("violations.html", Mode::Emag);

    let violation = find(&result.violations, "emag-duplicate-link-text").unwrap();
    let targets: Vec<_> = violation.nodes.iter().map(|n| n.target.as_str()).collect();
    assert_eq!(targets, vec!["#saiba-1", "#saiba-2"]);

    // each flagged link lists the other's HTML in its duplicates data
    let data_of = |i: usize| violation.nodes[i].any[0].data.clone().unwrap();
    let first = data_of(0)["duplicates"][0]["html"].as_str().unwrap().to_string();
    assert!(first.contains("/page2"), "got {first}");
    let second = data_of(1)["duplicates"][0]["html"].as_str().unwrap().to_string();
    assert!(second.contains("/page1"), "got {second}");
}

#[test]
fn test_violations_page_flags_expected_rules() {
    let result = run_fixture("violations.html", Mode::Both);
    for id in [
        "img-sem-alt-emag",
        "emag-duplicate-link-text",
        "css-inline",
        "css-internal",
        "js-inline",
        "emag-multiple-h1",
        "emag-only-h1",
        "emag-tabindex-presence",
        "emag-tabindex-range",
        "emag-semantic-landmarks-missing",
        "document-title",
        "html-has-lang",
    ] {
        assert!(find(&result.violations, id).is_some(), "{id} should be violated");
    }
    // heading order itself is fine (h1, h1 has no level skip)
    assert!(find(&result.passes, "emag-heading-hierarchy").is_some());
}

#[test]
fn test_landmarks_violation_carries_missing_data() {
    let result = run_fixture("violations.html", Mode::Emag);
    let violation = find(&result.violations, "emag-semantic-landmarks-missing").unwrap();
    let data = violation.nodes[0].any[0].data.clone().unwrap();
    let missing: Vec<_> = data["missing"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(missing, vec!["header", "nav", "main", "footer"]);
}

#[test]
fn test_mode_filtering_end_to_end() {
    let emag = run_fixture("violations.html", Mode::Emag);
    let wcag = run_fixture("violations.html", Mode::Wcag);

    // an emag-only rule never shows up in wcag mode, in any bucket
    for bucket in [&wcag.violations, &wcag.passes, &wcag.incomplete, &wcag.inapplicable] {
        assert!(find(bucket, "css-inline").is_none());
    }
    // img-sem-alt-emag carries wcag2a and runs in both modes
    assert!(find(&wcag.violations, "img-sem-alt-emag").is_some());
    assert!(find(&emag.violations, "img-sem-alt-emag").is_some());
    // base wcag rules patched with the emag tag run in emag mode too
    assert!(find(&emag.violations, "document-title").is_some());
}

#[test]
fn test_dom_order_preserved_across_buckets() {
    let result = run_fixture("violations.html", Mode::Emag);
    let violation = find(&result.violations, "emag-duplicate-link-text").unwrap();
    let indexes: Vec<_> = violation.nodes.iter().map(|n| n.target.clone()).collect();
    assert_eq!(indexes, vec!["#saiba-1", "#saiba-2"]);
}

#[test]
fn test_cross_document_isolation() {
    let engine = AuditEngine::with_defaults(offline_config()).unwrap();

    // document A: conflicting links
    let doc_a = AuditDocument::parse(
        r#"<body><a href="/p1">Saiba mais</a><p>x</p><a href="/p2">Saiba mais</a></body>"#,
    );
    let result_a = engine.run(&doc_a, Mode::Emag);
    assert!(find(&result_a.violations, "emag-duplicate-link-text").is_some());

    // document B: a single link; no state may leak from run A
    let doc_b = AuditDocument::parse(r#"<body><a href="/p3">Saiba mais</a></body>"#);
    let result_b = engine.run(&doc_b, Mode::Emag);
    assert!(find(&result_b.violations, "emag-duplicate-link-text").is_none());
    assert!(find(&result_b.passes, "emag-duplicate-link-text").is_some());
}

#[test]
fn test_build_fails_fast_on_missing_check_reference() {
    let mut rule = Rule::new("regra-quebrada", "img");
    rule.any = vec!["check-inexistente".to_string()];
    rule.tags = vec!["emag".to_string()];

    let err = AuditEngine::build(Vec::new(), vec![rule], offline_config()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("check-inexistente"));
    assert!(message.contains("regra-quebrada"));
}

#[test]
fn test_custom_check_and_rule_roundtrip() {
    let check = Check::new("exige-caption", |node, ctx| {
        let has_caption = ctx
            .document()
            .element(node)
            .map(|el| {
                el.children().any(|c| {
                    c.value()
                        .as_element()
                        .is_some_and(|e| e.name().eq_ignore_ascii_case("caption"))
                })
            })
            .unwrap_or(false);
        Ok(CheckResult::from_bool(
            has_caption,
            "A tabela não possui um elemento caption",
        ))
    });
    let mut rule = Rule::new("tabela-caption", "table");
    rule.any = vec!["exige-caption".to_string()];
    rule.tags = vec!["emag".to_string()];
    rule.impact = Impact::Moderate;
    rule.metadata.help = "Tabelas devem ter caption.".to_string();
    rule.metadata.help_url = "https://emag.governoeletronico.gov.br/#r3.9".to_string();

    let engine = AuditEngine::build(vec![check], vec![rule], offline_config()).unwrap();
    let doc = AuditDocument::parse(
        r#"<body><table id="boa"><caption>Dados</caption></table><table id="ma"><tr><td>x</td></tr></table></body>"#,
    );
    let result = engine.run(&doc, Mode::Emag);

    assert_eq!(result.violations[0].nodes[0].target, "#ma");
    assert_eq!(result.passes[0].nodes[0].target, "#boa");
}

#[test]
fn test_json_wire_shape() {
    let result = run_fixture("violations.html", Mode::Both);
    let json = format_json(&result).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["mode"], "both");
    assert!(value["engine"]["name"].is_string());
    assert!(value["timestamp"].is_string());
    for bucket in ["violations", "passes", "incomplete", "inapplicable"] {
        assert!(value[bucket].is_array(), "{bucket} missing");
    }
    let first = &value["violations"][0];
    for key in ["id", "help", "helpUrl", "description", "impact", "tags", "nodes"] {
        assert!(first.get(key).is_some(), "{key} missing from rule result");
    }
    let node = &first["nodes"][0];
    assert!(node.get("target").is_some());
    assert!(node.get("html").is_some());
}

#[test]
fn test_overlay_markup_is_never_audited() {
    let engine = AuditEngine::with_defaults(offline_config()).unwrap();
    let doc = AuditDocument::parse(
        r#"<html lang="pt-BR"><head><title>Ok</title>
           <style data-emag-overlay>#x { outline: 4px solid red !important; }</style>
           </head><body><h1>a</h1><h2>b</h2><main></main></body></html>"#,
    );
    let result = engine.run(&doc, Mode::Emag);
    // the injected highlight style does not trigger the internal-CSS rule
    assert!(find(&result.violations, "css-internal").is_none());
    assert!(find(&result.inapplicable, "css-internal").is_some());
}

#[test]
fn test_disabled_probe_disables_broken_links_rule() {
    let result = run_fixture("violations.html", Mode::Emag);
    for bucket in [
        &result.violations,
        &result.passes,
        &result.incomplete,
        &result.inapplicable,
    ] {
        assert!(find(bucket, "emag-broken-links").is_none());
    }
}

#[test]
fn test_media_rules_report_incomplete() {
    let engine = AuditEngine::with_defaults(offline_config()).unwrap();
    let doc = AuditDocument::parse(
        r#"<body><video src="v.mp4"></video><iframe src="https://www.youtube.com/embed/abc"></iframe></body>"#,
    );
    let result = engine.run(&doc, Mode::Emag);
    assert!(find(&result.incomplete, "emag-video-presence").is_some());
    assert!(find(&result.incomplete, "emag-video-content-presence").is_some());
}
