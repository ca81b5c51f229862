//! Checks that correlate state across the whole document
//!
//! Each of these builds a document-wide index on first invocation and reuses
//! it for every other element the owning rule visits. The index lives in the
//! cross-element cache under a key scoped to the owning rule, so the rule's
//! scope guard releases it when evaluation finishes.

use super::{Check, CheckError, CheckResult};
use crate::context::{CacheEntry, EvalContext, LinkEntry};
use crate::document::AuditDocument;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use scraper::Selector;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

pub const LINK_TEXT_CACHE: &str = "emag-duplicate-link-text:by-text";
pub const LINK_HREF_CACHE: &str = "emag-same-href-different-text:by-href";
pub const REACHABILITY_CACHE: &str = "emag-broken-links:reachability";
pub const ACCESSKEY_CACHE: &str = "emag-ancoras-acesskey-unico:counts";

static HYPERLINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

pub fn checks() -> Vec<Check> {
    vec![
        Check::new("accesskey-unico", |_, ctx| {
            let entry = ctx.get_or_build(ACCESSKEY_CACHE, |c| build_accesskey_counts(c.document()));
            let CacheEntry::AccesskeyCounts(counts) = entry.as_ref() else {
                return Err(CheckError::new("índice de accesskey com formato inesperado"));
            };
            let mut duplicated: Vec<&str> = counts
                .iter()
                .filter(|(_, &n)| n > 1)
                .map(|(k, _)| k.as_str())
                .collect();
            duplicated.sort_unstable();
            if duplicated.is_empty() {
                Ok(CheckResult::pass())
            } else {
                Ok(CheckResult::fail(
                    "A página declara valores de accesskey duplicados",
                )
                .with_data(json!({ "duplicates": duplicated })))
            }
        })
        .with_description("Accesskeys devem ser únicas na página"),
        Check::new("duplicate-link-text-check", |node, ctx| {
            let Some(href) = node.attr("href") else {
                return Ok(CheckResult::pass());
            };
            let text = normalize(&ctx.document().accessible_text(node));
            if text.is_empty() {
                return Ok(CheckResult::pass());
            }
            let entry = ctx.get_or_build(LINK_TEXT_CACHE, |c| build_text_index(c.document()));
            let CacheEntry::LinkTextIndex(index) = entry.as_ref() else {
                return Err(CheckError::new("índice de links com formato inesperado"));
            };
            let conflicts: Vec<&LinkEntry> = index
                .get(&text)
                .map(|entries| entries.iter().filter(|e| e.href != href).collect())
                .unwrap_or_default();
            if conflicts.is_empty() {
                Ok(CheckResult::pass())
            } else {
                Ok(CheckResult::fail(
                    "Outros links usam o mesmo texto apontando para destinos diferentes",
                )
                .with_data(json!({ "duplicates": conflicts })))
            }
        })
        .with_description("Links com o mesmo texto devem apontar para o mesmo destino"),
        Check::new("same-href-text-check", |node, ctx| {
            let Some(href) = node.attr("href") else {
                return Ok(CheckResult::pass());
            };
            let text = normalize(&ctx.document().accessible_text(node));
            let entry = ctx.get_or_build(LINK_HREF_CACHE, |c| build_href_index(c.document()));
            let CacheEntry::LinkHrefIndex(index) = entry.as_ref() else {
                return Err(CheckError::new("índice de links com formato inesperado"));
            };
            let conflicts: Vec<&LinkEntry> = index
                .get(href)
                .map(|entries| {
                    entries
                        .iter()
                        .filter(|e| normalize(&e.text) != text)
                        .collect()
                })
                .unwrap_or_default();
            if conflicts.is_empty() {
                Ok(CheckResult::pass())
            } else {
                Ok(CheckResult::fail(
                    "Outros links apontam para o mesmo destino com texto diferente",
                )
                .with_data(json!({ "conflictingLinks": conflicts })))
            }
        })
        .with_description("Links para o mesmo destino devem usar o mesmo texto"),
        Check::new("link-reachable-check", |node, ctx| {
            let Some(href) = node.attr("href") else {
                return Ok(CheckResult::pass());
            };
            let base = ctx.probe_options().base_url.clone();
            let Some(url) = probeable_url(href, base.as_deref()) else {
                return Ok(CheckResult::pass());
            };
            let entry = ctx.get_or_build(REACHABILITY_CACHE, build_reachability);
            let CacheEntry::Reachability(results) = entry.as_ref() else {
                return Err(CheckError::new("índice de alcançabilidade com formato inesperado"));
            };
            match results.get(&url) {
                Some(Ok(true)) | None => Ok(CheckResult::pass()),
                Some(Ok(false)) => Ok(CheckResult::fail(format!(
                    "O link \"{href}\" respondeu com um status de erro"
                ))),
                Some(Err(e)) => Err(CheckError::new(format!(
                    "não foi possível verificar \"{href}\": {e}"
                ))),
            }
        })
        .with_description("Links devem apontar para destinos alcançáveis"),
    ]
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn link_entries(doc: &AuditDocument) -> Vec<LinkEntry> {
    doc.select(&HYPERLINKS)
        .into_iter()
        .map(|node| LinkEntry {
            target: node.target.clone(),
            href: node.attr("href").unwrap_or_default().to_string(),
            text: doc.accessible_text(node),
            html: node.html.clone(),
        })
        .collect()
}

fn build_text_index(doc: &AuditDocument) -> CacheEntry {
    let mut index: HashMap<String, Vec<LinkEntry>> = HashMap::new();
    for entry in link_entries(doc) {
        let key = normalize(&entry.text);
        if key.is_empty() {
            continue;
        }
        index.entry(key).or_default().push(entry);
    }
    CacheEntry::LinkTextIndex(index)
}

fn build_href_index(doc: &AuditDocument) -> CacheEntry {
    let mut index: HashMap<String, Vec<LinkEntry>> = HashMap::new();
    for entry in link_entries(doc) {
        if entry.href.trim().is_empty() {
            continue;
        }
        index.entry(entry.href.clone()).or_default().push(entry);
    }
    CacheEntry::LinkHrefIndex(index)
}

fn build_accesskey_counts(doc: &AuditDocument) -> CacheEntry {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for node in doc.nodes() {
        if let Some(key) = node.attr("accesskey") {
            *counts.entry(key.to_lowercase()).or_insert(0) += 1;
        }
    }
    CacheEntry::AccesskeyCounts(counts)
}

/// Probe every unique probeable URL once, with bounded concurrency
fn build_reachability(ctx: &EvalContext) -> CacheEntry {
    let doc = ctx.document();
    let base = ctx.probe_options().base_url.clone();
    let urls: BTreeSet<String> = doc
        .select(&HYPERLINKS)
        .into_iter()
        .filter_map(|n| n.attr("href"))
        .filter_map(|href| probeable_url(href, base.as_deref()))
        .collect();
    let urls: Vec<String> = urls.into_iter().collect();
    let prober = ctx.prober();

    let workers = ctx.probe_options().concurrency.max(1);
    let results: HashMap<String, Result<bool, String>> =
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| {
                urls.par_iter()
                    .map(|url| (url.clone(), prober.probe(url)))
                    .collect()
            }),
            Err(e) => {
                log::warn!("pool de sondagem indisponível ({e}); sondando sequencialmente");
                urls.iter()
                    .map(|url| (url.clone(), prober.probe(url)))
                    .collect()
            }
        };
    log::debug!("{} URLs sondadas", results.len());
    CacheEntry::Reachability(results)
}

/// Resolve an href into an absolute http(s) URL worth probing
fn probeable_url(href: &str, base: Option<&str>) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
        || href.starts_with("data:")
    {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = reqwest::Url::parse(base?).ok()?;
    let joined = base.join(href).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}
