//! Per-run evaluation context and cross-element state cache

use crate::document::AuditDocument;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

/// One link occurrence, as stored in the correlation indexes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkEntry {
    pub target: String,
    pub href: String,
    pub text: String,
    pub html: String,
}

/// Closed set of index shapes the correlation checks build.
///
/// Builders are pure functions of document state, so rebuilding an entry
/// always yields identical contents.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// Normalized link text -> every link carrying it
    LinkTextIndex(HashMap<String, Vec<LinkEntry>>),
    /// Href -> every link pointing at it
    LinkHrefIndex(HashMap<String, Vec<LinkEntry>>),
    /// Probed URL -> reachable / unreachable / probe error
    Reachability(HashMap<String, Result<bool, String>>),
    /// Lowercased accesskey value -> occurrence count
    AccesskeyCounts(HashMap<String, usize>),
}

/// Network probe capability used by the link-reachability check
pub trait UrlProber: Send + Sync {
    /// `Ok(true)` reachable, `Ok(false)` responded with an error status,
    /// `Err` transport failure or timeout (degrades to cant-tell).
    fn probe(&self, url: &str) -> Result<bool, String>;
}

/// Prober used when link probing is turned off or unavailable
pub struct DisabledProber;

impl UrlProber for DisabledProber {
    fn probe(&self, _url: &str) -> Result<bool, String> {
        Err("sondagem de links desabilitada".to_string())
    }
}

/// Blocking HTTP prober with per-request timeout
pub struct HttpProber {
    client: reqwest::blocking::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("emag-audit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client })
    }
}

impl UrlProber for HttpProber {
    fn probe(&self, url: &str) -> Result<bool, String> {
        // HEAD first; some servers reject it, retry those with GET
        match self.client.head(url).send() {
            Ok(resp) if resp.status().as_u16() != 405 => Ok(resp.status().as_u16() < 400),
            _ => match self.client.get(url).send() {
                Ok(resp) => Ok(resp.status().as_u16() < 400),
                Err(e) => Err(e.to_string()),
            },
        }
    }
}

/// Settings for the bounded link-probe pool
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub concurrency: usize,
    /// Base for resolving relative hrefs; relative links are skipped without it
    pub base_url: Option<String>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            concurrency: 8,
            base_url: None,
        }
    }
}

/// Per-run evaluation state passed to every check invocation.
///
/// Owns the cross-element cache. Entries are created lazily by the first
/// check that needs them and released when the owning rule's scope guard
/// drops, so two runs (or two pages) never observe each other's state.
pub struct EvalContext<'a> {
    doc: &'a AuditDocument,
    prober: &'a dyn UrlProber,
    probe: ProbeOptions,
    cache: RefCell<HashMap<String, Rc<CacheEntry>>>,
    scope_log: RefCell<Vec<String>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(doc: &'a AuditDocument, prober: &'a dyn UrlProber, probe: ProbeOptions) -> Self {
        Self {
            doc,
            prober,
            probe,
            cache: RefCell::new(HashMap::new()),
            scope_log: RefCell::new(Vec::new()),
        }
    }

    /// Context with link probing disabled, for offline evaluation
    pub fn detached(doc: &'a AuditDocument) -> Self {
        Self::new(doc, &DisabledProber, ProbeOptions::default())
    }

    pub fn document(&self) -> &AuditDocument {
        self.doc
    }

    pub fn prober(&self) -> &dyn UrlProber {
        self.prober
    }

    pub fn probe_options(&self) -> &ProbeOptions {
        &self.probe
    }

    /// Fetch a cache entry, building it on first use.
    ///
    /// The builder runs outside any cache borrow, so it may itself call
    /// `get_or_build` for a different key. Keys built inside a rule scope
    /// are released when that scope drops.
    pub fn get_or_build(
        &self,
        key: &str,
        build: impl FnOnce(&Self) -> CacheEntry,
    ) -> Rc<CacheEntry> {
        if let Some(hit) = self.cache.borrow().get(key) {
            return Rc::clone(hit);
        }
        let entry = Rc::new(build(self));
        self.cache
            .borrow_mut()
            .insert(key.to_string(), Rc::clone(&entry));
        self.scope_log.borrow_mut().push(key.to_string());
        entry
    }

    /// Open a scope that releases, on drop, every cache key built inside it.
    /// Drop runs on error paths too, which is what guarantees rules never
    /// leak state into later runs.
    pub fn rule_scope(&self) -> RuleScope<'_, 'a> {
        RuleScope {
            ctx: self,
            mark: self.scope_log.borrow().len(),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn cache_contains(&self, key: &str) -> bool {
        self.cache.borrow().contains_key(key)
    }
}

/// Guard tying cache entries to the evaluation of one rule
pub struct RuleScope<'c, 'a> {
    ctx: &'c EvalContext<'a>,
    mark: usize,
}

impl Drop for RuleScope<'_, '_> {
    fn drop(&mut self) {
        let released = self.ctx.scope_log.borrow_mut().split_off(self.mark);
        let mut cache = self.ctx.cache.borrow_mut();
        for key in released {
            cache.remove(&key);
        }
    }
}
