//! Interfaces to the browser-automation and screenshot collaborators
//!
//! The engine audits a static snapshot; these traits are how the serving
//! layer plugs a live page in to enrich violations with visual evidence.

use crate::document::OVERLAY_ATTR;
use crate::results::RunResult;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("{0}")]
pub struct PageError(pub String);

impl PageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Capabilities the headless-browser layer provides over the loaded page
pub trait PageBrowser {
    /// Opaque element handle inside the live page
    type Handle;

    fn inject_script(&mut self, source: &str) -> Result<(), PageError>;
    fn evaluate_in_page(&mut self, script: &str) -> Result<serde_json::Value, PageError>;
    fn query_element(&mut self, selector: &str) -> Result<Option<Self::Handle>, PageError>;
    fn screenshot_element(&mut self, handle: &Self::Handle) -> Result<Vec<u8>, PageError>;
}

/// Persists captured screenshots and hands back a fetchable URL
pub trait ScreenshotStore {
    fn store(&mut self, rule_id: &str, png: &[u8]) -> Result<String, PageError>;
}

/// Highlight style injected before capturing, tagged so the engine never
/// audits it
fn highlight_script(selector: &str) -> String {
    let css = format!("{selector} {{ outline: 4px solid red !important; }}");
    format!(
        "(() => {{ const s = document.createElement('style'); \
         s.setAttribute('{OVERLAY_ATTR}', ''); \
         s.textContent = {css:?}; \
         document.head.appendChild(s); }})()"
    )
}

/// Walk violation nodes and attach element screenshots.
///
/// Page-level rules are skipped (there is nothing meaningful to frame).
/// Per-node failures are logged and skipped, never fatal. Returns how many
/// nodes were annotated.
pub fn annotate_screenshots<B, S>(result: &mut RunResult, browser: &mut B, store: &mut S) -> usize
where
    B: PageBrowser,
    S: ScreenshotStore,
{
    let mut annotated = 0;
    for rule in result.violations.iter_mut().filter(|r| !r.page_level) {
        for node in &mut rule.nodes {
            match capture_node(browser, store, &rule.id, &node.target) {
                Ok(Some(url)) => {
                    node.screenshot = Some(url);
                    annotated += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!(
                        "ignorando erro de screenshot para o seletor {:?}: {e}",
                        node.target
                    );
                }
            }
        }
    }
    annotated
}

fn capture_node<B, S>(
    browser: &mut B,
    store: &mut S,
    rule_id: &str,
    target: &str,
) -> Result<Option<String>, PageError>
where
    B: PageBrowser,
    S: ScreenshotStore,
{
    let Some(handle) = browser.query_element(target)? else {
        return Ok(None);
    };
    browser.inject_script(&highlight_script(target))?;
    let png = browser.screenshot_element(&handle)?;
    let url = store.store(rule_id, &png)?;
    Ok(Some(url))
}
