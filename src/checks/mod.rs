//! Check definitions and registry

mod builtin;
mod correlation;

pub use builtin::default_checks;

use crate::context::EvalContext;
use crate::document::AuditNode;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckRegistryError {
    #[error("duplicate check id: {0}")]
    Duplicate(String),
    #[error("unknown check id: {0}")]
    Unknown(String),
}

/// Evaluation failure inside a check predicate. Degrades the element's
/// verdict to cant-tell; never aborts the run.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct CheckError(pub String);

impl CheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// How a single check evaluated against one element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Predicate returned true
    Pass,
    /// Predicate returned false
    Fail,
    /// Ambiguous result requiring human review
    Incomplete,
}

/// The structured result of one check invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: Option<String>,
    pub data: Option<Value>,
}

impl CheckResult {
    pub fn pass() -> Self {
        Self {
            status: CheckStatus::Pass,
            message: None,
            data: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn incomplete(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Incomplete,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn from_bool(passed: bool, fail_message: &str) -> Self {
        if passed {
            Self::pass()
        } else {
            Self::fail(fail_message)
        }
    }

    /// Status-only false result, used by none-group condition checks when
    /// the disqualifying condition is absent
    pub fn absent() -> Self {
        Self {
            status: CheckStatus::Fail,
            message: None,
            data: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach structured context data (reported alongside the message)
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Predicate signature shared by every check
pub type CheckFn =
    Arc<dyn Fn(&AuditNode, &EvalContext) -> Result<CheckResult, CheckError> + Send + Sync>;

/// A named predicate evaluated against one element (or the document root)
#[derive(Clone)]
pub struct Check {
    /// Unique check identifier
    pub id: String,
    /// Optional human description
    pub description: Option<String>,
    evaluate: CheckFn,
}

impl Check {
    pub fn new(
        id: impl Into<String>,
        evaluate: impl Fn(&AuditNode, &EvalContext) -> Result<CheckResult, CheckError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            description: None,
            evaluate: Arc::new(evaluate),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Run the predicate against one element
    pub fn run(&self, node: &AuditNode, ctx: &EvalContext) -> Result<CheckResult, CheckError> {
        (self.evaluate)(node, ctx)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Immutable-after-build mapping from check id to predicate
#[derive(Debug, Default)]
pub struct CheckRegistry {
    checks: HashMap<String, Check>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check. Ids are unique; re-registering is a configuration bug.
    pub fn register(&mut self, check: Check) -> Result<(), CheckRegistryError> {
        if self.checks.contains_key(&check.id) {
            return Err(CheckRegistryError::Duplicate(check.id));
        }
        self.checks.insert(check.id.clone(), check);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Check, CheckRegistryError> {
        self.checks
            .get(id)
            .ok_or_else(|| CheckRegistryError::Unknown(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.checks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
