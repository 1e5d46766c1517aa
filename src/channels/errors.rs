use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An error event recorded on the errors channel.
///
/// Error events are ordinary state: nodes append them for recoverable
/// failures (a tool timing out, a source returning nothing) and the runner
/// appends them for engine-level faults, so diagnostics survive in the
/// checkpoint chain alongside the conversation they belong to.
///
/// # Examples
///
/// ```
/// use mealgraph::channels::errors::{ErrorEvent, CauseChain};
/// use serde_json::json;
///
/// let event = ErrorEvent::node("vendor_search", 2, CauseChain::msg("source timed out"))
///     .with_tag("tool")
///     .with_context(json!({"source": "places_search"}));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    #[serde(default)]
    pub error: CauseChain,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl ErrorEvent {
    /// Create a node-scoped error event.
    pub fn node<S: Into<String>>(kind: S, step: u64, error: CauseChain) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Node {
                kind: kind.into(),
                step,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a runner-scoped error event.
    pub fn runner<S: Into<String>>(thread: S, step: u64, error: CauseChain) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Runner {
                thread: thread.into(),
                step,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create an app-scoped error event.
    pub fn app(error: CauseChain) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::App,
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Add a single tag to this error event.
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add context metadata to this error event.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Where in the engine an error event originated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    Node {
        kind: String,
        step: u64,
    },
    Runner {
        thread: String,
        step: u64,
    },
    #[default]
    App,
}

/// A message with an optional nested cause, serializable as plain data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CauseChain {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<CauseChain>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Default for CauseChain {
    fn default() -> Self {
        CauseChain {
            message: String::new(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for CauseChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CauseChain {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

impl CauseChain {
    pub fn msg<M: Into<String>>(m: M) -> Self {
        CauseChain {
            message: m.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_cause(mut self, cause: CauseChain) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_serializes_tagged() {
        let event = ErrorEvent::node("router", 3, CauseChain::msg("boom"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["scope"]["scope"], "node");
        assert_eq!(json["scope"]["kind"], "router");
        assert_eq!(json["scope"]["step"], 3);
    }

    #[test]
    fn cause_chain_sources() {
        let err = CauseChain::msg("outer").with_cause(CauseChain::msg("inner"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "inner");
    }

    #[test]
    fn context_round_trip() {
        let event = ErrorEvent::app(CauseChain::msg("startup"))
            .with_tag("fatal")
            .with_context(json!({"phase": "boot"}));
        let json = serde_json::to_string(&event).unwrap();
        let back: ErrorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tags, vec!["fatal"]);
        assert_eq!(back.context["phase"], "boot");
    }
}
