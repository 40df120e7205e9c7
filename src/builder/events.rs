//! Build event types for machine-readable output.
//!
//! Each event serializes to one JSON object per line, tagged by `reason`:
//!
//! - `module-started`: compilation of a module began
//! - `module-finished`: a module produced a successful target (fresh or cached)
//! - `module-failed`: a module produced a failed target
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::{ModuleName, Severity, Target};

/// A build event emitted by a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    #[serde(rename = "module-started")]
    ModuleStarted {
        module: ModuleName,
        /// Source fingerprint, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },

    #[serde(rename = "module-finished")]
    ModuleFinished {
        module: ModuleName,
        /// `false` when the target was reused from an earlier build
        fresh: bool,
        warnings: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },

    #[serde(rename = "module-failed")]
    ModuleFailed {
        module: ModuleName,
        errors: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        exception: Option<String>,
    },
}

impl BuildEvent {
    pub fn started(module: ModuleName, fingerprint: Option<&str>) -> Self {
        BuildEvent::ModuleStarted {
            module,
            fingerprint: fingerprint.map(str::to_string),
        }
    }

    /// The event that reports `target`: finished or failed.
    pub fn outcome(target: &Target, fresh: bool, duration_ms: Option<u64>) -> Self {
        if target.is_successful() {
            BuildEvent::ModuleFinished {
                module: target.name(),
                fresh,
                warnings: target.count(Severity::Warning),
                duration_ms,
            }
        } else {
            BuildEvent::ModuleFailed {
                module: target.name(),
                errors: target.count(Severity::Error),
                exception: target.exception().map(|e| e.to_string()),
            }
        }
    }

    pub fn module(&self) -> ModuleName {
        match self {
            BuildEvent::ModuleStarted { module, .. }
            | BuildEvent::ModuleFinished { module, .. }
            | BuildEvent::ModuleFailed { module, .. } => *module,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Receives build events. Called from build tasks, so it must not block for
/// long.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &BuildEvent);
}

impl<F> EventSink for F
where
    F: Fn(&BuildEvent) + Send + Sync,
{
    fn emit(&self, event: &BuildEvent) {
        self(event)
    }
}

/// Writes each event as a JSON line.
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        JsonLinesSink {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &BuildEvent) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{}", event.to_json()) {
            tracing::warn!(error = %e, "failed to write build event");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<BuildEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(EventLog::default())
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().clone()
    }

    pub fn for_module(&self, module: ModuleName) -> Vec<BuildEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.module() == module)
            .cloned()
            .collect()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &BuildEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::BuildError;
    use crate::core::{Message, Resources, SymbolTable};

    fn name(text: &str) -> ModuleName {
        ModuleName::parse(text).unwrap()
    }

    #[test]
    fn test_started_serialization() {
        let event = BuildEvent::started(name("app/1.0"), Some("abc123"));
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"module-started\""));
        assert!(json.contains("\"module\":\"app/1.0.0\""));
        assert!(json.contains("\"fingerprint\":\"abc123\""));
    }

    #[test]
    fn test_outcome_of_cached_success() {
        let target = Target::compiled(
            name("lib"),
            Arc::new(()),
            SymbolTable::new(),
            Resources::new(),
            vec![Message::warning("unused")],
        );
        let json = BuildEvent::outcome(&target, false, None).to_json();
        assert!(json.contains("\"reason\":\"module-finished\""));
        assert!(json.contains("\"fresh\":false"));
        assert!(json.contains("\"warnings\":1"));
        assert!(!json.contains("duration_ms"));
    }

    #[test]
    fn test_outcome_of_failure() {
        let target = Target::failed(
            name("lib"),
            BuildError::CompileFailure {
                name: name("lib"),
                message: "boom".into(),
            },
            vec![],
        );
        let json = BuildEvent::outcome(&target, true, Some(5)).to_json();
        assert!(json.contains("\"reason\":\"module-failed\""));
        assert!(json.contains("boom"));
    }

    #[test]
    fn test_json_lines_sink() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(&BuildEvent::started(name("a"), None));
        sink.emit(&BuildEvent::started(name("b"), None));

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("{\"reason\":\"module-started\"")));
    }

    #[test]
    fn test_event_log_filters_by_module() {
        let log = EventLog::new();
        log.emit(&BuildEvent::started(name("a"), None));
        log.emit(&BuildEvent::started(name("b"), None));
        assert_eq!(log.events().len(), 2);
        assert_eq!(log.for_module(name("a")).len(), 1);
    }
}
