use crate::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub type EventData = HashMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ToolCallStart,
    ToolCallOutputDelta,
    ToolCallEnd,
    ContextInvalidated,
    Warning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub timestamp: String,
    pub session_id: String,
    pub data: EventData,
}

impl SessionEvent {
    fn new(kind: EventKind, session_id: impl Into<String>, data: EventData) -> Self {
        Self {
            kind,
            timestamp: current_timestamp(),
            session_id: session_id.into(),
            data,
        }
    }

    pub fn tool_call_start(
        session_id: impl Into<String>,
        tool_name: impl Into<String>,
        call_index: usize,
    ) -> Self {
        Self::new(
            EventKind::ToolCallStart,
            session_id,
            EventData::from([
                ("tool_name".to_string(), Value::String(tool_name.into())),
                ("call_index".to_string(), Value::from(call_index)),
            ]),
        )
    }

    pub fn tool_call_output_delta(
        session_id: impl Into<String>,
        stream: OutputStream,
        chunk: impl Into<String>,
    ) -> Self {
        Self::new(
            EventKind::ToolCallOutputDelta,
            session_id,
            EventData::from([
                ("stream".to_string(), Value::String(stream.as_str().to_string())),
                ("chunk".to_string(), Value::String(chunk.into())),
            ]),
        )
    }

    pub fn tool_call_end(
        session_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: Option<String>,
        error: Option<String>,
        duration_ms: u128,
    ) -> Self {
        let mut data = EventData::from([
            ("tool_name".to_string(), Value::String(tool_name.into())),
            ("duration_ms".to_string(), Value::from(duration_ms as u64)),
        ]);
        if let Some(output) = output {
            data.insert("output".to_string(), Value::String(output));
        }
        if let Some(error) = error {
            data.insert("error".to_string(), Value::String(error));
        }
        Self::new(EventKind::ToolCallEnd, session_id, data)
    }

    pub fn context_invalidated(session_id: impl Into<String>, cwd: impl Into<String>) -> Self {
        Self::new(
            EventKind::ContextInvalidated,
            session_id,
            EventData::from([("cwd".to_string(), Value::String(cwd.into()))]),
        )
    }

    pub fn warning(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            EventKind::Warning,
            session_id,
            EventData::from([("message".to_string(), Value::String(message.into()))]),
        )
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError>;
}

#[derive(Default)]
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: SessionEvent) -> Result<(), AgentError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct BufferedEventEmitter {
    inner: Arc<Mutex<Vec<SessionEvent>>>,
}

impl BufferedEventEmitter {
    pub fn snapshot(&self) -> Vec<SessionEvent> {
        let guard = self.inner.lock().expect("buffered emitter mutex poisoned");
        guard.clone()
    }

    /// Concatenated output chunks for one stream, in arrival order.
    pub fn output(&self, stream: OutputStream) -> String {
        self.snapshot()
            .iter()
            .filter(|event| event.kind == EventKind::ToolCallOutputDelta)
            .filter(|event| event.data_str("stream") == Some(stream.as_str()))
            .filter_map(|event| event.data_str("chunk"))
            .collect()
    }
}

impl EventEmitter for BufferedEventEmitter {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError> {
        let mut guard = self.inner.lock().expect("buffered emitter mutex poisoned");
        guard.push(event);
        Ok(())
    }
}

/// Mirrors command output to the user's terminal as it arrives. Every other
/// event kind is ignored.
#[derive(Default)]
pub struct TerminalEventEmitter;

impl EventEmitter for TerminalEventEmitter {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError> {
        if event.kind != EventKind::ToolCallOutputDelta {
            return Ok(());
        }
        let Some(chunk) = event.data_str("chunk") else {
            return Ok(());
        };
        let result = if event.data_str("stream") == Some(OutputStream::Stderr.as_str()) {
            let mut stderr = std::io::stderr().lock();
            stderr.write_all(chunk.as_bytes()).and_then(|()| stderr.flush())
        } else {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(chunk.as_bytes()).and_then(|()| stdout.flush())
        };
        result.map_err(|error| AgentError::Execution(format!("failed to mirror output: {error}")))
    }
}

pub(crate) fn current_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}Z", now.as_secs(), now.subsec_millis())
}
