//! Structured flow logging shared by the client and all three services.
//!
//! Every user-initiated operation gets a fresh [`TraceId`] that threads
//! through each log line and the `X-Trace-ID` header, so one logical flow
//! can be followed across process boundaries. Lines have a fixed shape:
//!
//! `[timestamp] [trace_id=…] [component] direction [event] summary | k=v …`

use chrono::Local;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;

/// Length of the short trace token (kept short for log readability).
pub const TRACE_ID_LEN: usize = 8;

/// Opaque per-operation trace token, threaded through logs and headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    /// Generate a fresh 8-character alphanumeric token.
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TRACE_ID_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Wrap a token received from a peer (e.g. an `X-Trace-ID` header).
    pub fn from_header(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message direction relative to the logging component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Direction::Outbound => "→",
            Direction::Inbound => "←",
        }
    }
}

/// Strip query string and fragment from a URL, keeping scheme + host + path.
///
/// Falls back to truncating at `?` when the input does not parse as a URL.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw.split('?').next().unwrap_or(raw).to_string(),
    }
}

/// One structured flow event, built up and then emitted through `tracing`.
#[derive(Debug, Clone)]
pub struct FlowRecord {
    component: &'static str,
    direction: Direction,
    event: &'static str,
    summary: String,
    trace_id: Option<TraceId>,
    extras: Vec<(String, String)>,
}

impl FlowRecord {
    pub fn new(
        component: &'static str,
        direction: Direction,
        event: &'static str,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            component,
            direction,
            event,
            summary: summary.into(),
            trace_id: None,
            extras: Vec::new(),
        }
    }

    pub fn trace(mut self, trace_id: &TraceId) -> Self {
        self.trace_id = Some(trace_id.clone());
        self
    }

    /// Attach a key/value extra. `None` values are omitted entirely; values
    /// under a key containing "url" are redacted before inclusion.
    pub fn extra(mut self, key: &str, value: Option<impl fmt::Display>) -> Self {
        if let Some(value) = value {
            let rendered = value.to_string();
            let rendered = if key.to_ascii_lowercase().contains("url") {
                redact_url(&rendered)
            } else {
                rendered
            };
            self.extras.push((key.to_string(), rendered));
        }
        self
    }

    /// Render the log line for a given timestamp. Pure, so tests can pin
    /// the timestamp; production callers go through [`FlowRecord::emit`].
    pub fn format_line(&self, timestamp: &str) -> String {
        let mut parts = vec![format!("[{timestamp}]")];
        if let Some(trace_id) = &self.trace_id {
            parts.push(format!("[trace_id={trace_id}]"));
        }
        parts.push(format!("[{}]", self.component));
        parts.push(self.direction.arrow().to_string());
        parts.push(format!("[{}]", self.event));
        parts.push(self.summary.clone());

        if !self.extras.is_empty() {
            let rendered: Vec<String> = self
                .extras
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            parts.push(format!("| {}", rendered.join(" ")));
        }

        parts.join(" ")
    }

    /// Emit the record through `tracing`, error-leveled for failure events.
    pub fn emit(self) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        let line = self.format_line(&timestamp);
        let event = self.event.to_ascii_lowercase();
        if event.contains("error") || event.contains("failed") {
            tracing::error!(target: "flow", "{line}");
        } else {
            tracing::info!(target: "flow", "{line}");
        }
    }
}

/// One step of a request's end-to-end message flow.
#[derive(Debug, Clone)]
pub struct FlowStep {
    pub sender: &'static str,
    pub receiver: &'static str,
    pub what_happened: String,
    pub trace_id: Option<TraceId>,
    pub file_id: Option<String>,
    pub status: Option<&'static str>,
    pub duration_ms: Option<f64>,
    pub upload_url_host: Option<String>,
}

impl FlowStep {
    pub fn new(
        sender: &'static str,
        receiver: &'static str,
        what_happened: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            receiver,
            what_happened: what_happened.into(),
            trace_id: None,
            file_id: None,
            status: None,
            duration_ms: None,
            upload_url_host: None,
        }
    }

    pub fn trace(mut self, trace_id: &TraceId) -> Self {
        self.trace_id = Some(trace_id.clone());
        self
    }

    pub fn file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn status(mut self, status: &'static str) -> Self {
        self.status = Some(status);
        self
    }

    pub fn duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Record the upload target, redacted to scheme+host+path.
    pub fn upload_url(mut self, url: &str) -> Self {
        self.upload_url_host = Some(redact_url(url));
        self
    }
}

/// Per-request collector for a numbered flow summary, logged once the chat
/// round trip completes. Replaces the original's global collector with a
/// value owned by the request handler.
#[derive(Debug, Default)]
pub struct FlowSummary {
    steps: Vec<FlowStep>,
}

impl FlowSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, step: FlowStep) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render the banner-delimited summary block.
    pub fn render(&self) -> String {
        let banner = "=".repeat(80);
        let mut out = format!("\n{banner}\nMESSAGE FLOW SUMMARY\n{banner}\n");

        for (idx, step) in self.steps.iter().enumerate() {
            let mut identifiers = Vec::new();
            if let Some(trace_id) = &step.trace_id {
                identifiers.push(format!("trace_id={trace_id}"));
            }
            if let Some(file_id) = &step.file_id {
                identifiers.push(format!("file_id={file_id}"));
            }
            if let Some(host) = &step.upload_url_host {
                identifiers.push(format!("url={host}"));
            }

            let mut status_line = String::new();
            if let Some(status) = step.status {
                status_line.push_str(&format!(" | Status: {status}"));
            }
            if let Some(duration) = step.duration_ms {
                status_line.push_str(&format!(" | Duration: {duration:.2}ms"));
            }

            out.push_str(&format!(
                "\nStep {}: {} → {}\n  {}\n",
                idx + 1,
                step.sender,
                step.receiver,
                step.what_happened
            ));
            if !identifiers.is_empty() {
                out.push_str(&format!(
                    "  Identifiers: {}{status_line}\n",
                    identifiers.join(", ")
                ));
            }
        }

        out.push_str(&format!("\n{banner}\n"));
        out
    }

    /// Log the rendered summary and clear the collector.
    pub fn emit(&mut self) {
        if self.steps.is_empty() {
            return;
        }
        tracing::info!(target: "flow", "{}", self.render());
        self.steps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_short_alphanumeric_tokens() {
        let id = TraceId::generate();
        assert_eq!(id.as_str().len(), TRACE_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn consecutive_trace_ids_differ() {
        assert_ne!(TraceId::generate(), TraceId::generate());
    }

    #[test]
    fn redact_strips_query_string() {
        assert_eq!(
            redact_url("https://host/path?token=secret"),
            "https://host/path"
        );
    }

    #[test]
    fn redact_strips_fragment_and_keeps_port() {
        assert_eq!(
            redact_url("http://localhost:8001/upload?sig=abc#frag"),
            "http://localhost:8001/upload"
        );
    }

    #[test]
    fn redact_falls_back_on_unparseable_input() {
        assert_eq!(redact_url("not a url"), "not a url");
        assert_eq!(redact_url("not a url?with=query"), "not a url");
    }

    #[test]
    fn format_line_has_fixed_shape() {
        let trace = TraceId::from_header("abcd1234");
        let line = FlowRecord::new("UI", Direction::Outbound, "user_message", "User message: hi")
            .trace(&trace)
            .extra("file_attached", Some(false))
            .format_line("2026-01-02 03:04:05.678");

        assert_eq!(
            line,
            "[2026-01-02 03:04:05.678] [trace_id=abcd1234] [UI] → [user_message] \
             User message: hi | file_attached=false"
        );
    }

    #[test]
    fn format_line_without_trace_or_extras() {
        let line = FlowRecord::new("FILE_API", Direction::Inbound, "health", "Health check")
            .format_line("ts");
        assert_eq!(line, "[ts] [FILE_API] ← [health] Health check");
    }

    #[test]
    fn none_extras_are_omitted() {
        let line = FlowRecord::new("UI", Direction::Outbound, "e", "s")
            .extra("duration_ms", None::<f64>)
            .format_line("ts");
        assert!(!line.contains('|'));
    }

    #[test]
    fn url_keyed_extras_are_redacted() {
        let line = FlowRecord::new("UI", Direction::Outbound, "file_upload", "Uploading")
            .extra("upload_URL", Some("http://x/upload?token=secret"))
            .format_line("ts");
        assert!(line.ends_with("| upload_URL=http://x/upload"));
    }

    #[test]
    fn summary_renders_numbered_steps() {
        let trace = TraceId::from_header("tr4c3id0");
        let mut summary = FlowSummary::new();
        summary.add(
            FlowStep::new("UI", "AI_SERVICE", "User message: 'hi'")
                .trace(&trace),
        );
        summary.add(
            FlowStep::new("AI_SERVICE", "UI", "Chat response with elicitation")
                .trace(&trace)
                .duration_ms(12.5),
        );

        let rendered = summary.render();
        assert!(rendered.contains("MESSAGE FLOW SUMMARY"));
        assert!(rendered.contains("Step 1: UI → AI_SERVICE"));
        assert!(rendered.contains("Step 2: AI_SERVICE → UI"));
        assert!(rendered.contains("Duration: 12.50ms"));
        assert!(rendered.contains("trace_id=tr4c3id0"));
    }
}
