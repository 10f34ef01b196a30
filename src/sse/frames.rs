//! Frame parser: raw text chunks to protocol frames.
//!
//! Network chunks arrive at arbitrary byte boundaries, so a single pending
//! line is buffered until its trailing newline shows up in a later chunk.
//! The event kind set by an `event:` line is *sticky* - it applies to every
//! following `data:` line until another `event:` line replaces it.

/// Literal data payload that marks end-of-stream on some transports.
/// Recognized and dropped without emitting a frame.
pub const END_OF_STREAM_SENTINEL: &str = "[DONE]";

/// The fixed set of event kinds the agent server emits.
///
/// Unrecognized labels (and data lines seen before any `event:` line) map to
/// `Unknown`; they are still decoded on a best-effort basis downstream so
/// degraded or legacy servers keep producing visible output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Metadata,
    Updates,
    Messages,
    MessagesTuple,
    Custom,
    Values,
    Debug,
    Error,
    End,
    Unknown,
}

impl EventKind {
    /// Map a wire label to an event kind.
    pub fn from_label(label: &str) -> Self {
        match label {
            "metadata" => EventKind::Metadata,
            "updates" => EventKind::Updates,
            "messages" => EventKind::Messages,
            "messages-tuple" => EventKind::MessagesTuple,
            "custom" => EventKind::Custom,
            "values" => EventKind::Values,
            "debug" => EventKind::Debug,
            "error" => EventKind::Error,
            "end" => EventKind::End,
            _ => EventKind::Unknown,
        }
    }

    /// The wire label for this kind, for logging.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Metadata => "metadata",
            EventKind::Updates => "updates",
            EventKind::Messages => "messages",
            EventKind::MessagesTuple => "messages-tuple",
            EventKind::Custom => "custom",
            EventKind::Values => "values",
            EventKind::Debug => "debug",
            EventKind::Error => "error",
            EventKind::End => "end",
            EventKind::Unknown => "unknown",
        }
    }
}

/// One event-kind + payload pair extracted from the raw stream.
/// Transient: not retained past decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: EventKind,
    pub data: String,
}

/// Stateful frame parser.
///
/// Owns the partial-line buffer and the sticky current event kind, keeping
/// the parser a pure, testable unit independent of the transport.
#[derive(Debug)]
pub struct FrameParser {
    /// Possibly-incomplete final line of the previous chunk
    pending_line: String,
    /// Event kind in effect for subsequent data lines
    current_kind: EventKind,
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            pending_line: String::new(),
            current_kind: EventKind::Unknown,
        }
    }

    /// Feed one raw chunk, returning every frame completed by it.
    ///
    /// The chunk is appended to the pending buffer, complete lines are
    /// processed, and the trailing (possibly incomplete) segment is
    /// re-buffered for the next chunk.
    pub fn feed_chunk(&mut self, chunk: &str) -> Vec<Frame> {
        self.pending_line.push_str(chunk);

        let mut frames = Vec::new();
        // Split off complete lines; the segment after the last newline stays
        // buffered because the next chunk may complete it.
        while let Some(newline_pos) = self.pending_line.find('\n') {
            let line: String = self.pending_line.drain(..=newline_pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.feed_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing unterminated line at stream close.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.pending_line.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending_line);
        self.feed_line(line.trim_end_matches('\r'))
    }

    /// Process one complete line, possibly emitting a frame.
    fn feed_line(&mut self, line: &str) -> Option<Frame> {
        // Blank lines and comments leave buffered state untouched.
        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        if let Some(label) = line.strip_prefix("event:") {
            self.current_kind = EventKind::from_label(label.trim());
            return None;
        }

        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.trim();
            if payload == END_OF_STREAM_SENTINEL {
                return None;
            }
            return Some(Frame {
                kind: self.current_kind.clone(),
                data: payload.to_string(),
            });
        }

        // Unknown line format - ignore like a comment
        None
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
