//! Streaming tag demultiplexer
//!
//! Splits one token stream into named artifacts as it arrives. Each call to
//! [`TagDemux::feed`] handles one chunk of any size, never blocks, and returns
//! the artifact events the chunk completed. Text that might still turn out to
//! be the start of a delimiter is held back until the next chunk settles it.

use super::grammar::{Delimiter, DemuxGrammar};

/// Name used when an artifact's name block is blank
const UNNAMED_ARTIFACT: &str = "unnamed";

/// Parser position within the artifact grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxPhase {
    AwaitNameOpen,
    AccumulatingName,
    AwaitPayloadOpen,
    StreamingPayload,
    Terminal,
}

impl DemuxPhase {
    /// Delimiters that can move the parser out of this phase
    fn relevant(&self) -> &'static [Delimiter] {
        match self {
            DemuxPhase::AwaitNameOpen => &[Delimiter::NameOpen, Delimiter::End],
            DemuxPhase::AccumulatingName => &[Delimiter::NameClose, Delimiter::End],
            DemuxPhase::AwaitPayloadOpen => &[Delimiter::PayloadOpen, Delimiter::End],
            DemuxPhase::StreamingPayload => &[Delimiter::PayloadClose, Delimiter::End],
            DemuxPhase::Terminal => &[],
        }
    }
}

/// Something that happened to an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemuxEvent {
    /// The artifact's name is complete; its sub-stream starts now
    Opened { name: String },
    /// Payload text, verbatim
    Content { name: String, text: String },
    /// The artifact's sub-stream ended
    Closed { name: String },
}

/// Incremental demultiplexer for one generation
#[derive(Debug, Clone)]
pub struct TagDemux {
    grammar: DemuxGrammar,
    phase: DemuxPhase,
    buffer: String,
    pending_name: String,
    open: Option<String>,
}

impl TagDemux {
    pub fn new(grammar: DemuxGrammar) -> Self {
        Self {
            grammar,
            phase: DemuxPhase::AwaitNameOpen,
            buffer: String::new(),
            pending_name: String::new(),
            open: None,
        }
    }

    pub fn phase(&self) -> DemuxPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == DemuxPhase::Terminal
    }

    /// Name of the artifact currently receiving content
    pub fn open_artifact(&self) -> Option<&str> {
        self.open.as_deref()
    }

    /// Number of bytes held back waiting for the next chunk
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Process one chunk
    pub fn feed(&mut self, chunk: &str) -> Vec<DemuxEvent> {
        let mut events = Vec::new();
        if self.is_terminal() {
            if !chunk.is_empty() {
                tracing::debug!("[Demux] Ignoring {} bytes after end marker", chunk.len());
            }
            return events;
        }
        self.buffer.push_str(chunk);

        loop {
            match self.earliest_delimiter() {
                Some((pos, delimiter)) => {
                    let len = self.grammar.literal(delimiter).len();
                    let before = self.buffer[..pos].to_string();
                    self.buffer.drain(..pos + len);
                    self.absorb(&before, &mut events);
                    self.transition(delimiter, &mut events);
                    if self.is_terminal() {
                        self.buffer.clear();
                        break;
                    }
                }
                None => {
                    let keep = self.ambiguous_suffix();
                    let split = self.buffer.len() - keep;
                    let settled: String = self.buffer.drain(..split).collect();
                    self.absorb(&settled, &mut events);
                    break;
                }
            }
        }
        events
    }

    /// End of the upstream stream
    ///
    /// Behaves like the end marker: held-back text is settled and an artifact
    /// still open is closed. Calling it again is a no-op.
    pub fn finish(&mut self) -> Vec<DemuxEvent> {
        let mut events = Vec::new();
        if self.is_terminal() {
            return events;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.absorb(&rest, &mut events);
        if let Some(name) = &self.open {
            tracing::warn!(
                "[Demux] Stream ended without end marker; force-closing '{}'",
                name
            );
        }
        self.transition(Delimiter::End, &mut events);
        events
    }

    /// Earliest complete delimiter relevant to the current phase
    fn earliest_delimiter(&self) -> Option<(usize, Delimiter)> {
        self.phase
            .relevant()
            .iter()
            .filter_map(|d| {
                self.buffer
                    .find(self.grammar.literal(*d))
                    .map(|pos| (pos, *d))
            })
            .min_by_key(|(pos, _)| *pos)
    }

    /// Length of the longest buffer suffix that could begin a relevant delimiter
    fn ambiguous_suffix(&self) -> usize {
        let len = self.buffer.len();
        let max = self.grammar.longest().saturating_sub(1).min(len);
        for keep in (1..=max).rev() {
            let start = len - keep;
            if !self.buffer.is_char_boundary(start) {
                continue;
            }
            let tail = &self.buffer[start..];
            if self
                .phase
                .relevant()
                .iter()
                .any(|d| self.grammar.literal(*d).starts_with(tail))
            {
                return keep;
            }
        }
        0
    }

    /// Route settled text according to the current phase
    fn absorb(&mut self, text: &str, events: &mut Vec<DemuxEvent>) {
        if text.is_empty() {
            return;
        }
        match self.phase {
            DemuxPhase::StreamingPayload => {
                if let Some(name) = &self.open {
                    events.push(DemuxEvent::Content {
                        name: name.clone(),
                        text: text.to_string(),
                    });
                }
            }
            DemuxPhase::AccumulatingName => self.pending_name.push_str(text),
            DemuxPhase::AwaitNameOpen | DemuxPhase::AwaitPayloadOpen | DemuxPhase::Terminal => {}
        }
    }

    fn transition(&mut self, delimiter: Delimiter, events: &mut Vec<DemuxEvent>) {
        match delimiter {
            Delimiter::NameOpen => {
                self.pending_name.clear();
                self.phase = DemuxPhase::AccumulatingName;
            }
            Delimiter::NameClose => {
                let mut name = self.pending_name.trim().to_string();
                self.pending_name.clear();
                if name.is_empty() {
                    tracing::warn!("[Demux] Artifact with blank name");
                    name = UNNAMED_ARTIFACT.to_string();
                }
                tracing::debug!("[Demux] Artifact opened: {}", name);
                events.push(DemuxEvent::Opened { name: name.clone() });
                self.open = Some(name);
                self.phase = DemuxPhase::AwaitPayloadOpen;
            }
            Delimiter::PayloadOpen => {
                self.phase = DemuxPhase::StreamingPayload;
            }
            Delimiter::PayloadClose => {
                if let Some(name) = self.open.take() {
                    tracing::debug!("[Demux] Artifact closed: {}", name);
                    events.push(DemuxEvent::Closed { name });
                }
                self.phase = DemuxPhase::AwaitNameOpen;
            }
            Delimiter::End => {
                if self.phase == DemuxPhase::AccumulatingName && !self.pending_name.is_empty() {
                    tracing::warn!(
                        "[Demux] Discarding incomplete artifact name '{}'",
                        self.pending_name
                    );
                }
                self.pending_name.clear();
                if let Some(name) = self.open.take() {
                    events.push(DemuxEvent::Closed { name });
                }
                self.phase = DemuxPhase::Terminal;
            }
        }
    }
}

impl Default for TagDemux {
    fn default() -> Self {
        Self::new(DemuxGrammar::default())
    }
}

/// Merge adjacent content events of the same artifact
///
/// Content segmentation depends on how the input was chunked; merging makes
/// event sequences from differently chunked inputs comparable.
pub fn coalesce(events: Vec<DemuxEvent>) -> Vec<DemuxEvent> {
    let mut merged: Vec<DemuxEvent> = Vec::with_capacity(events.len());
    for event in events {
        if let DemuxEvent::Content { name, text } = &event {
            if let Some(DemuxEvent::Content {
                name: last_name,
                text: last_text,
            }) = merged.last_mut()
            {
                if last_name == name {
                    last_text.push_str(text);
                    continue;
                }
            }
        }
        merged.push(event);
    }
    merged
}
