//! Publishes demultiplexed artifacts on the Report Bus
//!
//! Every artifact becomes its own streaming `file_upload` message, reported
//! as soon as its name is known and fed while the generation is still
//! running.

use crate::core::{Message, StreamSender};
use crate::runtime::Reporter;

use super::grammar::DemuxGrammar;
use super::tag_demux::{DemuxEvent, TagDemux};

pub struct ArtifactStreamer {
    demux: TagDemux,
    reporter: Reporter,
    send_from: String,
    send_to: String,
    cause_by: String,
    open: Option<StreamSender>,
    artifacts: Vec<String>,
}

impl ArtifactStreamer {
    pub fn new(
        grammar: DemuxGrammar,
        reporter: Reporter,
        send_from: impl Into<String>,
        send_to: impl Into<String>,
    ) -> Self {
        Self {
            demux: TagDemux::new(grammar),
            reporter,
            send_from: send_from.into(),
            send_to: send_to.into(),
            cause_by: String::new(),
            open: None,
            artifacts: Vec::new(),
        }
    }

    /// Action recorded as the origin of each artifact message
    pub fn with_cause_by(mut self, cause_by: impl Into<String>) -> Self {
        self.cause_by = cause_by.into();
        self
    }

    /// Feed one chunk of the generation
    pub fn feed(&mut self, chunk: &str) {
        let events = self.demux.feed(chunk);
        self.apply(events);
    }

    /// End of the generation; closes an artifact left open
    ///
    /// Returns the names of all artifacts, in order.
    pub fn finish(mut self) -> Vec<String> {
        let events = self.demux.finish();
        self.apply(events);
        if let Some(mut sender) = self.open.take() {
            sender.finish();
        }
        self.artifacts
    }

    /// Names of the artifacts opened so far
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    fn apply(&mut self, events: Vec<DemuxEvent>) {
        for event in events {
            match event {
                DemuxEvent::Opened { name } => self.open_artifact(name),
                DemuxEvent::Content { text, .. } => {
                    if let Some(sender) = &self.open {
                        sender.send(text);
                    }
                }
                DemuxEvent::Closed { name } => {
                    if let Some(mut sender) = self.open.take() {
                        sender.finish();
                    }
                    tracing::debug!("[Demux] Artifact '{}' complete", name);
                }
            }
        }
    }

    fn open_artifact(&mut self, name: String) {
        if let Some(mut previous) = self.open.take() {
            previous.finish();
        }
        let (message, sender) =
            Message::file_upload_stream(&self.send_from, &self.send_to, &name);
        let message = message.with_cause_by(&self.cause_by);
        tracing::debug!("[Demux] Artifact '{}' opened as message {}", name, message.id);
        self.reporter.report(message);
        self.open = Some(sender);
        self.artifacts.push(name);
    }
}
