//! Streaming tag demultiplexer
//!
//! - `DemuxGrammar` - The delimiters framing each artifact
//! - `TagDemux` - Pure, incremental parser producing `DemuxEvent`s
//! - `ArtifactStreamer` - Publishes each artifact as a live stream message

pub mod artifacts;
pub mod grammar;
pub mod tag_demux;

pub use artifacts::ArtifactStreamer;
pub use grammar::{Delimiter, DemuxGrammar, GrammarError};
pub use tag_demux::{coalesce, DemuxEvent, DemuxPhase, TagDemux};
