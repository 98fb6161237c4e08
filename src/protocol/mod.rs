//! Wire protocol: framing codecs, a chunk-safe line decoder, and the event
//! ordering validator.

pub mod codec;
pub mod decoder;
pub mod partial_json;
pub mod sequencer;

pub use codec::{decode_line, encode_event};
pub use decoder::EventDecoder;
pub use partial_json::parse_partial;
pub use sequencer::EventSequencer;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Line framing of a response body.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Framing {
    /// `<code>:<json>\n` lines, as produced by AI SDK data stream responses.
    #[default]
    DataStream,
    /// `data: <json>\n\n` server-sent events carrying tagged [`StreamEvent`](crate::types::StreamEvent)s.
    Sse,
}

impl Framing {
    /// Content type a backend should answer with.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::DataStream => "text/plain; charset=utf-8",
            Self::Sse => "text/event-stream",
        }
    }

    /// Whether a complete tool call for an unseen id implicitly opens it.
    pub(crate) fn allows_implicit_start(&self) -> bool {
        matches!(self, Self::DataStream)
    }
}
