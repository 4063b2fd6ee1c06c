//! Event-stream reassembly for streamed chat completions
//!
//! Provides:
//! - Stateful UTF-8 decoding across chunk boundaries
//! - Line splitting with a carried-over partial line
//! - `data:` line classification into [`StreamEvent`]s
//! - A [`Reassembler`] that accumulates content deltas until `[DONE]`
//!   or end of stream

mod decoder;
mod reassembler;

pub use decoder::Utf8Decoder;
pub use reassembler::{
    classify_line, reassemble, LineBuffer, Reassembled, Reassembler, ReassemblyStats, StreamEvent,
    DONE_SENTINEL,
};
