//! Reassembly of a streamed generation into its two artifacts.
//!
//! The generator is asked to emit a small line-delimited protocol, but it is
//! a language model and may not. Parsing is therefore a chain of pure
//! strategies ending in one that cannot fail, and the live session forwards
//! every delta before any parsing happens.

mod reassembly;
mod session;

pub use reassembly::{
    Artifacts, ParseStrategy, line_records, raw, reassemble, reassemble_combined, whole_record,
};
pub use session::{SessionOptions, StreamEvent, reassemble_stream};
