//! XML round-trip layer.
//!
//! The reader builds a document over the arena while recording, for every
//! node, the verbatim source region it came from. The writer emits those
//! regions untouched and falls back to rendering from parts only for
//! nodes that were created or whose attributes were edited after the
//! parse. Unedited documents therefore serialize back byte-identically.
//!
//! ```text
//!   bytes ──reader──▶ Document (+ raw regions) ──writer──▶ bytes
//!                        │ edits clear the region
//!                        ▼
//!                  re-rendered from parts
//! ```

mod reader;
mod writer;

pub(crate) use reader::parse;
pub(crate) use writer::serialize;
