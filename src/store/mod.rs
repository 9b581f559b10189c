pub mod debug;
pub mod glyph_store;
pub mod label_store;

pub use debug::DebugSink;
pub use glyph_store::GlyphStore;
pub use label_store::{LabelEntry, LabelStore};
