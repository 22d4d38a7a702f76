//! thoth-notes — NoteRenderer (C7): renders analyzed papers as linked
//! markdown notes in the on-disk vault.

pub mod context;
pub mod renderer;
pub mod template;

pub use context::{build_context, CitationContext, ExtensionField, NoteContext};
pub use renderer::TemplateNoteRenderer;
