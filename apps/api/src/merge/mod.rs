// Template merge: placeholder tokenizer + substitution engine over the DOCX codec.
// Handlers call `merge` with raw template bytes; the engine never touches storage.

pub mod engine;
pub mod placeholder;

pub use engine::{merge, MergeError, ReplacementMap};
