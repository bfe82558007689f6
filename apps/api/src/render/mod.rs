// Résumé PDF generation: LaTeX rendering (pure) and the compiler pipeline.
// The pipeline owns every temporary file it creates; see pipeline.rs.

pub mod handlers;
pub mod latex;
pub mod pipeline;

pub use pipeline::{CompilationPipeline, CompileError};
