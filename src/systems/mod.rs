pub mod chapter;
pub mod combat_loop;
pub mod writer_context;

pub use chapter::{
    claim_archon_fragment, run_chapter_tick, AspectDecision, ChapterFlags, ChapterInputs,
    ChapterOutcome, NarrativeDirective,
};
pub use combat_loop::resolve_combat;
pub use writer_context::{build_writer_context, WriterContextBundle};
