//! Tasting report pipeline: prompt construction, backend call, sectioning.

pub mod client;
pub mod prompt;
pub mod sectionizer;

pub use client::{contact_failure_text, GeminiClient, ReportBackend, EMPTY_RESPONSE_FALLBACK};
pub use prompt::build_analysis_prompt;
pub use sectionizer::{sectionize_report, ReportSection, SectionKey, NO_CONTENT_PLACEHOLDER};
