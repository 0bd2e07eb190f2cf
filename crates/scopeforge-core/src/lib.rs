//! ScopeForge Core - scope model and refinement engine for AI project scoping
//!
//! ScopeForge turns a project description into a structured scope document
//! (phases, activities, staffing, costs, risks) and lets users refine it
//! through chat.
//!
//! # Architecture
//!
//! 1. **Scope model** (`scope`): the document, tolerant decoding of model
//!    output, validation and normalization
//! 2. **Refinement** (`refinement`): intent classification, mutation handlers
//!    and the deterministic recalculation passes
//! 3. **Generation** (`generation`): entity extraction, clarifying questions
//!    and first drafts
//! 4. **Knowledge** (`knowledge`): similar-project search over historical scopes
//!
//! Language models are reached only through [`TextGenerator`].
//!
//! # Quick Start
//!
//! ```
//! use scopeforge_core::scope::{Phase, ResourceAllocation, ScopeDocument, Timeline};
//! use scopeforge_core::refinement::timeline::adjust_timeline;
//!
//! let mut scope = ScopeDocument {
//!     timeline: Timeline {
//!         phases: vec![Phase::new("Plan", 4), Phase::new("Build", 12), Phase::new("Ship", 4)],
//!         ..Default::default()
//!     },
//!     resources: vec![ResourceAllocation::new("Project Manager", 1, 4.6, 10000.0)],
//!     ..Default::default()
//! };
//! scope.normalize();
//!
//! let output = adjust_timeline(&mut scope, "make it 2 weeks shorter");
//! assert_eq!(scope.timeline.total_duration_weeks, 16);
//! assert!(!output.changes.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod error;
pub mod generation;
pub mod knowledge;
pub mod llm;
pub mod project;
pub mod rates;
pub mod refinement;
pub mod scope;

// Re-export commonly used types for convenience
pub use error::{Result, ScopeError, ValidationError};
pub use generation::{ClarifyingQuestion, ProjectAnalysis, QuestionAnswer, ScopeGenerator};
pub use knowledge::{KnowledgeBase, SearchFilters, SimilarProject, SimilaritySearch};
pub use llm::{GenerationOptions, TextGenerator};
pub use project::{Complexity, ExtractedEntities, ProjectProfile};
pub use rates::RateCard;
pub use refinement::{Intent, RefinementConfig, RefinementEngine, RefinementOutcome};
pub use scope::{ScopeDocument, ValidationReport, ValidationWarning};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
