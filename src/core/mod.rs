pub mod analyzer;
pub mod control;
pub mod error;
pub mod extract;
pub mod generator;
pub mod model;
pub mod options;
pub mod orchestrator;
pub mod phase;
pub mod request;
pub mod risk;
pub mod session;
pub mod templates;

// Re-export the types the terminal layer works with
pub use control::ControlCommand;
pub use error::{PipelineError, Resolution};
pub use model::{AnalysisResult, CommandSuggestion, Severity, Vulnerability};
pub use options::{Mode, PasteTerminator, PipelineOptions};
pub use orchestrator::{Assistant, ControlOutcome, PhaseRow, StatusReport};
pub use phase::{Phase, PhaseMachine, PhaseStatus};
pub use session::{SessionSnapshot, SessionStore};
pub use templates::{TemplateCatalog, TemplateEntry};
