pub mod analysis;
pub mod error;
pub mod focus;
pub mod settings;

pub use analysis::{
    AnalysisResult, ImageMetadata, Interpretation, Provenance, SourcedAnalysis, StructuredReply,
};
pub use error::VisionError;
pub use focus::FocusArea;
pub use settings::Settings;
