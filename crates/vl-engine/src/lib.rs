pub mod artifacts;
pub mod clipboard;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod vision;

#[cfg(test)]
pub(crate) mod test_support;

pub use reqwest::blocking::Client as HttpClient;

pub use artifacts::{AcquiredImage, TempArtifacts};
pub use clipboard::{ArboardClipboard, ClipboardCapture, CommandClipboard, SystemClipboard};
pub use fetch::RemoteFetcher;
pub use normalize::{normalize, normalize_file, CanonicalImage};
pub use pipeline::AnalysisPipeline;
pub use source::ImageReference;
pub use vision::{ChatCompletionsClient, CompletionOptions, VisionModel};
