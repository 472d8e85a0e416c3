use std::path::Path;

use vl_contracts::{AnalysisResult, FocusArea, Interpretation, Settings, SourcedAnalysis, VisionError};

use crate::artifacts::{AcquiredImage, TempArtifacts};
use crate::clipboard::{capture_clipboard, ClipboardCapture, SystemClipboard};
use crate::fetch::RemoteFetcher;
use crate::normalize::normalize_file;
use crate::source::ImageReference;
use crate::vision::{ChatCompletionsClient, VisionModel};

/// Resolve, acquire, normalize, analyze, interpret and clean up.
///
/// Holds no mutable state, so one instance can serve concurrent calls.
pub struct AnalysisPipeline {
    artifacts: TempArtifacts,
    clipboard: Box<dyn ClipboardCapture>,
    fetcher: RemoteFetcher,
    model: Box<dyn VisionModel>,
}

impl AnalysisPipeline {
    pub fn new(
        artifacts: TempArtifacts,
        clipboard: Box<dyn ClipboardCapture>,
        fetcher: RemoteFetcher,
        model: Box<dyn VisionModel>,
    ) -> Self {
        Self {
            artifacts,
            clipboard,
            fetcher,
            model,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, VisionError> {
        Ok(Self::new(
            TempArtifacts::from_settings(settings),
            Box::new(SystemClipboard::default()),
            RemoteFetcher::new()?,
            Box::new(ChatCompletionsClient::new(settings.clone())?),
        ))
    }

    pub fn artifacts(&self) -> &TempArtifacts {
        &self.artifacts
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn run(&self, input: Option<&str>, focus: FocusArea) -> Result<SourcedAnalysis, VisionError> {
        self.model.check_ready()?;

        let reference = ImageReference::resolve(input);
        log::info!(
            "analyzing {} image (focus: {focus})",
            reference.provenance().as_str()
        );
        let image = self.acquire(&reference)?;
        let outcome = self.analyze_acquired(&image, focus);
        let source = image.provenance();
        self.artifacts.release(image);

        match outcome {
            Ok(result) => {
                log::info!("analysis complete (source: {})", source.as_str());
                Ok(SourcedAnalysis { result, source })
            }
            Err(err) => {
                log::warn!("analysis failed [{}]: {err}", err.kind());
                Err(err)
            }
        }
    }

    fn acquire(&self, reference: &ImageReference) -> Result<AcquiredImage, VisionError> {
        match reference {
            ImageReference::Clipboard => capture_clipboard(self.clipboard.as_ref(), &self.artifacts)
                .ok_or(VisionError::NoImageAvailable),
            ImageReference::Url(url) => self.fetcher.fetch(url, &self.artifacts),
            ImageReference::Path(raw) => {
                let path = Path::new(raw);
                if !path.is_file() {
                    return Err(VisionError::FileSystem(format!(
                        "file does not exist: {}",
                        path.display()
                    )));
                }
                Ok(AcquiredImage::local(path))
            }
        }
    }

    /// Everything after acquisition. The caller owns cleanup of `image`.
    pub fn analyze_acquired(
        &self,
        image: &AcquiredImage,
        focus: FocusArea,
    ) -> Result<AnalysisResult, VisionError> {
        let canonical = normalize_file(image.path())?;
        log::info!(
            "normalized {} {}x{} ({})",
            canonical.metadata.format,
            canonical.metadata.width,
            canonical.metadata.height,
            canonical.metadata.file_size
        );

        let raw = self.model.analyze(&canonical, focus)?;
        let interpretation = Interpretation::parse(&raw);
        log::debug!(
            "model {} replied with {} text",
            self.model.name(),
            if interpretation.is_structured() { "structured" } else { "freeform" }
        );
        Ok(interpretation.into_result(canonical.metadata))
    }
}
