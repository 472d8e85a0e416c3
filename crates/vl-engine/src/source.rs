use reqwest::Url;
use vl_contracts::Provenance;

/// Classified image input. Built once from the caller's optional string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    Path(String),
    Url(String),
    Clipboard,
}

impl ImageReference {
    /// Blank or absent input means the clipboard; an absolute `http`/`https`
    /// URL is a remote image; anything else is treated as a local path.
    pub fn resolve(input: Option<&str>) -> Self {
        let Some(raw) = input.map(str::trim).filter(|value| !value.is_empty()) else {
            return ImageReference::Clipboard;
        };
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                ImageReference::Url(raw.to_string())
            }
            _ => ImageReference::Path(raw.to_string()),
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            ImageReference::Path(_) => Provenance::File,
            ImageReference::Url(_) => Provenance::Url,
            ImageReference::Clipboard => Provenance::Clipboard,
        }
    }
}
