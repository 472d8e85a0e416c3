/// Every failure the image pipeline can surface to a caller.
///
/// Display strings are what the MCP tool reports back, so each variant reads
/// as a full sentence fragment.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no image available: no imagePath was provided and the clipboard does not contain an image")]
    NoImageAvailable,

    #[error("download failed{}: {message}", status_suffix(.status))]
    Download { status: Option<u16>, message: String },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("vision service error{}: {message}", status_suffix(.status))]
    RemoteService { status: Option<u16>, message: String },

    #[error("file system error: {0}")]
    FileSystem(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    pub fn download(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Download {
            status,
            message: message.into(),
        }
    }

    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteService {
            status,
            message: message.into(),
        }
    }

    /// Stable short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::NoImageAvailable => "no_image",
            Self::Download { .. } => "download",
            Self::InvalidImage(_) => "invalid_image",
            Self::RemoteService { .. } => "remote_service",
            Self::FileSystem(_) => "file_system",
            Self::Io(_) => "io",
        }
    }

    /// Upstream HTTP status for download and remote-service failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Download { status, .. } | Self::RemoteService { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}
