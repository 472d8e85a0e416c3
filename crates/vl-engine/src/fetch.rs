use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::Url;
use sha2::{Digest, Sha256};
use vl_contracts::{Provenance, VisionError};

use crate::artifacts::{AcquiredImage, TempArtifacts};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_DOWNLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const USER_AGENT: &str = concat!("mcp-vl/", env!("CARGO_PKG_VERSION"));

const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tiff", "tif"];
const DEFAULT_EXTENSION: &str = "png";

/// Downloads remote images into the temp artifact directory.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    http: HttpClient,
    max_bytes: u64,
}

impl RemoteFetcher {
    pub fn new() -> Result<Self, VisionError> {
        Self::with_limits(FETCH_TIMEOUT, MAX_DOWNLOAD_BYTES)
    }

    pub fn with_limits(timeout: Duration, max_bytes: u64) -> Result<Self, VisionError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| {
                VisionError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self::from_client(http, max_bytes))
    }

    pub fn from_client(http: HttpClient, max_bytes: u64) -> Self {
        Self { http, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Saves `url` as `downloaded_<millis>_<hash>.<ext>` and checks that the
    /// result decodes as an image. Nothing is left on disk when this fails.
    pub fn fetch(&self, url: &str, artifacts: &TempArtifacts) -> Result<AcquiredImage, VisionError> {
        log::info!("downloading image from {url}");
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| VisionError::download(None, format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VisionError::download(
                Some(status.as_u16()),
                format!(
                    "{url} returned {}",
                    status.canonical_reason().unwrap_or("an error status")
                ),
            ));
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(VisionError::download(
                    None,
                    format!("{url} is {length} bytes, over the {} byte limit", self.max_bytes),
                ));
            }
        }

        let path = artifacts
            .allocate("downloaded", Some(&short_hash(url)), extension_for(url))
            .map_err(|err| VisionError::FileSystem(format!("cannot create download file: {err}")))?;

        let written = match write_limited(response, &path, self.max_bytes) {
            Ok(written) => written,
            Err(err) => {
                artifacts.discard(&path);
                return Err(VisionError::download(
                    None,
                    format!("failed reading body of {url}: {err}"),
                ));
            }
        };
        if written > self.max_bytes {
            artifacts.discard(&path);
            return Err(VisionError::download(
                None,
                format!("{url} exceeds the {} byte limit", self.max_bytes),
            ));
        }

        if let Err(err) = probe_image(&path) {
            artifacts.discard(&path);
            return Err(VisionError::InvalidImage(format!(
                "{url} did not contain a decodable image: {err}"
            )));
        }

        log::info!("downloaded {written} bytes to {}", path.display());
        Ok(AcquiredImage::temporary(path, Provenance::Url))
    }
}

/// Copies at most `max_bytes + 1` bytes so an oversized body is detectable
/// without reading all of it.
fn write_limited(body: impl Read, path: &Path, max_bytes: u64) -> io::Result<u64> {
    let mut file = File::create(path)?;
    let mut limited = body.take(max_bytes.saturating_add(1));
    io::copy(&mut limited, &mut file)
}

fn probe_image(path: &Path) -> image::ImageResult<(u32, u32)> {
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
}

/// First four bytes of SHA-256 over the URL and a random nonce, as hex.
fn short_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}

/// Extension of the URL's last path segment when it names a known image type.
fn extension_for(url: &str) -> &'static str {
    let ext = Url::parse(url).ok().and_then(|parsed| {
        let segment = parsed.path_segments()?.next_back()?.to_string();
        let (_, ext) = segment.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    });
    ext.and_then(|ext| KNOWN_EXTENSIONS.iter().copied().find(|known| *known == ext))
        .unwrap_or(DEFAULT_EXTENSION)
}
