use std::sync::{Arc, LazyLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;

use super::store::ArtifactStore;
use super::types::{ExtractionError, ImageFormat, SourceKind};

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"data:image/[A-Za-z0-9.+\-]+;base64,([A-Za-z0-9+/]+(?:[ \t]*\r?\n[ \t]*[A-Za-z0-9+/]+)*={0,2})",
    )
    .expect("valid regex")
});

static FENCED_PAYLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:base64|png|image)[^\n]*\n([A-Za-z0-9+/=\s]+?)\s*```")
        .expect("valid regex")
});

static IMAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9_./\\~\-]*[a-z0-9_\-]\.(?:png|jpe?g|gif|webp|svg)\b")
        .expect("valid regex")
});

/// Ways of obtaining a diagram from an agent response, in the order they are
/// tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    InlineEncoded,
    FilePathReference,
    Fallback,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [
        Strategy::InlineEncoded,
        Strategy::FilePathReference,
        Strategy::Fallback,
    ];

    fn source_kind(self) -> SourceKind {
        match self {
            Strategy::InlineEncoded => SourceKind::InlineEncoded,
            Strategy::FilePathReference => SourceKind::CopiedFile,
            Strategy::Fallback => SourceKind::Fallback,
        }
    }
}

/// Turns raw agent output into the id of a stored diagram.
pub struct ArtifactResolver {
    store: Arc<ArtifactStore>,
}

impl ArtifactResolver {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Always yields a resolvable artifact id. Strategy failures are logged
    /// and the next strategy is tried.
    pub async fn extract(&self, raw: &str) -> String {
        for strategy in Strategy::ORDER {
            match self.attempt(strategy, raw).await {
                Ok(Some(id)) => {
                    tracing::info!(
                        artifact_id = %id,
                        source_kind = %strategy.source_kind(),
                        "diagram resolved"
                    );
                    return id;
                }
                Ok(None) => {
                    tracing::debug!(?strategy, "no diagram candidate");
                }
                Err(err) => {
                    tracing::warn!(?strategy, error = %err, "diagram extraction failed");
                }
            }
        }
        self.store.fallback_id().to_string()
    }

    /// Runs a single strategy. `Ok(None)` means the strategy found nothing to
    /// work with.
    pub async fn attempt(
        &self,
        strategy: Strategy,
        raw: &str,
    ) -> Result<Option<String>, ExtractionError> {
        match strategy {
            Strategy::InlineEncoded => self.inline_encoded(raw).await,
            Strategy::FilePathReference => self.file_reference(raw).await,
            Strategy::Fallback => Ok(Some(self.store.fallback_id().to_string())),
        }
    }

    async fn inline_encoded(&self, raw: &str) -> Result<Option<String>, ExtractionError> {
        let mut last_err = None;
        for payload in encoded_payload_candidates(raw) {
            match decode_image(&payload) {
                Ok((bytes, format)) => {
                    let id = self.store.save_new(&bytes, format).await?;
                    return Ok(Some(id));
                }
                Err(err) => last_err = Some(err),
            }
        }
        last_err.map_or(Ok(None), Err)
    }

    async fn file_reference(&self, raw: &str) -> Result<Option<String>, ExtractionError> {
        let Some(path) = find_image_path(raw).await else {
            return Ok(None);
        };
        let unusable = |reason: String| ExtractionError::UnusableFile {
            path: path.clone(),
            reason,
        };
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| unusable(err.to_string()))?;
        let format = ImageFormat::sniff(&bytes)
            .or_else(|| ImageFormat::from_extension(&path))
            .ok_or_else(|| unusable("unknown image format".to_string()))?;
        let id = self.store.save_new(&bytes, format).await?;
        tracing::debug!(source = %path, artifact_id = %id, "copied referenced diagram");
        Ok(Some(id))
    }
}

/// First base64 image payload: a data URI (bare or inside an `<img>` tag),
/// else a fenced block tagged as base64 or image data.
pub fn find_encoded_payload(raw: &str) -> Option<String> {
    encoded_payload_candidates(raw).into_iter().next()
}

/// Whitespace-free readings of the first payload, longest first.
///
/// A line-wrapped data URI can run into the first word of the next line, so
/// each shorter run of leading lines is offered too.
pub fn encoded_payload_candidates(raw: &str) -> Vec<String> {
    let Some(found) = DATA_URI
        .captures(raw)
        .or_else(|| FENCED_PAYLOAD.captures(raw))
        .and_then(|caps| caps.get(1))
    else {
        return Vec::new();
    };
    let lines: Vec<&str> = found.as_str().lines().collect();
    let mut candidates: Vec<String> = (1..=lines.len())
        .rev()
        .map(|n| {
            lines[..n]
                .iter()
                .flat_map(|line| line.chars())
                .filter(|c| !c.is_whitespace())
                .collect()
        })
        .collect();
    candidates.retain(|payload: &String| !payload.is_empty());
    candidates.dedup();
    candidates
}

/// Decodes `payload` and checks it is a complete image.
pub fn decode_image(payload: &str) -> Result<(Vec<u8>, ImageFormat), ExtractionError> {
    let bytes = STANDARD.decode(payload)?;
    match ImageFormat::sniff(&bytes) {
        Some(format) if format.is_complete(&bytes) => Ok((bytes, format)),
        _ => Err(ExtractionError::NotAnImage),
    }
}

/// First path-like token naming an existing regular file with an image
/// extension.
pub async fn find_image_path(raw: &str) -> Option<String> {
    let text = raw.replace("file://", "");
    for candidate in IMAGE_PATH.find_iter(&text) {
        let candidate = candidate.as_str();
        if let Ok(metadata) = tokio::fs::metadata(candidate).await {
            if metadata.is_file() {
                return Some(candidate.to_string());
            }
        }
    }
    None
}
