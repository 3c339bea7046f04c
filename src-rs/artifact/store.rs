use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::types::{Artifact, ImageFormat};
use crate::error::ServiceError;

/// Placeholder diagram served whenever nothing better is available.
const FALLBACK_IMAGE: &[u8] = include_bytes!("../assets/sample.png");

const GENERATED_PREFIX: &str = "architecture_";

static COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Directory of write-once diagram files keyed by filename.
pub struct ArtifactStore {
    root: PathBuf,
    fallback_id: String,
}

impl ArtifactStore {
    /// Opens (creating if needed) the store at `root` and makes sure the
    /// fallback artifact is present.
    pub async fn open(root: impl Into<PathBuf>, fallback_id: &str) -> Result<Self, ServiceError> {
        let root = root.into();
        if !is_valid_id(fallback_id) {
            return Err(ServiceError::Config(format!(
                "invalid fallback diagram name {fallback_id:?}"
            )));
        }
        fs::create_dir_all(&root).await?;

        let store = Self {
            root,
            fallback_id: fallback_id.to_string(),
        };
        match write_new(&store.path_for(fallback_id), FALLBACK_IMAGE).await {
            Ok(()) => tracing::info!(artifact_id = fallback_id, "installed fallback diagram"),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err.into()),
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fallback_id(&self) -> &str {
        &self.fallback_id
    }

    /// Persists `bytes` under a freshly generated id. Never replaces an
    /// existing file.
    pub async fn save_new(&self, bytes: &[u8], format: ImageFormat) -> std::io::Result<String> {
        loop {
            let id = next_id(format);
            match write_new(&self.path_for(&id), bytes).await {
                Ok(()) => return Ok(id),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Reads an artifact by id. The fallback id always resolves, even if its
    /// file has been removed behind our back.
    pub async fn get(&self, id: &str) -> Result<Artifact, ServiceError> {
        if !is_valid_id(id) {
            return Err(ServiceError::not_found("diagram", id));
        }
        let bytes = match fs::read(self.path_for(id)).await {
            Ok(bytes) => bytes,
            Err(_) if id == self.fallback_id => FALLBACK_IMAGE.to_vec(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ServiceError::not_found("diagram", id));
            }
            Err(err) => return Err(err.into()),
        };
        let content_type = ImageFormat::sniff(&bytes)
            .or_else(|| ImageFormat::from_extension(id))
            .map_or("application/octet-stream", ImageFormat::content_type);
        Ok(Artifact {
            id: id.to_string(),
            bytes,
            content_type,
        })
    }

    /// Deletes generated artifacts last modified at least `age` ago.
    /// The fallback artifact and files this store did not generate are left
    /// alone.
    pub async fn purge_older_than(&self, age: Duration) -> std::io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(GENERATED_PREFIX) || name == self.fallback_id {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let expired = metadata
                .modified()
                .ok()
                .map(|modified| now.duration_since(modified).unwrap_or(Duration::ZERO))
                .is_some_and(|elapsed| elapsed >= age);
            if expired {
                fs::remove_file(entry.path()).await?;
                tracing::debug!(artifact_id = %name, "purged expired diagram");
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    if let Err(err) = write_all(&mut file, bytes).await {
        drop(file);
        let _ = fs::remove_file(path).await;
        return Err(err);
    }
    Ok(())
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn next_id(format: ImageFormat) -> String {
    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    let now = Utc::now();
    format!(
        "{}{}_{:03}_{}.{}",
        GENERATED_PREFIX,
        now.format("%Y%m%d_%H%M%S"),
        now.timestamp_subsec_millis(),
        count,
        format.extension()
    )
}

/// Plain filenames only: no separators, no leading dot.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 255
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
