use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use validator::{Validate, ValidationErrors};

use crate::api::error::MergeError;
use crate::config::MergeConfig;
use crate::models::{MergeMode, MergeOutcome, MergeRequest};
use crate::services::archive::ArchiveAssembler;
use crate::services::audio::AudioConcatenator;
use crate::services::staging::{ScratchArea, StagedFile, basename};
use crate::services::storage::StorageService;

/// Header carrying the shared-secret credential
pub const API_KEY_HEADER: &str = "x-api-key";

const ARCHIVE_ARTIFACT: &str = "bundle.zip";
const AUDIO_ARTIFACT: &str = "combined.mp3";

/// Runs one merge request end to end: credential check, request validation,
/// staging, assembly, upload.
pub struct MergeService {
    storage: Arc<dyn StorageService>,
    config: MergeConfig,
}

impl MergeService {
    pub fn new(storage: Arc<dyn StorageService>, config: MergeConfig) -> Self {
        Self { storage, config }
    }

    /// Handle one request under the configured wall-clock budget.
    pub async fn handle(&self, credential: Option<&str>, body: &[u8]) -> MergeOutcome {
        let cancel = CancellationToken::new();
        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        let outcome = self.handle_with_cancel(credential, body, &cancel).await;
        timer.abort();
        outcome
    }

    /// Handle one request; `cancel` is honoured between remote calls.
    pub async fn handle_with_cancel(
        &self,
        credential: Option<&str>,
        body: &[u8],
        cancel: &CancellationToken,
    ) -> MergeOutcome {
        match self.run(credential, body, cancel).await {
            Ok(outcome) => {
                info!("✅ {}", outcome.message);
                outcome
            }
            Err(e) => {
                match &e {
                    MergeError::Unauthorized => warn!("🚫 Rejected request with invalid API key"),
                    MergeError::Validation(msg) => warn!("⚠️  Invalid merge request: {}", msg),
                    MergeError::Operation(err) => error!("❌ Merge failed: {:?}", err),
                }
                MergeOutcome::failure(&e)
            }
        }
    }

    pub async fn run(
        &self,
        credential: Option<&str>,
        body: &[u8],
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome, MergeError> {
        self.authorize(credential)?;
        let request = Self::parse_request(body)?;
        let mode = MergeMode::resolve(request.merge_type.as_deref())?;
        self.validate_request(&request, mode)?;
        self.execute(&request, mode, cancel).await
    }

    /// Exact comparison against the configured key. No configured key means
    /// nothing is authorized.
    pub fn authorize(&self, credential: Option<&str>) -> Result<(), MergeError> {
        match (self.config.api_key.as_deref(), credential) {
            (Some(expected), Some(presented)) if expected == presented => Ok(()),
            _ => Err(MergeError::Unauthorized),
        }
    }

    pub fn parse_request(body: &[u8]) -> Result<MergeRequest, MergeError> {
        serde_json::from_slice(body)
            .map_err(|e| MergeError::Validation(format!("Invalid request body: {}", e)))
    }

    pub fn validate_request(&self, request: &MergeRequest, mode: MergeMode) -> Result<(), MergeError> {
        request
            .validate()
            .map_err(|e| MergeError::Validation(describe_validation(&e)))?;

        if request.keys.len() > self.config.max_keys {
            return Err(MergeError::Validation(format!(
                "Too many keys: {} (maximum {})",
                request.keys.len(),
                self.config.max_keys
            )));
        }

        if let Some(key) = request
            .keys
            .iter()
            .find(|k| matches!(basename(k), "" | "." | ".."))
        {
            return Err(MergeError::Validation(format!(
                "Invalid key \"{}\": object key must name a file",
                key
            )));
        }

        if mode == MergeMode::Archive {
            let mut seen: HashMap<&str, &str> = HashMap::new();
            for key in &request.keys {
                if let Some(previous) = seen.insert(basename(key), key) {
                    return Err(MergeError::Validation(format!(
                        "Duplicate archive entry name \"{}\" (keys \"{}\" and \"{}\")",
                        basename(key),
                        previous,
                        key
                    )));
                }
            }
        }

        Ok(())
    }

    /// Stage, assemble and upload. The scratch area is released on every path.
    pub async fn execute(
        &self,
        request: &MergeRequest,
        mode: MergeMode,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome, MergeError> {
        info!(
            mode = %mode,
            keys = request.keys.len(),
            output_key = %request.output_key,
            bucket = %self.storage.bucket(),
            "🔀 Starting merge"
        );

        let scratch = ScratchArea::new(&self.config.scratch_dir)?;
        let result = self.assemble_and_upload(&scratch, request, mode, cancel).await;
        scratch.cleanup();

        result.map_err(MergeError::from)
    }

    async fn assemble_and_upload(
        &self,
        scratch: &ScratchArea,
        request: &MergeRequest,
        mode: MergeMode,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome> {
        let staged = scratch
            .stage(self.storage.as_ref(), &request.keys, cancel)
            .await?;

        if cancel.is_cancelled() {
            bail!("Request cancelled before assembling {}", request.output_key);
        }

        let (artifact, message) = match mode {
            MergeMode::Archive => {
                let dest = scratch.artifact_path(ARCHIVE_ARTIFACT);
                let summary = run_blocking(staged, dest, ArchiveAssembler::assemble).await?;
                info!(
                    "📦 Built ZIP with {} entries ({} bytes)",
                    summary.entries, summary.bytes
                );
                (
                    summary.path,
                    format!(
                        "Successfully created ZIP file and uploaded to {}",
                        request.output_key
                    ),
                )
            }
            MergeMode::UnifiedAudio => {
                let dest = scratch.artifact_path(AUDIO_ARTIFACT);
                let summary = run_blocking(staged, dest, AudioConcatenator::concatenate).await?;
                info!(
                    "🎵 Combined audio: {:.3}s, {} frames, {} bytes",
                    summary.duration_seconds, summary.frames, summary.bytes
                );
                (
                    summary.path,
                    format!(
                        "Successfully combined files and uploaded to {}",
                        request.output_key
                    ),
                )
            }
        };

        if cancel.is_cancelled() {
            bail!("Request cancelled before uploading {}", request.output_key);
        }

        self.storage
            .upload_from_path(&request.output_key, &artifact)
            .await
            .with_context(|| format!("Failed to upload {}", request.output_key))?;
        info!("☁️  Uploaded artifact to {}", request.output_key);

        Ok(MergeOutcome::success(message, &request.output_key))
    }
}

/// Run a CPU/disk-bound assembly step on the blocking pool.
async fn run_blocking<T, F>(staged: Vec<StagedFile>, dest: PathBuf, step: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&[StagedFile], &std::path::Path) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || step(&staged, &dest))
        .await
        .context("Assembly task aborted")?
}

fn describe_validation(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
