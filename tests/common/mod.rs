#![allow(dead_code)]

use async_trait::async_trait;
use audio_merge_backend::config::MergeConfig;
use audio_merge_backend::services::audio::decode::{DecodedSegment, decode_mp3};
use audio_merge_backend::services::audio::encode::encode_mp3;
use audio_merge_backend::services::merge_service::MergeService;
use audio_merge_backend::services::storage::StorageService;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const API_KEY: &str = "test-api-key";

pub struct MockStorageService {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fetched: Mutex<Vec<String>>,
    uploaded: Mutex<Vec<String>>,
    failing_keys: Mutex<HashSet<String>>,
    held_keys: Mutex<HashMap<String, Arc<Notify>>>,
    cancel_after: Mutex<HashMap<String, CancellationToken>>,
    fail_uploads: AtomicBool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            fetched: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
            failing_keys: Mutex::new(HashSet::new()),
            held_keys: Mutex::new(HashMap::new()),
            cancel_after: Mutex::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
        }
    }

    pub fn put(&self, key: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).cloned()
    }

    pub fn fail_fetch(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Fetches of `key` never complete. The returned `Notify` fires once the
    /// fetch has started.
    pub fn hold_fetch(&self, key: &str) -> Arc<Notify> {
        let entered = Arc::new(Notify::new());
        self.held_keys
            .lock()
            .unwrap()
            .insert(key.to_string(), entered.clone());
        entered
    }

    /// Cancel `token` right after `key` has been written to disk
    pub fn cancel_after_fetch(&self, key: &str, token: CancellationToken) {
        self.cancel_after
            .lock()
            .unwrap()
            .insert(key.to_string(), token);
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    /// Every key a fetch was attempted for, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// Every key successfully uploaded, in order
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    fn store(&self, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            anyhow::bail!("SlowDown: upload rejected");
        }
        self.files.lock().unwrap().insert(key.to_string(), data);
        self.uploaded.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    fn bucket(&self) -> &str {
        "mock-bucket"
    }

    async fn download_to_path(&self, key: &str, path: &Path) -> anyhow::Result<u64> {
        self.fetched.lock().unwrap().push(key.to_string());

        if self.failing_keys.lock().unwrap().contains(key) {
            anyhow::bail!("InternalError: simulated storage failure for {}", key);
        }

        let held = self.held_keys.lock().unwrap().get(key).cloned();
        if let Some(entered) = held {
            entered.notify_one();
            std::future::pending::<()>().await;
        }
        let data = self
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("NoSuchKey: The specified key does not exist: {}", key))?;

        tokio::fs::write(path, &data).await?;

        if let Some(token) = self.cancel_after.lock().unwrap().get(key) {
            token.cancel();
        }
        Ok(data.len() as u64)
    }

    async fn upload_from_path(&self, key: &str, path: &Path) -> anyhow::Result<()> {
        let data = tokio::fs::read(path).await?;
        self.store(key, data)
    }

    async fn file_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("audio_merge_backend=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

pub fn test_config(scratch_root: &Path) -> MergeConfig {
    MergeConfig {
        api_key: Some(API_KEY.to_string()),
        bucket: "mock-bucket".to_string(),
        scratch_dir: scratch_root.to_path_buf(),
        ..MergeConfig::default()
    }
}

pub fn setup_service(scratch_root: &Path) -> (Arc<MockStorageService>, MergeService) {
    setup_service_with(test_config(scratch_root))
}

pub fn setup_service_with(config: MergeConfig) -> (Arc<MockStorageService>, MergeService) {
    init_tracing();
    let storage = Arc::new(MockStorageService::new());
    let service = MergeService::new(storage.clone(), config);
    (storage, service)
}

pub fn body(output_key: &str, keys: &[&str], merge_type: Option<&str>) -> Vec<u8> {
    let mut value = serde_json::json!({
        "output_key": output_key,
        "keys": keys,
    });
    if let Some(t) = merge_type {
        value["type"] = serde_json::json!(t);
    }
    serde_json::to_vec(&value).unwrap()
}

pub fn message_of(body_json: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(body_json).unwrap();
    value["message"].as_str().unwrap().to_string()
}

/// Sine tone as MP3 bytes
pub fn tone_mp3(freq: f32, seconds: f32, sample_rate: u32, channels: usize, amplitude: f32) -> Vec<u8> {
    let frames = (seconds * sample_rate as f32) as usize;
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let value =
            (i as f32 * freq * std::f32::consts::TAU / sample_rate as f32).sin() * amplitude;
        for _ in 0..channels {
            samples.push(value);
        }
    }
    encode_mp3(&samples, sample_rate, channels).unwrap()
}

pub fn silence_mp3(seconds: f32, sample_rate: u32, channels: usize) -> Vec<u8> {
    tone_mp3(440.0, seconds, sample_rate, channels, 0.0)
}

pub fn decode_bytes(data: &[u8]) -> DecodedSegment {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe.mp3");
    std::fs::write(&path, data).unwrap();
    decode_mp3(&path).unwrap()
}

/// RMS of the first channel between two timestamps
pub fn rms_between(segment: &DecodedSegment, start_secs: f64, end_secs: f64) -> f32 {
    let start = (start_secs * segment.sample_rate as f64) as usize;
    let end = ((end_secs * segment.sample_rate as f64) as usize).min(segment.frames());
    assert!(start < end, "window {}..{} outside segment", start_secs, end_secs);

    let sum: f32 = (start..end)
        .map(|frame| segment.samples[frame * segment.channels])
        .map(|s| s * s)
        .sum();
    (sum / (end - start) as f32).sqrt()
}

pub fn scratch_entries(root: &Path) -> usize {
    std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
}
