use std::env;
use std::path::PathBuf;

/// Runtime configuration for the merge pipeline
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Expected value of the `x-api-key` header. When unset every request is rejected.
    pub api_key: Option<String>,

    /// Bucket that holds both the source fragments and the produced artifacts (default: "dubla-ai")
    pub bucket: String,

    /// Root directory under which per-request scratch directories are created
    pub scratch_dir: PathBuf,

    /// Upper bound on the number of keys in one request (default: 500)
    pub max_keys: usize,

    /// Wall-clock budget for one request in seconds (default: 900)
    pub request_timeout_secs: u64,

    /// Custom S3 endpoint (MinIO, LocalStack). Uses the AWS default when unset.
    pub s3_endpoint: Option<String>,
    /// S3 region (default: "us-east-1")
    pub s3_region: String,
    /// Use path-style addressing, required by most S3-compatible servers
    pub s3_force_path_style: bool,
    /// Static access key, used together with `s3_secret_key`
    pub s3_access_key: Option<String>,
    /// Static secret key, used together with `s3_access_key`
    pub s3_secret_key: Option<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            bucket: "dubla-ai".to_string(),
            scratch_dir: env::temp_dir(),
            max_keys: 500,
            request_timeout_secs: 900,
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_force_path_style: false,
            s3_access_key: None,
            s3_secret_key: None,
        }
    }
}

impl MergeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            api_key: env::var("API_KEY").ok().filter(|v| !v.is_empty()),

            bucket: env::var("MERGE_BUCKET").unwrap_or(default.bucket),

            scratch_dir: env::var("SCRATCH_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(default.scratch_dir),

            max_keys: env::var("MAX_KEYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_keys),

            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.request_timeout_secs),

            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_region: env::var("S3_REGION").unwrap_or(default.s3_region),
            s3_force_path_style: env::var("S3_FORCE_PATH_STYLE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.s3_force_path_style),
            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),
        }
    }

    /// Create config for local development against MinIO
    pub fn development() -> Self {
        Self {
            api_key: Some("dev-api-key".to_string()),
            s3_endpoint: Some("http://127.0.0.1:9000".to_string()),
            s3_force_path_style: true,
            s3_access_key: Some("minioadmin".to_string()),
            s3_secret_key: Some("minioadmin".to_string()),
            ..Self::default()
        }
    }

    /// Static S3 credentials, only when both halves are present
    pub fn static_credentials(&self) -> Option<(String, String)> {
        match (&self.s3_access_key, &self.s3_secret_key) {
            (Some(access), Some(secret)) => Some((access.clone(), secret.clone())),
            _ => None,
        }
    }
}
