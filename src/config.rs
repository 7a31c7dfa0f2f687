//! Configuration management for the formula imager.
//!
//! Configuration comes from command-line arguments and `FORMULA_*`
//! environment variables, with defaults for every optional setting.
//!
//! # Commands
//!
//! - `serve` - Run the HTTP service ([`ServeConfig`])
//! - `render` - Render one formula from the command line ([`RenderConfig`])
//! - `sign` - Sign a temporary resource path ([`SignConfig`])
//!
//! # Environment Variables
//!
//! - `FORMULA_RENDERER` - Default renderer hint (default: latex)
//! - `FORMULA_SAFE_RENDERER` - Fallback renderer hint (default: katex)
//! - `FORMULA_FONT_SIZE` / `FORMULA_IMAGE_TYPE` - Request defaults
//! - `FORMULA_HOST` / `FORMULA_PORT` - Bind address (default: 0.0.0.0:3000)
//! - `FORMULA_STORAGE` - `memory`, `file` or `s3` (default: memory)
//! - `FORMULA_STORAGE_DIR` - Root directory of the `file` storage
//! - `FORMULA_S3_BUCKET` / `FORMULA_S3_PREFIX` / `FORMULA_S3_ENDPOINT` / `FORMULA_S3_REGION`
//! - `FORMULA_CACHE_SIZE` - In-memory image cache capacity in bytes
//! - `FORMULA_AUTH_ENABLED` / `FORMULA_AUTH_SECRET` / `FORMULA_URL_TTL` - Signed image URLs
//! - `FORMULA_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::cache::{
    ImageStorage, MemoryImageStorage, TemporaryImageStorage, TieredImageStorage,
    DEFAULT_IMAGE_CACHE_CAPACITY,
};
use crate::render::{
    FontSize, ImageType, DEFAULT_DPI, DEFAULT_JPEG_QUALITY, DEFAULT_TOOL_TIMEOUT,
    KATEX_RENDERER_NAME, LATEX_RENDERER_NAME,
};
use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::store::{create_s3_client, FileResourceStore, S3ResourceStore};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default lifetime of signed image URLs in seconds (1 hour).
pub const DEFAULT_URL_TTL: u64 = 3600;

/// Default scope of formulas rendered from the command line.
pub const DEFAULT_CLI_SCOPE: &str = "cli";

// =============================================================================
// CLI
// =============================================================================

/// Formula imager - renders formulas to cached images.
#[derive(Parser, Debug, Clone)]
#[command(name = "formula-imager")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(ServeConfig),

    /// Render one formula and print its display tree.
    Render(RenderConfig),

    /// Sign a temporary resource path for authenticated access.
    Sign(SignConfig),
}

// =============================================================================
// Formula Defaults
// =============================================================================

/// Defaults applied to every formula request.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct FormulaConfig {
    /// Renderer used unless a request names another one.
    #[arg(long, default_value = LATEX_RENDERER_NAME, env = "FORMULA_RENDERER")]
    pub renderer: String,

    /// Renderer used when the first one fails.
    #[arg(long, default_value = KATEX_RENDERER_NAME, env = "FORMULA_SAFE_RENDERER")]
    pub safe_renderer: String,

    /// Font size used unless a request names another one.
    #[arg(
        long = "font-size",
        value_enum,
        ignore_case = true,
        default_value_t = FontSize::Default,
        env = "FORMULA_FONT_SIZE"
    )]
    pub default_font_size: FontSize,

    /// Image type used unless a request names another one.
    #[arg(
        long = "image-type",
        value_enum,
        ignore_case = true,
        default_value_t = ImageType::Default,
        env = "FORMULA_IMAGE_TYPE"
    )]
    pub default_image_type: ImageType,
}

impl FormulaConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.renderer.trim().is_empty() {
            return Err("renderer must not be empty".to_string());
        }
        if self.safe_renderer.trim().is_empty() {
            return Err("safe_renderer must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            renderer: LATEX_RENDERER_NAME.to_string(),
            safe_renderer: KATEX_RENDERER_NAME.to_string(),
            default_font_size: FontSize::Default,
            default_image_type: ImageType::Default,
        }
    }
}

// =============================================================================
// Renderer Backends
// =============================================================================

/// Settings of the LaTeX toolchain backend.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Path of the `latex` binary.
    #[arg(long, default_value = "latex", env = "FORMULA_LATEX_PATH")]
    pub latex_path: PathBuf,

    /// Path of the `dvipng` binary.
    #[arg(long, default_value = "dvipng", env = "FORMULA_DVIPNG_PATH")]
    pub dvipng_path: PathBuf,

    /// Path of the `dvisvgm` binary.
    #[arg(long, default_value = "dvisvgm", env = "FORMULA_DVISVGM_PATH")]
    pub dvisvgm_path: PathBuf,

    /// Raster resolution in dots per inch.
    #[arg(long, default_value_t = DEFAULT_DPI, env = "FORMULA_DPI")]
    pub dpi: u32,

    /// Time limit for each TeX tool invocation, in seconds.
    #[arg(long, default_value_t = DEFAULT_TOOL_TIMEOUT.as_secs(), env = "FORMULA_RENDER_TIMEOUT")]
    pub render_timeout: u64,

    /// JPEG quality (1-100) for JPEG images.
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "FORMULA_JPEG_QUALITY")]
    pub jpeg_quality: u8,
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.dpi == 0 {
            return Err("dpi must be greater than 0".to_string());
        }
        if self.render_timeout == 0 {
            return Err("render_timeout must be greater than 0".to_string());
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        Ok(())
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            latex_path: PathBuf::from("latex"),
            dvipng_path: PathBuf::from("dvipng"),
            dvisvgm_path: PathBuf::from("dvisvgm"),
            dpi: DEFAULT_DPI,
            render_timeout: DEFAULT_TOOL_TIMEOUT.as_secs(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

// =============================================================================
// Serve Command
// =============================================================================

/// Where rendered images are persisted.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Process memory only
    #[default]
    Memory,
    /// Files under `--storage-dir`
    File,
    /// Objects in `--s3-bucket`
    S3,
}

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "FORMULA_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "FORMULA_PORT")]
    pub port: u16,

    /// Path prefix of image URLs, for deployments behind a proxy.
    #[arg(long, default_value = "", env = "FORMULA_BASE_PATH")]
    pub base_path: String,

    // =========================================================================
    // Rendering
    // =========================================================================
    #[command(flatten)]
    pub formula: FormulaConfig,

    #[command(flatten)]
    pub backend: BackendConfig,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Durable storage for rendered images.
    #[arg(long, value_enum, default_value_t = StorageBackend::Memory, env = "FORMULA_STORAGE")]
    pub storage: StorageBackend,

    /// Root directory for the `file` storage.
    #[arg(long, env = "FORMULA_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// S3 bucket for the `s3` storage.
    #[arg(long, env = "FORMULA_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the bucket.
    #[arg(long, env = "FORMULA_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "FORMULA_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "FORMULA_S3_REGION")]
    pub s3_region: String,

    /// Capacity of the in-memory image cache in bytes.
    #[arg(long, default_value_t = DEFAULT_IMAGE_CACHE_CAPACITY, env = "FORMULA_CACHE_SIZE")]
    pub cache_size: usize,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Require signed URLs for image downloads.
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "FORMULA_AUTH_ENABLED")]
    pub auth_enabled: bool,

    /// Secret key for HMAC-SHA256 signed URLs.
    #[arg(long, env = "FORMULA_AUTH_SECRET")]
    pub auth_secret: Option<String>,

    /// Lifetime of signed image URLs in seconds.
    #[arg(long, default_value_t = DEFAULT_URL_TTL, env = "FORMULA_URL_TTL")]
    pub url_ttl: u64,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "FORMULA_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated). Any origin when unset.
    #[arg(long, env = "FORMULA_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.formula.validate()?;
        self.backend.validate()?;

        if self.auth_enabled && self.auth_secret.as_deref().unwrap_or("").is_empty() {
            return Err(
                "Authentication is enabled but no secret provided. \
                 Set --auth-secret or FORMULA_AUTH_SECRET, or disable auth with --auth-enabled=false"
                    .to_string(),
            );
        }
        if self.auth_enabled && self.url_ttl == 0 {
            return Err("url_ttl must be greater than 0".to_string());
        }

        match self.storage {
            StorageBackend::File if self.storage_dir.is_none() => {
                return Err(
                    "File storage needs a directory. Set --storage-dir or FORMULA_STORAGE_DIR"
                        .to_string(),
                );
            }
            StorageBackend::S3 if self.s3_bucket.as_deref().unwrap_or("").is_empty() => {
                return Err(
                    "S3 storage needs a bucket. Set --s3-bucket or FORMULA_S3_BUCKET".to_string(),
                );
            }
            _ => {}
        }

        if self.cache_size == 0 {
            return Err("cache_size must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn auth_secret_or_empty(&self) -> &str {
        self.auth_secret.as_deref().unwrap_or("")
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl)
    }

    /// Build the image storage selected by `--storage`.
    ///
    /// `memory` is a single LRU bounded by `cache_size`. The durable
    /// backends get that LRU as a front tier.
    pub async fn build_image_storage(&self) -> Arc<dyn ImageStorage> {
        let front = MemoryImageStorage::with_capacity(self.cache_size);
        let durable: Arc<dyn ImageStorage> = match self.storage {
            StorageBackend::Memory => return Arc::new(front),
            StorageBackend::File => {
                let root = self.storage_dir.clone().unwrap_or_default();
                info!("  Storage directory: {}", root.display());
                Arc::new(TemporaryImageStorage::new(FileResourceStore::new(root)))
            }
            StorageBackend::S3 => {
                let bucket = self.s3_bucket.clone().unwrap_or_default();
                info!("  S3 bucket: {}", bucket);
                if let Some(ref endpoint) = self.s3_endpoint {
                    info!("  S3 endpoint: {}", endpoint);
                }
                info!("  S3 region: {}", self.s3_region);

                let client = create_s3_client(self.s3_endpoint.as_deref(), &self.s3_region).await;
                Arc::new(TemporaryImageStorage::new(S3ResourceStore::new(
                    client,
                    bucket,
                    self.s3_prefix.clone(),
                )))
            }
        };
        Arc::new(TieredImageStorage::new(front, durable))
    }
}

// =============================================================================
// Render Command
// =============================================================================

/// Output format of the `render` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderOutputFormat {
    /// HTML fragment
    #[default]
    Html,
    /// Display tree as JSON
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct RenderConfig {
    /// Formula text.
    pub text: String,

    /// Render as a block instead of inline.
    #[arg(long, default_value_t = false)]
    pub block: bool,

    /// Addressing scope of the rendered image.
    #[arg(long, default_value = DEFAULT_CLI_SCOPE, env = "FORMULA_SCOPE")]
    pub scope: String,

    /// Directory the rendered images are written to.
    #[arg(long, default_value = "formula-images", env = "FORMULA_STORAGE_DIR")]
    pub storage_dir: PathBuf,

    /// Path prefix of the printed image URL.
    #[arg(long, default_value = "", env = "FORMULA_BASE_PATH")]
    pub base_path: String,

    /// Print the formula text instead of failing on an invalid formula.
    #[arg(long, default_value_t = false)]
    pub text_fallback: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = RenderOutputFormat::Html)]
    pub format: RenderOutputFormat,

    #[command(flatten)]
    pub formula: FormulaConfig,

    #[command(flatten)]
    pub backend: BackendConfig,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.formula.validate()?;
        self.backend.validate()?;
        if self.scope.is_empty() || self.scope == "." || self.scope == ".." {
            return Err(format!("Invalid scope: {:?}", self.scope));
        }
        Ok(())
    }
}

// =============================================================================
// Sign Command
// =============================================================================

/// Output format of the `sign` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignOutputFormat {
    /// Path or URL with `exp` and `sig` query parameters
    #[default]
    Url,
    /// Hex signature only
    Signature,
    /// JSON object with signature, expiry and URL
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Path to sign, e.g. /tmp/formula/page/3f2a...
    #[arg(long)]
    pub path: String,

    /// Secret key for HMAC-SHA256.
    #[arg(long, env = "FORMULA_AUTH_SECRET")]
    pub secret: String,

    /// Signature lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_URL_TTL)]
    pub ttl: u64,

    /// Base URL prepended to the signed path.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Extra query parameters as key=value.
    #[arg(long = "param")]
    pub params: Vec<String>,

    #[arg(long, value_enum, default_value_t = SignOutputFormat::Url)]
    pub format: SignOutputFormat,
}

impl SignConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret must not be empty".to_string());
        }
        if !self.path.starts_with('/') {
            return Err(format!("Path must start with '/': {}", self.path));
        }
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Parse `key=value` parameters, rejecting the reserved `exp` and `sig`.
    pub fn parse_params(&self) -> Result<Vec<(String, String)>, String> {
        self.params
            .iter()
            .map(|param| {
                let (key, value) = param
                    .split_once('=')
                    .ok_or_else(|| format!("Invalid parameter (expected key=value): {param}"))?;
                if key.is_empty() {
                    return Err(format!("Invalid parameter (empty key): {param}"));
                }
                if key == "exp" || key == "sig" {
                    return Err(format!("Parameter '{key}' is reserved"));
                }
                Ok((key.to_string(), value.to_string()))
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
