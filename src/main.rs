//! Formula Imager - renders formulas to cached images.
//!
//! This binary runs the HTTP service, renders single formulas from the
//! command line, and signs image URLs.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formula_imager::{
    cache::{ImageStorage, TemporaryImageStorage},
    config::{
        BackendConfig, Cli, Command, RenderConfig, RenderOutputFormat, ServeConfig, SignConfig,
        SignOutputFormat,
    },
    formula::FormulaService,
    render::{LatexBackend, RasterEncoder, RendererRegistry},
    server::{create_router, AppState, RouterConfig, SignedUrlAuth},
    store::{FileResourceStore, RenderScope, ResourceUrlSerializer},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Render(config) => run_render(config).await,
        Command::Sign(config) => run_sign(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Formula Imager v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Renderer: {}", config.formula.renderer);
    info!("  Safe renderer: {}", config.formula.safe_renderer);
    info!(
        "  Defaults: font size {}, image type {}",
        config.formula.default_font_size.as_str(),
        config.formula.default_image_type
    );
    info!("  Storage: {:?}", config.storage);
    info!("  Memory cache: {}MB", config.cache_size / (1024 * 1024));

    if config.auth_enabled {
        info!("  Auth: enabled (image URLs valid for {}s)", config.url_ttl);
    } else {
        warn!("  Auth: DISABLED - formula images are publicly accessible");
        warn!("        Enable for production: --auth-enabled=true --auth-secret=<secret>");
    }

    let images = config.build_image_storage().await;

    let registry =
        RendererRegistry::with_builtin_backends(build_latex_backend(&config.backend), images.clone());
    for hint in [&config.formula.renderer, &config.formula.safe_renderer] {
        if !registry.contains(hint) {
            warn!(
                "  Renderer '{}' is not registered (available: {})",
                hint,
                registry.names().join(", ")
            );
        }
    }

    let mut urls = ResourceUrlSerializer::new(config.base_path.as_str());
    if config.auth_enabled {
        urls = urls.with_signer(
            SignedUrlAuth::new(config.auth_secret_or_empty()),
            config.url_ttl(),
        );
    }

    let service = FormulaService::new(registry, config.formula.clone(), urls);
    let state = AppState::new(service, images);
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/renderers", addr);
    info!(
        "    curl -X POST -H 'content-type: application/json' \\\n         -d '{{\"text\":\"x^2\",\"inline\":true,\"scope\":\"demo\"}}' http://{}/formulas",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn build_latex_backend(config: &BackendConfig) -> LatexBackend {
    LatexBackend::new()
        .with_latex_path(&config.latex_path)
        .with_dvipng_path(&config.dvipng_path)
        .with_dvisvgm_path(&config.dvisvgm_path)
        .with_dpi(config.dpi)
        .with_timeout(config.render_timeout())
        .with_encoder(RasterEncoder::with_jpeg_quality(config.jpeg_quality))
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "formula_imager=debug,tower_http=debug"
    } else {
        "formula_imager=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = if config.auth_enabled {
        RouterConfig::new(config.auth_secret_or_empty())
    } else {
        RouterConfig::without_auth()
    };

    router_config = router_config.with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Render Command
// =============================================================================

async fn run_render(config: RenderConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let images: Arc<dyn ImageStorage> = Arc::new(TemporaryImageStorage::new(
        FileResourceStore::new(&config.storage_dir),
    ));
    let registry =
        RendererRegistry::with_builtin_backends(build_latex_backend(&config.backend), images);
    let service = FormulaService::new(
        registry,
        config.formula.clone(),
        ResourceUrlSerializer::new(config.base_path.as_str()),
    );

    let request = service.request(config.text.as_str(), !config.block);
    let scope = RenderScope::new(config.scope.as_str());
    let result = if config.text_fallback {
        service.render_or_text(&request, &scope).await
    } else {
        service.render(&request, &scope).await
    };

    let block = match result {
        Ok(block) => block,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match config.format {
        RenderOutputFormat::Html => println!("{}", block.to_html()),
        RenderOutputFormat::Json => match serde_json::to_string_pretty(&block) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }

    if block.image().is_some() {
        info!("Images stored under {}", config.storage_dir.display());
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let params = match config.parse_params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let auth = SignedUrlAuth::new(&config.secret);
    let ttl = std::time::Duration::from_secs(config.ttl);
    let params_ref: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let (signature, expiry) = auth.sign_with_params(&config.path, ttl, &params_ref);

    match config.format {
        SignOutputFormat::Signature => {
            println!("{}", signature);
        }
        SignOutputFormat::Json => {
            let url = config
                .base_url
                .as_deref()
                .map(|base| build_signed_url(base, &config.path, &params, expiry, &signature));

            let json = serde_json::json!({
                "signature": signature,
                "expiry": expiry,
                "path": config.path,
                "ttl": config.ttl,
                "url": url,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        SignOutputFormat::Url => {
            let base_url = config.base_url.as_deref().unwrap_or("");
            println!(
                "{}",
                build_signed_url(base_url, &config.path, &params, expiry, &signature)
            );
            if config.base_url.is_none() {
                eprintln!();
                eprintln!("Tip: Use --base-url to generate a complete URL");
            }
        }
    }

    ExitCode::SUCCESS
}

/// Build `{base_url}{path}?{params}&exp=..&sig=..`.
fn build_signed_url(
    base_url: &str,
    path: &str,
    params: &[(String, String)],
    expiry: u64,
    signature: &str,
) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        query.append_pair(key, value);
    }
    query.append_pair("exp", &expiry.to_string());
    query.append_pair("sig", signature);

    format!("{}{}?{}", base_url.trim_end_matches('/'), path, query.finish())
}
