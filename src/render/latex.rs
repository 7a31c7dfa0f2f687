//! LaTeX backend.
//!
//! Renders formulas with a local TeX installation:
//!
//! ```text
//! formula.tex ──latex──▶ formula.dvi ──dvipng───▶ formula.png ──▶ PNG / GIF / JPEG
//!                                    └─dvisvgm──▶ formula.svg ──▶ SVG
//! ```
//!
//! Every render runs in its own temporary directory, which is removed when
//! the render finishes. The tools are killed if they exceed the timeout.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use super::encoder::RasterEncoder;
use super::renderer::ImageBackend;
use super::types::{ImageData, ImageType, RenderParams};
use crate::error::RenderError;

/// Name of the LaTeX backend.
pub const LATEX_RENDERER_NAME: &str = "latex";

/// Default limit for each external tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(20);

/// Default raster resolution passed to dvipng.
pub const DEFAULT_DPI: u32 = 120;

const DOCUMENT_STEM: &str = "formula";

/// Commands that reach outside the formula (files, streams, catcodes).
const FORBIDDEN_COMMANDS: &[&str] = &[
    "\\input",
    "\\include",
    "\\openin",
    "\\openout",
    "\\read",
    "\\write",
    "\\immediate",
    "\\catcode",
    "\\usepackage",
    "\\documentclass",
    "\\special",
    "\\csname",
];

/// [`ImageBackend`] driving `latex`, `dvipng` and `dvisvgm`.
#[derive(Debug, Clone)]
pub struct LatexBackend {
    latex_path: PathBuf,
    dvipng_path: PathBuf,
    dvisvgm_path: PathBuf,
    dpi: u32,
    timeout: Duration,
    encoder: RasterEncoder,
}

impl LatexBackend {
    /// Create a backend using the tools found on `PATH`.
    pub fn new() -> Self {
        Self {
            latex_path: PathBuf::from("latex"),
            dvipng_path: PathBuf::from("dvipng"),
            dvisvgm_path: PathBuf::from("dvisvgm"),
            dpi: DEFAULT_DPI,
            timeout: DEFAULT_TOOL_TIMEOUT,
            encoder: RasterEncoder::new(),
        }
    }

    pub fn with_latex_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.latex_path = path.into();
        self
    }

    pub fn with_dvipng_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dvipng_path = path.into();
        self
    }

    pub fn with_dvisvgm_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dvisvgm_path = path.into();
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_encoder(mut self, encoder: RasterEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Run one tool to completion inside `workdir`.
    async fn run_tool(
        &self,
        tool: &str,
        program: &Path,
        args: &[String],
        workdir: &Path,
    ) -> Result<Output, RenderError> {
        let started_at = Instant::now();
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // kpathsea paranoid mode: no absolute paths, parent directories or dotfiles
            .env("openin_any", "p")
            .env("openout_any", "p")
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(
                    tool,
                    program = %program.display(),
                    error = %err,
                    "Failed to spawn TeX tool"
                );
                let message = if err.kind() == ErrorKind::NotFound {
                    format!("{tool} unavailable: {err}")
                } else {
                    format!("failed to run {tool}: {err}")
                };
                return Err(RenderError::execution(LATEX_RENDERER_NAME, message));
            }
            Err(_) => {
                warn!(
                    tool,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "TeX tool timed out"
                );
                return Err(RenderError::execution(
                    LATEX_RENDERER_NAME,
                    format!("{tool} timed out after {:?}", self.timeout),
                ));
            }
        };

        debug!(
            tool,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            exit_code = output.status.code().unwrap_or(-1),
            "TeX tool finished"
        );
        Ok(output)
    }

    /// Typeset the document into `formula.dvi`.
    async fn typeset(&self, workdir: &Path) -> Result<(), RenderError> {
        let args = vec![
            "-interaction=nonstopmode".to_string(),
            "-halt-on-error".to_string(),
            "-no-shell-escape".to_string(),
            format!("{DOCUMENT_STEM}.tex"),
        ];
        let output = self.run_tool("latex", &self.latex_path, &args, workdir).await?;
        if output.status.success() {
            return Ok(());
        }

        let log = tokio::fs::read_to_string(workdir.join(format!("{DOCUMENT_STEM}.log")))
            .await
            .unwrap_or_default();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(message) = tex_error_message(&log).or_else(|| tex_error_message(&stdout)) {
            return Err(RenderError::invalid_input(LATEX_RENDERER_NAME, message));
        }

        Err(tool_failure("latex", &output))
    }

    /// Convert `formula.dvi` into the output image.
    async fn convert(&self, workdir: &Path, image_type: ImageType) -> Result<Bytes, RenderError> {
        let dvi = format!("{DOCUMENT_STEM}.dvi");
        let (tool, program, target, args) = if image_type == ImageType::Svg {
            let target = format!("{DOCUMENT_STEM}.svg");
            let args = vec![
                "--no-fonts".to_string(),
                "--exact-bbox".to_string(),
                "-o".to_string(),
                target.clone(),
                dvi,
            ];
            ("dvisvgm", &self.dvisvgm_path, target, args)
        } else {
            // JPEG cannot carry transparency, so it gets a white background
            let background = if image_type == ImageType::Jpeg {
                "rgb 1.0 1.0 1.0"
            } else {
                "Transparent"
            };
            let target = format!("{DOCUMENT_STEM}.png");
            let args = vec![
                "-q".to_string(),
                "-T".to_string(),
                "tight".to_string(),
                "-D".to_string(),
                self.dpi.to_string(),
                "-bg".to_string(),
                background.to_string(),
                "-o".to_string(),
                target.clone(),
                dvi,
            ];
            ("dvipng", &self.dvipng_path, target, args)
        };

        let output = self.run_tool(tool, program, &args, workdir).await?;
        if !output.status.success() {
            return Err(tool_failure(tool, &output));
        }

        let data = tokio::fs::read(workdir.join(&target)).await.map_err(|e| {
            RenderError::execution(
                LATEX_RENDERER_NAME,
                format!("{tool} produced no output: {e}"),
            )
        })?;
        Ok(Bytes::from(data))
    }
}

impl Default for LatexBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageBackend for LatexBackend {
    fn name(&self) -> &str {
        LATEX_RENDERER_NAME
    }

    async fn render_image(
        &self,
        formula: &str,
        params: &RenderParams,
    ) -> Result<ImageData, RenderError> {
        check_formula(formula)?;

        let workdir = TempDir::new().map_err(|e| {
            RenderError::execution(
                LATEX_RENDERER_NAME,
                format!("failed to create working directory: {e}"),
            )
        })?;

        tokio::fs::write(
            workdir.path().join(format!("{DOCUMENT_STEM}.tex")),
            latex_document(formula, params),
        )
        .await
        .map_err(|e| {
            RenderError::execution(
                LATEX_RENDERER_NAME,
                format!("failed to write document: {e}"),
            )
        })?;

        self.typeset(workdir.path()).await?;
        let output = self.convert(workdir.path(), params.image_type).await?;

        let data = self.encoder.encode(output, params.image_type).map_err(|e| {
            RenderError::execution(
                LATEX_RENDERER_NAME,
                format!("failed to encode {} image: {e}", params.image_type),
            )
        })?;

        Ok(ImageData::new(data, params.image_type))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Build the standalone LaTeX document for one formula.
pub fn latex_document(formula: &str, params: &RenderParams) -> String {
    let style = if params.inline { "" } else { "\\displaystyle " };
    format!(
        "\\documentclass[10pt]{{article}}\n\
         \\usepackage{{amsmath}}\n\
         \\usepackage{{amssymb}}\n\
         \\usepackage{{amsfonts}}\n\
         \\pagestyle{{empty}}\n\
         \\begin{{document}}\n\
         \\{size}\n\
         ${style}{formula}$\n\
         \\end{{document}}\n",
        size = params.font_size.command(),
    )
}

/// Reject formulas using commands that could read or write files.
///
/// `^^` escapes and environment names can spell a command without its
/// backslash, so both are checked as well. The `openin_any`/`openout_any`
/// restrictions set in `run_tool` back this up inside TeX itself.
fn check_formula(formula: &str) -> Result<(), RenderError> {
    if formula.contains("^^") {
        return Err(RenderError::invalid_input(
            LATEX_RENDERER_NAME,
            "character escapes (^^) are not allowed",
        ));
    }

    for environment in environment_names(formula) {
        let forbidden = FORBIDDEN_COMMANDS
            .iter()
            .any(|command| command.trim_start_matches('\\') == environment);
        if forbidden {
            return Err(RenderError::invalid_input(
                LATEX_RENDERER_NAME,
                format!("environment {environment} is not allowed"),
            ));
        }
    }

    for command in FORBIDDEN_COMMANDS {
        let mut rest = formula;
        while let Some(pos) = rest.find(command) {
            let after = &rest[pos + command.len()..];
            // `\readonly` is not `\read`
            if !after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return Err(RenderError::invalid_input(
                    LATEX_RENDERER_NAME,
                    format!("command {command} is not allowed"),
                ));
            }
            rest = after;
        }
    }
    Ok(())
}

/// Names used with `\\begin{..}` or `\\end{..}`, trimmed.
fn environment_names(formula: &str) -> impl Iterator<Item = &str> {
    ["\\begin", "\\end"].into_iter().flat_map(move |command| {
        formula.match_indices(command).filter_map(move |(pos, _)| {
            let after = formula[pos + command.len()..].trim_start().strip_prefix('{')?;
            let end = after.find('}')?;
            Some(after[..end].trim())
        })
    })
}

/// Extract the first TeX error (`! ...` line) from a log or transcript.
fn tex_error_message(log: &str) -> Option<String> {
    log.lines()
        .find_map(|line| line.strip_prefix("! "))
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}

fn tool_failure(tool: &str, output: &Output) -> RenderError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    RenderError::execution(
        LATEX_RENDERER_NAME,
        format!(
            "{tool} exited with status {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        ),
    )
}

// =============================================================================
// Tests
// =============================================================================
