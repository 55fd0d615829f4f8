//! Readiness checks: the inference service, the configured models, the
//! external extraction tools and the scratch directory.

use crate::config::Config;
use crate::inference::InferenceClient;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    /// Some formats or the fallback model will not work.
    Warning,
    /// Nothing can be summarised.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl HealthCheck {
    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReport {
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// True when no check failed. Warnings are allowed.
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Failed)
    }

    pub fn get(&self, name: &str) -> Option<&HealthCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Run every check against `config` and the inference service behind `inference`.
pub async fn check_health(config: &Config, inference: &InferenceClient) -> HealthReport {
    let mut checks = Vec::new();

    match inference.list_models().await {
        Ok(installed) => {
            checks.push(HealthCheck::new(
                "inference service",
                CheckStatus::Ok,
                format!("{} ({} models installed)", config.inference.base_url, installed.len()),
            ));
            for (tier, model) in [("small", &config.models.small), ("large", &config.models.large)] {
                let name = format!("{tier} model");
                if installed.contains(&model.name) {
                    checks.push(HealthCheck::new(name, CheckStatus::Ok, &model.name));
                } else {
                    checks.push(HealthCheck::new(
                        name,
                        CheckStatus::Warning,
                        format!("{} is not installed (ollama pull {})", model.name, model.name),
                    ));
                }
            }
        }
        Err(e) => checks.push(HealthCheck::new(
            "inference service",
            CheckStatus::Failed,
            e.to_string(),
        )),
    }

    let extraction = &config.extraction;
    let mut tools = Vec::new();
    if extraction.ocr_enabled {
        tools.push(("pdf renderer", &extraction.pdf_render_command, "scanned PDFs"));
        tools.push(("ocr engine", &extraction.tesseract_command, "scanned PDFs"));
    }
    tools.push(("media probe", &extraction.ffprobe_command, "audio and video"));
    tools.push(("audio extractor", &extraction.ffmpeg_command, "audio and video"));
    tools.push(("transcriber", &extraction.whisper_command, "audio and video"));

    for (name, command, needed_for) in tools {
        checks.push(match find_program(command) {
            Some(path) => HealthCheck::new(name, CheckStatus::Ok, path.display().to_string()),
            None => HealthCheck::new(
                name,
                CheckStatus::Warning,
                format!("{command} not found, {needed_for} cannot be summarised"),
            ),
        });
    }

    let model = &extraction.whisper_model;
    checks.push(if model.is_file() {
        HealthCheck::new("transcription model", CheckStatus::Ok, model.display().to_string())
    } else {
        HealthCheck::new(
            "transcription model",
            CheckStatus::Warning,
            format!("{} does not exist", model.display()),
        )
    });

    checks.push(match tempfile::Builder::new().prefix("lucid-check-").tempdir() {
        Ok(dir) => HealthCheck::new(
            "scratch directory",
            CheckStatus::Ok,
            dir.path()
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        ),
        Err(e) => HealthCheck::new("scratch directory", CheckStatus::Failed, e.to_string()),
    });

    HealthReport { checks }
}

/// Resolve `command` the way a shell would: a path is checked directly, a bare
/// name is looked up on `PATH`.
pub fn find_program(command: &str) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return is_executable(path).then(|| path.to_path_buf());
    }
    let dirs = std::env::var_os("PATH")?;
    std::env::split_paths(&dirs)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}
