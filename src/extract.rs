use std::ffi::OsStr;
use std::path::{self, Path, PathBuf};
use std::process::Command;

use crate::config::{ExtractorKind, ResolvedSettings};
use crate::error::NauticaError;
use crate::fs_util;

/// Unpacks a downloaded chart archive into a directory. Success means every
/// entry was written.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, output_dir: &Path) -> Result<(), NauticaError>;
}

impl<T: Extractor + ?Sized> Extractor for Box<T> {
    fn extract(&self, archive: &Path, output_dir: &Path) -> Result<(), NauticaError> {
        (**self).extract(archive, output_dir)
    }
}

pub fn from_settings(settings: &ResolvedSettings) -> Box<dyn Extractor> {
    match settings.extractor {
        ExtractorKind::Unar => Box::new(UnarExtractor::new(settings.filename_encoding.clone())),
        ExtractorKind::Builtin => Box::new(ZipExtractor),
    }
}

#[derive(Debug, Clone)]
pub struct UnarExtractor {
    unar: Option<PathBuf>,
    encoding: Option<String>,
}

impl UnarExtractor {
    /// Uses `$NAUTICA_UNAR` when set, otherwise the first `unar` on `PATH`.
    pub fn new(encoding: Option<String>) -> Self {
        let unar = std::env::var_os(UNAR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| locate_unar(std::env::var_os("PATH").as_deref()));
        Self {
            unar,
            encoding,
        }
    }

    pub fn with_program(program: PathBuf, encoding: Option<String>) -> Self {
        Self {
            unar: Some(program),
            encoding,
        }
    }

    pub fn args(&self, archive: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            archive.to_string_lossy().to_string(),
            "-o".to_string(),
            output_dir.to_string_lossy().to_string(),
            "-f".to_string(),
        ];
        if let Some(encoding) = &self.encoding {
            args.push("-e".to_string());
            args.push(encoding.clone());
        }
        args
    }
}

impl Extractor for UnarExtractor {
    fn extract(&self, archive: &Path, output_dir: &Path) -> Result<(), NauticaError> {
        let unar = self
            .unar
            .as_ref()
            .ok_or_else(|| NauticaError::MissingTool("unar".to_string()))?;
        // unar's cwd is the output directory.
        let archive = absolutize(archive)?;
        let output_dir = absolutize(output_dir)?;
        let output = Command::new(unar)
            .args(self.args(&archive, &output_dir))
            .current_dir(&output_dir)
            .output()
            .map_err(|err| NauticaError::Extraction(format!("run {}: {err}", unar.display())))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(output = %stdout.trim(), "unar");
        }
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("unar exited with {}", output.status)
        } else {
            stderr
        };
        Err(NauticaError::Extraction(message))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
    fn extract(&self, archive: &Path, output_dir: &Path) -> Result<(), NauticaError> {
        let written = fs_util::extract_zip(archive, output_dir)?;
        tracing::debug!(archive = %archive.display(), files = written, "unpacked archive");
        Ok(())
    }
}

const UNAR_ENV: &str = "NAUTICA_UNAR";

#[cfg(windows)]
const UNAR_BINARY: &str = "unar.exe";
#[cfg(not(windows))]
const UNAR_BINARY: &str = "unar";

fn locate_unar(search_path: Option<&OsStr>) -> Option<PathBuf> {
    std::env::split_paths(search_path?)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(UNAR_BINARY))
        .find(|candidate| candidate.is_file())
}

fn absolutize(path: &Path) -> Result<PathBuf, NauticaError> {
    path::absolute(path)
        .map_err(|err| NauticaError::Filesystem(format!("resolve {}: {err}", path.display())))
}
