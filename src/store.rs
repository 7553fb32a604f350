use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::domain::{SongId, User};
use crate::error::NauticaError;
use crate::fs_util::{clean_name, ensure_dir};

pub const META_FILE: &str = "meta.json";

/// Logical content of `<dest>/meta.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    #[serde(default, rename = "songDownloadTimes")]
    pub song_download_times: BTreeMap<String, i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Durable sync state kept next to the downloaded charts.
///
/// Every call reads the whole document and every mutation rewrites it
/// atomically. Callers are expected to be strictly sequential.
#[derive(Debug, Clone)]
pub struct MetaStore {
    root: Utf8PathBuf,
}

impl MetaStore {
    /// Opens the store rooted at `root`. A relative root is resolved against
    /// the current directory so paths handed to extractors stay valid in any cwd.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, NauticaError> {
        let root = absolute_root(root.into())?;
        if !root.as_std_path().exists() {
            tracing::info!(dest = %root, "creating destination directory");
            ensure_dir(root.as_std_path())?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn meta_path(&self) -> Utf8PathBuf {
        self.root.join(META_FILE)
    }

    /// Temporary archive location for a song, directly under the destination root.
    pub fn archive_path(&self, id: &SongId) -> Utf8PathBuf {
        self.root.join(clean_name(&format!("{}.zip", id.as_str())))
    }

    pub fn load(&self) -> Result<Meta, NauticaError> {
        let path = self.meta_path();
        if !path.as_std_path().exists() {
            let meta = Meta::default();
            self.save(&meta)?;
            return Ok(meta);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| NauticaError::Filesystem(format!("read {path}: {err}")))?;
        if content.trim().is_empty() {
            return Ok(Meta::default());
        }
        serde_json::from_str(&content).map_err(|err| NauticaError::MetadataParse(err.to_string()))
    }

    pub fn save(&self, meta: &Meta) -> Result<(), NauticaError> {
        let path = self.meta_path();
        let content = serde_json::to_vec(meta)
            .map_err(|err| NauticaError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".meta")
            .suffix(".json.tmp")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| NauticaError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| NauticaError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| NauticaError::Filesystem(format!("write {path}: {err}")))?;
        Ok(())
    }

    pub fn last_downloaded(&self, id: &SongId) -> Result<Option<i64>, NauticaError> {
        Ok(self.load()?.song_download_times.get(id.as_str()).copied())
    }

    /// Records `at` as the song's watermark and returns the stored value.
    /// An existing later watermark is kept.
    pub fn set_last_downloaded(&self, id: &SongId, at: i64) -> Result<i64, NauticaError> {
        let mut meta = self.load()?;
        let stored = meta
            .song_download_times
            .entry(id.as_str().to_string())
            .and_modify(|current| *current = (*current).max(at))
            .or_insert(at);
        let stored = *stored;
        self.save(&meta)?;
        Ok(stored)
    }

    pub fn touch(&self, id: &SongId) -> Result<i64, NauticaError> {
        self.set_last_downloaded(id, Utc::now().timestamp())
    }

    /// Returns the directory name bound to this user, assigning one from the
    /// current display name the first time the user is seen.
    pub fn directory_name(&self, user: &User) -> Result<String, NauticaError> {
        let mut meta = self.load()?;
        if let Some(existing) = meta.users.get(user.id.as_str()) {
            return Ok(existing.clone());
        }

        let name = if user.name.trim().is_empty() {
            clean_name(user.id.as_str())
        } else {
            clean_name(&user.name)
        };
        tracing::info!(user_id = %user.id, directory = %name, "new user found, adding to list of users");
        meta.users.insert(user.id.as_str().to_string(), name.clone());
        self.save(&meta)?;
        Ok(name)
    }

    pub fn user_dir(&self, user: &User) -> Result<Utf8PathBuf, NauticaError> {
        let dir = self.root.join(self.directory_name(user)?);
        ensure_dir(dir.as_std_path())?;
        Ok(dir)
    }
}

fn absolute_root(root: Utf8PathBuf) -> Result<Utf8PathBuf, NauticaError> {
    if root.is_absolute() {
        return Ok(root);
    }
    let cwd = std::env::current_dir().map_err(|err| NauticaError::Filesystem(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd.join(root.as_std_path()))
        .map_err(|path| {
            NauticaError::Filesystem(format!("destination is not valid UTF-8: {}", path.display()))
        })
}
