#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use chrono::{DateTime, TimeDelta, Utc};

use nautica_sync::client::{NauticaClient, PageRequest};
use nautica_sync::domain::{PageLinks, Song, SongId, SongPage, User, UserId};
use nautica_sync::error::NauticaError;
use nautica_sync::extract::Extractor;
use nautica_sync::store::MetaStore;

pub fn song(id: &str, uploaded_at: DateTime<Utc>) -> Song {
    song_by(id, uploaded_at, "u1", "Uploader")
}

pub fn song_by(id: &str, uploaded_at: DateTime<Utc>, user_id: &str, user_name: &str) -> Song {
    Song {
        id: SongId::try_from(id.to_string()).unwrap(),
        title: format!("Title {id}"),
        artist: "Artist".to_string(),
        uploaded_at,
        user: User {
            id: UserId::try_from(user_id.to_string()).unwrap(),
            name: user_name.to_string(),
        },
    }
}

pub fn a_day_ago() -> DateTime<Utc> {
    Utc::now() - TimeDelta::days(1)
}

pub fn temp_store() -> (tempfile::TempDir, MetaStore) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("nautica")).unwrap();
    let store = MetaStore::open(root).unwrap();
    (temp, store)
}

/// Marks `ids` as synced right now so that older uploads count as stale.
pub fn mark_synced(store: &MetaStore, ids: &[&str]) {
    let now = Utc::now().timestamp();
    for id in ids {
        let id = SongId::try_from(id.to_string()).unwrap();
        store.set_last_downloaded(&id, now).unwrap();
    }
}

/// Serves a fixed chain of pages linked by `mock://page/N` cursors.
#[derive(Default)]
pub struct MockClient {
    pages: Vec<Vec<Song>>,
    songs: HashMap<String, Song>,
    failing_downloads: HashSet<String>,
    pub page_requests: Mutex<Vec<PageRequest>>,
    pub downloads: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn with_pages(pages: Vec<Vec<Song>>) -> Self {
        let songs = pages
            .iter()
            .flatten()
            .map(|song| (song.id.to_string(), song.clone()))
            .collect();
        Self {
            pages,
            songs,
            ..Self::default()
        }
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing_downloads.insert(id.to_string());
        self
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn pages_fetched(&self) -> usize {
        self.page_requests.lock().unwrap().len()
    }
}

impl NauticaClient for MockClient {
    fn fetch_page(&self, request: &PageRequest) -> Result<SongPage, NauticaError> {
        self.page_requests.lock().unwrap().push(request.clone());
        let index = match request {
            PageRequest::First(_) => 0,
            PageRequest::Next(url) => url
                .strip_prefix("mock://page/")
                .and_then(|value| value.parse::<usize>().ok())
                .ok_or_else(|| NauticaError::HttpStatus {
                    status: 404,
                    message: url.clone(),
                })?,
        };
        let data = self.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < self.pages.len()).then(|| format!("mock://page/{}", index + 1));
        Ok(SongPage {
            data,
            links: PageLinks { next },
        })
    }

    fn fetch_song(&self, id: &SongId) -> Result<Song, NauticaError> {
        self.songs
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| NauticaError::HttpStatus {
                status: 404,
                message: "song not found".to_string(),
            })
    }

    fn download_archive(&self, id: &SongId, destination: &Path) -> Result<(), NauticaError> {
        self.downloads.lock().unwrap().push(id.to_string());
        if self.failing_downloads.contains(id.as_str()) {
            return Err(NauticaError::Http("connection reset".to_string()));
        }
        fs::write(destination, format!("archive {id}"))
            .map_err(|err| NauticaError::Filesystem(err.to_string()))
    }
}

/// Writes `<archive stem>.txt` into the output directory instead of unpacking.
#[derive(Default)]
pub struct MockExtractor {
    failing: HashSet<String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl MockExtractor {
    pub fn failing(mut self, archive_stem: &str) -> Self {
        self.failing.insert(archive_stem.to_string());
        self
    }
}

impl Extractor for MockExtractor {
    fn extract(&self, archive: &Path, output_dir: &Path) -> Result<(), NauticaError> {
        let stem = archive
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push((
            archive.display().to_string(),
            output_dir.display().to_string(),
        ));
        if self.failing.contains(&stem) {
            return Err(NauticaError::Extraction("unsupported archive".to_string()));
        }
        fs::write(output_dir.join(format!("{stem}.txt")), b"chart")
            .map_err(|err| NauticaError::Extraction(err.to_string()))
    }
}
