use std::io::Write;
use std::path::Path;

use reqwest::blocking::{Client, Response};
use reqwest::Url;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tempfile::Builder;

use crate::config::ResolvedSettings;
use crate::domain::{ListingScope, Song, SongEnvelope, SongId, SongPage};
use crate::error::NauticaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    First(ListingScope),
    /// Cursor URL handed out by the previous page, followed verbatim.
    Next(String),
}

pub trait NauticaClient: Send + Sync {
    fn fetch_page(&self, request: &PageRequest) -> Result<SongPage, NauticaError>;
    fn fetch_song(&self, id: &SongId) -> Result<Song, NauticaError>;
    /// Downloads the song's chart archive to `destination`. Nothing is left at
    /// `destination` when this fails.
    fn download_archive(&self, id: &SongId, destination: &Path) -> Result<(), NauticaError>;
}

#[derive(Clone)]
pub struct NauticaHttpClient {
    client: Client,
    base_url: Url,
}

impl NauticaHttpClient {
    pub fn new(settings: &ResolvedSettings) -> Result<Self, NauticaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("nautica-dl/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| NauticaError::Http(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| NauticaError::Http(err.to_string()))?;
        Self::with_client(client, &settings.base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, NauticaError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| NauticaError::ConfigParse(format!("base_url {base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(NauticaError::ConfigParse(format!(
                "base_url cannot hold a path: {base_url}"
            )));
        }
        Ok(Self { client, base_url })
    }

    pub fn page_url(&self, request: &PageRequest) -> String {
        let mut url = match request {
            PageRequest::First(ListingScope::Catalog) => self.endpoint(&["app", "songs"]),
            PageRequest::First(ListingScope::User(user)) => {
                self.endpoint(&["app", "users", user.as_str(), "songs"])
            }
            PageRequest::Next(url) => return url.clone(),
        };
        url.query_pairs_mut().append_pair("sort", "uploaded");
        url.to_string()
    }

    pub fn song_url(&self, id: &SongId) -> String {
        self.endpoint(&["app", "songs", id.as_str()]).to_string()
    }

    // Archives are served outside the `/app` API prefix.
    pub fn download_url(&self, id: &SongId) -> String {
        self.endpoint(&["songs", id.as_str(), "download"]).to_string()
    }

    /// Appends path segments to the base URL. Ids are opaque, so each segment
    /// is percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, url: &str) -> Result<Response, NauticaError> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| NauticaError::Http(err.to_string()))?;
        Self::handle_status(response)
    }

    fn handle_status(response: Response) -> Result<Response, NauticaError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Nautica request failed".to_string());
        Err(NauticaError::HttpStatus { status, message })
    }
}

impl NauticaClient for NauticaHttpClient {
    fn fetch_page(&self, request: &PageRequest) -> Result<SongPage, NauticaError> {
        let url = self.page_url(request);
        self.get(&url)?
            .json()
            .map_err(|err| NauticaError::Http(format!("decode {url}: {err}")))
    }

    fn fetch_song(&self, id: &SongId) -> Result<Song, NauticaError> {
        let url = self.song_url(id);
        let envelope: SongEnvelope = self
            .get(&url)?
            .json()
            .map_err(|err| NauticaError::Http(format!("decode {url}: {err}")))?;
        Ok(envelope.data)
    }

    fn download_archive(&self, id: &SongId, destination: &Path) -> Result<(), NauticaError> {
        let url = self.download_url(id);
        let mut response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/zip, application/octet-stream")
            .send()
            .map_err(|err| NauticaError::Http(err.to_string()))?;
        response = Self::handle_status(response)?;

        let parent = destination
            .parent()
            .ok_or_else(|| NauticaError::Filesystem("invalid archive path".to_string()))?;
        let mut temp = Builder::new()
            .prefix(".download")
            .tempfile_in(parent)
            .map_err(|err| NauticaError::Filesystem(err.to_string()))?;
        // Body read errors surface here, so they count as network failures.
        response
            .copy_to(temp.as_file_mut())
            .map_err(|err| NauticaError::Http(format!("download {url}: {err}")))?;
        temp.as_file_mut()
            .flush()
            .map_err(|err| NauticaError::Filesystem(err.to_string()))?;
        temp.persist(destination).map_err(|err| {
            NauticaError::Filesystem(format!("write {}: {err}", destination.display()))
        })?;
        Ok(())
    }
}
