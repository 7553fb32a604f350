use std::fmt;
use std::fs;

use serde::Serialize;

use crate::client::NauticaClient;
use crate::domain::Song;
use crate::error::NauticaError;
use crate::extract::Extractor;
use crate::store::MetaStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Download,
    Extract,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Download => write!(f, "download"),
            PipelineStage::Extract => write!(f, "extract"),
        }
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed,
    Failed {
        stage: PipelineStage,
        error: NauticaError,
    },
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed)
    }
}

/// Download, extract and clean up a single song.
///
/// Download and extraction failures come back as [`PipelineOutcome::Failed`]
/// and only concern this song. An `Err` is a filesystem problem outside those
/// two steps and should end the run.
pub struct ItemPipeline<'a, C: NauticaClient, E: Extractor> {
    store: &'a MetaStore,
    client: &'a C,
    extractor: &'a E,
}

impl<'a, C: NauticaClient, E: Extractor> ItemPipeline<'a, C, E> {
    pub fn new(store: &'a MetaStore, client: &'a C, extractor: &'a E) -> Self {
        Self {
            store,
            client,
            extractor,
        }
    }

    pub fn run(&self, song: &Song) -> Result<PipelineOutcome, NauticaError> {
        let user_dir = self.store.user_dir(&song.user)?;
        let archive = self.store.archive_path(&song.id);

        tracing::info!(song_id = %song.id, title = %song.title, artist = %song.artist, "downloading");
        if let Err(error) = self
            .client
            .download_archive(&song.id, archive.as_std_path())
        {
            tracing::warn!(song_id = %song.id, %error, "error encountered when downloading the zip file");
            return Ok(PipelineOutcome::Failed {
                stage: PipelineStage::Download,
                error,
            });
        }

        tracing::info!(song_id = %song.id, archive = %archive, "finished downloading, extracting");
        if let Err(error) = self
            .extractor
            .extract(archive.as_std_path(), user_dir.as_std_path())
        {
            // The archive stays on disk for inspection.
            tracing::warn!(song_id = %song.id, archive = %archive, %error, "error encountered when extracting");
            return Ok(PipelineOutcome::Failed {
                stage: PipelineStage::Extract,
                error,
            });
        }

        tracing::info!(song_id = %song.id, "finished extracting, deleting archive");
        fs::remove_file(archive.as_std_path())
            .map_err(|err| NauticaError::Filesystem(format!("remove {archive}: {err}")))?;
        tracing::debug!(song_id = %song.id, directory = %user_dir, "download complete");
        Ok(PipelineOutcome::Completed)
    }
}
