use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::client::{NauticaClient, PageRequest};
use crate::config::{DEFAULT_SKEW_HOURS, DEFAULT_STALE_THRESHOLD, ResolvedSettings};
use crate::domain::{ListingScope, Song, SongId, SyncMode, SyncTarget, UserId};
use crate::error::NauticaError;
use crate::extract::Extractor;
use crate::pipeline::{ItemPipeline, PipelineOutcome, PipelineStage};
use crate::store::MetaStore;

/// Decides whether a song is already synced and when a walk may stop early.
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
    skew: TimeDelta,
    threshold: u32,
}

impl StalenessPolicy {
    pub fn new(skew_hours: i64, threshold: u32) -> Self {
        Self {
            skew: TimeDelta::hours(skew_hours),
            threshold: threshold.max(1),
        }
    }

    pub fn from_settings(settings: &ResolvedSettings) -> Self {
        Self::new(settings.skew_hours, settings.stale_threshold)
    }

    /// A song is stale when its upload time, less the skew allowance, is at or
    /// before the recorded watermark. Songs without a watermark never are.
    pub fn is_stale(&self, uploaded_at: DateTime<Utc>, watermark: Option<i64>) -> bool {
        match watermark {
            Some(watermark) => (uploaded_at - self.skew).timestamp() <= watermark,
            None => false,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SKEW_HOURS, DEFAULT_STALE_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed,
    StoppedEarly,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedSong {
    pub id: String,
    pub title: String,
    pub stage: PipelineStage,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub outcome: SyncOutcome,
    pub pages: usize,
    pub songs_seen: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: Vec<FailedSong>,
}

impl SyncReport {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            outcome: SyncOutcome::Completed,
            pages: 0,
            songs_seen: 0,
            downloaded: 0,
            skipped: 0,
            failed: Vec::new(),
        }
    }
}

/// What the page loop does after a song has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkSignal {
    Continue,
    StopAll,
}

/// How a paginated walk reacts to a song whose pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailurePolicy {
    Abort,
    Skip,
}

struct WalkState {
    should_continue: bool,
    on_failure: FailurePolicy,
    consecutive_stale: u32,
    report: SyncReport,
}

pub struct Syncer<C: NauticaClient, E: Extractor> {
    store: MetaStore,
    client: C,
    extractor: E,
    policy: StalenessPolicy,
}

impl<C: NauticaClient, E: Extractor> Syncer<C, E> {
    pub fn new(store: MetaStore, client: C, extractor: E, policy: StalenessPolicy) -> Self {
        Self {
            store,
            client,
            extractor,
            policy,
        }
    }

    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn run(
        &self,
        target: &SyncTarget,
        should_continue: bool,
    ) -> Result<SyncReport, NauticaError> {
        match target {
            SyncTarget::Catalog => self.download_all(should_continue),
            SyncTarget::User(user) => self.download_user(user, should_continue),
            SyncTarget::Song(song) => self.download_song(song),
        }
    }

    /// Walks the whole catalog newest first. The first failed song ends the run.
    pub fn download_all(&self, should_continue: bool) -> Result<SyncReport, NauticaError> {
        tracing::info!("downloading all songs");
        self.walk(
            ListingScope::Catalog,
            SyncMode::Catalog,
            should_continue,
            FailurePolicy::Abort,
        )
    }

    /// Walks one uploader's songs. Failed songs are logged and skipped.
    pub fn download_user(
        &self,
        user: &UserId,
        should_continue: bool,
    ) -> Result<SyncReport, NauticaError> {
        tracing::info!(user_id = %user, "downloading user's songs");
        self.walk(
            ListingScope::User(user.clone()),
            SyncMode::User,
            should_continue,
            FailurePolicy::Skip,
        )
    }

    /// Syncs one song. Its watermark advances even when the pipeline fails.
    pub fn download_song(&self, id: &SongId) -> Result<SyncReport, NauticaError> {
        tracing::info!(song_id = %id, "downloading song");
        let mut report = SyncReport::new(SyncMode::Song);

        let song = self.client.fetch_song(id)?;
        report.songs_seen = 1;
        log_song(&song);

        let watermark = self.store.last_downloaded(id)?;
        if self.policy.is_stale(song.uploaded_at, watermark) {
            tracing::info!(song_id = %id, "already up to date");
            report.skipped = 1;
        } else {
            match self.pipeline().run(&song)? {
                PipelineOutcome::Completed => report.downloaded = 1,
                PipelineOutcome::Failed { stage, error } => {
                    tracing::error!(song_id = %id, %stage, %error, "error encountered");
                    report.failed.push(failed_song(&song, stage, &error));
                }
            }
        }

        self.store.touch(id)?;
        log_done(&report);
        Ok(report)
    }

    fn pipeline(&self) -> ItemPipeline<'_, C, E> {
        ItemPipeline::new(&self.store, &self.client, &self.extractor)
    }

    fn walk(
        &self,
        scope: ListingScope,
        mode: SyncMode,
        should_continue: bool,
        on_failure: FailurePolicy,
    ) -> Result<SyncReport, NauticaError> {
        let mut state = WalkState {
            should_continue,
            on_failure,
            consecutive_stale: 0,
            report: SyncReport::new(mode),
        };
        let mut request = PageRequest::First(scope);

        'pages: loop {
            let page = self.client.fetch_page(&request)?;
            state.report.pages += 1;
            tracing::debug!(page = state.report.pages, songs = page.data.len(), "fetched page");

            for song in &page.data {
                if self.visit(song, &mut state)? == WalkSignal::StopAll {
                    break 'pages;
                }
            }

            match page.next_cursor() {
                Some(next) => request = PageRequest::Next(next.to_string()),
                None => break,
            }
        }

        log_done(&state.report);
        Ok(state.report)
    }

    fn visit(&self, song: &Song, state: &mut WalkState) -> Result<WalkSignal, NauticaError> {
        state.report.songs_seen += 1;
        log_song(song);

        let watermark = self.store.last_downloaded(&song.id)?;
        if self.policy.is_stale(song.uploaded_at, watermark) {
            tracing::info!(song_id = %song.id, "already up to date, skipping");
            self.store.touch(&song.id)?;
            state.report.skipped += 1;
            state.consecutive_stale += 1;
            if !state.should_continue && state.consecutive_stale >= self.policy.threshold() {
                tracing::info!(
                    count = state.consecutive_stale,
                    "found consecutive songs that were up to date, stopping"
                );
                tracing::info!("to prevent this from happening, run with the --continue flag");
                state.report.outcome = SyncOutcome::StoppedEarly;
                return Ok(WalkSignal::StopAll);
            }
            return Ok(WalkSignal::Continue);
        }

        state.consecutive_stale = 0;
        match self.pipeline().run(song)? {
            PipelineOutcome::Completed => {
                self.store.touch(&song.id)?;
                state.report.downloaded += 1;
                Ok(WalkSignal::Continue)
            }
            PipelineOutcome::Failed { stage, error } => {
                state.report.failed.push(failed_song(song, stage, &error));
                match state.on_failure {
                    FailurePolicy::Abort => {
                        tracing::error!(
                            song_id = %song.id, %stage, %error,
                            "error encountered, stopping"
                        );
                        state.report.outcome = SyncOutcome::Aborted;
                        Ok(WalkSignal::StopAll)
                    }
                    FailurePolicy::Skip => {
                        tracing::error!(
                            song_id = %song.id, %stage, %error,
                            "error encountered, moving on"
                        );
                        Ok(WalkSignal::Continue)
                    }
                }
            }
        }
    }
}

fn log_song(song: &Song) {
    tracing::info!(
        song_id = %song.id,
        title = %song.title,
        artist = %song.artist,
        uploaded_at = %song.uploaded_at,
        "song"
    );
}

fn log_done(report: &SyncReport) {
    tracing::info!(
        outcome = ?report.outcome,
        pages = report.pages,
        songs = report.songs_seen,
        downloaded = report.downloaded,
        skipped = report.skipped,
        failed = report.failed.len(),
        "done"
    );
}

fn failed_song(song: &Song, stage: PipelineStage, error: &NauticaError) -> FailedSong {
    FailedSong {
        id: song.id.to_string(),
        title: song.title.clone(),
        stage,
        error: error.to_string(),
    }
}
