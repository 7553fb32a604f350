use std::io::{self, Write};

use serde::Serialize;

use crate::sync::{SyncOutcome, SyncReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &SyncReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn render_summary(report: &SyncReport) -> String {
    let outcome = match report.outcome {
        SyncOutcome::Completed => "completed",
        SyncOutcome::StoppedEarly => "stopped early (already up to date)",
        SyncOutcome::Aborted => "aborted after a failed song",
    };
    let mut out = format!(
        "{} sync {outcome}: {} seen, {} downloaded, {} up to date, {} failed\n",
        report.mode,
        report.songs_seen,
        report.downloaded,
        report.skipped,
        report.failed.len()
    );
    for failed in &report.failed {
        out.push_str(&format!(
            "  {} ({}) failed at {}: {}\n",
            failed.title, failed.id, failed.stage, failed.error
        ));
    }
    out
}

pub fn print_summary(report: &SyncReport) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(render_summary(report).as_bytes())
}
