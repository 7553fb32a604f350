#![cfg(unix)]

mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::LazyLock;

use camino::Utf8PathBuf;

use nautica_sync::extract::{Extractor, UnarExtractor};
use nautica_sync::pipeline::{ItemPipeline, PipelineOutcome};
use nautica_sync::store::MetaStore;

use assert_matches::assert_matches;
use common::{MockClient, a_day_ago, song};

/// Stands in for `unar`: insists the archive exists from inside its cwd and
/// drops a marker file into the output directory.
const FAKE_UNAR: &str = r#"#!/bin/sh
[ -f "$1" ] || { echo "no such archive: $1 (cwd $(pwd))" >&2; exit 1; }
[ "$2" = "-o" ] && [ -d "$3" ] || { echo "bad output dir: $3" >&2; exit 1; }
echo "chart" > "$3/chart.ksh"
"#;

// Written once so no test forks while another still holds the script open.
static UNAR: LazyLock<PathBuf> = LazyLock::new(|| {
    let dir = tempfile::tempdir().unwrap().keep();
    let script = dir.join("unar");
    fs::write(&script, FAKE_UNAR).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
});

/// A destination given relative to the working directory, like the default `./nautica`.
fn relative_dest() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix(".nautica-rel")
        .tempdir_in(".")
        .unwrap();
    let name = temp.path().file_name().unwrap().to_str().unwrap().to_string();
    (temp, Utf8PathBuf::from(format!("./{name}/nautica")))
}

#[test]
fn store_root_is_absolute_for_relative_dest() {
    let (_temp, dest) = relative_dest();
    assert!(dest.is_relative());

    let store = MetaStore::open(dest.clone()).unwrap();

    assert!(store.root().is_absolute());
    assert!(store.root().ends_with(dest.strip_prefix("./").unwrap()));
    assert!(store.root().as_std_path().is_dir());
}

#[test]
fn unar_extracts_with_relative_dest() {
    let (temp, dest) = relative_dest();
    let store = MetaStore::open(dest).unwrap();
    let client = MockClient::with_pages(Vec::new());
    let extractor = UnarExtractor::with_program(UNAR.clone(), None);
    let song = song("abc", a_day_ago());

    let outcome = ItemPipeline::new(&store, &client, &extractor)
        .run(&song)
        .unwrap();

    assert_matches!(outcome, PipelineOutcome::Completed);
    let user_dir = temp.path().join("nautica").join("Uploader");
    assert_eq!(fs::read_to_string(user_dir.join("chart.ksh")).unwrap(), "chart\n");
    assert!(!store.archive_path(&song.id).as_std_path().exists());
}

#[test]
fn unar_resolves_relative_arguments() {
    let (temp, _dest) = relative_dest();
    let out = temp.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(temp.path().join("abc.zip"), b"archive").unwrap();
    let extractor = UnarExtractor::with_program(UNAR.clone(), None);

    extractor
        .extract(&temp.path().join("abc.zip"), &out)
        .unwrap();

    assert!(out.join("chart.ksh").exists());
}
