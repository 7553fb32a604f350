use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use zip::ZipArchive;

use crate::error::NauticaError;

static RESERVED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[:"?<>|*/\\]"#).expect("reserved char pattern"));

/// Makes a display name usable as a single path component on every platform
/// the charts are played on.
pub fn clean_name(name: &str) -> String {
    let mut cleaned = RESERVED_CHARS.replace_all(name, "-").into_owned();
    if cleaned.starts_with('.') {
        cleaned.replace_range(..1, "-");
    }
    if cleaned.ends_with('.') {
        let last = cleaned.len() - 1;
        cleaned.replace_range(last.., "-");
    }
    cleaned
}

pub fn ensure_dir(path: &Path) -> Result<(), NauticaError> {
    fs::create_dir_all(path)
        .map_err(|err| NauticaError::Filesystem(format!("create {}: {err}", path.display())))
}

/// Unpacks every regular entry of a chart archive under `target_dir` and
/// returns how many files were written. Symlink entries are skipped; entries
/// whose path would leave `target_dir` fail the whole archive.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<usize, NauticaError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        NauticaError::Extraction(format!("open {}: {err}", zip_path.display()))
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| {
        NauticaError::Extraction(format!("read {}: {err}", zip_path.display()))
    })?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|err| {
            NauticaError::Extraction(format!("entry #{index} of {}: {err}", zip_path.display()))
        })?;
        let name = entry.name().to_string();
        let entry_error = |err: io::Error| NauticaError::Extraction(format!("{name}: {err}"));

        let Some(relative) = entry.enclosed_name() else {
            return Err(NauticaError::Extraction(format!(
                "{name}: entry escapes the output directory"
            )));
        };
        let destination = target_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&destination).map_err(entry_error)?;
            continue;
        }
        if entry.is_symlink() {
            tracing::warn!(entry = %name, "skipping symlink in archive");
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(entry_error)?;
        }
        let mut outfile = fs::File::create(&destination).map_err(entry_error)?;
        io::copy(&mut entry, &mut outfile).map_err(entry_error)?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_name_replaces_reserved_chars() {
        assert_eq!(clean_name(r#"a:b"c?d<e>f|g*h/i\j"#), "a-b-c-d-e-f-g-h-i-j");
    }

    #[test]
    fn clean_name_replaces_edge_dots() {
        assert_eq!(clean_name(".hidden"), "-hidden");
        assert_eq!(clean_name("trailing."), "trailing-");
        assert_eq!(clean_name("..both.."), "-.both.-");
        assert_eq!(clean_name("."), "-");
        assert_eq!(clean_name("mid.dle"), "mid.dle");
    }

    #[test]
    fn clean_name_keeps_unicode() {
        assert_eq!(clean_name("ゆーかり"), "ゆーかり");
        assert_eq!(clean_name(""), "");
    }

    #[test]
    fn extract_zip_writes_entries() {
        use std::io::Write;

        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("chart.zip");
        {
            let file = fs::File::create(&zip_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            writer.add_directory("song/", options).unwrap();
            writer.start_file("song/exh.ksh", options).unwrap();
            writer.write_all(b"title=test").unwrap();
            writer.finish().unwrap();
        }

        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        assert_eq!(extract_zip(&zip_path, &out).unwrap(), 1);
        let content = fs::read_to_string(out.join("song").join("exh.ksh")).unwrap();
        assert_eq!(content, "title=test");
    }

    #[test]
    fn extract_zip_names_escaping_entry() {
        use std::io::Write;

        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("evil.zip");
        {
            let file = fs::File::create(&zip_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("../outside.ksh", options).unwrap();
            writer.write_all(b"x").unwrap();
            writer.finish().unwrap();
        }

        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let err = extract_zip(&zip_path, &out).unwrap_err();
        assert!(err.is_extraction());
        assert!(err.to_string().contains("../outside.ksh"));
        assert!(!temp.path().join("outside.ksh").exists());
    }

    #[test]
    fn extract_zip_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("broken.zip");
        fs::write(&zip_path, b"not a zip").unwrap();
        let err = extract_zip(&zip_path, temp.path()).unwrap_err();
        assert!(err.is_extraction());
        assert!(err.to_string().contains("broken.zip"));
    }
}
