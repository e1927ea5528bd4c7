//! Scoped ingest of uploaded media blobs.
//!
//! Responsibilities:
//! - Gate filenames on the accepted container extensions (advisory, not a
//!   security boundary)
//! - Persist the uploaded bytes to a uniquely named temp file, preserving the
//!   original extension so downstream probing can use it as a format hint
//! - Guarantee the temp file is removed when the run ends, success or failure
//!
//! Cleanup relies on `tempfile::TempPath`: dropping the handle deletes the
//! file, and the delete is best-effort (an already-absent file never raises).

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::{Builder, TempPath};

/// Container extensions accepted at the upload boundary.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["mp4", "mov", "wav", "m4a"];

/// Whether a declared filename carries one of the accepted extensions.
///
/// Matching is case-insensitive. This filter is advisory only: it catches
/// obviously wrong uploads early, but the content is never inspected here.
pub fn extension_accepted(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// The lowercase extension of a declared filename, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Report filename for an uploaded file: `Travers_Analysis_<stem>.pdf`.
pub fn report_filename(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("call");
    format!("Travers_Analysis_{stem}.pdf")
}

/// An uploaded blob persisted to scoped temp storage for one pipeline run.
///
/// The backing file is deleted when this value is dropped, on every exit path.
pub struct IngestedMedia {
    path: TempPath,
    filename: String,
    extension: Option<String>,
}

impl IngestedMedia {
    /// Path of the temp file holding the uploaded bytes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The filename declared at upload time.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Lowercase extension of the declared filename, used as a probe hint.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }
}

/// Write an uploaded blob to a uniquely named temp file under `dir`.
///
/// The original extension is preserved as the temp-file suffix so container
/// probing downstream can use it as a hint. The temp name itself is
/// collision-free, so concurrent runs never contend on paths.
pub fn ingest_into(dir: &Path, bytes: &[u8], filename: &str) -> Result<IngestedMedia> {
    let extension = extension_of(filename);
    let suffix = extension
        .as_deref()
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let mut tmp = Builder::new()
        .prefix("travers-upload-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .context("failed to create temp file for upload")?;

    tmp.write_all(bytes)
        .context("failed to write uploaded bytes to temp storage")?;
    tmp.flush()
        .context("failed to flush uploaded bytes to temp storage")?;

    Ok(IngestedMedia {
        path: tmp.into_temp_path(),
        filename: filename.to_owned(),
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_declared_upload_extensions() {
        for name in ["a.mp4", "b.mov", "c.wav", "d.m4a", "UPPER.WAV"] {
            assert!(extension_accepted(name), "{name} should be accepted");
        }
    }

    #[test]
    fn rejects_other_extensions_and_bare_names() {
        for name in ["a.mp3", "b.txt", "noext", ".hidden", "archive.tar.gz"] {
            assert!(!extension_accepted(name), "{name} should be rejected");
        }
    }

    #[test]
    fn report_filename_strips_the_extension() {
        assert_eq!(report_filename("test.wav"), "Travers_Analysis_test.pdf");
        assert_eq!(
            report_filename("weekly sync.mp4"),
            "Travers_Analysis_weekly sync.pdf"
        );
    }

    #[test]
    fn ingest_preserves_bytes_and_extension() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let payload = b"not really audio";

        let media = ingest_into(dir.path(), payload, "call.m4a")?;

        assert_eq!(std::fs::read(media.path())?, payload);
        assert_eq!(media.extension(), Some("m4a"));
        assert!(
            media.path().to_string_lossy().ends_with(".m4a"),
            "temp path should keep the original extension"
        );
        Ok(())
    }

    #[test]
    fn dropping_ingested_media_removes_the_temp_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let media = ingest_into(dir.path(), b"bytes", "call.wav")?;
        let path = media.path().to_path_buf();

        assert!(path.exists());
        drop(media);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn two_ingests_of_the_same_filename_do_not_collide() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = ingest_into(dir.path(), b"one", "call.wav")?;
        let b = ingest_into(dir.path(), b"two", "call.wav")?;
        assert_ne!(a.path(), b.path());
        Ok(())
    }
}
