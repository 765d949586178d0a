use crate::error::ExportError;
use crate::importer::{self, Conversation};
use eyre::{Context, Result, eyre};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tempfile::TempDir;

/// Name of the conversation list inside the export archive.
pub const CONVERSATIONS_FILE: &str = "conversations.json";

/// Unpack the whole archive into a fresh temporary directory.
/// The directory is removed when the returned handle is dropped.
pub fn extract_archive(zip_path: &Path) -> Result<TempDir> {
    let file = File::open(zip_path)
        .wrap_err_with(|| format!("Failed to open archive: {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .wrap_err_with(|| format!("Not a valid zip archive: {}", zip_path.display()))?;

    let tmp = tempfile::Builder::new()
        .prefix("chat-export-html-")
        .tempdir()
        .wrap_err("Failed to create temporary directory")?;

    log::debug!(
        "extracting {} entries from {} into {}",
        archive.len(),
        zip_path.display(),
        tmp.path().display()
    );
    archive
        .extract(tmp.path())
        .wrap_err_with(|| format!("Failed to extract archive: {}", zip_path.display()))?;
    Ok(tmp)
}

/// Extract `zip_path` and parse its `conversations.json`.
///
/// Archive problems (unreadable file, invalid zip, missing conversation list)
/// and malformed JSON are reported as distinct error kinds. The scratch
/// directory never outlives this call.
pub fn load_archive(zip_path: &Path) -> Result<Vec<Conversation>, ExportError> {
    let extracted = extract_archive(zip_path).map_err(ExportError::Archive)?;

    let json_path = extracted.path().join(CONVERSATIONS_FILE);
    if !json_path.is_file() {
        return Err(ExportError::Archive(eyre!(
            "{} not found in archive: {}",
            CONVERSATIONS_FILE,
            zip_path.display()
        )));
    }

    let conversations = importer::load_conversations(&json_path).map_err(ExportError::Parse)?;
    log::debug!("loaded {} conversations", conversations.len());
    Ok(conversations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn loads_conversations_from_root_entry() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("export.zip");
        write_zip(
            &zip_path,
            &[
                ("chat.html", "<html></html>"),
                (CONVERSATIONS_FILE, r#"[{"title":"A","mapping":{}},{"title":"B","mapping":{}}]"#),
            ],
        );
        let convs = load_archive(&zip_path).unwrap();
        let titles: Vec<_> = convs.iter().map(|c| c.title.as_deref().unwrap()).collect();
        assert_eq!(titles, ["A", "B"]);
    }

    #[test]
    fn missing_file_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_archive(&dir.path().join("nope.zip")).unwrap_err();
        assert!(matches!(err, ExportError::Archive(_)));
    }

    #[test]
    fn non_zip_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        assert!(matches!(load_archive(&path).unwrap_err(), ExportError::Archive(_)));
    }

    #[test]
    fn missing_conversation_list_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("export.zip");
        write_zip(&zip_path, &[("user.json", "{}")]);
        let err = load_archive(&zip_path).unwrap_err();
        assert!(matches!(err, ExportError::Archive(_)));
        assert!(err.to_string().contains(CONVERSATIONS_FILE));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("export.zip");
        write_zip(&zip_path, &[(CONVERSATIONS_FILE, "[{\"title\": ")]);
        assert!(matches!(load_archive(&zip_path).unwrap_err(), ExportError::Parse(_)));
    }

    #[test]
    fn scratch_directory_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("export.zip");
        write_zip(&zip_path, &[(CONVERSATIONS_FILE, "[]")]);
        let extracted = extract_archive(&zip_path).unwrap();
        let scratch = extracted.path().to_path_buf();
        assert!(scratch.join(CONVERSATIONS_FILE).is_file());
        drop(extracted);
        assert!(!scratch.exists());
    }
}
