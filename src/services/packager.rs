use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name prefix of scratch files the pipeline writes into the cache
pub const SCRATCH_PREFIX: &str = ".snag-";

/// Writes `source` as the single Deflate entry of a ZIP at `archive`.
///
/// The entry is named after the source's base name. An existing file at
/// `archive` is truncated.
pub fn package(source: &Path, archive: &Path) -> io::Result<u64> {
    let entry_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;

    let mut reader = BufReader::new(File::open(source)?);
    let mut zip = ZipWriter::new(BufWriter::new(File::create(archive)?));

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);
    zip.start_file(entry_name, options).map_err(zip_error)?;
    let bytes = io::copy(&mut reader, &mut zip)?;

    let writer = zip.finish().map_err(zip_error)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(bytes)
}

fn zip_error(e: zip::result::ZipError) -> io::Error {
    match e {
        zip::result::ZipError::Io(io) => io,
        other => io::Error::other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_single_entry_archive() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("match_12.csv");
        let archive = tmp.path().join("match_12.zip");
        let content = "time,voltage\n".repeat(500);
        std::fs::write(&source, &content).unwrap();

        let bytes = package(&source, &archive).unwrap();
        assert_eq!(bytes, content.len() as u64);

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        assert_eq!(entry.name(), "match_12.csv");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut unpacked = String::new();
        entry.read_to_string(&mut unpacked).unwrap();
        assert_eq!(unpacked, content);
    }

    #[test]
    fn test_existing_archive_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.csv");
        let archive = tmp.path().join("a.zip");
        std::fs::write(&source, b"1,2\n").unwrap();
        std::fs::write(&archive, b"not a zip at all").unwrap();

        package(&source, &archive).unwrap();

        let zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
    }

    #[test]
    fn test_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let err = package(&tmp.path().join("gone.csv"), &tmp.path().join("gone.zip"));
        assert!(err.is_err());
        assert!(!tmp.path().join("gone.zip").exists());
    }
}
