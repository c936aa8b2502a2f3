// ABOUTME: Deployment archive zip: bundles, the BOM, the flag string and an internal manifest.
// ABOUTME: Extraction recovers flags and bundle order exactly as they were archived.

use super::{ArchiveError, Result, io_error, zip_error};
use crate::bom::Bom;
use crate::config::Layout;
use crate::types::FlagString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

pub const ARCHIVE_MANIFEST_ENTRY: &str = "manifest.yaml";
pub const FLAGS_ENTRY: &str = "flags.txt";
const BOM_ENTRY: &str = "bom.yaml";
const BUNDLES_PREFIX: &str = "bundles";

/// `manifest.yaml` stored inside every archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub version: String,
    pub change_request: String,
    pub archived_at: DateTime<Utc>,
    pub bundles: Vec<String>,
    pub flags: FlagString,
}

/// An archive unpacked into a working directory.
#[derive(Debug, Clone)]
pub struct ExtractedArchive {
    pub root: PathBuf,
    pub manifest: ArchiveManifest,
    /// Flags as written to `flags.txt`.
    pub flags: FlagString,
    /// Bundle files in archived order.
    pub bundles: Vec<PathBuf>,
}

/// `{change_request}-v{version}-{timestamp}-bundles.zip`
pub fn archive_name(bom: &Bom, timestamp: &str) -> String {
    format!(
        "{}-v{}-{timestamp}-bundles.zip",
        bom.change_request_or_baseline(),
        bom.version
    )
}

/// A single normal path component, so joining it never leaves the bundles directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
}

fn add_file<W: Write + std::io::Seek>(
    zip: &mut zip::ZipWriter<W>,
    archive: &Path,
    source: &Path,
    entry: &str,
) -> Result<()> {
    let bytes = std::fs::read(source).map_err(io_error(source))?;
    zip.start_file(entry, options()).map_err(zip_error(archive))?;
    zip.write_all(&bytes).map_err(io_error(archive))?;
    Ok(())
}

/// Package bundles, BOM and flags into the archive directory and return its path.
pub fn create_archive(
    layout: &Layout,
    bom: &Bom,
    bom_file: &Path,
    bundles: &[PathBuf],
    flags: &FlagString,
) -> Result<PathBuf> {
    let archive_dir = layout.archive_dir();
    std::fs::create_dir_all(&archive_dir).map_err(io_error(&archive_dir))?;

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let archive_path = archive_dir.join(archive_name(bom, &timestamp));
    tracing::info!("creating deployment archive {}", archive_path.display());

    let file = File::create(&archive_path).map_err(io_error(&archive_path))?;
    let mut zip = zip::ZipWriter::new(file);

    let mut bundle_names = Vec::with_capacity(bundles.len());
    for bundle in bundles {
        let source = layout.resolve(bundle);
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ArchiveError::Invalid {
                what: "bundle path".to_string(),
                reason: format!("{} has no file name", source.display()),
            })?;
        add_file(&mut zip, &archive_path, &source, &format!("{BUNDLES_PREFIX}/{name}"))?;
        bundle_names.push(name);
    }

    add_file(&mut zip, &archive_path, bom_file, BOM_ENTRY)?;

    zip.start_file(FLAGS_ENTRY, options())
        .map_err(zip_error(&archive_path))?;
    zip.write_all(flags.as_str().as_bytes())
        .map_err(io_error(&archive_path))?;

    let manifest = ArchiveManifest {
        version: bom.version.clone(),
        change_request: bom.change_request_or_baseline().to_string(),
        archived_at: Utc::now(),
        bundles: bundle_names,
        flags: flags.clone(),
    };
    zip.start_file(ARCHIVE_MANIFEST_ENTRY, options())
        .map_err(zip_error(&archive_path))?;
    zip.write_all(serde_yaml::to_string(&manifest)?.as_bytes())
        .map_err(io_error(&archive_path))?;

    zip.finish().map_err(zip_error(&archive_path))?;
    Ok(archive_path)
}

/// Raw bytes of one entry.
pub(crate) fn read_entry(archive: &Path, entry: &str) -> Result<Vec<u8>> {
    let file = File::open(archive).map_err(io_error(archive))?;
    let mut zip = zip::ZipArchive::new(file).map_err(zip_error(archive))?;
    let mut entry_file = match zip.by_name(entry) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ArchiveError::MissingEntry {
                archive: archive.to_path_buf(),
                entry: entry.to_string(),
            });
        }
        Err(source) => return Err(zip_error(archive)(source)),
    };
    let mut bytes = Vec::new();
    entry_file
        .read_to_end(&mut bytes)
        .map_err(io_error(archive))?;
    Ok(bytes)
}

pub fn read_archive_manifest(archive: &Path) -> Result<ArchiveManifest> {
    let bytes = read_entry(archive, ARCHIVE_MANIFEST_ENTRY)?;
    Ok(serde_yaml::from_slice(&bytes)?)
}

/// Unpack every entry under `dest`, skipping entries whose names escape it.
pub fn unzip_into(archive: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest).map_err(io_error(dest))?;
    let file = File::open(archive).map_err(io_error(archive))?;
    let mut zip = zip::ZipArchive::new(file).map_err(zip_error(archive))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(zip_error(archive))?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out).map_err(io_error(&out))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut outfile = File::create(&out).map_err(io_error(&out))?;
        std::io::copy(&mut entry, &mut outfile).map_err(io_error(&out))?;
    }
    Ok(())
}

/// Unpack an archive and recover its flags and bundles in archived order.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<ExtractedArchive> {
    unzip_into(archive, dest)?;

    let manifest_path = dest.join(ARCHIVE_MANIFEST_ENTRY);
    if !manifest_path.exists() {
        return Err(ArchiveError::MissingEntry {
            archive: archive.to_path_buf(),
            entry: ARCHIVE_MANIFEST_ENTRY.to_string(),
        });
    }
    let manifest: ArchiveManifest = serde_yaml::from_str(
        &std::fs::read_to_string(&manifest_path).map_err(io_error(&manifest_path))?,
    )?;

    let flags_path = dest.join(FLAGS_ENTRY);
    if !flags_path.exists() {
        return Err(ArchiveError::MissingEntry {
            archive: archive.to_path_buf(),
            entry: FLAGS_ENTRY.to_string(),
        });
    }
    let raw_flags = std::fs::read_to_string(&flags_path).map_err(io_error(&flags_path))?;
    let flags = FlagString::new(raw_flags.trim()).map_err(|e| ArchiveError::Invalid {
        what: FLAGS_ENTRY.to_string(),
        reason: e.to_string(),
    })?;

    let mut bundles = Vec::with_capacity(manifest.bundles.len());
    for name in &manifest.bundles {
        if !is_plain_file_name(name) {
            return Err(ArchiveError::Invalid {
                what: ARCHIVE_MANIFEST_ENTRY.to_string(),
                reason: format!("bundle name '{name}' is not a plain file name"),
            });
        }
        let path = dest.join(BUNDLES_PREFIX).join(name);
        if !path.exists() {
            return Err(ArchiveError::MissingEntry {
                archive: archive.to_path_buf(),
                entry: format!("{BUNDLES_PREFIX}/{name}"),
            });
        }
        bundles.push(path);
    }

    Ok(ExtractedArchive {
        root: dest.to_path_buf(),
        manifest,
        flags,
        bundles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOM: &str = "version: 1.2.0\nprofile: functional-cr\nsource_server: dev\ntarget_server: test\ncreated_by: alice\nchange_request: CR-7\nentities:\n  - entity_id: 9\n    reference_code: WF_A\n";

    #[test]
    fn archive_round_trip_preserves_bundles_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let bom_file = dir.path().join("bom.yaml");
        std::fs::write(&bom_file, BOM).unwrap();
        let bom = Bom::parse(BOM).unwrap();

        std::fs::create_dir_all(dir.path().join("bundles")).unwrap();
        let names = ["KMIGRATOR_EXTRACT_9_b.xml", "KMIGRATOR_EXTRACT_9_a.xml"];
        let mut bundles = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let path = PathBuf::from("bundles").join(name);
            std::fs::write(dir.path().join(&path), format!("<bundle {i}/>")).unwrap();
            bundles.push(path);
        }
        let flags = FlagString::new("YNYN").unwrap();

        let archive = create_archive(&layout, &bom, &bom_file, &bundles, &flags).unwrap();
        let name = archive.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("CR-7-v1.2.0-"));
        assert!(name.ends_with("-bundles.zip"));

        let extracted = extract_archive(&archive, &dir.path().join("out")).unwrap();
        assert_eq!(extracted.flags, flags);
        assert_eq!(extracted.manifest.bundles, names);
        for (i, bundle) in extracted.bundles.iter().enumerate() {
            assert_eq!(
                std::fs::read(bundle).unwrap(),
                std::fs::read(dir.path().join(&bundles[i])).unwrap()
            );
        }
        assert_eq!(
            std::fs::read_to_string(extracted.root.join("bom.yaml")).unwrap(),
            BOM
        );
    }

    #[test]
    fn missing_manifest_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.zip");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("flags.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"YN").unwrap();
        zip.finish().unwrap();

        let err = read_archive_manifest(&path).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingEntry { entry, .. } if entry == "manifest.yaml"));
    }

    #[test]
    fn bundle_names_outside_bundles_dir_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("escape.zip");
        let manifest = ArchiveManifest {
            version: "1.2.0".to_string(),
            change_request: "CR-7".to_string(),
            archived_at: Utc::now(),
            bundles: vec!["../../outside.xml".to_string()],
            flags: FlagString::new("YN").unwrap(),
        };
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file(ARCHIVE_MANIFEST_ENTRY, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(serde_yaml::to_string(&manifest).unwrap().as_bytes())
            .unwrap();
        zip.start_file(FLAGS_ENTRY, SimpleFileOptions::default()).unwrap();
        zip.write_all(b"YN").unwrap();
        zip.finish().unwrap();

        let err = extract_archive(&path, &dir.path().join("out")).unwrap_err();
        assert!(matches!(
            &err,
            ArchiveError::Invalid { reason, .. } if reason.contains("../../outside.xml")
        ));
    }

    #[test]
    fn plain_file_names_only() {
        assert!(is_plain_file_name("KMIGRATOR_EXTRACT_9_a.xml"));
        assert!(!is_plain_file_name("../a.xml"));
        assert!(!is_plain_file_name("sub/a.xml"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
    }
}
