// ABOUTME: Write-once evidence package for audit: deployed BOM, archive manifest, provenance.
// ABOUTME: Named after the change request and target server so packages never collide.

use super::package::read_entry;
use super::{ARCHIVE_MANIFEST_ENTRY, Result, io_error, zip_error};
use crate::bom::Bom;
use crate::config::Layout;
use crate::context::RunContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// `metadata.yaml` inside the evidence package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceMetadata {
    pub bom_file: String,
    pub archive_path: String,
    pub deployment_timestamp: DateTime<Utc>,
    pub ci_commit_sha: String,
    pub ci_pipeline_id: String,
    pub deployed_by: String,
    pub host: String,
}

fn write_entry(
    zip: &mut zip::ZipWriter<File>,
    path: &Path,
    entry: &str,
    bytes: &[u8],
) -> Result<()> {
    zip.start_file(entry, SimpleFileOptions::default())
        .map_err(zip_error(path))?;
    zip.write_all(bytes).map_err(io_error(path))
}

/// Package the deployed BOM, the archive's manifest and run provenance.
pub fn create_evidence(
    layout: &Layout,
    ctx: &RunContext,
    bom: &Bom,
    bom_file: &Path,
    archive_path: &Path,
) -> Result<PathBuf> {
    let dir = layout.evidence_dir();
    std::fs::create_dir_all(&dir).map_err(io_error(&dir))?;

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!(
        "{}-{}-{timestamp}-evidence.zip",
        bom.change_request_or_baseline(),
        bom.target_server
    ));

    let bom_bytes = std::fs::read(bom_file).map_err(io_error(bom_file))?;
    let manifest_bytes = read_entry(archive_path, ARCHIVE_MANIFEST_ENTRY)?;
    let metadata = EvidenceMetadata {
        bom_file: bom_file.display().to_string(),
        archive_path: archive_path.display().to_string(),
        deployment_timestamp: Utc::now(),
        ci_commit_sha: ctx.commit_sha.clone(),
        ci_pipeline_id: ctx.run_id.to_string(),
        deployed_by: ctx.actor.clone(),
        host: gethostname::gethostname().to_string_lossy().into_owned(),
    };

    // create_new: an existing package is never overwritten.
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(io_error(&path))?;
    let mut zip = zip::ZipWriter::new(file);
    write_entry(&mut zip, &path, "bom-deployed.yaml", &bom_bytes)?;
    write_entry(&mut zip, &path, "archive-manifest.yaml", &manifest_bytes)?;
    write_entry(
        &mut zip,
        &path,
        "metadata.yaml",
        serde_yaml::to_string(&metadata)?.as_bytes(),
    )?;
    zip.finish().map_err(zip_error(&path))?;

    tracing::info!("created evidence package {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::create_archive;
    use crate::types::FlagString;
    use std::collections::HashMap;
    use std::io::Read;

    #[test]
    fn evidence_carries_bom_manifest_and_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let bom_text = "version: 1.0.0\nprofile: baseline\nsource_server: dev\ntarget_server: test\ncreated_by: bob\ndescription: full baseline\n";
        let bom_file = dir.path().join("bom.yaml");
        std::fs::write(&bom_file, bom_text).unwrap();
        let bom = Bom::parse(bom_text).unwrap();
        let archive = create_archive(
            &layout,
            &bom,
            &bom_file,
            &[],
            &FlagString::new("NN").unwrap(),
        )
        .unwrap();

        let ctx = RunContext::from_vars(HashMap::from([
            ("CI_PIPELINE_ID".to_string(), "77".to_string()),
            ("CI_COMMIT_SHA".to_string(), "deadbeef".to_string()),
            ("GITLAB_USER_LOGIN".to_string(), "carol".to_string()),
        ]));
        let path = create_evidence(&layout, &ctx, &bom, &bom_file, &archive).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("baseline-test-"));

        let mut zip = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut metadata = String::new();
        zip.by_name("metadata.yaml")
            .unwrap()
            .read_to_string(&mut metadata)
            .unwrap();
        let metadata: EvidenceMetadata = serde_yaml::from_str(&metadata).unwrap();
        assert_eq!(metadata.ci_pipeline_id, "77");
        assert_eq!(metadata.ci_commit_sha, "deadbeef");
        assert_eq!(metadata.deployed_by, "carol");

        let mut deployed = String::new();
        zip.by_name("bom-deployed.yaml")
            .unwrap()
            .read_to_string(&mut deployed)
            .unwrap();
        assert_eq!(deployed, bom_text);
        assert!(zip.by_name("archive-manifest.yaml").is_ok());
    }
}
