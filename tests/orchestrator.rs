// ABOUTME: End-to-end tests of the extract, import and archive phases against mock kMigrator scripts.
// ABOUTME: Covers phase ordering, resume from metadata, snapshots and failure handling.

mod support;

use ppmdeploy::archive::{RollbackManifest, read_archive_manifest};
use ppmdeploy::bom::{DeploymentKind, I18nMode};
use ppmdeploy::config::StorageKind;
use ppmdeploy::deploy::{DeploymentMetadata, Orchestrator};
use ppmdeploy::diagnostics::WarningKind;
use ppmdeploy::error::{Error, ErrorKind};
use ppmdeploy::executor::ExecutorError;
use std::path::PathBuf;
use std::sync::Arc;
use support::fakes::DirStorage;
use support::workspace::{BASELINE_FLAGS, FUNCTIONAL_FLAGS, Workspace};

fn orchestrator(ws: &Workspace, extra: &[(&str, &str)]) -> Orchestrator {
    Orchestrator::new(ws.ctx(extra), ws.config(), ws.layout.clone()).unwrap()
}

fn functional(ws: &Workspace) -> PathBuf {
    ws.path("boms/functional.yaml")
}

fn baseline(ws: &Workspace) -> PathBuf {
    ws.path("boms/baseline.yaml")
}

mod extract {
    use super::*;

    #[tokio::test]
    async fn records_bundles_and_flags_in_metadata() {
        support::init_tracing();
        let ws = Workspace::new();
        let orch = orchestrator(&ws, &[("CI_PIPELINE_ID", "4242")]);

        let deployment = orch
            .extract(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap();

        let metadata = DeploymentMetadata::load(&ws.layout, DeploymentKind::Functional).unwrap();
        assert_eq!(&metadata, deployment.metadata());
        assert!(ws.path("bundles/functional-metadata.yaml").is_file());
        assert_eq!(metadata.flags.as_str(), FUNCTIONAL_FLAGS);
        assert_eq!(metadata.entities_count, 2);
        assert_eq!(metadata.bundles.len(), 2);
        assert!(metadata.bundles[0].bundle_filename.starts_with("KMIGRATOR_EXTRACT_9_WF_ONBOARD_"));
        assert!(metadata.bundles[1].bundle_filename.starts_with("KMIGRATOR_EXTRACT_26_RT_INCIDENT_"));
        assert_eq!(metadata.i18n_mode, I18nMode::Charset);
        assert_eq!(metadata.storage_mode, StorageKind::Local);
        assert_eq!(metadata.change_request.as_deref(), Some("CR-1001"));
        assert_eq!(metadata.run_id.as_str(), "4242");
        assert!(metadata.imported_at.is_none());
        assert!(ws.imports().is_empty());
    }

    #[tokio::test]
    async fn baseline_extracts_profile_entities_without_reference_codes() {
        let ws = Workspace::new();
        let orch = orchestrator(&ws, &[]);

        let deployment = orch
            .extract(&baseline(&ws), DeploymentKind::Baseline)
            .await
            .unwrap();

        let metadata = deployment.metadata();
        assert_eq!(metadata.flags.as_str(), BASELINE_FLAGS);
        assert_eq!(metadata.i18n_mode, I18nMode::None);
        assert_eq!(metadata.change_request, None);
        let names: Vec<&str> = metadata
            .bundles
            .iter()
            .map(|b| b.bundle_filename.as_str())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("KMIGRATOR_EXTRACT_9_"));
        assert!(names[1].starts_with("KMIGRATOR_EXTRACT_26_"));
        assert!(ws.path("bundles/baseline-metadata.yaml").is_file());
    }

    #[tokio::test]
    async fn baseline_profile_without_entities_is_refused() {
        let ws = Workspace::new();
        ws.write("profiles/baseline-empty.yaml", "flags:\n  replace_module: true\n");
        let bom = ws.write(
            "boms/empty.yaml",
            "version: \"2.0.0\"\nprofile: baseline-empty\nsource_server: dev-ppm\ntarget_server: test-ppm\ncreated_by: alice\ndescription: empty\n",
        );

        let err = orchestrator(&ws, &[])
            .extract(&bom, DeploymentKind::Baseline)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidState(_)));
        assert!(err.to_string().contains("baseline-empty"));
        assert!(!ws.path("bundles").exists());
    }

    #[tokio::test]
    async fn type_must_match_bom() {
        let ws = Workspace::new();
        let err = orchestrator(&ws, &[])
            .extract(&functional(&ws), DeploymentKind::Baseline)
            .await
            .unwrap_err();

        let Error::Validation(errors) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors[0].contains("--type baseline"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn unknown_source_server_is_configuration_error() {
        let ws = Workspace::new();
        let bom = ws.write(
            "boms/unknown.yaml",
            &support::workspace::FUNCTIONAL_BOM.replace("source_server: dev-ppm", "source_server: qa-ppm"),
        );

        let err = orchestrator(&ws, &[])
            .extract(&bom, DeploymentKind::Functional)
            .await
            .unwrap_err();
        assert!(matches!(&err, Error::UnknownServer(name) if name == "qa-ppm"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}

mod phases {
    use super::*;

    #[tokio::test]
    async fn phases_resume_from_metadata() {
        support::init_tracing();
        let ws = Workspace::new();
        let bom = functional(&ws);

        orchestrator(&ws, &[])
            .extract(&bom, DeploymentKind::Functional)
            .await
            .unwrap();

        let imported = orchestrator(&ws, &[])
            .import(&bom, DeploymentKind::Functional)
            .await
            .unwrap();
        assert!(imported.metadata().imported_at.is_some());
        let saved = DeploymentMetadata::load(&ws.layout, DeploymentKind::Functional).unwrap();
        assert!(saved.imported_at.is_some());

        let imports = ws.imports();
        assert_eq!(imports.len(), 2);
        for (record, bundle) in imports.iter().zip(&saved.bundles) {
            assert_eq!(record.bundle, bundle.bundle_filename);
            assert_eq!(record.flags, FUNCTIONAL_FLAGS);
            assert_eq!(record.i18n, "charset");
            assert_eq!(record.refdata, "nochange");
        }

        let archived = orchestrator(&ws, &[])
            .archive(&bom, DeploymentKind::Functional)
            .await
            .unwrap();
        assert!(archived.archive_path().is_file());
        assert!(archived.evidence_path().is_file());
        assert_eq!(archived.manifest_path(), ws.layout.rollback_manifest_file());
        assert!(!ws.path("bundles").exists());
    }

    #[tokio::test]
    async fn import_requires_extract() {
        let ws = Workspace::new();
        let err = orchestrator(&ws, &[])
            .import(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MetadataNotFound(_)));
        assert!(err.hint().unwrap().contains("extract"));
    }

    #[tokio::test]
    async fn archive_requires_import() {
        let ws = Workspace::new();
        let orch = orchestrator(&ws, &[]);
        orch.extract(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap();

        let err = orch
            .archive(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidState(_)));
        assert!(ws.layout.archive_dir().read_dir().is_err());
    }

    #[tokio::test]
    async fn metadata_for_another_target_is_refused() {
        let ws = Workspace::new();
        let orch = orchestrator(&ws, &[]);
        orch.extract(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap();
        let other = ws.write(
            "boms/prod.yaml",
            &support::workspace::FUNCTIONAL_BOM.replace("target_server: test-ppm", "target_server: prod-ppm"),
        );

        let err = orch
            .import(&other, DeploymentKind::Functional)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidState(_)));
        assert!(err.to_string().contains("prod-ppm"));
        assert!(ws.imports().is_empty());
    }

    #[tokio::test]
    async fn failed_import_leaves_deployment_extracted() {
        let ws = Workspace::new();
        let orch = orchestrator(&ws, &[]);
        orch.extract(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap();
        ws.fail_imports();

        let err = orch
            .import(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Executor(ExecutorError::CommandFailed { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::Transport);

        let metadata = DeploymentMetadata::load(&ws.layout, DeploymentKind::Functional).unwrap();
        assert!(metadata.imported_at.is_none());
        assert!(matches!(
            orch.archive(&functional(&ws), DeploymentKind::Functional)
                .await
                .unwrap_err(),
            Error::InvalidState(_)
        ));
    }
}

mod deploy {
    use super::*;

    #[tokio::test]
    async fn functional_deploy_end_to_end() {
        support::init_tracing();
        let ws = Workspace::new();
        let orch = orchestrator(&ws, &[]);

        let archived = orch
            .deploy(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap();

        assert_eq!(ws.imports().len(), 2);

        let name = archived.archive_path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("CR-1001-v1.2.0-"));
        assert!(name.ends_with("-bundles.zip"));
        let contents = read_archive_manifest(archived.archive_path()).unwrap();
        assert_eq!(contents.flags.as_str(), FUNCTIONAL_FLAGS);
        assert_eq!(contents.change_request, "CR-1001");
        let extracted: Vec<String> = archived
            .metadata()
            .bundles
            .iter()
            .map(|b| b.bundle_filename.clone())
            .collect();
        assert_eq!(contents.bundles, extracted);

        let evidence = archived.evidence_path().file_name().unwrap().to_string_lossy();
        assert!(evidence.starts_with("CR-1001-test-ppm-"));

        let manifest = RollbackManifest::load(archived.manifest_path()).unwrap();
        assert_eq!(manifest.rollback_bundle_path, format!("archives/{name}"));
        assert_eq!(manifest.deployment_metadata.target_server, "test-ppm");
        assert_eq!(manifest.storage_backend, StorageKind::Local);
        assert_eq!(manifest.s3_archive_url, None);
        assert_eq!(manifest.git_context.commit_sha, "0123abcd");

        assert_eq!(archived.snapshot_url(), None);
        assert!(!ws.path("bundles").exists());
        assert!(!orch.diagnostics().has_warnings());
    }

    #[tokio::test]
    async fn baseline_deploy_imports_without_translations() {
        let ws = Workspace::new();
        orchestrator(&ws, &[])
            .deploy(&baseline(&ws), DeploymentKind::Baseline)
            .await
            .unwrap();

        let imports = ws.imports();
        assert_eq!(imports.len(), 2);
        assert!(imports.iter().all(|r| r.flags == BASELINE_FLAGS && r.i18n == "none"));
        let archives = ws.list("archives");
        assert!(archives.iter().any(|n| n.starts_with("baseline-v2.0.0-")));
    }

    #[tokio::test]
    async fn governance_failure_stops_before_extract() {
        let ws = Workspace::new();
        let bom = ws.write(
            "boms/prod.yaml",
            &support::workspace::FUNCTIONAL_BOM
                .replace("source_server: dev-ppm", "source_server: test-ppm")
                .replace("target_server: test-ppm", "target_server: prod-ppm"),
        );

        let err = orchestrator(&ws, &[("PROD_PPM_USERNAME", "p"), ("PROD_PPM_PASSWORD", "p")])
            .deploy(&bom, DeploymentKind::Functional)
            .await
            .unwrap_err();

        let Error::Validation(errors) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.iter().any(|e| e == "Rollback pipeline ID required"));
        assert!(!ws.path("bundles").exists());
        assert!(ws.imports().is_empty());
    }

    #[tokio::test]
    async fn missing_target_credentials_stop_before_extract() {
        let ws = Workspace::new();
        let bom = ws.write(
            "boms/prod.yaml",
            &format!(
                "{}rollback_pipeline_id: \"77\"\n",
                support::workspace::FUNCTIONAL_BOM
                    .replace("source_server: dev-ppm", "source_server: test-ppm")
                    .replace("target_server: test-ppm", "target_server: prod-ppm")
            ),
        );

        let err = orchestrator(&ws, &[])
            .deploy(&bom, DeploymentKind::Functional)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Credentials(_)));
        assert!(err.to_string().contains("PROD_PPM_USERNAME"));
        assert!(!ws.path("bundles").exists());
    }

    #[tokio::test]
    async fn durable_storage_receives_snapshot() {
        let ws = Workspace::new();
        let bucket = tempfile::tempdir().unwrap();
        let storage = Arc::new(DirStorage::new(bucket.path()));
        let orch = orchestrator(&ws, &[("CI_PIPELINE_ID", "4242")]).with_storage(storage.clone());

        let archived = orch
            .deploy(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap();

        assert_eq!(archived.snapshot_url(), Some("s3://fake-bucket/snapshots/4242/"));
        let name = archived.archive_path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(storage.contains("snapshots/4242/SNAPSHOT_MANIFEST.yaml"));
        assert!(storage.contains("snapshots/4242/bom.yaml"));
        assert!(storage.contains(&format!("snapshots/4242/archives/{name}")));
        assert!(storage.contains("snapshots/4242/archives/ROLLBACK_MANIFEST.yaml"));
        assert!(storage.contains("snapshots/4242/bundles/functional-metadata.yaml"));

        let local = RollbackManifest::load(archived.manifest_path()).unwrap();
        assert_eq!(local.storage_backend, StorageKind::S3);
        assert_eq!(
            local.s3_archive_url.as_deref(),
            Some(format!("s3://fake-bucket/snapshots/4242/archives/{name}").as_str())
        );
        assert_eq!(
            local.s3_snapshot_url.as_deref(),
            Some("s3://fake-bucket/snapshots/4242/")
        );
        assert!(!ws.path("snapshot-temp/4242").exists());
    }

    #[tokio::test]
    async fn snapshot_failure_is_a_warning() {
        let ws = Workspace::new();
        let bucket = tempfile::tempdir().unwrap();
        let storage = Arc::new(DirStorage::new(bucket.path()));
        *storage.fail_uploads.lock() = Some("AccessDenied".to_string());
        let orch = orchestrator(&ws, &[("CI_PIPELINE_ID", "4242")]).with_storage(storage);

        let archived = orch
            .deploy(&functional(&ws), DeploymentKind::Functional)
            .await
            .unwrap();

        assert_eq!(archived.snapshot_url(), None);
        let warnings = orch.diagnostics().warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::SnapshotFailed);
        assert!(warnings[0].message.contains("AccessDenied"));

        let manifest = RollbackManifest::load(archived.manifest_path()).unwrap();
        assert_eq!(manifest.s3_archive_url, None);
        assert!(archived.archive_path().is_file());
        assert!(!ws.path("snapshot-temp/4242").exists());
    }
}
