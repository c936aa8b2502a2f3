// ABOUTME: Throwaway deployment workspace: config, rules, flag schema, profiles and mock scripts.
// ABOUTME: The mock kMigrator scripts write bundle files and log every import they receive.

use ppmdeploy::config::{DeploymentConfig, Layout};
use ppmdeploy::context::RunContext;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Schema keys in position order (positions start at 1).
pub const FLAG_KEYS: [&str; 25] = [
    "replace_module",
    "replace_report_type",
    "replace_portfolio_type",
    "replace_chatbot_intent",
    "replace_request_type",
    "replace_workflow",
    "replace_validation",
    "replace_user_data_context",
    "replace_special_command",
    "replace_portlet",
    "replace_project_type",
    "replace_work_plan_template",
    "replace_object_type",
    "replace_program_type",
    "replace_overview_page_section",
    "replace_data_model",
    "replace_dashboard_page",
    "replace_environment",
    "replace_report_template",
    "replace_security_group",
    "replace_notification",
    "replace_sub_workflow",
    "replace_lookup_rule",
    "replace_rule",
    "replace_contact",
];

/// Flags compiled from `profiles/functional-cr.yaml`.
pub const FUNCTIONAL_FLAGS: &str = "YNNNYYNNNNNNNNNNNNNNNNNNN";
/// Flags compiled from `profiles/baseline-full.yaml`.
pub const BASELINE_FLAGS: &str = "YNYNNNNNNNNNNNNNNNNNNNNNN";

pub const CONFIG: &str = r#"
kmigrator:
  extract_script: scripts/kMigratorExtract.sh
  import_script: scripts/kMigratorImport.sh

default_credentials:
  ppm_username: PPM_USERNAME
  ppm_password: PPM_PASSWORD

servers:
  dev-ppm:
    url: https://dev-ppm.example.com
    env_type: dev
    ci_vault_configs: "vault/ppm/dev"
  test-ppm:
    url: https://test-ppm.example.com
    env_type: test
  prod-ppm:
    url: https://prod-ppm.example.com
    env_type: prod
    ppm_api_env_vars:
      username: PROD_PPM_USERNAME
      password: PROD_PPM_PASSWORD
"#;

pub const RULES: &str = r#"
deployment_promotion_order:
  enabled: true
  sequence: [dev, test, prod]
require_prod_rollback:
  enabled: true
  applies_to: [prod]
require_prod_change_request:
  enabled: true
  applies_to: [prod]
prevent_same_server:
  enabled: true
require_branch_environment_match:
  enabled: true
  mappings:
    feature:
      allowed_env_types: [dev, test]
    develop:
      allowed_env_types: [dev, test]
    main:
      allowed_env_types: [dev, test, prod]
"#;

const FUNCTIONAL_PROFILE: &str = r#"
flags:
  replace_module: true
  replace_request_type: true
  replace_workflow: true
"#;

const BASELINE_PROFILE: &str = r#"
flags:
  replace_module: true
  replace_portfolio_type: true
entities:
  - id: 9
    name: Workflow
  - id: 26
    name: Request Type
"#;

pub const FUNCTIONAL_BOM: &str = r#"
version: "1.2.0"
profile: functional-cr
source_server: dev-ppm
target_server: test-ppm
created_by: alice
change_request: CR-1001
entities:
  - entity_id: 9
    reference_code: WF_ONBOARD
  - entity_id: 26
    reference_code: RT_INCIDENT
"#;

pub const BASELINE_BOM: &str = r#"
version: "2.0.0"
profile: baseline-full
source_server: dev-ppm
target_server: test-ppm
created_by: alice
description: Quarterly baseline sync
"#;

const EXTRACT_SCRIPT: &str = r#"#!/usr/bin/env bash
set -euo pipefail
entity=""
ref=""
while [ $# -gt 0 ]; do
  case "$1" in
    -entityId) entity="$2"; shift 2 ;;
    -referenceCode) ref="$2"; shift 2 ;;
    *) shift ;;
  esac
done
mkdir -p bundles
name="KMIGRATOR_EXTRACT_${entity}"
if [ -n "$ref" ]; then
  name="${name}_${ref}"
fi
file="bundles/${name}_$(date +%s%N).xml"
echo "<bundle entity=\"${entity}\" ref=\"${ref}\"/>" > "$file"
echo "Extracting entity ${entity}"
echo "Bundle saved to: ${file}"
"#;

const IMPORT_SCRIPT: &str = r#"#!/usr/bin/env bash
set -euo pipefail
file=""
flags=""
i18n=""
refdata=""
while [ $# -gt 0 ]; do
  case "$1" in
    -filename) file="$2"; shift 2 ;;
    -flags) flags="$2"; shift 2 ;;
    -i18n) i18n="$2"; shift 2 ;;
    -refdata) refdata="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ ! -f "$file" ]; then
  echo "bundle not found: $file" >&2
  exit 3
fi
echo "$(basename "$file") ${flags} ${i18n} ${refdata}" >> import.log
"#;

const FAILING_SCRIPT: &str = r#"#!/usr/bin/env bash
echo "connection refused" >&2
exit 1
"#;

/// One imported bundle as recorded by the mock import script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub bundle: String,
    pub flags: String,
    pub i18n: String,
    pub refdata: String,
}

pub struct Workspace {
    dir: TempDir,
    pub layout: Layout,
}

impl Workspace {
    /// Complete workspace: config, rules, 25-flag schema, two profiles and mock scripts.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let ws = Self { dir, layout };

        ws.write("config/deployment-config.yaml", CONFIG);
        ws.write("config/rules.yaml", RULES);
        ws.write("config/flag-schema.yaml", &flag_schema_yaml());
        ws.write("profiles/functional-cr.yaml", FUNCTIONAL_PROFILE);
        ws.write("profiles/baseline-full.yaml", BASELINE_PROFILE);
        ws.write("scripts/kMigratorExtract.sh", EXTRACT_SCRIPT);
        ws.write("scripts/kMigratorImport.sh", IMPORT_SCRIPT);
        ws.write("boms/functional.yaml", FUNCTIONAL_BOM);
        ws.write("boms/baseline.yaml", BASELINE_BOM);
        ws
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap()
    }

    /// Make every kMigrator import fail like an unreachable server.
    pub fn fail_imports(&self) {
        self.write("scripts/kMigratorImport.sh", FAILING_SCRIPT);
    }

    /// Run context with application credentials plus `extra` variables.
    pub fn ctx(&self, extra: &[(&str, &str)]) -> RunContext {
        let mut vars: HashMap<String, String> = [
            ("PPM_USERNAME", "admin"),
            ("PPM_PASSWORD", "s3cret"),
            ("CI_COMMIT_SHA", "0123abcd"),
            ("CI_COMMIT_BRANCH", "main"),
            ("CI_COMMIT_MESSAGE", "Promote CR-1001"),
            ("GITLAB_USER_LOGIN", "release-bot"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        RunContext::from_vars(vars)
    }

    pub fn config(&self) -> DeploymentConfig {
        DeploymentConfig::from_file(&self.layout.config_file()).unwrap()
    }

    /// Imports logged by the mock import script, oldest first.
    pub fn imports(&self) -> Vec<ImportRecord> {
        let Ok(log) = std::fs::read_to_string(self.path("import.log")) else {
            return Vec::new();
        };
        log.lines()
            .map(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                ImportRecord {
                    bundle: fields[0].to_string(),
                    flags: fields[1].to_string(),
                    i18n: fields[2].to_string(),
                    refdata: fields[3].to_string(),
                }
            })
            .collect()
    }

    pub fn clear_imports(&self) {
        let _ = std::fs::remove_file(self.path("import.log"));
    }

    /// File names directly inside a workspace directory, sorted.
    pub fn list(&self, relative: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.path(relative)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn flag_schema_yaml() -> String {
    let mut yaml = String::from("flag_schema:\n");
    for (i, key) in FLAG_KEYS.iter().enumerate() {
        yaml.push_str(&format!("  - position: {}\n    key: {key}\n", i + 1));
    }
    yaml
}

/// A rollback-only functional BOM for `target` naming `pipeline`.
pub fn rollback_bom(target: &str, pipeline: &str) -> String {
    format!(
        r#"
version: "1.2.0"
profile: functional-cr
source_server: dev-ppm
target_server: {target}
created_by: alice
change_request: CR-1001
rollback_pipeline_id: "{pipeline}"
"#
    )
}
