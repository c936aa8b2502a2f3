// ABOUTME: Integration tests for the flag compiler: schema handling, dependencies and properties.
// ABOUTME: Property tests check length, charset and per-position correctness over random profiles.

mod support;

use ppmdeploy::flags::{FlagError, FlagSchema, Profile, compile, compile_profile};
use proptest::prelude::*;
use std::collections::HashMap;
use support::workspace::{BASELINE_FLAGS, FLAG_KEYS, FUNCTIONAL_FLAGS, Workspace, flag_schema_yaml};

fn schema() -> FlagSchema {
    FlagSchema::from_yaml(&flag_schema_yaml()).unwrap()
}

fn profile(enabled: &[&str]) -> Profile {
    Profile {
        name: "test".to_string(),
        flags: enabled.iter().map(|k| (k.to_string(), true)).collect(),
        entities: Vec::new(),
    }
}

mod workspace_profiles {
    use super::*;

    #[test]
    fn compiles_fixture_profiles() {
        let ws = Workspace::new();
        assert_eq!(
            compile_profile(&ws.layout, "functional-cr").unwrap().as_str(),
            FUNCTIONAL_FLAGS
        );
        assert_eq!(
            compile_profile(&ws.layout, "baseline-full").unwrap().as_str(),
            BASELINE_FLAGS
        );
    }

    #[test]
    fn unknown_profile_names_expected_path() {
        let ws = Workspace::new();
        let err = compile_profile(&ws.layout, "nope").unwrap_err();
        assert!(matches!(err, FlagError::UnknownProfile { .. }));
        assert!(err.to_string().contains("profiles/nope.yaml"));
    }
}

mod dependencies {
    use super::*;

    #[test]
    fn portfolio_type_requires_module() {
        let err = compile(&profile(&["replace_portfolio_type"]), &schema()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("replace_portfolio_type"));
        assert!(message.contains("replace_module"));

        let flags = compile(
            &profile(&["replace_portfolio_type", "replace_module"]),
            &schema(),
        )
        .unwrap();
        assert_eq!(flags.len(), 25);
    }

    #[test]
    fn all_unmet_dependencies_are_reported() {
        let err = compile(
            &profile(&["replace_portfolio_type", "replace_chatbot_intent"]),
            &schema(),
        )
        .unwrap_err();
        match err {
            FlagError::UnmetDependencies(unmet) => assert_eq!(unmet.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn declared_dependencies_replace_builtins() {
        let yaml = format!(
            "{}dependencies:\n  - flag: replace_workflow\n    requires: replace_sub_workflow\n    message: Workflows need sub-workflows\n",
            flag_schema_yaml()
        );
        let schema = FlagSchema::from_yaml(&yaml).unwrap();
        assert_eq!(schema.dependencies().len(), 1);

        // Built-in rule no longer applies.
        assert!(compile(&profile(&["replace_portfolio_type"]), &schema).is_ok());
        let err = compile(&profile(&["replace_workflow"]), &schema).unwrap_err();
        assert!(err.to_string().contains("Workflows need sub-workflows"));
    }

    #[test]
    fn declared_dependency_on_unknown_flag_is_malformed() {
        let yaml = format!(
            "{}dependencies:\n  - flag: replace_everything\n    requires: replace_module\n    message: x\n",
            flag_schema_yaml()
        );
        assert!(matches!(
            FlagSchema::from_yaml(&yaml),
            Err(FlagError::MalformedSchema(_))
        ));
    }
}

mod schema_shape {
    use super::*;

    #[test]
    fn positions_order_output_regardless_of_file_order() {
        let yaml = r#"
flag_schema:
  - position: 3
    key: c
  - position: 1
    key: a
  - position: 2
    key: b
"#;
        let schema = FlagSchema::from_yaml(yaml).unwrap();
        assert_eq!(compile(&profile(&["c"]), &schema).unwrap().as_str(), "NNY");
    }

    #[test]
    fn malformed_schemas_are_rejected() {
        for yaml in [
            "flag_schema: []\n",
            "flag_schema:\n  - {position: 1, key: a}\n  - {position: 1, key: b}\n",
            "flag_schema:\n  - {position: 1, key: a}\n  - {position: 2, key: a}\n",
        ] {
            assert!(
                matches!(FlagSchema::from_yaml(yaml), Err(FlagError::MalformedSchema(_))),
                "accepted: {yaml}"
            );
        }
    }
}

/// Random enablement over the 25 schema keys, with dependencies satisfied.
fn satisfiable_profile() -> impl Strategy<Value = HashMap<String, bool>> {
    proptest::collection::vec(any::<bool>(), FLAG_KEYS.len()).prop_map(|mut bits| {
        // replace_portfolio_type needs replace_module; replace_chatbot_intent needs replace_report_type
        if bits[2] {
            bits[0] = true;
        }
        if bits[3] {
            bits[1] = true;
        }
        FLAG_KEYS
            .iter()
            .zip(bits)
            .map(|(k, on)| (k.to_string(), on))
            .collect()
    })
}

proptest! {
    #[test]
    fn compiled_string_matches_profile(flags in satisfiable_profile()) {
        let schema = schema();
        let profile = Profile { name: "prop".to_string(), flags: flags.clone(), entities: Vec::new() };

        let compiled = compile(&profile, &schema).unwrap();
        prop_assert_eq!(compiled.len(), schema.len());
        prop_assert!(compiled.as_str().chars().all(|c| c == 'Y' || c == 'N'));
        for (i, key) in FLAG_KEYS.iter().enumerate() {
            prop_assert_eq!(compiled.is_set(i + 1), Some(flags[*key]));
        }
        prop_assert_eq!(compile(&profile, &schema).unwrap(), compiled);
    }

    #[test]
    fn unmet_dependency_never_yields_a_string(extra in proptest::collection::vec(0usize..25, 0..5)) {
        let mut enabled: Vec<&str> = extra
            .iter()
            .map(|i| FLAG_KEYS[*i])
            .filter(|k| *k != "replace_module")
            .collect();
        enabled.push("replace_portfolio_type");
        prop_assert!(compile(&profile(&enabled), &schema()).is_err());
    }
}
