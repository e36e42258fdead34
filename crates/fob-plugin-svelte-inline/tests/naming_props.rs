//! Property tests for artifact naming and extraction.

use fob_plugin_svelte_inline::config::DuplicatePolicy;
use fob_plugin_svelte_inline::extractor::extract;
use fob_plugin_svelte_inline::naming::{artifact_file_name, declared_name_from_file_name};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn declared_name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z0-9]{0,15}"
}

fn parent_strategy() -> impl Strategy<Value = PathBuf> {
    (
        prop::collection::vec("[a-z]{1,8}", 0..=3),
        "[A-Za-z][A-Za-z0-9_-]{0,12}",
    )
        .prop_map(|(dirs, stem)| {
            let mut path = PathBuf::from("/");
            for dir in dirs {
                path.push(dir);
            }
            path.push(format!("{}.svelte", stem));
            path
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The declared name survives the trip through the artifact file name.
    #[test]
    fn prop_declared_name_recoverable(parent in parent_strategy(), name in declared_name_strategy()) {
        let file_name = artifact_file_name(&parent, &name);
        prop_assert!(file_name.ends_with(".svelte"));
        prop_assert_eq!(declared_name_from_file_name(&file_name), Some(name.as_str()));
    }

    /// Artifact names are a pure function of parent and name.
    #[test]
    fn prop_artifact_name_deterministic(parent in parent_strategy(), name in declared_name_strategy()) {
        prop_assert_eq!(artifact_file_name(&parent, &name), artifact_file_name(&parent, &name));
    }

    /// Every declared block becomes one record and leaves no marker behind.
    #[test]
    fn prop_extraction_removes_every_block(
        blocks in prop::collection::vec((declared_name_strategy(), "[a-z ]{0,20}"), 1..=6),
        markup in "[a-z ]{0,20}",
    ) {
        let mut source = format!("<p>{}</p>\n", markup);
        for (name, body) in &blocks {
            source.push_str(&format!("<template name=\"{}\">{}</template>\n", name, body));
        }

        let extraction = extract(&source, Path::new("/src/App.svelte"), DuplicatePolicy::LastWins)
            .unwrap();

        let distinct: HashSet<&str> = blocks.iter().map(|(name, _)| name.as_str()).collect();
        prop_assert_eq!(extraction.records.len(), distinct.len());
        prop_assert!(!extraction.residual.contains("<template"));
        let leading = format!("<p>{}</p>", markup);
        prop_assert!(
            extraction.residual.starts_with(&leading),
            "residual {:?} lost the leading markup",
            extraction.residual
        );

        for record in &extraction.records {
            let last_body = blocks
                .iter()
                .rev()
                .find(|(name, _)| *name == record.name)
                .map(|(_, body)| body.as_str());
            prop_assert_eq!(Some(record.body.as_str()), last_body);
        }
    }
}
