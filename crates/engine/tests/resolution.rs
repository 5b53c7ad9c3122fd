mod common;

use common::*;
use engine::{ConflictPolicy, DiscoveryError, Pipeline};
use model::Version;
use tempfile::tempdir;

#[test]
fn highest_version_of_each_plugin_is_activated() {
    let dir = tempdir().unwrap();
    for (file, version) in [("foo-a.jar", "1.0.0"), ("foo-b.jar", "2.0.0"), ("foo-c.jar", "1.5.0")] {
        write(
            dir.path(),
            file,
            &plugin_bytes(&[("Plugin-Id", "foo"), ("Plugin-Version", version)], &[]),
        );
    }
    write(dir.path(), "bar.jar", &plugin_bytes(&[("Plugin-Id", "bar")], &[]));

    let outcome = Pipeline::new(config(dir.path())).unwrap().run().unwrap();

    let active: Vec<_> = outcome
        .activation
        .iter()
        .map(|c| (c.id.as_str(), c.version.clone()))
        .collect();
    assert_eq!(active, vec![("bar", Version::new(0, 0, 0)), ("foo", Version::new(2, 0, 0))]);
    assert!(outcome.disabled_files.contains("foo-a.jar"));
    assert!(outcome.disabled_files.contains("foo-c.jar"));
    assert!(!outcome.disabled_files.contains("foo-b.jar"));
}

#[test]
fn disabled_archives_are_not_scanned_again() {
    let dir = tempdir().unwrap();
    write(dir.path(), "old.jar", &plugin_bytes(&[("Plugin-Id", "foo"), ("Plugin-Version", "1.0")], &[]));
    write(dir.path(), "new.jar", &plugin_bytes(&[("Plugin-Id", "foo"), ("Plugin-Version", "1.1")], &[]));

    let pipeline = Pipeline::new(config(dir.path())).unwrap();
    let outcome = pipeline.run().unwrap();

    assert!(pipeline.registries().is_disabled("old.jar"));
    assert_eq!(outcome.discovery.stats.roots_submitted, 1);
    assert_eq!(outcome.activation.len(), 1);
    assert_eq!(outcome.activation[0].filename(), "new.jar");
}

#[test]
fn strict_policy_fails_on_ambiguous_duplicates() {
    let dir = tempdir().unwrap();
    write(dir.path(), "one.jar", &plugin_bytes(&[("Plugin-Id", "foo"), ("Plugin-Version", "1.0.0")], &[]));
    write(
        dir.path(),
        "two.jar",
        &plugin_bytes(
            &[("Plugin-Id", "foo"), ("Plugin-Version", "1.0.0")],
            &[("extra.txt", b"different".to_vec())],
        ),
    );
    let mut cfg = config(dir.path());
    cfg.conflict_policy = ConflictPolicy::Strict;

    let err = Pipeline::new(cfg).unwrap().run().unwrap_err();

    match err {
        DiscoveryError::CriticalResolution { id, files, .. } => {
            assert_eq!(id, "foo");
            assert_eq!(files, vec!["one.jar".to_string(), "two.jar".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lenient_policy_keeps_the_first_equal_version() {
    let dir = tempdir().unwrap();
    write(dir.path(), "one.jar", &plugin_bytes(&[("Plugin-Id", "foo"), ("Plugin-Version", "1.0.0")], &[]));
    write(dir.path(), "two.jar", &plugin_bytes(&[("Plugin-Id", "foo"), ("Plugin-Version", "1.0.0")], &[]));

    let outcome = Pipeline::new(config(dir.path())).unwrap().run().unwrap();

    assert_eq!(outcome.activation.len(), 1);
    assert_eq!(outcome.activation[0].filename(), "one.jar");
    assert!(outcome.disabled_files.contains("two.jar"));
}

#[test]
fn archives_without_classes_are_libraries() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "lib.jar",
        &zip_bytes(&[("META-INF/MANIFEST.MF", manifest(&[])), ("data.txt", b"x".to_vec())]),
    );
    write(dir.path(), "mod.jar", &plugin_bytes(&[("Plugin-Id", "mod")], &[]));

    let outcome = Pipeline::new(config(dir.path())).unwrap().run().unwrap();

    assert_eq!(outcome.libraries.len(), 1);
    assert!(outcome.libraries[0].ends_with("lib.jar"));
}
