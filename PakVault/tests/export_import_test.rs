//! Batch export and import tests

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use common::{
    FailingConverter, PanicConverter, Recorder, disk_paths, open_bundle, open_bundle_with,
    tiny_png, write_fixture,
};
use pakvault::prelude::*;
use pakvault::progress::silent;

fn panic_registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register(Arc::new(PanicConverter));
    Arc::new(registry)
}

#[tokio::test]
async fn force_native_export_mirrors_structure_and_bytes() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "assets.bnd",
        &[("a.txt", b"alpha"), ("dir/b.bin", &[1, 2, 3, 4])],
    );
    // Every entry claims the panicking converter; force-native must never
    // touch it.
    let session = open_bundle_with(&path, panic_registry()).await;

    let target = dir.path().join("out");
    let outcome = session
        .export_directory(
            session.root().await,
            &target,
            ExportOptions {
                recursive: true,
                selected_only: false,
                force_native: true,
            },
            &SilentInteraction,
            &CancellationToken::new(),
            silent(),
        )
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.exported, 2);
    assert_eq!(outcome.converted, 0);

    // Exactly <target>/assets/a.txt and <target>/assets/dir/b.bin.
    assert_eq!(
        disk_paths(&target),
        vec!["assets/a.txt".to_string(), "assets/dir/b.bin".to_string()]
    );
    assert_eq!(
        std::fs::read(target.join("assets").join("a.txt")).unwrap(),
        b"alpha"
    );
    assert_eq!(
        std::fs::read(target.join("assets").join("dir").join("b.bin")).unwrap(),
        vec![1, 2, 3, 4]
    );
}

#[tokio::test]
async fn export_aborts_if_destination_exists() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "assets.bnd", &[("a.txt", b"alpha")]);
    let session = open_bundle(&path).await;

    let target = dir.path().join("out");
    std::fs::create_dir_all(target.join("assets")).unwrap();

    let err = session
        .export_directory(
            session.root().await,
            &target,
            ExportOptions {
                recursive: true,
                selected_only: false,
                force_native: true,
            },
            &SilentInteraction,
            &CancellationToken::new(),
            silent(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DestinationExists { .. }));
    // Nothing was written into the pre-existing directory.
    assert!(disk_paths(&target).is_empty());
}

#[tokio::test]
async fn export_prompts_once_per_type_and_converts() {
    let dir = tempdir().unwrap();
    let red = tiny_png(255, 0, 0);
    let green = tiny_png(0, 255, 0);
    let path = write_fixture(
        dir.path(),
        "textures.bnd",
        &[("one.png", red.as_slice()), ("two.png", green.as_slice())],
    );
    let session = open_bundle(&path).await;

    let target = dir.path().join("out");
    let recorder = Recorder::converting(FileFormat::new("bmp", "Windows bitmap"));
    let outcome = session
        .export_directory(
            session.root().await,
            &target,
            ExportOptions {
                recursive: true,
                selected_only: false,
                force_native: false,
            },
            &recorder,
            &CancellationToken::new(),
            silent(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.converted, 2);
    assert_eq!(outcome.exported, 0);
    // One prompt covered both files of the same type.
    assert_eq!(recorder.format_prompt_count(), 1);

    assert_eq!(
        disk_paths(&target),
        vec![
            "textures/one.bmp".to_string(),
            "textures/two.bmp".to_string()
        ]
    );
    assert!(
        std::fs::read(target.join("textures").join("one.bmp"))
            .unwrap()
            .starts_with(b"BM")
    );
}

#[tokio::test]
async fn conversion_failure_falls_back_to_native_and_downgrades() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "assets.bnd",
        &[("a.dat", &[1, 2, 3]), ("b.dat", &[4, 5, 6])],
    );
    let mut registry = TypeRegistry::new();
    registry.register(Arc::new(FailingConverter));
    let session = open_bundle_with(&path, Arc::new(registry)).await;

    let target = dir.path().join("out");
    let recorder = Recorder::converting(FileFormat::new("alt", "Alternate format"));
    let outcome = session
        .export_directory(
            session.root().await,
            &target,
            ExportOptions {
                recursive: true,
                selected_only: false,
                force_native: false,
            },
            &recorder,
            &CancellationToken::new(),
            silent(),
        )
        .await
        .unwrap();

    // Both conversions failed, both fell back to native; the batch survived.
    assert_eq!(outcome.exported, 2);
    assert_eq!(outcome.converted, 0);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(
        disk_paths(&target),
        vec!["assets/a.dat".to_string(), "assets/b.dat".to_string()]
    );

    // Entries are error-typed going forward.
    let a = session
        .with_tree(|tree| tree.find_file(tree.root(), "a.dat"))
        .await
        .unwrap();
    let is_error = session
        .with_tree(|tree| {
            tree.file(a)
                .map(|f| f.descriptor().is_some_and(|d| d.is_error()))
        })
        .await
        .unwrap();
    assert!(is_error);
}

#[tokio::test]
async fn selected_only_export_filters_entries() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "assets.bnd",
        &[("a.txt", b"alpha"), ("b.txt", b"beta")],
    );
    let session = open_bundle(&path).await;

    let b = session
        .with_tree(|tree| tree.find_file(tree.root(), "b.txt"))
        .await
        .unwrap();
    session.set_selected(b, true).await.unwrap();

    let target = dir.path().join("out");
    let outcome = session
        .export_directory(
            session.root().await,
            &target,
            ExportOptions {
                recursive: true,
                selected_only: true,
                force_native: true,
            },
            &SilentInteraction,
            &CancellationToken::new(),
            silent(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.exported, 1);
    assert_eq!(disk_paths(&target), vec!["assets/b.txt".to_string()]);
}

#[tokio::test]
async fn import_converts_matching_stem_with_supported_extension() {
    let dir = tempdir().unwrap();
    // "a.bin" carries PNG content, so it detects as an image that supports
    // .png import.
    let stored = tiny_png(255, 0, 0);
    let path = write_fixture(dir.path(), "assets.bnd", &[("a.bin", stored.as_slice())]);
    let session = open_bundle(&path).await;

    let source = dir.path().join("src");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("a.png"), tiny_png(0, 0, 255)).unwrap();

    let outcome = session
        .import_directory(
            session.root().await,
            &source,
            &CancellationToken::new(),
            silent(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.converted, 1);
    assert_eq!(outcome.imported, 0);
    assert!(!outcome.nothing_imported());

    let a = session
        .with_tree(|tree| tree.find_file(tree.root(), "a.bin"))
        .await
        .unwrap();
    let modified = session
        .with_tree(|tree| tree.file(a).map(FileEntry::is_modified))
        .await
        .unwrap();
    assert!(modified);
    assert_eq!(session.modified_count(), 1);
}

#[tokio::test]
async fn import_exact_name_is_raw_passthrough() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "assets.bnd",
        &[("a.txt", b"old"), ("dir/b.txt", b"older")],
    );
    let session = open_bundle(&path).await;

    let source = dir.path().join("src");
    std::fs::create_dir_all(source.join("dir")).unwrap();
    std::fs::write(source.join("a.txt"), b"new root").unwrap();
    std::fs::write(source.join("dir").join("b.txt"), b"new nested").unwrap();

    let outcome = session
        .import_directory(
            session.root().await,
            &source,
            &CancellationToken::new(),
            silent(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.converted, 0);

    let b = session
        .with_tree(|tree| {
            let dir = tree.resolve_path("dir").unwrap();
            tree.find_file(dir, "b.txt")
        })
        .await
        .unwrap();
    let out = dir.path().join("b.check");
    session.export_file(b, &out, None).await.unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"new nested");
}

#[tokio::test]
async fn import_with_no_candidates_warns_and_modifies_nothing() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "assets.bnd", &[("a.bin", &[0, 1, 2])]);
    let session = open_bundle(&path).await;

    let source = dir.path().join("empty");
    std::fs::create_dir_all(&source).unwrap();

    let outcome = session
        .import_directory(
            session.root().await,
            &source,
            &CancellationToken::new(),
            silent(),
        )
        .await
        .unwrap();

    assert!(outcome.nothing_imported());
    assert_eq!(outcome.skipped, 1);
    assert_eq!(session.modified_count(), 0);
}
