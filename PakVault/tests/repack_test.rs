//! Repack transaction tests: round trips, edit application, cancellation

mod common;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use common::{open_bundle, write_fixture};
use pakvault::prelude::*;
use pakvault::progress::silent;

fn sorted(mut paths: Vec<String>) -> Vec<String> {
    paths.sort();
    paths
}

#[tokio::test]
async fn zero_edit_repack_preserves_every_path() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "assets.bnd",
        &[
            ("a.txt", b"alpha"),
            ("models/b.bin", &[1, 2, 3]),
            ("models/high/c.bin", &[4, 5, 6]),
            ("sounds/d.ogg", &[7, 8]),
        ],
    );
    let session = open_bundle(&path).await;

    let before = sorted(session.with_tree(ArchiveTree::all_file_paths).await);
    let outcome = session.repack(&CancellationToken::new(), silent()).await.unwrap();
    let after = sorted(session.with_tree(ArchiveTree::all_file_paths).await);

    assert_eq!(before, after);
    assert_eq!(outcome.files_written, 4);
    assert_eq!(outcome.edits_applied, 0);
}

#[tokio::test]
async fn sequential_repacks_do_not_accumulate_modifications() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "a.bnd", &[("a.txt", b"hello")]);
    let session = open_bundle(&path).await;

    session.repack(&CancellationToken::new(), silent()).await.unwrap();
    session.repack(&CancellationToken::new(), silent()).await.unwrap();

    assert_eq!(session.modified_count(), 0);
}

#[tokio::test]
async fn repack_applies_pending_edits_and_clears_them() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "a.bnd",
        &[("a.txt", b"old"), ("keep.bin", &[9, 9])],
    );
    let session = open_bundle(&path).await;

    let file = session
        .with_tree(|tree| tree.find_file(tree.root(), "a.txt"))
        .await
        .unwrap();
    session
        .replace_file(file, &mut &b"replacement"[..], None, false)
        .await
        .unwrap();

    let outcome = session.repack(&CancellationToken::new(), silent()).await.unwrap();
    assert_eq!(outcome.edits_applied, 1);

    // All old ids are stale after the reload.
    assert!(
        session
            .with_tree(|tree| tree.file(file).map(|_| ()))
            .await
            .is_err()
    );

    // The rewritten archive carries the new bytes and no pending state.
    let reloaded = session
        .with_tree(|tree| tree.find_file(tree.root(), "a.txt"))
        .await
        .unwrap();
    let modified = session
        .with_tree(|tree| tree.file(reloaded).map(FileEntry::is_modified))
        .await
        .unwrap();
    assert!(!modified);

    let out = dir.path().join("a.txt");
    session.export_file(reloaded, &out, None).await.unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"replacement");
}

#[tokio::test]
async fn repack_persists_renames_and_deletions() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "a.bnd",
        &[("a.txt", b"alpha"), ("drop.bin", &[0]), ("dir/b.txt", b"beta")],
    );
    let session = open_bundle(&path).await;

    let a = session
        .with_tree(|tree| tree.find_file(tree.root(), "a.txt"))
        .await
        .unwrap();
    session.rename_file(a, "renamed.txt").await.unwrap();

    let drop_id = session
        .with_tree(|tree| tree.find_file(tree.root(), "drop.bin"))
        .await
        .unwrap();
    session.delete_file(drop_id).await.unwrap();

    session.repack(&CancellationToken::new(), silent()).await.unwrap();

    // Reopen from disk: the rewritten archive is the source of truth.
    let fresh = open_bundle(&path).await;
    let paths = sorted(fresh.with_tree(ArchiveTree::all_file_paths).await);
    assert_eq!(paths, vec!["dir/b.txt".to_string(), "renamed.txt".to_string()]);

    let renamed = fresh
        .with_tree(|tree| tree.find_file(tree.root(), "renamed.txt"))
        .await
        .unwrap();
    let out = dir.path().join("renamed.out");
    fresh.export_file(renamed, &out, None).await.unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"alpha");
}

#[tokio::test]
async fn cancelled_repack_leaves_archive_and_tree_untouched() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "a.bnd", &[("a.txt", b"hello")]);
    let original_bytes = std::fs::read(&path).unwrap();

    let session = open_bundle(&path).await;
    let before = session.with_tree(ArchiveTree::all_file_paths).await;

    let token = CancellationToken::new();
    token.cancel();
    let err = session.repack(&token, silent()).await.unwrap_err();
    assert!(matches!(err, Error::RepackCancelled));

    // Original file bytes and the in-memory tree are both intact.
    assert_eq!(std::fs::read(&path).unwrap(), original_bytes);
    let after = session.with_tree(ArchiveTree::all_file_paths).await;
    assert_eq!(before, after);

    // The session stays usable: a later repack succeeds.
    session.repack(&CancellationToken::new(), silent()).await.unwrap();
}

#[tokio::test]
async fn repack_keeps_added_directories_with_files() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "a.bnd", &[("a.txt", b"alpha")]);
    let session = open_bundle(&path).await;

    let root = session.root().await;
    let new_dir = session.add_directory(root, "extra").await.unwrap();

    let source = dir.path().join("src");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("new.txt"), b"created").unwrap();
    session
        .add_files(new_dir, &[source.join("new.txt")], &SilentInteraction)
        .await
        .unwrap();

    session.repack(&CancellationToken::new(), silent()).await.unwrap();

    let paths = sorted(session.with_tree(ArchiveTree::all_file_paths).await);
    assert_eq!(paths, vec!["a.txt".to_string(), "extra/new.txt".to_string()]);
}
