//! Explorer tests: addresses, navigation, cross-archive search, edit-in-place

mod common;

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use common::{open_bundle, write_fixture};
use pakvault::prelude::*;

fn explorer() -> ExplorerController {
    ExplorerController::new(Arc::new(TypeRegistry::with_defaults()))
}

#[tokio::test]
async fn open_navigate_and_format_addresses() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "assets.bnd",
        &[("a.txt", b"alpha"), ("models/b.bin", &[1])],
    );

    let explorer = explorer();
    let session = explorer
        .open_archive(&path, Arc::new(BundleCodec::new()))
        .await
        .unwrap();
    assert_eq!(session.name(), "assets");

    let (nav_session, dir_id) = explorer.navigate("assets:/models").await.unwrap();
    assert_eq!(nav_session.name(), "assets");
    assert_eq!(
        explorer.format_address(&nav_session, dir_id).await.unwrap(),
        "assets:/models"
    );
    assert_eq!(
        explorer.current().map(|(name, _)| name),
        Some("assets".to_string())
    );

    // Root address round trip.
    let (_, root_id) = explorer.navigate("assets:/").await.unwrap();
    assert_eq!(
        explorer.format_address(&session, root_id).await.unwrap(),
        "assets:/"
    );
}

#[tokio::test]
async fn bad_addresses_are_rejected() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "assets.bnd", &[("a.txt", b"alpha")]);

    let explorer = explorer();
    explorer
        .open_archive(&path, Arc::new(BundleCodec::new()))
        .await
        .unwrap();

    assert!(matches!(
        explorer.navigate("no-colon").await,
        Err(Error::InvalidAddress(_))
    ));
    assert!(matches!(
        explorer.navigate("unknown:/a").await,
        Err(Error::ArchiveNotOpen(_))
    ));
    assert!(matches!(
        explorer.navigate("assets:/missing/dir").await,
        Err(Error::EntryNotFound(_))
    ));
}

#[tokio::test]
async fn duplicate_archive_names_conflict() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "assets.bnd", &[("a.txt", b"alpha")]);
    let other_dir = dir.path().join("other");
    std::fs::create_dir_all(&other_dir).unwrap();
    let other = write_fixture(&other_dir, "assets.bnd", &[("b.txt", b"beta")]);

    let explorer = explorer();
    explorer
        .open_archive(&path, Arc::new(BundleCodec::new()))
        .await
        .unwrap();
    let err = explorer
        .open_archive(&other, Arc::new(BundleCodec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NameConflict { .. }));
}

#[tokio::test]
async fn search_spans_every_open_archive() {
    let dir = tempdir().unwrap();
    let first = write_fixture(
        dir.path(),
        "core.bnd",
        &[("ui/icon_sword.png", &[1]), ("ui/icon_shield.png", &[2])],
    );
    let second = write_fixture(
        dir.path(),
        "patch.bnd",
        &[("icon_sword.png", &[3]), ("readme.txt", b"hi")],
    );

    let explorer = explorer();
    explorer
        .open_archive(&first, Arc::new(BundleCodec::new()))
        .await
        .unwrap();
    explorer
        .open_archive(&second, Arc::new(BundleCodec::new()))
        .await
        .unwrap();

    let mut addresses: Vec<String> = explorer
        .search("ICON_SWORD")
        .into_iter()
        .map(|hit| hit.address)
        .collect();
    addresses.sort();
    assert_eq!(
        addresses,
        vec![
            "core:/ui/icon_sword.png".to_string(),
            "patch:/icon_sword.png".to_string()
        ]
    );

    assert!(explorer.search("").is_empty());
    assert!(explorer.search("nothing-matches").is_empty());
}

#[tokio::test]
async fn close_archive_forgets_the_session() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "assets.bnd", &[("a.txt", b"alpha")]);

    let explorer = explorer();
    explorer
        .open_archive(&path, Arc::new(BundleCodec::new()))
        .await
        .unwrap();
    explorer.navigate("assets:/").await.unwrap();

    explorer.close_archive("assets").unwrap();
    assert!(explorer.current().is_none());
    assert!(matches!(
        explorer.session("assets"),
        Err(Error::ArchiveNotOpen(_))
    ));
    assert!(matches!(
        explorer.close_archive("assets"),
        Err(Error::ArchiveNotOpen(_))
    ));
}

/// Editor that rewrites the staged file with fixed bytes
struct RewritingEditor(&'static [u8]);

impl ExternalEditor for RewritingEditor {
    fn edit(&self, path: &Path) -> pakvault::Result<()> {
        std::fs::write(path, self.0)?;
        Ok(())
    }
}

/// Editor that leaves the staged file alone
struct IdleEditor;

impl ExternalEditor for IdleEditor {
    fn edit(&self, _path: &Path) -> pakvault::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn edit_in_place_requeues_changed_bytes() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "assets.bnd", &[("notes.txt", b"before")]);
    let session = open_bundle(&path).await;

    let file = session
        .with_tree(|tree| tree.find_file(tree.root(), "notes.txt"))
        .await
        .unwrap();

    let outcome = session
        .edit_file(file, &RewritingEditor(b"after"), None)
        .await
        .unwrap();
    assert!(outcome.modified);
    assert_eq!(session.modified_count(), 1);

    let out = dir.path().join("notes.check");
    session.export_file(file, &out, None).await.unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"after");
}

#[tokio::test]
async fn edit_in_place_without_changes_is_a_no_op() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "assets.bnd", &[("notes.txt", b"same")]);
    let session = open_bundle(&path).await;

    let file = session
        .with_tree(|tree| tree.find_file(tree.root(), "notes.txt"))
        .await
        .unwrap();

    let outcome = session.edit_file(file, &IdleEditor, None).await.unwrap();
    assert!(!outcome.modified);
    assert_eq!(session.modified_count(), 0);
}
