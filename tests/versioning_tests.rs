use polyfs::{Filesystem, MemoryAdapter, StoreConfig, TableAdapter, VersioningClass, Visibility};

fn snapshot_fs(name: &str) -> Filesystem {
    Filesystem::memory(
        StoreConfig::named(name).with_versioning(Some(VersioningClass::Snapshot)),
    )
    .expect("open snapshot store")
}

fn checkpoint_fs(name: &str) -> Filesystem {
    Filesystem::table(
        StoreConfig::named(name).with_versioning(Some(VersioningClass::Checkpoint)),
    )
    .expect("open checkpoint store")
}

#[test]
fn snapshot_versions_accumulate_per_path() {
    let fs = snapshot_fs("vt-accumulate");
    let v1 = fs.write_version("doc.txt", b"first").unwrap();
    let v2 = fs.write_version("doc.txt", b"second").unwrap();
    assert_eq!(v1.version_id.len(), 32);
    assert_ne!(v1.version_id, v2.version_id);

    let versions = fs.list_versions("doc.txt").unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version_id, v1.version_id);
    assert_eq!(fs.get_latest_version("doc.txt").unwrap().version_id, v2.version_id);

    // current content is the last versioned write
    assert_eq!(fs.read("doc.txt").unwrap(), b"second");
    assert_eq!(fs.read_version("doc.txt", &v1.version_id).unwrap(), b"first");
    MemoryAdapter::drop_instance("vt-accumulate");
}

#[test]
fn plain_write_does_not_mint_a_version() {
    let fs = snapshot_fs("vt-plain-write");
    fs.write_version("doc.txt", b"versioned").unwrap();
    fs.write("doc.txt", b"unversioned").unwrap();
    assert_eq!(fs.list_versions("doc.txt").unwrap().len(), 1);
    assert_eq!(fs.read("doc.txt").unwrap(), b"unversioned");
    MemoryAdapter::drop_instance("vt-plain-write");
}

#[test]
fn restore_rewinds_content_without_new_version() {
    let fs = snapshot_fs("vt-restore");
    let v1 = fs.write_version("doc.txt", b"first").unwrap();
    fs.write_version("doc.txt", b"second").unwrap();
    fs.restore_version("doc.txt", &v1.version_id).unwrap();
    assert_eq!(fs.read("doc.txt").unwrap(), b"first");
    assert_eq!(fs.list_versions("doc.txt").unwrap().len(), 2);
    assert!(fs.restore_version("doc.txt", "0000deadbeef0000deadbeef0000dead").is_err());
    MemoryAdapter::drop_instance("vt-restore");
}

#[test]
fn delete_version_keeps_current_and_other_versions() {
    let fs = snapshot_fs("vt-delete");
    let v1 = fs.write_version("doc.txt", b"first").unwrap();
    let v2 = fs.write_version("doc.txt", b"second").unwrap();
    fs.delete_version("doc.txt", &v1.version_id).unwrap();
    assert!(fs.read_version("doc.txt", &v1.version_id).unwrap_err().is_not_found());
    assert_eq!(fs.read_version("doc.txt", &v2.version_id).unwrap(), b"second");
    assert_eq!(fs.read("doc.txt").unwrap(), b"second");
    // deleting twice reports the version as gone
    assert!(fs.delete_version("doc.txt", &v1.version_id).unwrap_err().is_not_found());
    MemoryAdapter::drop_instance("vt-delete");
}

#[test]
fn version_history_is_isolated_per_path() {
    let fs = snapshot_fs("vt-isolated");
    fs.write_version("a.txt", b"a").unwrap();
    fs.write_version("b.txt", b"b").unwrap();
    assert_eq!(fs.list_versions("a.txt").unwrap().len(), 1);
    assert_eq!(fs.list_versions("b.txt").unwrap().len(), 1);
    assert!(fs.list_versions("never.txt").unwrap().is_empty());
    assert!(fs.get_latest_version("never.txt").unwrap_err().is_not_found());
    MemoryAdapter::drop_instance("vt-isolated");
}

#[test]
fn commit_collects_pending_mutations() {
    let fs = checkpoint_fs("vt-commit");
    // nothing pending yet
    assert!(fs.commit(Some("empty")).unwrap().is_none());

    fs.write("a.txt", b"one").unwrap();
    fs.write("b.txt", b"two").unwrap();
    let c1 = fs.commit(Some("initial import")).unwrap().expect("checkpoint minted");
    assert_eq!(c1.sha.len(), 40);
    assert_eq!(c1.message, "initial import");
    assert_eq!(c1.author_name, "polyfs");

    // committed: nothing pending again
    assert!(fs.commit(None).unwrap().is_none());

    fs.write("a.txt", b"one-v2").unwrap();
    let c2 = fs.commit(None).unwrap().expect("second checkpoint");
    assert_eq!(c2.message, "checkpoint");

    let all = fs.revisions(None, None).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].sha, c2.sha); // newest first

    // b.txt was only touched by the first checkpoint
    let only_b = fs.revisions(Some("b.txt"), None).unwrap();
    assert_eq!(only_b.len(), 1);
    assert_eq!(only_b[0].sha, c1.sha);
    assert!(fs.revisions(None, Some(0)).unwrap().is_empty());
    TableAdapter::drop_instance("vt-commit");
}

#[test]
fn read_revision_returns_historical_content() {
    let fs = checkpoint_fs("vt-read-rev");
    fs.write("log.txt", b"v1").unwrap();
    let c1 = fs.commit(Some("first")).unwrap().unwrap();
    fs.write("log.txt", b"v2").unwrap();
    let c2 = fs.commit(Some("second")).unwrap().unwrap();

    assert_eq!(fs.read_revision("log.txt", &c1.sha).unwrap(), b"v1");
    assert_eq!(fs.read_revision("log.txt", &c2.sha).unwrap(), b"v2");
    assert!(fs.read_revision("log.txt", "ffffffffffffffffffffffffffffffffffffffff").is_err());
    assert!(fs.read_revision("absent.txt", &c1.sha).unwrap_err().is_not_found());
    TableAdapter::drop_instance("vt-read-rev");
}

#[test]
fn rollback_restores_the_whole_tree() {
    let fs = checkpoint_fs("vt-rollback");
    fs.write("keep/a.txt", b"a1").unwrap();
    let c1 = fs.commit(Some("baseline")).unwrap().unwrap();

    fs.write("keep/a.txt", b"a2").unwrap();
    fs.write("new/b.txt", b"b").unwrap();
    fs.commit(Some("later")).unwrap().unwrap();

    fs.rollback(&c1.sha, None).unwrap();
    assert_eq!(fs.read("keep/a.txt").unwrap(), b"a1");
    assert!(!fs.file_exists("new/b.txt").unwrap());
    // history itself is untouched by rollback
    assert_eq!(fs.revisions(None, None).unwrap().len(), 2);
    TableAdapter::drop_instance("vt-rollback");
}

#[test]
fn rollback_of_a_single_path_leaves_the_rest() {
    let fs = checkpoint_fs("vt-rollback-one");
    fs.write("a.txt", b"a1").unwrap();
    fs.write("b.txt", b"b1").unwrap();
    let c1 = fs.commit(Some("baseline")).unwrap().unwrap();
    fs.write("a.txt", b"a2").unwrap();
    fs.write("b.txt", b"b2").unwrap();
    fs.commit(Some("later")).unwrap().unwrap();

    fs.rollback(&c1.sha, Some("a.txt")).unwrap();
    assert_eq!(fs.read("a.txt").unwrap(), b"a1");
    assert_eq!(fs.read("b.txt").unwrap(), b"b2");

    // a path absent at the checkpoint is an error, not a silent no-op
    fs.write("late.txt", b"x").unwrap();
    fs.commit(None).unwrap();
    assert!(fs.rollback(&c1.sha, Some("late.txt")).unwrap_err().is_not_found());
    TableAdapter::drop_instance("vt-rollback-one");
}

#[test]
fn rollback_of_a_directory_restores_its_subtree() {
    let fs = checkpoint_fs("vt-rollback-dir");
    fs.write("dir/keep.txt", b"keep").unwrap();
    fs.write("dir/sub/deep.txt", b"deep").unwrap();
    fs.write("outside.txt", b"out1").unwrap();
    let c1 = fs.commit(Some("baseline")).unwrap().unwrap();

    fs.delete("dir/keep.txt").unwrap();
    fs.write("dir/added.txt", b"new").unwrap();
    fs.write("outside.txt", b"out2").unwrap();
    fs.commit(Some("churn")).unwrap().unwrap();

    fs.rollback(&c1.sha, Some("dir")).unwrap();
    // children deleted since the checkpoint come back
    assert_eq!(fs.read("dir/keep.txt").unwrap(), b"keep");
    assert_eq!(fs.read("dir/sub/deep.txt").unwrap(), b"deep");
    // children added since the checkpoint are gone
    assert!(!fs.file_exists("dir/added.txt").unwrap());
    // the rest of the tree keeps its later state
    assert_eq!(fs.read("outside.txt").unwrap(), b"out2");
    TableAdapter::drop_instance("vt-rollback-dir");
}

#[test]
fn rolled_back_state_can_be_committed() {
    let fs = checkpoint_fs("vt-rollback-commit");
    fs.write("a.txt", b"v1").unwrap();
    let c1 = fs.commit(Some("baseline")).unwrap().unwrap();
    fs.write("a.txt", b"v2").unwrap();
    fs.commit(Some("later")).unwrap().unwrap();

    fs.rollback(&c1.sha, None).unwrap();
    // the restore counts as pending work, so an explicit commit checkpoints it
    let c3 = fs.commit(Some("after rollback")).unwrap().expect("checkpoint minted");
    assert_eq!(fs.read_revision("a.txt", &c3.sha).unwrap(), b"v1");
    assert_eq!(fs.revisions(None, None).unwrap().len(), 3);
    TableAdapter::drop_instance("vt-rollback-commit");
}

#[test]
fn checkpoint_metadata_survives_rollback() {
    let fs = checkpoint_fs("vt-meta");
    fs.write("v.txt", b"x").unwrap();
    fs.set_visibility("v.txt", Visibility::Public).unwrap();
    let c1 = fs.commit(Some("public")).unwrap().unwrap();
    fs.set_visibility("v.txt", Visibility::Private).unwrap();
    fs.commit(None).unwrap();

    fs.rollback(&c1.sha, None).unwrap();
    assert_eq!(fs.visibility("v.txt").unwrap(), Visibility::Public);
    TableAdapter::drop_instance("vt-meta");
}
