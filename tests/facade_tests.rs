use polyfs::{
    ChunkMode, ErrorClass, Filesystem, FsError, MemoryAdapter, Operation, StoreConfig,
    TableAdapter, Visibility, WriteOptions,
};

fn mem(name: &str) -> Filesystem {
    init_tracing();
    Filesystem::memory(StoreConfig::named(name)).expect("open memory store")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn table(name: &str) -> Filesystem {
    Filesystem::table(StoreConfig::named(name)).expect("open table store")
}

#[test]
fn traversal_never_reaches_the_adapter() {
    let fs = mem("it-traversal");
    for raw in ["..", "../secrets", "a/../../b"] {
        let err = fs.read(raw).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Invalid, "raw {raw:?}");
    }
    assert!(matches!(fs.write("/abs", b"x").unwrap_err(), FsError::AbsolutePath { .. }));
    // nothing was created along the way
    assert!(fs.list_contents(".").unwrap().is_empty());
    MemoryAdapter::drop_instance("it-traversal");
}

#[test]
fn end_to_end_walk_on_both_adapters() {
    for fs in [mem("it-walk-mem"), table("it-walk-tab")] {
        fs.write("reports/2024/q1.txt", b"draft").unwrap();
        assert!(fs.file_exists("reports").unwrap());
        assert!(fs.file_exists("reports/2024").unwrap());
        assert_eq!(fs.read("reports/2024/q1.txt").unwrap(), b"draft");

        fs.copy("reports/2024/q1.txt", "archive/q1.txt").unwrap();
        fs.rename("reports/2024/q1.txt", "reports/2024/q1-final.txt").unwrap();
        assert!(!fs.file_exists("reports/2024/q1.txt").unwrap());
        assert_eq!(fs.read("reports/2024/q1-final.txt").unwrap(), b"draft");
        assert_eq!(fs.read("archive/q1.txt").unwrap(), b"draft");

        let mut names: Vec<String> =
            fs.list_contents("reports/2024").unwrap().into_iter().map(|e| e.name).collect();
        names.sort();
        assert_eq!(names, vec!["q1-final.txt".to_string()]);

        fs.set_visibility("archive/q1.txt", Visibility::Public).unwrap();
        assert_eq!(fs.visibility("archive/q1.txt").unwrap(), Visibility::Public);

        fs.append("archive/q1.txt", b" v2").unwrap();
        assert_eq!(fs.read("archive/q1.txt").unwrap(), b"draft v2");
        let info = fs.stat("archive/q1.txt").unwrap();
        assert_eq!(info.size, 8);

        assert!(matches!(
            fs.delete_directory("reports").unwrap_err(),
            FsError::DirectoryNotEmpty { .. }
        ));
        fs.delete_directory_with("reports", &polyfs::DirectoryDeleteOptions::recursive())
            .unwrap();
        assert!(!fs.file_exists("reports").unwrap());

        fs.clear().unwrap();
        assert!(fs.list_contents(".").unwrap().is_empty());
    }
    MemoryAdapter::drop_instance("it-walk-mem");
    TableAdapter::drop_instance("it-walk-tab");
}

#[test]
fn write_options_control_visibility() {
    let fs = mem("it-write-opts");
    fs.write_with(
        "pub/data.txt",
        b"x",
        &WriteOptions {
            visibility: Some(Visibility::Public),
            directory_visibility: Some(Visibility::Public),
        },
    )
    .unwrap();
    assert_eq!(fs.visibility("pub").unwrap(), Visibility::Public);
    assert_eq!(fs.visibility("pub/data.txt").unwrap(), Visibility::Public);
    fs.write("priv/data.txt", b"x").unwrap();
    assert_eq!(fs.visibility("priv").unwrap(), Visibility::Private);
    MemoryAdapter::drop_instance("it-write-opts");
}

#[test]
fn streams_roundtrip_through_the_facade() {
    let fs = mem("it-streams");
    let mut ws = fs.write_stream("blobs/big.bin").unwrap();
    ws.push(b"Hello ");
    ws.push(b"World");
    assert!(!fs.file_exists("blobs/big.bin").unwrap());
    ws.commit().unwrap();

    let rs = fs.read_stream_with("blobs/big.bin", ChunkMode::Bytes(5)).unwrap();
    let chunks: Vec<Vec<u8>> = rs.chunks().collect();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks.concat(), b"Hello World");
    assert!(rs.contains(b"Hello".as_slice()));

    // a cancelled stream leaves no trace
    let mut ws = fs.write_stream("blobs/tmp.bin").unwrap();
    ws.push(b"partial");
    ws.cancel();
    assert!(!fs.file_exists("blobs/tmp.bin").unwrap());
    MemoryAdapter::drop_instance("it-streams");
}

#[test]
fn default_chunking_follows_the_store_config() {
    let mut cfg = StoreConfig::named("it-chunk-cfg");
    cfg.chunk_size = 4;
    let fs = Filesystem::memory(cfg).unwrap();
    fs.write("f.bin", b"123456789").unwrap();
    assert_eq!(fs.read_stream("f.bin").unwrap().len_chunks(), 3);
    MemoryAdapter::drop_instance("it-chunk-cfg");
}

#[test]
fn copy_between_adapters_moves_bytes_across_backends() {
    let src = mem("it-between-src");
    let dst = table("it-between-dst");
    src.write("docs/a.txt", b"cross-store").unwrap();
    src.copy_between(&dst, "docs/a.txt", "imported/a.txt").unwrap();
    assert_eq!(dst.read("imported/a.txt").unwrap(), b"cross-store");
    // source is untouched
    assert_eq!(src.read("docs/a.txt").unwrap(), b"cross-store");
    assert!(src.copy_between(&dst, "missing.txt", "x").unwrap_err().is_not_found());
    MemoryAdapter::drop_instance("it-between-src");
    TableAdapter::drop_instance("it-between-dst");
}

#[test]
fn same_instance_name_shares_one_store() {
    let a = mem("it-shared");
    let b = mem("it-shared");
    a.write("shared.txt", b"from a").unwrap();
    assert_eq!(b.read("shared.txt").unwrap(), b"from a");
    MemoryAdapter::drop_instance("it-shared");
}

#[test]
fn capability_negotiation_is_typed() {
    let fs = mem("it-caps");
    assert!(fs.supports(Operation::Write));
    assert!(fs.supports(Operation::WriteVersion));
    assert!(!fs.supports(Operation::Commit));
    // asking for the other versioning class fails before dispatch
    let err = fs.revisions(None, None).unwrap_err();
    assert!(matches!(
        err,
        FsError::UnsupportedOperation { operation: Operation::Revisions, .. }
    ));

    let unversioned =
        Filesystem::memory(StoreConfig::named("it-caps-none").with_versioning(None)).unwrap();
    assert!(!unversioned.supports(Operation::WriteVersion));
    assert!(unversioned.write_version("a", b"x").is_err());
    MemoryAdapter::drop_instance("it-caps");
    MemoryAdapter::drop_instance("it-caps-none");
}

#[test]
fn random_binary_payloads_roundtrip_intact() -> anyhow::Result<()> {
    use rand::{Rng, SeedableRng};
    let fs = table("it-random");
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x706f6c79);
    for i in 0..8 {
        let len = rng.gen_range(0..16 * 1024);
        let payload: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let path = format!("blobs/{i}.bin");
        fs.write(&path, &payload)?;
        assert_eq!(fs.read(&path)?, payload);
        let streamed: Vec<u8> =
            fs.read_stream_with(&path, ChunkMode::Bytes(777))?.chunks().flatten().collect();
        assert_eq!(streamed, payload);
    }
    TableAdapter::drop_instance("it-random");
    Ok(())
}

#[test]
fn concurrent_writers_never_tear_state() {
    let fs = mem("it-concurrent");
    let mut joins = Vec::new();
    for t in 0..4 {
        let fs = fs.clone();
        joins.push(std::thread::spawn(move || {
            for i in 0..25 {
                fs.write(&format!("t{t}/f{i}.txt"), format!("{t}:{i}").as_bytes()).unwrap();
                fs.write("contended.txt", format!("{t}:{i}").as_bytes()).unwrap();
            }
        }));
    }
    for j in joins {
        j.join().unwrap();
    }
    for t in 0..4 {
        assert_eq!(fs.list_contents(&format!("t{t}")).unwrap().len(), 25);
    }
    // last-writer-wins: content is exactly one of the written values
    let last = fs.read("contended.txt").unwrap();
    let s = String::from_utf8(last).unwrap();
    let (t, i) = s.split_once(':').unwrap();
    assert!(t.parse::<u32>().unwrap() < 4);
    assert!(i.parse::<u32>().unwrap() < 25);
    MemoryAdapter::drop_instance("it-concurrent");
}
