use crate::common::faulty_fs::FaultyFs;
use crate::common::fixtures::{
    file, file_in, five_items, folder, init_logging, mapped_pairs, shortcut,
};
use drive_projection::projection::attributes::{MetadataCodec, REMOTE_ID_ATTR};
use drive_projection::projection::vfs::{MemoryFs, VfsOps};
use drive_projection::projection::{BatchMapper, PathMappingTable, ProjectionError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn mapper_over(vfs: Arc<dyn VfsOps>, max_concurrent_items: usize) -> BatchMapper {
    BatchMapper::new(
        vfs,
        Arc::new(PathMappingTable::new()),
        CancellationToken::new(),
        max_concurrent_items,
    )
}

#[tokio::test]
async fn test_map_batch_twice_is_idempotent() {
    init_logging();
    let fs = Arc::new(MemoryFs::new());
    let mapper = mapper_over(fs.clone(), 4);
    let batch = vec![
        folder("f1", "Docs"),
        file("r1", "a.txt"),
        shortcut("s1", "to-docs", "f1"),
    ];

    mapper.map_batch(batch.clone(), None, true, true).await.unwrap();
    let first = mapped_pairs(mapper.table());
    let nodes = fs.node_count().unwrap();

    let second = mapper.map_batch(batch, None, true, true).await.unwrap();
    assert!(second.mapped.is_empty());
    assert_eq!(second.already_mapped.len(), 3);
    assert!(second.conflicts.is_empty());
    assert_eq!(mapped_pairs(mapper.table()), first);
    assert_eq!(fs.node_count().unwrap(), nodes);
}

#[tokio::test]
async fn test_independent_folder_and_file_map_in_either_order() {
    init_logging();
    for batch in [
        vec![folder("F", "Folder"), file("G", "g.txt")],
        vec![file("G", "g.txt"), folder("F", "Folder")],
    ] {
        let fs = Arc::new(MemoryFs::new());
        let mapper = mapper_over(fs.clone(), 4);

        mapper.map_batch(batch, None, true, false).await.unwrap();

        assert_eq!(mapper.table().mapped_len(), 2);
        assert_eq!(
            mapper.table().try_get_mapped_path("F"),
            Some(PathBuf::from("/Folder"))
        );
        assert_eq!(
            mapper.table().try_get_mapped_path("G"),
            Some(PathBuf::from("/g.txt"))
        );
    }
}

#[tokio::test]
async fn test_shortcut_resolves_in_second_batch() {
    init_logging();
    let fs = Arc::new(MemoryFs::new());
    let mapper = mapper_over(fs.clone(), 4);

    mapper
        .map_batch(vec![folder("A", "A"), file_in("b", "B.txt", "A")], None, true, true)
        .await
        .unwrap_or_else(|e| panic!("first batch failed: {e}"));
    // B's parent A is in the same batch; the folder phase maps it first.
    assert_eq!(
        mapper.table().try_get_mapped_path("b"),
        Some(PathBuf::from("/A/B.txt"))
    );

    mapper
        .map_batch(vec![shortcut("S", "S", "b")], Some(Path::new("/")), false, true)
        .await
        .unwrap();

    assert!(mapper.table().is_mapped("S"));
    assert_eq!(fs.read_link(Path::new("/S")).unwrap(), PathBuf::from("/A/B.txt"));
    assert_eq!(fs.canonicalize(Path::new("/S")).unwrap(), PathBuf::from("/A/B.txt"));
    assert_eq!(
        MetadataCodec::read_remote_id(&*fs, Path::new("/S")).unwrap(),
        "S"
    );
}

#[tokio::test]
async fn test_shortcut_before_target_in_same_batch_is_not_mapped() {
    init_logging();
    let fs = Arc::new(MemoryFs::new());
    let mapper = mapper_over(fs.clone(), 4);

    let report = mapper
        .map_batch(vec![shortcut("S", "S", "b"), file("b", "B.txt")], None, true, false)
        .await
        .unwrap();

    // map_batch alone never retries: S stays pending.
    assert!(mapper.table().is_mapped("b"));
    assert!(!mapper.table().is_mapped("S"));
    assert!(mapper.table().is_pending("S"));
    assert_eq!(report.unresolved, vec!["S".to_string()]);
    assert!(!fs.exists(Path::new("/S")));

    let resolved = mapper.resolve_pending().await.unwrap();
    assert_eq!(resolved.mapped_ids(), vec!["S"]);
    assert!(!mapper.table().is_pending("S"));
    assert_eq!(fs.read_link(Path::new("/S")).unwrap(), PathBuf::from("/B.txt"));
}

#[tokio::test]
async fn test_same_name_different_id_is_a_conflict() {
    init_logging();
    let fs = Arc::new(MemoryFs::new());
    let mapper = mapper_over(fs.clone(), 4);

    mapper
        .map_batch(vec![file("one", "dup.txt")], None, true, false)
        .await
        .unwrap();
    let report = mapper
        .map_batch(vec![file("two", "dup.txt")], None, true, false)
        .await
        .unwrap();

    assert_eq!(report.conflicts, vec![PathBuf::from("/dup.txt")]);
    assert!(!mapper.table().is_mapped("two"));
    assert_eq!(fs.read_dir(Path::new("/")).unwrap().len(), 1);
    assert_eq!(
        fs.get_xattr(Path::new("/dup.txt"), REMOTE_ID_ATTR).unwrap(),
        Some(b"one".to_vec())
    );
}

#[tokio::test]
async fn test_failing_item_does_not_stop_the_batch() {
    init_logging();
    let fs = Arc::new(FaultyFs::new());
    fs.fail_on("item3.txt");
    let mapper = mapper_over(fs.clone(), 2);

    let report = mapper.map_batch(five_items(), None, true, false).await.unwrap();

    let mut mapped = report.mapped_ids();
    mapped.sort();
    assert_eq!(mapped, vec!["i1", "i2", "i4", "i5"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "i3");
    assert!(!mapper.table().is_mapped("i3"));
}

#[tokio::test]
async fn test_panicking_item_does_not_stop_the_batch() {
    init_logging();
    let fs = Arc::new(FaultyFs::new());
    fs.panic_on("item3.txt");
    let mapper = mapper_over(fs.clone(), 2);

    let report = mapper.map_batch(five_items(), None, true, false).await.unwrap();

    assert_eq!(report.mapped.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].reason.contains("panicked"));
    for id in ["i1", "i2", "i4", "i5"] {
        assert!(mapper.table().is_mapped(id), "{id} should be mapped");
    }
}

#[tokio::test]
async fn test_refused_attributes_still_map() {
    init_logging();
    let fs = Arc::new(FaultyFs::new());
    fs.refuse_xattrs();
    let mapper = mapper_over(fs.clone(), 2);

    let report = mapper
        .map_batch(vec![file("r1", "a.txt")], None, true, false)
        .await
        .unwrap();

    assert_eq!(report.mapped_ids(), vec!["r1"]);
    assert_eq!(report.incomplete_metadata, vec!["r1".to_string()]);
}

#[tokio::test]
async fn test_cancellation_mid_batch() {
    init_logging();
    let fs = Arc::new(FaultyFs::new());
    let cancel = CancellationToken::new();
    let mapper = BatchMapper::new(
        fs.clone(),
        Arc::new(PathMappingTable::new()),
        cancel.clone(),
        1,
    );

    let trigger = cancel.clone();
    fs.on_create(move |path| {
        if path == Path::new("/item2.txt") {
            trigger.cancel();
        }
    });

    let batch = five_items();
    let total = batch.len();
    let err = mapper.map_batch(batch, None, true, false).await.unwrap_err();

    assert!(matches!(err, ProjectionError::Cancelled));
    let mapped = mapper.table().mapped_len();
    assert!(mapped <= total);
    assert!(mapped < total, "cancellation should stop further submission");
    assert!(fs.creations() < total);
}

#[tokio::test]
async fn test_cancelled_token_rejects_new_batches() {
    init_logging();
    let fs = Arc::new(MemoryFs::new());
    let mapper = mapper_over(fs.clone(), 4);
    mapper.cancellation_token().cancel();

    let err = mapper.map_batch(five_items(), None, true, false).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(mapper.table().mapped_len(), 0);
    assert_eq!(fs.node_count().unwrap(), 1);
}
