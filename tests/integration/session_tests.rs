use crate::common::fixtures::{file, file_in, folder, init_logging, page, shortcut, test_config};
use crate::common::mock_drive_client::MockDriveClient;
use drive_projection::config::ProjectionConfig;
use drive_projection::drive_service::drive_client::ListingScope;
use drive_projection::projection::vfs::VfsOps;
use drive_projection::projection::{ProjectionError, ProjectionSession, SessionState};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn drive() -> MockDriveClient {
    let client = MockDriveClient::with_root(vec![
        folder("docs", "Docs"),
        folder("pics", "Pictures"),
        file("readme", "README.md"),
        shortcut("to-report", "Report link", "report"),
    ]);
    client.set_children(
        ListingScope::Parent("docs".to_string()),
        vec![folder("archive", "Archive"), file("report", "report.pdf")],
    );
    client.set_children(
        ListingScope::Parent("archive".to_string()),
        vec![file("old", "old.txt")],
    );
    client
}

fn session_with(client: &MockDriveClient, config: ProjectionConfig) -> ProjectionSession {
    ProjectionSession::new(Arc::new(client.clone()), config)
}

#[tokio::test]
async fn test_initialize_projects_root() {
    init_logging();
    let client = drive();
    let session = session_with(&client, test_config());

    let report = session.initialize().await.unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(report.mapped.len(), 3);
    assert_eq!(report.unresolved, vec!["to-report".to_string()]);
    assert!(session.table().is_pending("to-report"));
    assert_eq!(
        session.vfs().tree().unwrap(),
        "/\n  Docs/\n  Pictures/\n  README.md\n"
    );
}

#[tokio::test]
async fn test_expand_folder_maps_children_and_resolves_pending() {
    init_logging();
    let client = drive();
    let session = session_with(&client, test_config());
    session.initialize().await.unwrap();

    let report = session.expand_folder("docs").await.unwrap();

    assert!(session.table().is_mapped("archive"));
    assert_eq!(
        session.table().try_get_mapped_path("report"),
        Some(PathBuf::from("/Docs/report.pdf"))
    );
    // The root shortcut waited for its target and is retried now.
    assert!(report.mapped_ids().contains(&"to-report"));
    assert_eq!(session.table().pending_len(), 0);
    assert_eq!(
        session.vfs().read_link(Path::new("/Report link")).unwrap(),
        PathBuf::from("/Docs/report.pdf")
    );
}

#[tokio::test]
async fn test_pending_kept_when_resolution_disabled() {
    init_logging();
    let client = drive();
    let config = ProjectionConfig {
        resolve_pending: false,
        ..test_config()
    };
    let session = session_with(&client, config);
    session.initialize().await.unwrap();
    session.expand_folder("docs").await.unwrap();

    assert!(session.table().is_pending("to-report"));
    assert!(!session.vfs().exists(Path::new("/Report link")));
}

#[tokio::test]
async fn test_expand_path_uses_stored_remote_id() {
    init_logging();
    let client = drive();
    let session = session_with(&client, test_config());
    session.initialize().await.unwrap();
    session.expand_folder("docs").await.unwrap();

    session.expand_path(Path::new("/Docs/Archive")).await.unwrap();
    assert_eq!(
        session.table().try_get_mapped_path("old"),
        Some(PathBuf::from("/Docs/Archive/old.txt"))
    );
    assert_eq!(
        session.remote_id_at(Path::new("/Docs/Archive/old.txt")).unwrap(),
        Some("old".to_string())
    );

    let err = session.expand_path(Path::new("/")).await.unwrap_err();
    assert!(matches!(err, ProjectionError::NotProjected(_)));
}

#[tokio::test]
async fn test_expand_twice_is_idempotent() {
    init_logging();
    let client = drive();
    let session = session_with(&client, test_config());
    session.initialize().await.unwrap();

    session.expand_folder("docs").await.unwrap();
    let mapped = session.table().mapped_len();
    let nodes = session.vfs().node_count().unwrap();

    let again = session.expand_folder("docs").await.unwrap();
    assert!(again.mapped.is_empty());
    assert_eq!(session.table().mapped_len(), mapped);
    assert_eq!(session.vfs().node_count().unwrap(), nodes);
}

#[tokio::test]
async fn test_root_listing_failure_fails_session() {
    init_logging();
    let client = drive();
    client.make_scope_fail(ListingScope::Root);
    let session = session_with(&client, test_config());

    let err = session.initialize().await.unwrap_err();

    assert!(matches!(err, ProjectionError::Listing(_)));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.table().mapped_len(), 0);
    assert!(matches!(
        session.expand_folder("docs").await.unwrap_err(),
        ProjectionError::NotReady(SessionState::Failed)
    ));
}

#[tokio::test]
async fn test_expand_failure_keeps_session_ready() {
    init_logging();
    let client = drive();
    client.make_scope_fail(ListingScope::Parent("pics".to_string()));
    let session = session_with(&client, test_config());
    session.initialize().await.unwrap();

    let err = session.expand_folder("pics").await.unwrap_err();
    assert!(matches!(err, ProjectionError::Listing(_)));
    assert_eq!(session.state(), SessionState::Ready);

    client.clear_failures();
    session.expand_folder("pics").await.unwrap();
}

#[tokio::test]
async fn test_cancelled_before_initialize_fails_session() {
    init_logging();
    let client = drive();
    let session = session_with(&client, test_config());
    session.cancel();

    let err = session.initialize().await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_root_listing_is_paged() {
    init_logging();
    let client = MockDriveClient::new();
    client.set_pages(
        ListingScope::Root,
        vec![
            page(vec![folder("a", "A")]),
            page(vec![file_in("b", "b.txt", "a")]),
            page(vec![file("c", "c.txt")]),
        ],
    );
    let config = ProjectionConfig {
        page_size: 2,
        max_pages: Some(2),
        ..test_config()
    };
    let session = session_with(&client, config);

    session.initialize().await.unwrap();

    assert_eq!(client.call_count(), 2);
    assert!(client.requests().iter().all(|r| r.page_size == 2));
    assert_eq!(
        session.table().try_get_mapped_path("b"),
        Some(PathBuf::from("/A/b.txt"))
    );
    assert!(!session.table().is_mapped("c"));
}
