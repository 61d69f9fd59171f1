//! Engine scenarios run through a TCP store connection

use std::sync::Arc;
use std::time::Duration;

use commons_core::{
    Collection, Commons, CurrentUser, DocumentStore, EngineSettings, Error as CoreError, Identity,
    NewPost, Role, SqliteStore,
};
use commons_net::{Error, RemoteStore, StoreServer};
use tempfile::tempdir;

const TOKEN: &str = "integration-token";

async fn remote_client(server: &StoreServer, identity: Identity) -> Commons<RemoteStore> {
    let remote = RemoteStore::connect(server.addr(), TOKEN).await.unwrap();
    let settings = EngineSettings {
        vote_debounce: Duration::ZERO,
        ..EngineSettings::default()
    };
    Commons::with_settings(
        Arc::new(remote),
        Arc::new(CurrentUser::signed_in(identity)),
        settings,
    )
}

#[tokio::test]
async fn test_vote_and_join_over_the_wire() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("commons.db")).unwrap());
    let server = StoreServer::start("127.0.0.1:0", store.clone(), TOKEN.to_string())
        .await
        .unwrap();

    let host = remote_client(&server, Identity::new("host", "Host", Role::User)).await;
    let ana = remote_client(&server, Identity::new("ana", "Ana", Role::User)).await;
    let bo = remote_client(&server, Identity::new("bo", "Bo", Role::User)).await;
    let cy = remote_client(&server, Identity::new("cy", "Cy", Role::User)).await;

    let post = host
        .create_post(NewPost::activity("Chess club", "Bring boards", "games").with_capacity(2))
        .await
        .unwrap();

    // Up then down by the same user leaves only the downvote
    ana.vote_up(&post.id).await.unwrap();
    let down = ana.vote_down(&post.id).await.unwrap();
    assert!(down.voted);
    assert_eq!(down.count, 1);
    assert_eq!(down.opposite_count, Some(0));

    ana.join_activity(&post.id).await.unwrap();
    bo.join_activity(&post.id).await.unwrap();
    assert!(matches!(cy.join_activity(&post.id).await, Err(CoreError::ActivityFull)));
    assert!(matches!(ana.join_activity(&post.id).await, Err(CoreError::AlreadyJoined)));

    // The server's store saw exactly what the engine wrote
    let local = store
        .get_document(Collection::Posts, &post.id)
        .unwrap()
        .unwrap();
    assert_eq!(local.array_len("participants"), 2);
    assert_eq!(local.count("downvoteCount"), 1);
    assert_eq!(local.count("upvoteCount"), 0);

    server.shutdown();
}

#[tokio::test]
async fn test_permission_errors_travel_back() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let server = StoreServer::start("127.0.0.1:0", store, TOKEN.to_string())
        .await
        .unwrap();

    let author = remote_client(&server, Identity::new("author", "Author", Role::User)).await;
    let stranger = remote_client(&server, Identity::new("stranger", "Stranger", Role::User)).await;

    let post = author
        .create_post(NewPost::general("Mine", "", "social"))
        .await
        .unwrap();
    assert!(matches!(
        stranger.delete_post(&post.id).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        stranger.vote_up("missing").await,
        Err(CoreError::NotFound(_))
    ));

    server.shutdown();
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let server = StoreServer::start("127.0.0.1:0", store, TOKEN.to_string())
        .await
        .unwrap();

    let result = RemoteStore::connect(server.addr(), "guess").await;
    assert!(matches!(result, Err(Error::Rejected(_))));

    let good = RemoteStore::connect(server.addr(), TOKEN).await.unwrap();
    good.ping().await.unwrap();

    server.shutdown();
}

#[tokio::test]
async fn test_lost_server_is_store_unavailable() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let server = StoreServer::start("127.0.0.1:0", store, TOKEN.to_string())
        .await
        .unwrap();
    let client = remote_client(&server, Identity::new("u1", "Ana", Role::User)).await;

    server.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = client.list_posts(None).await;
    assert!(matches!(result, Err(CoreError::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_abandoned_request_does_not_shift_replies() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let server = StoreServer::start("127.0.0.1:0", store, TOKEN.to_string())
        .await
        .unwrap();
    let author = remote_client(&server, Identity::new("u1", "Ana", Role::User)).await;
    let first = author
        .create_post(NewPost::general("A", "", "social"))
        .await
        .unwrap();
    let second = author
        .create_post(NewPost::general("B", "", "social"))
        .await
        .unwrap();

    let remote = RemoteStore::connect(server.addr(), TOKEN).await.unwrap();
    let abandoned =
        tokio::time::timeout(Duration::ZERO, remote.get(Collection::Posts, &first.id)).await;
    assert!(abandoned.is_err());

    // The unread reply for the first post must never answer a later request
    let result = remote.get(Collection::Posts, &second.id).await;
    assert!(matches!(result, Err(CoreError::StoreUnavailable(_))));

    let fresh = RemoteStore::connect(server.addr(), TOKEN).await.unwrap();
    let document = fresh
        .get(Collection::Posts, &second.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.id, second.id);
    assert_eq!(document.fields["title"], "B");

    server.shutdown();
}
