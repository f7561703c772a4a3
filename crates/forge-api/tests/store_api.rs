//! Store service behavior: duplicate preconditions, presigned downloads,
//! and token verification.

use std::sync::Arc;

use sha2::Digest;

use forge_api::StoreApiState;
use forge_store::file::FileStore;
use forge_store::presign::{Presigner, DEFAULT_EXPIRATION};
use forge_store::Object;

struct StoreHarness {
    base: String,
    _dir: tempfile::TempDir,
}

async fn store_service() -> StoreHarness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()).unwrap());

    // The external base must match where the test server actually listens,
    // so bind first and route second.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = forge_api::store_app(StoreApiState {
        store,
        presigner: Presigner::new("test-secret", DEFAULT_EXPIRATION),
        base_url: base.clone(),
    });
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    StoreHarness { base, _dir: dir }
}

#[tokio::test]
async fn put_then_get_then_download() {
    let h = store_service().await;
    let client = reqwest::Client::new();

    let stored: Object = client
        .put(format!("{}/store/abc123", h.base))
        .header("if-none-match", "*")
        .body("binary bytes".as_bytes().to_vec())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored.id, "abc123");
    assert_eq!(
        stored.checksum,
        hex::encode(sha2::Sha256::digest(b"binary bytes"))
    );
    assert!(stored.url.contains("/store/abc123/download?expires="));

    let fetched: Object = client
        .get(format!("{}/store/abc123", h.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched.checksum, stored.checksum);

    let download = client.get(&fetched.url).send().await.unwrap();
    assert_eq!(download.status(), 200);
    assert_eq!(
        download
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap(),
        "application/octet-stream"
    );
    assert_eq!(download.bytes().await.unwrap().as_ref(), b"binary bytes");
}

#[tokio::test]
async fn duplicate_put_answers_412() {
    let h = store_service().await;
    let client = reqwest::Client::new();

    let first = client
        .put(format!("{}/store/abc123", h.base))
        .body("one".as_bytes().to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = client
        .put(format!("{}/store/abc123", h.base))
        .header("if-none-match", "*")
        .body("two".as_bytes().to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 412);
}

#[tokio::test]
async fn absent_objects_answer_404() {
    let h = store_service().await;
    let response = reqwest::get(format!("{}/store/missing", h.base)).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn hostile_ids_answer_400() {
    let h = store_service().await;
    // An encoded separator survives URL parsing as one path segment and
    // must be rejected by the store's id validation.
    let response = reqwest::Client::new()
        .put(format!("{}/store/a%2Fb", h.base))
        .body("x".as_bytes().to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn store_client_round_trips_through_the_service() {
    use forge_store::ObjectStore;
    use tokio::io::AsyncReadExt;

    let h = store_service().await;
    let client = forge_client::StoreClient::new(h.base.clone());

    let stored = client.put("abc123", b"remote bytes").await.unwrap();
    assert!(stored.url.starts_with(&h.base));

    // A racing second writer sees the distinct duplicate error.
    let err = client.put("abc123", b"other bytes").await.unwrap_err();
    assert!(matches!(err, forge_store::StoreError::Duplicate(_)));

    let fetched = client.get("abc123").await.unwrap();
    let mut body = client.download(&fetched).await.unwrap();
    let mut bytes = Vec::new();
    body.read_to_end(&mut bytes).await.unwrap();
    assert_eq!(bytes, b"remote bytes");
}

#[tokio::test]
async fn tampered_tokens_answer_403() {
    let h = store_service().await;
    let client = reqwest::Client::new();

    let stored: Object = client
        .put(format!("{}/store/abc123", h.base))
        .body("bytes".as_bytes().to_vec())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Lengthen the token; the grant must die with it.
    let tampered = format!("{}ffff", stored.url);
    let response = client.get(&tampered).send().await.unwrap();
    assert_eq!(response.status(), 403);

    // A token for one id does not open another.
    let other = stored.url.replace("/store/abc123/", "/store/other/");
    let response = client.get(&other).send().await.unwrap();
    assert_eq!(response.status(), 403);
}
