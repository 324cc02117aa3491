//! Provider end-to-end behavior: transactional mutation, post-commit
//! notification, and round trips through generated identifiers.

use crate::fake_store::FakeStore;
use rowpath::notification::ChangeSink;
use rowpath::provider::MutationError;
use rowpath::store::Row;
use rowpath::{ProviderError, ProviderOptions, ResourceProvider, ResourceUri, TableCatalog};
use serde_json::json;
use std::sync::{Arc, Mutex};

const MUSIC_CATALOG_YAML: &str = r#"
name: music_store
relations:
  - name: artists
    columns: [_id, name]
  - name: albums
    columns: [_id, title, artist_id]
    references:
      artists: artist_id
  - name: tracks
    columns: [_id, title, album_id, artist_id]
    references:
      albums: album_id
      artists: artist_id
"#;

#[derive(Default)]
struct CollectingSink {
    changes: Mutex<Vec<(String, bool)>>,
}

impl CollectingSink {
    fn changes(&self) -> Vec<(String, bool)> {
        self.changes.lock().unwrap().clone()
    }
}

impl ChangeSink for CollectingSink {
    fn on_change(&self, uri: &ResourceUri, sync_to_network: bool) {
        self.changes
            .lock()
            .unwrap()
            .push((uri.to_string(), sync_to_network));
    }
}

struct Fixture {
    store: FakeStore,
    sink: Arc<CollectingSink>,
    provider: ResourceProvider<FakeStore>,
}

fn fixture(options: ProviderOptions) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = FakeStore::new();
    store.create_table("artists", &["_id", "name"]);
    store.create_table("albums", &["_id", "title", "artist_id"]);
    store.create_table("tracks", &["_id", "title", "album_id", "artist_id"]);

    let catalog = Arc::new(TableCatalog::from_yaml_str(MUSIC_CATALOG_YAML).unwrap());
    let sink = Arc::new(CollectingSink::default());
    let provider = ResourceProvider::new(catalog, store.clone(), sink.clone(), options);
    Fixture {
        store,
        sink,
        provider,
    }
}

fn track(title: &str, album_id: i64) -> Row {
    Row::from_iter([
        ("title".to_string(), json!(title)),
        ("album_id".to_string(), json!(album_id)),
    ])
}

#[tokio::test]
async fn insert_then_query_round_trip() -> anyhow::Result<()> {
    let fx = fixture(ProviderOptions::default());

    let new_uri = fx
        .provider
        .insert("albums/3/tracks", track("Echoes", 3))
        .await?;
    assert_eq!(new_uri.path()[..3], ["albums", "3", "tracks"]);
    let key = new_uri.item_key().expect("inserted identifier has a key");
    assert!(key > 0);

    let result = fx
        .provider
        .query(&new_uri.to_string(), None, None, &[], None)
        .await?;
    assert_eq!(result.len(), 1);
    let row = &result.rows[0];
    assert_eq!(row["title"], json!("Echoes"));
    assert_eq!(row["album_id"], json!(3));
    assert_eq!(row["_id"], json!(key));
    Ok(())
}

#[tokio::test]
async fn insert_notifies_new_identifier_once_with_sync_flag() {
    let fx = fixture(ProviderOptions {
        sync_to_network: true,
    });

    let new_uri = fx
        .provider
        .insert("tracks", track("Echoes", 3))
        .await
        .unwrap();
    assert_eq!(fx.sink.changes(), vec![(new_uri.to_string(), true)]);
}

#[tokio::test]
async fn failed_insert_rolls_back_and_stays_silent() {
    let fx = fixture(ProviderOptions::default());
    let before = fx.store.snapshot();

    fx.store.fail_next_insert();
    let err = fx
        .provider
        .insert("tracks", track("Echoes", 3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Mutation(MutationError::InsertFailed { key: -1, .. })
    ));

    assert_eq!(fx.store.snapshot(), before);
    assert!(fx.sink.changes().is_empty());
}

#[tokio::test]
async fn unknown_column_is_schema_violation_and_leaves_state() {
    let fx = fixture(ProviderOptions::default());
    let before = fx.store.snapshot();

    let values = Row::from_iter([("colour".to_string(), json!("red"))]);
    let err = fx.provider.insert("tracks", values).await.unwrap_err();
    assert!(matches!(err, ProviderError::SchemaViolation { .. }));

    assert_eq!(fx.store.snapshot(), before);
    assert!(fx.sink.changes().is_empty());
}

#[tokio::test]
async fn update_scoped_to_parent_collection() {
    let fx = fixture(ProviderOptions::default());
    fx.provider
        .insert("tracks", track("One", 3))
        .await
        .unwrap();
    fx.provider
        .insert("tracks", track("Two", 3))
        .await
        .unwrap();
    fx.provider
        .insert("tracks", track("Other", 4))
        .await
        .unwrap();

    let values = Row::from_iter([("title".to_string(), json!("Renamed"))]);
    let affected = fx
        .provider
        .update("albums/3/tracks", values, None, &[])
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let untouched = fx
        .provider
        .query("albums/4/tracks", None, None, &[], None)
        .await
        .unwrap();
    assert_eq!(untouched.rows[0]["title"], json!("Other"));
}

#[tokio::test]
async fn update_zero_rows_errors_and_stays_silent() {
    let fx = fixture(ProviderOptions::default());

    let values = Row::from_iter([("title".to_string(), json!("Renamed"))]);
    let err = fx
        .provider
        .update("tracks/999", values, None, &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Mutation(MutationError::NoMatchingRow { kind: "update", .. })
    ));
    assert!(fx.sink.changes().is_empty());
}

#[tokio::test]
async fn delete_item_never_touches_sibling_with_prefixed_key() {
    let fx = fixture(ProviderOptions::default());
    // Generated keys run 1..; push them to 5 and 50 explicitly.
    fx.store.seed_row(
        "tracks",
        Row::from_iter([
            ("_id".to_string(), json!(5)),
            ("title".to_string(), json!("Five")),
        ]),
    );
    fx.store.seed_row(
        "tracks",
        Row::from_iter([
            ("_id".to_string(), json!(50)),
            ("title".to_string(), json!("Fifty")),
        ]),
    );

    let affected = fx.provider.delete("tracks/5", None, &[]).await.unwrap();
    assert_eq!(affected, 1);

    let survivor = fx
        .provider
        .query("tracks/50", None, None, &[], None)
        .await
        .unwrap();
    assert_eq!(survivor.len(), 1);
    assert_eq!(survivor.rows[0]["title"], json!("Fifty"));
    assert_eq!(fx.sink.changes(), vec![("tracks/5".to_string(), false)]);
}

#[tokio::test]
async fn delete_zero_rows_errors() {
    let fx = fixture(ProviderOptions::default());
    let err = fx.provider.delete("tracks/999", None, &[]).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Mutation(MutationError::NoMatchingRow { kind: "delete", .. })
    ));
    assert!(fx.sink.changes().is_empty());
}

#[tokio::test]
async fn insert_rejects_item_identifier() {
    let fx = fixture(ProviderOptions::default());
    let err = fx
        .provider
        .insert("tracks/5", track("Echoes", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::QueryBuild(_)));
}

#[tokio::test]
async fn query_rejects_unknown_resource() {
    let fx = fixture(ProviderOptions::default());
    let err = fx
        .provider
        .query("playlists", None, None, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)));
}
