/// Model persistence tests
///
/// Save/get/update/delete round trips over the in-memory backend.
/// Run with: cargo test --test model_tests
use rustromdb::prelude::*;

redis_model! {
    pub struct Bar {
        field1: i64,
        field2: String,
    }
}

redis_model! {
    pub struct Note {
        title: String,
        body: Option<String>,
        #[rom(default)]
        stars: i64,
    }
}

redis_model! {
    pub struct Draft {
        title: String,
        #[rom(transient)]
        dirty: bool,
    }
}

redis_model! {
    pub struct Event {
        happened_at: chrono::DateTime<chrono::Utc>,
        token: uuid::Uuid,
    }
}

fn client() -> Client {
    Client::in_memory()
}

#[tokio::test]
async fn test_save_then_get_returns_equal_instance() {
    let cx = client().connection();

    let bar = Bar::new("1", 123, "value".to_string());
    bar.save(&cx, SaveOptions::default()).await.unwrap();

    let fetched = Bar::get(&cx, "1").await.unwrap();
    assert_eq!(fetched, bar);
    assert_eq!(fetched.field1, 123);
    assert_eq!(fetched.field2, "value");
}

#[tokio::test]
async fn test_update_changes_only_named_fields() {
    let cx = client().connection();

    let bar = Bar::new("1", 123, "value".to_string());
    bar.save(&cx, SaveOptions::default()).await.unwrap();

    let updated = bar
        .update(
            &cx,
            SaveOptions::default(),
            vec![BarChange::Field2("updated".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(updated.field2, "updated");
    assert_eq!(updated.field1, 123);

    let fetched = Bar::get(&cx, "1").await.unwrap();
    assert_eq!(fetched.field2, "updated");
    assert_eq!(fetched.field1, 123);
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let cx = client().connection();

    let err = Bar::get(&cx, "missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.is_not_found_for::<Bar>());
    assert!(!err.is_not_found_for::<Note>());
}

#[tokio::test]
async fn test_save_without_id_fails() {
    let cx = client().connection();

    let bar = Bar::new("", 1, "x".to_string());
    let err = bar.save(&cx, SaveOptions::default()).await.unwrap_err();
    assert!(matches!(err, RomError::MissingId { model: "bar" }));
    assert!(bar.delete(&cx, false).await.is_err());
    assert!(
        bar.update(&cx, SaveOptions::default(), vec![BarChange::Field1(2)])
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_update_to_none_deletes_the_field() {
    let cx = client().connection();

    let note = Note::new("n1", "title".to_string(), Some("text".to_string()), 3);
    note.save(&cx, SaveOptions::default()).await.unwrap();

    note.update(&cx, SaveOptions::default(), vec![NoteChange::Body(None)])
        .await
        .unwrap();

    let stored = cx
        .store()
        .hget(&Key::new("note:n1"), "body")
        .await
        .unwrap();
    assert!(stored.is_none());

    let fetched = Note::get(&cx, "n1").await.unwrap();
    assert_eq!(fetched.body, None);
    assert_eq!(fetched.stars, 3);
}

#[tokio::test]
async fn test_default_field_is_omitted_and_restored() {
    let cx = client().connection();

    let note = Note::new("n1", "title".to_string(), None, 0);
    note.save(&cx, SaveOptions::default()).await.unwrap();

    // stars == default, so the hash must not carry the field.
    let stored = cx
        .store()
        .hget(&Key::new("note:n1"), "stars")
        .await
        .unwrap();
    assert!(stored.is_none());

    let fetched = Note::get(&cx, "n1").await.unwrap();
    assert_eq!(fetched.stars, 0);
}

#[tokio::test]
async fn test_saving_twice_stores_identical_contents() {
    let cx = client().connection();

    let bar = Bar::new("1", 7, "same".to_string());
    bar.save(&cx, SaveOptions::default()).await.unwrap();
    let first = cx.store().hgetall(&Key::new("bar:1")).await.unwrap();

    bar.save(&cx, SaveOptions::default()).await.unwrap();
    let second = cx.store().hgetall(&Key::new("bar:1")).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_transient_field_is_not_persisted() {
    let cx = client().connection();

    let draft = Draft::new("d1", "wip".to_string(), true);
    draft.save(&cx, SaveOptions::default()).await.unwrap();

    let stored = cx
        .store()
        .hget(&Key::new("draft:d1"), "dirty")
        .await
        .unwrap();
    assert!(stored.is_none());

    let fetched = Draft::get(&cx, "d1").await.unwrap();
    assert_eq!(fetched.title, "wip");
    assert!(!fetched.dirty);
}

#[tokio::test]
async fn test_registered_scalar_codecs_roundtrip() {
    let cx = client().connection();

    let event = Event::new("e1", chrono::Utc::now(), uuid::Uuid::new_v4());
    event.save(&cx, SaveOptions::default()).await.unwrap();

    let fetched = Event::get(&cx, "e1").await.unwrap();
    assert_eq!(fetched, event);
}

#[tokio::test]
async fn test_refresh_overwrites_local_state() {
    let cx = client().connection();

    let mut bar = Bar::new("1", 1, "old".to_string());
    bar.save(&cx, SaveOptions::default()).await.unwrap();

    Bar::new("1", 2, "new".to_string())
        .save(&cx, SaveOptions::default())
        .await
        .unwrap();

    bar.refresh(&cx).await.unwrap();
    assert_eq!(bar.field1, 2);
    assert_eq!(bar.field2, "new");
}

#[tokio::test]
async fn test_exists_and_count() {
    let cx = client().connection();

    let bar = Bar::new("1", 1, "x".to_string());
    assert!(!bar.exists(&cx).await.unwrap());
    assert_eq!(Bar::count(&cx).await.unwrap(), 0);

    bar.save(&cx, SaveOptions::default()).await.unwrap();
    Bar::new("2", 2, "y".to_string())
        .save(&cx, SaveOptions::default())
        .await
        .unwrap();

    assert!(bar.exists(&cx).await.unwrap());
    assert_eq!(Bar::count(&cx).await.unwrap(), 2);
}

#[tokio::test]
async fn test_delete_removes_hash_membership_and_nested_keys() {
    let cx = client().connection();

    let bar = Bar::new("1", 1, "x".to_string());
    bar.save(&cx, SaveOptions::default()).await.unwrap();
    // A stray nested key under the model's namespace goes away with it.
    cx.store()
        .sadd(&Key::new("bar:1:extra"), vec!["m".into()])
        .await
        .unwrap();

    bar.delete(&cx, false).await.unwrap();

    assert!(!cx.store().exists(&Key::new("bar:1")).await.unwrap());
    assert!(!cx.store().exists(&Key::new("bar:1:extra")).await.unwrap());
    assert_eq!(Bar::count(&cx).await.unwrap(), 0);
    assert!(Bar::get(&cx, "1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_delete_all_clears_the_namespace() {
    let cx = client().connection();

    for id in 1..=3i64 {
        Bar::new(id, id, format!("v{}", id))
            .save(&cx, SaveOptions::default())
            .await
            .unwrap();
    }
    Bar::delete_all(&cx).await.unwrap();

    assert_eq!(Bar::count(&cx).await.unwrap(), 0);
    assert!(Bar::get(&cx, "1").await.unwrap_err().is_not_found());
    assert!(cx.store().keys("bar*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_membership_set_tracks_saved_ids() {
    let cx = client().connection();

    Bar::new("1", 1, "x".to_string())
        .save(&cx, SaveOptions::default())
        .await
        .unwrap();
    Bar::new("2", 2, "y".to_string())
        .save(&cx, SaveOptions::default())
        .await
        .unwrap();

    let members = cx.store().smembers(&Key::new("bar")).await.unwrap();
    assert_eq!(members, vec!["1".to_string(), "2".to_string()]);
}
