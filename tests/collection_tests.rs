/// Collection tests
///
/// Set/list fields, standalone collections, lazy member caches.
/// Run with: cargo test --test collection_tests
use rustromdb::prelude::*;

redis_model! {
    pub struct Post {
        title: String,
        #[rom(default)]
        tags: RedisSet<String>,
        #[rom(default)]
        steps: RedisList<String>,
    }
}

redis_model! {
    pub struct Comment {
        body: String,
    }
}

redis_model! {
    pub struct Thread {
        subject: String,
        #[rom(default, cascade)]
        comments: ModelList<Comment>,
    }
}

redis_model! {
    pub struct Board {
        name: String,
        #[rom(default, cascade, eager)]
        pinned: ModelSet<Comment>,
    }
}

fn client() -> Client {
    Client::in_memory()
}

fn post(id: &str, tags: &[&str], steps: &[&str]) -> Post {
    Post::new(
        id,
        "title".to_string(),
        RedisSet::from_values(tags.iter().map(|t| t.to_string())).unwrap(),
        RedisList::from_values(steps.iter().map(|s| s.to_string())).unwrap(),
    )
}

#[tokio::test]
async fn test_scalar_set_field_roundtrip() {
    let cx = client().connection();

    post("1", &["a", "b"], &[])
        .save(&cx, SaveOptions::default())
        .await
        .unwrap();

    let fetched = Post::get(&cx, "1").await.unwrap();
    assert_eq!(fetched.tags.len(), 2);
    assert!(fetched.tags.contains(&"a".to_string()).unwrap());
    assert!(fetched.tags.contains(&"b".to_string()).unwrap());

    let mut members: Vec<String> = fetched.tags.members().unwrap().into_iter().cloned().collect();
    members.sort();
    assert_eq!(members, vec!["a", "b"]);
}

#[tokio::test]
async fn test_collection_field_lives_under_nested_key() {
    let cx = client().connection();

    post("1", &["a"], &["one"])
        .save(&cx, SaveOptions::default())
        .await
        .unwrap();

    // The hash field stores the sub-key, the members live under it.
    let stored = cx.store().hget(&Key::new("post:1"), "tags").await.unwrap();
    assert_eq!(stored.unwrap(), "post:1:tags");
    let members = cx
        .store()
        .smembers(&Key::new("post:1:tags"))
        .await
        .unwrap();
    assert_eq!(members, vec!["a".to_string()]);

    let stored = cx.store().hget(&Key::new("post:1"), "steps").await.unwrap();
    assert_eq!(stored.unwrap(), "post:1:steps");
}

#[tokio::test]
async fn test_collection_save_is_a_full_replace() {
    let cx = client().connection();

    let mut item = post("1", &["a", "b"], &[]);
    item.save(&cx, SaveOptions::default()).await.unwrap();

    item.tags.discard(&"b".to_string()).unwrap();
    item.save(&cx, SaveOptions::default()).await.unwrap();

    let members = cx
        .store()
        .smembers(&Key::new("post:1:tags"))
        .await
        .unwrap();
    assert_eq!(members, vec!["a".to_string()]);
}

#[tokio::test]
async fn test_empty_default_collection_is_omitted() {
    let cx = client().connection();

    post("1", &[], &[]).save(&cx, SaveOptions::default()).await.unwrap();

    let stored = cx.store().hget(&Key::new("post:1"), "tags").await.unwrap();
    assert!(stored.is_none());
    assert!(!cx.store().exists(&Key::new("post:1:tags")).await.unwrap());

    let fetched = Post::get(&cx, "1").await.unwrap();
    assert!(fetched.tags.is_empty());
    assert!(fetched.steps.is_empty());
}

#[tokio::test]
async fn test_list_field_preserves_order() {
    let cx = client().connection();

    post("1", &[], &["one", "two", "three"])
        .save(&cx, SaveOptions::default())
        .await
        .unwrap();

    let fetched = Post::get(&cx, "1").await.unwrap();
    let members: Vec<String> = fetched.steps.members().unwrap().into_iter().cloned().collect();
    assert_eq!(members, vec!["one", "two", "three"]);
    assert_eq!(*fetched.steps.get(1).unwrap(), "two");
}

#[tokio::test]
async fn test_model_list_members_need_load_before_access() {
    let cx = client().connection();

    let thread = Thread::new(
        "t1",
        "subject".to_string(),
        ModelList::from_values([
            Comment::new("c1", "first".to_string()),
            Comment::new("c2", "second".to_string()),
        ])
        .unwrap(),
    );
    thread.save(&cx, SaveOptions::default()).await.unwrap();

    let mut fetched = Thread::get(&cx, "t1").await.unwrap();
    assert_eq!(fetched.comments.len(), 2);
    assert!(!fetched.comments.is_loaded());

    // Present but unresolved: a distinct not-loaded error, not a key error.
    let err = fetched.comments.get(0).unwrap_err();
    assert!(err.is_not_loaded());
    assert!(fetched.comments.members().is_err());

    fetched.comments.load(&cx).await.unwrap();
    assert!(fetched.comments.is_loaded());
    assert_eq!(fetched.comments.get(0).unwrap().body, "first");
    assert_eq!(fetched.comments.get(1).unwrap().body, "second");
}

#[tokio::test]
async fn test_eager_model_set_is_materialized_on_get() {
    let cx = client().connection();

    let board = Board::new(
        "b1",
        "news".to_string(),
        ModelSet::from_values([Comment::new("c1", "pinned".to_string())]).unwrap(),
    );
    board.save(&cx, SaveOptions::default()).await.unwrap();

    let fetched = Board::get(&cx, "b1").await.unwrap();
    assert!(fetched.pinned.is_loaded());
    let members = fetched.pinned.members().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].body, "pinned");
}

#[tokio::test]
async fn test_model_collection_membership_without_load() {
    let cx = client().connection();

    let thread = Thread::new(
        "t1",
        "s".to_string(),
        ModelList::from_values([Comment::new("c1", "x".to_string())]).unwrap(),
    );
    thread.save(&cx, SaveOptions::default()).await.unwrap();

    let fetched = Thread::get(&cx, "t1").await.unwrap();
    // Membership is decided on the wire form (the id), no fetch required.
    assert!(
        fetched
            .comments
            .contains(&Comment::new("c1", "whatever".to_string()))
            .unwrap()
    );
}

#[tokio::test]
async fn test_standalone_set_roundtrip() {
    let cx = client().connection();

    let mut colors = RedisSet::<String>::with_id("colors");
    colors.add("red".to_string()).unwrap();
    colors.add("blue".to_string()).unwrap();
    colors.save(&cx, SaveOptions::default()).await.unwrap();

    let fetched = RedisSet::<String>::fetch(&cx, "colors").await.unwrap();
    assert_eq!(fetched.len(), 2);
    assert!(fetched.contains(&"red".to_string()).unwrap());
    assert_eq!(fetched.count(&cx).await.unwrap(), 2);

    // Standalone collections register in their kind's membership set.
    let registered = cx.store().smembers(&Key::new("redisset")).await.unwrap();
    assert_eq!(registered, vec!["colors".to_string()]);

    fetched.delete(&cx, false).await.unwrap();
    assert!(!cx.store().exists(&Key::new("redisset:colors")).await.unwrap());
    assert!(cx.store().smembers(&Key::new("redisset")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_standalone_list_roundtrip() {
    let cx = client().connection();

    let mut queue = RedisList::<i64>::with_id("queue");
    queue.push(1).unwrap();
    queue.push(2).unwrap();
    queue.push(3).unwrap();
    queue.save(&cx, SaveOptions::default()).await.unwrap();

    let fetched = RedisList::<i64>::fetch(&cx, "queue").await.unwrap();
    let members: Vec<i64> = fetched.members().unwrap().into_iter().copied().collect();
    assert_eq!(members, vec![1, 2, 3]);
    assert_eq!(fetched.count(&cx).await.unwrap(), 3);
}

#[tokio::test]
async fn test_get_missing_standalone_collection_is_not_found() {
    let cx = client().connection();

    let err = RedisSet::<String>::fetch(&cx, "nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(RedisList::<String>::fetch(&cx, "nope").await.is_err());
}

#[tokio::test]
async fn test_async_add_and_discard_touch_store_and_cache() {
    let cx = client().connection();

    let mut colors = RedisSet::<String>::with_id("colors");
    colors.save(&cx, SaveOptions::default()).await.unwrap();

    colors
        .async_add(&cx, "green".to_string(), SaveOptions::default())
        .await
        .unwrap();
    assert!(colors.contains(&"green".to_string()).unwrap());
    let remote = cx
        .store()
        .smembers(&Key::new("redisset:colors"))
        .await
        .unwrap();
    assert_eq!(remote, vec!["green".to_string()]);

    let removed = colors
        .async_discard(&cx, &"green".to_string(), false)
        .await
        .unwrap();
    assert!(removed);
    assert!(!colors.contains(&"green".to_string()).unwrap());
    assert!(!cx.store().exists(&Key::new("redisset:colors")).await.unwrap());
}

#[tokio::test]
async fn test_async_append_pushes_to_the_tail() {
    let cx = client().connection();

    let mut queue = RedisList::<String>::with_id("queue");
    queue.push("first".to_string()).unwrap();
    queue.save(&cx, SaveOptions::default()).await.unwrap();

    queue
        .async_append(&cx, "second".to_string(), SaveOptions::default())
        .await
        .unwrap();

    let remote = cx
        .store()
        .lrange(&Key::new("redislist:queue"), 0, -1)
        .await
        .unwrap();
    assert_eq!(remote, vec!["first".to_string(), "second".to_string()]);
    assert_eq!(*queue.get(1).unwrap(), "second");
}

#[tokio::test]
async fn test_model_set_async_add_with_cascade_persists_member() {
    let cx = client().connection();

    let mut pinned = ModelSet::<Comment>::with_id("pinned");
    pinned.save(&cx, SaveOptions::default()).await.unwrap();

    pinned
        .async_add(
            &cx,
            Comment::new("c9", "hot".to_string()),
            SaveOptions::cascade(),
        )
        .await
        .unwrap();

    let comment = Comment::get(&cx, "c9").await.unwrap();
    assert_eq!(comment.body, "hot");
}
