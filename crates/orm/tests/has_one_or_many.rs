mod common;

use common::*;
use tiny_orm::prelude::*;
use tiny_orm::relationships::HasOneOrManyRelation;

#[tokio::test]
async fn test_create_through_relation_sets_the_foreign_key() {
    let conn = seeded();
    let user = User::find_or_fail(3, &conn).await.unwrap();

    let post = user
        .posts()
        .create(attributes([("title", "Kernels")]), &conn)
        .await
        .unwrap();

    assert!(post.exists());
    assert_eq!(post.get_key(), DatabaseValue::Int64(14));
    assert_eq!(post.get_attribute_value("user_id"), DatabaseValue::Int64(3));
    assert!(!post.get_attribute_value("created_at").is_null());
    assert_eq!(user.posts().count(&conn).await.unwrap(), 1);
}

#[tokio::test]
async fn test_make_and_save_many() {
    let conn = seeded();
    let user = User::find_or_fail(2, &conn).await.unwrap();

    let draft = user.posts().make(attributes([("title", "Draft")]));
    assert!(!draft.exists());
    assert_eq!(draft.get_attribute_value("user_id"), DatabaseValue::Int64(2));
    assert_eq!(user.posts().count(&conn).await.unwrap(), 1);

    let orphan = Post::find_or_fail(13, &conn).await.unwrap();
    let mut models = vec![draft, orphan];
    user.posts().save_many(&mut models, &conn).await.unwrap();
    assert_eq!(user.posts().count(&conn).await.unwrap(), 3);

    let adopted = Post::find_or_fail(13, &conn).await.unwrap();
    assert_eq!(adopted.get_attribute_value("user_id"), DatabaseValue::Int64(2));
}

#[tokio::test]
async fn test_first_or_create_and_update_or_create() {
    let conn = seeded();
    let user = User::find_or_fail(1, &conn).await.unwrap();

    let existing = user
        .posts()
        .first_or_create(attributes([("title", "Rust")]), attributes([("votes", 0i64)]), &conn)
        .await
        .unwrap();
    assert_eq!(existing.get_key(), DatabaseValue::Int64(10));
    assert_eq!(existing.get_attribute_value("votes"), DatabaseValue::Int64(5));

    let created = user
        .posts()
        .first_or_create(attributes([("title", "Macros")]), attributes([("votes", 3i64)]), &conn)
        .await
        .unwrap();
    assert!(created.exists());
    assert_eq!(created.get_attribute_value("votes"), DatabaseValue::Int64(3));

    let updated = user
        .posts()
        .update_or_create(attributes([("title", "Async")]), attributes([("votes", 42i64)]), &conn)
        .await
        .unwrap();
    assert_eq!(updated.get_key(), DatabaseValue::Int64(11));
    let stored = Post::find_or_fail(11, &conn).await.unwrap();
    assert_eq!(stored.get_attribute_value("votes"), DatabaseValue::Int64(42));

    let fresh = user.posts().find_or_new(999, &conn).await.unwrap();
    assert!(!fresh.exists());
    assert_eq!(fresh.get_attribute_value("user_id"), DatabaseValue::Int64(1));
}

#[tokio::test]
async fn test_has_one_default_model_and_ordering() {
    let conn = seeded();
    let mut ada = User::find_or_fail(1, &conn).await.unwrap();

    let latest = ada
        .get_relation_value_one::<Post>("latestPost", &conn)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.get_key(), DatabaseValue::Int64(11));

    let grace = User::find_or_fail(2, &conn).await.unwrap();
    let value = grace.profile().with_default(true).get_results(&conn).await.unwrap();
    let profile = value.downcast_one::<Profile>("profile").unwrap().unwrap();
    assert!(!profile.exists());
    assert_eq!(profile.get_attribute_value("user_id"), DatabaseValue::Int64(2));
}

#[tokio::test]
async fn test_self_referencing_has_many() {
    let conn = seeded();
    let root = Category::find_or_fail(1, &conn).await.unwrap();

    let children = root.children().get(&conn).await.unwrap();
    assert_eq!(ids(&children), vec![2]);
    assert!(conn.statements().last().unwrap().contains("categories.parent_id = 1"));
}

#[tokio::test]
async fn test_has_one_keeps_the_first_matching_row() {
    init_tracing();
    let conn = seeded();

    let users = User::query().with(&["latestPost"]).order_by("id").get(&conn).await.unwrap();
    let eager = users[0]
        .get_relation_one::<Post>("latestPost")
        .unwrap()
        .map(|post| post.get_key());
    let mut ada = User::find_or_fail(1, &conn).await.unwrap();
    let lazy = ada
        .get_relation_value_one::<Post>("latestPost", &conn)
        .await
        .unwrap()
        .map(|post| post.get_key());
    assert_eq!(eager, Some(DatabaseValue::Int64(11)));
    assert_eq!(lazy, eager);

    // a second profile row for ada
    conn.seed("profiles", [attributes([("id", 1002i64), ("user_id", 1i64)])]);

    let users = User::query().with(&["profile"]).order_by("id").get(&conn).await.unwrap();
    let eager = users[0].get_relation_one::<Profile>("profile").unwrap().unwrap();
    assert_eq!(eager.get_key(), DatabaseValue::Int64(1000));

    let mut ada = User::find_or_fail(1, &conn).await.unwrap();
    let lazy = ada.get_relation_value_one::<Profile>("profile", &conn).await.unwrap().unwrap();
    assert_eq!(lazy.get_key(), DatabaseValue::Int64(1000));
}

#[tokio::test]
async fn test_has_one_is_compares_the_foreign_key() {
    let conn = seeded();
    let ada = User::find_or_fail(1, &conn).await.unwrap();
    let own = Profile::find_or_fail(1000, &conn).await.unwrap();
    let dangling = Profile::find_or_fail(1001, &conn).await.unwrap();

    assert!(ada.profile().is(Some(&own)));
    assert!(ada.profile().is_not(Some(&dangling)));
    assert!(ada.profile().is_not(Some(&User::find_or_fail(1, &conn).await.unwrap())));
}
