mod common;

use common::*;
use tiny_orm::prelude::*;

#[tokio::test]
async fn test_associate_sets_the_key_and_caches_the_owner() {
    let conn = seeded();
    let mut comment = Comment::find_or_fail(102, &conn).await.unwrap();
    let post = Post::find_or_fail(11, &conn).await.unwrap();

    comment.post().unwrap().associate(&mut comment, &post);
    assert_eq!(comment.get_attribute_value("post_id"), DatabaseValue::Int64(11));
    assert_eq!(comment.get_relation_one::<Post>("post").unwrap(), Some(&post));

    comment.save(&conn).await.unwrap();
    let stored = Comment::find_or_fail(102, &conn).await.unwrap();
    assert_eq!(stored.get_attribute_value("post_id"), DatabaseValue::Int64(11));
}

#[tokio::test]
async fn test_dissociate_and_associate_id() {
    let conn = seeded();
    let mut comment = Comment::find_or_fail(100, &conn).await.unwrap();

    comment.post().unwrap().dissociate(&mut comment);
    assert!(comment.get_attribute_value("post_id").is_null());
    assert_eq!(comment.get_relation_one::<Post>("post").unwrap(), None);

    comment.post().unwrap().associate_id(&mut comment, 12);
    assert!(!comment.relation_loaded("post"));
    let owner = comment.get_relation_value_one::<Post>("post", &conn).await.unwrap().unwrap();
    assert_eq!(owner.get_key(), DatabaseValue::Int64(12));
}

#[tokio::test]
async fn test_default_model_when_the_owner_is_missing() {
    let conn = seeded();
    let mut dangling = Profile::find_or_fail(1001, &conn).await.unwrap();

    let owner = dangling
        .get_relation_value_one::<User>("user", &conn)
        .await
        .unwrap()
        .unwrap();
    assert!(!owner.exists());
    assert_eq!(owner.get_attribute_value("name"), DatabaseValue::from("Guest"));

    // eager loading applies the same default
    let profiles = Profile::query().with(&["user"]).order_by("id").get(&conn).await.unwrap();
    let names: Vec<DatabaseValue> = profiles
        .iter()
        .map(|profile| {
            profile
                .get_relation_one::<User>("user")
                .unwrap()
                .unwrap()
                .get_attribute_value("name")
        })
        .collect();
    assert_eq!(names, vec![DatabaseValue::from("ada"), DatabaseValue::from("Guest")]);
}

#[tokio::test]
async fn test_guessed_relation_name_must_be_registered() {
    let comment = Comment::default();

    // guessed as "user", but comments only register "author"
    let err = comment.belongs_to::<User>(None, None, None).unwrap_err();
    assert!(matches!(
        err,
        OrmError::RelationMappingNotFound { ref relation, from: RelationFrom::BelongsTo, .. } if relation == "user"
    ));

    let relation = comment.author().unwrap();
    assert_eq!(relation.get_foreign_key_name(), "user_id");
    assert_eq!(relation.get_relation_name(), "author");

    let relation = Post::default().user().unwrap();
    assert_eq!(relation.get_foreign_key_name(), "user_id");
    assert_eq!(relation.get_qualified_owner_key_name(), "users.id");
}

#[tokio::test]
async fn test_self_referencing_belongs_to() {
    let conn = seeded();
    let mut leaf = Category::find_or_fail(3, &conn).await.unwrap();

    let parent = leaf
        .get_relation_value_one::<Category>("parent", &conn)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(parent.get_attribute_value("name"), DatabaseValue::from("child"));
}

#[tokio::test]
async fn test_is_compares_the_owner_without_querying() {
    let conn = seeded();
    let comment = Comment::find_or_fail(100, &conn).await.unwrap();
    let post = Post::find_or_fail(10, &conn).await.unwrap();
    let other = Post::find_or_fail(11, &conn).await.unwrap();
    let grace = User::find_or_fail(2, &conn).await.unwrap();
    let editor = Role::find_or_fail(2, &conn).await.unwrap();
    conn.clear_statements();

    let relation = comment.post().unwrap();
    assert!(relation.is(Some(&post)));
    assert!(relation.is_not(Some(&other)));
    assert!(relation.is_not(None::<&Post>));

    // same key, different table
    let author = comment.author().unwrap();
    assert!(author.is(Some(&grace)));
    assert!(author.is_not(Some(&editor)));

    let mut orphan = comment.clone();
    orphan.set_attribute("post_id", DatabaseValue::Null);
    assert!(orphan.post().unwrap().is_not(Some(&post)));
    assert_eq!(conn.statement_count(), 0);
}
