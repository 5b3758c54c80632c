mod common;

use common::*;
use serde_json::json;
use tiny_orm::prelude::*;

fn updated_at(conn: &MemoryConnection, table: &str, id: i64) -> DatabaseValue {
    conn.rows(table)
        .into_iter()
        .find(|row| row.get("id") == Some(&DatabaseValue::Int64(id)))
        .and_then(|row| row.get("updated_at").cloned())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_touch_owners_walks_up_the_chain() {
    let conn = seeded();
    let mut comment = Comment::find_or_fail(100, &conn).await.unwrap();

    comment.touch_owners(&conn).await.unwrap();

    assert!(!updated_at(&conn, "posts", 10).is_null());
    assert!(updated_at(&conn, "posts", 11).is_null());
    assert!(!updated_at(&conn, "users", 1).is_null());
    assert!(updated_at(&conn, "users", 2).is_null());

    // the touched owner is left loaded
    assert!(comment.relation_loaded("post"));
}

#[tokio::test]
async fn test_touch_owners_without_owner_does_nothing() {
    let conn = seeded();
    let mut orphan = Post::find_or_fail(13, &conn).await.unwrap();

    orphan.touch_owners(&conn).await.unwrap();
    assert!((1..=3).all(|id| updated_at(&conn, "users", id).is_null()));
}

#[tokio::test]
async fn test_instance_touches_override_the_model_touches() {
    let conn = seeded();
    let mut comment = Comment::find_or_fail(100, &conn).await.unwrap();
    assert_eq!(comment.get_touched_relations(), vec!["post".to_string()]);

    comment.clear_touches();
    comment.touch_owners(&conn).await.unwrap();
    assert!(updated_at(&conn, "posts", 10).is_null());

    comment.add_touch("author").add_touch("author");
    assert_eq!(comment.get_touched_relations(), vec!["author".to_string()]);
    comment.touch_owners(&conn).await.unwrap();
    assert!(!updated_at(&conn, "users", 2).is_null());
    assert!(updated_at(&conn, "posts", 10).is_null());

    comment.set_touched_relations(["post", "author"]);
    assert!(comment.touches_relation("post"));

    // another instance still uses the model's list
    let other = Comment::find_or_fail(101, &conn).await.unwrap();
    assert!(other.touches_relation("post"));
    assert!(!other.touches_relation("author"));
}

#[tokio::test]
async fn test_push_saves_loaded_relations() {
    let conn = seeded();
    let mut user = User::query().with(&["posts", "roles"]).find(1, &conn).await.unwrap().unwrap();

    if let Some(value) = user.base_mut().relations.get_mut("posts") {
        for model in value.models_mut() {
            if let Some(post) = model.as_any_mut().downcast_mut::<Post>() {
                post.set_attribute("title", "Edited");
            }
        }
    }
    user.set_attribute("name", "Ada");
    conn.clear_statements();

    assert!(user.push(&conn).await.unwrap());
    // the user, two posts; unchanged roles and their pivots are not written
    assert_eq!(conn.statement_count(), 3);

    let titles = Post::query().where_eq("user_id", 1).pluck("title", &conn).await.unwrap();
    assert_eq!(titles, vec![DatabaseValue::from("Edited"), DatabaseValue::from("Edited")]);
    let stored = User::find_or_fail(1, &conn).await.unwrap();
    assert_eq!(stored.get_attribute_value("name"), DatabaseValue::from("Ada"));
}

#[tokio::test]
async fn test_serialization_includes_loaded_relations() {
    let conn = seeded();
    let mut users = User::query()
        .with(&["posts", "profile", "roles"])
        .where_in("id", [1, 2])
        .order_by("id")
        .get(&conn)
        .await
        .unwrap();
    users[0].load_relation("latestPost", &conn).await.unwrap();

    let ada = users[0].to_json();
    assert_eq!(ada["name"], json!("ada"));
    assert!(ada.get("password").is_none());
    assert_eq!(ada["posts"].as_array().map(Vec::len), Some(2));
    assert_eq!(ada["profile"]["id"], json!(1000));
    assert_eq!(ada["latest_post"]["title"], json!("Async"));

    let admin = ada["roles"]
        .as_array()
        .and_then(|roles| roles.iter().find(|role| role["name"] == json!("admin")))
        .cloned()
        .unwrap();
    assert_eq!(admin["pivot"], json!({"user_id": 1, "role_id": 1, "active": true}));

    let grace = users[1].to_json();
    assert_eq!(grace["profile"], json!(null));
    assert_eq!(grace["posts"][0]["title"], json!("Compilers"));
}

#[tokio::test]
async fn test_relations_to_json_only_lists_loaded_relations() {
    let conn = seeded();
    let mut post = Post::find_or_fail(12, &conn).await.unwrap();
    assert!(post.relations_to_json().is_empty());

    post.load(&["comments"], &conn).await.unwrap();
    let relations = post.relations_to_json();
    assert_eq!(relations.keys().collect::<Vec<_>>(), vec!["comments"]);
    assert_eq!(relations["comments"][0]["body"], json!("agreed"));
}
