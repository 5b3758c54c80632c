mod common;

use common::*;
use tiny_orm::prelude::*;

#[tokio::test]
async fn test_nested_eager_load_runs_one_query_per_relation() {
    let conn = seeded();

    let users = User::query()
        .with(&["posts.comments", "profile"])
        .order_by("id")
        .get(&conn)
        .await
        .unwrap();
    // users, posts, comments, profiles
    assert_eq!(conn.statement_count(), 4);
    assert_eq!(ids(&users), vec![1, 2, 3]);

    let ada = &users[0];
    let posts = ada.get_relation::<Post>("posts").unwrap();
    assert_eq!(ids(&posts.iter().map(|post| (*post).clone()).collect::<Vec<_>>()), vec![10, 11]);
    assert_eq!(posts[0].get_relation::<Comment>("comments").unwrap().len(), 2);
    assert!(posts[1].get_relation::<Comment>("comments").unwrap().is_empty());
    assert!(ada.get_relation_one::<Profile>("profile").unwrap().is_some());

    // loaded and empty, not missing
    let linus = &users[2];
    assert!(linus.get_relation::<Post>("posts").unwrap().is_empty());
    assert_eq!(linus.get_relation_one::<Profile>("profile").unwrap(), None);
}

#[tokio::test]
async fn test_eager_and_lazy_loading_agree() {
    let conn = seeded();

    let eager = User::query().with(&["posts"]).order_by("id").get(&conn).await.unwrap();
    let mut lazy = User::query().order_by("id").get(&conn).await.unwrap();

    // post owners are {1, 1, 2, null} against users {1, 2, 3}
    let expected = [vec![10, 11], vec![12], vec![]];
    for ((eager_user, lazy_user), expected) in eager.iter().zip(lazy.iter_mut()).zip(expected) {
        let eager_ids: Vec<i64> = eager_user
            .get_relation::<Post>("posts")
            .unwrap()
            .iter()
            .filter_map(|post| post.get_key().as_i64())
            .collect();
        let lazy_ids: Vec<i64> = lazy_user
            .get_relation_value::<Post>("posts", &conn)
            .await
            .unwrap()
            .iter()
            .filter_map(|post| post.get_key().as_i64())
            .collect();

        assert_eq!(eager_ids, expected);
        assert_eq!(lazy_ids, eager_ids);
    }
}

#[tokio::test]
async fn test_eager_constraint_narrows_the_related_query() {
    let conn = seeded();

    let users = User::query()
        .with_constraint::<Post, _>("posts", |query| query.where_op("votes", QueryOperator::GreaterThan, 5))
        .order_by("id")
        .get(&conn)
        .await
        .unwrap();

    let ada_posts: Vec<i64> = users[0]
        .get_relation::<Post>("posts")
        .unwrap()
        .iter()
        .filter_map(|post| post.get_key().as_i64())
        .collect();
    assert_eq!(ada_posts, vec![11]);
    assert!(users[1].get_relation::<Post>("posts").unwrap().is_empty());
}

#[tokio::test]
async fn test_eager_constraint_for_the_wrong_model_fails() {
    let conn = seeded();

    let err = User::query()
        .with_constraint::<Comment, _>("posts", |query| query)
        .get(&conn)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidTemplateArgument(_)));
}

#[tokio::test]
async fn test_belongs_to_eager_load_leaves_orphans_empty() {
    let conn = seeded();

    let posts = Post::query().with(&["user"]).order_by("id").get(&conn).await.unwrap();
    let owners: Vec<Option<DatabaseValue>> = posts
        .iter()
        .map(|post| {
            post.get_relation_one::<User>("user")
                .unwrap()
                .map(|user| user.get_attribute_value("name"))
        })
        .collect();

    assert_eq!(
        owners,
        vec![
            Some("ada".into()),
            Some("ada".into()),
            Some("grace".into()),
            None,
        ]
    );
}

#[tokio::test]
async fn test_belongs_to_many_eager_load_hydrates_pivots() {
    let conn = seeded();

    let users = User::query().with(&["roles"]).order_by("id").get(&conn).await.unwrap();

    let roles = users[0].get_relation::<Role>("roles").unwrap();
    assert_eq!(roles.len(), 2);
    let admin = roles
        .iter()
        .find(|role| role.get_attribute_value("name") == DatabaseValue::from("admin"))
        .unwrap();
    let pivot = admin.get_relation_one::<Pivot>("pivot").unwrap().unwrap();
    assert_eq!(pivot.get_attribute_value("active"), DatabaseValue::Bool(true));
    assert_eq!(pivot.get_table(), "role_user");
    // pivot columns are not left on the related model
    assert!(admin.get_attribute("pivot_user_id").is_none());

    assert_eq!(users[1].get_relation::<Role>("roles").unwrap().len(), 1);
    assert!(users[2].get_relation::<Role>("roles").unwrap().is_empty());
}

#[tokio::test]
async fn test_load_onto_a_retrieved_model() {
    let conn = seeded();
    let mut post = Post::find_or_fail(12, &conn).await.unwrap();

    post.load(&["user.profile", "comments.author"], &conn).await.unwrap();

    let owner = post.get_relation_one::<User>("user").unwrap().unwrap();
    assert_eq!(owner.get_attribute_value("name"), DatabaseValue::from("grace"));
    assert!(owner.relation_loaded("profile"));

    let comments = post.get_relation::<Comment>("comments").unwrap();
    let author = comments[0].get_relation_one::<User>("author").unwrap().unwrap();
    assert_eq!(author.get_key(), DatabaseValue::Int64(1));
}

#[tokio::test]
async fn test_self_referencing_eager_load() {
    let conn = seeded();

    let categories = Category::query()
        .with(&["children.children", "parent"])
        .where_null("parent_id")
        .order_by("id")
        .get(&conn)
        .await
        .unwrap();
    assert_eq!(ids(&categories), vec![1, 4]);

    let children = categories[0].get_relation::<Category>("children").unwrap();
    assert_eq!(children.len(), 1);
    let grandchildren = children[0].get_relation::<Category>("children").unwrap();
    assert_eq!(grandchildren[0].get_key(), DatabaseValue::Int64(3));
    assert_eq!(categories[0].get_relation_one::<Category>("parent").unwrap(), None);
}

#[tokio::test]
async fn test_unknown_eager_relation_fails() {
    let conn = seeded();

    let err = User::query().with(&["posts.likes"]).get(&conn).await.unwrap_err();
    assert!(matches!(
        err,
        OrmError::RelationMappingNotFound { ref model, ref relation, .. } if model == "Post" && relation == "likes"
    ));
}
