mod common;

use common::*;
use tiny_orm::prelude::*;
use tiny_orm::query::Boolean;

async fn user_ids(query: QueryBuilder<User>, conn: &MemoryConnection) -> Vec<i64> {
    ids(&query.order_by("id").get(conn).await.unwrap())
}

#[tokio::test]
async fn test_has_and_doesnt_have() {
    let conn = seeded();

    assert_eq!(user_ids(User::query().has("posts").unwrap(), &conn).await, vec![1, 2]);
    assert_eq!(user_ids(User::query().doesnt_have("posts").unwrap(), &conn).await, vec![3]);
    assert_eq!(user_ids(User::query().has("profile").unwrap(), &conn).await, vec![1]);

    let posts = Post::query().has("user").unwrap().order_by("id").get(&conn).await.unwrap();
    assert_eq!(ids(&posts), vec![10, 11, 12]);
}

#[tokio::test]
async fn test_has_compiles_to_a_correlated_exists() {
    let sql = User::query().has("posts").unwrap().to_sql();
    assert_eq!(
        sql,
        "SELECT * FROM users WHERE EXISTS (SELECT * FROM posts WHERE users.id = posts.user_id)"
    );

    let sql = User::query().doesnt_have("posts").unwrap().to_sql();
    assert!(sql.contains("WHERE NOT EXISTS (SELECT"), "{}", sql);
}

#[tokio::test]
async fn test_has_count_compiles_to_a_count_sub_query() {
    let conn = seeded();

    let query = User::query().has_count("posts", QueryOperator::GreaterThanOrEqual, 2).unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT * FROM users WHERE (SELECT COUNT(*) AS aggregate FROM posts WHERE users.id = posts.user_id) >= 2"
    );
    assert_eq!(user_ids(query, &conn).await, vec![1]);

    let query = User::query().has_count("posts", QueryOperator::Equal, 1).unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![2]);
}

#[tokio::test]
async fn test_where_has_applies_the_callback() {
    let conn = seeded();

    let query = User::query()
        .where_has::<Post, _>("posts", |posts| posts.where_eq("title", "Compilers"))
        .unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![2]);

    let query = User::query()
        .where_doesnt_have::<Post, _>("posts", |posts| posts.where_op("votes", QueryOperator::GreaterThan, 6))
        .unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![2, 3]);

    let query = User::query()
        .where_has_count::<Post, _>(
            "posts",
            |posts| posts.where_op("votes", QueryOperator::GreaterThanOrEqual, 1),
            QueryOperator::GreaterThan,
            1,
        )
        .unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![1]);
}

#[tokio::test]
async fn test_or_inside_where_has_stays_in_the_sub_query() {
    let conn = seeded();

    let query = User::query()
        .where_has::<Post, _>("posts", |posts| posts.where_eq("title", "Rust").or_where_eq("title", "Async"))
        .unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT * FROM users WHERE EXISTS (SELECT * FROM posts WHERE users.id = posts.user_id AND \
         (title = 'Rust' OR title = 'Async'))"
    );
    assert_eq!(user_ids(query, &conn).await, vec![1]);

    // a lone OR clause is still ANDed with the correlation
    let query = User::query()
        .where_has::<Post, _>("posts", |posts| posts.or_where_eq("title", "Compilers"))
        .unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![2]);
}

#[tokio::test]
async fn test_or_variants() {
    let conn = seeded();

    let query = User::query().where_eq("name", "linus").or_has("profile").unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![1, 3]);

    let query = User::query()
        .where_eq("name", "ada")
        .or_where_has::<Role, _>("roles", |roles| roles.where_eq("name", "editor"))
        .unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![1, 2]);

    let query = User::query().has("profile").unwrap().or_doesnt_have("roles").unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![1, 3]);
}

#[tokio::test]
async fn test_nested_relations_become_nested_sub_queries() {
    let conn = seeded();

    let query = User::query().has("posts.comments").unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT * FROM users WHERE EXISTS (SELECT * FROM posts WHERE users.id = posts.user_id AND \
         EXISTS (SELECT * FROM comments WHERE posts.id = comments.post_id))"
    );
    assert_eq!(user_ids(query, &conn).await, vec![1, 2]);

    let query = User::query()
        .where_has::<Comment, _>("posts.comments", |comments| comments.where_eq("body", "agreed"))
        .unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![2]);

    let query = User::query().doesnt_have("posts.comments").unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![3]);

    let query = User::query()
        .has_count("posts.comments", QueryOperator::GreaterThanOrEqual, 2)
        .unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![1]);
}

#[tokio::test]
async fn test_belongs_to_many_existence() {
    let conn = seeded();

    let query = User::query()
        .where_has::<Role, _>("roles", |roles| roles.where_eq("name", "admin"))
        .unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![1]);

    let query = User::query().has_count("roles", QueryOperator::GreaterThanOrEqual, 2).unwrap();
    assert_eq!(user_ids(query, &conn).await, vec![1]);

    let roles = Role::query().doesnt_have("users").unwrap().get(&conn).await.unwrap();
    assert_eq!(ids(&roles), vec![3]);
}

#[tokio::test]
async fn test_self_referencing_existence_uses_aliases() {
    let conn = seeded();

    let query = Category::query().has("children").unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT * FROM categories WHERE EXISTS (SELECT * FROM categories AS categories_self_1 \
         WHERE categories.id = categories_self_1.parent_id)"
    );
    let categories = query.order_by("id").get(&conn).await.unwrap();
    assert_eq!(ids(&categories), vec![1, 2]);

    let query = Category::query().has("children.children").unwrap();
    assert!(query.to_sql().contains("categories_self_1.id = categories_self_2.parent_id"));
    assert_eq!(ids(&query.get(&conn).await.unwrap()), vec![1]);

    let with_parent = Category::query().has("parent").unwrap().order_by("id").get(&conn).await.unwrap();
    assert_eq!(ids(&with_parent), vec![2, 3]);
}

#[tokio::test]
async fn test_existence_errors() {
    let err = User::query().has("followers").unwrap_err();
    assert!(matches!(err, OrmError::RelationMappingNotFound { ref relation, .. } if relation == "followers"));

    let err = User::query().has("posts.likes").unwrap_err();
    assert!(matches!(err, OrmError::RelationMappingNotFound { ref model, .. } if model == "Post"));

    let err = User::query()
        .where_has::<Comment, _>("posts", |comments| comments)
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidTemplateArgument(_)));
}

#[tokio::test]
async fn test_nested_has_checks_the_last_relation_type() {
    let err = User::query()
        .has_related::<Post, _>(
            "posts.comments",
            QueryOperator::GreaterThanOrEqual,
            1,
            Boolean::And,
            |posts| posts,
        )
        .unwrap_err();

    match err {
        OrmError::InvalidTemplateArgument(message) => {
            assert!(message.contains("'Post'"), "{}", message);
            assert!(message.contains("'Comment'"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // the matching type passes
    assert!(User::query()
        .has_related::<Comment, _>("posts.comments", QueryOperator::GreaterThanOrEqual, 1, Boolean::And, |c| c)
        .is_ok());
}
