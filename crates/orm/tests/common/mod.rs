//! Models and fixtures shared by the integration tests
#![allow(dead_code)]

use tiny_orm::prelude::*;

macro_rules! model_base {
    () => {
        fn base(&self) -> &ModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModelBase {
            &mut self.base
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    base: ModelBase,
}

impl User {
    pub fn posts(&self) -> HasMany<User, Post> {
        self.has_many(None, None)
    }

    pub fn profile(&self) -> HasOne<User, Profile> {
        self.has_one(None, None)
    }

    pub fn latest_post(&self) -> HasOne<User, Post> {
        self.has_one(None, None).latest("id")
    }

    pub fn roles(&self) -> OrmResult<BelongsToMany<User, Role>> {
        Ok(self.belongs_to_many::<Role>(PivotKeys::new())?.with_pivot(&["active"]))
    }

    pub fn memberships(&self) -> OrmResult<BelongsToMany<User, Role, RoleUser>> {
        Ok(self
            .belongs_to_many_using::<Role, RoleUser>(PivotKeys::new().relation("memberships"))?
            .with_pivot(&["active"])
            .as_accessor("membership"))
    }
}

impl Model for User {
    fn table_name() -> &'static str {
        "users"
    }

    model_base!();

    fn relations() -> &'static RelationRegistry<Self> {
        relations!(User {
            "posts" => User::posts,
            "profile" => User::profile,
            "latestPost" => User::latest_post,
            "roles" => User::roles,
            "memberships" => User::memberships,
        })
    }

    fn hidden() -> &'static [&'static str] {
        &["password"]
    }

    fn uses_timestamps() -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    base: ModelBase,
}

impl Post {
    pub fn user(&self) -> OrmResult<BelongsTo<Post, User>> {
        self.belongs_to(None, None, None)
    }

    pub fn comments(&self) -> HasMany<Post, Comment> {
        self.has_many(None, None)
    }
}

impl Model for Post {
    fn table_name() -> &'static str {
        "posts"
    }

    model_base!();

    fn relations() -> &'static RelationRegistry<Self> {
        relations!(Post {
            "user" => Post::user,
            "comments" => Post::comments,
        })
    }

    fn touches() -> &'static [&'static str] {
        &["user"]
    }

    fn uses_timestamps() -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    base: ModelBase,
}

impl Comment {
    pub fn post(&self) -> OrmResult<BelongsTo<Comment, Post>> {
        self.belongs_to(None, None, None)
    }

    pub fn author(&self) -> OrmResult<BelongsTo<Comment, User>> {
        self.belongs_to(Some("user_id"), None, Some("author"))
    }
}

impl Model for Comment {
    fn table_name() -> &'static str {
        "comments"
    }

    model_base!();

    fn relations() -> &'static RelationRegistry<Self> {
        relations!(Comment {
            "post" => Comment::post,
            "author" => Comment::author,
        })
    }

    fn touches() -> &'static [&'static str] {
        &["post"]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    base: ModelBase,
}

impl Profile {
    pub fn user(&self) -> OrmResult<BelongsTo<Profile, User>> {
        Ok(self
            .belongs_to(None, None, None)?
            .with_default_attributes([("name", "Guest")]))
    }
}

impl Model for Profile {
    fn table_name() -> &'static str {
        "profiles"
    }

    model_base!();

    fn relations() -> &'static RelationRegistry<Self> {
        relations!(Profile {
            "user" => Profile::user,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Role {
    base: ModelBase,
}

impl Role {
    pub fn users(&self) -> OrmResult<BelongsToMany<Role, User>> {
        self.belongs_to_many::<User>(PivotKeys::new())
    }
}

impl Model for Role {
    fn table_name() -> &'static str {
        "roles"
    }

    model_base!();

    fn relations() -> &'static RelationRegistry<Self> {
        relations!(Role {
            "users" => Role::users,
        })
    }
}

/// Typed pivot of the users and roles relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleUser {
    base: ModelBase,
}

impl RoleUser {
    pub fn is_active(&self) -> bool {
        self.get_attribute_value("active") == DatabaseValue::Bool(true)
    }
}

impl Model for RoleUser {
    fn table_name() -> &'static str {
        "role_user"
    }

    model_base!();

    fn relations() -> &'static RelationRegistry<Self> {
        relations!(RoleUser {})
    }
}

impl PivotModel for RoleUser {
    fn pivot_table() -> Option<&'static str> {
        Some("role_user")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Category {
    base: ModelBase,
}

impl Category {
    pub fn parent(&self) -> OrmResult<BelongsTo<Category, Category>> {
        self.belongs_to(Some("parent_id"), None, Some("parent"))
    }

    pub fn children(&self) -> HasMany<Category, Category> {
        self.has_many(Some("parent_id"), None)
    }
}

impl Model for Category {
    fn table_name() -> &'static str {
        "categories"
    }

    model_base!();

    fn relations() -> &'static RelationRegistry<Self> {
        relations!(Category {
            "parent" => Category::parent,
            "children" => Category::children,
        })
    }
}

/// Install a test subscriber once, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Memory database with users, posts, comments, profiles, roles and categories
///
/// ```text
/// users       1 ada (2 posts, profile, admin + editor)   2 grace (1 post, editor)   3 linus
/// posts       10 Rust (user 1, 2 comments)   11 Async (user 1)   12 Compilers (user 2, 1 comment)   13 Orphan
/// categories  1 root > 2 child > 3 leaf      4 other root
/// ```
pub fn seeded() -> MemoryConnection {
    init_tracing();

    let conn = MemoryConnection::new();
    conn.seed(
        "users",
        [(1i64, "ada"), (2, "grace"), (3, "linus")].map(|(id, name)| {
            attributes([
                ("id", DatabaseValue::Int64(id)),
                ("name", name.into()),
                ("password", "secret".into()),
                ("updated_at", DatabaseValue::Null),
            ])
        }),
    );
    conn.seed(
        "posts",
        [
            (10i64, Some(1i64), "Rust", 5i64),
            (11, Some(1), "Async", 7),
            (12, Some(2), "Compilers", 1),
            (13, None, "Orphan", 0),
        ]
        .map(|(id, user_id, title, votes)| {
            attributes([
                ("id", DatabaseValue::Int64(id)),
                ("user_id", user_id.into()),
                ("title", title.into()),
                ("votes", votes.into()),
                ("updated_at", DatabaseValue::Null),
            ])
        }),
    );
    conn.seed(
        "comments",
        [(100i64, 10i64, 2i64, "nice"), (101, 10, 3, "great"), (102, 12, 1, "agreed")].map(
            |(id, post_id, user_id, body)| {
                attributes([
                    ("id", DatabaseValue::Int64(id)),
                    ("post_id", post_id.into()),
                    ("user_id", user_id.into()),
                    ("body", body.into()),
                ])
            },
        ),
    );
    conn.seed(
        "profiles",
        [
            attributes([("id", 1000i64), ("user_id", 1i64)]),
            attributes([("id", 1001i64), ("user_id", 99i64)]),
        ],
    );
    conn.seed(
        "roles",
        [(1i64, "admin"), (2, "editor"), (3, "viewer")]
            .map(|(id, name)| attributes([("id", DatabaseValue::Int64(id)), ("name", name.into())])),
    );
    conn.seed(
        "role_user",
        [(1i64, 1i64, true), (1, 2, false), (2, 2, true)].map(|(user_id, role_id, active)| {
            attributes([
                ("user_id", DatabaseValue::Int64(user_id)),
                ("role_id", role_id.into()),
                ("active", active.into()),
            ])
        }),
    );
    conn.seed(
        "categories",
        [(1i64, None, "root"), (2, Some(1i64), "child"), (3, Some(2), "leaf"), (4, None, "other")].map(
            |(id, parent_id, name)| {
                attributes([
                    ("id", DatabaseValue::Int64(id)),
                    ("parent_id", parent_id.into()),
                    ("name", name.into()),
                ])
            },
        ),
    );
    conn.clear_statements();
    conn
}

/// Primary keys of `models` as integers
pub fn ids<M: Model>(models: &[M]) -> Vec<i64> {
    models
        .iter()
        .filter_map(|model| model.get_key().as_i64())
        .collect()
}
