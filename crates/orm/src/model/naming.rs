//! Naming conventions - model names, foreign keys, pivot tables and relation names

/// Last path segment of a type name, with any generic arguments dropped
///
/// `my_app::models::User` becomes `User`.
pub fn class_basename(type_name: &str) -> &str {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}

/// Convert `PascalCase` or `camelCase` to `snake_case`
pub fn snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;

    for ch in name.chars() {
        if ch.is_uppercase() {
            if previous_lower {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
            previous_lower = false;
        } else {
            previous_lower = ch.is_lowercase() || ch.is_ascii_digit();
            result.push(ch);
        }
    }

    result
}

/// Lower-case the first character
pub fn lcfirst(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Simple English pluralization
pub fn pluralize(name: &str) -> String {
    let vowel_y = ["ay", "ey", "iy", "oy", "uy"];

    if name.ends_with('y') && !vowel_y.iter().any(|suffix| name.ends_with(suffix)) {
        format!("{}ies", &name[..name.len() - 1])
    } else if ["s", "sh", "ch", "x", "z"].iter().any(|suffix| name.ends_with(suffix)) {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}

/// Pivot table name for two models: both snake names sorted and joined with `_`
pub fn pivot_table_name(first: &str, second: &str) -> String {
    let mut segments = [snake_case(first), snake_case(second)];
    segments.sort();
    segments.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_basename() {
        assert_eq!(class_basename("app::models::User"), "User");
        assert_eq!(class_basename("tiny_orm::Pivot"), "Pivot");
        assert_eq!(class_basename("app::Wrapper<app::User>"), "Wrapper");
        assert_eq!(class_basename("Plain"), "Plain");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("User"), "user");
        assert_eq!(snake_case("PostComment"), "post_comment");
        assert_eq!(snake_case("torrentPeer"), "torrent_peer");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_pluralize_and_lcfirst() {
        assert_eq!(pluralize("role"), "roles");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(lcfirst("UserProfile"), "userProfile");
        assert_eq!(lcfirst(""), "");
    }

    #[test]
    fn test_pivot_table_name_is_sorted() {
        assert_eq!(pivot_table_name("User", "Role"), "role_user");
        assert_eq!(pivot_table_name("Role", "User"), "role_user");
        assert_eq!(pivot_table_name("Tag", "BlogPost"), "blog_post_tag");
    }
}
