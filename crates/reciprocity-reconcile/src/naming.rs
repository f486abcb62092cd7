//! Naming rules for synthesized reciprocal fields and relation identities.

/// Upper bound for numeric-suffix uniquification.
pub const MAX_SUFFIX_ATTEMPTS: usize = 10_000;

/// Keyword hints in an explicit identity -> reciprocal field suffix.
/// Checked in order; the first hit wins.
const IDENTITY_HINTS: &[(&[&str], &str)] = &[
    (&["Author"], "Authored"),
    (&["Resolver", "Resolved"], "Resolved"),
    (&["Brand"], "ForBrand"),
    (&["Creator"], "ForCreator"),
];

/// `BlogPost` -> `blogPost`
pub fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `category` -> `categories`, `post` -> `posts`. No irregular plurals.
pub fn pluralize(name: &str) -> String {
    match name.strip_suffix('y') {
        Some(stem) => format!("{stem}ies"),
        None => format!("{name}s"),
    }
}

pub fn identity_hint_suffix(identity: &str) -> &'static str {
    IDENTITY_HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| identity.contains(k)))
        .map_or("", |(_, suffix)| *suffix)
}

/// Reciprocal field name before collision handling.
pub fn reciprocal_field_base(source_model: &str, explicit_identity: Option<&str>) -> String {
    let plural = pluralize(&lower_camel(source_model));
    let suffix = explicit_identity.map_or("", identity_hint_suffix);
    format!("{plural}{suffix}")
}

/// `{S}{T}Relation` before collision handling.
pub fn synthesized_identity_base(source_model: &str, target_model: &str) -> String {
    format!("{source_model}{target_model}Relation")
}

/// First of `base`, `base1`, `base2`, ... for which `taken` is false.
///
/// Returns `None` once `MAX_SUFFIX_ATTEMPTS` suffixes have been tried.
pub fn uniquify(base: &str, taken: impl Fn(&str) -> bool) -> Option<String> {
    if !taken(base) {
        return Some(base.to_string());
    }
    (1..=MAX_SUFFIX_ATTEMPTS)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes_with_the_y_rule_only() {
        assert_eq!(pluralize("post"), "posts");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("person"), "persons");
        assert_eq!(pluralize("key"), "keies");
        assert_eq!(pluralize("address"), "addresss");
    }

    #[test]
    fn lower_camel_only_touches_the_first_char() {
        assert_eq!(lower_camel("BlogPost"), "blogPost");
        assert_eq!(lower_camel("URL"), "uRL");
        assert_eq!(lower_camel(""), "");
    }

    #[test]
    fn identity_hints_pick_the_first_matching_keyword() {
        assert_eq!(identity_hint_suffix("PostAuthor"), "Authored");
        assert_eq!(identity_hint_suffix("TicketResolvedBy"), "Resolved");
        assert_eq!(identity_hint_suffix("CampaignBrand"), "ForBrand");
        assert_eq!(identity_hint_suffix("AssetCreator"), "ForCreator");
        assert_eq!(identity_hint_suffix("AuthorBrand"), "Authored");
        assert_eq!(identity_hint_suffix("Membership"), "");
    }

    #[test]
    fn reciprocal_base_combines_plural_and_hint() {
        assert_eq!(reciprocal_field_base("Post", None), "posts");
        assert_eq!(reciprocal_field_base("Post", Some("PostAuthor")), "postsAuthored");
        assert_eq!(reciprocal_field_base("Category", Some("Other")), "categories");
    }

    #[test]
    fn uniquify_appends_increasing_suffixes() {
        let taken = ["posts", "posts1"];
        assert_eq!(
            uniquify("posts", |c| taken.contains(&c)),
            Some("posts2".to_string())
        );
        assert_eq!(uniquify("tags", |c| taken.contains(&c)), Some("tags".to_string()));
        assert_eq!(uniquify("x", |_| true), None);
    }
}
