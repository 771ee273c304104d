use crate::domain::Snippet;

/// Case-insensitive substring match over name, description, tags and aliases.
pub fn matches(snippet: &Snippet, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    let hit = |s: &str| s.to_lowercase().contains(&query);
    hit(&snippet.name)
        || snippet.description.as_deref().is_some_and(hit)
        || snippet.tags.iter().any(|t| hit(t))
        || snippet.aliases.iter().any(|a| hit(a))
}

pub fn filter<'a>(snippets: &'a [Snippet], query: &str) -> Vec<&'a Snippet> {
    snippets.iter().filter(|s| matches(s, query)).collect()
}

/// Favorites first, then recently run (newest-first), then the rest in catalog order.
pub fn order_for_menu<'a>(
    snippets: &[&'a Snippet],
    favorites: &[String],
    recent: &[String],
) -> Vec<&'a Snippet> {
    let rank = |s: &Snippet| -> (u8, usize) {
        if let Some(i) = favorites.iter().position(|f| *f == s.name) {
            (0, i)
        } else if let Some(i) = recent.iter().position(|r| *r == s.name) {
            (1, i)
        } else {
            (2, 0)
        }
    };

    let mut ordered = snippets.to_vec();
    // sort_by_key is stable, so unranked entries keep catalog order.
    ordered.sort_by_key(|s| rank(s));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Catalog;

    #[test]
    fn empty_query_matches_everything() {
        let catalog = Catalog::sample();
        assert_eq!(filter(&catalog.commands, "  ").len(), catalog.commands.len());
    }

    #[test]
    fn matches_name_description_tags_and_aliases() {
        let mut s = Snippet::new("Deploy", "make deploy")
            .with_description("Ship it to Production")
            .with_tags(["ops"]);
        s.aliases = vec!["dp".to_string()];

        assert!(matches(&s, "depl"));
        assert!(matches(&s, "PRODUCTION"));
        assert!(matches(&s, "ops"));
        assert!(matches(&s, "dp"));
        assert!(!matches(&s, "docker"));
    }

    #[test]
    fn filter_by_tag() {
        let catalog = Catalog::sample();
        let names: Vec<&str> = filter(&catalog.commands, "docker")
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Docker Build", "Docker Run"]);
    }

    #[test]
    fn menu_order_puts_favorites_then_recent_first() {
        let catalog = Catalog::sample();
        let all: Vec<&Snippet> = catalog.commands.iter().collect();
        let favorites = vec!["Disk Usage".to_string()];
        let recent = vec!["Docker Run".to_string(), "Disk Usage".to_string()];

        let names: Vec<&str> = order_for_menu(&all, &favorites, &recent)
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "Disk Usage",
                "Docker Run",
                "Git Status",
                "Git Pull",
                "Git Push",
                "Docker Build",
                "List Files"
            ]
        );
    }
}
