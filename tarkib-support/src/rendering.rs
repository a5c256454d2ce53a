//! Text rendering utilities for diagnostics.
//!
//! Turns type names, dependency chains and scope paths into the short,
//! readable forms used in error messages and debug dumps.

/// Renders a dependency chain as `A -> B -> C`.
///
/// # Examples
/// ```
/// use tarkib_support::rendering::render_chain;
///
/// let chain = ["Service", "Repository", "Database", "Service"];
/// assert_eq!(render_chain(&chain), "Service -> Repository -> Database -> Service");
/// ```
pub fn render_chain<S: AsRef<str>>(chain: &[S]) -> String {
    join(chain, " -> ")
}

/// Renders a scope path, root first: `/`, `/Request`, `/Request/Transaction`.
///
/// # Examples
/// ```
/// use tarkib_support::rendering::render_scope_path;
///
/// assert_eq!(render_scope_path::<&str>(&[]), "/");
/// assert_eq!(render_scope_path(&["Request", "Transaction"]), "/Request/Transaction");
/// ```
pub fn render_scope_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut rendered = String::from("/");
    rendered.push_str(&join(segments, "/"));
    rendered
}

/// Renders a list as `[a, b, c]`, used to enumerate scopes or candidates.
pub fn render_list<S: AsRef<str>>(items: &[S]) -> String {
    format!("[{}]", join(items, ", "))
}

fn join<S: AsRef<str>>(items: &[S], separator: &str) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Strips module paths from a fully qualified type name, keeping generics.
///
/// ```
/// use tarkib_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("app::billing::Invoice"), "Invoice");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn app::ports::Clock>"),
///     "Arc<dyn Clock>"
/// );
/// assert_eq!(
///     shorten_type_name("std::collections::HashMap<alloc::string::String, u32>"),
///     "HashMap<String, u32>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut shortened = String::with_capacity(full_name.len());
    let mut segment_start = 0;

    for (index, ch) in full_name.char_indices() {
        if matches!(ch, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&') {
            shortened.push_str(last_path_segment(&full_name[segment_start..index]));
            shortened.push(ch);
            segment_start = index + ch.len_utf8();
        }
    }
    shortened.push_str(last_path_segment(&full_name[segment_start..]));
    shortened
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Picks registered names that look like the requested one.
///
/// Substring matches on the full name rank highest, then matches on the
/// shortened name, then a shared prefix of at least three characters.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_full = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut ranked: Vec<(usize, &str)> = available
        .iter()
        .filter_map(|&candidate| {
            let full = candidate.to_lowercase();
            let short = shorten_type_name(candidate).to_lowercase();
            let score = if full.contains(&requested_full) || requested_full.contains(&full) {
                100
            } else if short.contains(&requested_short) || requested_short.contains(&short) {
                80
            } else {
                let shared = short
                    .chars()
                    .zip(requested_short.chars())
                    .take_while(|(a, b)| a == b)
                    .count();
                if shared < 3 {
                    return None;
                }
                shared * 10
            };
            Some((score, candidate))
        })
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    ranked
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_cycle_chain() {
        assert_eq!(render_chain(&["A", "B", "C", "A"]), "A -> B -> C -> A");
    }

    #[test]
    fn render_single_and_empty_chain() {
        assert_eq!(render_chain(&["A"]), "A");
        assert_eq!(render_chain::<&str>(&[]), "");
    }

    #[test]
    fn render_root_and_nested_scope() {
        assert_eq!(render_scope_path::<String>(&[]), "/");
        assert_eq!(render_scope_path(&["Request"]), "/Request");
    }

    #[test]
    fn render_bracketed_list() {
        assert_eq!(render_list(&["/", "/Request"]), "[/, /Request]");
        assert_eq!(render_list::<&str>(&[]), "[]");
    }

    #[test]
    fn shorten_plain_and_nested_generics() {
        assert_eq!(shorten_type_name("String"), "String");
        assert_eq!(
            shorten_type_name("core::option::Option<alloc::vec::Vec<my::Item>>"),
            "Option<Vec<Item>>"
        );
        assert_eq!(shorten_type_name("&str"), "&str");
        assert_eq!(shorten_type_name("[my::Item; 4]"), "[Item; 4]");
    }

    #[test]
    fn suggest_prefers_close_names() {
        let available = ["app::UserService", "app::UserRepository", "app::Mailer"];
        let suggestions = suggest_similar("app::UserServise", &available, 2);
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions.iter().all(|s| s.contains("User")));
    }

    #[test]
    fn suggest_nothing_for_unrelated_names() {
        let suggestions = suggest_similar("Xyz", &["app::Database"], 3);
        assert!(suggestions.is_empty());
    }
}
