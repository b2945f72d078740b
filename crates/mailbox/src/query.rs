//! Gmail search query construction

/// Labels and categories never considered for check-in records.
const EXCLUSIONS: &[&str] = &[
    "-in:spam",
    "-in:trash",
    "-category:promotions",
    "-category:social",
];

/// Search expression for messages whose subject contains `keyword`.
///
/// Double quotes are stripped from the keyword so it cannot close the
/// quoted phrase and inject extra operators.
pub fn search_query(keyword: &str) -> String {
    let keyword: String = keyword.chars().filter(|c| *c != '"').collect();
    let mut query = format!("subject:\"{}\"", keyword.trim());
    for exclusion in EXCLUSIONS {
        query.push(' ');
        query.push_str(exclusion);
    }
    query
}
