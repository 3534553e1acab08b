//! Subject to hashtag conversion.

use std::sync::LazyLock;

use regex::Regex;

/// Anything that is not a word character or whitespace.
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("static pattern is valid"));

/// Turn a free-text subject into a lower-camel hashtag body.
///
/// `"Library of Congress"` becomes `libraryOfCongress`, and a leading digit
/// gets a `tag` prefix: `"2024 Election"` becomes `tag2024Election`.
pub fn sanitize_hashtag(subject: &str) -> String {
    let stripped = PUNCTUATION.replace_all(subject, "");
    let mut tag = String::with_capacity(stripped.len());

    for (position, word) in stripped.split_whitespace().enumerate() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if position == 0 {
                tag.extend(first.to_lowercase());
            } else {
                tag.extend(first.to_uppercase());
            }
            tag.push_str(chars.as_str());
        }
    }

    if tag.starts_with(|c: char| c.is_ascii_digit()) {
        tag.insert_str(0, "tag");
    }
    tag
}

/// `#`-prefixed hashtags for each subject, space separated. Subjects that
/// sanitize to nothing are left out.
pub fn hashtags<S: AsRef<str>>(subjects: &[S]) -> String {
    subjects
        .iter()
        .map(|s| sanitize_hashtag(s.as_ref()))
        .filter(|tag| !tag.is_empty())
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}
