use once_cell::sync::Lazy;
use regex::Regex;

static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").expect("valid hashtag pattern"));

/// Strips every `#word` token and trims the surrounding whitespace.
pub fn remove_hashtags(content: &str) -> String {
    HASHTAG.replace_all(content, "").trim().to_string()
}

pub fn contains_hashtag(content: &str) -> bool {
    HASHTAG.is_match(content)
}
