use std::sync::LazyLock;

use regex::Regex;

/// Titles starting with this literal keep their colon: it is part of the
/// name, not a subtitle separator.
const COLON_EXEMPT_PREFIX: &str = "Re:";

struct SuffixRule {
    pattern: Regex,
    /// The colon rule does not apply to `Re:`-style titles.
    colon_rule: bool,
}

/// Ordered suffix-stripping rules; the first rule that changes the title
/// wins. Order matters: the colon rule must run before the season rules so
/// "X: 2nd Season" collapses the same way as "X: Brotherhood".
static SUFFIX_RULES: LazyLock<Vec<SuffixRule>> = LazyLock::new(|| {
    let rule = |pattern: &str, colon_rule: bool| SuffixRule {
        pattern: Regex::new(pattern).expect("static franchise pattern"),
        colon_rule,
    };
    vec![
        rule(r"(?i)\s*:\s*.*", true),
        rule(r"(?i)\s+Season\s+\d+.*", false),
        rule(r"(?i)\s+Part\s+\d+.*", false),
        rule(r"(?i)\s+\d+(st|nd|rd|th)\s+Season.*", false),
        rule(r"(?i)\s+Movie.*", false),
        rule(r"(?i)\s+OVA.*", false),
        rule(r"(?i)\s+ONA.*", false),
        rule(r"(?i)\s+Special.*", false),
        rule(r"(?i)\s+\(\d{4}\).*", false),
        rule(r"(?i)\s+\d{4}.*", false),
    ]
});

/// Strip the first matching sequel/season/year suffix from a title,
/// yielding the base franchise name. Titles matching no rule come back
/// unchanged apart from trimming.
pub fn franchise_name(title: &str) -> String {
    let colon_exempt = title.starts_with(COLON_EXEMPT_PREFIX);
    for rule in SUFFIX_RULES.iter() {
        if colon_exempt && rule.colon_rule {
            continue;
        }
        let stripped = rule.pattern.replace_all(title, "");
        if stripped != title {
            return stripped.trim().to_string();
        }
    }
    title.trim().to_string()
}

/// Case-folded grouping key used for franchise deduplication.
pub fn franchise_key(title: &str) -> String {
    franchise_name(title).to_lowercase()
}
