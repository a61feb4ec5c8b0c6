//! Applies compiled rules against loaded text.

use regex::{Regex, RegexBuilder};

use crate::models::rules::Rule;

/// Compiles a rule's pattern with its modifiers applied.
pub fn compile(rule: &Rule) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&rule.pattern)
        .case_insensitive(rule.options.case_insensitive)
        .multi_line(rule.options.multiline)
        .dot_matches_new_line(rule.options.dot_matches_new_line)
        .build()
}

/// Runs one rule over `text` and collects its extracted values.
///
/// With a non-negative selector, only the match at that zero-based
/// index contributes, and only its first non-empty capture group.
/// With [`ALL_MATCHES`](crate::models::rules::ALL_MATCHES) every
/// non-empty capture of every match is collected in match order.
/// An empty vec means the rule found nothing; the caller decides
/// whether that is tolerable.
pub fn apply_rule(text: &str, rule: &Rule) -> Result<Vec<String>, regex::Error> {
    let re = compile(rule)?;
    let mut values = Vec::new();
    if rule.match_selector >= 0 {
        let wanted = rule.match_selector as usize;
        if let Some(caps) = re.captures_iter(text).nth(wanted) {
            for group in caps.iter().skip(1).flatten() {
                if !group.as_str().is_empty() {
                    values.push(group.as_str().to_string());
                    break;
                }
            }
        }
    } else {
        for caps in re.captures_iter(text) {
            for group in caps.iter().skip(1).flatten() {
                if !group.as_str().is_empty() {
                    values.push(group.as_str().to_string());
                }
            }
        }
    }
    Ok(values)
}
