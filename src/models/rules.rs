use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Selector value that aggregates every capture of every match.
pub const ALL_MATCHES: i32 = -1;

/// Pattern modifiers applied when a rule is compiled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOptions {
    pub case_insensitive: bool,
    pub multiline: bool,
    pub dot_matches_new_line: bool,
}

/// One named extraction instruction.
///
/// `match_selector` picks which match of the pattern contributes values:
/// a zero-based index selects that single match, [`ALL_MATCHES`] collects
/// from all of them. `allow_empty` decides whether a rule that extracts
/// nothing skips quietly or aborts the run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: String,
    pub options: RuleOptions,
    pub match_selector: i32,
    pub allow_empty: bool,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, match_selector: i32, allow_empty: bool) -> Self {
        Self {
            pattern: pattern.into(),
            options: RuleOptions::default(),
            match_selector,
            allow_empty,
        }
    }

    pub fn with_options(
        pattern: impl Into<String>,
        options: RuleOptions,
        match_selector: i32,
        allow_empty: bool,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            options,
            match_selector,
            allow_empty,
        }
    }
}

/// An ordered collection of uniquely named rules.
///
/// Rules are applied in insertion order. Adding under a taken name is
/// refused without panicking; the reason is kept in [`last_error`]
/// until the next mutation.
///
/// [`last_error`]: Self::last_error
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: IndexMap<String, Rule>,
    last_error: Option<String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule under `name`. Returns false and records the reason
    /// when the name is already taken or empty.
    pub fn add(&mut self, name: impl Into<String>, rule: Rule) -> bool {
        let name = name.into();
        if name.is_empty() {
            self.last_error = Some("rule name must not be empty".to_string());
            return false;
        }
        if self.rules.contains_key(&name) {
            self.last_error = Some(format!("rule '{name}' already present"));
            return false;
        }
        self.rules.insert(name, rule);
        self.last_error = None;
        true
    }

    /// Removes the rule named `name`, preserving the order of the rest.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.rules.shift_remove(name).is_some() {
            self.last_error = None;
            true
        } else {
            self.last_error = Some(format!("rule '{name}' not present"));
            false
        }
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Rule)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Why the most recent mutation was refused, if it was.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut rules = RuleSet::new();
        assert!(rules.add("Price", Rule::new(r"price=(\d+)", 0, false)));
        assert!(rules.add("Currency", Rule::new(r"currency=(\w+)", 0, false)));
        assert!(rules.add("Volume", Rule::new(r"volume=(\d+)", ALL_MATCHES, true)));

        let names: Vec<&String> = rules.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["Price", "Currency", "Volume"]);
        assert_eq!(rules.len(), 3);
        assert!(rules.last_error().is_none());
    }

    #[test]
    fn test_duplicate_name_is_refused() {
        let mut rules = RuleSet::new();
        assert!(rules.add("Price", Rule::new(r"first", 0, false)));
        assert!(!rules.add("Price", Rule::new(r"second", 0, false)));

        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get("Price").unwrap().pattern, "first");
        assert!(rules.last_error().unwrap().contains("Price"));

        // next successful mutation clears the recorded reason
        assert!(rules.add("Other", Rule::new(r"x", 0, false)));
        assert!(rules.last_error().is_none());
    }

    #[test]
    fn test_empty_name_is_refused() {
        let mut rules = RuleSet::new();
        assert!(!rules.add("", Rule::new(r"x", 0, false)));
        assert!(rules.is_empty());
        assert!(rules.last_error().is_some());
    }

    #[test]
    fn test_remove_keeps_order_of_rest() {
        let mut rules = RuleSet::new();
        rules.add("A", Rule::new("a", 0, false));
        rules.add("B", Rule::new("b", 0, false));
        rules.add("C", Rule::new("c", 0, false));

        assert!(rules.remove("B"));
        let names: Vec<&String> = rules.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["A", "C"]);

        assert!(!rules.remove("B"));
        assert!(rules.last_error().is_some());
    }
}
