//! Query match expressions: whitespace separated glob terms, optionally
//! qualified with `id:` or `name:`.

use regex::Regex;

use super::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Id,
    Name,
    Either,
}

#[derive(Debug, Clone)]
struct Term {
    target: Target,
    regex: Regex,
}

impl Term {
    fn matches(&self, item: &Item) -> bool {
        match self.target {
            Target::Id => self.regex.is_match(&item.id),
            Target::Name => self.regex.is_match(&item.name),
            Target::Either => self.regex.is_match(&item.id) || self.regex.is_match(&item.name),
        }
    }
}

/// A compiled match expression. An item matches if any term matches.
#[derive(Debug, Clone)]
pub struct MatchExpression {
    terms: Vec<Term>,
}

impl MatchExpression {
    pub fn parse(expression: &str) -> Result<Self, PatternError> {
        let terms = expression
            .split_whitespace()
            .map(|raw| {
                let (target, glob) = if let Some(rest) = raw.strip_prefix("id:") {
                    (Target::Id, rest)
                } else if let Some(rest) = raw.strip_prefix("name:") {
                    (Target::Name, rest)
                } else {
                    (Target::Either, raw)
                };

                if glob.is_empty() {
                    return Err(PatternError::EmptyTerm(raw.to_string()));
                }

                let regex = Regex::new(&glob_to_regex(glob))
                    .map_err(|e| PatternError::Invalid(raw.to_string(), e.to_string()))?;
                Ok(Term { target, regex })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { terms })
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.terms.iter().any(|t| t.matches(item))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Translate a glob into an anchored regex: `*` any run, `?` one character
fn glob_to_regex(glob: &str) -> String {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    pattern.push('$');
    pattern
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Empty term '{0}' in match expression")]
    EmptyTerm(String),

    #[error("Invalid match term '{0}': {1}")]
    Invalid(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str) -> Item {
        Item::new(id, name, "t")
    }

    #[test]
    fn test_star_matches_any_run() {
        let expr = MatchExpression::parse("dvTank*").unwrap();
        assert!(expr.matches(&item("dvTank2", "x")));
        assert!(expr.matches(&item("dvTank", "x")));
        assert!(!expr.matches(&item("DVTANK2", "x")));
        assert!(!expr.matches(&item("mydvTank2", "x")));
    }

    #[test]
    fn test_matches_id_or_name() {
        let expr = MatchExpression::parse("Tank*").unwrap();
        assert!(expr.matches(&item("dvTank2", "Tank2")));
        assert!(!expr.matches(&item("dvTank2", "Boiler")));
    }

    #[test]
    fn test_qualified_terms() {
        let by_name = MatchExpression::parse("name:Tank?").unwrap();
        assert!(by_name.matches(&item("anything", "Tank2")));
        assert!(!by_name.matches(&item("Tank2", "other")));
        assert!(!by_name.matches(&item("anything", "Tank20")));

        let by_id = MatchExpression::parse("id:dv*").unwrap();
        assert!(by_id.matches(&item("dvTank2", "x")));
        assert!(!by_id.matches(&item("x", "dvTank2")));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let expr = MatchExpression::parse("a.b+c").unwrap();
        assert!(expr.matches(&item("a.b+c", "")));
        assert!(!expr.matches(&item("axbbc", "")));
    }

    #[test]
    fn test_multiple_terms_and_empty() {
        let expr = MatchExpression::parse("id:a* id:b*").unwrap();
        assert!(expr.matches(&item("alpha", "")));
        assert!(expr.matches(&item("beta", "")));
        assert!(!expr.matches(&item("gamma", "")));

        let empty = MatchExpression::parse("   ").unwrap();
        assert!(empty.is_empty());
        assert!(!empty.matches(&item("alpha", "alpha")));

        assert!(MatchExpression::parse("name:").is_err());
    }
}
