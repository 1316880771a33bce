//! Search-string predicates over [`Player`] records.
//!
//! A query is split on whitespace; every token must match.
//!
//! | Token           | Matches                                               |
//! |-----------------|-------------------------------------------------------|
//! | `ash`           | name, per [`SearchType`] (case-insensitive)           |
//! | `fc:Moon*`      | free company by wildcard pattern                      |
//! | `notes:*raid*`  | notes by wildcard pattern                             |
//! | `world:Lich`    | world name, exact (case-insensitive)                  |
//! | `fc:!`          | free company is empty                                 |
//! | `!ash`, `fc:!x` | negation of the token                                 |
//!
//! Wildcard patterns: `*` (any non-empty value), `x*` (prefix), `*x` (suffix),
//! `*x*` (contains), otherwise exact. Keys other than `fc`, `notes` and
//! `world` match the name against the value.
//!
//! ```
//! use rosterkit::entity::Player;
//! use rosterkit::search::{SearchType, search_filter};
//!
//! let ash = Player::new(1, "Ash Ketch", 1).with_free_company("Moonfire");
//! let bo = Player::new(2, "Bo", 1);
//!
//! let filter = search_filter("ash fc:moon*", SearchType::Contains);
//! assert!(filter(&ash));
//! assert!(!filter(&bo));
//!
//! let no_fc = search_filter("fc:!", SearchType::Contains);
//! assert!(no_fc(&bo));
//! ```

use crate::entity::Player;

/// How plain tokens match the name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchType {
    #[default]
    Contains,
    StartsWith,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FreeCompany,
    Notes,
    World,
}

impl Field {
    fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "fc" => Some(Self::FreeCompany),
            "notes" => Some(Self::Notes),
            "world" => Some(Self::World),
            _ => None,
        }
    }

    fn value<'a>(&self, player: &'a Player) -> &'a str {
        match self {
            Self::FreeCompany => player.free_company(),
            Self::Notes => player.notes(),
            Self::World => player.world_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Test {
    Name(String),
    Pattern(Field, String),
    Empty(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    negated: bool,
    test: Test,
}

impl Term {
    fn parse(token: &str) -> Self {
        let (mut negated, body) = match token.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let Some((key, value)) = body.split_once(':').filter(|(k, v)| !k.is_empty() && !v.is_empty())
        else {
            return Self {
                negated,
                test: Test::Name(body.to_lowercase()),
            };
        };
        let Some(field) = Field::from_key(key) else {
            return Self {
                negated,
                test: Test::Name(value.to_lowercase()),
            };
        };
        if value == "!" {
            return Self {
                negated,
                test: Test::Empty(field),
            };
        }
        let value = match value.strip_prefix('!') {
            Some(rest) => {
                negated = true;
                rest
            },
            None => value,
        };
        Self {
            negated,
            test: Test::Pattern(field, value.to_lowercase()),
        }
    }

    fn matches(&self, player: &Player, search_type: SearchType) -> bool {
        let hit = match &self.test {
            Test::Name(needle) => match_name(player.name(), needle, search_type),
            Test::Pattern(field, pattern) => match_pattern(field.value(player), pattern),
            Test::Empty(field) => field.value(player).is_empty(),
        };
        hit != self.negated
    }
}

fn match_name(name: &str, needle: &str, search_type: SearchType) -> bool {
    if name.is_empty() {
        return false;
    }
    let name = name.to_lowercase();
    match search_type {
        SearchType::Contains => name.contains(needle),
        SearchType::StartsWith => name.starts_with(needle),
        SearchType::Exact => name == needle,
    }
}

fn match_pattern(field: &str, pattern: &str) -> bool {
    if field.is_empty() {
        return false;
    }
    let field = field.to_lowercase();
    if pattern == "*" {
        return true;
    }
    match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
        (Some(_), Some(_)) => field.contains(pattern.trim_matches('*')),
        (Some(suffix), None) => field.ends_with(suffix),
        (None, Some(prefix)) => field.starts_with(prefix),
        (None, None) => field == pattern,
    }
}

/// Builds a predicate from `query`. An empty or blank query matches
/// everyone.
pub fn search_filter(query: &str, search_type: SearchType) -> impl Fn(&Player) -> bool + use<> {
    let terms: Vec<Term> = query.split_whitespace().map(Term::parse).collect();
    move |player: &Player| terms.iter().all(|term| term.matches(player, search_type))
}

/// Checks query syntax.
///
/// Plain tokens may not contain `!` or `*`; keyed tokens need a value and
/// may not use `!` or `*` in the key.
pub fn is_valid_search(query: &str) -> bool {
    query.split_whitespace().all(is_valid_token)
}

fn is_valid_token(token: &str) -> bool {
    match token.split_once(':') {
        None => !token.contains(['!', '*']),
        Some((_, "")) => false,
        Some((key, _)) => !key.contains(['!', '*']),
    }
}
