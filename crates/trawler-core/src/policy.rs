//! Retention policy grammar.
//!
//! A policy is one or more `<count><bucket>` tokens with no separators, where
//! bucket is `r` (recent), `d` (day), `w` (week), `m` (month) or `y` (year).
//! An empty policy means `1r`; a bare number `N` means `Nr`.

use crate::error::TrawlerError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static POLICY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]+[rdwmy])+$").unwrap_or_else(|err| panic!("policy regex: {err}"))
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)([rdwmy])").unwrap_or_else(|err| panic!("token regex: {err}"))
});

/// Policy applied when none is given.
pub const DEFAULT_POLICY: &str = "1r";

/// Calendar interval used to pick one representative snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CalendarKind {
    Day,
    Week,
    Month,
    Year,
}

impl CalendarKind {
    pub const ALL: [Self; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    /// Policy letter for this kind.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Day => 'd',
            Self::Week => 'w',
            Self::Month => 'm',
            Self::Year => 'y',
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// One `<count><bucket>` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionRule {
    /// Keep the `n` most recently created snapshots.
    Recent(usize),
    /// Keep the newest snapshot in each of the `n` most recent buckets.
    Calendar(CalendarKind, usize),
}

impl RetentionRule {
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Recent(n) | Self::Calendar(_, n) => n,
        }
    }

    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Recent(_) => 'r',
            Self::Calendar(kind, _) => kind.letter(),
        }
    }

    fn from_token(count: usize, letter: char) -> Option<Self> {
        let rule = match letter {
            'r' => Self::Recent(count),
            'd' => Self::Calendar(CalendarKind::Day, count),
            'w' => Self::Calendar(CalendarKind::Week, count),
            'm' => Self::Calendar(CalendarKind::Month, count),
            'y' => Self::Calendar(CalendarKind::Year, count),
            _ => return None,
        };
        Some(rule)
    }
}

impl fmt::Display for RetentionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count(), self.letter())
    }
}

/// Parsed retention policy; rules keep their source order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetentionPolicy {
    rules: Vec<RetentionRule>,
}

impl RetentionPolicy {
    #[must_use]
    pub fn new(rules: Vec<RetentionRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[RetentionRule] {
        &self.rules
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(vec![RetentionRule::Recent(1)])
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            write!(f, "{rule}")?;
        }
        Ok(())
    }
}

impl FromStr for RetentionPolicy {
    type Err = TrawlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_policy(s)
    }
}

/// Parse a policy string into its rules.
///
/// # Errors
///
/// Returns [`TrawlerError::InvalidPolicy`] carrying the input when the
/// normalized string does not match the grammar or a count overflows.
pub fn parse_policy(raw: &str) -> Result<RetentionPolicy, TrawlerError> {
    let invalid = || TrawlerError::InvalidPolicy {
        policy: raw.to_string(),
    };

    let normalized = normalize(raw.trim());
    if !POLICY_RE.is_match(&normalized) {
        return Err(invalid());
    }

    let mut rules = Vec::new();
    for caps in TOKEN_RE.captures_iter(&normalized) {
        let count: usize = caps[1].parse().map_err(|_| invalid())?;
        let letter = caps[2].chars().next().ok_or_else(invalid)?;
        rules.push(RetentionRule::from_token(count, letter).ok_or_else(invalid)?);
    }

    tracing::debug!(policy = %normalized, rules = rules.len(), "parsed retention policy");
    Ok(RetentionPolicy::new(rules))
}

fn normalize(trimmed: &str) -> String {
    if trimmed.is_empty() {
        DEFAULT_POLICY.to_string()
    } else if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        format!("{trimmed}r")
    } else {
        trimmed.to_string()
    }
}
