use serde::Serialize;

const MIN_NAME_CHARS: usize = 2;

/// Something free text can be resolved to: a roster player or a tag.
#[derive(Debug, Clone)]
pub struct Candidate<K> {
    pub key: K,
    pub names: Vec<String>,
}

impl<K> Candidate<K> {
    pub fn new(key: K, primary: &str, aliases: &[String]) -> Self {
        let mut names = Vec::with_capacity(aliases.len() + 1);
        names.push(primary.to_string());
        names.extend(aliases.iter().cloned());
        Self { key, names }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Contains,
    Exact,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome<K> {
    Matched { key: K, kind: MatchKind },
    Ambiguous(Vec<K>),
    Unmatched,
}

impl<K> MatchOutcome<K> {
    pub fn matched(self) -> Option<K> {
        match self {
            MatchOutcome::Matched { key, .. } => Some(key),
            _ => None,
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn score(extracted: &str, known: &str) -> Option<(MatchKind, usize)> {
    let known = normalize(known);
    if known.chars().count() < MIN_NAME_CHARS {
        return None;
    }

    if extracted == known {
        return Some((MatchKind::Exact, known.len()));
    }

    // "Jordan" against "Jordan Smith", or "Coach said Jordan Smith" against "Jordan Smith"
    if known.contains(extracted) || extracted.contains(&known) {
        let overlap = known.len().min(extracted.len());
        return Some((MatchKind::Contains, overlap));
    }

    None
}

/// Resolves one extracted name against the candidates.
///
/// Exact (case-insensitive) matches beat containment; among containment
/// matches the longest overlap wins. Equal best scores on different
/// candidates are reported as ambiguous rather than guessed.
pub fn best_match<K: Clone + PartialEq>(
    extracted: &str,
    candidates: &[Candidate<K>],
) -> MatchOutcome<K> {
    let extracted = normalize(extracted);
    if extracted.chars().count() < MIN_NAME_CHARS {
        return MatchOutcome::Unmatched;
    }

    let mut best: Option<(MatchKind, usize)> = None;
    let mut winners: Vec<K> = Vec::new();

    for candidate in candidates {
        let candidate_score = candidate
            .names
            .iter()
            .filter_map(|name| score(&extracted, name))
            .max();

        let Some(candidate_score) = candidate_score else {
            continue;
        };

        match best {
            Some(current) if candidate_score < current => {}
            Some(current) if candidate_score == current => {
                if !winners.contains(&candidate.key) {
                    winners.push(candidate.key.clone());
                }
            }
            _ => {
                best = Some(candidate_score);
                winners = vec![candidate.key.clone()];
            }
        }
    }

    match (best, winners.len()) {
        (Some((kind, _)), 1) => MatchOutcome::Matched {
            key: winners.remove(0),
            kind,
        },
        (Some(_), _) => MatchOutcome::Ambiguous(winners),
        (None, _) => MatchOutcome::Unmatched,
    }
}

#[derive(Debug, Clone)]
pub struct Resolution<K> {
    pub matched: Vec<(String, K)>,
    pub unmatched: Vec<String>,
}

/// Resolves every name; ambiguous and unknown names both land in `unmatched`.
/// Duplicate hits on the same candidate keep only the first extracted name.
pub fn resolve_all<K: Clone + PartialEq>(
    names: &[String],
    candidates: &[Candidate<K>],
) -> Resolution<K> {
    let mut matched: Vec<(String, K)> = Vec::new();
    let mut unmatched = Vec::new();

    for name in names {
        match best_match(name, candidates) {
            MatchOutcome::Matched { key, .. } => {
                if !matched.iter().any(|(_, existing)| *existing == key) {
                    matched.push((name.clone(), key));
                }
            }
            MatchOutcome::Ambiguous(_) | MatchOutcome::Unmatched => {
                let trimmed = name.trim();
                if !trimmed.is_empty() && !unmatched.iter().any(|u: &String| u == trimmed) {
                    unmatched.push(trimmed.to_string());
                }
            }
        }
    }

    Resolution { matched, unmatched }
}
