//! Application matching strategies
//!
//! Matching is a pluggable seam: the generative matcher delegates semantic
//! judgment to a text-generation model, while [`NameSimilarityMatcher`] is
//! a deterministic alternative used in tests and selectable at startup.

use crate::error::{GatewayError, Result};
use crate::models::Application;
use async_trait::async_trait;

/// Picks the identifier of the roster entry best matching a free-text name
#[async_trait]
pub trait ApplicationMatcher: Send + Sync {
    async fn best_match(&self, name: &str, roster: &[Application]) -> Result<String>;
}

/// Deterministic matcher: exact name, then case-insensitive name, then the
/// highest normalized Levenshtein similarity.
pub struct NameSimilarityMatcher;

#[async_trait]
impl ApplicationMatcher for NameSimilarityMatcher {
    async fn best_match(&self, name: &str, roster: &[Application]) -> Result<String> {
        if let Some(app) = roster.iter().find(|app| app.name == name) {
            return Ok(app.id.to_string());
        }

        let lowered = name.to_lowercase();
        if let Some(app) = roster.iter().find(|app| app.name.to_lowercase() == lowered) {
            return Ok(app.id.to_string());
        }

        roster
            .iter()
            .map(|app| (similarity(&lowered, &app.name.to_lowercase()), app))
            .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, app)| app.id.to_string())
            .ok_or_else(|| GatewayError::Resolution("no applications available to match against".into()))
    }
}

/// Normalized Levenshtein similarity in [0, 1]
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Application> {
        vec![
            Application { name: "checkout-service".into(), id: 11 },
            Application { name: "Payment Service".into(), id: 22 },
            Application { name: "inventory-api".into(), id: 33 },
        ]
    }

    #[tokio::test]
    async fn test_exact_match_wins() {
        let matcher = NameSimilarityMatcher;
        let id = matcher.best_match("checkout-service", &roster()).await.unwrap();
        assert_eq!(id, "11");
    }

    #[tokio::test]
    async fn test_case_insensitive_match() {
        let matcher = NameSimilarityMatcher;
        let id = matcher.best_match("payment service", &roster()).await.unwrap();
        assert_eq!(id, "22");
    }

    #[tokio::test]
    async fn test_fuzzy_match_picks_closest() {
        let matcher = NameSimilarityMatcher;
        let id = matcher.best_match("inventory api", &roster()).await.unwrap();
        assert_eq!(id, "33");
    }

    #[tokio::test]
    async fn test_empty_roster_is_an_error() {
        let matcher = NameSimilarityMatcher;
        let err = matcher.best_match("anything", &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Resolution(_)));
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert!(similarity("abc", "xyz") < 0.01);
    }
}
