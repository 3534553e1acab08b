// src/pipeline/select.rs

//! Least-published-first poster selection.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::error::{AppError, Result};
use crate::models::Poster;

/// Eligible posters sharing the lowest `posted_count`.
pub fn least_posted<'a>(eligible: &[&'a Poster]) -> Vec<&'a Poster> {
    let Some(min) = eligible.iter().map(|p| p.posted_count).min() else {
        return Vec::new();
    };
    eligible
        .iter()
        .copied()
        .filter(|p| p.posted_count == min)
        .collect()
}

/// Picks uniformly among the least-published eligible posters, so no poster
/// is published twice more than another before the rest catch up.
#[derive(Debug, Clone)]
pub struct FairSelector<R = StdRng> {
    rng: R,
}

impl FairSelector<StdRng> {
    /// Selector seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for FairSelector<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> FairSelector<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn select<'a>(&mut self, eligible: &[&'a Poster]) -> Result<&'a Poster> {
        let candidates = least_posted(eligible);
        candidates
            .choose(&mut self.rng)
            .copied()
            .ok_or(AppError::NoEligibleRecords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Moderation;
    use std::collections::HashMap;

    fn eligible_poster(id: &str, posted_count: u32) -> Poster {
        let mut poster = Poster::new(id, id);
        poster.moderation = Moderation::Checked {
            safe: true,
            warning: None,
        };
        poster.posted_count = posted_count;
        poster
    }

    fn seeded() -> FairSelector<StdRng> {
        FairSelector::with_rng(StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_empty_is_no_eligible_records() {
        let err = seeded().select(&[]).unwrap_err();
        assert!(matches!(err, AppError::NoEligibleRecords));
    }

    #[test]
    fn test_least_posted_wins_without_tie() {
        let a = eligible_poster("a", 0);
        let b = eligible_poster("b", 1);
        let mut selector = seeded();

        for _ in 0..20 {
            assert_eq!(selector.select(&[&b, &a]).unwrap().id, "a");
        }
    }

    #[test]
    fn test_least_posted_candidates() {
        let posters = [
            eligible_poster("a", 2),
            eligible_poster("b", 1),
            eligible_poster("c", 1),
        ];
        let refs: Vec<&Poster> = posters.iter().collect();
        let ids: Vec<&str> = least_posted(&refs).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_skew_never_exceeds_one() {
        let mut posters: Vec<Poster> = (0..7).map(|i| eligible_poster(&format!("p{i}"), 0)).collect();
        let mut selector = seeded();

        for _ in 0..200 {
            let chosen = {
                let refs: Vec<&Poster> = posters.iter().collect();
                selector.select(&refs).unwrap().id.clone()
            };
            let poster = posters.iter_mut().find(|p| p.id == chosen).unwrap();
            poster.posted_count += 1;

            let min = posters.iter().map(|p| p.posted_count).min().unwrap();
            let max = posters.iter().map(|p| p.posted_count).max().unwrap();
            assert!(max - min <= 1, "skew {} after selecting {}", max - min, chosen);
        }
    }

    #[test]
    fn test_uneven_counts_catch_up_first() {
        let mut posters = vec![
            eligible_poster("old", 5),
            eligible_poster("new1", 0),
            eligible_poster("new2", 0),
        ];
        let mut selector = seeded();

        for _ in 0..10 {
            let chosen = {
                let refs: Vec<&Poster> = posters.iter().collect();
                selector.select(&refs).unwrap().id.clone()
            };
            assert_ne!(chosen, "old");
            posters.iter_mut().find(|p| p.id == chosen).unwrap().posted_count += 1;
        }
        assert_eq!(posters[1].posted_count, 5);
        assert_eq!(posters[2].posted_count, 5);
    }

    #[test]
    fn test_ties_are_spread_evenly() {
        let posters = [
            eligible_poster("a", 0),
            eligible_poster("b", 0),
            eligible_poster("c", 0),
        ];
        let refs: Vec<&Poster> = posters.iter().collect();
        let mut selector = seeded();
        let mut counts: HashMap<String, usize> = HashMap::new();

        for _ in 0..3000 {
            let chosen = selector.select(&refs).unwrap();
            *counts.entry(chosen.id.clone()).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        for (id, count) in counts {
            assert!((850..=1150).contains(&count), "{id} chosen {count} times");
        }
    }
}
