//! Retention masking: which recorded observations stay visible.
//!
//! Observations sharing a retention kind are masked as a group. With
//! `dedupe`, a run of identical observations collapses to its latest
//! member; with `limit`, only the last N survive. Dedupe runs before the
//! limit. Observations without retention are always visible.

use std::collections::HashMap;
use webpilot_core::{Observation, Retention};

/// Visibility flag per observation, aligned with the input slice.
pub fn mask_observations(observations: &[&Observation]) -> Vec<bool> {
    let mut mask = vec![true; observations.len()];

    // kind -> (options of its first member, member indices)
    let mut groups: HashMap<&str, (&Retention, Vec<usize>)> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for (index, obs) in observations.iter().enumerate() {
        let Some(retention) = &obs.retention else {
            continue;
        };
        let group = groups.entry(retention.kind.as_str()).or_insert_with(|| {
            order.push(retention.kind.as_str());
            (retention, Vec::new())
        });
        group.1.push(index);
    }

    for kind in order {
        let (retention, indices) = &groups[kind];
        let mut visible = indices.clone();

        if retention.dedupe && visible.len() > 1 {
            let mut kept: Vec<usize> = Vec::with_capacity(visible.len());
            for &index in indices.iter().rev() {
                match kept.last() {
                    Some(&later) if observations[index].same_content(observations[later]) => {}
                    _ => kept.push(index),
                }
            }
            kept.reverse();
            visible = kept;
        }

        if let Some(limit) = retention.limit {
            let skip = visible.len().saturating_sub(limit);
            visible.drain(..skip);
        }

        for &index in indices {
            if !visible.contains(&index) {
                mask[index] = false;
            }
        }
    }

    mask
}

/// Indices of the last `limit` items matching `pred`; everything else is hidden.
pub(crate) fn keep_last<T>(items: &[T], limit: usize, pred: impl Fn(&T) -> bool) -> Vec<bool> {
    let total = items.iter().filter(|item| pred(item)).count();
    let mut to_hide = total.saturating_sub(limit);
    items
        .iter()
        .map(|item| {
            if to_hide > 0 && pred(item) {
                to_hide -= 1;
                false
            } else {
                true
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screenshot(label: &str) -> Observation {
        Observation::text("desktop", label)
            .with_retention(Retention::kind("desktop.screenshot").limit(2).dedupe())
    }

    fn windows(label: &str) -> Observation {
        Observation::text("desktop", label)
            .with_retention(Retention::kind("desktop.windows").limit(1))
    }

    fn visible(observations: &[Observation]) -> Vec<bool> {
        let refs: Vec<&Observation> = observations.iter().collect();
        mask_observations(&refs)
    }

    #[test]
    fn dedupe_keeps_latest_of_identical_run() {
        let obs = vec![screenshot("A"), screenshot("A"), screenshot("B")];
        assert_eq!(visible(&obs), vec![false, true, true]);
    }

    #[test]
    fn dedupe_only_collapses_adjacent_members() {
        let tagged = |label: &str| {
            Observation::text("desktop", label)
                .with_retention(Retention::kind("desktop.screenshot").dedupe())
        };
        let obs = vec![tagged("Clicked"), tagged("Typed"), tagged("Clicked")];
        assert_eq!(visible(&obs), vec![true, true, true]);
    }

    #[test]
    fn limit_keeps_last_n_per_kind() {
        let obs = vec![
            screenshot("A"),
            windows("w1"),
            screenshot("B"),
            windows("w2"),
            screenshot("C"),
        ];
        assert_eq!(visible(&obs), vec![false, false, true, true, true]);
    }

    #[test]
    fn untagged_observations_always_visible() {
        let obs = vec![Observation::text("web", "x"), Observation::text("web", "x")];
        assert_eq!(visible(&obs), vec![true, true]);
    }

    #[test]
    fn zero_limit_hides_everything_of_that_kind() {
        let obs =
            vec![Observation::text("web", "x").with_retention(Retention::kind("noise").limit(0))];
        assert_eq!(visible(&obs), vec![false]);
    }

    #[test]
    fn keep_last_hides_oldest_matches() {
        let items = [1, 2, 3, 4, 5, 6];
        let mask = keep_last(&items, 2, |n| n % 2 == 0);
        assert_eq!(mask, vec![true, false, true, true, true, true]);
    }
}
