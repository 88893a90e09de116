//! # Version Chain
//!
//! A researcher's resubmissions of the same title form a chain. Each new
//! member gets `max(existing) + 0.1`, or `1.0` for the first one. The
//! dashboard collapses every chain to its newest member.

use crate::types::Proposal;
use crate::{ActorId, Version};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Version to assign to the next proposal of a (researcher, title) chain.
#[must_use]
pub fn next_version<'a>(
    proposals: impl IntoIterator<Item = &'a Proposal>,
    researcher: ActorId,
    title: &str,
) -> Version {
    proposals
        .into_iter()
        .filter(|p| p.in_chain(researcher, title))
        .map(|p| p.version)
        .max()
        .map_or(Version::INITIAL, Version::next)
}

/// Members of a chain, oldest version first.
#[must_use]
pub fn chain<'a>(
    proposals: impl IntoIterator<Item = &'a Proposal>,
    researcher: ActorId,
    title: &str,
) -> Vec<&'a Proposal> {
    let mut members: Vec<_> = proposals
        .into_iter()
        .filter(|p| p.in_chain(researcher, title))
        .collect();
    members.sort_by_key(|p| (p.version, p.id));
    members
}

/// Highest-version proposal of each of a researcher's titles,
/// newest submission first.
///
/// Ties on submission date fall back to the higher proposal id.
#[must_use]
pub fn dashboard<'a>(
    proposals: impl IntoIterator<Item = &'a Proposal>,
    researcher: ActorId,
) -> Vec<&'a Proposal> {
    let mut latest: BTreeMap<&str, &Proposal> = BTreeMap::new();
    for p in proposals.into_iter().filter(|p| p.researcher == researcher) {
        latest
            .entry(p.title.as_str())
            .and_modify(|current| {
                if (p.version, p.id) > (current.version, current.id) {
                    *current = p;
                }
            })
            .or_insert(p);
    }
    let mut rows: Vec<_> = latest.into_values().collect();
    rows.sort_by_key(|p| Reverse((p.submitted_on, p.id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Amount, ProposalId, ProposalStatus};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn proposal(id: u64, researcher: u64, title: &str, tenths: u32, day: u32) -> Proposal {
        Proposal {
            id: ProposalId(id),
            researcher: ActorId(researcher),
            title: title.to_string(),
            requested: Amount::from_units(100),
            status: ProposalStatus::Pending,
            version: Version::from_tenths(tenths),
            submitted_on: NaiveDate::from_ymd_opt(2025, 1, day).unwrap_or_default(),
        }
    }

    #[test]
    fn first_submission_is_version_one() {
        let none: Vec<Proposal> = Vec::new();
        assert_eq!(next_version(&none, ActorId(1), "A"), Version::INITIAL);
    }

    #[test]
    fn next_version_follows_the_maximum() {
        let rows = vec![
            proposal(1, 1, "A", 10, 1),
            proposal(2, 1, "A", 12, 2),
            proposal(3, 1, "A", 11, 3),
        ];
        assert_eq!(next_version(&rows, ActorId(1), "A").to_string(), "1.3");
    }

    #[test]
    fn chains_are_scoped_by_researcher_and_title() {
        let rows = vec![proposal(1, 1, "A", 14, 1), proposal(2, 2, "A", 19, 1)];
        assert_eq!(next_version(&rows, ActorId(1), "B"), Version::INITIAL);
        assert_eq!(next_version(&rows, ActorId(2), "A").to_string(), "2.0");
    }

    #[test]
    fn dashboard_shows_latest_version_per_title() {
        let rows = vec![
            proposal(1, 1, "A", 10, 1),
            proposal(2, 1, "A", 11, 5),
            proposal(3, 1, "B", 10, 3),
            proposal(4, 2, "C", 10, 9),
        ];
        let view = dashboard(&rows, ActorId(1));
        let ids: Vec<_> = view.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn dashboard_orders_by_submission_date_descending() {
        let rows = vec![
            proposal(1, 1, "old", 10, 1),
            proposal(2, 1, "new", 10, 20),
            proposal(3, 1, "mid", 10, 10),
        ];
        let titles: Vec<_> = dashboard(&rows, ActorId(1))
            .iter()
            .map(|p| p.title.clone())
            .collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    proptest! {
        #[test]
        fn resubmissions_step_by_exactly_one_tenth(count in 1usize..60) {
            let mut rows: Vec<Proposal> = Vec::new();
            for i in 0..count {
                let v = next_version(&rows, ActorId(1), "chain");
                let mut p = proposal(i as u64, 1, "chain", 0, 1);
                p.version = v;
                rows.push(p);
            }
            for (i, p) in rows.iter().enumerate() {
                prop_assert_eq!(p.version.tenths(), 10 + i as u32);
            }
            let newest = dashboard(&rows, ActorId(1));
            prop_assert_eq!(newest.len(), 1);
            prop_assert_eq!(newest[0].version.tenths(), 9 + count as u32);
        }
    }
}
