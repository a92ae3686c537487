use indexmap::IndexMap;

use crate::models::{Company, ListingId, ListingRecord};

/// All listings visible during one polling cycle, keyed by identity.
///
/// Iteration follows insertion order, which is the order notifications
/// are sent in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: IndexMap<ListingId, ListingRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its computed identity. A later record with the
    /// same identity replaces the earlier one but keeps its position.
    pub fn insert(&mut self, record: ListingRecord) -> Option<ListingRecord> {
        self.entries.insert(record.id(), record)
    }

    /// Append every entry of `other`; `other` wins on identity collisions.
    pub fn merge(&mut self, other: Snapshot) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, id: &ListingId) -> Option<&ListingRecord> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ListingId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ListingId, &ListingRecord)> {
        self.entries.iter()
    }

    pub fn records(&self) -> impl Iterator<Item = &ListingRecord> {
        self.entries.values()
    }

    /// Entries belonging to one company, in order.
    pub fn for_company(&self, company: Company) -> Snapshot {
        self.entries
            .iter()
            .filter(|(_, r)| r.company == company)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl FromIterator<ListingRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = ListingRecord>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

impl FromIterator<(ListingId, ListingRecord)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (ListingId, ListingRecord)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Snapshot {
    type Item = (ListingId, ListingRecord);
    type IntoIter = indexmap::map::IntoIter<ListingId, ListingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Entries of `current` whose identity is absent from `previous`.
///
/// Only appearance is detected: a known identity with changed fields is not
/// reported, and identities missing from `current` are dropped silently.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Snapshot {
    current
        .iter()
        .filter(|(id, _)| !previous.contains(id))
        .map(|(id, record)| (id.clone(), record.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawListing;

    fn rec(company: Company, slug: &str, title: &str) -> ListingRecord {
        ListingRecord::from_raw(
            RawListing::new(title, "Remote", format!("https://discord.com/jobs/{slug}")),
            company,
            "2024-01-01 09:00:00 AM",
        )
    }

    fn snap(records: &[ListingRecord]) -> Snapshot {
        records.iter().cloned().collect()
    }

    #[test]
    fn test_diff_reports_only_new_identities() {
        let a = rec(Company::Discord, "1", "A");
        let b = rec(Company::Discord, "2", "B");
        let c = rec(Company::Discord, "3", "C");
        let prev = snap(&[a.clone(), b.clone()]);
        let curr = snap(&[a, b, c.clone()]);

        let delta = diff(&prev, &curr);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.get(&c.id()), Some(&c));
    }

    #[test]
    fn test_diff_of_identical_snapshots_is_empty() {
        let s = snap(&[rec(Company::Discord, "1", "A"), rec(Company::RiotGames, "1", "A")]);
        assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn test_diff_against_empty_is_everything() {
        let s = snap(&[rec(Company::Discord, "1", "A"), rec(Company::Discord, "2", "B")]);
        assert_eq!(diff(&Snapshot::new(), &s), s);
    }

    #[test]
    fn test_diff_ignores_field_changes_and_removals() {
        let old = rec(Company::Discord, "1", "Software Engineer");
        let renamed = rec(Company::Discord, "1", "Software Engineer II");
        let removed = rec(Company::Discord, "2", "Gone");
        let prev = snap(&[old, removed]);
        let curr = snap(&[renamed]);
        assert!(diff(&prev, &curr).is_empty());
    }

    #[test]
    fn test_diff_matches_set_definition() {
        let all: Vec<_> = (0..20)
            .map(|i| rec(Company::Discord, &i.to_string(), "T"))
            .collect();
        let prev = snap(&all[..12]);
        let curr = snap(&all[8..]);
        let delta = diff(&prev, &curr);

        let expected: Snapshot = curr
            .iter()
            .filter(|(k, _)| !prev.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert_eq!(delta, expected);
        assert_eq!(delta.len(), 8);
    }

    #[test]
    fn test_diff_preserves_current_order() {
        let prev = Snapshot::new();
        let curr = snap(&[
            rec(Company::RiotGames, "z", "Z"),
            rec(Company::Discord, "a", "A"),
            rec(Company::Discord, "m", "M"),
        ]);
        let titles: Vec<_> = diff(&prev, &curr).records().map(|r| r.title.clone()).collect();
        assert_eq!(titles, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_merge_later_entry_wins() {
        let mut first = snap(&[rec(Company::Discord, "1", "Old")]);
        first.merge(snap(&[rec(Company::Discord, "1", "New")]));
        assert_eq!(first.len(), 1);
        assert_eq!(first.records().next().unwrap().title, "New");
    }

    #[test]
    fn test_for_company_filters_entries() {
        let s = snap(&[
            rec(Company::Discord, "1", "A"),
            rec(Company::RiotGames, "1", "B"),
            rec(Company::Discord, "2", "C"),
        ]);
        assert_eq!(s.for_company(Company::Discord).len(), 2);
        assert_eq!(s.for_company(Company::Google).len(), 0);
    }
}
