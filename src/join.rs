use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::error::Error;
use crate::lookup::AttributeLookup;
use crate::models::{AttributeKind, CaseRow, CountryRecord};

/// Entities in the case table with no usable ISO3 code.
pub const BASE_DENYLIST: &[&str] = &[
    "Cruise Ship",
    "Holy See",
    "Kosovo",
    "Diamond Princess",
    "MS Zaandam",
];

/// Countries the World Bank indicator API rejects, on top of [`BASE_DENYLIST`].
pub const INDICATOR_DENYLIST: &[&str] = &["Taiwan*", "Eritrea", "Venezuela", "Syria"];

/// Fixed set of country names excluded from the join.
#[derive(Debug, Clone, Default)]
pub struct Denylist {
    names: HashSet<String>,
}

impl Denylist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|name| normalize(name.as_ref()).to_string())
                .collect(),
        }
    }

    pub fn base() -> Self {
        Self::new(BASE_DENYLIST)
    }

    pub fn indicators() -> Self {
        Self::new(BASE_DENYLIST.iter().chain(INDICATOR_DENYLIST))
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names
            .extend(names.into_iter().map(|name| normalize(name.as_ref()).to_string()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(normalize(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn normalize(name: &str) -> &str {
    name.trim()
}

/// Outcome of filling attributes from an external lookup.
#[derive(Debug, Default)]
pub struct JoinReport {
    /// Attribute values successfully stored.
    pub filled: usize,
    /// One entry per failed lookup, in the order they happened.
    pub failures: Vec<(String, Error)>,
}

impl JoinReport {
    pub fn failed_countries(&self) -> HashSet<&str> {
        self.failures.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Country-keyed accumulator for case counts and looked-up attributes.
///
/// Entries keep the order in which their country was first seen.
#[derive(Debug, Clone, Default)]
pub struct CountryJoinTable {
    entries: IndexMap<String, CountryRecord>,
    denylist: Denylist,
}

impl CountryJoinTable {
    pub fn new(denylist: Denylist) -> Self {
        Self {
            entries: IndexMap::new(),
            denylist,
        }
    }

    /// Builds a table from raw case rows, summing duplicate countries and
    /// keeping the first latitude seen for each one.
    pub fn from_cases<'a, I>(rows: I, denylist: Denylist) -> Self
    where
        I: IntoIterator<Item = &'a CaseRow>,
    {
        let mut table = Self::new(denylist);
        for row in rows {
            let Some(country) = row.country() else {
                continue;
            };
            if !table.upsert_cases(country, row.confirmed_count()) {
                continue;
            }
            if let Some(lat) = row.lat.filter(|lat| lat.is_finite()) {
                let seen = table
                    .entries
                    .get(country)
                    .and_then(|record| record.latitude)
                    .is_some();
                if !seen {
                    table.set_attribute(country, AttributeKind::Latitude, lat);
                }
            }
        }
        table
    }

    /// Adds `count` to the running total for `name`. Returns `false` when
    /// the name is denylisted and nothing was recorded. Totals saturate at
    /// `u64::MAX`.
    pub fn upsert_cases(&mut self, name: &str, count: u64) -> bool {
        match self.entry(name) {
            Some(record) => {
                record.cases = record.cases.checked_add(count).unwrap_or_else(|| {
                    warn!("Case total for {} overflows, capping at {}", record.name, u64::MAX);
                    u64::MAX
                });
                true
            }
            None => false,
        }
    }

    /// Stores a scalar attribute for `name`. Returns `false` when the name is
    /// denylisted or the value is rejected (non-finite, population below one,
    /// negative GDP); a rejected value leaves any earlier one in place.
    pub fn set_attribute(&mut self, name: &str, kind: AttributeKind, value: f64) -> bool {
        match self.entry(name) {
            Some(record) => apply(record, kind, value),
            None => false,
        }
    }

    /// Looks up every requested attribute for every country. Failures are
    /// collected, not fatal: the affected field simply stays unknown.
    pub fn fill_attributes(
        &mut self,
        lookup: &dyn AttributeLookup,
        kinds: &[AttributeKind],
    ) -> JoinReport {
        let mut report = JoinReport::default();
        let total = self.entries.len();
        info!("Looking up {} attribute(s) for {} countries", kinds.len(), total);

        for (index, record) in self.entries.values_mut().enumerate() {
            for &kind in kinds {
                match lookup.fetch_attribute(&record.name, kind) {
                    Ok(value) if apply(record, kind, value) => {
                        debug!("{} {} = {}", record.name, kind, value);
                        report.filled += 1;
                    }
                    Ok(value) => {
                        warn!("Ignoring {} {} = {}", record.name, kind, value);
                    }
                    Err(err) => {
                        warn!("{}", err);
                        report.failures.push((record.name.clone(), err));
                    }
                }
            }
            debug!("{:<35} ({}/{})", record.name, index + 1, total);
        }

        info!(
            "Filled {} value(s), {} lookup failure(s)",
            report.filled,
            report.failures.len()
        );
        report
    }

    pub fn get(&self, name: &str) -> Option<&CountryRecord> {
        self.entries.get(normalize(name))
    }

    /// Restartable view of the joined records in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &CountryRecord> + Clone + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    fn entry(&mut self, name: &str) -> Option<&mut CountryRecord> {
        let name = normalize(name);
        if name.is_empty() || self.denylist.contains(name) {
            return None;
        }
        Some(
            self.entries
                .entry(name.to_string())
                .or_insert_with(|| CountryRecord::new(name)),
        )
    }
}

fn apply(record: &mut CountryRecord, kind: AttributeKind, value: f64) -> bool {
    if !value.is_finite() {
        return false;
    }
    match kind {
        AttributeKind::Population if value >= 1.0 => {
            record.population = Some(value.round() as u64)
        }
        AttributeKind::Temperature => record.temperature = Some(value),
        AttributeKind::Gdp if value >= 0.0 => record.gdp = Some(value),
        AttributeKind::Latitude => record.latitude = Some(value),
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::collections::HashMap;

    struct FixedLookup(HashMap<(&'static str, AttributeKind), f64>);

    impl AttributeLookup for FixedLookup {
        fn fetch_attribute(&self, country: &str, kind: AttributeKind) -> Result<f64> {
            self.0
                .iter()
                .find(|((name, k), _)| *name == country && *k == kind)
                .map(|(_, value)| *value)
                .ok_or_else(|| Error::lookup(country, kind, "no ISO3 code"))
        }
    }

    #[test]
    fn test_upsert_accumulates_regardless_of_order() {
        let counts = [("France", 10), ("Spain", 3), ("France", 7), ("France", 1)];

        let mut forward = CountryJoinTable::new(Denylist::default());
        for (name, count) in counts {
            forward.upsert_cases(name, count);
        }
        let mut backward = CountryJoinTable::new(Denylist::default());
        for (name, count) in counts.iter().rev() {
            backward.upsert_cases(name, *count);
        }

        assert_eq!(forward.get("France").unwrap().cases, 18);
        assert_eq!(backward.get("France").unwrap().cases, 18);
        assert_eq!(forward.get("Spain").unwrap().cases, 3);
        assert_eq!(forward.len(), 2);
    }

    #[test]
    fn test_denylist_skips_cases_and_attributes() {
        let mut table = CountryJoinTable::new(Denylist::base());
        assert!(!table.upsert_cases("Diamond Princess", 700));
        assert!(!table.set_attribute("Holy See", AttributeKind::Population, 800.0));
        assert!(table.upsert_cases("Peru", 5));

        let names: Vec<&str> = table.rows().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Peru"]);
    }

    #[test]
    fn test_rows_keep_insertion_order_and_restart() {
        let mut table = CountryJoinTable::new(Denylist::default());
        table.upsert_cases("Zambia", 1);
        table.set_attribute("Albania", AttributeKind::Gdp, 1.5e10);
        table.upsert_cases("Mexico", 2);

        let rows = table.rows();
        let first: Vec<_> = rows.clone().map(|r| r.name.clone()).collect();
        let second: Vec<_> = rows.map(|r| r.name.clone()).collect();
        assert_eq!(first, vec!["Zambia", "Albania", "Mexico"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_cases_merges_rows() {
        let rows = vec![
            CaseRow::new("Canada", 100, Some(53.9)),
            CaseRow::new("Canada", 20, Some(45.0)),
            CaseRow::new("Kosovo", 9, Some(42.6)),
            CaseRow::new(" Chad ", 4, None),
        ];
        let table = CountryJoinTable::from_cases(&rows, Denylist::base());

        assert_eq!(table.len(), 2);
        let canada = table.get("Canada").unwrap();
        assert_eq!(canada.cases, 120);
        assert_eq!(canada.latitude, Some(53.9));
        assert_eq!(table.get("Chad").unwrap().latitude, None);
        assert!(table.get("Kosovo").is_none());
    }

    #[test]
    fn test_invalid_population_stays_unknown() {
        let mut table = CountryJoinTable::new(Denylist::default());
        assert!(!table.set_attribute("Nauru", AttributeKind::Population, 0.0));
        assert_eq!(table.get("Nauru").unwrap().population, None);
        assert!(!table.set_attribute("Nauru", AttributeKind::Population, f64::NAN));
        assert_eq!(table.get("Nauru").unwrap().population, None);
        assert!(table.set_attribute("Nauru", AttributeKind::Population, 12_580.0));
        assert_eq!(table.get("Nauru").unwrap().population, Some(12_580));
    }

    #[test]
    fn test_rejected_value_keeps_earlier_one() {
        let mut table = CountryJoinTable::new(Denylist::default());
        table.set_attribute("Chile", AttributeKind::Population, 18_200_000.0);
        table.set_attribute("Chile", AttributeKind::Gdp, 2.5e11);

        assert!(!table.set_attribute("Chile", AttributeKind::Population, f64::NAN));
        assert!(!table.set_attribute("Chile", AttributeKind::Gdp, -1.0));

        let chile = table.get("Chile").unwrap();
        assert_eq!(chile.population, Some(18_200_000));
        assert_eq!(chile.gdp, Some(2.5e11));
    }

    #[test]
    fn test_case_total_saturates_instead_of_overflowing() {
        let huge = CaseRow {
            confirmed: Some(1e20),
            ..CaseRow::new("Utopia", 0, None)
        };
        let mut table = CountryJoinTable::new(Denylist::default());
        assert!(table.upsert_cases("Utopia", huge.confirmed_count()));
        assert!(table.upsert_cases("Utopia", 5));

        assert_eq!(table.get("Utopia").unwrap().cases, u64::MAX);
    }

    #[test]
    fn test_fill_attributes_reports_failures() {
        let mut table = CountryJoinTable::new(Denylist::default());
        table.upsert_cases("Japan", 10);
        table.upsert_cases("Atlantis", 1);

        let lookup = FixedLookup(HashMap::from([
            (("Japan", AttributeKind::Population), 1.26e8),
            (("Japan", AttributeKind::Temperature), 8.5),
        ]));
        let report = table.fill_attributes(
            &lookup,
            &[AttributeKind::Population, AttributeKind::Temperature],
        );

        assert_eq!(report.filled, 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failed_countries().contains("Atlantis"));
        assert!(matches!(
            report.failures[0].1,
            Error::LookupFailure { kind: AttributeKind::Population, .. }
        ));

        let japan = table.get("Japan").unwrap();
        assert_eq!(japan.population, Some(126_000_000));
        assert_eq!(japan.temperature, Some(8.5));
        assert_eq!(table.get("Atlantis").unwrap().population, None);
    }
}
