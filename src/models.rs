use std::fmt;

use serde::Deserialize;

/// One raw row of the JHU CSSE `cases.csv` table.
///
/// Only the columns the analyses use are mapped, the rest are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseRow {
    #[serde(rename = "Country_Region", deserialize_with = "csv::invalid_option")]
    pub country_region: Option<String>,
    #[serde(rename = "Lat", default, deserialize_with = "csv::invalid_option")]
    pub lat: Option<f64>,
    #[serde(rename = "Confirmed", default, deserialize_with = "csv::invalid_option")]
    pub confirmed: Option<f64>,
}

impl CaseRow {
    pub fn new(country: &str, confirmed: u64, lat: Option<f64>) -> Self {
        Self {
            country_region: Some(country.to_string()),
            lat,
            confirmed: Some(confirmed as f64),
        }
    }

    /// Country name with surrounding whitespace removed, `None` for blank cells.
    pub fn country(&self) -> Option<&str> {
        self.country_region
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Confirmed count, reading a missing or negative cell as zero.
    pub fn confirmed_count(&self) -> u64 {
        match self.confirmed {
            Some(value) if value.is_finite() && value > 0.0 => value.round() as u64,
            _ => 0,
        }
    }
}

/// Scalar attributes that can be attached to a country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Population,
    Temperature,
    Gdp,
    Latitude,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Population => "population",
            AttributeKind::Temperature => "temperature",
            AttributeKind::Gdp => "GDP",
            AttributeKind::Latitude => "latitude",
        };
        f.write_str(name)
    }
}

/// Joined per-country view: accumulated cases plus looked-up attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    pub name: String,
    pub cases: u64,
    /// Positive head count, `None` while unknown.
    pub population: Option<u64>,
    /// Projected average March temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Gross domestic product in current US dollars.
    pub gdp: Option<f64>,
    pub latitude: Option<f64>,
}

impl CountryRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: 0,
            population: None,
            temperature: None,
            gdp: None,
            latitude: None,
        }
    }

    /// Share of the population diagnosed, undefined without a population.
    pub fn density(&self) -> Option<f64> {
        match self.population {
            Some(pop) if pop > 0 => Some(self.cases as f64 / pop as f64),
            _ => None,
        }
    }

    pub fn gdp_per_capita(&self) -> Option<f64> {
        match (self.gdp, self.population) {
            (Some(gdp), Some(pop)) if pop > 0 => Some(gdp / pop as f64),
            _ => None,
        }
    }

    pub fn attribute(&self, kind: AttributeKind) -> Option<f64> {
        match kind {
            AttributeKind::Population => self.population.map(|pop| pop as f64),
            AttributeKind::Temperature => self.temperature,
            AttributeKind::Gdp => self.gdp,
            AttributeKind::Latitude => self.latitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_requires_population() {
        let mut record = CountryRecord::new("Chile");
        record.cases = 50;
        assert_eq!(record.density(), None);

        record.population = Some(0);
        assert_eq!(record.density(), None);

        record.population = Some(1000);
        assert_eq!(record.density(), Some(0.05));
    }

    #[test]
    fn test_gdp_per_capita() {
        let mut record = CountryRecord::new("Norway");
        record.gdp = Some(4.0e11);
        assert_eq!(record.gdp_per_capita(), None);

        record.population = Some(5_000_000);
        assert_eq!(record.gdp_per_capita(), Some(80_000.0));
    }

    #[test]
    fn test_case_row_cleanup() {
        let row = CaseRow {
            country_region: Some("  Italy ".to_string()),
            lat: None,
            confirmed: Some(-3.0),
        };
        assert_eq!(row.country(), Some("Italy"));
        assert_eq!(row.confirmed_count(), 0);

        let blank = CaseRow {
            country_region: Some("   ".to_string()),
            lat: None,
            confirmed: None,
        };
        assert_eq!(blank.country(), None);
        assert_eq!(blank.confirmed_count(), 0);
    }
}
