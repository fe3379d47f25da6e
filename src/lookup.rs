//! Per-country attribute providers.
//!
//! The online provider talks to the World Bank indicator and climate APIs;
//! the offline one reads a prepared CSV. Both report every miss as
//! [`Error::LookupFailure`] and never retry.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use csv::ReaderBuilder;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::iso::IsoResolver;
use crate::models::AttributeKind;

pub const DEFAULT_WORLD_BANK_URL: &str = "http://api.worldbank.org/v2";
pub const DEFAULT_CLIMATE_URL: &str = "http://climatedataapi.worldbank.org/climateweb/rest/v1";

const POPULATION_INDICATOR: &str = "SP.POP.TOTL";
const GDP_INDICATOR: &str = "NY.GDP.MKTP.CD";

/// Source of a single scalar attribute for a named country.
pub trait AttributeLookup {
    fn fetch_attribute(&self, country: &str, kind: AttributeKind) -> Result<f64>;
}

/// World Bank population/GDP indicators and projected March temperature.
pub struct WorldBankLookup {
    client: Client,
    resolver: IsoResolver,
    api_url: String,
    climate_url: String,
    year: u16,
}

impl WorldBankLookup {
    pub fn new(
        resolver: IsoResolver,
        api_url: impl Into<String>,
        climate_url: impl Into<String>,
        year: u16,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            resolver,
            api_url: api_url.into(),
            climate_url: climate_url.into(),
            year,
        })
    }

    fn get_text(&self, url: &str, country: &str, kind: AttributeKind) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::lookup(country, kind, e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::lookup(
                country,
                kind,
                format!("API request failed: {}", response.status()),
            ));
        }
        response
            .text()
            .map_err(|e| Error::lookup(country, kind, e.to_string()))
    }

    fn indicator(&self, country: &str, kind: AttributeKind, indicator: &str) -> Result<f64> {
        let iso = self.resolver.resolve(country, kind)?.to_lowercase();
        let url = format!(
            "{}/country/{}/indicator/{}?date={}&format=json",
            self.api_url, iso, indicator, self.year
        );
        let body = self.get_text(&url, country, kind)?;
        parse_indicator(&body).map_err(|reason| Error::lookup(country, kind, reason))
    }

    fn march_temperature(&self, country: &str) -> Result<f64> {
        let kind = AttributeKind::Temperature;
        let iso = self.resolver.resolve(country, kind)?.to_lowercase();
        let url = format!(
            "{}/country/mavg/tas/2020/2039/{}.CSV",
            self.climate_url, iso
        );
        let body = self.get_text(&url, country, kind)?;
        parse_march_temperature(body.as_bytes())
            .map_err(|reason| Error::lookup(country, kind, reason))
    }
}

impl AttributeLookup for WorldBankLookup {
    fn fetch_attribute(&self, country: &str, kind: AttributeKind) -> Result<f64> {
        match kind {
            AttributeKind::Population => self.indicator(country, kind, POPULATION_INDICATOR),
            AttributeKind::Gdp => self.indicator(country, kind, GDP_INDICATOR),
            AttributeKind::Temperature => self.march_temperature(country),
            AttributeKind::Latitude => Err(Error::lookup(
                country,
                kind,
                "latitude comes from the case table",
            )),
        }
    }
}

/// Extracts `[1][0].value` from a World Bank indicator response.
fn parse_indicator(body: &str) -> std::result::Result<f64, String> {
    let json: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if let Some(message) = json.get(0).and_then(|page| page.get("message")) {
        return Err(format!("API error: {}", message));
    }
    let value = json
        .get(1)
        .and_then(|rows| rows.get(0))
        .and_then(|row| row.get("value"))
        .ok_or_else(|| "unexpected response shape".to_string())?;
    value
        .as_f64()
        .ok_or_else(|| "indicator value is null".to_string())
}

/// Reads the `Mar` column of the second data row of a climate CSV.
fn parse_march_temperature<R: Read>(reader: R) -> std::result::Result<f64, String> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers().map_err(|e| e.to_string())?.clone();
    let column = headers
        .iter()
        .position(|h| h.trim() == "Mar")
        .ok_or_else(|| "no Mar column".to_string())?;

    let record = rdr
        .records()
        .nth(1)
        .ok_or_else(|| "fewer than two projection rows".to_string())?
        .map_err(|e| e.to_string())?;
    record
        .get(column)
        .and_then(|cell| cell.trim().parse::<f64>().ok())
        .ok_or_else(|| "Mar cell is not a number".to_string())
}

#[derive(Debug, Deserialize)]
struct AttributeRow {
    country: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    population: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    temperature: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    gdp: Option<f64>,
}

/// Offline table with columns `country,population,temperature,gdp`.
#[derive(Debug, Default)]
pub struct CsvAttributeLookup {
    rows: HashMap<String, AttributeRow>,
}

impl CsvAttributeLookup {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let mut rows = HashMap::new();
        for result in rdr.deserialize() {
            let row: AttributeRow = result?;
            rows.insert(row.country.trim().to_lowercase(), row);
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl AttributeLookup for CsvAttributeLookup {
    fn fetch_attribute(&self, country: &str, kind: AttributeKind) -> Result<f64> {
        let row = self
            .rows
            .get(&country.trim().to_lowercase())
            .ok_or_else(|| Error::lookup(country, kind, "country not in attribute table"))?;
        let value = match kind {
            AttributeKind::Population => row.population,
            AttributeKind::Temperature => row.temperature,
            AttributeKind::Gdp => row.gdp,
            AttributeKind::Latitude => None,
        };
        value.ok_or_else(|| Error::lookup(country, kind, "value missing in attribute table"))
    }
}
