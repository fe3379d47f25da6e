use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use csv::ReaderBuilder;
use log::info;
use reqwest::blocking::Client;

use crate::error::Result;
use crate::models::CaseRow;

/// Daily snapshot of confirmed cases published by JHU CSSE.
pub const DEFAULT_CASES_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/web-data/data/cases.csv";

/// Provider of raw per-region case rows. Country names may repeat.
pub trait CaseSource {
    fn fetch_cases(&self) -> Result<Vec<CaseRow>>;
}

#[derive(Debug, Clone)]
enum Location {
    Path(PathBuf),
    Url { url: String, timeout: Duration },
}

/// Reads the JHU `cases.csv` layout from disk or over HTTP.
#[derive(Debug, Clone)]
pub struct CsvCaseSource {
    location: Location,
}

impl CsvCaseSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::Path(path.into()),
        }
    }

    pub fn from_url(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            location: Location::Url {
                url: url.into(),
                timeout,
            },
        }
    }

    /// Treats anything starting with `http://` or `https://` as a URL.
    pub fn from_location(location: &str, timeout: Duration) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::from_url(location, timeout)
        } else {
            Self::from_path(location)
        }
    }
}

impl CaseSource for CsvCaseSource {
    fn fetch_cases(&self) -> Result<Vec<CaseRow>> {
        match &self.location {
            Location::Path(path) => {
                info!("Reading COVID-19 cases from {}", path.display());
                read_cases(std::fs::File::open(path)?)
            }
            Location::Url { url, timeout } => {
                info!("Pulling COVID-19 data from {}", url);
                let client = Client::builder().timeout(*timeout).build()?;
                let body = client.get(url).send()?.error_for_status()?.bytes()?;
                read_cases(body.as_ref())
            }
        }
    }
}

/// Parses case rows, dropping rows with a blank country.
pub fn read_cases<R: Read>(reader: R) -> Result<Vec<CaseRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: CaseRow = result?;
        if row.country().is_some() {
            rows.push(row);
        }
    }

    info!("COVID-19 data retrieved: {} rows", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
Province_State,Country_Region,Last_Update,Lat,Long_,Confirmed,Deaths
Hubei,China,2020-03-30 22:52:45,30.9756,112.2707,67801,3186
Beijing,China,2020-03-30 22:52:45,40.1824,116.4142,580,8
,Italy,2020-03-30 22:52:45,41.8719,12.5674,101739,11591
,,2020-03-30 22:52:45,,,12,0
,Diamond Princess,2020-03-30 22:52:45,,,712,10
,Chad,2020-03-30 22:52:45,15.4542,18.7322,,0
";

    #[test]
    fn test_read_cases_parses_rows() {
        let rows = read_cases(SAMPLE.as_bytes()).unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].country(), Some("China"));
        assert_eq!(rows[0].confirmed_count(), 67801);
        assert_eq!(rows[2].lat, Some(41.8719));
        assert_eq!(rows[3].lat, None);
        assert_eq!(rows[4].confirmed_count(), 0);
    }

    #[test]
    fn test_csv_source_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let location = file.path().to_str().unwrap().to_string();
        let source = CsvCaseSource::from_location(&location, Duration::from_secs(1));
        let rows = source.fetch_cases().unwrap();

        let total: u64 = rows.iter().map(CaseRow::confirmed_count).sum();
        assert_eq!(total, 67801 + 580 + 101739 + 712);
    }
}
