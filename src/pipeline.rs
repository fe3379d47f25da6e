//! The four analyses: cases by temperature, case density by temperature,
//! cases by latitude, and case density against GDP per capita.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use itertools::Itertools;
use log::{debug, info, warn};
use ordered_float::NotNan;

use crate::buckets::{Aggregation, BucketAggregator, BucketDomain, BucketSample};
use crate::cases::CaseSource;
use crate::chart::{BucketMetric, BucketStyle, ChartExporter, ChartLabels};
use crate::error::Result;
use crate::join::{CountryJoinTable, Denylist, JoinReport};
use crate::lookup::AttributeLookup;
use crate::models::{AttributeKind, CaseRow, CountryRecord};
use crate::regression::{RegressionEngine, RegressionResult};

const TEMPERATURE_DESC: &str = "Average March temperature (in degrees Celsius)";
const DENSITY_DESC: &str = "Proportion of population diagnosed with coronavirus";

/// Collaborators shared by every analysis.
pub struct Pipeline<'a> {
    pub cases: &'a dyn CaseSource,
    pub lookup: &'a dyn AttributeLookup,
    pub exporter: &'a dyn ChartExporter,
    /// Names added to the built-in denylists.
    pub extra_denylist: Vec<String>,
}

/// Result of a bucketed analysis.
#[derive(Debug)]
pub struct BucketReport {
    pub aggregation: Aggregation,
    pub countries: usize,
    pub join: JoinReport,
}

/// Result of the GDP regression.
#[derive(Debug)]
pub struct GdpReport {
    pub fit: RegressionResult,
    pub r_squared: Option<f64>,
    pub samples: Vec<(f64, f64)>,
    /// Countries without both population and GDP.
    pub skipped: usize,
    pub top_density: Vec<(String, f64)>,
    pub join: JoinReport,
}

impl<'a> Pipeline<'a> {
    fn denylist(&self, mut base: Denylist) -> Denylist {
        base.extend(&self.extra_denylist);
        base
    }

    fn join(
        &self,
        denylist: Denylist,
        kinds: &[AttributeKind],
    ) -> Result<(CountryJoinTable, JoinReport)> {
        let rows = self.cases.fetch_cases()?;
        let mut table = CountryJoinTable::from_cases(&rows, denylist);
        info!("Joined {} case rows into {} countries", rows.len(), table.len());
        let report = table.fill_attributes(self.lookup, kinds);
        Ok((table, report))
    }

    /// Confirmed cases summed per five-degree band of March temperature.
    pub fn temperature_cases(&self) -> Result<BucketReport> {
        let denylist = self.denylist(Denylist::base());
        let (table, join) = self.join(denylist, &[AttributeKind::Temperature])?;

        let aggregator = BucketAggregator::new(BucketDomain::temperature(), |r: &CountryRecord| {
            r.temperature
                .map(|t| BucketSample::new(t, r.cases as f64, 0.0))
        });
        let aggregation = aggregator.aggregate(table.rows());
        log_skipped(&aggregation);

        self.exporter.render_buckets(
            &ChartLabels::new("COVID-19 cases by temperature", TEMPERATURE_DESC, "Confirmed cases"),
            &aggregation,
            aggregator.domain().width(),
            BucketMetric::Numerator,
            BucketStyle::Bars,
        )?;

        Ok(BucketReport {
            aggregation,
            countries: table.len(),
            join,
        })
    }

    /// Share of population diagnosed per temperature band of `width` degrees.
    pub fn temperature_density(&self, width: i64) -> Result<BucketReport> {
        let domain = BucketDomain::new(-30, 30, width)?;
        let denylist = self.denylist(Denylist::base());
        let (table, join) = self.join(
            denylist,
            &[AttributeKind::Temperature, AttributeKind::Population],
        )?;

        let aggregator = BucketAggregator::new(domain, |r: &CountryRecord| {
            match (r.temperature, r.population) {
                (Some(t), Some(pop)) => Some(BucketSample::new(t, r.cases as f64, pop as f64)),
                _ => None,
            }
        });
        let aggregation = aggregator.aggregate(table.rows());
        log_skipped(&aggregation);
        for (start, density) in aggregation.densities() {
            match density {
                Some(d) => debug!("{:>4}: {:.3e}", start, d),
                None => debug!("{:>4}: no data", start),
            }
        }

        let style = if width > 1 {
            BucketStyle::Bars
        } else {
            BucketStyle::Points
        };
        self.exporter.render_buckets(
            &ChartLabels::new("COVID-19 density by temperature", TEMPERATURE_DESC, DENSITY_DESC),
            &aggregation,
            width,
            BucketMetric::Density,
            style,
        )?;

        Ok(BucketReport {
            aggregation,
            countries: table.len(),
            join,
        })
    }

    /// Confirmed cases per whole degree of distance from the equator,
    /// counted over individual case rows.
    pub fn latitude(&self) -> Result<Aggregation> {
        let rows = self.cases.fetch_cases()?;
        let denylist = self.denylist(Denylist::base());
        let kept: Vec<&CaseRow> = rows
            .iter()
            .filter(|row| row.country().is_some_and(|name| !denylist.contains(name)))
            .collect();

        let aggregator = BucketAggregator::new(BucketDomain::latitude(), |row: &&CaseRow| {
            row.lat
                .map(|lat| BucketSample::new(lat.abs(), row.confirmed_count() as f64, 0.0))
        });
        let aggregation = aggregator.aggregate(&kept);
        log_skipped(&aggregation);

        self.exporter.render_buckets(
            &ChartLabels::new(
                "COVID-19 cases by distance from the equator",
                "Distance from the equator (degrees latitude)",
                "Confirmed cases",
            ),
            &aggregation,
            1,
            BucketMetric::Numerator,
            BucketStyle::Points,
        )?;
        Ok(aggregation)
    }

    /// Least-squares line of case density against GDP per capita.
    pub fn gdp(&self) -> Result<GdpReport> {
        let denylist = self.denylist(Denylist::indicators());
        let (table, join) = self.join(denylist, &[AttributeKind::Population, AttributeKind::Gdp])?;

        let samples: Vec<(f64, f64)> = table
            .rows()
            .filter_map(|r| Some((r.gdp_per_capita()?, r.density()?)))
            .collect();
        let skipped = table.len() - samples.len();
        if skipped > 0 {
            warn!("{} countries lack population or GDP and were left out", skipped);
        }

        let engine = RegressionEngine::new();
        let fit = engine.fit(&samples)?;
        if let Ok(analytic) = engine.fit_closed_form(&samples) {
            debug!(
                "Closed form: slope {:e} (delta {:e}), intercept {:e} (delta {:e})",
                analytic.slope,
                analytic.slope - fit.slope,
                analytic.intercept,
                analytic.intercept - fit.intercept
            );
        }
        let r_squared = fit.r_squared(&samples);
        let top_density = top_countries(table.rows(), 5);

        self.exporter.render_regression(
            &ChartLabels::new("GDP per Capita vs. COVID-19", "GDP per Capita", DENSITY_DESC),
            &samples,
            Some(&fit),
        )?;

        Ok(GdpReport {
            fit,
            r_squared,
            samples,
            skipped,
            top_density,
            join,
        })
    }
}

fn log_skipped(aggregation: &Aggregation) {
    if aggregation.skipped > 0 {
        warn!(
            "{} record(s) had no value to bucket and were skipped",
            aggregation.skipped
        );
    }
}

/// The `n` countries with the highest case density, highest first.
pub fn top_countries<'a, I>(records: I, n: usize) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = &'a CountryRecord>,
{
    let mut heap = BinaryHeap::new();
    for record in records {
        let Some(density) = record.density().and_then(|d| NotNan::new(d).ok()) else {
            continue;
        };
        heap.push(Reverse((density, record.name.clone())));
        if heap.len() > n {
            heap.pop();
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse((density, name))| (name, density.into_inner()))
        .collect()
}

/// One line per country, `name: value`, for printing.
pub fn format_ranking(ranking: &[(String, f64)]) -> String {
    ranking
        .iter()
        .map(|(name, density)| format!("{}: {:.6}", name, density))
        .join("\n")
}
