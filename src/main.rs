use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use covid_climate::iso::IsoResolver;
use covid_climate::pipeline::{format_ranking, Pipeline};
use covid_climate::{
    AttributeLookup, Config, CsvAttributeLookup, CsvCaseSource, PngChartExporter, WorldBankLookup,
};

#[derive(Parser, Debug)]
#[command(name = "covid_climate", about = "COVID-19 cases against climate and wealth indicators")]
struct Cli {
    /// TOML file overriding data sources, denylist and ISO3 codes
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Case table path or URL (defaults to the JHU CSSE snapshot)
    #[arg(long, global = true)]
    cases: Option<String>,

    /// Offline `country,population,temperature,gdp` table instead of the World Bank APIs
    #[arg(long, global = true)]
    attributes: Option<PathBuf>,

    /// Output PNG file
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Confirmed cases per five-degree band of March temperature
    Temperature,
    /// Share of population diagnosed per temperature band
    TemperatureDensity {
        #[arg(long, default_value_t = 5)]
        width: i64,
    },
    /// Confirmed cases per degree of distance from the equator
    Latitude,
    /// Case density against GDP per capita, with its least-squares line
    Gdp,
}

impl Command {
    fn default_output(&self) -> &'static str {
        match self {
            Command::Temperature => "covid_temperature.png",
            Command::TemperatureDensity { .. } => "covid_temperature_density.png",
            Command::Latitude => "covid_latitude.png",
            Command::Gdp => "covid_gdp.png",
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::default(),
    };

    let case_location = cli.cases.clone().unwrap_or_else(|| config.cases_url.clone());
    let cases = CsvCaseSource::from_location(&case_location, config.timeout());

    let lookup: Box<dyn AttributeLookup> = match &cli.attributes {
        Some(path) => Box::new(
            CsvAttributeLookup::from_path(path)
                .with_context(|| format!("reading attributes {}", path.display()))?,
        ),
        None => Box::new(WorldBankLookup::new(
            IsoResolver::new().with_overrides(&config.iso_overrides),
            config.world_bank_url.clone(),
            config.climate_url.clone(),
            config.indicator_year,
            config.timeout(),
        )?),
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(cli.command.default_output()));
    let exporter = PngChartExporter::new(&output);

    let pipeline = Pipeline {
        cases: &cases,
        lookup: lookup.as_ref(),
        exporter: &exporter,
        extra_denylist: config.denylist.clone(),
    };

    match cli.command {
        Command::Temperature => {
            let report = pipeline.temperature_cases()?;
            println!(
                "{} countries, {} cases bucketed, {} without temperature",
                report.countries,
                report.aggregation.total_numerator(),
                report.aggregation.skipped
            );
        }
        Command::TemperatureDensity { width } => {
            let report = pipeline.temperature_density(width)?;
            for (start, density) in report.aggregation.densities() {
                match density {
                    Some(d) => println!("{:>4}: {:.6e}", start, d),
                    None => println!("{:>4}: no data", start),
                }
            }
        }
        Command::Latitude => {
            let aggregation = pipeline.latitude()?;
            println!(
                "{} cases bucketed, {} rows without latitude",
                aggregation.total_numerator(),
                aggregation.skipped
            );
        }
        Command::Gdp => {
            let report = pipeline
                .gdp()
                .context("fitting density against GDP per capita")?;
            println!(
                "Least Squares Regression Line: Proportion of population diagnosed with COVID-19 \
                 = {:e}(GDP per capita) + {:e}",
                report.fit.slope,
                report.fit.intercept
            );
            if let Some(r2) = report.r_squared {
                println!("R-squared: {:.4}", r2);
            }
            println!("{} countries fitted, {} skipped", report.samples.len(), report.skipped);
            println!("Top countries by density:\n{}", format_ranking(&report.top_density));
        }
    }

    info!("Done");
    Ok(())
}
