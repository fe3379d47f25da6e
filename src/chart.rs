use std::path::PathBuf;

use log::info;
use plotters::prelude::*;

use crate::buckets::Aggregation;
use crate::error::{Error, Result};
use crate::regression::RegressionResult;

/// Caption and axis descriptions of a chart.
#[derive(Debug, Clone)]
pub struct ChartLabels {
    pub caption: String,
    pub x_desc: String,
    pub y_desc: String,
}

impl ChartLabels {
    pub fn new(caption: &str, x_desc: &str, y_desc: &str) -> Self {
        Self {
            caption: caption.to_string(),
            x_desc: x_desc.to_string(),
            y_desc: y_desc.to_string(),
        }
    }
}

/// Which per-bucket value to plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketMetric {
    Numerator,
    Density,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStyle {
    Bars,
    Points,
}

/// Turns aggregated data into a visual artifact.
pub trait ChartExporter {
    fn render_buckets(
        &self,
        labels: &ChartLabels,
        aggregation: &Aggregation,
        width: i64,
        metric: BucketMetric,
        style: BucketStyle,
    ) -> Result<()>;

    fn render_regression(
        &self,
        labels: &ChartLabels,
        points: &[(f64, f64)],
        fit: Option<&RegressionResult>,
    ) -> Result<()>;
}

/// Writes PNG files through the plotters bitmap backend.
#[derive(Debug, Clone)]
pub struct PngChartExporter {
    output: PathBuf,
    size: (u32, u32),
}

impl PngChartExporter {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            size: (1024, 768),
        }
    }
}

fn chart_err<E: std::fmt::Display>(err: E) -> Error {
    Error::Chart(err.to_string())
}

fn upper_bound(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

impl ChartExporter for PngChartExporter {
    fn render_buckets(
        &self,
        labels: &ChartLabels,
        aggregation: &Aggregation,
        width: i64,
        metric: BucketMetric,
        style: BucketStyle,
    ) -> Result<()> {
        // Buckets with an undefined density are left out of the plot.
        let values: Vec<(i64, f64)> = aggregation
            .buckets
            .iter()
            .filter_map(|bucket| match metric {
                BucketMetric::Numerator => Some((bucket.start, bucket.numerator)),
                BucketMetric::Density => bucket.density().map(|d| (bucket.start, d)),
            })
            .collect();

        let x_min = aggregation.buckets.first().map_or(0, |b| b.start);
        let x_max = aggregation.buckets.last().map_or(1, |b| b.start + width);
        let y_max = upper_bound(values.iter().map(|&(_, v)| v));

        let root = BitMapBackend::new(&self.output, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&labels.caption, ("sans-serif", 30))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min as f64..x_max as f64, 0.0..y_max)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_desc(labels.x_desc.as_str())
            .y_desc(labels.y_desc.as_str())
            .draw()
            .map_err(chart_err)?;

        let color = RGBColor(190, 86, 131);
        match style {
            BucketStyle::Bars => {
                chart
                    .draw_series(values.iter().map(|&(start, value)| {
                        Rectangle::new(
                            [(start as f64, 0.0), ((start + width) as f64, value)],
                            color.filled(),
                        )
                    }))
                    .map_err(chart_err)?;
            }
            BucketStyle::Points => {
                chart
                    .draw_series(values.iter().map(|&(start, value)| {
                        Circle::new((start as f64, value), 4, color.filled())
                    }))
                    .map_err(chart_err)?;
            }
        }

        root.present().map_err(chart_err)?;
        info!("Chart saved to {}", self.output.display());
        Ok(())
    }

    fn render_regression(
        &self,
        labels: &ChartLabels,
        points: &[(f64, f64)],
        fit: Option<&RegressionResult>,
    ) -> Result<()> {
        let lo = points.iter().map(|&(x, _)| x).fold(f64::INFINITY, f64::min);
        let hi = points.iter().map(|&(x, _)| x).fold(f64::NEG_INFINITY, f64::max);
        let line = fit
            .filter(|_| lo.is_finite() && hi.is_finite())
            .map(|fit| vec![(lo, fit.evaluate_at(lo)), (hi, fit.evaluate_at(hi))]);

        let x_max = upper_bound(points.iter().map(|&(x, _)| x));
        let y_max = upper_bound(points.iter().map(|&(_, y)| y));
        let y_min = line
            .iter()
            .flatten()
            .map(|&(_, y)| y)
            .fold(0.0_f64, f64::min);

        let root = BitMapBackend::new(&self.output, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&labels.caption, ("sans-serif", 30))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..x_max, y_min..y_max)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_desc(labels.x_desc.as_str())
            .y_desc(labels.y_desc.as_str())
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, RGBAColor(190, 86, 131, 0.5).filled())),
            )
            .map_err(chart_err)?
            .label("Individual points")
            .legend(|(x, y)| Circle::new((x + 5, y), 3, RGBColor(190, 86, 131).filled()));

        if let Some(line) = line {
            chart
                .draw_series(LineSeries::new(line, &BLUE))
                .map_err(chart_err)?
                .label("LSRL")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
        info!("Chart saved to {}", self.output.display());
        Ok(())
    }
}
