use std::marker::PhantomData;

use log::debug;

use crate::error::{Error, Result};

/// Fixed-width integer ranges covering `[lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketDomain {
    lo: i64,
    hi: i64,
    width: i64,
}

impl BucketDomain {
    pub fn new(lo: i64, hi: i64, width: i64) -> Result<Self> {
        if width <= 0 || lo >= hi || (hi - lo) % width != 0 {
            return Err(Error::InvalidBucketDomain { lo, hi, width });
        }
        Ok(Self { lo, hi, width })
    }

    /// Projected March temperature, five-degree bands.
    pub fn temperature() -> Self {
        Self { lo: -30, hi: 30, width: 5 }
    }

    /// Whole degrees of distance from the equator.
    pub fn latitude() -> Self {
        Self { lo: 0, hi: 90, width: 1 }
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    pub fn hi(&self) -> i64 {
        self.hi
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn bucket_count(&self) -> usize {
        ((self.hi - self.lo) / self.width) as usize
    }

    /// Start of the bucket holding `x`. Values outside the domain fold into
    /// the nearest edge bucket.
    pub fn bucket_of(&self, x: f64) -> i64 {
        let index = ((x - self.lo as f64) / self.width as f64).floor();
        let last = (self.bucket_count() - 1) as f64;
        // NaN fails both comparisons and lands in the first bucket
        let index = if index >= last {
            last
        } else if index >= 0.0 {
            index
        } else {
            0.0
        };
        self.lo + index as i64 * self.width
    }

    pub fn starts(&self) -> impl Iterator<Item = i64> {
        (self.lo..self.hi).step_by(self.width as usize)
    }

    fn index_of(&self, start: i64) -> usize {
        ((start - self.lo) / self.width) as usize
    }
}

/// The value bucketed on, and the ratio terms summed per bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketSample {
    pub x: f64,
    pub numerator: f64,
    pub denominator: f64,
}

impl BucketSample {
    pub fn new(x: f64, numerator: f64, denominator: f64) -> Self {
        Self {
            x,
            numerator,
            denominator,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub start: i64,
    pub numerator: f64,
    pub denominator: f64,
}

impl Bucket {
    /// `numerator / denominator`, or `None` for a bucket with no denominator.
    pub fn density(&self) -> Option<f64> {
        if self.denominator == 0.0 {
            None
        } else {
            Some(self.numerator / self.denominator)
        }
    }
}

/// Every bucket of a domain in ascending order, plus the number of input
/// records that could not be placed.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub buckets: Vec<Bucket>,
    pub skipped: usize,
}

impl Aggregation {
    pub fn get(&self, start: i64) -> Option<&Bucket> {
        self.buckets.iter().find(|bucket| bucket.start == start)
    }

    pub fn total_numerator(&self) -> f64 {
        self.buckets.iter().map(|bucket| bucket.numerator).sum()
    }

    pub fn total_denominator(&self) -> f64 {
        self.buckets.iter().map(|bucket| bucket.denominator).sum()
    }

    pub fn densities(&self) -> impl Iterator<Item = (i64, Option<f64>)> + '_ {
        self.buckets
            .iter()
            .map(|bucket| (bucket.start, bucket.density()))
    }
}

/// Groups records into the buckets of a [`BucketDomain`] using an accessor
/// that extracts the bucketed value and the ratio terms.
pub struct BucketAggregator<T, F> {
    domain: BucketDomain,
    accessor: F,
    _record: PhantomData<fn(&T)>,
}

impl<T, F> BucketAggregator<T, F>
where
    F: Fn(&T) -> Option<BucketSample>,
{
    pub fn new(domain: BucketDomain, accessor: F) -> Self {
        Self {
            domain,
            accessor,
            _record: PhantomData,
        }
    }

    pub fn domain(&self) -> BucketDomain {
        self.domain
    }

    pub fn bucket_of(&self, x: f64) -> i64 {
        self.domain.bucket_of(x)
    }

    /// Records for which the accessor yields nothing, or a non-finite sample,
    /// are counted in [`Aggregation::skipped`].
    pub fn aggregate<'a, I>(&self, records: I) -> Aggregation
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut buckets: Vec<Bucket> = self
            .domain
            .starts()
            .map(|start| Bucket {
                start,
                numerator: 0.0,
                denominator: 0.0,
            })
            .collect();
        let mut skipped = 0;

        for record in records {
            let sample = (self.accessor)(record).filter(|s| {
                s.x.is_finite() && s.numerator.is_finite() && s.denominator.is_finite()
            });
            let Some(sample) = sample else {
                skipped += 1;
                continue;
            };
            let bucket = &mut buckets[self.domain.index_of(self.domain.bucket_of(sample.x))];
            bucket.numerator += sample.numerator;
            bucket.denominator += sample.denominator;
        }

        debug!(
            "Aggregated into {} buckets of width {}, {} record(s) skipped",
            buckets.len(),
            self.domain.width,
            skipped
        );
        Aggregation { buckets, skipped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(sample: &BucketSample) -> Option<BucketSample> {
        Some(*sample)
    }

    #[test]
    fn test_bucket_of_temperature_domain() {
        let domain = BucketDomain::new(-30, 30, 5).unwrap();
        assert_eq!(domain.bucket_of(-30.0), -30);
        assert_eq!(domain.bucket_of(-1.0), -5);
        assert_eq!(domain.bucket_of(0.0), 0);
        assert_eq!(domain.bucket_of(29.0), 25);
        assert_eq!(domain.bucket_of(30.0), 25);
        assert_eq!(domain.bucket_of(-31.0), -30);
        assert_eq!(domain.bucket_of(4.999), 0);
        assert_eq!(domain.bucket_of(f64::NAN), -30);
    }

    #[test]
    fn test_invalid_domains_are_rejected() {
        assert!(BucketDomain::new(0, 10, 0).is_err());
        assert!(BucketDomain::new(10, 10, 1).is_err());
        assert!(matches!(
            BucketDomain::new(0, 10, 3),
            Err(Error::InvalidBucketDomain { lo: 0, hi: 10, width: 3 })
        ));
        assert_eq!(BucketDomain::temperature().bucket_count(), 12);
        assert_eq!(BucketDomain::latitude().bucket_count(), 90);
    }

    #[test]
    fn test_aggregate_sums_terms() {
        let aggregator = BucketAggregator::new(BucketDomain::new(0, 10, 5).unwrap(), identity);
        let samples = [
            BucketSample::new(2.0, 10.0, 100.0),
            BucketSample::new(3.0, 5.0, 50.0),
        ];
        let aggregation = aggregator.aggregate(&samples);

        let bucket = aggregation.get(0).unwrap();
        assert_eq!(bucket.numerator, 15.0);
        assert_eq!(bucket.denominator, 150.0);
        assert_eq!(bucket.density(), Some(0.1));
        assert_eq!(aggregation.skipped, 0);
    }

    #[test]
    fn test_empty_bucket_density_is_undefined_not_zero() {
        let aggregator = BucketAggregator::new(BucketDomain::new(0, 10, 5).unwrap(), identity);
        let samples = [BucketSample::new(7.0, 0.0, 40.0)];
        let aggregation = aggregator.aggregate(&samples);

        assert_eq!(aggregation.get(0).unwrap().density(), None);
        assert_eq!(aggregation.get(5).unwrap().density(), Some(0.0));
        let densities: Vec<_> = aggregation.densities().collect();
        assert_eq!(densities, vec![(0, None), (5, Some(0.0))]);
    }

    #[test]
    fn test_all_buckets_present_in_order() {
        let aggregator = BucketAggregator::new(BucketDomain::temperature(), identity);
        let aggregation = aggregator.aggregate(&[]);
        let starts: Vec<i64> = aggregation.buckets.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![-30, -25, -20, -15, -10, -5, 0, 5, 10, 15, 20, 25]);
    }

    #[test]
    fn test_resumming_numerators_preserves_total() {
        let samples: Vec<BucketSample> = (0..40)
            .map(|i| BucketSample::new(i as f64 * 1.7 - 35.0, (i * 13 % 7) as f64, 10.0))
            .collect();
        let expected: f64 = samples.iter().map(|s| s.numerator).sum();

        let aggregator = BucketAggregator::new(BucketDomain::temperature(), identity);
        let aggregation = aggregator.aggregate(&samples);
        assert_eq!(aggregation.total_numerator(), expected);
        assert_eq!(aggregation.total_denominator(), 400.0);
    }

    #[test]
    fn test_missing_samples_are_counted() {
        let aggregator = BucketAggregator::new(BucketDomain::latitude(), |lat: &Option<f64>| {
            lat.map(|lat| BucketSample::new(lat.abs(), 1.0, 0.0))
        });
        let aggregation =
            aggregator.aggregate(&[Some(-45.5), None, Some(90.0), Some(f64::INFINITY)]);

        assert_eq!(aggregation.skipped, 2);
        assert_eq!(aggregation.get(45).unwrap().numerator, 1.0);
        assert_eq!(aggregation.get(89).unwrap().numerator, 1.0);
    }
}
