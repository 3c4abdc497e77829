/// Descriptive statistics over a sample of millisecond durations.
///
/// Percentiles use linear interpolation between the two closest ranks
/// (`rank = p/100 * (n - 1)`), so estimates stay consistent across all
/// sample sizes. An empty sample yields zero for every statistic so that
/// empty report sections degrade to count-zero rows instead of failing.
#[derive(Debug, Clone)]
pub struct DescriptiveStats {
    values: Vec<f64>,
}

impl DescriptiveStats {
    pub fn from_millis(values: impl IntoIterator<Item = i64>) -> Self {
        let mut values: Vec<f64> = values.into_iter().map(|v| v as f64).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Self { values }
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    pub fn percentile(&self, p: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        if n == 1 {
            return self.values[0];
        }

        let rank = (p / 100.0 * (n - 1) as f64).clamp(0.0, (n - 1) as f64);
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let fraction = rank - lower as f64;

        self.values[lower] + fraction * (self.values[upper] - self.values[lower])
    }
}
