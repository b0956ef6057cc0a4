//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper: middle + k * stddev(close, period)
//! - Lower: middle - k * stddev(close, period)
//!
//! Mean and deviation share the same trailing window, inclusive of the current
//! point. Uses sample stddev (divide by N - 1). Rows before the window fills,
//! or whose window holds a non-finite close, are `None`.

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    k: f64,
}

/// The three bands, each the same length as the input.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub mid: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

impl Bollinger {
    pub fn new(period: usize, k: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self { period, k }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn compute(&self, closes: &[f64]) -> BollingerBands {
        let n = closes.len();
        let mut bands = BollingerBands {
            upper: vec![None; n],
            mid: vec![None; n],
            lower: vec![None; n],
        };

        if n < self.period {
            return bands;
        }

        for i in (self.period - 1)..n {
            let window = &closes[i + 1 - self.period..=i];
            if window.iter().any(|c| !c.is_finite()) {
                continue;
            }

            let mean = window.iter().sum::<f64>() / self.period as f64;
            bands.mid[i] = Some(mean);

            // Sample stddev is undefined for a single point
            if self.period < 2 {
                continue;
            }
            let variance = window
                .iter()
                .map(|c| {
                    let diff = c - mean;
                    diff * diff
                })
                .sum::<f64>()
                / (self.period - 1) as f64;
            let stddev = variance.sqrt();

            bands.upper[i] = Some(mean + self.k * stddev);
            bands.lower[i] = Some(mean - self.k * stddev);
        }

        bands
    }
}

impl Default for Bollinger {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}
