//! Relative Strength Index (RSI).
//!
//! Exponentially weighted averages of gains and losses with alpha = 1/period,
//! seeded from the first price change (no warm-up truncation).
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: avg_loss == 0 → RSI = 100; a non-finite change yields `None`
//! and leaves the running averages untouched.

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// RSI for every close. Index 0 is always `None` (no prior close).
    pub fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let n = closes.len();
        let mut result = vec![None; n];
        let alpha = 1.0 / self.period as f64;
        let mut averages: Option<(f64, f64)> = None;

        for i in 1..n {
            let change = closes[i] - closes[i - 1];
            if !change.is_finite() {
                continue;
            }

            let gain = change.max(0.0);
            let loss = (-change).max(0.0);

            let (avg_gain, avg_loss) = match averages {
                None => (gain, loss),
                Some((g, l)) => (alpha * gain + (1.0 - alpha) * g, alpha * loss + (1.0 - alpha) * l),
            };
            averages = Some((avg_gain, avg_loss));
            result[i] = Some(rsi_from_averages(avg_gain, avg_loss));
        }

        result
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(14)
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
