/// EMA (Exponential Moving Average) indicator.
///
/// Seeded with the simple average of the first `period` closes, then
/// `ema = close * k + prev * (1 - k)` with `k = 2 / (period + 1)`.
/// Values before the seed index are `None`.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub period: usize,
}

impl EmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self { period }
    }

    /// Full EMA series aligned with `closes` (oldest first).
    pub fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; closes.len()];
        if closes.len() < self.period {
            return out;
        }

        let k = 2.0 / (self.period as f64 + 1.0);
        let mut ema_val = closes[..self.period].iter().sum::<f64>() / self.period as f64;
        out[self.period - 1] = Some(ema_val);

        for (i, &price) in closes.iter().enumerate().skip(self.period) {
            ema_val = price * k + ema_val * (1.0 - k);
            out[i] = Some(ema_val);
        }
        out
    }

    /// EMA at the last close. Returns `None` if there are fewer than `period` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        self.series(closes).last().copied().flatten()
    }
}
