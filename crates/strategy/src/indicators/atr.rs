use common::Candle;

/// ATR (Average True Range) with Wilder smoothing.
///
/// `TR = max(high - low, |high - prev_close|, |low - prev_close|)`, defined
/// from the second candle on. The first ATR is the mean of the first `period`
/// true ranges (index `period`); after that
/// `ATR = (prev_ATR * (period - 1) + TR) / period`.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period }
    }

    /// Full ATR series aligned with `candles` (oldest first).
    pub fn series(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let mut out = vec![None; candles.len()];
        if candles.len() < self.period + 1 {
            return out;
        }

        let n = self.period as f64;
        let true_ranges: Vec<f64> = candles
            .windows(2)
            .map(|w| true_range(w[1].high, w[1].low, w[0].close))
            .collect();

        let mut atr = true_ranges[..self.period].iter().sum::<f64>() / n;
        out[self.period] = Some(atr);

        for (i, &tr) in true_ranges.iter().enumerate().skip(self.period) {
            atr = (atr * (n - 1.0) + tr) / n;
            out[i + 1] = Some(atr);
        }
        out
    }

    /// ATR at the last candle.
    pub fn compute(&self, candles: &[Candle]) -> Option<f64> {
        self.series(candles).last().copied().flatten()
    }
}

fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}
