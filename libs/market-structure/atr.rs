/// Largest of the bar range and the gaps to the previous close
#[inline]
pub fn true_range(high: f64, low: f64, previous_close: f64) -> f64 {
    (high - low)
        .max((high - previous_close).abs())
        .max((low - previous_close).abs())
}

/// Average True Range with recursive smoothing.
///
/// The first value appears once `period` bars have been seen and equals the
/// sum of the True Ranges of bars `1..period` divided by `period` (bar 0 has no
/// previous close and contributes nothing). Every later bar applies
/// `(atr * (period - 1) + tr) / period`.
#[derive(Debug, Clone)]
pub struct AverageTrueRange {
    period: usize,
    count: usize,
    previous_close: Option<f64>,
    seed_sum: f64,
    value: Option<f64>,
}

impl AverageTrueRange {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            count: 0,
            previous_close: None,
            seed_sum: 0.0,
            value: None,
        }
    }

    /// Feed one bar. Returns `None` while fewer than `period` bars exist.
    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        self.count += 1;
        let tr = self
            .previous_close
            .map(|previous_close| true_range(high, low, previous_close));
        self.previous_close = Some(close);

        if self.count <= self.period {
            if let Some(tr) = tr {
                self.seed_sum += tr;
            }
            if self.count == self.period {
                self.value = Some(self.seed_sum / self.period as f64);
            }
            return self.value;
        }

        // count > period implies a previous close exists
        let tr = tr.unwrap_or(0.0);
        self.value = self
            .value
            .map(|atr| (atr * (self.period - 1) as f64 + tr) / self.period as f64);
        self.value
    }

    #[inline]
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    #[inline]
    pub fn is_warm(&self) -> bool {
        self.value.is_some()
    }

    #[inline]
    pub fn period(&self) -> usize {
        self.period
    }
}
