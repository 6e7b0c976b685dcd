use crate::HarnessError;

pub const DEFAULT_RTOL: f64 = 1e-2;
pub const DEFAULT_ATOL: f64 = 1e-2;

/// Uniform closeness bounds: `|r - c| <= absolute + relative * |r|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    relative: f64,
    absolute: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            relative: DEFAULT_RTOL,
            absolute: DEFAULT_ATOL,
        }
    }
}

impl Tolerance {
    pub fn new(relative: f64, absolute: f64) -> Result<Self, HarnessError> {
        let valid = |t: f64| t.is_finite() && t >= 0.0;
        if !valid(relative) || !valid(absolute) {
            return Err(HarnessError::InvalidTolerance { relative, absolute });
        }
        Ok(Self { relative, absolute })
    }

    /// Bitwise-exact comparison.
    pub const fn exact() -> Self {
        Self {
            relative: 0.0,
            absolute: 0.0,
        }
    }

    pub fn relative(&self) -> f64 {
        self.relative
    }

    pub fn absolute(&self) -> f64 {
        self.absolute
    }

    /// Largest deviation allowed from `reference`.
    pub fn bound(&self, reference: f64) -> f64 {
        self.absolute + self.relative * reference.abs()
    }

    /// Equal values (including equal infinities) are always close. Otherwise the
    /// difference must be finite, so NaN and any mismatch against an infinity fail.
    pub fn is_close(&self, reference: f64, candidate: f64) -> bool {
        if reference == candidate {
            return true;
        }
        let diff = (reference - candidate).abs();
        diff.is_finite() && diff <= self.bound(reference)
    }
}

/// Result of scanning two element streams.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closeness {
    pub within: bool,
    pub max_abs_diff: f64,
}

/// Scans every pair, so `max_abs_diff` is the true maximum even after the
/// first violation. A NaN difference poisons the maximum.
pub fn scan(
    reference: impl Iterator<Item = f64>,
    candidate: impl Iterator<Item = f64>,
    tolerance: &Tolerance,
) -> Closeness {
    let mut within = true;
    let mut max_abs_diff = 0f64;
    for (r, c) in reference.zip(candidate) {
        if !tolerance.is_close(r, c) {
            within = false;
        }
        let diff = if r == c { 0.0 } else { (r - c).abs() };
        if diff.is_nan() || diff > max_abs_diff {
            max_abs_diff = if max_abs_diff.is_nan() { max_abs_diff } else { diff };
        }
    }
    Closeness {
        within,
        max_abs_diff,
    }
}
