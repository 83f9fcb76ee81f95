//! Sample aggregation
//!
//! Reduces the decoded samples of one acquisition to a single representative
//! value. A [`SampleStatistics`] borrows the buffer of a single call and is
//! dropped with it, so no state is shared between devices or calls.

use heapless::Vec;

/// Upper bound on samples per acquisition (the read count is a `u8`).
pub const MAX_SAMPLES: usize = u8::MAX as usize;

/// Decoded samples of one acquisition, in read order.
pub type SampleBuffer = Vec<f32, MAX_SAMPLES>;

/// Selects how a sample set is reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AveragingMode {
    /// Sum divided by count.
    #[default]
    Arithmetic = 1,
    /// n-th root of the product, computed in the log domain. Sets holding a
    /// zero or negative value use the arithmetic mean.
    Geometric = 2,
    /// Square root of the mean of squares.
    RootMeanSquare = 3,
    /// Middle value; mean of the two middle values for even counts.
    Median = 4,
    /// Arithmetic mean after dropping one minimum and one maximum.
    Trimmed = 5,
}

impl From<u8> for AveragingMode {
    /// Unknown codes fall back to [`AveragingMode::Arithmetic`].
    fn from(value: u8) -> Self {
        match value {
            2 => AveragingMode::Geometric,
            3 => AveragingMode::RootMeanSquare,
            4 => AveragingMode::Median,
            5 => AveragingMode::Trimmed,
            _ => AveragingMode::Arithmetic,
        }
    }
}

/// Statistics over one acquisition's samples.
#[derive(Debug, Clone, Copy)]
pub struct SampleStatistics<'a> {
    samples: &'a [f32],
}

impl<'a> SampleStatistics<'a> {
    pub fn new(samples: &'a [f32]) -> Self {
        Self { samples }
    }

    /// Number of samples
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Smallest sample, `None` when empty
    pub fn min(&self) -> Option<f32> {
        self.samples.iter().copied().reduce(f32::min)
    }

    /// Largest sample, `None` when empty
    pub fn max(&self) -> Option<f32> {
        self.samples.iter().copied().reduce(f32::max)
    }

    /// Reduce the samples under `mode`.
    ///
    /// A single sample is returned unchanged whatever the mode. An empty set
    /// yields NaN.
    pub fn average(&self, mode: AveragingMode) -> f32 {
        match self.samples {
            [] => f32::NAN,
            [only] => *only,
            samples => match mode {
                AveragingMode::Arithmetic => mean(samples),
                AveragingMode::Geometric => geometric_mean(samples),
                AveragingMode::RootMeanSquare => root_mean_square(samples),
                AveragingMode::Median => median(samples),
                AveragingMode::Trimmed => trimmed_mean(samples),
            },
        }
    }
}

fn mean(samples: &[f32]) -> f32 {
    samples.iter().sum::<f32>() / samples.len() as f32
}

fn geometric_mean(samples: &[f32]) -> f32 {
    if samples.iter().any(|&x| x <= 0.0) {
        return mean(samples);
    }
    let log_sum: f32 = samples.iter().map(|&x| libm::logf(x)).sum();
    libm::expf(log_sum / samples.len() as f32)
}

fn root_mean_square(samples: &[f32]) -> f32 {
    let square_sum: f32 = samples.iter().map(|&x| x * x).sum();
    libm::sqrtf(square_sum / samples.len() as f32)
}

fn sorted(samples: &[f32]) -> SampleBuffer {
    let mut sorted: SampleBuffer = samples.iter().copied().take(MAX_SAMPLES).collect();
    sorted.sort_unstable_by(f32::total_cmp);
    sorted
}

fn median(samples: &[f32]) -> f32 {
    let sorted = sorted(samples);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn trimmed_mean(samples: &[f32]) -> f32 {
    if samples.len() < 3 {
        return mean(samples);
    }
    let sorted = sorted(samples);
    mean(&sorted[1..sorted.len() - 1])
}
