//! Numeric summaries and histogram bins for numeric survey questions.

use serde::Serialize;

/// Summary of a numeric response distribution. Non-finite values (`nan`,
/// `inf`) are counted but excluded from every metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub non_finite: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
}

impl NumericSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let mut finite = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect::<Vec<_>>();
        finite.sort_by(f64::total_cmp);
        let count = finite.len();
        let sum: f64 = finite.iter().sum();
        let sum_squares: f64 = finite.iter().map(|v| v * v).sum();
        let mean = (count > 0).then(|| sum / count as f64);
        let median = if finite.is_empty() {
            None
        } else {
            let mid = count / 2;
            if count.is_multiple_of(2) {
                Some((finite[mid - 1] + finite[mid]) / 2.0)
            } else {
                Some(finite[mid])
            }
        };
        let std_dev = match mean {
            Some(mean) if count >= 2 => {
                let variance =
                    (sum_squares - count as f64 * mean * mean) / (count as f64 - 1.0);
                Some(variance.max(0.0).sqrt())
            }
            _ => None,
        };
        Self {
            count,
            non_finite: values.len() - count,
            min: finite.first().copied(),
            max: finite.last().copied(),
            mean,
            median,
            std_dev,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

impl HistogramBin {
    pub fn label(&self, last: bool) -> String {
        let close = if last { ']' } else { ')' };
        format!(
            "[{}, {}{close}",
            format_number(self.lower),
            format_number(self.upper)
        )
    }
}

/// Equal-width bins over `[lo, hi]`; `bins` of `None` uses Sturges' rule.
/// The last bin is closed on the right.
pub fn histogram(values: &[f64], lo: f64, hi: f64, bins: Option<usize>) -> Vec<HistogramBin> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    if !lo.is_finite() || !hi.is_finite() || hi < lo {
        return Vec::new();
    }
    if hi == lo {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: finite.filter(|v| *v == lo).count(),
        }];
    }
    let finite_count = values.iter().filter(|v| v.is_finite()).count();
    let bin_count = bins.unwrap_or_else(|| sturges(finite_count)).max(1);
    let width = (hi - lo) / bin_count as f64;
    let mut counts = vec![0usize; bin_count];
    for value in finite {
        if value < lo || value > hi {
            continue;
        }
        let idx = (((value - lo) / width) as usize).min(bin_count - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            lower: lo + width * idx as f64,
            upper: if idx + 1 == bin_count {
                hi
            } else {
                lo + width * (idx + 1) as f64
            },
            count,
        })
        .collect()
}

fn sturges(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        (n as f64).log2().ceil() as usize + 1
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}
