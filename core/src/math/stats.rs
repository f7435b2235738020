/// Summary statistics that skip non-finite entries, the way the recording's
/// gaps are meant to be ignored.
pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        let (sum, count) = samples
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Sample standard deviation (n - 1 denominator); needs two finite values.
    pub fn std_dev(samples: &[f64]) -> Option<f64> {
        let mean = Self::mean(samples)?;
        let (sum_sq, count) = samples
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(sum_sq, count), &v| {
                (sum_sq + (v - mean) * (v - mean), count + 1)
            });
        if count < 2 {
            None
        } else {
            Some((sum_sq / (count - 1) as f64).sqrt())
        }
    }

    pub fn median(samples: &[f64]) -> Option<f64> {
        let mut finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        finite.sort_by(f64::total_cmp);
        let mid = finite.len() / 2;
        if finite.len() % 2 == 0 {
            Some((finite[mid - 1] + finite[mid]) / 2.0)
        } else {
            Some(finite[mid])
        }
    }
}
