use ndarray::{Array1, ArrayView1};

/// Derivative of `values` with respect to the sample coordinates `t`.
///
/// Interior points use the second-order central difference for uneven
/// spacing; the two end points fall back to one-sided first differences.
/// `t` must be strictly increasing for the result to be finite.
pub fn gradient(values: ArrayView1<f64>, t: ArrayView1<f64>) -> Array1<f64> {
    let len = values.len().min(t.len());
    let mut out = Array1::zeros(len);
    if len < 2 {
        return out;
    }

    out[0] = (values[1] - values[0]) / (t[1] - t[0]);
    out[len - 1] = (values[len - 1] - values[len - 2]) / (t[len - 1] - t[len - 2]);

    for i in 1..len - 1 {
        let hs = t[i] - t[i - 1];
        let hd = t[i + 1] - t[i];
        out[i] = (hs * hs * values[i + 1] + (hd * hd - hs * hs) * values[i]
            - hd * hd * values[i - 1])
            / (hs * hd * (hd + hs));
    }
    out
}
