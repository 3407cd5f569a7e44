//! Hermite-polynomial kernels shared by the two basis families.

/// `H_n(t) * exp(-t^2 / 2) / sqrt(2^n n!)` via the normalized three-term
/// recurrence.
///
/// Normalizing inside the recurrence keeps every intermediate on the scale of
/// the result, so the evaluation stays accurate far beyond the radial orders
/// the model uses; the factorial expansion would overflow near order 150.
pub(crate) fn hermite_gauss(n: usize, t: f64) -> f64 {
    let h0 = (-t * t / 2.0).exp();
    if n == 0 {
        return h0;
    }
    let mut prev = h0;
    let mut cur = std::f64::consts::SQRT_2 * t * h0;
    for k in 1..n {
        let kf = k as f64;
        let next = t * (2.0 / (kf + 1.0)).sqrt() * cur - (kf / (kf + 1.0)).sqrt() * prev;
        prev = cur;
        cur = next;
    }
    cur
}

/// Monomial coefficients of the physicists' Hermite polynomial `H_n`,
/// lowest power first.
pub(crate) fn hermite_coefficients(n: usize) -> Vec<f64> {
    let mut prev = vec![1.0];
    if n == 0 {
        return prev;
    }
    let mut cur = vec![0.0, 2.0];
    for k in 2..=n {
        // H_k = 2 t H_{k-1} - 2 (k - 1) H_{k-2}
        let mut next = vec![0.0; k + 1];
        for (j, &c) in cur.iter().enumerate() {
            next[j + 1] += 2.0 * c;
        }
        for (j, &c) in prev.iter().enumerate() {
            next[j] -= 2.0 * (k as f64 - 1.0) * c;
        }
        prev = cur;
        cur = next;
    }
    cur
}
