//! Enumeration of the 3-D basis index set.

/// Per-axis Hermite orders (nx, ny, nz) of one separable basis function.
pub type BasisIndex = [usize; 3];

/// Enumerate every basis index with even total degree `nx + ny + nz` up to
/// `radial_order`.
///
/// The order is fixed: ascending total degree n = 0, 2, ..., and within each
/// degree the (i, j) sweep below. Every matrix in the crate is laid out
/// against this sequence, so it must be identical on every call for a given
/// radial order. Odd radial orders admit the same set as `radial_order - 1`.
pub fn index_set(radial_order: usize) -> Vec<BasisIndex> {
    let mut set = Vec::with_capacity(index_set_len(radial_order));
    for n in (0..=radial_order).step_by(2) {
        for i in 0..=n {
            for j in 0..=(n - i) {
                set.push([n - i - j, j, i]);
            }
        }
    }
    set
}

/// Closed-form cardinality of [`index_set`]:
/// `(F + 1)(F + 2)(4F + 3) / 6` with `F = radial_order / 2` (floored).
pub fn index_set_len(radial_order: usize) -> usize {
    let f = radial_order / 2;
    (f + 1) * (f + 2) * (4 * f + 3) / 6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinality_matches_closed_form() {
        for radial_order in 0..=16 {
            let set = index_set(radial_order);
            assert_eq!(set.len(), index_set_len(radial_order));
        }
        // Reference size used throughout the literature for order 16.
        assert_eq!(index_set(16).len(), 525);
    }

    #[test]
    fn order_zero_is_the_single_gaussian() {
        assert_eq!(index_set(0), vec![[0, 0, 0]]);
    }

    #[test]
    fn odd_orders_floor_to_the_previous_even_order() {
        assert_eq!(index_set(5), index_set(4));
        assert_eq!(index_set_len(7), index_set_len(6));
    }

    #[test]
    fn enumeration_is_deterministic_and_within_cutoff() {
        let a = index_set(8);
        let b = index_set(8);
        assert_eq!(a, b);
        for idx in &a {
            let total = idx[0] + idx[1] + idx[2];
            assert!(total <= 8);
            assert_eq!(total % 2, 0);
        }
    }

    #[test]
    fn leading_entries_follow_the_fixed_tie_break() {
        let set = index_set(4);
        assert_eq!(&set[..6], &[
            [0, 0, 0],
            [2, 0, 0],
            [1, 1, 0],
            [0, 2, 0],
            [1, 0, 1],
            [0, 1, 1],
        ]);
    }
}
