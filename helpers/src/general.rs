use std::cmp::Ordering;

/// argmin returns the index of the minimum value in the array x. Ties resolve to the lowest
/// index, NaN values are never selected unless all values are NaN. Returns None for an empty
/// slice.
pub fn argmin(x: &[f64]) -> Option<usize> {
    let mut idx_min: Option<usize> = None;

    for (i, &val) in x.iter().enumerate() {
        if val.is_nan() {
            continue;
        }
        match idx_min {
            Some(j) if x[j] <= val => {}
            _ => idx_min = Some(i),
        }
    }

    idx_min.or(if x.is_empty() { None } else { Some(0) })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array. The sort is stable and uses the IEEE
/// total order, i.e. equal values keep their original order and NaN does not panic.
pub fn argsort(x: &[f64], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| x[a].total_cmp(&x[b])),
        SortOrder::Descending => indices.sort_by(|&a, &b| x[b].total_cmp(&x[a])),
    }
    indices
}

/// lin_interp returns the linearly interpolated value at x for given discrete data points xp, fp.
/// xp must be increasing. Values outside of xp are clamped to the first or last fp. Inspired by
/// numpy.interp.
pub fn lin_interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if xp.len() != fp.len() || xp.is_empty() {
        panic!("xp and fp must be non-empty and of equal length!")
    }

    if x <= xp[0] {
        return fp[0];
    }

    for i in 1..xp.len() {
        if x <= xp[i] {
            return fp[i - 1] + (x - xp[i - 1]) * (fp[i] - fp[i - 1]) / (xp[i] - xp[i - 1]);
        }
    }

    fp[fp.len() - 1]
}

/// wrap_degrees maps an angle in degrees onto [0, 360).
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// shortest_turn returns the signed angle in (-180, 180] that rotates `from` onto `to`.
pub fn shortest_turn(from: f64, to: f64) -> f64 {
    let diff = wrap_degrees(to - from);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// cmp_desc compares two floats for a descending sort using the IEEE total order.
pub fn cmp_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
