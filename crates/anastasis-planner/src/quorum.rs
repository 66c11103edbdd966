//! quorum-size rule of §4.H step 1.

/// `k(m)`: the number of methods a policy must contain, given `m`
/// chosen authentication methods.
pub fn quorum_size(m: usize) -> usize {
    match m {
        0..=2 => m,
        3..=4 => m - 1,
        5..=6 => m - 2,
        7 => m - 3,
        _ => 4,
    }
}

/// ascending, no-repetition k-subsets of `0..n`, as the recursive
/// generator of §4.H step 2 describes.
pub fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k > n {
        return out;
    }
    let mut current = Vec::with_capacity(k);
    fn go(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        // remaining slots to fill must fit in [start, n)
        let remaining = k - current.len();
        if n - start < remaining {
            return;
        }
        for i in start..n {
            current.push(i);
            go(i + 1, n, k, current, out);
            current.pop();
        }
    }
    go(0, n, k, &mut current, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_rule_matches_spec_table() {
        assert_eq!(quorum_size(0), 0);
        assert_eq!(quorum_size(1), 1);
        assert_eq!(quorum_size(2), 2);
        assert_eq!(quorum_size(3), 2);
        assert_eq!(quorum_size(4), 3);
        assert_eq!(quorum_size(5), 3);
        assert_eq!(quorum_size(6), 4);
        assert_eq!(quorum_size(7), 4);
        assert_eq!(quorum_size(8), 4);
        assert_eq!(quorum_size(20), 4);
    }

    #[test]
    fn combinations_are_ascending_and_count_matches_binomial() {
        let combos = combinations(5, 3);
        assert_eq!(combos.len(), 10); // C(5,3)
        for c in &combos {
            assert!(c.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(c.len(), 3);
        }
    }

    #[test]
    fn combinations_of_k_greater_than_n_is_empty() {
        assert!(combinations(2, 3).is_empty());
    }
}
