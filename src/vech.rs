//! Half-vectorization of undirected graphs.
//!
//! An undirected, self-loop-free graph on n nodes is fully described by the
//! strict upper triangle of its adjacency matrix. We store that triangle as a
//! weight vector of length k = n(n-1)/2, scanned row-major:
//!
//! ```text
//! n = 4:   w = [a01, a02, a03, a12, a13, a23]
//! ```
//!
//! Four maps move between the vector and matrix views:
//!
//! | Map | Direction |
//! |-----|-----------|
//! | [`adjacency_from_weights`] | w → A (symmetric, zero diagonal) |
//! | [`weights_from_adjacency`] | A → w (adjoint and left inverse of the above) |
//! | [`laplacian_from_weights`] | w → L = D - A |
//! | [`laplacian_to_weights`] | L → w = -triu(L) |
//!
//! and [`laplacian_adjoint`] is the adjoint of `laplacian_from_weights` under
//! the trace inner product:
//!
//! ```text
//! <L(w), M>_F = <w, L*(M)>     with  L*(M)_(ij) = M_ii + M_jj - 2 M_ij
//! ```
//!
//! The adjoint is what pulls a gradient living in Laplacian space back to the
//! weight vector.

use crate::{ensure_square, Error, Result};
use ndarray::{Array1, Array2, ArrayView1};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Number of edges of the complete graph on `n` nodes.
#[inline]
pub fn num_edges(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Recover the node count n from a weight vector length k = n(n-1)/2.
///
/// Fails with [`Error::InvalidParameterization`] when k is not a triangular
/// number. `k = 0` maps to a single isolated node.
pub fn num_nodes(k: usize) -> Result<usize> {
    let n = ((1.0 + (1.0 + 8.0 * k as f64).sqrt()) / 2.0).round() as usize;
    if num_edges(n) != k {
        return Err(Error::InvalidParameterization { len: k });
    }
    Ok(n)
}

/// Scatter `values` into the strict upper triangle of an n×n zero matrix and
/// mirror it into the lower triangle.
fn symmetric_from_upper(values: ArrayView1<f64>, n: usize) -> Array2<f64> {
    let mut m = Array2::zeros((n, n));
    let mut idx = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            let v = values[idx];
            m[[i, j]] = v;
            m[[j, i]] = v;
            idx += 1;
        }
    }
    m
}

/// Adjacency operator A(w).
///
/// # Example
///
/// ```rust
/// use rwl::vech::adjacency_from_weights;
/// use ndarray::array;
///
/// let a = adjacency_from_weights(&array![1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(a, array![[0.0, 1.0, 2.0], [1.0, 0.0, 3.0], [2.0, 3.0, 0.0]]);
/// ```
pub fn adjacency_from_weights(w: &Array1<f64>) -> Result<Array2<f64>> {
    let n = num_nodes(w.len())?;
    Ok(symmetric_from_upper(w.view(), n))
}

/// Adjoint of the adjacency operator: the strict upper triangle of `adj`.
///
/// The lower triangle and the diagonal are ignored, so this is an exact
/// inverse of [`adjacency_from_weights`] only for symmetric zero-diagonal input.
pub fn weights_from_adjacency(adj: &Array2<f64>) -> Result<Array1<f64>> {
    let n = ensure_square(adj)?;
    Ok(upper_triangle(adj, n))
}

fn upper_triangle(m: &Array2<f64>, n: usize) -> Array1<f64> {
    let mut w = Array1::zeros(num_edges(n));
    let mut idx = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            w[idx] = m[[i, j]];
            idx += 1;
        }
    }
    w
}

/// Laplacian operator L(w) = D(w) - A(w).
///
/// The off-diagonal entries are `-w`, the diagonal holds the weighted
/// degrees, and every row sums to zero.
pub fn laplacian_from_weights(w: &Array1<f64>) -> Result<Array2<f64>> {
    let n = num_nodes(w.len())?;
    let neg = w.mapv(|x| -x);
    let mut lap = symmetric_from_upper(neg.view(), n);
    for i in 0..n {
        lap[[i, i]] = -lap.row(i).sum();
    }
    Ok(lap)
}

/// Edge weights encoded by a Laplacian: w = -triu(L, 1).
///
/// Only the strict upper triangle is read.
pub fn laplacian_to_weights(lap: &Array2<f64>) -> Result<Array1<f64>> {
    let n = ensure_square(lap)?;
    let mut w = upper_triangle(lap, n);
    w.mapv_inplace(|x| -x);
    Ok(w)
}

/// Adjoint of [`laplacian_from_weights`] (the L* operator).
///
/// For every upper-triangle position (i, j), in the same row-major order as
/// the weight vector:
///
/// ```text
/// L*(M)_(ij) = M_ii + M_jj - 2 M_ij
/// ```
///
/// This satisfies `<L(w), M>_F = <w, L*(M)>` for every symmetric `M`.
pub fn laplacian_adjoint(m: &Array2<f64>) -> Result<Array1<f64>> {
    let n = ensure_square(m)?;

    #[cfg(feature = "parallel")]
    {
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| m[[i, i]] + m[[j, j]] - 2.0 * m[[i, j]])
                    .collect()
            })
            .collect();
        return Ok(rows.into_iter().flatten().collect());
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut w = Array1::zeros(num_edges(n));
        let mut idx = 0;
        for i in 0..n {
            for j in (i + 1)..n {
                w[idx] = m[[i, i]] + m[[j, j]] - 2.0 * m[[i, j]];
                idx += 1;
            }
        }
        Ok(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn frobenius_inner(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
        (a * b).sum()
    }

    #[test]
    fn test_num_nodes_triangular() {
        assert_eq!(num_nodes(0).unwrap(), 1);
        assert_eq!(num_nodes(1).unwrap(), 2);
        assert_eq!(num_nodes(3).unwrap(), 3);
        assert_eq!(num_nodes(6).unwrap(), 4);
        assert_eq!(num_nodes(4950).unwrap(), 100);
    }

    #[test]
    fn test_num_nodes_rejects_non_triangular() {
        for k in [2usize, 4, 5, 7, 11] {
            match num_nodes(k) {
                Err(Error::InvalidParameterization { len }) => assert_eq!(len, k),
                other => panic!("k={k}: unexpected {other:?}"),
            }
        }
        assert!(adjacency_from_weights(&Array1::zeros(5)).is_err());
        assert!(laplacian_from_weights(&Array1::zeros(5)).is_err());
    }

    #[test]
    fn test_adjacency_row_major_order() {
        let w = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let a = adjacency_from_weights(&w).unwrap();
        assert_eq!(a[[0, 1]], 1.0);
        assert_eq!(a[[0, 3]], 3.0);
        assert_eq!(a[[1, 2]], 4.0);
        assert_eq!(a[[2, 3]], 6.0);
        assert_eq!(a[[3, 2]], 6.0);
        for i in 0..4 {
            assert_eq!(a[[i, i]], 0.0);
        }
    }

    #[test]
    fn test_laplacian_from_weights_path() {
        // Path graph 0 -- 1 -- 2 with unit weights.
        let lap = laplacian_from_weights(&array![1.0, 0.0, 1.0]).unwrap();
        let expected = array![[1.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 1.0]];
        assert_eq!(lap, expected);
        let adj = adjacency_from_weights(&array![1.0, 0.0, 1.0]).unwrap();
        assert_eq!(lap, crate::adjacency_to_laplacian(&adj));
    }

    #[test]
    fn test_laplacian_to_weights_inverts() {
        let w = array![0.5, 0.0, 2.0, 1.5, 0.25, 3.0];
        let lap = laplacian_from_weights(&w).unwrap();
        assert_eq!(laplacian_to_weights(&lap).unwrap(), w);
    }

    #[test]
    fn test_laplacian_adjoint_small() {
        let m = array![[1.0, 2.0, 3.0], [2.0, 4.0, 5.0], [3.0, 5.0, 6.0]];
        let w = laplacian_adjoint(&m).unwrap();
        // (0,1): 1 + 4 - 4, (0,2): 1 + 6 - 6, (1,2): 4 + 6 - 10
        assert_eq!(w, array![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_non_square_rejected() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(matches!(laplacian_adjoint(&m), Err(Error::NotSquare(2, 3))));
        assert!(matches!(weights_from_adjacency(&m), Err(Error::NotSquare(2, 3))));
        assert!(matches!(laplacian_to_weights(&m), Err(Error::NotSquare(2, 3))));
    }

    fn weights_strategy() -> impl Strategy<Value = (usize, Vec<f64>)> {
        (2usize..12).prop_flat_map(|n| {
            (Just(n), prop::collection::vec(-2.0f64..2.0, num_edges(n)))
        })
    }

    proptest! {
        #[test]
        fn prop_adjacency_round_trip((n, w) in weights_strategy()) {
            let w = Array1::from(w);
            let a = adjacency_from_weights(&w).unwrap();
            prop_assert_eq!(a.nrows(), n);
            let back = weights_from_adjacency(&a).unwrap();
            prop_assert_eq!(&back, &w);
            prop_assert_eq!(adjacency_from_weights(&back).unwrap(), a);
        }

        #[test]
        fn prop_laplacian_is_valid((n, w) in weights_strategy()) {
            let lap = laplacian_from_weights(&Array1::from(w)).unwrap();
            for i in 0..n {
                prop_assert!(lap.row(i).sum().abs() <= 1e-10, "row {} sum {}", i, lap.row(i).sum());
                for j in 0..n {
                    prop_assert!((lap[[i, j]] - lap[[j, i]]).abs() <= 1e-12);
                }
            }
        }

        #[test]
        fn prop_laplacian_adjoint_identity(
            (n, w) in weights_strategy(),
            raw in prop::collection::vec(-3.0f64..3.0, 144),
        ) {
            let w = Array1::from(w);
            let mut m = Array2::<f64>::zeros((n, n));
            for i in 0..n {
                for j in i..n {
                    let v = raw[i * 12 + j];
                    m[[i, j]] = v;
                    m[[j, i]] = v;
                }
            }

            let lhs = frobenius_inner(&laplacian_from_weights(&w).unwrap(), &m);
            let rhs = w.dot(&laplacian_adjoint(&m).unwrap());
            prop_assert!((lhs - rhs).abs() <= 1e-9 * (1.0 + lhs.abs()), "lhs={} rhs={}", lhs, rhs);
        }

        #[test]
        fn prop_adjacency_adjoint_identity(
            (n, w) in weights_strategy(),
            raw in prop::collection::vec(-3.0f64..3.0, 144),
        ) {
            // <A(w), M>_F = 2 <w, triu(M)> for symmetric M.
            let w = Array1::from(w);
            let mut m = Array2::<f64>::zeros((n, n));
            for i in 0..n {
                for j in i..n {
                    m[[i, j]] = raw[i * 12 + j];
                    m[[j, i]] = raw[i * 12 + j];
                }
            }
            let lhs = frobenius_inner(&adjacency_from_weights(&w).unwrap(), &m);
            let rhs = 2.0 * w.dot(&weights_from_adjacency(&m).unwrap());
            prop_assert!((lhs - rhs).abs() <= 1e-9 * (1.0 + lhs.abs()));
        }
    }
}
