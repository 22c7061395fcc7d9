//! Column permutation shared across matrices

use ndarray::{Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::{Error, Result};

/// Draw a uniformly random permutation of `0..n`.
pub fn random_permutation<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(rng);
    idx
}

/// Reorder the columns of `x` so that output column `i` is input column `idx[i]`.
///
/// When `idx` is `None` a fresh permutation is drawn from `rng`. The
/// permutation used is returned so it can be applied to further matrices.
///
/// # Errors
///
/// Returns `InvalidInput` if `idx` is not a permutation of `0..x.ncols()`.
pub fn permute_cols<R: Rng + ?Sized>(
    x: &Array2<f32>,
    idx: Option<&[usize]>,
    rng: &mut R,
) -> Result<(Array2<f32>, Vec<usize>)> {
    let (mut permuted, idx) = permute_cols_all(&[x.view()], idx, rng)?;
    let x = permuted
        .pop()
        .ok_or_else(|| Error::InvalidInput("no matrix to permute".to_string()))?;
    Ok((x, idx))
}

/// Apply one column permutation to every matrix in `xs`.
///
/// All matrices receive the identical reordering, so column `i` of every
/// output corresponds to the same original column `idx[i]`.
///
/// # Errors
///
/// Returns `InvalidInput` if `xs` is empty or `idx` is not a permutation,
/// and `DataIntegrity` if the matrices differ in width.
pub fn permute_cols_all<R: Rng + ?Sized>(
    xs: &[ArrayView2<'_, f32>],
    idx: Option<&[usize]>,
    rng: &mut R,
) -> Result<(Vec<Array2<f32>>, Vec<usize>)> {
    let n_cols = xs
        .first()
        .map(|x| x.ncols())
        .ok_or_else(|| Error::InvalidInput("no matrix to permute".to_string()))?;

    if let Some(x) = xs.iter().find(|x| x.ncols() != n_cols) {
        return Err(Error::DataIntegrity(format!(
            "cannot share a column permutation between widths {n_cols} and {}",
            x.ncols()
        )));
    }

    let idx = match idx {
        Some(idx) => {
            check_permutation(idx, n_cols)?;
            idx.to_vec()
        }
        None => random_permutation(n_cols, rng),
    };

    let permuted = xs.iter().map(|x| x.select(Axis(1), &idx)).collect();
    Ok((permuted, idx))
}

fn check_permutation(idx: &[usize], n: usize) -> Result<()> {
    if idx.len() != n {
        return Err(Error::InvalidInput(format!(
            "permutation has {} entries, matrix has {n} columns",
            idx.len()
        )));
    }
    let mut seen = vec![false; n];
    for &i in idx {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(Error::InvalidInput(format!("column {i} appears twice")));
            }
            None => {
                return Err(Error::InvalidInput(format!("column {i} out of range 0..{n}")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_explicit_permutation() {
        let x = array![[0., 1., 2.], [3., 4., 5.]];
        let mut rng = StdRng::seed_from_u64(0);

        let (permuted, idx) = permute_cols(&x, Some(&[2, 0, 1][..]), &mut rng).unwrap();
        assert_eq!(idx, vec![2, 0, 1]);
        assert_eq!(permuted, array![[2., 0., 1.], [5., 3., 4.]]);
    }

    #[test]
    fn test_shared_permutation_across_matrices() {
        let train = array![[0., 1., 2., 3.], [4., 5., 6., 7.]];
        let valid = array![[10., 11., 12., 13.]];
        let mut rng = StdRng::seed_from_u64(5);

        let (out, idx) = permute_cols_all(&[train.view(), valid.view()], None, &mut rng).unwrap();

        for (i, &src) in idx.iter().enumerate() {
            assert_eq!(out[0].column(i), train.column(src));
            assert_eq!(out[1].column(i), valid.column(src));
        }
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let a = Array2::<f32>::zeros((2, 3));
        let b = Array2::<f32>::zeros((2, 4));
        let mut rng = StdRng::seed_from_u64(0);

        let err = permute_cols_all(&[a.view(), b.view()], None, &mut rng).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_invalid_permutations_rejected() {
        let x = Array2::<f32>::zeros((1, 3));
        let mut rng = StdRng::seed_from_u64(0);

        for bad in [&[0, 1][..], &[0, 0, 1][..], &[0, 1, 3][..]] {
            let err = permute_cols(&x, Some(bad), &mut rng).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_random_permutation_is_permutation() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut idx = random_permutation(100, &mut rng);
        idx.sort_unstable();
        assert_eq!(idx, (0..100).collect::<Vec<_>>());
    }
}
