//! Blinded presentation order of tiles.
//!
//! A case shows its tiles in a random order so the annotator cannot infer
//! spatial adjacency from consecutive tiles. The permutation is drawn once
//! when the case is initialized and persisted with the store; annotations
//! are keyed by presentation index, so the map must never be regenerated.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{CaseError, Result};

/// Bijection from presentation index to real (row-major) tile index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomizationMap {
    /// `real_of[presentation] = real`
    real_of: Vec<usize>,
}

impl RandomizationMap {
    /// Draw a uniformly random permutation of `0..grid_size` from `rng`.
    pub fn initialize<R: Rng + ?Sized>(grid_size: usize, rng: &mut R) -> Self {
        let mut real_of: Vec<usize> = (0..grid_size).collect();
        real_of.shuffle(rng);
        log::debug!("Drew randomization map over {} tiles", grid_size);
        Self { real_of }
    }

    /// Deterministic permutation for a given seed.
    pub fn with_seed(grid_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::initialize(grid_size, &mut rng)
    }

    /// Permutation drawn from the thread-local generator.
    pub fn random(grid_size: usize) -> Self {
        Self::initialize(grid_size, &mut rand::rng())
    }

    /// Rebuild a map from a persisted permutation, checking it is a bijection.
    pub fn from_permutation(real_of: Vec<usize>) -> Result<Self> {
        let n = real_of.len();
        let mut seen = vec![false; n];
        for (presentation, &real) in real_of.iter().enumerate() {
            if real >= n {
                return Err(CaseError::corrupt(format!(
                    "tile {} maps to real index {} outside 0..{}",
                    presentation, real, n
                )));
            }
            if std::mem::replace(&mut seen[real], true) {
                return Err(CaseError::corrupt(format!(
                    "real index {} is mapped more than once",
                    real
                )));
            }
        }
        Ok(Self { real_of })
    }

    /// Real tile index shown at `presentation_index`.
    pub fn resolve(&self, presentation_index: usize) -> Result<usize> {
        self.real_of
            .get(presentation_index)
            .copied()
            .ok_or(CaseError::OutOfRange {
                index: presentation_index,
                len: self.real_of.len(),
            })
    }

    /// Presentation index of a real tile. Linear scan.
    pub fn presentation_of(&self, real_index: usize) -> Option<usize> {
        self.real_of.iter().position(|&r| r == real_index)
    }

    pub fn len(&self) -> usize {
        self.real_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real_of.is_empty()
    }

    /// `(presentation, real)` pairs in presentation order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.real_of.iter().copied().enumerate()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.real_of
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bijection(map: &RandomizationMap) {
        let mut seen = vec![0usize; map.len()];
        for p in 0..map.len() {
            seen[map.resolve(p).unwrap()] += 1;
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_is_bijection_for_many_sizes() {
        for n in [1, 2, 3, 10, 25, 961] {
            let map = RandomizationMap::random(n);
            assert_eq!(map.len(), n);
            assert_bijection(&map);
        }
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = RandomizationMap::with_seed(100, 7);
        let b = RandomizationMap::with_seed(100, 7);
        let c = RandomizationMap::with_seed(100, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_bijection(&a);
    }

    #[test]
    fn test_resolve_out_of_range() {
        let map = RandomizationMap::with_seed(4, 1);
        assert!(matches!(
            map.resolve(4),
            Err(CaseError::OutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_presentation_of_inverts_resolve() {
        let map = RandomizationMap::with_seed(30, 3);
        for (p, r) in map.iter() {
            assert_eq!(map.presentation_of(r), Some(p));
        }
        assert_eq!(map.presentation_of(30), None);
    }

    #[test]
    fn test_from_permutation_rejects_duplicates() {
        assert!(RandomizationMap::from_permutation(vec![2, 0, 1]).is_ok());
        assert!(matches!(
            RandomizationMap::from_permutation(vec![0, 0, 1]),
            Err(CaseError::CorruptStore { .. })
        ));
        assert!(matches!(
            RandomizationMap::from_permutation(vec![0, 3, 1]),
            Err(CaseError::CorruptStore { .. })
        ));
    }
}
