//! Shared cache of configuration-keyed precomputations.
//!
//! The index set and the regularization matrix depend only on
//! (radial order, scale). Callers fitting many volumes with different
//! gradient tables but the same basis configuration can share one
//! [`BasisCache`] to build those once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ndarray::Array2;

use crate::basis::{index_set, BasisIndex};
use crate::laplace::laplace_reg_matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    radial_order: usize,
    mu_bits: u64,
}

/// One cached configuration: the basis index set and its Laplacian
/// regularization matrix.
#[derive(Debug)]
pub struct CacheEntry {
    pub indices: Vec<BasisIndex>,
    pub regularization: Array2<f64>,
}

/// Bounded map from (radial order, scale) to shared precomputations.
///
/// The lock is held across a build, so each key is built at most once even
/// under concurrent access; afterwards readers clone `Arc`s and never see a
/// partially built entry. Entries are small and cheap to recompute, so there
/// is no eviction: once the cap is reached, further configurations are
/// computed without being stored.
#[derive(Debug)]
pub struct BasisCache {
    entries: Mutex<HashMap<CacheKey, Arc<CacheEntry>>>,
    capacity: usize,
}

impl Default for BasisCache {
    fn default() -> Self {
        BasisCache::new(32)
    }
}

impl BasisCache {
    pub fn new(capacity: usize) -> Self {
        BasisCache {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Fetch the entry for (radial order, scale), building and storing it on
    /// first use. The scale is keyed by its exact bit pattern.
    pub fn get_or_build(&self, radial_order: usize, mu: f64) -> Arc<CacheEntry> {
        let key = CacheKey {
            radial_order,
            mu_bits: mu.to_bits(),
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = entries.get(&key) {
            return Arc::clone(hit);
        }
        let entry = Arc::new(CacheEntry {
            indices: index_set(radial_order),
            regularization: laplace_reg_matrix(radial_order, mu),
        });
        if entries.len() < self.capacity {
            entries.insert(key, Arc::clone(&entry));
        }
        entry
    }

    /// Number of stored configurations.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
