use std::collections::HashMap;
use std::sync::RwLock;

use super::{Neighbor, SimilarityIndex};
use crate::embedding::{cosine_similarity, Fingerprint};
use crate::memory::MemoryError;

/// In-memory exact cosine scan. Not durable across restarts.
#[derive(Default)]
pub struct CosineScanIndex {
    users: RwLock<HashMap<String, Vec<Fingerprint>>>,
}

impl CosineScanIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimilarityIndex for CosineScanIndex {
    fn add(&self, user_id: &str, fingerprint: &Fingerprint) -> Result<usize, MemoryError> {
        let mut users = self.users.write().map_err(|_| MemoryError::Poisoned)?;
        let entries = users.entry(user_id.to_string()).or_default();
        entries.push(fingerprint.clone());
        Ok(entries.len() - 1)
    }

    fn search(
        &self,
        user_id: &str,
        query: &Fingerprint,
        k: usize,
    ) -> Result<Vec<Neighbor>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let users = self.users.read().map_err(|_| MemoryError::Poisoned)?;
        let Some(entries) = users.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<Neighbor> = entries
            .iter()
            .enumerate()
            .map(|(position, fp)| Neighbor {
                position,
                score: cosine_similarity(query.as_slice(), fp.as_slice()),
            })
            .collect();

        // Descending by similarity; earlier position wins ties.
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.position.cmp(&b.position))
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn len(&self, user_id: &str) -> Result<usize, MemoryError> {
        let users = self.users.read().map_err(|_| MemoryError::Poisoned)?;
        Ok(users.get(user_id).map_or(0, Vec::len))
    }

    fn fingerprint(
        &self,
        user_id: &str,
        position: usize,
    ) -> Result<Option<Fingerprint>, MemoryError> {
        let users = self.users.read().map_err(|_| MemoryError::Poisoned)?;
        Ok(users
            .get(user_id)
            .and_then(|entries| entries.get(position))
            .cloned())
    }

    fn truncate(&self, user_id: &str, len: usize) -> Result<(), MemoryError> {
        let mut users = self.users.write().map_err(|_| MemoryError::Poisoned)?;
        if let Some(entries) = users.get_mut(user_id) {
            entries.truncate(len);
        }
        Ok(())
    }

    fn clear(&self, user_id: &str) -> Result<(), MemoryError> {
        let mut users = self.users.write().map_err(|_| MemoryError::Poisoned)?;
        users.remove(user_id);
        Ok(())
    }

    fn strategy(&self) -> &'static str {
        "cosine-scan"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::index::test_support::{at_cosine, spike};

    #[test]
    fn test_top_k_ordering() {
        let index = CosineScanIndex::new();
        index.add("u1", &at_cosine(0.1)).unwrap();
        index.add("u1", &at_cosine(0.9)).unwrap();
        index.add("u1", &at_cosine(0.5)).unwrap();

        let hits = index.search("u1", &spike(0), 2).unwrap();
        let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert!((hits[0].score - 0.9).abs() < 1e-5);
        assert!((hits[1].score - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let index = CosineScanIndex::new();
        index.add("u1", &spike(5)).unwrap();
        index.add("u1", &spike(0)).unwrap();
        index.add("u1", &spike(0)).unwrap();
        index.add("u1", &spike(0)).unwrap();

        let hits = index.search("u1", &spike(0), 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_k_zero_and_saturation() {
        let index = CosineScanIndex::new();
        index.add("u1", &spike(0)).unwrap();
        index.add("u1", &spike(1)).unwrap();

        assert!(index.search("u1", &spike(0), 0).unwrap().is_empty());
        assert_eq!(index.search("u1", &spike(0), 5).unwrap().len(), 2);
        assert!(index.search("unknown", &spike(0), 5).unwrap().is_empty());
    }

    #[test]
    fn test_zero_fingerprints_score_zero() {
        let index = CosineScanIndex::new();
        index.add("u1", &Fingerprint::zero()).unwrap();
        index.add("u1", &spike(0)).unwrap();

        let hits = index.search("u1", &spike(0), 2).unwrap();
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[1], Neighbor { position: 0, score: 0.0 });

        let from_zero = index.search("u1", &Fingerprint::zero(), 2).unwrap();
        assert!(from_zero.iter().all(|n| n.score == 0.0));
    }

    #[test]
    fn test_users_are_isolated() {
        let index = CosineScanIndex::new();
        assert_eq!(index.add("u1", &spike(0)).unwrap(), 0);
        assert_eq!(index.add("u2", &spike(1)).unwrap(), 0);
        assert_eq!(index.add("u1", &spike(2)).unwrap(), 1);

        index.clear("u2").unwrap();
        assert_eq!(index.len("u1").unwrap(), 2);
        assert_eq!(index.len("u2").unwrap(), 0);
        assert_eq!(index.fingerprint("u1", 1).unwrap(), Some(spike(2)));
        assert_eq!(index.fingerprint("u1", 2).unwrap(), None);
    }

    #[test]
    fn test_truncate() {
        let index = CosineScanIndex::new();
        for dim in 0..4 {
            index.add("u1", &spike(dim)).unwrap();
        }
        index.truncate("u1", 1).unwrap();
        assert_eq!(index.len("u1").unwrap(), 1);
        assert_eq!(index.add("u1", &spike(9)).unwrap(), 1);
    }
}
