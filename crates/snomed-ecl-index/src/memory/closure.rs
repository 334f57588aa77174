//! IS-A closure used to derive the hierarchy fields of concept documents.

use std::collections::{BTreeSet, HashMap, VecDeque};

use snomed_ecl::SctId;

/// Direct parents and transitive ancestors of every concept in an IS-A graph.
#[derive(Debug, Default)]
pub(crate) struct HierarchyClosure {
    parents: HashMap<SctId, BTreeSet<SctId>>,
    ancestors: HashMap<SctId, BTreeSet<SctId>>,
    max_depth: usize,
}

impl HierarchyClosure {
    /// Builds the closure from `(child, parent)` edges.
    pub fn build(edges: impl IntoIterator<Item = (SctId, SctId)>) -> Self {
        let mut parents: HashMap<SctId, BTreeSet<SctId>> = HashMap::new();
        for (child, parent) in edges {
            parents.entry(child).or_default().insert(parent);
        }

        let mut ancestors = HashMap::with_capacity(parents.len());
        let mut max_depth = 0;
        for &concept_id in parents.keys() {
            let (concept_ancestors, depth) = Self::compute_ancestors(concept_id, &parents);
            max_depth = max_depth.max(depth);
            ancestors.insert(concept_id, concept_ancestors);
        }

        Self {
            parents,
            ancestors,
            max_depth,
        }
    }

    /// Breadth-first walk up the graph. Cycles terminate because every
    /// concept is enqueued at most once.
    fn compute_ancestors(
        concept_id: SctId,
        parents: &HashMap<SctId, BTreeSet<SctId>>,
    ) -> (BTreeSet<SctId>, usize) {
        let mut result = BTreeSet::new();
        let mut queue = VecDeque::new();

        if let Some(direct_parents) = parents.get(&concept_id) {
            for &parent_id in direct_parents {
                if result.insert(parent_id) {
                    queue.push_back((parent_id, 1));
                }
            }
        }

        let mut depth = 0;
        while let Some((current, level)) = queue.pop_front() {
            depth = depth.max(level);
            if let Some(current_parents) = parents.get(&current) {
                for &parent_id in current_parents {
                    if result.insert(parent_id) {
                        queue.push_back((parent_id, level + 1));
                    }
                }
            }
        }

        result.remove(&concept_id);
        (result, depth)
    }

    pub fn parents(&self, concept_id: SctId) -> BTreeSet<SctId> {
        self.parents.get(&concept_id).cloned().unwrap_or_default()
    }

    /// Ancestors that are not direct parents.
    pub fn indirect_ancestors(&self, concept_id: SctId) -> BTreeSet<SctId> {
        let direct = self.parents.get(&concept_id);
        self.ancestors
            .get(&concept_id)
            .map(|all| {
                all.iter()
                    .filter(|id| !direct.is_some_and(|parents| parents.contains(*id)))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.parents.values().map(BTreeSet::len).sum()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ```text
    /// 100 (root)
    ///  |-- 200
    ///  |    |-- 400
    ///  |    |-- 500
    ///  |-- 300
    ///       |-- 600
    ///       |-- 500
    /// ```
    fn create_test_closure() -> HierarchyClosure {
        HierarchyClosure::build([
            (200, 100),
            (300, 100),
            (400, 200),
            (500, 200),
            (500, 300),
            (600, 300),
        ])
    }

    #[test]
    fn test_parents() {
        let closure = create_test_closure();
        assert_eq!(closure.parents(500), BTreeSet::from([200, 300]));
        assert!(closure.parents(100).is_empty());
        assert_eq!(closure.edge_count(), 6);
    }

    #[test]
    fn test_indirect_ancestors_exclude_parents() {
        let closure = create_test_closure();
        assert_eq!(closure.indirect_ancestors(400), BTreeSet::from([100]));
        assert_eq!(closure.indirect_ancestors(500), BTreeSet::from([100]));
        assert!(closure.indirect_ancestors(200).is_empty());
        assert_eq!(closure.max_depth(), 2);
    }

    #[test]
    fn test_cycle_terminates() {
        let closure = HierarchyClosure::build([(1, 2), (2, 3), (3, 1)]);
        assert_eq!(closure.parents(1), BTreeSet::from([2]));
        assert_eq!(closure.indirect_ancestors(1), BTreeSet::from([3]));
    }
}
