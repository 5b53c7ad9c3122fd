use serde::Serialize;
use std::collections::VecDeque;
use std::ops::Index;

use crate::candidate::{Candidate, CandidateId};

/// Arena of candidates with parent/child edges stored as indices.
///
/// Edges are only added through [`CandidateGraph::link`], which keeps every
/// candidate's nest level equal to the maximum over its parents plus one.
/// Levels only ever grow. Cycles are tolerated: a level can never exceed the
/// number of nodes along an acyclic path, so propagation stops there.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CandidateGraph {
    nodes: Vec<Candidate>,
}

impl CandidateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `candidate` as a root. Any edges it carried are discarded.
    pub fn insert(&mut self, mut candidate: Candidate) -> CandidateId {
        candidate.reset_edges();
        let id = CandidateId(self.nodes.len());
        self.nodes.push(candidate);
        id
    }

    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CandidateId, &Candidate)> {
        self.nodes.iter().enumerate().map(|(i, c)| (CandidateId(i), c))
    }

    pub fn roots(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.iter()
            .filter(|(_, c)| c.parents().is_empty())
            .map(|(id, _)| id)
    }

    /// Records `parent` as an owner of `child` and raises the nest level of
    /// `child` and its descendants where needed.
    ///
    /// Returns `false` when the edge already existed or would be a self loop.
    pub fn link(&mut self, parent: CandidateId, child: CandidateId) -> bool {
        if parent == child || parent.0 >= self.nodes.len() || child.0 >= self.nodes.len() {
            return false;
        }
        if !self.nodes[child.0].add_parent(parent) {
            return false;
        }
        self.nodes[parent.0].add_child(child);
        let level = self.nodes[parent.0].nest_level() + 1;
        self.raise(child, level);
        true
    }

    fn raise(&mut self, start: CandidateId, level: u32) {
        let ceiling = self.nodes.len() as u32;
        let mut queue = VecDeque::from([(start, level)]);
        while let Some((id, level)) = queue.pop_front() {
            if level > ceiling {
                continue;
            }
            let node = &mut self.nodes[id.0];
            if level <= node.nest_level() {
                continue;
            }
            node.set_nest_level(level);
            for &child in node.children() {
                queue.push_back((child, level + 1));
            }
        }
    }

    /// Candidate ids ordered by case-insensitive identifier, then path.
    pub fn sorted_by_id(&self) -> Vec<CandidateId> {
        let mut ids: Vec<CandidateId> = (0..self.nodes.len()).map(CandidateId).collect();
        ids.sort_by(|a, b| {
            let (ca, cb) = (&self.nodes[a.0], &self.nodes[b.0]);
            ca.id
                .to_lowercase()
                .cmp(&cb.id.to_lowercase())
                .then_with(|| ca.file.cmp(&cb.file))
        });
        ids
    }

    /// Consumes the graph, yielding candidates in insertion order.
    pub fn into_candidates(self) -> Vec<Candidate> {
        self.nodes
    }
}

impl Index<CandidateId> for CandidateGraph {
    type Output = Candidate;

    fn index(&self, id: CandidateId) -> &Candidate {
        &self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn node(graph: &mut CandidateGraph, name: &str) -> CandidateId {
        graph.insert(Candidate::new(PathBuf::from(format!("{name}.jar"))))
    }

    #[test]
    fn nest_level_is_max_over_parents() {
        let mut g = CandidateGraph::new();
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        let c = node(&mut g, "c");
        let shared = node(&mut g, "shared");

        assert!(g.link(a, b));
        assert!(g.link(b, c));
        assert!(g.link(a, shared));
        assert_eq!(g[shared].nest_level(), 1);

        // A deeper parent raises the level; a shallower one never lowers it.
        assert!(g.link(c, shared));
        assert_eq!(g[shared].nest_level(), 3);
        let d = node(&mut g, "d");
        assert!(g.link(d, shared));
        assert_eq!(g[shared].nest_level(), 3);
        assert_eq!(g[shared].parents().len(), 3);
    }

    #[test]
    fn raising_a_parent_propagates_to_descendants() {
        let mut g = CandidateGraph::new();
        let top = node(&mut g, "top");
        let mid = node(&mut g, "mid");
        let leaf = node(&mut g, "leaf");
        g.link(mid, leaf);
        assert_eq!(g[leaf].nest_level(), 1);

        g.link(top, mid);
        assert_eq!(g[mid].nest_level(), 1);
        assert_eq!(g[leaf].nest_level(), 2);
    }

    #[test]
    fn duplicate_edges_and_self_loops_are_ignored() {
        let mut g = CandidateGraph::new();
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        assert!(g.link(a, b));
        assert!(!g.link(a, b));
        assert!(!g.link(a, a));
        assert_eq!(g[a].children(), &[b]);
    }

    #[test]
    fn cycles_terminate() {
        let mut g = CandidateGraph::new();
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        g.link(a, b);
        g.link(b, a);
        assert!(g[a].nest_level() <= g.len() as u32 + 1);
        assert_eq!(g.roots().count(), 0);
    }

    #[test]
    fn sorts_case_insensitively() {
        let mut g = CandidateGraph::new();
        node(&mut g, "beta");
        node(&mut g, "Alpha");
        let order: Vec<_> = g.sorted_by_id().into_iter().map(|id| g[id].id.clone()).collect();
        assert_eq!(order, vec!["Alpha.jar", "beta.jar"]);
    }
}
