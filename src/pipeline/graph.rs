//! Step dependency graph used for forward invalidation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{WorkbenchError, WorkbenchResult};

use super::StepKind;

#[derive(Debug, Clone, Default)]
pub struct StepGraph {
    edges: BTreeMap<StepKind, BTreeSet<StepKind>>,
}

impl StepGraph {
    /// Each step depends on the one before it.
    pub fn linear(order: &[StepKind]) -> Self {
        let mut graph = Self::default();
        for pair in order.windows(2) {
            graph.edges.entry(pair[0]).or_default().insert(pair[1]);
        }
        graph
    }

    pub fn pipeline() -> Self {
        Self::linear(&StepKind::ORDER)
    }

    pub fn add_dependency(
        &mut self,
        upstream: StepKind,
        downstream: StepKind,
    ) -> WorkbenchResult<()> {
        if upstream == downstream || self.reaches(downstream, upstream) {
            return Err(WorkbenchError::DependencyCycle {
                upstream,
                downstream,
            });
        }
        self.edges.entry(upstream).or_default().insert(downstream);
        Ok(())
    }

    /// Every step transitively depending on `kind`, in pipeline order.
    pub fn dependents(&self, kind: StepKind) -> Vec<StepKind> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([kind]);
        while let Some(current) = queue.pop_front() {
            if let Some(next) = self.edges.get(&current) {
                for step in next {
                    if found.insert(*step) {
                        queue.push_back(*step);
                    }
                }
            }
        }
        found.into_iter().collect()
    }

    fn reaches(&self, from: StepKind, to: StepKind) -> bool {
        self.dependents(from).contains(&to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_chain_invalidates_everything_after() {
        let graph = StepGraph::pipeline();
        assert_eq!(
            graph.dependents(StepKind::FixDuplicates),
            vec![
                StepKind::RecodeVariables,
                StepKind::CompositeScores,
                StepKind::RemoveColumns
            ]
        );
        assert!(graph.dependents(StepKind::RemoveColumns).is_empty());
    }

    #[test]
    fn branching_graph_only_reaches_dependents() {
        let mut graph = StepGraph::default();
        graph
            .add_dependency(StepKind::MissingValues, StepKind::CompositeScores)
            .unwrap();
        graph
            .add_dependency(StepKind::StandardizeVariables, StepKind::RecodeVariables)
            .unwrap();
        assert_eq!(
            graph.dependents(StepKind::MissingValues),
            vec![StepKind::CompositeScores]
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = StepGraph::pipeline();
        let err = graph
            .add_dependency(StepKind::RemoveColumns, StepKind::MissingValues)
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::DependencyCycle { .. }));
        assert!(
            graph
                .add_dependency(StepKind::FixDuplicates, StepKind::FixDuplicates)
                .is_err()
        );
    }
}
