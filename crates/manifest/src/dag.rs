// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline DAG validation and ordering.
//!
//! Cycle detection runs at load time; the scheduler then only ever sees
//! acyclic graphs. Topological order is stable: ties break by declaration
//! order, so the same pipeline always schedules the same way.

use crate::pipeline::{PipelineSpec, StepDef};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// DAG validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
    #[error("pipeline has no steps")]
    Empty,
    #[error("duplicate step id: {0}")]
    DuplicateStep(String),
    #[error("step {step} depends on undeclared step {dependency}")]
    UnknownDependency { step: String, dependency: String },
    #[error("dependency cycle: {}", .steps.join(" -> "))]
    Cycle { steps: Vec<String> },
}

/// Validate the dependency graph: declared ids only, no cycles.
pub fn validate_dag(pipeline: &PipelineSpec) -> Result<(), DagError> {
    if pipeline.steps.is_empty() {
        return Err(DagError::Empty);
    }

    let mut ids = HashSet::with_capacity(pipeline.steps.len());
    for step in &pipeline.steps {
        if !ids.insert(step.id.as_str()) {
            return Err(DagError::DuplicateStep(step.id.clone()));
        }
    }

    for step in &pipeline.steps {
        for dep in &step.dependencies {
            if !ids.contains(dep.as_str()) {
                return Err(DagError::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    detect_cycle(pipeline)
}

/// Depth-first search for a back-edge; reports the offending cycle with
/// every step on it.
fn detect_cycle(pipeline: &PipelineSpec) -> Result<(), DagError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let index: HashMap<&str, usize> = pipeline
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();
    let mut marks = vec![Mark::Unvisited; pipeline.steps.len()];

    // Iterative DFS; `path` tracks the current chain for cycle reporting.
    for start in 0..pipeline.steps.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        let mut path: Vec<usize> = vec![start];
        marks[start] = Mark::InProgress;

        while let Some(frame) = stack.len().checked_sub(1) {
            let (node, next_dep) = stack[frame];
            let deps = &pipeline.steps[node].dependencies;
            if next_dep >= deps.len() {
                marks[node] = Mark::Done;
                stack.pop();
                path.pop();
                continue;
            }
            let dep_name = &deps[next_dep];
            stack[frame].1 += 1;

            let dep = index[dep_name.as_str()];
            match marks[dep] {
                Mark::InProgress => {
                    // Back-edge: slice the current path from the repeated node.
                    let cycle_start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut steps: Vec<String> = path[cycle_start..]
                        .iter()
                        .map(|&n| pipeline.steps[n].id.clone())
                        .collect();
                    steps.push(pipeline.steps[dep].id.clone());
                    return Err(DagError::Cycle { steps });
                }
                Mark::Unvisited => {
                    marks[dep] = Mark::InProgress;
                    stack.push((dep, 0));
                    path.push(dep);
                }
                Mark::Done => {}
            }
        }
    }

    Ok(())
}

/// Stable topological order: Kahn's algorithm with declaration-order
/// tie-breaking. Callers must have run [`validate_dag`] first.
pub fn topological_order(pipeline: &PipelineSpec) -> Vec<&StepDef> {
    let index: HashMap<&str, usize> = pipeline
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; pipeline.steps.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); pipeline.steps.len()];
    for (i, step) in pipeline.steps.iter().enumerate() {
        for dep in &step.dependencies {
            if let Some(&d) = index.get(dep.as_str()) {
                in_degree[i] += 1;
                dependents[d].push(i);
            }
        }
    }

    let mut order = Vec::with_capacity(pipeline.steps.len());
    let mut ready: Vec<usize> = (0..pipeline.steps.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();

    while !ready.is_empty() {
        // Lowest declaration index first keeps the order deterministic.
        let pos = ready
            .iter()
            .enumerate()
            .min_by_key(|(_, &i)| i)
            .map(|(p, _)| p)
            .unwrap_or(0);
        let node = ready.swap_remove(pos);
        order.push(&pipeline.steps[node]);

        for &dependent in &dependents[node] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    order
}

/// Steps whose dependencies are all in the completed set and which are not
/// themselves completed or already dispatched.
pub fn ready_steps<'p>(
    pipeline: &'p PipelineSpec,
    completed: &HashSet<String>,
    dispatched: &HashSet<String>,
) -> Vec<&'p StepDef> {
    pipeline
        .steps
        .iter()
        .filter(|s| !completed.contains(&s.id) && !dispatched.contains(&s.id))
        .filter(|s| s.dependencies.iter().all(|d| completed.contains(d)))
        .collect()
}

#[cfg(test)]
#[path = "dag_tests.rs"]
mod tests;
