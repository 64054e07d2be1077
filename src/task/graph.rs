//! Dependency graph resolution for submitted task sets.
//!
//! Validates the dependency relation (unique ids, no dangling references,
//! acyclic), produces a topological order, and computes dependency levels for
//! the parallel execution strategy.

use std::collections::{HashMap, HashSet};

use crate::error::{ConvoyError, Result};
use crate::task::AgentTask;

/// Three-color marking for the DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Validates a task set and returns the tasks in topological order: every
/// task appears after all tasks it depends on.
pub fn resolve_order(tasks: &[AgentTask]) -> Result<Vec<AgentTask>> {
    let ids = validate(tasks)?;
    let by_id: HashMap<&str, &AgentTask> =
        tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut marks: HashMap<&str, Mark> =
        ids.iter().map(|id| (*id, Mark::Unvisited)).collect();
    let mut order: Vec<&AgentTask> = Vec::with_capacity(tasks.len());

    // Visit in submission order so the result is stable for a given input.
    for task in tasks {
        visit(task.id.as_str(), &by_id, &mut marks, &mut order)?;
    }

    Ok(order.into_iter().cloned().collect())
}

/// Groups tasks into dependency levels: a task's level is one more than the
/// deepest of its dependencies, so a dependency never shares a level with its
/// dependent. Levels are returned innermost-first and preserve submission
/// order within a level.
pub fn dependency_levels(tasks: &[AgentTask]) -> Result<Vec<Vec<AgentTask>>> {
    let ordered = resolve_order(tasks)?;

    let mut level_of: HashMap<String, usize> = HashMap::new();
    let mut levels: Vec<Vec<AgentTask>> = Vec::new();

    for task in ordered {
        let level = task
            .depends_on
            .iter()
            .filter_map(|dep| level_of.get(dep))
            .max()
            .map(|deepest| deepest + 1)
            .unwrap_or(0);

        level_of.insert(task.id.clone(), level);
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(task);
    }

    Ok(levels)
}

/// Checks id uniqueness and dependency references; returns the id set.
fn validate(tasks: &[AgentTask]) -> Result<HashSet<&str>> {
    let mut ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !ids.insert(task.id.as_str()) {
            return Err(ConvoyError::DuplicateTask(task.id.clone()));
        }
    }

    for task in tasks {
        for dep in &task.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(ConvoyError::Validation(format!(
                    "task {} depends on unknown task {}",
                    task.id, dep
                )));
            }
        }
    }

    Ok(ids)
}

fn visit<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a AgentTask>,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<&'a AgentTask>,
) -> Result<()> {
    match marks.get(id) {
        Some(Mark::Visited) => return Ok(()),
        Some(Mark::Visiting) => {
            return Err(ConvoyError::CircularDependency {
                task_id: id.to_string(),
            });
        }
        _ => {}
    }

    marks.insert(id, Mark::Visiting);

    let task = by_id[id];
    for dep in &task.depends_on {
        visit(dep.as_str(), by_id, marks, order)?;
    }

    marks.insert(id, Mark::Visited);
    order.push(task);
    Ok(())
}
