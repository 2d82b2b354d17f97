//! # Plan DAG
//!
//! Validation and scheduling helpers over a plan's task list. The dependency
//! relation is checked with petgraph before a plan may enter the shared state.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use super::project_state::{Task, TaskStatus};
use super::roster::AgentKind;
use crate::error::PlanError;

/// Reject empty plans, duplicate ids, dangling or self dependencies and cycles
pub fn validate_plan(tasks: &[Task]) -> Result<(), PlanError> {
    if tasks.is_empty() {
        return Err(PlanError::Empty);
    }

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for task in tasks {
        if index.contains_key(task.id.as_str()) {
            return Err(PlanError::DuplicateTask(task.id.clone()));
        }
        index.insert(task.id.as_str(), graph.add_node(task.id.as_str()));
    }

    for task in tasks {
        let to = index[task.id.as_str()];
        for dep in &task.dependencies {
            if dep == &task.id {
                return Err(PlanError::SelfDependency(task.id.clone()));
            }
            let from = index
                .get(dep.as_str())
                .ok_or_else(|| PlanError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                })?;
            graph.update_edge(*from, to, ());
        }
    }

    toposort(&graph, None)
        .map(|_| ())
        .map_err(|cycle| PlanError::Cycle(graph[cycle.node_id()].to_string()))
}

/// Ids of completed tasks
fn completed_ids(tasks: &[Task]) -> HashSet<&str> {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .map(|t| t.id.as_str())
        .collect()
}

/// Pending executor task whose dependencies are all completed
pub fn is_eligible(task: &Task, completed: &HashSet<&str>) -> bool {
    task.status == TaskStatus::Pending
        && task.assigned_to == AgentKind::Executor
        && task.dependencies.iter().all(|d| completed.contains(d.as_str()))
}

/// First eligible task in plan order
pub fn next_eligible(tasks: &[Task]) -> Option<&Task> {
    let completed = completed_ids(tasks);
    tasks.iter().find(|t| is_eligible(t, &completed))
}

/// Pending tasks that can never become eligible
pub fn blocked_tasks(tasks: &[Task]) -> Vec<&Task> {
    let completed = completed_ids(tasks);
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending && !is_eligible(t, &completed))
        .collect()
}

/// Copy of `tasks` with one task's status replaced
pub fn with_task_status(tasks: &[Task], id: &str, status: TaskStatus) -> Vec<Task> {
    tasks
        .iter()
        .map(|t| {
            if t.id == id {
                Task {
                    status,
                    ..t.clone()
                }
            } else {
                t.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Task> {
        vec![
            Task::new("1", "Setup"),
            Task::new("2", "Core").depends_on("1"),
            Task::new("3", "UI").depends_on("2"),
        ]
    }

    #[test]
    fn test_valid_chain_and_diamond() {
        assert!(validate_plan(&chain()).is_ok());

        let diamond = vec![
            Task::new("a", "A"),
            Task::new("b", "B").depends_on("a"),
            Task::new("c", "C").depends_on("a"),
            Task::new("d", "D").depends_on("b").depends_on("c"),
        ];
        assert!(validate_plan(&diamond).is_ok());
    }

    #[test]
    fn test_cycle_rejected() {
        let cyclic = vec![
            Task::new("1", "A").depends_on("3"),
            Task::new("2", "B").depends_on("1"),
            Task::new("3", "C").depends_on("2"),
        ];
        assert!(matches!(validate_plan(&cyclic), Err(PlanError::Cycle(_))));
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(validate_plan(&[]), Err(PlanError::Empty));

        let dup = vec![Task::new("1", "A"), Task::new("1", "B")];
        assert_eq!(validate_plan(&dup), Err(PlanError::DuplicateTask("1".into())));

        let selfdep = vec![Task::new("1", "A").depends_on("1")];
        assert_eq!(
            validate_plan(&selfdep),
            Err(PlanError::SelfDependency("1".into()))
        );

        let dangling = vec![Task::new("1", "A").depends_on("9")];
        assert_eq!(
            validate_plan(&dangling),
            Err(PlanError::UnknownDependency {
                task: "1".into(),
                dependency: "9".into()
            })
        );
    }

    #[test]
    fn test_eligibility_follows_dependencies() {
        let mut plan = chain();
        assert_eq!(next_eligible(&plan).map(|t| t.id.as_str()), Some("1"));

        plan = with_task_status(&plan, "1", TaskStatus::Completed);
        assert_eq!(next_eligible(&plan).map(|t| t.id.as_str()), Some("2"));

        plan = with_task_status(&plan, "2", TaskStatus::Failed);
        assert!(next_eligible(&plan).is_none());
        let blocked: Vec<_> = blocked_tasks(&plan).iter().map(|t| t.id.clone()).collect();
        assert_eq!(blocked, vec!["3"]);
    }

    #[test]
    fn test_non_executor_tasks_are_not_eligible() {
        let mut review = Task::new("1", "Review");
        review.assigned_to = AgentKind::Qa;
        assert!(next_eligible(&[review]).is_none());
    }
}
