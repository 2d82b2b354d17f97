//! Default system prompts bundled at compile time.

/// Requirement analyst - turns the brief into a requirements document
pub const REQUIREMENT: &str = include_str!("defaults/requirement.md");

/// Planner - breaks requirements into a task DAG
pub const PLANNER: &str = include_str!("defaults/planner.md");

/// Executor - implements one task at a time
pub const EXECUTOR: &str = include_str!("defaults/executor.md");

/// QA - reviews generated files against the requirements
pub const QA: &str = include_str!("defaults/qa.md");

/// Reporting - writes the final delivery report
pub const REPORTING: &str = include_str!("defaults/reporting.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("requirement", REQUIREMENT),
        ("planner", PLANNER),
        ("executor", EXECUTOR),
        ("qa", QA),
        ("reporting", REPORTING),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompts_non_empty() {
        for (slug, content) in all_defaults() {
            assert!(content.len() > 50, "Prompt '{}' seems too short", slug);
        }
    }
}
