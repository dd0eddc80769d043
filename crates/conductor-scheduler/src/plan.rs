//! DAG validation and wave planning.
//!
//! `plan_waves` is a pure function of its input:
//! same dispatch batch in, same wave sequence out.

use std::collections::HashMap;

use conductor_core::dispatch::DispatchParams;

use crate::error::SchedulerError;

/// Validates the dispatch batch and resolves it into an ordered sequence of
/// waves — maximal sets of `agent_id`s whose dependencies are all satisfied
/// by earlier waves.
pub fn plan_waves(dispatches: &HashMap<String, DispatchParams>) -> Result<Vec<Vec<String>>, SchedulerError> {
    for dispatch in dispatches.values() {
        for dep in &dispatch.depends_on {
            if !dispatches.contains_key(dep) {
                return Err(SchedulerError::UnknownDependency(dep.clone()));
            }
        }
    }

    let mut indegree: HashMap<&str, usize> =
        dispatches.iter().map(|(id, d)| (id.as_str(), d.depends_on.len())).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, d) in dispatches {
        for dep in &d.depends_on {
            dependents.entry(dep.as_str()).or_default().push(id.as_str());
        }
    }

    let mut waves: Vec<Vec<String>> = Vec::new();
    let mut frontier: Vec<&str> =
        indegree.iter().filter(|(_, &deg)| deg == 0).map(|(id, _)| *id).collect();
    let mut processed = 0usize;

    while !frontier.is_empty() {
        frontier.sort_unstable();
        processed += frontier.len();
        waves.push(frontier.iter().map(|s| s.to_string()).collect());

        let mut next_frontier = Vec::new();
        for id in &frontier {
            if let Some(deps) = dependents.get(id) {
                for dependent in deps {
                    let deg = indegree.get_mut(dependent).expect("dependent must be in indegree map");
                    *deg -= 1;
                    if *deg == 0 {
                        next_frontier.push(*dependent);
                    }
                }
            }
        }
        frontier = next_frontier;
    }

    if processed != dispatches.len() {
        return Err(SchedulerError::CycleDetected);
    }

    Ok(waves)
}

/// Flattens a wave plan into a single ordered list, for checking the
/// topological-sort validity law.
pub fn flatten(waves: &[Vec<String>]) -> Vec<String> {
    waves.iter().flatten().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(agent_id: &str, depends_on: &[&str]) -> DispatchParams {
        DispatchParams {
            agent_id: agent_id.to_string(),
            mission: "test".to_string(),
            skills: Default::default(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            max_tool_calls: 5,
            context_files: Vec::new(),
            model_override: None,
            context: None,
        }
    }

    fn batch(entries: &[(&str, &[&str])]) -> HashMap<String, DispatchParams> {
        entries.iter().map(|(id, deps)| (id.to_string(), dispatch(id, deps))).collect()
    }

    #[test]
    fn empty_batch_yields_no_waves() {
        let waves = plan_waves(&HashMap::new()).unwrap();
        assert!(waves.is_empty());
    }

    #[test]
    fn singleton_with_no_deps_is_one_wave_one_member() {
        let waves = plan_waves(&batch(&[("a", &[])])).unwrap();
        assert_eq!(waves, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn diamond_dependency_resolves_to_three_waves() {
        let waves = plan_waves(&batch(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])])).unwrap();
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["a".to_string()]);
        assert_eq!(waves[1], vec!["b".to_string(), "c".to_string()]);
        assert_eq!(waves[2], vec!["d".to_string()]);
    }

    #[test]
    fn cycle_is_detected() {
        let err = plan_waves(&batch(&[("a", &["b"]), ("b", &["a"])])).unwrap_err();
        assert_eq!(err, SchedulerError::CycleDetected);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = plan_waves(&batch(&[("a", &["ghost"])])).unwrap_err();
        assert_eq!(err, SchedulerError::UnknownDependency("ghost".to_string()));
    }

    #[test]
    fn planning_is_deterministic() {
        let b = batch(&[("a", &[]), ("b", &["a"]), ("c", &["a"])]);
        let waves1 = plan_waves(&b).unwrap();
        let waves2 = plan_waves(&b).unwrap();
        assert_eq!(waves1, waves2);
    }

    #[test]
    fn flatten_is_a_valid_topological_order() {
        let b = batch(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
        let waves = plan_waves(&b).unwrap();
        let order = flatten(&waves);
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }
}
