//! # Policy Emission Order
//!
//! Depth-first ordering over the policy dependency graph. Each call frame marks its
//! policy as "visiting" only while it is on the stack, so a policy reached twice via
//! different routes (a diamond) is fine, while a policy reached again from inside its
//! own subtree is a cycle.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::core::error::{BundleError, BundleResult};

/// Order `graph` so that every policy follows the policies it depends on
///
/// Policies in `excluded` (service implementations) are neither emitted nor followed.
/// Fails with the ordered list of paths forming the first cycle found.
pub fn policy_order(
    graph: &BTreeMap<String, BTreeSet<String>>,
    excluded: &BTreeSet<String>,
) -> BundleResult<Vec<String>> {
    let mut orderer = Orderer {
        graph,
        excluded,
        emitted: HashSet::new(),
        visiting: Vec::new(),
        output: Vec::with_capacity(graph.len()),
    };

    for path in graph.keys() {
        if orderer.should_skip(path) {
            continue;
        }
        orderer.visit(path)?;
    }
    Ok(orderer.output)
}

struct Orderer<'a> {
    graph: &'a BTreeMap<String, BTreeSet<String>>,
    excluded: &'a BTreeSet<String>,
    emitted: HashSet<&'a str>,
    visiting: Vec<&'a str>,
    output: Vec<String>,
}

impl<'a> Orderer<'a> {
    fn should_skip(&self, path: &str) -> bool {
        self.emitted.contains(path) || self.excluded.contains(path)
    }

    fn visit(&mut self, path: &'a str) -> BundleResult<()> {
        if let Some(start) = self.visiting.iter().position(|p| *p == path) {
            let mut cycle: Vec<String> = self.visiting[start..].iter().map(|p| p.to_string()).collect();
            cycle.push(path.to_string());
            return Err(BundleError::PolicyCycle { cycle });
        }

        let graph = self.graph;
        self.visiting.push(path);
        if let Some(dependencies) = graph.get(path) {
            for dependency in dependencies {
                if self.should_skip(dependency) || !graph.contains_key(dependency) {
                    continue;
                }
                self.visit(dependency)?;
            }
        }
        self.visiting.pop();

        self.emitted.insert(path);
        self.output.push(path.to_string());
        Ok(())
    }
}
