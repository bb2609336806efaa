//! Metric registry: static descriptors plus DAG dependency resolution (§4.4)
//!
//! Every metric class registers itself by tag at startup. The registry
//! resolves `required_metrics` into a DAG, verifies it (invariant (d): the
//! graph must be a DAG and topologically sortable at registry load), and
//! hands back an evaluation order the worker and records manager walk.

use std::collections::{HashMap, HashSet};

use crate::error::{MetricError, Result};
use crate::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricFlags(u32);

impl MetricFlags {
    pub const NONE: MetricFlags = MetricFlags(0);
    pub const STREAMING_ONLY: MetricFlags = MetricFlags(1 << 0);
    pub const STREAMING_TOKENS_ONLY: MetricFlags = MetricFlags(1 << 1);
    pub const PRODUCES_TOKENS_ONLY: MetricFlags = MetricFlags(1 << 2);
    pub const SUPPORTS_REASONING: MetricFlags = MetricFlags(1 << 3);
    pub const LARGER_IS_BETTER: MetricFlags = MetricFlags(1 << 4);
    pub const EXPERIMENTAL: MetricFlags = MetricFlags(1 << 5);
    pub const INTERNAL: MetricFlags = MetricFlags(1 << 6);
    pub const HIDDEN: MetricFlags = MetricFlags(1 << 7);
    pub const GOODPUT: MetricFlags = MetricFlags(1 << 8);
    pub const ERROR_ONLY: MetricFlags = MetricFlags(1 << 9);

    pub const fn union(self, other: MetricFlags) -> MetricFlags {
        MetricFlags(self.0 | other.0)
    }

    pub fn contains(self, flag: MetricFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for MetricFlags {
    type Output = MetricFlags;
    fn bitor(self, rhs: MetricFlags) -> MetricFlags {
        self.union(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Record,
    Aggregate,
    AggregateCounter,
    Derived,
}

/// Static metadata for one metric class.
#[derive(Debug, Clone)]
pub struct MetricClass {
    pub tag: &'static str,
    pub header: &'static str,
    pub short_header: &'static str,
    pub unit: Unit,
    pub display_unit: Option<Unit>,
    pub flags: MetricFlags,
    pub required_metrics: &'static [&'static str],
    pub display_order: i32,
    pub kind: MetricKind,
}

/// A run's enabled metric classes plus their resolved evaluation order.
pub struct MetricRegistry {
    classes: HashMap<&'static str, MetricClass>,
    order: Vec<&'static str>,
}

impl MetricRegistry {
    /// Build a registry from a set of classes, toposorting `required_metrics`.
    pub fn build(classes: Vec<MetricClass>) -> Result<Self> {
        let mut by_tag = HashMap::new();
        for class in classes {
            by_tag.insert(class.tag, class);
        }
        for class in by_tag.values() {
            for dep in class.required_metrics {
                if !by_tag.contains_key(dep) {
                    return Err(MetricError::UnknownTag((*dep).to_string()));
                }
            }
        }
        let order = topological_sort(&by_tag)?;
        Ok(Self { classes: by_tag, order })
    }

    pub fn class(&self, tag: &str) -> Option<&MetricClass> {
        self.classes.get(tag)
    }

    /// Evaluation order: a metric never precedes any metric in its
    /// `required_metrics`.
    pub fn evaluation_order(&self) -> &[&'static str] {
        &self.order
    }

    /// Enabled record-evaluable classes (`RecordMetric` and `AggregateMetric`
    /// per-record contributions) in evaluation order, filtered by whether the
    /// endpoint streams and produces tokens (§4.4: flag compatibility).
    pub fn enabled_for_endpoint(&self, is_streaming: bool, produces_tokens: bool) -> Vec<&MetricClass> {
        self.order
            .iter()
            .filter_map(|tag| self.classes.get(tag))
            .filter(|class| {
                if class.flags.contains(MetricFlags::STREAMING_ONLY) && !is_streaming {
                    return false;
                }
                if class.flags.contains(MetricFlags::STREAMING_TOKENS_ONLY)
                    && !(is_streaming && produces_tokens)
                {
                    return false;
                }
                if class.flags.contains(MetricFlags::PRODUCES_TOKENS_ONLY) && !produces_tokens {
                    return false;
                }
                true
            })
            .collect()
    }
}

fn topological_sort(classes: &HashMap<&'static str, MetricClass>) -> Result<Vec<&'static str>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks: HashMap<&'static str, Mark> = classes.keys().map(|t| (*t, Mark::Unvisited)).collect();
    let mut order = Vec::with_capacity(classes.len());

    fn visit(
        tag: &'static str,
        classes: &HashMap<&'static str, MetricClass>,
        marks: &mut HashMap<&'static str, Mark>,
        order: &mut Vec<&'static str>,
    ) -> Result<()> {
        match marks.get(tag) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(MetricError::Cycle(tag.to_string())),
            _ => {}
        }
        marks.insert(tag, Mark::InProgress);
        if let Some(class) = classes.get(tag) {
            for dep in class.required_metrics {
                visit(dep, classes, marks, order)?;
            }
        }
        marks.insert(tag, Mark::Done);
        order.push(tag);
        Ok(())
    }

    let mut tags: Vec<&'static str> = classes.keys().copied().collect();
    tags.sort_unstable();
    for tag in tags {
        visit(tag, classes, &mut marks, &mut order)?;
    }
    Ok(order)
}

/// Every tag reachable from `enabled` through `required_metrics`, used to
/// validate that an enabled metric's dependencies are also enabled
/// (§4.4 invariant).
pub fn transitive_closure(classes: &HashMap<&'static str, MetricClass>, enabled: &[&'static str]) -> HashSet<&'static str> {
    let mut seen = HashSet::new();
    let mut stack: Vec<&'static str> = enabled.to_vec();
    while let Some(tag) = stack.pop() {
        if !seen.insert(tag) {
            continue;
        }
        if let Some(class) = classes.get(tag) {
            stack.extend(class.required_metrics.iter().copied());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(tag: &'static str, deps: &'static [&'static str]) -> MetricClass {
        MetricClass {
            tag,
            header: tag,
            short_header: tag,
            unit: Unit::Count,
            display_unit: None,
            flags: MetricFlags::NONE,
            required_metrics: deps,
            display_order: 0,
            kind: MetricKind::Record,
        }
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let registry = MetricRegistry::build(vec![
            class("a", &[]),
            class("b", &["a"]),
            class("c", &["b", "a"]),
        ])
        .unwrap();
        let order = registry.evaluation_order();
        let pos = |t: &str| order.iter().position(|x| *x == t).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn cycle_is_rejected() {
        let result = MetricRegistry::build(vec![class("a", &["b"]), class("b", &["a"])]);
        assert!(matches!(result, Err(MetricError::Cycle(_))));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let result = MetricRegistry::build(vec![class("a", &["missing"])]);
        assert!(matches!(result, Err(MetricError::UnknownTag(_))));
    }

    #[test]
    fn streaming_tokens_only_filters_non_streaming_endpoints() {
        let mut streaming_class = class("inter_token_latency", &[]);
        streaming_class.flags = MetricFlags::STREAMING_TOKENS_ONLY;
        let registry = MetricRegistry::build(vec![streaming_class]).unwrap();
        assert!(registry.enabled_for_endpoint(false, true).is_empty());
        assert_eq!(registry.enabled_for_endpoint(true, true).len(), 1);
    }
}
