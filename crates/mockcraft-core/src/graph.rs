use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Table insertion order derived from foreign-key relationships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyPlan {
    /// Every table exactly once; parents before children.
    pub order: Vec<String>,
    /// Tables on a self-reference or a cycle; their inserts are deferred.
    pub circular: BTreeSet<String>,
}

impl DependencyPlan {
    pub fn is_circular(&self, table: &str) -> bool {
        self.circular.contains(table)
    }
}

/// Strict planner: self-references are tolerated and marked circular, any
/// longer cycle is reported as [`Error::CyclicSchema`].
pub fn plan_order(schema: &Schema) -> Result<DependencyPlan> {
    let graph = DependencyGraph::build(schema);
    let (order, stalled) = graph.kahn();
    if !stalled.is_empty() {
        return Err(Error::CyclicSchema(
            stalled.into_iter().map(|idx| graph.names[idx].clone()).collect(),
        ));
    }
    Ok(DependencyPlan {
        order: order.into_iter().map(|idx| graph.names[idx].clone()).collect(),
        circular: graph.self_referencing,
    })
}

/// Lenient planner used by the seeder: when Kahn's algorithm stalls, every
/// remaining table is marked circular and appended in document order.
pub fn plan_order_with_deferral(schema: &Schema) -> DependencyPlan {
    let graph = DependencyGraph::build(schema);
    let (mut order, stalled) = graph.kahn();
    let mut circular = graph.self_referencing.clone();
    for idx in stalled {
        circular.insert(graph.names[idx].clone());
        order.push(idx);
    }
    DependencyPlan {
        order: order.into_iter().map(|idx| graph.names[idx].clone()).collect(),
        circular,
    }
}

struct DependencyGraph {
    /// Table names in document order; node ids are positions in this list.
    names: Vec<String>,
    /// parent -> distinct children
    edges: BTreeMap<usize, BTreeSet<usize>>,
    self_referencing: BTreeSet<String>,
}

impl DependencyGraph {
    fn build(schema: &Schema) -> Self {
        let names: Vec<String> = schema.tables.iter().map(|t| t.name.clone()).collect();
        let position: BTreeMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect();

        let mut edges: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut self_referencing = BTreeSet::new();
        for relation in &schema.relations {
            if relation.is_self_reference() {
                self_referencing.insert(relation.from_table.clone());
                continue;
            }
            // Dangling relationships are reported by the validator.
            let (Some(&parent), Some(&child)) = (
                position.get(relation.parent()),
                position.get(relation.child()),
            ) else {
                continue;
            };
            edges.entry(parent).or_default().insert(child);
        }

        Self {
            names,
            edges,
            self_referencing,
        }
    }

    /// Returns the ordered nodes and the nodes left with unmet parents.
    fn kahn(&self) -> (Vec<usize>, Vec<usize>) {
        let mut indegree = vec![0usize; self.names.len()];
        for children in self.edges.values() {
            for &child in children {
                indegree[child] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(idx, count)| (*count == 0).then_some(idx))
            .collect();
        let mut order = Vec::with_capacity(self.names.len());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            if let Some(children) = self.edges.get(&node) {
                for &child in children {
                    indegree[child] = indegree[child].saturating_sub(1);
                    if indegree[child] == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        let stalled = indegree
            .iter()
            .enumerate()
            .filter_map(|(idx, count)| (*count > 0).then_some(idx))
            .collect();
        (order, stalled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Relationship;
    use crate::schema::{Column, Table};

    fn table(name: &str) -> Table {
        Table::new(name, 1, vec![Column::new("id", "integer").primary()])
    }

    fn schema(tables: &[&str], relations: &[(&str, &str)]) -> Schema {
        Schema {
            tables: tables.iter().map(|name| table(name)).collect(),
            relations: relations
                .iter()
                .map(|(from, to)| Relationship::new(*from, "id", *to, format!("{from}_id")))
                .collect(),
            ..Schema::default()
        }
    }

    #[test]
    fn orders_parents_before_children() {
        let schema = schema(
            &["comments", "posts", "users"],
            &[("users", "posts"), ("posts", "comments"), ("users", "comments")],
        );
        let plan = plan_order(&schema).expect("plan");
        assert_eq!(plan.order, vec!["users", "posts", "comments"]);
        assert!(plan.circular.is_empty());
    }

    #[test]
    fn ties_follow_document_order() {
        let schema = schema(&["b", "a", "c"], &[]);
        let plan = plan_order(&schema).expect("plan");
        assert_eq!(plan.order, vec!["b", "a", "c"]);
    }

    #[test]
    fn self_reference_is_circular_not_an_error() {
        let schema = schema(&["employees"], &[("employees", "employees")]);
        let plan = plan_order(&schema).expect("plan");
        assert_eq!(plan.order, vec!["employees"]);
        assert!(plan.is_circular("employees"));
    }

    #[test]
    fn mutual_cycle_is_rejected_by_strict_planner() {
        let schema = schema(&["a", "b", "c"], &[("a", "b"), ("b", "a")]);
        match plan_order(&schema) {
            Err(Error::CyclicSchema(tables)) => assert_eq!(tables, vec!["a", "b"]),
            other => panic!("expected cyclic schema, got {other:?}"),
        }
    }

    #[test]
    fn deferral_appends_cycle_members_in_document_order() {
        let schema = schema(&["b", "a", "c"], &[("a", "b"), ("b", "a")]);
        let plan = plan_order_with_deferral(&schema);
        assert_eq!(plan.order, vec!["c", "b", "a"]);
        assert!(plan.is_circular("a"));
        assert!(plan.is_circular("b"));
        assert!(!plan.is_circular("c"));
    }
}
