//! Explanation: walking premise chains into human-readable accounts.
//!
//! The walker builds a justification graph (premise → conclusion edges
//! labeled with rule names) from the strongest belief of each edge, bounded
//! by depth and cycle-safe, then renders it in one of six formats.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::error::{DoxaResult, KernelError};
use crate::graph::store::Hypergraph;
use crate::term::TermId;

/// Output style for `explain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainFormat {
    /// Prose narrative.
    Story,
    /// Indented tree with truth and budget numbers.
    Detailed,
    /// One line per derivation link.
    Concise,
    /// Topologically ordered node list with raw tuples.
    Technical,
    /// Premise sets per belief.
    Justification,
    /// Machine-readable JSON tree.
    Json,
}

/// Options for `explain`.
#[derive(Debug, Clone, Copy)]
pub struct ExplainOptions {
    pub format: ExplainFormat,
    /// Maximum premise-chain depth to walk.
    pub depth: usize,
}

impl Default for ExplainOptions {
    fn default() -> Self {
        Self {
            format: ExplainFormat::Detailed,
            depth: 5,
        }
    }
}

struct Justification {
    graph: DiGraph<TermId, String>,
    nodes: HashMap<TermId, NodeIndex>,
}

/// Walk premise links breadth-first up to `depth`, deduplicating nodes so
/// cycles terminate.
fn build_graph(store: &Hypergraph, root_id: &TermId, depth: usize) -> Justification {
    let mut graph = DiGraph::new();
    let mut nodes: HashMap<TermId, NodeIndex> = HashMap::new();
    nodes.insert(root_id.clone(), graph.add_node(root_id.clone()));

    let mut frontier = VecDeque::new();
    frontier.push_back((root_id.clone(), 0usize));
    let mut expanded = HashSet::new();

    while let Some((id, level)) = frontier.pop_front() {
        if level >= depth || !expanded.insert(id.clone()) {
            continue;
        }
        let Some(edge) = store.get(&id) else {
            continue;
        };
        let Some(belief) = edge.strongest_belief() else {
            continue;
        };
        let rule = belief.derived_by.clone().unwrap_or_else(|| "input".into());
        let conclusion_node = nodes[&id];
        for premise in &belief.premises {
            let premise_node = *nodes
                .entry(premise.clone())
                .or_insert_with(|| graph.add_node(premise.clone()));
            graph.add_edge(premise_node, conclusion_node, rule.clone());
            frontier.push_back((premise.clone(), level + 1));
        }
    }

    Justification { graph, nodes }
}

#[derive(Serialize)]
struct JsonNode {
    id: String,
    frequency: f32,
    confidence: f32,
    expectation: f32,
    rule: Option<String>,
    premises: Vec<JsonNode>,
}

fn json_node(store: &Hypergraph, id: &TermId, depth: usize, seen: &mut HashSet<TermId>) -> JsonNode {
    let truth = store.get(id).map(|e| e.truth()).unwrap_or_else(crate::truth::Truth::unknown);
    let belief = store.get(id).and_then(|e| e.strongest_belief());
    let premises = if depth == 0 || !seen.insert(id.clone()) {
        Vec::new()
    } else {
        belief
            .map(|b| {
                b.premises
                    .iter()
                    .map(|p| json_node(store, p, depth - 1, seen))
                    .collect()
            })
            .unwrap_or_default()
    };
    JsonNode {
        id: id.as_str().to_string(),
        frequency: truth.frequency,
        confidence: truth.confidence,
        expectation: truth.expectation(),
        rule: belief.and_then(|b| b.derived_by.clone()),
        premises,
    }
}

fn render_story(store: &Hypergraph, justification: &Justification) -> String {
    let mut lines = Vec::new();
    let mut order: Vec<NodeIndex> = toposort(&justification.graph, None)
        .unwrap_or_else(|_| justification.graph.node_indices().collect());
    order.reverse(); // conclusions first

    for node in order {
        let id = &justification.graph[node];
        let premises: Vec<String> = justification
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| justification.graph[e.source()].as_str().to_string())
            .collect();
        let Some(edge) = store.get(id) else {
            continue;
        };
        let expectation = edge.truth().expectation();
        if premises.is_empty() {
            lines.push(format!(
                "{} was given directly (expectation {:.2}).",
                id, expectation
            ));
        } else {
            let rule = edge
                .strongest_belief()
                .and_then(|b| b.derived_by.as_deref())
                .unwrap_or("revision");
            lines.push(format!(
                "{} holds with expectation {:.2} because {} concluded it from {}.",
                id,
                expectation,
                rule,
                premises.join(" and ")
            ));
        }
    }
    lines.join("\n")
}

fn render_detailed(
    store: &Hypergraph,
    id: &TermId,
    depth: usize,
    indent: usize,
    seen: &mut HashSet<TermId>,
    out: &mut String,
) {
    let pad = "  ".repeat(indent);
    let Some(edge) = store.get(id) else {
        out.push_str(&format!("{pad}{id} (no longer in memory)\n"));
        return;
    };
    let truth = edge.truth();
    let belief = edge.strongest_belief();
    let rule = belief
        .and_then(|b| b.derived_by.as_deref())
        .unwrap_or("input");
    let budget = belief.map(|b| b.budget).unwrap_or_default();
    out.push_str(&format!(
        "{pad}{id}  {truth}  {budget}  via {rule}\n"
    ));
    if depth == 0 || !seen.insert(id.clone()) {
        return;
    }
    if let Some(belief) = belief {
        for premise in &belief.premises {
            render_detailed(store, premise, depth - 1, indent + 1, seen, out);
        }
    }
}

fn render_concise(justification: &Justification) -> String {
    let mut lines = Vec::new();
    for edge in justification.graph.edge_indices() {
        if let Some((source, target)) = justification.graph.edge_endpoints(edge) {
            lines.push(format!(
                "{} <-[{}]- {}",
                justification.graph[target],
                justification.graph[edge],
                justification.graph[source]
            ));
        }
    }
    if lines.is_empty() {
        "no recorded premises".to_string()
    } else {
        lines.join("\n")
    }
}

fn render_technical(store: &Hypergraph, justification: &Justification) -> String {
    let order = toposort(&justification.graph, None)
        .unwrap_or_else(|_| justification.graph.node_indices().collect());
    let mut lines = Vec::new();
    for node in order {
        let id = &justification.graph[node];
        let truth = store
            .get(id)
            .map(|e| e.truth())
            .unwrap_or_else(crate::truth::Truth::unknown);
        let rule = store
            .get(id)
            .and_then(|e| e.strongest_belief())
            .and_then(|b| b.derived_by.as_deref())
            .unwrap_or("input");
        lines.push(format!(
            "{id} f={:.4} c={:.4} p={:.4} d={:.4} e={:.4} rule={rule}",
            truth.frequency,
            truth.confidence,
            truth.priority,
            truth.doubt,
            truth.expectation()
        ));
    }
    lines.join("\n")
}

fn render_justification(store: &Hypergraph, justification: &Justification) -> String {
    let mut lines = Vec::new();
    for (id, _) in &justification.nodes {
        let Some(edge) = store.get(id) else {
            continue;
        };
        for (i, belief) in edge.beliefs.iter().enumerate() {
            let premises = if belief.premises.is_empty() {
                "direct input".to_string()
            } else {
                belief
                    .premises
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            lines.push(format!(
                "{id} [belief {i}] {} <= {{{premises}}}",
                belief.truth
            ));
        }
    }
    lines.sort();
    lines.join("\n")
}

/// Render an account of how an edge came to be believed.
pub fn explain(
    store: &Hypergraph,
    id: &TermId,
    options: ExplainOptions,
) -> DoxaResult<String> {
    if !store.contains(id) {
        return Err(KernelError::UnknownEdge {
            id: id.as_str().to_string(),
        }
        .into());
    }
    let justification = build_graph(store, id, options.depth);

    Ok(match options.format {
        ExplainFormat::Story => render_story(store, &justification),
        ExplainFormat::Detailed => {
            let mut out = String::new();
            render_detailed(store, id, options.depth, 0, &mut HashSet::new(), &mut out);
            out.trim_end().to_string()
        }
        ExplainFormat::Concise => render_concise(&justification),
        ExplainFormat::Technical => render_technical(store, &justification),
        ExplainFormat::Justification => render_justification(store, &justification),
        ExplainFormat::Json => {
            let tree = json_node(store, id, options.depth, &mut HashSet::new());
            serde_json::to_string_pretty(&tree).unwrap_or_else(|_| "{}".into())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Belief;
    use crate::term::TermKind;
    use crate::truth::{Budget, Truth};

    fn chain_store() -> (Hypergraph, TermId) {
        let mut store = Hypergraph::new(8);
        let (ab, _) = store.upsert(TermKind::Inheritance, vec!["a".into(), "b".into()]);
        store.revise(&ab, Belief::new(Truth::new(1.0, 0.9), Budget::default()));
        let (bc, _) = store.upsert(TermKind::Inheritance, vec!["b".into(), "c".into()]);
        store.revise(&bc, Belief::new(Truth::new(1.0, 0.9), Budget::default()));
        let (ac, _) = store.upsert(TermKind::Inheritance, vec!["a".into(), "c".into()]);
        store.revise(
            &ac,
            Belief::new(Truth::new(1.0, 0.81), Budget::default())
                .with_premises(vec![ab, bc])
                .with_derived_by("inheritance-transitivity"),
        );
        (store, ac)
    }

    #[test]
    fn unknown_edge_is_an_error() {
        let store = Hypergraph::new(8);
        assert!(explain(&store, &TermId::raw("Term(ghost)"), ExplainOptions::default()).is_err());
    }

    #[test]
    fn story_names_rule_and_premises() {
        let (store, ac) = chain_store();
        let text = explain(
            &store,
            &ac,
            ExplainOptions {
                format: ExplainFormat::Story,
                depth: 5,
            },
        )
        .unwrap();
        assert!(text.contains("inheritance-transitivity"));
        assert!(text.contains("Inheritance(a,b)"));
        assert!(text.contains("was given directly"));
    }

    #[test]
    fn detailed_indents_premises() {
        let (store, ac) = chain_store();
        let text = explain(
            &store,
            &ac,
            ExplainOptions {
                format: ExplainFormat::Detailed,
                depth: 5,
            },
        )
        .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Inheritance(a,c)"));
        assert!(lines[1].starts_with("  "));
    }

    #[test]
    fn depth_zero_stops_at_root() {
        let (store, ac) = chain_store();
        let text = explain(
            &store,
            &ac,
            ExplainOptions {
                format: ExplainFormat::Detailed,
                depth: 0,
            },
        )
        .unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn json_is_parseable_and_nested() {
        let (store, ac) = chain_store();
        let text = explain(
            &store,
            &ac,
            ExplainOptions {
                format: ExplainFormat::Json,
                depth: 5,
            },
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["id"], "Inheritance(a,c)");
        assert_eq!(value["premises"].as_array().unwrap().len(), 2);
        assert_eq!(value["rule"], "inheritance-transitivity");
    }

    #[test]
    fn cyclic_premises_terminate() {
        let mut store = Hypergraph::new(8);
        let (x, _) = store.upsert(TermKind::Atom, vec!["x".into()]);
        let (y, _) = store.upsert(TermKind::Atom, vec!["y".into()]);
        store.revise(
            &x,
            Belief::new(Truth::new(0.9, 0.8), Budget::default())
                .with_premises(vec![y.clone()]),
        );
        store.revise(
            &y,
            Belief::new(Truth::new(0.9, 0.8), Budget::default())
                .with_premises(vec![x.clone()]),
        );

        for format in [
            ExplainFormat::Story,
            ExplainFormat::Detailed,
            ExplainFormat::Concise,
            ExplainFormat::Technical,
            ExplainFormat::Justification,
            ExplainFormat::Json,
        ] {
            let text = explain(&store, &x, ExplainOptions { format, depth: 10 }).unwrap();
            assert!(!text.is_empty());
        }
    }
}
