//! Circular include detection: Tarjan's SCC over the module graph.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use super::Proposal;
use crate::finding::{Category, Finding};
use crate::graph::{Model, ModuleGraph};

/// A strongly connected group of files that include each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    /// Sorted member paths.
    pub members: Vec<String>,
    /// Shortest cycle through the smallest member, closed (`a, b, a`).
    pub path: Vec<String>,
}

impl Cycle {
    pub fn display_path(&self) -> String {
        self.path.join(" -> ")
    }
}

/// Find every include cycle. Nodes and successors are visited in sorted
/// order; cycles come out in order of their root's discovery index.
pub fn detect_cycles(graph: &ModuleGraph) -> Vec<Cycle> {
    let mut order: Vec<NodeIndex> = graph.inner().node_indices().collect();
    order.sort_by(|a, b| graph.file(*a).cmp(graph.file(*b)));

    strongly_connected(graph, &order)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.has_self_loop(scc[0]))
        .map(|scc| {
            let mut members: Vec<String> = scc.iter().map(|n| graph.file(*n).to_string()).collect();
            members.sort();
            let path = shortest_cycle(graph, &scc);
            Cycle { members, path }
        })
        .collect()
}

/// Iterative Tarjan. Returns components ordered by root discovery index.
fn strongly_connected(graph: &ModuleGraph, order: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
    let n = graph.node_count();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink: Vec<usize> = vec![0; n];
    let mut on_stack: Vec<bool> = vec![false; n];
    let mut stack: Vec<NodeIndex> = Vec::new();
    let mut counter = 0usize;
    let mut components: Vec<(usize, Vec<NodeIndex>)> = Vec::new();

    for &start in order {
        if index[start.index()].is_some() {
            continue;
        }
        // (node, sorted successors, next successor position)
        let mut work: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();
        index[start.index()] = Some(counter);
        lowlink[start.index()] = counter;
        counter += 1;
        stack.push(start);
        on_stack[start.index()] = true;
        work.push((start, graph.successors(start), 0));

        while let Some(frame) = work.last_mut() {
            let v = frame.0;
            if frame.2 < frame.1.len() {
                let w = frame.1[frame.2];
                frame.2 += 1;
                match index[w.index()] {
                    None => {
                        index[w.index()] = Some(counter);
                        lowlink[w.index()] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w.index()] = true;
                        work.push((w, graph.successors(w), 0));
                    }
                    Some(w_index) if on_stack[w.index()] => {
                        lowlink[v.index()] = lowlink[v.index()].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            work.pop();
            if let Some(parent) = work.last() {
                let p = parent.0.index();
                lowlink[p] = lowlink[p].min(lowlink[v.index()]);
            }
            let v_index = index[v.index()].unwrap_or(0);
            if lowlink[v.index()] == v_index {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w.index()] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push((v_index, component));
            }
        }
    }

    components.sort_by_key(|(root, _)| *root);
    components.into_iter().map(|(_, c)| c).collect()
}

/// BFS from the smallest member back to itself, staying inside the SCC.
fn shortest_cycle(graph: &ModuleGraph, scc: &[NodeIndex]) -> Vec<String> {
    let members: HashSet<NodeIndex> = scc.iter().copied().collect();
    let Some(&start) = scc.iter().min_by(|a, b| graph.file(**a).cmp(graph.file(**b))) else {
        return Vec::new();
    };

    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(u) = queue.pop_front() {
        for w in graph.successors(u) {
            if w == start {
                let mut path = vec![graph.file(start).to_string()];
                let mut rev = vec![u];
                let mut cur = u;
                while let Some(&p) = parent.get(&cur) {
                    rev.push(p);
                    cur = p;
                }
                // `rev` ends at `start` unless `u` is `start` (self-loop).
                path.extend(
                    rev.iter()
                        .rev()
                        .filter(|n| **n != start)
                        .map(|n| graph.file(*n).to_string()),
                );
                path.push(graph.file(start).to_string());
                return path;
            }
            if members.contains(&w) && visited.insert(w) {
                parent.insert(w, u);
                queue.push_back(w);
            }
        }
    }
    Vec::new()
}

/// One fatal finding per cycle, anchored at the include that leaves the
/// smallest member.
pub fn run(model: &Model) -> Vec<Proposal> {
    let cycles = detect_cycles(&model.modules);
    debug!(cycles = cycles.len(), "cycle detection done");
    cycles
        .into_iter()
        .map(|cycle| {
            let file = cycle.path.first().cloned().unwrap_or_default();
            let line = cycle.path.get(1).and_then(|next| {
                model
                    .includes
                    .iter()
                    .filter(|i| i.file == file)
                    .find(|i| model.include_target(&i.file, i.line) == Some(next.as_str()))
                    .map(|i| i.line)
            });
            Proposal::manual(Finding::new(
                Category::Cycle,
                file,
                line,
                format!("circular include: {}", cycle.display_path()),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)], files: &[&str]) -> ModuleGraph {
        let mut g = ModuleGraph::new();
        for f in files {
            g.add_file(f);
        }
        for (i, (a, b)) in edges.iter().enumerate() {
            g.add_include(a, b, i + 1);
        }
        g
    }

    #[test]
    fn test_three_cycle() {
        let g = graph(
            &[("a.sh", "b.sh"), ("b.sh", "c.sh"), ("c.sh", "a.sh")],
            &["a.sh", "b.sh", "c.sh"],
        );
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members, vec!["a.sh", "b.sh", "c.sh"]);
        assert_eq!(cycles[0].path, vec!["a.sh", "b.sh", "c.sh", "a.sh"]);
    }

    #[test]
    fn test_acyclic() {
        let g = graph(
            &[("a.sh", "b.sh"), ("b.sh", "c.sh"), ("a.sh", "c.sh")],
            &["a.sh", "b.sh", "c.sh"],
        );
        assert!(detect_cycles(&g).is_empty());
    }

    #[test]
    fn test_self_loop() {
        let g = graph(&[("a.sh", "a.sh")], &["a.sh", "b.sh"]);
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path, vec!["a.sh", "a.sh"]);
    }

    #[test]
    fn test_shortest_path_inside_scc() {
        // a -> b -> c -> d -> a and a shortcut c -> a.
        let g = graph(
            &[
                ("a.sh", "b.sh"),
                ("b.sh", "c.sh"),
                ("c.sh", "d.sh"),
                ("d.sh", "a.sh"),
                ("c.sh", "a.sh"),
            ],
            &["a.sh", "b.sh", "c.sh", "d.sh"],
        );
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members.len(), 4);
        assert_eq!(cycles[0].path, vec!["a.sh", "b.sh", "c.sh", "a.sh"]);
    }

    #[test]
    fn test_two_separate_cycles_in_discovery_order() {
        let g = graph(
            &[
                ("x.sh", "y.sh"),
                ("y.sh", "x.sh"),
                ("a.sh", "b.sh"),
                ("b.sh", "a.sh"),
            ],
            &["a.sh", "b.sh", "x.sh", "y.sh"],
        );
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].members, vec!["a.sh", "b.sh"]);
        assert_eq!(cycles[1].members, vec!["x.sh", "y.sh"]);
    }

    #[test]
    fn test_every_cycle_member_is_in_an_scc() {
        let g = graph(
            &[
                ("a.sh", "b.sh"),
                ("b.sh", "a.sh"),
                ("b.sh", "c.sh"),
                ("c.sh", "d.sh"),
            ],
            &["a.sh", "b.sh", "c.sh", "d.sh"],
        );
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members, vec!["a.sh", "b.sh"]);
    }
}
