//! Load-order computation.
//!
//! Depth-first traversal over the dependency graph with an explicit stack
//! of `(node, next dependency index)` frames. Each node is marked
//! unvisited, visiting (on the current path) or visited (emitted).
//! Meeting a visiting node again means the path closes a cycle.

use indexmap::IndexMap;

/// A dependency cycle. The path starts and ends at the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub cycle: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Topologically sort `graph` (name -> declared dependencies).
///
/// Dependencies that are not keys of `graph` are ignored. Roots are
/// visited in map order and dependencies in declaration order, so the
/// result is deterministic. Every dependency precedes its dependents.
pub fn topological_order(graph: &IndexMap<String, Vec<String>>) -> Result<Vec<String>, CycleError> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut order = Vec::with_capacity(graph.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..graph.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        marks[root] = Mark::Visiting;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let Some((name, dependencies)) = graph.get_index(node) else {
                stack.pop();
                continue;
            };

            let Some(dependency) = dependencies.get(cursor) else {
                marks[node] = Mark::Visited;
                order.push(name.clone());
                stack.pop();
                continue;
            };
            frame.1 += 1;

            let Some(next) = graph.get_index_of(dependency) else {
                continue;
            };

            match marks[next] {
                Mark::Visited => {}
                Mark::Unvisited => {
                    marks[next] = Mark::Visiting;
                    stack.push((next, 0));
                }
                Mark::Visiting => {
                    return Err(CycleError {
                        cycle: cycle_path(graph, &stack, next),
                    });
                }
            }
        }
    }

    Ok(order)
}

/// Path from the first occurrence of `repeated` on the stack back to itself.
fn cycle_path(
    graph: &IndexMap<String, Vec<String>>,
    stack: &[(usize, usize)],
    repeated: usize,
) -> Vec<String> {
    let start = stack
        .iter()
        .position(|&(node, _)| node == repeated)
        .unwrap_or(0);

    stack[start..]
        .iter()
        .map(|&(node, _)| node)
        .chain(std::iter::once(repeated))
        .filter_map(|node| graph.get_index(node).map(|(name, _)| name.clone()))
        .collect()
}
