use std::collections::{HashMap, HashSet};

/// Visit state for the depth-first traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Order plugins so every dependency precedes its dependents.
///
/// The graph maps plugin id to the ids it depends on. The traversal is
/// deliberately permissive: a dependency that is not a graph key is treated
/// as satisfied (it may be disabled or external), and a cycle drops the
/// plugins on it from the result with a warning instead of failing the
/// whole batch. Roots are visited in sorted order so the output is stable.
pub fn topological_order(graph: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut marks: HashMap<&str, Mark> = graph
        .keys()
        .map(|id| (id.as_str(), Mark::Unvisited))
        .collect();
    let mut order = Vec::with_capacity(graph.len());
    let mut resolved: HashSet<&str> = HashSet::new();

    let mut roots: Vec<&str> = graph.keys().map(String::as_str).collect();
    roots.sort_unstable();

    for root in roots {
        if marks[root] == Mark::Unvisited {
            visit(root, graph, &mut marks, &mut order, &mut resolved);
        }
    }

    order
}

/// Returns whether `node` resolved, meaning it and its whole dependency
/// chain made it into the order.
fn visit<'a>(
    node: &'a str,
    graph: &'a HashMap<String, Vec<String>>,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
    resolved: &mut HashSet<&'a str>,
) -> bool {
    marks.insert(node, Mark::InProgress);

    let mut ok = true;
    if let Some(deps) = graph.get(node) {
        for dep in deps {
            match marks.get(dep.as_str()).copied() {
                None => {
                    log::debug!(
                        "Plugin '{node}': dependency '{dep}' not in load set, treating as satisfied"
                    );
                }
                Some(Mark::InProgress) => {
                    log::warn!("Dependency cycle detected at '{node}' -> '{dep}'");
                    ok = false;
                    break;
                }
                Some(Mark::Done) => {
                    ok = resolved.contains(dep.as_str());
                    if !ok {
                        break;
                    }
                }
                Some(Mark::Unvisited) => {
                    if !visit(dep, graph, marks, order, resolved) {
                        ok = false;
                        break;
                    }
                }
            }
        }
    }

    marks.insert(node, Mark::Done);
    if ok {
        order.push(node.to_string());
        resolved.insert(node);
    } else {
        log::warn!("Skipping plugin '{node}': dependency chain did not resolve");
    }
    ok
}
