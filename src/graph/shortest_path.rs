//! Breadth-first shortest paths over the undirected view of the graph.

use std::collections::VecDeque;

/// Shortest path from `start` to `goal` by edge count, as node indices.
///
/// Neighbour lists are expected in a fixed order; the first path BFS reaches
/// is returned, so ties are broken by that order.
pub fn bfs_path(adjacency: &[Vec<usize>], start: usize, goal: usize) -> Option<Vec<usize>> {
    if start == goal {
        return Some(vec![start]);
    }

    let mut parent: Vec<Option<usize>> = vec![None; adjacency.len()];
    let mut visited = vec![false; adjacency.len()];
    let mut queue = VecDeque::new();

    visited[start] = true;
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            if visited[next] {
                continue;
            }
            visited[next] = true;
            parent[next] = Some(node);
            if next == goal {
                return Some(reconstruct(&parent, start, goal));
            }
            queue.push_back(next);
        }
    }

    None
}

fn reconstruct(parent: &[Option<usize>], start: usize, goal: usize) -> Vec<usize> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match parent[current] {
            Some(p) => {
                path.push(p);
                current = p;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Number of nodes reachable from `start`, `start` included.
pub fn reachable_count(adjacency: &[Vec<usize>], start: usize) -> usize {
    let mut visited = vec![false; adjacency.len()];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;
    let mut count = 0;
    while let Some(node) = queue.pop_front() {
        count += 1;
        for &next in &adjacency[node] {
            if !visited[next] {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 - 1 - 3
    //  \     /
    //   2 --
    // 4 (isolated)
    fn diamond() -> Vec<Vec<usize>> {
        vec![vec![1, 2], vec![0, 3], vec![0, 3], vec![1, 2], vec![]]
    }

    #[test]
    fn test_bfs_prefers_first_neighbour_on_ties() {
        assert_eq!(bfs_path(&diamond(), 0, 3), Some(vec![0, 1, 3]));
    }

    #[test]
    fn test_bfs_disconnected() {
        assert_eq!(bfs_path(&diamond(), 0, 4), None);
        assert_eq!(bfs_path(&diamond(), 4, 4), Some(vec![4]));
    }

    #[test]
    fn test_reachable_count() {
        assert_eq!(reachable_count(&diamond(), 0), 4);
        assert_eq!(reachable_count(&diamond(), 4), 1);
    }
}
