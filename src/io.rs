//! Minimal graph ingestion.
//!
//! Deliberately thin: spec.md §1 names the CSR loader an external
//! collaborator, out of the engineering focus. This reads just enough of a
//! whitespace-separated edge list to exercise the engine end to end from the
//! `louvain` binary and from tests — no format cleverness, no streaming, no
//! validation beyond what's needed to fail fast on garbage input.
//!
//! Format: an optional leading `n m` header line, then `m` lines of
//! `src dst weight`, one undirected edge per line (both directions are
//! synthesized). Lines starting with `%` are comments. Symmetry and
//! deduplication are the caller's responsibility — matching spec.md §4.5,
//! the engine only warns if the result looks asymmetric.

use std::path::Path;

use crate::error::LouvainError;
use crate::graph::{Edge, Graph};

/// Reads a graph from an edge-list file at `path`.
pub fn load_graph(path: impl AsRef<Path>) -> Result<Graph, LouvainError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| LouvainError::Input(format!("reading {}: {e}", path.display())))?;
    parse_edge_list(&text)
}

/// Parses the edge-list format described above into a [`Graph`].
pub fn parse_edge_list(text: &str) -> Result<Graph, LouvainError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('%'));

    let mut n_hint: Option<usize> = None;
    let mut edges: Vec<(u32, u32, u32)> = Vec::new();

    let first = lines.next();
    let mut remaining: Vec<&str> = Vec::new();
    if let Some(first) = first {
        let fields: Vec<&str> = first.split_whitespace().collect();
        if fields.len() == 2 {
            // Looks like an "n m" header rather than an edge triple.
            n_hint = Some(fields[0].parse().map_err(|_| {
                LouvainError::Input(format!("malformed header line {first:?}"))
            })?);
        } else {
            remaining.push(first);
        }
    }
    remaining.extend(lines);

    for line in remaining {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(LouvainError::Input(format!(
                "expected \"src dst weight\", got {line:?}"
            )));
        }
        let src: u32 = fields[0]
            .parse()
            .map_err(|_| LouvainError::Input(format!("bad src vertex id in {line:?}")))?;
        let dst: u32 = fields[1]
            .parse()
            .map_err(|_| LouvainError::Input(format!("bad dst vertex id in {line:?}")))?;
        let weight: u32 = fields[2]
            .parse()
            .map_err(|_| LouvainError::Input(format!("bad edge weight in {line:?}")))?;
        edges.push((src, dst, weight));
    }

    let max_vertex = edges
        .iter()
        .flat_map(|&(s, d, _)| [s, d])
        .max()
        .map(|v| v as usize + 1)
        .unwrap_or(0);
    let n = n_hint.unwrap_or(0).max(max_vertex);
    if n == 0 {
        return Err(LouvainError::Input("graph has no vertices".to_string()));
    }

    let mut adjacency: Vec<Vec<Edge>> = vec![Vec::new(); n];
    for (src, dst, weight) in edges {
        adjacency[src as usize].push(Edge { dst, weight });
        if src != dst {
            adjacency[dst as usize].push(Edge { dst: src, weight });
        }
    }

    let mut offsets = Vec::with_capacity(n + 1);
    let mut flat = Vec::new();
    offsets.push(0u32);
    for adj in adjacency {
        flat.extend(adj);
        offsets.push(flat.len() as u32);
    }

    Ok(Graph::from_csr(offsets, flat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_triangle_without_header() {
        let g = parse_edge_list("0 1 1\n1 2 1\n2 0 1\n").unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.degree(0), 2);
        assert_eq!(g.degree(1), 2);
        assert_eq!(g.degree(2), 2);
    }

    #[test]
    fn parses_with_header_and_comments() {
        let g = parse_edge_list("% a path graph\n2 1\n0 1 3\n").unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.out_edges(0)[0].weight, 3);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_edge_list("0 1\n").is_err());
    }

    #[test]
    fn empty_input_is_an_input_error() {
        assert!(matches!(parse_edge_list(""), Err(LouvainError::Input(_))));
    }
}
