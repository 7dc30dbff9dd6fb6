//! Row-per-edge text format: `v1 v2 p`, whitespace-separated.
//!
//! Vertex ids are zero-based. A `# vertices N` comment fixes the vertex
//! count; without one it is the largest id plus one. Blank lines and other
//! lines starting with `#` or `%` are skipped; columns after the third are
//! ignored. A pair listed twice keeps its last probability.
//!
//! [`Normalize::MaxWeight`] divides every weight by the largest one seen,
//! so raw weights on any positive scale are accepted.
//! [`Normalize::Exact`] keeps probabilities as written, which is what
//! [`write_edge_list`] output needs to read back unchanged.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use ucore_core::{UncertainGraph, VertexId};

use crate::error::StorageError;

/// How edge weights become probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalize {
    /// Divide by the largest weight. All-zero input is left as is.
    #[default]
    MaxWeight,
    /// Use weights as probabilities; anything above 1 is rejected.
    Exact,
}

struct Row {
    line: usize,
    u: usize,
    v: usize,
    weight: f64,
}

fn parse_row(line_no: usize, line: &str) -> Result<Row, StorageError> {
    let fail = |reason: String| StorageError::Parse {
        line: line_no,
        reason,
    };
    let mut columns = line.split_whitespace();
    let (Some(u), Some(v), Some(weight)) = (columns.next(), columns.next(), columns.next()) else {
        return Err(fail("expected `v1 v2 probability`".to_string()));
    };
    let u: usize = u
        .parse()
        .map_err(|_| fail(format!("invalid vertex id `{u}`")))?;
    let v: usize = v
        .parse()
        .map_err(|_| fail(format!("invalid vertex id `{v}`")))?;
    let weight: f64 = weight
        .parse()
        .map_err(|_| fail(format!("invalid probability `{weight}`")))?;
    if !weight.is_finite() || weight < 0.0 {
        return Err(fail(format!("probability {weight} must be finite and >= 0")));
    }
    if u == v {
        return Err(fail(format!("self-loop on vertex {u}")));
    }
    Ok(Row {
        line: line_no,
        u,
        v,
        weight,
    })
}

/// Reads a `# vertices N` header. Other comments yield `None`.
fn parse_header(line_no: usize, comment: &str) -> Result<Option<usize>, StorageError> {
    let mut words = comment.split_whitespace();
    if words.next() != Some("vertices") {
        return Ok(None);
    }
    words
        .next()
        .and_then(|n| n.parse().ok())
        .map(Some)
        .ok_or_else(|| StorageError::Parse {
            line: line_no,
            reason: "expected `# vertices N`".to_string(),
        })
}

/// Parses edge-list text, normalizing weights by the largest one.
pub fn parse_edge_list(text: &str) -> Result<UncertainGraph, StorageError> {
    parse_edge_list_with(text, Normalize::MaxWeight)
}

/// Parses edge-list text with the given weight handling.
pub fn parse_edge_list_with(text: &str, normalize: Normalize) -> Result<UncertainGraph, StorageError> {
    let mut rows = Vec::new();
    let mut declared = None;
    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(comment) = trimmed.strip_prefix('#') {
            if let Some(count) = parse_header(i + 1, comment)? {
                declared = Some(count);
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        rows.push(parse_row(i + 1, trimmed)?);
    }

    let vertex_count = match declared {
        Some(count) => {
            if let Some(row) = rows.iter().find(|r| r.u.max(r.v) >= count) {
                return Err(StorageError::Parse {
                    line: row.line,
                    reason: format!("vertex {} is outside the declared {count} vertices", row.u.max(row.v)),
                });
            }
            count
        }
        None => rows.iter().map(|r| r.u.max(r.v) + 1).max().unwrap_or(0),
    };
    let max_weight = rows.iter().map(|r| r.weight).fold(0.0, f64::max);
    let scale = match normalize {
        Normalize::MaxWeight if max_weight > 0.0 => max_weight,
        Normalize::MaxWeight => 1.0,
        Normalize::Exact => {
            if let Some(row) = rows.iter().find(|r| r.weight > 1.0) {
                return Err(StorageError::Parse {
                    line: row.line,
                    reason: format!("probability {} is above 1", row.weight),
                });
            }
            1.0
        }
    };

    let mut graph = UncertainGraph::new(vertex_count);
    for row in &rows {
        graph.set_probability(
            VertexId::from(row.u),
            VertexId::from(row.v),
            (row.weight / scale).min(1.0),
        )?;
    }
    debug!(
        vertices = vertex_count,
        edges = graph.edge_count(),
        max_weight,
        ?normalize,
        "parsed edge list"
    );
    Ok(graph)
}

/// Reads and parses an edge-list file, normalizing by the largest weight.
pub fn read_edge_list(path: impl AsRef<Path>) -> Result<UncertainGraph, StorageError> {
    let text = fs::read_to_string(path)?;
    parse_edge_list(&text)
}

/// Writes `graph` in the edge-list format: a `# vertices N` header, then one
/// `u v p` line per edge with `u < v`. [`parse_edge_list_with`] in
/// [`Normalize::Exact`] mode reads it back unchanged.
pub fn write_edge_list(graph: &UncertainGraph) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "# vertices {}", graph.vertex_count());
    for (u, v, p) in graph.edges() {
        let _ = writeln!(out, "{} {} {}", u.0, v.0, p);
    }
    out
}
