//! Graph file loading.
//!
//! Two input formats are understood, chosen by file extension:
//!
//! - **`.gr`**: binary CSR (Galois layout), read through a memory map.
//! - anything else: whitespace-separated text edge list.
//!
//! # Binary layout
//!
//! ```text
//! Offset            Size               Field
//! 0                 8                  version: u64 (1 = u32 dests, 2 = u64 dests)
//! 8                 8                  edge_data_size: u64 (0 or 4)
//! 16                8                  num_nodes: u64
//! 24                8                  num_edges: u64
//! 32                8 * num_nodes      out_index: u64 (cumulative end offsets)
//! ..                4|8 * num_edges    dests
//! ..                0|4                padding (v1, odd num_edges, with data)
//! ..                size * num_edges   edge data
//! ```
//!
//! # Text layout
//!
//! ```text
//! # comment            (also lines starting with '%')
//! nodes 10             optional, fixes the node count
//! 1 2 5                src dst [weight], weight defaults to 1
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{CheckError, Result};
use crate::types::{Edge, EdgeWeight, GlobalId, Weight};

// ── Constants ──────────────────────────────────────────────────────

/// Binary header size: four u64 fields.
pub const GR_HEADER_SIZE: usize = 32;

/// Binary version with 32-bit destinations.
pub const GR_VERSION_1: u64 = 1;

/// Binary version with 64-bit destinations.
pub const GR_VERSION_2: u64 = 2;

/// Weight assigned to edges that carry no data.
pub const DEFAULT_WEIGHT: Weight = 1;

/// Largest node count a graph may have. Local ids are 32-bit.
pub const MAX_NODES: u64 = u32::MAX as u64;

// ── Edge List ──────────────────────────────────────────────────────

/// Whole graph in global terms, edges grouped by source (CSR).
///
/// This is what every host reads before partitioning keeps only its own
/// share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeList<W = Weight> {
    num_nodes: u64,
    /// `offsets[n]..offsets[n + 1]` are the edges of node `n`.
    offsets: Vec<u64>,
    dsts: Vec<u64>,
    weights: Vec<W>,
}

impl<W: EdgeWeight> EdgeList<W> {
    /// Graph with no nodes.
    pub fn empty() -> Self {
        Self {
            num_nodes: 0,
            offsets: vec![0],
            dsts: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Build from unordered edges.
    ///
    /// With `num_nodes = None` the node count is `max id + 1`. An explicit
    /// count smaller than that, or any count above [`MAX_NODES`], is a
    /// format error.
    pub fn from_edges<I>(num_nodes: Option<u64>, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = Edge<W>>,
    {
        let mut edges: Vec<Edge<W>> = edges.into_iter().collect();
        let max_id = edges.iter().map(|e| e.src.0.max(e.dst.0)).max();
        let implied = match max_id {
            None => 0,
            Some(m) => m
                .checked_add(1)
                .ok_or_else(|| CheckError::InvalidFormat(format!("node id {m} out of range")))?,
        };
        let num_nodes = match num_nodes {
            Some(n) if n < implied => {
                return Err(CheckError::InvalidFormat(format!(
                    "node count {n} but edge references node {}",
                    implied - 1
                )));
            }
            Some(n) => n,
            None => implied,
        };

        let mut offsets = alloc_offsets(num_nodes)?;

        // Stable: keeps file order within a node.
        edges.sort_by_key(|e| e.src);

        offsets.push(0u64);
        let mut cursor = 0usize;
        for node in 0..num_nodes {
            while cursor < edges.len() && edges[cursor].src.0 == node {
                cursor += 1;
            }
            offsets.push(cursor as u64);
        }

        Ok(Self {
            num_nodes,
            offsets,
            dsts: edges.iter().map(|e| e.dst.0).collect(),
            weights: edges.iter().map(|e| e.weight).collect(),
        })
    }

    pub fn num_nodes(&self) -> u64 {
        self.num_nodes
    }

    pub fn num_edges(&self) -> u64 {
        self.dsts.len() as u64
    }

    pub fn degree(&self, node: GlobalId) -> usize {
        match self.range(node) {
            Some((start, end)) => end - start,
            None => 0,
        }
    }

    /// Outgoing edges of `node` as (destination, weight).
    pub fn edges_of(&self, node: GlobalId) -> impl Iterator<Item = (GlobalId, W)> + '_ {
        let (start, end) = self.range(node).unwrap_or((0, 0));
        self.dsts[start..end]
            .iter()
            .zip(&self.weights[start..end])
            .map(|(&dst, &w)| (GlobalId(dst), w))
    }

    /// Every edge in source order.
    pub fn iter(&self) -> impl Iterator<Item = Edge<W>> + '_ {
        (0..self.num_nodes).flat_map(move |n| {
            self.edges_of(GlobalId(n)).map(move |(dst, weight)| Edge {
                src: GlobalId(n),
                dst,
                weight,
            })
        })
    }

    fn range(&self, node: GlobalId) -> Option<(usize, usize)> {
        if node.0 >= self.num_nodes {
            return None;
        }
        let i = node.0 as usize;
        Some((self.offsets[i] as usize, self.offsets[i + 1] as usize))
    }
}

/// Empty offset table with room for `num_nodes + 1` entries. Refuses node
/// counts above [`MAX_NODES`] and reports a failed allocation as an error.
fn alloc_offsets(num_nodes: u64) -> Result<Vec<u64>> {
    if num_nodes > MAX_NODES {
        return Err(CheckError::InvalidFormat(format!(
            "{num_nodes} nodes exceed the limit of {MAX_NODES}"
        )));
    }
    let mut offsets = Vec::new();
    offsets
        .try_reserve_exact(num_nodes as usize + 1)
        .map_err(|_| CheckError::InvalidFormat(format!("cannot allocate an index for {num_nodes} nodes")))?;
    Ok(offsets)
}

impl EdgeList<Weight> {
    /// Load a graph file, picking the format from the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let is_binary = path.extension().and_then(|e| e.to_str()) == Some("gr");
        let loaded = if is_binary {
            load_gr(path)
        } else {
            load_text(path)
        };
        loaded.map_err(|e| match e {
            CheckError::Load { .. } => e,
            other => CheckError::Load {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })
    }

    /// Write as a version 1 `.gr` file with u32 edge data.
    pub fn write_gr(&self, path: &Path) -> Result<()> {
        let mut out = Vec::with_capacity(
            GR_HEADER_SIZE + self.num_nodes as usize * 8 + self.dsts.len() * 8 + 4,
        );
        out.extend_from_slice(&GR_VERSION_1.to_le_bytes());
        out.extend_from_slice(&4u64.to_le_bytes());
        out.extend_from_slice(&self.num_nodes.to_le_bytes());
        out.extend_from_slice(&self.num_edges().to_le_bytes());
        for end in &self.offsets[1..] {
            out.extend_from_slice(&end.to_le_bytes());
        }
        for &dst in &self.dsts {
            let dst = u32::try_from(dst).map_err(|_| {
                CheckError::InvalidFormat(format!("destination {dst} does not fit a v1 .gr file"))
            })?;
            out.extend_from_slice(&dst.to_le_bytes());
        }
        if self.dsts.len() % 2 == 1 {
            out.extend_from_slice(&[0u8; 4]);
        }
        for w in &self.weights {
            out.extend_from_slice(&w.to_le_bytes());
        }
        let mut file = File::create(path)?;
        file.write_all(&out)?;
        Ok(())
    }
}

// ── Text Format ────────────────────────────────────────────────────

fn load_text(path: &Path) -> Result<EdgeList<Weight>> {
    let contents = std::fs::read_to_string(path)?;
    parse_text(&contents).map_err(|reason| CheckError::Load {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse a text edge list. Errors carry the 1-based line number.
pub fn parse_text(contents: &str) -> std::result::Result<EdgeList<Weight>, String> {
    let mut num_nodes: Option<u64> = None;
    let mut edges = Vec::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields[0] == "nodes" {
            if num_nodes.is_some() || !edges.is_empty() {
                return Err(format!("line {line_no}: 'nodes' header must come first"));
            }
            let [_, count] = fields[..] else {
                return Err(format!("line {line_no}: expected 'nodes <count>'"));
            };
            num_nodes = Some(parse_field(count, line_no, "node count")?);
            continue;
        }

        let (src, dst, weight) = match fields[..] {
            [src, dst] => (src, dst, None),
            [src, dst, weight] => (src, dst, Some(weight)),
            _ => {
                return Err(format!(
                    "line {line_no}: expected 'src dst [weight]', got {} fields",
                    fields.len()
                ))
            }
        };
        let weight = match weight {
            Some(w) => parse_field(w, line_no, "weight")?,
            None => DEFAULT_WEIGHT,
        };
        edges.push(Edge::new(
            parse_field(src, line_no, "source")?,
            parse_field(dst, line_no, "destination")?,
            weight,
        ));
    }

    EdgeList::from_edges(num_nodes, edges).map_err(|e| e.to_string())
}

fn parse_field<T: std::str::FromStr>(
    token: &str,
    line_no: usize,
    what: &str,
) -> std::result::Result<T, String> {
    token
        .parse()
        .map_err(|_| format!("line {line_no}: invalid {what} '{token}'"))
}

// ── Binary Format ──────────────────────────────────────────────────

fn load_gr(path: &Path) -> Result<EdgeList<Weight>> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file) }?;
    parse_gr(&mmap)
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

#[inline]
fn read_u64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap())
}

/// Decode a `.gr` image. All slice reads are bounds-checked up front.
pub fn parse_gr(data: &[u8]) -> Result<EdgeList<Weight>> {
    if data.len() < GR_HEADER_SIZE {
        return Err(CheckError::InvalidFormat(format!(
            "file too small for header: {} bytes",
            data.len()
        )));
    }

    let version = read_u64(data, 0);
    let edge_data_size = read_u64(data, 8);
    let num_nodes = read_u64(data, 16);
    let num_edges = read_u64(data, 24);

    let dst_width = match version {
        GR_VERSION_1 => 4usize,
        GR_VERSION_2 => 8usize,
        v => return Err(CheckError::InvalidFormat(format!("unsupported .gr version {v}"))),
    };
    if edge_data_size != 0 && edge_data_size != 4 {
        return Err(CheckError::InvalidFormat(format!(
            "unsupported edge data size {edge_data_size}"
        )));
    }

    let n = usize::try_from(num_nodes)
        .map_err(|_| CheckError::InvalidFormat(format!("node count {num_nodes} too large")))?;
    let m = usize::try_from(num_edges)
        .map_err(|_| CheckError::InvalidFormat(format!("edge count {num_edges} too large")))?;

    let padding = if version == GR_VERSION_1 && m % 2 == 1 && edge_data_size > 0 { 4 } else { 0 };
    let index_start = GR_HEADER_SIZE;
    let layout = n
        .checked_mul(8)
        .and_then(|index_len| index_start.checked_add(index_len))
        .and_then(|dst_start| {
            let data_start = m.checked_mul(dst_width)?.checked_add(dst_start)?.checked_add(padding)?;
            let end = m.checked_mul(edge_data_size as usize)?.checked_add(data_start)?;
            Some((dst_start, data_start, end))
        });
    let Some((dst_start, data_start, expected_len)) = layout else {
        return Err(CheckError::InvalidFormat(format!(
            "header sizes overflow: {num_nodes} nodes, {num_edges} edges"
        )));
    };
    if data.len() < expected_len {
        return Err(CheckError::InvalidFormat(format!(
            "truncated file: expected at least {expected_len} bytes, got {}",
            data.len()
        )));
    }

    let mut offsets = alloc_offsets(num_nodes)?;
    offsets.push(0u64);
    for i in 0..n {
        let end = read_u64(data, index_start + i * 8);
        let prev = offsets[i];
        if end < prev || end > num_edges {
            return Err(CheckError::InvalidFormat(format!(
                "out index of node {i} is {end}, outside [{prev}, {num_edges}]"
            )));
        }
        offsets.push(end);
    }
    if offsets[n] != num_edges {
        return Err(CheckError::InvalidFormat(format!(
            "out index ends at {} but header declares {num_edges} edges",
            offsets[n]
        )));
    }

    let mut dsts = Vec::with_capacity(m);
    for i in 0..m {
        let dst = match dst_width {
            4 => read_u32(data, dst_start + i * 4) as u64,
            _ => read_u64(data, dst_start + i * 8),
        };
        if dst >= num_nodes {
            return Err(CheckError::InvalidFormat(format!(
                "edge {i} points to node {dst}, graph has {num_nodes} nodes"
            )));
        }
        dsts.push(dst);
    }

    let weights = if edge_data_size == 0 {
        vec![DEFAULT_WEIGHT; m]
    } else {
        (0..m).map(|i| read_u32(data, data_start + i * 4)).collect()
    };

    Ok(EdgeList {
        num_nodes,
        offsets,
        dsts,
        weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> EdgeList {
        EdgeList::from_edges(
            None,
            vec![Edge::new(1, 2, 5), Edge::new(0, 1, 3), Edge::new(1, 3, 2)],
        )
        .unwrap()
    }

    #[test]
    fn test_from_edges_groups_by_source() {
        let g = sample();
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.num_edges(), 3);
        assert_eq!(g.degree(GlobalId(1)), 2);
        assert_eq!(g.degree(GlobalId(3)), 0);
        assert_eq!(g.degree(GlobalId(99)), 0);

        let succ: Vec<_> = g.edges_of(GlobalId(1)).collect();
        assert_eq!(succ, vec![(GlobalId(2), 5), (GlobalId(3), 2)]);
    }

    #[test]
    fn test_explicit_node_count_too_small() {
        let err = EdgeList::from_edges(Some(2), vec![Edge::new(0, 5, 1u32)]).unwrap_err();
        assert!(matches!(err, CheckError::InvalidFormat(_)));
    }

    #[test]
    fn test_parse_text_comments_header_and_default_weight() {
        let g = parse_text("# header\n% also a comment\nnodes 6\n\n0 1 7\n2 3\n").unwrap();
        assert_eq!(g.num_nodes(), 6);
        let edges: Vec<_> = g.iter().collect();
        assert_eq!(edges, vec![Edge::new(0, 1, 7), Edge::new(2, 3, DEFAULT_WEIGHT)]);
    }

    #[test]
    fn test_parse_text_reports_line_number() {
        let err = parse_text("0 1 2\n0 x 3\n").unwrap_err();
        assert!(err.contains("line 2"), "got: {err}");
        assert!(err.contains("destination"), "got: {err}");

        let err = parse_text("0 1 2 3\n").unwrap_err();
        assert!(err.contains("line 1"), "got: {err}");

        let err = parse_text("0 1\nnodes 4\n").unwrap_err();
        assert!(err.contains("must come first"), "got: {err}");
    }

    #[test]
    fn test_parse_text_rejects_ids_past_the_node_limit() {
        let err = parse_text("0 18446744073709551615 1\n").unwrap_err();
        assert!(err.contains("out of range"), "got: {err}");

        let err = parse_text(&format!("{} 0\n", MAX_NODES)).unwrap_err();
        assert!(err.contains("exceed"), "got: {err}");

        let err = parse_text("nodes 10000000000000\n0 1\n").unwrap_err();
        assert!(err.contains("exceed"), "got: {err}");
    }

    #[test]
    fn test_gr_rejects_oversized_node_count() {
        let mut bytes = Vec::new();
        for v in [GR_VERSION_2, 0, MAX_NODES + 1, 0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let err = parse_gr(&bytes).unwrap_err();
        assert!(matches!(err, CheckError::InvalidFormat(_)));
    }

    #[test]
    fn test_empty_text_is_empty_graph() {
        let g = parse_text("# nothing here\n").unwrap();
        assert_eq!(g, EdgeList::empty());
    }

    #[test]
    fn test_gr_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("g.gr");
        let g = sample();
        g.write_gr(&path).unwrap();

        let loaded = EdgeList::load(&path).unwrap();
        assert_eq!(loaded, g);
    }

    #[test]
    fn test_gr_without_edge_data() {
        let mut bytes = Vec::new();
        for v in [GR_VERSION_1, 0, 2, 1] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());

        let g = parse_gr(&bytes).unwrap();
        let edges: Vec<_> = g.iter().collect();
        assert_eq!(edges, vec![Edge::new(0, 1, DEFAULT_WEIGHT)]);
    }

    #[test]
    fn test_gr_rejects_truncated_and_bad_version() {
        let err = parse_gr(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, CheckError::InvalidFormat(_)));

        let mut bytes = Vec::new();
        for v in [7u64, 4, 0, 0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let err = parse_gr(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 7"));

        let dir = tempdir().unwrap();
        let path = dir.path().join("g.gr");
        sample().write_gr(&path).unwrap();
        let full = std::fs::read(&path).unwrap();
        let err = parse_gr(&full[..full.len() - 4]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_load_missing_file_is_load_failure() {
        let dir = tempdir().unwrap();
        let err = EdgeList::load(&dir.path().join("missing.txt")).unwrap_err();
        assert_eq!(err.code(), "LOAD_FAILURE");
        assert!(matches!(err, CheckError::Load { .. }));
    }
}
