use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::ElementTree;

/// Upper bound on nodes in one snapshot. The page script sends at most
/// the target, ten ancestors and two hundred descendants.
pub const MAX_NODES: usize = 512;

/// One element as captured by the page script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// Stable selector-like path, used for highlighting and repeat detection.
    pub key: String,
    /// `innerText` (or `textContent`) at capture time.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub children: Vec<usize>,
}

/// Arena of the elements around a tap: the target, its ancestor chain and
/// the target's `span`/`div`/`p` descendants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapSnapshot {
    pub target: usize,
    pub nodes: Vec<SnapshotNode>,
}

impl TapSnapshot {
    /// Rejects oversized snapshots, and those whose indices point outside
    /// the arena or whose parent links loop.
    pub fn validate(&self) -> Result<()> {
        let len = self.nodes.len();
        if len > MAX_NODES {
            anyhow::bail!("Tap snapshot too large ({} nodes, max {})", len, MAX_NODES);
        }
        if self.target >= len {
            anyhow::bail!("Tap target {} out of range ({} nodes)", self.target, len);
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(p) = node.parent {
                if p >= len {
                    anyhow::bail!("Node {} has parent {} out of range", i, p);
                }
            }
            if let Some(&c) = node.children.iter().find(|&&c| c >= len) {
                anyhow::bail!("Node {} has child {} out of range", i, c);
            }
        }
        for start in 0..len {
            let mut steps = 0;
            let mut current = self.nodes[start].parent;
            while let Some(p) = current {
                steps += 1;
                if steps > len {
                    anyhow::bail!("Parent chain starting at node {} loops", start);
                }
                current = self.nodes[p].parent;
            }
        }
        Ok(())
    }

    pub fn key_of(&self, id: usize) -> Option<&str> {
        self.nodes.get(id).map(|n| n.key.as_str())
    }
}

impl ElementTree for TapSnapshot {
    type Id = usize;

    fn parent(&self, id: &usize) -> Option<usize> {
        self.nodes.get(*id).and_then(|n| n.parent)
    }

    fn rendered_text(&self, id: &usize) -> &str {
        self.nodes.get(*id).map(|n| n.text.as_str()).unwrap_or("")
    }

    fn descendants(&self, id: &usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = match self.nodes.get(*id) {
            Some(n) => n.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            // Validated snapshots are trees, this only guards against junk.
            if out.contains(&next) || next == *id {
                continue;
            }
            out.push(next);
            if let Some(n) = self.nodes.get(next) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    fn element_key(&self, id: &usize) -> String {
        self.key_of(*id).unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> TapSnapshot {
        serde_json::from_value(json).expect("valid snapshot json")
    }

    #[test]
    fn deserializes_page_payload_with_defaults() {
        let snapshot = parse(serde_json::json!({
            "target": 1,
            "nodes": [
                { "key": "div.message-in", "text": "Hello", "children": [1] },
                { "key": "div.message-in>span", "parent": 0 }
            ]
        }));
        assert_eq!(snapshot.nodes[1].text, "");
        assert_eq!(snapshot.parent(&1), Some(0));
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn descendants_are_in_document_order() {
        // 0 > [1 > [3, 4], 2]
        let snapshot = parse(serde_json::json!({
            "target": 0,
            "nodes": [
                { "key": "a", "children": [1, 2] },
                { "key": "b", "parent": 0, "children": [3, 4] },
                { "key": "c", "parent": 0 },
                { "key": "d", "parent": 1 },
                { "key": "e", "parent": 1 }
            ]
        }));
        assert_eq!(snapshot.descendants(&0), vec![1, 3, 4, 2]);
        assert_eq!(snapshot.descendants(&2), Vec::<usize>::new());
    }

    #[test]
    fn validate_rejects_bad_indices_and_loops() {
        let out_of_range = parse(serde_json::json!({
            "target": 3,
            "nodes": [{ "key": "a" }]
        }));
        assert!(out_of_range.validate().is_err());

        let looping = parse(serde_json::json!({
            "target": 0,
            "nodes": [
                { "key": "a", "parent": 1 },
                { "key": "b", "parent": 0 }
            ]
        }));
        assert!(looping.validate().is_err());
    }

    #[test]
    fn validate_caps_node_count() {
        let flat = |count: usize| TapSnapshot {
            target: 0,
            nodes: (0..count)
                .map(|i| SnapshotNode {
                    key: format!("n{}", i),
                    text: String::new(),
                    parent: None,
                    children: Vec::new(),
                })
                .collect(),
        };
        assert!(flat(MAX_NODES).validate().is_ok());
        let err = flat(MAX_NODES + 1).validate().unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
