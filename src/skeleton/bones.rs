use crate::diagnostics::FilePosition;
use crate::dom::NodeId;
use crate::js::Stmt;

/// One step of the flattened document, in source order.
#[derive(Clone, Debug, PartialEq)]
pub enum Bone {
    /// An element or text node, with its copy in the safe tree.
    Node { source: NodeId, safe: NodeId },
    /// An inline script that stood where its element was.
    Script {
        body: Vec<Stmt>,
        position: FilePosition,
    },
}

impl Bone {
    pub fn is_script(&self) -> bool {
        matches!(self, Bone::Script { .. })
    }
}

/// Index just past the last [`Bone::Node`]; every bone from there on is a
/// script.
pub fn tail_start(bones: &[Bone]) -> usize {
    bones
        .iter()
        .rposition(|b| !b.is_script())
        .map_or(0, |i| i + 1)
}

/// True if the node bone at `index` must be addressable before the script
/// that follows it runs.
pub fn needs_split(bones: &[Bone], index: usize, tail_start: usize) -> bool {
    index + 1 < tail_start && bones[index + 1].is_script()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn split_points_skip_the_trailing_script_run() {
        let doc = Document::new();
        let id = doc.root_id();
        let node = Bone::Node { source: id, safe: id };
        let script = Bone::Script {
            body: vec![],
            position: FilePosition::unknown(),
        };
        // N S N S S
        let bones = vec![
            node.clone(),
            script.clone(),
            node.clone(),
            script.clone(),
            script.clone(),
        ];
        let tail = tail_start(&bones);
        assert_eq!(tail, 3);
        assert!(needs_split(&bones, 0, tail));
        assert!(!needs_split(&bones, 2, tail));
        assert_eq!(tail_start(&[script]), 0);
        assert_eq!(tail_start(&[node]), 1);
    }
}
