//! Directory tree index and path resolver.
//!
//! The verified manifest is flattened into an arena of [`Node`]s. Each node
//! stores its parent's index so `..` is an O(1) step and the tree holds no
//! reference cycles.

use crate::config::MatchPolicy;
use crate::types::FileInfo;
use caviar_core::{Error, Object, Result};
use std::path::{Component, Path, PathBuf};

/// Index of a node in the arena. The root is always 0.
pub type NodeId = usize;

/// File or directory payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file backed by `payload[offset..offset + size]`.
    File {
        /// Start in the payload
        offset: u64,
        /// Byte length
        size: u64,
    },
    /// Directory; children in build order.
    Dir {
        /// Child node indices
        children: Vec<NodeId>,
    },
}

/// One entry of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Last path segment; the root carries the prefix's last component
    pub name: String,
    /// `None` only for the root
    pub parent: Option<NodeId>,
    /// File or directory data
    pub kind: NodeKind,
}

impl Node {
    /// Returns `true` for directories.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Dir { .. })
    }

    /// File size, 0 for directories.
    #[must_use]
    pub const fn size(&self) -> u64 {
        match self.kind {
            NodeKind::File { size, .. } => size,
            NodeKind::Dir { .. } => 0,
        }
    }

    /// Synthetic metadata for this node.
    #[must_use]
    pub fn info(&self) -> FileInfo {
        match self.kind {
            NodeKind::File { size, .. } => FileInfo::file(&self.name, size),
            NodeKind::Dir { .. } => FileInfo::dir(&self.name),
        }
    }
}

/// Outcome of resolving a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The path names this node.
    Node(NodeId),
    /// The path does not fall under the virtual root.
    Outside,
}

/// Arena-backed directory tree rooted at a virtual prefix.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    prefix: PathBuf,
    policy: MatchPolicy,
}

impl Tree {
    /// Root node index.
    pub const ROOT: NodeId = 0;

    /// Flattens a verified manifest root into an arena.
    ///
    /// `prefix` must be absolute; it is normalized lexically.
    #[must_use]
    pub fn build(root: &Object, prefix: &Path, policy: MatchPolicy) -> Self {
        let prefix = normalize(prefix);
        let root_name = prefix
            .file_name()
            .map_or_else(|| "/".to_string(), |n| n.to_string_lossy().into_owned());

        let mut tree = Self {
            nodes: Vec::with_capacity(root.file_count() + root.dir_count()),
            prefix,
            policy,
        };
        tree.nodes.push(Node {
            name: root_name,
            parent: None,
            kind: NodeKind::Dir {
                children: Vec::new(),
            },
        });
        tree.insert_children(Self::ROOT, root);
        tree
    }

    fn insert_children(&mut self, parent: NodeId, obj: &Object) {
        let mut ids = Vec::with_capacity(obj.children.len());
        for child in &obj.children {
            let id = self.nodes.len();
            let kind = if child.is_dir() {
                NodeKind::Dir {
                    children: Vec::new(),
                }
            } else {
                NodeKind::File {
                    offset: child.offset,
                    size: child.size,
                }
            };
            self.nodes.push(Node {
                name: child.name.clone(),
                parent: Some(parent),
                kind,
            });
            if child.is_dir() {
                self.insert_children(id, child);
            }
            ids.push(id);
        }
        if let NodeKind::Dir { children } = &mut self.nodes[parent].kind {
            *children = ids;
        }
    }

    /// The normalized virtual root.
    #[must_use]
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree holds only its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Returns the node at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Children of a directory; empty for files.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id].kind {
            NodeKind::Dir { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Absolute virtual path of a node.
    #[must_use]
    pub fn path_of(&self, id: NodeId) -> PathBuf {
        let mut segments = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.nodes[cur].parent {
            segments.push(self.nodes[cur].name.as_str());
            cur = parent;
        }
        let mut path = self.prefix.clone();
        path.extend(segments.iter().rev());
        path
    }

    /// Resolves `path` against the current working directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the path is under the virtual root but
    /// names nothing, and [`Error::Io`] if a relative path is given and the
    /// working directory is unavailable.
    pub fn resolve(&self, path: &Path) -> Result<Resolution> {
        if path.is_absolute() {
            return self.resolve_from(path, Path::new("/"));
        }
        let cwd = std::env::current_dir().map_err(|e| Error::io(path, e))?;
        self.resolve_from(path, &cwd)
    }

    /// Resolves `path`, joining it to `cwd` when relative.
    ///
    /// Components before the virtual root are normalized lexically. Once the
    /// accumulated path equals the prefix the walk continues inside the tree,
    /// where `..` above the root is [`Error::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for missing entries under the virtual root.
    pub fn resolve_from(&self, path: &Path, cwd: &Path) -> Result<Resolution> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        let not_found = || Error::NotFound {
            path: path.display().to_string(),
        };

        let mut outer = PathBuf::new();
        let mut current: Option<NodeId> = None;

        for component in absolute.components() {
            let Some(node) = current else {
                match component {
                    Component::CurDir => {}
                    Component::ParentDir => {
                        outer.pop();
                    }
                    other => outer.push(other),
                }
                if outer == self.prefix {
                    current = Some(Self::ROOT);
                }
                continue;
            };

            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    current = Some(self.nodes[node].parent.ok_or_else(not_found)?);
                }
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(not_found)?;
                    let child = self
                        .children(node)
                        .iter()
                        .copied()
                        .find(|&c| self.policy.matches(segment, &self.nodes[c].name))
                        .ok_or_else(not_found)?;
                    current = Some(child);
                }
                Component::RootDir | Component::Prefix(_) => return Err(not_found()),
            }
        }

        Ok(current.map_or(Resolution::Outside, Resolution::Node))
    }
}

/// Lexically normalizes an absolute path: drops `.`, applies `..`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
