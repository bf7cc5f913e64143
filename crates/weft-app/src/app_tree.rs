//! # App Tree
//!
//! An immutable tree describing the current UI of a weft app.
//!
//! Trees are composed of [`ElementNode`] leaves, which hold the payload of a
//! single element, and [`BlockNode`] branches, which group and lay out their
//! children. A simple tree might look like this:
//!
//! ```text
//!   AppRoot
//!   ├── BlockNode ("main")
//!   │   ├── ElementNode (text: "Ahoy, weft!")
//!   │   └── ElementNode (button: "Don't Push This")
//!   └── BlockNode ("sidebar")
//!       └── ElementNode (checkbox: "Batten The Hatches")
//! ```
//!
//! The backend sends `Delta` messages, each a single tree mutation ("add an
//! element", "add a block", "append rows"), and the client rebuilds the tree
//! bit by bit in response.
//!
//! Because renderers re-derive output from the tree on every mutation, nodes
//! are *immutable*: a mutation produces a new node, new ancestors up to the
//! root, and a brand-new [`AppRoot`]. Siblings off the mutated path are
//! shared by `Arc` reference, so consumers can detect change with a cheap
//! identity comparison and a reader mid-mutation always observes either the
//! old or the new snapshot, never a half-applied one.

use std::sync::Arc;

use weft_core::element::{Element, TextElement};
use weft_core::error::{Error, Result};
use weft_core::wire::{BlockConfig, Delta, ForwardMsgMetadata, RunId, NO_RUN_ID};

/// Index of the main content container under the root.
pub const ROOT_CONTAINER_MAIN: usize = 0;

/// Index of the sidebar container under the root.
pub const ROOT_CONTAINER_SIDEBAR: usize = 1;

// ============================================================================
// AppNode
// ============================================================================

/// A node of the app tree: a branch or a leaf.
#[derive(Debug, Clone)]
pub enum AppNode {
    Block(Arc<BlockNode>),
    Element(Arc<ElementNode>),
}

impl AppNode {
    /// Id of the script run that produced this node.
    pub fn script_run_id(&self) -> &str {
        match self {
            AppNode::Block(b) => &b.script_run_id,
            AppNode::Element(e) => &e.script_run_id,
        }
    }

    /// Return the node at the given index path, or `None` if the path does
    /// not resolve.
    pub fn get_in(&self, path: &[usize]) -> Option<&AppNode> {
        match self {
            AppNode::Block(b) => b.get_in(path),
            // Leaves have no children; only the empty path could refer to
            // an element, and that case is handled by the caller.
            AppNode::Element(_) => None,
        }
    }

    /// Return a copy of this node with `node` set at the given index path.
    ///
    /// Fails if the path is empty, crosses a leaf, or indexes past the end
    /// of a child list (paths are never sparse).
    pub fn set_in(&self, path: &[usize], node: AppNode, run_id: &str) -> Result<AppNode> {
        match self {
            AppNode::Block(b) => Ok(AppNode::Block(Arc::new(b.set_in(path, node, run_id)?))),
            AppNode::Element(_) => Err(Error::protocol(
                "cannot set_in through an element node: paths never cross leaves",
            )),
        }
    }

    /// Recursively remove nodes whose run id is no longer current. Returns
    /// `None` if this node itself should no longer exist.
    pub fn clear_stale_nodes(&self, current_run_id: &str) -> Option<AppNode> {
        match self {
            AppNode::Block(b) => b
                .clear_stale_nodes(current_run_id)
                .map(|b| AppNode::Block(Arc::new(b))),
            AppNode::Element(e) => {
                if e.script_run_id == current_run_id {
                    Some(AppNode::Element(Arc::clone(e)))
                } else {
                    None
                }
            }
        }
    }

    /// Collect every element node in this subtree, in document order.
    pub fn collect_elements(&self, out: &mut Vec<Arc<ElementNode>>) {
        match self {
            AppNode::Block(b) => {
                for child in &b.children {
                    child.collect_elements(out);
                }
            }
            AppNode::Element(e) => out.push(Arc::clone(e)),
        }
    }
}

// ============================================================================
// ElementNode
// ============================================================================

/// A leaf node. Holds exactly one decoded element payload plus its delivery
/// metadata. Immutable: any logical update replaces the node wholesale.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub element: Element,
    pub metadata: ForwardMsgMetadata,
    pub script_run_id: RunId,
}

impl ElementNode {
    pub fn new(element: Element, metadata: ForwardMsgMetadata, script_run_id: RunId) -> Self {
        Self {
            element,
            metadata,
            script_run_id,
        }
    }
}

// ============================================================================
// BlockNode
// ============================================================================

/// A branch node holding an ordered list of children plus layout metadata.
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub children: Vec<AppNode>,
    pub config: BlockConfig,
    pub script_run_id: RunId,
}

impl Default for BlockNode {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            config: BlockConfig::default(),
            script_run_id: NO_RUN_ID.to_string(),
        }
    }
}

impl BlockNode {
    pub fn new(children: Vec<AppNode>, config: BlockConfig, script_run_id: RunId) -> Self {
        Self {
            children,
            config,
            script_run_id,
        }
    }

    /// True if this block has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get_in(&self, path: &[usize]) -> Option<&AppNode> {
        let (&child_index, rest) = path.split_first()?;
        let child = self.children.get(child_index)?;
        if rest.is_empty() {
            Some(child)
        } else {
            child.get_in(rest)
        }
    }

    /// Rebuild this block with `node` set at `path`. Children off the path
    /// are reused by reference.
    pub fn set_in(&self, path: &[usize], node: AppNode, run_id: &str) -> Result<BlockNode> {
        let (&child_index, rest) = path
            .split_first()
            .ok_or_else(|| Error::protocol("empty delta path"))?;

        // An index equal to len() appends; anything past that would leave a
        // hole in the child list.
        if child_index > self.children.len() {
            return Err(Error::protocol(format!(
                "bad set_in index {} (should be in [0, {}])",
                child_index,
                self.children.len()
            )));
        }

        let mut new_children = self.children.clone();
        let new_child = if rest.is_empty() {
            node
        } else {
            let existing = new_children.get(child_index).ok_or_else(|| {
                Error::protocol(format!(
                    "set_in path continues through missing child {child_index}"
                ))
            })?;
            existing.set_in(rest, node, run_id)?
        };

        if child_index == new_children.len() {
            new_children.push(new_child);
        } else {
            new_children[child_index] = new_child;
        }

        Ok(BlockNode::new(
            new_children,
            self.config.clone(),
            run_id.to_string(),
        ))
    }

    /// Recursively drop children from superseded runs. Returns `None` when
    /// this block should be pruned: its own run is stale, or it ended up
    /// empty without an allow-empty exemption.
    pub fn clear_stale_nodes(&self, current_run_id: &str) -> Option<BlockNode> {
        if self.script_run_id != current_run_id {
            return None;
        }

        let new_children: Vec<AppNode> = self
            .children
            .iter()
            .filter_map(|child| child.clear_stale_nodes(current_run_id))
            .collect();

        if new_children.is_empty() && !self.config.allow_empty {
            return None;
        }

        Some(BlockNode::new(
            new_children,
            self.config.clone(),
            current_run_id.to_string(),
        ))
    }
}

// ============================================================================
// AppRoot
// ============================================================================

/// The root of the app tree: exactly two top-level containers, main content
/// and sidebar, addressed by fixed index.
#[derive(Debug, Clone)]
pub struct AppRoot {
    root: Arc<BlockNode>,
}

impl AppRoot {
    /// Create an empty root, optionally with a placeholder text element in
    /// the main container.
    pub fn empty(placeholder_text: Option<&str>) -> Self {
        let main_children = match placeholder_text {
            Some(text) => vec![AppNode::Element(Arc::new(ElementNode::new(
                Element::Text(TextElement { body: text.into() }),
                ForwardMsgMetadata::default(),
                NO_RUN_ID.to_string(),
            )))],
            None => Vec::new(),
        };

        let main = BlockNode::new(
            main_children,
            BlockConfig::allow_empty(),
            NO_RUN_ID.to_string(),
        );
        let sidebar = BlockNode::new(
            Vec::new(),
            BlockConfig::allow_empty(),
            NO_RUN_ID.to_string(),
        );

        Self::new(BlockNode::new(
            vec![
                AppNode::Block(Arc::new(main)),
                AppNode::Block(Arc::new(sidebar)),
            ],
            BlockConfig::allow_empty(),
            NO_RUN_ID.to_string(),
        ))
    }

    /// Wrap a root block.
    ///
    /// # Panics
    ///
    /// Panics unless the root has exactly two block children (main and
    /// sidebar). Any other shape is a contract violation that must not be
    /// papered over.
    pub fn new(root: BlockNode) -> Self {
        let block_children = root
            .children
            .iter()
            .filter(|c| matches!(c, AppNode::Block(_)))
            .count();
        assert!(
            root.children.len() == 2 && block_children == 2,
            "invalid app root: expected exactly [main, sidebar] block children, got {} children \
             ({} blocks)",
            root.children.len(),
            block_children,
        );
        Self {
            root: Arc::new(root),
        }
    }

    /// The main content container.
    pub fn main(&self) -> &Arc<BlockNode> {
        match &self.root.children[ROOT_CONTAINER_MAIN] {
            AppNode::Block(b) => b,
            AppNode::Element(_) => unreachable!("root shape checked at construction"),
        }
    }

    /// The sidebar container.
    pub fn sidebar(&self) -> &Arc<BlockNode> {
        match &self.root.children[ROOT_CONTAINER_SIDEBAR] {
            AppNode::Block(b) => b,
            AppNode::Element(_) => unreachable!("root shape checked at construction"),
        }
    }

    /// Look up a node by delta path.
    pub fn get_in(&self, path: &[usize]) -> Option<&AppNode> {
        self.root.get_in(path)
    }

    /// Apply one delta and return the resulting tree.
    pub fn apply_delta(
        &self,
        run_id: &str,
        delta: &Delta,
        metadata: &ForwardMsgMetadata,
    ) -> Result<AppRoot> {
        let path = &metadata.delta_path;
        match delta {
            Delta::NewElement { element } => {
                let node = AppNode::Element(Arc::new(ElementNode::new(
                    element.clone(),
                    metadata.clone(),
                    run_id.to_string(),
                )));
                self.set_in(path, node, run_id)
            }
            Delta::AddBlock { block } => self.add_block(path, block, run_id),
            Delta::AddRows { rows } => self.add_rows(path, run_id, |element| match element {
                Element::DataFrame(df) => {
                    let mut df = df.clone();
                    df.data.append(rows)?;
                    Ok(Element::DataFrame(df))
                }
                other => Err(Error::protocol(format!(
                    "element kind '{}' is not a valid addRows target",
                    other.kind()
                ))),
            }),
            Delta::AddRowsColumnar { dataset } => {
                self.add_rows(path, run_id, |element| match element {
                    Element::Chart(chart) => {
                        let mut chart = chart.clone();
                        chart.append_dataset(dataset)?;
                        Ok(Element::Chart(chart))
                    }
                    other => Err(Error::protocol(format!(
                        "element kind '{}' is not a valid addRowsColumnar target",
                        other.kind()
                    ))),
                })
            }
        }
    }

    /// Drop every node not produced by `current_run_id`, keeping allow-empty
    /// branches. The two root containers always survive (possibly empty).
    pub fn clear_stale_nodes(&self, current_run_id: &str) -> AppRoot {
        let main = self
            .main()
            .clear_stale_nodes(current_run_id)
            .unwrap_or_else(|| {
                BlockNode::new(
                    Vec::new(),
                    BlockConfig::allow_empty(),
                    current_run_id.to_string(),
                )
            });
        let sidebar = self
            .sidebar()
            .clear_stale_nodes(current_run_id)
            .unwrap_or_else(|| {
                BlockNode::new(
                    Vec::new(),
                    BlockConfig::allow_empty(),
                    current_run_id.to_string(),
                )
            });

        Self::new(BlockNode::new(
            vec![
                AppNode::Block(Arc::new(main)),
                AppNode::Block(Arc::new(sidebar)),
            ],
            BlockConfig::allow_empty(),
            current_run_id.to_string(),
        ))
    }

    /// Every element in the tree, main container first, document order.
    pub fn get_elements(&self) -> Vec<Arc<ElementNode>> {
        let mut out = Vec::new();
        self.root.children[ROOT_CONTAINER_MAIN].collect_elements(&mut out);
        self.root.children[ROOT_CONTAINER_SIDEBAR].collect_elements(&mut out);
        out
    }

    fn set_in(&self, path: &[usize], node: AppNode, run_id: &str) -> Result<AppRoot> {
        Ok(Self::new(self.root.set_in(path, node, run_id)?))
    }

    fn add_block(&self, path: &[usize], block: &BlockConfig, run_id: &str) -> Result<AppRoot> {
        // A block redrawn at an existing path inherits the children that are
        // already there: containers are re-emitted every run, and dropping
        // their children would reset the identity of every widget inside.
        let children = match self.root.get_in(path) {
            Some(AppNode::Block(existing)) => existing.children.clone(),
            _ => Vec::new(),
        };

        let node = AppNode::Block(Arc::new(BlockNode::new(
            children,
            block.clone(),
            run_id.to_string(),
        )));
        self.set_in(path, node, run_id)
    }

    fn add_rows<F>(&self, path: &[usize], run_id: &str, mutate: F) -> Result<AppRoot>
    where
        F: FnOnce(&Element) -> Result<Element>,
    {
        let existing = match self.root.get_in(path) {
            Some(AppNode::Element(e)) => e,
            Some(AppNode::Block(_)) => {
                return Err(Error::protocol(format!(
                    "addRows targets a block at {path:?}, expected an element"
                )))
            }
            None => {
                return Err(Error::protocol(format!(
                    "cannot addRows: invalid delta path {path:?}"
                )))
            }
        };

        // Build a new leaf around a mutated copy of the payload so identity
        // comparison sees the change.
        let element = mutate(&existing.element)?;
        let node = AppNode::Element(Arc::new(ElementNode::new(
            element,
            existing.metadata.clone(),
            run_id.to_string(),
        )));
        self.set_in(path, node, run_id)
    }
}

impl Default for AppRoot {
    fn default() -> Self {
        Self::empty(None)
    }
}

// ============================================================================
// Tests
// ============================================================================
