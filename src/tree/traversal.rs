//! Reference-aware tree traversal
//!
//! Traversals walk the graph formed by child edges and resolved type
//! references: from each node they visit its non-reference children in
//! insertion order, then the targets of its type-reference children.
//! Runtime references (explicit references, bound groups) are not edges,
//! which is what permits their graphs to be cyclic by design.
//!
//! Both traversals are computed eagerly, so a *circular referencing*
//! error surfaces before any node is yielded.

use crate::{
	error::SchemaError,
	tree::{NodeKey, Tree},
};

use std::collections::VecDeque;

/// The children of a node in the traversal graph: non-reference children
/// first, then type-reference targets, both in insertion order
fn graph_children(tree: &Tree, key: NodeKey) -> Result<Vec<NodeKey>, SchemaError> {
	let mut children = Vec::new();
	let mut targets = Vec::new();
	for &child in tree[key].children() {
		match tree[child].as_reference() {
			None => children.push(child),
			Some(reference) if reference.kind().is_type_reference() => {
				let target = tree[child]
					.reference_target()
					.expect("reference nodes carry a target");
				match tree.find(&target) {
					Some(node) => targets.push(node),
					None => {
						return Err(SchemaError::MissingSymbol {
							name: target,
							path: tree.path_of(child),
							suggestion: None,
						})
					}
				}
			}
			Some(_) => {}
		}
	}
	children.extend(targets);
	Ok(children)
}

/// Breadth-first traversal yielding each reachable node once with its
/// distance from the start
pub struct BfsTraversal<'t> {
	tree: &'t Tree,
	start: NodeKey,
}

impl<'t> BfsTraversal<'t> {
	pub fn new(tree: &'t Tree, start: NodeKey) -> Self {
		Self { tree, start }
	}

	pub fn iterate(&self) -> Result<impl Iterator<Item = (NodeKey, usize)>, SchemaError> {
		let mut result = Vec::new();
		let mut queue = VecDeque::from([(self.start, 0)]);
		let mut processed = vec![false; self.tree.len()];
		while let Some((node, distance)) = queue.pop_front() {
			if processed[node.idx()] {
				continue;
			}
			result.push((node, distance));
			// children enqueue in original order, so they pop in order
			for child in graph_children(self.tree, node)? {
				if !processed[child.idx()] {
					queue.push_back((child, distance + 1));
				}
			}
			processed[node.idx()] = true;
		}
		Ok(result.into_iter())
	}
}

/// A step of a depth-first traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfsEvent {
	/// The node is visited for the first time (pre-order)
	Enter,
	/// All of the node's dependencies have been visited (post-order)
	Exit,
}

/// Depth-first traversal yielding entry and exit events
///
/// The exit events form the *dependency order*: every node appears after
/// everything it transitively depends on through child and type-reference
/// edges. Re-entering a node that is still being expanded is a cycle.
pub struct DfsTraversal<'t> {
	tree: &'t Tree,
	start: NodeKey,
}

impl<'t> DfsTraversal<'t> {
	pub fn new(tree: &'t Tree, start: NodeKey) -> Self {
		Self { tree, start }
	}

	pub fn events(&self) -> Result<Vec<(DfsEvent, NodeKey)>, SchemaError> {
		let mut events = Vec::new();
		let mut stack = vec![(self.start, false)];
		let mut discovered = vec![false; self.tree.len()];
		let mut processed = vec![false; self.tree.len()];

		while let Some((node, expanded)) = stack.pop() {
			if expanded {
				events.push((DfsEvent::Exit, node));
				processed[node.idx()] = true;
				continue;
			}
			if processed[node.idx()] {
				continue;
			}
			events.push((DfsEvent::Enter, node));
			discovered[node.idx()] = true;
			stack.push((node, true));
			// children push in reverse order, so they pop in order
			for child in graph_children(self.tree, node)?.into_iter().rev() {
				if !discovered[child.idx()] && !processed[child.idx()] {
					stack.push((child, false));
				} else if !processed[child.idx()] {
					return Err(SchemaError::CircularReferencing {
						node: self.tree.path_of(node),
						child: self.tree.path_of(child),
					});
				}
			}
		}
		Ok(events)
	}

	/// Nodes in pre-order
	pub fn iterate(&self) -> Result<impl Iterator<Item = NodeKey>, SchemaError> {
		Ok(self
			.events()?
			.into_iter()
			.filter(|(event, _)| *event == DfsEvent::Enter)
			.map(|(_, node)| node))
	}

	/// Nodes in dependency order (post-order)
	pub fn dependency_order(&self) -> Result<impl Iterator<Item = NodeKey>, SchemaError> {
		Ok(self
			.events()?
			.into_iter()
			.filter(|(event, _)| *event == DfsEvent::Exit)
			.map(|(_, node)| node))
	}
}
