//! Name resolution
//!
//! Rewrites every reference's textual target to the absolute path of an
//! existing node, then checks that the target's kind matches what the
//! reference expects. Lookup walks outward from the reference: each
//! enclosing non-namespace scope first, then the innermost enclosing
//! namespace. Absolute targets are verified against the root directly.
//! Resolution is idempotent.

use crate::{
	error::SchemaError,
	tree::{referencify, Node, NodeKey, ReferenceKind, ResourceKind, Tree, PATH_SEPARATOR},
};

pub(crate) fn resolve_references(tree: &mut Tree) -> Result<(), SchemaError> {
	let references: Vec<NodeKey> = tree
		.iterate()
		.filter(|&key| tree[key].is_reference())
		.collect();
	for reference in &references {
		let reference = *reference;
		let target = tree[reference]
			.reference_target()
			.expect("filtered to reference nodes");
		if tree[reference].is_qualified_reference() {
			if tree.find(&target).is_none() {
				return Err(missing_symbol(tree, reference, &target));
			}
		} else {
			let resolved = resolve_in_parent_scope(tree, reference, &target)
				.or_else(|| resolve_in_parent_namespace(tree, reference, &target));
			match resolved {
				Some(path) => tree.rename(reference, referencify(&path))?,
				None => return Err(missing_symbol(tree, reference, &target)),
			}
		}
		validate_target_kind(tree, reference)?;
	}
	tracing::debug!(references = references.len(), "resolved references");
	Ok(())
}

/// Try the target against every enclosing non-namespace scope, starting
/// at the scope containing the reference's parent
fn resolve_in_parent_scope(tree: &Tree, reference: NodeKey, target: &str) -> Option<String> {
	let mut scope = tree[reference].parent()?;
	loop {
		let parent = tree[scope].parent()?;
		if tree[parent].is_namespace() {
			return None;
		}
		scope = parent;
		if let Some(symbol) = tree.find_from(scope, target) {
			return Some(tree.path_of(symbol));
		}
	}
}

/// Try the target against the innermost enclosing namespace
fn resolve_in_parent_namespace(tree: &Tree, reference: NodeKey, target: &str) -> Option<String> {
	let namespace = tree.first_parent_where(reference, Node::is_namespace)?;
	let symbol = tree.find_from(namespace, target)?;
	Some(tree.path_of(symbol))
}

fn missing_symbol(tree: &Tree, reference: NodeKey, target: &str) -> SchemaError {
	let wanted = last_segment(target);
	let suggestion = tree
		.symbols()
		.into_iter()
		.filter(|symbol| !symbol.contains('@'))
		.min_by_key(|symbol| strsim::levenshtein(wanted, last_segment(symbol)));
	SchemaError::MissingSymbol {
		name: target.to_owned(),
		path: tree.path_of(reference),
		suggestion,
	}
}

fn last_segment(path: &str) -> &str {
	path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

fn validate_target_kind(tree: &Tree, reference: NodeKey) -> Result<(), SchemaError> {
	let kind = tree[reference]
		.as_reference()
		.expect("only called on reference nodes")
		.kind();
	let target = tree
		.reference_target_node(reference)
		.expect("reference was just resolved");
	let node = &tree[target];
	let (matches, expected) = match kind {
		ReferenceKind::Structure | ReferenceKind::BuiltinStructure => {
			(node.is_structure(), "structure")
		}
		ReferenceKind::Archive => (node.is_archive(), "archive"),
		ReferenceKind::Enumeration => (node.is_enumeration(), "enumeration"),
		ReferenceKind::Constant | ReferenceKind::ConstantValue | ReferenceKind::InvalidValue => {
			(node.is_constant(), "constant")
		}
		ReferenceKind::Resource => {
			(node.is_resource() || node.is_bound_resource(), "resource")
		}
		ReferenceKind::Vector => (
			node.as_resource()
				.is_some_and(|resource| matches!(resource.kind(), ResourceKind::Vector)),
			"vector resource",
		),
		ReferenceKind::Field => (node.is_field(), "field"),
	};
	if matches {
		Ok(())
	} else {
		Err(SchemaError::IncorrectReferenceType {
			reference: tree[reference].name().to_owned(),
			expected,
			actual: node.kind_name(),
		})
	}
}
