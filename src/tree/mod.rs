//! The syntax tree: an arena of named nodes
//!
//! Every entity of a schema lives in a single [`Tree`] rooted at an
//! anonymous root node. Nodes own their children exclusively; references
//! between entities are modeled as leaf children carrying a textual
//! target (see [`Reference`]), so the data structure itself stays
//! acyclic while the referenced graph may not.

pub(crate) mod builder;
pub(crate) mod resolver;
pub mod traversal;
pub mod types;
pub(crate) mod validate;

use crate::error::SchemaError;

use {
	self::types::{BasicType, FieldType},
	std::collections::HashMap,
};

/// Separator of node path segments
pub const PATH_SEPARATOR: char = '.';

const REFERENCE_SIGIL: char = '@';

/// The location of a node in a [`Tree`]
///
/// This can be used to [`Index`](std::ops::Index) into the [`Tree`].
/// (Indexing with a key of another tree may panic or return an arbitrary
/// node.)
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
	idx: usize,
}

impl NodeKey {
	pub const fn from_idx(idx: usize) -> Self {
		Self { idx }
	}

	pub const fn idx(self) -> usize {
		self.idx
	}
}

impl std::fmt::Debug for NodeKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.idx, f)
	}
}

/// The syntax tree of a schema
///
/// Nodes are stored in an arena; [`NodeKey`]s index into it. The first
/// node is the anonymous root. Nodes are never freed during compilation,
/// so keys stay valid for the lifetime of the tree.
#[derive(Debug)]
pub struct Tree {
	nodes: Vec<Node>,
}

/// One node of the [`Tree`]: a name, a place in the hierarchy, and a
/// kind-specific payload
#[derive(Debug)]
pub struct Node {
	name: String,
	doc: Option<String>,
	parent: Option<NodeKey>,
	children: Vec<NodeKey>,
	child_index: HashMap<String, NodeKey>,
	payload: Payload,
}

/// The kind-specific data of a [`Node`]
#[derive(Debug)]
#[non_exhaustive]
pub enum Payload {
	/// The anonymous root; its name is empty
	Root,
	/// A namespace; the only node kind that may nest
	Namespace,
	/// A structure of bit-packed fields
	Structure(Structure),
	/// A field of a structure
	Field(Field),
	/// An enumeration over a basic type
	Enumeration(Enumeration),
	/// A declared or auto-generated enumeration value
	EnumerationValue(EnumerationValue),
	/// A typed integer constant
	Constant(Constant),
	/// A container of resources
	Archive,
	/// A member of an archive
	Resource(Resource),
	/// A named group of sibling resources declared via `@bound_implicitly`
	BoundResource,
	/// An `@explicit_reference` decoration attached to a resource
	ExplicitReference,
	/// A leaf pointing at another node by textual target
	Reference(Reference),
}

/// Payload of a [`Payload::Structure`] node
#[derive(Debug, Default)]
pub struct Structure {
	pub(crate) size_in_bits: Option<u32>,
}

impl Structure {
	/// Sum of the field widths; assigned by the layout pass
	pub fn size_in_bits(&self) -> Option<u32> {
		self.size_in_bits
	}

	/// The structure's size rounded up to whole bytes
	pub fn size_in_bytes(&self) -> Option<u32> {
		self.size_in_bits.map(|bits| (bits + 7) / 8)
	}
}

/// Payload of a [`Payload::Field`] node
#[derive(Debug)]
pub struct Field {
	pub(crate) type_: Option<FieldType>,
	pub(crate) offset: Option<u32>,
	pub(crate) width: Option<u32>,
	pub(crate) range: Option<String>,
}

impl Field {
	/// The resolved type; `None` only before enum-reference typing ran
	pub fn field_type(&self) -> Option<FieldType> {
		self.type_
	}

	/// Bit offset inside the owning structure; assigned by the layout pass
	pub fn offset(&self) -> Option<u32> {
		self.offset
	}

	/// The width annotation as written in the schema, if any
	pub fn declared_width(&self) -> Option<u32> {
		self.width
	}

	/// Effective width of the field in bits
	pub fn width(&self) -> Option<u32> {
		self.type_.map(FieldType::width)
	}

	/// Name of the range this field anchors, if any
	pub fn range(&self) -> Option<&str> {
		self.range.as_deref()
	}
}

/// Payload of a [`Payload::Enumeration`] node
#[derive(Debug)]
pub struct Enumeration {
	pub(crate) type_: BasicType,
}

impl Enumeration {
	/// The backing basic type, narrowed to the declared width
	pub fn basic_type(&self) -> BasicType {
		self.type_
	}
}

/// Payload of a [`Payload::EnumerationValue`] node
#[derive(Debug)]
pub struct EnumerationValue {
	pub(crate) value: i128,
	pub(crate) auto_generated: bool,
}

impl EnumerationValue {
	pub fn value(&self) -> i128 {
		self.value
	}

	/// Whether this entry was synthesized to make the enumeration exhaustive
	pub fn auto_generated(&self) -> bool {
		self.auto_generated
	}
}

/// Payload of a [`Payload::Constant`] node
#[derive(Debug)]
pub struct Constant {
	pub(crate) type_: BasicType,
	pub(crate) value: i128,
}

impl Constant {
	pub fn basic_type(&self) -> BasicType {
		self.type_
	}

	pub fn value(&self) -> i128 {
		self.value
	}
}

/// Payload of a [`Payload::Resource`] node
#[derive(Debug)]
pub struct Resource {
	pub(crate) kind: ResourceKind,
	pub(crate) optional: bool,
	pub(crate) max_size: Option<u64>,
}

impl Resource {
	pub fn kind(&self) -> &ResourceKind {
		&self.kind
	}

	/// Whether the resource may be absent from an archive
	pub fn optional(&self) -> bool {
		self.optional
	}

	/// Upper bound on the element count, derived from the widths of
	/// explicit-reference source fields; `None` means unbounded
	pub fn max_size(&self) -> Option<u64> {
		self.max_size
	}
}

/// The storage variant of a [`Resource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResourceKind {
	/// A singleton of one structure
	Instance,
	/// A vector of one structure
	Vector,
	/// Heterogeneous lists over an index of the given width
	Multivector { width: u32 },
	/// An opaque blob of bytes
	RawData,
	/// A nested archive
	Subarchive,
}

/// Payload of a [`Payload::Reference`] node
///
/// The textual target is encoded in the node's *name*: `.` separators are
/// replaced by a reserved sigil and one more sigil is prepended, so
/// reference names can never collide with ordinary identifiers. A target
/// starting from the root therefore produces a doubled sigil, which is
/// the "qualified" test.
#[derive(Debug)]
pub struct Reference {
	pub(crate) kind: ReferenceKind,
	pub(crate) width: Option<u32>,
}

impl Reference {
	pub fn kind(&self) -> ReferenceKind {
		self.kind
	}

	/// Width annotation carried by enumeration references
	pub fn width(&self) -> Option<u32> {
		self.width
	}
}

/// What a [`Reference`] points at, and with which obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReferenceKind {
	/// Resource → structure type obligation
	Structure,
	/// Multivector → synthesized index structure
	BuiltinStructure,
	/// Subarchive resource → archive
	Archive,
	/// Field type → enumeration
	Enumeration,
	/// Field `@const` decoration → constant
	Constant,
	/// Archive → constant quoted in its schema
	ConstantValue,
	/// Field `@optional` decoration → constant marking the invalid value
	InvalidValue,
	/// Explicit reference or bound group → resource
	Resource,
	/// Explicit reference → vector resource
	Vector,
	/// Explicit reference → source field
	Field,
}

impl ReferenceKind {
	/// Type references participate in cycle detection and dependency
	/// order; runtime references do not.
	pub fn is_type_reference(self) -> bool {
		!matches!(
			self,
			ReferenceKind::Resource | ReferenceKind::Vector | ReferenceKind::Field
		)
	}
}

/// Encode a textual target into the sigil-reserved reference name
pub(crate) fn referencify(target: &str) -> String {
	let mut name = String::with_capacity(target.len() + 1);
	name.push(REFERENCE_SIGIL);
	for c in target.chars() {
		name.push(if c == PATH_SEPARATOR { REFERENCE_SIGIL } else { c });
	}
	name
}

/// Decode a reference name back into its textual target
pub(crate) fn dereferencify(name: &str) -> String {
	name[1..]
		.chars()
		.map(|c| if c == REFERENCE_SIGIL { PATH_SEPARATOR } else { c })
		.collect()
}

impl Node {
	fn new(name: String, doc: Option<String>, payload: Payload) -> Self {
		Self {
			name,
			doc,
			parent: None,
			children: Vec::new(),
			child_index: HashMap::new(),
			payload,
		}
	}

	/// The node's local name (unique among its siblings)
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The comment attached to the declaration, if any
	pub fn doc(&self) -> Option<&str> {
		self.doc.as_deref()
	}

	pub fn parent(&self) -> Option<NodeKey> {
		self.parent
	}

	/// Children in insertion order
	pub fn children(&self) -> &[NodeKey] {
		&self.children
	}

	pub fn payload(&self) -> &Payload {
		&self.payload
	}

	/// A short name of the node's kind, for diagnostics
	pub fn kind_name(&self) -> &'static str {
		match &self.payload {
			Payload::Root => "root",
			Payload::Namespace => "namespace",
			Payload::Structure(_) => "structure",
			Payload::Field(_) => "field",
			Payload::Enumeration(_) => "enumeration",
			Payload::EnumerationValue(_) => "enumeration value",
			Payload::Constant(_) => "constant",
			Payload::Archive => "archive",
			Payload::Resource(resource) => match resource.kind {
				ResourceKind::Instance => "instance resource",
				ResourceKind::Vector => "vector resource",
				ResourceKind::Multivector { .. } => "multivector resource",
				ResourceKind::RawData => "raw data resource",
				ResourceKind::Subarchive => "subarchive resource",
			},
			Payload::BoundResource => "bound resource",
			Payload::ExplicitReference => "explicit reference",
			Payload::Reference(_) => "reference",
		}
	}

	pub fn is_namespace(&self) -> bool {
		matches!(self.payload, Payload::Namespace)
	}

	pub fn is_structure(&self) -> bool {
		matches!(self.payload, Payload::Structure(_))
	}

	pub fn is_field(&self) -> bool {
		matches!(self.payload, Payload::Field(_))
	}

	pub fn is_enumeration(&self) -> bool {
		matches!(self.payload, Payload::Enumeration(_))
	}

	pub fn is_enumeration_value(&self) -> bool {
		matches!(self.payload, Payload::EnumerationValue(_))
	}

	pub fn is_constant(&self) -> bool {
		matches!(self.payload, Payload::Constant(_))
	}

	pub fn is_archive(&self) -> bool {
		matches!(self.payload, Payload::Archive)
	}

	pub fn is_resource(&self) -> bool {
		matches!(self.payload, Payload::Resource(_))
	}

	pub fn is_bound_resource(&self) -> bool {
		matches!(self.payload, Payload::BoundResource)
	}

	pub fn is_explicit_reference(&self) -> bool {
		matches!(self.payload, Payload::ExplicitReference)
	}

	pub fn is_reference(&self) -> bool {
		matches!(self.payload, Payload::Reference(_))
	}

	pub fn as_structure(&self) -> Option<&Structure> {
		match &self.payload {
			Payload::Structure(structure) => Some(structure),
			_ => None,
		}
	}

	pub fn as_field(&self) -> Option<&Field> {
		match &self.payload {
			Payload::Field(field) => Some(field),
			_ => None,
		}
	}

	pub fn as_enumeration(&self) -> Option<&Enumeration> {
		match &self.payload {
			Payload::Enumeration(enumeration) => Some(enumeration),
			_ => None,
		}
	}

	pub fn as_enumeration_value(&self) -> Option<&EnumerationValue> {
		match &self.payload {
			Payload::EnumerationValue(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_constant(&self) -> Option<&Constant> {
		match &self.payload {
			Payload::Constant(constant) => Some(constant),
			_ => None,
		}
	}

	pub fn as_resource(&self) -> Option<&Resource> {
		match &self.payload {
			Payload::Resource(resource) => Some(resource),
			_ => None,
		}
	}

	pub fn as_reference(&self) -> Option<&Reference> {
		match &self.payload {
			Payload::Reference(reference) => Some(reference),
			_ => None,
		}
	}

	/// The decoded textual target, for reference nodes
	pub fn reference_target(&self) -> Option<String> {
		match self.payload {
			Payload::Reference(_) => Some(dereferencify(&self.name)),
			_ => None,
		}
	}

	/// Whether a reference's target starts from the root
	pub fn is_qualified_reference(&self) -> bool {
		self.is_reference() && self.name.starts_with("@@")
	}
}

impl std::ops::Index<NodeKey> for Tree {
	type Output = Node;
	fn index(&self, key: NodeKey) -> &Self::Output {
		&self.nodes[key.idx]
	}
}

impl Tree {
	/// An empty tree holding only the root node
	pub(crate) fn new() -> Self {
		Self {
			nodes: vec![Node::new(String::new(), None, Payload::Root)],
		}
	}

	/// Key of the anonymous root node
	pub fn root(&self) -> NodeKey {
		NodeKey::from_idx(0)
	}

	/// Number of nodes in the arena (detached ones included)
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		// the root is always there
		false
	}

	/// Try to get a node (or `None` if the key is invalid)
	pub fn get(&self, key: NodeKey) -> Option<&Node> {
		self.nodes.get(key.idx)
	}

	pub(crate) fn node_mut(&mut self, key: NodeKey) -> &mut Node {
		&mut self.nodes[key.idx]
	}

	pub(crate) fn payload_mut(&mut self, key: NodeKey) -> &mut Payload {
		&mut self.nodes[key.idx].payload
	}

	/// Allocate a detached node
	pub(crate) fn alloc(&mut self, name: String, doc: Option<String>, payload: Payload) -> NodeKey {
		debug_assert!(!name.contains(PATH_SEPARATOR));
		let key = NodeKey::from_idx(self.nodes.len());
		self.nodes.push(Node::new(name, doc, payload));
		key
	}

	/// Insert a detached node as the last child of `parent`
	///
	/// Fails with *symbol redefinition* if a sibling of the same name
	/// exists. A node that already has a parent cannot be inserted again.
	pub(crate) fn insert(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), SchemaError> {
		let name = self[child].name.clone();
		if let Some(&existing) = self[parent].child_index.get(&name) {
			return Err(SchemaError::SymbolRedefinition {
				duplicate: name,
				existing: self.path_of(existing),
			});
		}
		assert!(
			self[child].parent.is_none(),
			"node {:?} already has a parent, re-parenting requires detach",
			name
		);
		self.node_mut(child).parent = Some(parent);
		self.node_mut(parent).children.push(child);
		self.node_mut(parent).child_index.insert(name, child);
		Ok(())
	}

	/// Detach a node from its parent, keeping its subtree intact
	pub(crate) fn detach(&mut self, key: NodeKey) {
		let Some(parent) = self[key].parent else { return };
		let name = self[key].name.clone();
		self.node_mut(parent).children.retain(|&c| c != key);
		self.node_mut(parent).child_index.remove(&name);
		self.node_mut(key).parent = None;
	}

	/// Rename a node, reindexing its parent's child map
	///
	/// The child order is preserved; only the name index changes.
	pub(crate) fn rename(&mut self, key: NodeKey, new_name: String) -> Result<(), SchemaError> {
		let old_name = self[key].name.clone();
		if old_name == new_name {
			return Ok(());
		}
		if let Some(parent) = self[key].parent {
			if let Some(&existing) = self[parent].child_index.get(&new_name) {
				return Err(SchemaError::SymbolRedefinition {
					duplicate: new_name,
					existing: self.path_of(existing),
				});
			}
			self.node_mut(parent).child_index.remove(&old_name);
			self.node_mut(parent).child_index.insert(new_name.clone(), key);
		}
		self.node_mut(key).name = new_name;
		Ok(())
	}

	/// Find a node by its absolute path (leading separator, e.g. `.n.S`)
	///
	/// The empty path is the root.
	pub fn find(&self, path: &str) -> Option<NodeKey> {
		if path.is_empty() {
			return Some(self.root());
		}
		let relative = path.strip_prefix(PATH_SEPARATOR)?;
		self.find_from(self.root(), relative)
	}

	/// Find a node by a path relative to `scope` (no leading separator)
	pub fn find_from(&self, scope: NodeKey, path: &str) -> Option<NodeKey> {
		let mut current = scope;
		for segment in path.split(PATH_SEPARATOR) {
			current = *self[current].child_index.get(segment)?;
		}
		Some(current)
	}

	/// Find the deepest existing node along an absolute path
	pub(crate) fn find_last(&self, path: &str) -> NodeKey {
		let mut current = self.root();
		let Some(relative) = path.strip_prefix(PATH_SEPARATOR) else {
			return current;
		};
		for segment in relative.split(PATH_SEPARATOR) {
			match self[current].child_index.get(segment) {
				Some(&child) => current = child,
				None => break,
			}
		}
		current
	}

	/// A child of `key` by name
	pub fn child_by_name(&self, key: NodeKey, name: &str) -> Option<NodeKey> {
		self[key].child_index.get(name).copied()
	}

	/// The absolute path of a node, ancestors joined by `.`
	///
	/// The root's path is empty, so absolute paths start with the
	/// separator.
	pub fn path_of(&self, key: NodeKey) -> String {
		self.path_with(key, &PATH_SEPARATOR.to_string())
	}

	/// The absolute path of a node with a custom separator
	pub fn path_with(&self, key: NodeKey, separator: &str) -> String {
		let mut segments = Vec::new();
		let mut current = Some(key);
		while let Some(node) = current {
			segments.push(self[node].name.as_str());
			current = self[node].parent;
		}
		segments.reverse();
		segments.join(separator)
	}

	/// Number of ancestors of a node; the root has depth 0
	pub fn depth(&self, key: NodeKey) -> usize {
		let mut depth = 0;
		let mut current = self[key].parent;
		while let Some(node) = current {
			depth += 1;
			current = self[node].parent;
		}
		depth
	}

	/// The first ancestor satisfying `predicate`
	pub fn first_parent_where(
		&self,
		key: NodeKey,
		predicate: impl Fn(&Node) -> bool,
	) -> Option<NodeKey> {
		let mut current = self[key].parent;
		while let Some(node) = current {
			if predicate(&self[node]) {
				return Some(node);
			}
			current = self[node].parent;
		}
		None
	}

	/// Enclosing namespaces of a node, outermost first
	pub fn namespaces_of(&self, key: NodeKey) -> Vec<NodeKey> {
		let mut namespaces = Vec::new();
		let mut current = self[key].parent;
		while let Some(node) = current {
			if self[node].is_namespace() {
				namespaces.push(node);
			}
			current = self[node].parent;
		}
		namespaces.reverse();
		namespaces
	}

	/// The namespace-qualified location of a node (e.g. `n._builtin`),
	/// without the node's own name
	pub fn namespace_path(&self, key: NodeKey, separator: &str) -> String {
		self.namespaces_of(key)
			.iter()
			.map(|&n| self[n].name.as_str())
			.collect::<Vec<_>>()
			.join(separator)
	}

	/// Pre-order traversal of the tree below (and including) `key`
	///
	/// This walks child edges only; reference targets are not followed.
	pub fn iterate_from(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
		let mut stack = vec![key];
		std::iter::from_fn(move || {
			let next = stack.pop()?;
			stack.extend(self[next].children.iter().rev().copied());
			Some(next)
		})
	}

	/// Pre-order traversal of the whole tree, root included
	pub fn iterate(&self) -> impl Iterator<Item = NodeKey> + '_ {
		self.iterate_from(self.root())
	}

	/// Paths of all attached nodes, in pre-order (the root's empty path
	/// excluded)
	pub fn symbols(&self) -> Vec<String> {
		self.iterate()
			.filter(|&key| key != self.root())
			.map(|key| self.path_of(key))
			.collect()
	}

	/// Children of `key` satisfying `predicate`, in insertion order
	pub fn children_where(
		&self,
		key: NodeKey,
		predicate: impl Fn(&Node) -> bool,
	) -> Vec<NodeKey> {
		self[key]
			.children
			.iter()
			.copied()
			.filter(|&child| predicate(&self[child]))
			.collect()
	}

	/// The fields of a structure, in declaration order
	pub fn fields(&self, structure: NodeKey) -> Vec<NodeKey> {
		self.children_where(structure, Node::is_field)
	}

	/// Whether any field of the structure is a range anchor
	pub fn has_range(&self, structure: NodeKey) -> bool {
		self.fields(structure).iter().any(|&field| {
			self[field]
				.as_field()
				.is_some_and(|f| f.range.is_some())
		})
	}

	/// The storage resources of an archive, in declaration order
	pub fn resources(&self, archive: NodeKey) -> Vec<NodeKey> {
		self.children_where(archive, Node::is_resource)
	}

	/// The bound-resource groups of an archive
	pub fn bound_resources(&self, archive: NodeKey) -> Vec<NodeKey> {
		self.children_where(archive, Node::is_bound_resource)
	}

	/// The explicit-reference decorations of a resource
	pub fn explicit_references(&self, resource: NodeKey) -> Vec<NodeKey> {
		self.children_where(resource, Node::is_explicit_reference)
	}

	/// Reference children of a node, filtered by kind
	pub fn references_of_kind(&self, key: NodeKey, kind: ReferenceKind) -> Vec<NodeKey> {
		self.children_where(key, |node| {
			node.as_reference().is_some_and(|r| r.kind == kind)
		})
	}

	/// The node a reference points at, if its target exists
	pub fn reference_target_node(&self, reference: NodeKey) -> Option<NodeKey> {
		let target = self[reference].reference_target()?;
		if target.starts_with(PATH_SEPARATOR) {
			self.find(&target)
		} else {
			// unresolved relative reference
			None
		}
	}

	/// The structures a resource stores, builtin index structures first,
	/// then the declared alternatives in order
	pub fn referenced_structures(&self, resource: NodeKey) -> Vec<NodeKey> {
		let mut structures: Vec<NodeKey> = self
			.references_of_kind(resource, ReferenceKind::BuiltinStructure)
			.into_iter()
			.chain(self.references_of_kind(resource, ReferenceKind::Structure))
			.filter_map(|r| self.reference_target_node(r))
			.collect();
		// a bound group aggregates the structures of its members
		if self[resource].is_bound_resource() {
			for member in self.references_of_kind(resource, ReferenceKind::Resource) {
				if let Some(target) = self.reference_target_node(member) {
					structures.extend(self.referenced_structures(target));
				}
			}
		}
		structures
	}

	/// The builtin index-structure reference of a multivector
	pub fn index_reference(&self, multivector: NodeKey) -> Option<NodeKey> {
		self.references_of_kind(multivector, ReferenceKind::BuiltinStructure)
			.into_iter()
			.next()
	}

	/// The bound-resource groups of the owning archive that name this
	/// resource
	pub fn binding_resources(&self, resource: NodeKey) -> Vec<NodeKey> {
		let Some(archive) = self[resource].parent else {
			return Vec::new();
		};
		if !self[archive].is_archive() {
			return Vec::new();
		}
		self.bound_resources(archive)
			.into_iter()
			.filter(|&group| {
				self.references_of_kind(group, ReferenceKind::Resource)
					.iter()
					.any(|&r| self.reference_target_node(r) == Some(resource))
			})
			.collect()
	}
}
