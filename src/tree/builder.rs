//! Turns the shallow parse result into the syntax tree
//!
//! Each `namespace Q { … }` block becomes a detached chain of namespace
//! nodes which is then merged under the root, re-parenting declarations
//! and creating missing intermediate namespaces. Afterwards the builder
//! synthesizes the built-in multivector index structures and attaches the
//! per-archive constant-value references.

use crate::{
	error::SchemaError,
	grammar::{
		ParsedArchive, ParsedEnumeration, ParsedField, ParsedFieldDecoration, ParsedNamespace,
		ParsedResource, ParsedResourceType, ParsedSchema, ParsedStructure,
	},
	tree::{
		referencify,
		types::{BasicType, FieldType, Primitive},
		Constant, EnumerationValue, Field, NodeKey, Payload, Reference, ReferenceKind, Resource,
		ResourceKind, Structure, Tree, PATH_SEPARATOR,
	},
};

/// Build the full tree from a parse result
pub(crate) fn build(parsed: &ParsedSchema) -> Result<Tree, SchemaError> {
	let mut tree = Tree::new();
	let mut namespace_roots = Vec::new();
	for namespace in &parsed.namespaces {
		namespace_roots.push(build_namespace(&mut tree, namespace)?);
	}
	merge_namespaces(&mut tree, namespace_roots)?;
	append_builtin_structures(&mut tree)?;
	append_constant_references(&mut tree)?;
	tracing::debug!(nodes = tree.len(), "built syntax tree");
	Ok(tree)
}

/// Create a detached chain of namespace nodes for a dotted path; returns
/// (outermost, innermost)
fn create_nested_namespaces(
	tree: &mut Tree,
	path: &str,
) -> Result<(NodeKey, NodeKey), SchemaError> {
	let mut segments = path.split(PATH_SEPARATOR);
	let first = segments.next().filter(|s| !s.is_empty()).ok_or_else(|| {
		SchemaError::Parsing {
			message: format!("namespace name must not start with '{}': {}", PATH_SEPARATOR, path),
		}
	})?;
	let outermost = tree.alloc(first.to_owned(), None, Payload::Namespace);
	let mut innermost = outermost;
	for name in segments {
		let namespace = tree.alloc(name.to_owned(), None, Payload::Namespace);
		tree.insert(innermost, namespace)?;
		innermost = namespace;
	}
	Ok((outermost, innermost))
}

/// Find or create the namespace at an absolute path under the root
fn ensure_namespace(tree: &mut Tree, path: &str) -> Result<NodeKey, SchemaError> {
	if let Some(found) = tree.find(path) {
		return if tree[found].is_namespace() {
			Ok(found)
		} else {
			Err(SchemaError::SymbolRedefinition {
				duplicate: path.to_owned(),
				existing: tree.path_of(found),
			})
		};
	}
	let last_common = tree.find_last(path);
	let missing = &path[tree.path_of(last_common).len() + 1..];
	let (outermost, innermost) = create_nested_namespaces(tree, missing)?;
	tree.insert(last_common, outermost)?;
	Ok(innermost)
}

fn build_namespace(tree: &mut Tree, parsed: &ParsedNamespace) -> Result<NodeKey, SchemaError> {
	let (outermost, innermost) = create_nested_namespaces(tree, &parsed.name)?;
	for constant in &parsed.constants {
		let node = create_constant(tree, constant)?;
		tree.insert(innermost, node)?;
	}
	for structure in &parsed.structures {
		let node = create_structure(tree, structure)?;
		tree.insert(innermost, node)?;
	}
	for enumeration in &parsed.enumerations {
		let node = create_enumeration(tree, enumeration)?;
		tree.insert(innermost, node)?;
	}
	for archive in &parsed.archives {
		let node = create_archive(tree, archive)?;
		tree.insert(innermost, node)?;
	}
	Ok(outermost)
}

/// Re-parent the contents of every detached namespace chain under the root
fn merge_namespaces(tree: &mut Tree, namespace_roots: Vec<NodeKey>) -> Result<(), SchemaError> {
	for outermost in namespace_roots {
		let innermost = innermost_namespace(tree, outermost);
		let path = format!(
			"{}{}",
			PATH_SEPARATOR,
			tree.path_of(innermost)
		);
		let target = ensure_namespace(tree, &path)?;
		let children: Vec<NodeKey> = tree[innermost].children().to_vec();
		for child in children {
			tree.detach(child);
			tree.insert(target, child)?;
		}
	}
	Ok(())
}

fn innermost_namespace(tree: &Tree, outermost: NodeKey) -> NodeKey {
	let mut namespace = outermost;
	loop {
		let children = tree[namespace].children();
		match children {
			[single] if tree[*single].is_namespace() => namespace = *single,
			_ => return namespace,
		}
	}
}

fn create_constant(
	tree: &mut Tree,
	parsed: &crate::grammar::ParsedConstant,
) -> Result<NodeKey, SchemaError> {
	let type_ = BasicType::new(parsed.type_, None)?;
	if !type_.fits(parsed.value)? {
		return Err(SchemaError::InvalidConstantValue {
			name: parsed.name.clone(),
			value: parsed.value,
		});
	}
	Ok(tree.alloc(
		parsed.name.clone(),
		parsed.doc.clone(),
		Payload::Constant(Constant {
			type_,
			value: parsed.value,
		}),
	))
}

fn create_structure(tree: &mut Tree, parsed: &ParsedStructure) -> Result<NodeKey, SchemaError> {
	let structure = tree.alloc(
		parsed.name.clone(),
		parsed.doc.clone(),
		Payload::Structure(Structure::default()),
	);
	for field in &parsed.fields {
		let node = create_field(tree, field)?;
		tree.insert(structure, node)?;
	}
	Ok(structure)
}

fn create_field(tree: &mut Tree, parsed: &ParsedField) -> Result<NodeKey, SchemaError> {
	let mut range = None;
	let basic = Primitive::parse(&parsed.type_name);
	let type_ = match basic {
		Some(primitive) => Some(FieldType::Basic(BasicType::new(primitive, parsed.width)?)),
		// enum-backed fields get their type once the reference resolves
		None => None,
	};
	let field = tree.alloc(
		parsed.name.clone(),
		parsed.doc.clone(),
		Payload::Field(Field {
			type_,
			offset: None,
			width: parsed.width,
			range: None,
		}),
	);
	// reference children keep the canonical decoration order (const
	// values, then invalid values), so emission order survives reparsing
	for decoration in &parsed.decorations {
		if let ParsedFieldDecoration::Const(target) = decoration {
			let reference = create_reference(tree, ReferenceKind::Constant, target, None);
			tree.insert(field, reference)?;
		}
	}
	for decoration in &parsed.decorations {
		match decoration {
			ParsedFieldDecoration::Const(_) => {}
			ParsedFieldDecoration::InvalidValue(target) => {
				let reference = create_reference(tree, ReferenceKind::InvalidValue, target, None);
				tree.insert(field, reference)?;
			}
			ParsedFieldDecoration::Range(name) => {
				if range.is_none() {
					range = Some(name.clone());
				}
			}
		}
	}
	if basic.is_none() {
		let reference =
			create_reference(tree, ReferenceKind::Enumeration, &parsed.type_name, parsed.width);
		tree.insert(field, reference)?;
	}
	if let Payload::Field(payload) = tree.payload_mut(field) {
		payload.range = range;
	}
	Ok(field)
}

fn create_enumeration(
	tree: &mut Tree,
	parsed: &ParsedEnumeration,
) -> Result<NodeKey, SchemaError> {
	let type_ = BasicType::new(parsed.type_, parsed.width)?;
	let enumeration = tree.alloc(
		parsed.name.clone(),
		parsed.doc.clone(),
		Payload::Enumeration(crate::tree::Enumeration { type_ }),
	);

	let mut next_value: i128 = 0;
	let mut declared = Vec::new();
	for value in &parsed.values {
		if let Some(explicit) = value.value {
			next_value = explicit;
		}
		if declared.contains(&next_value) {
			return Err(SchemaError::DuplicateEnumValue {
				enumeration: parsed.name.clone(),
				value: next_value,
			});
		}
		declared.push(next_value);
		let node = tree.alloc(
			value.name.clone(),
			value.doc.clone(),
			Payload::EnumerationValue(EnumerationValue {
				value: next_value,
				auto_generated: false,
			}),
		);
		tree.insert(enumeration, node)?;
		next_value += 1;
	}

	// Every unpopulated value of the declared range becomes a synthesized
	// entry, so the guard keeps the range within a couple multiples of the
	// declared population.
	if 2 * parsed.values.len() as i128 + 256 < 1i128 << type_.width() {
		return Err(SchemaError::SparseEnum {
			enumeration: parsed.name.clone(),
			width: type_.width(),
		});
	}
	for missing in type_.value_range() {
		if declared.contains(&missing) {
			continue;
		}
		let name = if missing < 0 {
			format!("UNKNOWN_VALUE_MINUS_{}", -missing)
		} else {
			format!("UNKNOWN_VALUE_{}", missing)
		};
		let node = tree.alloc(
			name,
			None,
			Payload::EnumerationValue(EnumerationValue {
				value: missing,
				auto_generated: true,
			}),
		);
		tree.insert(enumeration, node)?;
	}

	for &value in &declared {
		let required = type_.bits_required(value)?;
		if required > type_.width() {
			return Err(if parsed.width.is_some() && required <= parsed.type_.width() {
				SchemaError::InvalidEnumWidth {
					enumeration: parsed.name.clone(),
					width: required,
					provided_width: type_.width(),
				}
			} else {
				SchemaError::InvalidEnumValue {
					enumeration: parsed.name.clone(),
					value,
				}
			});
		}
	}

	Ok(enumeration)
}

fn create_archive(tree: &mut Tree, parsed: &ParsedArchive) -> Result<NodeKey, SchemaError> {
	let archive = tree.alloc(parsed.name.clone(), parsed.doc.clone(), Payload::Archive);
	for resource in &parsed.resources {
		let node = create_resource(tree, resource)?;
		tree.insert(archive, node)?;
	}
	for bound in &parsed.bound_resources {
		let group = tree.alloc(bound.name.clone(), None, Payload::BoundResource);
		tree.insert(archive, group)?;
		for target in &bound.resources {
			let reference = create_reference(tree, ReferenceKind::Resource, target, None);
			tree.insert(group, reference)?;
		}
	}
	Ok(archive)
}

fn create_resource(tree: &mut Tree, parsed: &ParsedResource) -> Result<NodeKey, SchemaError> {
	let kind = match &parsed.type_ {
		ParsedResourceType::RawData => ResourceKind::RawData,
		ParsedResourceType::Instance(_) => ResourceKind::Instance,
		ParsedResourceType::Vector(_) => ResourceKind::Vector,
		ParsedResourceType::Multivector { width, .. } => ResourceKind::Multivector { width: *width },
		ParsedResourceType::Subarchive(_) => ResourceKind::Subarchive,
	};
	let resource = tree.alloc(
		parsed.name.clone(),
		parsed.doc.clone(),
		Payload::Resource(Resource {
			kind,
			optional: parsed.optional,
			max_size: None,
		}),
	);

	for explicit in &parsed.explicit_references {
		let field_target = format!(
			"{}{}{}",
			explicit.source_structure, PATH_SEPARATOR, explicit.source_field
		);
		let name = format!(
			"er_{}_{}",
			field_target.replace(PATH_SEPARATOR, "_"),
			explicit.destination.replace(PATH_SEPARATOR, "_")
		);
		let node = tree.alloc(name, None, Payload::ExplicitReference);
		tree.insert(resource, node)?;
		let destination =
			create_reference(tree, ReferenceKind::Resource, &explicit.destination, None);
		tree.insert(node, destination)?;
		let field = create_reference(tree, ReferenceKind::Field, &field_target, None);
		tree.insert(node, field)?;
		let structure =
			create_reference(tree, ReferenceKind::Structure, &explicit.source_structure, None);
		tree.insert(node, structure)?;
	}

	match &parsed.type_ {
		ParsedResourceType::RawData => {}
		ParsedResourceType::Instance(target) | ParsedResourceType::Vector(target) => {
			let reference = create_reference(tree, ReferenceKind::Structure, target, None);
			tree.insert(resource, reference)?;
		}
		ParsedResourceType::Multivector { types, .. } => {
			for target in types {
				let reference = create_reference(tree, ReferenceKind::Structure, target, None);
				tree.insert(resource, reference)?;
			}
		}
		ParsedResourceType::Subarchive(target) => {
			let reference = create_reference(tree, ReferenceKind::Archive, target, None);
			tree.insert(resource, reference)?;
		}
	}
	Ok(resource)
}

fn create_reference(
	tree: &mut Tree,
	kind: ReferenceKind,
	target: &str,
	width: Option<u32>,
) -> NodeKey {
	tree.alloc(
		referencify(target),
		None,
		Payload::Reference(Reference { kind, width }),
	)
}

/// Synthesize `IndexTypeW` structures for every multivector
///
/// They live in a `_builtin.multivector` namespace nested in the
/// multivector's root namespace and are de-duplicated by width.
fn append_builtin_structures(tree: &mut Tree) -> Result<(), SchemaError> {
	let multivectors: Vec<(NodeKey, u32)> = tree
		.iterate()
		.filter_map(|key| match tree[key].payload() {
			Payload::Resource(Resource {
				kind: ResourceKind::Multivector { width },
				..
			}) => Some((key, *width)),
			_ => None,
		})
		.collect();

	for (multivector, width) in multivectors {
		let root_namespace = *tree
			.namespaces_of(multivector)
			.first()
			.expect("resources always live inside a namespace");
		let builtin_path = format!(
			"{}{}_builtin{}multivector",
			tree.path_of(root_namespace),
			PATH_SEPARATOR,
			PATH_SEPARATOR
		);
		let namespace = ensure_namespace(tree, &builtin_path)?;
		let index_name = format!("IndexType{}", width);
		let index = match tree.child_by_name(namespace, &index_name) {
			Some(existing) => existing,
			None => {
				let structure =
					tree.alloc(index_name, None, Payload::Structure(Structure::default()));
				let value = tree.alloc(
					"value".to_owned(),
					None,
					Payload::Field(Field {
						type_: Some(FieldType::Basic(BasicType::new(
							Primitive::U64,
							Some(width),
						)?)),
						offset: None,
						width: Some(width),
						range: None,
					}),
				);
				tree.insert(structure, value)?;
				tree.insert(namespace, structure)?;
				structure
			}
		};
		let target = tree.path_of(index);
		let reference = create_reference(tree, ReferenceKind::BuiltinStructure, &target, None);
		tree.insert(multivector, reference)?;
	}
	Ok(())
}

/// Attach a constant-value reference for every constant to every archive,
/// so each archive's normalized schema quotes the constants it may use
fn append_constant_references(tree: &mut Tree) -> Result<(), SchemaError> {
	let constants: Vec<String> = tree
		.iterate()
		.filter(|&key| tree[key].is_constant())
		.map(|key| tree.path_of(key))
		.collect();
	let archives: Vec<NodeKey> = tree
		.iterate()
		.filter(|&key| tree[key].is_archive())
		.collect();
	for archive in archives {
		for constant in &constants {
			let reference = create_reference(tree, ReferenceKind::ConstantValue, constant, None);
			tree.insert(archive, reference)?;
		}
	}
	Ok(())
}
