//! Semantic validation, layout and size bounds
//!
//! These passes run after resolution, in the order `compile` calls them:
//! range rules, enum-reference field typing, constant-reference checks,
//! cycle detection, structure layout, resource size bounds.

use crate::{
	error::SchemaError,
	tree::{
		traversal::DfsTraversal,
		types::{BasicType, EnumType, FieldType},
		Field, NodeKey, Payload, ReferenceKind, ResourceKind, Tree,
	},
};

/// Range decorations: name collisions, the optional-range conflict,
/// vector-only usage, and explicit-reference source structures
pub(crate) fn check_ranges(tree: &Tree) -> Result<(), SchemaError> {
	for key in tree.iterate() {
		match tree[key].payload() {
			Payload::Field(field) => {
				let Some(range) = field.range() else { continue };
				let Some(structure) = tree[key].parent() else {
					continue;
				};
				for sibling in tree.fields(structure) {
					if tree[sibling].name() == range {
						return Err(SchemaError::InvalidRangeName {
							range: range.to_owned(),
							field: tree.path_of(key),
						});
					}
				}
				if !tree
					.references_of_kind(key, ReferenceKind::InvalidValue)
					.is_empty()
				{
					return Err(SchemaError::OptionalRange {
						field: tree.path_of(key),
					});
				}
			}
			Payload::Resource(resource) => {
				// a range is a window into the owning vector, so range
				// structures are meaningless in singletons and multivectors
				if matches!(
					resource.kind(),
					ResourceKind::Instance | ResourceKind::Multivector { .. }
				) {
					for structure in tree.referenced_structures(key) {
						if tree.has_range(structure) {
							return Err(SchemaError::InvalidRangeReference {
								structure: tree.path_of(structure),
								resource: tree.path_of(key),
							});
						}
					}
				}
				check_explicit_reference_structures(tree, key)?;
			}
			_ => {}
		}
	}
	Ok(())
}

/// An `@explicit_reference` must name a source structure that its
/// resource actually stores
fn check_explicit_reference_structures(
	tree: &Tree,
	resource: NodeKey,
) -> Result<(), SchemaError> {
	let used = tree.referenced_structures(resource);
	for explicit in tree.explicit_references(resource) {
		for reference in tree.references_of_kind(explicit, ReferenceKind::Structure) {
			let Some(source) = tree.reference_target_node(reference) else {
				continue;
			};
			if !used.contains(&source) {
				return Err(SchemaError::InvalidExplicitReference {
					structure: tree.path_of(source),
					resource: tree.path_of(resource),
				});
			}
		}
	}
	Ok(())
}

/// Give every enum-referencing field its concrete type
///
/// The backing basic type is copied from the enumeration's declaration;
/// an explicit field width must equal the enumeration's declared width.
pub(crate) fn update_field_type_references(tree: &mut Tree) -> Result<(), SchemaError> {
	let untyped: Vec<NodeKey> = tree
		.iterate()
		.filter(|&key| {
			tree[key]
				.as_field()
				.is_some_and(|field| field.field_type().is_none())
		})
		.collect();
	for field in untyped {
		let Some(&reference) = tree
			.references_of_kind(field, ReferenceKind::Enumeration)
			.first()
		else {
			continue;
		};
		let enumeration = tree
			.reference_target_node(reference)
			.expect("references are resolved before typing");
		let basic = tree[enumeration]
			.as_enumeration()
			.expect("enumeration references are kind-checked")
			.basic_type();
		if let Some(provided) = tree[field].as_field().and_then(|f| f.declared_width()) {
			if provided != basic.width() {
				return Err(SchemaError::InvalidEnumWidth {
					enumeration: tree.path_of(enumeration),
					width: basic.width(),
					provided_width: provided,
				});
			}
		}
		if let Payload::Field(payload) = tree.payload_mut(field) {
			payload.type_ = Some(FieldType::Enum(EnumType { enumeration, basic }));
		}
	}
	Ok(())
}

/// Check `@const` and `@optional` constants against their fields
pub(crate) fn check_constant_references(tree: &Tree) -> Result<(), SchemaError> {
	for field in tree.iterate().filter(|&key| tree[key].is_field()) {
		let Some(field_type) = tree[field].as_field().and_then(Field::field_type) else {
			continue;
		};
		let basic = field_type.basic();
		for reference in tree.references_of_kind(field, ReferenceKind::Constant) {
			check_constant_fits(tree, field, basic, reference)?;
		}
		let invalid_values = tree.references_of_kind(field, ReferenceKind::InvalidValue);
		if invalid_values.len() > 1 {
			return Err(SchemaError::DuplicateInvalidValueReference {
				field: tree.path_of(field),
			});
		}
		for reference in invalid_values {
			check_constant_fits(tree, field, basic, reference)?;
		}
	}
	Ok(())
}

fn check_constant_fits(
	tree: &Tree,
	field: NodeKey,
	field_basic: BasicType,
	reference: NodeKey,
) -> Result<(), SchemaError> {
	let constant = tree
		.reference_target_node(reference)
		.expect("references are resolved before constant checks");
	let payload = tree[constant]
		.as_constant()
		.expect("constant references are kind-checked");
	if payload.basic_type().primitive() != field_basic.primitive() {
		return Err(SchemaError::InvalidConstantReference {
			constant: tree.path_of(constant),
			constant_type: payload.basic_type().name(),
			field: tree.path_of(field),
			field_type: field_basic.name(),
		});
	}
	if !field_basic.fits(payload.value())? {
		return Err(SchemaError::InvalidConstantValueReference {
			constant: tree.path_of(constant),
			value: payload.value(),
			width: field_basic.width(),
			field: tree.path_of(field),
		});
	}
	Ok(())
}

/// Walk the whole graph once so cycles surface as *circular referencing*
pub(crate) fn check_cycles(tree: &Tree) -> Result<(), SchemaError> {
	DfsTraversal::new(tree, tree.root()).events()?;
	Ok(())
}

/// Assign field offsets and structure sizes in dependency order
pub(crate) fn compute_structure_sizes(tree: &mut Tree) -> Result<(), SchemaError> {
	let order: Vec<NodeKey> = DfsTraversal::new(tree, tree.root())
		.dependency_order()?
		.collect();
	let mut structures = 0usize;
	for key in order {
		if !tree[key].is_structure() {
			continue;
		}
		structures += 1;
		let mut offset = 0u32;
		for field in tree.fields(key) {
			let width = tree[field]
				.as_field()
				.and_then(Field::width)
				.expect("fields are typed before layout");
			if let Payload::Field(payload) = tree.payload_mut(field) {
				payload.offset = Some(offset);
			}
			offset += width;
		}
		if let Payload::Structure(payload) = tree.payload_mut(key) {
			payload.size_in_bits = Some(offset);
		}
	}
	tracing::debug!(structures, "computed structure layouts");
	Ok(())
}

/// Derive each resource's element-count bound from the widths of the
/// explicit-reference source fields pointing at it
pub(crate) fn compute_max_resource_sizes(tree: &mut Tree) -> Result<(), SchemaError> {
	let explicit: Vec<NodeKey> = tree
		.iterate()
		.filter(|&key| tree[key].is_explicit_reference())
		.collect();
	for node in explicit {
		let Some(&field_reference) = tree.references_of_kind(node, ReferenceKind::Field).first()
		else {
			continue;
		};
		let Some(field) = tree.reference_target_node(field_reference) else {
			continue;
		};
		let width = tree[field]
			.as_field()
			.and_then(Field::width)
			.expect("fields are typed before size bounds");
		// a 64 bit index does not bound the resource
		if width >= 64 {
			continue;
		}
		let bound = 1u64 << width;
		let Some(&destination) = tree.references_of_kind(node, ReferenceKind::Resource).first()
		else {
			continue;
		};
		let Some(resource) = tree.reference_target_node(destination) else {
			continue;
		};
		if let Payload::Resource(payload) = tree.payload_mut(resource) {
			payload.max_size = Some(match payload.max_size {
				Some(existing) => existing.min(bound),
				None => bound,
			});
		}
	}
	Ok(())
}
