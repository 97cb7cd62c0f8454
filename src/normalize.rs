//! Canonical schema emission
//!
//! Given any node, emits the minimal schema fragment the node depends on
//! in a locked canonical form: one `namespace P { … }` block per
//! declaration in dependency order, separated by blank lines, with
//! absolute type names, explicit field widths and a fixed decoration
//! order. This text is what gets persisted as `.schema` sidecar files
//! and compared byte-for-byte by the archive runtime, so the form must
//! never drift.
//!
//! Re-parsing normalized output and normalizing again reproduces the
//! same bytes: the emitter only needs textual reference targets (which
//! the canonical form keeps absolute), not a fully compiled tree.

use crate::{
	error::SchemaError,
	tree::{
		traversal::DfsTraversal,
		types::FieldType,
		Node, NodeKey, Payload, ReferenceKind, ResourceKind, Tree,
	},
};

impl Tree {
	/// The canonical schema fragment reproducing `node` and its
	/// transitive type-reference closure
	///
	/// For a resource, the fragment ends with its enclosing archive
	/// reduced to that single resource. For nodes below a declaration
	/// (fields, enumeration values, references) the nearest enclosing
	/// declaration is normalized instead.
	pub fn normalized_schema(&self, node: NodeKey) -> Result<String, SchemaError> {
		let anchor = self.normalization_anchor(node);
		let mut out = String::new();
		for key in DfsTraversal::new(self, anchor).dependency_order()? {
			if is_declaration(&self[key]) {
				self.write_declaration_block(&mut out, key)?;
			}
		}
		if self[anchor].is_resource() {
			self.write_resource_fragment(&mut out, anchor)?;
		}
		Ok(out)
	}

	fn normalization_anchor(&self, node: NodeKey) -> NodeKey {
		let mut anchor = node;
		loop {
			match self[anchor].payload() {
				Payload::Root
				| Payload::Namespace
				| Payload::Structure(_)
				| Payload::Enumeration(_)
				| Payload::Constant(_)
				| Payload::Archive
				| Payload::Resource(_) => return anchor,
				_ => {
					anchor = self[anchor]
						.parent()
						.expect("non-declaration nodes always have a parent");
				}
			}
		}
	}

	fn write_declaration_block(&self, out: &mut String, key: NodeKey) -> Result<(), SchemaError> {
		out.push_str("namespace ");
		out.push_str(&self.namespace_path(key, "."));
		out.push_str(" {\n");
		match self[key].payload() {
			Payload::Structure(_) => self.write_structure(out, key)?,
			Payload::Enumeration(enumeration) => {
				let basic = enumeration.basic_type();
				out.push_str(&format!(
					"enum {} : {} : {}\n{{\n",
					self[key].name(),
					basic.name(),
					basic.width()
				));
				for value in self.children_where(key, Node::is_enumeration_value) {
					let payload = self[value]
						.as_enumeration_value()
						.expect("filtered to enumeration values");
					if payload.auto_generated() {
						continue;
					}
					out.push_str(&format!("    {} = {},\n", self[value].name(), payload.value()));
				}
				out.push_str("}\n");
			}
			Payload::Constant(constant) => {
				out.push_str(&format!(
					"const {} {} = {};\n",
					constant.basic_type().name(),
					self[key].name(),
					constant.value()
				));
			}
			Payload::Archive => {
				let resources = self.resources(key);
				self.write_archive(out, key, &resources, true)?;
			}
			_ => {}
		}
		out.push_str("}\n\n");
		Ok(())
	}

	fn write_structure(&self, out: &mut String, key: NodeKey) -> Result<(), SchemaError> {
		out.push_str(&format!("struct {}\n{{\n", self[key].name()));
		for field in self.fields(key) {
			let payload = self[field].as_field().expect("filtered to fields");
			let (type_text, width) = match payload.field_type() {
				Some(FieldType::Basic(basic)) => (basic.name().to_owned(), basic.width()),
				Some(FieldType::Enum(enum_type)) => (
					self.path_of(enum_type.enumeration()),
					enum_type.basic().width(),
				),
				// not yet typed: fall back to the textual enumeration target
				None => {
					let reference = *self
						.references_of_kind(field, ReferenceKind::Enumeration)
						.first()
						.expect("untyped fields carry an enumeration reference");
					let target = self[reference]
						.reference_target()
						.expect("reference nodes carry a target");
					let width = match payload.declared_width() {
						Some(width) => width,
						None => self
							.find(&target)
							.and_then(|e| self[e].as_enumeration())
							.map(|e| e.basic_type().width())
							.ok_or_else(|| SchemaError::MissingSymbol {
								name: target.clone(),
								path: self.path_of(field),
								suggestion: None,
							})?,
					};
					(target, width)
				}
			};
			out.push_str(&format!("    {} : {} : {}", self[field].name(), type_text, width));
			for reference in self.references_of_kind(field, ReferenceKind::Constant) {
				out.push_str(&format!(
					" @const( {} )",
					self[reference]
						.reference_target()
						.expect("reference nodes carry a target")
				));
			}
			for reference in self.references_of_kind(field, ReferenceKind::InvalidValue) {
				out.push_str(&format!(
					" @optional( {} )",
					self[reference]
						.reference_target()
						.expect("reference nodes carry a target")
				));
			}
			if let Some(range) = payload.range() {
				out.push_str(&format!(" @range( {} )", range));
			}
			out.push_str(";\n");
		}
		out.push_str("}\n");
		Ok(())
	}

	fn write_archive(
		&self,
		out: &mut String,
		archive: NodeKey,
		resources: &[NodeKey],
		include_bound_groups: bool,
	) -> Result<(), SchemaError> {
		if include_bound_groups {
			for group in self.bound_resources(archive) {
				let members: Vec<String> = self
					.references_of_kind(group, ReferenceKind::Resource)
					.into_iter()
					.map(|reference| {
						self[reference]
							.reference_target()
							.expect("reference nodes carry a target")
					})
					.collect();
				out.push_str(&format!(
					"@bound_implicitly( {}: {} )\n",
					self[group].name(),
					members.join(", ")
				));
			}
		}
		out.push_str(&format!("archive {}\n{{\n", self[archive].name()));
		for &resource in resources {
			self.write_resource_member(out, resource)?;
		}
		out.push_str("}\n");
		Ok(())
	}

	fn write_resource_member(&self, out: &mut String, resource: NodeKey) -> Result<(), SchemaError> {
		let payload = self[resource]
			.as_resource()
			.expect("only resources are emitted as archive members");
		for explicit in self.explicit_references(resource) {
			let field = self
				.references_of_kind(explicit, ReferenceKind::Field)
				.first()
				.and_then(|&r| self[r].reference_target())
				.expect("explicit references carry a field reference");
			let destination = self
				.references_of_kind(explicit, ReferenceKind::Resource)
				.first()
				.and_then(|&r| self[r].reference_target())
				.expect("explicit references carry a resource reference");
			out.push_str(&format!(
				"    @explicit_reference( {}, {} )\n",
				field, destination
			));
		}
		if payload.optional() {
			out.push_str("    @optional\n");
		}
		let structure_targets = || {
			self.references_of_kind(resource, ReferenceKind::Structure)
				.into_iter()
				.map(|reference| {
					self[reference]
						.reference_target()
						.expect("reference nodes carry a target")
				})
				.collect::<Vec<String>>()
		};
		let type_text = match payload.kind() {
			ResourceKind::RawData => "raw_data".to_owned(),
			ResourceKind::Instance => structure_targets().join(", "),
			ResourceKind::Vector => format!("vector< {} >", structure_targets().join(", ")),
			ResourceKind::Multivector { width } => format!(
				"multivector< {}, {} >",
				width,
				structure_targets().join(", ")
			),
			ResourceKind::Subarchive => format!(
				"archive {}",
				self.references_of_kind(resource, ReferenceKind::Archive)
					.first()
					.and_then(|&r| self[r].reference_target())
					.expect("subarchive resources carry an archive reference")
			),
		};
		out.push_str(&format!("    {} : {};\n", self[resource].name(), type_text));
		Ok(())
	}

	fn write_resource_fragment(
		&self,
		out: &mut String,
		resource: NodeKey,
	) -> Result<(), SchemaError> {
		let archive = self[resource]
			.parent()
			.expect("resources always live inside an archive");
		out.push_str("namespace ");
		out.push_str(&self.namespace_path(archive, "."));
		out.push_str(" {\n");
		self.write_archive(out, archive, &[resource], false)?;
		out.push_str("}\n\n");
		Ok(())
	}
}

fn is_declaration(node: &Node) -> bool {
	matches!(
		node.payload(),
		Payload::Structure(_) | Payload::Enumeration(_) | Payload::Constant(_) | Payload::Archive
	)
}
