//! # flatdata-schema
//!
//! The schema front end of [flatdata](https://github.com/heremaps/flatdata),
//! a zero-copy memory-mapped data format: it parses the flatdata schema
//! language (namespaces, constants, enumerations, bit-packed structures
//! and archives of resources), resolves and validates every reference,
//! computes bit layouts, and re-emits canonical schema fragments.
//!
//! Code generators for the individual target languages consume the
//! resolved [`Tree`] this crate produces; the archive runtime compares
//! the [normalized schema](Tree::normalized_schema) strings byte-for-byte
//! against the `.schema` sidecar files of an archive.
//!
//! ```
//! use flatdata_schema::{compile, Payload};
//!
//! let tree = compile(
//! 	"namespace n {
//! 	struct S
//! 	{
//! 		a : u8 : 3;
//! 		b : u16 : 15;
//! 	}
//! 	}",
//! )?;
//!
//! let structure = tree.find(".n.S").unwrap();
//! match tree[structure].payload() {
//! 	Payload::Structure(s) => assert_eq!(s.size_in_bits(), Some(18)),
//! 	_ => unreachable!(),
//! }
//! # Ok::<(), flatdata_schema::SchemaError>(())
//! ```
//!
//! Compilation is a one-shot batch of single-threaded passes; the
//! returned tree is meant to be treated as read-only afterwards, so any
//! number of back ends may walk it.

mod error;
mod grammar;
mod normalize;
pub mod tree;

pub use {
	crate::error::SchemaError,
	crate::tree::{
		types, Constant, Enumeration, EnumerationValue, Field, Node, NodeKey, Payload, Reference,
		ReferenceKind, Resource, ResourceKind, Structure, Tree,
	},
};

/// Compile a schema definition into a resolved, validated, laid-out tree
///
/// Runs, in order: parse, build (namespace merging, built-in multivector
/// index synthesis, constant-value references), reference resolution,
/// range and constant validation, enum-reference field typing, cycle
/// detection, structure layout, and resource size bounds. Any failure
/// aborts compilation with the corresponding [`SchemaError`]; no partial
/// tree is returned.
impl Tree {
	/// Parse and build a tree without resolving or validating it
	///
	/// The result has every reference still carrying its textual target.
	/// This is sufficient for [`Tree::normalized_schema`] on canonical
	/// fragments (whose references are already absolute), e.g. the
	/// per-resource `.schema` sidecars, which name sibling resources an
	/// isolated fragment cannot resolve. Everything else wants
	/// [`compile`].
	pub fn parse(definition: &str) -> Result<Tree, SchemaError> {
		let parsed = grammar::parse_schema(definition)?;
		tree::builder::build(&parsed)
	}
}

pub fn compile(definition: &str) -> Result<Tree, SchemaError> {
	let parsed = grammar::parse_schema(definition)?;
	let mut tree = tree::builder::build(&parsed)?;
	tree::resolver::resolve_references(&mut tree)?;
	tree::validate::check_ranges(&tree)?;
	tree::validate::update_field_type_references(&mut tree)?;
	tree::validate::check_constant_references(&tree)?;
	tree::validate::check_cycles(&tree)?;
	tree::validate::compute_structure_sizes(&mut tree)?;
	tree::validate::compute_max_resource_sizes(&mut tree)?;
	tracing::debug!(nodes = tree.len(), "schema compiled");
	Ok(tree)
}

impl std::str::FromStr for Tree {
	type Err = SchemaError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		compile(s)
	}
}
