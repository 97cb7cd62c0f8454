//! The error taxonomy of the compiler
//!
//! Every issue is fatal; there are no warnings. All passes bubble their
//! errors up to [`compile`](crate::compile), which returns the first one
//! encountered and no partial result.

/// Any error that may happen while compiling a schema
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SchemaError {
	/// The schema text does not match the grammar
	///
	/// The message carries the offending line, a caret pointing at the
	/// column, and the parser's own message.
	#[error("failed to parse the schema:\n{message}")]
	Parsing {
		/// Rendered parser diagnostic
		message: String,
	},
	/// A sibling with the same name already exists
	#[error("symbol redefinition: {duplicate} already exists at {existing}")]
	SymbolRedefinition {
		/// Path of the node that could not be inserted
		duplicate: String,
		/// Path of the already-existing sibling
		existing: String,
	},
	/// A reference names a symbol that does not exist
	#[error("missing symbol \"{name}\" in {path}.{}", suggestion_text(.suggestion))]
	MissingSymbol {
		/// The textual target that could not be resolved
		name: String,
		/// Path of the reference the target was used from
		path: String,
		/// Closest existing symbol by edit distance, if any
		suggestion: Option<String>,
	},
	/// A reference resolved to a node of an unexpected kind
	#[error("{reference} referring to incorrect type: expected {expected}, actual {actual}")]
	IncorrectReferenceType {
		/// Name of the offending reference
		reference: String,
		/// Kind of node the reference requires
		expected: &'static str,
		/// Kind of node the target actually is
		actual: &'static str,
	},
	/// The parse result carries a resource variant the builder does not know
	#[error("unexpected resource type: {name}")]
	UnexpectedResourceType {
		/// Name of the offending resource
		name: String,
	},
	/// A cycle through child and type-reference edges was detected
	#[error("circular reference in schema: {node} -> {child}")]
	CircularReferencing {
		/// Path of the node being expanded when the cycle closed
		node: String,
		/// Path of the node that was re-entered
		child: String,
	},
	/// A bit-field width exceeds the capacity of its basic type
	#[error("bit field of {width} bit width cannot fit in {basic}")]
	InvalidWidth {
		/// The requested width in bits
		width: u32,
		/// Name of the basic type
		basic: &'static str,
	},
	/// A negative literal was assigned to an unsigned type
	#[error("value has wrong sign: {value}")]
	InvalidSign {
		/// The offending value
		value: i128,
	},
	/// Two enumerators resolve to the same integer
	#[error("enumeration {enumeration} has duplicate entries for value {value}")]
	DuplicateEnumValue {
		/// Path-less name of the enumeration
		enumeration: String,
		/// The duplicated value
		value: i128,
	},
	/// An enumerator does not fit the enumeration's basic type
	#[error("enumeration {enumeration} has not enough bits for value {value}")]
	InvalidEnumValue {
		/// Path-less name of the enumeration
		enumeration: String,
		/// The offending value
		value: i128,
	},
	/// The declared or annotated width disagrees with the enumeration
	#[error("enumeration {enumeration} needs at least {width} bits, but only has {provided_width}")]
	InvalidEnumWidth {
		/// Name of the enumeration
		enumeration: String,
		/// Width the enumeration requires
		width: u32,
		/// Width that was provided
		provided_width: u32,
	},
	/// A constant's value does not fit its declared type
	#[error("constant {name} has not enough bits for value {value}")]
	InvalidConstantValue {
		/// Name of the constant
		name: String,
		/// The offending value
		value: i128,
	},
	/// A referenced constant's type differs from the field's type
	#[error(
		"constant {constant} of type {constant_type} does not match field {field} of type {field_type}"
	)]
	InvalidConstantReference {
		/// Path of the constant
		constant: String,
		/// Basic type of the constant
		constant_type: &'static str,
		/// Path of the field carrying the reference
		field: String,
		/// Basic type of the field
		field_type: &'static str,
	},
	/// A referenced constant's value does not fit the field's width
	#[error("constant {constant} value {value} does not fit into {width} bits of field {field}")]
	InvalidConstantValueReference {
		/// Path of the constant
		constant: String,
		/// The constant's value
		value: i128,
		/// Width of the field in bits
		width: u32,
		/// Path of the field carrying the reference
		field: String,
	},
	/// A field carries more than one invalid-value mark
	#[error("field {field} has more than one invalid value")]
	DuplicateInvalidValueReference {
		/// Path of the field
		field: String,
	},
	/// A range name collides with a sibling field name
	#[error("range {range} of field {field} collides with a sibling field name")]
	InvalidRangeName {
		/// The range name
		range: String,
		/// Path of the field declaring the range
		field: String,
	},
	/// A structure with a range field is used outside a vector resource
	#[error("structure {structure} with range field is referenced from non-vector resource {resource}")]
	InvalidRangeReference {
		/// Path of the structure
		structure: String,
		/// Path of the offending resource
		resource: String,
	},
	/// A range field is also marked with an invalid value
	#[error("range field {field} must not be optional")]
	OptionalRange {
		/// Path of the field
		field: String,
	},
	/// An explicit reference names a source structure its resource does not use
	#[error("explicit reference source structure {structure} is not referenced by resource {resource}")]
	InvalidExplicitReference {
		/// Path of the source structure
		structure: String,
		/// Path of the resource declaring the explicit reference
		resource: String,
	},
	/// An enumeration's width spans exponentially more values than declared
	#[error("enumeration {enumeration} with {width} bits is too sparsely populated")]
	SparseEnum {
		/// Name of the enumeration
		enumeration: String,
		/// Declared width in bits
		width: u32,
	},
}

fn suggestion_text(suggestion: &Option<String>) -> String {
	match suggestion {
		None => String::new(),
		Some(symbol) => format!(" Did you mean \"{}\"?", symbol),
	}
}
