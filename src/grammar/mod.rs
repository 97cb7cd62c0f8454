//! Lexical grammar and parser
//!
//! Turns schema text into a shallow parse result: per-namespace lists of
//! constants, structures, enumerations and archives, with doc comments
//! attached and integer literals decoded. The tree builder consumes this
//! result; nothing here performs name resolution or validation beyond the
//! grammar itself.

use crate::{error::SchemaError, tree::types::Primitive};

use pest::Parser as _;

#[derive(pest_derive::Parser)]
#[grammar = "grammar/flatdata.pest"]
struct FlatdataParser;

/// Shallow parse result of a schema definition
#[derive(Debug, Default)]
pub(crate) struct ParsedSchema {
	pub namespaces: Vec<ParsedNamespace>,
}

/// One `namespace Q { … }` block, with declarations grouped by kind
#[derive(Debug)]
pub(crate) struct ParsedNamespace {
	pub name: String,
	pub constants: Vec<ParsedConstant>,
	pub structures: Vec<ParsedStructure>,
	pub enumerations: Vec<ParsedEnumeration>,
	pub archives: Vec<ParsedArchive>,
}

#[derive(Debug)]
pub(crate) struct ParsedConstant {
	pub doc: Option<String>,
	pub name: String,
	pub type_: Primitive,
	pub value: i128,
}

#[derive(Debug)]
pub(crate) struct ParsedStructure {
	pub doc: Option<String>,
	pub name: String,
	pub fields: Vec<ParsedField>,
}

#[derive(Debug)]
pub(crate) struct ParsedField {
	pub doc: Option<String>,
	pub name: String,
	pub type_name: String,
	pub width: Option<u32>,
	pub decorations: Vec<ParsedFieldDecoration>,
}

#[derive(Debug)]
pub(crate) enum ParsedFieldDecoration {
	/// `@const( C )` - the field always holds the constant's value
	Const(String),
	/// `@optional( C )` - the constant marks the field's invalid value
	InvalidValue(String),
	/// `@range( name )` - the field anchors a range into the owning vector
	Range(String),
}

#[derive(Debug)]
pub(crate) struct ParsedEnumeration {
	pub doc: Option<String>,
	pub name: String,
	pub type_: Primitive,
	pub width: Option<u32>,
	pub values: Vec<ParsedEnumValue>,
}

#[derive(Debug)]
pub(crate) struct ParsedEnumValue {
	pub doc: Option<String>,
	pub name: String,
	pub value: Option<i128>,
}

#[derive(Debug)]
pub(crate) struct ParsedArchive {
	pub doc: Option<String>,
	pub name: String,
	pub resources: Vec<ParsedResource>,
	pub bound_resources: Vec<ParsedBoundResource>,
}

#[derive(Debug)]
pub(crate) struct ParsedResource {
	pub doc: Option<String>,
	pub name: String,
	pub type_: ParsedResourceType,
	pub optional: bool,
	pub explicit_references: Vec<ParsedExplicitReference>,
}

#[derive(Debug)]
pub(crate) enum ParsedResourceType {
	RawData,
	Instance(String),
	Vector(String),
	Multivector { width: u32, types: Vec<String> },
	Subarchive(String),
}

#[derive(Debug)]
pub(crate) struct ParsedExplicitReference {
	pub source_structure: String,
	pub source_field: String,
	pub destination: String,
}

#[derive(Debug)]
pub(crate) struct ParsedBoundResource {
	pub name: String,
	pub resources: Vec<String>,
}

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

/// Parse a schema definition into the shallow parse result
///
/// The empty definition is a valid empty schema.
pub(crate) fn parse_schema(definition: &str) -> Result<ParsedSchema, SchemaError> {
	if definition.is_empty() {
		return Ok(ParsedSchema::default());
	}

	let mut pairs = FlatdataParser::parse(Rule::schema, definition).map_err(|e| {
		SchemaError::Parsing {
			message: e.to_string(),
		}
	})?;
	let schema = pairs.next().expect("schema rule always produces one pair");

	let mut result = ParsedSchema::default();
	for pair in schema.into_inner() {
		if pair.as_rule() == Rule::namespace {
			result.namespaces.push(parse_namespace(pair)?);
		}
	}
	tracing::debug!(namespaces = result.namespaces.len(), "parsed schema");
	Ok(result)
}

fn parse_namespace(pair: Pair<'_>) -> Result<ParsedNamespace, SchemaError> {
	let mut namespace = ParsedNamespace {
		name: String::new(),
		constants: Vec::new(),
		structures: Vec::new(),
		enumerations: Vec::new(),
		archives: Vec::new(),
	};
	for inner in pair.into_inner() {
		match inner.as_rule() {
			Rule::qualified_identifier => namespace.name = inner.as_str().to_owned(),
			Rule::entry => {
				let decl = inner
					.into_inner()
					.next()
					.expect("entry always wraps one declaration");
				match decl.as_rule() {
					Rule::constant => namespace.constants.push(parse_constant(decl)?),
					Rule::structure => namespace.structures.push(parse_structure(decl)?),
					Rule::enumeration => namespace.enumerations.push(parse_enumeration(decl)?),
					Rule::archive => namespace.archives.push(parse_archive(decl)?),
					// free comment between declarations
					_ => {}
				}
			}
			_ => {}
		}
	}
	Ok(namespace)
}

fn parse_constant(pair: Pair<'_>) -> Result<ParsedConstant, SchemaError> {
	let mut doc = None;
	let mut type_ = None;
	let mut name = String::new();
	let mut value = 0;
	for inner in pair.into_inner() {
		match inner.as_rule() {
			Rule::comment => doc = Some(inner.as_str().to_owned()),
			Rule::basic_type => type_ = Some(parse_primitive(inner.as_str())),
			Rule::identifier => name = inner.as_str().to_owned(),
			Rule::signed_literal => value = parse_literal(inner.as_str())?,
			_ => {}
		}
	}
	Ok(ParsedConstant {
		doc,
		name,
		type_: type_.expect("grammar guarantees a basic type"),
		value,
	})
}

fn parse_structure(pair: Pair<'_>) -> Result<ParsedStructure, SchemaError> {
	let mut doc = None;
	let mut name = String::new();
	let mut fields = Vec::new();
	for inner in pair.into_inner() {
		match inner.as_rule() {
			Rule::comment => doc = Some(inner.as_str().to_owned()),
			Rule::identifier => name = inner.as_str().to_owned(),
			Rule::field => fields.push(parse_field(inner)?),
			_ => {}
		}
	}
	Ok(ParsedStructure { doc, name, fields })
}

fn parse_field(pair: Pair<'_>) -> Result<ParsedField, SchemaError> {
	let mut field = ParsedField {
		doc: None,
		name: String::new(),
		type_name: String::new(),
		width: None,
		decorations: Vec::new(),
	};
	for inner in pair.into_inner() {
		match inner.as_rule() {
			Rule::comment => field.doc = Some(inner.as_str().to_owned()),
			Rule::identifier => field.name = inner.as_str().to_owned(),
			Rule::qualified_identifier => field.type_name = inner.as_str().to_owned(),
			Rule::bit_width => field.width = Some(parse_width(inner.as_str())?),
			Rule::field_decoration => {
				let decoration = inner
					.into_inner()
					.next()
					.expect("field decoration always wraps one variant");
				let rule = decoration.as_rule();
				let argument = decoration
					.into_inner()
					.next()
					.expect("field decorations carry one argument")
					.as_str()
					.to_owned();
				field.decorations.push(match rule {
					Rule::const_decoration => ParsedFieldDecoration::Const(argument),
					Rule::invalid_value_decoration => ParsedFieldDecoration::InvalidValue(argument),
					Rule::range_decoration => ParsedFieldDecoration::Range(argument),
					_ => unreachable!("grammar admits no other field decoration"),
				});
			}
			_ => {}
		}
	}
	Ok(field)
}

fn parse_enumeration(pair: Pair<'_>) -> Result<ParsedEnumeration, SchemaError> {
	let mut enumeration = ParsedEnumeration {
		doc: None,
		name: String::new(),
		type_: Primitive::U8,
		width: None,
		values: Vec::new(),
	};
	for inner in pair.into_inner() {
		match inner.as_rule() {
			Rule::comment => enumeration.doc = Some(inner.as_str().to_owned()),
			Rule::identifier => enumeration.name = inner.as_str().to_owned(),
			Rule::basic_type => enumeration.type_ = parse_primitive(inner.as_str()),
			Rule::bit_width => enumeration.width = Some(parse_width(inner.as_str())?),
			Rule::enum_value => {
				let mut doc = None;
				let mut name = String::new();
				let mut value = None;
				for part in inner.into_inner() {
					match part.as_rule() {
						Rule::comment => doc = Some(part.as_str().to_owned()),
						Rule::identifier => name = part.as_str().to_owned(),
						Rule::signed_literal => value = Some(parse_literal(part.as_str())?),
						_ => {}
					}
				}
				enumeration.values.push(ParsedEnumValue { doc, name, value });
			}
			_ => {}
		}
	}
	Ok(enumeration)
}

fn parse_archive(pair: Pair<'_>) -> Result<ParsedArchive, SchemaError> {
	let mut archive = ParsedArchive {
		doc: None,
		name: String::new(),
		resources: Vec::new(),
		bound_resources: Vec::new(),
	};
	for inner in pair.into_inner() {
		match inner.as_rule() {
			Rule::comment => archive.doc = Some(inner.as_str().to_owned()),
			Rule::identifier => archive.name = inner.as_str().to_owned(),
			Rule::bound_decoration => {
				let mut name = String::new();
				let mut resources = Vec::new();
				for part in inner.into_inner() {
					match part.as_rule() {
						Rule::identifier => name = part.as_str().to_owned(),
						Rule::qualified_identifier => resources.push(part.as_str().to_owned()),
						_ => {}
					}
				}
				archive
					.bound_resources
					.push(ParsedBoundResource { name, resources });
			}
			Rule::resource => archive.resources.push(parse_resource(inner)?),
			_ => {}
		}
	}
	Ok(archive)
}

fn parse_resource(pair: Pair<'_>) -> Result<ParsedResource, SchemaError> {
	let mut resource = ParsedResource {
		doc: None,
		name: String::new(),
		type_: ParsedResourceType::RawData,
		optional: false,
		explicit_references: Vec::new(),
	};
	for inner in pair.into_inner() {
		match inner.as_rule() {
			Rule::comment => resource.doc = Some(inner.as_str().to_owned()),
			Rule::identifier => resource.name = inner.as_str().to_owned(),
			Rule::resource_decoration => {
				let decoration = inner
					.into_inner()
					.next()
					.expect("resource decoration always wraps one variant");
				match decoration.as_rule() {
					Rule::optional_decoration => resource.optional = true,
					Rule::explicit_reference_decoration => {
						let mut arguments = decoration
							.into_inner()
							.filter(|p| p.as_rule() == Rule::qualified_identifier);
						let source = arguments
							.next()
							.expect("explicit reference carries a source")
							.as_str();
						let destination = arguments
							.next()
							.expect("explicit reference carries a destination")
							.as_str()
							.to_owned();
						// The source is `<structure path>.<field>`; split at
						// the last separator.
						let (source_structure, source_field) =
							source.rsplit_once('.').ok_or_else(|| SchemaError::Parsing {
								message: format!(
									"explicit reference source {:?} does not name a structure field",
									source
								),
							})?;
						resource
							.explicit_references
							.push(ParsedExplicitReference {
								source_structure: source_structure.to_owned(),
								source_field: source_field.to_owned(),
								destination,
							});
					}
					_ => unreachable!("grammar admits no other resource decoration"),
				}
			}
			Rule::resource_type => {
				let type_ = inner
					.into_inner()
					.next()
					.expect("resource type always wraps one variant");
				resource.type_ = parse_resource_type(&resource.name, type_)?;
			}
			_ => {}
		}
	}
	Ok(resource)
}

fn parse_resource_type(name: &str, pair: Pair<'_>) -> Result<ParsedResourceType, SchemaError> {
	Ok(match pair.as_rule() {
		Rule::raw_data_type => ParsedResourceType::RawData,
		Rule::instance_type => ParsedResourceType::Instance(single_qualified_identifier(pair)),
		Rule::vector_type => ParsedResourceType::Vector(single_qualified_identifier(pair)),
		Rule::subarchive_type => ParsedResourceType::Subarchive(single_qualified_identifier(pair)),
		Rule::multivector_type => {
			let mut width = 0;
			let mut types = Vec::new();
			for part in pair.into_inner() {
				match part.as_rule() {
					Rule::bit_width => width = parse_width(part.as_str())?,
					Rule::qualified_identifier => types.push(part.as_str().to_owned()),
					_ => {}
				}
			}
			ParsedResourceType::Multivector { width, types }
		}
		_ => {
			return Err(SchemaError::UnexpectedResourceType {
				name: name.to_owned(),
			})
		}
	})
}

fn single_qualified_identifier(pair: Pair<'_>) -> String {
	pair.into_inner()
		.find(|p| p.as_rule() == Rule::qualified_identifier)
		.expect("rule carries a qualified identifier")
		.as_str()
		.to_owned()
}

fn parse_primitive(name: &str) -> Primitive {
	Primitive::parse(name).expect("grammar only admits basic type keywords")
}

/// Decode a decimal or `0x`-prefixed hex literal with an optional sign
fn parse_literal(text: &str) -> Result<i128, SchemaError> {
	let (negative, digits) = match text.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, text),
	};
	let magnitude = match digits.strip_prefix("0x") {
		Some(hex) => i128::from_str_radix(hex, 16),
		None => digits.parse::<i128>(),
	}
	.map_err(|_| SchemaError::Parsing {
		message: format!("integer literal out of range: {}", text),
	})?;
	Ok(if negative { -magnitude } else { magnitude })
}

fn parse_width(text: &str) -> Result<u32, SchemaError> {
	text.parse::<u32>().map_err(|_| SchemaError::Parsing {
		message: format!("bit width out of range: {}", text),
	})
}
