//! Value objects for the basic and enum-backed field types

use crate::{error::SchemaError, tree::NodeKey};

/// One of the nine primitive flatdata types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
	Bool,
	I8,
	U8,
	I16,
	U16,
	I32,
	U32,
	I64,
	U64,
}

impl Primitive {
	/// Parse a basic type keyword, `None` for anything else
	pub fn parse(name: &str) -> Option<Self> {
		Some(match name {
			"bool" => Primitive::Bool,
			"i8" => Primitive::I8,
			"u8" => Primitive::U8,
			"i16" => Primitive::I16,
			"u16" => Primitive::U16,
			"i32" => Primitive::I32,
			"u32" => Primitive::U32,
			"i64" => Primitive::I64,
			"u64" => Primitive::U64,
			_ => return None,
		})
	}

	/// The keyword naming this type in schema text
	pub fn name(self) -> &'static str {
		match self {
			Primitive::Bool => "bool",
			Primitive::I8 => "i8",
			Primitive::U8 => "u8",
			Primitive::I16 => "i16",
			Primitive::U16 => "u16",
			Primitive::I32 => "i32",
			Primitive::U32 => "u32",
			Primitive::I64 => "i64",
			Primitive::U64 => "u64",
		}
	}

	/// Storage width in bits
	pub fn width(self) -> u32 {
		match self {
			Primitive::Bool => 1,
			Primitive::I8 | Primitive::U8 => 8,
			Primitive::I16 | Primitive::U16 => 16,
			Primitive::I32 | Primitive::U32 => 32,
			Primitive::I64 | Primitive::U64 => 64,
		}
	}

	/// Whether values are two's-complement signed
	pub fn is_signed(self) -> bool {
		matches!(self, Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64)
	}
}

/// A primitive type narrowed to an effective bit width
///
/// The width defaults to the primitive's storage width and may never
/// exceed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicType {
	primitive: Primitive,
	width: u32,
}

impl BasicType {
	/// Build a basic type, checking the width against the primitive
	pub fn new(primitive: Primitive, width: Option<u32>) -> Result<Self, SchemaError> {
		let width = width.unwrap_or_else(|| primitive.width());
		if width > primitive.width() {
			return Err(SchemaError::InvalidWidth {
				width,
				basic: primitive.name(),
			});
		}
		Ok(Self { primitive, width })
	}

	pub fn primitive(self) -> Primitive {
		self.primitive
	}

	pub fn name(self) -> &'static str {
		self.primitive.name()
	}

	pub fn width(self) -> u32 {
		self.width
	}

	pub fn is_signed(self) -> bool {
		self.primitive.is_signed()
	}

	/// Number of bits needed to represent `value` in this type's signedness
	///
	/// Signed counts include the sign bit; `-2^(N-1)` fits into N bits.
	/// Negative values on unsigned types are an [`SchemaError::InvalidSign`]
	/// error.
	pub fn bits_required(self, value: i128) -> Result<u32, SchemaError> {
		fn bit_length(magnitude: i128) -> u32 {
			128 - magnitude.leading_zeros()
		}
		if self.is_signed() {
			Ok(if value >= 0 {
				bit_length(value) + 1
			} else {
				// two's complement allows one more value below zero
				bit_length(-value - 1) + 1
			})
		} else if value >= 0 {
			Ok(bit_length(value))
		} else {
			Err(SchemaError::InvalidSign { value })
		}
	}

	/// Whether `value` fits into this type's width
	pub fn fits(self, value: i128) -> Result<bool, SchemaError> {
		Ok(self.bits_required(value)? <= self.width)
	}

	/// The half-open range of representable values at this width
	pub fn value_range(self) -> std::ops::Range<i128> {
		if self.width == 0 {
			0..0
		} else if self.is_signed() {
			-(1i128 << (self.width - 1))..(1i128 << (self.width - 1))
		} else {
			0..(1i128 << self.width)
		}
	}
}

/// An enum-backed field type: the referenced enumeration plus the basic
/// type copied from its declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumType {
	pub(crate) enumeration: NodeKey,
	pub(crate) basic: BasicType,
}

impl EnumType {
	/// Key of the [`Enumeration`](crate::tree::Enumeration) node
	pub fn enumeration(self) -> NodeKey {
		self.enumeration
	}

	/// The enumeration's backing basic type at its declared width
	pub fn basic(self) -> BasicType {
		self.basic
	}
}

/// The resolved type of a structure field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
	Basic(BasicType),
	Enum(EnumType),
}

impl FieldType {
	/// The basic type the field is stored as
	pub fn basic(self) -> BasicType {
		match self {
			FieldType::Basic(basic) => basic,
			FieldType::Enum(enum_type) => enum_type.basic,
		}
	}

	/// Effective width of the field in bits
	pub fn width(self) -> u32 {
		self.basic().width()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn basic(primitive: Primitive, width: Option<u32>) -> BasicType {
		BasicType::new(primitive, width).unwrap()
	}

	#[test]
	fn bits_required_unsigned() {
		let u8_ = basic(Primitive::U8, None);
		assert_eq!(u8_.bits_required(0).unwrap(), 0);
		assert_eq!(u8_.bits_required(1).unwrap(), 1);
		assert_eq!(u8_.bits_required(255).unwrap(), 8);
		assert_eq!(u8_.bits_required(256).unwrap(), 9);
		assert!(matches!(
			u8_.bits_required(-1),
			Err(SchemaError::InvalidSign { value: -1 })
		));
	}

	#[test]
	fn bits_required_signed() {
		let i8_ = basic(Primitive::I8, None);
		assert_eq!(i8_.bits_required(0).unwrap(), 1);
		assert_eq!(i8_.bits_required(127).unwrap(), 8);
		assert_eq!(i8_.bits_required(128).unwrap(), 9);
		assert_eq!(i8_.bits_required(-1).unwrap(), 1);
		// the two's complement boundary fits
		assert_eq!(i8_.bits_required(-128).unwrap(), 8);
		assert_eq!(i8_.bits_required(-129).unwrap(), 9);
	}

	#[test]
	fn width_is_bounded_by_the_primitive() {
		assert!(BasicType::new(Primitive::U16, Some(16)).is_ok());
		assert!(matches!(
			BasicType::new(Primitive::U16, Some(17)),
			Err(SchemaError::InvalidWidth { width: 17, basic: "u16" })
		));
		assert!(matches!(
			BasicType::new(Primitive::Bool, Some(2)),
			Err(SchemaError::InvalidWidth { width: 2, basic: "bool" })
		));
	}

	#[test]
	fn value_ranges() {
		assert_eq!(basic(Primitive::U8, Some(2)).value_range(), 0..4);
		assert_eq!(basic(Primitive::I8, Some(3)).value_range(), -4..4);
	}
}
