use {
	flatdata_schema::{compile, Tree},
	pretty_assertions::assert_eq,
};

fn schema_of(tree: &Tree, path: &str) -> String {
	tree.normalized_schema(tree.find(path).unwrap()).unwrap()
}

#[test]
fn structure_schema() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		struct S
		{
			x : u64 : 64;
			first_y : u32 : 14 @range( y_range );
		}
		}"
	.parse()?;
	assert_eq!(
		schema_of(&tree, ".n.S"),
		"namespace n {\n\
		 struct S\n\
		 {\n    \
		 x : u64 : 64;\n    \
		 first_y : u32 : 14 @range( y_range );\n\
		 }\n\
		 }\n\n"
	);
	Ok(())
}

#[test]
fn archive_schema_lists_dependent_types_first() -> anyhow::Result<()> {
	let tree: Tree = "namespace n { struct S { x : u64 : 64; } archive X { payload : raw_data; } }
		namespace m { struct S { x : u64 : 64; } }
		namespace a {
		archive A {
			single : .n.S;
			list : vector< .m.S >;
			multi : multivector< 32, .n.S >;
			inner : archive .n.X;
		}
		}"
	.parse()?;

	assert_eq!(
		schema_of(&tree, ".a.A"),
		"namespace n {\n\
		 struct S\n\
		 {\n    \
		 x : u64 : 64;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace m {\n\
		 struct S\n\
		 {\n    \
		 x : u64 : 64;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace a._builtin.multivector {\n\
		 struct IndexType32\n\
		 {\n    \
		 value : u64 : 32;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace n {\n\
		 archive X\n\
		 {\n    \
		 payload : raw_data;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace a {\n\
		 archive A\n\
		 {\n    \
		 single : .n.S;\n    \
		 list : vector< .m.S >;\n    \
		 multi : multivector< 32, .n.S >;\n    \
		 inner : archive .n.X;\n\
		 }\n\
		 }\n\n"
	);
	Ok(())
}

#[test]
fn resource_schemas_reduce_the_archive_to_one_member() -> anyhow::Result<()> {
	let tree: Tree = "namespace n { struct S { x : u64 : 64; } archive X { payload : raw_data; } }
		namespace m { struct S { x : u64 : 64; } }
		namespace a {
		archive A {
			single : .n.S;
			list : vector< .m.S >;
			inner : archive .n.X;
		}
		}"
	.parse()?;

	assert_eq!(
		schema_of(&tree, ".a.A.single"),
		"namespace n {\n\
		 struct S\n\
		 {\n    \
		 x : u64 : 64;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace a {\n\
		 archive A\n\
		 {\n    \
		 single : .n.S;\n\
		 }\n\
		 }\n\n"
	);
	assert_eq!(
		schema_of(&tree, ".a.A.list"),
		"namespace m {\n\
		 struct S\n\
		 {\n    \
		 x : u64 : 64;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace a {\n\
		 archive A\n\
		 {\n    \
		 list : vector< .m.S >;\n\
		 }\n\
		 }\n\n"
	);
	assert_eq!(
		schema_of(&tree, ".a.A.inner"),
		"namespace n {\n\
		 archive X\n\
		 {\n    \
		 payload : raw_data;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace a {\n\
		 archive A\n\
		 {\n    \
		 inner : archive .n.X;\n\
		 }\n\
		 }\n\n"
	);
	Ok(())
}

#[test]
fn archive_schemas_include_constants() -> anyhow::Result<()> {
	let tree: Tree = "namespace foo {
		const u8 C = 0x2a;
		struct T { f : u8 : 7; }
		archive A { resourceA : T; }
		}"
	.parse()?;
	assert_eq!(
		schema_of(&tree, ".foo.A"),
		"namespace foo {\n\
		 struct T\n\
		 {\n    \
		 f : u8 : 7;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace foo {\n\
		 const u8 C = 42;\n\
		 }\n\
		 \n\
		 namespace foo {\n\
		 archive A\n\
		 {\n    \
		 resourceA : .foo.T;\n\
		 }\n\
		 }\n\n"
	);
	Ok(())
}

#[test]
fn enum_schema_spells_out_declared_values() -> anyhow::Result<()> {
	let tree: Tree =
		"namespace n { enum E : u8 : 4 { A, B = 3 } struct S { e : E; } }".parse()?;
	assert_eq!(
		schema_of(&tree, ".n.S"),
		"namespace n {\n\
		 enum E : u8 : 4\n\
		 {\n    \
		 A = 0,\n    \
		 B = 3,\n\
		 }\n\
		 }\n\
		 \n\
		 namespace n {\n\
		 struct S\n\
		 {\n    \
		 e : .n.E : 4;\n\
		 }\n\
		 }\n\n"
	);
	Ok(())
}

#[test]
fn field_decorations_are_emitted_in_fixed_order() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		const u32 C = 7;
		const u32 I = 0;
		struct S { x : u32 : 8 @optional( I ) @const( C ); }
		}"
	.parse()?;
	assert_eq!(
		schema_of(&tree, ".n.S"),
		"namespace n {\n\
		 const u32 C = 7;\n\
		 }\n\
		 \n\
		 namespace n {\n\
		 const u32 I = 0;\n\
		 }\n\
		 \n\
		 namespace n {\n\
		 struct S\n\
		 {\n    \
		 x : u32 : 8 @const( .n.C ) @optional( .n.I );\n\
		 }\n\
		 }\n\n"
	);
	Ok(())
}

#[test]
fn resource_decorations_are_preserved() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		struct S { ref : u64 : 8; }
		archive A {
			@explicit_reference( S.ref, other )
			@optional
			data : vector< S >;
			other : vector< S >;
		}
		}"
	.parse()?;
	assert_eq!(
		schema_of(&tree, ".n.A"),
		"namespace n {\n\
		 struct S\n\
		 {\n    \
		 ref : u64 : 8;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace n {\n\
		 archive A\n\
		 {\n    \
		 @explicit_reference( .n.S.ref, .n.A.other )\n    \
		 @optional\n    \
		 data : vector< .n.S >;\n    \
		 other : vector< .n.S >;\n\
		 }\n\
		 }\n\n"
	);
	Ok(())
}

#[test]
fn bound_groups_appear_in_the_archive_schema() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		struct S { x : u64 : 64; }
		@bound_implicitly( group: r1, r2 )
		archive A {
			r1 : vector< S >;
			r2 : vector< S >;
		}
		}"
	.parse()?;
	assert_eq!(
		schema_of(&tree, ".n.A"),
		"namespace n {\n\
		 struct S\n\
		 {\n    \
		 x : u64 : 64;\n\
		 }\n\
		 }\n\
		 \n\
		 namespace n {\n\
		 @bound_implicitly( group: .n.A.r1, .n.A.r2 )\n\
		 archive A\n\
		 {\n    \
		 r1 : vector< .n.S >;\n    \
		 r2 : vector< .n.S >;\n\
		 }\n\
		 }\n\n"
	);
	Ok(())
}

#[test]
fn nodes_below_declarations_normalize_their_declaration() -> anyhow::Result<()> {
	let tree: Tree = "namespace n { struct S { x : u8 : 3; } }".parse()?;
	let field = tree.find(".n.S.x").unwrap();
	assert_eq!(
		tree.normalized_schema(field).unwrap(),
		schema_of(&tree, ".n.S")
	);
	Ok(())
}

#[test]
fn empty_tree_normalizes_to_nothing() -> anyhow::Result<()> {
	let tree: Tree = "".parse()?;
	assert_eq!(tree.normalized_schema(tree.root()).unwrap(), "");
	Ok(())
}

const CORPUS: &[&str] = &[
	"namespace n { struct S { a : u8 : 3; b : u16 : 15; } }",
	"namespace n { struct T { t : u64 : 17; } archive A { r : multivector< 33, T >; } }",
	"namespace n { const u8 C = 42; struct T { f : u8 : 7 @const( C ); } archive A { resourceA : T; } }",
	"namespace n { enum E : i8 : 3 { A = -4, B = 0 } struct S { e : E; } }",
	"namespace deeply.nested.name { struct S { x : u64; } }
	 namespace other { archive A { r : vector< .deeply.nested.name.S >; } }",
	"namespace n {
		struct S { x : u64 : 64; first : u32 : 14 @range( r ); }
		archive A { data : vector< S >; }
		}",
	"namespace n {
		struct S { x : u64 : 8; }
		@bound_implicitly( both: r1, r2 )
		archive A {
			@optional
			r1 : vector< S >;
			r2 : vector< S >;
			blob : raw_data;
		}
		}",
	"namespace n { archive Inner { payload : raw_data; } archive Outer { inner : archive Inner; } }",
	"namespace n {
		const u32 C = 7;
		const u32 I = 0;
		struct S { x : u32 : 8 @optional( I ) @const( C ); }
		}",
];

#[test]
fn resource_fragments_are_a_fixed_point_under_parse() {
	// A fragment reduced to a single resource may name sibling resources
	// in its decorations, so it only parses, it does not compile; its
	// normalization must still reproduce itself.
	let tree = compile(
		"namespace n {
		struct S { ref : u64 : 8; }
		enum E : u8 : 2 { A }
		struct T { e : E; }
		archive A {
			@explicit_reference( S.ref, other )
			data : vector< S >;
			other : vector< T >;
		}
		}",
	)
	.unwrap();
	for resource in ["data", "other"] {
		let path = format!(".n.A.{}", resource);
		let first = schema_of(&tree, &path);
		let fragment = Tree::parse(&first).unwrap_or_else(|e| panic!("{}: {}", first, e));
		let again = fragment.find(&path).unwrap();
		let second = fragment.normalized_schema(again).unwrap();
		assert_eq!(first, second, "for resource {}", path);
	}
}

/// Normalization is a fixed point: re-parsing normalized output and
/// normalizing again yields the same bytes.
#[test]
fn normalization_is_a_fixed_point_for_the_root() {
	for schema in CORPUS {
		let tree = compile(schema).unwrap_or_else(|e| panic!("{}: {}", schema, e));
		let first = tree.normalized_schema(tree.root()).unwrap();
		let reparsed = compile(&first).unwrap_or_else(|e| panic!("{}: {}", first, e));
		let second = reparsed.normalized_schema(reparsed.root()).unwrap();
		assert_eq!(first, second, "for input {}", schema);
	}
}

#[test]
fn normalization_is_a_fixed_point_for_declarations() {
	for schema in CORPUS {
		let tree = compile(schema).unwrap();
		for key in tree.iterate() {
			let node = &tree[key];
			if !(node.is_structure() || node.is_enumeration() || node.is_constant()
				|| node.is_archive())
			{
				continue;
			}
			let path = tree.path_of(key);
			let first = tree.normalized_schema(key).unwrap();
			let reparsed = compile(&first).unwrap_or_else(|e| panic!("{}: {}", first, e));
			let again = reparsed.find(&path).unwrap_or_else(|| panic!("{} lost", path));
			let second = reparsed.normalized_schema(again).unwrap();
			assert_eq!(first, second, "for node {} of {}", path, schema);
		}
	}
}
