use {
	flatdata_schema::{
		tree::traversal::{BfsTraversal, DfsTraversal},
		NodeKey, Tree,
	},
	pretty_assertions::assert_eq,
	std::collections::HashSet,
};

#[test]
fn paths_and_depths() -> anyhow::Result<()> {
	let tree: Tree = "namespace a.b { struct S { x : u8 : 3; } }".parse()?;
	let field = tree.find(".a.b.S.x").unwrap();
	assert_eq!(tree.path_of(field), ".a.b.S.x");
	assert_eq!(tree.path_with(field, "_"), "_a_b_S_x");
	assert_eq!(tree.depth(field), 4);
	assert_eq!(tree.depth(tree.root()), 0);
	assert_eq!(tree[tree.root()].name(), "");
	assert_eq!(tree.namespace_path(field, "."), "a.b");
	Ok(())
}

#[test]
fn parents_chain_to_the_root() -> anyhow::Result<()> {
	let tree: Tree = "namespace a.b { struct S { x : u8 : 3; } }".parse()?;
	let field = tree.find(".a.b.S.x").unwrap();
	let structure = tree[field].parent().unwrap();
	assert_eq!(tree.path_of(structure), ".a.b.S");
	assert_eq!(tree[tree.find(".a").unwrap()].parent(), Some(tree.root()));
	assert_eq!(tree[tree.root()].parent(), None);
	Ok(())
}

#[test]
fn reference_names_are_sigil_encoded() -> anyhow::Result<()> {
	let tree: Tree =
		"namespace n { struct T { t : u64 : 17; } archive A { r : multivector< 33, T >; } }"
			.parse()?;
	let symbols: HashSet<String> = tree.symbols().into_iter().collect();
	let expected: HashSet<String> = [
		".n",
		".n.T",
		".n.T.t",
		".n.A",
		".n.A.r",
		".n.A.r.@@n@T",
		".n.A.r.@@n@_builtin@multivector@IndexType33",
		".n._builtin",
		".n._builtin.multivector",
		".n._builtin.multivector.IndexType33",
		".n._builtin.multivector.IndexType33.value",
	]
	.into_iter()
	.map(str::to_owned)
	.collect();
	assert_eq!(symbols, expected);

	let reference = tree.find(".n.A.r.@@n@T").unwrap();
	assert!(tree[reference].is_qualified_reference());
	assert_eq!(tree[reference].reference_target().unwrap(), ".n.T");
	assert_eq!(tree.reference_target_node(reference), tree.find(".n.T"));
	Ok(())
}

#[test]
fn children_preserve_insertion_order() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		struct S { c : u8 : 1; a : u8 : 1; b : u8 : 1; }
		}"
	.parse()?;
	let structure = tree.find(".n.S").unwrap();
	let names: Vec<&str> = tree
		.fields(structure)
		.into_iter()
		.map(|f| tree[f].name())
		.collect();
	assert_eq!(names, vec!["c", "a", "b"]);
	Ok(())
}

#[test]
fn sibling_names_are_unique() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		struct S { x : u64 : 64; }
		archive A { r : vector< S >; s : S; }
		}"
	.parse()?;
	for key in tree.iterate() {
		let mut seen = HashSet::new();
		for &child in tree[key].children() {
			assert!(seen.insert(tree[child].name()), "duplicate under {}", tree.path_of(key));
		}
	}
	Ok(())
}

#[test]
fn bfs_reports_distances() -> anyhow::Result<()> {
	let tree: Tree = "namespace n { struct S { x : u8 : 1; } archive A { r : vector< S >; } }"
		.parse()?;
	let distances: Vec<(String, usize)> = BfsTraversal::new(&tree, tree.root())
		.iterate()?
		.map(|(key, distance)| (tree.path_of(key), distance))
		.collect();
	assert_eq!(distances[0], ("".to_owned(), 0));
	let of = |path: &str| {
		distances
			.iter()
			.find(|(p, _)| p == path)
			.unwrap_or_else(|| panic!("{} not visited", path))
			.1
	};
	assert_eq!(of(".n"), 1);
	assert_eq!(of(".n.S"), 2);
	assert_eq!(of(".n.A"), 2);
	assert_eq!(of(".n.A.r"), 3);
	assert_eq!(of(".n.S.x"), 3);
	Ok(())
}

#[test]
fn bfs_visits_each_node_once() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		struct S { x : u8 : 1; }
		archive A { a : vector< S >; b : vector< S >; }
		}"
	.parse()?;
	let visited: Vec<NodeKey> = BfsTraversal::new(&tree, tree.root())
		.iterate()?
		.map(|(key, _)| key)
		.collect();
	let unique: HashSet<NodeKey> = visited.iter().copied().collect();
	assert_eq!(unique.len(), visited.len());
	Ok(())
}

#[test]
fn dependency_order_puts_referents_first() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		const u8 C = 1;
		enum E : u8 : 2 { A }
		struct S { e : E; x : u8 : 4 @const( C ); }
		archive Inner { data : vector< S >; }
		archive Outer { inner : archive Inner; multi : multivector< 14, S >; }
		}"
	.parse()?;

	let order: Vec<NodeKey> = DfsTraversal::new(&tree, tree.root())
		.dependency_order()?
		.collect();
	let position = |key: NodeKey| {
		order
			.iter()
			.position(|&k| k == key)
			.unwrap_or_else(|| panic!("{} not in dependency order", tree.path_of(key)))
	};

	// every type reference's referent precedes the node owning the reference
	for key in tree.iterate() {
		let node = &tree[key];
		let Some(reference) = node.as_reference() else {
			continue;
		};
		if !reference.kind().is_type_reference() {
			continue;
		}
		let owner = node.parent().unwrap();
		let target = tree.reference_target_node(key).unwrap();
		assert!(
			position(target) < position(owner),
			"{} should precede {}",
			tree.path_of(target),
			tree.path_of(owner)
		);
	}
	Ok(())
}

#[test]
fn dfs_pre_order_starts_at_the_root() -> anyhow::Result<()> {
	let tree: Tree = "namespace n { struct S { x : u8 : 1; } }".parse()?;
	let pre: Vec<String> = DfsTraversal::new(&tree, tree.root())
		.iterate()?
		.map(|key| tree.path_of(key))
		.collect();
	assert_eq!(pre, vec!["", ".n", ".n.S", ".n.S.x"]);
	Ok(())
}

#[test]
fn layout_is_additive_and_contiguous() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		struct S { a : u8 : 3; b : u64 : 33; c : bool; d : i16; }
		}"
	.parse()?;
	let structure = tree.find(".n.S").unwrap();
	let mut expected_offset = 0;
	for field in tree.fields(structure) {
		let payload = tree[field].as_field().unwrap();
		assert_eq!(payload.offset(), Some(expected_offset));
		expected_offset += payload.width().unwrap();
	}
	assert_eq!(
		tree[structure].as_structure().unwrap().size_in_bits(),
		Some(expected_offset)
	);
	assert_eq!(expected_offset, 3 + 33 + 1 + 16);
	Ok(())
}

#[test]
fn enum_range_is_covered_exactly_once() -> anyhow::Result<()> {
	let tree: Tree = "namespace n { enum E : i8 : 4 { A = -8, B, C = 3 } }".parse()?;
	let enumeration = tree.find(".n.E").unwrap();
	let mut values = Vec::new();
	let mut declared = 0;
	for &child in tree[enumeration].children() {
		let value = tree[child].as_enumeration_value().unwrap();
		values.push(value.value());
		if !value.auto_generated() {
			declared += 1;
		}
	}
	values.sort_unstable();
	assert_eq!(values, (-8..8).collect::<Vec<i128>>());
	assert_eq!(declared, 3);
	Ok(())
}

#[test]
fn resources_and_archives_expose_their_members() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		struct S { x : u8 : 1; }
		struct T { y : u8 : 1; }
		archive A {
			one : S;
			many : vector< T >;
			mixed : multivector< 9, S, T >;
			blob : raw_data;
		}
		}"
	.parse()?;
	let archive = tree.find(".n.A").unwrap();
	let names: Vec<&str> = tree
		.resources(archive)
		.into_iter()
		.map(|r| tree[r].name())
		.collect();
	assert_eq!(names, vec!["one", "many", "mixed", "blob"]);

	let mixed = tree.find(".n.A.mixed").unwrap();
	let structures: Vec<String> = tree
		.referenced_structures(mixed)
		.into_iter()
		.map(|s| tree.path_of(s))
		.collect();
	assert_eq!(
		structures,
		vec![".n._builtin.multivector.IndexType9", ".n.S", ".n.T"]
	);
	let blob = tree.find(".n.A.blob").unwrap();
	assert!(tree.referenced_structures(blob).is_empty());
	Ok(())
}

#[test]
fn doc_comments_are_kept_on_nodes() -> anyhow::Result<()> {
	let tree: Tree = "namespace n {
		// free comment
		/// The one structure.
		struct S {
			/* field doc */
			x : u8 : 1;
		}
		}"
	.parse()?;
	let structure = tree.find(".n.S").unwrap();
	assert_eq!(tree[structure].doc(), Some("/// The one structure."));
	let field = tree.find(".n.S.x").unwrap();
	assert_eq!(tree[field].doc(), Some("/* field doc */"));
	Ok(())
}
