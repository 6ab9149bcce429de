//! Building, persisting and sharing descriptor trees through the public API

use declindex_descriptor::Annotation;
use declindex_descriptor::DescriptorCache;
use declindex_descriptor::DescriptorData;
use declindex_descriptor::DescriptorError;
use declindex_descriptor::DescriptorKind;
use declindex_descriptor::DescriptorTree;
use declindex_descriptor::MethodFlags;
use declindex_descriptor::MethodSource;
use declindex_descriptor::NameInterner;
use declindex_descriptor::SignatureSource;
use declindex_descriptor::build_method;
use declindex_descriptor::decode_tree;
use declindex_descriptor::encode_tree;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn class_tree(interner: &NameInterner) -> DescriptorTree {
    let mut tree = DescriptorTree::for_file(Some(interner.intern("com.example")));
    let class = tree.add_child(
        tree.root(),
        DescriptorData::Class {
            qualified_name: interner.intern("com.example.Repository"),
            flags: 0,
        },
    );

    let sources = [
        MethodSource::new("<init>", "(Ljava/lang/String;)V")
            .with_flags(MethodFlags::pack(true, false, false, false, false))
            .with_parameter_names(["name"]),
        MethodSource::new("foo", "(I[Ljava/lang/String;)I")
            .with_flags(MethodFlags::pack(false, true, false, true, false))
            .with_parameter_names(["limit", "keys"]),
        MethodSource::new("find", "(Ljava/lang/Object;)Ljava/util/List;")
            .with_generic_signature(
                "<T:Ljava/lang/Object;>(TT;)Ljava/util/List<TT;>;^Ljava/io/IOException;",
            )
            .with_annotation(Annotation::type_use("org.jspecify.Nullable"))
            .with_annotation(Annotation::declaration("java.lang.Deprecated")),
    ];
    for source in &sources {
        build_method(&mut tree, class, interner, source).unwrap();
    }
    tree
}

#[test]
fn test_summaries_of_built_methods() {
    let interner = NameInterner::new();
    let tree = class_tree(&interner);

    let summaries: Vec<String> = tree.methods().map(|m| m.summary()).collect();
    assert_eq!(
        summaries,
        vec![
            "cons <init>:void",
            "varargs deprecated foo:int",
            "find:java.util.List<T>",
        ]
    );

    let find = tree.methods().nth(2).unwrap();
    assert!(find.flags().is_parsed_via_generic_signature());
    assert_eq!(
        find.return_type(true).to_string(),
        "@org.jspecify.Nullable java.util.List<T>"
    );
    assert_eq!(find.throws()[0].to_string(), "java.io.IOException");
}

#[test]
fn test_fallback_is_observable() {
    let interner = NameInterner::new();
    let mut tree = DescriptorTree::for_file(None);
    let root = tree.root();
    let source = MethodSource::new("load", "(J)Ljava/lang/String;")
        .with_generic_signature("(J)Ljava/util/Map<")
        .with_throws(["java/io/IOException"]);

    let built = build_method(&mut tree, root, &interner, &source).unwrap();
    assert_eq!(built.trace.source, SignatureSource::RawDescriptor);
    assert!(built.trace.recovered.is_some());

    let method = tree.method(built.id).unwrap();
    assert!(!method.flags().is_parsed_via_generic_signature());
    assert_eq!(method.summary(), "load:java.lang.String");
    assert_eq!(method.throws()[0].to_string(), "java.io.IOException");
}

#[test]
fn test_persisted_tree_matches_original() {
    let interner = NameInterner::new();
    let tree = class_tree(&interner);
    let bytes = encode_tree(&tree).unwrap();

    let fresh = NameInterner::new();
    let decoded = decode_tree(&bytes, &fresh).unwrap();
    assert_eq!(decoded.len(), tree.len());
    for (left, right) in tree.methods().zip(decoded.methods()) {
        assert_eq!(left.summary(), right.summary());
        assert_eq!(left.flags(), right.flags());
        assert_eq!(left.return_type(true), right.return_type(true));
        let left_params: Vec<String> = left
            .parameters()
            .unwrap()
            .iter()
            .map(|p| p.param_type.to_string())
            .collect();
        let right_params: Vec<String> = right
            .parameters()
            .unwrap()
            .iter()
            .map(|p| p.param_type.to_string())
            .collect();
        assert_eq!(left_params, right_params);
    }
    let throws_lists = decoded
        .iter()
        .filter(|id| decoded.kind(*id) == Some(DescriptorKind::ThrowsList))
        .count();
    assert_eq!(throws_lists, 3);
}

#[test]
fn test_malformed_descriptor_fails_construction() {
    let interner = NameInterner::new();
    let mut tree = DescriptorTree::for_file(None);
    let root = tree.root();
    let result = build_method(
        &mut tree,
        root,
        &interner,
        &MethodSource::new("broken", "(Ljava/lang/String"),
    );
    assert!(matches!(result, Err(DescriptorError::MalformedDescriptor(_))));
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_trees_are_shared_across_threads() {
    let interner = NameInterner::new();
    let cache = DescriptorCache::new(2);
    cache.insert("repository", Arc::new(class_tree(&interner)));
    let tree = cache.get(&"repository").unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let tree = Arc::clone(&tree);
            scope.spawn(move || {
                let foo = tree.methods().find(|m| m.name() == Some("foo")).unwrap();
                let keys = foo.find_parameter(1).unwrap();
                assert_eq!(keys.param_type.to_string(), "java.lang.String...");
                foo.descriptor().set_default_value_text("3");
            });
        }
    });

    let foo = tree.methods().find(|m| m.name() == Some("foo")).unwrap();
    assert_eq!(foo.summary(), "varargs deprecated foo:int default=3");
}
