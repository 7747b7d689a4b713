use std::{collections::BTreeMap, io};

use bytes::Bytes;
use prost_types::{
    field_descriptor_proto::{Label as DescriptorLabel, Type},
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
};

use super::*;
use crate::{
    file::{DescriptorSetProvider, LocalProvider},
    ir::{Declaration, FieldType, Label, Message, Reserved, ReservedRange, ScalarType, TypeRef},
    options::{OptionName, OptionValue},
};

#[derive(Debug, Default, Clone)]
struct MemoryProvider {
    files: BTreeMap<String, Result<String, io::ErrorKind>>,
}

impl MemoryProvider {
    fn new(files: &[(&str, &str)]) -> Self {
        MemoryProvider {
            files: files
                .iter()
                .map(|(path, source)| (path.to_string(), Ok(source.to_string())))
                .collect(),
        }
    }

    fn with_unreadable(mut self, path: &str, kind: io::ErrorKind) -> Self {
        self.files.insert(path.to_owned(), Err(kind));
        self
    }
}

fn dir_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

impl LocalProvider for MemoryProvider {
    fn list_packages(&self) -> Result<Vec<String>, Error> {
        let mut packages: Vec<String> = self
            .files
            .keys()
            .map(|path| dir_of(path).to_owned())
            .collect();
        packages.sort();
        packages.dedup();
        Ok(packages)
    }

    fn list_source_files(&self, package: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .files
            .keys()
            .filter(|path| dir_of(path) == package)
            .cloned()
            .collect())
    }

    fn get_local_file(&self, path: &str) -> Result<Bytes, Error> {
        match self.files.get(path) {
            Some(Ok(source)) => Ok(Bytes::from(source.clone())),
            Some(Err(kind)) => Err(Error::new(io::Error::new(*kind, "cannot read"))),
            None => Err(Error::file_not_found(path)),
        }
    }
}

fn resolver(files: &[(&str, &str)]) -> Resolver {
    Resolver::new(MemoryProvider::new(files), DescriptorSetProvider::default())
}

fn message<'a>(file: &'a CompiledFile, name: &str) -> &'a Message {
    file.get_message(name)
        .unwrap_or_else(|| panic!("message '{}' not found", name))
}

fn paths(files: &[CompiledFile]) -> Vec<&str> {
    files.iter().map(|file| file.path()).collect()
}

#[test]
fn package_siblings_resolve_without_imports() {
    let resolver = resolver(&[
        (
            "foo/b.proto",
            "syntax = \"proto3\"; package foo; message B { A a = 1; }",
        ),
        (
            "foo/a.proto",
            "syntax = \"proto3\"; package foo; message A { B b = 1; }",
        ),
        (
            "foo/c.proto",
            "syntax = \"proto3\"; package foo; message C {}",
        ),
        ("foo/c.gen.proto", "this is not valid"),
    ]);

    let files = resolver.compile("foo/b.proto").unwrap();
    assert_eq!(paths(&files), ["foo/b.proto", "foo/a.proto", "foo/c.proto"]);

    let b = message(&files[0], "foo.B");
    assert_eq!(
        b.fields[0].ty,
        FieldType::Message(TypeRef::new("foo.A", "foo"))
    );
    let a = message(&files[1], "foo.A");
    assert_eq!(
        a.fields[0].ty,
        FieldType::Message(TypeRef::new("foo.B", "foo"))
    );
}

#[test]
fn other_local_package_is_loaded_but_not_returned() {
    let resolver = resolver(&[
        (
            "foo/a.proto",
            "syntax = \"proto3\"; package foo; import \"bar/b.proto\"; message A { bar.B b = 1; }",
        ),
        (
            "bar/b.proto",
            "syntax = \"proto3\"; package bar; message B { C c = 1; }",
        ),
        ("bar/c.proto", "syntax = \"proto3\"; package bar; message C {}"),
    ]);

    let files = resolver.compile("foo/a.proto").unwrap();
    assert_eq!(paths(&files), ["foo/a.proto"]);
    assert_eq!(
        message(&files[0], "foo.A").fields[0].ty,
        FieldType::Message(TypeRef::new("bar.B", "bar"))
    );
}

#[test]
fn other_local_package_is_linked() {
    let resolver = resolver(&[
        (
            "foo/a.proto",
            "syntax = \"proto3\"; package foo; import \"bar/b.proto\"; message A { bar.B b = 1; }",
        ),
        (
            "bar/b.proto",
            "syntax = \"proto3\"; package bar; message B { Missing c = 1; }",
        ),
    ]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_link());
    assert_eq!(err.unresolved_name(), Some("Missing"));
    assert_eq!(err.file(), Some("bar/b.proto"));
}

#[test]
fn unimported_package_is_not_visible() {
    let resolver = resolver(&[
        (
            "foo/a.proto",
            "syntax = \"proto3\"; package foo; message A { bar.B b = 1; }",
        ),
        ("bar/b.proto", "syntax = \"proto3\"; package bar; message B {}"),
    ]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_link());
    assert_eq!(err.unresolved_name(), Some("bar.B"));
}

#[test]
fn public_imports_are_visible() {
    let resolver = resolver(&[
        (
            "foo/a.proto",
            "syntax = \"proto3\"; package foo; import \"bar/b.proto\"; message A { baz.C c = 1; }",
        ),
        (
            "bar/b.proto",
            "syntax = \"proto3\"; package bar; import public \"baz/c.proto\";",
        ),
        ("baz/c.proto", "syntax = \"proto3\"; package baz; message C {}"),
    ]);

    let files = resolver.compile("foo/a.proto").unwrap();
    assert_eq!(
        message(&files[0], "foo.A").fields[0].ty,
        FieldType::Message(TypeRef::new("baz.C", "baz"))
    );
}

#[test]
fn nested_scopes() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\";
        package foo.bar;
        message Inner {}
        message Outer {
            message Inner {}
            Inner inner = 1;
            .foo.bar.Inner outer = 2;
            bar.Inner relative = 3;
            Status status = 4;
        }
        enum Status { UNKNOWN = 0; }",
    )]);

    let files = resolver.compile("foo/a.proto").unwrap();
    let outer = message(&files[0], "foo.bar.Outer");
    let types: Vec<_> = outer.fields.iter().map(|field| &field.ty).collect();
    assert_eq!(
        types,
        [
            &FieldType::Message(TypeRef::new("foo.bar.Outer.Inner", "foo.bar")),
            &FieldType::Message(TypeRef::new("foo.bar.Inner", "foo.bar")),
            &FieldType::Message(TypeRef::new("foo.bar.Inner", "foo.bar")),
            &FieldType::Enum(TypeRef::new("foo.bar.Status", "foo.bar")),
        ]
    );
}

#[test]
fn maps_optionals_and_oneofs() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\";
        package foo;
        message A {
            map<string, B> items = 1;
            optional int32 count = 2;
            oneof choice {
                string name = 3;
                B b = 4;
            }
            repeated string tags = 5 [json_name = \"labels\"];
            string plain_name = 6;
        }
        message B {}",
    )]);

    let files = resolver.compile("foo/a.proto").unwrap();
    let a = message(&files[0], "foo.A");

    assert!(a.nested.is_empty());
    assert_eq!(
        a.fields[0].ty,
        FieldType::Map {
            key: ScalarType::String,
            value: Box::new(FieldType::Message(TypeRef::new("foo.B", "foo"))),
        }
    );
    assert_eq!(a.fields[1].label, Label::Optional);
    assert_eq!(a.fields[1].oneof_index, None);

    assert_eq!(a.oneofs.len(), 1);
    assert_eq!(a.oneofs[0].name, "choice");
    assert_eq!(a.fields[2].oneof_index, Some(0));
    assert_eq!(a.fields[2].label, Label::Singular);
    assert_eq!(a.fields[3].oneof_index, Some(0));

    assert_eq!(a.fields[4].label, Label::Repeated);
    assert_eq!(a.fields[4].json_name.as_deref(), Some("labels"));
    assert_eq!(a.fields[5].label, Label::Singular);
    assert_eq!(a.fields[5].json_name, None);
}

#[test]
fn options_are_resolved() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\";
        package foo;
        import \"google/protobuf/descriptor.proto\";
        option java_package = \"com.foo\";
        extend google.protobuf.FieldOptions {
            string tag = 50000;
        }
        message A {
            string name = 1 [deprecated = true, (tag) = \"x\"];
        }",
    )]);

    let files = resolver.compile("foo/a.proto").unwrap();
    let file = &files[0];

    assert_eq!(file.extensions.len(), 1);
    assert_eq!(
        file.extensions[0].extendee,
        TypeRef::new("google.protobuf.FieldOptions", "google.protobuf")
    );

    let file_options = file.options.entries();
    assert_eq!(file_options.len(), 1);
    assert_eq!(
        file_options[0].name.full_name(),
        "google.protobuf.FileOptions.java_package"
    );
    assert_eq!(
        file_options[0].value,
        OptionValue::Scalar("\"com.foo\"".to_owned())
    );

    let field_options = message(file, "foo.A").fields[0].options.entries();
    assert_eq!(field_options.len(), 2);
    assert_eq!(
        field_options[0].name.full_name(),
        "google.protobuf.FieldOptions.deprecated"
    );
    assert_eq!(
        field_options[1].name,
        OptionName::Extension(TypeRef::new("foo.tag", "foo"))
    );
    assert_eq!(field_options[1].value, OptionValue::Scalar("\"x\"".to_owned()));
}

#[test]
fn unknown_option_is_a_link_error() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\"; package foo; message A { option (missing) = 1; }",
    )]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_link());
    assert_eq!(err.unresolved_name(), Some("missing"));

    let resolver = resolver_with_builtin("no_such_option");
    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert_eq!(err.unresolved_name(), Some("no_such_option"));
}

#[test]
fn reserved_statements_are_linked() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\"; package foo; \
         message A { reserved 2, 5 to 7, 10 to max; reserved \"old\"; } \
         enum E { E_UNSPECIFIED = 0; reserved 3 to max; }",
    )]);

    let files = resolver.compile("foo/a.proto").unwrap();
    assert_eq!(
        message(&files[0], "foo.A").reserved,
        [
            Reserved::Ranges {
                ranges: vec![
                    ReservedRange { start: 2, end: 2 },
                    ReservedRange { start: 5, end: 7 },
                    ReservedRange {
                        start: 10,
                        end: 536_870_911,
                    },
                ],
                path: vec![4, 0, 9],
            },
            Reserved::Names {
                names: vec!["old".to_owned()],
                path: vec![4, 0, 10],
            },
        ]
    );

    match &files[0].declarations[1] {
        Declaration::Enum(enu) => assert_eq!(
            enu.reserved,
            [Reserved::Ranges {
                ranges: vec![ReservedRange {
                    start: 3,
                    end: i32::MAX,
                }],
                path: vec![5, 0, 4],
            }]
        ),
        other => panic!("expected an enum, found {:?}", other),
    }
}

#[test]
fn enum_value_option_names_its_value() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\"; package foo; enum E { A = 0 [(missing) = 1]; }",
    )]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert_eq!(err.unresolved_name(), Some("missing"));
    assert_eq!(
        format!("{:?}", err),
        "foo/a.proto: name 'missing' is not defined (referenced by 'foo.E.A')"
    );
}

fn resolver_with_builtin(name: &str) -> Resolver {
    let source = format!(
        "syntax = \"proto3\"; package foo; message A {{ option {} = true; }}",
        name
    );
    resolver(&[("foo/a.proto", &source)])
}

#[test]
fn wrong_kind_of_reference() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\";
        package foo;
        message A { S s = 1; }
        service S {}",
    )]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_link());
    assert_eq!(err.unresolved_name(), None);
    assert_eq!(err.file(), Some("foo/a.proto"));
}

#[test]
fn method_types() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\";
        package foo;
        import \"google/protobuf/empty.proto\";
        message Req {}
        service S {
            rpc Call(Req) returns (google.protobuf.Empty);
            rpc Stream(stream Req) returns (stream Req);
        }",
    )]);

    let files = resolver.compile("foo/a.proto").unwrap();
    let service = files[0]
        .declarations
        .iter()
        .find_map(|decl| match decl {
            Declaration::Service(service) => Some(service),
            _ => None,
        })
        .unwrap();

    assert_eq!(service.methods[0].input, TypeRef::new("foo.Req", "foo"));
    assert_eq!(
        service.methods[0].output,
        TypeRef::new("google.protobuf.Empty", "google.protobuf")
    );
    assert!(!service.methods[0].client_streaming);
    assert!(service.methods[1].client_streaming);
    assert!(service.methods[1].server_streaming);
}

#[test]
fn duplicate_names() {
    let resolver = resolver(&[
        ("foo/a.proto", "syntax = \"proto3\"; package foo; message A {}"),
        ("foo/b.proto", "syntax = \"proto3\"; package foo; message A {}"),
    ]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_link());
    assert_eq!(
        err.to_string(),
        "name 'foo.A' is defined in both 'foo/a.proto' and 'foo/b.proto'"
    );
}

#[test]
fn circular_import() {
    let resolver = resolver(&[
        (
            "foo/a.proto",
            "syntax = \"proto3\"; package foo; import \"bar/b.proto\";",
        ),
        (
            "bar/b.proto",
            "syntax = \"proto3\"; package bar; import \"foo/a.proto\";",
        ),
    ]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_link());
    assert_eq!(err.file(), Some("bar/b.proto"));
    assert_eq!(
        err.to_string(),
        "import cycle detected: foo/a.proto -> bar/b.proto -> foo/a.proto"
    );
}

#[test]
fn circular_import_within_package() {
    let resolver = resolver(&[
        (
            "foo/a.proto",
            "syntax = \"proto3\"; package foo; import \"foo/b.proto\";",
        ),
        (
            "foo/b.proto",
            "syntax = \"proto3\"; package foo; import \"foo/a.proto\";",
        ),
    ]);

    let err = resolver.compile("foo/b.proto").unwrap_err();
    assert_eq!(
        err.to_string(),
        "import cycle detected: foo/b.proto -> foo/a.proto -> foo/b.proto"
    );
}

#[test]
fn packages_importing_each_other_without_file_cycle() {
    let resolver = resolver(&[
        (
            "a/x.proto",
            "syntax = \"proto3\"; package a; import \"b/y.proto\"; message X { b.Y y = 1; }",
        ),
        (
            "a/w.proto",
            "syntax = \"proto3\"; package a; message W {}",
        ),
        (
            "b/y.proto",
            "syntax = \"proto3\"; package b; import \"a/w.proto\"; message Y { a.W w = 1; }",
        ),
    ]);

    let files = resolver.compile("a/x.proto").unwrap();
    assert_eq!(paths(&files), ["a/x.proto", "a/w.proto"]);
    assert_eq!(
        message(&files[0], "a.X").fields[0].ty,
        FieldType::Message(TypeRef::new("b.Y", "b"))
    );

    let files = resolver.compile("b/y.proto").unwrap();
    assert_eq!(paths(&files), ["b/y.proto"]);
    assert_eq!(
        message(&files[0], "b.Y").fields[0].ty,
        FieldType::Message(TypeRef::new("a.W", "a"))
    );
}

#[test]
fn not_found() {
    let resolver = resolver(&[(
        "foo/a.proto",
        "syntax = \"proto3\"; package foo; import \"dep/missing.proto\";",
    )]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_file_not_found());
    assert_eq!(err.file(), Some("dep/missing.proto"));

    let err = resolver.compile("other/missing.proto").unwrap_err();
    assert!(err.is_file_not_found());
    assert_eq!(err.file(), Some("other/missing.proto"));
}

#[test]
fn io_error_names_path() {
    let provider = MemoryProvider::new(&[("foo/a.proto", "syntax = \"proto3\";")])
        .with_unreadable("foo/b.proto", io::ErrorKind::PermissionDenied);
    let resolver = Resolver::new(provider, DescriptorSetProvider::default());

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_io());
    assert_eq!(err.file(), Some("foo/b.proto"));
}

#[test]
fn parse_error() {
    let resolver = resolver(&[("foo/a.proto", "message {")]);

    let err = resolver.compile("foo/a.proto").unwrap_err();
    assert!(err.is_parse());
}

fn dependency_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("dep/types.proto".to_owned()),
            package: Some("dep".to_owned()),
            syntax: Some("proto3".to_owned()),
            message_type: vec![
                DescriptorProto {
                    name: Some("Item".to_owned()),
                    field: vec![FieldDescriptorProto {
                        name: Some("child".to_owned()),
                        number: Some(1),
                        label: Some(DescriptorLabel::Optional as i32),
                        r#type: Some(Type::Message as i32),
                        type_name: Some(".dep.Child".to_owned()),
                        json_name: Some("child".to_owned()),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Child".to_owned()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
    }
}

#[test]
fn dependency_files() {
    let local = MemoryProvider::new(&[(
        "foo/a.proto",
        "syntax = \"proto3\"; package foo; import \"dep/types.proto\"; message A { dep.Item item = 1; }",
    )]);
    let resolver = Resolver::new(local, DescriptorSetProvider::new(dependency_set()));

    let files = resolver.compile("foo/a.proto").unwrap();
    assert_eq!(paths(&files), ["foo/a.proto"]);
    assert_eq!(
        message(&files[0], "foo.A").fields[0].ty,
        FieldType::Message(TypeRef::new("dep.Item", "dep"))
    );

    let files = resolver.compile("dep/types.proto").unwrap();
    assert_eq!(paths(&files), ["dep/types.proto"]);
    assert_eq!(
        message(&files[0], "dep.Item").fields[0].ty,
        FieldType::Message(TypeRef::new("dep.Child", "dep"))
    );
}

#[test]
fn custom_declaration_compiler() {
    struct FixedCompiler;

    impl DeclarationCompiler for FixedCompiler {
        fn compile(&self, path: &str, _: &[u8]) -> Result<FileDescriptorProto, Error> {
            Ok(FileDescriptorProto {
                name: Some(path.to_owned()),
                package: Some("custom".to_owned()),
                syntax: Some("proto3".to_owned()),
                message_type: vec![DescriptorProto {
                    name: Some("Fixed".to_owned()),
                    ..Default::default()
                }],
                ..Default::default()
            })
        }
    }

    let mut resolver = resolver(&[("custom/a.idl", "anything")]);
    resolver.declaration_compiler(FixedCompiler);

    let files = resolver.compile("custom/a.idl").unwrap();
    assert_eq!(files[0].package(), "custom");
    assert!(files[0].get_message("custom.Fixed").is_some());
}

#[test]
fn concurrent_compiles() {
    let resolver = resolver(&[
        (
            "foo/a.proto",
            "syntax = \"proto3\"; package foo; message A { B b = 1; }",
        ),
        ("foo/b.proto", "syntax = \"proto3\"; package foo; message B {}"),
        (
            "bar/c.proto",
            "syntax = \"proto3\"; package bar; import \"foo/a.proto\"; message C { foo.A a = 1; }",
        ),
    ]);

    let expected_foo = resolver.compile("foo/a.proto").unwrap();
    let expected_bar = resolver.compile("bar/c.proto").unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let resolver = &resolver;
                scope.spawn(move || {
                    if index % 2 == 0 {
                        resolver.compile("foo/a.proto").unwrap()
                    } else {
                        resolver.compile("bar/c.proto").unwrap()
                    }
                })
            })
            .collect();

        for (index, handle) in handles.into_iter().enumerate() {
            let files = handle.join().unwrap();
            if index % 2 == 0 {
                assert_eq!(files, expected_foo);
            } else {
                assert_eq!(files, expected_bar);
            }
        }
    });
}

#[test]
fn package_prefixes() {
    let provider = MemoryProvider::new(&[
        ("foo/a.proto", "syntax = \"proto3\"; package foo;"),
        ("foo/bar/b.proto", "syntax = \"proto3\"; package foo.bar;"),
    ]);
    let resolver = Resolver::new(provider, DescriptorSetProvider::default());
    let session = Session::new(&resolver).unwrap();

    assert_eq!(session.owning_package("foo/bar/b.proto"), Some("foo/bar"));
    assert_eq!(session.owning_package("foo/a.proto"), Some("foo"));
    assert_eq!(session.owning_package("foo/baz/c.proto"), Some("foo"));
    assert_eq!(session.owning_package("foobar/c.proto"), None);
    assert_eq!(session.owning_package("root.proto"), None);
}
