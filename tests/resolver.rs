mod common;

use std::{fs, sync::Arc, thread};

use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use protolink::{
    file::{ChainProvider, DescriptorSetProvider, DirectoryProvider},
    ir::{Declaration, FieldType, TypeRef},
    print_file, Resolver,
};
use tempfile::TempDir;

use common::test_data_dir;

fn write(dir: &TempDir, path: &str, source: &str) {
    let path = dir.path().join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, source).unwrap();
}

#[test]
fn generated_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir,
        "app/main.proto",
        "syntax = \"proto3\"; package app; message Main {}",
    );
    write(
        &dir,
        "app/main.gen.proto",
        "syntax = \"proto3\"; package app; message Main {}",
    );

    let resolver = Resolver::new(DirectoryProvider::new(dir.path()), ChainProvider::new());
    let files = resolver.compile("app/main.proto").unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path(), "app/main.proto");
}

#[test]
fn nested_packages_are_separate() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir,
        "app/main.proto",
        "syntax = \"proto3\"; package app; import \"app/v1/api.proto\"; message Main { app.v1.Api api = 1; }",
    );
    write(
        &dir,
        "app/v1/api.proto",
        "syntax = \"proto3\"; package app.v1; message Api {}",
    );

    let resolver = Resolver::new(DirectoryProvider::new(dir.path()), ChainProvider::new());
    let files = resolver.compile("app/main.proto").unwrap();
    assert_eq!(files.len(), 1);

    let main = files[0].get_message("app.Main").unwrap();
    assert_eq!(
        main.fields[0].ty,
        FieldType::Message(TypeRef::new("app.v1.Api", "app.v1"))
    );
    assert!(print_file(&files[0])
        .unwrap()
        .contains("  app.v1.Api api = 1;\n"));
}

fn encoded_dependencies() -> Vec<u8> {
    let file = FileDescriptorProto {
        name: Some("vendor/money.proto".to_owned()),
        package: Some("vendor".to_owned()),
        syntax: Some("proto3".to_owned()),
        message_type: vec![prost_types::DescriptorProto {
            name: Some("Money".to_owned()),
            ..Default::default()
        }],
        ..Default::default()
    };
    FileDescriptorSet { file: vec![file] }.encode_to_vec()
}

#[test]
fn decoded_descriptor_set() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir,
        "shop/cart.proto",
        "syntax = \"proto3\";
package shop;

import \"vendor/money.proto\";

message Cart {
  vendor.Money total = 1;
}
",
    );

    let mut dependencies = ChainProvider::new();
    dependencies.add(DescriptorSetProvider::decode(encoded_dependencies().as_slice()).unwrap());
    let resolver = Resolver::new(DirectoryProvider::new(dir.path()), dependencies);

    let files = resolver.compile("shop/cart.proto").unwrap();
    similar_asserts::assert_eq!(
        print_file(&files[0]).unwrap(),
        fs::read_to_string(dir.path().join("shop/cart.proto")).unwrap()
    );

    let files = resolver.compile("vendor/money.proto").unwrap();
    assert_eq!(files.len(), 1);
    assert!(matches!(&files[0].declarations[..], [Declaration::Message(money)] if money.name == "Money"));
}

#[test]
fn shared_between_threads() {
    let resolver = Arc::new(Resolver::new(
        DirectoryProvider::new(test_data_dir()),
        ChainProvider::new(),
    ));

    let handles: Vec<_> = ["shapes/canvas.proto", "shapes/element.proto", "errors/missing.proto"]
        .into_iter()
        .map(|path| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || resolver.compile(path).map(|files| files.len()))
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(results[0].as_ref().unwrap(), &3);
    assert_eq!(results[1].as_ref().unwrap(), &3);
    assert!(results[2].as_ref().unwrap_err().is_link());
}
