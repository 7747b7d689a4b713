/// The default JSON name for a field, as computed by `protoc`.
pub(crate) fn to_json_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = false;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

/// The name of the entry message synthesized for a map field.
pub(crate) fn map_entry_name(field_name: &str) -> String {
    let mut result = to_pascal_case(field_name);
    result.push_str("Entry");
    result
}

fn to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

#[test]
fn json_name() {
    assert_eq!(to_json_name("foo"), "foo");
    assert_eq!(to_json_name("foo_bar"), "fooBar");
    assert_eq!(to_json_name("foo_bar_baz"), "fooBarBaz");
    assert_eq!(to_json_name("_foo"), "Foo");
    assert_eq!(to_json_name("fooBar"), "fooBar");
}

#[test]
fn entry_name() {
    assert_eq!(map_entry_name("labels"), "LabelsEntry");
    assert_eq!(map_entry_name("string_to_int"), "StringToIntEntry");
    assert_eq!(map_entry_name("_x"), "XEntry");
}
