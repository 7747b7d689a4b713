//! The linked representation of a compiled protobuf file.
//!
//! Values of these types are produced by the [`Resolver`](crate::Resolver) once every reference
//! they contain has been linked, and are consumed read-only by [`print_file`](crate::print_file).

use std::collections::{BTreeMap, BTreeSet};

use crate::options::OptionSet;

/// The path of a declaration within its file, using descriptor field numbers and indices.
///
/// This matches the `path` of a [`Location`](prost_types::source_code_info::Location), for
/// example `[4, 0, 2, 1]` for the second field of the first message in a file.
pub type SourcePath = Vec<i32>;

/// A fully linked protobuf file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFile {
    /// The unique path of this file, for example `foo/bar/baz.proto`.
    pub path: String,
    /// The dotted package name, or an empty string if the file has no package.
    pub package: String,
    /// The syntax variant declared by the file.
    pub syntax: Syntax,
    /// Imported files, in the order they were declared.
    pub imports: Vec<Import>,
    /// Top-level messages, enums and services.
    pub declarations: Vec<Declaration>,
    /// Top-level extension fields, in the order they were declared.
    pub extensions: Vec<ExtensionField>,
    /// File-level options.
    pub options: OptionSet,
    /// Source positions and comments, keyed by declaration path.
    pub source_info: BTreeMap<SourcePath, Location>,
    /// The fully-qualified names of every package and declaration visible from this file.
    ///
    /// References are only shortened to a name that resolves back to the same declaration
    /// from where it is written. If this is empty, no such check is made.
    pub names: BTreeSet<String>,
}

/// The syntax variant of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syntax {
    /// `syntax = "proto2";`, or no syntax statement.
    Proto2,
    /// `syntax = "proto3";`
    Proto3,
    /// Any other value, such as `editions`.
    Other(String),
}

/// An import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// The imported file path.
    pub path: String,
    /// The import modifier.
    pub kind: ImportKind,
    /// The path of the import statement.
    pub location_path: SourcePath,
}

/// Modifier for an [`Import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// A plain `import`.
    Default,
    /// `import public`
    Public,
    /// `import weak`
    Weak,
}

/// A top-level or nested declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// A message type.
    Message(Message),
    /// An enum type.
    Enum(Enum),
    /// A service.
    Service(Service),
    /// A group of extension fields with the same extendee.
    ///
    /// The resolver never produces this variant: extension fields stay in
    /// [`CompiledFile::extensions`] and [`Message::extensions`] and are grouped when printed.
    /// It is printed like any other declaration when IR is assembled by hand.
    ExtensionGroup(ExtensionGroup),
}

impl Declaration {
    /// The source path of this declaration, if it has a single one.
    ///
    /// Extension groups are synthesized from several fields and have no path of their own.
    pub fn path(&self) -> Option<&[i32]> {
        match self {
            Declaration::Message(message) => Some(&message.path),
            Declaration::Enum(enu) => Some(&enu.path),
            Declaration::Service(service) => Some(&service.path),
            Declaration::ExtensionGroup(_) => None,
        }
    }
}

/// A message type.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The short name.
    pub name: String,
    /// The fully-qualified name, without a leading dot.
    pub full_name: String,
    /// The fields of the message, including oneof members, in declaration order.
    pub fields: Vec<Field>,
    /// Non-synthetic oneofs, indexed by [`Field::oneof_index`].
    pub oneofs: Vec<Oneof>,
    /// Nested messages and enums. Map entry messages are not included.
    pub nested: Vec<Declaration>,
    /// Extension fields declared within this message.
    pub extensions: Vec<ExtensionField>,
    /// Reserved field numbers and names.
    pub reserved: Vec<Reserved>,
    /// Message options.
    pub options: OptionSet,
    /// The source path of the message.
    pub path: SourcePath,
}

/// A oneof group.
#[derive(Debug, Clone, PartialEq)]
pub struct Oneof {
    /// The name of the oneof.
    pub name: String,
    /// Oneof options.
    pub options: OptionSet,
    /// The source path of the oneof.
    pub path: SourcePath,
}

/// A message field or extension field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// The field name.
    pub name: String,
    /// The field number.
    pub number: i32,
    /// The field label.
    pub label: Label,
    /// The field type.
    pub ty: FieldType,
    /// The index into [`Message::oneofs`] if this field is a member of a oneof.
    pub oneof_index: Option<usize>,
    /// The JSON name, if it was explicitly set to something other than the default.
    pub json_name: Option<String>,
    /// Field options.
    pub options: OptionSet,
    /// The source path of the field.
    pub path: SourcePath,
}

/// The label of a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// A singular field with no label.
    Singular,
    /// A field declared `optional`.
    Optional,
    /// A field declared `required`.
    Required,
    /// A field declared `repeated`.
    Repeated,
}

/// The type of a [`Field`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A scalar type such as `string`.
    Scalar(ScalarType),
    /// A reference to a message type.
    Message(TypeRef),
    /// A reference to an enum type.
    Enum(TypeRef),
    /// A map field.
    Map {
        /// The key type.
        key: ScalarType,
        /// The value type.
        value: Box<FieldType>,
    },
}

/// A scalar field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
}

impl ScalarType {
    /// The keyword used for this type in source files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }
}

/// A linked reference to a named declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// The fully-qualified name of the target, without a leading dot.
    pub full_name: String,
    /// The package of the file declaring the target.
    pub package: String,
}

impl TypeRef {
    /// Creates a new reference.
    pub fn new(full_name: impl Into<String>, package: impl Into<String>) -> Self {
        TypeRef {
            full_name: full_name.into(),
            package: package.into(),
        }
    }
}

/// An extension field, declared in an `extend` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionField {
    /// The message being extended.
    pub extendee: TypeRef,
    /// The extension field itself.
    pub field: Field,
}

/// All extension fields of a scope that share an extendee, printed as one `extend` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionGroup {
    /// The message being extended.
    pub extendee: TypeRef,
    /// The fields, in their original relative order.
    pub fields: Vec<Field>,
}

/// A `reserved` statement in a message or enum.
///
/// All reserved numbers of a declaration are kept in one statement, and all reserved names in
/// another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reserved {
    /// Reserved numbers.
    Ranges {
        /// The reserved ranges, in declaration order.
        ranges: Vec<ReservedRange>,
        /// The source path of the statement.
        path: SourcePath,
    },
    /// Reserved names.
    Names {
        /// The reserved names, in declaration order.
        names: Vec<String>,
        /// The source path of the statement.
        path: SourcePath,
    },
}

impl Reserved {
    /// The source path of this statement.
    pub fn path(&self) -> &[i32] {
        match self {
            Reserved::Ranges { path, .. } | Reserved::Names { path, .. } => path,
        }
    }
}

/// A range of reserved numbers. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedRange {
    /// The first reserved number.
    pub start: i32,
    /// The last reserved number.
    pub end: i32,
}

/// An enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    /// The short name.
    pub name: String,
    /// The fully-qualified name, without a leading dot.
    pub full_name: String,
    /// The values of the enum, in declaration order.
    pub values: Vec<EnumValue>,
    /// Reserved value numbers and names.
    pub reserved: Vec<Reserved>,
    /// Enum options.
    pub options: OptionSet,
    /// The source path of the enum.
    pub path: SourcePath,
}

/// A value of an [`Enum`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// The value name.
    pub name: String,
    /// The value number.
    pub number: i32,
    /// Enum value options.
    pub options: OptionSet,
    /// The source path of the value.
    pub path: SourcePath,
}

/// A service.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    /// The short name.
    pub name: String,
    /// The fully-qualified name, without a leading dot.
    pub full_name: String,
    /// The methods of the service, in declaration order.
    pub methods: Vec<Method>,
    /// Service options.
    pub options: OptionSet,
    /// The source path of the service.
    pub path: SourcePath,
}

/// A service method.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    /// The method name.
    pub name: String,
    /// The request message.
    pub input: TypeRef,
    /// The response message.
    pub output: TypeRef,
    /// Whether the request is streamed.
    pub client_streaming: bool,
    /// Whether the response is streamed.
    pub server_streaming: bool,
    /// Method options.
    pub options: OptionSet,
    /// The source path of the method.
    pub path: SourcePath,
}

/// The recorded source information for one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// The zero-based line and column where the declaration starts, if known.
    pub position: Option<(i32, i32)>,
    /// Comments attached to the declaration.
    pub comments: Comments,
}

/// The comments attached to a declaration.
///
/// Text is stored without comment markers, one paragraph per string, with lines separated by
/// `\n`, as in [`Location`](prost_types::source_code_info::Location).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    /// Paragraphs separated from the declaration by a blank line.
    pub leading_detached: Vec<String>,
    /// The paragraph immediately preceding the declaration.
    pub leading: Option<String>,
    /// The comment immediately following the declaration.
    pub trailing: Option<String>,
}

impl Comments {
    /// Returns true if no comments are attached.
    pub fn is_empty(&self) -> bool {
        self.leading_detached.is_empty() && self.leading.is_none() && self.trailing.is_none()
    }
}

impl CompiledFile {
    /// The unique path of this file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The dotted package name of this file.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Looks up the recorded source information for a declaration path.
    pub fn location(&self, path: &[i32]) -> Option<&Location> {
        self.source_info.get(path)
    }

    /// Looks up the comments attached to a declaration path.
    pub fn comments(&self, path: &[i32]) -> Option<&Comments> {
        self.location(path).map(|location| &location.comments)
    }

    /// Iterates over all top-level messages of this file.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.declarations.iter().filter_map(|decl| match decl {
            Declaration::Message(message) => Some(message),
            _ => None,
        })
    }

    /// Finds a top-level or nested message by its fully-qualified name.
    pub fn get_message(&self, full_name: &str) -> Option<&Message> {
        fn find<'a>(decls: &'a [Declaration], full_name: &str) -> Option<&'a Message> {
            decls.iter().find_map(|decl| match decl {
                Declaration::Message(message) if message.full_name == full_name => Some(message),
                Declaration::Message(message) => find(&message.nested, full_name),
                _ => None,
            })
        }

        find(&self.declarations, full_name)
    }
}
