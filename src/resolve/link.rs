use std::collections::{BTreeMap, HashMap, HashSet};

use prost_types::{
    field_descriptor_proto::{Label as DescriptorLabel, Type},
    source_code_info, DescriptorProto, EnumDescriptorProto, EnumOptions, EnumValueOptions,
    FieldDescriptorProto, FieldOptions, FileDescriptorProto, FileOptions, MessageOptions,
    MethodOptions, OneofOptions, ServiceDescriptorProto, ServiceOptions, UninterpretedOption,
};

use super::names::{make_name, Symbol, SymbolKind, SymbolTable};
use crate::{
    case::{map_entry_name, to_json_name},
    error::ErrorKind,
    ir::{
        CompiledFile, Comments, Declaration, Enum, EnumValue, ExtensionField, Field, FieldType,
        Import, ImportKind, Label, Location, Message, Method, Oneof, Reserved, ReservedRange,
        ScalarType, Service, SourcePath, Syntax, TypeRef,
    },
    options::{
        builtin_option, typed_options, uninterpreted_value, OptionName, OptionSet, OptionsKind,
    },
    Error,
};

pub(crate) const DEPENDENCY: i32 = 3;
pub(crate) const MESSAGE_TYPE: i32 = 4;
pub(crate) const ENUM_TYPE: i32 = 5;
pub(crate) const SERVICE: i32 = 6;
pub(crate) const EXTENSION: i32 = 7;

pub(crate) const MESSAGE_FIELD: i32 = 2;
pub(crate) const MESSAGE_NESTED_TYPE: i32 = 3;
pub(crate) const MESSAGE_ENUM_TYPE: i32 = 4;
pub(crate) const MESSAGE_EXTENSION: i32 = 6;
pub(crate) const MESSAGE_ONEOF: i32 = 8;
pub(crate) const MESSAGE_RESERVED_RANGE: i32 = 9;
pub(crate) const MESSAGE_RESERVED_NAME: i32 = 10;

pub(crate) const ENUM_VALUE: i32 = 2;
pub(crate) const ENUM_RESERVED_RANGE: i32 = 4;
pub(crate) const ENUM_RESERVED_NAME: i32 = 5;
pub(crate) const SERVICE_METHOD: i32 = 2;

/// Options messages, which all carry options that the compiler could not interpret itself.
trait Options: prost::Message {
    fn uninterpreted(&self) -> &[UninterpretedOption];
}

macro_rules! impl_options {
    ($($ty:ty),*) => {
        $(
            impl Options for $ty {
                fn uninterpreted(&self) -> &[UninterpretedOption] {
                    &self.uninterpreted_option
                }
            }
        )*
    };
}

impl_options!(
    FileOptions,
    MessageOptions,
    FieldOptions,
    OneofOptions,
    EnumOptions,
    EnumValueOptions,
    ServiceOptions,
    MethodOptions
);

/// Lowers an unlinked descriptor into a [`CompiledFile`], resolving every reference it contains.
///
/// Only symbols declared in `visible` files, and packages, are candidates when resolving names.
pub(super) fn link_file(
    file: &FileDescriptorProto,
    symbols: &SymbolTable,
    visible: &HashSet<String>,
) -> Result<CompiledFile, Error> {
    let syntax = match file.syntax() {
        "" | "proto2" => Syntax::Proto2,
        "proto3" => Syntax::Proto3,
        other => Syntax::Other(other.to_owned()),
    };

    let linker = Linker {
        symbols,
        visible,
        file: file.name(),
        proto2: syntax == Syntax::Proto2,
    };

    let package = file.package();

    let imports = file
        .dependency
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let kind = if file.public_dependency.contains(&(index as i32)) {
                ImportKind::Public
            } else if file.weak_dependency.contains(&(index as i32)) {
                ImportKind::Weak
            } else {
                ImportKind::Default
            };
            Import {
                path: path.clone(),
                kind,
                location_path: vec![DEPENDENCY, index as i32],
            }
        })
        .collect();

    let mut declarations = Vec::new();
    for (index, message) in file.message_type.iter().enumerate() {
        let message = linker.message(package, message, vec![MESSAGE_TYPE, index as i32])?;
        declarations.push(Declaration::Message(message));
    }
    for (index, enu) in file.enum_type.iter().enumerate() {
        let enu = linker.enumeration(package, enu, vec![ENUM_TYPE, index as i32])?;
        declarations.push(Declaration::Enum(enu));
    }
    for (index, service) in file.service.iter().enumerate() {
        let service = linker.service(package, service, vec![SERVICE, index as i32])?;
        declarations.push(Declaration::Service(service));
    }

    let extensions = file
        .extension
        .iter()
        .enumerate()
        .map(|(index, field)| linker.extension(package, field, vec![EXTENSION, index as i32]))
        .collect::<Result<_, _>>()?;

    let options = linker.options(
        OptionsKind::File,
        file.options.as_ref(),
        package,
        file.name(),
    )?;

    Ok(CompiledFile {
        path: file.name().to_owned(),
        package: package.to_owned(),
        syntax,
        imports,
        declarations,
        extensions,
        options,
        source_info: source_info(file),
        names: symbols
            .iter()
            .filter(|symbol| linker.is_visible(symbol))
            .map(|symbol| symbol.full_name.clone())
            .collect(),
    })
}

/// Collects the reserved numbers and names of a message or enum into at most two statements.
fn reserved_statements<I>(
    ranges: I,
    names: &[String],
    path: &[i32],
    kinds: (i32, i32),
) -> Vec<Reserved>
where
    I: IntoIterator<Item = ReservedRange>,
{
    let (range_kind, name_kind) = kinds;
    let mut result = Vec::new();

    let ranges: Vec<ReservedRange> = ranges.into_iter().collect();
    if !ranges.is_empty() {
        let mut path = path.to_vec();
        path.push(range_kind);
        result.push(Reserved::Ranges { ranges, path });
    }
    if !names.is_empty() {
        let mut path = path.to_vec();
        path.push(name_kind);
        result.push(Reserved::Names {
            names: names.to_vec(),
            path,
        });
    }

    result
}

fn source_info(file: &FileDescriptorProto) -> BTreeMap<SourcePath, Location> {
    let mut result = BTreeMap::new();
    let locations = match &file.source_code_info {
        Some(info) => &info.location,
        None => return result,
    };

    for location in locations {
        result
            .entry(location.path.clone())
            .or_insert_with(|| lower_location(location));
    }

    result
}

fn lower_location(location: &source_code_info::Location) -> Location {
    let position = match location.span.as_slice() {
        [line, col, ..] => Some((*line, *col)),
        _ => None,
    };

    Location {
        position,
        comments: Comments {
            leading_detached: location.leading_detached_comments.clone(),
            leading: location.leading_comments.clone(),
            trailing: location.trailing_comments.clone(),
        },
    }
}

struct Linker<'a> {
    symbols: &'a SymbolTable,
    visible: &'a HashSet<String>,
    file: &'a str,
    proto2: bool,
}

impl<'a> Linker<'a> {
    fn is_visible(&self, symbol: &Symbol) -> bool {
        match &symbol.file {
            Some(file) => self.visible.contains(file),
            None => true,
        }
    }

    fn resolve(&self, scope: &str, name: &str, referrer: &str) -> Result<&'a Symbol, Error> {
        match self
            .symbols
            .resolve(scope, name, |symbol| self.is_visible(symbol))
        {
            Some(id) => Ok(self.symbols.get(id)),
            None => Err(Error::from_kind(ErrorKind::UnresolvedName {
                file: self.file.to_owned(),
                name: name.to_owned(),
                referrer: referrer.to_owned(),
            })),
        }
    }

    fn resolve_kind(
        &self,
        scope: &str,
        name: &str,
        referrer: &str,
        kind: SymbolKind,
    ) -> Result<TypeRef, Error> {
        let symbol = self.resolve(scope, name, referrer)?;
        if symbol.kind == kind {
            Ok(TypeRef::new(&symbol.full_name, &symbol.package))
        } else {
            Err(self.invalid_reference(name, referrer, kind.describe()))
        }
    }

    fn invalid_reference(&self, name: &str, referrer: &str, expected: &'static str) -> Error {
        Error::from_kind(ErrorKind::InvalidReference {
            file: self.file.to_owned(),
            name: name.to_owned(),
            referrer: referrer.to_owned(),
            expected,
        })
    }

    fn message(
        &self,
        scope: &str,
        message: &DescriptorProto,
        path: SourcePath,
    ) -> Result<Message, Error> {
        let full_name = make_name(scope, message.name());

        let mut map_entries = HashMap::new();
        let mut nested = Vec::new();
        for (index, nested_message) in message.nested_type.iter().enumerate() {
            if is_map_entry(message, nested_message) {
                map_entries.insert(make_name(&full_name, nested_message.name()), nested_message);
                continue;
            }

            let nested_path = child_path(&path, MESSAGE_NESTED_TYPE, index);
            nested.push(Declaration::Message(self.message(
                &full_name,
                nested_message,
                nested_path,
            )?));
        }
        for (index, enu) in message.enum_type.iter().enumerate() {
            let enum_path = child_path(&path, MESSAGE_ENUM_TYPE, index);
            nested.push(Declaration::Enum(self.enumeration(&full_name, enu, enum_path)?));
        }

        // Synthetic oneofs hold a single proto3 `optional` field and are not printed.
        let mut oneofs = Vec::new();
        let mut oneof_indices = HashMap::new();
        for (index, oneof) in message.oneof_decl.iter().enumerate() {
            let mut members = message
                .field
                .iter()
                .filter(|field| field.oneof_index == Some(index as i32))
                .peekable();
            if members.peek().is_some() && members.all(|field| field.proto3_optional()) {
                continue;
            }

            let referrer = make_name(&full_name, oneof.name());
            oneof_indices.insert(index as i32, oneofs.len());
            oneofs.push(Oneof {
                name: oneof.name().to_owned(),
                options: self.options(
                    OptionsKind::Oneof,
                    oneof.options.as_ref(),
                    &full_name,
                    &referrer,
                )?,
                path: child_path(&path, MESSAGE_ONEOF, index),
            });
        }

        let fields = message
            .field
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let mut lowered = self.field(
                    &full_name,
                    field,
                    child_path(&path, MESSAGE_FIELD, index),
                    &map_entries,
                )?;
                lowered.oneof_index = field
                    .oneof_index
                    .and_then(|index| oneof_indices.get(&index).copied());
                if lowered.oneof_index.is_some() && !field.proto3_optional() {
                    lowered.label = Label::Singular;
                }
                Ok(lowered)
            })
            .collect::<Result<_, Error>>()?;

        let extensions = message
            .extension
            .iter()
            .enumerate()
            .map(|(index, field)| {
                self.extension(&full_name, field, child_path(&path, MESSAGE_EXTENSION, index))
            })
            .collect::<Result<_, _>>()?;

        let options = self.options(
            OptionsKind::Message,
            message.options.as_ref(),
            &full_name,
            &full_name,
        )?;

        // Message ranges have an exclusive end.
        let reserved = reserved_statements(
            message.reserved_range.iter().map(|range| ReservedRange {
                start: range.start(),
                end: range.end() - 1,
            }),
            &message.reserved_name,
            &path,
            (MESSAGE_RESERVED_RANGE, MESSAGE_RESERVED_NAME),
        );

        Ok(Message {
            name: message.name().to_owned(),
            full_name,
            fields,
            oneofs,
            nested,
            extensions,
            reserved,
            options,
            path,
        })
    }

    fn field(
        &self,
        scope: &str,
        field: &FieldDescriptorProto,
        path: SourcePath,
        map_entries: &HashMap<String, &DescriptorProto>,
    ) -> Result<Field, Error> {
        let referrer = make_name(scope, field.name());

        let label = match field.label() {
            DescriptorLabel::Repeated => Label::Repeated,
            DescriptorLabel::Required => Label::Required,
            DescriptorLabel::Optional if field.proto3_optional() || self.proto2 => Label::Optional,
            DescriptorLabel::Optional => Label::Singular,
        };

        let ty = match self.field_type(scope, field, &referrer)? {
            FieldType::Message(message) if label == Label::Repeated => {
                match map_entries.get(&message.full_name) {
                    Some(entry) => self.map_type(&message.full_name, entry, &referrer)?,
                    None => FieldType::Message(message),
                }
            }
            ty => ty,
        };

        let json_name = field
            .json_name
            .as_ref()
            .filter(|json_name| **json_name != to_json_name(field.name()))
            .cloned();

        let options = self.options(OptionsKind::Field, field.options.as_ref(), scope, &referrer)?;

        Ok(Field {
            name: field.name().to_owned(),
            number: field.number(),
            label,
            ty,
            oneof_index: None,
            json_name,
            options,
            path,
        })
    }

    fn field_type(
        &self,
        scope: &str,
        field: &FieldDescriptorProto,
        referrer: &str,
    ) -> Result<FieldType, Error> {
        if let Some(type_name) = &field.type_name {
            let symbol = self.resolve(scope, type_name, referrer)?;
            let ty = TypeRef::new(&symbol.full_name, &symbol.package);
            match symbol.kind {
                SymbolKind::Message => Ok(FieldType::Message(ty)),
                SymbolKind::Enum => Ok(FieldType::Enum(ty)),
                _ => Err(self.invalid_reference(type_name, referrer, "a message or enum type")),
            }
        } else {
            match scalar_type(field.r#type()) {
                Some(scalar) => Ok(FieldType::Scalar(scalar)),
                None => Err(self.invalid_reference(field.name(), referrer, "a scalar field")),
            }
        }
    }

    fn map_type(
        &self,
        entry_name: &str,
        entry: &DescriptorProto,
        referrer: &str,
    ) -> Result<FieldType, Error> {
        let key_field = entry.field.iter().find(|field| field.number() == 1);
        let value_field = entry.field.iter().find(|field| field.number() == 2);

        match (key_field, value_field) {
            (Some(key_field), Some(value_field)) => {
                let key = match self.field_type(entry_name, key_field, referrer)? {
                    FieldType::Scalar(key) => key,
                    _ => {
                        return Err(self.invalid_reference(
                            key_field.type_name(),
                            referrer,
                            "a scalar map key type",
                        ))
                    }
                };
                let value = self.field_type(entry_name, value_field, referrer)?;
                Ok(FieldType::Map {
                    key,
                    value: Box::new(value),
                })
            }
            _ => Err(self.invalid_reference(entry_name, referrer, "a map entry message")),
        }
    }

    fn extension(
        &self,
        scope: &str,
        field: &FieldDescriptorProto,
        path: SourcePath,
    ) -> Result<ExtensionField, Error> {
        let referrer = make_name(scope, field.name());
        let extendee = self.resolve_kind(scope, field.extendee(), &referrer, SymbolKind::Message)?;
        let field = self.field(scope, field, path, &HashMap::new())?;

        Ok(ExtensionField { extendee, field })
    }

    fn enumeration(
        &self,
        scope: &str,
        enu: &EnumDescriptorProto,
        path: SourcePath,
    ) -> Result<Enum, Error> {
        let full_name = make_name(scope, enu.name());

        let values = enu
            .value
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let referrer = make_name(&full_name, value.name());
                Ok(EnumValue {
                    name: value.name().to_owned(),
                    number: value.number(),
                    options: self.options(
                        OptionsKind::EnumValue,
                        value.options.as_ref(),
                        &full_name,
                        &referrer,
                    )?,
                    path: child_path(&path, ENUM_VALUE, index),
                })
            })
            .collect::<Result<_, Error>>()?;

        let options = self.options(OptionsKind::Enum, enu.options.as_ref(), &full_name, &full_name)?;

        let reserved = reserved_statements(
            enu.reserved_range.iter().map(|range| ReservedRange {
                start: range.start(),
                end: range.end(),
            }),
            &enu.reserved_name,
            &path,
            (ENUM_RESERVED_RANGE, ENUM_RESERVED_NAME),
        );

        Ok(Enum {
            name: enu.name().to_owned(),
            full_name,
            values,
            reserved,
            options,
            path,
        })
    }

    fn service(
        &self,
        scope: &str,
        service: &ServiceDescriptorProto,
        path: SourcePath,
    ) -> Result<Service, Error> {
        let full_name = make_name(scope, service.name());

        let methods = service
            .method
            .iter()
            .enumerate()
            .map(|(index, method)| {
                let referrer = make_name(&full_name, method.name());
                let input =
                    self.resolve_kind(&full_name, method.input_type(), &referrer, SymbolKind::Message)?;
                let output =
                    self.resolve_kind(&full_name, method.output_type(), &referrer, SymbolKind::Message)?;

                Ok(Method {
                    name: method.name().to_owned(),
                    input,
                    output,
                    client_streaming: method.client_streaming(),
                    server_streaming: method.server_streaming(),
                    options: self.options(
                        OptionsKind::Method,
                        method.options.as_ref(),
                        &full_name,
                        &referrer,
                    )?,
                    path: child_path(&path, SERVICE_METHOD, index),
                })
            })
            .collect::<Result<_, Error>>()?;

        let options = self.options(
            OptionsKind::Service,
            service.options.as_ref(),
            &full_name,
            &full_name,
        )?;

        Ok(Service {
            name: service.name().to_owned(),
            full_name,
            methods,
            options,
            path,
        })
    }

    fn options<O>(
        &self,
        kind: OptionsKind,
        options: Option<&O>,
        scope: &str,
        referrer: &str,
    ) -> Result<OptionSet, Error>
    where
        O: Options,
    {
        let mut set = OptionSet::new();
        let options = match options {
            Some(options) => options,
            None => return Ok(set),
        };

        for option in options.uninterpreted() {
            let (first, rest) = match option.name.split_first() {
                Some(split) => split,
                None => continue,
            };
            // Stored on the field descriptor itself.
            if kind == OptionsKind::Field
                && !first.is_extension
                && matches!(first.name_part.as_str(), "json_name" | "default")
            {
                continue;
            }

            let name = if first.is_extension {
                OptionName::Extension(self.resolve_kind(
                    scope,
                    &first.name_part,
                    referrer,
                    SymbolKind::Extension,
                )?)
            } else {
                builtin_option(kind, &first.name_part).ok_or_else(|| {
                    Error::from_kind(ErrorKind::UnresolvedName {
                        file: self.file.to_owned(),
                        name: first.name_part.clone(),
                        referrer: referrer.to_owned(),
                    })
                })?
            };

            let path = rest
                .iter()
                .map(|part| {
                    if part.is_extension {
                        let ty =
                            self.resolve_kind(scope, &part.name_part, referrer, SymbolKind::Extension)?;
                        Ok(format!("[{}]", ty.full_name))
                    } else {
                        Ok(part.name_part.clone())
                    }
                })
                .collect::<Result<Vec<_>, Error>>()?;

            let value = uninterpreted_value(option).map_err(|reason| {
                Error::from_kind(ErrorKind::InvalidOptionValue {
                    file: self.file.to_owned(),
                    option: name.full_name().to_owned(),
                    reason,
                })
            })?;

            set.insert(name, &path, value);
        }

        let typed = typed_options(kind, options).map_err(|reason| {
            Error::from_kind(ErrorKind::InvalidOptionValue {
                file: self.file.to_owned(),
                option: kind.message_name().to_owned(),
                reason,
            })
        })?;
        for (name, value) in typed {
            if !set.entries().iter().any(|entry| entry.name == name) {
                set.insert(name, &[], value);
            }
        }

        Ok(set)
    }
}

fn is_map_entry(message: &DescriptorProto, nested: &DescriptorProto) -> bool {
    if nested
        .options
        .as_ref()
        .map_or(false, |options| options.map_entry())
    {
        return true;
    }

    let has_field = |number: i32, name: &str| {
        nested
            .field
            .iter()
            .any(|field| field.number() == number && field.name() == name)
    };

    nested.field.len() == 2
        && has_field(1, "key")
        && has_field(2, "value")
        && message.field.iter().any(|field| {
            field.label() == DescriptorLabel::Repeated && map_entry_name(field.name()) == nested.name()
        })
}

fn child_path(parent: &[i32], field: i32, index: usize) -> SourcePath {
    let mut path = Vec::with_capacity(parent.len() + 2);
    path.extend_from_slice(parent);
    path.push(field);
    path.push(index as i32);
    path
}

fn scalar_type(ty: Type) -> Option<ScalarType> {
    match ty {
        Type::Double => Some(ScalarType::Double),
        Type::Float => Some(ScalarType::Float),
        Type::Int64 => Some(ScalarType::Int64),
        Type::Uint64 => Some(ScalarType::Uint64),
        Type::Int32 => Some(ScalarType::Int32),
        Type::Fixed64 => Some(ScalarType::Fixed64),
        Type::Fixed32 => Some(ScalarType::Fixed32),
        Type::Bool => Some(ScalarType::Bool),
        Type::String => Some(ScalarType::String),
        Type::Bytes => Some(ScalarType::Bytes),
        Type::Uint32 => Some(ScalarType::Uint32),
        Type::Sfixed32 => Some(ScalarType::Sfixed32),
        Type::Sfixed64 => Some(ScalarType::Sfixed64),
        Type::Sint32 => Some(ScalarType::Sint32),
        Type::Sint64 => Some(ScalarType::Sint64),
        Type::Group | Type::Message | Type::Enum => None,
    }
}
