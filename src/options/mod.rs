//! Option values, parsed once into a small tagged tree so that printing never needs reflection.

mod text_format;

use prost_reflect::{DescriptorPool, DynamicMessage, Kind, ReflectMessage, Value};
use prost_types::UninterpretedOption;

use crate::{fmt::quote, ir::TypeRef};

/// Field number of `uninterpreted_option` in every `google.protobuf.*Options` message.
const UNINTERPRETED_OPTION: u32 = 999;

/// The options set on a single declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    entries: Vec<OptionEntry>,
}

/// A single option, such as `deprecated = true` or `(foo.bar) = { baz: 1 }`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionEntry {
    /// The option being set.
    pub name: OptionName,
    /// The value of the option.
    pub value: OptionValue,
}

/// The name of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionName {
    /// A field of the options message itself, such as `deprecated`.
    Builtin {
        /// The field name.
        name: String,
        /// The field number within the options message.
        number: u32,
        /// The fully-qualified field name, for example `google.protobuf.FieldOptions.deprecated`.
        full_name: String,
    },
    /// A custom option, declared as an extension of the options message.
    Extension(TypeRef),
}

/// The value of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// A scalar in its textual form: identifiers and numbers as written, strings quoted and
    /// escaped.
    Scalar(String),
    /// A message, as an ordered list of fields.
    Message(Vec<(String, OptionValue)>),
    /// A list of values.
    Array(Vec<OptionValue>),
}

/// The kind of declaration an [`OptionSet`] belongs to, which determines the options message
/// used to look up built-in options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OptionsKind {
    File,
    Message,
    Field,
    Oneof,
    Enum,
    EnumValue,
    Service,
    Method,
}

impl OptionsKind {
    pub fn message_name(self) -> &'static str {
        match self {
            OptionsKind::File => "google.protobuf.FileOptions",
            OptionsKind::Message => "google.protobuf.MessageOptions",
            OptionsKind::Field => "google.protobuf.FieldOptions",
            OptionsKind::Oneof => "google.protobuf.OneofOptions",
            OptionsKind::Enum => "google.protobuf.EnumOptions",
            OptionsKind::EnumValue => "google.protobuf.EnumValueOptions",
            OptionsKind::Service => "google.protobuf.ServiceOptions",
            OptionsKind::Method => "google.protobuf.MethodOptions",
        }
    }
}

impl OptionSet {
    /// Creates an empty option set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns true if no options are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The options, in the order they were set.
    pub fn entries(&self) -> &[OptionEntry] {
        &self.entries
    }

    /// The options sorted by their fully-qualified name.
    pub fn sorted(&self) -> Vec<&OptionEntry> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|l, r| l.name.full_name().cmp(r.name.full_name()));
        entries
    }

    /// Sets an option.
    ///
    /// If `path` is non-empty, the value is stored under that chain of message fields within the
    /// option, merging with any fields already set. Setting an option that is already set turns
    /// its value into an array.
    pub fn insert(&mut self, name: OptionName, path: &[String], value: OptionValue) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) if path.is_empty() => push_repeated(&mut entry.value, value),
            Some(entry) => {
                if let OptionValue::Message(fields) = &mut entry.value {
                    insert_path(fields, path, value);
                } else {
                    let mut fields = Vec::new();
                    insert_path(&mut fields, path, value);
                    push_repeated(&mut entry.value, OptionValue::Message(fields));
                }
            }
            None => {
                let value = if path.is_empty() {
                    value
                } else {
                    let mut fields = Vec::new();
                    insert_path(&mut fields, path, value);
                    OptionValue::Message(fields)
                };
                self.entries.push(OptionEntry { name, value });
            }
        }
    }
}

impl FromIterator<OptionEntry> for OptionSet {
    fn from_iter<T: IntoIterator<Item = OptionEntry>>(iter: T) -> Self {
        OptionSet {
            entries: iter.into_iter().collect(),
        }
    }
}

impl OptionName {
    /// The fully-qualified name of the option, used to order options.
    pub fn full_name(&self) -> &str {
        match self {
            OptionName::Builtin { full_name, .. } => full_name,
            OptionName::Extension(ty) => &ty.full_name,
        }
    }
}

fn insert_path(fields: &mut Vec<(String, OptionValue)>, path: &[String], value: OptionValue) {
    let (key, rest) = match path.split_first() {
        Some(split) => split,
        None => return,
    };

    if rest.is_empty() {
        fields.push((key.clone(), value));
        return;
    }

    let position = fields
        .iter()
        .position(|(name, value)| name == key && matches!(value, OptionValue::Message(_)));
    let index = match position {
        Some(index) => index,
        None => {
            fields.push((key.clone(), OptionValue::Message(Vec::new())));
            fields.len() - 1
        }
    };

    if let OptionValue::Message(nested) = &mut fields[index].1 {
        insert_path(nested, rest, value);
    }
}

fn push_repeated(existing: &mut OptionValue, value: OptionValue) {
    match existing {
        OptionValue::Array(values) => match value {
            OptionValue::Array(more) => values.extend(more),
            value => values.push(value),
        },
        _ => {
            let first = std::mem::replace(existing, OptionValue::Array(Vec::new()));
            if let OptionValue::Array(values) = existing {
                values.push(first);
                values.push(value);
            }
        }
    }
}

/// Looks up a built-in option by name in the options message for `kind`.
pub(crate) fn builtin_option(kind: OptionsKind, name: &str) -> Option<OptionName> {
    let pool = DescriptorPool::global();
    let message = pool.get_message_by_name(kind.message_name())?;
    let field = message.get_field_by_name(name)?;
    if field.number() == UNINTERPRETED_OPTION {
        return None;
    }

    Some(OptionName::Builtin {
        name: field.name().to_owned(),
        number: field.number(),
        full_name: field.full_name().to_owned(),
    })
}

/// Converts the value of an uninterpreted option to its textual form.
pub(crate) fn uninterpreted_value(option: &UninterpretedOption) -> Result<OptionValue, String> {
    if let Some(ident) = &option.identifier_value {
        Ok(OptionValue::Scalar(ident.clone()))
    } else if let Some(value) = option.positive_int_value {
        Ok(OptionValue::Scalar(value.to_string()))
    } else if let Some(value) = option.negative_int_value {
        Ok(OptionValue::Scalar(value.to_string()))
    } else if let Some(value) = option.double_value {
        Ok(OptionValue::Scalar(fmt_float(value)))
    } else if let Some(value) = &option.string_value {
        Ok(OptionValue::Scalar(quote(value)))
    } else if let Some(text) = &option.aggregate_value {
        text_format::parse(text).map(OptionValue::Message)
    } else {
        Err("option has no value".to_owned())
    }
}

/// Reads the built-in options set as typed fields on a descriptor options message.
///
/// The message is re-decoded as a [`DynamicMessage`] so every set field can be enumerated
/// without knowing the concrete options type.
pub(crate) fn typed_options<M>(
    kind: OptionsKind,
    options: &M,
) -> Result<Vec<(OptionName, OptionValue)>, String>
where
    M: prost::Message,
{
    let pool = DescriptorPool::global();
    let descriptor = match pool.get_message_by_name(kind.message_name()) {
        Some(descriptor) => descriptor,
        None => return Ok(Vec::new()),
    };

    let message = DynamicMessage::decode(descriptor.clone(), options.encode_to_vec().as_slice())
        .map_err(|err| err.to_string())?;

    let mut result = Vec::new();
    for field in descriptor.fields() {
        if field.number() == UNINTERPRETED_OPTION || !message.has_field(&field) {
            continue;
        }

        let value = reflect_value(&message.get_field(&field), &field.kind())
            .map_err(|err| format!("{}: {}", field.name(), err))?;
        result.push((
            OptionName::Builtin {
                name: field.name().to_owned(),
                number: field.number(),
                full_name: field.full_name().to_owned(),
            },
            value,
        ));
    }

    Ok(result)
}

fn reflect_value(value: &Value, kind: &Kind) -> Result<OptionValue, String> {
    Ok(match value {
        Value::Bool(value) => OptionValue::Scalar(value.to_string()),
        Value::I32(value) => OptionValue::Scalar(value.to_string()),
        Value::I64(value) => OptionValue::Scalar(value.to_string()),
        Value::U32(value) => OptionValue::Scalar(value.to_string()),
        Value::U64(value) => OptionValue::Scalar(value.to_string()),
        Value::F32(value) => OptionValue::Scalar(fmt_float(*value)),
        Value::F64(value) => OptionValue::Scalar(fmt_float(*value)),
        Value::String(value) => OptionValue::Scalar(quote(value.as_bytes())),
        Value::Bytes(value) => OptionValue::Scalar(quote(value)),
        Value::EnumNumber(number) => OptionValue::Scalar(match kind {
            Kind::Enum(enum_ty) => match enum_ty.get_value(*number) {
                Some(value) => value.name().to_owned(),
                None => number.to_string(),
            },
            _ => number.to_string(),
        }),
        Value::Message(message) => OptionValue::Message(reflect_message(message)?),
        Value::List(values) => OptionValue::Array(
            values
                .iter()
                .map(|value| reflect_value(value, kind))
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(_) => return Err("map values cannot be written as option text".to_owned()),
    })
}

fn reflect_message(message: &DynamicMessage) -> Result<Vec<(String, OptionValue)>, String> {
    message
        .descriptor()
        .fields()
        .filter(|field| message.has_field(field))
        .map(|field| {
            let value = reflect_value(&message.get_field(&field), &field.kind())?;
            Ok((field.name().to_owned(), value))
        })
        .collect()
}

pub(crate) fn fmt_float<F>(value: F) -> String
where
    F: Into<f64> + std::fmt::Debug + Copy,
{
    let wide: f64 = value.into();
    if wide.is_nan() {
        "nan".to_owned()
    } else if wide.is_infinite() {
        if wide > 0.0 {
            "inf".to_owned()
        } else {
            "-inf".to_owned()
        }
    } else {
        format!("{:?}", value)
    }
}
