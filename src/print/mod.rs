//! Canonical printing of compiled files back to source text.

mod names;
mod writer;

use self::{
    names::{shorten, Site},
    writer::{comment_lines, push_indent, Writer},
};
use crate::{
    error::ErrorKind,
    ir::{
        Comments, CompiledFile, Declaration, Enum, EnumValue, ExtensionField, ExtensionGroup,
        Field, FieldType, ImportKind, Label, Message, Method, Oneof, Reserved, ReservedRange,
        Service, Syntax,
    },
    options::{OptionEntry, OptionName, OptionSet, OptionValue},
    Error,
};

const PACKAGE: i32 = 2;
const SYNTAX: i32 = 12;
const FILE_EXTENSION: i32 = 7;
const MESSAGE_EXTENSION: i32 = 6;

/// The largest field number.
const MAX_FIELD_NUMBER: i32 = 536_870_911;

static NO_COMMENTS: Comments = Comments {
    leading_detached: Vec::new(),
    leading: None,
    trailing: None,
};

/// Prints a compiled file as canonical source text.
///
/// The output depends only on `file`: imports are sorted, options are sorted by name, extension
/// fields are grouped by the message they extend, and messages, enums and services appear in
/// the order they were written. Comments recorded in the file's source info are reattached to
/// the declarations they belong to.
///
/// # Errors
///
/// Fails if the file does not use `proto3` syntax, or if an option value cannot be written as
/// text. No output is produced in either case.
pub fn print_file(file: &CompiledFile) -> Result<String, Error> {
    let syntax = match &file.syntax {
        Syntax::Proto3 => None,
        Syntax::Proto2 => Some("proto2"),
        Syntax::Other(other) => Some(other.as_str()),
    };
    if let Some(syntax) = syntax {
        return Err(Error::from_kind(ErrorKind::UnsupportedSyntax {
            file: file.path.clone(),
            syntax: syntax.to_owned(),
        }));
    }

    let _span = tracing::trace_span!("print_file", path = file.path.as_str()).entered();

    let mut printer = Printer {
        file,
        w: Writer::new(),
    };
    printer.print()?;
    Ok(printer.w.finish())
}

/// Groups extension fields by the message they extend.
///
/// Groups appear in the order their extendee is first seen, and each group keeps the relative
/// order of its fields.
pub fn group_extensions(extensions: &[ExtensionField]) -> Vec<ExtensionGroup> {
    let mut groups: Vec<ExtensionGroup> = Vec::new();
    for extension in extensions {
        match groups
            .iter_mut()
            .find(|group| group.extendee.full_name == extension.extendee.full_name)
        {
            Some(group) => group.fields.push(extension.field.clone()),
            None => groups.push(ExtensionGroup {
                extendee: extension.extendee.clone(),
                fields: vec![extension.field.clone()],
            }),
        }
    }
    groups
}

struct Printer<'a> {
    file: &'a CompiledFile,
    w: Writer,
}

/// A member of a message body, in the order it is printed.
enum Member<'a> {
    Field(&'a Field),
    Oneof(&'a Oneof, Vec<&'a Field>),
    Nested(&'a Declaration),
    Reserved(&'a Reserved),
}

enum EnumMember<'a> {
    Value(&'a EnumValue),
    Reserved(&'a Reserved),
}

impl<'a> Printer<'a> {
    fn comments(&self, path: &[i32]) -> &'a Comments {
        self.file.comments(path).unwrap_or(&NO_COMMENTS)
    }

    fn position(&self, path: &[i32]) -> Option<(i32, i32)> {
        self.file
            .location(path)
            .and_then(|location| location.position)
    }

    /// The position of a reserved statement, falling back to its first entry.
    fn reserved_position(&self, reserved: &Reserved) -> Option<(i32, i32)> {
        self.position(reserved.path()).or_else(|| {
            let mut first = reserved.path().to_vec();
            first.push(0);
            self.position(&first)
        })
    }

    fn top_level(&self) -> Site<'a> {
        Site::top_level(&self.file.package, &self.file.names)
    }

    fn within(&self, full_name: &'a str) -> Site<'a> {
        Site::within(&self.file.package, full_name, &self.file.names)
    }

    fn print(&mut self) -> Result<(), Error> {
        let file = self.file;

        self.statement(self.comments(&[SYNTAX]), "syntax = \"proto3\";");
        if !file.package.is_empty() {
            let package = format!("package {};", file.package);
            self.statement(self.comments(&[PACKAGE]), &package);
        }
        self.w.gap();

        let mut imports: Vec<_> = file.imports.iter().collect();
        imports.sort_by(|l, r| l.path.cmp(&r.path));
        for import in imports {
            let modifier = match import.kind {
                ImportKind::Default => "",
                ImportKind::Public => "public ",
                ImportKind::Weak => "weak ",
            };
            let text = format!("import {}\"{}\";", modifier, import.path);
            self.statement(self.comments(&import.location_path), &text);
        }
        self.w.gap();

        let mut options = file.options.entries().iter().collect::<Vec<_>>();
        options.sort_by(|l, r| file_option_order(l).cmp(&file_option_order(r)));
        self.option_statements(&options, self.top_level())?;
        self.w.gap();

        self.extension_groups(&file.extensions, &[FILE_EXTENSION], self.top_level())?;

        let mut declarations: Vec<&Declaration> = file.declarations.iter().collect();
        declarations.sort_by_key(|decl| {
            let position = decl.path().and_then(|path| self.position(path));
            (position.is_none(), position)
        });
        for decl in declarations {
            self.declaration(decl, self.top_level())?;
        }

        Ok(())
    }

    fn declaration(&mut self, decl: &'a Declaration, site: Site<'a>) -> Result<(), Error> {
        match decl {
            Declaration::Message(message) => self.message(message),
            Declaration::Enum(enu) => self.enumeration(enu),
            Declaration::Service(service) => self.service(service),
            Declaration::ExtensionGroup(group) => self.extension_group(group, &NO_COMMENTS, site),
        }
    }

    fn leading(&mut self, comments: &Comments) {
        for paragraph in &comments.leading_detached {
            self.w.comment(paragraph);
            self.w.gap();
        }
        if let Some(leading) = &comments.leading {
            self.w.comment(leading);
        }
    }

    /// Writes a single-line statement with its comments.
    fn statement(&mut self, comments: &Comments, text: &str) {
        self.leading(comments);
        match comments.trailing.as_deref() {
            Some(trailing) => match comment_lines(trailing).as_slice() {
                [line] => self.w.line(&format!("{} //{}", text, line)),
                _ => {
                    self.w.line(text);
                    self.w.comment(trailing);
                    self.w.gap();
                }
            },
            None => self.w.line(text),
        }
    }

    /// Writes a field-like statement, with its options in brackets if it has any.
    fn bracketed(&mut self, comments: &Comments, head: &str, options: &[String]) {
        if options.is_empty() {
            let text = format!("{};", head);
            self.statement(comments, &text);
            return;
        }

        self.leading(comments);
        self.w.line(&format!("{} [", head));
        self.w.indented(|w| {
            for (index, option) in options.iter().enumerate() {
                if index + 1 < options.len() {
                    w.line(&format!("{},", option));
                } else {
                    w.line(option);
                }
            }
        });
        self.w.line("];");

        if let Some(trailing) = &comments.trailing {
            self.w.comment(trailing);
            self.w.gap();
        }
    }

    /// Writes a block declaration. `body` is only called if `empty` is false.
    fn block<F>(
        &mut self,
        comments: &Comments,
        header: &str,
        empty: bool,
        body: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        self.w.gap();
        self.leading(comments);

        match comments.trailing.as_deref() {
            None if empty => {
                self.w.line(&format!("{} {{}}", header));
                self.w.gap();
                return Ok(());
            }
            None => self.w.open(&format!("{} {{", header)),
            Some(trailing) => match comment_lines(trailing).as_slice() {
                [line] => self.w.open(&format!("{} {{ //{}", header, line)),
                _ => {
                    self.w.open(&format!("{} {{", header));
                    self.w.comment(trailing);
                    self.w.gap();
                }
            },
        }

        if !empty {
            body(self)?;
        }

        self.w.close("}");
        self.w.gap();
        Ok(())
    }

    fn message(&mut self, message: &'a Message) -> Result<(), Error> {
        let site = self.within(&message.full_name);

        let mut members: Vec<(Option<(i32, i32)>, Member<'a>)> = Vec::new();
        for field in &message.fields {
            if field.oneof_index.is_none() {
                members.push((self.position(&field.path), Member::Field(field)));
            }
        }
        for (index, oneof) in message.oneofs.iter().enumerate() {
            let fields: Vec<&Field> = message
                .fields
                .iter()
                .filter(|field| field.oneof_index == Some(index))
                .collect();
            let position = self.position(&oneof.path).or_else(|| {
                fields
                    .iter()
                    .filter_map(|field| self.position(&field.path))
                    .min()
            });
            members.push((position, Member::Oneof(oneof, fields)));
        }
        for nested in &message.nested {
            let position = nested.path().and_then(|path| self.position(path));
            members.push((position, Member::Nested(nested)));
        }
        for reserved in &message.reserved {
            members.push((self.reserved_position(reserved), Member::Reserved(reserved)));
        }
        members.sort_by_key(|(position, _)| (position.is_none(), *position));

        let empty =
            message.options.is_empty() && message.extensions.is_empty() && members.is_empty();
        let header = format!("message {}", message.name);
        self.block(self.comments(&message.path), &header, empty, |this| {
            this.option_statements(&message.options.sorted(), site)?;
            this.w.gap();

            let mut extend_path = message.path.clone();
            extend_path.push(MESSAGE_EXTENSION);
            this.extension_groups(&message.extensions, &extend_path, site)?;

            for (_, member) in members {
                match member {
                    Member::Field(field) => this.field(field, site)?,
                    Member::Oneof(oneof, fields) => this.oneof(oneof, &fields, site)?,
                    Member::Nested(nested) => this.declaration(nested, site)?,
                    Member::Reserved(reserved) => this.reserved(reserved, MAX_FIELD_NUMBER),
                }
            }
            Ok(())
        })
    }

    fn oneof(
        &mut self,
        oneof: &'a Oneof,
        fields: &[&'a Field],
        site: Site<'a>,
    ) -> Result<(), Error> {
        let header = format!("oneof {}", oneof.name);
        let empty = oneof.options.is_empty() && fields.is_empty();
        self.block(self.comments(&oneof.path), &header, empty, |this| {
            this.option_statements(&oneof.options.sorted(), site)?;
            this.w.gap();
            for &field in fields {
                this.field(field, site)?;
            }
            Ok(())
        })
    }

    fn field(&mut self, field: &Field, site: Site<'a>) -> Result<(), Error> {
        let label = match (&field.ty, field.label) {
            (FieldType::Map { .. }, _) | (_, Label::Singular) => "",
            (_, Label::Optional) => "optional ",
            (_, Label::Required) => "required ",
            (_, Label::Repeated) => "repeated ",
        };
        let head = format!(
            "{}{} {} = {}",
            label,
            field_type(&field.ty, site),
            field.name,
            field.number
        );

        let mut options = Vec::new();
        if let Some(json_name) = &field.json_name {
            options.push(format!("json_name = {}", crate::fmt::quote(json_name.as_bytes())));
        }
        options.extend(self.option_list(&field.options, site)?);

        self.bracketed(self.comments(&field.path), &head, &options);
        Ok(())
    }

    fn extension_groups(
        &mut self,
        extensions: &'a [ExtensionField],
        extend_path: &[i32],
        site: Site<'a>,
    ) -> Result<(), Error> {
        for (index, group) in group_extensions(extensions).iter().enumerate() {
            // Every extend block shares one location, so its comments go on the first group.
            let comments = if index == 0 {
                self.comments(extend_path)
            } else {
                &NO_COMMENTS
            };
            self.extension_group(group, comments, site)?;
        }
        Ok(())
    }

    fn extension_group(
        &mut self,
        group: &ExtensionGroup,
        comments: &Comments,
        site: Site<'a>,
    ) -> Result<(), Error> {
        let header = format!("extend {}", shorten(&group.extendee, site));
        self.block(comments, &header, group.fields.is_empty(), |this| {
            for field in &group.fields {
                this.field(field, site)?;
            }
            Ok(())
        })
    }

    fn enumeration(&mut self, enu: &'a Enum) -> Result<(), Error> {
        let site = self.within(&enu.full_name);
        let header = format!("enum {}", enu.name);

        let mut members: Vec<(Option<(i32, i32)>, EnumMember<'a>)> = Vec::new();
        for value in &enu.values {
            members.push((self.position(&value.path), EnumMember::Value(value)));
        }
        for reserved in &enu.reserved {
            members.push((self.reserved_position(reserved), EnumMember::Reserved(reserved)));
        }
        members.sort_by_key(|(position, _)| (position.is_none(), *position));

        let empty = enu.options.is_empty() && members.is_empty();
        self.block(self.comments(&enu.path), &header, empty, |this| {
            this.option_statements(&enu.options.sorted(), site)?;
            this.w.gap();
            for (_, member) in members {
                match member {
                    EnumMember::Value(value) => this.enum_value(value, site)?,
                    EnumMember::Reserved(reserved) => this.reserved(reserved, i32::MAX),
                }
            }
            Ok(())
        })
    }

    /// Writes a `reserved` statement. A range ending at `max` is written as `to max`.
    fn reserved(&mut self, reserved: &Reserved, max: i32) {
        let entries: Vec<String> = match reserved {
            Reserved::Ranges { ranges, .. } => ranges
                .iter()
                .map(|&ReservedRange { start, end }| {
                    if start == end {
                        start.to_string()
                    } else if end == max {
                        format!("{} to max", start)
                    } else {
                        format!("{} to {}", start, end)
                    }
                })
                .collect(),
            Reserved::Names { names, .. } => names
                .iter()
                .map(|name| crate::fmt::quote(name.as_bytes()))
                .collect(),
        };

        let text = format!("reserved {};", entries.join(", "));
        self.statement(self.comments(reserved.path()), &text);
    }

    fn enum_value(&mut self, value: &EnumValue, site: Site<'a>) -> Result<(), Error> {
        let head = format!("{} = {}", value.name, value.number);
        let options = self.option_list(&value.options, site)?;
        self.bracketed(self.comments(&value.path), &head, &options);
        Ok(())
    }

    fn service(&mut self, service: &'a Service) -> Result<(), Error> {
        let site = self.top_level();
        let header = format!("service {}", service.name);
        let empty = service.options.is_empty() && service.methods.is_empty();
        self.block(self.comments(&service.path), &header, empty, |this| {
            this.option_statements(&service.options.sorted(), site)?;
            this.w.gap();
            for method in &service.methods {
                this.method(method, site)?;
            }
            Ok(())
        })
    }

    fn method(&mut self, method: &'a Method, site: Site<'a>) -> Result<(), Error> {
        let stream = |streaming: bool| if streaming { "stream " } else { "" };
        let head = format!(
            "rpc {}({}{}) returns ({}{})",
            method.name,
            stream(method.client_streaming),
            shorten(&method.input, site),
            stream(method.server_streaming),
            shorten(&method.output, site),
        );

        let comments = self.comments(&method.path);
        if method.options.is_empty() {
            self.statement(comments, &format!("{};", head));
            Ok(())
        } else {
            self.block(comments, &head, false, |this| {
                this.option_statements(&method.options.sorted(), site)
            })
        }
    }

    /// Writes `option name = value;` statements. Repeated options are written once per value.
    fn option_statements(
        &mut self,
        options: &[&OptionEntry],
        site: Site<'a>,
    ) -> Result<(), Error> {
        for entry in options {
            for assignment in self.assignments(entry, site)? {
                self.w.line(&format!("option {};", assignment));
            }
        }
        Ok(())
    }

    /// Formats options for a bracketed list, sorted by name.
    fn option_list(&self, options: &OptionSet, site: Site<'a>) -> Result<Vec<String>, Error> {
        let mut result = Vec::new();
        for entry in options.sorted() {
            result.extend(self.assignments(entry, site)?);
        }
        Ok(result)
    }

    fn assignments(&self, entry: &OptionEntry, site: Site<'a>) -> Result<Vec<String>, Error> {
        let name = match &entry.name {
            OptionName::Builtin { name, .. } => name.clone(),
            OptionName::Extension(ty) => format!("({})", shorten(ty, site)),
        };

        let values: Vec<&OptionValue> = match &entry.value {
            OptionValue::Array(values) if !values.is_empty() => values.iter().collect(),
            value => vec![value],
        };

        values
            .into_iter()
            .map(|value| {
                let mut text = format!("{} = ", name);
                write_value(&mut text, value, 0).map_err(|reason| {
                    Error::from_kind(ErrorKind::InvalidOptionValue {
                        file: self.file.path.clone(),
                        option: entry.name.full_name().to_owned(),
                        reason,
                    })
                })?;
                Ok(text)
            })
            .collect()
    }
}

fn field_type(ty: &FieldType, site: Site<'_>) -> String {
    match ty {
        FieldType::Scalar(scalar) => scalar.as_str().to_owned(),
        FieldType::Message(target) | FieldType::Enum(target) => shorten(target, site),
        FieldType::Map { key, value } => {
            format!("map<{}, {}>", key.as_str(), field_type(value, site))
        }
    }
}

/// Built-in file options come first in field number order, then custom options by name.
fn file_option_order(entry: &OptionEntry) -> (u8, u32, &str) {
    match &entry.name {
        OptionName::Builtin { number, .. } => (0, *number, ""),
        OptionName::Extension(ty) => (1, 0, &ty.full_name),
    }
}

/// Writes an option value in text format. Nested lines are indented relative to `depth`.
fn write_value(out: &mut String, value: &OptionValue, depth: usize) -> Result<(), String> {
    match value {
        OptionValue::Scalar(text) => out.push_str(text),
        OptionValue::Message(fields) if fields.is_empty() => out.push_str("{}"),
        OptionValue::Message(fields) => {
            out.push_str("{\n");
            for (key, value) in fields {
                push_indent(out, depth + 1);
                out.push_str(key);
                out.push_str(": ");
                write_value(out, value, depth + 1)?;
                out.push('\n');
            }
            push_indent(out, depth);
            out.push('}');
        }
        OptionValue::Array(values) => {
            out.push('[');
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                if let OptionValue::Array(_) = value {
                    return Err("nested lists cannot be written as option text".to_owned());
                }
                write_value(out, value, depth)?;
            }
            out.push(']');
        }
    }
    Ok(())
}
