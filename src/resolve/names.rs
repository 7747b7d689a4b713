use std::collections::{hash_map, HashMap};

use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto};

use crate::{error::ErrorKind, Error};

/// A handle to a [`Symbol`] in a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SymbolId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolKind {
    Package,
    Message,
    Enum,
    Service,
    Extension,
}

#[derive(Debug, Clone)]
pub(crate) struct Symbol {
    pub full_name: String,
    pub kind: SymbolKind,
    /// The file declaring this symbol. Packages may span many files and have none.
    pub file: Option<String>,
    pub package: String,
}

/// Every named declaration known to a resolution session, keyed by fully-qualified name.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    symbols: Vec<Symbol>,
    names: HashMap<String, SymbolId>,
}

impl SymbolKind {
    pub fn describe(self) -> &'static str {
        match self {
            SymbolKind::Package => "a package",
            SymbolKind::Message => "a message type",
            SymbolKind::Enum => "an enum type",
            SymbolKind::Service => "a service",
            SymbolKind::Extension => "an extension",
        }
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn lookup(&self, full_name: &str) -> Option<&Symbol> {
        self.names.get(full_name).map(|&id| self.get(id))
    }

    fn add(
        &mut self,
        full_name: String,
        kind: SymbolKind,
        file: Option<&str>,
        package: &str,
    ) -> Result<SymbolId, Error> {
        match self.names.entry(full_name) {
            hash_map::Entry::Vacant(entry) => {
                let id = SymbolId(self.symbols.len());
                tracing::trace!(name = entry.key().as_str(), ?kind, "registered symbol");
                self.symbols.push(Symbol {
                    full_name: entry.key().clone(),
                    kind,
                    file: file.map(ToOwned::to_owned),
                    package: package.to_owned(),
                });
                entry.insert(id);
                Ok(id)
            }
            hash_map::Entry::Occupied(entry) => {
                let existing = &self.symbols[entry.get().0];
                match (kind, existing.kind) {
                    (SymbolKind::Package, SymbolKind::Package) => Ok(*entry.get()),
                    _ => Err(Error::from_kind(ErrorKind::DuplicateName {
                        name: entry.key().clone(),
                        first_file: existing.file.clone().unwrap_or_default(),
                        second_file: file.unwrap_or_default().to_owned(),
                    })),
                }
            }
        }
    }

    /// Registers the package and every declaration of a file.
    pub fn add_file(&mut self, file: &FileDescriptorProto) -> Result<(), Error> {
        let name = file.name();
        let package = file.package();

        if !package.is_empty() {
            let mut prefix = String::new();
            for part in package.split('.') {
                prefix = make_name(&prefix, part);
                self.add(prefix.clone(), SymbolKind::Package, None, package)?;
            }
        }

        let mut files = FileSymbols {
            table: self,
            file: name,
            package,
        };

        for message in &file.message_type {
            files.add_message(package, message)?;
        }
        for enu in &file.enum_type {
            files.add_enum(package, enu)?;
        }
        for service in &file.service {
            files.add(make_name(package, service.name()), SymbolKind::Service)?;
        }
        for extension in &file.extension {
            files.add(make_name(package, extension.name()), SymbolKind::Extension)?;
        }

        Ok(())
    }

    /// Resolves a possibly-relative `name` referenced from within `scope`.
    ///
    /// Absolute names, starting with a dot, are looked up directly. Otherwise the first
    /// component of the name is searched for in `scope` and then each enclosing scope in turn.
    /// Once it is found, the rest of the name must be found within it.
    ///
    /// Symbols for which `visible` returns false are ignored.
    pub fn resolve<F>(&self, scope: &str, name: &str, visible: F) -> Option<SymbolId>
    where
        F: Fn(&Symbol) -> bool,
    {
        let get = |full_name: &str| {
            let id = *self.names.get(full_name)?;
            if visible(self.get(id)) {
                Some(id)
            } else {
                None
            }
        };

        if let Some(absolute_name) = name.strip_prefix('.') {
            return get(absolute_name);
        }

        let (first, rest) = match name.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };

        let mut scope = scope;
        loop {
            let candidate = make_name(scope, first);
            if let Some(id) = get(&candidate) {
                return match rest {
                    None => Some(id),
                    Some(rest) => get(&make_name(&candidate, rest)),
                };
            }

            if scope.is_empty() {
                return None;
            }
            scope = match scope.rsplit_once('.') {
                Some((parent, _)) => parent,
                None => "",
            };
        }
    }
}

struct FileSymbols<'a> {
    table: &'a mut SymbolTable,
    file: &'a str,
    package: &'a str,
}

impl<'a> FileSymbols<'a> {
    fn add(&mut self, full_name: String, kind: SymbolKind) -> Result<SymbolId, Error> {
        self.table
            .add(full_name, kind, Some(self.file), self.package)
    }

    fn add_message(&mut self, scope: &str, message: &DescriptorProto) -> Result<(), Error> {
        let full_name = make_name(scope, message.name());
        self.add(full_name.clone(), SymbolKind::Message)?;

        for nested in &message.nested_type {
            self.add_message(&full_name, nested)?;
        }
        for enu in &message.enum_type {
            self.add_enum(&full_name, enu)?;
        }
        for extension in &message.extension {
            self.add(make_name(&full_name, extension.name()), SymbolKind::Extension)?;
        }

        Ok(())
    }

    fn add_enum(&mut self, scope: &str, enu: &EnumDescriptorProto) -> Result<(), Error> {
        self.add(make_name(scope, enu.name()), SymbolKind::Enum)?;
        Ok(())
    }
}

pub(crate) fn make_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", namespace, name)
    }
}
