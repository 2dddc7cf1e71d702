use std::collections::BTreeMap;

use crate::value::TypeTag;

/// Physical storage of one schema property.
#[derive(Debug, Clone)]
pub struct PropertyStorage {
    pub table: String,
    pub column: String,
    pub declared_type: TypeTag,
    pub is_link: bool,
    pub link_target: Option<String>,
}

impl PropertyStorage {
    pub fn new(table: &str, column: &str, declared_type: TypeTag) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            declared_type,
            is_link: false,
            link_target: None,
        }
    }

    pub fn link(table: &str, column: &str, target_class: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            declared_type: TypeTag::Uint,
            is_link: true,
            link_target: Some(target_class.to_string()),
        }
    }
}

/// Storage metadata for one registered class.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    /// Primary physical table. Always the first entry of `tables()`.
    pub table: String,
    /// Additional physical tables the class spans, if any.
    pub extra_tables: Vec<String>,
    /// Name of the primary (id) property.
    pub primary: String,
    /// Designated parent-linkage property, if the class forms a tree.
    pub parent: Option<String>,
    /// Designated up-linkage property, if any.
    pub up: Option<String>,
    /// Whether content is split across a `<table>_i` instance table
    /// keyed by `(sid, lang)`.
    pub multilang: bool,
    /// Administrative classes only root tenants may query.
    pub protected: bool,
    pub properties: BTreeMap<String, PropertyStorage>,
}

impl ClassInfo {
    pub fn new(name: &str, table: &str, primary: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            extra_tables: Vec::new(),
            primary: primary.to_string(),
            parent: None,
            up: None,
            multilang: false,
            protected: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, storage: PropertyStorage) -> Self {
        self.properties.insert(name.to_string(), storage);
        self
    }

    pub fn with_parent(mut self, property: &str) -> Self {
        self.parent = Some(property.to_string());
        self
    }

    pub fn with_up(mut self, property: &str) -> Self {
        self.up = Some(property.to_string());
        self
    }

    pub fn multilang(mut self) -> Self {
        self.multilang = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.table.as_str()).chain(self.extra_tables.iter().map(String::as_str))
    }

    /// The `_i` instance table holding per-language content.
    pub fn lang_table(&self) -> String {
        format!("{}_i", self.table)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyStorage> {
        self.properties.get(name)
    }

    /// Column of the primary (id) property on the primary table.
    pub fn primary_column(&self) -> &str {
        self.properties
            .get(&self.primary)
            .map(|p| p.column.as_str())
            .unwrap_or("id")
    }
}

/// Resolves a class name to its storage metadata. Read-only after
/// initialization; shared across builders.
pub trait SchemaRegistry: Send + Sync {
    fn class(&self, name: &str) -> Option<&ClassInfo>;
}

/// In-memory registry, populated in code. The smallest thing that
/// satisfies `SchemaRegistry` for embedders and tests.
#[derive(Debug, Default)]
pub struct StaticSchema {
    classes: BTreeMap<String, ClassInfo>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, class: ClassInfo) -> Self {
        self.classes.insert(class.name.clone(), class);
        self
    }
}

impl SchemaRegistry for StaticSchema {
    fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }
}
