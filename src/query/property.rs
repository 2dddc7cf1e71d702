use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::Error;
use crate::schema::{ClassInfo, SchemaRegistry};
use crate::value::TypeTag;

/// A property name resolved to its physical `(table, column)` storage.
/// Re-resolved on every use; owned by the constraint or order term that
/// requested it.
#[derive(Debug, Clone)]
pub struct PropertyRef {
    pub table: String,
    pub column: String,
    pub declared_type: TypeTag,
    pub is_link: bool,
    pub link_target: Option<String>,
}

impl PropertyRef {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// The shared metadata property set. Every class carries these columns
/// on its primary table, prefixed `metadata_`; they resolve when a name
/// is not found among the class's own properties.
static METADATA_PROPERTIES: Lazy<BTreeMap<&'static str, TypeTag>> = Lazy::new(|| {
    BTreeMap::from([
        ("creator", TypeTag::String),
        ("created", TypeTag::String),
        ("revisor", TypeTag::String),
        ("revised", TypeTag::String),
        ("revision", TypeTag::Uint),
        ("locker", TypeTag::String),
        ("locked", TypeTag::String),
        ("approver", TypeTag::String),
        ("approved", TypeTag::String),
        ("authors", TypeTag::String),
        ("owner", TypeTag::String),
        ("schedule_start", TypeTag::String),
        ("schedule_end", TypeTag::String),
        ("hidden", TypeTag::Bool),
        ("nav_noentry", TypeTag::Bool),
        ("size", TypeTag::Uint),
        ("published", TypeTag::String),
        ("exported", TypeTag::String),
        ("imported", TypeTag::String),
        ("deleted", TypeTag::Bool),
        ("score", TypeTag::Int),
        ("is_locked", TypeTag::Bool),
        ("is_approved", TypeTag::Bool),
    ])
});

pub(crate) fn metadata_property_names() -> impl Iterator<Item = &'static str> {
    METADATA_PROPERTIES.keys().copied()
}

pub(crate) fn metadata_column(name: &str) -> String {
    format!("metadata_{}", name)
}

/// Resolve `name` against `class`. Accepts, in order: the implicit
/// `guid` / `sitegroup` properties, a direct class property, a metadata
/// property, or (through exactly one link hop) `link.property` against
/// the linked class. Failure leaves no trace in the calling builder.
pub fn resolve(
    schema: &dyn SchemaRegistry,
    class: &ClassInfo,
    name: &str,
) -> Result<PropertyRef, Error> {
    if let Some((head, rest)) = name.split_once('.') {
        return resolve_dotted(schema, class, name, head, rest);
    }
    resolve_simple(class, name).ok_or_else(|| not_found(class, name))
}

fn resolve_simple(class: &ClassInfo, name: &str) -> Option<PropertyRef> {
    match name {
        "guid" => {
            return Some(PropertyRef {
                table: class.table.clone(),
                column: "guid".to_string(),
                declared_type: TypeTag::String,
                is_link: false,
                link_target: None,
            });
        }
        "sitegroup" => {
            return Some(PropertyRef {
                table: class.table.clone(),
                column: "sitegroup".to_string(),
                declared_type: TypeTag::Uint,
                is_link: false,
                link_target: None,
            });
        }
        _ => {}
    }

    if let Some(storage) = class.property(name) {
        return Some(PropertyRef {
            table: storage.table.clone(),
            column: storage.column.clone(),
            declared_type: storage.declared_type,
            is_link: storage.is_link,
            link_target: storage.link_target.clone(),
        });
    }

    METADATA_PROPERTIES.get(name).map(|tag| PropertyRef {
        table: class.table.clone(),
        column: metadata_column(name),
        declared_type: *tag,
        is_link: false,
        link_target: None,
    })
}

fn resolve_dotted(
    schema: &dyn SchemaRegistry,
    class: &ClassInfo,
    full: &str,
    head: &str,
    rest: &str,
) -> Result<PropertyRef, Error> {
    // `metadata.created` is sugar for the metadata fallback
    if head == "metadata" {
        return METADATA_PROPERTIES
            .get(rest)
            .map(|tag| PropertyRef {
                table: class.table.clone(),
                column: metadata_column(rest),
                declared_type: *tag,
                is_link: false,
                link_target: None,
            })
            .ok_or_else(|| not_found(class, full));
    }

    // One link hop: head must be a link property, rest resolves against
    // the linked class. No deeper chains.
    let storage = class.property(head).ok_or_else(|| not_found(class, full))?;
    if !storage.is_link {
        return Err(not_found(class, full));
    }
    let target_name = storage
        .link_target
        .as_deref()
        .ok_or_else(|| not_found(class, full))?;
    let target = schema
        .class(target_name)
        .ok_or_else(|| Error::UnknownClass(target_name.to_string()))?;
    if rest.contains('.') {
        return Err(not_found(class, full));
    }
    resolve_simple(target, rest).ok_or_else(|| not_found(target, rest))
}

fn not_found(class: &ClassInfo, name: &str) -> Error {
    warn!(class = %class.name, property = %name, "property resolution failed");
    Error::PropertyNotFound(format!("{}.{}", class.name, name))
}
