use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    /// Class name absent from the schema registry.
    UnknownClass(String),
    /// Property name unresolvable against the class (or metadata) schema.
    PropertyNotFound(String),
    /// Comparison operator outside the fixed whitelist.
    InvalidOperator(String),
    /// Wrong value shape for the operator (empty IN array, non-integer
    /// INTREE root, INTREE on a property that is not parent/up).
    ValueShape(String),
    /// Value cannot be coerced to the property's declared type.
    Conversion(String),
    /// `end_group` without an open group, or execution with groups open.
    UnbalancedGrouping,
    /// Non-root caller querying a protected class.
    AccessDenied(String),
    /// SQL execution failure reported by the driver.
    Driver(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownClass(class) => write!(f, "Unknown class: {}", class),
            Error::PropertyNotFound(name) => write!(f, "Property not found: {}", name),
            Error::InvalidOperator(op) => write!(f, "Invalid operator: {}", op),
            Error::ValueShape(err) => write!(f, "Invalid value shape: {}", err),
            Error::Conversion(err) => write!(f, "Conversion error: {}", err),
            Error::UnbalancedGrouping => write!(f, "Unbalanced constraint grouping"),
            Error::AccessDenied(class) => write!(f, "Access denied to class: {}", class),
            Error::Driver(err) => write!(f, "Driver error: {}", err),
        }
    }
}

impl std::error::Error for Error {}
