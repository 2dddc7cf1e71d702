#[cfg(feature = "mysql")]
pub mod mysql;
