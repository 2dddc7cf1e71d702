pub mod builder;
pub mod constraint;
pub mod group;
pub mod order;
pub mod property;

pub use builder::QueryBuilder;
pub use constraint::{Constraint, Operator};
pub use group::{ConstraintGroup, ConstraintNode, GroupOp};
pub use order::{Direction, OrderSpec};
pub use property::PropertyRef;
