use crate::driver::Driver;
use crate::error::Error;
use crate::query::property::PropertyRef;
use crate::tree;
use crate::value::Value;

/// The fixed comparison whitelist. Anything else is rejected before a
/// single byte of SQL is assembled, which closes the operator channel
/// as an injection vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    NotLike,
    In,
    NotIn,
    InTree,
}

impl Operator {
    pub fn parse(op: &str) -> Result<Operator, Error> {
        match op {
            "=" => Ok(Operator::Eq),
            "<>" | "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            ">" => Ok(Operator::Gt),
            "<=" => Ok(Operator::Le),
            ">=" => Ok(Operator::Ge),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            "IN" => Ok(Operator::In),
            "NOT IN" => Ok(Operator::NotIn),
            "INTREE" => Ok(Operator::InTree),
            other => Err(Error::InvalidOperator(other.to_string())),
        }
    }

    pub fn is_valid(op: &str) -> bool {
        Operator::parse(op).is_ok()
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::InTree => "INTREE",
        }
    }
}

/// Right-hand side of a comparison, fixed at construction time.
#[derive(Debug, Clone)]
pub(crate) enum Comparand {
    /// Scalar already coerced to the left property's declared type, or a
    /// non-empty array of such scalars for IN / NOT IN.
    Value(Value),
    /// Another resolved property (property-to-property comparison).
    Property(PropertyRef),
    /// Tree membership rooted at `root`; ids resolve at render time by
    /// walking `up_column` → `id_column` on `table`.
    Tree {
        table: String,
        id_column: String,
        up_column: String,
        root: u32,
    },
}

/// One validated comparison. Only ever constructed through the builder,
/// which guarantees the operator/comparand combination is well-formed
/// before the constraint is registered anywhere.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) left: PropertyRef,
    pub(crate) op: Operator,
    pub(crate) right: Comparand,
}

impl Constraint {
    /// Render the SQL fragment. Async because INTREE resolves its
    /// descendant set against the driver here, at execution time.
    pub(crate) async fn render(&self, driver: &dyn Driver) -> Result<String, Error> {
        match &self.right {
            Comparand::Property(right) => Ok(format!(
                "{} {} {}",
                self.left.qualified(),
                self.op.sql(),
                right.qualified()
            )),
            Comparand::Tree {
                table,
                id_column,
                up_column,
                root,
            } => {
                let ids = tree::tree_ids(driver, table, id_column, up_column, *root).await?;
                let list = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                Ok(format!("{} IN ({})", self.left.qualified(), list))
            }
            Comparand::Value(Value::Array(items)) => {
                let mut literals = Vec::with_capacity(items.len());
                for item in items {
                    literals.push(item.sql_literal_with(|s| driver.escape(s))?);
                }
                Ok(format!(
                    "{} {} ({})",
                    self.left.qualified(),
                    self.op.sql(),
                    literals.join(",")
                ))
            }
            Comparand::Value(scalar) => {
                let literal = scalar.sql_literal_with(|s| driver.escape(s))?;
                Ok(format!(
                    "{} {} {}",
                    self.left.qualified(),
                    self.op.sql(),
                    literal
                ))
            }
        }
    }
}
