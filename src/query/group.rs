use crate::error::Error;
use crate::query::constraint::Constraint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOp {
    And,
    Or,
}

impl GroupOp {
    pub fn parse(op: &str) -> Result<GroupOp, Error> {
        if op.eq_ignore_ascii_case("AND") {
            Ok(GroupOp::And)
        } else if op.eq_ignore_ascii_case("OR") {
            Ok(GroupOp::Or)
        } else {
            Err(Error::InvalidOperator(op.to_string()))
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            GroupOp::And => "AND",
            GroupOp::Or => "OR",
        }
    }
}

/// One node of the constraint tree the builder accumulates.
#[derive(Debug, Clone)]
pub enum ConstraintNode {
    Leaf(Constraint),
    Group(ConstraintGroup),
}

/// A parenthesized AND/OR combination, nestable to arbitrary depth.
/// Open groups live on the builder's group stack; closing a group moves
/// it into its parent (or the top level) and it is immutable from then on.
#[derive(Debug, Clone)]
pub struct ConstraintGroup {
    pub op: GroupOp,
    pub members: Vec<ConstraintNode>,
}

impl ConstraintGroup {
    pub fn new(op: GroupOp) -> Self {
        Self {
            op,
            members: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
