use crate::error::Error;
use crate::query::property::PropertyRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(dir: &str) -> Result<Direction, Error> {
        if dir.eq_ignore_ascii_case("ASC") {
            Ok(Direction::Asc)
        } else if dir.eq_ignore_ascii_case("DESC") {
            Ok(Direction::Desc)
        } else {
            Err(Error::InvalidOperator(dir.to_string()))
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One ORDER BY term. Terms apply in the order added; this is a
/// multi-key sort, so that order is semantically significant.
#[derive(Debug, Clone)]
pub struct OrderSpec {
    pub property: PropertyRef,
    pub direction: Direction,
}

impl OrderSpec {
    pub fn sql(&self) -> String {
        format!("{} {}", self.property.qualified(), self.direction.sql())
    }
}
