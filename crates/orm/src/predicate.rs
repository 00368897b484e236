use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::value::Param;

/// Comparison operator between a column and a bound value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Comparison {
    /// `=`
    #[default]
    Equals,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `<>`
    NotEquals,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
}

impl Comparison {
    /// SQL spelling of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::NotEquals => "<>",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Comparison {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Self::Equals),
            "IS" => Ok(Self::Is),
            "IS NOT" => Ok(Self::IsNot),
            "<>" => Ok(Self::NotEquals),
            "LIKE" => Ok(Self::Like),
            "NOT LIKE" => Ok(Self::NotLike),
            other => Err(Error::InvalidOperator(other.to_string())),
        }
    }
}

/// Boolean operator joining a predicate to the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Logic {
    /// `AND`
    #[default]
    And,
    /// `NOT AND`
    Nand,
    /// `OR`
    Or,
    /// `NOR`
    Nor,
    /// `XOR`
    Xor,
}

impl Logic {
    /// SQL spelling of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Nand => "NOT AND",
            Self::Or => "OR",
            Self::Nor => "NOR",
            Self::Xor => "XOR",
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Logic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Self::And),
            "NOT AND" => Ok(Self::Nand),
            "OR" => Ok(Self::Or),
            "NOR" => Ok(Self::Nor),
            "XOR" => Ok(Self::Xor),
            other => Err(Error::InvalidOperator(other.to_string())),
        }
    }
}

/// One WHERE-clause term: `` `key` comparison ? ``.
///
/// When compiled as part of a list, the term at position `i > 0` is joined to
/// its predecessor with its own [`Logic`]; the first predicate's logic is not
/// rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    key: String,
    value: Param,
    comparison: Comparison,
    logic: Logic,
}

impl Predicate {
    /// Creates a predicate.
    #[must_use]
    pub fn new(
        key: impl Into<String>, value: impl Into<Param>, comparison: Comparison, logic: Logic,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            comparison,
            logic,
        }
    }

    /// Creates an `=` predicate joined with `AND`.
    #[must_use]
    pub fn create(key: impl Into<String>, value: impl Into<Param>) -> Self {
        Self::new(key, value, Comparison::default(), Logic::default())
    }

    /// Creates a predicate from operator strings such as `"NOT LIKE"` and `"OR"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperator`] for operators outside the supported set.
    pub fn parse(
        key: impl Into<String>, value: impl Into<Param>, comparison: &str, logic: &str,
    ) -> Result<Self, Error> {
        Ok(Self::new(key, value, comparison.parse()?, logic.parse()?))
    }

    /// Column name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bound value.
    #[must_use]
    pub const fn value(&self) -> &Param {
        &self.value
    }

    /// Comparison operator.
    #[must_use]
    pub const fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// Joining operator.
    #[must_use]
    pub const fn logic(&self) -> Logic {
        self.logic
    }

    /// Replace the column name.
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    /// Replace the bound value.
    pub fn set_value(&mut self, value: impl Into<Param>) {
        self.value = value.into();
    }

    /// Replace the comparison operator.
    pub const fn set_comparison(&mut self, comparison: Comparison) {
        self.comparison = comparison;
    }

    /// Replace the joining operator.
    pub const fn set_logic(&mut self, logic: Logic) {
        self.logic = logic;
    }
}

/// Compile predicates into a WHERE clause body and its parameters.
///
/// Returns an empty string when `predicates` is empty.
pub(crate) fn compile_where(predicates: &[Predicate]) -> (String, Vec<Param>) {
    let mut sql = String::new();
    let mut params = Vec::with_capacity(predicates.len());

    for (i, predicate) in predicates.iter().enumerate() {
        sql.push('`');
        sql.push_str(&predicate.key);
        sql.push_str("` ");
        sql.push_str(predicate.comparison.as_sql());
        sql.push_str(" ?");

        if let Some(next) = predicates.get(i + 1) {
            sql.push(' ');
            sql.push_str(next.logic.as_sql());
            sql.push(' ');
        }

        params.push(predicate.value.clone());
    }

    (sql, params)
}
