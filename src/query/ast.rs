//! Query Expression Tree
//!
//! Immutable predicate trees built through free functions and builder methods
//! on [`ColumnRef`], then compiled once per query.
//!
//! ```ignore
//! use bayun_crud::query::ast::{col, field};
//!
//! let filter = field::<Person>("lastName").eq("Lars")
//!     .and(field::<PhoneNumber>("planetCode").eq(12))
//!     .and(col("nickname").is_null().not());
//! ```

use crate::catalog::entity::Entity;
use crate::query::executor::result::DataValue;

/// A column, optionally qualified with the table it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// `None` resolves against the query's root table
    pub table: Option<String>,
    pub column: String,
}

/// Unqualified column of the query's root table
pub fn col(name: &str) -> ColumnRef {
    ColumnRef { table: None, column: name.to_string() }
}

/// Column of the table backing `E`
pub fn field<E: Entity>(name: &str) -> ColumnRef {
    ColumnRef {
        table: Some(E::table_name().to_string()),
        column: name.to_string(),
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Operator that gives the same result with the operands swapped
    pub fn flipped(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ColumnRef),
    Value(DataValue),
    List(Vec<DataValue>),
}

impl From<ColumnRef> for Operand {
    fn from(column: ColumnRef) -> Self {
        Operand::Column(column)
    }
}

macro_rules! operand_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(value: $t) -> Self {
                    Operand::Value(value.into())
                }
            }
        )*
    };
}

operand_from_value!(DataValue, i64, i32, f64, bool, &str, String, Vec<u8>, uuid::Uuid);

impl From<Vec<DataValue>> for Operand {
    fn from(values: Vec<DataValue>) -> Self {
        Operand::List(values)
    }
}

/// Where a pattern must occur in the column value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// A text pattern test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub text: String,
    pub negated: bool,
    pub case_insensitive: bool,
}

impl PatternMatch {
    fn new(kind: PatternKind, text: impl Into<String>) -> Self {
        PatternMatch { kind, text: text.into(), negated: false, case_insensitive: false }
    }

    pub fn contains(text: impl Into<String>) -> Self {
        Self::new(PatternKind::Contains, text)
    }

    pub fn starts_with(text: impl Into<String>) -> Self {
        Self::new(PatternKind::StartsWith, text)
    }

    pub fn ends_with(text: impl Into<String>) -> Self {
        Self::new(PatternKind::EndsWith, text)
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// A predicate node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare { left: Operand, op: CompareOp, right: Operand },
    In { column: ColumnRef, values: Vec<DataValue>, negated: bool },
    Pattern { column: ColumnRef, pattern: PatternMatch },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn compare(left: impl Into<Operand>, op: CompareOp, right: impl Into<Operand>) -> Expr {
        Expr::Compare { left: left.into(), op, right: right.into() }
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// Conjunction of every expression; `None` when empty
pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(Expr::and)
}

/// Disjunction of every expression; `None` when empty
pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(Expr::or)
}

impl ColumnRef {
    pub fn eq(self, other: impl Into<Operand>) -> Expr {
        Expr::compare(self, CompareOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Operand>) -> Expr {
        Expr::compare(self, CompareOp::Ne, other)
    }

    pub fn lt(self, other: impl Into<Operand>) -> Expr {
        Expr::compare(self, CompareOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Operand>) -> Expr {
        Expr::compare(self, CompareOp::Le, other)
    }

    pub fn gt(self, other: impl Into<Operand>) -> Expr {
        Expr::compare(self, CompareOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Operand>) -> Expr {
        Expr::compare(self, CompareOp::Ge, other)
    }

    pub fn is_null(self) -> Expr {
        self.eq(DataValue::Null)
    }

    pub fn is_not_null(self) -> Expr {
        self.ne(DataValue::Null)
    }

    pub fn is_in<V: Into<DataValue>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::In {
            column: self,
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<V: Into<DataValue>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::In {
            column: self,
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn matches(self, pattern: PatternMatch) -> Expr {
        Expr::Pattern { column: self, pattern }
    }

    pub fn contains(self, text: &str) -> Expr {
        self.matches(PatternMatch::contains(text))
    }

    pub fn starts_with(self, text: &str) -> Expr {
        self.matches(PatternMatch::starts_with(text))
    }

    pub fn ends_with(self, text: &str) -> Expr {
        self.matches(PatternMatch::ends_with(text))
    }

    pub fn not_contains(self, text: &str) -> Expr {
        self.matches(PatternMatch::contains(text).negate())
    }

    pub fn not_starts_with(self, text: &str) -> Expr {
        self.matches(PatternMatch::starts_with(text).negate())
    }

    pub fn not_ends_with(self, text: &str) -> Expr {
        self.matches(PatternMatch::ends_with(text).negate())
    }
}
