use std::collections::BTreeSet;

use crate::{
    ast::{BinOp, UnaryOp},
    stack::ensure_sufficient_stack,
};

/// Abstract Syntax Tree node representing a parsed expression.
///
/// Trees are immutable once built and are shared read-only between every
/// evaluation of the same source string.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal integer
    ///
    /// # Example
    /// ```text
    /// 42
    /// ```
    Integer(i64),

    /// Literal floating point number
    ///
    /// # Example
    /// ```text
    /// 42.5
    /// ```
    Number(f64),

    /// String literal without embedded spans
    ///
    /// # Example
    /// ```text
    /// 'hello'
    /// ```
    String(String),

    /// Boolean literal
    Boolean(bool),

    // References
    /// Variable reference, resolved through the scope chain
    ///
    /// # Example
    /// ```text
    /// counter
    /// ```
    Variable(String),

    // Operations
    /// Unary operation
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Conditional expression; only the taken branch is evaluated
    ///
    /// # Example
    /// ```text
    /// is_open ? 'Open' : 'Closed'
    /// ```
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// Try expression: evaluates `fallback` when `expr` fails
    ///
    /// # Example
    /// ```text
    /// toInteger(input) !: 0
    /// ```
    Try { expr: Box<Expr>, fallback: Box<Expr> },

    /// Function call
    ///
    /// # Examples
    /// ```text
    /// len(title)
    /// getIntegerValue('counter', 0)
    /// ```
    FunctionCall { name: String, args: Vec<Expr> },

    /// Method call, dispatched with the receiver as the first argument
    ///
    /// # Examples
    /// ```text
    /// price.toString()
    /// items.getString(0)
    /// ```
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },

    /// Array or dict index access
    ///
    /// # Examples
    /// ```text
    /// items[0]
    /// settings['theme']
    /// ```
    Index { object: Box<Expr>, index: Box<Expr> },

    /// String template: literal text interleaved with evaluated spans
    ///
    /// # Example
    /// ```text
    /// 'Total: @{count} items'
    /// ```
    Template(Vec<TemplatePart>),
}

/// One piece of a string template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

impl Expr {
    /// Names of every variable referenced anywhere in the tree, including
    /// branches that a given evaluation may skip.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        ensure_sufficient_stack(|| self.collect_node_variables(names));
    }

    fn collect_node_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Integer(_) | Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) => {}
            Expr::Variable(name) => {
                names.insert(name.clone());
            }
            Expr::Unary { operand, .. } => operand.collect_variables(names),
            Expr::BinaryOp { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_variables(names);
                then_branch.collect_variables(names);
                else_branch.collect_variables(names);
            }
            Expr::Try { expr, fallback } => {
                expr.collect_variables(names);
                fallback.collect_variables(names);
            }
            Expr::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
            Expr::MethodCall { object, args, .. } => {
                object.collect_variables(names);
                for arg in args {
                    arg.collect_variables(names);
                }
            }
            Expr::Index { object, index } => {
                object.collect_variables(names);
                index.collect_variables(names);
            }
            Expr::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Expr(expr) = part {
                        expr.collect_variables(names);
                    }
                }
            }
        }
    }
}
