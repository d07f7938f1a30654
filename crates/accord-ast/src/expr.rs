use std::fmt;

use miette::SourceSpan;

use crate::decl::{DeclId, DeclTable};

/// A reference or value expression appearing in a clause operand or in
/// host code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Lt,
    Gt,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }

    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            BinaryOp::Add => lhs.wrapping_add(rhs),
            BinaryOp::Sub => lhs.wrapping_sub(rhs),
            BinaryOp::Mul => lhs.wrapping_mul(rhs),
            BinaryOp::Lt => (lhs < rhs) as i64,
            BinaryOp::Gt => (lhs > rhs) as i64,
            BinaryOp::Eq => (lhs == rhs) as i64,
            BinaryOp::Ne => (lhs != rhs) as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    /// Reference to a declared variable.
    DeclRef(DeclId),
    /// The owning instance of the enclosing method. `implicit` is set when
    /// the parser synthesized it for a bare member name.
    This { implicit: bool },
    /// `base.field` or `base->field`.
    Member {
        base: Box<Expr>,
        field: DeclId,
        arrow: bool,
    },
    /// `base[lower:length]`. Either bound may be omitted in the source.
    Subarray {
        base: Box<Expr>,
        lower: Option<Box<Expr>>,
        length: Option<Box<Expr>>,
    },
    /// `base[index]`
    Subscript { base: Box<Expr>, index: Box<Expr> },
    IntLiteral(i64),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
    Call { callee: String, args: Vec<Expr> },
}

impl Expr {
    pub fn new(kind: ExprKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn decl_ref(id: DeclId, span: SourceSpan) -> Self {
        Self::new(ExprKind::DeclRef(id), span)
    }

    pub fn int(value: i64, span: SourceSpan) -> Self {
        if value < 0 {
            let lit = Self::new(ExprKind::IntLiteral(value.wrapping_neg()), span);
            return Self::new(ExprKind::Neg(Box::new(lit)), span);
        }
        Self::new(ExprKind::IntLiteral(value), span)
    }

    pub fn this(implicit: bool, span: SourceSpan) -> Self {
        Self::new(ExprKind::This { implicit }, span)
    }

    pub fn member(base: Expr, field: DeclId, arrow: bool, span: SourceSpan) -> Self {
        Self::new(
            ExprKind::Member {
                base: Box::new(base),
                field,
                arrow,
            },
            span,
        )
    }

    /// `this->field` written as a bare member name.
    pub fn implicit_member(field: DeclId, span: SourceSpan) -> Self {
        Self::member(Self::this(true, span), field, true, span)
    }

    pub fn subarray(base: Expr, lower: Option<Expr>, length: Option<Expr>, span: SourceSpan) -> Self {
        Self::new(
            ExprKind::Subarray {
                base: Box::new(base),
                lower: lower.map(Box::new),
                length: length.map(Box::new),
            },
            span,
        )
    }

    /// `base[lower:length]` with literal bounds.
    pub fn section(base: Expr, lower: i64, length: i64, span: SourceSpan) -> Self {
        Self::subarray(base, Some(Self::int(lower, span)), Some(Self::int(length, span)), span)
    }

    pub fn subscript(base: Expr, index: Expr, span: SourceSpan) -> Self {
        Self::new(
            ExprKind::Subscript {
                base: Box::new(base),
                index: Box::new(index),
            },
            span,
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, span: SourceSpan) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    }

    pub fn paren(inner: Expr, span: SourceSpan) -> Self {
        Self::new(ExprKind::Paren(Box::new(inner)), span)
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>, span: SourceSpan) -> Self {
        Self::new(
            ExprKind::Call {
                callee: callee.into(),
                args,
            },
            span,
        )
    }

    /// Strips any number of enclosing parentheses.
    pub fn ignore_parens(&self) -> &Expr {
        let mut expr = self;
        while let ExprKind::Paren(inner) = &expr.kind {
            expr = inner;
        }
        expr
    }

    /// Folds the expression to an integer if it is a constant expression.
    pub fn const_int(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::IntLiteral(v) => Some(*v),
            ExprKind::Neg(inner) => inner.const_int().map(i64::wrapping_neg),
            ExprKind::Paren(inner) => inner.const_int(),
            ExprKind::Binary { op, lhs, rhs } => Some(op.apply(lhs.const_int()?, rhs.const_int()?)),
            _ => None,
        }
    }

    /// The declaration this expression ultimately reads, looking through
    /// parentheses, subarrays and subscripts.
    pub fn base_decl(&self) -> Option<DeclId> {
        match &self.ignore_parens().kind {
            ExprKind::DeclRef(id) => Some(*id),
            ExprKind::Subarray { base, .. } | ExprKind::Subscript { base, .. } => base.base_decl(),
            _ => None,
        }
    }

    pub fn display<'a>(&'a self, decls: &'a DeclTable) -> ExprDisplay<'a> {
        ExprDisplay { expr: self, decls }
    }
}

/// Prints an expression back in source form, using `decls` for names.
pub struct ExprDisplay<'a> {
    expr: &'a Expr,
    decls: &'a DeclTable,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decls = self.decls;
        match &self.expr.kind {
            ExprKind::DeclRef(id) => f.write_str(decls.name(*id)),
            ExprKind::This { .. } => f.write_str("this"),
            ExprKind::Member { base, field, arrow } => {
                let sep = if *arrow { "->" } else { "." };
                write!(f, "{}{}{}", base.display(decls), sep, decls.name(*field))
            }
            ExprKind::Subarray { base, lower, length } => {
                write!(f, "{}[", base.display(decls))?;
                if let Some(lower) = lower {
                    write!(f, "{}", lower.display(decls))?;
                }
                f.write_str(":")?;
                if let Some(length) = length {
                    write!(f, "{}", length.display(decls))?;
                }
                f.write_str("]")
            }
            ExprKind::Subscript { base, index } => {
                write!(f, "{}[{}]", base.display(decls), index.display(decls))
            }
            ExprKind::IntLiteral(v) => write!(f, "{v}"),
            ExprKind::Neg(inner) => write!(f, "-{}", inner.display(decls)),
            ExprKind::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", lhs.display(decls), op.symbol(), rhs.display(decls))
            }
            ExprKind::Paren(inner) => write!(f, "({})", inner.display(decls)),
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg.display(decls))?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::Shape;
    use miette::SourceOffset;

    fn dummy_span() -> SourceSpan {
        SourceSpan::new(SourceOffset::from(0), 0)
    }

    #[test]
    fn prints_operands_in_source_form() {
        let mut decls = DeclTable::new();
        let a = decls.variable("a", Shape::Array(Some(10)), dummy_span());
        let s = decls.variable("s", Shape::Record, dummy_span());
        let f = decls.field("f", Shape::Pointer, dummy_span());

        let section = Expr::section(Expr::decl_ref(a, dummy_span()), 2, 3, dummy_span());
        assert_eq!(section.display(&decls).to_string(), "a[2:3]");

        let member = Expr::member(Expr::decl_ref(s, dummy_span()), f, false, dummy_span());
        let open = Expr::subarray(member, Some(Expr::int(0, dummy_span())), None, dummy_span());
        assert_eq!(open.display(&decls).to_string(), "s.f[0:]");

        let this = Expr::section(Expr::this(false, dummy_span()), 0, 1, dummy_span());
        assert_eq!(this.display(&decls).to_string(), "this[0:1]");
    }

    #[test]
    fn folds_negative_literals() {
        assert_eq!(Expr::int(-3, dummy_span()).const_int(), Some(-3));
        let paren = Expr::paren(Expr::int(7, dummy_span()), dummy_span());
        assert_eq!(paren.const_int(), Some(7));
    }
}
