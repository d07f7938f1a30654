//! Canonical identities for clause operands.
//!
//! An identity names storage, not syntax: `a`, `(a)`, `a[0:2]` and a
//! redeclaration of `a` all resolve to the same key. Subarray bounds are
//! kept next to the identity as a [`DataRange`] so bound-sensitive checks
//! can still run on entries that share a key.

use std::fmt;

use accord_ast::{DeclId, DeclKind, DeclTable, Expr, ExprKind, Shape};
use miette::SourceSpan;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableIdentity {
    /// A declared variable, by canonical declaration.
    Plain(DeclId),
    /// A field of a named instance, e.g. `s.f`.
    Member {
        owner: Box<VariableIdentity>,
        field: DeclId,
    },
    /// A field of the owning instance, written `f` or `this->f`.
    ImplicitMember(DeclId),
    /// The owning instance itself, only ever written `this[0:1]`.
    WholeImplicitOwner,
    Invalid,
}

impl VariableIdentity {
    pub fn is_valid(&self) -> bool {
        !matches!(self, VariableIdentity::Invalid)
    }

    /// Whether writes through this identity hit const storage. Members are
    /// const when the field or any owner is.
    pub fn is_const(&self, decls: &DeclTable) -> bool {
        let decl_const = |id: DeclId| decls.get(id).is_some_and(|d| d.is_const);
        match self {
            VariableIdentity::Plain(id) | VariableIdentity::ImplicitMember(id) => decl_const(*id),
            VariableIdentity::Member { owner, field } => decl_const(*field) || owner.is_const(decls),
            VariableIdentity::WholeImplicitOwner | VariableIdentity::Invalid => false,
        }
    }

    pub fn shape(&self, decls: &DeclTable) -> Option<Shape> {
        match self {
            VariableIdentity::Plain(id)
            | VariableIdentity::ImplicitMember(id)
            | VariableIdentity::Member { field: id, .. } => decls.get(*id).map(|d| d.shape),
            VariableIdentity::WholeImplicitOwner => Some(Shape::Record),
            VariableIdentity::Invalid => None,
        }
    }

    pub fn display<'a>(&'a self, decls: &'a DeclTable) -> IdentityDisplay<'a> {
        IdentityDisplay { identity: self, decls }
    }
}

pub struct IdentityDisplay<'a> {
    identity: &'a VariableIdentity,
    decls: &'a DeclTable,
}

impl fmt::Display for IdentityDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity {
            VariableIdentity::Plain(id) => f.write_str(self.decls.name(*id)),
            VariableIdentity::Member { owner, field } => {
                write!(f, "{}.{}", owner.display(self.decls), self.decls.name(*field))
            }
            VariableIdentity::ImplicitMember(field) => write!(f, "this->{}", self.decls.name(*field)),
            VariableIdentity::WholeImplicitOwner => f.write_str("this"),
            VariableIdentity::Invalid => f.write_str("<invalid>"),
        }
    }
}

/// Portion of an identity's storage a clause operand covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataRange {
    Whole,
    /// `[start:len]` with constant bounds.
    Bounded { start: i64, len: i64 },
    /// Bounds only known at run time, or more than one subarray layer.
    Unbounded,
}

impl DataRange {
    /// End of a bounded range, one past the last element.
    pub fn end(self) -> Option<i64> {
        match self {
            DataRange::Bounded { start, len } => Some(start.saturating_add(len)),
            _ => None,
        }
    }
}

impl fmt::Display for DataRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataRange::Whole => f.write_str("whole"),
            DataRange::Bounded { start, len } => write!(f, "[{start}:{len}]"),
            DataRange::Unbounded => f.write_str("[?:?]"),
        }
    }
}

/// Which member expressions an operand position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberPolicy {
    None,
    /// Only fields of the owning instance.
    OnOwnerOnly,
    OnAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityRules {
    pub members: MemberPolicy,
    pub allow_subarray: bool,
}

impl IdentityRules {
    pub const DATA_OPERAND: IdentityRules = IdentityRules {
        members: MemberPolicy::OnAny,
        allow_subarray: true,
    };

    pub const SCALAR_OPERAND: IdentityRules = IdentityRules {
        members: MemberPolicy::None,
        allow_subarray: false,
    };

    /// Fields reached through the owning instance, as compute bodies
    /// reference them.
    pub const OWNER_MEMBER: IdentityRules = IdentityRules {
        members: MemberPolicy::OnOwnerOnly,
        allow_subarray: false,
    };
}

/// Why an operand does not resolve. Carries the span of the offending
/// subexpression; the caller turns it into a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    MissingBounds(SourceSpan),
    NegativeLength(SourceSpan),
    SubarrayNotPermitted(SourceSpan),
    MemberNotPermitted(SourceSpan),
    NestedMember(SourceSpan),
    UnexpectedOperand(SourceSpan),
    OwnerNotUnitRange(SourceSpan),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOperand {
    pub identity: VariableIdentity,
    pub range: DataRange,
}

struct Layer {
    bounds: Option<(i64, i64)>,
}

/// Resolves `expr` to the identity of the storage it names.
pub fn resolve(expr: &Expr, decls: &DeclTable, rules: IdentityRules) -> Result<ResolvedOperand, IdentityError> {
    let mut layers = Vec::new();
    let mut base = expr.ignore_parens();
    loop {
        match &base.kind {
            ExprKind::Subarray { base: inner, lower, length } => {
                let (Some(lower), Some(length)) = (lower, length) else {
                    return Err(IdentityError::MissingBounds(base.span));
                };
                if !rules.allow_subarray {
                    return Err(IdentityError::SubarrayNotPermitted(base.span));
                }
                if length.const_int().is_some_and(|len| len < 0) {
                    return Err(IdentityError::NegativeLength(length.span));
                }
                let bounds = lower.const_int().zip(length.const_int());
                layers.push(Layer { bounds });
                base = inner.ignore_parens();
            }
            // A subscript is a subarray written without a colon.
            ExprKind::Subscript { .. } => return Err(IdentityError::MissingBounds(base.span)),
            _ => break,
        }
    }

    let range = match layers.as_slice() {
        [] => DataRange::Whole,
        [Layer { bounds: Some((start, len)) }] => DataRange::Bounded { start: *start, len: *len },
        _ => DataRange::Unbounded,
    };

    match &base.kind {
        ExprKind::This { .. } => match layers.as_slice() {
            [Layer { bounds: Some((0, 1)) }] => Ok(ResolvedOperand {
                identity: VariableIdentity::WholeImplicitOwner,
                range: DataRange::Whole,
            }),
            _ => Err(IdentityError::OwnerNotUnitRange(base.span)),
        },
        ExprKind::Member { base: owner, field, .. } => {
            if rules.members == MemberPolicy::None {
                return Err(IdentityError::MemberNotPermitted(base.span));
            }
            let owner = owner.ignore_parens();
            let field = decls.canonical(*field);
            let identity = match &owner.kind {
                ExprKind::This { .. } => VariableIdentity::ImplicitMember(field),
                ExprKind::DeclRef(id) if is_variable(*id, decls) => {
                    if rules.members == MemberPolicy::OnOwnerOnly {
                        return Err(IdentityError::MemberNotPermitted(base.span));
                    }
                    VariableIdentity::Member {
                        owner: Box::new(VariableIdentity::Plain(decls.canonical(*id))),
                        field,
                    }
                }
                ExprKind::Member { .. } => return Err(IdentityError::NestedMember(owner.span)),
                _ => return Err(IdentityError::UnexpectedOperand(owner.span)),
            };
            Ok(ResolvedOperand { identity, range })
        }
        ExprKind::DeclRef(id) if is_variable(*id, decls) => Ok(ResolvedOperand {
            identity: VariableIdentity::Plain(decls.canonical(*id)),
            range,
        }),
        _ => Err(IdentityError::UnexpectedOperand(base.span)),
    }
}

fn is_variable(id: DeclId, decls: &DeclTable) -> bool {
    decls.get(id).is_some_and(|d| d.kind == DeclKind::Variable)
}

/// Identity of `expr`, or [`VariableIdentity::Invalid`] if it does not
/// resolve.
pub fn identity_of(expr: &Expr, decls: &DeclTable, rules: IdentityRules) -> VariableIdentity {
    resolve(expr, decls, rules).map_or(VariableIdentity::Invalid, |r| r.identity)
}

/// Re-resolves an operand that was accepted earlier.
///
/// # Panics
///
/// Panics if the operand no longer resolves, which means an earlier check
/// let an invalid operand through.
pub fn revalidate(expr: &Expr, decls: &DeclTable) -> ResolvedOperand {
    match resolve(expr, decls, IdentityRules::DATA_OPERAND) {
        Ok(resolved) => resolved,
        Err(err) => panic!("operand accepted earlier no longer resolves: {err:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_ast::Shape;
    use miette::SourceOffset;

    fn dummy_span() -> SourceSpan {
        SourceSpan::new(SourceOffset::from(0), 0)
    }

    fn span_at(offset: usize) -> SourceSpan {
        SourceSpan::new(SourceOffset::from(offset), 1)
    }

    struct Fixture {
        decls: DeclTable,
        a: DeclId,
        a_redecl: DeclId,
        b: DeclId,
        s: DeclId,
        t: DeclId,
        f: DeclId,
        f_redecl: DeclId,
        g: DeclId,
    }

    fn fixture() -> Fixture {
        let mut decls = DeclTable::new();
        let a = decls.variable("a", Shape::Array(Some(10)), dummy_span());
        let a_redecl = decls.redeclare(a, dummy_span()).unwrap();
        let b = decls.variable("b", Shape::Array(Some(10)), dummy_span());
        let s = decls.variable("s", Shape::Record, dummy_span());
        let t = decls.variable("t", Shape::Record, dummy_span());
        let f = decls.field("f", Shape::Pointer, dummy_span());
        let f_redecl = decls.redeclare(f, dummy_span()).unwrap();
        let g = decls.field("g", Shape::Scalar, dummy_span());
        Fixture {
            decls,
            a,
            a_redecl,
            b,
            s,
            t,
            f,
            f_redecl,
            g,
        }
    }

    fn var(id: DeclId) -> Expr {
        Expr::decl_ref(id, dummy_span())
    }

    fn id(expr: &Expr, fx: &Fixture) -> VariableIdentity {
        identity_of(expr, &fx.decls, IdentityRules::DATA_OPERAND)
    }

    #[test]
    fn same_storage_same_identity() {
        let fx = fixture();
        let forms = [
            var(fx.a),
            Expr::paren(var(fx.a), dummy_span()),
            var(fx.a_redecl),
            Expr::section(var(fx.a), 0, 2, dummy_span()),
            Expr::section(var(fx.a_redecl), 2, 3, dummy_span()),
            Expr::paren(Expr::section(Expr::paren(var(fx.a), dummy_span()), 5, 5, dummy_span()), dummy_span()),
        ];
        for form in &forms {
            assert_eq!(id(form, &fx), VariableIdentity::Plain(fx.a), "form {form:?}");
        }
        assert_ne!(id(&var(fx.b), &fx), id(&var(fx.a), &fx));
    }

    #[test]
    fn member_identity_follows_canonical_declarations() {
        let fx = fixture();
        let s_f = Expr::member(var(fx.s), fx.f, false, dummy_span());
        let s_f_redecl = Expr::member(var(fx.s), fx.f_redecl, false, dummy_span());
        let t_f = Expr::member(var(fx.t), fx.f, false, dummy_span());
        let s_g = Expr::member(var(fx.s), fx.g, false, dummy_span());

        assert_eq!(id(&s_f, &fx), id(&s_f_redecl, &fx));
        assert_ne!(id(&s_f, &fx), id(&t_f, &fx));
        assert_ne!(id(&s_f, &fx), id(&s_g, &fx));
        assert_eq!(
            id(&Expr::section(s_f.clone(), 0, 4, dummy_span()), &fx),
            id(&s_f, &fx)
        );
    }

    #[test]
    fn implicit_and_explicit_owner_agree() {
        let fx = fixture();
        let implicit = Expr::implicit_member(fx.f, dummy_span());
        let explicit = Expr::member(Expr::this(false, dummy_span()), fx.f_redecl, true, dummy_span());
        assert_eq!(id(&implicit, &fx), VariableIdentity::ImplicitMember(fx.f));
        assert_eq!(id(&implicit, &fx), id(&explicit, &fx));
        assert_ne!(
            id(&implicit, &fx),
            id(&Expr::member(var(fx.s), fx.f, false, dummy_span()), &fx)
        );
    }

    #[test]
    fn owner_only_as_unit_range() {
        let fx = fixture();
        let this = || Expr::this(false, dummy_span());
        let ok = resolve(&Expr::section(this(), 0, 1, dummy_span()), &fx.decls, IdentityRules::DATA_OPERAND)
            .unwrap();
        assert_eq!(ok.identity, VariableIdentity::WholeImplicitOwner);
        assert_eq!(ok.range, DataRange::Whole);

        for bad in [this(), Expr::section(this(), 0, 2, dummy_span()), Expr::section(this(), 1, 1, dummy_span())] {
            let err = resolve(&bad, &fx.decls, IdentityRules::DATA_OPERAND).unwrap_err();
            assert!(matches!(err, IdentityError::OwnerNotUnitRange(_)), "got {err:?}");
        }
    }

    #[test]
    fn range_attribute() {
        let fx = fixture();
        let n = Expr::decl_ref(fx.b, dummy_span());
        let cases = [
            (var(fx.a), DataRange::Whole),
            (Expr::section(var(fx.a), 2, 3, dummy_span()), DataRange::Bounded { start: 2, len: 3 }),
            (
                Expr::subarray(var(fx.a), Some(Expr::int(0, dummy_span())), Some(n), dummy_span()),
                DataRange::Unbounded,
            ),
            (
                Expr::section(Expr::section(var(fx.a), 0, 4, dummy_span()), 0, 2, dummy_span()),
                DataRange::Unbounded,
            ),
        ];
        for (expr, range) in cases {
            let resolved = resolve(&expr, &fx.decls, IdentityRules::DATA_OPERAND).unwrap();
            assert_eq!(resolved.range, range, "expr {expr:?}");
        }
    }

    #[test]
    fn structural_failures() {
        let fx = fixture();
        let rules = IdentityRules::DATA_OPERAND;

        let open = Expr::subarray(var(fx.a), Some(Expr::int(0, dummy_span())), None, span_at(1));
        assert_eq!(resolve(&open, &fx.decls, rules), Err(IdentityError::MissingBounds(span_at(1))));

        let subscript = Expr::subscript(var(fx.a), Expr::int(3, dummy_span()), span_at(2));
        assert_eq!(resolve(&subscript, &fx.decls, rules), Err(IdentityError::MissingBounds(span_at(2))));

        let inner = Expr::member(var(fx.s), fx.f, false, span_at(3));
        let nested = Expr::member(inner, fx.g, false, dummy_span());
        assert_eq!(resolve(&nested, &fx.decls, rules), Err(IdentityError::NestedMember(span_at(3))));

        let negative = Expr::subarray(
            var(fx.a),
            Some(Expr::int(0, dummy_span())),
            Some(Expr::int(-1, span_at(7))),
            dummy_span(),
        );
        assert_eq!(resolve(&negative, &fx.decls, rules), Err(IdentityError::NegativeLength(span_at(7))));

        let call = Expr::call("get", vec![], span_at(4));
        assert_eq!(resolve(&call, &fx.decls, rules), Err(IdentityError::UnexpectedOperand(span_at(4))));

        let literal = Expr::int(4, span_at(5));
        assert_eq!(id(&literal, &fx), VariableIdentity::Invalid);

        // A field is not a variable on its own.
        let bare_field = Expr::decl_ref(fx.f, span_at(6));
        assert_eq!(
            resolve(&bare_field, &fx.decls, rules),
            Err(IdentityError::UnexpectedOperand(span_at(6)))
        );
    }

    #[test]
    fn permission_flags() {
        let fx = fixture();
        let section = Expr::section(var(fx.a), 0, 2, span_at(1));
        assert_eq!(
            resolve(&section, &fx.decls, IdentityRules::SCALAR_OPERAND),
            Err(IdentityError::SubarrayNotPermitted(span_at(1)))
        );

        let s_f = Expr::member(var(fx.s), fx.f, false, span_at(2));
        let owner_only = IdentityRules {
            members: MemberPolicy::OnOwnerOnly,
            allow_subarray: true,
        };
        assert_eq!(
            resolve(&s_f, &fx.decls, owner_only),
            Err(IdentityError::MemberNotPermitted(span_at(2)))
        );
        assert!(resolve(&Expr::implicit_member(fx.f, dummy_span()), &fx.decls, owner_only).is_ok());
        assert_eq!(
            resolve(&s_f, &fx.decls, IdentityRules::OWNER_MEMBER),
            Err(IdentityError::MemberNotPermitted(span_at(2)))
        );
        assert_eq!(
            resolve(&s_f, &fx.decls, IdentityRules::SCALAR_OPERAND),
            Err(IdentityError::MemberNotPermitted(span_at(2)))
        );
    }

    #[test]
    fn const_context_reaches_members() {
        let mut fx = fixture();
        fx.decls.mark_const(fx.s);
        let s_f = id(&Expr::member(var(fx.s), fx.f, false, dummy_span()), &fx);
        let t_f = id(&Expr::member(var(fx.t), fx.f, false, dummy_span()), &fx);
        assert!(s_f.is_const(&fx.decls));
        assert!(!t_f.is_const(&fx.decls));
        assert_eq!(s_f.display(&fx.decls).to_string(), "s.f");
    }

    #[test]
    #[should_panic(expected = "no longer resolves")]
    fn revalidation_asserts() {
        let fx = fixture();
        revalidate(&Expr::call("get", vec![], dummy_span()), &fx.decls);
    }
}
