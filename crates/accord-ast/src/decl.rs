use miette::SourceSpan;
use rustc_hash::FxHashMap;

/// Handle for one declaration in a [`DeclTable`].
///
/// Two handles may name the same entity when one is a redeclaration of the
/// other; [`DeclTable::canonical`] maps both to the first declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    /// A local, parameter or global variable.
    Variable,
    /// A data member of a record type.
    Field,
}

/// Storage shape of a declaration, as far as data motion cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Pointer,
    /// Array with its element count when known.
    Array(Option<u64>),
    Record,
}

impl Shape {
    /// Scalars and pointers are passed by value into compute regions.
    pub fn is_scalar_like(self) -> bool {
        matches!(self, Shape::Scalar | Shape::Pointer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub id: DeclId,
    pub name: String,
    pub kind: DeclKind,
    pub shape: Shape,
    pub is_const: bool,
    pub is_unsigned: bool,
    /// First declaration of the same entity (itself if this is the first).
    pub canonical: DeclId,
    pub span: SourceSpan,
}

/// Every declaration referenced by a translation unit.
#[derive(Debug, Clone, Default)]
pub struct DeclTable {
    decls: Vec<Decl>,
    by_name: FxHashMap<String, DeclId>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: String, kind: DeclKind, shape: Shape, span: SourceSpan) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        if kind == DeclKind::Variable {
            self.by_name.entry(name.clone()).or_insert(id);
        }
        self.decls.push(Decl {
            id,
            name,
            kind,
            shape,
            is_const: false,
            is_unsigned: false,
            canonical: id,
            span,
        });
        id
    }

    pub fn variable(&mut self, name: impl Into<String>, shape: Shape, span: SourceSpan) -> DeclId {
        self.push(name.into(), DeclKind::Variable, shape, span)
    }

    pub fn field(&mut self, name: impl Into<String>, shape: Shape, span: SourceSpan) -> DeclId {
        self.push(name.into(), DeclKind::Field, shape, span)
    }

    /// Adds a redeclaration of `of`. The new handle shares its canonical
    /// declaration and its qualifiers. `None` if `of` is not in the table.
    pub fn redeclare(&mut self, of: DeclId, span: SourceSpan) -> Option<DeclId> {
        let mut decl = self.get(of)?.clone();
        decl.id = DeclId(self.decls.len() as u32);
        decl.span = span;
        let id = decl.id;
        self.decls.push(decl);
        Some(id)
    }

    pub fn mark_const(&mut self, id: DeclId) {
        if let Some(decl) = self.decls.get_mut(id.0 as usize) {
            decl.is_const = true;
        }
    }

    pub fn mark_unsigned(&mut self, id: DeclId) {
        if let Some(decl) = self.decls.get_mut(id.0 as usize) {
            decl.is_unsigned = true;
        }
    }

    pub fn get(&self, id: DeclId) -> Option<&Decl> {
        self.decls.get(id.0 as usize)
    }

    /// Canonical handle of `id`. Unknown handles map to themselves.
    pub fn canonical(&self, id: DeclId) -> DeclId {
        self.get(id).map_or(id, |d| d.canonical)
    }

    pub fn name(&self, id: DeclId) -> &str {
        self.get(id).map_or("<unknown>", |d| d.name.as_str())
    }

    /// Looks up the first variable declared with `name`.
    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decl> {
        self.decls.iter()
    }
}
