//! The expression AST.
//!
//! Expressions form a DAG with structural sharing: an `Expr` is a cheap
//! handle (`Arc`) to an immutable node, and any node may be referenced by
//! several parents. The only mutation ever performed is publish-once
//! stamping of the two metadata slots (`checked_type`, `shape`) by the
//! block builder's inference; a second stamp is ignored, so every
//! observer after the first stamp sees the same value.
//!
//! Scoping comes in two flavors. A plain `BindingBlock` is a straight-line
//! sequence of possibly impure bindings. A dataflow block (the
//! `is_dataflow` flag) holds only pure bindings and may define
//! `DataflowVar`s, which must not escape the block; values leave a
//! dataflow block through an ordinary `Var` emitted as output.

use crate::prim::PrimExpr;
use crate::span::Span;
use crate::ty::{DataType, Type};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// A variable identifier carrying a display name.
///
/// Ids compare by name; the name table guarantees that every id it hands
/// out has a distinct name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    pub name: String,
}

impl Id {
    pub fn new(name: impl Into<String>) -> Self {
        Id { name: name.into() }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An immediate scalar or dense tensor value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Tensor {
        dtype: DataType,
        dims: Vec<usize>,
        values: Vec<f64>,
    },
}

impl Literal {
    pub fn dtype(&self) -> DataType {
        match self {
            Literal::Int(_) => DataType::Int64,
            Literal::Float(_) => DataType::Float64,
            Literal::Bool(_) => DataType::Bool,
            Literal::Tensor { dtype, .. } => *dtype,
        }
    }

    /// Tensor rank; scalars are rank 0.
    pub fn rank(&self) -> usize {
        match self {
            Literal::Tensor { dims, .. } => dims.len(),
            _ => 0,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Tensor { dtype, dims, .. } => {
                write!(f, "tensor<{}, [", dtype)?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", d)?;
                }
                write!(f, "]>")
            }
        }
    }
}

/// An operator or call attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

pub type Attrs = BTreeMap<String, AttrValue>;

// ── node payloads ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub fields: Vec<Expr>,
}

/// Shared payload of `Var` and `DataflowVar` nodes. The annotations are
/// what the program text wrote; the inferred results live in the node's
/// metadata slots.
#[derive(Debug, Clone, PartialEq)]
pub struct VarData {
    pub vid: Id,
    pub type_annotation: Option<Type>,
    pub shape_annotation: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub vid: Id,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternFunc {
    pub global_symbol: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeExpr {
    pub values: Vec<PrimExpr>,
}

/// Reference to a registered operator.
#[derive(Debug, Clone, PartialEq)]
pub struct OpRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: Expr,
    pub args: Vec<Expr>,
    pub attrs: Attrs,
    pub type_args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeqExpr {
    pub blocks: Vec<BindingBlock>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub cond: Expr,
    pub true_branch: Expr,
    pub false_branch: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub params: Vec<Var>,
    pub body: Expr,
    pub ret_type: Option<Type>,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleGetItem {
    pub tuple: Expr,
    pub index: usize,
}

// ── the expression sum ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Constant),
    Tuple(Tuple),
    Var(VarData),
    DataflowVar(VarData),
    GlobalVar(GlobalVar),
    ExternFunc(ExternFunc),
    ShapeExpr(ShapeExpr),
    /// Sentinel: the shape is only known at runtime.
    RuntimeDepShape,
    Op(OpRef),
    Call(Call),
    SeqExpr(SeqExpr),
    If(If),
    Function(Function),
    TupleGetItem(TupleGetItem),
}

/// Variant tag, used for dispatch and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprVariant {
    Constant,
    Tuple,
    Var,
    DataflowVar,
    GlobalVar,
    ExternFunc,
    ShapeExpr,
    RuntimeDepShape,
    Op,
    Call,
    SeqExpr,
    If,
    Function,
    TupleGetItem,
}

impl ExprVariant {
    pub const fn name(self) -> &'static str {
        match self {
            ExprVariant::Constant => "Constant",
            ExprVariant::Tuple => "Tuple",
            ExprVariant::Var => "Var",
            ExprVariant::DataflowVar => "DataflowVar",
            ExprVariant::GlobalVar => "GlobalVar",
            ExprVariant::ExternFunc => "ExternFunc",
            ExprVariant::ShapeExpr => "ShapeExpr",
            ExprVariant::RuntimeDepShape => "RuntimeDepShape",
            ExprVariant::Op => "Op",
            ExprVariant::Call => "Call",
            ExprVariant::SeqExpr => "SeqExpr",
            ExprVariant::If => "If",
            ExprVariant::Function => "Function",
            ExprVariant::TupleGetItem => "TupleGetItem",
        }
    }
}

impl fmt::Display for ExprVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An expression node. Immutable apart from the two publish-once
/// metadata slots.
#[derive(Debug)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub span: Span,
    checked_type: OnceLock<Type>,
    shape: OnceLock<Expr>,
}

impl ExprNode {
    /// The inferred type, if it has been stamped.
    pub fn checked_type(&self) -> Option<&Type> {
        self.checked_type.get()
    }

    /// The inferred shape, if it has been stamped. Expected to be a
    /// `ShapeExpr` or `RuntimeDepShape` once set.
    pub fn shape(&self) -> Option<&Expr> {
        self.shape.get()
    }

    /// Publish the inferred type. A second stamp is ignored: the first
    /// published value wins and stays observable.
    pub fn stamp_checked_type(&self, ty: Type) {
        let _ = self.checked_type.set(ty);
    }

    /// Publish the inferred shape. A second stamp is ignored.
    pub fn stamp_shape(&self, shape: Expr) {
        let _ = self.shape.set(shape);
    }
}

/// A shared handle to an expression node.
#[derive(Debug, Clone)]
pub struct Expr(Arc<ExprNode>);

impl Deref for Expr {
    type Target = ExprNode;

    fn deref(&self) -> &ExprNode {
        &self.0
    }
}

/// Structural equality over kinds, with a reference-identity fast path.
/// Metadata slots and spans do not participate.
impl PartialEq for Expr {
    fn eq(&self, other: &Expr) -> bool {
        self.same_as(other) || self.kind == other.kind
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr(Arc::new(ExprNode {
            kind,
            span,
            checked_type: OnceLock::new(),
            shape: OnceLock::new(),
        }))
    }

    /// Reference identity: both handles point at the same node.
    pub fn same_as(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this expression may appear as a call argument in ANF:
    /// a variable, global, constant, operator, shape, extern function,
    /// or a tuple of such atoms. Nested calls, conditionals, and
    /// sequences must be let-bound first.
    pub fn is_anf_atom(&self) -> bool {
        match &self.kind {
            ExprKind::Var(_)
            | ExprKind::DataflowVar(_)
            | ExprKind::GlobalVar(_)
            | ExprKind::Constant(_)
            | ExprKind::Op(_)
            | ExprKind::ShapeExpr(_)
            | ExprKind::ExternFunc(_) => true,
            ExprKind::Tuple(t) => t.fields.iter().all(|f| f.is_anf_atom()),
            _ => false,
        }
    }

    pub fn variant(&self) -> ExprVariant {
        match &self.kind {
            ExprKind::Constant(_) => ExprVariant::Constant,
            ExprKind::Tuple(_) => ExprVariant::Tuple,
            ExprKind::Var(_) => ExprVariant::Var,
            ExprKind::DataflowVar(_) => ExprVariant::DataflowVar,
            ExprKind::GlobalVar(_) => ExprVariant::GlobalVar,
            ExprKind::ExternFunc(_) => ExprVariant::ExternFunc,
            ExprKind::ShapeExpr(_) => ExprVariant::ShapeExpr,
            ExprKind::RuntimeDepShape => ExprVariant::RuntimeDepShape,
            ExprKind::Op(_) => ExprVariant::Op,
            ExprKind::Call(_) => ExprVariant::Call,
            ExprKind::SeqExpr(_) => ExprVariant::SeqExpr,
            ExprKind::If(_) => ExprVariant::If,
            ExprKind::Function(_) => ExprVariant::Function,
            ExprKind::TupleGetItem(_) => ExprVariant::TupleGetItem,
        }
    }

    // ── constructors (default span; use `Expr::new` to carry one) ──

    pub fn constant(value: Literal) -> Expr {
        Expr::new(ExprKind::Constant(Constant { value }), Span::default())
    }

    pub fn tuple(fields: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Tuple(Tuple { fields }), Span::default())
    }

    pub fn tuple_get_item(tuple: Expr, index: usize) -> Expr {
        Expr::new(
            ExprKind::TupleGetItem(TupleGetItem { tuple, index }),
            Span::default(),
        )
    }

    pub fn global_var(name: impl Into<String>) -> Expr {
        Expr::new(
            ExprKind::GlobalVar(GlobalVar { vid: Id::new(name) }),
            Span::default(),
        )
    }

    pub fn extern_func(symbol: impl Into<String>) -> Expr {
        Expr::new(
            ExprKind::ExternFunc(ExternFunc {
                global_symbol: symbol.into(),
            }),
            Span::default(),
        )
    }

    pub fn shape_expr(values: Vec<PrimExpr>) -> Expr {
        Expr::new(ExprKind::ShapeExpr(ShapeExpr { values }), Span::default())
    }

    pub fn runtime_dep_shape() -> Expr {
        Expr::new(ExprKind::RuntimeDepShape, Span::default())
    }

    pub fn op(name: impl Into<String>) -> Expr {
        Expr::new(ExprKind::Op(OpRef { name: name.into() }), Span::default())
    }

    pub fn call(op: Expr, args: Vec<Expr>) -> Expr {
        Expr::call_with(op, args, Attrs::new(), Vec::new())
    }

    pub fn call_with(op: Expr, args: Vec<Expr>, attrs: Attrs, type_args: Vec<Type>) -> Expr {
        Expr::new(
            ExprKind::Call(Call {
                op,
                args,
                attrs,
                type_args,
            }),
            Span::default(),
        )
    }

    pub fn seq(blocks: Vec<BindingBlock>, body: Expr) -> Expr {
        Expr::new(ExprKind::SeqExpr(SeqExpr { blocks, body }), Span::default())
    }

    pub fn if_(cond: Expr, true_branch: Expr, false_branch: Expr) -> Expr {
        Expr::new(
            ExprKind::If(If {
                cond,
                true_branch,
                false_branch,
            }),
            Span::default(),
        )
    }

    pub fn function(params: Vec<Var>, body: Expr, ret_type: Option<Type>) -> Expr {
        Expr::new(
            ExprKind::Function(Function {
                params,
                body,
                ret_type,
                attrs: Attrs::new(),
            }),
            Span::default(),
        )
    }
}

// ── variables ───────────────────────────────────────────────────────────

/// A handle to an expression known to be a `Var` or `DataflowVar` node.
///
/// The definition site and every use site of a variable share one node,
/// so a type or shape stamped at the definition is observable at all
/// uses.
#[derive(Debug, Clone)]
pub struct Var(Expr);

impl PartialEq for Var {
    fn eq(&self, other: &Var) -> bool {
        self.0 == other.0
    }
}

impl Var {
    /// An ordinary variable. Annotations, when present, are published
    /// into the node's metadata slots immediately.
    pub fn new(
        name: impl Into<String>,
        type_annotation: Option<Type>,
        shape_annotation: Option<Expr>,
    ) -> Var {
        Var::with_id(
            Id::new(name),
            type_annotation,
            shape_annotation,
            false,
            Span::default(),
        )
    }

    /// A dataflow-scoped variable.
    pub fn new_dataflow(
        name: impl Into<String>,
        type_annotation: Option<Type>,
        shape_annotation: Option<Expr>,
    ) -> Var {
        Var::with_id(
            Id::new(name),
            type_annotation,
            shape_annotation,
            true,
            Span::default(),
        )
    }

    pub fn with_id(
        vid: Id,
        type_annotation: Option<Type>,
        shape_annotation: Option<Expr>,
        dataflow: bool,
        span: Span,
    ) -> Var {
        let data = VarData {
            vid,
            type_annotation: type_annotation.clone(),
            shape_annotation: shape_annotation.clone(),
        };
        let kind = if dataflow {
            ExprKind::DataflowVar(data)
        } else {
            ExprKind::Var(data)
        };
        let expr = Expr::new(kind, span);
        if let Some(ty) = type_annotation {
            expr.stamp_checked_type(ty);
        }
        if let Some(shape) = shape_annotation {
            expr.stamp_shape(shape);
        }
        Var(expr)
    }

    /// A fresh unannotated variable whose metadata slots are stamped
    /// directly, without recording source annotations.
    pub fn stamped(
        vid: Id,
        shape: Option<Expr>,
        ty: Option<Type>,
        dataflow: bool,
        span: Span,
    ) -> Var {
        let var = Var::with_id(vid, None, None, dataflow, span);
        if let Some(ty) = ty {
            var.stamp_checked_type(ty);
        }
        if let Some(shape) = shape {
            var.stamp_shape(shape);
        }
        var
    }

    /// Reinterpret an expression as a variable handle. Returns `None`
    /// for any other variant.
    pub fn from_expr(expr: Expr) -> Option<Var> {
        match expr.kind {
            ExprKind::Var(_) | ExprKind::DataflowVar(_) => Some(Var(expr)),
            _ => None,
        }
    }

    fn data(&self) -> &VarData {
        match &self.0.kind {
            ExprKind::Var(data) | ExprKind::DataflowVar(data) => data,
            _ => unreachable!("Var handle over a non-var node"),
        }
    }

    pub fn vid(&self) -> &Id {
        &self.data().vid
    }

    pub fn name(&self) -> &str {
        &self.data().vid.name
    }

    pub fn is_dataflow(&self) -> bool {
        matches!(self.0.kind, ExprKind::DataflowVar(_))
    }

    pub fn type_annotation(&self) -> Option<&Type> {
        self.data().type_annotation.as_ref()
    }

    pub fn shape_annotation(&self) -> Option<&Expr> {
        self.data().shape_annotation.as_ref()
    }

    pub fn checked_type(&self) -> Option<&Type> {
        self.0.checked_type()
    }

    pub fn shape(&self) -> Option<&Expr> {
        self.0.shape()
    }

    pub fn stamp_checked_type(&self, ty: Type) {
        self.0.stamp_checked_type(ty);
    }

    pub fn stamp_shape(&self, shape: Expr) {
        self.0.stamp_shape(shape);
    }

    pub fn span(&self) -> Span {
        self.0.span
    }

    pub fn as_expr(&self) -> &Expr {
        &self.0
    }

    pub fn to_expr(&self) -> Expr {
        self.0.clone()
    }

    pub fn same_as(&self, other: &Var) -> bool {
        self.0.same_as(&other.0)
    }
}

// ── bindings and blocks ─────────────────────────────────────────────────

/// The let form: bind `value` to `var`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBinding {
    pub var: Var,
    pub value: Expr,
}

/// Destructure `value`'s runtime shape against `pattern`, optionally
/// introducing a variable annotated with the pattern shape.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchShape {
    pub value: Expr,
    pub pattern: Vec<PrimExpr>,
    pub var: Option<Var>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Var(VarBinding),
    MatchShape(MatchShape),
}

impl Binding {
    /// The variable introduced by this binding, if any.
    pub fn bound_var(&self) -> Option<&Var> {
        match self {
            Binding::Var(b) => Some(&b.var),
            Binding::MatchShape(b) => b.var.as_ref(),
        }
    }
}

/// A straight-line sequence of bindings. When `is_dataflow` is set, every
/// binding is pure and `DataflowVar`s defined inside must not escape.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingBlock {
    pub bindings: Vec<Binding>,
    pub is_dataflow: bool,
}

impl BindingBlock {
    pub fn new(bindings: Vec<Binding>) -> Self {
        BindingBlock {
            bindings,
            is_dataflow: false,
        }
    }

    pub fn dataflow(bindings: Vec<Binding>) -> Self {
        BindingBlock {
            bindings,
            is_dataflow: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prim::PrimExpr;

    #[test]
    fn test_identity_vs_structural_equality() {
        let a = Expr::constant(Literal::Int(1));
        let b = Expr::constant(Literal::Int(1));
        assert!(!a.same_as(&b));
        assert_eq!(a, b);
        assert_eq!(a, a.clone());
        assert!(a.same_as(&a.clone()));
    }

    #[test]
    fn test_metadata_excluded_from_equality() {
        let a = Expr::constant(Literal::Int(1));
        let b = Expr::constant(Literal::Int(1));
        a.stamp_checked_type(Type::tensor(0, DataType::Int64));
        assert_eq!(a, b);
    }

    #[test]
    fn test_stamp_is_publish_once() {
        let e = Expr::constant(Literal::Int(1));
        assert!(e.checked_type().is_none());
        e.stamp_checked_type(Type::tensor(0, DataType::Int64));
        e.stamp_checked_type(Type::Shape);
        assert_eq!(e.checked_type(), Some(&Type::tensor(0, DataType::Int64)));
    }

    #[test]
    fn test_var_def_and_use_share_node() {
        let v = Var::new("x", None, None);
        let use_site = v.to_expr();
        v.stamp_checked_type(Type::tensor(1, DataType::Float32));
        assert_eq!(
            use_site.checked_type(),
            Some(&Type::tensor(1, DataType::Float32))
        );
        assert!(use_site.same_as(v.as_expr()));
    }

    #[test]
    fn test_var_annotations_are_stamped() {
        let shape = Expr::shape_expr(vec![PrimExpr::sym("N")]);
        let v = Var::new(
            "x",
            Some(Type::tensor(1, DataType::Float32)),
            Some(shape.clone()),
        );
        assert_eq!(v.checked_type(), Some(&Type::tensor(1, DataType::Float32)));
        assert!(v.shape().unwrap().same_as(&shape));
    }

    #[test]
    fn test_from_expr_rejects_non_vars() {
        assert!(Var::from_expr(Expr::constant(Literal::Bool(true))).is_none());
        let v = Var::new_dataflow("t", None, None);
        let back = Var::from_expr(v.to_expr()).unwrap();
        assert!(back.is_dataflow());
        assert_eq!(back.name(), "t");
    }

    #[test]
    fn test_variant_tags() {
        assert_eq!(Expr::runtime_dep_shape().variant(), ExprVariant::RuntimeDepShape);
        assert_eq!(Expr::op("add").variant(), ExprVariant::Op);
        assert_eq!(format!("{}", ExprVariant::TupleGetItem), "TupleGetItem");
    }
}
