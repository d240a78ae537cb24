//! The generic dispatch functor.
//!
//! `ExprFunctor` lets a client define a family of per-variant handlers
//! with a client-chosen result type and dispatch from any expression to
//! the right handler, without touching the AST definitions. The
//! variant-tag match below is the whole dispatch table: it is exhaustive
//! at compile time, so adding an `ExprKind` variant breaks every functor
//! until its hook exists.
//!
//! Hooks default to `visit_default`, which fails with `UnhandledVariant`;
//! a functor therefore only handles what it declares. The ready-made
//! recursive traversals live in `visit` (read-only) and `mutate`
//! (rewriting).

use crate::error::IrError;
use crate::expr::{
    Call, Constant, Expr, ExprKind, ExternFunc, Function, GlobalVar, If, OpRef, SeqExpr,
    ShapeExpr, Tuple, TupleGetItem, VarData,
};

pub trait ExprFunctor {
    type Output;

    /// Dispatch on the variant tag of `expr`.
    fn visit(&mut self, expr: &Expr) -> Result<Self::Output, IrError> {
        match &expr.kind {
            ExprKind::Constant(op) => self.visit_constant_(op, expr),
            ExprKind::Tuple(op) => self.visit_tuple_(op, expr),
            ExprKind::Var(op) => self.visit_var_(op, expr),
            ExprKind::DataflowVar(op) => self.visit_dataflow_var_(op, expr),
            ExprKind::GlobalVar(op) => self.visit_global_var_(op, expr),
            ExprKind::ExternFunc(op) => self.visit_extern_func_(op, expr),
            ExprKind::ShapeExpr(op) => self.visit_shape_expr_(op, expr),
            ExprKind::RuntimeDepShape => self.visit_runtime_dep_shape_(expr),
            ExprKind::Op(op) => self.visit_op_(op, expr),
            ExprKind::Call(op) => self.visit_call_(op, expr),
            ExprKind::SeqExpr(op) => self.visit_seq_expr_(op, expr),
            ExprKind::If(op) => self.visit_if_(op, expr),
            ExprKind::Function(op) => self.visit_function_(op, expr),
            ExprKind::TupleGetItem(op) => self.visit_tuple_getitem_(op, expr),
        }
    }

    /// Like `visit`, for optional slots: an absent expression fails with
    /// `NullNode`.
    fn visit_opt(&mut self, expr: Option<&Expr>) -> Result<Self::Output, IrError> {
        match expr {
            Some(expr) => self.visit(expr),
            None => Err(IrError::NullNode),
        }
    }

    fn visit_constant_(&mut self, _op: &Constant, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_tuple_(&mut self, _op: &Tuple, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_var_(&mut self, _op: &VarData, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_dataflow_var_(
        &mut self,
        _op: &VarData,
        expr: &Expr,
    ) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_global_var_(
        &mut self,
        _op: &GlobalVar,
        expr: &Expr,
    ) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_extern_func_(
        &mut self,
        _op: &ExternFunc,
        expr: &Expr,
    ) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_shape_expr_(
        &mut self,
        _op: &ShapeExpr,
        expr: &Expr,
    ) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_runtime_dep_shape_(&mut self, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_op_(&mut self, _op: &OpRef, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_call_(&mut self, _op: &Call, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_seq_expr_(&mut self, _op: &SeqExpr, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_if_(&mut self, _op: &If, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_function_(&mut self, _op: &Function, expr: &Expr) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    fn visit_tuple_getitem_(
        &mut self,
        _op: &TupleGetItem,
        expr: &Expr,
    ) -> Result<Self::Output, IrError> {
        self.visit_default(expr)
    }

    /// Catch-all for variants the functor does not handle.
    fn visit_default(&mut self, expr: &Expr) -> Result<Self::Output, IrError> {
        Err(IrError::UnhandledVariant {
            variant: expr.variant(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ExprVariant, Literal};

    /// Only handles calls; everything else must hit the default.
    struct CallsOnly;

    impl ExprFunctor for CallsOnly {
        type Output = usize;

        fn visit_call_(&mut self, op: &Call, _expr: &Expr) -> Result<usize, IrError> {
            Ok(op.args.len())
        }
    }

    #[test]
    fn test_dispatch_reaches_handler() {
        let call = Expr::call(Expr::op("add"), vec![Expr::constant(Literal::Int(1))]);
        assert_eq!(CallsOnly.visit(&call), Ok(1));
    }

    #[test]
    fn test_unhandled_variant_fails() {
        let tuple = Expr::tuple(vec![]);
        assert_eq!(
            CallsOnly.visit(&tuple),
            Err(IrError::UnhandledVariant {
                variant: ExprVariant::Tuple
            })
        );
    }

    #[test]
    fn test_visit_opt_none_is_null_node() {
        assert_eq!(CallsOnly.visit_opt(None), Err(IrError::NullNode));
    }

    /// Client-chosen output type: render the variant name.
    struct TagName;

    impl ExprFunctor for TagName {
        type Output = &'static str;

        fn visit_default(&mut self, expr: &Expr) -> Result<&'static str, IrError> {
            Ok(expr.variant().name())
        }
    }

    #[test]
    fn test_custom_default_overrides_failure() {
        assert_eq!(TagName.visit(&Expr::runtime_dep_shape()), Ok("RuntimeDepShape"));
    }
}
