//! Rewriting traversal over unnormalized IR.
//!
//! `ExprMutator` is the `Expr -> Expr` specialization of the dispatch
//! scheme: default hooks rebuild a node only when a child actually
//! changed, and otherwise return the original expression *by identity*,
//! preserving structural sharing and any stamped metadata. Change
//! detection is per slot (`same_as` on children), never a deep re-hash.
//!
//! This mutator rewrites binding blocks transparently — it does not open
//! scopes or re-emit bindings. The ANF-enforcing variant that does is in
//! `normalize`.
//!
//! As in `visit`, every default body is available as a free `mutate_*`
//! function so adapters can invoke it after shadowing the hook.

use crate::error::IrError;
use crate::expr::{
    Binding, BindingBlock, Call, Constant, Expr, ExprKind, ExternFunc, Function, GlobalVar, If,
    MatchShape, OpRef, SeqExpr, ShapeExpr, Tuple, TupleGetItem, VarBinding, VarData,
};
use crate::prim::PrimExpr;
use crate::ty::Type;

pub trait ExprMutator {
    fn visit_expr(&mut self, expr: &Expr) -> Result<Expr, IrError> {
        mutate_expr(self, expr)
    }

    fn visit_constant_(&mut self, _op: &Constant, expr: &Expr) -> Result<Expr, IrError> {
        Ok(expr.clone())
    }

    fn visit_tuple_(&mut self, op: &Tuple, expr: &Expr) -> Result<Expr, IrError> {
        mutate_tuple(self, op, expr)
    }

    /// Use site of an ordinary variable.
    fn visit_var_(&mut self, _op: &VarData, expr: &Expr) -> Result<Expr, IrError> {
        Ok(expr.clone())
    }

    /// Use site of a dataflow variable.
    fn visit_dataflow_var_(&mut self, _op: &VarData, expr: &Expr) -> Result<Expr, IrError> {
        Ok(expr.clone())
    }

    fn visit_global_var_(&mut self, _op: &GlobalVar, expr: &Expr) -> Result<Expr, IrError> {
        Ok(expr.clone())
    }

    fn visit_extern_func_(&mut self, _op: &ExternFunc, expr: &Expr) -> Result<Expr, IrError> {
        Ok(expr.clone())
    }

    fn visit_shape_expr_(&mut self, op: &ShapeExpr, expr: &Expr) -> Result<Expr, IrError> {
        mutate_shape_expr(self, op, expr)
    }

    fn visit_runtime_dep_shape_(&mut self, expr: &Expr) -> Result<Expr, IrError> {
        Ok(expr.clone())
    }

    fn visit_op_(&mut self, _op: &OpRef, expr: &Expr) -> Result<Expr, IrError> {
        Ok(expr.clone())
    }

    fn visit_call_(&mut self, op: &Call, expr: &Expr) -> Result<Expr, IrError> {
        mutate_call(self, op, expr)
    }

    fn visit_seq_expr_(&mut self, op: &SeqExpr, expr: &Expr) -> Result<Expr, IrError> {
        mutate_seq_expr(self, op, expr)
    }

    fn visit_if_(&mut self, op: &If, expr: &Expr) -> Result<Expr, IrError> {
        mutate_if(self, op, expr)
    }

    fn visit_function_(&mut self, op: &Function, expr: &Expr) -> Result<Expr, IrError> {
        mutate_function(self, op, expr)
    }

    fn visit_tuple_getitem_(&mut self, op: &TupleGetItem, expr: &Expr) -> Result<Expr, IrError> {
        mutate_tuple_getitem(self, op, expr)
    }

    /// Rewrite a block's bindings in place, without opening a scope.
    fn visit_binding_block(&mut self, block: &BindingBlock) -> Result<BindingBlock, IrError> {
        mutate_binding_block(self, block)
    }

    /// Rewrite a type appearing in an annotation.
    fn visit_type(&mut self, ty: &Type) -> Result<Type, IrError> {
        Ok(ty.clone())
    }

    fn visit_prim_expr(&mut self, prim: &PrimExpr) -> Result<PrimExpr, IrError> {
        Ok(prim.clone())
    }
}

/// Dispatch on the variant tag; the default body of `visit_expr`.
pub fn mutate_expr<M: ExprMutator + ?Sized>(m: &mut M, expr: &Expr) -> Result<Expr, IrError> {
    match &expr.kind {
        ExprKind::Constant(op) => m.visit_constant_(op, expr),
        ExprKind::Tuple(op) => m.visit_tuple_(op, expr),
        ExprKind::Var(op) => m.visit_var_(op, expr),
        ExprKind::DataflowVar(op) => m.visit_dataflow_var_(op, expr),
        ExprKind::GlobalVar(op) => m.visit_global_var_(op, expr),
        ExprKind::ExternFunc(op) => m.visit_extern_func_(op, expr),
        ExprKind::ShapeExpr(op) => m.visit_shape_expr_(op, expr),
        ExprKind::RuntimeDepShape => m.visit_runtime_dep_shape_(expr),
        ExprKind::Op(op) => m.visit_op_(op, expr),
        ExprKind::Call(op) => m.visit_call_(op, expr),
        ExprKind::SeqExpr(op) => m.visit_seq_expr_(op, expr),
        ExprKind::If(op) => m.visit_if_(op, expr),
        ExprKind::Function(op) => m.visit_function_(op, expr),
        ExprKind::TupleGetItem(op) => m.visit_tuple_getitem_(op, expr),
    }
}

pub fn mutate_tuple<M: ExprMutator + ?Sized>(
    m: &mut M,
    op: &Tuple,
    expr: &Expr,
) -> Result<Expr, IrError> {
    let mut fields = Vec::with_capacity(op.fields.len());
    let mut unchanged = true;
    for field in &op.fields {
        let new_field = m.visit_expr(field)?;
        unchanged &= new_field.same_as(field);
        fields.push(new_field);
    }
    if unchanged {
        Ok(expr.clone())
    } else {
        Ok(Expr::new(ExprKind::Tuple(Tuple { fields }), expr.span))
    }
}

pub fn mutate_shape_expr<M: ExprMutator + ?Sized>(
    m: &mut M,
    op: &ShapeExpr,
    expr: &Expr,
) -> Result<Expr, IrError> {
    let mut values = Vec::with_capacity(op.values.len());
    let mut unchanged = true;
    for dim in &op.values {
        let new_dim = m.visit_prim_expr(dim)?;
        unchanged &= new_dim == *dim;
        values.push(new_dim);
    }
    if unchanged {
        Ok(expr.clone())
    } else {
        Ok(Expr::new(
            ExprKind::ShapeExpr(ShapeExpr { values }),
            expr.span,
        ))
    }
}

pub fn mutate_call<M: ExprMutator + ?Sized>(
    m: &mut M,
    op: &Call,
    expr: &Expr,
) -> Result<Expr, IrError> {
    let new_op = m.visit_expr(&op.op)?;
    let mut unchanged = new_op.same_as(&op.op);

    let mut type_args = Vec::with_capacity(op.type_args.len());
    for ty_arg in &op.type_args {
        let new_ty = m.visit_type(ty_arg)?;
        unchanged &= new_ty == *ty_arg;
        type_args.push(new_ty);
    }

    let mut args = Vec::with_capacity(op.args.len());
    for arg in &op.args {
        let new_arg = m.visit_expr(arg)?;
        unchanged &= new_arg.same_as(arg);
        args.push(new_arg);
    }

    if unchanged {
        Ok(expr.clone())
    } else {
        Ok(Expr::new(
            ExprKind::Call(Call {
                op: new_op,
                args,
                attrs: op.attrs.clone(),
                type_args,
            }),
            expr.span,
        ))
    }
}

pub fn mutate_seq_expr<M: ExprMutator + ?Sized>(
    m: &mut M,
    op: &SeqExpr,
    expr: &Expr,
) -> Result<Expr, IrError> {
    let mut blocks = Vec::with_capacity(op.blocks.len());
    let mut unchanged = true;
    for block in &op.blocks {
        let new_block = m.visit_binding_block(block)?;
        unchanged &= new_block == *block;
        if !new_block.bindings.is_empty() {
            blocks.push(new_block);
        }
    }
    let body = m.visit_expr(&op.body)?;
    if unchanged && body.same_as(&op.body) {
        Ok(expr.clone())
    } else {
        Ok(Expr::new(
            ExprKind::SeqExpr(SeqExpr { blocks, body }),
            expr.span,
        ))
    }
}

pub fn mutate_if<M: ExprMutator + ?Sized>(
    m: &mut M,
    op: &If,
    expr: &Expr,
) -> Result<Expr, IrError> {
    let cond = m.visit_expr(&op.cond)?;
    let true_branch = m.visit_expr(&op.true_branch)?;
    let false_branch = m.visit_expr(&op.false_branch)?;
    if cond.same_as(&op.cond)
        && true_branch.same_as(&op.true_branch)
        && false_branch.same_as(&op.false_branch)
    {
        Ok(expr.clone())
    } else {
        Ok(Expr::new(
            ExprKind::If(If {
                cond,
                true_branch,
                false_branch,
            }),
            expr.span,
        ))
    }
}

pub fn mutate_function<M: ExprMutator + ?Sized>(
    m: &mut M,
    op: &Function,
    expr: &Expr,
) -> Result<Expr, IrError> {
    let body = m.visit_expr(&op.body)?;
    if body.same_as(&op.body) {
        Ok(expr.clone())
    } else {
        Ok(Expr::new(
            ExprKind::Function(Function {
                params: op.params.clone(),
                body,
                ret_type: op.ret_type.clone(),
                attrs: op.attrs.clone(),
            }),
            expr.span,
        ))
    }
}

pub fn mutate_tuple_getitem<M: ExprMutator + ?Sized>(
    m: &mut M,
    op: &TupleGetItem,
    expr: &Expr,
) -> Result<Expr, IrError> {
    let tuple = m.visit_expr(&op.tuple)?;
    if tuple.same_as(&op.tuple) {
        Ok(expr.clone())
    } else {
        Ok(Expr::new(
            ExprKind::TupleGetItem(TupleGetItem {
                tuple,
                index: op.index,
            }),
            expr.span,
        ))
    }
}

pub fn mutate_binding_block<M: ExprMutator + ?Sized>(
    m: &mut M,
    block: &BindingBlock,
) -> Result<BindingBlock, IrError> {
    let mut bindings = Vec::with_capacity(block.bindings.len());
    for binding in &block.bindings {
        match binding {
            Binding::Var(b) => {
                let value = m.visit_expr(&b.value)?;
                bindings.push(Binding::Var(VarBinding {
                    var: b.var.clone(),
                    value,
                }));
            }
            Binding::MatchShape(b) => {
                let value = m.visit_expr(&b.value)?;
                bindings.push(Binding::MatchShape(MatchShape {
                    value,
                    pattern: b.pattern.clone(),
                    var: b.var.clone(),
                }));
            }
        }
    }
    Ok(BindingBlock {
        bindings,
        is_dataflow: block.is_dataflow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Literal, Var};

    struct Identity;
    impl ExprMutator for Identity {}

    /// Replaces integer constants with their successor.
    struct Increment;
    impl ExprMutator for Increment {
        fn visit_constant_(&mut self, op: &Constant, expr: &Expr) -> Result<Expr, IrError> {
            match op.value {
                Literal::Int(n) => Ok(Expr::constant(Literal::Int(n + 1))),
                _ => Ok(expr.clone()),
            }
        }
    }

    fn sample() -> Expr {
        let x = Var::new("x", None, None);
        let call = Expr::call(
            Expr::op("add"),
            vec![x.to_expr(), Expr::constant(Literal::Int(1))],
        );
        let block = BindingBlock::new(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: Expr::constant(Literal::Int(0)),
        })]);
        Expr::seq(vec![block], Expr::if_(call.clone(), call, x.to_expr()))
    }

    #[test]
    fn test_identity_mutator_returns_same_node() {
        let e = sample();
        let out = Identity.visit_expr(&e).unwrap();
        assert!(out.same_as(&e));
    }

    #[test]
    fn test_rewrite_rebuilds_only_changed_spine() {
        let keep = Expr::tuple(vec![]);
        let change = Expr::constant(Literal::Int(41));
        let root = Expr::tuple(vec![keep.clone(), change]);

        let out = Increment.visit_expr(&root).unwrap();
        assert!(!out.same_as(&root));
        match &out.kind {
            ExprKind::Tuple(t) => {
                assert!(t.fields[0].same_as(&keep));
                assert_eq!(t.fields[1], Expr::constant(Literal::Int(42)));
            }
            _ => panic!("expected tuple"),
        }
    }

    #[test]
    fn test_metadata_preserved_through_identity() {
        let e = Expr::call(Expr::op("add"), vec![]);
        e.stamp_checked_type(Type::Opaque);
        let out = Identity.visit_expr(&e).unwrap();
        assert_eq!(out.checked_type(), Some(&Type::Opaque));
    }

    #[test]
    fn test_seq_drops_emptied_blocks_on_rebuild() {
        let x = Var::new("x", None, None);
        let empty = BindingBlock::new(vec![]);
        let full = BindingBlock::new(vec![Binding::Var(VarBinding {
            var: x,
            value: Expr::constant(Literal::Int(1)),
        })]);
        let seq = Expr::seq(vec![empty, full], Expr::constant(Literal::Int(2)));
        let out = Increment.visit_expr(&seq).unwrap();
        match &out.kind {
            ExprKind::SeqExpr(s) => {
                assert_eq!(s.blocks.len(), 1);
                assert_eq!(s.blocks[0].bindings.len(), 1);
            }
            _ => panic!("expected seq"),
        }
    }

    #[test]
    fn test_binding_block_rewritten_transparently() {
        let x = Var::new_dataflow("x", None, None);
        let block = BindingBlock::dataflow(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: Expr::constant(Literal::Int(1)),
        })]);
        let out = Increment.visit_binding_block(&block).unwrap();
        assert!(out.is_dataflow);
        match &out.bindings[0] {
            Binding::Var(b) => {
                // the bound var is untouched; only the value is rewritten
                assert!(b.var.same_as(&x));
                assert_eq!(b.value, Expr::constant(Literal::Int(2)));
            }
            _ => panic!("expected var binding"),
        }
    }
}
