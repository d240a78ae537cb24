//! Read-only recursive traversal.
//!
//! `ExprVisitor` is the `()`-returning specialization of the dispatch
//! scheme in `functor`: every hook defaults to a structural walk of the
//! node's children in source order. Override the hooks you care about;
//! recursion for everything else keeps working.
//!
//! Definition sites and use sites of variables are deliberately routed
//! through different hooks: `visit_var_def`/`visit_var_def_`/
//! `visit_dataflow_var_def_` fire where a variable is bound (function
//! parameters, binding left-hand sides), while `visit_var_` and
//! `visit_dataflow_var_` fire only at uses.
//!
//! The default behavior of every hook is available as a free `walk_*`
//! function so adapters can invoke it explicitly.

use crate::expr::{
    Binding, BindingBlock, Call, Constant, Expr, ExprKind, ExternFunc, Function, GlobalVar, If,
    MatchShape, OpRef, SeqExpr, ShapeExpr, Tuple, TupleGetItem, Var, VarBinding, VarData,
};
use crate::prim::PrimExpr;
use crate::span::Span;
use crate::ty::Type;

pub trait ExprVisitor {
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_constant_(&mut self, op: &Constant, expr: &Expr) {
        walk_constant(self, op, expr);
    }

    fn visit_tuple_(&mut self, op: &Tuple, expr: &Expr) {
        walk_tuple(self, op, expr);
    }

    /// Use site of an ordinary variable.
    fn visit_var_(&mut self, op: &VarData, expr: &Expr) {
        walk_var(self, op, expr);
    }

    /// Use site of a dataflow variable.
    fn visit_dataflow_var_(&mut self, op: &VarData, expr: &Expr) {
        walk_dataflow_var(self, op, expr);
    }

    fn visit_global_var_(&mut self, op: &GlobalVar, expr: &Expr) {
        walk_global_var(self, op, expr);
    }

    fn visit_extern_func_(&mut self, op: &ExternFunc, expr: &Expr) {
        walk_extern_func(self, op, expr);
    }

    fn visit_shape_expr_(&mut self, op: &ShapeExpr, expr: &Expr) {
        walk_shape_expr(self, op, expr);
    }

    fn visit_runtime_dep_shape_(&mut self, expr: &Expr) {
        walk_runtime_dep_shape(self, expr);
    }

    fn visit_op_(&mut self, op: &OpRef, expr: &Expr) {
        walk_op(self, op, expr);
    }

    fn visit_call_(&mut self, op: &Call, expr: &Expr) {
        walk_call(self, op, expr);
    }

    fn visit_seq_expr_(&mut self, op: &SeqExpr, expr: &Expr) {
        walk_seq_expr(self, op, expr);
    }

    fn visit_if_(&mut self, op: &If, expr: &Expr) {
        walk_if(self, op, expr);
    }

    fn visit_function_(&mut self, op: &Function, expr: &Expr) {
        walk_function(self, op, expr);
    }

    fn visit_tuple_getitem_(&mut self, op: &TupleGetItem, expr: &Expr) {
        walk_tuple_getitem(self, op, expr);
    }

    fn visit_binding(&mut self, binding: &Binding) {
        walk_binding(self, binding);
    }

    fn visit_var_binding_(&mut self, binding: &VarBinding) {
        walk_var_binding(self, binding);
    }

    fn visit_match_shape_(&mut self, binding: &MatchShape) {
        walk_match_shape(self, binding);
    }

    fn visit_binding_block(&mut self, block: &BindingBlock) {
        walk_binding_block(self, block);
    }

    fn visit_binding_block_(&mut self, block: &BindingBlock) {
        walk_binding_block_default(self, block);
    }

    fn visit_dataflow_block_(&mut self, block: &BindingBlock) {
        walk_binding_block_default(self, block);
    }

    /// Definition site of a variable; dispatches on the variable kind.
    fn visit_var_def(&mut self, var: &Var) {
        walk_var_def(self, var);
    }

    fn visit_var_def_(&mut self, var: &Var) {
        walk_var_def_default(self, var);
    }

    fn visit_dataflow_var_def_(&mut self, var: &Var) {
        walk_var_def_default(self, var);
    }

    fn visit_span(&mut self, _span: &Span) {}

    fn visit_type(&mut self, _ty: &Type) {}

    fn visit_prim_expr(&mut self, _prim: &PrimExpr) {}
}

// ── default walks ───────────────────────────────────────────────────────

pub fn walk_expr<V: ExprVisitor + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Constant(op) => v.visit_constant_(op, expr),
        ExprKind::Tuple(op) => v.visit_tuple_(op, expr),
        ExprKind::Var(op) => v.visit_var_(op, expr),
        ExprKind::DataflowVar(op) => v.visit_dataflow_var_(op, expr),
        ExprKind::GlobalVar(op) => v.visit_global_var_(op, expr),
        ExprKind::ExternFunc(op) => v.visit_extern_func_(op, expr),
        ExprKind::ShapeExpr(op) => v.visit_shape_expr_(op, expr),
        ExprKind::RuntimeDepShape => v.visit_runtime_dep_shape_(expr),
        ExprKind::Op(op) => v.visit_op_(op, expr),
        ExprKind::Call(op) => v.visit_call_(op, expr),
        ExprKind::SeqExpr(op) => v.visit_seq_expr_(op, expr),
        ExprKind::If(op) => v.visit_if_(op, expr),
        ExprKind::Function(op) => v.visit_function_(op, expr),
        ExprKind::TupleGetItem(op) => v.visit_tuple_getitem_(op, expr),
    }
}

pub fn walk_constant<V: ExprVisitor + ?Sized>(v: &mut V, _op: &Constant, expr: &Expr) {
    v.visit_span(&expr.span);
    if let Some(shape) = expr.shape() {
        v.visit_expr(shape);
    }
}

pub fn walk_tuple<V: ExprVisitor + ?Sized>(v: &mut V, op: &Tuple, expr: &Expr) {
    v.visit_span(&expr.span);
    for field in &op.fields {
        v.visit_expr(field);
    }
    if let Some(shape) = expr.shape() {
        v.visit_expr(shape);
    }
}

pub fn walk_var<V: ExprVisitor + ?Sized>(v: &mut V, _op: &VarData, expr: &Expr) {
    v.visit_span(&expr.span);
}

pub fn walk_dataflow_var<V: ExprVisitor + ?Sized>(v: &mut V, _op: &VarData, expr: &Expr) {
    v.visit_span(&expr.span);
}

pub fn walk_global_var<V: ExprVisitor + ?Sized>(v: &mut V, _op: &GlobalVar, expr: &Expr) {
    v.visit_span(&expr.span);
}

pub fn walk_extern_func<V: ExprVisitor + ?Sized>(v: &mut V, _op: &ExternFunc, expr: &Expr) {
    v.visit_span(&expr.span);
}

pub fn walk_shape_expr<V: ExprVisitor + ?Sized>(v: &mut V, op: &ShapeExpr, expr: &Expr) {
    v.visit_span(&expr.span);
    for dim in &op.values {
        v.visit_prim_expr(dim);
    }
}

pub fn walk_runtime_dep_shape<V: ExprVisitor + ?Sized>(v: &mut V, expr: &Expr) {
    v.visit_span(&expr.span);
}

pub fn walk_op<V: ExprVisitor + ?Sized>(v: &mut V, _op: &OpRef, expr: &Expr) {
    v.visit_span(&expr.span);
}

pub fn walk_call<V: ExprVisitor + ?Sized>(v: &mut V, op: &Call, expr: &Expr) {
    v.visit_span(&expr.span);
    v.visit_expr(&op.op);
    for ty_arg in &op.type_args {
        v.visit_type(ty_arg);
    }
    for arg in &op.args {
        v.visit_expr(arg);
    }
    if let Some(shape) = expr.shape() {
        v.visit_expr(shape);
    }
}

pub fn walk_seq_expr<V: ExprVisitor + ?Sized>(v: &mut V, op: &SeqExpr, expr: &Expr) {
    v.visit_span(&expr.span);
    for block in &op.blocks {
        v.visit_binding_block(block);
    }
    v.visit_expr(&op.body);
}

pub fn walk_if<V: ExprVisitor + ?Sized>(v: &mut V, op: &If, expr: &Expr) {
    v.visit_span(&expr.span);
    v.visit_expr(&op.cond);
    v.visit_expr(&op.true_branch);
    v.visit_expr(&op.false_branch);
}

pub fn walk_function<V: ExprVisitor + ?Sized>(v: &mut V, op: &Function, expr: &Expr) {
    v.visit_span(&expr.span);
    for param in &op.params {
        v.visit_var_def(param);
    }
    v.visit_expr(&op.body);
}

pub fn walk_tuple_getitem<V: ExprVisitor + ?Sized>(v: &mut V, op: &TupleGetItem, expr: &Expr) {
    v.visit_span(&expr.span);
    v.visit_expr(&op.tuple);
}

pub fn walk_binding<V: ExprVisitor + ?Sized>(v: &mut V, binding: &Binding) {
    match binding {
        Binding::Var(b) => v.visit_var_binding_(b),
        Binding::MatchShape(b) => v.visit_match_shape_(b),
    }
}

pub fn walk_var_binding<V: ExprVisitor + ?Sized>(v: &mut V, binding: &VarBinding) {
    v.visit_expr(&binding.value);
    v.visit_var_def(&binding.var);
}

pub fn walk_match_shape<V: ExprVisitor + ?Sized>(v: &mut V, binding: &MatchShape) {
    v.visit_expr(&binding.value);
    for dim in &binding.pattern {
        v.visit_prim_expr(dim);
    }
    if let Some(var) = &binding.var {
        v.visit_var_def(var);
    }
}

pub fn walk_binding_block<V: ExprVisitor + ?Sized>(v: &mut V, block: &BindingBlock) {
    if block.is_dataflow {
        v.visit_dataflow_block_(block);
    } else {
        v.visit_binding_block_(block);
    }
}

pub fn walk_binding_block_default<V: ExprVisitor + ?Sized>(v: &mut V, block: &BindingBlock) {
    for binding in &block.bindings {
        v.visit_binding(binding);
    }
}

pub fn walk_var_def<V: ExprVisitor + ?Sized>(v: &mut V, var: &Var) {
    if var.is_dataflow() {
        v.visit_dataflow_var_def_(var);
    } else {
        v.visit_var_def_(var);
    }
}

pub fn walk_var_def_default<V: ExprVisitor + ?Sized>(v: &mut V, var: &Var) {
    v.visit_span(&var.span());
    if let Some(shape) = var.shape() {
        v.visit_expr(shape);
    }
}

// ── post-order utility ──────────────────────────────────────────────────

/// Apply `f` to every expression reachable from `expr` through the
/// default traversal, children before parents.
///
/// Uses an explicit work stack rather than host-stack recursion, so the
/// reachable depth is bounded by heap only.
pub fn post_order_visit(expr: &Expr, mut f: impl FnMut(&Expr)) {
    enum Work {
        Enter(Expr),
        Exit(Expr),
    }

    let mut stack = vec![Work::Enter(expr.clone())];
    while let Some(work) = stack.pop() {
        match work {
            Work::Enter(e) => {
                let mut children = expr_children(&e);
                stack.push(Work::Exit(e));
                children.reverse();
                for child in children {
                    stack.push(Work::Enter(child));
                }
            }
            Work::Exit(e) => f(&e),
        }
    }
}

/// The sub-expressions the default visitor routes through `visit_expr`,
/// in source order. Variable definition sites contribute only their
/// stamped shape expression, matching the default `visit_var_def_`.
fn expr_children(expr: &Expr) -> Vec<Expr> {
    fn push_var_def(out: &mut Vec<Expr>, var: &Var) {
        if let Some(shape) = var.shape() {
            out.push(shape.clone());
        }
    }

    let mut out = Vec::new();
    match &expr.kind {
        ExprKind::Constant(_) => {}
        ExprKind::Tuple(op) => out.extend(op.fields.iter().cloned()),
        ExprKind::Var(_)
        | ExprKind::DataflowVar(_)
        | ExprKind::GlobalVar(_)
        | ExprKind::ExternFunc(_)
        | ExprKind::ShapeExpr(_)
        | ExprKind::RuntimeDepShape
        | ExprKind::Op(_) => {}
        ExprKind::Call(op) => {
            out.push(op.op.clone());
            out.extend(op.args.iter().cloned());
        }
        ExprKind::SeqExpr(op) => {
            for block in &op.blocks {
                for binding in &block.bindings {
                    match binding {
                        Binding::Var(b) => {
                            out.push(b.value.clone());
                            push_var_def(&mut out, &b.var);
                        }
                        Binding::MatchShape(b) => {
                            out.push(b.value.clone());
                            if let Some(var) = &b.var {
                                push_var_def(&mut out, var);
                            }
                        }
                    }
                }
            }
            out.push(op.body.clone());
        }
        ExprKind::If(op) => {
            out.push(op.cond.clone());
            out.push(op.true_branch.clone());
            out.push(op.false_branch.clone());
        }
        ExprKind::Function(op) => {
            for param in &op.params {
                push_var_def(&mut out, param);
            }
            out.push(op.body.clone());
        }
        ExprKind::TupleGetItem(op) => out.push(op.tuple.clone()),
    }
    // shape slots visited by the default walks of these variants
    match &expr.kind {
        ExprKind::Constant(_) | ExprKind::Tuple(_) | ExprKind::Call(_) => {
            if let Some(shape) = expr.shape() {
                out.push(shape.clone());
            }
        }
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ExprVariant, Literal};
    use crate::prim::PrimExpr;

    /// Records every expression routed through `visit_expr`, pre-order.
    #[derive(Default)]
    struct Collect {
        variants: Vec<ExprVariant>,
    }

    impl ExprVisitor for Collect {
        fn visit_expr(&mut self, expr: &Expr) {
            self.variants.push(expr.variant());
            walk_expr(self, expr);
        }
    }

    fn sample_call() -> Expr {
        Expr::call(
            Expr::op("add"),
            vec![
                Expr::constant(Literal::Int(1)),
                Expr::tuple(vec![Expr::constant(Literal::Int(2))]),
            ],
        )
    }

    #[test]
    fn test_source_order_traversal() {
        let mut c = Collect::default();
        c.visit_expr(&sample_call());
        assert_eq!(
            c.variants,
            vec![
                ExprVariant::Call,
                ExprVariant::Op,
                ExprVariant::Constant,
                ExprVariant::Tuple,
                ExprVariant::Constant,
            ]
        );
    }

    #[test]
    fn test_def_use_split() {
        #[derive(Default)]
        struct DefUse {
            defs: Vec<String>,
            uses: Vec<String>,
        }

        impl ExprVisitor for DefUse {
            fn visit_var_(&mut self, op: &VarData, _expr: &Expr) {
                self.uses.push(op.vid.name.clone());
            }

            fn visit_var_def_(&mut self, var: &Var) {
                self.defs.push(var.name().to_string());
            }
        }

        let x = Var::new("x", None, None);
        let block = BindingBlock::new(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: Expr::constant(Literal::Int(7)),
        })]);
        let seq = Expr::seq(vec![block], x.to_expr());

        let mut v = DefUse::default();
        v.visit_expr(&seq);
        assert_eq!(v.defs, vec!["x"]);
        assert_eq!(v.uses, vec!["x"]);
    }

    #[test]
    fn test_match_shape_walk_visits_pattern() {
        #[derive(Default)]
        struct Dims {
            dims: Vec<PrimExpr>,
        }

        impl ExprVisitor for Dims {
            fn visit_prim_expr(&mut self, prim: &PrimExpr) {
                self.dims.push(prim.clone());
            }
        }

        let binding = MatchShape {
            value: Expr::constant(Literal::Int(0)),
            pattern: vec![PrimExpr::sym("N"), PrimExpr::Lit(8)],
            var: None,
        };
        let mut v = Dims::default();
        v.visit_match_shape_(&binding);
        assert_eq!(v.dims, vec![PrimExpr::sym("N"), PrimExpr::Lit(8)]);
    }

    #[test]
    fn test_post_order_matches_visitor_multiset() {
        use std::collections::HashMap;

        let x = Var::new("x", None, None);
        let call = sample_call();
        let block = BindingBlock::dataflow(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: call,
        })]);
        let root = Expr::seq(vec![block], x.to_expr());

        let mut c = Collect::default();
        c.visit_expr(&root);

        let mut post = Vec::new();
        post_order_visit(&root, |e| post.push(e.variant()));

        let count = |items: &[ExprVariant]| {
            let mut m: HashMap<ExprVariant, usize> = HashMap::new();
            for v in items {
                *m.entry(*v).or_default() += 1;
            }
            m
        };
        assert_eq!(count(&c.variants), count(&post));
    }

    #[test]
    fn test_post_order_children_first() {
        let inner = Expr::constant(Literal::Int(1));
        let outer = Expr::tuple(vec![inner.clone()]);
        let mut order = Vec::new();
        post_order_visit(&outer, |e| order.push(e.variant()));
        assert_eq!(order, vec![ExprVariant::Constant, ExprVariant::Tuple]);
    }

    #[test]
    fn test_post_order_survives_deep_nesting() {
        let mut e = Expr::constant(Literal::Int(0));
        for _ in 0..4096 {
            e = Expr::tuple_get_item(e, 0);
        }
        let mut n = 0usize;
        post_order_visit(&e, |_| n += 1);
        assert_eq!(n, 4097);
    }
}
