//! Structural invariant checking.
//!
//! Walks a function and reports violations of the IR's well-formedness
//! rules: ANF atomicity of call arguments and tuple fields, dataflow
//! variable confinement, single definition per id, no dangling
//! ordinary/dataflow/symbolic/global variables, and `SeqExpr` appearing
//! only in body position. Violations are accumulated, not fatal, so one
//! pass reports everything it finds.

use crate::expr::{
    Call, Expr, ExprKind, Function, GlobalVar, Id, MatchShape, SeqExpr, ShapeExpr, Tuple, Var,
    VarData,
};
use crate::prim::PrimExpr;
use crate::span::Span;
use crate::visit::ExprVisitor;
use std::collections::HashSet;
use std::fmt;

/// A single well-formedness violation.
#[derive(Debug, Clone, PartialEq)]
pub struct WellFormedError {
    pub message: String,
    pub span: Span,
}

impl fmt::Display for WellFormedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "well-formedness error: {}", self.message)
    }
}

/// Walks expressions and accumulates well-formedness violations.
#[derive(Debug, Default)]
pub struct WellFormedChecker {
    globals: HashSet<Id>,
    vars: HashSet<Id>,
    dataflow_vars: HashSet<Id>,
    sym_vars: HashSet<String>,
    in_dataflow: bool,
    errors: Vec<WellFormedError>,
}

impl WellFormedChecker {
    pub fn new() -> Self {
        WellFormedChecker::default()
    }

    /// Declare a module-level function name so references to it pass.
    pub fn register_global_var(&mut self, id: Id) {
        self.globals.insert(id);
    }

    /// Check `expr`, returning every violation found.
    pub fn check(mut self, expr: &Expr) -> Result<(), Vec<WellFormedError>> {
        self.visit_expr(expr);
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(WellFormedError {
            message: message.into(),
            span,
        });
    }

    /// Symbolic variables in a dimension must have been introduced by a
    /// parameter shape annotation or a match-shape pattern.
    fn check_prim(&mut self, prim: &PrimExpr, span: Span) {
        let mut syms = Vec::new();
        prim.collect_syms(&mut syms);
        for sym in syms {
            if !self.sym_vars.contains(&sym) {
                self.error(span, format!("symbolic variable `{}` is not defined", sym));
            }
        }
    }

    /// Register the symbolic variables a pattern introduces; compound
    /// dimensions may only reference already-known symbols.
    fn register_pattern(&mut self, pattern: &[PrimExpr], span: Span) {
        for dim in pattern {
            match dim {
                PrimExpr::Sym(name) => {
                    self.sym_vars.insert(name.clone());
                }
                other => self.check_prim(other, span),
            }
        }
    }

    /// A `SeqExpr` is only legal here; everything else goes through the
    /// regular dispatch.
    fn visit_body(&mut self, expr: &Expr) {
        if let ExprKind::SeqExpr(seq) = &expr.kind {
            for block in &seq.blocks {
                self.visit_binding_block(block);
            }
            self.visit_expr(&seq.body);
        } else {
            self.visit_expr(expr);
        }
    }
}

impl ExprVisitor for WellFormedChecker {
    fn visit_global_var_(&mut self, op: &GlobalVar, expr: &Expr) {
        if !self.globals.contains(&op.vid) {
            self.error(
                expr.span,
                format!("global variable `{}` is not defined", op.vid),
            );
        }
    }

    fn visit_var_(&mut self, op: &VarData, expr: &Expr) {
        if !self.vars.contains(&op.vid) {
            self.error(expr.span, format!("variable `{}` is not defined", op.vid));
        }
    }

    fn visit_dataflow_var_(&mut self, op: &VarData, expr: &Expr) {
        if !self.in_dataflow {
            self.error(
                expr.span,
                format!(
                    "dataflow variable `{}` is used outside a dataflow block",
                    op.vid
                ),
            );
        }
        if !self.dataflow_vars.contains(&op.vid) {
            self.error(
                expr.span,
                format!("dataflow variable `{}` is not defined", op.vid),
            );
        }
    }

    fn visit_tuple_(&mut self, op: &Tuple, expr: &Expr) {
        for (i, field) in op.fields.iter().enumerate() {
            match &field.kind {
                ExprKind::Var(_)
                | ExprKind::DataflowVar(_)
                | ExprKind::ShapeExpr(_)
                | ExprKind::Constant(_)
                | ExprKind::Tuple(_) => self.visit_expr(field),
                _ => self.error(
                    field.span,
                    format!(
                        "tuple is not in ANF form: field {} is a {}",
                        i,
                        field.variant()
                    ),
                ),
            }
        }
        if let Some(shape) = expr.shape() {
            self.visit_expr(shape);
        }
    }

    fn visit_call_(&mut self, op: &Call, expr: &Expr) {
        for (i, arg) in op.args.iter().enumerate() {
            if arg.is_anf_atom() {
                self.visit_expr(arg);
            } else {
                self.error(
                    arg.span,
                    format!(
                        "call is not in ANF form: argument {} is a {}",
                        i,
                        arg.variant()
                    ),
                );
            }
        }
        if let Some(shape) = expr.shape() {
            self.visit_expr(shape);
        }
    }

    fn visit_function_(&mut self, op: &Function, _expr: &Expr) {
        for param in &op.params {
            // shape annotations on parameters introduce symbolic vars
            if let Some(shape) = param.shape() {
                if let ExprKind::ShapeExpr(s) = &shape.kind {
                    self.register_pattern(&s.values, param.span());
                }
            }
            self.visit_var_def(param);
        }
        self.visit_body(&op.body);
        self.vars.clear();
        self.sym_vars.clear();
    }

    fn visit_if_(&mut self, op: &crate::expr::If, _expr: &Expr) {
        self.visit_expr(&op.cond);
        self.visit_body(&op.true_branch);
        self.visit_body(&op.false_branch);
    }

    fn visit_seq_expr_(&mut self, _op: &SeqExpr, expr: &Expr) {
        self.error(
            expr.span,
            "a SeqExpr may only appear as a function body or a conditional branch",
        );
    }

    fn visit_shape_expr_(&mut self, op: &ShapeExpr, expr: &Expr) {
        for dim in &op.values {
            self.check_prim(dim, expr.span);
        }
    }

    fn visit_match_shape_(&mut self, binding: &MatchShape) {
        self.visit_expr(&binding.value);
        self.register_pattern(&binding.pattern, binding.value.span);
        if let Some(var) = &binding.var {
            self.visit_var_def(var);
        }
    }

    fn visit_dataflow_block_(&mut self, block: &crate::expr::BindingBlock) {
        self.in_dataflow = true;
        for binding in &block.bindings {
            self.visit_binding(binding);
        }
        self.in_dataflow = false;
        self.dataflow_vars.clear();
    }

    fn visit_var_def_(&mut self, var: &Var) {
        if !self.vars.insert(var.vid().clone()) {
            self.error(
                var.span(),
                format!("variable `{}` is defined more than once", var.vid()),
            );
        }
        if let Some(shape) = var.shape() {
            self.visit_expr(shape);
        }
    }

    fn visit_dataflow_var_def_(&mut self, var: &Var) {
        if !self.in_dataflow {
            self.error(
                var.span(),
                format!(
                    "dataflow variable `{}` is defined outside a dataflow block",
                    var.vid()
                ),
            );
        }
        if !self.dataflow_vars.insert(var.vid().clone()) {
            self.error(
                var.span(),
                format!(
                    "dataflow variable `{}` is defined more than once",
                    var.vid()
                ),
            );
        }
        if let Some(shape) = var.shape() {
            self.visit_expr(shape);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Binding, BindingBlock, Literal, VarBinding};
    use crate::ty::{DataType, Type};

    fn param(name: &str, dims: Vec<PrimExpr>) -> Var {
        Var::new(
            name,
            Some(Type::tensor(dims.len(), DataType::Float32)),
            Some(Expr::shape_expr(dims)),
        )
    }

    fn func_with_body(params: Vec<Var>, body: Expr) -> Expr {
        Expr::function(params, body, None)
    }

    #[test]
    fn test_well_formed_dataflow_function() {
        let a = param("a", vec![PrimExpr::sym("N")]);
        let x = Var::new_dataflow("x", None, None);
        let y = Var::new("y", None, None);
        let block = BindingBlock::dataflow(vec![
            Binding::Var(VarBinding {
                var: x.clone(),
                value: Expr::call(Expr::op("relu"), vec![a.to_expr()]),
            }),
            Binding::Var(VarBinding {
                var: y.clone(),
                value: x.to_expr(),
            }),
        ]);
        let func = func_with_body(vec![a], Expr::seq(vec![block], y.to_expr()));
        assert!(WellFormedChecker::new().check(&func).is_ok());
    }

    #[test]
    fn test_nested_call_argument_rejected() {
        let a = param("a", vec![PrimExpr::sym("N")]);
        let nested = Expr::call(
            Expr::op("relu"),
            vec![Expr::call(Expr::op("exp"), vec![a.to_expr()])],
        );
        let x = Var::new("x", None, None);
        let block = BindingBlock::new(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: nested,
        })]);
        let func = func_with_body(vec![a], Expr::seq(vec![block], x.to_expr()));
        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("not in ANF form")));
    }

    #[test]
    fn test_tuple_field_must_be_atomic() {
        let a = param("a", vec![PrimExpr::sym("N")]);
        let x = Var::new("x", None, None);
        let tuple = Expr::tuple(vec![Expr::call(Expr::op("relu"), vec![a.to_expr()])]);
        let block = BindingBlock::new(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: tuple,
        })]);
        let func = func_with_body(vec![a], Expr::seq(vec![block], x.to_expr()));
        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("tuple is not in ANF form")));
    }

    #[test]
    fn test_dataflow_var_cannot_escape_block() {
        let x = Var::new_dataflow("x", None, None);
        let block = BindingBlock::dataflow(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: Expr::constant(Literal::Int(1)),
        })]);
        // body references the dataflow var outside its block
        let func = func_with_body(vec![], Expr::seq(vec![block], x.to_expr()));
        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("used outside a dataflow block")));
    }

    #[test]
    fn test_dataflow_var_defined_in_plain_block() {
        let x = Var::new_dataflow("x", None, None);
        let y = Var::new("y", None, None);
        let block = BindingBlock::new(vec![
            Binding::Var(VarBinding {
                var: x.clone(),
                value: Expr::constant(Literal::Int(1)),
            }),
            Binding::Var(VarBinding {
                var: y.clone(),
                value: Expr::constant(Literal::Int(2)),
            }),
        ]);
        let func = func_with_body(vec![], Expr::seq(vec![block], y.to_expr()));
        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("defined outside a dataflow block")));
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let x = Var::new("x", None, None);
        let block = BindingBlock::new(vec![
            Binding::Var(VarBinding {
                var: x.clone(),
                value: Expr::constant(Literal::Int(1)),
            }),
            Binding::Var(VarBinding {
                var: x.clone(),
                value: Expr::constant(Literal::Int(2)),
            }),
        ]);
        let func = func_with_body(vec![], Expr::seq(vec![block], x.to_expr()));
        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("defined more than once")));
    }

    #[test]
    fn test_undefined_variable_rejected() {
        let ghost = Var::new("ghost", None, None);
        let func = func_with_body(vec![], ghost.to_expr());
        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("is not defined")));
    }

    #[test]
    fn test_match_shape_introduces_symbols() {
        let a = param("a", vec![PrimExpr::sym("N")]);
        let t = Var::new("t", Some(Type::tensor(2, DataType::Float32)), None);
        let n = Var::new(
            "n",
            None,
            Some(Expr::shape_expr(vec![PrimExpr::sym("B"), PrimExpr::sym("C")])),
        );
        let block = BindingBlock::new(vec![
            Binding::Var(VarBinding {
                var: t.clone(),
                value: a.to_expr(),
            }),
            Binding::MatchShape(MatchShape {
                value: t.to_expr(),
                pattern: vec![PrimExpr::sym("B"), PrimExpr::sym("C")],
                var: Some(n.clone()),
            }),
        ]);
        let func = func_with_body(vec![a], Expr::seq(vec![block], n.to_expr()));
        assert!(WellFormedChecker::new().check(&func).is_ok());
    }

    #[test]
    fn test_unknown_symbolic_dimension_rejected() {
        let a = param("a", vec![PrimExpr::sym("N")]);
        let x = Var::new(
            "x",
            None,
            Some(Expr::shape_expr(vec![PrimExpr::sym("M")])),
        );
        let block = BindingBlock::new(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: a.to_expr(),
        })]);
        let func = func_with_body(vec![a], Expr::seq(vec![block], x.to_expr()));
        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("symbolic variable `M`")));
    }

    #[test]
    fn test_global_vars_must_be_registered() {
        let x = Var::new("x", None, None);
        let block = BindingBlock::new(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: Expr::call(Expr::global_var("main"), vec![]),
        })]);
        let func = func_with_body(vec![], Expr::seq(vec![block], x.to_expr()));

        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("global variable `main`")));

        let mut checker = WellFormedChecker::new();
        checker.register_global_var(Id::new("main"));
        assert!(checker.check(&func).is_ok());
    }

    #[test]
    fn test_seq_expr_outside_body_position() {
        let inner = Expr::seq(vec![], Expr::constant(Literal::Int(1)));
        let x = Var::new("x", None, None);
        let block = BindingBlock::new(vec![Binding::Var(VarBinding {
            var: x.clone(),
            value: inner,
        })]);
        let func = func_with_body(vec![], Expr::seq(vec![block], x.to_expr()));
        let errors = WellFormedChecker::new().check(&func).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("may only appear as a function body")));
    }
}
