//! Callback-map adapter for external traversal overrides.
//!
//! A host environment (an embedded interpreter, a scripted pass driver)
//! can override a subset of traversal hooks by name without
//! reimplementing the rest: install a callback under one of the
//! canonical hook names and visit as usual. Hooks that are not mapped
//! fall through to the framework's default walk, and recursion keeps
//! dispatching through the bridge, so an override fires for every
//! matching node at any depth.
//!
//! A mapped hook fully replaces the default for that node: the callback
//! decides whether to recurse.

use crate::expr::{
    Binding, BindingBlock, Call, Constant, Expr, ExternFunc, Function, GlobalVar, If, MatchShape,
    OpRef, SeqExpr, ShapeExpr, Tuple, TupleGetItem, Var, VarBinding, VarData,
};
use crate::error::IrError;
use crate::mutate::{self, ExprMutator};
use crate::prim::PrimExpr;
use crate::span::Span;
use crate::ty::Type;
use crate::visit::{self, ExprVisitor};
use std::collections::HashMap;

/// The node handed to a visitor callback.
pub enum HookArg<'a> {
    Expr(&'a Expr),
    Binding(&'a Binding),
    Block(&'a BindingBlock),
    Var(&'a Var),
    Type(&'a Type),
    Span(&'a Span),
}

pub type VisitHook = Box<dyn FnMut(HookArg<'_>)>;

pub type MutateHook = Box<dyn FnMut(&Expr) -> Result<Expr, IrError>>;

/// Canonical hook names accepted by `BridgeVisitor::set_hook`.
pub const VISIT_HOOK_NAMES: &[&str] = &[
    "visit_expr",
    "visit_constant_",
    "visit_tuple_",
    "visit_var_",
    "visit_dataflow_var_",
    "visit_shape_expr_",
    "visit_runtime_dep_shape_",
    "visit_extern_func_",
    "visit_global_var_",
    "visit_function_",
    "visit_call_",
    "visit_seq_expr_",
    "visit_if_",
    "visit_op_",
    "visit_tuple_getitem_",
    "visit_binding",
    "visit_var_binding_",
    "visit_match_shape_",
    "visit_binding_block",
    "visit_binding_block_",
    "visit_dataflow_block_",
    "visit_var_def",
    "visit_var_def_",
    "visit_dataflow_var_def_",
    "visit_type",
    "visit_span",
];

/// Expression-level hook names accepted by `BridgeMutator::set_hook`.
pub const MUTATE_HOOK_NAMES: &[&str] = &[
    "visit_expr",
    "visit_constant_",
    "visit_tuple_",
    "visit_var_",
    "visit_dataflow_var_",
    "visit_shape_expr_",
    "visit_runtime_dep_shape_",
    "visit_extern_func_",
    "visit_global_var_",
    "visit_function_",
    "visit_call_",
    "visit_seq_expr_",
    "visit_if_",
    "visit_op_",
    "visit_tuple_getitem_",
];

fn canonical(names: &'static [&'static str], name: &str) -> Result<&'static str, String> {
    names
        .iter()
        .find(|n| **n == name)
        .copied()
        .ok_or_else(|| format!("unknown hook name: {}", name))
}

/// A read-only visitor whose hooks can be overridden by name.
#[derive(Default)]
pub struct BridgeVisitor {
    hooks: HashMap<&'static str, VisitHook>,
}

impl BridgeVisitor {
    pub fn new() -> Self {
        BridgeVisitor::default()
    }

    /// Install `hook` under a canonical name; rejects unknown names.
    pub fn set_hook(
        &mut self,
        name: &str,
        hook: impl FnMut(HookArg<'_>) + 'static,
    ) -> Result<(), String> {
        let name = canonical(VISIT_HOOK_NAMES, name)?;
        self.hooks.insert(name, Box::new(hook));
        Ok(())
    }

    fn run(&mut self, name: &'static str, arg: HookArg<'_>) -> bool {
        if let Some(hook) = self.hooks.get_mut(name) {
            hook(arg);
            true
        } else {
            false
        }
    }
}

impl ExprVisitor for BridgeVisitor {
    fn visit_expr(&mut self, expr: &Expr) {
        if !self.run("visit_expr", HookArg::Expr(expr)) {
            visit::walk_expr(self, expr);
        }
    }

    fn visit_constant_(&mut self, op: &Constant, expr: &Expr) {
        if !self.run("visit_constant_", HookArg::Expr(expr)) {
            visit::walk_constant(self, op, expr);
        }
    }

    fn visit_tuple_(&mut self, op: &Tuple, expr: &Expr) {
        if !self.run("visit_tuple_", HookArg::Expr(expr)) {
            visit::walk_tuple(self, op, expr);
        }
    }

    fn visit_var_(&mut self, op: &VarData, expr: &Expr) {
        if !self.run("visit_var_", HookArg::Expr(expr)) {
            visit::walk_var(self, op, expr);
        }
    }

    fn visit_dataflow_var_(&mut self, op: &VarData, expr: &Expr) {
        if !self.run("visit_dataflow_var_", HookArg::Expr(expr)) {
            visit::walk_dataflow_var(self, op, expr);
        }
    }

    fn visit_shape_expr_(&mut self, op: &ShapeExpr, expr: &Expr) {
        if !self.run("visit_shape_expr_", HookArg::Expr(expr)) {
            visit::walk_shape_expr(self, op, expr);
        }
    }

    fn visit_runtime_dep_shape_(&mut self, expr: &Expr) {
        if !self.run("visit_runtime_dep_shape_", HookArg::Expr(expr)) {
            visit::walk_runtime_dep_shape(self, expr);
        }
    }

    fn visit_extern_func_(&mut self, op: &ExternFunc, expr: &Expr) {
        if !self.run("visit_extern_func_", HookArg::Expr(expr)) {
            visit::walk_extern_func(self, op, expr);
        }
    }

    fn visit_global_var_(&mut self, op: &GlobalVar, expr: &Expr) {
        if !self.run("visit_global_var_", HookArg::Expr(expr)) {
            visit::walk_global_var(self, op, expr);
        }
    }

    fn visit_function_(&mut self, op: &Function, expr: &Expr) {
        if !self.run("visit_function_", HookArg::Expr(expr)) {
            visit::walk_function(self, op, expr);
        }
    }

    fn visit_call_(&mut self, op: &Call, expr: &Expr) {
        if !self.run("visit_call_", HookArg::Expr(expr)) {
            visit::walk_call(self, op, expr);
        }
    }

    fn visit_seq_expr_(&mut self, op: &SeqExpr, expr: &Expr) {
        if !self.run("visit_seq_expr_", HookArg::Expr(expr)) {
            visit::walk_seq_expr(self, op, expr);
        }
    }

    fn visit_if_(&mut self, op: &If, expr: &Expr) {
        if !self.run("visit_if_", HookArg::Expr(expr)) {
            visit::walk_if(self, op, expr);
        }
    }

    fn visit_op_(&mut self, op: &OpRef, expr: &Expr) {
        if !self.run("visit_op_", HookArg::Expr(expr)) {
            visit::walk_op(self, op, expr);
        }
    }

    fn visit_tuple_getitem_(&mut self, op: &TupleGetItem, expr: &Expr) {
        if !self.run("visit_tuple_getitem_", HookArg::Expr(expr)) {
            visit::walk_tuple_getitem(self, op, expr);
        }
    }

    fn visit_binding(&mut self, binding: &Binding) {
        if !self.run("visit_binding", HookArg::Binding(binding)) {
            visit::walk_binding(self, binding);
        }
    }

    fn visit_var_binding_(&mut self, binding: &VarBinding) {
        let wrapped = Binding::Var(binding.clone());
        if !self.run("visit_var_binding_", HookArg::Binding(&wrapped)) {
            visit::walk_var_binding(self, binding);
        }
    }

    fn visit_match_shape_(&mut self, binding: &MatchShape) {
        let wrapped = Binding::MatchShape(binding.clone());
        if !self.run("visit_match_shape_", HookArg::Binding(&wrapped)) {
            visit::walk_match_shape(self, binding);
        }
    }

    fn visit_binding_block(&mut self, block: &BindingBlock) {
        if !self.run("visit_binding_block", HookArg::Block(block)) {
            visit::walk_binding_block(self, block);
        }
    }

    fn visit_binding_block_(&mut self, block: &BindingBlock) {
        if !self.run("visit_binding_block_", HookArg::Block(block)) {
            visit::walk_binding_block_default(self, block);
        }
    }

    fn visit_dataflow_block_(&mut self, block: &BindingBlock) {
        if !self.run("visit_dataflow_block_", HookArg::Block(block)) {
            visit::walk_binding_block_default(self, block);
        }
    }

    fn visit_var_def(&mut self, var: &Var) {
        if !self.run("visit_var_def", HookArg::Var(var)) {
            visit::walk_var_def(self, var);
        }
    }

    fn visit_var_def_(&mut self, var: &Var) {
        if !self.run("visit_var_def_", HookArg::Var(var)) {
            visit::walk_var_def_default(self, var);
        }
    }

    fn visit_dataflow_var_def_(&mut self, var: &Var) {
        if !self.run("visit_dataflow_var_def_", HookArg::Var(var)) {
            visit::walk_var_def_default(self, var);
        }
    }

    fn visit_type(&mut self, ty: &Type) {
        self.run("visit_type", HookArg::Type(ty));
    }

    fn visit_span(&mut self, span: &Span) {
        self.run("visit_span", HookArg::Span(span));
    }

    fn visit_prim_expr(&mut self, _prim: &PrimExpr) {}
}

/// A rewriting mutator whose expression hooks can be overridden by name.
#[derive(Default)]
pub struct BridgeMutator {
    hooks: HashMap<&'static str, MutateHook>,
}

impl BridgeMutator {
    pub fn new() -> Self {
        BridgeMutator::default()
    }

    /// Install `hook` under a canonical name; rejects unknown names.
    pub fn set_hook(
        &mut self,
        name: &str,
        hook: impl FnMut(&Expr) -> Result<Expr, IrError> + 'static,
    ) -> Result<(), String> {
        let name = canonical(MUTATE_HOOK_NAMES, name)?;
        self.hooks.insert(name, Box::new(hook));
        Ok(())
    }

    fn run(&mut self, name: &'static str, expr: &Expr) -> Option<Result<Expr, IrError>> {
        self.hooks.get_mut(name).map(|hook| hook(expr))
    }
}

impl ExprMutator for BridgeMutator {
    fn visit_expr(&mut self, expr: &Expr) -> Result<Expr, IrError> {
        match self.run("visit_expr", expr) {
            Some(result) => result,
            None => mutate::mutate_expr(self, expr),
        }
    }

    fn visit_constant_(&mut self, _op: &Constant, expr: &Expr) -> Result<Expr, IrError> {
        self.run("visit_constant_", expr)
            .unwrap_or_else(|| Ok(expr.clone()))
    }

    fn visit_tuple_(&mut self, op: &Tuple, expr: &Expr) -> Result<Expr, IrError> {
        match self.run("visit_tuple_", expr) {
            Some(result) => result,
            None => mutate::mutate_tuple(self, op, expr),
        }
    }

    fn visit_var_(&mut self, _op: &VarData, expr: &Expr) -> Result<Expr, IrError> {
        self.run("visit_var_", expr)
            .unwrap_or_else(|| Ok(expr.clone()))
    }

    fn visit_dataflow_var_(&mut self, _op: &VarData, expr: &Expr) -> Result<Expr, IrError> {
        self.run("visit_dataflow_var_", expr)
            .unwrap_or_else(|| Ok(expr.clone()))
    }

    fn visit_shape_expr_(&mut self, op: &ShapeExpr, expr: &Expr) -> Result<Expr, IrError> {
        match self.run("visit_shape_expr_", expr) {
            Some(result) => result,
            None => mutate::mutate_shape_expr(self, op, expr),
        }
    }

    fn visit_runtime_dep_shape_(&mut self, expr: &Expr) -> Result<Expr, IrError> {
        self.run("visit_runtime_dep_shape_", expr)
            .unwrap_or_else(|| Ok(expr.clone()))
    }

    fn visit_extern_func_(&mut self, _op: &ExternFunc, expr: &Expr) -> Result<Expr, IrError> {
        self.run("visit_extern_func_", expr)
            .unwrap_or_else(|| Ok(expr.clone()))
    }

    fn visit_global_var_(&mut self, _op: &GlobalVar, expr: &Expr) -> Result<Expr, IrError> {
        self.run("visit_global_var_", expr)
            .unwrap_or_else(|| Ok(expr.clone()))
    }

    fn visit_function_(&mut self, op: &Function, expr: &Expr) -> Result<Expr, IrError> {
        match self.run("visit_function_", expr) {
            Some(result) => result,
            None => mutate::mutate_function(self, op, expr),
        }
    }

    fn visit_call_(&mut self, op: &Call, expr: &Expr) -> Result<Expr, IrError> {
        match self.run("visit_call_", expr) {
            Some(result) => result,
            None => mutate::mutate_call(self, op, expr),
        }
    }

    fn visit_seq_expr_(&mut self, op: &SeqExpr, expr: &Expr) -> Result<Expr, IrError> {
        match self.run("visit_seq_expr_", expr) {
            Some(result) => result,
            None => mutate::mutate_seq_expr(self, op, expr),
        }
    }

    fn visit_if_(&mut self, op: &If, expr: &Expr) -> Result<Expr, IrError> {
        match self.run("visit_if_", expr) {
            Some(result) => result,
            None => mutate::mutate_if(self, op, expr),
        }
    }

    fn visit_op_(&mut self, _op: &OpRef, expr: &Expr) -> Result<Expr, IrError> {
        self.run("visit_op_", expr)
            .unwrap_or_else(|| Ok(expr.clone()))
    }

    fn visit_tuple_getitem_(&mut self, op: &TupleGetItem, expr: &Expr) -> Result<Expr, IrError> {
        match self.run("visit_tuple_getitem_", expr) {
            Some(result) => result,
            None => mutate::mutate_tuple_getitem(self, op, expr),
        }
    }
}
