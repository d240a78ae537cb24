//! Incremental, scope-checked IR construction.
//!
//! The `BlockBuilder` assembles binding blocks through a stack of open
//! frames. Every emission allocates a fresh variable, appends a binding
//! to the innermost frame, and — for calls — runs the operator's shape
//! and type inference eagerly so the tree stays annotated as it grows.
//!
//! Frame lifecycle: `begin_dataflow_block`/`begin_binding_block` open a
//! frame, `emit*` append to the top frame, `end_block` seals it into a
//! `BindingBlock`. Structural misuse (emitting with no open frame,
//! violating dataflow scoping) records a fatal diagnostic and returns an
//! error; a failed or missing inference rule only costs annotations.

use crate::analyzer::{Analyzer, PrimAnalyzer};
use crate::diag::DiagContext;
use crate::error::IrError;
use crate::expr::{
    Binding, BindingBlock, Expr, ExprKind, Id, MatchShape, Var, VarBinding,
};
use crate::names::NameTable;
use crate::prim::PrimExpr;
use crate::registry::OpRegistry;
use crate::span::Span;
use crate::ty::Type;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// An open, not yet sealed block.
#[derive(Debug)]
struct BlockFrame {
    bindings: Vec<Binding>,
    is_dataflow: bool,
}

pub struct BlockBuilder {
    block_stack: Vec<BlockFrame>,
    binding_table: HashMap<Id, Expr>,
    name_table: NameTable,
    diag: DiagContext,
    registry: Arc<OpRegistry>,
    analyzer: Box<dyn PrimAnalyzer>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(OpRegistry::new()))
    }

    pub fn with_registry(registry: Arc<OpRegistry>) -> Self {
        BlockBuilder {
            block_stack: Vec::new(),
            binding_table: HashMap::new(),
            name_table: NameTable::new(),
            diag: DiagContext::new(),
            registry,
            analyzer: Box::new(Analyzer::new()),
        }
    }

    /// Swap in a different symbolic-equality oracle.
    pub fn set_analyzer(&mut self, analyzer: Box<dyn PrimAnalyzer>) {
        self.analyzer = analyzer;
    }

    pub fn diag(&self) -> &DiagContext {
        &self.diag
    }

    pub fn diag_mut(&mut self) -> &mut DiagContext {
        &mut self.diag
    }

    // ── frame lifecycle ──

    pub fn begin_dataflow_block(&mut self) {
        debug!("begin dataflow block");
        self.block_stack.push(BlockFrame {
            bindings: Vec::new(),
            is_dataflow: true,
        });
    }

    pub fn begin_binding_block(&mut self) {
        debug!("begin binding block");
        self.block_stack.push(BlockFrame {
            bindings: Vec::new(),
            is_dataflow: false,
        });
    }

    /// Seal and return the innermost open block.
    pub fn end_block(&mut self) -> Result<BindingBlock, IrError> {
        match self.block_stack.pop() {
            Some(frame) => {
                debug!(
                    bindings = frame.bindings.len(),
                    dataflow = frame.is_dataflow,
                    "end block"
                );
                Ok(BindingBlock {
                    bindings: frame.bindings,
                    is_dataflow: frame.is_dataflow,
                })
            }
            None => Err(self.diag.fatal(Span::default(), IrError::NoOpenBlock)),
        }
    }

    pub fn current_block_is_dataflow(&mut self) -> Result<bool, IrError> {
        match self.block_stack.last() {
            Some(frame) => Ok(frame.is_dataflow),
            None => Err(self.diag.fatal(Span::default(), IrError::NoOpenBlock)),
        }
    }

    // ── emission ──

    /// Bind `expr` to a fresh variable in the innermost frame. Calls get
    /// eager shape/type inference; the inferred results are stamped on
    /// both the fresh variable and a fresh call node.
    pub fn emit(&mut self, expr: Expr) -> Result<Var, IrError> {
        self.emit_with_hint(expr, "")
    }

    pub fn emit_with_hint(&mut self, expr: Expr, name_hint: &str) -> Result<Var, IrError> {
        let is_dataflow = self.current_block_is_dataflow()?;
        self.emit_internal(expr, is_dataflow, name_hint)
    }

    fn emit_internal(
        &mut self,
        expr: Expr,
        bind_as_dataflow: bool,
        name_hint: &str,
    ) -> Result<Var, IrError> {
        let hint = if name_hint.is_empty() {
            if bind_as_dataflow {
                "lv"
            } else {
                "gv"
            }
        } else {
            name_hint
        };
        let vid = Id::new(self.name_table.get_unique_name(hint));
        let var = Var::with_id(vid.clone(), None, None, bind_as_dataflow, Span::default());

        let value = if let ExprKind::Call(call) = &expr.kind {
            let inferred_shape = self.registry.infer_shape(call, &mut self.diag);
            let inferred_type = self.registry.infer_type(call, &mut self.diag);

            if let Some(shape) = &inferred_shape {
                var.stamp_shape(shape.clone());
            }
            if let Some(ty) = &inferred_type {
                var.stamp_checked_type(ty.clone());
            }

            // same operands, freshly stamped annotations
            let new_call = Expr::new(ExprKind::Call(call.clone()), expr.span);
            if let Some(ty) = inferred_type {
                new_call.stamp_checked_type(ty);
            }
            if let Some(shape) = inferred_shape {
                new_call.stamp_shape(shape);
            }
            new_call
        } else {
            // other values keep their own annotations; mirror them on
            // the fresh variable so downstream emissions can see them
            if let Some(ty) = expr.checked_type() {
                var.stamp_checked_type(ty.clone());
            }
            if let Some(shape) = expr.shape() {
                var.stamp_shape(shape.clone());
            }
            expr
        };

        debug!(name = %vid, "emit");
        self.binding_table.insert(vid, value.clone());
        let frame = self.block_stack.last_mut().ok_or(IrError::NoOpenBlock)?;
        frame.bindings.push(Binding::Var(VarBinding {
            var: var.clone(),
            value,
        }));
        Ok(var)
    }

    /// Append an existing binding, checking it against the frame kind.
    pub fn emit_var_binding(&mut self, binding: VarBinding) -> Result<Var, IrError> {
        let is_dataflow = self.current_block_is_dataflow()?;
        if is_dataflow && !binding.var.is_dataflow() {
            return Err(self.diag.fatal(
                binding.var.span(),
                IrError::DataflowScopeViolation {
                    name: binding.var.name().to_string(),
                    message: "a dataflow block binds dataflow variables; use emit_output for \
                              block results"
                        .to_string(),
                },
            ));
        }
        if !is_dataflow && binding.var.is_dataflow() {
            return Err(self.diag.fatal(
                binding.var.span(),
                IrError::DataflowScopeViolation {
                    name: binding.var.name().to_string(),
                    message: "dataflow variables may only be bound inside a dataflow block"
                        .to_string(),
                },
            ));
        }
        self.binding_table
            .insert(binding.var.vid().clone(), binding.value.clone());
        let frame = self.block_stack.last_mut().ok_or(IrError::NoOpenBlock)?;
        frame.bindings.push(Binding::Var(binding.clone()));
        Ok(binding.var)
    }

    /// Bind the runtime shape of `value` against `pattern`, introducing
    /// a fresh variable annotated with the pattern shape.
    pub fn emit_match_shape(
        &mut self,
        value: Expr,
        pattern: Vec<PrimExpr>,
    ) -> Result<Var, IrError> {
        self.emit_match_shape_with_hint(value, pattern, "")
    }

    pub fn emit_match_shape_with_hint(
        &mut self,
        value: Expr,
        pattern: Vec<PrimExpr>,
        name_hint: &str,
    ) -> Result<Var, IrError> {
        let is_dataflow = self.current_block_is_dataflow()?;
        let hint = if name_hint.is_empty() {
            if is_dataflow {
                "lv"
            } else {
                "gv"
            }
        } else {
            name_hint
        };
        let vid = Id::new(self.name_table.get_unique_name(hint));
        let var = Var::with_id(vid, None, None, is_dataflow, Span::default());

        match value.checked_type() {
            Some(Type::Shape) => {
                var.stamp_checked_type(Type::Shape);
            }
            Some(Type::DynTensor { dtype, .. }) => {
                var.stamp_shape(Expr::shape_expr(pattern.clone()));
                var.stamp_checked_type(Type::DynTensor {
                    rank: Some(pattern.len()),
                    dtype: *dtype,
                });
            }
            other => {
                let found = match other {
                    Some(ty) => ty.to_string(),
                    None => "an unannotated value".to_string(),
                };
                return Err(self
                    .diag
                    .fatal(value.span, IrError::BadMatchShapeOperand { found }));
            }
        }

        let frame = self.block_stack.last_mut().ok_or(IrError::NoOpenBlock)?;
        frame.bindings.push(Binding::MatchShape(MatchShape {
            value,
            pattern,
            var: Some(var.clone()),
        }));
        Ok(var)
    }

    /// Append an existing match-shape binding. The bound variable, when
    /// present, must be an ordinary `Var` even inside a dataflow block:
    /// a shape binding may outlive the block that establishes it.
    pub fn emit_match_shape_binding(
        &mut self,
        binding: MatchShape,
    ) -> Result<Option<Var>, IrError> {
        let is_dataflow = self.current_block_is_dataflow()?;
        if is_dataflow {
            if let Some(var) = &binding.var {
                if var.is_dataflow() {
                    return Err(self.diag.fatal(
                        var.span(),
                        IrError::DataflowScopeViolation {
                            name: var.name().to_string(),
                            message: "a match-shape binding cannot introduce a dataflow variable"
                                .to_string(),
                        },
                    ));
                }
            }
        }
        let var = binding.var.clone();
        let frame = self.block_stack.last_mut().ok_or(IrError::NoOpenBlock)?;
        frame.bindings.push(Binding::MatchShape(binding));
        Ok(var)
    }

    /// Emit `expr` as an ordinary variable from inside a dataflow block,
    /// making the value visible outside the block.
    pub fn emit_output(&mut self, expr: Expr) -> Result<Var, IrError> {
        self.emit_output_with_hint(expr, "")
    }

    pub fn emit_output_with_hint(&mut self, expr: Expr, name_hint: &str) -> Result<Var, IrError> {
        let is_dataflow = self.current_block_is_dataflow()?;
        if !is_dataflow {
            return Err(self
                .diag
                .fatal(expr.span, IrError::OutputOutsideDataflow));
        }
        self.emit_internal(expr, false, name_hint)
    }

    /// Append an existing output binding; the bound variable must not be
    /// a dataflow variable.
    pub fn emit_output_var_binding(&mut self, binding: VarBinding) -> Result<Var, IrError> {
        let is_dataflow = self.current_block_is_dataflow()?;
        if !is_dataflow {
            return Err(self
                .diag
                .fatal(binding.var.span(), IrError::OutputOutsideDataflow));
        }
        if binding.var.is_dataflow() {
            return Err(self.diag.fatal(
                binding.var.span(),
                IrError::DataflowScopeViolation {
                    name: binding.var.name().to_string(),
                    message: "an output binding must use an ordinary variable".to_string(),
                },
            ));
        }
        self.binding_table
            .insert(binding.var.vid().clone(), binding.value.clone());
        let frame = self.block_stack.last_mut().ok_or(IrError::NoOpenBlock)?;
        frame.bindings.push(Binding::Var(binding.clone()));
        Ok(binding.var)
    }

    // ── queries ──

    /// The bound right-hand side of `var`; fatal when absent.
    pub fn lookup_var(&mut self, var: &Var) -> Result<Expr, IrError> {
        match self.binding_table.get(var.vid()) {
            Some(expr) => Ok(expr.clone()),
            None => Err(self.diag.fatal(
                var.span(),
                IrError::UnknownVar {
                    name: var.name().to_string(),
                },
            )),
        }
    }

    /// Non-fatal lookup; `None` for anything never emitted here (e.g.
    /// function parameters).
    pub fn try_lookup_var(&self, var: &Var) -> Option<Expr> {
        self.binding_table.get(var.vid()).cloned()
    }

    /// True when `lhs` and `rhs` are the same shape: identical
    /// references, or shape expressions of equal rank whose dimensions
    /// the oracle proves equal pairwise. Conservative otherwise.
    pub fn can_prove_shape_equal(&self, lhs: &Expr, rhs: &Expr) -> bool {
        if lhs.same_as(rhs) {
            return true;
        }
        if let (ExprKind::ShapeExpr(a), ExprKind::ShapeExpr(b)) = (&lhs.kind, &rhs.kind) {
            if a.values.len() != b.values.len() {
                return false;
            }
            return a
                .values
                .iter()
                .zip(&b.values)
                .all(|(x, y)| self.analyzer.can_prove_equal(x, y));
        }
        false
    }

    /// Stamp inference results onto a call. Only a `ShapeExpr` result is
    /// written to the call's shape slot; other inferred shape forms are
    /// dropped here (they still reach variables through `emit`).
    /// Non-calls pass through untouched. Idempotent.
    pub fn normalize(&mut self, expr: Expr) -> Expr {
        if let ExprKind::Call(call) = &expr.kind {
            if let Some(shape) = self.registry.infer_shape(call, &mut self.diag) {
                if matches!(shape.kind, ExprKind::ShapeExpr(_)) {
                    expr.stamp_shape(shape);
                }
            }
            if let Some(ty) = self.registry.infer_type(call, &mut self.diag) {
                expr.stamp_checked_type(ty);
            }
        }
        expr
    }
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BlockBuilder {
    fn drop(&mut self) {
        if !self.block_stack.is_empty() {
            warn!(
                frames = self.block_stack.len(),
                "{}",
                IrError::UnclosedBlock {
                    count: self.block_stack.len()
                }
            );
        }
    }
}

impl std::fmt::Debug for BlockBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockBuilder")
            .field("open_frames", &self.block_stack.len())
            .field("bindings", &self.binding_table.len())
            .finish()
    }
}
