//! Operator registry.
//!
//! Operators are named primitives carrying attribute maps; the two the
//! core consumes are the shape- and type-inference hooks the block
//! builder invokes eagerly at emission. Absence of an entry is not an
//! error — inference simply reports "unknown" and the node is emitted
//! without annotations.

use crate::diag::DiagContext;
use crate::expr::{Call, Expr, ExprKind};
use crate::ty::Type;
use std::collections::HashMap;
use std::sync::Arc;

/// Shape inference hook: given a call to this operator, produce the
/// result shape (`ShapeExpr` or `RuntimeDepShape`), or `None` when it
/// cannot be determined. May report problems through the diagnostic
/// context; must not panic.
pub type FInferShape = Arc<dyn Fn(&Call, &mut DiagContext) -> Option<Expr> + Send + Sync>;

/// Type inference hook: produce the call's result type, or `None` for
/// unknown.
pub type FInferType = Arc<dyn Fn(&Call, &mut DiagContext) -> Option<Type> + Send + Sync>;

/// Attribute maps keyed by operator name.
#[derive(Clone, Default)]
pub struct OpRegistry {
    shape_fns: HashMap<String, FInferShape>,
    type_fns: HashMap<String, FInferType>,
}

impl OpRegistry {
    pub fn new() -> Self {
        OpRegistry::default()
    }

    pub fn register_shape_fn(
        &mut self,
        op: impl Into<String>,
        f: impl Fn(&Call, &mut DiagContext) -> Option<Expr> + Send + Sync + 'static,
    ) {
        self.shape_fns.insert(op.into(), Arc::new(f));
    }

    pub fn register_type_fn(
        &mut self,
        op: impl Into<String>,
        f: impl Fn(&Call, &mut DiagContext) -> Option<Type> + Send + Sync + 'static,
    ) {
        self.type_fns.insert(op.into(), Arc::new(f));
    }

    /// Run the callee's shape inference, if the callee is a registered
    /// operator with a shape hook.
    pub fn infer_shape(&self, call: &Call, diag: &mut DiagContext) -> Option<Expr> {
        let f = self.shape_fns.get(Self::op_name(call)?)?;
        f(call, diag)
    }

    /// Run the callee's type inference, if the callee is a registered
    /// operator with a type hook.
    pub fn infer_type(&self, call: &Call, diag: &mut DiagContext) -> Option<Type> {
        let f = self.type_fns.get(Self::op_name(call)?)?;
        f(call, diag)
    }

    fn op_name(call: &Call) -> Option<&str> {
        match &call.op.kind {
            ExprKind::Op(op) => Some(&op.name),
            _ => None,
        }
    }
}

impl std::fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpRegistry")
            .field("shape_fns", &self.shape_fns.keys().collect::<Vec<_>>())
            .field("type_fns", &self.type_fns.keys().collect::<Vec<_>>())
            .finish()
    }
}
