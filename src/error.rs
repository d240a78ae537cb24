//! Error taxonomy for IR construction and traversal.
//!
//! Structural misuse is fatal: the offending operation records a
//! diagnostic and returns one of these. Operator inference weaknesses are
//! deliberately *not* fatal and mostly never surface here (see
//! `BlockBuilder`).

use crate::expr::ExprVariant;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IrError {
    /// A traversal was handed an absent expression.
    #[error("encountered a null expression during traversal")]
    NullNode,

    /// Dispatch reached a variant with no handler and no default.
    #[error("no handler for {variant} nodes")]
    UnhandledVariant { variant: ExprVariant },

    /// A builder was dropped while block frames were still open.
    #[error("block builder dropped with {count} unclosed frame(s)")]
    UnclosedBlock { count: usize },

    /// An emit or end-block was attempted with no open frame.
    #[error("no block frame is open")]
    NoOpenBlock,

    /// `lookup_var` on an id that is not in the binding table.
    #[error("variable `{name}` is not in the binding table")]
    UnknownVar { name: String },

    /// `emit_match_shape` on a value that is neither tensor- nor
    /// shape-typed.
    #[error("match-shape operand must be of tensor or shape type, got {found}")]
    BadMatchShapeOperand { found: String },

    /// `emit_output` outside a dataflow block.
    #[error("emit_output must be called inside a dataflow block")]
    OutputOutsideDataflow,

    /// A dataflow variable escaped its block, or an ordinary variable
    /// appeared where a dataflow variable is required.
    #[error("dataflow scope violation for `{name}`: {message}")]
    DataflowScopeViolation { name: String, message: String },

    /// An operator's inference routine reported a problem. Emission
    /// continues with partial annotations; this variant exists for
    /// callers that want to surface the condition themselves.
    #[error("shape/type inference for operator `{op}` failed: {message}")]
    OperatorInferenceFailure { op: String, message: String },
}
