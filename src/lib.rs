//! riptide — a functional, ANF-style tensor-program IR.
//!
//! The crate provides three tightly coupled pieces:
//!
//! * the expression AST (`expr`, `ty`, `prim`): a statically typed
//!   functional language over tensors, with pure dataflow blocks,
//!   impure binding blocks, and publish-once shape/type metadata;
//! * a generic traversal framework (`functor`, `visit`, `mutate`):
//!   variant-tag dispatch with a read-only visitor and a
//!   sharing-preserving rewriter derived from it;
//! * the block builder (`builder`, `normalize`): a stack-structured
//!   constructor that enforces scoping invariants and runs per-operator
//!   shape/type inference eagerly, plus the ANF-enforcing mutator built
//!   on top of it.
//!
//! ```
//! use riptide::builder::BlockBuilder;
//! use riptide::expr::{Expr, Var};
//! use riptide::ty::{DataType, Type};
//!
//! let mut bb = BlockBuilder::new();
//! let a = Var::new("a", Some(Type::tensor(1, DataType::Float32)), None);
//!
//! bb.begin_dataflow_block();
//! let x = bb
//!     .emit(Expr::call(Expr::op("add"), vec![a.to_expr(), a.to_expr()]))
//!     .unwrap();
//! let _y = bb.emit_output(x.to_expr()).unwrap();
//! let block = bb.end_block().unwrap();
//!
//! assert!(block.is_dataflow);
//! assert_eq!(block.bindings.len(), 2);
//! ```

pub mod analyzer;
pub mod bridge;
pub mod builder;
pub mod diag;
pub mod error;
pub mod expr;
pub mod functor;
pub mod mutate;
pub mod names;
pub mod normalize;
pub mod prim;
pub mod registry;
pub mod span;
pub mod ty;
pub mod visit;
pub mod well_formed;

pub use analyzer::{Analyzer, PrimAnalyzer};
pub use builder::BlockBuilder;
pub use diag::DiagContext;
pub use error::IrError;
pub use expr::{
    Binding, BindingBlock, Expr, ExprKind, ExprVariant, Id, Literal, MatchShape, Var, VarBinding,
};
pub use functor::ExprFunctor;
pub use mutate::ExprMutator;
pub use names::NameTable;
pub use normalize::{ExprNormalizer, Normalizer};
pub use prim::{PrimExpr, PrimOp};
pub use registry::OpRegistry;
pub use span::Span;
pub use ty::{DataType, Type};
pub use visit::{post_order_visit, ExprVisitor};
pub use well_formed::WellFormedChecker;
