//! The symbolic dimension sublanguage.
//!
//! Shape dimensions are drawn from a small arithmetic language over
//! integers and named symbolic sizes (`N`, `batch`, `2 * D`). These are
//! plain values, not IR nodes; a `ShapeExpr` carries a list of them.

use std::fmt;

/// Binary operations over dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
    Add,
    Sub,
    Mul,
}

/// A dimension expression: concrete, symbolic, or compound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimExpr {
    /// Concrete literal dimension, e.g. 768
    Lit(i64),
    /// Symbolic variable, e.g. `N`, `batch`
    Sym(String),
    /// Binary operation on dimensions
    Bin(Box<PrimExpr>, PrimOp, Box<PrimExpr>),
}

impl PrimExpr {
    pub fn sym(name: impl Into<String>) -> Self {
        PrimExpr::Sym(name.into())
    }

    pub fn add(lhs: PrimExpr, rhs: PrimExpr) -> Self {
        PrimExpr::Bin(Box::new(lhs), PrimOp::Add, Box::new(rhs))
    }

    pub fn sub(lhs: PrimExpr, rhs: PrimExpr) -> Self {
        PrimExpr::Bin(Box::new(lhs), PrimOp::Sub, Box::new(rhs))
    }

    pub fn mul(lhs: PrimExpr, rhs: PrimExpr) -> Self {
        PrimExpr::Bin(Box::new(lhs), PrimOp::Mul, Box::new(rhs))
    }

    /// Fold literal subtrees bottom-up. `N + 0` stays symbolic; `2 * 3`
    /// becomes `6`. Subtraction saturates at zero since dimensions are
    /// non-negative.
    pub fn simplify(&self) -> PrimExpr {
        match self {
            PrimExpr::Lit(_) | PrimExpr::Sym(_) => self.clone(),
            PrimExpr::Bin(a, op, b) => {
                let ra = a.simplify();
                let rb = b.simplify();
                if let (PrimExpr::Lit(x), PrimExpr::Lit(y)) = (&ra, &rb) {
                    let v = match op {
                        PrimOp::Add => x + y,
                        PrimOp::Sub => (x - y).max(0),
                        PrimOp::Mul => x * y,
                    };
                    return PrimExpr::Lit(v);
                }
                PrimExpr::Bin(Box::new(ra), *op, Box::new(rb))
            }
        }
    }

    /// The literal value, if this expression is (or folds to) one.
    pub fn as_lit(&self) -> Option<i64> {
        match self.simplify() {
            PrimExpr::Lit(n) => Some(n),
            _ => None,
        }
    }

    /// Collect the symbolic variable names occurring in this expression.
    pub fn collect_syms(&self, out: &mut Vec<String>) {
        match self {
            PrimExpr::Lit(_) => {}
            PrimExpr::Sym(s) => out.push(s.clone()),
            PrimExpr::Bin(a, _, b) => {
                a.collect_syms(out);
                b.collect_syms(out);
            }
        }
    }
}

impl fmt::Display for PrimExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimExpr::Lit(n) => write!(f, "{}", n),
            PrimExpr::Sym(s) => write!(f, "{}", s),
            PrimExpr::Bin(a, op, b) => {
                let sym = match op {
                    PrimOp::Add => "+",
                    PrimOp::Sub => "-",
                    PrimOp::Mul => "*",
                };
                write!(f, "({} {} {})", a, sym, b)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_folds_literals() {
        let e = PrimExpr::mul(PrimExpr::Lit(2), PrimExpr::add(PrimExpr::Lit(3), PrimExpr::Lit(4)));
        assert_eq!(e.simplify(), PrimExpr::Lit(14));
    }

    #[test]
    fn test_simplify_keeps_symbols() {
        let e = PrimExpr::add(PrimExpr::sym("N"), PrimExpr::Lit(0));
        assert_eq!(
            e.simplify(),
            PrimExpr::add(PrimExpr::sym("N"), PrimExpr::Lit(0))
        );
    }

    #[test]
    fn test_sub_saturates() {
        let e = PrimExpr::sub(PrimExpr::Lit(3), PrimExpr::Lit(5));
        assert_eq!(e.simplify(), PrimExpr::Lit(0));
    }

    #[test]
    fn test_display() {
        let e = PrimExpr::mul(PrimExpr::sym("N"), PrimExpr::Lit(2));
        assert_eq!(format!("{}", e), "(N * 2)");
    }
}
