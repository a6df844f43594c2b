//! Predicate canonicalization (spec §4.I "Optimizer").
//!
//! Operates purely on the `Expr` tree produced by the parser's boolean
//! grammar (`Cmp`/`Not`/`And`/`Or`/`BoolLiteral`); arithmetic subtrees
//! (`Binary`, `Call`) are left untouched since constant folding is
//! scoped to literal-vs-literal comparisons, not general expression
//! evaluation.

use super::ast::{CmpOp, Expr, Literal};

/// Applies, in order: double-negation/De Morgan push-through, literal
/// constant folding, associative flatten + dedup of AND/OR, then
/// deterministic child ordering.
pub fn canonicalize(expr: &Expr) -> Expr {
    let folded = fold(expr);
    normalize_bool_tree(&folded)
}

fn fold(expr: &Expr) -> Expr {
    match expr {
        Expr::Not(inner) => {
            let inner = fold(inner);
            match inner {
                Expr::Not(grandchild) => *grandchild, // NOT NOT p -> p
                Expr::BoolLiteral(b) => Expr::BoolLiteral(!b),
                Expr::And(a, b) => {
                    // De Morgan: NOT (a AND b) -> (NOT a) OR (NOT b)
                    fold(&Expr::Or(Box::new(Expr::Not(a)), Box::new(Expr::Not(b))))
                }
                Expr::Or(a, b) => fold(&Expr::And(Box::new(Expr::Not(a)), Box::new(Expr::Not(b)))),
                other => Expr::Not(Box::new(other)),
            }
        }
        Expr::And(a, b) => fold_and_or(fold(a), fold(b), true),
        Expr::Or(a, b) => fold_and_or(fold(a), fold(b), false),
        Expr::Cmp(op, l, r) => {
            let l = fold(l);
            let r = fold(r);
            if let (Expr::Literal(lit_l), Expr::Literal(lit_r)) = (&l, &r) {
                return Expr::BoolLiteral(compare_literals(*op, lit_l, lit_r));
            }
            Expr::Cmp(*op, Box::new(l), Box::new(r))
        }
        other => other.clone(),
    }
}

fn fold_and_or(l: Expr, r: Expr, is_and: bool) -> Expr {
    match (&l, &r) {
        (Expr::BoolLiteral(lb), Expr::BoolLiteral(rb)) => {
            Expr::BoolLiteral(if is_and { *lb && *rb } else { *lb || *rb })
        }
        (Expr::BoolLiteral(b), other) | (other, Expr::BoolLiteral(b)) => {
            // true AND-child removed (identity); false AND-child collapses to
            // false. Symmetric for OR.
            if is_and {
                if *b {
                    other.clone()
                } else {
                    Expr::BoolLiteral(false)
                }
            } else if *b {
                Expr::BoolLiteral(true)
            } else {
                other.clone()
            }
        }
        _ => {
            if is_and {
                Expr::And(Box::new(l), Box::new(r))
            } else {
                Expr::Or(Box::new(l), Box::new(r))
            }
        }
    }
}

fn compare_literals(op: CmpOp, l: &Literal, r: &Literal) -> bool {
    let lv = l.to_value();
    let rv = r.to_value();
    op.to_compare_op().apply(lv.compare(&rv))
}

/// Flattens nested AND/OR of the same kind into a sorted, deduplicated
/// list, then rebuilds a right-nested binary chain (spec step 3 and 5).
fn normalize_bool_tree(expr: &Expr) -> Expr {
    match expr {
        Expr::And(_, _) => {
            let mut kids = Vec::new();
            flatten(expr, true, &mut kids);
            rebuild(kids, true)
        }
        Expr::Or(_, _) => {
            let mut kids = Vec::new();
            flatten(expr, false, &mut kids);
            rebuild(kids, false)
        }
        Expr::Not(inner) => Expr::Not(Box::new(normalize_bool_tree(inner))),
        other => other.clone(),
    }
}

fn flatten(expr: &Expr, is_and: bool, out: &mut Vec<Expr>) {
    match expr {
        Expr::And(a, b) if is_and => {
            flatten(a, is_and, out);
            flatten(b, is_and, out);
        }
        Expr::Or(a, b) if !is_and => {
            flatten(a, is_and, out);
            flatten(b, is_and, out);
        }
        other => out.push(normalize_bool_tree(other)),
    }
}

fn rebuild(mut kids: Vec<Expr>, is_and: bool) -> Expr {
    kids.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    kids.dedup_by(|a, b| a == b);
    let mut iter = kids.into_iter();
    let first = iter.next().unwrap_or(Expr::BoolLiteral(is_and));
    iter.fold(first, |acc, next| {
        if is_and {
            Expr::And(Box::new(acc), Box::new(next))
        } else {
            Expr::Or(Box::new(acc), Box::new(next))
        }
    })
}

/// Stable ordering key `(kind, column, op, rendered-rhs)` so logically
/// equivalent predicates produce structurally equal trees.
fn sort_key(expr: &Expr) -> String {
    match expr {
        Expr::BoolLiteral(b) => format!("0-bool-{}", b),
        Expr::Cmp(op, l, r) => format!("1-cmp-{:?}-{}-{}", op, render(l), render(r)),
        Expr::Not(inner) => format!("2-not-{}", sort_key(inner)),
        Expr::And(_, _) => format!("3-and-{:?}", expr),
        Expr::Or(_, _) => format!("4-or-{:?}", expr),
        other => format!("5-other-{:?}", other),
    }
}

fn render(expr: &Expr) -> String {
    match expr {
        Expr::Literal(Literal::Integer(i)) => i.to_string(),
        Expr::Literal(Literal::Float(f)) => f.to_string(),
        Expr::Literal(Literal::Str(s)) => s.clone(),
        Expr::Ident(name) => name.clone(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kadeql::parser::Parser;
    use crate::kadeql::ast::Statement;

    fn where_expr(sql: &str) -> Expr {
        match Parser::parse(sql).unwrap() {
            Statement::Select(s) => s.where_.unwrap(),
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn double_negation_cancels() {
        let e = where_expr("SELECT * FROM t WHERE NOT (NOT (age > 1))");
        let c = canonicalize(&e);
        assert!(matches!(c, Expr::Cmp(CmpOp::Gt, _, _)));
    }

    #[test]
    fn de_morgan_pushes_not_through_and() {
        let e = where_expr("SELECT * FROM t WHERE NOT (age > 1 AND name = 'x')");
        let c = canonicalize(&e);
        assert!(matches!(c, Expr::Or(_, _)));
    }

    #[test]
    fn literal_comparison_folds_to_constant() {
        let e = where_expr("SELECT * FROM t WHERE 1 = 1");
        assert_eq!(canonicalize(&e), Expr::BoolLiteral(true));
    }

    #[test]
    fn true_and_child_is_removed() {
        let e = where_expr("SELECT * FROM t WHERE (1 = 1) AND age > 1");
        let c = canonicalize(&e);
        assert!(matches!(c, Expr::Cmp(CmpOp::Gt, _, _)));
    }

    #[test]
    fn dedup_and_deterministic_ordering_match_across_equivalent_trees() {
        let a = where_expr("SELECT * FROM t WHERE age > 1 AND name = 'x'");
        let b = where_expr("SELECT * FROM t WHERE name = 'x' AND age > 1");
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn duplicate_children_collapse() {
        let e = where_expr("SELECT * FROM t WHERE age > 1 AND age > 1");
        let c = canonicalize(&e);
        assert!(matches!(c, Expr::Cmp(CmpOp::Gt, _, _)));
    }
}
