//! Parser for the embedded expression language used by `<<set>>`,
//! `<<if>>`/`<<elseif>>`, shortcut guards, and `{}` interpolation spans.
//!
//! One function per precedence level, loosest binding first:
//! or, and, equality, comparison, additive, multiplicative, unary, primary.

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, terminated};
use winnow::prelude::*;
use winnow::token::{none_of, one_of, take_while};

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// Parse a complete expression; trailing garbage is an error.
pub(crate) fn parse(input: &str) -> Result<Expr, String> {
    delimited(multispace0, expr, multispace0)
        .parse(input)
        .map_err(|e| e.to_string())
}

fn expr(i: &mut &str) -> ModalResult<Expr> {
    let mut lhs = and_expr.parse_next(i)?;
    while opt(or_op).parse_next(i)?.is_some() {
        let rhs = and_expr.parse_next(i)?;
        lhs = Expr::binary(BinaryOp::Or, lhs, rhs);
    }
    Ok(lhs)
}

fn and_expr(i: &mut &str) -> ModalResult<Expr> {
    let mut lhs = equality.parse_next(i)?;
    while opt(and_op).parse_next(i)?.is_some() {
        let rhs = equality.parse_next(i)?;
        lhs = Expr::binary(BinaryOp::And, lhs, rhs);
    }
    Ok(lhs)
}

fn equality(i: &mut &str) -> ModalResult<Expr> {
    let mut lhs = comparison.parse_next(i)?;
    while let Some(op) = opt(equality_op).parse_next(i)? {
        let rhs = comparison.parse_next(i)?;
        lhs = Expr::binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn comparison(i: &mut &str) -> ModalResult<Expr> {
    let mut lhs = term.parse_next(i)?;
    while let Some(op) = opt(comparison_op).parse_next(i)? {
        let rhs = term.parse_next(i)?;
        lhs = Expr::binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn term(i: &mut &str) -> ModalResult<Expr> {
    let mut lhs = factor.parse_next(i)?;
    while let Some(op) = opt(term_op).parse_next(i)? {
        let rhs = factor.parse_next(i)?;
        lhs = Expr::binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn factor(i: &mut &str) -> ModalResult<Expr> {
    let mut lhs = unary.parse_next(i)?;
    while let Some(op) = opt(factor_op).parse_next(i)? {
        let rhs = unary.parse_next(i)?;
        lhs = Expr::binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn or_op(i: &mut &str) -> ModalResult<()> {
    delimited(multispace0, alt(("||".void(), "or".void())), multispace0).parse_next(i)
}

fn and_op(i: &mut &str) -> ModalResult<()> {
    delimited(multispace0, alt(("&&".void(), "and".void())), multispace0).parse_next(i)
}

fn equality_op(i: &mut &str) -> ModalResult<BinaryOp> {
    delimited(
        multispace0,
        alt(("==".value(BinaryOp::Eq), "!=".value(BinaryOp::Ne))),
        multispace0,
    )
    .parse_next(i)
}

fn comparison_op(i: &mut &str) -> ModalResult<BinaryOp> {
    delimited(
        multispace0,
        alt((
            "<=".value(BinaryOp::Le),
            ">=".value(BinaryOp::Ge),
            "<".value(BinaryOp::Lt),
            ">".value(BinaryOp::Gt),
        )),
        multispace0,
    )
    .parse_next(i)
}

fn term_op(i: &mut &str) -> ModalResult<BinaryOp> {
    delimited(
        multispace0,
        alt(('+'.value(BinaryOp::Add), '-'.value(BinaryOp::Sub))),
        multispace0,
    )
    .parse_next(i)
}

fn factor_op(i: &mut &str) -> ModalResult<BinaryOp> {
    delimited(
        multispace0,
        alt((
            '*'.value(BinaryOp::Mul),
            '/'.value(BinaryOp::Div),
            '%'.value(BinaryOp::Rem),
        )),
        multispace0,
    )
    .parse_next(i)
}

fn unary(i: &mut &str) -> ModalResult<Expr> {
    preceded(
        multispace0,
        alt((
            preceded('-', unary).map(|e| Expr::unary(UnaryOp::Neg, e)),
            preceded('!', unary).map(|e| Expr::unary(UnaryOp::Not, e)),
            preceded(("not", multispace0), unary).map(|e| Expr::unary(UnaryOp::Not, e)),
            primary,
        )),
    )
    .parse_next(i)
}

fn primary(i: &mut &str) -> ModalResult<Expr> {
    alt((
        delimited('(', expr, (multispace0, ')')),
        number,
        string_literal.map(Expr::Str),
        "true".value(Expr::Bool(true)),
        "false".value(Expr::Bool(false)),
        variable,
    ))
    .parse_next(i)
}

fn number(i: &mut &str) -> ModalResult<Expr> {
    (digit1, opt(('.', digit1)))
        .take()
        .parse_to()
        .map(Expr::Number)
        .parse_next(i)
}

fn string_literal(i: &mut &str) -> ModalResult<String> {
    preceded('"', cut_err(terminated(repeat(0.., string_char), '"'))).parse_next(i)
}

fn string_char(i: &mut &str) -> ModalResult<char> {
    let c = none_of('"').parse_next(i)?;
    if c != '\\' {
        return Ok(c);
    }
    alt((
        '"'.value('"'),
        '\\'.value('\\'),
        'n'.value('\n'),
        't'.value('\t'),
    ))
    .parse_next(i)
}

fn variable(i: &mut &str) -> ModalResult<Expr> {
    preceded('$', cut_err(identifier))
        .map(Expr::Variable)
        .parse_next(i)
}

fn identifier(i: &mut &str) -> ModalResult<String> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(|s: &str| s.to_string())
        .parse_next(i)
}
