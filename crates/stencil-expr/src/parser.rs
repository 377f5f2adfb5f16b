//! Recursive-descent parser for the expression language.
//!
//! Precedence, low to high: conditional, `or`, `and`, `not`, comparison
//! chains (including `in` / `not in`), additive, multiplicative, unary
//! minus, power, postfix (attribute, subscript/slice, call).

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Stmt, UnaryOp};
use crate::error::SyntaxError;
use crate::token::{tokenize, Tok};
use crate::value::Value;

const KEYWORDS: &[&str] = &["and", "or", "not", "in", "if", "else", "for"];

/// Parses a complete expression; trailing tokens are an error.
pub fn parse_expr(src: &str) -> Result<Expr, SyntaxError> {
    let mut parser = Parser::new(src)?;
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parses one `code` statement: `name = expr` or a bare expression.
pub fn parse_stmt(src: &str) -> Result<Stmt, SyntaxError> {
    let mut parser = Parser::new(src)?;
    if let Some(Tok::Ident(name)) = parser.peek().cloned() {
        if !is_keyword(&name) && parser.peek_at(1) == Some(&Tok::Assign) {
            parser.advance();
            parser.advance();
            let value = parser.expression()?;
            parser.expect_end()?;
            return Ok(Stmt::Assign {
                target: name,
                value,
            });
        }
    }
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(Stmt::Expr(expr))
}

/// Parses a comma-separated argument list: positional expressions and
/// `name=expr` keyword arguments (keywords must come last). An empty or
/// whitespace-only source yields no arguments.
pub fn parse_args(src: &str) -> Result<(Vec<Expr>, Vec<(String, Expr)>), SyntaxError> {
    let mut parser = Parser::new(src)?;
    let mut args = Vec::new();
    let mut kwargs: Vec<(String, Expr)> = Vec::new();
    if parser.at_end() {
        return Ok((args, kwargs));
    }
    loop {
        if let Some(Tok::Ident(name)) = parser.peek().cloned() {
            if !is_keyword(&name) && parser.peek_at(1) == Some(&Tok::Assign) {
                parser.advance();
                parser.advance();
                let value = parser.expression()?;
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(SyntaxError::invalid(format!(
                        "duplicate keyword argument '{name}'"
                    )));
                }
                kwargs.push((name, value));
                if parser.eat(&Tok::Comma) {
                    continue;
                }
                break;
            }
        }
        if !kwargs.is_empty() {
            return Err(SyntaxError::invalid(
                "positional argument after keyword argument",
            ));
        }
        args.push(parser.expression()?);
        if parser.eat(&Tok::Comma) {
            continue;
        }
        break;
    }
    parser.expect_end()?;
    Ok((args, kwargs))
}

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, SyntaxError> {
        Ok(Parser {
            toks: tokenize(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.toks.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&Tok> {
        let tok = self.toks.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if let Some(Tok::Ident(name)) = self.peek() {
            if name == kw {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), SyntaxError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {}", tok.describe())))
        }
    }

    fn expect_end(&self) -> Result<(), SyntaxError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(SyntaxError::invalid(format!(
                "unexpected {} after expression",
                tok.describe()
            ))),
        }
    }

    fn unexpected(&self, wanted: &str) -> SyntaxError {
        match self.peek() {
            Some(tok) => SyntaxError::invalid(format!("{wanted}, found {}", tok.describe())),
            None => SyntaxError::invalid(format!("{wanted}, found end of expression")),
        }
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        let then = self.or_test()?;
        if self.eat_keyword("if") {
            let cond = self.or_test()?;
            if !self.eat_keyword("else") {
                return Err(self.unexpected("expected 'else' in conditional expression"));
            }
            let otherwise = self.expression()?;
            return Ok(Expr::Cond {
                then: Box::new(then),
                cond: Box::new(cond),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(then)
    }

    fn or_test(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.and_test()?;
        if !matches!(self.peek(), Some(Tok::Ident(n)) if n == "or") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_keyword("or") {
            items.push(self.and_test()?);
        }
        Ok(Expr::BoolChain {
            op: BoolOp::Or,
            items,
        })
    }

    fn and_test(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.not_test()?;
        if !matches!(self.peek(), Some(Tok::Ident(n)) if n == "and") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_keyword("and") {
            items.push(self.not_test()?);
        }
        Ok(Expr::BoolChain {
            op: BoolOp::And,
            items,
        })
    }

    fn not_test(&mut self) -> Result<Expr, SyntaxError> {
        // `not in` is handled below in comparison position.
        if matches!(self.peek(), Some(Tok::Ident(n)) if n == "not")
            && !matches!(self.peek_at(1), Some(Tok::Ident(n)) if n == "in")
        {
            self.advance();
            let operand = self.not_test()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => CmpOp::Eq,
                Some(Tok::Ne) => CmpOp::Ne,
                Some(Tok::Lt) => CmpOp::Lt,
                Some(Tok::Le) => CmpOp::Le,
                Some(Tok::Gt) => CmpOp::Gt,
                Some(Tok::Ge) => CmpOp::Ge,
                Some(Tok::Ident(n)) if n == "in" => CmpOp::In,
                Some(Tok::Ident(n)) if n == "not" => {
                    if matches!(self.peek_at(1), Some(Tok::Ident(m)) if m == "in") {
                        self.advance();
                        CmpOp::NotIn
                    } else {
                        break;
                    }
                }
                _ => break,
            };
            self.advance();
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn arith(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::SlashSlash) => BinOp::FloorDiv,
                Some(Tok::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat(&Tok::Minus) {
            let operand = self.factor()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Tok::Plus) {
            return self.factor();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.postfix()?;
        if self.eat(&Tok::StarStar) {
            let exp = self.factor()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exp),
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.advance();
                    let name = match self.advance() {
                        Some(Tok::Ident(name)) => name.clone(),
                        _ => return Err(SyntaxError::invalid("expected name after '.'")),
                    };
                    expr = Expr::Attr {
                        base: Box::new(expr),
                        name,
                    };
                }
                Some(Tok::LBracket) => {
                    self.advance();
                    expr = self.subscript(expr)?;
                }
                Some(Tok::LParen) => {
                    self.advance();
                    expr = self.call(expr)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn subscript(&mut self, base: Expr) -> Result<Expr, SyntaxError> {
        let start = if matches!(self.peek(), Some(Tok::Colon)) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        if self.eat(&Tok::Colon) {
            let end = if matches!(self.peek(), Some(Tok::RBracket)) {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            self.expect(&Tok::RBracket)?;
            return Ok(Expr::Slice {
                base: Box::new(base),
                start,
                end,
            });
        }
        self.expect(&Tok::RBracket)?;
        match start {
            Some(index) => Ok(Expr::Index {
                base: Box::new(base),
                index,
            }),
            None => Err(SyntaxError::invalid("empty subscript")),
        }
    }

    fn call(&mut self, callee: Expr) -> Result<Expr, SyntaxError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                if let Some(Tok::Ident(name)) = self.peek().cloned() {
                    if !is_keyword(&name) && self.peek_at(1) == Some(&Tok::Assign) {
                        self.advance();
                        self.advance();
                        let value = self.expression()?;
                        kwargs.push((name, value));
                        if self.eat(&Tok::Comma) {
                            continue;
                        }
                        self.expect(&Tok::RParen)?;
                        break;
                    }
                }
                if !kwargs.is_empty() {
                    return Err(SyntaxError::invalid(
                        "positional argument after keyword argument",
                    ));
                }
                args.push(self.expression()?);
                if self.eat(&Tok::Comma) {
                    continue;
                }
                self.expect(&Tok::RParen)?;
                break;
            }
        }
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
            kwargs,
        })
    }

    fn atom(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek().cloned() {
            Some(Tok::Int(n)) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(n)))
            }
            Some(Tok::Float(x)) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(x)))
            }
            Some(Tok::Str(s)) => {
                self.advance();
                Ok(Expr::Literal(Value::Str(s)))
            }
            Some(Tok::Ident(name)) => {
                self.advance();
                match name.as_str() {
                    "true" | "True" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" | "False" => Ok(Expr::Literal(Value::Bool(false))),
                    "null" | "None" => Ok(Expr::Literal(Value::Null)),
                    _ if is_keyword(&name) => Err(SyntaxError::invalid(format!(
                        "unexpected keyword '{name}'"
                    ))),
                    _ => Ok(Expr::Name(name)),
                }
            }
            Some(Tok::LParen) => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::LBracket) => {
                self.advance();
                self.list_or_comprehension()
            }
            Some(Tok::LBrace) => {
                self.advance();
                self.map_literal()
            }
            Some(tok) => Err(SyntaxError::invalid(format!(
                "unexpected {}",
                tok.describe()
            ))),
            None => Err(SyntaxError::invalid("unexpected end of expression")),
        }
    }

    fn list_or_comprehension(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat(&Tok::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.expression()?;
        if self.eat_keyword("for") {
            let var = match self.advance() {
                Some(Tok::Ident(name)) if !is_keyword(name) => name.clone(),
                _ => return Err(SyntaxError::invalid("expected name after 'for'")),
            };
            if !self.eat_keyword("in") {
                return Err(self.unexpected("expected 'in' in comprehension"));
            }
            let iter = self.or_test()?;
            let cond = if self.eat_keyword("if") {
                Some(Box::new(self.or_test()?))
            } else {
                None
            };
            self.expect(&Tok::RBracket)?;
            return Ok(Expr::Comprehension {
                item: Box::new(first),
                var,
                iter: Box::new(iter),
                cond,
            });
        }
        let mut items = vec![first];
        while self.eat(&Tok::Comma) {
            if matches!(self.peek(), Some(Tok::RBracket)) {
                break;
            }
            items.push(self.expression()?);
        }
        self.expect(&Tok::RBracket)?;
        Ok(Expr::List(items))
    }

    fn map_literal(&mut self) -> Result<Expr, SyntaxError> {
        let mut entries = Vec::new();
        if self.eat(&Tok::RBrace) {
            return Ok(Expr::MapLit(entries));
        }
        loop {
            let key = self.expression()?;
            self.expect(&Tok::Colon)?;
            let value = self.expression()?;
            entries.push((key, value));
            if self.eat(&Tok::Comma) {
                if matches!(self.peek(), Some(Tok::RBrace)) {
                    break;
                }
                continue;
            }
            break;
        }
        self.expect(&Tok::RBrace)?;
        Ok(Expr::MapLit(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        // a + b * c parses the multiplication first
        let expr = parse_expr("a + b * c").unwrap();
        match expr {
            Expr::Binary { op: BinOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_chained_comparison() {
        let expr = parse_expr("3 < x < 5").unwrap();
        match expr {
            Expr::Compare { rest, .. } => assert_eq!(rest.len(), 2),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_not_in() {
        let expr = parse_expr("x not in [1, 2]").unwrap();
        match expr {
            Expr::Compare { rest, .. } => assert_eq!(rest[0].0, CmpOp::NotIn),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_conditional() {
        let expr = parse_expr("'yes' if aa else 'no'").unwrap();
        assert!(matches!(expr, Expr::Cond { .. }));
    }

    #[test]
    fn test_truncated_operand_is_invalid() {
        assert!(parse_expr("1+").is_err());
        assert!(parse_expr("(a").is_err());
    }

    #[test]
    fn test_call_with_kwargs() {
        let expr = parse_expr("f('aa', b='UWV')").unwrap();
        match expr {
            Expr::Call { args, kwargs, .. } => {
                assert_eq!(args.len(), 1);
                assert_eq!(kwargs[0].0, "b");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_slice_and_index() {
        assert!(matches!(parse_expr("a[1]").unwrap(), Expr::Index { .. }));
        assert!(matches!(parse_expr("a[1:4]").unwrap(), Expr::Slice { .. }));
        assert!(matches!(parse_expr("a[:2]").unwrap(), Expr::Slice { .. }));
    }

    #[test]
    fn test_comprehension() {
        let expr = parse_expr("[x * 2 for x in xs if x > 1]").unwrap();
        assert!(matches!(expr, Expr::Comprehension { .. }));
    }

    #[test]
    fn test_stmt_assignment() {
        let stmt = parse_stmt("x = 1 + 2").unwrap();
        assert!(matches!(stmt, Stmt::Assign { .. }));
        let stmt = parse_stmt("f(1)").unwrap();
        assert!(matches!(stmt, Stmt::Expr(_)));
    }

    #[test]
    fn test_parse_args_forms() {
        let (args, kwargs) = parse_args("10, 200").unwrap();
        assert_eq!(args.len(), 2);
        assert!(kwargs.is_empty());

        let (args, kwargs) = parse_args("a=10, b=200").unwrap();
        assert!(args.is_empty());
        assert_eq!(kwargs.len(), 2);

        let (args, kwargs) = parse_args("").unwrap();
        assert!(args.is_empty() && kwargs.is_empty());

        assert!(parse_args("a=1, 2").is_err());
    }

    #[test]
    fn test_dict_literal() {
        let expr = parse_expr("{'bb': 'new'}").unwrap();
        assert!(matches!(expr, Expr::MapLit(entries) if entries.len() == 1));
    }
}
