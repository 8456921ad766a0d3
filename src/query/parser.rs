//! Parser for the query predicate language.
//!
//! Grammar (in rough EBNF):
//!
//! query      = or_expr
//! or_expr    = and_expr ("OR" and_expr)*
//! and_expr   = not_expr ("AND" not_expr)*
//! not_expr   = "NOT" not_expr | primary
//! primary    = "(" query ")" | predicate
//! predicate  = operand compare_op operand
//!            | IDENT "LIKE" STRING
//!            | IDENT "IS" ["NOT"] "NULL"
//! operand    = IDENT "(" IDENT ")" | IDENT | NUMBER | STRING
//! compare_op = "=" | "<>" | "!=" | "<" | "<=" | ">" | ">="

use super::ast::{CompareOp, GeomFunc, Operand, QueryAst};
use super::lexer::{Token, tokenize};

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        let tok = self.advance();
        if tok == expected {
            Ok(())
        } else {
            Err(format!("Expected {:?}, got {:?}", expected, tok))
        }
    }

    fn parse_query(&mut self) -> Result<QueryAst, String> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<QueryAst, String> {
        let mut left = self.parse_and_expr()?;

        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = QueryAst::Or(vec![left, right]);
        }

        Ok(left.simplify())
    }

    fn parse_and_expr(&mut self) -> Result<QueryAst, String> {
        let mut left = self.parse_not_expr()?;

        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_not_expr()?;
            left = QueryAst::And(vec![left, right]);
        }

        Ok(left.simplify())
    }

    fn parse_not_expr(&mut self) -> Result<QueryAst, String> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            let inner = self.parse_not_expr()?;
            Ok(QueryAst::Not(Box::new(inner)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<QueryAst, String> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_query()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(_) | Token::Number(_) | Token::Str(_) => self.parse_predicate(),
            Token::Eof => Err("Unexpected end of query".to_string()),
            other => Err(format!("Unexpected token: {:?}", other)),
        }
    }

    fn parse_predicate(&mut self) -> Result<QueryAst, String> {
        let left = self.parse_operand()?;

        match self.peek().clone() {
            Token::Like => {
                let Operand::Column(column) = left else {
                    return Err("LIKE requires a column on the left side".to_string());
                };
                self.advance();
                match self.advance() {
                    Token::Str(pattern) => Ok(QueryAst::Like { column, pattern }),
                    other => Err(format!("Expected string pattern after LIKE, got {:?}", other)),
                }
            }
            Token::Is => {
                let Operand::Column(column) = left else {
                    return Err("IS NULL requires a column on the left side".to_string());
                };
                self.advance();
                let negated = if matches!(self.peek(), Token::Not) {
                    self.advance();
                    true
                } else {
                    false
                };
                self.expect(Token::Null)?;
                Ok(QueryAst::IsNull { column, negated })
            }
            _ => {
                let op = match self.advance() {
                    Token::Eq => CompareOp::Eq,
                    Token::Ne => CompareOp::Ne,
                    Token::Lt => CompareOp::Lt,
                    Token::Le => CompareOp::Le,
                    Token::Gt => CompareOp::Gt,
                    Token::Ge => CompareOp::Ge,
                    other => return Err(format!("Expected comparison operator, got {:?}", other)),
                };
                let right = self.parse_operand()?;
                Ok(QueryAst::Compare { left, op, right })
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, String> {
        match self.advance() {
            Token::Number(n) => Ok(Operand::Number(n)),
            Token::Str(s) => Ok(Operand::Str(s)),
            Token::Ident(name) => {
                if matches!(self.peek(), Token::LParen) {
                    let func = match name.to_ascii_lowercase().as_str() {
                        "area" => GeomFunc::Area,
                        "length" => GeomFunc::Length,
                        other => return Err(format!("Unknown function '{}'", other)),
                    };
                    self.advance(); // consume (
                    let column = match self.advance() {
                        Token::Ident(column) => column,
                        other => {
                            return Err(format!("Expected column name in {}(), got {:?}", func, other));
                        }
                    };
                    self.expect(Token::RParen)?;
                    Ok(Operand::Func(func, column))
                } else {
                    Ok(Operand::Column(name))
                }
            }
            other => Err(format!("Expected operand, got {:?}", other)),
        }
    }
}

/// Parse a query string into an AST. An empty query is always-true.
pub fn parse_query(input: &str) -> Result<QueryAst, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(QueryAst::True);
    }

    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let ast = parser.parse_query()?;

    if !matches!(parser.peek(), Token::Eof) {
        return Err(format!(
            "Unexpected token after expression: {:?}",
            parser.peek()
        ));
    }

    Ok(ast)
}
