//! Conditional Expression Parser
//!
//! The `[[ ... ]]` test clause grammar: unary and binary test operators,
//! `!`, `&&`, `||`, parenthesized groups, and `=~` regular-expression
//! matches under Bash.

use crate::ast::types::*;
use crate::parser::lexer::{LexMode, TokenType};
use crate::parser::parser::ParseRun;
use crate::parser::types::ParseError;

impl<'a> ParseRun<'a> {
    /// Parses a `[[ ... ]]` clause; the current token is the `[[` word.
    pub(crate) fn parse_test_clause(&mut self) -> Result<TestCommandNode, ParseError> {
        let open = self.tok.pos;
        self.lx.push_mode(LexMode::Test);
        self.next()?;
        self.skip_test_newlines()?;
        if self.is_lit("]]") || self.tok.token_type == TokenType::Eof {
            self.lx.pop_mode();
            return Err(self.follow_err_incomplete(
                open,
                "test clause requires at least one expression",
            ));
        }
        if !self.test_operand_ahead() {
            self.lx.pop_mode();
            return Err(self.syn(open, "[[ must be followed by an expression"));
        }
        let expression = self.test_expr_or()?;
        self.skip_test_newlines()?;
        if self.is_lit("]]") {
            let end = self.tok.end;
            self.lx.pop_mode();
            self.next()?;
            return Ok(TestCommandNode {
                expression,
                span: Span::new(open, end),
            });
        }
        self.lx.pop_mode();
        if self.tok.token_type == TokenType::Lit {
            let display = self.tok.display();
            return Err(self.syn(
                self.tok.pos,
                format!("not a valid test operator: {display}"),
            ));
        }
        Err(self.matched(open, "[[", "]]"))
    }

    fn follow_err_incomplete(&self, pos: Position, msg: &str) -> ParseError {
        if self.tok.token_type == TokenType::Eof {
            self.syn_incomplete(pos, msg)
        } else {
            self.syn(pos, msg)
        }
    }

    fn skip_test_newlines(&mut self) -> Result<(), ParseError> {
        while self.tok.token_type == TokenType::Newline {
            self.next()?;
        }
        Ok(())
    }

    /// Whether the current token can begin a test expression.
    fn test_operand_ahead(&self) -> bool {
        self.can_start_word() || self.tok.token_type == TokenType::LParen
    }

    fn test_expr_or(&mut self) -> Result<CondExpr, ParseError> {
        let mut left = self.test_expr_and()?;
        loop {
            self.skip_test_newlines()?;
            if self.tok.token_type != TokenType::OrOr {
                return Ok(left);
            }
            let op_pos = self.tok.pos;
            self.next()?;
            self.skip_test_newlines()?;
            if !self.test_operand_ahead() {
                return Err(self.syn(op_pos, "|| must be followed by an expression"));
            }
            let right = self.test_expr_and()?;
            left = cond_binary(CondBinaryOp::Or, left, right);
        }
    }

    fn test_expr_and(&mut self) -> Result<CondExpr, ParseError> {
        let mut left = self.test_expr_unary()?;
        loop {
            self.skip_test_newlines()?;
            if self.tok.token_type != TokenType::AndAnd {
                return Ok(left);
            }
            let op_pos = self.tok.pos;
            self.next()?;
            self.skip_test_newlines()?;
            if !self.test_operand_ahead() {
                return Err(self.syn(op_pos, "&& must be followed by an expression"));
            }
            let right = self.test_expr_unary()?;
            left = cond_binary(CondBinaryOp::And, left, right);
        }
    }

    fn test_expr_unary(&mut self) -> Result<CondExpr, ParseError> {
        if self.is_lit("!") {
            let not_pos = self.tok.pos;
            self.next()?;
            if !self.test_operand_ahead() {
                return Err(self.syn(not_pos, "! must be followed by an expression"));
            }
            let operand = self.test_expr_unary()?;
            let span = Span::new(not_pos, operand.span().end);
            return Ok(CondExpr::Not(Box::new(CondNotNode { operand, span })));
        }
        if self.tok.token_type == TokenType::LParen {
            return self.test_expr_group();
        }
        // Unary test operators like -f.
        if self.tok.token_type == TokenType::Lit && self.lit_word_ends() {
            if let Some(op) = CondUnaryOp::from_str(&self.tok.value) {
                let op_pos = self.tok.pos;
                let op_str = self.tok.display();
                self.next()?;
                if self.tok.token_type == TokenType::Newline || !self.can_start_word() {
                    return Err(self.follow_err_incomplete(
                        op_pos,
                        &format!("{op_str} must be followed by a word"),
                    ));
                }
                let operand = self.parse_word()?;
                let span = Span::new(op_pos, operand.span.end);
                return Ok(CondExpr::Unary(Box::new(CondUnaryNode {
                    operator: op,
                    operand,
                    span,
                })));
            }
        }
        let word = self.parse_word()?;
        self.test_maybe_binary(CondExpr::Word(word))
    }

    fn test_expr_group(&mut self) -> Result<CondExpr, ParseError> {
        let open = self.tok.pos;
        self.next()?;
        self.skip_test_newlines()?;
        if !self.test_operand_ahead() {
            return Err(self.syn(open, "( must be followed by an expression"));
        }
        let inner = self.test_expr_or()?;
        self.skip_test_newlines()?;
        if self.tok.token_type != TokenType::RParen {
            return Err(self.matched(open, "(", ")"));
        }
        let end = self.tok.end;
        self.next()?;
        // After a complex expression only a connective or the closer may
        // follow.
        if !matches!(
            self.tok.token_type,
            TokenType::AndAnd
                | TokenType::OrOr
                | TokenType::RParen
                | TokenType::Newline
                | TokenType::Eof
        ) && !self.is_lit("]]")
        {
            return Err(self.syn(
                self.tok.pos,
                "expected &&, || or ]] after complex expr",
            ));
        }
        Ok(CondExpr::Group(Box::new(CondGroupNode {
            expression: inner,
            span: Span::new(open, end),
        })))
    }

    /// After a word operand, looks for a binary test operator.
    fn test_maybe_binary(&mut self, left: CondExpr) -> Result<CondExpr, ParseError> {
        match self.tok.token_type {
            TokenType::Less | TokenType::Great => {
                let op = if self.tok.token_type == TokenType::Less {
                    CondBinaryOp::Lt
                } else {
                    CondBinaryOp::Gt
                };
                let op_pos = self.tok.pos;
                let op_str = self.tok.display();
                self.next()?;
                if self.tok.token_type == TokenType::Newline || !self.can_start_word() {
                    return Err(self.follow_err_incomplete(
                        op_pos,
                        &format!("{op_str} must be followed by a word"),
                    ));
                }
                let right = self.parse_word()?;
                Ok(cond_binary(op, left, CondExpr::Word(right)))
            }
            TokenType::Amp | TokenType::Pipe | TokenType::Semicolon => {
                let display = self.tok.display();
                Err(self.syn(
                    self.tok.pos,
                    format!("not a valid test operator: {display}"),
                ))
            }
            TokenType::Lit if self.lit_word_ends() => {
                if self.tok.value == "]]" {
                    return Ok(left);
                }
                match CondBinaryOp::from_str(&self.tok.value) {
                    Some(CondBinaryOp::Match) => self.test_regexp_binary(left),
                    Some(op) => {
                        let op_pos = self.tok.pos;
                        let op_str = self.tok.display();
                        self.next()?;
                        if self.tok.token_type == TokenType::Newline || !self.can_start_word()
                        {
                            return Err(self.follow_err_incomplete(
                                op_pos,
                                &format!("{op_str} must be followed by a word"),
                            ));
                        }
                        let right = self.parse_word()?;
                        Ok(cond_binary(op, left, CondExpr::Word(right)))
                    }
                    None => {
                        let display = self.tok.display();
                        Err(self.syn(
                            self.tok.pos,
                            format!("not a valid test operator: {display}"),
                        ))
                    }
                }
            }
            TokenType::Lit => {
                // The would-be operator glues more parts onto itself.
                let word = self.parse_word()?;
                Err(self.syn(
                    word.span.start,
                    "test operator words must consist of a single literal",
                ))
            }
            _ => Ok(left),
        }
    }

    /// `word =~ regex` (Bash). The right side lexes under regexp rules,
    /// where parentheses nest inside the literal.
    fn test_regexp_binary(&mut self, left: CondExpr) -> Result<CondExpr, ParseError> {
        let op_pos = self.tok.pos;
        if !self.lang.is_bash() {
            return Err(self.lang_err(op_pos, "regex tests are a bash feature"));
        }
        self.lx.push_mode(LexMode::TestRegexp);
        self.next()?;
        if !self.can_start_word() {
            self.lx.pop_mode();
            return Err(self.follow_err_incomplete(op_pos, "=~ must be followed by a word"));
        }
        let right = self.parse_word()?;
        self.lx.pop_mode();
        Ok(cond_binary(CondBinaryOp::Match, left, CondExpr::Word(right)))
    }
}

fn cond_binary(op: CondBinaryOp, left: CondExpr, right: CondExpr) -> CondExpr {
    let span = Span::new(left.span().start, right.span().end);
    CondExpr::Binary(Box::new(CondBinaryNode {
        operator: op,
        left,
        right,
        span,
    }))
}
