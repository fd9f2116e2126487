//! Arithmetic Expression Parser
//!
//! Operator-precedence parser over the lexer's arithmetic tokens, covering
//! the full C-like operator set of `$((...))`, `((...))`, `let`, array
//! indices and slices. `compact` mode makes whitespace end an expression,
//! matching how `let` treats each argument as its own expression;
//! `stop_colon` makes a bare `:` a terminator, for slice lengths.

use crate::ast::types::*;
use crate::parser::lexer::{ArithKind, LexMode, TokenType};
use crate::parser::parser::ParseRun;
use crate::parser::types::{valid_name, ParseError};

impl<'a> ParseRun<'a> {
    pub(crate) fn arith_expr(
        &mut self,
        compact: bool,
        stop_colon: bool,
    ) -> Result<ArithExpr, ParseError> {
        let expr = self.arith_comma(compact, stop_colon)?;
        if !compact {
            if let Some(err) = self.trailing_operand_err() {
                return Err(err);
            }
        }
        Ok(expr)
    }

    /// After a complete expression, an operand-like token means two
    /// operands in a row.
    fn trailing_operand_err(&self) -> Option<ParseError> {
        let bad = match self.tok.token_type {
            TokenType::Lit
            | TokenType::DollarName
            | TokenType::Dollar
            | TokenType::DollBrace
            | TokenType::DollParen
            | TokenType::DollDblParen
            | TokenType::DollBracket
            | TokenType::SglQuote
            | TokenType::DblQuote
            | TokenType::DollSglQuote
            | TokenType::DollDblQuote
            | TokenType::BackQuote => true,
            TokenType::Semicolon => {
                matches!(
                    self.lx.mode(),
                    LexMode::Arithmetic(ArithKind::Expansion)
                        | LexMode::Arithmetic(ArithKind::Bracket)
                )
            }
            _ => false,
        };
        if bad {
            let display = self.tok.display();
            return Some(self.syn(
                self.tok.pos,
                format!("not a valid arithmetic operator: {display}"),
            ));
        }
        None
    }

    /// Closes `$((`/`((` style constructs, whose `))` is two `)` runes.
    pub(crate) fn arithm_end(
        &mut self,
        open: Position,
        left: &str,
    ) -> Result<Position, ParseError> {
        if self.tok.token_type == TokenType::RParen && self.lx.cur_char() == Some(')') {
            self.lx.bump()?;
            let end = self.lx.pos();
            self.lx.pop_mode();
            self.next()?;
            return Ok(end);
        }
        self.lx.pop_mode();
        if self.tok.token_type == TokenType::Eof && self.try_recover() {
            return Ok(Position::recovered());
        }
        Err(self.matched(open, left, "))"))
    }

    fn arith_operand_missing(&self, compact: bool) -> bool {
        if compact && self.tok.spaced {
            return true;
        }
        !matches!(
            self.tok.token_type,
            TokenType::Lit
                | TokenType::DollarName
                | TokenType::Dollar
                | TokenType::DollBrace
                | TokenType::DollParen
                | TokenType::DollDblParen
                | TokenType::DollBracket
                | TokenType::SglQuote
                | TokenType::DblQuote
                | TokenType::DollSglQuote
                | TokenType::DollDblQuote
                | TokenType::BackQuote
                | TokenType::LParen
                | TokenType::Plus
                | TokenType::Minus
                | TokenType::Excl
                | TokenType::Tilde
                | TokenType::Inc
                | TokenType::Dec
        )
    }

    fn arith_missing_err(&self, op_pos: Position, op: &str) -> ParseError {
        if self.tok.token_type == TokenType::Eof {
            self.syn_incomplete(op_pos, format!("{op} must be followed by an expression"))
        } else {
            self.syn(op_pos, format!("{op} must be followed by an expression"))
        }
    }

    fn arith_comma(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_assign(compact, sc)?;
        loop {
            if self.tok.token_type != TokenType::Comma || (compact && self.tok.spaced) {
                return Ok(left);
            }
            let op_pos = self.tok.pos;
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, ","));
            }
            let right = self.arith_assign(compact, sc)?;
            left = binary(ArithBinaryOperator::Comma, left, right);
        }
    }

    fn arith_assign(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let left = self.arith_ternary(compact, sc)?;
        let op = match self.tok.token_type {
            TokenType::Assign => ArithBinaryOperator::Assign,
            TokenType::PlusAssign => ArithBinaryOperator::AddAssign,
            TokenType::MinusAssign => ArithBinaryOperator::SubAssign,
            TokenType::StarAssign => ArithBinaryOperator::MulAssign,
            TokenType::SlashAssign => ArithBinaryOperator::DivAssign,
            TokenType::PercentAssign => ArithBinaryOperator::ModAssign,
            TokenType::ShlAssign => ArithBinaryOperator::ShlAssign,
            TokenType::ShrAssign => ArithBinaryOperator::ShrAssign,
            TokenType::AmpAssign => ArithBinaryOperator::AndAssign,
            TokenType::CaretAssign => ArithBinaryOperator::XorAssign,
            TokenType::PipeAssign => ArithBinaryOperator::OrAssign,
            _ => return Ok(left),
        };
        if compact && self.tok.spaced {
            return Ok(left);
        }
        let op_pos = self.tok.pos;
        let op_str = self.tok.display();
        if !arith_lvalue(&left) {
            return Err(self.syn(op_pos, format!("{op_str} must follow a name")));
        }
        self.next()?;
        if self.arith_operand_missing(compact) {
            return Err(self.arith_missing_err(op_pos, &op_str));
        }
        let right = self.arith_assign(compact, sc)?;
        Ok(binary(op, left, right))
    }

    fn arith_ternary(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let cond = self.arith_logical_or(compact, sc)?;
        if self.tok.token_type == TokenType::Colon && !sc {
            return Err(self.syn(self.tok.pos, "ternary operator missing ? before :"));
        }
        if self.tok.token_type != TokenType::Quest || (compact && self.tok.spaced) {
            return Ok(cond);
        }
        let quest_pos = self.tok.pos;
        self.next()?;
        let then_part = self.arith_ternary(compact, false)?;
        if self.tok.token_type != TokenType::Colon {
            return Err(self.syn(quest_pos, "ternary operator missing : after ?"));
        }
        let colon_pos = self.tok.pos;
        self.next()?;
        if self.arith_operand_missing(compact) {
            return Err(self.arith_missing_err(colon_pos, ":"));
        }
        let else_part = self.arith_ternary(compact, sc)?;
        let colon = binary(ArithBinaryOperator::TernColon, then_part, else_part);
        Ok(binary(ArithBinaryOperator::TernQuest, cond, colon))
    }

    fn arith_logical_or(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_logical_and(compact, sc)?;
        while self.tok.token_type == TokenType::OrOr && !(compact && self.tok.spaced) {
            let op_pos = self.tok.pos;
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, "||"));
            }
            let right = self.arith_logical_and(compact, sc)?;
            left = binary(ArithBinaryOperator::LogOr, left, right);
        }
        Ok(left)
    }

    fn arith_logical_and(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_bit_or(compact, sc)?;
        while self.tok.token_type == TokenType::AndAnd && !(compact && self.tok.spaced) {
            let op_pos = self.tok.pos;
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, "&&"));
            }
            let right = self.arith_bit_or(compact, sc)?;
            left = binary(ArithBinaryOperator::LogAnd, left, right);
        }
        Ok(left)
    }

    fn arith_bit_or(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_bit_xor(compact, sc)?;
        while self.tok.token_type == TokenType::Pipe && !(compact && self.tok.spaced) {
            let op_pos = self.tok.pos;
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, "|"));
            }
            let right = self.arith_bit_xor(compact, sc)?;
            left = binary(ArithBinaryOperator::BitOr, left, right);
        }
        Ok(left)
    }

    fn arith_bit_xor(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_bit_and(compact, sc)?;
        while self.tok.token_type == TokenType::Caret && !(compact && self.tok.spaced) {
            let op_pos = self.tok.pos;
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, "^"));
            }
            let right = self.arith_bit_and(compact, sc)?;
            left = binary(ArithBinaryOperator::BitXor, left, right);
        }
        Ok(left)
    }

    fn arith_bit_and(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_equality(compact, sc)?;
        while self.tok.token_type == TokenType::Amp && !(compact && self.tok.spaced) {
            let op_pos = self.tok.pos;
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, "&"));
            }
            let right = self.arith_equality(compact, sc)?;
            left = binary(ArithBinaryOperator::BitAnd, left, right);
        }
        Ok(left)
    }

    fn arith_equality(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_relational(compact, sc)?;
        loop {
            let op = match self.tok.token_type {
                TokenType::EqEq => ArithBinaryOperator::Eq,
                TokenType::NotEq => ArithBinaryOperator::Ne,
                _ => return Ok(left),
            };
            if compact && self.tok.spaced {
                return Ok(left);
            }
            let op_pos = self.tok.pos;
            let op_str = self.tok.display();
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, &op_str));
            }
            let right = self.arith_relational(compact, sc)?;
            left = binary(op, left, right);
        }
    }

    fn arith_relational(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_shift(compact, sc)?;
        loop {
            let op = match self.tok.token_type {
                TokenType::Less => ArithBinaryOperator::Lt,
                TokenType::LessEq => ArithBinaryOperator::Le,
                TokenType::Great => ArithBinaryOperator::Gt,
                TokenType::GreatEq => ArithBinaryOperator::Ge,
                _ => return Ok(left),
            };
            if compact && self.tok.spaced {
                return Ok(left);
            }
            let op_pos = self.tok.pos;
            let op_str = self.tok.display();
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, &op_str));
            }
            let right = self.arith_shift(compact, sc)?;
            left = binary(op, left, right);
        }
    }

    fn arith_shift(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_additive(compact, sc)?;
        loop {
            let op = match self.tok.token_type {
                TokenType::Shl => ArithBinaryOperator::Shl,
                TokenType::Shr => ArithBinaryOperator::Shr,
                _ => return Ok(left),
            };
            if compact && self.tok.spaced {
                return Ok(left);
            }
            let op_pos = self.tok.pos;
            let op_str = self.tok.display();
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, &op_str));
            }
            let right = self.arith_additive(compact, sc)?;
            left = binary(op, left, right);
        }
    }

    fn arith_additive(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_multiplicative(compact, sc)?;
        loop {
            let op = match self.tok.token_type {
                TokenType::Plus => ArithBinaryOperator::Add,
                TokenType::Minus => ArithBinaryOperator::Sub,
                _ => return Ok(left),
            };
            if compact && self.tok.spaced {
                return Ok(left);
            }
            let op_pos = self.tok.pos;
            let op_str = self.tok.display();
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, &op_str));
            }
            let right = self.arith_multiplicative(compact, sc)?;
            left = binary(op, left, right);
        }
    }

    fn arith_multiplicative(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut left = self.arith_unary(compact, sc)?;
        loop {
            let op = match self.tok.token_type {
                TokenType::Star => ArithBinaryOperator::Mul,
                TokenType::Slash => ArithBinaryOperator::Div,
                TokenType::Percent => ArithBinaryOperator::Mod,
                _ => return Ok(left),
            };
            if compact && self.tok.spaced {
                return Ok(left);
            }
            let op_pos = self.tok.pos;
            let op_str = self.tok.display();
            self.next()?;
            if self.arith_operand_missing(compact) {
                return Err(self.arith_missing_err(op_pos, &op_str));
            }
            let right = self.arith_unary(compact, sc)?;
            left = binary(op, left, right);
        }
    }

    fn arith_unary(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let op = match self.tok.token_type {
            TokenType::Plus => ArithUnaryOperator::Plus,
            TokenType::Minus => ArithUnaryOperator::Minus,
            TokenType::Excl => ArithUnaryOperator::Not,
            TokenType::Tilde => ArithUnaryOperator::BitNot,
            TokenType::Inc | TokenType::Dec => {
                return self.arith_prefix_incdec(compact, sc);
            }
            _ => return self.arith_power(compact, sc),
        };
        let op_pos = self.tok.pos;
        let op_str = self.tok.display();
        self.next()?;
        if self.arith_operand_missing(compact) {
            return Err(self.arith_missing_err(op_pos, &op_str));
        }
        let operand = self.arith_unary(compact, sc)?;
        let span = Span::new(op_pos, operand.span().end);
        Ok(ArithExpr::Unary(Box::new(ArithUnaryNode {
            operator: op,
            post: false,
            operand,
            span,
        })))
    }

    fn arith_prefix_incdec(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let op = if self.tok.token_type == TokenType::Inc {
            ArithUnaryOperator::Inc
        } else {
            ArithUnaryOperator::Dec
        };
        let op_pos = self.tok.pos;
        let op_str = self.tok.display();
        self.next()?;
        if self.tok.token_type != TokenType::Lit || (compact && self.tok.spaced) {
            return Err(if self.tok.token_type == TokenType::Eof {
                self.syn_incomplete(op_pos, format!("{op_str} must be followed by a literal"))
            } else {
                self.syn(op_pos, format!("{op_str} must be followed by a literal"))
            });
        }
        let operand = self.arith_operand_word(compact, sc)?;
        let span = Span::new(op_pos, operand.span().end);
        Ok(ArithExpr::Unary(Box::new(ArithUnaryNode {
            operator: op,
            post: false,
            operand,
            span,
        })))
    }

    /// `**` binds tighter than the prefix operators and associates right.
    fn arith_power(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let left = self.arith_postfix(compact, sc)?;
        if self.tok.token_type != TokenType::Power || (compact && self.tok.spaced) {
            return Ok(left);
        }
        let op_pos = self.tok.pos;
        self.next()?;
        if self.arith_operand_missing(compact) {
            return Err(self.arith_missing_err(op_pos, "**"));
        }
        let right = self.arith_unary(compact, sc)?;
        Ok(binary(ArithBinaryOperator::Pow, left, right))
    }

    fn arith_postfix(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        let mut expr = self.arith_primary(compact, sc)?;
        loop {
            let op = match self.tok.token_type {
                TokenType::Inc => ArithUnaryOperator::Inc,
                TokenType::Dec => ArithUnaryOperator::Dec,
                _ => return Ok(expr),
            };
            if compact && self.tok.spaced {
                return Ok(expr);
            }
            let op_pos = self.tok.pos;
            let op_str = self.tok.display();
            if !arith_lvalue(&expr) {
                return Err(self.syn(op_pos, format!("{op_str} must follow a name")));
            }
            let span = Span::new(expr.span().start, self.tok.end);
            self.next()?;
            expr = ArithExpr::Unary(Box::new(ArithUnaryNode {
                operator: op,
                post: true,
                operand: expr,
                span,
            }));
        }
    }

    fn arith_primary(&mut self, compact: bool, sc: bool) -> Result<ArithExpr, ParseError> {
        match self.tok.token_type {
            TokenType::LParen => {
                let open = self.tok.pos;
                self.next()?;
                if matches!(
                    self.tok.token_type,
                    TokenType::RParen | TokenType::RBracket | TokenType::RBrace
                ) {
                    return Err(self.syn(open, "( must be followed by an expression"));
                }
                if self.tok.token_type == TokenType::Eof {
                    return Err(self.matched(open, "(", ")"));
                }
                let inner = self.arith_comma(compact, false)?;
                if self.tok.token_type != TokenType::RParen {
                    return Err(self.matched(open, "(", ")"));
                }
                let end = self.tok.end;
                self.next()?;
                Ok(ArithExpr::Group(Box::new(ArithGroupNode {
                    expression: inner,
                    span: Span::new(open, end),
                })))
            }
            TokenType::Colon => {
                Err(self.syn(self.tok.pos, "ternary operator missing ? before :"))
            }
            TokenType::LBracket => Err(self.syn(self.tok.pos, "[ must follow a name")),
            TokenType::Lit
            | TokenType::DollarName
            | TokenType::Dollar
            | TokenType::DollBrace
            | TokenType::DollParen
            | TokenType::DollDblParen
            | TokenType::SglQuote
            | TokenType::DblQuote
            | TokenType::DollSglQuote
            | TokenType::DollDblQuote
            | TokenType::BackQuote => {
                let word = self.arith_operand_word(compact, sc)?;
                Ok(word)
            }
            // A binary operator with no left operand.
            TokenType::Star
            | TokenType::Slash
            | TokenType::Percent
            | TokenType::Power
            | TokenType::Shl
            | TokenType::Shr
            | TokenType::LessEq
            | TokenType::GreatEq
            | TokenType::EqEq
            | TokenType::NotEq
            | TokenType::Amp
            | TokenType::Pipe
            | TokenType::Caret
            | TokenType::AndAnd
            | TokenType::OrOr
            | TokenType::Comma
            | TokenType::Quest
            | TokenType::Less
            | TokenType::Great => {
                let display = self.tok.display();
                Err(self.syn(
                    self.tok.pos,
                    format!("{display} must follow an expression"),
                ))
            }
            _ => {
                let display = self.tok.display();
                Err(self.syn(
                    self.tok.pos,
                    format!("not a valid arithmetic operator: {display}"),
                ))
            }
        }
    }

    /// An operand word: a literal or expansion run, with an optional array
    /// index after a plain name.
    fn arith_operand_word(&mut self, _compact: bool, _sc: bool) -> Result<ArithExpr, ParseError> {
        let start = self.tok.pos;
        let first = match self.word_part()? {
            Some(part) => part,
            None => {
                let display = self.tok.display();
                return Err(self.syn(
                    self.tok.pos,
                    format!("not a valid arithmetic operator: {display}"),
                ));
            }
        };
        let mut parts = vec![first];
        while !self.tok.spaced && self.arith_word_continues() {
            match self.word_part()? {
                Some(part) => parts.push(part),
                None => break,
            }
        }
        // Array element: a plain name directly followed by `[`.
        if self.tok.token_type == TokenType::LBracket && !self.tok.spaced {
            let name = match parts.as_slice() {
                [WordPart::Literal(l)] if valid_name(&l.value) => Some(l.value.clone()),
                _ => None,
            };
            let Some(name) = name else {
                return Err(self.syn(self.tok.pos, "[ must follow a name"));
            };
            let lb_pos = self.tok.pos;
            self.next()?;
            if matches!(
                self.tok.token_type,
                TokenType::RBracket | TokenType::RBrace | TokenType::RParen
            ) {
                return Err(self.syn(lb_pos, "[ must be followed by an expression"));
            }
            let index = self.arith_comma(false, false)?;
            if self.tok.token_type != TokenType::RBracket {
                return Err(self.matched(lb_pos, "[", "]"));
            }
            let end = self.tok.end;
            self.next()?;
            let span = Span::new(start, end);
            return Ok(ArithExpr::Word(WordNode {
                parts: vec![WordPart::ParameterExpansion(ParameterExpansionPart {
                    parameter: name,
                    short: true,
                    indirect: false,
                    length: false,
                    width: false,
                    index: Some(Box::new(index)),
                    operation: None,
                    span,
                })],
                span,
            }));
        }
        let end = parts
            .iter()
            .rev()
            .map(|p| p.span().end)
            .find(|e| e.is_valid())
            .unwrap_or(start);
        Ok(ArithExpr::Word(WordNode {
            parts,
            span: Span::new(start, end),
        }))
    }

    fn arith_word_continues(&self) -> bool {
        matches!(
            self.tok.token_type,
            TokenType::Lit
                | TokenType::DollarName
                | TokenType::Dollar
                | TokenType::DollBrace
                | TokenType::DollParen
                | TokenType::DollDblParen
                | TokenType::SglQuote
                | TokenType::DblQuote
                | TokenType::DollSglQuote
                | TokenType::DollDblQuote
                | TokenType::BackQuote
        )
    }
}

fn binary(op: ArithBinaryOperator, left: ArithExpr, right: ArithExpr) -> ArithExpr {
    let span = Span::new(left.span().start, right.span().end);
    ArithExpr::Binary(Box::new(ArithBinaryNode {
        operator: op,
        left,
        right,
        span,
    }))
}

/// Whether an expression can sit on the left of an assignment or take
/// `++`/`--`: a plain name, or an array element.
fn arith_lvalue(expr: &ArithExpr) -> bool {
    match expr {
        ArithExpr::Word(w) => match w.parts.as_slice() {
            [WordPart::Literal(l)] => valid_name(&l.value),
            [WordPart::ParameterExpansion(p)] => p.short && p.index.is_some(),
            _ => false,
        },
        _ => false,
    }
}
