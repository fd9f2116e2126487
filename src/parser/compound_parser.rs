//! Compound Command Parser
//!
//! Control structures, function definitions, declaration builtins, `let`
//! and `coproc`, each with its fixed keyword skeleton and targeted
//! diagnostics.

use std::collections::HashSet;

use crate::ast::types::*;
use crate::parser::lexer::{ArithKind, LexMode, TokenType};
use crate::parser::parser::{ParseRun, StopCtx};
use crate::parser::types::{valid_name, ParseError};

lazy_static::lazy_static! {
    /// Words that begin a compound command or clause at command position.
    static ref KEYWORD_STARTERS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for kw in [
            "if", "while", "until", "for", "case", "select", "[[", "{", "function", "let",
            "declare", "local", "export", "readonly", "typeset", "nameref", "time", "coproc",
        ] {
            s.insert(kw);
        }
        s
    };
}

impl<'a> ParseRun<'a> {
    /// An error positioned at `pos`, marked incomplete when the input ran
    /// out.
    fn follow_err(&self, pos: Position, msg: impl Into<String>) -> ParseError {
        if self.tok.token_type == TokenType::Eof {
            self.syn_incomplete(pos, msg)
        } else {
            self.syn(pos, msg)
        }
    }

    /// Expects a closing reserved word like `fi`; under error recovery a
    /// missing closer at EOF yields a recovered end position.
    fn expect_closing_lit(
        &mut self,
        word: &str,
        start: Position,
        msg: &str,
    ) -> Result<Position, ParseError> {
        if self.is_lit(word) {
            let end = self.tok.end;
            self.next()?;
            return Ok(end);
        }
        if self.tok.token_type == TokenType::Eof && self.try_recover() {
            return Ok(Position::recovered());
        }
        Err(self.follow_err(start, msg))
    }

    /// Expects a mid-structure reserved word like `then` or `do`; under
    /// error recovery parsing proceeds as though it were present.
    fn expect_keyword(
        &mut self,
        word: &str,
        err_pos: Position,
        msg: &str,
    ) -> Result<(), ParseError> {
        if self.is_lit(word) {
            self.next()?;
            return Ok(());
        }
        if self.try_recover() {
            return Ok(());
        }
        Err(self.follow_err(err_pos, msg))
    }

    fn skip_newlines(&mut self) -> Result<(), ParseError> {
        while self.tok.token_type == TokenType::Newline {
            self.next()?;
        }
        Ok(())
    }

    fn stmt_list(&mut self, stop: StopCtx) -> Result<Vec<StatementNode>, ParseError> {
        let mut out = Vec::new();
        self.stmt_list_into(&mut out, stop)?;
        Ok(out)
    }

    /// Statement list after a reserved word like `if` or `then`. A lone
    /// immediate `;` yields an empty list rather than an error.
    fn follow_stmt_list(
        &mut self,
        stop: StopCtx,
    ) -> Result<(Vec<StatementNode>, bool), ParseError> {
        if self.tok.token_type == TokenType::Semicolon {
            self.next()?;
            return Ok((Vec::new(), true));
        }
        Ok((self.stmt_list(stop)?, false))
    }

    // =========================================================================
    // GROUPS AND SUBSHELLS
    // =========================================================================

    pub(crate) fn parse_subshell(&mut self) -> Result<SubshellNode, ParseError> {
        let start = self.tok.pos;
        self.paren_depth += 1;
        self.next()?;
        let body = self.stmt_list(StopCtx::Subshell)?;
        let end = if self.tok.token_type == TokenType::RParen {
            let end = self.tok.end;
            self.paren_depth -= 1;
            self.next()?;
            end
        } else {
            self.paren_depth -= 1;
            self.matched_or_recover(start, "(", ")")?
        };
        Ok(SubshellNode {
            body,
            span: Span::new(start, end),
        })
    }

    /// `((` at a statement start under POSIX rules: two nested subshells.
    pub(crate) fn parse_posix_nested_subshell(&mut self) -> Result<SubshellNode, ParseError> {
        let start = self.tok.pos;
        let inner_pos = Position::new(start.offset + 1, start.line, start.col + 1);
        self.paren_depth += 2;
        self.next()?;
        let inner_body = self.stmt_list(StopCtx::Subshell)?;
        let inner_end = if self.tok.token_type == TokenType::RParen {
            let end = self.tok.end;
            self.next()?;
            end
        } else {
            self.paren_depth -= 2;
            return Err(self.matched(inner_pos, "(", ")"));
        };
        let inner = StatementNode {
            command: CommandNode::Subshell(SubshellNode {
                body: inner_body,
                span: Span::new(inner_pos, inner_end),
            }),
            redirections: Vec::new(),
            negated: false,
            background: false,
            span: Span::new(inner_pos, inner_end),
        };
        self.paren_depth -= 1;
        let mut body = vec![inner];
        match self.tok.token_type {
            TokenType::Semicolon => self.next()?,
            TokenType::Newline | TokenType::RParen | TokenType::Eof | TokenType::Amp => {}
            _ => {
                return Err(self.syn(
                    self.tok.pos,
                    "statements must be separated by &, ; or a newline",
                ))
            }
        }
        if self.tok.token_type == TokenType::Amp {
            if let Some(last) = body.last_mut() {
                last.background = true;
            }
            self.next()?;
        }
        self.stmt_list_into(&mut body, StopCtx::Subshell)?;
        let end = if self.tok.token_type == TokenType::RParen {
            let end = self.tok.end;
            self.paren_depth -= 1;
            self.next()?;
            end
        } else {
            self.paren_depth -= 1;
            self.matched_or_recover(start, "(", ")")?
        };
        Ok(SubshellNode {
            body,
            span: Span::new(start, end),
        })
    }

    pub(crate) fn parse_group(&mut self) -> Result<GroupNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        let body = self.stmt_list(StopCtx::Group)?;
        let end = if self.is_lit("}") {
            let end = self.tok.end;
            self.next()?;
            end
        } else {
            self.matched_or_recover(start, "{", "}")?
        };
        Ok(GroupNode {
            body,
            span: Span::new(start, end),
        })
    }

    // =========================================================================
    // CONTROL STRUCTURES
    // =========================================================================

    pub(crate) fn parse_if(&mut self) -> Result<IfNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        let (condition, had_semi) = self.follow_stmt_list(StopCtx::Keyword(&["then"]))?;
        if condition.is_empty() && !had_semi && self.tok.token_type == TokenType::Eof {
            return Err(self.follow_err(start, "\"if\" must be followed by a statement list"));
        }
        self.expect_keyword("then", start, "\"if <cond>\" must be followed by \"then\"")?;
        let (body, _) = self.follow_stmt_list(StopCtx::Keyword(&["elif", "else", "fi"]))?;
        let mut clauses = vec![IfClause { condition, body }];
        while self.is_lit("elif") {
            let elif_pos = self.tok.pos;
            self.next()?;
            let (condition, _) = self.follow_stmt_list(StopCtx::Keyword(&["then"]))?;
            self.expect_keyword(
                "then",
                elif_pos,
                "\"elif <cond>\" must be followed by \"then\"",
            )?;
            let (body, _) = self.follow_stmt_list(StopCtx::Keyword(&["elif", "else", "fi"]))?;
            clauses.push(IfClause { condition, body });
        }
        let else_body = if self.is_lit("else") {
            self.next()?;
            let (body, _) = self.follow_stmt_list(StopCtx::Keyword(&["fi"]))?;
            Some(body)
        } else {
            None
        };
        let end = self.expect_closing_lit("fi", start, "if statement must end with \"fi\"")?;
        Ok(IfNode {
            clauses,
            else_body,
            span: Span::new(start, end),
        })
    }

    pub(crate) fn parse_while(&mut self) -> Result<WhileNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        let (condition, had_semi) = self.follow_stmt_list(StopCtx::Keyword(&["do"]))?;
        if condition.is_empty() && !had_semi && self.tok.token_type == TokenType::Eof {
            return Err(self.follow_err(start, "\"while\" must be followed by a statement list"));
        }
        self.expect_keyword("do", start, "\"while <cond>\" must be followed by \"do\"")?;
        let (body, _) = self.follow_stmt_list(StopCtx::Keyword(&["done"]))?;
        let end =
            self.expect_closing_lit("done", start, "while statement must end with \"done\"")?;
        Ok(WhileNode {
            condition,
            body,
            span: Span::new(start, end),
        })
    }

    pub(crate) fn parse_until(&mut self) -> Result<UntilNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        let (condition, had_semi) = self.follow_stmt_list(StopCtx::Keyword(&["do"]))?;
        if condition.is_empty() && !had_semi && self.tok.token_type == TokenType::Eof {
            return Err(self.follow_err(start, "\"until\" must be followed by a statement list"));
        }
        self.expect_keyword("do", start, "\"until <cond>\" must be followed by \"do\"")?;
        let (body, _) = self.follow_stmt_list(StopCtx::Keyword(&["done"]))?;
        let end =
            self.expect_closing_lit("done", start, "until statement must end with \"done\"")?;
        Ok(UntilNode {
            condition,
            body,
            span: Span::new(start, end),
        })
    }

    pub(crate) fn parse_for(&mut self) -> Result<CommandNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        if self.tok.token_type == TokenType::DParenStart {
            return self.parse_c_style_for(start).map(CommandNode::CStyleFor);
        }
        let variable = self.parse_loop_variable(start, "for")?;
        let (words, body, braces) = self.parse_loop_rest(start, "for")?;
        let end = self.last_end;
        Ok(CommandNode::For(ForNode {
            variable,
            words,
            body,
            braces,
            span: Span::new(start, end),
        }))
    }

    pub(crate) fn parse_select(&mut self) -> Result<SelectNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        let variable = self.parse_loop_variable(start, "select")?;
        let (words, body, _) = self.parse_loop_rest(start, "select")?;
        let end = self.last_end;
        Ok(SelectNode {
            variable,
            words,
            body,
            span: Span::new(start, end),
        })
    }

    fn parse_loop_variable(&mut self, start: Position, kw: &str) -> Result<String, ParseError> {
        if self.tok.token_type != TokenType::Lit || !self.lit_word_ends() {
            return Err(self.follow_err(start, format!("\"{kw}\" must be followed by a literal")));
        }
        if self.tok.value == "in" {
            return Err(self.follow_err(
                start,
                format!("\"{kw} foo\" must be followed by \"in\", \"do\", ;, or a newline"),
            ));
        }
        let name = self.tok.value.clone();
        self.next()?;
        Ok(name)
    }

    fn parse_loop_rest(
        &mut self,
        start: Position,
        kw: &str,
    ) -> Result<(Option<Vec<WordNode>>, Vec<StatementNode>, bool), ParseError> {
        let mut words: Option<Vec<WordNode>> = None;
        match self.tok.token_type {
            TokenType::Lit if self.is_lit("in") => {
                self.next()?;
                let mut list = Vec::new();
                loop {
                    if self.can_start_word() {
                        list.push(self.parse_word()?);
                        continue;
                    }
                    match self.tok.token_type {
                        TokenType::Semicolon | TokenType::Newline | TokenType::Eof
                        | TokenType::Amp => break,
                        _ => {
                            return Err(self.syn(
                                self.tok.pos,
                                "word list can only contain words",
                            ))
                        }
                    }
                }
                words = Some(list);
                if self.tok.token_type == TokenType::Semicolon {
                    self.next()?;
                }
            }
            TokenType::Lit if self.is_lit("do") => {}
            TokenType::Semicolon => self.next()?,
            TokenType::Newline => {}
            _ => {
                return Err(self.follow_err(
                    start,
                    format!("\"{kw} foo\" must be followed by \"in\", \"do\", ;, or a newline"),
                ))
            }
        }
        self.skip_newlines()?;
        let (body, braces) = self.parse_loop_body(start, kw, words.is_some())?;
        Ok((words, body, braces))
    }

    fn parse_loop_body(
        &mut self,
        start: Position,
        kw: &str,
        had_words: bool,
    ) -> Result<(Vec<StatementNode>, bool), ParseError> {
        if self.is_lit("{") {
            if self.lang.is_posix() {
                return Err(self.lang_err(
                    self.tok.pos,
                    "for loops with braces are a bash/mksh feature",
                ));
            }
            let brace_pos = self.tok.pos;
            self.next()?;
            let body = self.stmt_list(StopCtx::Group)?;
            if self.is_lit("}") {
                self.next()?;
            } else {
                self.matched_or_recover(brace_pos, "{", "}")?;
            }
            return Ok((body, true));
        }
        let _ = had_words;
        let follow_msg = format!("\"{kw} foo [in words]\" must be followed by \"do\"");
        self.expect_keyword("do", start, &follow_msg)?;
        let (body, _) = self.follow_stmt_list(StopCtx::Keyword(&["done"]))?;
        self.expect_closing_lit(
            "done",
            start,
            &format!("{kw} statement must end with \"done\""),
        )?;
        Ok((body, false))
    }

    fn parse_c_style_for(&mut self, start: Position) -> Result<CStyleForNode, ParseError> {
        let dparen_pos = self.tok.pos;
        if !self.lang.is_bash() {
            return Err(self.lang_err(dparen_pos, "c-style fors are a bash feature"));
        }
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Command));
        self.next()?;
        let init = self.c_style_header_expr(dparen_pos)?;
        let condition = self.c_style_header_expr(dparen_pos)?;
        let update = if self.tok.token_type == TokenType::RParen {
            None
        } else {
            Some(self.arith_expr(false, false)?)
        };
        self.arithm_end(dparen_pos, "((")?;
        if self.tok.token_type == TokenType::Semicolon {
            self.next()?;
        }
        self.skip_newlines()?;
        let (body, _) = self.parse_loop_body(start, "for", true)?;
        Ok(CStyleForNode {
            init,
            condition,
            update,
            body,
            span: Span::new(start, self.last_end),
        })
    }

    /// One of the `;`-terminated header slots of a C-style for.
    fn c_style_header_expr(
        &mut self,
        dparen_pos: Position,
    ) -> Result<Option<ArithExpr>, ParseError> {
        let expr = if self.tok.token_type == TokenType::Semicolon {
            None
        } else {
            Some(self.arith_expr(false, false)?)
        };
        if self.tok.token_type != TokenType::Semicolon {
            self.lx.pop_mode();
            return Err(self.matched(dparen_pos, "((", "))"));
        }
        self.next()?;
        Ok(expr)
    }

    // =========================================================================
    // CASE
    // =========================================================================

    pub(crate) fn parse_case(&mut self) -> Result<CaseNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        if !self.can_start_word() {
            return Err(self.follow_err(start, "\"case\" must be followed by a word"));
        }
        let word = self.parse_word()?;
        self.skip_newlines()?;
        let braces = if self.is_lit("in") {
            self.next()?;
            false
        } else if self.is_lit("{") {
            if !self.lang.is_mksh() {
                return Err(self.lang_err(start, "\"case i {\" is a mksh feature"));
            }
            self.next()?;
            true
        } else {
            return Err(self.follow_err(start, "\"case x\" must be followed by \"in\""));
        };
        let mut items = Vec::new();
        loop {
            self.skip_newlines()?;
            if self.is_lit("esac")
                || (braces && self.is_lit("}"))
                || self.tok.token_type == TokenType::Eof
            {
                break;
            }
            let item_start = self.tok.pos;
            if self.tok.token_type == TokenType::LParen {
                self.next()?;
            }
            let mut patterns = Vec::new();
            loop {
                if !self.can_start_word() {
                    return Err(self.syn(
                        self.tok.pos,
                        "case patterns must consist of words",
                    ));
                }
                patterns.push(self.parse_word()?);
                match self.tok.token_type {
                    TokenType::Pipe => self.next()?,
                    TokenType::RParen => {
                        self.next()?;
                        break;
                    }
                    _ => {
                        return Err(self.syn(
                            self.tok.pos,
                            "case patterns must be separated with |",
                        ))
                    }
                }
            }
            let body = self.stmt_list(StopCtx::CaseBody { braces })?;
            let terminator = match self.tok.token_type {
                TokenType::DSemi => Some(CaseTerminator::DoubleSemi),
                TokenType::SemiAnd => Some(CaseTerminator::SemiAnd),
                TokenType::SemiSemiAnd => Some(CaseTerminator::SemiSemiAnd),
                TokenType::SemiPipe => Some(CaseTerminator::SemiPipe),
                _ => None,
            };
            let end = self.last_end;
            match terminator {
                Some(term) => {
                    self.next()?;
                    items.push(CaseItemNode {
                        patterns,
                        body,
                        terminator: term,
                        span: Span::new(item_start, self.last_end),
                    });
                }
                None => {
                    items.push(CaseItemNode {
                        patterns,
                        body,
                        terminator: CaseTerminator::DoubleSemi,
                        span: Span::new(item_start, end),
                    });
                }
            }
        }
        let end = if braces {
            self.expect_closing_lit("}", start, "case statement must end with \"}\"")?
        } else {
            self.expect_closing_lit("esac", start, "case statement must end with \"esac\"")?
        };
        Ok(CaseNode {
            word,
            items,
            braces,
            span: Span::new(start, end),
        })
    }

    // =========================================================================
    // FUNCTIONS
    // =========================================================================

    /// `function name [()] body` (Bash and mksh).
    pub(crate) fn parse_function_decl(&mut self) -> Result<FunctionDefNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        if self.tok.token_type != TokenType::Lit || self.tok.value.is_empty() {
            return Err(self.follow_err(start, "\"function\" must be followed by a name"));
        }
        let name_tok = self.tok.clone();
        self.next()?;
        let mut parens = false;
        if self.tok.token_type == TokenType::LParen {
            self.next()?;
            if self.tok.token_type != TokenType::RParen {
                return Err(self.follow_err(name_tok.pos, "\"foo(\" must be followed by )"));
            }
            self.next()?;
            parens = true;
        }
        self.skip_newlines()?;
        if !self.can_start_stmt() {
            return Err(self.follow_err(start, "\"foo()\" must be followed by a statement"));
        }
        let body = self.get_cmd_stmt()?;
        let span = Span::new(start, body.span.end);
        Ok(FunctionDefNode {
            name: name_tok.value,
            reserved_word: true,
            parens,
            body: Box::new(body),
            span,
        })
    }

    /// `name() body`, entered from a simple command when `(` follows its
    /// only word.
    pub(crate) fn parse_function_shorthand(
        &mut self,
        start: Position,
        name_word: WordNode,
    ) -> Result<CommandNode, ParseError> {
        let name = match name_word.lit() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(self.syn(start, "invalid func name")),
        };
        if self.lang.is_posix() && !valid_name(&name) {
            return Err(self.syn(start, "invalid func name"));
        }
        self.next()?;
        if self.tok.token_type != TokenType::RParen {
            return Err(self.follow_err(start, "\"foo(\" must be followed by )"));
        }
        self.next()?;
        self.skip_newlines()?;
        if !self.can_start_stmt() {
            return Err(self.follow_err(start, "\"foo()\" must be followed by a statement"));
        }
        let body = self.get_cmd_stmt()?;
        let span = Span::new(start, body.span.end);
        Ok(CommandNode::FunctionDef(FunctionDefNode {
            name,
            reserved_word: false,
            parens: true,
            body: Box::new(body),
            span,
        }))
    }

    // =========================================================================
    // ARITHMETIC COMMAND, LET, DECLARATIONS, COPROC
    // =========================================================================

    pub(crate) fn parse_arith_command(&mut self) -> Result<ArithmeticCommandNode, ParseError> {
        let start = self.tok.pos;
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Command));
        self.next()?;
        let mut unsigned = false;
        if self.tok.token_type == TokenType::Lit && self.tok.value == "#" {
            if !self.lang.is_mksh() {
                self.lx.pop_mode();
                return Err(self.lang_err(start, "unsigned expressions are a mksh feature"));
            }
            unsigned = true;
            self.next()?;
        }
        if self.tok.token_type == TokenType::RParen {
            self.lx.pop_mode();
            return Err(self.syn(start, "(( must be followed by an expression"));
        }
        if self.tok.token_type == TokenType::Eof {
            self.lx.pop_mode();
            return Err(self.matched(start, "((", "))"));
        }
        let expression = self.arith_expr(false, false)?;
        let end = self.arithm_end(start, "((")?;
        Ok(ArithmeticCommandNode {
            expression,
            unsigned,
            span: Span::new(start, end),
        })
    }

    pub(crate) fn parse_let_clause(&mut self) -> Result<LetNode, ParseError> {
        let start = self.tok.pos;
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Let));
        self.next()?;
        let mut exprs = Vec::new();
        loop {
            match self.tok.token_type {
                TokenType::Newline
                | TokenType::Eof
                | TokenType::Semicolon
                | TokenType::Amp
                | TokenType::AndAnd
                | TokenType::OrOr
                | TokenType::Pipe
                | TokenType::PipeAmp
                | TokenType::RParen
                | TokenType::BackQuoteEnd
                | TokenType::DSemi
                | TokenType::SemiAnd
                | TokenType::SemiSemiAnd
                | TokenType::SemiPipe => break,
                _ => {}
            }
            let expr = self.arith_expr(true, false)?;
            exprs.push(expr);
        }
        self.lx.pop_mode();
        if exprs.is_empty() {
            return Err(self.follow_err(start, "\"let\" must be followed by an expression"));
        }
        Ok(LetNode {
            exprs,
            span: Span::new(start, self.last_end),
        })
    }

    pub(crate) fn parse_declare_clause(&mut self) -> Result<DeclareNode, ParseError> {
        let start = self.tok.pos;
        let variant = self.tok.value.clone();
        self.next()?;
        let mut args = Vec::new();
        loop {
            if self.peek_redirect() {
                break;
            }
            match self.tok.token_type {
                TokenType::Lit if self.declare_assignment_ahead() => {
                    let assign = self.parse_declare_assignment()?;
                    args.push(assign);
                }
                TokenType::LParen => {
                    return Err(self.syn(
                        self.tok.pos,
                        format!("\"{variant}\" must be followed by names or assignments"),
                    ))
                }
                _ if self.can_start_word() => {
                    let word_pos = self.tok.pos;
                    let word = self.parse_word()?;
                    args.push(self.declare_naked_arg(word, word_pos)?);
                }
                _ => break,
            }
        }
        Ok(DeclareNode {
            variant,
            args,
            span: Span::new(start, self.last_end),
        })
    }

    fn declare_assignment_ahead(&self) -> bool {
        if self.lx.cur_char() == Some('[') && valid_name(&self.tok.value) {
            return true;
        }
        match self.lx.lit_eq_offset {
            Some(eq) => {
                let name = &self.tok.value[..eq];
                let name = name.strip_suffix('+').unwrap_or(name);
                valid_name(name)
            }
            None => false,
        }
    }

    fn parse_declare_assignment(&mut self) -> Result<AssignmentNode, ParseError> {
        // Shares the simple-command assignment grammar, including arrays.
        self.parse_assignment()
    }

    /// Flags like `-x`, bare names, and other naked declaration arguments.
    fn declare_naked_arg(
        &mut self,
        word: WordNode,
        word_pos: Position,
    ) -> Result<AssignmentNode, ParseError> {
        let span = word.span;
        if let Some(WordPart::Literal(l)) = word.parts.first() {
            if l.value.contains('=') && !l.value.starts_with('-') {
                return Err(self.syn(word_pos, "invalid var name"));
            }
        }
        if let Some(lit) = word.lit() {
            if valid_name(&lit) {
                return Ok(AssignmentNode {
                    name: lit,
                    append: false,
                    naked: true,
                    index: None,
                    value: None,
                    array: None,
                    span,
                });
            }
        }
        Ok(AssignmentNode {
            name: String::new(),
            append: false,
            naked: true,
            index: None,
            value: Some(word),
            array: None,
            span,
        })
    }

    pub(crate) fn parse_coproc_clause(&mut self) -> Result<CoprocNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        if !self.can_start_stmt() {
            return Err(self.follow_err(start, "coproc clause requires a command"));
        }
        let mut name = None;
        if self.tok.token_type == TokenType::Lit
            && self.lit_word_ends()
            && valid_name(&self.tok.value)
            && !KEYWORD_STARTERS.contains(&self.tok.value.as_str())
            && self.lx.lit_eq_offset.is_none()
            && self.lx.cur_char() != Some('[')
        {
            let name_tok = self.tok.clone();
            self.next()?;
            if self.starts_compound() {
                name = Some(name_tok.value);
            } else {
                // The name was the command itself.
                let word = WordNode {
                    parts: vec![WordPart::Literal(LiteralPart {
                        value: name_tok.value,
                        span: Span::new(name_tok.pos, name_tok.end),
                    })],
                    span: Span::new(name_tok.pos, name_tok.end),
                };
                let stmt = self.simple_cmd_stmt_with(name_tok.pos, word)?;
                let span = Span::new(start, stmt.span.end);
                return Ok(CoprocNode {
                    name: None,
                    statement: Box::new(stmt),
                    span,
                });
            }
        }
        let statement = self.get_cmd_stmt()?;
        let span = Span::new(start, statement.span.end);
        Ok(CoprocNode {
            name,
            statement: Box::new(statement),
            span,
        })
    }

    fn starts_compound(&self) -> bool {
        match self.tok.token_type {
            TokenType::LParen | TokenType::DParenStart => true,
            TokenType::Lit => {
                self.lit_word_ends() && KEYWORD_STARTERS.contains(&self.tok.value.as_str())
            }
            _ => false,
        }
    }
}
