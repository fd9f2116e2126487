//! Command Parser
//!
//! Simple commands: assignment prefixes (including array literals and
//! indexed assignments), words, redirections, and the heredoc queue.

use crate::ast::types::*;
use crate::parser::lexer::{ArithKind, LexMode, Lexer, TokenType};
use crate::parser::parser::{ParseRun, PendingHeredoc};
use crate::parser::types::{valid_name, ParseError};

const DECL_BUILTINS: &[&str] = &[
    "declare", "local", "export", "readonly", "typeset", "nameref",
];

impl<'a> ParseRun<'a> {
    pub(crate) fn parse_simple_command(
        &mut self,
        start: Position,
        redirs: &mut Vec<RedirectionNode>,
    ) -> Result<CommandNode, ParseError> {
        self.parse_simple_command_with(start, None, redirs)
    }

    /// Builds a statement around a simple command whose first word was
    /// already consumed, as `coproc name args...` needs.
    pub(crate) fn simple_cmd_stmt_with(
        &mut self,
        start: Position,
        first_word: WordNode,
    ) -> Result<StatementNode, ParseError> {
        let mut redirs = Vec::new();
        let command = self.parse_simple_command_with(start, Some(first_word), &mut redirs)?;
        Ok(StatementNode {
            command,
            redirections: redirs,
            negated: false,
            background: false,
            span: Span::new(start, self.last_end),
        })
    }

    fn parse_simple_command_with(
        &mut self,
        start: Position,
        first_word: Option<WordNode>,
        redirs: &mut Vec<RedirectionNode>,
    ) -> Result<CommandNode, ParseError> {
        let mut assignments: Vec<AssignmentNode> = Vec::new();
        let mut words: Vec<WordNode> = first_word.into_iter().collect();
        loop {
            if self.peek_redirect() {
                self.parse_redirection(redirs)?;
                continue;
            }
            match self.tok.token_type {
                TokenType::Lit if words.is_empty() && self.assignment_ahead() => {
                    let assign = self.parse_assignment()?;
                    assignments.push(assign);
                }
                _ if self.can_start_word() => {
                    if self.lang.is_posix()
                        && first_word_is(&words, "function")
                        && self.is_lit("{")
                    {
                        return Err(self.lang_err(
                            self.tok.pos,
                            "the \"function\" builtin is a bash feature",
                        ));
                    }
                    let word = self.parse_word()?;
                    if words.is_empty() {
                        if let Some(bad) = assignments
                            .iter()
                            .find(|a| a.array.is_some() || a.index.is_some())
                        {
                            return Err(self.syn(
                                bad.span.start,
                                "inline variables cannot be arrays",
                            ));
                        }
                    }
                    words.push(word);
                }
                TokenType::LParen => {
                    if words.len() == 1 && assignments.is_empty() && redirs.is_empty() {
                        let name_word = words.pop().unwrap_or_default();
                        return self.parse_function_shorthand(start, name_word);
                    }
                    if self.lang.is_posix() {
                        if first_word_is(&words, "function") {
                            return Err(self.lang_err(
                                self.tok.pos,
                                "the \"function\" builtin is a bash feature",
                            ));
                        }
                        if let Some(builtin) =
                            words.first().and_then(WordNode::lit).filter(|w| {
                                DECL_BUILTINS.contains(&w.as_str()) || w == "let"
                            })
                        {
                            return Err(self.lang_err(
                                self.tok.pos,
                                &format!("the \"{builtin}\" builtin is a bash feature"),
                            ));
                        }
                    }
                    return Err(self.syn(
                        self.tok.pos,
                        "a command can only contain words and redirects; encountered (",
                    ));
                }
                TokenType::DParenStart => {
                    if self.lang.is_posix() {
                        return Err(self.syn(start, "\"foo(\" must be followed by )"));
                    }
                    return Err(self.syn(
                        self.tok.pos,
                        "(( can only be used to open an arithmetic cmd",
                    ));
                }
                TokenType::RParen => {
                    if self.paren_depth > 0 {
                        break;
                    }
                    return Err(self.syn(
                        self.tok.pos,
                        "a command can only contain words and redirects; encountered )",
                    ));
                }
                _ => break,
            }
        }
        let span = Span::new(start, self.last_end);
        Ok(CommandNode::Simple(SimpleCommandNode {
            assignments,
            words,
            span,
        }))
    }

    /// Whether the current `Lit` token begins an assignment: either the
    /// lexer recorded a `=` after a valid name, or it stopped at `[` for an
    /// indexed assignment.
    fn assignment_ahead(&self) -> bool {
        if self.lx.cur_char() == Some('[') && valid_name(&self.tok.value) {
            return true;
        }
        let Some(eq) = self.lx.lit_eq_offset else {
            return false;
        };
        let name = &self.tok.value[..eq];
        let name = name.strip_suffix('+').unwrap_or(name);
        valid_name(name)
    }

    pub(crate) fn parse_assignment(&mut self) -> Result<AssignmentNode, ParseError> {
        if self.lx.cur_char() == Some('[') {
            return self.parse_indexed_assignment();
        }
        let tok = self.tok.clone();
        let eq = self.lx.lit_eq_offset.unwrap_or(0);
        let mut name_end = eq;
        let mut append = false;
        if tok.value[..eq].ends_with('+') {
            append = true;
            name_end -= 1;
        }
        let name = tok.value[..name_end].to_string();
        let head = tok.value[eq + 1..].to_string();
        let head_span = Lexer::lit_sub_span(&tok, eq + 1, tok.value.len());
        self.next()?;
        if head.is_empty() && self.tok.token_type == TokenType::LParen && !self.tok.spaced {
            if self.lang.is_posix() {
                return Err(self.lang_err(self.tok.pos, "arrays are a bash/mksh feature"));
            }
            let array = self.parse_array()?;
            let span = Span::new(tok.pos, self.last_end);
            return Ok(AssignmentNode {
                name,
                append,
                naked: false,
                index: None,
                value: None,
                array: Some(array),
                span,
            });
        }
        let first = if head.is_empty() {
            None
        } else {
            Some(WordPart::Literal(LiteralPart {
                value: head,
                span: head_span,
            }))
        };
        let value = self.collect_word(first)?;
        let span = Span::new(tok.pos, self.last_end);
        Ok(AssignmentNode {
            name,
            append,
            naked: false,
            index: None,
            value,
            array: None,
            span,
        })
    }

    /// `name[expr]=value` and the error cases of a bare `name[...`.
    fn parse_indexed_assignment(&mut self) -> Result<AssignmentNode, ParseError> {
        let name_tok = self.tok.clone();
        let start = name_tok.pos;
        let lb_pos = self.lx.pos();
        self.lx.bump()?; // the '['
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Bracket));
        self.next()?;
        if self.tok.token_type == TokenType::RBracket {
            self.lx.pop_mode();
            return Err(self.syn(lb_pos, "[ must be followed by an expression"));
        }
        let index = self.arith_expr(false, false)?;
        if self.tok.token_type != TokenType::RBracket {
            self.lx.pop_mode();
            return Err(self.matched(lb_pos, "[", "]"));
        }
        self.lx.pop_mode();
        // tok is `]`; the assignment operator must follow it directly.
        let append = match self.lx.cur_char() {
            Some('=') => {
                self.lx.bump()?;
                false
            }
            Some('+') => {
                if self.lx.src.followed_by("=")? {
                    self.lx.bump()?;
                    self.lx.bump()?;
                    true
                } else {
                    return Err(self.syn(start, "\"a[b]+\" must be followed by ="));
                }
            }
            _ => return Err(self.syn(start, "\"a[b]\" must be followed by =")),
        };
        self.lx.set_word_adjacent(true);
        self.next()?;
        if self.tok.token_type == TokenType::LParen && !self.tok.spaced {
            return Err(self.syn(self.tok.pos, "arrays cannot be nested"));
        }
        let value = self.collect_word(None)?;
        let span = Span::new(start, self.last_end);
        Ok(AssignmentNode {
            name: name_tok.value,
            append,
            naked: false,
            index: Some(Box::new(index)),
            value,
            array: None,
            span,
        })
    }

    /// `name=(elem [i]=elem ...)`; the opening parenthesis is the current
    /// token.
    fn parse_array(&mut self) -> Result<ArrayNode, ParseError> {
        let lparen_pos = self.tok.pos;
        self.lx.scan_array_elem = true;
        self.next()?;
        let mut elements = Vec::new();
        loop {
            while self.tok.token_type == TokenType::Newline {
                self.next()?;
            }
            match self.tok.token_type {
                TokenType::RParen => break,
                TokenType::Eof => {
                    self.lx.scan_array_elem = false;
                    return Err(self.matched(lparen_pos, "(", ")"));
                }
                TokenType::LBracket => {
                    let element = self.parse_array_indexed_element()?;
                    elements.push(element);
                }
                _ if self.can_start_word() => {
                    let start = self.tok.pos;
                    let value = self.parse_word()?;
                    let span = Span::new(start, value.span.end);
                    elements.push(ArrayElementNode {
                        index: None,
                        value,
                        span,
                    });
                }
                _ => {
                    self.lx.scan_array_elem = false;
                    return Err(self.syn(
                        self.tok.pos,
                        "array element values must be words",
                    ));
                }
            }
        }
        self.lx.scan_array_elem = false;
        let span = Span::new(lparen_pos, self.tok.end);
        self.next()?;
        Ok(ArrayNode { elements, span })
    }

    fn parse_array_indexed_element(&mut self) -> Result<ArrayElementNode, ParseError> {
        let lb_pos = self.tok.pos;
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Bracket));
        self.next()?;
        if matches!(
            self.tok.token_type,
            TokenType::RBracket | TokenType::RParen | TokenType::Eof
        ) {
            self.lx.pop_mode();
            return Err(self.syn(lb_pos, "[ must be followed by an expression"));
        }
        let index = self.arith_expr(false, false)?;
        if self.tok.token_type != TokenType::RBracket {
            self.lx.pop_mode();
            return Err(self.matched(lb_pos, "[", "]"));
        }
        self.lx.pop_mode();
        if self.lx.cur_char() != Some('=') {
            return Err(self.syn(lb_pos, "\"[x]\" must be followed by ="));
        }
        self.lx.bump()?;
        if self.lx.cur_char() == Some('#') {
            return Err(self.syn(self.lx.pos(), "array element values must be words"));
        }
        self.lx.set_word_adjacent(true);
        self.next()?;
        if self.tok.token_type == TokenType::LParen && !self.tok.spaced {
            return Err(self.syn(self.tok.pos, "arrays cannot be nested"));
        }
        let value = self.collect_word(None)?.unwrap_or_default();
        let span = Span::new(lb_pos, self.last_end);
        Ok(ArrayElementNode {
            index: Some(Box::new(index)),
            value,
            span,
        })
    }

    // =========================================================================
    // REDIRECTIONS
    // =========================================================================

    pub(crate) fn peek_redirect(&self) -> bool {
        match self.tok.token_type {
            TokenType::Less
            | TokenType::Great
            | TokenType::DGreat
            | TokenType::LessAnd
            | TokenType::GreatAnd
            | TokenType::LessGreat
            | TokenType::Clobber
            | TokenType::DLess
            | TokenType::DLessDash
            | TokenType::TLess
            | TokenType::AndGreat
            | TokenType::AndDGreat
            | TokenType::FdVariable => true,
            TokenType::Lit => {
                !self.tok.value.is_empty()
                    && self.tok.value.chars().all(|c| c.is_ascii_digit())
                    && matches!(self.lx.cur_char(), Some('<') | Some('>'))
            }
            _ => false,
        }
    }

    pub(crate) fn parse_redirection(
        &mut self,
        redirs: &mut Vec<RedirectionNode>,
    ) -> Result<(), ParseError> {
        let start = self.tok.pos;
        let mut fd: Option<i32> = None;
        let mut fd_variable: Option<String> = None;
        match self.tok.token_type {
            TokenType::Lit => {
                fd = Some(self.tok.value.parse().unwrap_or(0));
                self.next()?;
            }
            TokenType::FdVariable => {
                if !self.lang.is_bash() {
                    return Err(self.lang_err(
                        self.tok.pos,
                        "{varname} redirects are a bash feature",
                    ));
                }
                fd_variable = Some(self.tok.value.clone());
                self.next()?;
            }
            _ => {}
        }
        let op_pos = self.tok.pos;
        let op_display = self.tok.display();
        let operator = match self.tok.token_type {
            TokenType::Less => RedirectionOperator::Less,
            TokenType::Great => RedirectionOperator::Great,
            TokenType::DGreat => RedirectionOperator::DGreat,
            TokenType::LessAnd => RedirectionOperator::LessAnd,
            TokenType::GreatAnd => RedirectionOperator::GreatAnd,
            TokenType::LessGreat => RedirectionOperator::LessGreat,
            TokenType::Clobber => RedirectionOperator::Clobber,
            TokenType::DLess => RedirectionOperator::DLess,
            TokenType::DLessDash => RedirectionOperator::DLessDash,
            TokenType::TLess => {
                if self.lang.is_posix() {
                    return Err(self.lang_err(
                        self.tok.pos,
                        "herestrings are a bash/mksh feature",
                    ));
                }
                RedirectionOperator::TLess
            }
            TokenType::AndGreat | TokenType::AndDGreat => {
                if self.lang.is_posix() {
                    return Err(self.lang_err(
                        self.tok.pos,
                        "&> redirects are a bash/mksh feature",
                    ));
                }
                if self.tok.token_type == TokenType::AndGreat {
                    RedirectionOperator::AndGreat
                } else {
                    RedirectionOperator::AndDGreat
                }
            }
            _ => unreachable!("redirection operator expected"),
        };
        if operator.is_heredoc() {
            return self.parse_heredoc_redirect(start, op_pos, op_display, operator, fd, redirs);
        }
        self.next()?;
        let target = if !self.can_start_word() || self.tok.token_type == TokenType::Newline {
            if self.try_recover() {
                Self::recovered_word()
            } else {
                return Err(self.syn(
                    op_pos,
                    format!("{op_display} must be followed by a word"),
                ));
            }
        } else {
            self.parse_word()?
        };
        redirs.push(RedirectionNode {
            fd,
            fd_variable,
            operator,
            target,
            heredoc: None,
            span: Span::new(start, self.last_end),
        });
        Ok(())
    }

    fn parse_heredoc_redirect(
        &mut self,
        start: Position,
        op_pos: Position,
        op_display: String,
        operator: RedirectionOperator,
        fd: Option<i32>,
        redirs: &mut Vec<RedirectionNode>,
    ) -> Result<(), ParseError> {
        self.next()?;
        if !self.can_start_word() {
            return Err(self.syn(
                op_pos,
                format!("{op_display} must be followed by a word"),
            ));
        }
        let target = self.parse_word()?;
        let (delimiter, quoted) = self.heredoc_delimiter(&target)?;
        self.register_heredoc(PendingHeredoc {
            delimiter,
            quoted,
            strip_tabs: operator == RedirectionOperator::DLessDash,
            op_pos: start,
        });
        redirs.push(RedirectionNode {
            fd,
            fd_variable: None,
            operator,
            target,
            heredoc: None,
            span: Span::new(start, self.last_end),
        });
        Ok(())
    }

    /// Dequotes a heredoc delimiter word, rejecting expansions. Returns the
    /// delimiter text and whether any quoting was present (which disables
    /// expansions in the body).
    fn heredoc_delimiter(&self, word: &WordNode) -> Result<(String, bool), ParseError> {
        let mut text = String::new();
        let mut quoted = false;
        for part in &word.parts {
            match part {
                WordPart::Literal(l) => {
                    if l.value.contains('\\') {
                        quoted = true;
                    }
                    text.push_str(&dequote_backslashes(&l.value));
                }
                WordPart::SingleQuoted(q) => {
                    quoted = true;
                    text.push_str(&q.value);
                }
                WordPart::AnsiCQuoted(q) => {
                    quoted = true;
                    text.push_str(&q.value);
                }
                WordPart::DoubleQuoted(d) => {
                    quoted = true;
                    for inner in &d.parts {
                        match inner {
                            WordPart::Literal(l) => {
                                text.push_str(&dequote_backslashes(&l.value))
                            }
                            other => {
                                return Err(self.syn(
                                    other.span().start,
                                    "expansions not allowed in heredoc words",
                                ))
                            }
                        }
                    }
                }
                other => {
                    return Err(self.syn(
                        other.span().start,
                        "expansions not allowed in heredoc words",
                    ))
                }
            }
        }
        Ok((text, quoted))
    }

    /// Reads the bodies of all pending heredocs registered in the current
    /// context, in FIFO order. Called when a newline token is produced.
    pub(crate) fn read_pending_heredocs(&mut self) -> Result<(), ParseError> {
        let saved_tok = self.tok.clone();
        while self.pending_heredocs.len() > self.buried_heredocs {
            let ph = self.pending_heredocs.remove(self.buried_heredocs);
            self.lx.push_mode(LexMode::HeredocBody {
                delimiter: ph.delimiter.clone(),
                strip_tabs: ph.strip_tabs,
                expand: !ph.quoted,
            });
            self.next()?;
            let start = self.tok.pos;
            let mut parts = Vec::new();
            let end;
            loop {
                match self.tok.token_type {
                    TokenType::HeredocEnd => {
                        end = self.tok.pos;
                        break;
                    }
                    TokenType::Eof => {
                        self.lx.pop_mode();
                        return Err(self.syn_incomplete(
                            ph.op_pos,
                            format!("unclosed here-document '{}'", ph.delimiter),
                        ));
                    }
                    _ => match self.word_part()? {
                        Some(part) => parts.push(part),
                        None => {
                            self.lx.pop_mode();
                            return Err(self.syn_incomplete(
                                ph.op_pos,
                                format!("unclosed here-document '{}'", ph.delimiter),
                            ));
                        }
                    },
                }
            }
            self.lx.pop_mode();
            let body = WordNode {
                parts,
                span: Span::new(start, end),
            };
            self.filled_heredocs.push_back(HeredocNode {
                delimiter: ph.delimiter,
                quoted: ph.quoted,
                strip_tabs: ph.strip_tabs,
                body,
            });
        }
        self.tok = saved_tok;
        Ok(())
    }
}

fn first_word_is(words: &[WordNode], name: &str) -> bool {
    words.first().and_then(WordNode::lit).as_deref() == Some(name)
}

/// Removes one level of backslash escaping from a literal, dropping
/// escaped newlines entirely.
fn dequote_backslashes(s: &str) -> String {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\n') | None => {}
                Some(next) => out.push(next),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dequote_backslashes() {
        assert_eq!(dequote_backslashes("EOF"), "EOF");
        assert_eq!(dequote_backslashes("\\EOF"), "EOF");
        assert_eq!(dequote_backslashes("\\\\EOF"), "\\EOF");
        assert_eq!(dequote_backslashes("E\\\nOF"), "EOF");
    }
}
