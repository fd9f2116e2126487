//! Word Parser
//!
//! Assembles words from part tokens: literals, quotes, command and process
//! substitutions, arithmetic expansions and extended globs. Parameter
//! expansion bodies live in the expansion parser.

use crate::ast::types::*;
use crate::parser::lexer::{ArithKind, LexMode, TokenType};
use crate::parser::parser::{ParseRun, StopCtx};
use crate::parser::types::ParseError;

impl<'a> ParseRun<'a> {
    /// Parses one full word starting at the current token.
    pub(crate) fn parse_word(&mut self) -> Result<WordNode, ParseError> {
        let start = self.tok.pos;
        let first = match self.word_part()? {
            Some(part) => part,
            None => {
                let display = self.tok.display();
                return Err(self.syn(start, format!("{display} is not a valid word")));
            }
        };
        match self.collect_word(Some(first))? {
            Some(word) => Ok(word),
            None => Ok(WordNode::default()),
        }
    }

    /// Extends a word with further unspaced parts. Returns `None` when no
    /// part was given and none follows.
    pub(crate) fn collect_word(
        &mut self,
        first: Option<WordPart>,
    ) -> Result<Option<WordNode>, ParseError> {
        let mut parts: Vec<WordPart> = first.into_iter().collect();
        loop {
            if self.tok.spaced || !self.can_start_word() {
                break;
            }
            match self.word_part()? {
                Some(part) => parts.push(part),
                None => break,
            }
        }
        if parts.is_empty() {
            return Ok(None);
        }
        let start = parts.first().map(|p| p.span().start).unwrap_or_default();
        let end = parts
            .iter()
            .rev()
            .map(|p| p.span().end)
            .find(|e| e.is_valid())
            .unwrap_or(start);
        Ok(Some(WordNode {
            parts,
            span: Span::new(start, end),
        }))
    }

    /// Parses a single word part from the current token, or returns `None`
    /// when the token cannot begin one.
    pub(crate) fn word_part(&mut self) -> Result<Option<WordPart>, ParseError> {
        let pos = self.tok.pos;
        match self.tok.token_type {
            TokenType::Lit => {
                let part = WordPart::Literal(LiteralPart {
                    value: self.tok.value.clone(),
                    span: Span::new(pos, self.tok.end),
                });
                self.next()?;
                Ok(Some(part))
            }
            TokenType::SglQuote => {
                let (value, end) = self.lx.scan_single_quote()?;
                let end = self.close_quote_end(end, pos, "reached EOF without closing quote '")?;
                self.next()?;
                Ok(Some(WordPart::SingleQuoted(SingleQuotedPart {
                    value,
                    span: Span::new(pos, end),
                })))
            }
            TokenType::DollSglQuote => {
                let (value, end) = self.lx.scan_ansi_quote()?;
                let end = self.close_quote_end(end, pos, "reached EOF without closing quote '")?;
                self.next()?;
                Ok(Some(WordPart::AnsiCQuoted(AnsiCQuotedPart {
                    value,
                    span: Span::new(pos, end),
                })))
            }
            TokenType::DblQuote => self.parse_dquote_part(false).map(Some),
            TokenType::DollDblQuote => self.parse_dquote_part(true).map(Some),
            TokenType::Dollar => {
                let part = WordPart::Literal(LiteralPart {
                    value: "$".into(),
                    span: Span::new(pos, self.tok.end),
                });
                self.next()?;
                Ok(Some(part))
            }
            TokenType::DollarName => {
                let part = WordPart::ParameterExpansion(ParameterExpansionPart {
                    parameter: self.tok.value.clone(),
                    short: true,
                    indirect: false,
                    length: false,
                    width: false,
                    index: None,
                    operation: None,
                    span: Span::new(pos, self.tok.end),
                });
                self.next()?;
                Ok(Some(part))
            }
            TokenType::DollBrace => self.parse_param_expansion().map(Some),
            TokenType::DollParen => self.parse_cmd_subst().map(Some),
            TokenType::BackQuote => self.parse_backquote_subst().map(Some),
            TokenType::DollDblParen => self.parse_arith_expansion().map(Some),
            TokenType::DollBracket => self.parse_bracket_arith_expansion().map(Some),
            TokenType::ExtGlob => self.parse_extglob_part().map(Some),
            TokenType::ProcSubIn => self.parse_proc_subst(ProcessDirection::Input).map(Some),
            TokenType::ProcSubOut => self.parse_proc_subst(ProcessDirection::Output).map(Some),
            _ => Ok(None),
        }
    }

    /// Resolves a quote scanner's end position, recovering or erroring when
    /// the input ran out first.
    fn close_quote_end(
        &mut self,
        end: Option<Position>,
        open: Position,
        msg: &str,
    ) -> Result<Position, ParseError> {
        match end {
            Some(end) => Ok(end),
            None => {
                if self.try_recover() {
                    Ok(Position::recovered())
                } else {
                    Err(self.syn_incomplete(open, msg))
                }
            }
        }
    }

    fn parse_dquote_part(&mut self, locale: bool) -> Result<WordPart, ParseError> {
        let open = self.tok.pos;
        self.lx.push_mode(LexMode::DoubleQuote);
        self.next()?;
        let mut parts = Vec::new();
        let end;
        loop {
            match self.tok.token_type {
                TokenType::DblQuote => {
                    end = self.tok.end;
                    self.lx.pop_mode();
                    self.next()?;
                    break;
                }
                TokenType::Eof => {
                    self.lx.pop_mode();
                    if self.try_recover() {
                        end = Position::recovered();
                        break;
                    }
                    return Err(
                        self.syn_incomplete(open, "reached EOF without closing quote \"")
                    );
                }
                TokenType::BackQuoteEnd => {
                    self.lx.pop_mode();
                    return Err(self.syn(open, "reached ` without closing quote \""));
                }
                _ => match self.word_part()? {
                    Some(part) => parts.push(part),
                    None => {
                        self.lx.pop_mode();
                        let display = self.tok.display();
                        return Err(
                            self.syn(self.tok.pos, format!("{display} is not a valid word"))
                        );
                    }
                },
            }
        }
        Ok(WordPart::DoubleQuoted(DoubleQuotedPart {
            parts,
            locale,
            span: Span::new(open, end),
        }))
    }

    fn parse_cmd_subst(&mut self) -> Result<WordPart, ParseError> {
        let open = self.tok.pos;
        self.paren_depth += 1;
        let buried = self.bury_heredocs();
        self.lx.push_mode(LexMode::Command);
        self.next()?;
        let mut statements = Vec::new();
        self.stmt_list_into(&mut statements, StopCtx::Subshell)?;
        let end = if self.tok.token_type == TokenType::RParen {
            let end = self.tok.end;
            self.unbury_heredocs(buried)?;
            self.lx.pop_mode();
            self.paren_depth -= 1;
            self.next()?;
            end
        } else {
            self.unbury_heredocs(buried)?;
            self.lx.pop_mode();
            self.paren_depth -= 1;
            self.matched_or_recover(open, "(", ")")?
        };
        Ok(WordPart::CommandSubstitution(CommandSubstitutionPart {
            statements,
            backquotes: false,
            valsub: None,
            span: Span::new(open, end),
        }))
    }

    pub(crate) fn parse_backquote_subst(&mut self) -> Result<WordPart, ParseError> {
        let open = self.tok.pos;
        self.lx.open_bquotes += 1;
        let buried = self.bury_heredocs();
        self.lx.push_mode(LexMode::Command);
        self.next()?;
        let mut statements = Vec::new();
        self.stmt_list_into(&mut statements, StopCtx::Backquote)?;
        let end = if self.tok.token_type == TokenType::BackQuoteEnd {
            let end = self.tok.end;
            self.unbury_heredocs(buried)?;
            self.lx.open_bquotes -= 1;
            self.lx.pop_mode();
            self.next()?;
            end
        } else {
            self.unbury_heredocs(buried)?;
            self.lx.open_bquotes -= 1;
            self.lx.pop_mode();
            if self.tok.token_type == TokenType::Eof && self.try_recover() {
                Position::recovered()
            } else {
                return Err(
                    self.syn_incomplete(open, "reached EOF without closing quote `")
                );
            }
        };
        Ok(WordPart::CommandSubstitution(CommandSubstitutionPart {
            statements,
            backquotes: true,
            valsub: None,
            span: Span::new(open, end),
        }))
    }

    fn parse_arith_expansion(&mut self) -> Result<WordPart, ParseError> {
        let open = self.tok.pos;
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Expansion));
        self.next()?;
        let mut unsigned = false;
        if self.tok.token_type == TokenType::Lit && self.tok.value == "#" {
            if !self.lang.is_mksh() {
                self.lx.pop_mode();
                return Err(self.lang_err(open, "unsigned expressions are a mksh feature"));
            }
            unsigned = true;
            self.next()?;
        }
        if self.tok.token_type == TokenType::RParen {
            self.lx.pop_mode();
            return Err(self.syn(open, "$(( must be followed by an expression"));
        }
        if self.tok.token_type == TokenType::Eof {
            self.lx.pop_mode();
            return Err(self.matched(open, "$((", "))"));
        }
        let expression = self.arith_expr(false, false)?;
        let end = self.arithm_end(open, "$((")?;
        Ok(WordPart::ArithmeticExpansion(ArithmeticExpansionPart {
            expression,
            bracket: false,
            unsigned,
            span: Span::new(open, end),
        }))
    }

    /// The deprecated `$[expr]` form (Bash).
    fn parse_bracket_arith_expansion(&mut self) -> Result<WordPart, ParseError> {
        let open = self.tok.pos;
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Bracket));
        self.next()?;
        if self.tok.token_type == TokenType::RBracket {
            self.lx.pop_mode();
            return Err(self.syn(open, "$[ must be followed by an expression"));
        }
        let expression = self.arith_expr(false, false)?;
        let end = if self.tok.token_type == TokenType::RBracket {
            let end = self.tok.end;
            self.lx.pop_mode();
            self.next()?;
            end
        } else {
            self.lx.pop_mode();
            return Err(self.matched(open, "$[", "]"));
        };
        Ok(WordPart::ArithmeticExpansion(ArithmeticExpansionPart {
            expression,
            bracket: true,
            unsigned: false,
            span: Span::new(open, end),
        }))
    }

    fn parse_extglob_part(&mut self) -> Result<WordPart, ParseError> {
        let open = self.tok.pos;
        let op_str = self.tok.value.clone();
        if self.lang.is_posix() {
            return Err(self.lang_err(open, "extended globs are a bash/mksh feature"));
        }
        let operator = match op_str.as_str() {
            "?(" => ExtGlobOp::ZeroOrOne,
            "*(" => ExtGlobOp::ZeroOrMore,
            "+(" => ExtGlobOp::OneOrMore,
            "@(" => ExtGlobOp::One,
            _ => ExtGlobOp::Not,
        };
        let (pattern, end) = self.lx.scan_extglob()?;
        let end = match end {
            Some(end) => end,
            None => {
                if self.try_recover() {
                    Position::recovered()
                } else {
                    return Err(self.syn_incomplete(
                        open,
                        format!("reached EOF without matching {op_str} with )"),
                    ));
                }
            }
        };
        self.next()?;
        Ok(WordPart::ExtGlob(ExtGlobPart {
            operator,
            pattern,
            span: Span::new(open, end),
        }))
    }

    fn parse_proc_subst(&mut self, direction: ProcessDirection) -> Result<WordPart, ParseError> {
        let open = self.tok.pos;
        let op_str = self.tok.value.clone();
        self.paren_depth += 1;
        let buried = self.bury_heredocs();
        self.lx.push_mode(LexMode::Command);
        self.next()?;
        let mut statements = Vec::new();
        self.stmt_list_into(&mut statements, StopCtx::Subshell)?;
        let end = if self.tok.token_type == TokenType::RParen {
            let end = self.tok.end;
            self.unbury_heredocs(buried)?;
            self.lx.pop_mode();
            self.paren_depth -= 1;
            self.next()?;
            end
        } else {
            self.unbury_heredocs(buried)?;
            self.lx.pop_mode();
            self.paren_depth -= 1;
            self.matched_or_recover(open, &op_str, ")")?
        };
        Ok(WordPart::ProcessSubstitution(ProcessSubstitutionPart {
            direction,
            statements,
            span: Span::new(open, end),
        }))
    }
}

/// Splits literal brace lists and ranges in `word` into
/// [`WordPart::BraceExpansion`] parts, leaving everything else untouched.
/// Parsing itself keeps braces literal; this is the opt-in pass on top.
pub fn split_braces(word: &WordNode) -> WordNode {
    let mut parts = Vec::new();
    for part in &word.parts {
        match part {
            WordPart::Literal(l) => split_literal(&l.value, l.span, &mut parts),
            other => parts.push(other.clone()),
        }
    }
    WordNode {
        parts,
        span: word.span,
    }
}

fn split_literal(text: &str, span: Span, out: &mut Vec<WordPart>) {
    let chars: Vec<char> = text.chars().collect();
    let mut lit_start = 0;
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            if let Some(close) = matching_brace(&chars, i) {
                let inner: String = chars[i + 1..close].iter().collect();
                if let Some(part) = brace_part(&inner, span) {
                    if lit_start < i {
                        let value: String = chars[lit_start..i].iter().collect();
                        out.push(WordPart::Literal(LiteralPart { value, span }));
                    }
                    out.push(part);
                    i = close + 1;
                    lit_start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    if lit_start < chars.len() {
        let value: String = chars[lit_start..].iter().collect();
        out.push(WordPart::Literal(LiteralPart { value, span }));
    }
}

fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn brace_part(inner: &str, span: Span) -> Option<WordPart> {
    // `{x..y}` and `{x..y..n}` sequences.
    let seq: Vec<&str> = inner.split("..").collect();
    if (seq.len() == 2 || seq.len() == 3) && seq.iter().all(|s| !s.is_empty() && !s.contains(',')) {
        let elements = seq
            .iter()
            .map(|s| WordNode {
                parts: vec![WordPart::Literal(LiteralPart {
                    value: (*s).to_string(),
                    span,
                })],
                span,
            })
            .collect();
        return Some(WordPart::BraceExpansion(BraceExpansionPart {
            sequence: true,
            elements,
            span,
        }));
    }
    // `{a,b,c}` lists; a lone word without commas is not an expansion.
    if !top_level_comma(inner) {
        return None;
    }
    let mut elements = Vec::new();
    let mut depth = 0;
    let mut cur = String::new();
    for c in inner.chars() {
        match c {
            '{' => {
                depth += 1;
                cur.push(c);
            }
            '}' => {
                depth -= 1;
                cur.push(c);
            }
            ',' if depth == 0 => {
                elements.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    elements.push(cur);
    let elements = elements
        .into_iter()
        .map(|value| {
            let lit = WordNode {
                parts: vec![WordPart::Literal(LiteralPart {
                    value: value.clone(),
                    span,
                })],
                span,
            };
            // Nested braces split recursively.
            split_braces(&lit)
        })
        .collect();
    Some(WordPart::BraceExpansion(BraceExpansionPart {
        sequence: false,
        elements,
        span,
    }))
}

fn top_level_comma(inner: &str) -> bool {
    let mut depth = 0;
    for c in inner.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}
