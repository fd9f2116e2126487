//! Parameter Expansion Parser
//!
//! The `${...}` grammar: optional sigil, parameter name or special
//! parameter, optional array index, and at most one operator. Also the
//! `${ stmts;}` and `${|stmts;}` value substitutions.

use crate::ast::types::*;
use crate::parser::lexer::{ArithKind, LexMode, TokenType};
use crate::parser::parser::{ParseRun, StopCtx};
use crate::parser::types::{valid_name, ParseError};

const BASH_TRANSFORM_OPS: &[char] = &['Q', 'E', 'P', 'A', 'a', 'K', 'k', 'L', 'U', 'u'];

impl<'a> ParseRun<'a> {
    /// Parses a `${...}` expansion; the current token is `${`.
    pub(crate) fn parse_param_expansion(&mut self) -> Result<WordPart, ParseError> {
        let dollar = self.tok.pos;
        self.lx.push_mode(LexMode::ParamName);
        self.next()?;

        // Value substitutions: `${ stmts;}` and `${|stmts;}`.
        if self.tok.token_type == TokenType::Lit && self.tok.value == " " {
            return self.parse_valsub(dollar, ValsubStyle::Stdout);
        }
        if self.tok.token_type == TokenType::Pipe {
            return self.parse_valsub(dollar, ValsubStyle::ReplyVar);
        }

        let mut indirect = false;
        let mut length = false;
        let mut width = false;
        let mut operation: Option<ParamOperation> = None;
        let param_pos;
        let parameter: String;

        match self.tok.token_type {
            TokenType::Hash => {
                self.next()?;
                match self.tok.token_type {
                    TokenType::RBrace => {
                        param_pos = self.tok.pos;
                        parameter = "#".into();
                    }
                    TokenType::Lit
                    | TokenType::At
                    | TokenType::Star
                    | TokenType::Quest
                    | TokenType::Minus
                    | TokenType::Dollar
                    | TokenType::Excl => {
                        length = true;
                        param_pos = self.tok.pos;
                        parameter = self.read_param_name(dollar)?;
                    }
                    _ if self.param_operator_ahead() => {
                        // `${#-x}` and friends: `#` is the parameter.
                        param_pos = self.tok.pos;
                        parameter = "#".into();
                    }
                    _ => {
                        return Err(self.param_literal_err(dollar));
                    }
                }
            }
            TokenType::DblHash => {
                // `${##}`: the length of `#`.
                length = true;
                param_pos = self.tok.pos;
                parameter = "#".into();
                self.next()?;
            }
            TokenType::Percent => {
                if !self.lang.is_mksh() {
                    return Err(self.lang_err(dollar, "\"${%foo}\" is a mksh feature"));
                }
                self.next()?;
                if self.tok.token_type == TokenType::RBrace {
                    param_pos = self.tok.pos;
                    parameter = "%".into();
                } else {
                    width = true;
                    param_pos = self.tok.pos;
                    parameter = self.read_param_name(dollar)?;
                }
            }
            TokenType::DblPercent => {
                if !self.lang.is_mksh() {
                    return Err(self.lang_err(dollar, "\"${%foo}\" is a mksh feature"));
                }
                width = true;
                param_pos = self.tok.pos;
                parameter = "%".into();
                self.next()?;
            }
            TokenType::Excl => {
                self.next()?;
                if self.tok.token_type == TokenType::RBrace {
                    param_pos = self.tok.pos;
                    parameter = "!".into();
                } else {
                    indirect = true;
                    param_pos = self.tok.pos;
                    parameter = self.read_param_name(dollar)?;
                    // The POSIX gate fires only for the plain `${!foo}`
                    // form; suffixed forms carry their own diagnostics.
                    if self.lang.is_posix() && self.tok.token_type == TokenType::RBrace {
                        return Err(
                            self.lang_err(dollar, "\"${!foo}\" is a bash/mksh feature")
                        );
                    }
                }
            }
            TokenType::RBrace => {
                return Err(self.syn(self.tok.pos, "parameter expansion requires a literal"));
            }
            TokenType::Eof => return Err(self.matched(dollar, "${", "}")),
            _ => {
                param_pos = self.tok.pos;
                parameter = self.read_param_name(dollar)?;
            }
        }

        // Special parameters cannot be glued to a word: `${@foo}`.
        if matches!(parameter.as_str(), "@" | "*" | "$" | "?" | "-")
            && self.tok.token_type == TokenType::Lit
            && self.tok.value != " "
        {
            return Err(self.syn(
                self.tok.pos,
                format!("{parameter} cannot be followed by a word"),
            ));
        }

        // `${!prefix*}` and `${!prefix@}` name listings.
        if indirect && self.tok.token_type == TokenType::Star {
            if !self.lang.is_bash() {
                return Err(self.lang_err(dollar, "\"${!foo*}\" is a bash feature"));
            }
            self.next()?;
            operation = Some(ParamOperation::NamePrefix(VarNamePrefixOp { star: true }));
        } else if indirect && self.tok.token_type == TokenType::At {
            if self.lang.is_bash() {
                self.next()?;
                operation = Some(ParamOperation::NamePrefix(VarNamePrefixOp { star: false }));
            } else if self.lang.is_mksh() {
                return Err(self.lang_err(dollar, "\"${!foo@}\" is a bash feature"));
            }
            // POSIX falls through to the operator dispatch, which reports
            // the `@` operator as unavailable at its own position.
        }

        // Array index.
        let _ = param_pos;
        let mut index: Option<Box<ArithExpr>> = None;
        if self.tok.token_type == TokenType::LBracket && operation.is_none() {
            if self.lang.is_posix() {
                return Err(self.lang_err(self.tok.pos, "arrays are a bash/mksh feature"));
            }
            if !valid_name(&parameter) {
                return Err(self.syn(self.tok.pos, "cannot index a special parameter name"));
            }
            let idx = self.parse_param_index()?;
            if indirect {
                if let ArithExpr::Word(w) = &idx {
                    match w.lit().as_deref() {
                        Some("@") => {
                            operation = Some(ParamOperation::Keys(ArrayKeysOp { star: false }));
                        }
                        Some("*") => {
                            operation = Some(ParamOperation::Keys(ArrayKeysOp { star: true }));
                        }
                        _ => {}
                    }
                }
            }
            if operation.is_none() {
                index = Some(Box::new(idx));
            }
        }

        // At most one operator.
        let end = if operation.is_some() {
            self.close_brace(dollar)?
        } else {
            match self.tok.token_type {
                TokenType::RBrace => self.close_brace(dollar)?,
                TokenType::Eof => {
                    if self.try_recover() {
                        self.lx.pop_mode();
                        Position::recovered()
                    } else {
                        return Err(self.matched(dollar, "${", "}"));
                    }
                }
                _ if length || width => {
                    return Err(self.syn(
                        self.tok.pos,
                        "cannot combine multiple parameter expansion operators",
                    ))
                }
                TokenType::Minus | TokenType::ColonMinus => {
                    let check_empty = self.tok.token_type == TokenType::ColonMinus;
                    let (word, end) = self.param_arg_word(dollar, false)?;
                    operation = Some(ParamOperation::DefaultValue(DefaultValueOp {
                        word,
                        check_empty,
                    }));
                    end
                }
                TokenType::Assign | TokenType::ColonEq => {
                    let check_empty = self.tok.token_type == TokenType::ColonEq;
                    let (word, end) = self.param_arg_word(dollar, false)?;
                    operation = Some(ParamOperation::AssignDefault(AssignDefaultOp {
                        word,
                        check_empty,
                    }));
                    end
                }
                TokenType::Quest | TokenType::ColonQuest => {
                    let check_empty = self.tok.token_type == TokenType::ColonQuest;
                    let (word, end) = self.param_arg_word(dollar, false)?;
                    operation = Some(ParamOperation::ErrorIfUnset(ErrorIfUnsetOp {
                        word,
                        check_empty,
                    }));
                    end
                }
                TokenType::Plus | TokenType::ColonPlus => {
                    let check_empty = self.tok.token_type == TokenType::ColonPlus;
                    let (word, end) = self.param_arg_word(dollar, false)?;
                    operation = Some(ParamOperation::UseAlternative(UseAlternativeOp {
                        word,
                        check_empty,
                    }));
                    end
                }
                TokenType::Hash | TokenType::DblHash => {
                    let greedy = self.tok.token_type == TokenType::DblHash;
                    let (pattern, end) = self.param_arg_word(dollar, false)?;
                    operation = Some(ParamOperation::PatternRemoval(PatternRemovalOp {
                        pattern,
                        side: PatternRemovalSide::Prefix,
                        greedy,
                    }));
                    end
                }
                TokenType::Percent | TokenType::DblPercent => {
                    let greedy = self.tok.token_type == TokenType::DblPercent;
                    let (pattern, end) = self.param_arg_word(dollar, false)?;
                    operation = Some(ParamOperation::PatternRemoval(PatternRemovalOp {
                        pattern,
                        side: PatternRemovalSide::Suffix,
                        greedy,
                    }));
                    end
                }
                TokenType::Slash | TokenType::DblSlash => {
                    if self.lang.is_posix() {
                        return Err(self.lang_err(
                            self.tok.pos,
                            "search and replace is a bash/mksh feature",
                        ));
                    }
                    let all = self.tok.token_type == TokenType::DblSlash;
                    let (op, end) = self.parse_replace_op(dollar, all)?;
                    operation = Some(op);
                    end
                }
                TokenType::Caret
                | TokenType::DblCaret
                | TokenType::Comma
                | TokenType::DblComma => {
                    if !self.lang.is_bash() {
                        return Err(self.lang_err(
                            self.tok.pos,
                            "this expansion operator is a bash feature",
                        ));
                    }
                    let (direction, all) = match self.tok.token_type {
                        TokenType::Caret => (CaseDirection::Upper, false),
                        TokenType::DblCaret => (CaseDirection::Upper, true),
                        TokenType::Comma => (CaseDirection::Lower, false),
                        _ => (CaseDirection::Lower, true),
                    };
                    let (pattern, end) = self.param_arg_word(dollar, false)?;
                    let pattern = if pattern.parts.is_empty() {
                        None
                    } else {
                        Some(pattern)
                    };
                    operation = Some(ParamOperation::CaseModification(CaseModificationOp {
                        direction,
                        all,
                        pattern,
                    }));
                    end
                }
                TokenType::Colon => {
                    if self.lang.is_posix() {
                        return Err(
                            self.lang_err(self.tok.pos, "slicing is a bash/mksh feature")
                        );
                    }
                    let (op, end) = self.parse_slice_op(dollar)?;
                    operation = Some(op);
                    end
                }
                TokenType::At => {
                    if self.lang.is_posix() {
                        return Err(self.lang_err(
                            self.tok.pos,
                            "this expansion operator is a bash/mksh feature",
                        ));
                    }
                    let (op, end) = self.parse_transform_op(dollar)?;
                    operation = Some(op);
                    end
                }
                _ => {
                    let display = self.tok.display();
                    return Err(self.syn(
                        self.tok.pos,
                        format!("not a valid parameter expansion operator: {display}"),
                    ));
                }
            }
        };

        Ok(WordPart::ParameterExpansion(ParameterExpansionPart {
            parameter,
            short: false,
            indirect,
            length,
            width,
            index,
            operation,
            span: Span::new(dollar, end),
        }))
    }

    /// Whether the current token is one of the parameter operators, so a
    /// leading `#` can be taken as the parameter itself, as in `${#-x}`.
    fn param_operator_ahead(&self) -> bool {
        matches!(
            self.tok.token_type,
            TokenType::Minus
                | TokenType::ColonMinus
                | TokenType::Assign
                | TokenType::ColonEq
                | TokenType::Quest
                | TokenType::ColonQuest
                | TokenType::Plus
                | TokenType::ColonPlus
                | TokenType::Colon
                | TokenType::LBracket
        )
    }

    fn param_literal_err(&self, dollar: Position) -> ParseError {
        if self.tok.token_type == TokenType::Eof {
            self.matched(dollar, "${", "}")
        } else {
            self.syn(self.tok.pos, "parameter expansion requires a literal")
        }
    }

    /// Reads the parameter name or special parameter at the current token.
    fn read_param_name(&mut self, dollar: Position) -> Result<String, ParseError> {
        match self.tok.token_type {
            TokenType::Lit => {
                let value = self.tok.value.clone();
                let all_digits = value.chars().all(|c| c.is_ascii_digit());
                if !all_digits && !valid_name(&value) {
                    return Err(self.syn(self.tok.pos, "invalid parameter name"));
                }
                self.next()?;
                Ok(value)
            }
            TokenType::At
            | TokenType::Star
            | TokenType::Quest
            | TokenType::Minus
            | TokenType::Dollar
            | TokenType::Hash
            | TokenType::Excl => {
                let value = self.tok.display();
                self.next()?;
                Ok(value)
            }
            _ => Err(self.param_literal_err(dollar)),
        }
    }

    /// Consumes the closing `}` and pops the mode.
    fn close_brace(&mut self, dollar: Position) -> Result<Position, ParseError> {
        if self.tok.token_type != TokenType::RBrace {
            self.lx.pop_mode();
            return Err(self.matched(dollar, "${", "}"));
        }
        let end = self.tok.end;
        self.lx.pop_mode();
        self.next()?;
        Ok(end)
    }

    /// `${a[expr]}` index; the current token is `[`.
    fn parse_param_index(&mut self) -> Result<ArithExpr, ParseError> {
        let lb_pos = self.tok.pos;
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Bracket));
        self.next()?;
        if matches!(
            self.tok.token_type,
            TokenType::RBracket | TokenType::RBrace | TokenType::Eof
        ) {
            self.lx.pop_mode();
            return Err(self.syn(lb_pos, "[ must be followed by an expression"));
        }
        let expr = self.arith_expr(false, false)?;
        if self.tok.token_type != TokenType::RBracket {
            self.lx.pop_mode();
            return Err(self.matched(lb_pos, "[", "]"));
        }
        self.lx.pop_mode();
        self.next()?;
        Ok(expr)
    }

    /// Operator argument up to the closing `}`. Returns the (possibly
    /// empty) word and the end position.
    fn param_arg_word(
        &mut self,
        dollar: Position,
        stop_slash: bool,
    ) -> Result<(WordNode, Position), ParseError> {
        self.lx.pop_mode();
        self.lx.push_mode(if stop_slash {
            LexMode::ParamReplPattern
        } else {
            LexMode::ParamArg
        });
        self.next()?;
        let start = self.tok.pos;
        let mut parts = Vec::new();
        loop {
            match self.tok.token_type {
                TokenType::RBrace => {
                    let end = self.tok.end;
                    self.lx.pop_mode();
                    self.next()?;
                    let word_end = parts
                        .iter()
                        .rev()
                        .map(|p: &WordPart| p.span().end)
                        .find(|e| e.is_valid())
                        .unwrap_or(start);
                    return Ok((
                        WordNode {
                            parts,
                            span: Span::new(start, word_end),
                        },
                        end,
                    ));
                }
                TokenType::Slash if stop_slash => {
                    // Caller continues with the replacement.
                    let word_end = self.tok.pos;
                    return Ok((
                        WordNode {
                            parts,
                            span: Span::new(start, word_end),
                        },
                        word_end,
                    ));
                }
                TokenType::Eof => {
                    self.lx.pop_mode();
                    return Err(self.matched(dollar, "${", "}"));
                }
                _ => match self.word_part()? {
                    Some(part) => parts.push(part),
                    None => {
                        self.lx.pop_mode();
                        return Err(self.matched(dollar, "${", "}"));
                    }
                },
            }
        }
    }

    /// `${a/pat/repl}`; the current token is `/` or `//`.
    fn parse_replace_op(
        &mut self,
        dollar: Position,
        all: bool,
    ) -> Result<(ParamOperation, Position), ParseError> {
        let (pattern, at) = self.param_arg_word(dollar, true)?;
        if self.tok.token_type == TokenType::Slash {
            // The pattern ended at `/`; the replacement runs to `}`.
            let _ = at;
            let (replacement, end) = self.param_arg_word(dollar, false)?;
            return Ok((
                ParamOperation::PatternReplacement(PatternReplacementOp {
                    pattern,
                    replacement: Some(replacement),
                    all,
                }),
                end,
            ));
        }
        // No replacement; the `}` was already consumed.
        Ok((
            ParamOperation::PatternReplacement(PatternReplacementOp {
                pattern,
                replacement: None,
                all,
            }),
            at,
        ))
    }

    /// `${a:off}` / `${a:off:len}`; the current token is `:`.
    fn parse_slice_op(
        &mut self,
        dollar: Position,
    ) -> Result<(ParamOperation, Position), ParseError> {
        let colon_pos = self.tok.pos;
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Bracket));
        self.next()?;
        if matches!(self.tok.token_type, TokenType::RBrace | TokenType::Eof) {
            self.lx.pop_mode();
            self.lx.pop_mode();
            return Err(self.syn(colon_pos, ": must be followed by an expression"));
        }
        let offset = self.arith_expr(false, true)?;
        let mut length = None;
        if self.tok.token_type == TokenType::Colon {
            let colon2_pos = self.tok.pos;
            self.next()?;
            if matches!(self.tok.token_type, TokenType::RBrace | TokenType::Eof) {
                self.lx.pop_mode();
                self.lx.pop_mode();
                return Err(self.syn(colon2_pos, ": must be followed by an expression"));
            }
            length = Some(Box::new(self.arith_expr(false, true)?));
        }
        if self.tok.token_type != TokenType::RBrace {
            self.lx.pop_mode();
            self.lx.pop_mode();
            return Err(self.matched(dollar, "${", "}"));
        }
        let end = self.tok.end;
        self.lx.pop_mode(); // arithmetic
        self.lx.pop_mode(); // param name
        self.next()?;
        Ok((
            ParamOperation::Slice(SliceOp {
                offset: Box::new(offset),
                length,
            }),
            end,
        ))
    }

    /// `${a@Q}` operator expansions; the current token is `@`.
    fn parse_transform_op(
        &mut self,
        dollar: Position,
    ) -> Result<(ParamOperation, Position), ParseError> {
        let at_pos = self.tok.pos;
        self.next()?;
        let op = match self.tok.token_type {
            TokenType::RBrace => {
                return Err(self.syn(
                    self.tok.pos,
                    "@ expansion operator requires a literal",
                ))
            }
            TokenType::Eof => {
                return Err(self.syn(at_pos, "@ expansion operator requires a literal"))
            }
            TokenType::SglQuote | TokenType::DblQuote => {
                return Err(self.syn(
                    self.tok.pos,
                    "@ expansion operator requires a literal",
                ))
            }
            TokenType::Lit => {
                let value = self.tok.value.clone();
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => {
                        if c == '#' {
                            if !self.lang.is_mksh() {
                                return Err(self.lang_err(
                                    self.tok.pos,
                                    "this expansion operator is a mksh feature",
                                ));
                            }
                        } else if c == 'Q' {
                            // Shared by Bash and mksh.
                        } else if BASH_TRANSFORM_OPS.contains(&c) {
                            if !self.lang.is_bash() {
                                return Err(self.lang_err(
                                    self.tok.pos,
                                    "this expansion operator is a bash feature",
                                ));
                            }
                        } else {
                            return Err(self.syn(
                                self.tok.pos,
                                format!("invalid @ expansion operator \"{value}\""),
                            ));
                        }
                        c
                    }
                    _ => {
                        return Err(self.syn(
                            self.tok.pos,
                            format!("invalid @ expansion operator \"{value}\""),
                        ))
                    }
                }
            }
            _ => {
                return Err(self.syn(
                    self.tok.pos,
                    "@ expansion operator requires a literal",
                ))
            }
        };
        self.next()?;
        let end = self.close_brace(dollar)?;
        Ok((
            ParamOperation::Transform(TransformOp { operator: op }),
            end,
        ))
    }

    /// `${ stmts;}` and `${|stmts;}` value substitutions (Bash and mksh).
    fn parse_valsub(
        &mut self,
        dollar: Position,
        style: ValsubStyle,
    ) -> Result<WordPart, ParseError> {
        if self.lang.is_posix() {
            let form = match style {
                ValsubStyle::Stdout => "\"${ stmts;}\" is a bash/mksh feature",
                ValsubStyle::ReplyVar => "\"${|stmts;}\" is a bash/mksh feature",
            };
            return Err(self.lang_err(dollar, form));
        }
        self.lx.pop_mode();
        self.lx.push_mode(LexMode::Command);
        let buried = self.bury_heredocs();
        self.next()?;
        let mut statements = Vec::new();
        self.stmt_list_into(&mut statements, StopCtx::Valsub)?;
        if !self.is_lit("}") {
            self.unbury_heredocs(buried)?;
            self.lx.pop_mode();
            return Err(self.matched(dollar, "${", "}"));
        }
        let end = self.tok.end;
        self.unbury_heredocs(buried)?;
        self.lx.pop_mode();
        self.next()?;
        Ok(WordPart::CommandSubstitution(CommandSubstitutionPart {
            statements,
            backquotes: false,
            valsub: Some(style),
            span: Span::new(dollar, end),
        }))
    }
}
