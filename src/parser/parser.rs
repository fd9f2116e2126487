//! Recursive Descent Parser for Shell Source
//!
//! The parser owns the lexer's mode stack, the pending-heredoc queue, the
//! dialect gate and error recovery. It pulls mode-dependent tokens and
//! builds the AST bottom-up, one token of lookahead at a time.
//!
//! Grammar (simplified):
//!   script     ::= statement*
//!   statement  ::= and_or [&]
//!   and_or     ::= pipeline ((&& | '||') pipeline)*
//!   pipeline   ::= [!] [time] command ((| or |&) command)*
//!   command    ::= simple_command | compound_command | function_def
//!   simple_cmd ::= (assignment)* (word | redirection)*

use std::collections::VecDeque;
use std::io::Read;

use crate::ast::types::*;
use crate::parser::lexer::{ArithKind, LexMode, Lexer, Token, TokenType};
use crate::parser::reader::Source;
use crate::parser::types::{LangVariant, ParseError, SyntaxError};

/// Parser configuration and entry points.
///
/// Options follow the builder pattern; the recognized set is exactly
/// `keep_comments`, `variant`, `stop_at` and `recover_errors`.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    lang: LangVariant,
    keep_comments: bool,
    stop_at: Option<String>,
    recover_errors: u32,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain comments in the AST, for use by formatting tools.
    pub fn keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    /// Select the shell dialect to parse. The default is Bash.
    pub fn variant(mut self, lang: LangVariant) -> Self {
        self.lang = lang;
        self
    }

    /// Treat `lit` at the start of a word as end of input, e.g. `$$` when
    /// extracting shell code embedded in another language.
    pub fn stop_at(mut self, lit: impl Into<String>) -> Self {
        self.stop_at = Some(lit.into());
        self
    }

    /// Tolerate up to `max` syntax errors, replacing the offending parts of
    /// the tree with nodes carrying recovered positions.
    pub fn recover_errors(mut self, max: u32) -> Self {
        self.recover_errors = max;
        self
    }

    /// Parses a complete source file. `name` is used only in error messages.
    pub fn parse(&self, mut src: impl Read, name: &str) -> Result<ScriptNode, ParseError> {
        let mut run = ParseRun::new(self, &mut src, name)?;
        run.parse_script()
    }

    /// Streaming parse: calls `visitor` with each top-level statement as it
    /// is ready. Returning `false` halts cleanly at the next boundary.
    pub fn stmts(
        &self,
        mut src: impl Read,
        mut visitor: impl FnMut(StatementNode) -> bool,
    ) -> Result<(), ParseError> {
        let mut run = ParseRun::new(self, &mut src, "")?;
        run.stream_stmts(&mut visitor)
    }

    /// Streaming word parse, for inputs that are a sequence of words rather
    /// than statements. Returning `false` halts cleanly.
    pub fn words(
        &self,
        mut src: impl Read,
        mut visitor: impl FnMut(WordNode) -> bool,
    ) -> Result<(), ParseError> {
        let mut run = ParseRun::new(self, &mut src, "")?;
        run.stream_words(&mut visitor)
    }

    /// Parses a heredoc body: literal text with expansions, up to the end
    /// of input.
    pub fn document(&self, mut src: impl Read) -> Result<WordNode, ParseError> {
        let mut run = ParseRun::new(self, &mut src, "")?;
        run.parse_document()
    }

    /// Parses a single arithmetic expression, like `let` arguments or array
    /// indices.
    pub fn arithmetic(&self, mut src: impl Read) -> Result<ArithExpr, ParseError> {
        let mut run = ParseRun::new(self, &mut src, "")?;
        run.parse_arithmetic_input()
    }

    /// Line-buffered interactive parse: the visitor receives each line's
    /// completed statements and returns whether to continue reading.
    pub fn interactive(
        &self,
        mut src: impl Read,
        mut visitor: impl FnMut(Vec<StatementNode>) -> bool,
    ) -> Result<(), ParseError> {
        let mut run = ParseRun::new(self, &mut src, "")?;
        run.stream_interactive(&mut visitor)
    }
}

/// A pending heredoc whose body has not been read yet.
#[derive(Debug, Clone)]
pub(crate) struct PendingHeredoc {
    pub delimiter: String,
    pub quoted: bool,
    pub strip_tabs: bool,
    pub op_pos: Position,
}

/// Which tokens terminate a statement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopCtx {
    TopLevel,
    /// `)` closes the list.
    Subshell,
    /// The closing backquote ends the list.
    Backquote,
    /// A `}` word closes the list.
    Group,
    /// A `}` word closes a `${ stmts;}` value substitution.
    Valsub,
    /// One of these reserved words closes the list.
    Keyword(&'static [&'static str]),
    /// `;;`-family terminators or `esac` (or `}` for the mksh brace form).
    CaseBody { braces: bool },
}

/// Per-call parsing state: token lookahead, heredoc queues, comment list
/// and the recovery budget.
pub(crate) struct ParseRun<'a> {
    pub(crate) lx: Lexer<'a>,
    pub(crate) lang: LangVariant,
    pub(crate) keep_comments: bool,
    recover_budget: u32,
    recovered: u32,
    pub(crate) tok: Token,
    /// End of the most recently consumed token.
    pub(crate) last_end: Position,
    pub(crate) comments: Vec<CommentNode>,
    pub(crate) pending_heredocs: Vec<PendingHeredoc>,
    pub(crate) buried_heredocs: usize,
    pub(crate) filled_heredocs: VecDeque<HeredocNode>,
    /// Depth of enclosing contexts that a `)` may close.
    pub(crate) paren_depth: u32,
}

impl<'a> ParseRun<'a> {
    fn new(parser: &Parser, src: &'a mut dyn Read, name: &str) -> Result<Self, ParseError> {
        let source = Source::new(src, name)?;
        let mut lx = Lexer::new(source, parser.lang);
        lx.stop_at = parser.stop_at.clone();
        Ok(Self {
            lx,
            lang: parser.lang,
            keep_comments: parser.keep_comments,
            recover_budget: parser.recover_errors,
            recovered: 0,
            tok: Token {
                token_type: TokenType::Eof,
                value: String::new(),
                pos: Position::default(),
                end: Position::default(),
                spaced: true,
            },
            last_end: Position::default(),
            comments: Vec::new(),
            pending_heredocs: Vec::new(),
            buried_heredocs: 0,
            filled_heredocs: VecDeque::new(),
            paren_depth: 0,
        })
    }

    // =========================================================================
    // TOKEN PLUMBING
    // =========================================================================

    /// Advances to the next token, skipping comments and reading pending
    /// heredoc bodies when a newline is crossed.
    pub(crate) fn next(&mut self) -> Result<(), ParseError> {
        self.last_end = self.tok.end;
        self.tok = self.lx.next_token()?;
        loop {
            match self.tok.token_type {
                TokenType::Comment => {
                    if self.keep_comments {
                        let span = Span::new(self.tok.pos, self.tok.end);
                        self.comments.push(CommentNode {
                            text: self.tok.value.clone(),
                            span,
                        });
                    }
                    self.tok = self.lx.next_token()?;
                }
                TokenType::Newline => {
                    if self.pending_heredocs.len() > self.buried_heredocs {
                        self.read_pending_heredocs()?;
                    }
                    break;
                }
                _ => break,
            }
        }
        Ok(())
    }

    pub(crate) fn syn(&self, pos: Position, msg: impl Into<String>) -> ParseError {
        SyntaxError::new(self.lx.src.filename(), pos, msg).into()
    }

    pub(crate) fn syn_incomplete(&self, pos: Position, msg: impl Into<String>) -> ParseError {
        ParseError::Syntax(SyntaxError::new(self.lx.src.filename(), pos, msg).incomplete())
    }

    /// A dialect gate: `<feature>; tried parsing as <lang>`.
    pub(crate) fn lang_err(&self, pos: Position, feature: &str) -> ParseError {
        self.syn(pos, format!("{feature}; tried parsing as {}", self.lang))
    }

    /// `reached <tok> without matching <left> with <right>`, marked
    /// incomplete when the stopper is end of input.
    pub(crate) fn matched(&self, open: Position, left: &str, right: &str) -> ParseError {
        if self.tok.token_type == TokenType::Eof {
            self.syn_incomplete(
                open,
                format!("reached EOF without matching {left} with {right}"),
            )
        } else {
            let stopped = self.tok.display();
            self.syn(
                open,
                format!("reached {stopped} without matching {left} with {right}"),
            )
        }
    }

    /// Consumes one recovery slot if the budget allows.
    pub(crate) fn try_recover(&mut self) -> bool {
        if self.recovered < self.recover_budget {
            self.recovered += 1;
            true
        } else {
            false
        }
    }

    /// Recovery variant of [`Self::matched`]: at end of input, a recovery
    /// slot closes the construct with a recovered position.
    pub(crate) fn matched_or_recover(
        &mut self,
        open: Position,
        left: &str,
        right: &str,
    ) -> Result<Position, ParseError> {
        if self.tok.token_type == TokenType::Eof && self.try_recover() {
            return Ok(Position::recovered());
        }
        Err(self.matched(open, left, right))
    }

    pub(crate) fn recovered_stmt() -> StatementNode {
        StatementNode {
            command: CommandNode::Recovered,
            redirections: Vec::new(),
            negated: false,
            background: false,
            span: Span::recovered(),
        }
    }

    pub(crate) fn recovered_word() -> WordNode {
        WordNode {
            parts: Vec::new(),
            span: Span::recovered(),
        }
    }

    /// Whether the current token is the bare unquoted literal `s`, with
    /// nothing gluing more word parts onto it.
    pub(crate) fn is_lit(&self, s: &str) -> bool {
        self.tok.token_type == TokenType::Lit && self.tok.value == s && self.lit_word_ends()
    }

    pub(crate) fn lit_word_ends(&self) -> bool {
        !matches!(self.lx.cur_char(), Some('$') | Some('\'') | Some('"') | Some('`'))
    }

    pub(crate) fn can_start_word(&self) -> bool {
        matches!(
            self.tok.token_type,
            TokenType::Lit
                | TokenType::SglQuote
                | TokenType::DblQuote
                | TokenType::DollSglQuote
                | TokenType::DollDblQuote
                | TokenType::Dollar
                | TokenType::DollarName
                | TokenType::DollBrace
                | TokenType::DollParen
                | TokenType::DollDblParen
                | TokenType::DollBracket
                | TokenType::BackQuote
                | TokenType::ExtGlob
                | TokenType::ProcSubIn
                | TokenType::ProcSubOut
        )
    }

    pub(crate) fn can_start_stmt(&self) -> bool {
        self.can_start_word()
            || matches!(
                self.tok.token_type,
                TokenType::LParen
                    | TokenType::DParenStart
                    | TokenType::FdVariable
                    | TokenType::Less
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
            )
    }

    // =========================================================================
    // ENTRY POINTS
    // =========================================================================

    pub(crate) fn parse_script(&mut self) -> Result<ScriptNode, ParseError> {
        self.next()?;
        let mut stmts = Vec::new();
        self.stmt_list_into(&mut stmts, StopCtx::TopLevel)?;
        self.check_unclosed_heredocs()?;
        if self.tok.token_type != TokenType::Eof {
            // A stray closer at top level that nothing consumed.
            return Err(self.stray_err());
        }
        Ok(ScriptNode {
            statements: stmts,
            end: self.tok.pos,
            comments: std::mem::take(&mut self.comments),
        })
    }

    fn stream_stmts(
        &mut self,
        visitor: &mut dyn FnMut(StatementNode) -> bool,
    ) -> Result<(), ParseError> {
        self.next()?;
        // Statements with pending heredocs are held back until their bodies
        // have been read, so visitors never see a half-built statement.
        let mut held: Vec<StatementNode> = Vec::new();
        loop {
            while self.tok.token_type == TokenType::Newline {
                self.next()?;
            }
            if self.tok.token_type == TokenType::Eof {
                self.check_unclosed_heredocs()?;
                for stmt in held.drain(..) {
                    if !visitor(stmt) {
                        return Ok(());
                    }
                }
                return Ok(());
            }
            if let Some(err) = self.stray_start_err(StopCtx::TopLevel) {
                return Err(err);
            }
            let stmt = self.get_stmt()?;
            held.push(stmt);
            self.attach_filled_heredocs(&mut held);
            if self.pending_heredocs.is_empty() {
                for stmt in held.drain(..) {
                    if !visitor(stmt) {
                        return Ok(());
                    }
                }
            }
            match self.tok.token_type {
                TokenType::Semicolon => self.next()?,
                TokenType::Newline | TokenType::Eof => {}
                _ => return Err(self.stray_err()),
            }
        }
    }

    fn stream_words(
        &mut self,
        visitor: &mut dyn FnMut(WordNode) -> bool,
    ) -> Result<(), ParseError> {
        self.next()?;
        loop {
            while self.tok.token_type == TokenType::Newline {
                self.next()?;
            }
            if self.tok.token_type == TokenType::Eof {
                return Ok(());
            }
            if !self.can_start_word() {
                let display = self.tok.display();
                return Err(self.syn(self.tok.pos, format!("{display} is not a valid word")));
            }
            let word = self.parse_word()?;
            if !visitor(word) {
                return Ok(());
            }
        }
    }

    fn parse_document(&mut self) -> Result<WordNode, ParseError> {
        self.lx.push_mode(LexMode::HeredocToEof);
        self.next()?;
        let start = self.tok.pos;
        let mut parts = Vec::new();
        while self.tok.token_type != TokenType::Eof {
            if let Some(part) = self.word_part()? {
                parts.push(part);
            } else {
                break;
            }
        }
        self.lx.pop_mode();
        let end = parts.last().map(|p| p.span().end).unwrap_or(start);
        Ok(WordNode {
            parts,
            span: Span::new(start, end),
        })
    }

    fn parse_arithmetic_input(&mut self) -> Result<ArithExpr, ParseError> {
        self.lx.push_mode(LexMode::Arithmetic(ArithKind::Expansion));
        self.next()?;
        if self.tok.token_type == TokenType::Eof {
            return Err(self.syn(self.tok.pos, "expression expected"));
        }
        let expr = self.arith_expr(false, false)?;
        self.lx.pop_mode();
        Ok(expr)
    }

    fn stream_interactive(
        &mut self,
        visitor: &mut dyn FnMut(Vec<StatementNode>) -> bool,
    ) -> Result<(), ParseError> {
        self.next()?;
        let mut batch: Vec<StatementNode> = Vec::new();
        loop {
            match self.tok.token_type {
                TokenType::Eof => {
                    self.check_unclosed_heredocs()?;
                    if !batch.is_empty() {
                        visitor(std::mem::take(&mut batch));
                    }
                    return Ok(());
                }
                TokenType::Newline => {
                    if !visitor(std::mem::take(&mut batch)) {
                        return Ok(());
                    }
                    self.next()?;
                }
                _ => {
                    if let Some(err) = self.stray_start_err(StopCtx::TopLevel) {
                        return Err(err);
                    }
                    let stmt = self.get_stmt()?;
                    batch.push(stmt);
                    self.attach_filled_heredocs(&mut batch);
                    match self.tok.token_type {
                        TokenType::Semicolon => self.next()?,
                        TokenType::Newline | TokenType::Eof => {}
                        _ => return Err(self.stray_err()),
                    }
                }
            }
        }
    }

    // =========================================================================
    // STATEMENT LISTS
    // =========================================================================

    pub(crate) fn stmt_list_into(
        &mut self,
        out: &mut Vec<StatementNode>,
        stop: StopCtx,
    ) -> Result<(), ParseError> {
        loop {
            while self.tok.token_type == TokenType::Newline {
                self.next()?;
            }
            if matches!(self.tok.token_type, TokenType::Eof | TokenType::BackQuoteEnd) {
                return Ok(());
            }
            if self.stops(stop) {
                return Ok(());
            }
            if let Some(err) = self.stray_start_err(stop) {
                return Err(err);
            }
            let stmt = self.get_stmt()?;
            out.push(stmt);
            self.attach_filled_heredocs(out);
            match self.tok.token_type {
                TokenType::Semicolon => self.next()?,
                TokenType::Newline | TokenType::Eof | TokenType::BackQuoteEnd => {}
                _ if self.stops(stop) => {}
                TokenType::DSemi
                | TokenType::SemiAnd
                | TokenType::SemiSemiAnd
                | TokenType::SemiPipe => {
                    let display = self.tok.display();
                    return Err(self.syn(
                        self.tok.pos,
                        format!("{display} can only be used in a case clause"),
                    ));
                }
                _ => return Err(self.stray_err()),
            }
        }
    }

    fn stops(&self, stop: StopCtx) -> bool {
        match stop {
            StopCtx::TopLevel | StopCtx::Backquote => false,
            StopCtx::Subshell => self.tok.token_type == TokenType::RParen,
            StopCtx::Group | StopCtx::Valsub => self.is_lit("}"),
            StopCtx::Keyword(words) => {
                self.tok.token_type == TokenType::Lit
                    && words.contains(&self.tok.value.as_str())
                    && self.lit_word_ends()
            }
            StopCtx::CaseBody { braces } => {
                matches!(
                    self.tok.token_type,
                    TokenType::DSemi
                        | TokenType::SemiAnd
                        | TokenType::SemiSemiAnd
                        | TokenType::SemiPipe
                ) || self.is_lit("esac")
                    || (braces && self.is_lit("}"))
            }
        }
    }

    /// Errors for tokens that cannot begin a statement, at statement-start
    /// position. Returns `None` when the token is fine.
    fn stray_start_err(&self, stop: StopCtx) -> Option<ParseError> {
        let pos = self.tok.pos;
        let msg = match self.tok.token_type {
            TokenType::RParen => ") can only be used to close a subshell".to_string(),
            TokenType::DSemi | TokenType::SemiAnd | TokenType::SemiSemiAnd | TokenType::SemiPipe => {
                format!("{} can only be used in a case clause", self.tok.display())
            }
            TokenType::Semicolon => "; can only immediately follow a statement".to_string(),
            TokenType::Amp => "& can only immediately follow a statement".to_string(),
            TokenType::AndAnd | TokenType::OrOr | TokenType::Pipe => {
                format!(
                    "{} can only immediately follow a statement",
                    self.tok.display()
                )
            }
            TokenType::PipeAmp => "|& is not a valid start for a statement".to_string(),
            TokenType::Lit if self.tok.value == "}" && !matches!(stop, StopCtx::Group | StopCtx::Valsub) => {
                "\"}\" can only be used to close a block".to_string()
            }
            _ => return None,
        };
        Some(self.syn(pos, msg))
    }

    fn stray_err(&self) -> ParseError {
        self.stray_start_err(StopCtx::TopLevel)
            .unwrap_or_else(|| self.separator_err())
    }

    fn separator_err(&self) -> ParseError {
        self.syn(
            self.tok.pos,
            "statements must be separated by &, ; or a newline",
        )
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    pub(crate) fn get_stmt(&mut self) -> Result<StatementNode, ParseError> {
        let mut stmt = self.get_and_or()?;
        if self.tok.token_type == TokenType::Amp {
            stmt.background = true;
            stmt.span = stmt.span.until(self.tok.end);
            self.next()?;
        }
        Ok(stmt)
    }

    fn get_and_or(&mut self) -> Result<StatementNode, ParseError> {
        let mut left = self.get_neg_pipeline()?;
        loop {
            let op = match self.tok.token_type {
                TokenType::AndAnd => BinaryOperator::And,
                TokenType::OrOr => BinaryOperator::Or,
                _ => return Ok(left),
            };
            let op_pos = self.tok.pos;
            self.next()?;
            while self.tok.token_type == TokenType::Newline {
                self.next()?;
            }
            let right = if !self.can_start_stmt() {
                if self.try_recover() {
                    Self::recovered_stmt()
                } else {
                    return Err(self.syn(
                        op_pos,
                        format!("{} must be followed by a statement", op.as_str()),
                    ));
                }
            } else {
                self.get_neg_pipeline()?
            };
            left = Self::binary_stmt(op, left, right);
        }
    }

    fn get_neg_pipeline(&mut self) -> Result<StatementNode, ParseError> {
        let start = self.tok.pos;
        let mut negated = false;
        while self.is_lit("!") {
            if negated {
                return Err(self.syn(start, "cannot negate a command multiple times"));
            }
            negated = true;
            let neg_pos = self.tok.pos;
            self.next()?;
            if self.is_lit("!") {
                return Err(self.syn(start, "cannot negate a command multiple times"));
            }
            if !self.can_start_stmt() {
                return Err(self.syn(neg_pos, "\"!\" cannot form a statement alone"));
            }
        }
        let mut stmt = if (self.lang.is_bash() || self.lang.is_mksh())
            && self.is_lit("time")
        {
            self.parse_time_clause()?
        } else {
            self.get_pipeline()?
        };
        if negated {
            stmt.negated = true;
            stmt.span = Span::new(start, stmt.span.end);
        }
        Ok(stmt)
    }

    fn parse_time_clause(&mut self) -> Result<StatementNode, ParseError> {
        let start = self.tok.pos;
        self.next()?;
        let mut posix_format = false;
        if self.is_lit("-p") {
            posix_format = true;
            self.next()?;
        }
        if self.is_lit("!") {
            return Err(self.syn(
                self.tok.pos,
                "\"!\" can only be used in full statements",
            ));
        }
        let statement = if self.can_start_stmt() {
            Some(Box::new(self.get_pipeline()?))
        } else {
            None
        };
        let end = statement
            .as_ref()
            .map(|s| s.span.end)
            .unwrap_or(self.last_end);
        let span = Span::new(start, end);
        Ok(StatementNode {
            command: CommandNode::Time(TimeNode {
                posix_format,
                statement,
                span,
            }),
            redirections: Vec::new(),
            negated: false,
            background: false,
            span,
        })
    }

    fn get_pipeline(&mut self) -> Result<StatementNode, ParseError> {
        let mut left = self.get_cmd_stmt()?;
        loop {
            let op = match self.tok.token_type {
                TokenType::Pipe => BinaryOperator::Pipe,
                TokenType::PipeAmp => BinaryOperator::PipeStderr,
                _ => return Ok(left),
            };
            let op_pos = self.tok.pos;
            self.next()?;
            while self.tok.token_type == TokenType::Newline {
                self.next()?;
            }
            if self.is_lit("!") {
                return Err(self.syn(
                    self.tok.pos,
                    "\"!\" can only be used in full statements",
                ));
            }
            let right = if !self.can_start_stmt() {
                if self.try_recover() {
                    Self::recovered_stmt()
                } else {
                    return Err(self.syn(
                        op_pos,
                        format!("{} must be followed by a statement", op.as_str()),
                    ));
                }
            } else {
                self.get_cmd_stmt()?
            };
            left = Self::binary_stmt(op, left, right);
        }
    }

    fn binary_stmt(op: BinaryOperator, left: StatementNode, right: StatementNode) -> StatementNode {
        let span = left.span.until(right.span.end);
        StatementNode {
            command: CommandNode::Binary(BinaryCommandNode {
                operator: op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            }),
            redirections: Vec::new(),
            negated: false,
            background: false,
            span,
        }
    }

    /// One command plus its redirections, wrapped in a statement.
    pub(crate) fn get_cmd_stmt(&mut self) -> Result<StatementNode, ParseError> {
        let start = self.tok.pos;
        let mut redirs = Vec::new();
        let command = self.get_command(start, &mut redirs)?;
        let span = Span::new(start, self.last_end);
        Ok(StatementNode {
            command,
            redirections: redirs,
            negated: false,
            background: false,
            span,
        })
    }

    fn get_command(
        &mut self,
        start: Position,
        redirs: &mut Vec<RedirectionNode>,
    ) -> Result<CommandNode, ParseError> {
        let cmd = match self.tok.token_type {
            TokenType::LParen => Some(CommandNode::Subshell(self.parse_subshell()?)),
            TokenType::DParenStart => {
                if self.lang.is_posix() {
                    Some(CommandNode::Subshell(self.parse_posix_nested_subshell()?))
                } else {
                    Some(CommandNode::Arithmetic(self.parse_arith_command()?))
                }
            }
            TokenType::Lit if self.lit_word_ends() => match self.tok.value.as_str() {
                "{" => Some(CommandNode::Group(self.parse_group()?)),
                "if" => Some(CommandNode::If(self.parse_if()?)),
                "while" => Some(CommandNode::While(self.parse_while()?)),
                "until" => Some(CommandNode::Until(self.parse_until()?)),
                "for" => Some(self.parse_for()?),
                "case" => Some(CommandNode::Case(self.parse_case()?)),
                "select" if self.lang.is_bash() || self.lang.is_mksh() => {
                    Some(CommandNode::Select(self.parse_select()?))
                }
                "[[" if self.lang.is_bash() || self.lang.is_mksh() => {
                    Some(CommandNode::Test(self.parse_test_clause()?))
                }
                "]]" if self.lang.is_bash() || self.lang.is_mksh() => {
                    return Err(self.syn(
                        self.tok.pos,
                        "\"]]\" can only be used to close a test",
                    ))
                }
                "function" if self.lang.is_bash() || self.lang.is_mksh() => {
                    Some(CommandNode::FunctionDef(self.parse_function_decl()?))
                }
                "let" if self.lang.is_bash() || self.lang.is_mksh() => {
                    Some(CommandNode::Let(self.parse_let_clause()?))
                }
                "declare" | "local" | "export" | "readonly" | "typeset" | "nameref"
                    if self.lang.is_bash() || self.lang.is_mksh() =>
                {
                    Some(CommandNode::Declare(self.parse_declare_clause()?))
                }
                "coproc" if self.lang.is_bash() => {
                    Some(CommandNode::Coproc(self.parse_coproc_clause()?))
                }
                "then" | "elif" | "else" => {
                    let display = self.tok.display();
                    return Err(self.syn(
                        self.tok.pos,
                        format!("\"{display}\" can only be used in an if"),
                    ));
                }
                "fi" => {
                    return Err(self.syn(
                        self.tok.pos,
                        "\"fi\" can only be used to end an if",
                    ))
                }
                "do" => {
                    return Err(self.syn(self.tok.pos, "\"do\" can only be used in a loop"))
                }
                "done" => {
                    return Err(self.syn(
                        self.tok.pos,
                        "\"done\" can only be used to end a loop",
                    ))
                }
                "esac" => {
                    return Err(self.syn(
                        self.tok.pos,
                        "\"esac\" can only be used to end a case",
                    ))
                }
                _ => None,
            },
            _ => None,
        };
        match cmd {
            Some(cmd) => {
                // Trailing redirections after a compound command.
                while self.peek_redirect() {
                    self.parse_redirection(redirs)?;
                }
                Ok(cmd)
            }
            None => self.parse_simple_command(start, redirs),
        }
    }

    // =========================================================================
    // HEREDOC QUEUE
    // =========================================================================

    pub(crate) fn register_heredoc(&mut self, pending: PendingHeredoc) {
        self.pending_heredocs.push(pending);
    }

    /// Saves the heredoc horizon when entering a nested command context, so
    /// inner newlines only read heredocs registered inside it.
    pub(crate) fn bury_heredocs(&mut self) -> usize {
        let prev = self.buried_heredocs;
        self.buried_heredocs = self.pending_heredocs.len();
        prev
    }

    /// Restores the heredoc horizon, erroring if the nested context left
    /// unread heredocs behind.
    pub(crate) fn unbury_heredocs(&mut self, prev: usize) -> Result<(), ParseError> {
        if self.pending_heredocs.len() > self.buried_heredocs {
            let ph = &self.pending_heredocs[self.buried_heredocs];
            return Err(self.syn_incomplete(
                ph.op_pos,
                format!("unclosed here-document '{}'", ph.delimiter),
            ));
        }
        self.buried_heredocs = prev;
        Ok(())
    }

    fn check_unclosed_heredocs(&self) -> Result<(), ParseError> {
        if let Some(ph) = self.pending_heredocs.first() {
            return Err(self.syn_incomplete(
                ph.op_pos,
                format!("unclosed here-document '{}'", ph.delimiter),
            ));
        }
        Ok(())
    }

    /// Attaches freshly read heredoc bodies to the statements that own
    /// them, in FIFO order.
    pub(crate) fn attach_filled_heredocs(&mut self, stmts: &mut [StatementNode]) {
        if self.filled_heredocs.is_empty() {
            return;
        }
        let mut queue = std::mem::take(&mut self.filled_heredocs);
        for stmt in stmts.iter_mut() {
            if queue.is_empty() {
                break;
            }
            Self::fill_stmt_heredocs(stmt, &mut queue);
        }
        self.filled_heredocs = queue;
    }

    fn fill_stmt_heredocs(stmt: &mut StatementNode, queue: &mut VecDeque<HeredocNode>) {
        match &mut stmt.command {
            CommandNode::Binary(b) => {
                Self::fill_stmt_heredocs(&mut b.left, queue);
                Self::fill_stmt_heredocs(&mut b.right, queue);
            }
            CommandNode::Group(g) => Self::fill_stmts_heredocs(&mut g.body, queue),
            CommandNode::Subshell(s) => Self::fill_stmts_heredocs(&mut s.body, queue),
            CommandNode::If(i) => {
                for clause in &mut i.clauses {
                    Self::fill_stmts_heredocs(&mut clause.condition, queue);
                    Self::fill_stmts_heredocs(&mut clause.body, queue);
                }
                if let Some(body) = &mut i.else_body {
                    Self::fill_stmts_heredocs(body, queue);
                }
            }
            CommandNode::For(f) => Self::fill_stmts_heredocs(&mut f.body, queue),
            CommandNode::CStyleFor(f) => Self::fill_stmts_heredocs(&mut f.body, queue),
            CommandNode::While(w) => {
                Self::fill_stmts_heredocs(&mut w.condition, queue);
                Self::fill_stmts_heredocs(&mut w.body, queue);
            }
            CommandNode::Until(u) => {
                Self::fill_stmts_heredocs(&mut u.condition, queue);
                Self::fill_stmts_heredocs(&mut u.body, queue);
            }
            CommandNode::Select(s) => Self::fill_stmts_heredocs(&mut s.body, queue),
            CommandNode::Case(c) => {
                for item in &mut c.items {
                    Self::fill_stmts_heredocs(&mut item.body, queue);
                }
            }
            CommandNode::FunctionDef(f) => Self::fill_stmt_heredocs(&mut f.body, queue),
            CommandNode::Time(t) => {
                if let Some(inner) = &mut t.statement {
                    Self::fill_stmt_heredocs(inner, queue);
                }
            }
            CommandNode::Coproc(c) => Self::fill_stmt_heredocs(&mut c.statement, queue),
            _ => {}
        }
        for redir in &mut stmt.redirections {
            if redir.operator.is_heredoc() && redir.heredoc.is_none() {
                if let Some(body) = queue.pop_front() {
                    redir.heredoc = Some(body);
                }
            }
        }
    }

    fn fill_stmts_heredocs(stmts: &mut [StatementNode], queue: &mut VecDeque<HeredocNode>) {
        for stmt in stmts {
            Self::fill_stmt_heredocs(stmt, queue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{walk, NodeRef};
    use crate::parser::types::is_incomplete;
    use std::io;

    fn parse(input: &str) -> Result<ScriptNode, ParseError> {
        Parser::new().parse(input.as_bytes(), "")
    }

    fn parse_lang(input: &str, lang: LangVariant) -> Result<ScriptNode, ParseError> {
        Parser::new().variant(lang).parse(input.as_bytes(), "")
    }

    fn err(input: &str) -> String {
        parse(input).expect_err(input).to_string()
    }

    fn err_bytes(input: &[u8]) -> String {
        Parser::new()
            .parse(input, "")
            .expect_err("expected error")
            .to_string()
    }

    fn err_lang(input: &str, lang: LangVariant) -> String {
        parse_lang(input, lang).expect_err(input).to_string()
    }

    fn first_call_words(script: &ScriptNode) -> Vec<String> {
        match &script.statements[0].command {
            CommandNode::Simple(cmd) => {
                cmd.words.iter().filter_map(WordNode::lit).collect()
            }
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    // =========================================================================
    // BASIC PARSING
    // =========================================================================

    #[test]
    fn test_simple_command() {
        let script = parse("echo hello world").unwrap();
        assert_eq!(script.statements.len(), 1);
        assert_eq!(first_call_words(&script), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_statement_positions() {
        let script = parse("echo hi").unwrap();
        let stmt = &script.statements[0];
        assert_eq!(stmt.span.start, Position::new(0, 1, 1));
        assert_eq!(stmt.span.end, Position::new(7, 1, 8));
        assert_eq!(script.end, Position::new(7, 1, 8));
    }

    #[test]
    fn test_three_statements() {
        let script = parse("foo\nbar; baz").unwrap();
        assert_eq!(script.statements.len(), 3);
    }

    #[test]
    fn test_background_and_negation() {
        let script = parse("! foo &").unwrap();
        let stmt = &script.statements[0];
        assert!(stmt.negated);
        assert!(stmt.background);
    }

    #[test]
    fn test_pipeline_binds_tighter_than_and() {
        let script = parse("a | b && c").unwrap();
        match &script.statements[0].command {
            CommandNode::Binary(b) => {
                assert_eq!(b.operator, BinaryOperator::And);
                match &b.left.command {
                    CommandNode::Binary(p) => assert_eq!(p.operator, BinaryOperator::Pipe),
                    other => panic!("expected pipe on the left, got {other:?}"),
                }
            }
            other => panic!("expected binary command, got {other:?}"),
        }
    }

    #[test]
    fn test_assignments_and_words() {
        let script = parse("a=1 b=2 cmd arg").unwrap();
        match &script.statements[0].command {
            CommandNode::Simple(cmd) => {
                assert_eq!(cmd.assignments.len(), 2);
                assert_eq!(cmd.assignments[0].name, "a");
                assert_eq!(
                    cmd.assignments[0].value.as_ref().and_then(WordNode::lit),
                    Some("1".into())
                );
                assert_eq!(cmd.words.len(), 2);
            }
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    #[test]
    fn test_redirections() {
        let script = parse("cmd 2>&1 >out <in").unwrap();
        let redirs = &script.statements[0].redirections;
        assert_eq!(redirs.len(), 3);
        assert_eq!(redirs[0].fd, Some(2));
        assert_eq!(redirs[0].operator, RedirectionOperator::GreatAnd);
        assert_eq!(redirs[1].operator, RedirectionOperator::Great);
        assert_eq!(redirs[2].operator, RedirectionOperator::Less);
    }

    #[test]
    fn test_fd_variable_redirect() {
        let script = parse("exec {fd}>file").unwrap();
        let redirs = &script.statements[0].redirections;
        assert_eq!(redirs[0].fd_variable.as_deref(), Some("fd"));
    }

    #[test]
    fn test_comments_dropped_by_default() {
        let script = parse("foo # bar\nbaz").unwrap();
        assert_eq!(script.statements.len(), 2);
        assert!(script.comments.is_empty());
    }

    #[test]
    fn test_keep_comments() {
        let script = Parser::new()
            .keep_comments(true)
            .parse("foo # bar\n".as_bytes(), "")
            .unwrap();
        assert_eq!(script.comments.len(), 1);
        assert_eq!(script.comments[0].text, " bar");
        assert_eq!(script.comments[0].span.start, Position::new(4, 1, 5));
    }

    #[test]
    fn test_null_bytes_count_columns() {
        let script = Parser::new().parse(&b"\x00foo\x00bar\n"[..], "").unwrap();
        let stmt = &script.statements[0];
        assert_eq!(stmt.span.start.to_string(), "1:2");
        assert_eq!(stmt.span.end.to_string(), "1:9");
    }

    #[test]
    fn test_backquote_escape_halving() {
        let script = parse("`\\\\foo`").unwrap();
        match &script.statements[0].command {
            CommandNode::Simple(cmd) => match &cmd.words[0].parts[0] {
                WordPart::CommandSubstitution(subst) => {
                    assert!(subst.backquotes);
                    match &subst.statements[0].command {
                        CommandNode::Simple(inner) => {
                            assert_eq!(inner.words[0].lit(), Some("\\foo".into()));
                        }
                        other => panic!("unexpected inner command {other:?}"),
                    }
                }
                other => panic!("expected command substitution, got {other:?}"),
            },
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    // =========================================================================
    // HEREDOCS
    // =========================================================================

    fn heredoc_body(script: &ScriptNode, stmt: usize, redir: usize) -> HeredocNode {
        script.statements[stmt].redirections[redir]
            .heredoc
            .clone()
            .expect("heredoc body not attached")
    }

    #[test]
    fn test_heredoc_body_attached() {
        let script = parse("cat <<EOF\nhello\nworld\nEOF\n").unwrap();
        let body = heredoc_body(&script, 0, 0);
        assert_eq!(body.delimiter, "EOF");
        assert!(!body.quoted);
        assert_eq!(body.body.lit(), Some("hello\nworld\n".into()));
    }

    #[test]
    fn test_heredoc_fifo_order() {
        let script = parse("cat <<A <<B\none\nA\ntwo\nB\n").unwrap();
        let a = heredoc_body(&script, 0, 0);
        let b = heredoc_body(&script, 0, 1);
        assert_eq!(a.body.lit(), Some("one\n".into()));
        assert_eq!(b.body.lit(), Some("two\n".into()));
    }

    #[test]
    fn test_heredoc_quoted_delimiter_no_expansions() {
        let script = parse("cat <<'EOF'\n$foo\nEOF\n").unwrap();
        let body = heredoc_body(&script, 0, 0);
        assert!(body.quoted);
        assert_eq!(body.body.lit(), Some("$foo\n".into()));
    }

    #[test]
    fn test_heredoc_unquoted_delimiter_expands() {
        let script = parse("cat <<EOF\na $foo b\nEOF\n").unwrap();
        let body = heredoc_body(&script, 0, 0);
        assert!(!body.quoted);
        assert_eq!(body.body.parts.len(), 3);
        match &body.body.parts[1] {
            WordPart::ParameterExpansion(p) => assert_eq!(p.parameter, "foo"),
            other => panic!("expected expansion, got {other:?}"),
        }
    }

    #[test]
    fn test_heredoc_tab_stripping() {
        let script = parse("cat <<-EOF\n\tbody\n\tEOF\n").unwrap();
        let body = heredoc_body(&script, 0, 0);
        assert!(body.strip_tabs);
        assert_eq!(body.body.lit(), Some("body\n".into()));
    }

    #[test]
    fn test_heredoc_attaches_across_statement() {
        let script = parse("cat <<EOF; echo hi\nbody\nEOF\n").unwrap();
        assert_eq!(script.statements.len(), 2);
        let body = heredoc_body(&script, 0, 0);
        assert_eq!(body.body.lit(), Some("body\n".into()));
    }

    #[test]
    fn test_heredoc_backslash_delimiter() {
        assert_eq!(err("<<\\\\EOF"), "1:1: unclosed here-document '\\EOF'");
    }

    // =========================================================================
    // ERROR CATALOGUE: LEXICAL
    // =========================================================================

    #[test]
    fn test_invalid_utf8_errors() {
        assert_eq!(err_bytes(b"echo \x80"), "1:6: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"\necho \x80"), "2:6: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"echo foo\x80bar"), "1:9: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"echo foo\xc3"), "1:9: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"#foo\xc3"), "1:5: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b";\x80"), "1:2: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"${a\x80"), "1:4: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"${a#\x80"), "1:5: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"${a-'\x80"), "1:6: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"((foo\x80bar"), "1:6: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"echo $((a |\x80"), "1:12: invalid UTF-8 encoding");
        assert_eq!(err_bytes(b"echo $((foo\x80bar"), "1:12: invalid UTF-8 encoding");
    }

    #[test]
    fn test_unclosed_quotes() {
        assert_eq!(err("'"), "1:1: reached EOF without closing quote '");
        assert_eq!(err("\""), "1:1: reached EOF without closing quote \"");
        assert_eq!(err("'\\''"), "1:4: reached EOF without closing quote '");
        assert_eq!(err("foo'"), "1:4: reached EOF without closing quote '");
        assert_eq!(err("foo\""), "1:4: reached EOF without closing quote \"");
        assert_eq!(err("\"foo"), "1:1: reached EOF without closing quote \"");
        assert_eq!(err("\"foobar\\"), "1:1: reached EOF without closing quote \"");
        assert_eq!(err("\"foo\\a"), "1:1: reached EOF without closing quote \"");
        assert_eq!(err("'foo' '"), "1:7: reached EOF without closing quote '");
        assert_eq!(err("'foo\n' '"), "2:3: reached EOF without closing quote '");
        assert_eq!(err("a=$c\n'"), "2:1: reached EOF without closing quote '");
        assert_eq!(err("`"), "1:1: reached EOF without closing quote `");
        assert_eq!(err("echo $'"), "1:6: reached EOF without closing quote '");
        assert_eq!(err("echo $\""), "1:6: reached EOF without closing quote \"");
    }

    #[test]
    fn test_backquote_nesting_errors() {
        assert_eq!(err("\"`\""), "1:3: reached EOF without closing quote \"");
        assert_eq!(err("`\"`"), "1:2: reached ` without closing quote \"");
        assert_eq!(err("`\\```"), "1:3: reached EOF without closing quote `");
        assert_eq!(err("`{\n`"), "1:2: reached ` without matching { with }");
    }

    // =========================================================================
    // ERROR CATALOGUE: STRUCTURAL
    // =========================================================================

    #[test]
    fn test_unbalanced_openers() {
        assert_eq!(err("{"), "1:1: reached EOF without matching { with }");
        assert_eq!(err("{ #}"), "1:1: reached EOF without matching { with }");
        assert_eq!(err("("), "1:1: reached EOF without matching ( with )");
        assert_eq!(err("( foo;"), "1:1: reached EOF without matching ( with )");
        assert_eq!(err("#foo\n{"), "2:1: reached EOF without matching { with }");
        assert_eq!(err("foo() {"), "1:7: reached EOF without matching { with }");
        assert_eq!(err("time {"), "1:6: reached EOF without matching { with }");
        assert_eq!(err("echo $(foo"), "1:6: reached EOF without matching ( with )");
        assert_eq!(err("echo ${foo"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${foo-bar"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo $[foo"), "1:6: reached EOF without matching $[ with ]");
        assert_eq!(err("echo $((foo"), "1:6: reached EOF without matching $(( with ))");
        assert_eq!(err("((foo"), "1:1: reached EOF without matching (( with ))");
        assert_eq!(err("for ((;;"), "1:5: reached EOF without matching (( with ))");
        assert_eq!(err("for ((;;0000000"), "1:5: reached EOF without matching (( with ))");
        assert_eq!(err("echo @("), "1:6: reached EOF without matching @( with )");
        assert_eq!(err("echo @(a"), "1:6: reached EOF without matching @( with )");
        assert_eq!(err("a[b"), "1:2: reached EOF without matching [ with ]");
    }

    #[test]
    fn test_stray_tokens() {
        assert_eq!(err(")"), "1:1: ) can only be used to close a subshell");
        assert_eq!(err("}"), "1:1: \"}\" can only be used to close a block");
        assert_eq!(err("then"), "1:1: \"then\" can only be used in an if");
        assert_eq!(err("elif"), "1:1: \"elif\" can only be used in an if");
        assert_eq!(err("fi"), "1:1: \"fi\" can only be used to end an if");
        assert_eq!(err("do"), "1:1: \"do\" can only be used in a loop");
        assert_eq!(err("done"), "1:1: \"done\" can only be used to end a loop");
        assert_eq!(err("esac"), "1:1: \"esac\" can only be used to end a case");
        assert_eq!(err(";;"), "1:1: ;; can only be used in a case clause");
        assert_eq!(err("foo;;"), "1:4: ;; can only be used in a case clause");
        assert_eq!(err(";"), "1:1: ; can only immediately follow a statement");
        assert_eq!(err("{ ; }"), "1:3: ; can only immediately follow a statement");
        assert_eq!(err("&"), "1:1: & can only immediately follow a statement");
        assert_eq!(err("|"), "1:1: | can only immediately follow a statement");
        assert_eq!(err("&&"), "1:1: && can only immediately follow a statement");
        assert_eq!(err("||"), "1:1: || can only immediately follow a statement");
        assert_eq!(err("foo; || bar"), "1:6: || can only immediately follow a statement");
        assert_eq!(err("echo & || bar"), "1:8: || can only immediately follow a statement");
        assert_eq!(err("echo & ; bar"), "1:8: ; can only immediately follow a statement");
        assert_eq!(err("echo foo &\n;"), "2:1: ; can only immediately follow a statement");
        assert_eq!(err("echo foo\n;"), "2:1: ; can only immediately follow a statement");
        assert_eq!(err("|& a"), "1:1: |& is not a valid start for a statement");
        assert_eq!(err("a=b { foo; }"), "1:12: \"}\" can only be used to close a block");
        assert_eq!(err(">f { foo; }"), "1:11: \"}\" can only be used to close a block");
        assert_eq!(err("if done; then b; fi"), "1:4: \"done\" can only be used to end a loop");
        assert_eq!(err("]] )"), "1:1: \"]]\" can only be used to close a test");
    }

    #[test]
    fn test_statement_separation() {
        assert_eq!(err("(foo) bar"), "1:7: statements must be separated by &, ; or a newline");
        assert_eq!(err("{ foo; } bar"), "1:10: statements must be separated by &, ; or a newline");
        assert_eq!(
            err("if foo; then bar; fi bar"),
            "1:22: statements must be separated by &, ; or a newline"
        );
    }

    #[test]
    fn test_negation_errors() {
        assert_eq!(err("!"), "1:1: \"!\" cannot form a statement alone");
        assert_eq!(err("! !"), "1:1: cannot negate a command multiple times");
        assert_eq!(err("! ! foo"), "1:1: cannot negate a command multiple times");
        assert_eq!(err("echo | ! bar"), "1:8: \"!\" can only be used in full statements");
        assert_eq!(err("time ! foo"), "1:6: \"!\" can only be used in full statements");
    }

    #[test]
    fn test_operator_follow_errors() {
        assert_eq!(err("echo &&"), "1:6: && must be followed by a statement");
        assert_eq!(err("echo |"), "1:6: | must be followed by a statement");
        assert_eq!(err("echo ||"), "1:6: || must be followed by a statement");
        assert_eq!(err("echo | #bar"), "1:6: | must be followed by a statement");
        assert_eq!(err("echo && #bar"), "1:6: && must be followed by a statement");
        assert_eq!(err("`echo &&`"), "1:7: && must be followed by a statement");
        assert_eq!(err("`echo |`"), "1:7: | must be followed by a statement");
        assert_eq!(err("echo |&"), "1:6: |& must be followed by a statement");
    }

    #[test]
    fn test_redirect_follow_errors() {
        assert_eq!(err("echo >"), "1:6: > must be followed by a word");
        assert_eq!(err("echo >>"), "1:6: >> must be followed by a word");
        assert_eq!(err("echo <"), "1:6: < must be followed by a word");
        assert_eq!(err("echo 2>"), "1:7: > must be followed by a word");
        assert_eq!(err("echo <\nbar"), "1:6: < must be followed by a word");
        assert_eq!(err("echo | < #bar"), "1:8: < must be followed by a word");
        assert_eq!(err("echo && > #"), "1:9: > must be followed by a word");
        assert_eq!(err("echo <<<"), "1:6: <<< must be followed by a word");
        assert_eq!(err("<<"), "1:1: << must be followed by a word");
        assert_eq!(err("<<\nEOF\nbar\nEOF"), "1:1: << must be followed by a word");
        assert_eq!(err("<<a <<0\n$(<<$<<"), "2:6: << must be followed by a word");
    }

    #[test]
    fn test_heredoc_errors() {
        assert_eq!(err("<<EOF"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<EOF\n\\"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<EOF\n\\\n"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<EOF\nfoo\\\nEOF"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<'EOF'"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<'EOF'\n\\\n"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<\\EOF"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<-EOF"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<-EOF\n\t"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("$(<<EOF\nNOTEOF)"), "1:3: unclosed here-document 'EOF'");
        assert_eq!(err("`<<EOF\nNOTEOF`"), "1:2: unclosed here-document 'EOF'");
        assert_eq!(err("<<EOF <`\n#\n`\n``"), "1:1: unclosed here-document 'EOF'");
        assert_eq!(err("<<$bar\n$bar"), "1:3: expansions not allowed in heredoc words");
        assert_eq!(err("<<${bar}\n${bar}"), "1:3: expansions not allowed in heredoc words");
        assert_eq!(err("<<$-\n$-"), "1:3: expansions not allowed in heredoc words");
        assert_eq!(err("<<`bar`\n`bar`"), "1:3: expansions not allowed in heredoc words");
        assert_eq!(err("<<\"$bar\"\n$bar"), "1:4: expansions not allowed in heredoc words");
    }

    #[test]
    fn test_if_errors() {
        assert_eq!(err("if"), "1:1: \"if\" must be followed by a statement list");
        assert_eq!(err("if true;"), "1:1: \"if <cond>\" must be followed by \"then\"");
        assert_eq!(err("if true then"), "1:1: \"if <cond>\" must be followed by \"then\"");
        assert_eq!(err("if true; then bar;"), "1:1: if statement must end with \"fi\"");
        assert_eq!(err("if true; then bar; fi#etc"), "1:1: if statement must end with \"fi\"");
        assert_eq!(err("if a; then b; elif c;"), "1:15: \"elif <cond>\" must be followed by \"then\"");
        assert_eq!(err("a=b if foo; then bar; fi"), "1:13: \"then\" can only be used in an if");
        assert_eq!(err(">f if foo; then bar; fi"), "1:12: \"then\" can only be used in an if");
        assert_eq!(err("if; then bar; fi; ;"), "1:19: ; can only immediately follow a statement");
    }

    #[test]
    fn test_loop_errors() {
        assert_eq!(err("while"), "1:1: \"while\" must be followed by a statement list");
        assert_eq!(err("while true;"), "1:1: \"while <cond>\" must be followed by \"do\"");
        assert_eq!(err("while true; do bar"), "1:1: while statement must end with \"done\"");
        assert_eq!(err("while true; do bar;"), "1:1: while statement must end with \"done\"");
        assert_eq!(err("until"), "1:1: \"until\" must be followed by a statement list");
        assert_eq!(err("until true;"), "1:1: \"until <cond>\" must be followed by \"do\"");
        assert_eq!(err("until true; do bar"), "1:1: until statement must end with \"done\"");
        assert_eq!(err("for"), "1:1: \"for\" must be followed by a literal");
        assert_eq!(err("for i"), "1:1: \"for foo\" must be followed by \"in\", \"do\", ;, or a newline");
        assert_eq!(err("for i in;"), "1:1: \"for foo [in words]\" must be followed by \"do\"");
        assert_eq!(err("for i in 1 2 3;"), "1:1: \"for foo [in words]\" must be followed by \"do\"");
        assert_eq!(err("for i in 1 2 &"), "1:1: \"for foo [in words]\" must be followed by \"do\"");
        assert_eq!(err("for i in 1 2 ("), "1:14: word list can only contain words");
        assert_eq!(err("for i in 1 2 3; do echo $i;"), "1:1: for statement must end with \"done\"");
        assert_eq!(err("for i in 1 2 3; echo $i;"), "1:1: \"for foo [in words]\" must be followed by \"do\"");
        assert_eq!(err("for 'i' in 1 2 3; do echo $i; done"), "1:1: \"for\" must be followed by a literal");
        assert_eq!(err("for in 1 2 3; do echo $i; done"), "1:1: \"for foo\" must be followed by \"in\", \"do\", ;, or a newline");
        assert_eq!(err("select"), "1:1: \"select\" must be followed by a literal");
        assert_eq!(err("select i"), "1:1: \"select foo\" must be followed by \"in\", \"do\", ;, or a newline");
        assert_eq!(err("select i in;"), "1:1: \"select foo [in words]\" must be followed by \"do\"");
        assert_eq!(err("select i in 1 2 3; do echo $i;"), "1:1: select statement must end with \"done\"");
    }

    #[test]
    fn test_case_errors() {
        assert_eq!(err("case"), "1:1: \"case\" must be followed by a word");
        assert_eq!(err("case i"), "1:1: \"case x\" must be followed by \"in\"");
        assert_eq!(err("case i in 3) foo;"), "1:1: case statement must end with \"esac\"");
        assert_eq!(
            err("case i in 3) foo; 4) bar; esac"),
            "1:20: a command can only contain words and redirects; encountered )"
        );
        assert_eq!(err("case i in 3&) foo;"), "1:12: case patterns must be separated with |");
        assert_eq!(err("case $i in &) foo;"), "1:12: case patterns must consist of words");
        assert_eq!(
            err("case i {"),
            "1:1: \"case i {\" is a mksh feature; tried parsing as bash"
        );
        assert_eq!(
            err_lang("case i { x) y ;;", LangVariant::MirBsdKorn),
            "1:1: case statement must end with \"}\""
        );
    }

    #[test]
    fn test_function_errors() {
        assert_eq!(err("foo("), "1:1: \"foo(\" must be followed by )");
        assert_eq!(err("foo(bar"), "1:1: \"foo(\" must be followed by )");
        assert_eq!(err("à("), "1:1: \"foo(\" must be followed by )");
        assert_eq!(err("foo()"), "1:1: \"foo()\" must be followed by a statement");
        assert_eq!(err("\"foo\"(){ :; }"), "1:1: invalid func name");
        assert_eq!(err("foo$bar(){ :; }"), "1:1: invalid func name");
        assert_eq!(err("\"\"()"), "1:1: invalid func name");
        assert_eq!(err("echo foo("), "1:9: a command can only contain words and redirects; encountered (");
        assert_eq!(err("a=b foo() { bar; }"), "1:8: a command can only contain words and redirects; encountered (");
        assert_eq!(err(">f foo() { bar; }"), "1:7: a command can only contain words and redirects; encountered (");
        assert_eq!(err("function"), "1:1: \"function\" must be followed by a name");
        assert_eq!(err("function foo("), "1:10: \"foo(\" must be followed by )");
        assert_eq!(err("function `function"), "1:1: \"function\" must be followed by a name");
        assert_eq!(err("function \"foo\"(){}"), "1:1: \"function\" must be followed by a name");
        assert_eq!(err("function foo()"), "1:1: \"foo()\" must be followed by a statement");
        assert_eq!(err_lang("foo-bar() { x; }", LangVariant::Posix), "1:1: invalid func name");
        assert_eq!(err_lang("foò() { x; }", LangVariant::Posix), "1:1: invalid func name");
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(err("echo $((& $("), "1:9: & must follow an expression");
        assert_eq!(err("echo $((a'"), "1:10: reached EOF without closing quote '");
        assert_eq!(err("echo $((a b\""), "1:11: not a valid arithmetic operator: b");
        assert_eq!(err("echo $(())"), "1:6: $(( must be followed by an expression");
        assert_eq!(err("echo $((()))"), "1:9: ( must be followed by an expression");
        assert_eq!(err("echo $(((3))"), "1:6: reached ) without matching $(( with ))");
        assert_eq!(err("echo $((+))"), "1:9: + must be followed by an expression");
        assert_eq!(err("echo $((a b c))"), "1:11: not a valid arithmetic operator: b");
        assert_eq!(err("echo $((a ; c))"), "1:11: not a valid arithmetic operator: ;");
        assert_eq!(err("echo $((a *))"), "1:11: * must be followed by an expression");
        assert_eq!(err("echo $((++))"), "1:9: ++ must be followed by a literal");
        assert_eq!(err("echo $((a ? b))"), "1:11: ternary operator missing : after ?");
        assert_eq!(err("echo $((a : b))"), "1:11: ternary operator missing ? before :");
        assert_eq!(err("echo $((/"), "1:9: / must follow an expression");
        assert_eq!(err("echo $((:"), "1:9: ternary operator missing ? before :");
        assert_eq!(err("echo $(((a)+=b))"), "1:12: += must follow a name");
        assert_eq!(err("echo $((1=2))"), "1:10: = must follow a name");
        assert_eq!(err("echo $(($0=2))"), "1:11: = must follow a name");
        assert_eq!(err("echo $(($(a)=2))"), "1:13: = must follow a name");
        assert_eq!(err("<<EOF\n$(()a"), "2:1: $(( must be followed by an expression");
        assert_eq!(err("<<EOF\n`))"), "2:2: ) can only be used to close a subshell");
        assert_eq!(err("echo $((`echo 0`"), "1:6: reached EOF without matching $(( with ))");
        assert_eq!(err("echo $(($(a\""), "1:12: reached EOF without closing quote \"");
        assert_eq!(err("echo $((a[))"), "1:10: [ must be followed by an expression");
        assert_eq!(err("echo $((a[b))"), "1:10: reached ) without matching [ with ]");
        assert_eq!(err("echo $((a[]))"), "1:10: [ must be followed by an expression");
        assert_eq!(err("echo $((x$t["), "1:12: [ must follow a name");
        assert_eq!(err("(())"), "1:1: (( must be followed by an expression");
        assert_eq!(err("echo ((foo"), "1:6: (( can only be used to open an arithmetic cmd");
    }

    #[test]
    fn test_let_errors() {
        assert_eq!(err("let"), "1:1: \"let\" must be followed by an expression");
        assert_eq!(err("let a+ b"), "1:6: + must be followed by an expression");
        assert_eq!(err("let + a"), "1:5: + must be followed by an expression");
        assert_eq!(err("let a ++"), "1:7: ++ must be followed by a literal");
        assert_eq!(err("let (a)++"), "1:8: ++ must follow a name");
        assert_eq!(err("let 1++"), "1:6: ++ must follow a name");
        assert_eq!(err("let $0++"), "1:7: ++ must follow a name");
        assert_eq!(err("let --(a)"), "1:5: -- must be followed by a literal");
        assert_eq!(err("let --$a"), "1:5: -- must be followed by a literal");
        assert_eq!(err("let a+\n"), "1:6: + must be followed by an expression");
        assert_eq!(err("let ))"), "1:1: \"let\" must be followed by an expression");
        assert_eq!(err("`let !`"), "1:6: ! must be followed by an expression");
        assert_eq!(err("let a:b"), "1:6: ternary operator missing ? before :");
        assert_eq!(err("let a+b=c"), "1:8: = must follow a name");
        assert_eq!(err("`let` { foo; }"), "1:2: \"let\" must be followed by an expression");
        assert_eq!(err("$(let)"), "1:3: \"let\" must be followed by an expression");
    }

    #[test]
    fn test_array_errors() {
        assert_eq!(err("a=(<)"), "1:4: array element values must be words");
        assert_eq!(err("a=([)"), "1:4: [ must be followed by an expression");
        assert_eq!(err("a=([i)"), "1:4: reached ) without matching [ with ]");
        assert_eq!(err("a=([i])"), "1:4: \"[x]\" must be followed by =");
        assert_eq!(err("a[i]=(y)"), "1:6: arrays cannot be nested");
        assert_eq!(err("a=([i]=(y))"), "1:8: arrays cannot be nested");
        assert_eq!(err("o=([0]=#"), "1:8: array element values must be words");
        assert_eq!(err("a[b] ==["), "1:1: \"a[b]\" must be followed by =");
        assert_eq!(err("a[b] +=c"), "1:1: \"a[b]\" must be followed by =");
        assert_eq!(err("a[i]+"), "1:1: \"a[b]+\" must be followed by =");
        assert_eq!(err("a[1]"), "1:1: \"a[b]\" must be followed by =");
        assert_eq!(err("a[1]#"), "1:1: \"a[b]\" must be followed by =");
        assert_eq!(err("a["), "1:2: [ must be followed by an expression");
        assert_eq!(err("a[]"), "1:2: [ must be followed by an expression");
        assert_eq!(err("a[["), "1:3: [ must follow a name");
        assert_eq!(err("a=(x y) foo"), "1:1: inline variables cannot be arrays");
        assert_eq!(err("a[2]=x foo"), "1:1: inline variables cannot be arrays");
        assert_eq!(err("declare 0=${o})"), "1:9: invalid var name");
        assert_eq!(err("local ("), "1:7: \"local\" must be followed by names or assignments");
        assert_eq!(err("coproc declare ("), "1:16: \"declare\" must be followed by names or assignments");
        assert_eq!(err("coproc"), "1:1: coproc clause requires a command");
        assert_eq!(err("coproc\n$"), "1:1: coproc clause requires a command");
    }

    #[test]
    fn test_param_expansion_errors() {
        assert_eq!(err("echo $foo ${}"), "1:13: parameter expansion requires a literal");
        assert_eq!(err("echo ${à}"), "1:8: invalid parameter name");
        assert_eq!(err("echo ${1a}"), "1:8: invalid parameter name");
        assert_eq!(err("echo \"foo${bar\""), "1:15: not a valid parameter expansion operator: \"");
        assert_eq!(err("echo ${%"), "1:6: \"${%foo}\" is a mksh feature; tried parsing as bash");
        assert_eq!(err("echo ${##"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${#<}"), "1:9: parameter expansion requires a literal");
        assert_eq!(err("echo ${@foo}"), "1:9: @ cannot be followed by a word");
        assert_eq!(err("echo ${$foo}"), "1:9: $ cannot be followed by a word");
        assert_eq!(err("echo ${?foo}"), "1:9: ? cannot be followed by a word");
        assert_eq!(err("echo ${-foo}"), "1:9: - cannot be followed by a word");
        assert_eq!(err("echo ${@[@]} ${@[*]}"), "1:9: cannot index a special parameter name");
        assert_eq!(err("echo ${*[@]} ${*[*]}"), "1:9: cannot index a special parameter name");
        assert_eq!(err("echo ${#[x]}"), "1:9: cannot index a special parameter name");
        assert_eq!(err("echo ${$[0]}"), "1:9: cannot index a special parameter name");
        assert_eq!(err("echo ${?[@]}"), "1:9: cannot index a special parameter name");
        assert_eq!(err("echo ${2[@]}"), "1:9: cannot index a special parameter name");
        assert_eq!(err("echo ${foo*}"), "1:11: not a valid parameter expansion operator: *");
        assert_eq!(err("echo ${foo;}"), "1:11: not a valid parameter expansion operator: ;");
        assert_eq!(err("echo ${foo!}"), "1:11: not a valid parameter expansion operator: !");
        assert_eq!(err("echo ${foo]}"), "1:11: not a valid parameter expansion operator: ]");
        assert_eq!(err("echo ${#foo:-bar}"), "1:12: cannot combine multiple parameter expansion operators");
        assert_eq!(err("echo ${foo[1 2]}"), "1:14: not a valid arithmetic operator: 2");
        assert_eq!(err("echo ${foo[}"), "1:11: [ must be followed by an expression");
        assert_eq!(err("echo ${foo[]}"), "1:11: [ must be followed by an expression");
        assert_eq!(err("echo ${a/\n"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${a/''"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${a-\n"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${foo:"), "1:11: : must be followed by an expression");
        assert_eq!(err("echo ${foo:1 2}"), "1:14: not a valid arithmetic operator: 2");
        assert_eq!(err("echo ${foo:1"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${foo:1:"), "1:13: : must be followed by an expression");
        assert_eq!(err("echo ${foo:1:2"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${foo,"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${foo@"), "1:11: @ expansion operator requires a literal");
        assert_eq!(err("echo ${foo@}"), "1:12: @ expansion operator requires a literal");
        assert_eq!(err("echo ${foo@Q"), "1:6: reached EOF without matching ${ with }");
        assert_eq!(err("echo ${foo@bar}"), "1:12: invalid @ expansion operator \"bar\"");
        assert_eq!(err("echo ${foo@'Q'}"), "1:12: @ expansion operator requires a literal");
        assert_eq!(err("echo ${foo@#}"), "1:12: this expansion operator is a mksh feature; tried parsing as bash");
    }

    // =========================================================================
    // DIALECT GATING
    // =========================================================================

    #[test]
    fn test_posix_gates() {
        let p = LangVariant::Posix;
        assert_eq!(err_lang("foo &>/dev/null", p), "1:5: &> redirects are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("foo &>>/dev/null", p), "1:5: &> redirects are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("foo <<< bar", p), "1:5: herestrings are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("foo << < bar", p), "1:5: << must be followed by a word");
        assert_eq!(err_lang("echo {var}>foo", p), "1:6: {varname} redirects are a bash feature; tried parsing as posix");
        assert_eq!(err_lang("for i in 1 2 3; { echo; }", p), "1:17: for loops with braces are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("for ((i=0; i<5; i++)); do echo; done", p), "1:5: c-style fors are a bash feature; tried parsing as posix");
        assert_eq!(err_lang("echo !(a)", p), "1:6: extended globs are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("echo $a@(b)", p), "1:8: extended globs are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("foo=(1 2)", p), "1:5: arrays are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${!foo}", p), "1:6: \"${!foo}\" is a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${!foo*}", p), "1:6: \"${!foo*}\" is a bash feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${!foo@}", p), "1:12: this expansion operator is a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${!foo[@]}", p), "1:12: arrays are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${foo[1]}", p), "1:11: arrays are a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${foo/a/b}", p), "1:11: search and replace is a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${foo:1}", p), "1:11: slicing is a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${foo,bar}", p), "1:11: this expansion operator is a bash feature; tried parsing as posix");
        assert_eq!(err_lang("echo ${foo@Q}", p), "1:11: this expansion operator is a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("${ foo;}", p), "1:1: \"${ stmts;}\" is a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("${|foo;}", p), "1:1: \"${|stmts;}\" is a bash/mksh feature; tried parsing as posix");
        assert_eq!(err_lang("function foo() { bar; }", p), "1:13: the \"function\" builtin is a bash feature; tried parsing as posix");
        assert_eq!(err_lang("function foo { bar; }", p), "1:14: the \"function\" builtin is a bash feature; tried parsing as posix");
        assert_eq!(err_lang("declare foo=(bar)", p), "1:13: the \"declare\" builtin is a bash feature; tried parsing as posix");
        assert_eq!(err_lang("let foo=(bar)", p), "1:9: the \"let\" builtin is a bash feature; tried parsing as posix");
        assert_eq!(err_lang("echo <(", p), "1:6: < must be followed by a word");
        assert_eq!(err_lang("echo >(", p), "1:6: > must be followed by a word");
        assert_eq!(err_lang("$((# 1 + 2))", p), "1:1: unsigned expressions are a mksh feature; tried parsing as posix");
        assert_eq!(err_lang("((foo", p), "1:2: reached EOF without matching ( with )");
        assert_eq!(err_lang("echo ((foo", p), "1:1: \"foo(\" must be followed by )");
        assert_eq!(err_lang("echo ;&", p), "1:7: & can only immediately follow a statement");
        assert_eq!(err_lang("echo ;;&", p), "1:6: ;; can only be used in a case clause");
        assert_eq!(err_lang("echo ;|", p), "1:7: | can only immediately follow a statement");
        assert_eq!(err_lang("echo |&", p), "1:6: | must be followed by a statement");
        assert_eq!(err_lang("foo |& bar", p), "1:5: | must be followed by a statement");
        assert_eq!(err_lang("]] )", p), "1:4: a command can only contain words and redirects; encountered )");
    }

    #[test]
    fn test_mksh_gates() {
        let m = LangVariant::MirBsdKorn;
        assert_eq!(err_lang("[[ a =~ b ]]", m), "1:6: regex tests are a bash feature; tried parsing as mksh");
        assert_eq!(err_lang("for ((;;)); do echo; done", m), "1:5: c-style fors are a bash feature; tried parsing as mksh");
        assert_eq!(err_lang("echo {var}>foo", m), "1:6: {varname} redirects are a bash feature; tried parsing as mksh");
        assert_eq!(err_lang("echo ${!foo*}", m), "1:6: \"${!foo*}\" is a bash feature; tried parsing as mksh");
        assert_eq!(err_lang("echo ${!foo@}", m), "1:6: \"${!foo@}\" is a bash feature; tried parsing as mksh");
        assert_eq!(err_lang("echo ${foo,bar}", m), "1:11: this expansion operator is a bash feature; tried parsing as mksh");
        assert_eq!(err_lang("echo ${foo@a}", m), "1:12: this expansion operator is a bash feature; tried parsing as mksh");
        assert_eq!(err_lang("echo ${foo@U}", m), "1:12: this expansion operator is a bash feature; tried parsing as mksh");
        assert_eq!(err_lang("echo ${%<}", m), "1:9: parameter expansion requires a literal");
        assert_eq!(err_lang("echo ${%foo:1:3}", m), "1:12: cannot combine multiple parameter expansion operators");
        assert_eq!(err_lang("echo ${#foo%x}", m), "1:12: cannot combine multiple parameter expansion operators");
        assert_eq!(err_lang("${ ", m), "1:1: reached EOF without matching ${ with }");
        assert_eq!(err_lang("${ foo;", m), "1:1: reached EOF without matching ${ with }");
        assert_eq!(err_lang("${ foo }", m), "1:1: reached EOF without matching ${ with }");
        assert_eq!(err_lang("${|", m), "1:1: reached EOF without matching ${ with }");
        assert_eq!(err_lang("${|foo;", m), "1:1: reached EOF without matching ${ with }");
        assert_eq!(err_lang("${|foo }", m), "1:1: reached EOF without matching ${ with }");
    }

    #[test]
    fn test_mksh_accepts_its_features() {
        let m = LangVariant::MirBsdKorn;
        assert!(parse_lang("${ foo;}", m).is_ok());
        assert!(parse_lang("${|foo;}", m).is_ok());
        assert!(parse_lang("((# 1 + 2))", m).is_ok());
        assert!(parse_lang("case i { x) y ;; }", m).is_ok());
        assert!(parse_lang("echo ${%foo}", m).is_ok());
        assert!(parse_lang("echo ${foo@#}", m).is_ok());
        assert!(parse_lang("case i in x) y ;| esac", m).is_ok());
    }

    #[test]
    fn test_bash_features_parse() {
        assert!(parse("[[ a =~ ^b$ ]]").is_ok());
        assert!(parse("for ((i=0; i<5; i++)); do echo $i; done").is_ok());
        assert!(parse("declare -x foo=bar arr=(1 2)").is_ok());
        assert!(parse("let a=1 b=a+2").is_ok());
        assert!(parse("coproc foo { bar; }").is_ok());
        assert!(parse("time -p foo | bar").is_ok());
        assert!(parse("select x in a b; do echo $x; done").is_ok());
        assert!(parse("echo <(foo) >(bar)").is_ok());
        assert!(parse("echo $'a\\nb' $\"msg\"").is_ok());
        assert!(parse("echo ${foo:1:2} ${bar/x/y} ${baz^^}").is_ok());
        assert!(parse("a=([i]=x [j]=y) b+=(z)").is_ok());
        assert!(parse("echo $[1+2]").is_ok());
        assert!(parse("case x in a) ;; b) ;& c) ;;& esac").is_ok());
        assert!(parse("echo ${ foo;} ${|bar;}").is_ok());
    }

    #[test]
    fn test_posix_accepts_plain_words() {
        let p = LangVariant::Posix;
        // These are ordinary words in POSIX mode, not keywords.
        assert!(parse_lang("select foo bar", p).is_ok());
        assert!(parse_lang("let x", p).is_ok());
        assert!(parse_lang("declare -x foo", p).is_ok());
        assert!(parse_lang("export a=b", p).is_ok());
        assert!(parse_lang("[[ a", p).is_ok());
    }

    // =========================================================================
    // POSITION OVERFLOW
    // =========================================================================

    #[test]
    fn test_line_overflow() {
        let mut input = "\n".repeat(MAX_LINE as usize);
        input.push(')');
        assert_eq!(err(&input), "?:1: ) can only be used to close a subshell");
        let mut input = "\n".repeat(MAX_LINE as usize + 5);
        input.push(')');
        assert_eq!(err(&input), "?:1: ) can only be used to close a subshell");
        let mut input = "\n".repeat(MAX_LINE as usize - 1);
        input.push(')');
        assert_eq!(err(&input), "262143:1: ) can only be used to close a subshell");
    }

    #[test]
    fn test_col_overflow() {
        let mut input = " ".repeat(MAX_COL as usize);
        input.push(')');
        assert_eq!(err(&input), "1:?: ) can only be used to close a subshell");
        let mut input = " ".repeat(MAX_COL as usize - 1);
        input.push(')');
        assert_eq!(err(&input), "1:16383: ) can only be used to close a subshell");
        let mut input = " ".repeat(MAX_COL as usize + 5);
        input.push_str("\n)");
        assert_eq!(err(&input), "2:1: ) can only be used to close a subshell");
    }

    #[test]
    fn test_line_overflow_still_parses() {
        let mut input = "\n".repeat(MAX_LINE as usize);
        input.push_str("foo; bar");
        assert!(parse(&input).is_ok());
    }

    #[test]
    fn test_filename_in_errors() {
        let errmsg = Parser::new()
            .parse("(".as_bytes(), "some-file.sh")
            .unwrap_err()
            .to_string();
        assert_eq!(errmsg, "some-file.sh:1:1: reached EOF without matching ( with )");
    }

    // =========================================================================
    // READER CONTRACT
    // =========================================================================

    struct StrictReader {
        data: io::Cursor<Vec<u8>>,
        gave_eof: bool,
    }

    impl io::Read for StrictReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                if self.gave_eof {
                    return Err(io::Error::new(io::ErrorKind::Other, "duplicate EOF read"));
                }
                self.gave_eof = true;
            }
            Ok(n)
        }
    }

    #[test]
    fn test_eof_read_exactly_once() {
        let reader = StrictReader {
            data: io::Cursor::new(b"foo\nbar; baz".to_vec()),
            gave_eof: false,
        };
        let script = Parser::new().parse(reader, "").unwrap();
        assert_eq!(script.statements.len(), 3);
    }

    #[test]
    fn test_read_error_passthrough() {
        struct BadReader;
        impl io::Read for BadReader {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "write: expected error"))
            }
        }
        match Parser::new().parse(BadReader, "") {
            Err(ParseError::Io(e)) => assert_eq!(e.to_string(), "write: expected error"),
            other => panic!("expected the io error back, got {other:?}"),
        }
    }

    // =========================================================================
    // STREAMING ENTRY POINTS
    // =========================================================================

    #[test]
    fn test_stmts_streaming() {
        let mut names = Vec::new();
        Parser::new()
            .stmts("foo\nbar; baz".as_bytes(), |stmt| {
                if let CommandNode::Simple(cmd) = &stmt.command {
                    names.push(cmd.name().unwrap_or_default());
                }
                true
            })
            .unwrap();
        assert_eq!(names, vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_stmts_stop_early() {
        let mut count = 0;
        Parser::new()
            .stmts("a\nb &\nc\n".as_bytes(), |stmt| {
                count += 1;
                !stmt.background
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_stmts_error() {
        for input in ["foo; )", "bar; <<EOF"] {
            let mut seen = 0;
            let res = Parser::new().stmts(input.as_bytes(), |_| {
                seen += 1;
                true
            });
            assert!(res.is_err(), "expected error for {input}");
            assert!(seen >= 1);
        }
    }

    #[test]
    fn test_words_streaming() {
        let mut words = Vec::new();
        Parser::new()
            .words("foo bar\nbaz etc".as_bytes(), |w| {
                words.push(w.lit().unwrap_or_default());
                true
            })
            .unwrap();
        assert_eq!(words, vec!["foo", "bar", "baz", "etc"]);
    }

    #[test]
    fn test_words_stop_early() {
        let mut parsed = 0;
        Parser::new()
            .words("a\nb\nc\n".as_bytes(), |w| {
                parsed += 1;
                w.lit().as_deref() != Some("b")
            })
            .unwrap();
        assert_eq!(parsed, 2);
    }

    #[test]
    fn test_words_error() {
        let res = Parser::new().words("foo )".as_bytes(), |_| true);
        assert_eq!(res.unwrap_err().to_string(), "1:5: ) is not a valid word");
    }

    #[test]
    fn test_document() {
        let word = Parser::new().document("foo".as_bytes()).unwrap();
        assert_eq!(word.lit(), Some("foo".into()));

        let word = Parser::new().document(" foo  $bar".as_bytes()).unwrap();
        assert_eq!(word.parts.len(), 2);
        match &word.parts[0] {
            WordPart::Literal(l) => assert_eq!(l.value, " foo  "),
            other => panic!("expected literal, got {other:?}"),
        }
        match &word.parts[1] {
            WordPart::ParameterExpansion(p) => assert_eq!(p.parameter, "bar"),
            other => panic!("expected expansion, got {other:?}"),
        }

        let word = Parser::new().document("$bar\n\n".as_bytes()).unwrap();
        assert_eq!(word.parts.len(), 2);
        match &word.parts[1] {
            WordPart::Literal(l) => assert_eq!(l.value, "\n\n"),
            other => panic!("expected literal, got {other:?}"),
        }
    }

    #[test]
    fn test_document_error() {
        let errmsg = Parser::new()
            .document("foo $(".as_bytes())
            .unwrap_err()
            .to_string();
        assert_eq!(errmsg, "1:5: reached EOF without matching ( with )");
    }

    #[test]
    fn test_arithmetic_entry() {
        let expr = Parser::new().arithmetic("3 + 4".as_bytes()).unwrap();
        match expr {
            ArithExpr::Binary(b) => {
                assert_eq!(b.operator, ArithBinaryOperator::Add);
            }
            other => panic!("expected binary, got {other:?}"),
        }
        let errmsg = Parser::new()
            .arithmetic("3 +".as_bytes())
            .unwrap_err()
            .to_string();
        assert_eq!(errmsg, "1:3: + must be followed by an expression");
    }

    #[test]
    fn test_interactive() {
        let mut lines: Vec<usize> = Vec::new();
        Parser::new()
            .interactive("foo; bar\nbaz\n".as_bytes(), |stmts| {
                lines.push(stmts.len());
                true
            })
            .unwrap();
        assert_eq!(lines, vec![2, 1]);
    }

    #[test]
    fn test_interactive_stop() {
        let mut calls = 0;
        Parser::new()
            .interactive("\nfoo\n".as_bytes(), |_| {
                calls += 1;
                false
            })
            .unwrap();
        assert_eq!(calls, 1);
    }

    // =========================================================================
    // IS-INCOMPLETE
    // =========================================================================

    #[test]
    fn test_is_incomplete() {
        let cases = [
            ("foo\n", false),
            ("foo;", false),
            ("\n", false),
            ("badsyntax)", false),
            ("foo 'incomp", true),
            ("foo \"incomp", true),
            ("foo ${incomp", true),
            ("foo; 'incomp", true),
            (" (incomp", true),
        ];
        for (input, want) in cases {
            let got = match parse(input) {
                Ok(_) => false,
                Err(e) => is_incomplete(&e),
            };
            assert_eq!(got, want, "IsIncomplete({input:?})");
        }
    }

    // =========================================================================
    // STOP-AT
    // =========================================================================

    #[test]
    fn test_stop_at() {
        let p = Parser::new().stop_at("$$");
        let script = p.parse("echo foo $$".as_bytes(), "").unwrap();
        assert_eq!(first_call_words(&script), vec!["echo", "foo"]);

        let script = p.parse("$$".as_bytes(), "").unwrap();
        assert!(script.statements.is_empty());

        let script = p.parse("echo foo\n$$\n".as_bytes(), "").unwrap();
        assert_eq!(script.statements.len(), 1);

        let script = p.parse("echo foo;$$".as_bytes(), "").unwrap();
        assert_eq!(script.statements.len(), 1);

        // Quoted stop literals do not stop.
        let script = p.parse("echo '$$'".as_bytes(), "").unwrap();
        match &script.statements[0].command {
            CommandNode::Simple(cmd) => assert_eq!(cmd.words.len(), 2),
            other => panic!("expected simple command, got {other:?}"),
        }

        let script = p.parse("$foo $".as_bytes(), "").unwrap();
        assert_eq!(script.statements.len(), 1);
    }

    // =========================================================================
    // ERROR RECOVERY
    // =========================================================================

    fn count_recovered(script: &ScriptNode) -> usize {
        let mut count = 0;
        walk(script, &mut |node: NodeRef<'_>| {
            let span = node.span();
            for pos in [span.start, span.end] {
                assert!(
                    !(pos.is_valid() && pos.is_recovered()),
                    "a position cannot be valid and recovered"
                );
                if !pos.is_valid() {
                    assert_eq!(pos.offset, 0);
                    assert_eq!(pos.line, 0);
                    assert_eq!(pos.col, 0);
                }
            }
            if span.is_recovered() {
                count += 1;
            }
            true
        });
        count
    }

    #[test]
    fn test_recover_errors() {
        let cases: &[(&str, usize)] = &[
            ("foo;", 0),
            ("foo", 0),
            ("'incomp", 1),
            ("foo; 'incomp", 1),
            ("{ incomp", 1),
            ("(incomp", 1),
            ("(incomp; foo", 1),
            ("$(incomp", 1),
            ("((incomp", 1),
            ("$((incomp", 1),
            ("\"incomp", 1),
            ("`incomp", 1),
            ("incomp >", 1),
            ("${incomp", 1),
            ("incomp | ", 1),
            ("incomp || ", 1),
            ("incomp && ", 1),
            ("(one > ; two | ); { three", 3),
        ];
        let parser = Parser::new().recover_errors(3);
        for (input, want) in cases {
            let script = parser
                .parse(input.as_bytes(), "")
                .unwrap_or_else(|e| panic!("recovery failed for {input:?}: {e}"));
            assert_eq!(count_recovered(&script), *want, "recovered count for {input:?}");
            if !input.trim().is_empty() {
                assert!(!script.statements.is_empty(), "no statements for {input:?}");
            }
        }
    }

    #[test]
    fn test_recover_budget_exceeded() {
        let parser = Parser::new().recover_errors(3);
        assert!(parser.parse("badsyntax)".as_bytes(), "").is_err());
        // Four unclosed subshells blow the budget of three.
        assert!(parser.parse("( ( ( (".as_bytes(), "").is_err());
    }

    #[test]
    fn test_recover_if_chain() {
        let parser = Parser::new().recover_errors(3);
        let script = parser.parse("if foo".as_bytes(), "").unwrap();
        assert_eq!(script.statements.len(), 1);
        let script = parser.parse("if foo; then bar".as_bytes(), "").unwrap();
        assert_eq!(count_recovered(&script), 1);
    }
}
