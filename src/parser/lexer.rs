//! Lexer for Shell Source
//!
//! Mode-driven tokenizer: the parser pushes a lexical mode for each context
//! it enters (double quotes, parameter expansion, arithmetic, test clauses,
//! heredoc bodies) and pulls tokens whose meaning depends on that mode.
//! Literal runs are kept raw, including backslash escapes, so every token
//! value maps one-to-one onto source bytes.

use crate::ast::types::{Position, Span};
use crate::parser::reader::Source;
use crate::parser::types::{is_name_char, is_special_param, LangVariant, ParseError};

/// Token types across all lexer modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Eof,
    Newline,
    Comment,
    /// Literal chunk; the value holds the raw text.
    Lit,
    /// End of a heredoc body: the delimiter line was consumed.
    HeredocEnd,

    // Separators and control operators
    Semicolon,   // ;
    DSemi,       // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&
    SemiPipe,    // ;|
    Amp,         // &
    AndAnd,      // &&
    Pipe,        // |
    OrOr,        // ||
    PipeAmp,     // |&

    // Grouping
    LParen,      // (
    RParen,      // )
    DParenStart, // ((
    DParenEnd,   // ))
    LBracket,    // [
    RBracket,    // ]
    RBrace,      // }

    // Redirections
    Less,       // <
    Great,      // >
    DGreat,     // >>
    LessAnd,    // <&
    GreatAnd,   // >&
    LessGreat,  // <>
    Clobber,    // >|
    DLess,      // <<
    DLessDash,  // <<-
    TLess,      // <<<
    AndGreat,   // &>
    AndDGreat,  // &>>
    FdVariable, // {varname} before a redirection operator
    ProcSubIn,  // <(
    ProcSubOut, // >(

    // Quotes and expansions
    SglQuote,     // '
    DblQuote,     // "
    BackQuote,    // ` opening a command substitution
    BackQuoteEnd, // ` closing the current command substitution
    Dollar,       // lone $
    DollarName,   // $name or $@ etc; the value holds the parameter
    DollBrace,    // ${
    DollParen,    // $(
    DollDblParen, // $((
    DollBracket,  // $[
    DollSglQuote, // $'
    DollDblQuote, // $"
    ExtGlob,      // ?( *( +( @( !(

    // Arithmetic operators
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    Percent,       // %
    Power,         // **
    Inc,           // ++
    Dec,           // --
    Shl,           // <<  (arithmetic)
    Shr,           // >>  (arithmetic)
    LessEq,        // <=
    GreatEq,       // >=
    EqEq,          // ==
    NotEq,         // !=
    Excl,          // !
    Tilde,         // ~
    Caret,         // ^
    Quest,         // ?
    Colon,         // :
    Comma,         // ,
    Assign,        // =
    PlusAssign,    // +=
    MinusAssign,   // -=
    StarAssign,    // *=
    SlashAssign,   // /=
    PercentAssign, // %=
    ShlAssign,     // <<=
    ShrAssign,     // >>=
    AmpAssign,     // &=
    CaretAssign,   // ^=
    PipeAssign,    // |=

    // Parameter expansion operators
    Hash,       // #
    DblHash,    // ##
    DblPercent, // %%
    DblSlash,   // //
    DblCaret,   // ^^
    DblComma,   // ,,
    At,         // @
    ColonMinus, // :-
    ColonEq,    // :=
    ColonQuest, // :?
    ColonPlus,  // :+
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Newline => "\\n",
            Self::Comment => "#",
            Self::Lit => "literal",
            Self::HeredocEnd => "heredoc end",
            Self::Semicolon => ";",
            Self::DSemi => ";;",
            Self::SemiAnd => ";&",
            Self::SemiSemiAnd => ";;&",
            Self::SemiPipe => ";|",
            Self::Amp => "&",
            Self::AndAnd => "&&",
            Self::Pipe => "|",
            Self::OrOr => "||",
            Self::PipeAmp => "|&",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::DParenStart => "((",
            Self::DParenEnd => "))",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::RBrace => "}",
            Self::Less => "<",
            Self::Great => ">",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::LessGreat => "<>",
            Self::Clobber => ">|",
            Self::DLess => "<<",
            Self::DLessDash => "<<-",
            Self::TLess => "<<<",
            Self::AndGreat => "&>",
            Self::AndDGreat => "&>>",
            Self::FdVariable => "{varname}",
            Self::ProcSubIn => "<(",
            Self::ProcSubOut => ">(",
            Self::SglQuote => "'",
            Self::DblQuote => "\"",
            Self::BackQuote => "`",
            Self::BackQuoteEnd => "`",
            Self::Dollar => "$",
            Self::DollarName => "$",
            Self::DollBrace => "${",
            Self::DollParen => "$(",
            Self::DollDblParen => "$((",
            Self::DollBracket => "$[",
            Self::DollSglQuote => "$'",
            Self::DollDblQuote => "$\"",
            Self::ExtGlob => "extglob",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Power => "**",
            Self::Inc => "++",
            Self::Dec => "--",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::LessEq => "<=",
            Self::GreatEq => ">=",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Excl => "!",
            Self::Tilde => "~",
            Self::Caret => "^",
            Self::Quest => "?",
            Self::Colon => ":",
            Self::Comma => ",",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::StarAssign => "*=",
            Self::SlashAssign => "/=",
            Self::PercentAssign => "%=",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
            Self::AmpAssign => "&=",
            Self::CaretAssign => "^=",
            Self::PipeAssign => "|=",
            Self::Hash => "#",
            Self::DblHash => "##",
            Self::DblPercent => "%%",
            Self::DblSlash => "//",
            Self::DblCaret => "^^",
            Self::DblComma => ",,",
            Self::At => "@",
            Self::ColonMinus => ":-",
            Self::ColonEq => ":=",
            Self::ColonQuest => ":?",
            Self::ColonPlus => ":+",
        }
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub pos: Position,
    pub end: Position,
    /// Whitespace (or start of input) immediately preceded this token.
    pub spaced: bool,
}

impl Token {
    /// How the token reads in an error message.
    pub fn display(&self) -> String {
        match self.token_type {
            TokenType::Lit | TokenType::DollarName | TokenType::ExtGlob | TokenType::Comment => {
                self.value.clone()
            }
            _ => self.token_type.as_str().to_string(),
        }
    }
}

/// Flavors of arithmetic context, which differ in how they terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithKind {
    /// `$(( ... ))`
    Expansion,
    /// `(( ... ))` command and C-style for headers
    Command,
    /// `let` arguments; a newline ends the clause
    Let,
    /// `$[ ... ]`, array indices and slice expressions
    Bracket,
}

/// Lexical modes. The parser pushes one for each nested context.
#[derive(Debug, Clone, PartialEq)]
pub enum LexMode {
    /// Command position: operators, words, comments.
    Command,
    DoubleQuote,
    /// Inside `${...}`, before or at the operator.
    ParamName,
    /// Operator argument inside `${...}`, up to `}`.
    ParamArg,
    /// Replacement pattern of `${a/pat/repl}`, up to `/` or `}`.
    ParamReplPattern,
    /// Replacement text of `${a/pat/repl}`, up to `}`.
    ParamReplWith,
    Arithmetic(ArithKind),
    /// Inside `[[ ... ]]`.
    Test,
    /// Right-hand side of `=~`.
    TestRegexp,
    /// Heredoc body; `expand` is false for quoted delimiters.
    HeredocBody {
        delimiter: String,
        strip_tabs: bool,
        expand: bool,
    },
    /// Heredoc body reading to end of input (the `Document` entry point).
    HeredocToEof,
}

/// The mode-driven lexer. The parser owns mode pushes and pops.
pub struct Lexer<'a> {
    pub(crate) src: Source<'a>,
    modes: Vec<LexMode>,
    lang: LangVariant,
    /// Currently open backquote substitution depth.
    pub(crate) open_bquotes: u32,
    /// The previous token ended a word and nothing separates us from it.
    word_adjacent: bool,
    /// When set, a literal in command mode stops at `[` after a valid name
    /// so the parser can take over array-index parsing.
    pub(crate) scan_assign: bool,
    /// When set, a `[` starting a word in command mode becomes a token, so
    /// array elements like `[i]=v` can carry parsed indices.
    pub(crate) scan_array_elem: bool,
    /// Byte offset of the first `=` in the last `Lit` token, if any.
    pub(crate) lit_eq_offset: Option<usize>,
    /// Treat this literal at the start of a word as end of input.
    pub(crate) stop_at: Option<String>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: Source<'a>, lang: LangVariant) -> Self {
        Self {
            src,
            modes: vec![LexMode::Command],
            lang,
            open_bquotes: 0,
            word_adjacent: false,
            scan_assign: true,
            scan_array_elem: false,
            lit_eq_offset: None,
            stop_at: None,
        }
    }

    /// Consumes one rune directly, for the few places where the parser
    /// reads punctuation like `=` between tokens.
    pub(crate) fn bump(&mut self) -> Result<(), ParseError> {
        self.src.advance()
    }

    pub fn push_mode(&mut self, mode: LexMode) {
        self.modes.push(mode);
    }

    pub fn pop_mode(&mut self) {
        self.modes.pop();
    }

    pub fn mode(&self) -> &LexMode {
        self.modes.last().unwrap_or(&LexMode::Command)
    }

    pub fn cur_char(&self) -> Option<char> {
        self.src.cur()
    }

    pub fn pos(&self) -> Position {
        self.src.pos()
    }

    pub fn set_word_adjacent(&mut self, adjacent: bool) {
        self.word_adjacent = adjacent;
    }

    /// Pulls the next token under the current mode.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.lit_eq_offset = None;
        match self.mode().clone() {
            LexMode::Command => self.command_token(),
            LexMode::DoubleQuote => self.dquote_token(),
            LexMode::ParamName => self.param_name_token(),
            LexMode::ParamArg => self.param_arg_token(false),
            LexMode::ParamReplPattern => self.param_arg_token(true),
            LexMode::ParamReplWith => self.param_arg_token(false),
            LexMode::Arithmetic(kind) => self.arith_token(kind),
            LexMode::Test => self.test_token(),
            LexMode::TestRegexp => self.test_regexp_token(),
            LexMode::HeredocBody {
                delimiter,
                strip_tabs,
                expand,
            } => self.heredoc_token(Some(&delimiter), strip_tabs, expand),
            LexMode::HeredocToEof => self.heredoc_token(None, false, true),
        }
    }

    fn token(&self, token_type: TokenType, value: impl Into<String>, pos: Position, spaced: bool) -> Token {
        Token {
            token_type,
            value: value.into(),
            pos,
            end: self.src.pos(),
            spaced,
        }
    }

    /// Skips spaces, tabs and escaped newlines. Returns whether anything
    /// was skipped.
    fn skip_blank(&mut self) -> Result<bool, ParseError> {
        let mut skipped = false;
        loop {
            match self.src.cur() {
                Some(' ') | Some('\t') => {
                    self.src.advance()?;
                    skipped = true;
                }
                Some('\\') => {
                    if !self.src.followed_by("\n")? {
                        return Ok(skipped);
                    }
                    self.src.advance()?;
                    self.src.advance()?;
                }
                _ => return Ok(skipped),
            }
        }
    }

    // =========================================================================
    // COMMAND MODE
    // =========================================================================

    fn command_token(&mut self) -> Result<Token, ParseError> {
        let spaced = self.skip_blank()?;
        if spaced {
            self.word_adjacent = false;
        }
        let pos = self.src.pos();
        let Some(c) = self.src.cur() else {
            return Ok(self.token(TokenType::Eof, "", pos, spaced));
        };
        if !self.word_adjacent {
            if let Some(stop) = self.stop_at.clone() {
                if self.at_literal(&stop)? {
                    return Ok(self.token(TokenType::Eof, "", pos, spaced));
                }
            }
            if c == '#' {
                return self.comment_token(pos, spaced);
            }
        }
        if c == '[' && self.scan_array_elem && !self.word_adjacent {
            self.src.advance()?;
            return Ok(self.token(TokenType::LBracket, "[", pos, spaced));
        }
        let extglob_next =
            matches!(c, '?' | '*' | '+' | '@' | '!') && self.src.peek_byte(0)? == Some(b'(');
        let tok = match c {
            '\n' => {
                self.src.advance()?;
                self.word_adjacent = false;
                self.token(TokenType::Newline, "\n", pos, spaced)
            }
            ';' | '&' | '|' | '(' | ')' | '<' | '>' => {
                self.word_adjacent = false;
                self.operator_token(c, pos, spaced)?
            }
            '{' => {
                if let Some(tok) = self.fd_variable_token(pos, spaced)? {
                    tok
                } else {
                    let tok = self.lit_token(pos, spaced)?;
                    self.word_adjacent = true;
                    tok
                }
            }
            '$' => {
                let tok = self.dollar_token(pos, spaced, false)?;
                self.word_adjacent = true;
                tok
            }
            '\'' => {
                self.src.advance()?;
                self.word_adjacent = true;
                self.token(TokenType::SglQuote, "'", pos, spaced)
            }
            '"' => {
                self.src.advance()?;
                self.word_adjacent = true;
                self.token(TokenType::DblQuote, "\"", pos, spaced)
            }
            '`' => {
                self.word_adjacent = true;
                self.backquote_token(0, pos, spaced)?
            }
            '\\' => {
                if let Some(tok) = self.backslash_backquote_token(pos, spaced)? {
                    self.word_adjacent = true;
                    tok
                } else {
                    let tok = self.lit_token(pos, spaced)?;
                    self.word_adjacent = true;
                    tok
                }
            }
            '?' | '*' | '+' | '@' | '!' if extglob_next => {
                let tok = self.extglob_open_token(pos, spaced)?;
                self.word_adjacent = true;
                tok
            }
            _ => {
                let tok = self.lit_token(pos, spaced)?;
                self.word_adjacent = true;
                tok
            }
        };
        Ok(tok)
    }

    /// Whether the input at the current rune spells out `lit` exactly.
    fn at_literal(&mut self, lit: &str) -> Result<bool, ParseError> {
        let mut chars = lit.chars();
        let Some(first) = chars.next() else {
            return Ok(false);
        };
        if self.src.cur() != Some(first) {
            return Ok(false);
        }
        let rest: String = chars.collect();
        if rest.is_empty() {
            return Ok(true);
        }
        self.src.followed_by(&rest)
    }

    fn comment_token(&mut self, pos: Position, spaced: bool) -> Result<Token, ParseError> {
        self.src.advance()?;
        let mut text = String::new();
        while let Some(c) = self.src.cur() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.src.advance()?;
        }
        Ok(self.token(TokenType::Comment, text, pos, spaced))
    }

    fn operator_token(&mut self, c: char, pos: Position, spaced: bool) -> Result<Token, ParseError> {
        self.src.advance()?;
        let (token_type, value) = match c {
            ';' => match self.src.cur() {
                Some(';') => {
                    self.src.advance()?;
                    if self.src.cur() == Some('&') && self.lang.is_bash() {
                        self.src.advance()?;
                        (TokenType::SemiSemiAnd, ";;&")
                    } else {
                        (TokenType::DSemi, ";;")
                    }
                }
                Some('&') if self.lang.is_bash() || self.lang.is_mksh() => {
                    self.src.advance()?;
                    (TokenType::SemiAnd, ";&")
                }
                Some('|') if self.lang.is_mksh() => {
                    self.src.advance()?;
                    (TokenType::SemiPipe, ";|")
                }
                _ => (TokenType::Semicolon, ";"),
            },
            '&' => match self.src.cur() {
                Some('&') => {
                    self.src.advance()?;
                    (TokenType::AndAnd, "&&")
                }
                Some('>') => {
                    self.src.advance()?;
                    if self.src.cur() == Some('>') {
                        self.src.advance()?;
                        (TokenType::AndDGreat, "&>>")
                    } else {
                        (TokenType::AndGreat, "&>")
                    }
                }
                _ => (TokenType::Amp, "&"),
            },
            '|' => match self.src.cur() {
                Some('|') => {
                    self.src.advance()?;
                    (TokenType::OrOr, "||")
                }
                Some('&') if self.lang.is_bash() || self.lang.is_mksh() => {
                    self.src.advance()?;
                    (TokenType::PipeAmp, "|&")
                }
                _ => (TokenType::Pipe, "|"),
            },
            '(' => {
                if self.src.cur() == Some('(') {
                    self.src.advance()?;
                    (TokenType::DParenStart, "((")
                } else {
                    (TokenType::LParen, "(")
                }
            }
            ')' => (TokenType::RParen, ")"),
            '<' => match self.src.cur() {
                Some('<') => {
                    self.src.advance()?;
                    match self.src.cur() {
                        Some('<') => {
                            self.src.advance()?;
                            (TokenType::TLess, "<<<")
                        }
                        Some('-') => {
                            self.src.advance()?;
                            (TokenType::DLessDash, "<<-")
                        }
                        _ => (TokenType::DLess, "<<"),
                    }
                }
                Some('&') => {
                    self.src.advance()?;
                    (TokenType::LessAnd, "<&")
                }
                Some('>') => {
                    self.src.advance()?;
                    (TokenType::LessGreat, "<>")
                }
                Some('(') if self.lang.is_bash() => {
                    self.src.advance()?;
                    (TokenType::ProcSubIn, "<(")
                }
                _ => (TokenType::Less, "<"),
            },
            '>' => match self.src.cur() {
                Some('>') => {
                    self.src.advance()?;
                    (TokenType::DGreat, ">>")
                }
                Some('&') => {
                    self.src.advance()?;
                    (TokenType::GreatAnd, ">&")
                }
                Some('|') => {
                    self.src.advance()?;
                    (TokenType::Clobber, ">|")
                }
                Some('(') if self.lang.is_bash() => {
                    self.src.advance()?;
                    (TokenType::ProcSubOut, ">(")
                }
                _ => (TokenType::Great, ">"),
            },
            _ => unreachable!("operator_token called on non-operator"),
        };
        Ok(self.token(token_type, value, pos, spaced))
    }

    /// `{name}` directly before `<` or `>`, for Bash's automatic FD
    /// variables. Formed in every dialect; the parser gates it.
    fn fd_variable_token(&mut self, pos: Position, spaced: bool) -> Result<Option<Token>, ParseError> {
        let mut name = String::new();
        let mut i = 0;
        loop {
            match self.src.peek_byte(i)? {
                Some(b) if is_name_char(b as char) && b.is_ascii() => {
                    name.push(b as char);
                    i += 1;
                }
                Some(b'}') if !name.is_empty() => break,
                _ => return Ok(None),
            }
        }
        match self.src.peek_byte(i + 1)? {
            Some(b'<') | Some(b'>') => {}
            _ => return Ok(None),
        }
        // `{`, the name, and `}`.
        for _ in 0..name.chars().count() + 2 {
            self.src.advance()?;
        }
        Ok(Some(self.token(TokenType::FdVariable, name, pos, spaced)))
    }

    fn extglob_open_token(&mut self, pos: Position, spaced: bool) -> Result<Token, ParseError> {
        let c = self.src.cur().unwrap_or('@');
        self.src.advance()?;
        self.src.advance()?;
        Ok(self.token(TokenType::ExtGlob, format!("{c}("), pos, spaced))
    }

    /// Dollar dispatch, shared by every expanding mode.
    fn dollar_token(&mut self, pos: Position, spaced: bool, in_dquotes: bool) -> Result<Token, ParseError> {
        self.src.advance()?; // past '$'
        match self.src.cur() {
            Some('(') => {
                self.src.advance()?;
                if self.src.cur() == Some('(') {
                    self.src.advance()?;
                    Ok(self.token(TokenType::DollDblParen, "$((", pos, spaced))
                } else {
                    Ok(self.token(TokenType::DollParen, "$(", pos, spaced))
                }
            }
            Some('{') => {
                self.src.advance()?;
                Ok(self.token(TokenType::DollBrace, "${", pos, spaced))
            }
            Some('[') if self.lang.is_bash() && !in_dquotes => {
                self.src.advance()?;
                Ok(self.token(TokenType::DollBracket, "$[", pos, spaced))
            }
            Some('\'') if (self.lang.is_bash() || self.lang.is_mksh()) && !in_dquotes => {
                self.src.advance()?;
                Ok(self.token(TokenType::DollSglQuote, "$'", pos, spaced))
            }
            Some('"') if (self.lang.is_bash() || self.lang.is_mksh()) && !in_dquotes => {
                self.src.advance()?;
                Ok(self.token(TokenType::DollDblQuote, "$\"", pos, spaced))
            }
            Some(c) if c.is_ascii_digit() => {
                self.src.advance()?;
                Ok(self.token(TokenType::DollarName, c.to_string(), pos, spaced))
            }
            Some(c) if is_special_param(c) => {
                self.src.advance()?;
                Ok(self.token(TokenType::DollarName, c.to_string(), pos, spaced))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(c) = self.src.cur() {
                    if is_name_char(c) {
                        name.push(c);
                        self.src.advance()?;
                    } else {
                        break;
                    }
                }
                Ok(self.token(TokenType::DollarName, name, pos, spaced))
            }
            _ => Ok(self.token(TokenType::Dollar, "$", pos, spaced)),
        }
    }

    /// Number of backslashes needed before a backquote to open one more
    /// nesting level from depth `d`.
    fn bquote_open_escapes(d: u32) -> usize {
        (1usize << d) - 1
    }

    /// Number of backslashes needed before a backquote to close depth `d`.
    fn bquote_close_escapes(d: u32) -> usize {
        if d == 0 {
            usize::MAX
        } else {
            (1usize << (d - 1)) - 1
        }
    }

    /// Handles a bare backquote at token start. `n` is the number of
    /// backslashes already consumed before it.
    fn backquote_token(&mut self, n: usize, pos: Position, spaced: bool) -> Result<Token, ParseError> {
        let d = self.open_bquotes;
        if n == Self::bquote_close_escapes(d) {
            let quote_pos = self.src.pos();
            self.src.advance()?;
            return Ok(self.token(TokenType::BackQuoteEnd, "`", quote_pos, spaced));
        }
        if n == Self::bquote_open_escapes(d) {
            let quote_pos = self.src.pos();
            self.src.advance()?;
            return Ok(self.token(TokenType::BackQuote, "`", quote_pos, spaced));
        }
        // Neither an opener nor a closer at this depth: a literal backquote.
        self.src.advance()?;
        Ok(self.token(TokenType::Lit, "`", pos, spaced))
    }

    /// At a backslash in command-ish modes with open backquotes, checks
    /// whether a run of backslashes escapes a backquote open/close.
    fn backslash_backquote_token(&mut self, pos: Position, spaced: bool) -> Result<Option<Token>, ParseError> {
        if self.open_bquotes == 0 {
            return Ok(None);
        }
        let mut n = 1usize;
        loop {
            match self.src.peek_byte(n - 1)? {
                Some(b'\\') => n += 1,
                Some(b'`') => break,
                _ => return Ok(None),
            }
        }
        let d = self.open_bquotes;
        if n != Self::bquote_close_escapes(d) && n != Self::bquote_open_escapes(d) {
            return Ok(None);
        }
        for _ in 0..n {
            self.src.advance()?;
        }
        self.backquote_token(n, pos, spaced).map(Some)
    }

    /// Literal chunk in command mode. Raw text is kept, including escapes;
    /// the first top-level `=` byte offset is recorded for assignment
    /// splitting.
    fn lit_token(&mut self, pos: Position, spaced: bool) -> Result<Token, ParseError> {
        let mut value = String::new();
        let mut eq_offset: Option<usize> = None;
        loop {
            let Some(c) = self.src.cur() else { break };
            match c {
                ' ' | '\t' | '\n' | ';' | '&' | '|' | '<' | '>' | '(' | ')' | '\'' | '"' | '$' => {
                    break
                }
                '`' => break,
                '\\' => {
                    if self.open_bquotes > 0 && self.backslash_run_hits_backquote()? {
                        break;
                    }
                    if self.open_bquotes > 0 {
                        // Strip one escape layer for `\\` and `\$`.
                        match self.src.peek_byte(0)? {
                            Some(b'\\') | Some(b'$') => {
                                self.src.advance()?;
                                if let Some(c2) = self.src.cur() {
                                    value.push(c2);
                                    self.src.advance()?;
                                }
                                continue;
                            }
                            _ => {}
                        }
                    }
                    value.push('\\');
                    self.src.advance()?;
                    if let Some(c2) = self.src.cur() {
                        value.push(c2);
                        self.src.advance()?;
                    }
                    continue;
                }
                '?' | '*' | '+' | '@' | '!' => {
                    if self.src.peek_byte(0)? == Some(b'(') {
                        break;
                    }
                    value.push(c);
                    self.src.advance()?;
                    continue;
                }
                '[' => {
                    // Array indices are parsed on the main stream in the
                    // dialects that have arrays; POSIX keeps `[` literal.
                    if self.scan_assign
                        && !self.lang.is_posix()
                        && !value.is_empty()
                        && crate::parser::types::valid_name(&value)
                    {
                        break;
                    }
                    value.push(c);
                    self.src.advance()?;
                    continue;
                }
                '=' => {
                    if eq_offset.is_none() {
                        eq_offset = Some(value.len());
                    }
                    value.push(c);
                    self.src.advance()?;
                    continue;
                }
                _ => {
                    value.push(c);
                    self.src.advance()?;
                    continue;
                }
            }
        }
        self.lit_eq_offset = eq_offset;
        Ok(self.token(TokenType::Lit, value, pos, spaced))
    }

    fn backslash_run_hits_backquote(&mut self) -> Result<bool, ParseError> {
        let mut n = 1usize;
        loop {
            match self.src.peek_byte(n - 1)? {
                Some(b'\\') => n += 1,
                Some(b'`') => {
                    let d = self.open_bquotes;
                    return Ok(n == Self::bquote_close_escapes(d)
                        || n == Self::bquote_open_escapes(d));
                }
                _ => return Ok(false),
            }
        }
    }

    // =========================================================================
    // DOUBLE QUOTES
    // =========================================================================

    fn dquote_token(&mut self) -> Result<Token, ParseError> {
        let pos = self.src.pos();
        let Some(c) = self.src.cur() else {
            return Ok(self.token(TokenType::Eof, "", pos, false));
        };
        if c == '\\' && self.backslash_backquote_token_applies()? {
            if let Some(tok) = self.backslash_backquote_token(pos, false)? {
                return Ok(tok);
            }
        }
        match c {
            '"' => {
                self.src.advance()?;
                Ok(self.token(TokenType::DblQuote, "\"", pos, false))
            }
            '$' => self.dollar_token(pos, false, true),
            '`' => self.backquote_token(0, pos, false),
            _ => self.dquote_lit(pos),
        }
    }

    fn backslash_backquote_token_applies(&mut self) -> Result<bool, ParseError> {
        if self.open_bquotes == 0 || self.src.cur() != Some('\\') {
            return Ok(false);
        }
        self.backslash_run_hits_backquote()
    }

    fn dquote_lit(&mut self, pos: Position) -> Result<Token, ParseError> {
        let mut value = String::new();
        loop {
            let Some(c) = self.src.cur() else { break };
            match c {
                '"' | '$' | '`' => break,
                '\\' => {
                    if self.open_bquotes > 0 && self.backslash_run_hits_backquote()? {
                        break;
                    }
                    value.push('\\');
                    self.src.advance()?;
                    if let Some(c2) = self.src.cur() {
                        value.push(c2);
                        self.src.advance()?;
                    }
                }
                _ => {
                    value.push(c);
                    self.src.advance()?;
                }
            }
        }
        Ok(self.token(TokenType::Lit, value, pos, false))
    }

    // =========================================================================
    // PARAMETER EXPANSION
    // =========================================================================

    fn param_name_token(&mut self) -> Result<Token, ParseError> {
        let pos = self.src.pos();
        let Some(c) = self.src.cur() else {
            return Ok(self.token(TokenType::Eof, "", pos, false));
        };
        // Name or digit run.
        if c.is_alphanumeric() || c == '_' {
            let mut value = String::new();
            while let Some(c) = self.src.cur() {
                if c.is_alphanumeric() || c == '_' {
                    value.push(c);
                    self.src.advance()?;
                } else {
                    break;
                }
            }
            return Ok(self.token(TokenType::Lit, value, pos, false));
        }
        let two = |a: TokenType, b: TokenType| (a, b);
        let (single, double) = match c {
            '}' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::RBrace, "}", pos, false));
            }
            '#' => two(TokenType::Hash, TokenType::DblHash),
            '%' => two(TokenType::Percent, TokenType::DblPercent),
            '/' => two(TokenType::Slash, TokenType::DblSlash),
            '^' => two(TokenType::Caret, TokenType::DblCaret),
            ',' => two(TokenType::Comma, TokenType::DblComma),
            ':' => {
                self.src.advance()?;
                let (t, v) = match self.src.cur() {
                    Some('-') => (TokenType::ColonMinus, ":-"),
                    Some('=') => (TokenType::ColonEq, ":="),
                    Some('?') => (TokenType::ColonQuest, ":?"),
                    Some('+') => (TokenType::ColonPlus, ":+"),
                    _ => return Ok(self.token(TokenType::Colon, ":", pos, false)),
                };
                self.src.advance()?;
                return Ok(self.token(t, v, pos, false));
            }
            '-' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Minus, "-", pos, false));
            }
            '=' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Assign, "=", pos, false));
            }
            '?' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Quest, "?", pos, false));
            }
            '+' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Plus, "+", pos, false));
            }
            '!' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Excl, "!", pos, false));
            }
            '@' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::At, "@", pos, false));
            }
            '*' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Star, "*", pos, false));
            }
            '$' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Dollar, "$", pos, false));
            }
            '[' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::LBracket, "[", pos, false));
            }
            ']' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::RBracket, "]", pos, false));
            }
            ';' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Semicolon, ";", pos, false));
            }
            '\'' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::SglQuote, "'", pos, false));
            }
            '"' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::DblQuote, "\"", pos, false));
            }
            ' ' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Lit, " ", pos, true));
            }
            '|' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Pipe, "|", pos, false));
            }
            '<' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Less, "<", pos, false));
            }
            '>' => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Great, ">", pos, false));
            }
            other => {
                self.src.advance()?;
                return Ok(self.token(TokenType::Lit, other.to_string(), pos, false));
            }
        };
        self.src.advance()?;
        if self.src.cur() == Some(c) {
            self.src.advance()?;
            let value = format!("{c}{c}");
            Ok(self.token(double, value, pos, false))
        } else {
            Ok(self.token(single, c.to_string(), pos, false))
        }
    }

    /// Word-part token inside a `${...}` operator argument.
    fn param_arg_token(&mut self, stop_slash: bool) -> Result<Token, ParseError> {
        let pos = self.src.pos();
        let Some(c) = self.src.cur() else {
            return Ok(self.token(TokenType::Eof, "", pos, false));
        };
        match c {
            '}' => {
                self.src.advance()?;
                Ok(self.token(TokenType::RBrace, "}", pos, false))
            }
            '/' if stop_slash => {
                self.src.advance()?;
                Ok(self.token(TokenType::Slash, "/", pos, false))
            }
            '$' => self.dollar_token(pos, false, false),
            '`' => self.backquote_token(0, pos, false),
            '\'' => {
                self.src.advance()?;
                Ok(self.token(TokenType::SglQuote, "'", pos, false))
            }
            '"' => {
                self.src.advance()?;
                Ok(self.token(TokenType::DblQuote, "\"", pos, false))
            }
            _ => {
                let mut value = String::new();
                loop {
                    let Some(c) = self.src.cur() else { break };
                    match c {
                        '}' | '$' | '`' | '\'' | '"' => break,
                        '/' if stop_slash => break,
                        '\\' => {
                            value.push('\\');
                            self.src.advance()?;
                            if let Some(c2) = self.src.cur() {
                                value.push(c2);
                                self.src.advance()?;
                            }
                        }
                        _ => {
                            value.push(c);
                            self.src.advance()?;
                        }
                    }
                }
                Ok(self.token(TokenType::Lit, value, pos, false))
            }
        }
    }

    // =========================================================================
    // ARITHMETIC
    // =========================================================================

    fn arith_token(&mut self, kind: ArithKind) -> Result<Token, ParseError> {
        let mut spaced = self.skip_blank()?;
        // Newlines are blanks inside arithmetic, except for `let`, which a
        // newline terminates.
        while kind != ArithKind::Let && self.src.cur() == Some('\n') {
            self.src.advance()?;
            spaced = true;
            self.skip_blank()?;
        }
        let pos = self.src.pos();
        let Some(c) = self.src.cur() else {
            return Ok(self.token(TokenType::Eof, "", pos, spaced));
        };
        macro_rules! tok {
            ($t:expr, $v:expr) => {
                Ok(self.token($t, $v, pos, spaced))
            };
        }
        match c {
            '\n' => {
                // Only reached under `let`.
                self.src.advance()?;
                tok!(TokenType::Newline, "\n")
            }
            '+' => {
                self.src.advance()?;
                match self.src.cur() {
                    Some('+') => {
                        self.src.advance()?;
                        tok!(TokenType::Inc, "++")
                    }
                    Some('=') => {
                        self.src.advance()?;
                        tok!(TokenType::PlusAssign, "+=")
                    }
                    _ => tok!(TokenType::Plus, "+"),
                }
            }
            '-' => {
                self.src.advance()?;
                match self.src.cur() {
                    Some('-') => {
                        self.src.advance()?;
                        tok!(TokenType::Dec, "--")
                    }
                    Some('=') => {
                        self.src.advance()?;
                        tok!(TokenType::MinusAssign, "-=")
                    }
                    _ => tok!(TokenType::Minus, "-"),
                }
            }
            '*' => {
                self.src.advance()?;
                match self.src.cur() {
                    Some('*') => {
                        self.src.advance()?;
                        tok!(TokenType::Power, "**")
                    }
                    Some('=') => {
                        self.src.advance()?;
                        tok!(TokenType::StarAssign, "*=")
                    }
                    _ => tok!(TokenType::Star, "*"),
                }
            }
            '/' => {
                self.src.advance()?;
                if self.src.cur() == Some('=') {
                    self.src.advance()?;
                    tok!(TokenType::SlashAssign, "/=")
                } else {
                    tok!(TokenType::Slash, "/")
                }
            }
            '%' => {
                self.src.advance()?;
                if self.src.cur() == Some('=') {
                    self.src.advance()?;
                    tok!(TokenType::PercentAssign, "%=")
                } else {
                    tok!(TokenType::Percent, "%")
                }
            }
            '<' => {
                self.src.advance()?;
                match self.src.cur() {
                    Some('<') => {
                        self.src.advance()?;
                        if self.src.cur() == Some('=') {
                            self.src.advance()?;
                            tok!(TokenType::ShlAssign, "<<=")
                        } else {
                            tok!(TokenType::Shl, "<<")
                        }
                    }
                    Some('=') => {
                        self.src.advance()?;
                        tok!(TokenType::LessEq, "<=")
                    }
                    _ => tok!(TokenType::Less, "<"),
                }
            }
            '>' => {
                self.src.advance()?;
                match self.src.cur() {
                    Some('>') => {
                        self.src.advance()?;
                        if self.src.cur() == Some('=') {
                            self.src.advance()?;
                            tok!(TokenType::ShrAssign, ">>=")
                        } else {
                            tok!(TokenType::Shr, ">>")
                        }
                    }
                    Some('=') => {
                        self.src.advance()?;
                        tok!(TokenType::GreatEq, ">=")
                    }
                    _ => tok!(TokenType::Great, ">"),
                }
            }
            '=' => {
                self.src.advance()?;
                if self.src.cur() == Some('=') {
                    self.src.advance()?;
                    tok!(TokenType::EqEq, "==")
                } else {
                    tok!(TokenType::Assign, "=")
                }
            }
            '!' => {
                self.src.advance()?;
                if self.src.cur() == Some('=') {
                    self.src.advance()?;
                    tok!(TokenType::NotEq, "!=")
                } else {
                    tok!(TokenType::Excl, "!")
                }
            }
            '&' => {
                self.src.advance()?;
                match self.src.cur() {
                    Some('&') => {
                        self.src.advance()?;
                        tok!(TokenType::AndAnd, "&&")
                    }
                    Some('=') => {
                        self.src.advance()?;
                        tok!(TokenType::AmpAssign, "&=")
                    }
                    _ => tok!(TokenType::Amp, "&"),
                }
            }
            '|' => {
                self.src.advance()?;
                match self.src.cur() {
                    Some('|') => {
                        self.src.advance()?;
                        tok!(TokenType::OrOr, "||")
                    }
                    Some('=') => {
                        self.src.advance()?;
                        tok!(TokenType::PipeAssign, "|=")
                    }
                    _ => tok!(TokenType::Pipe, "|"),
                }
            }
            '^' => {
                self.src.advance()?;
                if self.src.cur() == Some('=') {
                    self.src.advance()?;
                    tok!(TokenType::CaretAssign, "^=")
                } else {
                    tok!(TokenType::Caret, "^")
                }
            }
            '~' => {
                self.src.advance()?;
                tok!(TokenType::Tilde, "~")
            }
            '?' => {
                self.src.advance()?;
                tok!(TokenType::Quest, "?")
            }
            ':' => {
                self.src.advance()?;
                tok!(TokenType::Colon, ":")
            }
            ',' => {
                self.src.advance()?;
                tok!(TokenType::Comma, ",")
            }
            '(' => {
                self.src.advance()?;
                tok!(TokenType::LParen, "(")
            }
            ')' => {
                self.src.advance()?;
                tok!(TokenType::RParen, ")")
            }
            '[' => {
                self.src.advance()?;
                tok!(TokenType::LBracket, "[")
            }
            ']' => {
                self.src.advance()?;
                tok!(TokenType::RBracket, "]")
            }
            '}' => {
                self.src.advance()?;
                tok!(TokenType::RBrace, "}")
            }
            ';' => {
                self.src.advance()?;
                tok!(TokenType::Semicolon, ";")
            }
            '$' => self.dollar_token(pos, spaced, false),
            '`' => self.backquote_token(0, pos, spaced),
            '\'' => {
                self.src.advance()?;
                tok!(TokenType::SglQuote, "'")
            }
            '"' => {
                self.src.advance()?;
                tok!(TokenType::DblQuote, "\"")
            }
            '\\' => {
                if let Some(t) = self.backslash_backquote_token(pos, spaced)? {
                    return Ok(t);
                }
                let value = self.arith_lit_chunk()?;
                tok!(TokenType::Lit, value)
            }
            c if c.is_alphanumeric() || matches!(c, '_' | '#' | '@' | '.') => {
                let value = self.arith_lit_chunk()?;
                tok!(TokenType::Lit, value)
            }
            other => {
                self.src.advance()?;
                tok!(TokenType::Lit, other.to_string())
            }
        }
    }

    /// Arithmetic literal run: names, numbers (including `2#101` base
    /// notation), and backslash escapes, which join the run.
    fn arith_lit_chunk(&mut self) -> Result<String, ParseError> {
        let mut value = String::new();
        loop {
            let Some(c) = self.src.cur() else { break };
            if c.is_alphanumeric() || matches!(c, '_' | '#' | '@' | '.') {
                value.push(c);
                self.src.advance()?;
            } else if c == '\\' {
                if self.open_bquotes > 0 && self.backslash_run_hits_backquote()? {
                    break;
                }
                value.push('\\');
                self.src.advance()?;
                if let Some(c2) = self.src.cur() {
                    value.push(c2);
                    self.src.advance()?;
                }
            } else {
                break;
            }
        }
        Ok(value)
    }

    // =========================================================================
    // TEST CLAUSES
    // =========================================================================

    fn test_token(&mut self) -> Result<Token, ParseError> {
        let spaced = self.skip_blank()?;
        let pos = self.src.pos();
        let Some(c) = self.src.cur() else {
            return Ok(self.token(TokenType::Eof, "", pos, spaced));
        };
        let extglob_next =
            matches!(c, '?' | '*' | '+' | '@' | '!') && self.src.peek_byte(0)? == Some(b'(');
        match c {
            '\n' => {
                self.src.advance()?;
                Ok(self.token(TokenType::Newline, "\n", pos, spaced))
            }
            '&' => {
                self.src.advance()?;
                if self.src.cur() == Some('&') {
                    self.src.advance()?;
                    Ok(self.token(TokenType::AndAnd, "&&", pos, spaced))
                } else {
                    Ok(self.token(TokenType::Amp, "&", pos, spaced))
                }
            }
            '|' => {
                self.src.advance()?;
                if self.src.cur() == Some('|') {
                    self.src.advance()?;
                    Ok(self.token(TokenType::OrOr, "||", pos, spaced))
                } else {
                    Ok(self.token(TokenType::Pipe, "|", pos, spaced))
                }
            }
            '(' => {
                self.src.advance()?;
                Ok(self.token(TokenType::LParen, "(", pos, spaced))
            }
            ')' => {
                self.src.advance()?;
                Ok(self.token(TokenType::RParen, ")", pos, spaced))
            }
            '<' => {
                self.src.advance()?;
                Ok(self.token(TokenType::Less, "<", pos, spaced))
            }
            '>' => {
                self.src.advance()?;
                Ok(self.token(TokenType::Great, ">", pos, spaced))
            }
            ';' => {
                self.src.advance()?;
                Ok(self.token(TokenType::Semicolon, ";", pos, spaced))
            }
            '\'' => {
                self.src.advance()?;
                Ok(self.token(TokenType::SglQuote, "'", pos, spaced))
            }
            '"' => {
                self.src.advance()?;
                Ok(self.token(TokenType::DblQuote, "\"", pos, spaced))
            }
            '$' => self.dollar_token(pos, spaced, false),
            '`' => self.backquote_token(0, pos, spaced),
            '?' | '*' | '+' | '@' | '!' if extglob_next => self.extglob_open_token(pos, spaced),
            _ => {
                let mut value = String::new();
                loop {
                    let Some(c) = self.src.cur() else { break };
                    match c {
                        ' ' | '\t' | '\n' | '&' | '|' | '(' | ')' | '<' | '>' | ';' | '\''
                        | '"' | '$' | '`' => break,
                        '?' | '*' | '+' | '@' | '!' => {
                            if self.src.peek_byte(0)? == Some(b'(') {
                                break;
                            }
                            value.push(c);
                            self.src.advance()?;
                        }
                        '\\' => {
                            value.push('\\');
                            self.src.advance()?;
                            if let Some(c2) = self.src.cur() {
                                value.push(c2);
                                self.src.advance()?;
                            }
                        }
                        _ => {
                            value.push(c);
                            self.src.advance()?;
                        }
                    }
                }
                Ok(self.token(TokenType::Lit, value, pos, spaced))
            }
        }
    }

    /// Right-hand side of `=~`: parentheses nest inside the literal, and
    /// whitespace only ends it at depth zero.
    fn test_regexp_token(&mut self) -> Result<Token, ParseError> {
        let spaced = self.skip_blank()?;
        let pos = self.src.pos();
        let Some(c) = self.src.cur() else {
            return Ok(self.token(TokenType::Eof, "", pos, spaced));
        };
        match c {
            '\n' => {
                self.src.advance()?;
                Ok(self.token(TokenType::Newline, "\n", pos, spaced))
            }
            ';' => {
                self.src.advance()?;
                Ok(self.token(TokenType::Semicolon, ";", pos, spaced))
            }
            ')' => {
                self.src.advance()?;
                Ok(self.token(TokenType::RParen, ")", pos, spaced))
            }
            '&' => {
                self.src.advance()?;
                if self.src.cur() == Some('&') {
                    self.src.advance()?;
                    Ok(self.token(TokenType::AndAnd, "&&", pos, spaced))
                } else {
                    Ok(self.token(TokenType::Amp, "&", pos, spaced))
                }
            }
            '|' => {
                self.src.advance()?;
                if self.src.cur() == Some('|') {
                    self.src.advance()?;
                    Ok(self.token(TokenType::OrOr, "||", pos, spaced))
                } else {
                    Ok(self.token(TokenType::Pipe, "|", pos, spaced))
                }
            }
            '\'' => {
                self.src.advance()?;
                Ok(self.token(TokenType::SglQuote, "'", pos, spaced))
            }
            '"' => {
                self.src.advance()?;
                Ok(self.token(TokenType::DblQuote, "\"", pos, spaced))
            }
            '$' => self.dollar_token(pos, spaced, false),
            '`' => self.backquote_token(0, pos, spaced),
            _ => {
                let mut value = String::new();
                let mut depth = 0u32;
                loop {
                    let Some(c) = self.src.cur() else { break };
                    match c {
                        ' ' | '\t' | '\n' | ';' | '&' | '|' if depth == 0 => break,
                        ')' if depth == 0 => break,
                        '\'' | '"' | '$' | '`' => break,
                        '(' => {
                            depth += 1;
                            value.push(c);
                            self.src.advance()?;
                        }
                        ')' => {
                            depth = depth.saturating_sub(1);
                            value.push(c);
                            self.src.advance()?;
                        }
                        '\\' => {
                            value.push('\\');
                            self.src.advance()?;
                            if let Some(c2) = self.src.cur() {
                                value.push(c2);
                                self.src.advance()?;
                            }
                        }
                        _ => {
                            value.push(c);
                            self.src.advance()?;
                        }
                    }
                }
                Ok(self.token(TokenType::Lit, value, pos, spaced))
            }
        }
    }

    // =========================================================================
    // HEREDOC BODIES
    // =========================================================================

    fn heredoc_token(
        &mut self,
        delimiter: Option<&str>,
        strip_tabs: bool,
        expand: bool,
    ) -> Result<Token, ParseError> {
        let pos = self.src.pos();
        if self.at_heredoc_line_start() {
            if let Some(tok) = self.heredoc_delim_check(delimiter, strip_tabs, pos)? {
                return Ok(tok);
            }
        }
        let Some(c) = self.src.cur() else {
            return Ok(self.token(TokenType::Eof, "", pos, false));
        };
        if expand {
            if c == '\\' && self.backslash_backquote_token_applies()? {
                if let Some(tok) = self.backslash_backquote_token(pos, false)? {
                    return Ok(tok);
                }
            }
            match c {
                '$' => return self.dollar_token(pos, false, true),
                '`' => return self.backquote_token(0, pos, false),
                _ => {}
            }
        }
        // Literal run; accumulates across lines, checking for the delimiter
        // after every real newline.
        let mut value = String::new();
        loop {
            let Some(c) = self.src.cur() else { break };
            match c {
                '\n' => {
                    value.push('\n');
                    self.src.advance()?;
                    if self.heredoc_delim_ahead(delimiter, strip_tabs)? {
                        break;
                    }
                }
                '$' | '`' if expand => break,
                '\\' if expand => {
                    if self.open_bquotes > 0 && self.backslash_run_hits_backquote()? {
                        break;
                    }
                    value.push('\\');
                    self.src.advance()?;
                    if let Some(c2) = self.src.cur() {
                        value.push(c2);
                        self.src.advance()?;
                    }
                }
                _ => {
                    value.push(c);
                    self.src.advance()?;
                }
            }
        }
        Ok(self.token(TokenType::Lit, value, pos, false))
    }

    fn at_heredoc_line_start(&self) -> bool {
        self.src.pos().col == 1
    }

    /// At a line start, consumes tabs when stripping and returns the end
    /// token if the line equals the delimiter.
    fn heredoc_delim_check(
        &mut self,
        delimiter: Option<&str>,
        strip_tabs: bool,
        pos: Position,
    ) -> Result<Option<Token>, ParseError> {
        let Some(delim) = delimiter else {
            return Ok(None);
        };
        if strip_tabs {
            while self.src.cur() == Some('\t') {
                self.src.advance()?;
            }
        }
        let line = self.src.peek_line()?;
        if line == delim.as_bytes() && self.src.cur().is_some() {
            for _ in 0..delim.chars().count() {
                self.src.advance()?;
            }
            if self.src.cur() == Some('\n') {
                self.src.advance()?;
            }
            return Ok(Some(self.token(TokenType::HeredocEnd, delim, pos, false)));
        }
        Ok(None)
    }

    /// After consuming a newline mid-literal, checks whether the upcoming
    /// line is the delimiter, without consuming anything; the next call
    /// handles consumption from the line start.
    fn heredoc_delim_ahead(
        &mut self,
        delimiter: Option<&str>,
        strip_tabs: bool,
    ) -> Result<bool, ParseError> {
        let Some(delim) = delimiter else {
            return Ok(false);
        };
        let line = self.src.peek_line()?;
        let mut line = line.as_slice();
        if strip_tabs {
            while line.first() == Some(&b'\t') {
                line = &line[1..];
            }
        }
        Ok(line == delim.as_bytes() && self.src.cur().is_some())
    }

    // =========================================================================
    // RAW SCAN HELPERS
    // =========================================================================

    /// Scans a single-quoted string after its opening quote. A `None` end
    /// position means the input ran out before the closing quote.
    pub fn scan_single_quote(&mut self) -> Result<(String, Option<Position>), ParseError> {
        let mut value = String::new();
        loop {
            match self.src.cur() {
                Some('\'') => {
                    self.src.advance()?;
                    return Ok((value, Some(self.src.pos())));
                }
                Some(c) => {
                    value.push(c);
                    self.src.advance()?;
                }
                None => return Ok((value, None)),
            }
        }
    }

    /// Scans an ANSI-C `$'...'` string after the opening `$'`. The value is
    /// kept raw; `\'` and `\\` do not close the string. A `None` end
    /// position means the input ran out before the closing quote.
    pub fn scan_ansi_quote(&mut self) -> Result<(String, Option<Position>), ParseError> {
        let mut value = String::new();
        loop {
            match self.src.cur() {
                Some('\'') => {
                    self.src.advance()?;
                    return Ok((value, Some(self.src.pos())));
                }
                Some('\\') => {
                    value.push('\\');
                    self.src.advance()?;
                    if let Some(c) = self.src.cur() {
                        value.push(c);
                        self.src.advance()?;
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.src.advance()?;
                }
                None => return Ok((value, None)),
            }
        }
    }

    /// Scans an extended glob pattern after its `x(` opener, up to and past
    /// the matching `)`. Inner parentheses nest. A `None` end position
    /// means the input ran out before the closing parenthesis.
    pub fn scan_extglob(&mut self) -> Result<(String, Option<Position>), ParseError> {
        let mut value = String::new();
        let mut depth = 0u32;
        loop {
            match self.src.cur() {
                Some(')') if depth == 0 => {
                    self.src.advance()?;
                    return Ok((value, Some(self.src.pos())));
                }
                Some(c) => {
                    match c {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    value.push(c);
                    self.src.advance()?;
                }
                None => return Ok((value, None)),
            }
        }
    }

    /// Computes the span of a slice of a `Lit` token's value, walking runes
    /// from the token start. Used to split assignments like `a=b`.
    pub fn lit_sub_span(token: &Token, from: usize, to: usize) -> Span {
        let mut pos = token.pos;
        let mut start = token.pos;
        for (i, ch) in token.value.char_indices() {
            if i == from {
                start = pos;
            }
            if i >= to {
                break;
            }
            pos.offset = pos.offset.saturating_add(ch.len_utf8() as u32);
            if ch == '\n' {
                pos.line += 1;
                pos.col = 1;
            } else {
                pos.col += 1;
            }
        }
        if from >= token.value.len() {
            start = pos;
        }
        Span::new(start, pos)
    }
}
