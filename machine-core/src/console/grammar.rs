#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for console lines.
//!
//! `regal` turns a line into a bounded token stream and `winnow` combinators
//! walk the catalog grammar over those tokens.

use super::catalog::{self, CommandTag, Node};
use crate::actuators::ActuatorId;
use core::fmt;
use core::ops::Range;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

/// Maximum number of tokens accepted on one console line.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Keyword or argument; matched case-insensitively by the parser.
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Ident,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Anything the console does not understand.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token with its byte span in the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    TooManyTokens { processed: usize },
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "line too long after {processed} tokens")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: &'a str,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownCommand {
        name: &'a str,
    },
    UnknownActuator {
        name: &'a str,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected, found, ..
            } => write!(f, "expected {expected}, found `{found}`"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "missing {expected}")
            }
            GrammarErrorKind::UnknownCommand { name } => {
                write!(f, "unknown command `{name}` (try `help`)")
            }
            GrammarErrorKind::UnknownActuator { name } => {
                write!(f, "unknown solenoid `{name}` (expected a, b or c)")
            }
            GrammarErrorKind::InvalidToken { lexeme, .. } => {
                write!(f, "unsupported character `{lexeme}`")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) if tok.kind != TokenKind::Eol => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: tok.lexeme,
                    span: tok.span.clone(),
                },
                _ => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn unknown_command(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::UnknownCommand { name: token.lexeme },
        }
    }

    fn unknown_actuator(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::UnknownActuator { name: token.lexeme },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    /// Blank line; front ends usually just reprint the prompt.
    Empty,
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => f.write_str("empty command"),
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Parsed console command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Stop,
    EmergencyStop,
    Toggle(ActuatorId),
    Status,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(
            &mut buffer,
            Token {
                kind: record.token,
                lexeme,
                span,
            },
        )?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(
            &mut buffer,
            Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            },
        )?;
    }

    Ok(buffer)
}

fn push_token<'a>(buffer: &mut TokenBuffer<'a>, token: Token<'a>) -> Result<(), LexError> {
    buffer.push(token).map_err(|_| LexError::TooManyTokens {
        processed: MAX_TOKENS + 1,
    })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }
    if tokens.iter().all(|token| token.kind == TokenKind::Eol) {
        return Err(ParseError::Empty);
    }

    let mut input = tokens.as_slice();
    let parsed = command().parse_next(&mut input).map_err(|error| match error {
        ErrMode::Backtrack(err) | ErrMode::Cut(err) => ParseError::Grammar(err),
        ErrMode::Incomplete(_) => {
            ParseError::Grammar(GrammarError::unexpected("token", input.first()))
        }
    })?;

    if let Some(token) = input.iter().find(|token| token.kind != TokenKind::Eol) {
        return Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(token),
        )));
    }

    Ok(parsed)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let keyword = expect_kind(TokenKind::Ident, "command").parse_next(input)?;
        let Some(spec) = catalog::find(keyword.lexeme) else {
            return Err(ErrMode::Cut(GrammarError::unknown_command(&keyword)));
        };

        let mut state = CommandState::new(spec.tag);
        parse_node(spec.grammar, input, &mut state)?;
        state.finish()
    }
}

fn parse_node<'src, 'slice>(
    node: &'static Node,
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match node {
        Node::End => Ok(()),
        Node::Actuator { next } => {
            let token = expect_kind(TokenKind::Ident, "solenoid").parse_next(input)?;
            let id = ActuatorId::from_name(token.lexeme)
                .ok_or_else(|| ErrMode::Cut(GrammarError::unknown_actuator(&token)))?;
            state.set_actuator(id);
            parse_node(next, input, state)
        }
        Node::Topic { next } => {
            if let Some((token, rest)) = input.split_first() {
                if token.kind == TokenKind::Ident {
                    state.set_topic(token.lexeme);
                    *input = rest;
                }
            }
            parse_node(next, input, state)
        }
    }
}

enum CommandState<'a> {
    Start,
    Stop,
    EmergencyStop,
    Toggle { actuator: Option<ActuatorId> },
    Status,
    Help { topic: Option<&'a str> },
}

impl<'a> CommandState<'a> {
    fn new(tag: CommandTag) -> Self {
        match tag {
            CommandTag::Start => CommandState::Start,
            CommandTag::Stop => CommandState::Stop,
            CommandTag::EmergencyStop => CommandState::EmergencyStop,
            CommandTag::Toggle => CommandState::Toggle { actuator: None },
            CommandTag::Status => CommandState::Status,
            CommandTag::Help => CommandState::Help { topic: None },
        }
    }

    fn set_actuator(&mut self, id: ActuatorId) {
        if let CommandState::Toggle { actuator } = self {
            *actuator = Some(id);
        }
    }

    fn set_topic(&mut self, name: &'a str) {
        if let CommandState::Help { topic } = self {
            *topic = Some(name);
        }
    }

    fn finish(self) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
        match self {
            CommandState::Start => Ok(Command::Start),
            CommandState::Stop => Ok(Command::Stop),
            CommandState::EmergencyStop => Ok(Command::EmergencyStop),
            CommandState::Toggle {
                actuator: Some(id),
            } => Ok(Command::Toggle(id)),
            CommandState::Toggle { actuator: None } => Err(ErrMode::Backtrack(
                GrammarError::unexpected("solenoid", None),
            )),
            CommandState::Status => Ok(Command::Status),
            CommandState::Help { topic } => Ok(Command::Help(HelpCommand { topic })),
        }
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        other => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            other.map(|(token, _)| token),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_run_control() {
        assert_eq!(parse_ok("start"), Command::Start);
        assert_eq!(parse_ok("stop\n"), Command::Stop);
        assert_eq!(parse_ok("  estop  "), Command::EmergencyStop);
    }

    #[test]
    fn parses_toggle_target() {
        assert_eq!(parse_ok("toggle b"), Command::Toggle(ActuatorId::B));
        assert_eq!(parse_ok("TOGGLE C\r\n"), Command::Toggle(ActuatorId::C));
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(
            parse_ok("help toggle"),
            Command::Help(HelpCommand {
                topic: Some("toggle"),
            })
        );
        assert_eq!(parse_ok("help"), Command::Help(HelpCommand { topic: None }));
    }

    #[test]
    fn toggle_requires_known_solenoid() {
        match parse("toggle") {
            Err(ParseError::Grammar(err)) => assert_eq!(
                err.kind,
                GrammarErrorKind::UnexpectedEnd {
                    expected: "solenoid"
                }
            ),
            other => panic!("unexpected result: {other:?}"),
        }
        match parse("toggle d") {
            Err(ParseError::Grammar(err)) => {
                assert_eq!(err.kind, GrammarErrorKind::UnknownActuator { name: "d" });
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_command_and_trailing_words() {
        assert!(matches!(
            parse("launch"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnknownCommand { name: "launch" }
            }))
        ));
        assert!(matches!(
            parse("start now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken { found: "now", .. }
            }))
        ));
    }

    #[test]
    fn blank_line_is_empty() {
        assert_eq!(parse("   \n"), Err(ParseError::Empty));
        assert_eq!(parse(""), Err(ParseError::Empty));
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("toggle a!").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "!");
        assert!(matches!(
            parse("toggle a!"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::InvalidToken { .. }
            }))
        ));
    }
}
