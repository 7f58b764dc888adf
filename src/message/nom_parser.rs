//! Nom-based line splitter.
//!
//! Splits one protocol line into its optional prefix marker, the header
//! string and the trailing body. Tokenizing the header and interpreting the
//! tokens happens in [`super::event`].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::char,
    combinator::{opt, rest},
    error::{context, VerboseError},
    sequence::preceded,
    IResult,
};

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// The body delimiter, a space followed by a colon.
const BODY_DELIMITER: &str = " :";

/// Parse the leading `:` that marks a sender token.
fn parse_prefix_marker(input: &str) -> ParseResult<&str, Option<char>> {
    context("parsing prefix marker", opt(char(':')))(input)
}

/// Parse everything up to the body delimiter, or the whole line.
fn parse_header(input: &str) -> ParseResult<&str, &str> {
    context("parsing header", alt((take_until(BODY_DELIMITER), rest)))(input)
}

/// Parse the trailing body after the first body delimiter.
fn parse_body(input: &str) -> ParseResult<&str, Option<&str>> {
    context(
        "parsing trailing body",
        opt(preceded(tag(BODY_DELIMITER), rest)),
    )(input)
}

/// Split a line into its components.
///
/// Line format:
/// ```text
/// [:]<header tokens> [:body]
/// ```
pub fn split_line(input: &str) -> ParseResult<&str, SplitLine<'_>> {
    let (input, marker) = parse_prefix_marker(input)?;
    let (input, header) = parse_header(input)?;
    let (input, body) = parse_body(input)?;

    Ok((
        input,
        SplitLine {
            prefixed: marker.is_some(),
            header,
            body,
        },
    ))
}

/// A split line with borrowed slices into the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitLine<'a> {
    /// Whether the line started with the `:` sender marker.
    pub prefixed: bool,
    /// Text before the body delimiter.
    pub header: &'a str,
    /// Text after the body delimiter, if there was one.
    pub body: Option<&'a str>,
}

impl<'a> SplitLine<'a> {
    /// Split `input`. Every combinator above either matches or falls back
    /// to the rest of the input, so splitting cannot fail.
    pub fn parse(input: &'a str) -> Self {
        match split_line(input) {
            Ok((_remaining, split)) => split,
            Err(_) => SplitLine {
                prefixed: false,
                header: input,
                body: None,
            },
        }
    }

    /// Header tokens, split on single spaces with empty tokens dropped.
    pub fn tokens(&self) -> impl Iterator<Item = &'a str> {
        self.header.split(' ').filter(|t| !t.is_empty())
    }
}
