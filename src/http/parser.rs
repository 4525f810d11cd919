use crate::http::request::{Method, Request};

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than three space-delimited tokens
    InvalidRequestLine,
    /// The line did not fit in the configured limit
    LineTooLong,
    /// A header line did not fit in the configured limit
    HeaderTooLong,
    /// The line was not valid UTF-8
    InvalidEncoding,
}

impl ParseError {
    /// Fixed detail text shown on the 400 page.
    pub fn detail(&self) -> &'static str {
        match self {
            ParseError::InvalidRequestLine => "The request line could not be parsed.",
            ParseError::LineTooLong => "The request line is too long.",
            ParseError::HeaderTooLong => "A request header line is too long.",
            ParseError::InvalidEncoding => "The request line is not valid UTF-8.",
        }
    }
}

/// Parses `METHOD SP PATH SP VERSION`.
///
/// Tokens past the third are ignored. Header lines are attached later by the
/// connection as they are read.
pub fn parse_request_line(line: &str) -> Result<Request, ParseError> {
    let mut parts = trim_line_ending(line).split_whitespace();

    let method = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let path = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let version = parts.next().ok_or(ParseError::InvalidRequestLine)?;

    Ok(Request {
        method: Method::parse(method),
        path: path.to_string(),
        version: version.to_string(),
        headers: Vec::new(),
    })
}

/// Strips a trailing `\r\n` or `\n`.
pub fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
