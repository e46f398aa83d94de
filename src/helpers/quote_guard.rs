use std::io::{self, Read};

use thiserror::Error;

const QUOTE: u8 = b'"';

/// Quoting violation found while scanning raw input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("bare \" in non-quoted field")]
    BareQuote { line: u64 },

    #[error("extraneous or missing \" in quoted field")]
    ExtraneousQuote { line: u64 },

    #[error("quoted field opened here is never closed")]
    Unterminated { line: u64 },
}

impl QuoteError {
    pub fn line(&self) -> u64 {
        match self {
            QuoteError::BareQuote { line }
            | QuoteError::ExtraneousQuote { line }
            | QuoteError::Unterminated { line } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Strict RFC 4180 quoting check in front of a `csv` reader.
///
/// `csv` accepts a `"` inside an unquoted field as data and treats an
/// unterminated quote as running to end of input. This reader passes bytes
/// through unchanged but fails with [`io::ErrorKind::InvalidData`] wrapping a
/// [`QuoteError`] as soon as either shows up. Once failed it stays failed.
#[derive(Debug)]
pub struct QuoteGuard<R> {
    inner: R,
    delimiter: u8,
    state: FieldState,
    line: u64,
    quote_line: u64,
    failed: Option<QuoteError>,
}

impl<R: Read> QuoteGuard<R> {
    pub fn new(inner: R, delimiter: u8) -> Self {
        QuoteGuard {
            inner,
            delimiter,
            state: FieldState::Start,
            line: 1,
            quote_line: 1,
            failed: None,
        }
    }

    /// Advances the state machine over `chunk`. On a violation returns how
    /// many leading bytes were clean.
    fn scan(&mut self, chunk: &[u8]) -> Result<(), (usize, QuoteError)> {
        for (i, &b) in chunk.iter().enumerate() {
            let terminator = b == b'\n' || b == b'\r';
            self.state = match self.state {
                FieldState::Start | FieldState::Unquoted if b == QUOTE => {
                    if self.state == FieldState::Unquoted {
                        return Err((i, QuoteError::BareQuote { line: self.line }));
                    }
                    self.quote_line = self.line;
                    FieldState::Quoted
                }
                FieldState::Start | FieldState::Unquoted => {
                    if b == self.delimiter || terminator {
                        FieldState::Start
                    } else {
                        FieldState::Unquoted
                    }
                }
                FieldState::Quoted if b == QUOTE => FieldState::QuoteInQuoted,
                FieldState::Quoted => FieldState::Quoted,
                FieldState::QuoteInQuoted if b == QUOTE => FieldState::Quoted,
                FieldState::QuoteInQuoted if b == self.delimiter || terminator => {
                    FieldState::Start
                }
                FieldState::QuoteInQuoted => {
                    return Err((i, QuoteError::ExtraneousQuote { line: self.line }));
                }
            };
            if b == b'\n' {
                self.line += 1;
            }
        }
        Ok(())
    }

    fn fail(&mut self, err: QuoteError) -> io::Error {
        self.failed = Some(err.clone());
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

impl<R: Read> Read for QuoteGuard<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = &self.failed {
            return Err(io::Error::new(io::ErrorKind::InvalidData, err.clone()));
        }

        let n = self.inner.read(buf)?;
        if n == 0 {
            if self.state == FieldState::Quoted {
                let line = self.quote_line;
                return Err(self.fail(QuoteError::Unterminated { line }));
            }
            return Ok(0);
        }

        match self.scan(&buf[..n]) {
            Ok(()) => Ok(n),
            // hand out the clean prefix first, the error comes on the next call
            Err((clean, err)) if clean > 0 => {
                self.failed = Some(err);
                Ok(clean)
            }
            Err((_, err)) => Err(self.fail(err)),
        }
    }
}

/// Recovers a [`QuoteError`] carried inside an I/O error, if any.
pub fn quote_error(err: &io::Error) -> Option<&QuoteError> {
    err.get_ref().and_then(|inner| inner.downcast_ref::<QuoteError>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(input: &[u8], delimiter: u8) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        QuoteGuard::new(input, delimiter).read_to_end(&mut out)?;
        Ok(out)
    }

    fn violation(input: &[u8]) -> QuoteError {
        let err = read_all(input, b',').unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        quote_error(&err).cloned().unwrap()
    }

    #[test]
    fn test_well_formed_input_passes_through() {
        let input = b"a,\"b,c\",\"say \"\"hi\"\"\"\r\n\"multi\nline\",x\n\"\",\n";
        assert_eq!(read_all(input, b',').unwrap(), input.to_vec());
    }

    #[test]
    fn test_bare_quote_in_unquoted_field() {
        assert_eq!(violation(b"a,1\nb\"x,2\n"), QuoteError::BareQuote { line: 2 });
    }

    #[test]
    fn test_text_after_closing_quote() {
        assert_eq!(
            violation(b"a,\"1\"x\n"),
            QuoteError::ExtraneousQuote { line: 1 }
        );
    }

    #[test]
    fn test_unterminated_quote_reports_opening_line() {
        assert_eq!(
            violation(b"a,1\nb,\"2\nc,3\n"),
            QuoteError::Unterminated { line: 2 }
        );
    }

    #[test]
    fn test_quote_after_custom_delimiter_opens_field() {
        assert!(read_all(b"a\t\"x\ty\"\n", b'\t').is_ok());
        assert!(read_all(b"a,\"x\ty\"\n", b'\t').is_err());
    }

    #[test]
    fn test_error_is_sticky() {
        let mut guard = QuoteGuard::new(&b"ok\nb\"x\n"[..], b',');
        let mut buf = [0u8; 64];

        assert_eq!(guard.read(&mut buf).unwrap(), 4);
        assert!(guard.read(&mut buf).is_err());
        assert!(guard.read(&mut buf).is_err());
    }
}
