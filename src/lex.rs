//! Tokenizer for the crypt(3) hash grammar.
//!
//! Hash strings are scanned in a single pass: an optional prefix token
//! (`$<id>$`, `$<id>,` or `_`) followed by fragments separated by `$`,
//! with `,` joining values inside a fragment.

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    /// Tokenization failed; the token text holds the message.
    Error,
    /// Hash prefix including its trailing delimiter.
    Prefix,
    /// `$` fragment separator.
    Dollar,
    /// `,` group separator.
    Comma,
    /// Text between separators, possibly empty.
    Value,
    /// End of input.
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: Kind,
    pub text: &'a str,
    pub pos: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.pos + self.text.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Prefix,
    Fragment,
}

/// Iterator over the tokens of a hash string.
///
/// An `Error` or `Eof` token terminates the stream.
pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    state: State,
    pending: Option<Token<'a>>,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            state: State::Prefix,
            pending: None,
            done: false,
        }
    }

    fn emit_final(&mut self, token: Token<'a>) -> Token<'a> {
        self.done = true;
        token
    }

    fn lex_prefix(&mut self) -> Token<'a> {
        self.state = State::Fragment;
        if self.input.starts_with('$') {
            return match self.input[1..].find(['$', ',']) {
                Some(0) => self.emit_final(Token {
                    kind: Kind::Error,
                    text: "missing prefix identifier",
                    pos: 1,
                }),
                Some(i) => {
                    self.pos = i + 2;
                    Token {
                        kind: Kind::Prefix,
                        text: &self.input[..i + 2],
                        pos: 0,
                    }
                }
                None => self.emit_final(Token {
                    kind: Kind::Error,
                    text: "missing prefix end",
                    pos: self.input.len(),
                }),
            };
        }
        if self.input.starts_with('_') {
            self.pos = 1;
            return Token {
                kind: Kind::Prefix,
                text: &self.input[..1],
                pos: 0,
            };
        }
        self.lex_fragment()
    }

    fn lex_fragment(&mut self) -> Token<'a> {
        let eof = Token {
            kind: Kind::Eof,
            text: "",
            pos: self.input.len(),
        };
        if self.pos >= self.input.len() {
            return self.emit_final(eof);
        }
        match self.input[self.pos..].find(['$', ',']) {
            Some(i) => {
                let delim_pos = self.pos + i;
                let delim_kind = if self.input.as_bytes()[delim_pos] == b'$' {
                    Kind::Dollar
                } else {
                    Kind::Comma
                };
                let value = Token {
                    kind: Kind::Value,
                    text: &self.input[self.pos..delim_pos],
                    pos: self.pos,
                };
                self.pending = Some(Token {
                    kind: delim_kind,
                    text: &self.input[delim_pos..delim_pos + 1],
                    pos: delim_pos,
                });
                self.pos = delim_pos + 1;
                value
            }
            None => {
                let value = Token {
                    kind: Kind::Value,
                    text: &self.input[self.pos..],
                    pos: self.pos,
                };
                self.pos = self.input.len();
                self.pending = Some(eof);
                value
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if let Some(token) = self.pending.take() {
            if matches!(token.kind, Kind::Eof | Kind::Error) {
                self.done = true;
            }
            return Some(token);
        }
        if self.done {
            return None;
        }
        let token = match self.state {
            State::Prefix => self.lex_prefix(),
            State::Fragment => self.lex_fragment(),
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        Lexer::new(input).collect()
    }

    fn token(kind: Kind, text: &str, pos: usize) -> Token<'_> {
        Token { kind, text, pos }
    }

    #[test]
    fn mcf_hash() {
        assert_eq!(
            tokens("$1$ab$cd"),
            vec![
                token(Kind::Prefix, "$1$", 0),
                token(Kind::Value, "ab", 3),
                token(Kind::Dollar, "$", 5),
                token(Kind::Value, "cd", 6),
                token(Kind::Eof, "", 8),
            ]
        );
    }

    #[test]
    fn comma_prefix_and_groups() {
        assert_eq!(
            tokens("$md5,rounds=5000$ab"),
            vec![
                token(Kind::Prefix, "$md5,", 0),
                token(Kind::Value, "rounds=5000", 5),
                token(Kind::Dollar, "$", 16),
                token(Kind::Value, "ab", 17),
                token(Kind::Eof, "", 19),
            ]
        );
        assert_eq!(
            tokens("$t$m=1,t=2"),
            vec![
                token(Kind::Prefix, "$t$", 0),
                token(Kind::Value, "m=1", 3),
                token(Kind::Comma, ",", 6),
                token(Kind::Value, "t=2", 7),
                token(Kind::Eof, "", 10),
            ]
        );
    }

    #[test]
    fn underscore_and_bare_hashes() {
        assert_eq!(
            tokens("_abcd"),
            vec![
                token(Kind::Prefix, "_", 0),
                token(Kind::Value, "abcd", 1),
                token(Kind::Eof, "", 5),
            ]
        );
        assert_eq!(
            tokens("abcd"),
            vec![token(Kind::Value, "abcd", 0), token(Kind::Eof, "", 4)]
        );
        assert_eq!(tokens(""), vec![token(Kind::Eof, "", 0)]);
    }

    #[test]
    fn empty_values_before_delimiters() {
        assert_eq!(
            tokens("$3$$ab"),
            vec![
                token(Kind::Prefix, "$3$", 0),
                token(Kind::Value, "", 3),
                token(Kind::Dollar, "$", 3),
                token(Kind::Value, "ab", 4),
                token(Kind::Eof, "", 6),
            ]
        );
        // no trailing empty value after a final delimiter
        assert_eq!(
            tokens("$1$ab$"),
            vec![
                token(Kind::Prefix, "$1$", 0),
                token(Kind::Value, "ab", 3),
                token(Kind::Dollar, "$", 5),
                token(Kind::Eof, "", 6),
            ]
        );
    }

    #[test]
    fn prefix_errors() {
        assert_eq!(
            tokens("$$ab"),
            vec![token(Kind::Error, "missing prefix identifier", 1)]
        );
        assert_eq!(
            tokens("$,ab"),
            vec![token(Kind::Error, "missing prefix identifier", 1)]
        );
        assert_eq!(
            tokens("$1ab"),
            vec![token(Kind::Error, "missing prefix end", 4)]
        );
    }
}
