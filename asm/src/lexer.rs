use std::iter::Peekable;
use std::num::ParseIntError;
use std::str::CharIndices;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Number(i64),
    Comma,
    Colon,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    LAngleLAngle,
    RAngleRAngle,
    Dollar,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Token::Ident(name) => return f.write_str(name),
            Token::Number(value) => return write!(f, "{value}"),
            Token::Comma => ",",
            Token::Colon => ":",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Ampersand => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::LAngleLAngle => "<<",
            Token::RAngleRAngle => ">>",
            Token::Dollar => "$",
        };
        f.write_str(text)
    }
}

/// Splits one source line into tokens. Everything after `;` is a comment.
pub struct LineLexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    line: &'a str,
}

impl<'a> LineLexer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            iter: line.char_indices().peekable(),
            line,
        }
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.iter.clone().nth(n).map(|(_, c)| c)
    }

    fn consume(&mut self) -> Option<(usize, char)> {
        self.iter.next()
    }

    fn take_while(&mut self, start: usize, first: char, pred: impl Fn(char) -> bool) -> &'a str {
        let mut end = start + first.len_utf8();
        while let Some((idx, ch)) = self.iter.next_if(|(_, c)| pred(*c)) {
            end = idx + ch.len_utf8();
        }
        &self.line[start..end]
    }

    pub fn parse(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();
        while let Some(ch0) = self.peek_nth(0) {
            if ch0.is_whitespace() {
                self.consume();
                continue;
            }
            if ch0 == ';' {
                break;
            }

            // Double character token
            if let Some(ch1) = self.peek_nth(1) {
                let tok = match (ch0, ch1) {
                    ('<', '<') => Some(Token::LAngleLAngle),
                    ('>', '>') => Some(Token::RAngleRAngle),
                    _ => None,
                };
                if let Some(tok) = tok {
                    self.consume();
                    self.consume();
                    tokens.push(tok);
                    continue;
                }
            }

            // Single character token
            let tok = match ch0 {
                ',' => Some(Token::Comma),
                ':' => Some(Token::Colon),
                '(' => Some(Token::LParen),
                ')' => Some(Token::RParen),
                '+' => Some(Token::Plus),
                '-' => Some(Token::Minus),
                '*' => Some(Token::Star),
                '/' => Some(Token::Slash),
                '%' => Some(Token::Percent),
                '&' => Some(Token::Ampersand),
                '|' => Some(Token::Pipe),
                '^' => Some(Token::Caret),
                '~' => Some(Token::Tilde),
                '$' => Some(Token::Dollar),
                _ => None,
            };
            if let Some(tok) = tok {
                self.consume();
                tokens.push(tok);
                continue;
            }

            // Character literal
            if ch0 == '\'' {
                self.consume();
                match (self.consume(), self.consume()) {
                    (Some((_, c)), Some((_, '\''))) => tokens.push(Token::Number(c as i64)),
                    _ => return Err(Error::Syntax("unterminated character literal".into())),
                }
                continue;
            }

            // Number or identifier
            if let Some((start, _)) = self.consume() {
                if ch0.is_ascii_digit() {
                    let text = self.take_while(start, ch0, |c| c.is_ascii_alphanumeric() || c == '_');
                    let value = parse_with_prefix(text)
                        .map_err(|_| Error::Syntax(format!("cannot parse `{text}` as number")))?;
                    tokens.push(Token::Number(value));
                } else if ch0.is_alphabetic() || ch0 == '_' || ch0 == '.' {
                    let text =
                        self.take_while(start, ch0, |c| c.is_alphanumeric() || c == '_' || c == '.');
                    tokens.push(Token::Ident(text.to_string()));
                } else {
                    return Err(Error::Syntax(format!("unexpected character `{ch0}`")));
                }
            }
        }
        Ok(tokens)
    }
}

pub fn parse_with_prefix(s: &str) -> Result<i64, ParseIntError> {
    let s = s.replace('_', "");
    if s.len() < 2 {
        return s.parse::<i64>();
    }
    let (prefix, num) = s.split_at(2);
    match prefix {
        "0b" | "0B" => i64::from_str_radix(num, 2),
        "0o" | "0O" => i64::from_str_radix(num, 8),
        "0x" | "0X" => i64::from_str_radix(num, 16),
        _ => s.parse::<i64>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Token::*;

    fn case(code: &str, expects: Vec<Token>) {
        let tokens = LineLexer::new(code).parse().unwrap();
        assert_eq!(tokens, expects, "{code}");
    }

    #[test]
    fn instruction_line() {
        case(
            "loop: ldi r1, (end-$)<<2 ; comment, ignored",
            vec![
                Ident("loop".into()),
                Colon,
                Ident("ldi".into()),
                Ident("r1".into()),
                Comma,
                LParen,
                Ident("end".into()),
                Minus,
                Dollar,
                RParen,
                LAngleLAngle,
                Number(2),
            ],
        );
    }

    #[test]
    fn numbers() {
        case(
            "10 0x1F 0b1010 0o17 'A' 1_000",
            vec![
                Number(10),
                Number(0x1F),
                Number(0b1010),
                Number(0o17),
                Number(65),
                Number(1000),
            ],
        );
    }

    #[test]
    fn operators() {
        case(
            "~a|b^c&d>>1%e*f/g+h",
            vec![
                Tilde,
                Ident("a".into()),
                Pipe,
                Ident("b".into()),
                Caret,
                Ident("c".into()),
                Ampersand,
                Ident("d".into()),
                RAngleRAngle,
                Number(1),
                Percent,
                Ident("e".into()),
                Star,
                Ident("f".into()),
                Slash,
                Ident("g".into()),
                Plus,
                Ident("h".into()),
            ],
        );
    }

    #[test]
    fn display_as_source() {
        let shown: Vec<_> = LineLexer::new("ld r1, (x<<0x10)")
            .parse()
            .unwrap()
            .iter()
            .map(Token::to_string)
            .collect();
        assert_eq!(shown, vec!["ld", "r1", ",", "(", "x", "<<", "16", ")"]);
    }

    #[test]
    fn comment_only() {
        case("   ; nothing here", vec![]);
    }

    #[test]
    fn bad_number() {
        assert!(matches!(
            LineLexer::new("ldi r0, 0xZZ").parse(),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(
            LineLexer::new("ldi r0, 'ab'").parse(),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(LineLexer::new("ldi r0, #1").parse(), Err(Error::Syntax(_))));
    }
}
