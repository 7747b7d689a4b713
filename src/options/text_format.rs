use logos::{Lexer, Logos};

use super::OptionValue;

#[derive(Debug, Clone, Copy, Logos, PartialEq, Eq)]
#[logos(skip r"([\t\n\v\f\r ]+|#[^\n]*)")]
enum Token {
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex("[0-9][0-9A-Za-z_]*")]
    #[regex(r"[0-9]+\.[0-9]*([eE][+\-]?[0-9]+)?[fF]?")]
    #[regex(r"[0-9]+[eE][+\-][0-9]+[fF]?")]
    #[regex(r"\.[0-9]+([eE][+\-]?[0-9]+)?[fF]?")]
    Number,
    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    #[regex(r#"'([^'\\\n]|\\[^\n])*'"#)]
    String,
    #[token("-")]
    Minus,
    #[token(".")]
    Dot,
    #[token("/")]
    ForwardSlash,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("<")]
    LeftAngleBracket,
    #[token(">")]
    RightAngleBracket,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
}

/// Parses the text of an aggregate option value, such as `foo: 1 bar { baz: "x" }`, into the
/// fields of a message.
///
/// Scalars are kept exactly as written, so the printed value re-parses to the same option.
pub(super) fn parse(text: &str) -> Result<Vec<(String, OptionValue)>, String> {
    let mut parser = Parser::new(text)?;

    let fields = if parser.peek() == Some(Token::LeftBrace) {
        parser.bump();
        let fields = parser.parse_fields(Some(Token::RightBrace))?;
        parser.expect(Token::RightBrace)?;
        fields
    } else {
        parser.parse_fields(None)?
    };

    match parser.next() {
        None => Ok(fields),
        Some((_, slice)) => Err(format!("unexpected '{}' after message", slice)),
    }
}

struct Parser<'a> {
    tokens: Vec<(Token, &'a str)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, String> {
        let mut lexer: Lexer<'a, Token> = Token::lexer(text);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next() {
            match token {
                Ok(token) => tokens.push((token, lexer.slice())),
                Err(()) => return Err(format!("invalid token '{}'", lexer.slice())),
            }
        }

        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|&(token, _)| token)
    }

    fn next(&mut self) -> Option<(Token, &'a str)> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn bump(&mut self) -> &'a str {
        self.next().map(|(_, slice)| slice).unwrap_or_default()
    }

    fn expect(&mut self, expected: Token) -> Result<&'a str, String> {
        match self.next() {
            Some((token, slice)) if token == expected => Ok(slice),
            Some((_, slice)) => Err(format!("expected {}, but found '{}'", describe(expected), slice)),
            None => Err(format!("expected {}, but reached end of value", describe(expected))),
        }
    }

    fn parse_fields(&mut self, terminator: Option<Token>) -> Result<Vec<(String, OptionValue)>, String> {
        let mut fields = Vec::new();
        loop {
            match self.peek() {
                None if terminator.is_none() => break,
                None => return Err("unexpected end of value".to_owned()),
                Some(token) if Some(token) == terminator => break,
                Some(_) => fields.push(self.parse_field()?),
            }
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> Result<(String, OptionValue), String> {
        let name = match self.next() {
            Some((Token::Ident, name)) => name.to_owned(),
            Some((Token::LeftBracket, _)) => {
                let mut name = String::from("[");
                loop {
                    match self.next() {
                        Some((Token::RightBracket, _)) => break,
                        Some((Token::Ident | Token::Dot | Token::ForwardSlash, part)) => {
                            name.push_str(part)
                        }
                        Some((_, slice)) => {
                            return Err(format!("unexpected '{}' in extension name", slice))
                        }
                        None => return Err("unterminated extension name".to_owned()),
                    }
                }
                name.push(']');
                name
            }
            Some((_, slice)) => return Err(format!("expected a field name, but found '{}'", slice)),
            None => return Err("expected a field name".to_owned()),
        };

        let has_colon = self.peek() == Some(Token::Colon);
        if has_colon {
            self.bump();
        }

        let value = match self.peek() {
            Some(Token::LeftBrace | Token::LeftAngleBracket) => self.parse_message()?,
            Some(Token::LeftBracket) if has_colon => self.parse_list()?,
            Some(_) if has_colon => self.parse_scalar()?,
            _ => return Err(format!("expected ':' after field '{}'", name)),
        };

        if matches!(self.peek(), Some(Token::Comma | Token::Semicolon)) {
            self.bump();
        }

        Ok((name, value))
    }

    fn parse_message(&mut self) -> Result<OptionValue, String> {
        let terminator = match self.next() {
            Some((Token::LeftBrace, _)) => Token::RightBrace,
            Some((Token::LeftAngleBracket, _)) => Token::RightAngleBracket,
            _ => return Err("expected '{' or '<'".to_owned()),
        };

        let fields = self.parse_fields(Some(terminator))?;
        self.expect(terminator)?;
        Ok(OptionValue::Message(fields))
    }

    fn parse_list(&mut self) -> Result<OptionValue, String> {
        self.expect(Token::LeftBracket)?;

        let mut values = Vec::new();
        if self.peek() == Some(Token::RightBracket) {
            self.bump();
            return Ok(OptionValue::Array(values));
        }

        loop {
            let value = match self.peek() {
                Some(Token::LeftBrace | Token::LeftAngleBracket) => self.parse_message()?,
                _ => self.parse_scalar()?,
            };
            values.push(value);

            match self.next() {
                Some((Token::Comma, _)) => continue,
                Some((Token::RightBracket, _)) => break,
                Some((_, slice)) => return Err(format!("expected ',' or ']', but found '{}'", slice)),
                None => return Err("unterminated list".to_owned()),
            }
        }

        Ok(OptionValue::Array(values))
    }

    fn parse_scalar(&mut self) -> Result<OptionValue, String> {
        match self.next() {
            Some((Token::Minus, _)) => match self.next() {
                Some((Token::Number | Token::Ident, value)) => {
                    Ok(OptionValue::Scalar(format!("-{}", value)))
                }
                _ => Err("expected a number after '-'".to_owned()),
            },
            Some((Token::Number | Token::Ident, value)) => Ok(OptionValue::Scalar(value.to_owned())),
            Some((Token::String, value)) => {
                let mut text = value.to_owned();
                while self.peek() == Some(Token::String) {
                    text.push(' ');
                    text.push_str(self.bump());
                }
                Ok(OptionValue::Scalar(text))
            }
            Some((_, slice)) => Err(format!("expected a value, but found '{}'", slice)),
            None => Err("expected a value".to_owned()),
        }
    }
}

fn describe(token: Token) -> &'static str {
    match token {
        Token::Ident => "an identifier",
        Token::Number => "a number",
        Token::String => "a string",
        Token::Minus => "'-'",
        Token::Dot => "'.'",
        Token::ForwardSlash => "'/'",
        Token::LeftBrace => "'{'",
        Token::RightBrace => "'}'",
        Token::LeftAngleBracket => "'<'",
        Token::RightAngleBracket => "'>'",
        Token::LeftBracket => "'['",
        Token::RightBracket => "']'",
        Token::Colon => "':'",
        Token::Comma => "','",
        Token::Semicolon => "';'",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(value: &str) -> OptionValue {
        OptionValue::Scalar(value.to_owned())
    }

    #[test]
    fn nested_message() {
        assert_eq!(
            parse(r#"get: "/v1/{name}" body: "*" additional_bindings { post: "/v1" }"#).unwrap(),
            vec![
                ("get".to_owned(), scalar(r#""/v1/{name}""#)),
                ("body".to_owned(), scalar(r#""*""#)),
                (
                    "additional_bindings".to_owned(),
                    OptionValue::Message(vec![("post".to_owned(), scalar(r#""/v1""#))])
                ),
            ]
        );
    }

    #[test]
    fn outer_braces() {
        assert_eq!(
            parse("{ a: 1, b: -2.5 }").unwrap(),
            vec![
                ("a".to_owned(), scalar("1")),
                ("b".to_owned(), scalar("-2.5")),
            ]
        );
    }

    #[test]
    fn lists() {
        assert_eq!(
            parse("tags: [] ids: [1, 2] items: [{ a: true }, < a: false >]").unwrap(),
            vec![
                ("tags".to_owned(), OptionValue::Array(vec![])),
                (
                    "ids".to_owned(),
                    OptionValue::Array(vec![scalar("1"), scalar("2")])
                ),
                (
                    "items".to_owned(),
                    OptionValue::Array(vec![
                        OptionValue::Message(vec![("a".to_owned(), scalar("true"))]),
                        OptionValue::Message(vec![("a".to_owned(), scalar("false"))]),
                    ])
                ),
            ]
        );
    }

    #[test]
    fn extension_field_name() {
        assert_eq!(
            parse("[foo.bar]: 5").unwrap(),
            vec![("[foo.bar]".to_owned(), scalar("5"))]
        );
    }

    #[test]
    fn errors() {
        assert!(parse("a: ").is_err());
        assert!(parse("a 1").is_err());
        assert!(parse("a: [1, 2").is_err());
        assert!(parse("a { b: 1").is_err());
        assert!(parse("{ a: 1 } b").is_err());
        assert!(parse("a: \"unterminated").is_err());
    }
}
