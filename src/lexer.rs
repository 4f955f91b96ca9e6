use crate::parser::ParseError;


#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) pos: usize,
}

// Longest first. Assignment and update operators are lexed only so that the
// parser can refuse them instead of misreading `a++b` as `a + +b`.
static PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=",
    "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "**", "<<", ">>", "++", "--",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "(", ")", "[", "]", "{", "}", ";", ",", "<", ">", "+", "-", "*", "/", "%",
    "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn tail(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.tail().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.tail().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.pos)
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, ParseError> {
        self.skip_trivia()?;
        let pos = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None)
        };
        let token = if c.is_ascii_digit() || (c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit())) {
            self.number()?
        } else if c == '\'' || c == '"' {
            self.string(c)?
        } else if is_ident_start(c) {
            self.identifier()
        } else if let Some(punct) = PUNCTUATORS.iter().find(|p| self.tail().starts_with(**p)) {
            self.pos += punct.len();
            Token::Punct(*punct)
        } else {
            return Err(self.error(format!("unexpected character `{}`", c)));
        };
        Ok(Some(Spanned { token, pos }))
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            let tail = self.tail();
            if tail.starts_with("//") {
                self.pos += tail.find(is_line_terminator_str).unwrap_or(tail.len());
            } else if tail.starts_with("/*") {
                match tail[2..].find("*/") {
                    Some(p) => self.pos += p + 4,
                    None => return Err(self.error("unterminated comment"))
                }
            } else if self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            } else {
                return Ok(());
            }
        }
    }

    fn identifier(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        Token::Ident(self.input[start..self.pos].to_owned())
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let radix = match (self.peek(), self.peek_second()) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            (Some('0'), Some('b' | 'B')) => Some(2),
            _ => None
        };
        let value = if let Some(radix) = radix {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_digit(radix)) {
                self.bump();
            }
            let digits = &self.input[digits_start..self.pos];
            if digits.is_empty() {
                return Err(self.error("missing digits after radix prefix"));
            }
            digits.chars().fold(0f64, |acc, d| {
                acc * radix as f64 + d.to_digit(radix).unwrap_or(0) as f64
            })
        } else {
            self.eat_digits();
            let integer = &self.input[start..self.pos];
            if integer.len() > 1 && integer.starts_with('0') {
                return Err(self.error("legacy octal literal"));
            }
            if self.peek() == Some('.') {
                self.bump();
                self.eat_digits();
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(self.error("missing exponent"));
                }
                self.eat_digits();
            }
            self.input[start..self.pos]
                .parse::<f64>()
                .map_err(|err| self.error(err.to_string()))?
        };
        if self.peek().is_some_and(is_ident_continue) {
            return Err(self.error("identifier directly after number"));
        }
        Ok(Token::Number(value))
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, ParseError> {
        self.bump();
        let mut units: Vec<u16> = Vec::new();
        loop {
            let c = match self.bump() {
                Some(c) => c,
                None => return Err(self.error("unterminated string"))
            };
            if c == quote {
                break;
            }
            match c {
                '\\' => self.escape(&mut units)?,
                '\n' | '\r' => return Err(self.error("line break in string")),
                _ => {
                    let mut buf = [0u16; 2];
                    units.extend_from_slice(c.encode_utf16(&mut buf));
                }
            }
        }
        Ok(Token::Str(String::from_utf16_lossy(&units)))
    }

    fn escape(&mut self, units: &mut Vec<u16>) -> Result<(), ParseError> {
        let c = match self.bump() {
            Some(c) => c,
            None => return Err(self.error("unterminated string"))
        };
        let unit = match c {
            'n' => '\n' as u16,
            'r' => '\r' as u16,
            't' => '\t' as u16,
            'b' => 0x08,
            'f' => 0x0c,
            'v' => 0x0b,
            '0' if !self.peek().is_some_and(|d| d.is_ascii_digit()) => 0,
            '1'..='9' | '0' => return Err(self.error("octal escape sequence")),
            'x' => self.hex_digits(2)? as u16,
            'u' => {
                if self.peek() == Some('{') {
                    self.bump();
                    let start = self.pos;
                    while self.peek().is_some_and(|d| d.is_ascii_hexdigit()) {
                        self.bump();
                    }
                    let code = u32::from_str_radix(&self.input[start..self.pos], 16)
                        .map_err(|_| self.error("invalid unicode escape"))?;
                    if self.bump() != Some('}') {
                        return Err(self.error("invalid unicode escape"));
                    }
                    let c = char::from_u32(code).ok_or_else(|| self.error("invalid code point"))?;
                    let mut buf = [0u16; 2];
                    units.extend_from_slice(c.encode_utf16(&mut buf));
                    return Ok(());
                }
                self.hex_digits(4)? as u16
            },
            '\r' => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
                return Ok(());
            },
            '\n' | '\u{2028}' | '\u{2029}' => return Ok(()),
            other => {
                let mut buf = [0u16; 2];
                units.extend_from_slice(other.encode_utf16(&mut buf));
                return Ok(());
            }
        };
        units.push(unit);
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, ParseError> {
        let mut value = 0;
        for _ in 0..count {
            let digit = self.bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hexadecimal escape"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

fn is_line_terminator_str(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}
