use thiserror::Error;
use crate::ast::{BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use crate::eval::format_number;
use crate::lexer::{tokenize, Spanned, Token};

const MAX_DEPTH: usize = 96;

static RESERVED: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "export", "extends", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof",
    "interface", "let", "new", "package", "private", "protected", "public",
    "return", "static", "super", "switch", "throw", "try", "var", "while",
    "with", "yield", "typeof", "void", "true", "false", "null",
];


#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {pos}")]
pub struct ParseError {
    pub message: String,
    pub pos: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, pos: usize) -> Self {
        ParseError {
            message: message.into(),
            pos
        }
    }
}

/// Parses `input` as exactly one expression; anything left over is an error.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        index: 0,
        depth: 0,
        end: input.len()
    };
    let expr = parser.conditional()?;
    match parser.tokens.get(parser.index) {
        Some(extra) => Err(ParseError::new(
            format!("unexpected {:?} after expression", extra.token), extra.pos
        )),
        None => Ok(expr)
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|it| &it.token)
    }

    fn pos(&self) -> usize {
        self.tokens.get(self.index).map_or(self.end, |it| it.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).map(|it| it.token.clone());
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == punct)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn eat(&mut self, punct: &str) -> bool {
        let found = self.is_punct(punct);
        if found {
            self.index += 1;
        }
        found
    }

    fn expect(&mut self, punct: &str) -> Result<(), ParseError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{}`", punct)))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = match self.peek() {
            Some(token) => format!("{:?}", token),
            None => "end of input".to_owned()
        };
        ParseError::new(format!("expected {}, found {}", expected, found), self.pos())
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(ParseError::new("expression nested too deeply", self.pos()))
        } else {
            Ok(())
        }
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let test = self.coalesce()?;
        let expr = if self.eat("?") {
            let consequent = self.conditional()?;
            self.expect(":")?;
            let alternate = self.conditional()?;
            Expr::conditional(test, consequent, alternate)
        } else {
            test
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn coalesce(&mut self) -> Result<Expr, ParseError> {
        let start = self.index;
        let mut left = self.logical_or()?;
        if !self.is_punct("??") {
            return Ok(left);
        }
        self.refuse_mixed_logical(start)?;
        while self.eat("??") {
            let start = self.index;
            let right = self.logical_or()?;
            self.refuse_mixed_logical(start)?;
            left = Expr::logical(LogicalOp::Coalesce, left, right);
        }
        Ok(left)
    }

    // An operand of `??` may not hold `||` or `&&` outside brackets.
    fn refuse_mixed_logical(&self, from: usize) -> Result<(), ParseError> {
        let mut depth = 0usize;
        for spanned in &self.tokens[from..self.index] {
            match spanned.token {
                Token::Punct("(" | "[" | "{") => depth += 1,
                Token::Punct(")" | "]" | "}") => depth = depth.saturating_sub(1),
                Token::Punct("||" | "&&") if depth == 0 => return Err(ParseError::new(
                    "`??` mixed with `||` or `&&` needs parentheses", spanned.pos
                )),
                _ => {}
            }
        }
        Ok(())
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.logical_and()?;
        while self.eat("||") {
            let right = self.logical_and()?;
            left = Expr::logical(LogicalOp::Or, left, right);
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.binary(0)?;
        while self.eat("&&") {
            let right = self.binary(0)?;
            left = Expr::logical(LogicalOp::And, left, right);
        }
        Ok(left)
    }

    // Left-associative binary levels, loosest first.
    fn binary(&mut self, level: usize) -> Result<Expr, ParseError> {
        static LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[("|", BinaryOp::BitOr)],
            &[("^", BinaryOp::BitXor)],
            &[("&", BinaryOp::BitAnd)],
            &[
                ("===", BinaryOp::StrictEq), ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::Eq), ("!=", BinaryOp::Ne),
            ],
            &[
                ("<=", BinaryOp::Le), (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt), (">", BinaryOp::Gt), ("in", BinaryOp::In),
            ],
            &[(">>>", BinaryOp::UShr), ("<<", BinaryOp::Shl), (">>", BinaryOp::Shr)],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
        ];
        let operators = match LEVELS.get(level) {
            Some(operators) => operators,
            None => return self.exponent()
        };
        let mut left = self.binary(level + 1)?;
        'outer: loop {
            for (symbol, op) in operators.iter() {
                let matched = if *symbol == "in" {
                    self.is_keyword("in")
                } else {
                    self.is_punct(symbol)
                };
                if matched {
                    self.index += 1;
                    let right = self.binary(level + 1)?;
                    left = Expr::binary(*op, left, right);
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn exponent(&mut self) -> Result<Expr, ParseError> {
        let starts_with_unary = self.unary_op().is_some();
        let base = self.unary()?;
        if self.is_punct("**") {
            if starts_with_unary {
                return Err(ParseError::new(
                    "unary operand of `**` must be parenthesized", self.pos()
                ));
            }
            self.index += 1;
            self.descend()?;
            let exponent = self.exponent()?;
            self.depth -= 1;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn unary_op(&self) -> Option<UnaryOp> {
        match self.peek()? {
            Token::Punct("!") => Some(UnaryOp::Not),
            Token::Punct("-") => Some(UnaryOp::Neg),
            Token::Punct("+") => Some(UnaryOp::Plus),
            Token::Punct("~") => Some(UnaryOp::BitNot),
            Token::Ident(word) if word == "typeof" => Some(UnaryOp::TypeOf),
            Token::Ident(word) if word == "void" => Some(UnaryOp::Void),
            _ => None
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.unary_op() {
            Some(op) => {
                self.index += 1;
                self.descend()?;
                let operand = self.unary()?;
                self.depth -= 1;
                Ok(Expr::unary(op, operand))
            },
            None => self.member()
        }
    }

    fn member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        while self.eat(".") {
            match self.peek() {
                Some(Token::Ident(name)) => {
                    expr = Expr::member(expr, name);
                    self.index += 1;
                },
                _ => return Err(self.unexpected("property name"))
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        let token = match self.peek() {
            Some(Token::Punct(p)) if !matches!(*p, "(" | "[" | "{") => {
                return Err(self.unexpected("expression"));
            },
            Some(token) => token.clone(),
            None => return Err(self.unexpected("expression"))
        };
        self.index += 1;
        match token {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" => Ok(Expr::Literal(Literal::Null)),
                w if RESERVED.contains(&w) => Err(ParseError::new(
                    format!("reserved word `{}`", w), pos
                )),
                _ => Ok(Expr::Identifier(word))
            },
            Token::Punct("(") => {
                let expr = self.conditional()?;
                self.expect(")")?;
                Ok(expr)
            },
            Token::Punct("[") => self.array(),
            _ => self.object()
        }
    }

    fn array(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let mut elements = Vec::new();
        loop {
            if self.eat("]") {
                break;
            }
            if self.eat(",") {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.conditional()?));
            if !self.eat(",") {
                self.expect("]")?;
                break;
            }
        }
        self.depth -= 1;
        Ok(Expr::Array(elements))
    }

    fn object(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let mut entries = Vec::new();
        loop {
            if self.eat("}") {
                break;
            }
            let pos = self.pos();
            let (key, shorthand) = match self.advance() {
                Some(Token::Ident(name)) => {
                    let shorthand = !RESERVED.contains(&name.as_str());
                    (name, shorthand)
                },
                Some(Token::Str(s)) => (s, false),
                Some(Token::Number(n)) => (format_number(n), false),
                _ => return Err(ParseError::new("expected property key", pos))
            };
            let value = if self.eat(":") {
                self.conditional()?
            } else if shorthand && (self.is_punct(",") || self.is_punct("}")) {
                Expr::Identifier(key.clone())
            } else {
                return Err(self.unexpected("`:`"));
            };
            entries.push((key, value));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        self.depth -= 1;
        Ok(Expr::Object(entries))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.to_owned())
    }

    fn num(n: f64) -> Expr {
        Expr::Literal(Literal::Number(n))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse_expression("a + b * 2").unwrap(),
            Expr::binary(
                BinaryOp::Add,
                ident("a"),
                Expr::binary(BinaryOp::Mul, ident("b"), num(2.0))
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(
            parse_expression("1 - 2 - 3").unwrap(),
            Expr::binary(
                BinaryOp::Sub,
                Expr::binary(BinaryOp::Sub, num(1.0), num(2.0)),
                num(3.0)
            )
        );
    }

    #[test]
    fn exponent_is_right_associative() {
        assert_eq!(
            parse_expression("2 ** 3 ** 2").unwrap(),
            Expr::binary(
                BinaryOp::Pow,
                num(2.0),
                Expr::binary(BinaryOp::Pow, num(3.0), num(2.0))
            )
        );
        assert!(parse_expression("-2 ** 2").is_err());
        assert!(parse_expression("(-2) ** 2").is_ok());
    }

    #[test]
    fn conditional_is_loosest() {
        assert_eq!(
            parse_expression("a > 1 ? 'big' : 'small'").unwrap(),
            Expr::conditional(
                Expr::binary(BinaryOp::Gt, ident("a"), num(1.0)),
                Expr::Literal(Literal::String("big".to_owned())),
                Expr::Literal(Literal::String("small".to_owned()))
            )
        );
    }

    #[test]
    fn logical_and_binds_tighter_than_or() {
        assert_eq!(
            parse_expression("a || b && c").unwrap(),
            Expr::logical(
                LogicalOp::Or,
                ident("a"),
                Expr::logical(LogicalOp::And, ident("b"), ident("c"))
            )
        );
    }

    #[test]
    fn coalesce_needs_parentheses_next_to_logical_operators() {
        for source in ["a ?? b || c", "a || b ?? c", "a && b ?? c", "a ?? b && c", "a ?? b ?? c || d"] {
            assert!(parse_expression(source).is_err(), "accepted {:?}", source);
        }
        assert_eq!(
            parse_expression("(a ?? b) || c").unwrap(),
            Expr::logical(
                LogicalOp::Or,
                Expr::logical(LogicalOp::Coalesce, ident("a"), ident("b")),
                ident("c")
            )
        );
        assert!(parse_expression("a ?? (b || c)").is_ok());
        assert!(parse_expression("[a || b] ?? c").is_ok());
        assert!(parse_expression("a ?? b ?? c").is_ok());
        assert!(parse_expression("a ?? b ? c || d : e").is_ok());
    }

    #[test]
    fn member_chain() {
        assert_eq!(
            parse_expression("user.address.city").unwrap(),
            Expr::member(Expr::member(ident("user"), "address"), "city")
        );
    }

    #[test]
    fn array_and_object_literals() {
        assert_eq!(
            parse_expression("[1, , x,]").unwrap(),
            Expr::Array(vec![Some(num(1.0)), None, Some(ident("x"))])
        );
        assert_eq!(
            parse_expression("{ a: 1, 'b': 2, 3: c, d }").unwrap(),
            Expr::Object(vec![
                ("a".to_owned(), num(1.0)),
                ("b".to_owned(), num(2.0)),
                ("3".to_owned(), ident("c")),
                ("d".to_owned(), ident("d")),
            ])
        );
    }

    #[test]
    fn typeof_and_in_are_operators() {
        assert_eq!(
            parse_expression("typeof a").unwrap(),
            Expr::unary(UnaryOp::TypeOf, ident("a"))
        );
        assert_eq!(
            parse_expression("'a' in b").unwrap(),
            Expr::binary(
                BinaryOp::In,
                Expr::Literal(Literal::String("a".to_owned())),
                ident("b")
            )
        );
    }

    #[test]
    fn rejects_everything_outside_the_grammar() {
        for source in [
            "a()",
            "a.b(1)",
            "a[0]",
            "a['constructor']",
            "a = 1",
            "a += 1",
            "a++",
            "new Date",
            "delete a.b",
            "function () {}",
            "() => 1",
            "a, b",
            "a?.b",
            "[...a]",
            "{ [k]: 1 }",
            "{ m() {} }",
            "a instanceof b",
            "/re/.test(a)",
            "`x${a}`",
            "a b",
            "",
            "(",
        ] {
            assert!(parse_expression(source).is_err(), "accepted {:?}", source);
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = "(".repeat(200) + "1" + &")".repeat(200);
        assert!(parse_expression(&deep).is_err());
    }
}
