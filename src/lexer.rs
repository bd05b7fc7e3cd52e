use std::fmt;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    // Identifiers and keywords
    Identifier(String),
    Keyword(Keyword),

    // Literals
    IntLiteral(i32),
    StringLiteral(String),

    // Punctuators
    LeftBrace,        // {
    RightBrace,       // }
    LeftParen,        // (
    RightParen,       // )
    Dot,              // .
    Semicolon,        // ;
    Comma,            // ,
    Colon,            // :
    Assign,           // =
    Plus,             // +
    Minus,            // -
    Star,             // *
    Slash,            // /
    Percent,          // %
    Equal,            // ==
    NotEqual,         // !=
    LessThan,         // <
    GreaterThan,      // >
    LessThanEqual,    // <=
    GreaterThanEqual, // >=

    Eof,
}

impl Token {
    /// The global the operator token resolves to when used as a name.
    /// Operators are ordinary bindings in the root environment, so both
    /// `a + b` and `+(a, b)` go through a variable lookup.
    pub fn operator_name(&self) -> Option<&'static str> {
        match self {
            Token::Plus => Some("+"),
            Token::Minus => Some("-"),
            Token::Star => Some("*"),
            Token::Slash => Some("/"),
            Token::Percent => Some("%"),
            Token::Equal => Some("=="),
            Token::NotEqual => Some("!="),
            Token::LessThan => Some("<"),
            Token::GreaterThan => Some(">"),
            Token::LessThanEqual => Some("<="),
            Token::GreaterThanEqual => Some(">="),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Else,
    Function,
    If,
    Return,
    Var,
}

impl Keyword {
    pub fn from_str(s: &str) -> Option<Keyword> {
        match s {
            "else" => Some(Keyword::Else),
            "function" => Some(Keyword::Function),
            "if" => Some(Keyword::If),
            "return" => Some(Keyword::Return),
            "var" => Some(Keyword::Var),
            _ => None,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Keyword::Else => "else",
            Keyword::Function => "function",
            Keyword::If => "if",
            Keyword::Return => "return",
            Keyword::Var => "var",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug)]
pub struct LexError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

pub struct Lexer<'a> {
    chars: Chars<'a>,
    current: Option<char>,
    line: u32,
    token_line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            chars,
            current,
            line: 1,
            token_line: 1,
        }
    }

    /// Line on which the most recently returned token started.
    pub fn token_line(&self) -> u32 {
        self.token_line
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current;
        if ch == Some('\n') {
            self.line += 1;
        }
        self.current = self.chars.next();
        ch
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
        }
    }

    fn is_identifier_start(ch: char) -> bool {
        ch == '_' || ch == '$' || ch.is_ascii_alphabetic() || unicode_id_start(ch)
    }

    fn is_identifier_continue(ch: char) -> bool {
        ch == '_' || ch == '$' || ch.is_ascii_alphanumeric() || unicode_id_continue(ch)
    }

    fn skip_line_comment(&mut self) {
        // skip past //
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        loop {
            match self.advance() {
                Some('*') => {
                    if self.peek() == Some('/') {
                        self.advance();
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return Err(self.error("unterminated block comment")),
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string literal")),
                Some(ch) if ch == quote => return Ok(s),
                Some('\n') => return Err(self.error("unterminated string literal")),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('\\') => s.push('\\'),
                    Some(ch @ ('\'' | '"')) => s.push(ch),
                    Some(ch) => return Err(self.error(format!("unknown escape sequence \\{ch}"))),
                    None => return Err(self.error("unterminated escape sequence")),
                },
                Some(ch) => s.push(ch),
            }
        }
    }

    fn read_number(&mut self, first: char) -> Result<Token, LexError> {
        let mut digits = String::new();
        digits.push(first);
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        match digits.parse::<i32>() {
            Ok(n) => Ok(Token::IntLiteral(n)),
            Err(_) => Err(self.error(format!("integer literal {digits} out of range"))),
        }
    }

    fn read_identifier(&mut self, first: char) -> Token {
        let mut name = String::new();
        name.push(first);
        while let Some(ch) = self.peek() {
            if Self::is_identifier_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        match Keyword::from_str(&name) {
            Some(kw) => Token::Keyword(kw),
            None => Token::Identifier(name),
        }
    }

    /// Returns the next token, or an `Eof` token at end of input.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            self.token_line = self.line;
            let Some(ch) = self.advance() else {
                return Ok(Token::Eof);
            };
            let token = match ch {
                ch if ch.is_whitespace() => continue,
                '/' if self.peek() == Some('/') => {
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.peek() == Some('*') => {
                    self.advance();
                    self.skip_block_comment()?;
                    continue;
                }
                '{' => Token::LeftBrace,
                '}' => Token::RightBrace,
                '(' => Token::LeftParen,
                ')' => Token::RightParen,
                '.' => Token::Dot,
                ';' => Token::Semicolon,
                ',' => Token::Comma,
                ':' => Token::Colon,
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '%' => Token::Percent,
                '=' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        Token::Equal
                    } else {
                        Token::Assign
                    }
                }
                '!' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        Token::NotEqual
                    } else {
                        return Err(self.error("unexpected character '!'"));
                    }
                }
                '<' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        Token::LessThanEqual
                    } else {
                        Token::LessThan
                    }
                }
                '>' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        Token::GreaterThanEqual
                    } else {
                        Token::GreaterThan
                    }
                }
                '\'' | '"' => Token::StringLiteral(self.read_string(ch)?),
                ch if ch.is_ascii_digit() => self.read_number(ch)?,
                ch if Self::is_identifier_start(ch) => self.read_identifier(ch),
                ch => return Err(self.error(format!("unexpected character {ch:?}"))),
            };
            return Ok(token);
        }
    }
}

fn unicode_id_start(ch: char) -> bool {
    // Fast path above covers ASCII
    !ch.is_ascii() && unicode_ident::is_xid_start(ch)
}

fn unicode_id_continue(ch: char) -> bool {
    !ch.is_ascii() && unicode_ident::is_xid_continue(ch)
}
