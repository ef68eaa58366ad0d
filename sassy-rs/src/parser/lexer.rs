//! Tokenizer for the Sassy surface syntax.

use crate::error::{Coordinate, SassyError};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    Real(f64),
    Str(String),
    Ident(String),
    /// `$name`
    Variable(String),
    /// `@name`: directives and attributes.
    At(String),

    // Selector sigils glued to a name
    /// `#name`
    Hash(String),
    /// `.name`
    Dot(String),
    /// `:name`
    ColonName(String),

    // Punctuation
    Colon,
    PlusColon,
    Semicolon,
    Comma,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Tilde,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,

    Eof,
}

/// A token with the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub at: Coordinate,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

pub struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Lexer {
            src: src.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn here(&self) -> Coordinate {
        Coordinate::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace, `// line` and `/* block */` comments.
    fn skip_trivia(&mut self) -> Result<(), SassyError> {
        loop {
            match (self.peek(), self.peek2()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.here();
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            None => return Err(SassyError::syntax(start, "unterminated comment")),
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_while(&mut self, pred: fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek().filter(|&c| pred(c)) {
            s.push(c);
            self.advance();
        }
        s
    }

    fn read_number(&mut self, at: Coordinate) -> Result<Token, SassyError> {
        let mut s = self.read_while(|c| c.is_ascii_digit());
        let mut is_real = false;
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            is_real = true;
            s.push('.');
            self.advance();
            s.push_str(&self.read_while(|c| c.is_ascii_digit()));
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && (self.peek2().is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek2(), Some('+' | '-'))
                    && self.src.get(self.pos + 2).is_some_and(|c| c.is_ascii_digit())))
        {
            is_real = true;
            s.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                s.push(sign);
                self.advance();
            }
            s.push_str(&self.read_while(|c| c.is_ascii_digit()));
        }
        if is_real {
            s.parse()
                .map(Token::Real)
                .map_err(|_| SassyError::syntax(at, format!("invalid real literal {s}")))
        } else {
            s.parse()
                .map(Token::Integer)
                .map_err(|_| SassyError::syntax(at, format!("integer literal {s} is out of range")))
        }
    }

    fn read_string(&mut self, quote: char, at: Coordinate) -> Result<Token, SassyError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(SassyError::syntax(at, "unterminated string")),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => return Err(SassyError::syntax(at, "unterminated string")),
                },
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    /// Read the name glued to a sigil (`#`, `.`, `:`, `$`, `@`).
    fn read_name(&mut self) -> String {
        self.read_while(is_ident_char)
    }

    fn next_token(&mut self) -> Result<Spanned, SassyError> {
        self.skip_trivia()?;
        let at = self.here();
        let Some(ch) = self.advance() else {
            return Ok(Spanned { token: Token::Eof, at });
        };

        let glued = self.peek().is_some_and(is_ident_char);
        let token = match ch {
            '0'..='9' => {
                // Put the first digit back so read_number sees the whole literal.
                self.pos -= 1;
                self.column -= 1;
                self.read_number(at)?
            }
            '"' | '\'' => self.read_string(ch, at)?,
            c if is_ident_start(c) => {
                let mut s = String::from(c);
                s.push_str(&self.read_name());
                Token::Ident(s)
            }
            '$' if glued => Token::Variable(self.read_name()),
            '@' if glued => Token::At(self.read_name()),
            '#' if glued => Token::Hash(self.read_name()),
            '.' if glued => Token::Dot(self.read_name()),
            ':' if self.peek().is_some_and(is_ident_start) => Token::ColonName(self.read_name()),
            ':' => Token::Colon,
            '+' => {
                if self.eat(':') {
                    Token::PlusColon
                } else {
                    Token::Plus
                }
            }
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '~' => Token::Tilde,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '!' => {
                if self.eat('=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            '=' if self.eat('=') => Token::EqEq,
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            c => return Err(SassyError::syntax(at, format!("unexpected character {c:?}"))),
        };
        Ok(Spanned { token, at })
    }

    /// Tokenize the whole input; the last token is always [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, SassyError> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = t.token == Token::Eof;
            tokens.push(t);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}
