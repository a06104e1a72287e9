//! MD5 文本词法分析
//!
//! md5mesh / md5anim 都是以空白分隔的文本：关键字、数字、带引号的字符串，
//! 以及 `{ } ( )` 四种括号，`//` 开始的注释到行尾为止。

use glam::Vec3;

use crate::{Md5Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token<'a> {
    Word(&'a str),
    Quoted(&'a str),
    Punct(char),
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{}'", w),
            Token::Quoted(s) => write!(f, "\"{}\"", s),
            Token::Punct(c) => write!(f, "'{}'", c),
        }
    }
}

pub(crate) struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    /// 扫描位置所在行
    scan_line: usize,
    /// 最近一次读取的词所在行，用于错误信息
    line: usize,
    peeked: Option<(Token<'a>, usize)>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            scan_line: 1,
            line: 1,
            peeked: None,
        }
    }

    /// 当前行号（最近一次读取的词所在行）
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn error(&self, message: impl Into<String>) -> Md5Error {
        Md5Error::MalformedData {
            line: self.line,
            message: message.into(),
        }
    }

    pub fn peek(&mut self) -> Result<Option<&Token<'a>>> {
        if self.peeked.is_none() {
            self.peeked = self.scan()?;
        }
        Ok(self.peeked.as_ref().map(|(token, _)| token))
    }

    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        let next = match self.peeked.take() {
            Some(peeked) => Some(peeked),
            None => self.scan()?,
        };
        Ok(next.map(|(token, line)| {
            self.line = line;
            token
        }))
    }

    fn require(&mut self, what: &str) -> Result<Token<'a>> {
        self.next_token()?
            .ok_or_else(|| self.error(format!("unexpected end of input, expected {}", what)))
    }

    /// 读取指定关键字
    pub fn expect_word(&mut self, keyword: &str) -> Result<()> {
        match self.require(keyword)? {
            Token::Word(w) if w == keyword => Ok(()),
            other => Err(self.error(format!("expected '{}', found {}", keyword, other))),
        }
    }

    pub fn expect_punct(&mut self, c: char) -> Result<()> {
        match self.require(&format!("'{}'", c))? {
            Token::Punct(p) if p == c => Ok(()),
            other => Err(self.error(format!("expected '{}', found {}", c, other))),
        }
    }

    pub fn read_word(&mut self) -> Result<&'a str> {
        match self.require("a keyword")? {
            Token::Word(w) => Ok(w),
            other => Err(self.error(format!("expected a keyword, found {}", other))),
        }
    }

    pub fn read_string(&mut self) -> Result<&'a str> {
        match self.require("a quoted string")? {
            Token::Quoted(s) => Ok(s),
            other => Err(self.error(format!("expected a quoted string, found {}", other))),
        }
    }

    pub fn read_int(&mut self) -> Result<i64> {
        match self.require("an integer")? {
            Token::Word(w) => w
                .parse()
                .map_err(|_| self.error(format!("expected an integer, found '{}'", w))),
            other => Err(self.error(format!("expected an integer, found {}", other))),
        }
    }

    /// 读取非负整数（计数、索引）
    pub fn read_count(&mut self) -> Result<usize> {
        let value = self.read_int()?;
        usize::try_from(value).map_err(|_| self.error(format!("expected a non-negative integer, found {}", value)))
    }

    pub fn read_float(&mut self) -> Result<f32> {
        match self.require("a number")? {
            Token::Word(w) => match w.parse::<f32>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(self.error(format!("expected a number, found '{}'", w))),
            },
            other => Err(self.error(format!("expected a number, found {}", other))),
        }
    }

    /// 读取 `( x y z )`
    pub fn read_vec3(&mut self) -> Result<Vec3> {
        self.expect_punct('(')?;
        let v = Vec3::new(self.read_float()?, self.read_float()?, self.read_float()?);
        self.expect_punct(')')?;
        Ok(v)
    }

    fn scan(&mut self) -> Result<Option<(Token<'a>, usize)>> {
        let bytes = self.src.as_bytes();

        loop {
            let Some(&b) = bytes.get(self.pos) else {
                return Ok(None);
            };
            match b {
                b'\n' => {
                    self.scan_line += 1;
                    self.pos += 1;
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                b'/' if bytes.get(self.pos + 1) == Some(&b'/') => {
                    while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let line = self.scan_line;

        let start = self.pos;
        let token = match bytes[start] {
            b'{' | b'}' | b'(' | b')' => {
                self.pos += 1;
                Token::Punct(bytes[start] as char)
            }
            b'"' => {
                let body = start + 1;
                let len = match self.src[body..].find(['"', '\n']) {
                    Some(len) if bytes[body + len] == b'"' => len,
                    _ => {
                        return Err(Md5Error::MalformedData {
                            line,
                            message: "unterminated string".to_string(),
                        })
                    }
                };
                self.pos = body + len + 1;
                Token::Quoted(&self.src[body..body + len])
            }
            _ => {
                while let Some(&b) = bytes.get(self.pos) {
                    if b.is_ascii_whitespace() || matches!(b, b'{' | b'}' | b'(' | b')' | b'"') {
                        break;
                    }
                    if b == b'/' && bytes.get(self.pos + 1) == Some(&b'/') {
                        break;
                    }
                    self.pos += 1;
                }
                Token::Word(&self.src[start..self.pos])
            }
        };
        Ok(Some((token, line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_and_comments() {
        let mut t = Tokenizer::new("MD5Version 10 // header\njoints {\n\t\"origin\"\t-1 ( 0 1.5 -2 )\n}");
        t.expect_word("MD5Version").unwrap();
        assert_eq!(t.read_int().unwrap(), 10);
        t.expect_word("joints").unwrap();
        t.expect_punct('{').unwrap();
        assert_eq!(t.read_string().unwrap(), "origin");
        assert_eq!(t.line(), 3);
        assert_eq!(t.read_int().unwrap(), -1);
        assert_eq!(t.read_vec3().unwrap(), Vec3::new(0.0, 1.5, -2.0));
        assert_eq!(t.peek().unwrap(), Some(&Token::Punct('}')));
        t.expect_punct('}').unwrap();
        assert_eq!(t.line(), 4);
        assert!(t.next_token().unwrap().is_none());
    }

    #[test]
    fn test_adjacent_punctuation() {
        let mut t = Tokenizer::new("(1 2 3)(4\t5\t6)");
        assert_eq!(t.read_vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.read_vec3().unwrap(), Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_errors_carry_line() {
        let mut t = Tokenizer::new("numJoints\n\nabc");
        t.expect_word("numJoints").unwrap();
        match t.read_int() {
            Err(Md5Error::MalformedData { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }

        let mut t = Tokenizer::new("\"open\nclose\"");
        assert!(matches!(t.read_string(), Err(Md5Error::MalformedData { line: 1, .. })));

        let mut t = Tokenizer::new("-3");
        assert!(t.read_count().is_err());
        let mut t = Tokenizer::new("");
        assert!(t.read_float().is_err());
    }
}
