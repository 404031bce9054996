//! Rule DSL parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found tokens.
//!
//! ```text
//! rule    := ABOVE(op, op) | BELOW(op, op) | EQUALS(op, op)
//!          | CROSS_ABOVE(op, op) | CROSS_BELOW(op, op)
//!          | BETWEEN(op, number, number)
//!          | AND(rule, rule, ...) | OR(rule, rule, ...) | NOT(rule)
//!          | CONSECUTIVE(rule, n) | ANY_OF(rule, n)
//! op      := number | column | column * number
//! column  := factor name, optionally suffixed `_pre<k>`
//! ```

use crate::domain::error::ParseError;
use crate::domain::factor::FactorRef;
use crate::domain::rule::{Operand, Rule};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            Ok(())
        } else {
            let found = self.peek_word();
            Err(self.error(format!("expected '{}', found '{}'", keyword, found)))
        }
    }

    fn word_at_cursor(&self) -> &'a str {
        let remaining = self.remaining();
        let end = remaining
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(remaining.len());
        &remaining[..end]
    }

    fn peek_word(&self) -> String {
        let word = self.word_at_cursor();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word.to_string()
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_count(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let digits = self.remaining().bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(self.error("expected integer"));
        }
        self.pos += digits;

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<usize>() {
            Ok(0) => Err(ParseError {
                message: "bar count must be at least 1".to_string(),
                position: start,
            }),
            Ok(n) => Ok(n),
            Err(_) => Err(ParseError {
                message: format!("invalid integer: {}", num_str),
                position: start,
            }),
        }
    }

    fn parse_column(&mut self) -> Result<FactorRef, ParseError> {
        self.skip_whitespace();
        let word = self.word_at_cursor();
        if word.is_empty() {
            return Err(self.error(format!("expected column, found '{}'", self.peek_word())));
        }
        let column = word
            .parse::<FactorRef>()
            .map_err(|e| self.error(e.to_string()))?;
        self.pos += word.len();
        Ok(column)
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        let column = self.parse_column()?;
        self.skip_whitespace();
        if self.peek() == Some('*') {
            self.advance();
            let multiplier = self.parse_number()?;
            return Ok(Operand::Scaled { column, multiplier });
        }
        Ok(Operand::Column(column))
    }

    fn parse_comparison<F>(&mut self, keyword: &str, build: F) -> Result<Rule, ParseError>
    where
        F: FnOnce(Operand, Operand) -> Rule,
    {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        Ok(build(left, right))
    }

    fn parse_between(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("BETWEEN")?;
        self.expect_char('(')?;

        let operand = self.parse_operand()?;
        self.expect_char(',')?;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        let upper = self.parse_number()?;
        self.expect_char(')')?;

        Ok(Rule::Between {
            operand,
            lower,
            upper,
        })
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();

        if self.peek_keyword("CROSS_ABOVE") {
            return self.parse_comparison("CROSS_ABOVE", |left, right| Rule::CrossAbove {
                left,
                right,
            });
        }
        if self.peek_keyword("CROSS_BELOW") {
            return self.parse_comparison("CROSS_BELOW", |left, right| Rule::CrossBelow {
                left,
                right,
            });
        }
        if self.peek_keyword("ABOVE") {
            return self.parse_comparison("ABOVE", |left, right| Rule::Above { left, right });
        }
        if self.peek_keyword("BELOW") {
            return self.parse_comparison("BELOW", |left, right| Rule::Below { left, right });
        }
        if self.peek_keyword("EQUALS") {
            return self.parse_comparison("EQUALS", |left, right| Rule::Equals { left, right });
        }
        if self.peek_keyword("BETWEEN") {
            return self.parse_between();
        }

        if self.peek_keyword("AND") {
            return self.parse_variadic("AND").map(Rule::And);
        }
        if self.peek_keyword("OR") {
            return self.parse_variadic("OR").map(Rule::Or);
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }

        if self.peek_keyword("CONSECUTIVE") {
            let (rule, count) = self.parse_temporal("CONSECUTIVE")?;
            return Ok(Rule::Consecutive { rule, count });
        }
        if self.peek_keyword("ANY_OF") {
            let (rule, count) = self.parse_temporal("ANY_OF")?;
            return Ok(Rule::AnyOf { rule, count });
        }

        Err(self.error(format!("expected rule, found '{}'", self.peek_word())))
    }

    /// `KEYWORD(rule, rule, ...)` with at least two children.
    fn parse_variadic(&mut self, keyword: &str) -> Result<Vec<Rule>, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut rules = vec![self.parse_rule()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(self.error(format!("{} requires at least 2 rules", keyword)));
        }
        Ok(rules)
    }

    fn parse_not(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(')')?;
        Ok(Rule::Not(Box::new(rule)))
    }

    fn parse_temporal(&mut self, keyword: &str) -> Result<(Box<Rule>, usize), ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(',')?;
        let count = self.parse_count()?;
        self.expect_char(')')?;
        Ok((Box::new(rule), count))
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after rule: '{}'",
                self.remaining()
            )));
        }
        Ok(rule)
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
