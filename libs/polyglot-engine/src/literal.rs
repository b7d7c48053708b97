//! Python literal parsing
//!
//! Programs in the interpreted language print containers with their own
//! `repr` (`[1, 'a', None]`, `(1, 2)`, `{'k': True}`), which is not JSON.
//! This module reads that notation into `serde_json::Value` so outputs can be
//! compared structurally.

use serde_json::{Map, Number, Value};

/// Deepest container nesting accepted, matching serde_json's limit
const MAX_DEPTH: usize = 128;

/// Parse a complete Python literal; trailing garbage is a failure
pub fn parse_python_literal(text: &str) -> Option<Value> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    (parser.pos == parser.chars.len()).then_some(value)
}

/// Deep equality where numbers compare by value (`3` == `3.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < 1e-9,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            open @ ('[' | '(' | '{') => {
                if self.depth >= MAX_DEPTH {
                    return None;
                }
                self.pos += 1;
                self.depth += 1;
                let value = match open {
                    '[' => self.sequence(']').map(Value::Array),
                    '(' => self.sequence(')').map(Value::Array),
                    _ => self.dict(),
                };
                self.depth -= 1;
                value
            }
            '\'' | '"' => self.string().map(Value::String),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() => self.keyword(),
            _ => None,
        }
    }

    fn sequence(&mut self, close: char) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Some(items);
            }
            items.push(self.value()?);
            if !self.eat(',') {
                return self.eat(close).then_some(items);
            }
        }
    }

    fn dict(&mut self) -> Option<Value> {
        let mut map = Map::new();
        loop {
            if self.eat('}') {
                return Some(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            if !self.eat(':') {
                return None;
            }
            let value = self.value()?;
            map.insert(key, value);
            if !self.eat(',') {
                return self.eat('}').then_some(Value::Object(map));
            }
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                c if c == quote => return Some(out),
                '\\' => {
                    let escaped = match self.bump()? {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    };
                    out.push(escaped);
                }
                c => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '_'))
        {
            // exponent sign
            if matches!(self.peek(), Some('e') | Some('E'))
                && matches!(self.chars.get(self.pos + 1), Some('-') | Some('+'))
            {
                self.pos += 1;
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();

        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::Number(i.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
    }

    fn keyword(&mut self) -> Option<Value> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "None" => Some(Value::Null),
            "True" => Some(Value::Bool(true)),
            "False" => Some(Value::Bool(false)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(parse_python_literal("None"), Some(Value::Null));
        assert_eq!(parse_python_literal(" True "), Some(json!(true)));
        assert_eq!(parse_python_literal("-42"), Some(json!(-42)));
        assert_eq!(parse_python_literal("2.5e-3"), Some(json!(0.0025)));
        assert_eq!(parse_python_literal("'it''"), None);
        assert_eq!(parse_python_literal(r#"'a\'b'"#), Some(json!("a'b")));
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            parse_python_literal("[1, 'a', None, (2, 3)]"),
            Some(json!([1, "a", null, [2, 3]]))
        );
        assert_eq!(
            parse_python_literal("{'k': [True, False], 1: 'one',}"),
            Some(json!({"k": [true, false], "1": "one"}))
        );
        assert_eq!(parse_python_literal("()"), Some(json!([])));
    }

    #[test]
    fn test_rejects_non_literals() {
        assert_eq!(parse_python_literal("foo(1)"), None);
        assert_eq!(parse_python_literal("[1, 2"), None);
        assert_eq!(parse_python_literal("1 2"), None);
        assert_eq!(parse_python_literal(""), None);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = format!("{}1{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse_python_literal(&nested).is_some());

        let too_deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(parse_python_literal(&too_deep), None);
        assert_eq!(parse_python_literal(&"[".repeat(200_000)), None);
    }

    #[test]
    fn test_values_equal_is_numeric_aware() {
        assert!(values_equal(&json!([1, 2.0]), &json!([1.0, 2])));
        assert!(values_equal(&json!({"a": 1}), &json!({"a": 1.0})));
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!values_equal(&json!("1"), &json!(1)));
    }
}
