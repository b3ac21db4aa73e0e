//! Parser for textual type expressions such as `Shop.Entity<long>` or
//! `DbSet<Shop.Order>` or `int?`.

use crate::error::{Result, SyncError};

/// Parsed, unresolved type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeExpr {
    pub name: String,
    pub arguments: Vec<TypeExpr>,
    /// Trailing `?`, shorthand for `System.Nullable<T>`.
    pub nullable: bool,
}

/// Parse a complete type expression.
pub(crate) fn parse(input: &str) -> Result<TypeExpr> {
    let mut parser = Parser {
        input,
        chars: input.char_indices().collect(),
        pos: 0,
    };
    let expr = parser.expr()?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.error(&format!("unexpected '{}'", c)));
    }
    Ok(expr)
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn expr(&mut self) -> Result<TypeExpr> {
        self.skip_whitespace();
        let name = self.dotted_name()?;
        self.skip_whitespace();

        let mut arguments = Vec::new();
        if self.eat('<') {
            loop {
                arguments.push(self.expr()?);
                self.skip_whitespace();
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return Err(self.error("expected ',' or '>'"));
            }
        }

        self.skip_whitespace();
        let nullable = self.eat('?');

        Ok(TypeExpr {
            name,
            arguments,
            nullable,
        })
    }

    fn dotted_name(&mut self) -> Result<String> {
        let mut name = self.identifier()?;
        while self.peek() == Some('.') {
            self.pos += 1;
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn identifier(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        if self.chars[start].1.is_ascii_digit() {
            return Err(self.error("identifier cannot start with a digit"));
        }
        Ok(self.chars[start..self.pos].iter().map(|(_, c)| c).collect())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> SyncError {
        let offset = self
            .chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len());
        SyncError::Model(format!(
            "invalid type expression {:?} at offset {}: {}",
            self.input, offset, message
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(name: &str) -> TypeExpr {
        TypeExpr {
            name: name.to_string(),
            arguments: Vec::new(),
            nullable: false,
        }
    }

    #[test]
    fn test_parse_dotted_name() {
        assert_eq!(parse("Shop.Orders.Order").unwrap(), simple("Shop.Orders.Order"));
    }

    #[test]
    fn test_parse_nested_generic_arguments() {
        let expr = parse("Dictionary<string, List<Shop.Order>>").unwrap();
        assert_eq!(expr.name, "Dictionary");
        assert_eq!(expr.arguments.len(), 2);
        assert_eq!(expr.arguments[0], simple("string"));
        assert_eq!(expr.arguments[1].name, "List");
        assert_eq!(expr.arguments[1].arguments, vec![simple("Shop.Order")]);
    }

    #[test]
    fn test_parse_nullable_shorthand() {
        let expr = parse("  long? ").unwrap();
        assert_eq!(expr.name, "long");
        assert!(expr.nullable);
    }

    #[test]
    fn test_parse_rejects_unclosed_argument_list() {
        let err = parse("DbSet<Shop.Order").unwrap_err();
        assert!(err.to_string().contains("expected ',' or '>'"));
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        assert!(parse("Shop.Order]").is_err());
        assert!(parse("Shop..Order").is_err());
        assert!(parse("").is_err());
        assert!(parse("1Order").is_err());
    }
}
