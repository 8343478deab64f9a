//! XPath expression compiler
//!
//! Compiles XPath 1.0 expressions into an [`Expr`] tree that the evaluator
//! walks over a parsed document: location paths on every axis except
//! `namespace`, filter expressions such as `(//a)[1]`, the boolean,
//! comparison and arithmetic operators, and the core function library
//! without `id()` and `lang()`. Variable references are not supported.

use super::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(LocationPath),
    /// `primary[predicate]...`, optionally continued by `/step...`
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
}

/// A location path such as `/a/b`, `//work:archiveInfo/@access` or `@tag`
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Starts from the document root instead of the context node
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    SelfNode,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

impl Axis {
    fn from_name(name: &str, position: usize) -> Result<Self, XPathError> {
        Ok(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfNode,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "namespace" => return Err(XPathError::unsupported(position, "the namespace axis")),
            _ => return Err(XPathError::syntax(position, format!("unknown axis '{}'", name))),
        })
    }
}

/// Qualified name as written in the query (prefix not yet resolved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `name` or `prefix:name`
    Name(QName),
    /// `*` or `prefix:*`
    Wildcard(Option<String>),
    Text,
    Comment,
    /// `processing-instruction()`, optionally restricted to one target
    ProcessingInstruction(Option<String>),
    Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// XPath 1.0 core library functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Last,
    Position,
    Count,
    LocalName,
    NamespaceUri,
    Name,
    String,
    Concat,
    StartsWith,
    Contains,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    Boolean,
    Not,
    True,
    False,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    fn from_name(name: &str, position: usize) -> Result<Self, XPathError> {
        Ok(match name {
            "last" => Function::Last,
            "position" => Function::Position,
            "count" => Function::Count,
            "local-name" => Function::LocalName,
            "namespace-uri" => Function::NamespaceUri,
            "name" => Function::Name,
            "string" => Function::String,
            "concat" => Function::Concat,
            "starts-with" => Function::StartsWith,
            "contains" => Function::Contains,
            "substring-before" => Function::SubstringBefore,
            "substring-after" => Function::SubstringAfter,
            "substring" => Function::Substring,
            "string-length" => Function::StringLength,
            "normalize-space" => Function::NormalizeSpace,
            "translate" => Function::Translate,
            "boolean" => Function::Boolean,
            "not" => Function::Not,
            "true" => Function::True,
            "false" => Function::False,
            "number" => Function::Number,
            "sum" => Function::Sum,
            "floor" => Function::Floor,
            "ceiling" => Function::Ceiling,
            "round" => Function::Round,
            "id" | "lang" => return Err(XPathError::unsupported(position, format!("the {}() function", name))),
            _ => return Err(XPathError::syntax(position, format!("unknown function '{}()'", name))),
        })
    }

    /// Accepted argument counts, no upper bound when `None`
    fn arity(self) -> (usize, Option<usize>) {
        use Function::*;
        match self {
            Last | Position | True | False => (0, Some(0)),
            LocalName | NamespaceUri | Name | String | StringLength | NormalizeSpace | Number => (0, Some(1)),
            Count | Boolean | Not | Sum | Floor | Ceiling | Round => (1, Some(1)),
            StartsWith | Contains | SubstringBefore | SubstringAfter => (2, Some(2)),
            Substring => (2, Some(3)),
            Translate => (3, Some(3)),
            Concat => (2, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    /// `*` as a name test
    Star,
    /// `*` as multiplication
    Multiply,
    And,
    Or,
    Div,
    Mod,
    Dot,
    DotDot,
    ColonColon,
    /// NCName, `prefix:local` or `prefix:*`
    Name(String),
    Variable(String),
    Literal(String),
    Number(f64),
}

impl Token {
    /// After these tokens `*` is a name test and `and`/`or`/`div`/`mod` are names
    fn expects_operand(&self) -> bool {
        matches!(
            self,
            Token::At
                | Token::ColonColon
                | Token::LParen
                | Token::LBracket
                | Token::Comma
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Eq
                | Token::Ne
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
                | Token::Plus
                | Token::Minus
                | Token::Multiply
                | Token::And
                | Token::Or
                | Token::Div
                | Token::Mod
        )
    }
}

/// Compile an XPath expression
pub fn compile(query: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(query)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some((position, token)) = parser.peek_with_pos() {
        return Err(XPathError::syntax(position, format!("unexpected {:?}", token)));
    }
    Ok(expr)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_node_type(name: &str) -> bool {
    matches!(name, "text" | "node" | "comment" | "processing-instruction")
}

fn tokenize(query: &str) -> Result<Vec<(usize, Token)>, XPathError> {
    let chars: Vec<(usize, char)> = query.char_indices().collect();
    let mut tokens: Vec<(usize, Token)> = Vec::new();
    let mut i = 0;

    let at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let collect = |from: usize, to: usize| -> String { chars[from..to].iter().map(|&(_, ch)| ch).collect() };

    while let Some(&(offset, c)) = chars.get(i) {
        let operator_position = tokens.last().is_some_and(|(_, t)| !t.expects_operand());
        let (token, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if at(i + 1) == Some('/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '@' => (Token::At, 1),
            ',' => (Token::Comma, 1),
            '|' => (Token::Pipe, 1),
            '=' => (Token::Eq, 1),
            '!' if at(i + 1) == Some('=') => (Token::Ne, 2),
            '<' if at(i + 1) == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if at(i + 1) == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' if operator_position => (Token::Multiply, 1),
            '*' => (Token::Star, 1),
            ':' if at(i + 1) == Some(':') => (Token::ColonColon, 2),
            '.' if at(i + 1) == Some('.') => (Token::DotDot, 2),
            '.' if !at(i + 1).is_some_and(|ch| ch.is_ascii_digit()) => (Token::Dot, 1),
            '\'' | '"' => {
                let start = i + 1;
                let mut end = start;
                while at(end).is_some_and(|ch| ch != c) {
                    end += 1;
                }
                if at(end).is_none() {
                    return Err(XPathError::syntax(offset, "unterminated string literal"));
                }
                (Token::Literal(collect(start, end)), end + 1 - i)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = i;
                let mut seen_dot = false;
                while let Some(ch) = at(end) {
                    if ch == '.' && !seen_dot {
                        seen_dot = true;
                    } else if !ch.is_ascii_digit() {
                        break;
                    }
                    end += 1;
                }
                let number = collect(i, end)
                    .parse()
                    .map_err(|_| XPathError::syntax(offset, "invalid number"))?;
                (Token::Number(number), end - i)
            }
            '$' => {
                let mut end = i + 1;
                while at(end).is_some_and(|ch| is_name_char(ch) || ch == ':') {
                    end += 1;
                }
                (Token::Variable(collect(i + 1, end)), end - i)
            }
            c if is_name_start(c) => {
                let mut end = i;
                while at(end).is_some_and(is_name_char) {
                    end += 1;
                }
                let mut name = collect(i, end);
                // prefix:local or prefix:*, but not an axis separator
                if at(end) == Some(':') && at(end + 1) != Some(':') {
                    match at(end + 1) {
                        Some('*') => {
                            name.push_str(":*");
                            end += 2;
                        }
                        Some(ch) if is_name_start(ch) => {
                            let local_start = end + 1;
                            end = local_start;
                            while at(end).is_some_and(is_name_char) {
                                end += 1;
                            }
                            name.push(':');
                            name.push_str(&collect(local_start, end));
                        }
                        _ => return Err(XPathError::syntax(offset, "dangling namespace prefix")),
                    }
                }
                let token = match name.as_str() {
                    "and" if operator_position => Token::And,
                    "or" if operator_position => Token::Or,
                    "div" if operator_position => Token::Div,
                    "mod" if operator_position => Token::Mod,
                    _ => Token::Name(name),
                };
                (token, end - i)
            }
            other => {
                return Err(XPathError::syntax(offset, format!("unexpected character '{}'", other)));
            }
        };
        i += width;
        tokens.push((offset, token));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(_, t)| t)
    }

    fn peek_with_pos(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(p, t)| (*p, t))
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(p, _)| *p)
            .unwrap_or(0)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), XPathError> {
        let position = self.position();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(XPathError::syntax(
                position,
                format!("expected {:?}, found {:?}", expected, token),
            )),
            None => Err(XPathError::syntax(position, format!("expected {:?}", expected))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            lhs = Expr::Or(Box::new(lhs), Box::new(self.parse_and()?));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::And) {
            lhs = Expr::And(Box::new(lhs), Box::new(self.parse_equality()?));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CmpOp::Eq,
                Some(Token::Ne) => CmpOp::Ne,
                _ => return Ok(lhs),
            };
            self.next();
            lhs = Expr::Compare(op, Box::new(lhs), Box::new(self.parse_relational()?));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::Le) => CmpOp::Le,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::Ge) => CmpOp::Ge,
                _ => return Ok(lhs),
            };
            self.next();
            lhs = Expr::Compare(op, Box::new(lhs), Box::new(self.parse_additive()?));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.next();
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(self.parse_multiplicative()?));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => ArithOp::Mul,
                Some(Token::Div) => ArithOp::Div,
                Some(Token::Mod) => ArithOp::Mod,
                _ => return Ok(lhs),
            };
            self.next();
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(self.parse_unary()?));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.parse_path_expr()?;
        while self.eat(&Token::Pipe) {
            lhs = Expr::Union(Box::new(lhs), Box::new(self.parse_path_expr()?));
        }
        Ok(lhs)
    }

    fn parse_path_expr(&mut self) -> Result<Expr, XPathError> {
        let filter = match (self.peek(), self.peek_at(1)) {
            (Some(Token::LParen | Token::Literal(_) | Token::Number(_) | Token::Variable(_)), _) => true,
            (Some(Token::Name(name)), Some(Token::LParen)) => !is_node_type(name),
            _ => false,
        };
        if !filter {
            return Ok(Expr::Path(self.parse_location_path()?));
        }

        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let mut steps = Vec::new();
        self.parse_relative_tail(&mut steps)?;
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        let position = self.position();
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Literal(literal)) => Ok(Expr::Literal(literal)),
            Some(Token::Number(number)) => Ok(Expr::Number(number)),
            Some(Token::Variable(name)) => Err(XPathError::unsupported(position, format!("variable ${}", name))),
            Some(Token::Name(name)) => self.parse_call(position, &name),
            Some(token) => Err(XPathError::syntax(position, format!("unexpected {:?}", token))),
            None => Err(XPathError::syntax(position, "unexpected end of expression")),
        }
    }

    fn parse_call(&mut self, position: usize, name: &str) -> Result<Expr, XPathError> {
        let function = Function::from_name(name, position)?;
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_or()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen)?;
        }

        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(XPathError::syntax(
                position,
                format!("{}() does not take {} argument(s)", name, args.len()),
            ));
        }
        Ok(Expr::Call(function, args))
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn parse_location_path(&mut self) -> Result<LocationPath, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.next();
                // a lone "/" selects the root node
                if !self.starts_step() {
                    return Ok(LocationPath { absolute: true, steps });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.next();
                steps.push(descendant_or_self_step());
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        self.parse_relative_tail(&mut steps)?;
        Ok(LocationPath { absolute, steps })
    }

    /// `/step` and `//step` continuations
    fn parse_relative_tail(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.next();
                }
                Some(Token::DoubleSlash) => {
                    self.next();
                    steps.push(descendant_or_self_step());
                }
                _ => return Ok(()),
            }
            steps.push(self.parse_step()?);
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot)
        )
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        let position = self.position();
        let axis = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Dot), _) => {
                self.next();
                return Ok(Step { axis: Axis::SelfNode, test: NodeTest::Node, predicates: Vec::new() });
            }
            (Some(Token::DotDot), _) => {
                self.next();
                return Ok(Step { axis: Axis::Parent, test: NodeTest::Node, predicates: Vec::new() });
            }
            (Some(Token::At), _) => {
                self.next();
                Axis::Attribute
            }
            (Some(Token::Name(name)), Some(Token::ColonColon)) => {
                let axis = Axis::from_name(name, position)?;
                self.next();
                self.next();
                axis
            }
            _ => Axis::Child,
        };

        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step { axis, test, predicates })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, XPathError> {
        let position = self.position();
        match self.next() {
            Some(Token::Star) => Ok(NodeTest::Wildcard(None)),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.next();
                let test = match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => match self.peek().cloned() {
                        Some(Token::Literal(target)) => {
                            self.next();
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                    _ => {
                        return Err(XPathError::syntax(
                            position,
                            format!("expected node test, found function {}()", name),
                        ))
                    }
                };
                self.expect(Token::RParen)?;
                Ok(test)
            }
            Some(Token::Name(name)) => Ok(match name.split_once(':') {
                Some((prefix, "*")) => NodeTest::Wildcard(Some(prefix.to_string())),
                Some((prefix, local)) => NodeTest::Name(QName {
                    prefix: Some(prefix.to_string()),
                    local: local.to_string(),
                }),
                None => NodeTest::Name(QName { prefix: None, local: name }),
            }),
            Some(token) => Err(XPathError::syntax(position, format!("expected node test, found {:?}", token))),
            None => Err(XPathError::syntax(position, "expected node test")),
        }
    }
}

fn descendant_or_self_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}
