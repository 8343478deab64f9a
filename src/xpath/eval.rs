//! XPath evaluation over `roxmltree` documents

use std::collections::HashMap;

use roxmltree::{Document, Node};

use super::parser::{ArithOp, Axis, CmpOp, Expr, Function, LocationPath, NodeTest, QName, Step};
use super::XPathError;

/// Prefix to namespace URI bindings visible to queries.
///
/// Query prefixes are independent of the prefixes used inside the document:
/// only the URI they resolve to matters.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    bindings: HashMap<String, String>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) `prefix` to `uri`
    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    pub fn resolve(&self, prefix: &str) -> Result<&str, XPathError> {
        self.bindings
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| XPathError::UnboundPrefix(prefix.to_string()))
    }

    fn namespace_of(&self, name: &QName) -> Result<Option<&str>, XPathError> {
        name.prefix.as_deref().map(|p| self.resolve(p)).transpose()
    }
}

/// A node selected by a query: a tree node or one attribute of an element
#[derive(Clone, Copy)]
enum Item<'a, 'input> {
    Node(Node<'a, 'input>),
    Attribute(Node<'a, 'input>, usize),
}

impl<'a, 'input> Item<'a, 'input> {
    /// Document order key; attributes sort after their element
    fn key(&self) -> (usize, usize) {
        match self {
            Item::Node(node) => (node.id().get_usize(), 0),
            Item::Attribute(owner, index) => (owner.id().get_usize(), index + 1),
        }
    }

    fn string_value(&self) -> String {
        match self {
            Item::Node(node) if node.is_element() || node.is_root() => node
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect(),
            Item::Node(node) if node.is_pi() => node
                .pi()
                .and_then(|pi| pi.value)
                .unwrap_or_default()
                .to_string(),
            Item::Node(node) => node.text().unwrap_or_default().to_string(),
            Item::Attribute(owner, index) => owner
                .attributes()
                .nth(*index)
                .map(|a| a.value().to_string())
                .unwrap_or_default(),
        }
    }

    fn local_name(&self) -> String {
        match self {
            Item::Node(node) if node.is_element() => node.tag_name().name().to_string(),
            Item::Node(node) => node.pi().map(|pi| pi.target.to_string()).unwrap_or_default(),
            Item::Attribute(owner, index) => owner
                .attributes()
                .nth(*index)
                .map(|a| a.name().to_string())
                .unwrap_or_default(),
        }
    }

    fn namespace_uri(&self) -> String {
        match self {
            Item::Node(node) => node.tag_name().namespace().unwrap_or_default().to_string(),
            Item::Attribute(owner, index) => owner
                .attributes()
                .nth(*index)
                .and_then(|a| a.namespace())
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// `prefix:local` using the prefix the document declares for the namespace
    fn qualified_name(&self) -> String {
        let local = self.local_name();
        let uri = self.namespace_uri();
        let scope = match self {
            Item::Node(node) => *node,
            Item::Attribute(owner, _) => *owner,
        };
        match scope.lookup_prefix(&uri) {
            Some(prefix) if !uri.is_empty() && !prefix.is_empty() => format!("{}:{}", prefix, local),
            _ => local,
        }
    }
}

/// Result of evaluating an expression
enum Value<'a, 'input> {
    /// Always in document order without duplicates
    Nodes(Vec<Item<'a, 'input>>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Value<'_, '_> {
    fn boolean(&self) -> bool {
        match self {
            Value::Nodes(items) => !items.is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }

    fn number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => string_to_number(&self.string()),
        }
    }

    fn string(&self) -> String {
        match self {
            Value::Nodes(items) => items.first().map(Item::string_value).unwrap_or_default(),
            Value::String(s) => s.clone(),
            Value::Number(n) => number_to_string(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }
}

#[derive(Clone, Copy)]
struct Context<'a, 'input> {
    item: Item<'a, 'input>,
    position: usize,
    size: usize,
}

/// Evaluate a compiled expression.
///
/// A node-set result yields the string values of the selected nodes in
/// document order, one entry per distinct node; a string, number or boolean
/// result yields its string value. Relative paths are evaluated from the
/// document element.
pub fn evaluate(
    expr: &Expr,
    doc: &Document<'_>,
    namespaces: &Namespaces,
) -> Result<Vec<String>, XPathError> {
    let evaluator = Evaluator { doc, namespaces };
    let context = Context {
        item: Item::Node(doc.root_element()),
        position: 1,
        size: 1,
    };
    Ok(match evaluator.eval(expr, context)? {
        Value::Nodes(items) => items.iter().map(Item::string_value).collect(),
        scalar => vec![scalar.string()],
    })
}

fn sort_document_order(items: &mut Vec<Item<'_, '_>>) {
    items.sort_by_key(Item::key);
    items.dedup_by_key(|item| item.key());
}

struct Evaluator<'a, 'input, 'n> {
    doc: &'a Document<'input>,
    namespaces: &'n Namespaces,
}

impl<'a, 'input> Evaluator<'a, 'input, '_> {
    fn eval(&self, expr: &Expr, ctx: Context<'a, 'input>) -> Result<Value<'a, 'input>, XPathError> {
        Ok(match expr {
            Expr::Or(lhs, rhs) => Value::Boolean(self.eval(lhs, ctx)?.boolean() || self.eval(rhs, ctx)?.boolean()),
            Expr::And(lhs, rhs) => Value::Boolean(self.eval(lhs, ctx)?.boolean() && self.eval(rhs, ctx)?.boolean()),
            Expr::Compare(op, lhs, rhs) => Value::Boolean(compare(*op, self.eval(lhs, ctx)?, self.eval(rhs, ctx)?)),
            Expr::Arith(op, lhs, rhs) => {
                let a = self.eval(lhs, ctx)?.number();
                let b = self.eval(rhs, ctx)?.number();
                Value::Number(match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                    // truncating remainder, as XPath's mod
                    ArithOp::Mod => a % b,
                })
            }
            Expr::Negate(operand) => Value::Number(-self.eval(operand, ctx)?.number()),
            Expr::Union(lhs, rhs) => {
                let mut items = self.node_set(lhs, ctx)?;
                items.extend(self.node_set(rhs, ctx)?);
                sort_document_order(&mut items);
                Value::Nodes(items)
            }
            Expr::Path(path) => Value::Nodes(self.location_path(path, ctx.item)?),
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let items = self.filter(self.node_set(primary, ctx)?, predicates)?;
                Value::Nodes(self.steps(items, steps)?)
            }
            Expr::Literal(literal) => Value::String(literal.clone()),
            Expr::Number(number) => Value::Number(*number),
            Expr::Call(function, args) => self.call(*function, args, ctx)?,
        })
    }

    fn node_set(&self, expr: &Expr, ctx: Context<'a, 'input>) -> Result<Vec<Item<'a, 'input>>, XPathError> {
        match self.eval(expr, ctx)? {
            Value::Nodes(items) => Ok(items),
            _ => Err(XPathError::Type("expression does not select a node-set".to_string())),
        }
    }

    fn location_path(
        &self,
        path: &LocationPath,
        context: Item<'a, 'input>,
    ) -> Result<Vec<Item<'a, 'input>>, XPathError> {
        let start = if path.absolute { Item::Node(self.doc.root()) } else { context };
        self.steps(vec![start], &path.steps)
    }

    fn steps(&self, items: Vec<Item<'a, 'input>>, steps: &[Step]) -> Result<Vec<Item<'a, 'input>>, XPathError> {
        let mut current = items;
        for step in steps {
            if current.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for item in &current {
                let mut matched = Vec::new();
                for candidate in axis_candidates(step.axis, *item) {
                    if node_test_matches(&step.test, step.axis, candidate, self.namespaces)? {
                        matched.push(candidate);
                    }
                }
                // positions count along the axis, before reordering
                next.extend(self.filter(matched, &step.predicates)?);
            }
            sort_document_order(&mut next);
            current = next;
        }
        Ok(current)
    }

    fn filter(&self, items: Vec<Item<'a, 'input>>, predicates: &[Expr]) -> Result<Vec<Item<'a, 'input>>, XPathError> {
        let mut current = items;
        for predicate in predicates {
            let size = current.len();
            let mut kept = Vec::with_capacity(size);
            for (index, item) in current.into_iter().enumerate() {
                let ctx = Context {
                    item,
                    position: index + 1,
                    size,
                };
                let keep = match self.eval(predicate, ctx)? {
                    Value::Number(n) => n == (index + 1) as f64,
                    other => other.boolean(),
                };
                if keep {
                    kept.push(item);
                }
            }
            current = kept;
        }
        Ok(current)
    }

    fn call(&self, function: Function, args: &[Expr], ctx: Context<'a, 'input>) -> Result<Value<'a, 'input>, XPathError> {
        let string_arg = |index: usize| -> Result<String, XPathError> { Ok(self.eval(&args[index], ctx)?.string()) };
        let number_arg = |index: usize| -> Result<f64, XPathError> { Ok(self.eval(&args[index], ctx)?.number()) };
        // first node of the optional argument, else the context node
        let node_arg = || -> Result<Option<Item<'a, 'input>>, XPathError> {
            match args.first() {
                Some(arg) => Ok(self.node_set(arg, ctx)?.into_iter().next()),
                None => Ok(Some(ctx.item)),
            }
        };
        let string_or_context = || -> Result<String, XPathError> {
            match args.first() {
                Some(arg) => Ok(self.eval(arg, ctx)?.string()),
                None => Ok(ctx.item.string_value()),
            }
        };

        Ok(match function {
            Function::Last => Value::Number(ctx.size as f64),
            Function::Position => Value::Number(ctx.position as f64),
            Function::Count => Value::Number(self.node_set(&args[0], ctx)?.len() as f64),
            Function::LocalName => Value::String(node_arg()?.map(|i| i.local_name()).unwrap_or_default()),
            Function::NamespaceUri => Value::String(node_arg()?.map(|i| i.namespace_uri()).unwrap_or_default()),
            Function::Name => Value::String(node_arg()?.map(|i| i.qualified_name()).unwrap_or_default()),
            Function::String => Value::String(string_or_context()?),
            Function::Concat => {
                let mut joined = String::new();
                for arg in args {
                    joined.push_str(&self.eval(arg, ctx)?.string());
                }
                Value::String(joined)
            }
            Function::StartsWith => Value::Boolean(string_arg(0)?.starts_with(string_arg(1)?.as_str())),
            Function::Contains => Value::Boolean(string_arg(0)?.contains(string_arg(1)?.as_str())),
            Function::SubstringBefore => {
                let (s, pattern) = (string_arg(0)?, string_arg(1)?);
                Value::String(s.find(pattern.as_str()).map(|i| s[..i].to_string()).unwrap_or_default())
            }
            Function::SubstringAfter => {
                let (s, pattern) = (string_arg(0)?, string_arg(1)?);
                Value::String(
                    s.find(pattern.as_str())
                        .map(|i| s[i + pattern.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            Function::Substring => {
                let s = string_arg(0)?;
                let start = round(number_arg(1)?);
                let end = match args.get(2) {
                    Some(_) => start + round(number_arg(2)?),
                    None => f64::INFINITY,
                };
                Value::String(
                    s.chars()
                        .enumerate()
                        .filter(|(i, _)| {
                            let position = (i + 1) as f64;
                            position >= start && position < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            Function::StringLength => Value::Number(string_or_context()?.chars().count() as f64),
            Function::NormalizeSpace => Value::String(
                string_or_context()?
                    .split(is_xml_space)
                    .filter(|word| !word.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Function::Translate => {
                let s = string_arg(0)?;
                let from: Vec<char> = string_arg(1)?.chars().collect();
                let to: Vec<char> = string_arg(2)?.chars().collect();
                Value::String(
                    s.chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(index) => to.get(index).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            Function::Boolean => Value::Boolean(self.eval(&args[0], ctx)?.boolean()),
            Function::Not => Value::Boolean(!self.eval(&args[0], ctx)?.boolean()),
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
            Function::Number => Value::Number(match args.first() {
                Some(arg) => self.eval(arg, ctx)?.number(),
                None => string_to_number(&ctx.item.string_value()),
            }),
            Function::Sum => Value::Number(
                self.node_set(&args[0], ctx)?
                    .iter()
                    .map(|item| string_to_number(&item.string_value()))
                    .sum(),
            ),
            Function::Floor => Value::Number(number_arg(0)?.floor()),
            Function::Ceiling => Value::Number(number_arg(0)?.ceil()),
            Function::Round => Value::Number(round(number_arg(0)?)),
        })
    }
}

/// Candidates in axis order: reverse axes list the nearest node first
fn axis_candidates<'a, 'input>(axis: Axis, item: Item<'a, 'input>) -> Vec<Item<'a, 'input>> {
    let node = match item {
        Item::Node(node) => node,
        Item::Attribute(owner, _) => {
            return match axis {
                Axis::SelfNode => vec![item],
                Axis::Parent => vec![Item::Node(owner)],
                Axis::Ancestor => owner.ancestors().map(Item::Node).collect(),
                Axis::AncestorOrSelf => std::iter::once(item)
                    .chain(owner.ancestors().map(Item::Node))
                    .collect(),
                Axis::Following => owner
                    .descendants()
                    .skip(1)
                    .chain(following(owner))
                    .map(Item::Node)
                    .collect(),
                Axis::Preceding => preceding(owner).into_iter().map(Item::Node).collect(),
                _ => Vec::new(),
            };
        }
    };

    match axis {
        Axis::Child => node.children().map(Item::Node).collect(),
        Axis::Descendant => node.descendants().skip(1).map(Item::Node).collect(),
        Axis::DescendantOrSelf => node.descendants().map(Item::Node).collect(),
        Axis::Attribute => (0..node.attributes().count())
            .map(|index| Item::Attribute(node, index))
            .collect(),
        Axis::SelfNode => vec![item],
        Axis::Parent => node.parent().map(Item::Node).into_iter().collect(),
        Axis::Ancestor => node.ancestors().skip(1).map(Item::Node).collect(),
        Axis::AncestorOrSelf => node.ancestors().map(Item::Node).collect(),
        Axis::FollowingSibling => node.next_siblings().skip(1).map(Item::Node).collect(),
        Axis::PrecedingSibling => node.prev_siblings().skip(1).map(Item::Node).collect(),
        Axis::Following => following(node).map(Item::Node).collect(),
        Axis::Preceding => preceding(node).into_iter().map(Item::Node).collect(),
    }
}

/// Nodes after `node` in document order, excluding its descendants
fn following<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.ancestors()
        .flat_map(|scope| scope.next_siblings().skip(1))
        .flat_map(|sibling| sibling.descendants())
}

/// Nodes before `node`, excluding its ancestors, nearest first
fn preceding<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let mut nodes = Vec::new();
    for scope in node.ancestors() {
        for sibling in scope.prev_siblings().skip(1) {
            let mut subtree: Vec<_> = sibling.descendants().collect();
            subtree.reverse();
            nodes.extend(subtree);
        }
    }
    nodes
}

fn node_test_matches(
    test: &NodeTest,
    axis: Axis,
    item: Item<'_, '_>,
    namespaces: &Namespaces,
) -> Result<bool, XPathError> {
    match (test, item) {
        (NodeTest::Node, _) => Ok(true),
        (NodeTest::Text, Item::Node(node)) => Ok(node.is_text()),
        (NodeTest::Comment, Item::Node(node)) => Ok(node.is_comment()),
        (NodeTest::ProcessingInstruction(target), Item::Node(node)) => Ok(node
            .pi()
            .is_some_and(|pi| target.as_deref().map_or(true, |t| pi.target == t))),
        (NodeTest::Name(name), Item::Node(node)) if axis != Axis::Attribute => {
            let ns = namespaces.namespace_of(name)?;
            Ok(node.is_element() && node.tag_name().name() == name.local && node.tag_name().namespace() == ns)
        }
        (NodeTest::Name(name), Item::Attribute(owner, index)) if axis == Axis::Attribute => {
            let ns = namespaces.namespace_of(name)?;
            Ok(owner
                .attributes()
                .nth(index)
                .is_some_and(|a| a.name() == name.local && a.namespace() == ns))
        }
        (NodeTest::Wildcard(prefix), Item::Node(node)) if axis != Axis::Attribute => {
            if !node.is_element() {
                return Ok(false);
            }
            match prefix {
                Some(p) => Ok(node.tag_name().namespace() == Some(namespaces.resolve(p)?)),
                None => Ok(true),
            }
        }
        (NodeTest::Wildcard(prefix), Item::Attribute(owner, index)) if axis == Axis::Attribute => match prefix {
            Some(p) => {
                let uri = namespaces.resolve(p)?;
                Ok(owner.attributes().nth(index).is_some_and(|a| a.namespace() == Some(uri)))
            }
            None => Ok(true),
        },
        _ => Ok(false),
    }
}

/// XPath 1.0 comparison: node-sets compare if any member satisfies the
/// operator, booleans win over numbers, numbers over strings.
fn compare(op: CmpOp, lhs: Value<'_, '_>, rhs: Value<'_, '_>) -> bool {
    match (lhs, rhs) {
        (Value::Nodes(items), Value::Boolean(b)) => compare_scalars(op, &Value::Boolean(!items.is_empty()), &Value::Boolean(b)),
        (Value::Boolean(b), Value::Nodes(items)) => compare_scalars(op, &Value::Boolean(b), &Value::Boolean(!items.is_empty())),
        (Value::Nodes(left), Value::Nodes(right)) => {
            let right: Vec<Value<'_, '_>> = right.iter().map(|i| Value::String(i.string_value())).collect();
            left.iter().any(|l| {
                let l = Value::String(l.string_value());
                right.iter().any(|r| compare_scalars(op, &l, r))
            })
        }
        (Value::Nodes(items), other) => items
            .iter()
            .any(|i| compare_scalars(op, &Value::String(i.string_value()), &other)),
        (other, Value::Nodes(items)) => items
            .iter()
            .any(|i| compare_scalars(op, &other, &Value::String(i.string_value()))),
        (lhs, rhs) => compare_scalars(op, &lhs, &rhs),
    }
}

fn compare_scalars(op: CmpOp, lhs: &Value<'_, '_>, rhs: &Value<'_, '_>) -> bool {
    match op {
        CmpOp::Eq | CmpOp::Ne => {
            let equal = match (lhs, rhs) {
                (Value::Boolean(_), _) | (_, Value::Boolean(_)) => lhs.boolean() == rhs.boolean(),
                (Value::Number(_), _) | (_, Value::Number(_)) => lhs.number() == rhs.number(),
                _ => lhs.string() == rhs.string(),
            };
            equal == (op == CmpOp::Eq)
        }
        CmpOp::Lt => lhs.number() < rhs.number(),
        CmpOp::Le => lhs.number() <= rhs.number(),
        CmpOp::Gt => lhs.number() > rhs.number(),
        CmpOp::Ge => lhs.number() >= rhs.number(),
    }
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn round(x: f64) -> f64 {
    if x.is_finite() {
        (x + 0.5).floor()
    } else {
        x
    }
}

/// Numbers follow the XPath lexical form only: no exponents, signs other
/// than a leading minus, or `inf`.
fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(is_xml_space);
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = unsigned.chars().any(|c| c.is_ascii_digit())
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.matches('.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let infinity = if n > 0.0 { "Infinity" } else { "-Infinity" };
        infinity.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
