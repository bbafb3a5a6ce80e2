//! Expression evaluation over the arena.

use super::functions::{self, Function};
use super::parser::{ArithOp, Axis, CompareOp, Expr, NodeTest, PathStart, Step};
use crate::error::QueryError;
use crate::tree::{Document, NodeData};

/// Node-set member: a tree node or an attribute of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Item {
    Node(usize),
    /// Element index and attribute index.
    Attribute(usize, usize),
}

#[derive(Debug, Clone)]
pub(crate) enum Val {
    Nodes(Vec<Item>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Val {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Nodes(_) => "node-set",
            Self::Str(_) => "string",
            Self::Num(_) => "number",
            Self::Bool(_) => "boolean",
        }
    }

    fn into_nodes(self) -> Result<Vec<Item>, QueryError> {
        match self {
            Self::Nodes(items) => Ok(items),
            other => Err(QueryError::NotNodeSet(other.type_name())),
        }
    }
}

struct Context {
    item: Item,
    position: usize,
    size: usize,
}

#[allow(clippy::cast_precision_loss)]
fn as_number(count: usize) -> f64 {
    count as f64
}

#[allow(clippy::float_cmp)]
fn is_position(value: f64, position: usize) -> bool {
    value == as_number(position)
}

pub(crate) struct Evaluator<'d> {
    doc: &'d Document,
    /// Document-order rank of every arena node. The main tree comes first,
    /// detached subtrees follow in creation order.
    order: Vec<usize>,
}

impl<'d> Evaluator<'d> {
    pub(crate) fn new(doc: &'d Document) -> Self {
        let nodes = &doc.nodes;
        let mut order = vec![0; nodes.len()];
        let mut rank = 0;
        let roots = std::iter::once(0).chain((1..nodes.len()).filter(|&i| nodes[i].parent.is_none()));
        for root in roots {
            let mut stack = vec![root];
            while let Some(index) = stack.pop() {
                order[index] = rank;
                rank += 1;
                stack.extend(nodes[index].children.iter().rev());
            }
        }
        Self { doc, order }
    }

    pub(crate) fn run(&self, expr: &Expr, context: Item) -> Result<Val, QueryError> {
        self.eval(
            expr,
            &Context {
                item: context,
                position: 1,
                size: 1,
            },
        )
    }

    fn key(&self, item: Item) -> (usize, usize) {
        match item {
            Item::Node(index) => (self.order[index], 0),
            Item::Attribute(element, attribute) => (self.order[element], attribute + 1),
        }
    }

    fn sort_unique(&self, items: &mut Vec<Item>) {
        items.sort_by_key(|&item| self.key(item));
        items.dedup();
    }

    fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Val, QueryError> {
        Ok(match expr {
            Expr::Or(left, right) => {
                Val::Bool(self.boolean(&self.eval(left, ctx)?) || self.boolean(&self.eval(right, ctx)?))
            }
            Expr::And(left, right) => {
                Val::Bool(self.boolean(&self.eval(left, ctx)?) && self.boolean(&self.eval(right, ctx)?))
            }
            Expr::Compare(op, left, right) => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                Val::Bool(self.compare(*op, &left, &right))
            }
            Expr::Arith(op, left, right) => {
                let left = self.number(&self.eval(left, ctx)?);
                let right = self.number(&self.eval(right, ctx)?);
                Val::Num(match op {
                    ArithOp::Add => left + right,
                    ArithOp::Sub => left - right,
                    ArithOp::Mul => left * right,
                    ArithOp::Div => left / right,
                    ArithOp::Mod => left % right,
                })
            }
            Expr::Negate(operand) => Val::Num(-self.number(&self.eval(operand, ctx)?)),
            Expr::Union(left, right) => {
                let mut items = self.eval(left, ctx)?.into_nodes()?;
                items.extend(self.eval(right, ctx)?.into_nodes()?);
                self.sort_unique(&mut items);
                Val::Nodes(items)
            }
            Expr::Literal(value) => Val::Str(value.clone()),
            Expr::Number(value) => Val::Num(*value),
            Expr::Call(function, args) => self.call(*function, args, ctx)?,
            Expr::Filter(primary, predicates) => {
                let mut items = self.eval(primary, ctx)?.into_nodes()?;
                for predicate in predicates {
                    items = self.filter(items, predicate)?;
                }
                Val::Nodes(items)
            }
            Expr::Path(start, steps) => {
                let mut items = match start {
                    PathStart::Root => vec![Item::Node(self.root_of(ctx.item))],
                    PathStart::Context => vec![ctx.item],
                    PathStart::Filter(filter) => self.eval(filter, ctx)?.into_nodes()?,
                };
                for step in steps {
                    items = self.step(&items, step)?;
                }
                Val::Nodes(items)
            }
        })
    }

    fn step(&self, input: &[Item], step: &Step) -> Result<Vec<Item>, QueryError> {
        let mut output = Vec::new();
        for &item in input {
            // Candidates stay in axis order so predicate positions follow it.
            let mut candidates: Vec<Item> = self
                .axis(item, step.axis)
                .into_iter()
                .filter(|&candidate| self.matches(candidate, &step.test, step.axis))
                .collect();
            for predicate in &step.predicates {
                candidates = self.filter(candidates, predicate)?;
            }
            output.extend(candidates);
        }
        if input.len() > 1 || step.axis.is_reverse() {
            self.sort_unique(&mut output);
        }
        Ok(output)
    }

    fn filter(&self, items: Vec<Item>, predicate: &Expr) -> Result<Vec<Item>, QueryError> {
        let size = items.len();
        let mut kept = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let ctx = Context {
                item,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Val::Num(value) => is_position(value, index + 1),
                other => self.boolean(&other),
            };
            if keep {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    fn parent_index(&self, item: Item) -> Option<usize> {
        match item {
            Item::Node(index) => self.doc.nodes[index].parent,
            Item::Attribute(element, _) => Some(element),
        }
    }

    fn root_of(&self, item: Item) -> usize {
        let mut current = match item {
            Item::Node(index) | Item::Attribute(index, _) => index,
        };
        while let Some(parent) = self.doc.nodes[current].parent {
            current = parent;
        }
        current
    }

    fn descendants(&self, index: usize, out: &mut Vec<Item>) {
        for &child in &self.doc.nodes[index].children {
            out.push(Item::Node(child));
            self.descendants(child, out);
        }
    }

    fn siblings(&self, index: usize) -> (&[usize], usize) {
        match self.doc.nodes[index].parent {
            Some(parent) => {
                let children = self.doc.nodes[parent].children.as_slice();
                let position = children.iter().position(|&c| c == index).unwrap_or(0);
                (children, position)
            }
            None => (&[][..], 0),
        }
    }

    fn axis(&self, item: Item, axis: Axis) -> Vec<Item> {
        let mut out = Vec::new();
        match (axis, item) {
            (Axis::SelfAxis, _) => out.push(item),
            (Axis::Child, Item::Node(index)) => {
                out.extend(self.doc.nodes[index].children.iter().map(|&c| Item::Node(c)));
            }
            (Axis::Descendant, Item::Node(index)) => self.descendants(index, &mut out),
            (Axis::DescendantOrSelf, Item::Node(index)) => {
                out.push(item);
                self.descendants(index, &mut out);
            }
            (Axis::DescendantOrSelf, Item::Attribute(..)) => out.push(item),
            (Axis::Parent, _) => out.extend(self.parent_index(item).map(Item::Node)),
            (Axis::Ancestor | Axis::AncestorOrSelf, _) => {
                if axis == Axis::AncestorOrSelf {
                    out.push(item);
                }
                let mut cursor = self.parent_index(item);
                while let Some(index) = cursor {
                    out.push(Item::Node(index));
                    cursor = self.doc.nodes[index].parent;
                }
            }
            (Axis::FollowingSibling, Item::Node(index)) => {
                let (siblings, position) = self.siblings(index);
                if !siblings.is_empty() {
                    out.extend(siblings[position + 1..].iter().map(|&s| Item::Node(s)));
                }
            }
            (Axis::PrecedingSibling, Item::Node(index)) => {
                let (siblings, position) = self.siblings(index);
                out.extend(siblings[..position].iter().rev().map(|&s| Item::Node(s)));
            }
            (Axis::Following, _) => {
                let mut current = match item {
                    Item::Node(index) => index,
                    Item::Attribute(element, _) => {
                        self.descendants(element, &mut out);
                        element
                    }
                };
                while let Some(parent) = self.doc.nodes[current].parent {
                    let (siblings, position) = self.siblings(current);
                    for &sibling in &siblings[position + 1..] {
                        out.push(Item::Node(sibling));
                        self.descendants(sibling, &mut out);
                    }
                    current = parent;
                }
            }
            (Axis::Preceding, _) => {
                let mut current = match item {
                    Item::Node(index) | Item::Attribute(index, _) => index,
                };
                while let Some(parent) = self.doc.nodes[current].parent {
                    let (siblings, position) = self.siblings(current);
                    for &sibling in siblings[..position].iter().rev() {
                        let mut subtree = vec![Item::Node(sibling)];
                        self.descendants(sibling, &mut subtree);
                        out.extend(subtree.into_iter().rev());
                    }
                    current = parent;
                }
            }
            (Axis::Attribute, Item::Node(index)) => {
                if let Some(element) = self.doc.element_at(index) {
                    out.extend(
                        element
                            .attributes
                            .iter()
                            .enumerate()
                            .filter(|(_, a)| !a.is_declaration())
                            .map(|(position, _)| Item::Attribute(index, position)),
                    );
                }
            }
            _ => {}
        }
        out
    }

    fn matches(&self, item: Item, test: &NodeTest, axis: Axis) -> bool {
        let name_matches = |name: &str, local: &str, namespace: Option<&str>, want: &Option<String>, want_local: &str| match want {
            Some(uri) => namespace == Some(uri.as_str()) && local == want_local,
            None => namespace.is_none() && name == want_local,
        };

        match item {
            Item::Attribute(element, position) => {
                let Some(attribute) = self
                    .doc
                    .element_at(element)
                    .and_then(|e| e.attributes.get(position))
                else {
                    return false;
                };
                match test {
                    NodeTest::Any | NodeTest::Node => true,
                    NodeTest::Namespace(uri) => attribute.namespace.as_deref() == Some(uri.as_str()),
                    NodeTest::Name { namespace, local } => name_matches(
                        &attribute.name,
                        attribute.local_name(),
                        attribute.namespace.as_deref(),
                        namespace,
                        local,
                    ),
                    _ => false,
                }
            }
            Item::Node(index) => match (&self.doc.nodes[index].data, test) {
                (_, NodeTest::Node) => true,
                (NodeData::Element(_), NodeTest::Any) => axis != Axis::Attribute,
                (NodeData::Element(element), NodeTest::Namespace(uri)) => {
                    element.namespace.as_deref() == Some(uri.as_str())
                }
                (NodeData::Element(element), NodeTest::Name { namespace, local }) => name_matches(
                    &element.name,
                    element.local_name(),
                    element.namespace.as_deref(),
                    namespace,
                    local,
                ),
                (NodeData::Text { .. } | NodeData::CData(_), NodeTest::Text)
                | (NodeData::Comment(_), NodeTest::Comment) => true,
                (NodeData::ProcessingInstruction(content), NodeTest::ProcessingInstruction(target)) => {
                    target.as_ref().is_none_or(|target| pi_target(content) == target.as_str())
                }
                _ => false,
            },
        }
    }

    pub(crate) fn string_of(&self, item: Item) -> String {
        match item {
            Item::Node(index) => self.doc.string_value(index),
            Item::Attribute(element, position) => self
                .doc
                .element_at(element)
                .and_then(|e| e.attributes.get(position))
                .map(|a| a.value.clone())
                .unwrap_or_default(),
        }
    }

    fn string(&self, value: &Val) -> String {
        match value {
            Val::Nodes(items) => items.first().map(|&item| self.string_of(item)).unwrap_or_default(),
            Val::Str(text) => text.clone(),
            Val::Num(number) => functions::number_to_string(*number),
            Val::Bool(flag) => flag.to_string(),
        }
    }

    fn number(&self, value: &Val) -> f64 {
        match value {
            Val::Num(number) => *number,
            Val::Bool(flag) => f64::from(u8::from(*flag)),
            other => functions::string_to_number(&self.string(other)),
        }
    }

    #[allow(clippy::unused_self)]
    fn boolean(&self, value: &Val) -> bool {
        match value {
            Val::Nodes(items) => !items.is_empty(),
            Val::Str(text) => !text.is_empty(),
            Val::Num(number) => *number != 0.0 && !number.is_nan(),
            Val::Bool(flag) => *flag,
        }
    }

    /// Comparison with the XPath 1.0 §3.4 conversion rules.
    fn compare(&self, op: CompareOp, left: &Val, right: &Val) -> bool {
        match (left, right) {
            (Val::Nodes(a), Val::Nodes(b)) => a.iter().any(|&x| {
                let x = Val::Str(self.string_of(x));
                b.iter().any(|&y| self.compare_atoms(op, &x, &Val::Str(self.string_of(y))))
            }),
            (Val::Nodes(_), Val::Bool(_)) | (Val::Bool(_), Val::Nodes(_)) => self.compare_atoms(
                op,
                &Val::Bool(self.boolean(left)),
                &Val::Bool(self.boolean(right)),
            ),
            (Val::Nodes(items), other) => items
                .iter()
                .any(|&item| self.compare_atoms(op, &self.atomize(item, other), other)),
            (other, Val::Nodes(items)) => items
                .iter()
                .any(|&item| self.compare_atoms(op, other, &self.atomize(item, other))),
            _ => self.compare_atoms(op, left, right),
        }
    }

    /// A node's value converted to the type it is compared against.
    fn atomize(&self, item: Item, other: &Val) -> Val {
        let text = self.string_of(item);
        match other {
            Val::Num(_) => Val::Num(functions::string_to_number(&text)),
            _ => Val::Str(text),
        }
    }

    #[allow(clippy::float_cmp)]
    fn compare_atoms(&self, op: CompareOp, left: &Val, right: &Val) -> bool {
        match op {
            CompareOp::Eq | CompareOp::Neq => {
                let equal = match (left, right) {
                    (Val::Bool(_), _) | (_, Val::Bool(_)) => self.boolean(left) == self.boolean(right),
                    (Val::Num(_), _) | (_, Val::Num(_)) => self.number(left) == self.number(right),
                    _ => self.string(left) == self.string(right),
                };
                equal == (op == CompareOp::Eq)
            }
            CompareOp::Lt => self.number(left) < self.number(right),
            CompareOp::Le => self.number(left) <= self.number(right),
            CompareOp::Gt => self.number(left) > self.number(right),
            CompareOp::Ge => self.number(left) >= self.number(right),
        }
    }

    /// Node a name function reads: first of the argument set, or the context.
    fn name_target(&self, args: &[Expr], ctx: &Context) -> Result<Option<Item>, QueryError> {
        match args.first() {
            Some(arg) => Ok(self.eval(arg, ctx)?.into_nodes()?.first().copied()),
            None => Ok(Some(ctx.item)),
        }
    }

    fn string_arg(&self, args: &[Expr], index: usize, ctx: &Context) -> Result<String, QueryError> {
        Ok(self.string(&self.eval(&args[index], ctx)?))
    }

    fn number_arg(&self, args: &[Expr], index: usize, ctx: &Context) -> Result<f64, QueryError> {
        Ok(self.number(&self.eval(&args[index], ctx)?))
    }

    /// String argument that defaults to the context node's string value.
    fn optional_string_arg(&self, args: &[Expr], ctx: &Context) -> Result<String, QueryError> {
        if args.is_empty() {
            Ok(self.string_of(ctx.item))
        } else {
            self.string_arg(args, 0, ctx)
        }
    }

    fn call(&self, function: Function, args: &[Expr], ctx: &Context) -> Result<Val, QueryError> {
        Ok(match function {
            Function::Last => Val::Num(as_number(ctx.size)),
            Function::Position => Val::Num(as_number(ctx.position)),
            Function::Count => Val::Num(as_number(self.eval(&args[0], ctx)?.into_nodes()?.len())),
            Function::LocalName | Function::Name | Function::NamespaceUri => {
                let target = self.name_target(args, ctx)?;
                Val::Str(target.map(|item| self.name_of(item, function)).unwrap_or_default())
            }
            Function::String => Val::Str(self.optional_string_arg(args, ctx)?),
            Function::Concat => {
                let mut out = String::new();
                for index in 0..args.len() {
                    out.push_str(&self.string_arg(args, index, ctx)?);
                }
                Val::Str(out)
            }
            Function::StartsWith => {
                Val::Bool(self.string_arg(args, 0, ctx)?.starts_with(&self.string_arg(args, 1, ctx)?))
            }
            Function::Contains => {
                Val::Bool(self.string_arg(args, 0, ctx)?.contains(&self.string_arg(args, 1, ctx)?))
            }
            Function::SubstringBefore => Val::Str(functions::substring_before(
                &self.string_arg(args, 0, ctx)?,
                &self.string_arg(args, 1, ctx)?,
            )),
            Function::SubstringAfter => Val::Str(functions::substring_after(
                &self.string_arg(args, 0, ctx)?,
                &self.string_arg(args, 1, ctx)?,
            )),
            Function::Substring => {
                let text = self.string_arg(args, 0, ctx)?;
                let start = self.number_arg(args, 1, ctx)?;
                let length = if args.len() > 2 {
                    Some(self.number_arg(args, 2, ctx)?)
                } else {
                    None
                };
                Val::Str(functions::substring(&text, start, length))
            }
            Function::StringLength => {
                Val::Num(as_number(self.optional_string_arg(args, ctx)?.chars().count()))
            }
            Function::NormalizeSpace => {
                Val::Str(functions::normalize_space(&self.optional_string_arg(args, ctx)?))
            }
            Function::Translate => Val::Str(functions::translate(
                &self.string_arg(args, 0, ctx)?,
                &self.string_arg(args, 1, ctx)?,
                &self.string_arg(args, 2, ctx)?,
            )),
            Function::Boolean => Val::Bool(self.boolean(&self.eval(&args[0], ctx)?)),
            Function::Not => Val::Bool(!self.boolean(&self.eval(&args[0], ctx)?)),
            Function::True => Val::Bool(true),
            Function::False => Val::Bool(false),
            Function::Number => Val::Num(if args.is_empty() {
                functions::string_to_number(&self.string_of(ctx.item))
            } else {
                self.number_arg(args, 0, ctx)?
            }),
            Function::Sum => Val::Num(
                self.eval(&args[0], ctx)?
                    .into_nodes()?
                    .into_iter()
                    .map(|item| functions::string_to_number(&self.string_of(item)))
                    .sum(),
            ),
            Function::Floor => Val::Num(self.number_arg(args, 0, ctx)?.floor()),
            Function::Ceiling => Val::Num(self.number_arg(args, 0, ctx)?.ceil()),
            Function::Round => Val::Num(functions::round(self.number_arg(args, 0, ctx)?)),
        })
    }

    fn name_of(&self, item: Item, function: Function) -> String {
        let (name, namespace) = match item {
            Item::Attribute(element, position) => {
                match self.doc.element_at(element).and_then(|e| e.attributes.get(position)) {
                    Some(attribute) => (attribute.name.as_str(), attribute.namespace.as_deref()),
                    None => return String::new(),
                }
            }
            Item::Node(index) => match &self.doc.nodes[index].data {
                NodeData::Element(element) => (element.name.as_str(), element.namespace.as_deref()),
                NodeData::ProcessingInstruction(content) => (pi_target(content), None),
                _ => return String::new(),
            },
        };
        match function {
            Function::Name => name.to_owned(),
            Function::NamespaceUri => namespace.unwrap_or_default().to_owned(),
            _ => name.split_once(':').map_or(name, |(_, local)| local).to_owned(),
        }
    }
}

fn pi_target(content: &str) -> &str {
    content.split_whitespace().next().unwrap_or_default()
}
