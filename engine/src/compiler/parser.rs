//! Grammar parser (§4.1, §4.2): turns source text into a flat [`NodeList`].
//!
//! The grammar has no recursive-descent need for a real parse tree — a
//! single left-to-right walk with a `(level, parent_id)` stack produces the
//! flat, parse-ordered node list the layout compiler wants directly.

use super::ast::{NodeList, ParsedNode};
use crate::error::ParseError;
use crate::value::Parameter;
use std::collections::HashMap;

const WHITESPACE: [char; 6] = [' ', '\t', '\r', '\n', '\x0c', '\x0b'];

/// Parse `source` into a [`NodeList`], resolving type names against
/// `type_index` (name → registered index, built by [`crate::registry::TypeRegistry`]).
pub fn parse(source: &str, type_index: &HashMap<String, u16>) -> Result<NodeList, ParseError> {
    let chars: Vec<char> = source.chars().filter(|c| !WHITESPACE.contains(c)).collect();
    let mut p = Parser {
        chars,
        pos: 0,
        stack: vec![(0u32, 0u32)],
        nodes: Vec::new(),
        next_id: 1,
    };
    p.run(type_index)?;
    if p.stack.len() > 1 {
        return Err(ParseError::UnclosedChildren);
    }
    Ok(NodeList { nodes: p.nodes })
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    /// `(level, parent_node_id)`, base frame `(0, 0)` for root children.
    stack: Vec<(u32, u32)>,
    nodes: Vec<ParsedNode>,
    next_id: u32,
}

impl Parser {
    fn run(&mut self, type_index: &HashMap<String, u16>) -> Result<(), ParseError> {
        while self.pos < self.chars.len() {
            match self.chars[self.pos] {
                ']' => {
                    while self.pos < self.chars.len() && self.chars[self.pos] == ']' {
                        if self.stack.len() <= 1 {
                            return Err(ParseError::UnbalancedChildren(self.pos));
                        }
                        self.stack.pop();
                        self.pos += 1;
                    }
                    if self.pos < self.chars.len() && self.chars[self.pos] == ',' {
                        self.pos += 1;
                    }
                }
                ',' => {
                    self.pos += 1;
                }
                _ => self.parse_node(type_index)?,
            }
        }
        Ok(())
    }

    fn parse_node(&mut self, type_index: &HashMap<String, u16>) -> Result<(), ParseError> {
        let name_start = self.pos;
        while self.pos < self.chars.len() && !matches!(self.chars[self.pos], '(' | '[' | ']' | ',')
        {
            self.pos += 1;
        }
        let name: String = self.chars[name_start..self.pos].iter().collect();
        if name.is_empty() {
            return Err(ParseError::EmptyName);
        }
        let type_idx = *type_index
            .get(&name)
            .ok_or_else(|| ParseError::UnknownType(name.clone()))?;

        let params = if self.pos < self.chars.len() && self.chars[self.pos] == '(' {
            self.parse_params()?
        } else {
            Vec::new()
        };

        let (level, parent) = *self.stack.last().unwrap();
        let node_id = self.next_id;
        self.next_id += 1;
        self.nodes.push(ParsedNode {
            node_id,
            type_idx,
            level,
            parent,
            params,
        });

        if self.pos < self.chars.len() && self.chars[self.pos] == '[' {
            self.pos += 1;
            self.stack.push((level + 1, node_id));
            return Ok(());
        }

        if self.pos < self.chars.len() && !matches!(self.chars[self.pos], ']' | ',') {
            return Err(ParseError::InvalidCharacter(self.pos));
        }
        Ok(())
    }

    /// Parse `(` ParamList? `)`, tracking paren depth so param text may in
    /// principle nest parens (§4.1) even though no literal payload does.
    fn parse_params(&mut self) -> Result<Vec<Parameter>, ParseError> {
        debug_assert_eq!(self.chars[self.pos], '(');
        let open = self.pos;
        let mut depth = 0i32;
        let mut end = None;
        let mut i = open;
        while i < self.chars.len() {
            match self.chars[i] {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        let end = end.ok_or(ParseError::InvalidCharacter(open))?;
        let inner: String = self.chars[open + 1..end].iter().collect();
        self.pos = end + 1;

        if inner.is_empty() {
            return Ok(Vec::new());
        }
        inner
            .split(',')
            .map(|tok| parse_param_token(tok, open))
            .collect()
    }
}

fn parse_param_token(tok: &str, at: usize) -> Result<Parameter, ParseError> {
    match tok {
        "true" => Ok(Parameter::Bool(true)),
        "false" => Ok(Parameter::Bool(false)),
        _ if tok.starts_with('$') => tok[1..]
            .parse::<u32>()
            .map(Parameter::Dyn)
            .map_err(|_| ParseError::InvalidCharacter(at)),
        _ if tok.contains('.') || tok.contains('f') => tok
            .trim_end_matches('f')
            .parse::<f32>()
            .map(Parameter::Float)
            .map_err(|_| ParseError::InvalidCharacter(at)),
        _ => tok
            .parse::<i32>()
            .map(Parameter::Int)
            .map_err(|_| ParseError::InvalidCharacter(at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(names: &[&str]) -> HashMap<String, u16> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i as u16))
            .collect()
    }

    #[test]
    fn minimal_single_node() {
        let t = types(&["Task"]);
        let list = parse("Task", &t).unwrap();
        assert_eq!(list.nodes.len(), 1);
        assert_eq!(list.nodes[0].parent, 0);
        assert_eq!(list.nodes[0].level, 0);
    }

    #[test]
    fn nested_children_and_params() {
        let t = types(&["TaskA", "TaskB", "TaskC"]);
        let list = parse("TaskA($0)[TaskB(5)[TaskA, TaskB]] TaskA[TaskC]", &t).unwrap();
        assert_eq!(list.nodes.len(), 6);
        assert_eq!(list.nodes[0].params, vec![Parameter::Dyn(0)]);
        assert_eq!(list.nodes[1].params, vec![Parameter::Int(5)]);
        assert_eq!(list.nodes[1].parent, list.nodes[0].node_id);
        assert_eq!(list.nodes[1].level, 1);
        // TaskA[TaskC] at top level is a fresh root with no explicit comma.
        let root_ids: Vec<_> = list.root_children().map(|n| n.node_id).collect();
        assert_eq!(root_ids.len(), 2);
    }

    #[test]
    fn unknown_type() {
        let t = types(&["Task"]);
        assert_eq!(
            parse("Tas", &t).unwrap_err(),
            ParseError::UnknownType("Tas".to_string())
        );
    }

    #[test]
    fn deep_linear_nesting() {
        let t = types(&["Task"]);
        let mut src = String::new();
        for _ in 0..16 {
            src.push_str("Task[");
        }
        src.push_str("Task");
        for _ in 0..16 {
            src.push(']');
        }
        let list = parse(&src, &t).unwrap();
        assert_eq!(list.nodes.len(), 17);
        for (i, n) in list.nodes.iter().enumerate() {
            assert_eq!(n.level, i as u32);
            if i == 0 {
                assert_eq!(n.parent, 0);
            } else {
                assert_eq!(n.parent, list.nodes[i - 1].node_id);
            }
        }
    }

    #[test]
    fn empty_forest() {
        let t = types(&["Task"]);
        let list = parse("", &t).unwrap();
        assert!(list.nodes.is_empty());
    }

    #[test]
    fn unbalanced_close() {
        let t = types(&["Task"]);
        assert!(matches!(
            parse("Task]", &t).unwrap_err(),
            ParseError::UnbalancedChildren(_)
        ));
    }

    #[test]
    fn unclosed_children() {
        let t = types(&["Task"]);
        assert_eq!(
            parse("Task[Task", &t).unwrap_err(),
            ParseError::UnclosedChildren
        );
    }

    #[test]
    fn static_and_dynamic_params() {
        let t = types(&["TaskA", "TaskB", "TaskC"]);
        let list = parse("TaskA($0)[TaskB($1), TaskC($2)] TaskA($3)", &t).unwrap();
        assert_eq!(list.nodes[0].params, vec![Parameter::Dyn(0)]);
        assert_eq!(list.nodes[1].params, vec![Parameter::Dyn(1)]);
        assert_eq!(list.nodes[2].params, vec![Parameter::Dyn(2)]);
        assert_eq!(list.nodes[3].params, vec![Parameter::Dyn(3)]);
    }
}
