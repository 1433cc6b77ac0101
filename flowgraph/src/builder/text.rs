// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! A hand-rolled reader for the subset of Graphviz `strict digraph` syntax
//! used to describe flowgraph topology (spec.md §4.6 / §6 "Textual graph
//! format"). Not a general-purpose DOT parser: only node lines, cluster
//! subgraphs, and edge lines with the handful of attributes the format
//! defines are understood.

use crate::error::{FlowError, Result};
use crate::parameters::Parameters;

#[derive(Debug, Clone, Default)]
pub struct NodeDecl {
    pub name: String,
    pub instance: Option<String>,
    pub allow_incoming: bool,
    pub allow_outgoing: bool,
    pub init_parameters: Option<Parameters>,
}

#[derive(Debug, Clone)]
pub struct EdgeDecl {
    pub from: String,
    pub channel: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct GraphDescription {
    pub name: String,
    pub nodes: Vec<NodeDecl>,
    pub edges: Vec<EdgeDecl>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Eq,
    Arrow,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(&(i, c)) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '#' => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        self.chars.next();
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '/' if self.src[i..].starts_with("//") => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        self.chars.next();
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '{' => {
                    self.chars.next();
                    tokens.push(Token::LBrace);
                }
                '}' => {
                    self.chars.next();
                    tokens.push(Token::RBrace);
                }
                '[' => {
                    self.chars.next();
                    tokens.push(Token::LBracket);
                }
                ']' => {
                    self.chars.next();
                    tokens.push(Token::RBracket);
                }
                ';' => {
                    self.chars.next();
                    tokens.push(Token::Semi);
                }
                ',' => {
                    self.chars.next();
                    tokens.push(Token::Comma);
                }
                '=' => {
                    self.chars.next();
                    tokens.push(Token::Eq);
                }
                '-' if self.src[i..].starts_with("->") => {
                    self.chars.next();
                    self.chars.next();
                    tokens.push(Token::Arrow);
                }
                '"' => {
                    tokens.push(Token::Str(self.read_quoted()?));
                }
                _ => {
                    tokens.push(Token::Ident(self.read_ident()));
                }
            }
        }
        Ok(tokens)
    }

    fn read_quoted(&mut self) -> Result<String> {
        self.chars.next(); // opening quote
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => {
                    return Err(FlowError::MalformedGraph("unterminated quoted string".into()))
                }
                Some((_, '"')) => break,
                Some((_, '\\')) => {
                    if let Some((_, next)) = self.chars.next() {
                        out.push(next);
                    }
                }
                Some((_, c)) => out.push(c),
            }
        }
        Ok(out)
    }

    fn read_ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() || "{}[];,=\"".contains(c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| FlowError::MalformedGraph("unexpected end of input".into()))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_ident_eq(&mut self, expected: &str) -> Result<()> {
        match self.next()? {
            Token::Ident(s) if s.eq_ignore_ascii_case(expected) => Ok(()),
            other => Err(FlowError::MalformedGraph(format!(
                "expected '{expected}', found {other:?}"
            ))),
        }
    }

    fn expect(&mut self, tok: Token) -> Result<()> {
        let found = self.next()?;
        if found == tok {
            Ok(())
        } else {
            Err(FlowError::MalformedGraph(format!(
                "expected {tok:?}, found {found:?}"
            )))
        }
    }

    /// A bare identifier or quoted string, used anywhere a name is expected.
    fn name(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(s) | Token::Str(s) => Ok(s),
            other => Err(FlowError::MalformedGraph(format!(
                "expected a name, found {other:?}"
            ))),
        }
    }

    fn parse_graph(&mut self) -> Result<GraphDescription> {
        if matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case("strict")) {
            self.next()?;
        }
        self.expect_ident_eq("digraph")?;
        let name = self.name()?;
        self.expect(Token::LBrace)?;

        let mut desc = GraphDescription {
            name,
            ..Default::default()
        };
        self.parse_statements(&mut desc, None)?;
        self.expect(Token::RBrace)?;
        Ok(desc)
    }

    /// Parses statements until a closing `}`. `cluster` is `Some(name)` while
    /// inside a subgraph body, so member node declarations are attributed to
    /// that cluster's `instance` by default if they don't declare their own.
    fn parse_statements(&mut self, desc: &mut GraphDescription, cluster: Option<&str>) -> Result<()> {
        let mut cluster_instance: Option<String> = None;
        loop {
            match self.peek() {
                None | Some(Token::RBrace) => break,
                Some(Token::Semi) => {
                    self.next()?;
                }
                Some(Token::Ident(s)) if s.eq_ignore_ascii_case("subgraph") => {
                    self.next()?;
                    let sub_name = self.name()?;
                    self.expect(Token::LBrace)?;
                    let mut sub_desc = GraphDescription::default();
                    self.parse_statements(&mut sub_desc, Some(&sub_name))?;
                    self.expect(Token::RBrace)?;
                    desc.nodes.extend(sub_desc.nodes);
                    desc.edges.extend(sub_desc.edges);
                }
                Some(Token::Ident(_)) | Some(Token::Str(_)) => {
                    let first = self.name()?;
                    if matches!(self.peek(), Some(Token::Arrow)) {
                        self.next()?;
                        let to = self.name()?;
                        let attrs = self.parse_optional_attrs()?;
                        let channel = attrs.get("label").cloned().ok_or_else(|| {
                            FlowError::MalformedGraph(format!(
                                "edge '{first}' -> '{to}' is missing a required 'label'"
                            ))
                        })?;
                        if channel.is_empty() {
                            return Err(FlowError::MalformedGraph(format!(
                                "edge '{first}' -> '{to}' has an empty label"
                            )));
                        }
                        desc.edges.push(EdgeDecl {
                            from: first,
                            channel,
                            to,
                        });
                    } else if matches!(self.peek(), Some(Token::Eq)) {
                        // A bare `key = value;` attribute statement inside a
                        // cluster body (e.g. `instance="…"; label="…";`).
                        self.next()?;
                        let value = self.name()?;
                        if first.eq_ignore_ascii_case("instance") {
                            cluster_instance = Some(value);
                        }
                    } else {
                        let attrs = self.parse_optional_attrs()?;
                        let mut node = node_from_attrs(first, &attrs)?;
                        if node.instance.is_none() {
                            node.instance = cluster_instance.clone();
                        }
                        desc.nodes.push(node);
                    }
                }
                Some(other) => {
                    return Err(FlowError::MalformedGraph(format!(
                        "unexpected token at statement start: {other:?}"
                    )))
                }
            }
            if matches!(self.peek(), Some(Token::Semi)) {
                self.next()?;
            }
        }

        if let (Some(name), Some(instance)) = (cluster, cluster_instance) {
            desc.nodes.push(NodeDecl {
                name: name.to_string(),
                instance: Some(instance),
                allow_incoming: false,
                allow_outgoing: false,
                init_parameters: None,
            });
        }
        Ok(())
    }

    fn parse_optional_attrs(&mut self) -> Result<std::collections::HashMap<String, String>> {
        let mut attrs = std::collections::HashMap::new();
        if !matches!(self.peek(), Some(Token::LBracket)) {
            return Ok(attrs);
        }
        self.next()?;
        loop {
            match self.peek() {
                Some(Token::RBracket) => {
                    self.next()?;
                    break;
                }
                Some(Token::Comma) => {
                    self.next()?;
                }
                _ => {
                    let key = self.name()?;
                    self.expect(Token::Eq)?;
                    let value = self.name()?;
                    attrs.insert(key, value);
                }
            }
        }
        Ok(attrs)
    }
}

fn node_from_attrs(name: String, attrs: &std::collections::HashMap<String, String>) -> Result<NodeDecl> {
    let allow_incoming = attrs
        .get("allowIncoming")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let allow_outgoing = attrs
        .get("allowOutgoing")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let init_parameters = match attrs.get("initParameters") {
        Some(raw) => {
            let value: serde_json::Value = serde_json::from_str(raw)?;
            Some(Parameters::from_value(value))
        }
        None => None,
    };
    Ok(NodeDecl {
        name,
        instance: attrs.get("instance").cloned(),
        allow_incoming,
        allow_outgoing,
        init_parameters,
    })
}

/// Parses a `strict digraph { ... }` description (spec.md §6 "Textual graph
/// format") into a [`GraphDescription`].
pub fn parse(source: &str) -> Result<GraphDescription> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_graph()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nodes_and_edges() {
        let src = r#"
            strict digraph "Example" {
                "Source" [instance="src", allowOutgoing=true];
                "Sink" [instance="snk", allowIncoming=true];
                "Source" -> "Sink" [label="out"];
            }
        "#;
        let desc = parse(src).unwrap();
        assert_eq!(desc.name, "Example");
        assert_eq!(desc.nodes.len(), 2);
        assert_eq!(desc.edges.len(), 1);
        assert_eq!(desc.edges[0].channel, "out");
        let source = desc.nodes.iter().find(|n| n.name == "Source").unwrap();
        assert!(source.allow_outgoing);
        assert!(!source.allow_incoming);
        assert_eq!(source.instance.as_deref(), Some("src"));
    }

    #[test]
    fn edge_without_label_is_malformed() {
        let src = r#"
            strict digraph "G" {
                "a" [allowOutgoing=true];
                "b" [allowIncoming=true];
                "a" -> "b";
            }
        "#;
        assert!(matches!(parse(src), Err(FlowError::MalformedGraph(_))));
    }

    #[test]
    fn cluster_members_inherit_cluster_instance() {
        let src = r#"
            strict digraph "G" {
                subgraph "Cluster X" {
                    instance="groupInstance";
                    "sub1" [allowIncoming=true];
                    "sub2" [allowOutgoing=true];
                }
            }
        "#;
        let desc = parse(src).unwrap();
        let sub1 = desc.nodes.iter().find(|n| n.name == "sub1").unwrap();
        assert_eq!(sub1.instance.as_deref(), Some("groupInstance"));
        assert!(desc.nodes.iter().any(|n| n.name == "Cluster X"));
    }
}
