//! Recursive-descent parser.
//!
//! Errors are accumulated with their line numbers; the parse fails if any
//! were recorded.

use std::collections::BTreeMap;

use crate::error::{GraphError, Result};
use crate::model::PropertyValue;
use crate::query::ast::{
    BinaryOp, Direction, EdgePattern, Expr, MatchClause, NodePattern, OrderByClause, OrderByField,
    Pattern, Query, ReturnClause, ReturnItem, WhereClause,
};
use crate::query::lexer::{Lexer, Token, TokenKind};

pub struct Parser {
    lexer: Lexer,
    current: Token,
    peek: Token,
    errors: Vec<String>,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        let peek = lexer.next_token();
        let mut parser = Self {
            lexer,
            current,
            peek,
            errors: Vec::new(),
        };
        let current = parser.current.clone();
        parser.check_illegal(&current);
        let peek = parser.peek.clone();
        parser.check_illegal(&peek);
        parser
    }

    pub fn parse(mut self) -> Result<Query> {
        let mut query = Query::default();

        if self.current_is(TokenKind::Match) {
            query.match_clause = self.parse_match_clause();
        }
        if self.current_is(TokenKind::Where) {
            query.where_clause = self.parse_where_clause();
        }
        if self.current_is(TokenKind::Return) {
            query.return_clause = self.parse_return_clause();
        }
        if self.current_is(TokenKind::Order) {
            query.order_by = self.parse_order_by_clause();
        }
        if self.current_is(TokenKind::Limit) {
            query.limit = self.parse_limit_clause();
        }

        if self.errors.is_empty() && !self.current_is(TokenKind::Eof) {
            self.error(format!("unexpected trailing input '{}'", self.current.literal));
        }

        if self.errors.is_empty() {
            Ok(query)
        } else {
            Err(GraphError::Parse(self.errors.join("; ")))
        }
    }

    fn parse_match_clause(&mut self) -> Option<MatchClause> {
        self.advance(); // consume MATCH

        let pattern = self.parse_pattern()?;
        Some(MatchClause {
            patterns: vec![pattern],
        })
    }

    fn parse_pattern(&mut self) -> Option<Pattern> {
        let mut pattern = Pattern::default();

        pattern.nodes.push(self.parse_node_pattern()?);

        while self.current_is(TokenKind::Dash) || self.current_is(TokenKind::LeftArrow) {
            pattern.edges.push(self.parse_edge_pattern()?);
            pattern.nodes.push(self.parse_node_pattern()?);
        }

        Some(pattern)
    }

    /// `(var:Label {key: literal, ...})`, every piece optional but the parens.
    fn parse_node_pattern(&mut self) -> Option<NodePattern> {
        if !self.current_is(TokenKind::LeftParen) {
            self.error("expected ( for node pattern".into());
            return None;
        }
        self.advance();

        let mut node = NodePattern::default();

        if self.current_is(TokenKind::Identifier) {
            node.variable = Some(self.current.literal.clone());
            self.advance();
        }

        if self.current_is(TokenKind::Colon) {
            self.advance();
            if !self.current_is(TokenKind::Identifier) {
                self.error("expected label after :".into());
                return None;
            }
            node.label = Some(self.current.literal.clone());
            self.advance();
        }

        if self.current_is(TokenKind::LeftBrace) {
            node.properties = self.parse_properties()?;
        }

        if !self.current_is(TokenKind::RightParen) {
            self.error("expected ) to close node pattern".into());
            return None;
        }
        self.advance();

        Some(node)
    }

    /// `-[var:TYPE]->`, `<-[...]-`, `-[...]-` and the mixed forms. A leading
    /// `<-` demands a closing connector; a lone `-[...]` is undirected.
    fn parse_edge_pattern(&mut self) -> Option<EdgePattern> {
        let leading_in = if self.current_is(TokenKind::LeftArrow) {
            self.advance();
            true
        } else if self.current_is(TokenKind::Dash) {
            self.advance();
            false
        } else {
            self.error("expected - or <- to start edge pattern".into());
            return None;
        };

        if !self.current_is(TokenKind::LeftBracket) {
            self.error("expected [ in edge pattern".into());
            return None;
        }
        self.advance();

        let mut edge = EdgePattern {
            variable: None,
            edge_type: None,
            direction: Direction::Both,
        };

        if self.current_is(TokenKind::Identifier) {
            edge.variable = Some(self.current.literal.clone());
            self.advance();
        }

        if self.current_is(TokenKind::Colon) {
            self.advance();
            if !self.current_is(TokenKind::Identifier) {
                self.error("expected edge type after :".into());
                return None;
            }
            edge.edge_type = Some(self.current.literal.clone());
            self.advance();
        }

        if !self.current_is(TokenKind::RightBracket) {
            self.error("expected ] to close edge pattern".into());
            return None;
        }
        self.advance();

        edge.direction = if self.current_is(TokenKind::Arrow) {
            self.advance();
            if leading_in {
                Direction::Both
            } else {
                Direction::Out
            }
        } else if self.current_is(TokenKind::Dash) {
            self.advance();
            if leading_in {
                Direction::In
            } else {
                Direction::Both
            }
        } else if leading_in {
            self.error("expected - or -> to close <- edge pattern".into());
            return None;
        } else {
            Direction::Both
        };

        Some(edge)
    }

    fn parse_properties(&mut self) -> Option<BTreeMap<String, PropertyValue>> {
        let mut properties = BTreeMap::new();

        self.advance(); // consume {

        while !self.current_is(TokenKind::RightBrace) {
            if !self.current_is(TokenKind::Identifier) {
                self.error("expected property name".into());
                return None;
            }
            let key = self.current.literal.clone();
            self.advance();

            if !self.current_is(TokenKind::Colon) {
                self.error("expected : after property name".into());
                return None;
            }
            self.advance();

            let value = self.parse_literal_value()?;
            properties.insert(key, value);

            if self.current_is(TokenKind::Comma) {
                self.advance();
            } else if !self.current_is(TokenKind::RightBrace) {
                self.error("expected , or } in properties".into());
                return None;
            }
        }
        self.advance(); // consume }

        Some(properties)
    }

    fn parse_where_clause(&mut self) -> Option<WhereClause> {
        self.advance(); // consume WHERE
        let expr = self.parse_expression()?;
        Some(WhereClause { expr })
    }

    /// Precedence: OR binds loosest, then AND, then comparisons.
    fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_or_expression()
    }

    fn parse_or_expression(&mut self) -> Option<Expr> {
        let mut left = self.parse_and_expression()?;
        while self.current_is(TokenKind::Or) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::Or,
                right: Box::new(right),
            };
        }
        Some(left)
    }

    fn parse_and_expression(&mut self) -> Option<Expr> {
        let mut left = self.parse_comparison_expression()?;
        while self.current_is(TokenKind::And) {
            self.advance();
            let right = self.parse_comparison_expression()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::And,
                right: Box::new(right),
            };
        }
        Some(left)
    }

    fn parse_comparison_expression(&mut self) -> Option<Expr> {
        let left = self.parse_primary_expression()?;

        let op = match self.current.kind {
            TokenKind::Equal => BinaryOp::Equal,
            TokenKind::NotEqual => BinaryOp::NotEqual,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            _ => return Some(left),
        };
        self.advance();

        let right = self.parse_primary_expression()?;
        Some(Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_primary_expression(&mut self) -> Option<Expr> {
        if self.current_is(TokenKind::Identifier) && self.peek_is(TokenKind::Dot) {
            let variable = self.current.literal.clone();
            self.advance(); // identifier
            self.advance(); // dot
            if !self.current_is(TokenKind::Identifier) {
                self.error("expected property name after .".into());
                return None;
            }
            let property = self.current.literal.clone();
            self.advance();
            return Some(Expr::PropertyAccess { variable, property });
        }

        if self.current_is(TokenKind::Identifier) {
            let name = self.current.literal.clone();
            self.advance();
            return Some(Expr::Identifier(name));
        }

        self.parse_literal().map(Expr::Literal)
    }

    fn parse_literal_value(&mut self) -> Option<PropertyValue> {
        self.parse_literal()
    }

    fn parse_literal(&mut self) -> Option<PropertyValue> {
        match self.current.kind {
            TokenKind::String => {
                let value = PropertyValue::String(self.current.literal.clone());
                self.advance();
                Some(value)
            }
            TokenKind::Number => {
                let literal = self.current.literal.clone();
                let value = if let Ok(int) = literal.parse::<i64>() {
                    PropertyValue::Int(int)
                } else if let Ok(float) = literal.parse::<f64>() {
                    PropertyValue::Float(float)
                } else {
                    self.error(format!("invalid number: {literal}"));
                    return None;
                };
                self.advance();
                Some(value)
            }
            TokenKind::True => {
                self.advance();
                Some(PropertyValue::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Some(PropertyValue::Bool(false))
            }
            _ => {
                self.error(format!("unexpected token: {}", self.current.kind));
                None
            }
        }
    }

    fn parse_return_clause(&mut self) -> Option<ReturnClause> {
        self.advance(); // consume RETURN

        let mut items = Vec::new();
        loop {
            let expr = self.parse_primary_expression()?;
            items.push(ReturnItem { expr, alias: None });

            if !self.current_is(TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Some(ReturnClause {
            items,
            distinct: false,
        })
    }

    fn parse_order_by_clause(&mut self) -> Option<OrderByClause> {
        self.advance(); // consume ORDER
        if !self.current_is(TokenKind::By) {
            self.error("expected BY after ORDER".into());
            return None;
        }
        self.advance();

        let mut fields = Vec::new();
        loop {
            let expr = self.parse_primary_expression()?;
            let mut descending = false;
            if self.current_is(TokenKind::Identifier) {
                match self.current.literal.to_ascii_uppercase().as_str() {
                    "ASC" => self.advance(),
                    "DESC" => {
                        descending = true;
                        self.advance();
                    }
                    _ => {}
                }
            }
            fields.push(OrderByField { expr, descending });

            if !self.current_is(TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Some(OrderByClause { fields })
    }

    fn parse_limit_clause(&mut self) -> Option<usize> {
        self.advance(); // consume LIMIT

        if !self.current_is(TokenKind::Number) {
            self.error("expected number after LIMIT".into());
            return None;
        }
        let literal = self.current.literal.clone();
        let Ok(limit) = literal.parse::<usize>() else {
            self.error(format!("invalid LIMIT value: {literal}"));
            return None;
        };
        self.advance();
        Some(limit)
    }

    fn advance(&mut self) {
        self.current = std::mem::replace(&mut self.peek, self.lexer.next_token());
        let peeked = self.peek.clone();
        self.check_illegal(&peeked);
    }

    fn check_illegal(&mut self, token: &Token) {
        if token.kind == TokenKind::Illegal {
            self.errors.push(format!(
                "unrecognized character '{}' at line {}",
                token.literal, token.line
            ));
        }
    }

    fn current_is(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    fn error(&mut self, message: String) {
        self.errors
            .push(format!("{message} at line {}", self.current.line));
    }
}
