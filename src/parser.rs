//! 过滤语句的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 期望 SELECT
//!   ├─ 解析投影列表 ('*' 或 逗号分隔的表达式)
//!   ├─ 期望 FROM 和表名 (Identifier)
//!   ├─ 可选 WHERE → parse_expression()
//!   ├─ 可选 ';'
//!   └─ 期望输入结束
//!
//! parse_expression() (递归下降解析)
//!   └─ parse_or_expression()
//!        ├─ parse_and_expression()
//!        │    ├─ parse_not_expression()
//!        │    │    └─ parse_predicate()
//!        │    │         ├─ parse_operand()
//!        │    │         │    ├─ "(" → 分组表达式 (递归调用parse_expression)
//!        │    │         │    ├─ 字面值 / NULL / TRUE / FALSE
//!        │    │         │    ├─ '-' 数字 → 负数字面值
//!        │    │         │    └─ 标识符 → 列引用 / 限定列引用 / 函数调用
//!        │    │         │
//!        │    │         └─ 可选后缀: 比较运算符 / [NOT] IN / [NOT] LIKE / IS [NOT] NULL
//!        │    │
//!        │    └─ 遇到AND时，继续解析右侧NOT表达式
//!        │
//!        └─ 遇到OR时，继续解析右侧AND表达式
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **比较操作** `a = 1`, `a IN (...)`, `a LIKE 'x'`, `a IS NULL`
//! 3. **NOT操作** `NOT expression`
//! 4. **AND操作** `expr1 AND expr2`
//! 5. **OR操作** `expr1 OR expr2`
//!
//! 语法接受的范围比过滤器实际支持的更宽：OR、NOT、IN 等都能被解析，
//! 由 [`crate::query_parser`] 给出具体的拒绝原因。

use crate::ast::{ColumnRef, CompOp, Expr, Identifier, Literal, Statement};
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

/// 默认的最大嵌套深度
pub const DEFAULT_MAX_DEPTH: usize = 200;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    depth: usize,
    max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self { message, span: Some(span) }
    }

    /// 将位置信息平移 `offset` 个字节, 用于去掉模板前缀
    pub fn shifted_back(self, offset: usize) -> Self {
        Self {
            message: self.message,
            span: self.span.map(|span| span.shift_back(offset)),
        }
    }
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self::with_max_depth(tokens, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(tokens: &'a [Token<'a>], max_depth: usize) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
            max_depth,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前位置之后第 `n` 个 token
    fn peek_nth(&self, n: usize) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position + n)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.peek()?;
        self.position += 1;
        Some(token)
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind) -> Result<&'a Token<'a>, ParseError> {
        match self.peek() {
            Some(token) if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) => {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError::at_position(
                format!("Expected {:?}, found {:?}", expected, token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            )),
        }
    }

    fn expect_identifier(&mut self) -> Result<Identifier, ParseError> {
        let token = self.expect(TokenKind::Identifier(""))?;
        match token.kind {
            TokenKind::Identifier(name) => Ok(Identifier(name.to_string())),
            _ => Err(ParseError::at_position("Expected identifier".to_string(), token.span)),
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        self.peek()
            .is_some_and(|token| std::mem::discriminant(&token.kind) == std::mem::discriminant(kind))
    }

    /// 进入一层嵌套, 超过上限时报错
    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            let span = self.peek().map(|token| token.span);
            return Err(ParseError::new(
                format!("expression nesting exceeds maximum depth of {}", self.max_depth),
                span,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    pub fn parse(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::Select)?;

        let mut projection = Vec::new();
        if self.match_token(&TokenKind::Star) {
            self.advance(); // 消费 '*'
        } else {
            projection = self.parse_expression_list()?;
        }

        self.expect(TokenKind::From)?;
        let table = self.expect_identifier()?;

        let selection = if self.match_token(&TokenKind::Where) {
            self.advance(); // 消费 WHERE
            Some(self.parse_expression()?)
        } else {
            None
        };

        if self.match_token(&TokenKind::Semicolon) {
            self.advance();
        }

        if let Some(token) = self.peek() {
            return Err(ParseError::at_position(
                format!("Unexpected token: {:?}", token.kind),
                token.span,
            ));
        }

        Ok(Statement::Select {
            projection,
            table,
            selection,
        })
    }

    /// 解析表达式的入口点
    ///
    /// 按照优先级从低到高依次处理：OR → AND → NOT → PREDICATE
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let expr = self.parse_or_expression()?;
        self.leave();
        Ok(expr)
    }

    /// 语法: `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 OR
            let right = self.parse_and_expression()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// 语法: `not_expr (AND not_expr)*`
    fn parse_and_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expression()?;

        while self.match_token(&TokenKind::And) {
            self.advance(); // 消费 AND
            let right = self.parse_not_expression()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// 语法: `NOT* predicate`
    fn parse_not_expression(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::Not) {
            self.advance(); // 消费 NOT
            self.enter()?;
            let expr = self.parse_not_expression()?;
            self.leave();
            Ok(Expr::Not(Box::new(expr)))
        } else {
            self.parse_predicate()
        }
    }

    /// 解析一个操作数以及可选的比较后缀
    fn parse_predicate(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;

        let Some(token) = self.peek() else {
            return Ok(left);
        };

        match &token.kind {
            TokenKind::Eq | TokenKind::NotEq | TokenKind::Gt | TokenKind::Lt | TokenKind::Gte | TokenKind::Lte => {
                let op = self.parse_comparison_operator()?;
                let right = self.parse_operand()?;
                Ok(comparison(left, op, right))
            }
            TokenKind::In => {
                self.advance(); // 消费 IN
                let right = self.parse_tuple()?;
                Ok(comparison(left, CompOp::In, right))
            }
            TokenKind::Like => {
                self.advance(); // 消费 LIKE
                let right = self.parse_operand()?;
                Ok(comparison(left, CompOp::Like, right))
            }
            TokenKind::Not => match self.peek_nth(1).map(|t| &t.kind) {
                Some(TokenKind::In) => {
                    self.position += 2; // 消费 NOT IN
                    let right = self.parse_tuple()?;
                    Ok(comparison(left, CompOp::NotIn, right))
                }
                Some(TokenKind::Like) => {
                    self.position += 2; // 消费 NOT LIKE
                    let right = self.parse_operand()?;
                    Ok(comparison(left, CompOp::NotLike, right))
                }
                _ => Err(ParseError::at_position(
                    "Expected IN or LIKE after NOT".to_string(),
                    token.span,
                )),
            },
            TokenKind::Is => {
                self.advance(); // 消费 IS
                let negated = self.match_token(&TokenKind::Not);
                if negated {
                    self.advance(); // 消费 NOT
                }
                self.expect(TokenKind::Null)?;
                Ok(Expr::IsNull { expr: Box::new(left), negated })
            }
            _ => Ok(left),
        }
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Unexpected end of input".to_string(), None));
        };

        match &token.kind {
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Paren(Box::new(expr)))
            }
            TokenKind::String(raw) => Ok(Expr::Literal(Literal::String(single_quoted(raw)))),
            TokenKind::Number(raw) => Ok(Expr::Literal(Literal::Number(raw.to_string()))),
            TokenKind::Dash => {
                let number = self.expect(TokenKind::Number(""))?;
                match number.kind {
                    TokenKind::Number(raw) => Ok(Expr::Literal(Literal::Number(format!("-{}", raw)))),
                    _ => Err(ParseError::at_position("Expected number".to_string(), number.span)),
                }
            }
            TokenKind::Null => Ok(Expr::Null),
            TokenKind::True => Ok(Expr::Boolean(true)),
            TokenKind::False => Ok(Expr::Boolean(false)),
            TokenKind::Identifier(name) => {
                let name = Identifier(name.to_string());
                if self.match_token(&TokenKind::LParen) {
                    self.advance(); // 消费 (
                    let args = if self.match_token(&TokenKind::RParen) {
                        Vec::new()
                    } else {
                        self.parse_expression_list()?
                    };
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::Function { name, args })
                } else if self.match_token(&TokenKind::Dot) {
                    self.advance(); // 消费 '.'
                    let column = self.expect_identifier()?;
                    Ok(Expr::Column(ColumnRef { qualifier: Some(name), name: column }))
                } else {
                    Ok(Expr::Column(ColumnRef { qualifier: None, name }))
                }
            }
            TokenKind::Illegal => Err(ParseError::at_position(
                "Unrecognized input".to_string(),
                token.span,
            )),
            _ => Err(ParseError::at_position(
                format!("Expected expression, found {:?}", token.kind),
                token.span,
            )),
        }
    }

    /// 解析 `( expr, ... )` 形式的值列表
    fn parse_tuple(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen)?;
        let items = self.parse_expression_list()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::Tuple(items))
    }

    fn parse_expression_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut items = vec![self.parse_expression()?];
        while self.match_token(&TokenKind::Comma) {
            self.advance(); // 消费 ','
            items.push(self.parse_expression()?);
        }
        Ok(items)
    }

    fn parse_comparison_operator(&mut self) -> Result<CompOp, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Expected comparison operator".to_string(), None));
        };
        match &token.kind {
            TokenKind::Eq => Ok(CompOp::Eq),
            TokenKind::NotEq => Ok(CompOp::NotEq),
            TokenKind::Gt => Ok(CompOp::Gt),
            TokenKind::Lt => Ok(CompOp::Lt),
            TokenKind::Gte => Ok(CompOp::Gte),
            TokenKind::Lte => Ok(CompOp::Lte),
            _ => Err(ParseError::at_position(
                format!("Expected comparison operator, found {:?}", token.kind),
                token.span,
            )),
        }
    }
}

/// 将双引号字符串改写为等价的单引号形式，单引号字符串保持不变
fn single_quoted(raw: &str) -> String {
    match raw.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        Some(inner) => format!("'{}'", inner.replace("\"\"", "\"").replace('\'', "''")),
        None => raw.to_string(),
    }
}

fn comparison(left: Expr, op: CompOp, right: Expr) -> Expr {
    Expr::Comparison {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}
