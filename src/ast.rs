use std::fmt;

/// AST 的根节点, 代表一个完整的查询语句
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select {
        /// 投影列表，空列表表示 `*`
        projection: Vec<Expr>,
        table: Identifier,
        /// WHERE 子句中的布尔表达式
        selection: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

/// 列引用，例如 `WorkflowID` 或 `t.WorkflowID`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: Option<Identifier>,
    pub name: Identifier,
}

/// 表达式树
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 逻辑与运算 (AND)
    And(Box<Expr>, Box<Expr>),
    /// 逻辑或运算 (OR)
    Or(Box<Expr>, Box<Expr>),
    /// 逻辑非运算 (NOT)
    Not(Box<Expr>),
    /// 使用括号分组的表达式
    Paren(Box<Expr>),
    /// 二元比较运算, 包括 IN 和 LIKE
    Comparison {
        left: Box<Expr>,
        op: CompOp,
        right: Box<Expr>,
    },
    /// 空值检查
    IsNull { expr: Box<Expr>, negated: bool },
    Column(ColumnRef),
    Literal(Literal),
    Null,
    Boolean(bool),
    /// 括号中的值列表, 仅作为 IN 的右侧出现
    Tuple(Vec<Expr>),
    Function { name: Identifier, args: Vec<Expr> },
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,      // =
    NotEq,   // !=
    Gt,      // >
    Lt,      // <
    Gte,     // >=
    Lte,     // <=
    In,      // IN
    NotIn,   // NOT IN
    Like,    // LIKE
    NotLike, // NOT LIKE
}

/// 字面量值, 保留源文本
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// 包含两端单引号的原始字符串
    String(String),
    /// 原始数字文本, 负数带 `-` 前缀
    Number(String),
}

impl Literal {
    pub fn raw(&self) -> &str {
        match self {
            Literal::String(s) | Literal::Number(s) => s,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}.{}", qualifier, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompOp::Eq => "=",
            CompOp::NotEq => "!=",
            CompOp::Gt => ">",
            CompOp::Lt => "<",
            CompOp::Gte => ">=",
            CompOp::Lte => "<=",
            CompOp::In => "in",
            CompOp::NotIn => "not in",
            CompOp::Like => "like",
            CompOp::NotLike => "not like",
        };
        f.write_str(op)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// 将表达式还原为 SQL 文本, 用于错误信息
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::And(left, right) => write!(f, "{} and {}", left, right),
            Expr::Or(left, right) => write!(f, "{} or {}", left, right),
            Expr::Not(inner) => write!(f, "not {}", inner),
            Expr::Paren(inner) => write!(f, "({})", inner),
            Expr::Comparison { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::IsNull { expr, negated: false } => write!(f, "{} is null", expr),
            Expr::IsNull { expr, negated: true } => write!(f, "{} is not null", expr),
            Expr::Column(column) => write!(f, "{}", column),
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::Null => f.write_str("null"),
            Expr::Boolean(true) => f.write_str("true"),
            Expr::Boolean(false) => f.write_str("false"),
            Expr::Tuple(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}
