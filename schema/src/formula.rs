//! Damage formula language.
//!
//! Formulas are small arithmetic expressions over the acting battler (`a`),
//! the target (`b`) and the game variables (`v[n]`), e.g.
//! `a.atk * 4 - b.def * 2` or `b.isStateAffected(4) ? a.mat * 3 : a.mat`.
//! They are parsed once when the data is loaded and evaluated against a
//! [`FormulaScope`]; evaluation never runs host code.

use crate::params::{Param, SParam, XParam};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("unexpected token '{found}' at {pos}")]
    UnexpectedToken { pos: usize, found: String },
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("unknown battler property '{0}'")]
    UnknownStat(String),
    #[error("Math.{function} takes {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("variable index {0} is not a valid id")]
    BadVariableIndex(f64),
    #[error("formula evaluated to a non-finite value")]
    NonFinite,
    #[error("formula nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("formula has more than {0} tokens")]
    TooLong(usize),
}

/// Which side of the action a stat reference reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// `a`: the acting battler.
    Subject,
    /// `b`: the battler the action is applied to.
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    Hp,
    Mp,
    Tp,
    Level,
    Param(Param),
    XParam(XParam),
    SParam(SParam),
}

impl Stat {
    fn from_name(name: &str) -> Option<Stat> {
        let stat = match name {
            "hp" => Stat::Hp,
            "mp" => Stat::Mp,
            "tp" => Stat::Tp,
            "level" => Stat::Level,
            "mhp" => Stat::Param(Param::Mhp),
            "mmp" => Stat::Param(Param::Mmp),
            "atk" => Stat::Param(Param::Atk),
            "def" => Stat::Param(Param::Def),
            "mat" => Stat::Param(Param::Mat),
            "mdf" => Stat::Param(Param::Mdf),
            "agi" => Stat::Param(Param::Agi),
            "luk" => Stat::Param(Param::Luk),
            "hit" => Stat::XParam(XParam::Hit),
            "eva" => Stat::XParam(XParam::Eva),
            "cri" => Stat::XParam(XParam::Cri),
            "cev" => Stat::XParam(XParam::Cev),
            "mev" => Stat::XParam(XParam::Mev),
            "mrf" => Stat::XParam(XParam::Mrf),
            "cnt" => Stat::XParam(XParam::Cnt),
            "hrg" => Stat::XParam(XParam::Hrg),
            "mrg" => Stat::XParam(XParam::Mrg),
            "trg" => Stat::XParam(XParam::Trg),
            "tgr" => Stat::SParam(SParam::Tgr),
            "grd" => Stat::SParam(SParam::Grd),
            "rec" => Stat::SParam(SParam::Rec),
            "pha" => Stat::SParam(SParam::Pha),
            "mcr" => Stat::SParam(SParam::Mcr),
            "tcr" => Stat::SParam(SParam::Tcr),
            "pdr" => Stat::SParam(SParam::Pdr),
            "mdr" => Stat::SParam(SParam::Mdr),
            "fdr" => Stat::SParam(SParam::Fdr),
            "exr" => Stat::SParam(SParam::Exr),
            _ => return None,
        };
        Some(stat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Floor,
    Ceil,
    Round,
    Abs,
    Sqrt,
    Max,
    Min,
    Pow,
    Random,
    RandomInt,
}

impl Function {
    fn from_name(name: &str) -> Option<Function> {
        let function = match name {
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "round" => Function::Round,
            "abs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "max" => Function::Max,
            "min" => Function::Min,
            "pow" => Function::Pow,
            "random" => Function::Random,
            "randomInt" => Function::RandomInt,
            _ => return None,
        };
        Some(function)
    }

    fn name(self) -> &'static str {
        match self {
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Round => "round",
            Function::Abs => "abs",
            Function::Sqrt => "sqrt",
            Function::Max => "max",
            Function::Min => "min",
            Function::Pow => "pow",
            Function::Random => "random",
            Function::RandomInt => "randomInt",
        }
    }

    /// `None` means variadic with at least one argument.
    fn arity(self) -> Option<usize> {
        match self {
            Function::Max | Function::Min => None,
            Function::Pow => Some(2),
            Function::Random => Some(0),
            _ => Some(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Stat {
        who: Operand,
        stat: Stat,
    },
    Variable(Box<Expr>),
    StateAffected {
        who: Operand,
        state_id: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

/// Everything a formula may read. Implemented by the battle engine for a
/// concrete subject/target pair.
pub trait FormulaScope {
    fn stat(&self, who: Operand, stat: Stat) -> f64;
    fn variable(&self, id: u32) -> f64;
    fn is_state_affected(&self, who: Operand, state_id: u32) -> bool;
    /// Uniform draw in `[0, 1)`.
    fn random(&mut self) -> f64;
}

fn truthy(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl Expr {
    pub fn eval(&self, scope: &mut dyn FormulaScope) -> Result<f64, FormulaError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Stat { who, stat } => Ok(scope.stat(*who, *stat)),
            Expr::Variable(index) => {
                let id = Self::eval_id(index, scope)?;
                Ok(scope.variable(id))
            }
            Expr::StateAffected { who, state_id } => {
                let id = Self::eval_id(state_id, scope)?;
                Ok(flag(scope.is_state_affected(*who, id)))
            }
            Expr::Unary { op, expr } => {
                let value = expr.eval(scope)?;
                Ok(match op {
                    UnaryOp::Neg => -value,
                    UnaryOp::Not => flag(!truthy(value)),
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = lhs.eval(scope)?;
                // Short-circuit the logical operators; they yield an operand.
                match op {
                    BinOp::And if !truthy(left) => return Ok(left),
                    BinOp::Or if truthy(left) => return Ok(left),
                    _ => {}
                }
                let right = rhs.eval(scope)?;
                Ok(match op {
                    BinOp::Add => left + right,
                    BinOp::Sub => left - right,
                    BinOp::Mul => left * right,
                    BinOp::Div => left / right,
                    BinOp::Rem => left % right,
                    BinOp::Lt => flag(left < right),
                    BinOp::Le => flag(left <= right),
                    BinOp::Gt => flag(left > right),
                    BinOp::Ge => flag(left >= right),
                    BinOp::Eq => flag(left == right),
                    BinOp::Ne => flag(left != right),
                    BinOp::And | BinOp::Or => right,
                })
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if truthy(condition.eval(scope)?) {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
            Expr::Call { function, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(scope)?);
                }
                Ok(match function {
                    Function::Floor => values[0].floor(),
                    Function::Ceil => values[0].ceil(),
                    Function::Round => values[0].round(),
                    Function::Abs => values[0].abs(),
                    Function::Sqrt => values[0].sqrt(),
                    Function::Pow => values[0].powf(values[1]),
                    Function::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    Function::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
                    Function::Random => scope.random(),
                    Function::RandomInt => (scope.random() * values[0].max(0.0)).floor(),
                })
            }
        }
    }

    fn eval_id(expr: &Expr, scope: &mut dyn FormulaScope) -> Result<u32, FormulaError> {
        let value = expr.eval(scope)?;
        if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
            return Err(FormulaError::BadVariableIndex(value));
        }
        Ok(value.floor() as u32)
    }
}

// --- TOKENIZER ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Op(op) => write!(f, "{}", op),
        }
    }
}

const OPERATORS: [&str; 24] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "!",
    "(", ")", "[", "]", ",", "?", ":", ".",
];

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit()))
        {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| FormulaError::UnexpectedToken {
                    pos: start,
                    found: text.clone(),
                })?;
            tokens.push((start, Token::Number(value)));
            continue;
        }

        if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '$')
            {
                pos += 1;
            }
            tokens.push((start, Token::Ident(chars[start..pos].iter().collect())));
            continue;
        }

        let rest: String = chars[pos..chars.len().min(pos + 3)].iter().collect();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push((pos, Token::Op(*op)));
                pos += op.len();
            }
            None => return Err(FormulaError::UnexpectedChar { pos, ch }),
        }
    }

    Ok(tokens)
}

// --- PARSER ---

/// Nesting limit for parentheses, conditionals, calls and prefix operators.
const MAX_DEPTH: usize = 64;
/// Token limit; also bounds the size of the parsed tree.
const MAX_TOKENS: usize = 1024;

struct Parser {
    tokens: Vec<(usize, Token)>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(_, token)| token)
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn next(&mut self) -> Result<(usize, Token), FormulaError> {
        let token = self
            .tokens
            .get(self.index)
            .cloned()
            .ok_or(FormulaError::UnexpectedEnd)?;
        self.index += 1;
        Ok(token)
    }

    fn unexpected(pos: usize, token: &Token) -> FormulaError {
        FormulaError::UnexpectedToken {
            pos,
            found: token.to_string(),
        }
    }

    fn expect_op(&mut self, expected: &str) -> Result<(), FormulaError> {
        let (pos, token) = self.next()?;
        match token {
            Token::Op(op) if op == expected => Ok(()),
            other => Err(Self::unexpected(pos, &other)),
        }
    }

    fn expect_ident(&mut self) -> Result<String, FormulaError> {
        let (pos, token) = self.next()?;
        match token {
            Token::Ident(name) => Ok(name),
            other => Err(Self::unexpected(pos, &other)),
        }
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        self.enter()?;
        let expr = self.conditional();
        self.depth -= 1;
        expr
    }

    fn conditional(&mut self) -> Result<Expr, FormulaError> {
        let condition = self.binary(0)?;
        if self.peek_op() != Some("?") {
            return Ok(condition);
        }
        self.index += 1;
        let then = self.expression()?;
        self.expect_op(":")?;
        let otherwise = self.expression()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// Binding power table, lowest first.
    fn binary_op(op: &str) -> Option<(u8, BinOp)> {
        let entry = match op {
            "||" => (1, BinOp::Or),
            "&&" => (2, BinOp::And),
            "==" | "===" => (3, BinOp::Eq),
            "!=" | "!==" => (3, BinOp::Ne),
            "<" => (4, BinOp::Lt),
            "<=" => (4, BinOp::Le),
            ">" => (4, BinOp::Gt),
            ">=" => (4, BinOp::Ge),
            "+" => (5, BinOp::Add),
            "-" => (5, BinOp::Sub),
            "*" => (6, BinOp::Mul),
            "/" => (6, BinOp::Div),
            "%" => (6, BinOp::Rem),
            _ => return None,
        };
        Some(entry)
    }

    fn binary(&mut self, min_power: u8) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        while let Some((power, op)) = self.peek_op().and_then(Self::binary_op) {
            if power <= min_power {
                break;
            }
            self.index += 1;
            let rhs = self.binary(power)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        self.enter()?;
        let expr = self.prefixed();
        self.depth -= 1;
        expr
    }

    fn prefixed(&mut self) -> Result<Expr, FormulaError> {
        match self.peek_op() {
            Some("-") => {
                self.index += 1;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(self.unary()?),
                })
            }
            Some("+") => {
                self.index += 1;
                self.unary()
            }
            Some("!") => {
                self.index += 1;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(self.unary()?),
                })
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let (pos, token) = self.next()?;
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Op("(") => {
                let inner = self.expression()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Token::Ident(name) => self.identifier(name),
            other => Err(Self::unexpected(pos, &other)),
        }
    }

    fn identifier(&mut self, name: String) -> Result<Expr, FormulaError> {
        match name.as_str() {
            "a" | "b" => {
                let who = if name == "a" {
                    Operand::Subject
                } else {
                    Operand::Target
                };
                self.expect_op(".")?;
                let property = self.expect_ident()?;
                if property == "isStateAffected" {
                    self.expect_op("(")?;
                    let state_id = self.expression()?;
                    self.expect_op(")")?;
                    return Ok(Expr::StateAffected {
                        who,
                        state_id: Box::new(state_id),
                    });
                }
                Stat::from_name(&property)
                    .map(|stat| Expr::Stat { who, stat })
                    .ok_or(FormulaError::UnknownStat(property))
            }
            "v" => {
                self.expect_op("[")?;
                let index = self.expression()?;
                self.expect_op("]")?;
                Ok(Expr::Variable(Box::new(index)))
            }
            "Math" => {
                self.expect_op(".")?;
                let function_name = self.expect_ident()?;
                let function = Function::from_name(&function_name)
                    .ok_or(FormulaError::UnknownIdentifier(format!("Math.{}", function_name)))?;
                let args = self.arguments()?;
                let arity_ok = match function.arity() {
                    Some(expected) => args.len() == expected,
                    None => !args.is_empty(),
                };
                if !arity_ok {
                    return Err(FormulaError::Arity {
                        function: function.name(),
                        expected: function.arity().unwrap_or(1),
                        found: args.len(),
                    });
                }
                Ok(Expr::Call { function, args })
            }
            "true" => Ok(Expr::Number(1.0)),
            "false" => Ok(Expr::Number(0.0)),
            _ => Err(FormulaError::UnknownIdentifier(name)),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, FormulaError> {
        self.expect_op("(")?;
        let mut args = Vec::new();
        if self.peek_op() == Some(")") {
            self.index += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            let (pos, token) = self.next()?;
            match token {
                Token::Op(")") => return Ok(args),
                Token::Op(",") => continue,
                other => return Err(Self::unexpected(pos, &other)),
            }
        }
    }
}

pub fn parse(source: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }
    if tokens.len() > MAX_TOKENS {
        return Err(FormulaError::TooLong(MAX_TOKENS));
    }
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    match parser.tokens.get(parser.index) {
        None => Ok(expr),
        Some((pos, token)) => Err(Parser::unexpected(*pos, token)),
    }
}

/// A damage formula as authored, together with its parsed form.
///
/// A formula that fails to parse is still a valid value: it keeps the parse
/// error and evaluates to that error, which the damage pipeline treats as 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Formula {
    source: String,
    parsed: Result<Expr, FormulaError>,
}

impl Formula {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let parsed = parse(&source);
        Self { source, parsed }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_ok()
    }

    pub fn evaluate(&self, scope: &mut dyn FormulaScope) -> Result<f64, FormulaError> {
        let expr = self.parsed.as_ref().map_err(Clone::clone)?;
        let value = expr.eval(scope)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

impl Default for Formula {
    fn default() -> Self {
        Formula::new("0")
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl From<String> for Formula {
    fn from(source: String) -> Self {
        Formula::new(source)
    }
}

impl From<&str> for Formula {
    fn from(source: &str) -> Self {
        Formula::new(source)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.source
    }
}
