use std::fmt::Debug;
use std::sync::Arc;

/// Source position of a node, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Meta {
    pub line: usize,
    pub column: usize,
}

pub trait HasMeta {
    fn get_meta(&self) -> Meta;
}

#[derive(Debug)]
pub struct ProgramData {
    pub source_name: String,
    pub body: Vec<StatementType>,
    /// True when the source used `import` or `export`.
    pub is_module: bool,
}

#[derive(Debug)]
pub enum LiteralType {
    NullLiteral,
    BooleanLiteral(bool),
    StringLiteral(String),
    NumberLiteral(f64),
}

#[derive(Debug)]
pub struct LiteralData {
    pub meta: Meta,
    pub value: LiteralType,
}

#[derive(Debug)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    BitwiseNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    StrictlyEqual,
    StrictlyUnequal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    BitwiseLeftShift,
    BitwiseRightShift,
    BitwiseUnsignedRightShift,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Exponent,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    Or,
    And,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Equals,
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

#[derive(Debug)]
pub enum PropertyKey {
    Static(String),
    Computed(Box<ExpressionType>),
}

#[derive(Debug)]
pub enum MemberProperty {
    Static(String),
    Computed(Box<ExpressionType>),
}

#[derive(Debug)]
pub enum ExpressionOrSpreadElement {
    Expression(ExpressionType),
    SpreadElement(ExpressionType),
}

#[derive(Debug)]
pub enum PropertyData {
    Property { key: PropertyKey, value: ExpressionType },
    Spread(ExpressionType),
}

#[derive(Debug)]
pub enum ExpressionType {
    Literal(LiteralData),
    Identifier {
        meta: Meta,
        name: String,
    },
    ThisExpression {
        meta: Meta,
    },
    TemplateLiteral {
        meta: Meta,
        quasis: Vec<String>,
        expressions: Vec<ExpressionType>,
    },
    RegExpLiteral {
        meta: Meta,
        pattern: String,
        flags: String,
    },
    ArrayExpression {
        meta: Meta,
        elements: Vec<Option<ExpressionOrSpreadElement>>,
    },
    ObjectExpression {
        meta: Meta,
        properties: Vec<PropertyData>,
    },
    FunctionExpression(Arc<FunctionData>),
    UnaryExpression {
        meta: Meta,
        operator: UnaryOperator,
        argument: Box<ExpressionType>,
    },
    AwaitExpression {
        meta: Meta,
        argument: Box<ExpressionType>,
    },
    UpdateExpression {
        meta: Meta,
        operator: UpdateOperator,
        argument: Box<ExpressionType>,
        prefix: bool,
    },
    BinaryExpression {
        meta: Meta,
        operator: BinaryOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    LogicalExpression {
        meta: Meta,
        operator: LogicalOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    AssignmentExpression {
        meta: Meta,
        operator: AssignmentOperator,
        left: PatternType,
        right: Box<ExpressionType>,
    },
    ConditionalExpression {
        meta: Meta,
        test: Box<ExpressionType>,
        consequent: Box<ExpressionType>,
        alternate: Box<ExpressionType>,
    },
    MemberExpression {
        meta: Meta,
        object: Box<ExpressionType>,
        property: MemberProperty,
        optional: bool,
    },
    CallExpression {
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionOrSpreadElement>,
        optional: bool,
    },
    /// Boundary of an optional chain: a short-circuit anywhere inside yields `undefined`.
    ChainExpression {
        meta: Meta,
        expression: Box<ExpressionType>,
    },
    NewExpression {
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionOrSpreadElement>,
    },
    SequenceExpression {
        meta: Meta,
        expressions: Vec<ExpressionType>,
    },
}

impl HasMeta for ExpressionType {
    fn get_meta(&self) -> Meta {
        match self {
            ExpressionType::Literal(d) => d.meta,
            ExpressionType::FunctionExpression(f) => f.meta,
            ExpressionType::Identifier { meta, .. }
            | ExpressionType::ThisExpression { meta }
            | ExpressionType::TemplateLiteral { meta, .. }
            | ExpressionType::RegExpLiteral { meta, .. }
            | ExpressionType::ArrayExpression { meta, .. }
            | ExpressionType::ObjectExpression { meta, .. }
            | ExpressionType::UnaryExpression { meta, .. }
            | ExpressionType::AwaitExpression { meta, .. }
            | ExpressionType::UpdateExpression { meta, .. }
            | ExpressionType::BinaryExpression { meta, .. }
            | ExpressionType::LogicalExpression { meta, .. }
            | ExpressionType::AssignmentExpression { meta, .. }
            | ExpressionType::ConditionalExpression { meta, .. }
            | ExpressionType::MemberExpression { meta, .. }
            | ExpressionType::CallExpression { meta, .. }
            | ExpressionType::ChainExpression { meta, .. }
            | ExpressionType::NewExpression { meta, .. }
            | ExpressionType::SequenceExpression { meta, .. } => *meta,
        }
    }
}

#[derive(Debug)]
pub struct ObjectPatternProperty {
    pub key: PropertyKey,
    pub value: PatternType,
}

/// Binding and assignment targets.
#[derive(Debug)]
pub enum PatternType {
    Identifier(String),
    /// Assignment target that is a member expression, only valid outside declarations.
    Member(Box<ExpressionType>),
    ObjectPattern {
        properties: Vec<ObjectPatternProperty>,
        rest: Option<Box<PatternType>>,
    },
    ArrayPattern {
        elements: Vec<Option<PatternType>>,
        rest: Option<Box<PatternType>>,
    },
    AssignmentPattern {
        left: Box<PatternType>,
        right: Box<ExpressionType>,
    },
}

impl PatternType {
    /// Names introduced when the pattern is used in a declaration.
    pub fn bound_names(&self, names: &mut Vec<String>) {
        match self {
            PatternType::Identifier(n) => names.push(n.clone()),
            PatternType::Member(_) => {}
            PatternType::ObjectPattern { properties, rest } => {
                for p in properties {
                    p.value.bound_names(names);
                }
                if let Some(r) = rest {
                    r.bound_names(names);
                }
            }
            PatternType::ArrayPattern { elements, rest } => {
                for e in elements.iter().flatten() {
                    e.bound_names(names);
                }
                if let Some(r) = rest {
                    r.bound_names(names);
                }
            }
            PatternType::AssignmentPattern { left, .. } => left.bound_names(names),
        }
    }
}

#[derive(Debug)]
pub enum FunctionBody {
    Block(Vec<StatementType>),
    Expression(ExpressionType),
}

#[derive(Debug)]
pub struct FunctionData {
    pub meta: Meta,
    pub name: Option<String>,
    pub params: Vec<PatternType>,
    pub rest: Option<PatternType>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub is_async: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableDeclarationKind {
    Var,
    Let,
    Const,
}

#[derive(Debug)]
pub struct VariableDeclaratorData {
    pub id: PatternType,
    pub init: Option<ExpressionType>,
}

#[derive(Debug)]
pub struct VariableDeclarationData {
    pub meta: Meta,
    pub kind: VariableDeclarationKind,
    pub declarations: Vec<VariableDeclaratorData>,
}

#[derive(Debug)]
pub enum ForInit {
    VariableDeclaration(VariableDeclarationData),
    Expression(ExpressionType),
}

#[derive(Debug)]
pub struct ForBinding {
    /// `None` when the loop assigns to an existing target.
    pub kind: Option<VariableDeclarationKind>,
    pub target: PatternType,
}

#[derive(Debug)]
pub struct SwitchCase {
    pub test: Option<ExpressionType>,
    pub consequent: Vec<StatementType>,
}

#[derive(Debug)]
pub struct CatchClause {
    pub param: Option<PatternType>,
    pub body: Vec<StatementType>,
}

#[derive(Debug)]
pub struct ImportData {
    pub meta: Meta,
    pub source: String,
    pub default: Option<String>,
    pub namespace: Option<String>,
    /// `(imported, local)` pairs.
    pub named: Vec<(String, String)>,
}

#[derive(Debug)]
pub enum ExportData {
    Default(ExpressionType),
    Declaration(Box<StatementType>),
    /// `(local, exported)` pairs, optionally re-exported from another module.
    Named {
        specifiers: Vec<(String, String)>,
        source: Option<String>,
    },
    All {
        source: String,
        alias: Option<String>,
    },
}

#[derive(Debug)]
pub enum StatementType {
    ExpressionStatement {
        meta: Meta,
        expression: ExpressionType,
    },
    VariableDeclaration(VariableDeclarationData),
    FunctionDeclaration(Arc<FunctionData>),
    BlockStatement(Vec<StatementType>),
    EmptyStatement,
    IfStatement {
        test: ExpressionType,
        consequent: Box<StatementType>,
        alternate: Option<Box<StatementType>>,
    },
    ForStatement {
        init: Option<ForInit>,
        test: Option<ExpressionType>,
        update: Option<ExpressionType>,
        body: Box<StatementType>,
    },
    ForOfStatement {
        left: ForBinding,
        right: ExpressionType,
        body: Box<StatementType>,
    },
    ForInStatement {
        left: ForBinding,
        right: ExpressionType,
        body: Box<StatementType>,
    },
    WhileStatement {
        test: ExpressionType,
        body: Box<StatementType>,
    },
    DoWhileStatement {
        body: Box<StatementType>,
        test: ExpressionType,
    },
    SwitchStatement {
        discriminant: ExpressionType,
        cases: Vec<SwitchCase>,
    },
    BreakStatement(Option<String>),
    ContinueStatement(Option<String>),
    ReturnStatement(Option<ExpressionType>),
    ThrowStatement {
        meta: Meta,
        argument: ExpressionType,
    },
    TryStatement {
        block: Vec<StatementType>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<StatementType>>,
    },
    LabeledStatement {
        label: String,
        body: Box<StatementType>,
    },
    ImportDeclaration(ImportData),
    ExportDeclaration(ExportData),
}
