//! Abstract Syntax Tree (AST) definitions for the Ember source language.
//!
//! The node set is closed: the code generators accept exactly these shapes.
//! Structures follow ESTree naming where possible.

/// A complete program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<Statement>,
}

/// An identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
}

impl Identifier {
    /// Creates an identifier from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable declaration (`var a = 1, b;`)
    VariableDeclaration(VariableDeclaration),
    /// Function declaration
    FunctionDeclaration(Function),
    /// Expression statement
    Expression(ExpressionStatement),
    /// Block statement { ... }
    Block(BlockStatement),
    /// If statement
    If(IfStatement),
    /// While statement
    While(WhileStatement),
    /// Do-while statement
    DoWhile(DoWhileStatement),
    /// For statement
    For(ForStatement),
    /// Return statement
    Return(ReturnStatement),
    /// Empty statement (;)
    Empty,
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
}

/// A single variable declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    /// The identifier being declared
    pub id: Identifier,
    /// Optional initializer expression
    pub init: Option<Expression>,
}

/// A function, either declared as a statement or written as an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// The function name (always present for declarations)
    pub id: Option<Identifier>,
    /// The parameters
    pub params: Vec<Identifier>,
    /// The function body
    pub body: Vec<Statement>,
}

/// An expression statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
}

/// A block statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    /// The statements in the block
    pub body: Vec<Statement>,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    /// The condition
    pub test: Expression,
    /// The then branch
    pub consequent: Box<Statement>,
    /// The optional else branch
    pub alternate: Option<Box<Statement>>,
}

/// A while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    /// The condition
    pub test: Expression,
    /// The loop body
    pub body: Box<Statement>,
}

/// A do-while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStatement {
    /// The loop body
    pub body: Box<Statement>,
    /// The condition
    pub test: Expression,
}

/// A for statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    /// The initializer
    pub init: Option<ForInit>,
    /// The condition
    pub test: Option<Expression>,
    /// The update expression
    pub update: Option<Expression>,
    /// The loop body
    pub body: Box<Statement>,
}

/// For loop initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// Variable declaration
    Declaration(VariableDeclaration),
    /// Expression
    Expression(Expression),
}

/// A return statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    /// The return value
    pub argument: Option<Expression>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Identifier reference
    Identifier(Identifier),
    /// Array literal
    Array(ArrayExpression),
    /// Object literal
    Object(ObjectExpression),
    /// Binary expression, including `&&` and `||`
    Binary(BinaryExpression),
    /// Unary expression
    Unary(UnaryExpression),
    /// Assignment expression
    Assignment(AssignmentExpression),
    /// Call expression
    Call(CallExpression),
    /// Member access expression
    Member(MemberExpression),
    /// Conditional (ternary) expression
    Conditional(ConditionalExpression),
    /// Function expression
    Function(Function),
    /// new expression
    New(NewExpression),
    /// Update expression (++/--)
    Update(UpdateExpression),
    /// Sequence expression (comma operator)
    Sequence(SequenceExpression),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// null literal
    Null,
    /// undefined literal
    Undefined,
}

/// An array expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpression {
    /// The elements (None represents a hole)
    pub elements: Vec<Option<Expression>>,
}

/// An object expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectExpression {
    /// The properties, in source order
    pub properties: Vec<Property>,
}

/// An object literal property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// The property key, already converted to its string form
    pub key: String,
    /// The property value
    pub value: Expression,
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// The left operand
    pub left: Box<Expression>,
    /// The right operand
    pub right: Box<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    // Comparison
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    // Logical
    LogicalAnd,
    LogicalOr,
    // Bitwise
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
    UnsignedRightShift,
    // Parsed but not compiled
    In,
    InstanceOf,
}

impl BinaryOperator {
    /// The source spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::StrictNotEqual => "!==",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::BitwiseXor => "^",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
            BinaryOperator::UnsignedRightShift => ">>>",
            BinaryOperator::In => "in",
            BinaryOperator::InstanceOf => "instanceof",
        }
    }
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The operand
    pub argument: Box<Expression>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    LogicalNot,
    /// ~
    BitwiseNot,
    /// typeof
    Typeof,
    /// void
    Void,
    /// delete
    Delete,
}

/// An assignment expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExpression {
    /// The operator
    pub operator: AssignmentOperator,
    /// The left-hand side
    pub left: Box<Expression>,
    /// The right-hand side
    pub right: Box<Expression>,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    LeftShiftAssign,
    RightShiftAssign,
    UnsignedRightShiftAssign,
    BitwiseAndAssign,
    BitwiseOrAssign,
    BitwiseXorAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies, or `None` for `=`.
    pub fn binary_operator(self) -> Option<BinaryOperator> {
        Some(match self {
            AssignmentOperator::Assign => return None,
            AssignmentOperator::AddAssign => BinaryOperator::Add,
            AssignmentOperator::SubtractAssign => BinaryOperator::Subtract,
            AssignmentOperator::MultiplyAssign => BinaryOperator::Multiply,
            AssignmentOperator::DivideAssign => BinaryOperator::Divide,
            AssignmentOperator::ModuloAssign => BinaryOperator::Modulo,
            AssignmentOperator::LeftShiftAssign => BinaryOperator::LeftShift,
            AssignmentOperator::RightShiftAssign => BinaryOperator::RightShift,
            AssignmentOperator::UnsignedRightShiftAssign => BinaryOperator::UnsignedRightShift,
            AssignmentOperator::BitwiseAndAssign => BinaryOperator::BitwiseAnd,
            AssignmentOperator::BitwiseOrAssign => BinaryOperator::BitwiseOr,
            AssignmentOperator::BitwiseXorAssign => BinaryOperator::BitwiseXor,
        })
    }
}

/// A function call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    /// The function being called
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Expression>,
}

/// A member access expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    /// The object
    pub object: Box<Expression>,
    /// The property
    pub property: MemberProperty,
}

/// Member property.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    /// Identifier property (dot notation)
    Identifier(Identifier),
    /// Computed property expression (bracket notation)
    Expression(Box<Expression>),
}

/// A conditional (ternary) expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    /// The condition
    pub test: Box<Expression>,
    /// The consequent (if true)
    pub consequent: Box<Expression>,
    /// The alternate (if false)
    pub alternate: Box<Expression>,
}

/// A new expression.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpression {
    /// The constructor
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Expression>,
}

/// An update expression (++/--)
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    /// The operator
    pub operator: UpdateOperator,
    /// The operand
    pub argument: Box<Expression>,
    /// Whether prefix (++x) or postfix (x++)
    pub prefix: bool,
}

/// Update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}

/// A sequence expression (comma operator).
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceExpression {
    /// The expressions
    pub expressions: Vec<Expression>,
}
