//! The main parser implementation.

use crate::ast::*;
use crate::lexer::{Scanner, Token, TokenKind};
use crate::runtime::value::number_to_string;
use crate::{Error, Result};

/// A recursive descent parser for the Ember source language.
pub struct Parser<'a> {
    source: &'a str,
    scanner: Scanner<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            source,
            scanner,
            current,
        }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program { body })
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> Result<Statement> {
        match &self.current.kind {
            TokenKind::Var => {
                let declaration = self.parse_variable_declaration()?;
                self.consume_semicolon()?;
                Ok(Statement::VariableDeclaration(declaration))
            }
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::LeftBrace => self.parse_block_statement(),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            TokenKind::Let
            | TokenKind::Const
            | TokenKind::Switch
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Throw
            | TokenKind::Try
            | TokenKind::With
            | TokenKind::Class
            | TokenKind::Debugger => Err(self.unsupported()),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration> {
        self.advance(); // consume 'var'

        let mut declarations = Vec::new();

        loop {
            let id = self.expect_identifier()?;
            let init = if self.check(&TokenKind::Equal) {
                self.advance();
                Some(self.parse_assignment()?)
            } else {
                None
            };

            declarations.push(VariableDeclarator { id, init });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(VariableDeclaration { declarations })
    }

    fn parse_function_declaration(&mut self) -> Result<Statement> {
        self.advance(); // consume 'function'

        let id = self.expect_identifier()?;
        let (params, body) = self.parse_function_rest()?;

        Ok(Statement::FunctionDeclaration(Function {
            id: Some(id),
            params,
            body,
        }))
    }

    /// Parses `(params) { body }`.
    fn parse_function_rest(&mut self) -> Result<(Vec<Identifier>, Vec<Statement>)> {
        self.expect(&TokenKind::LeftParen)?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        self.expect(&TokenKind::RightParen)?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok((params, body))
    }

    fn parse_if_statement(&mut self) -> Result<Statement> {
        self.advance(); // consume 'if'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement> {
        self.advance(); // consume 'while'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = Box::new(self.parse_statement()?);

        Ok(Statement::While(WhileStatement { test, body }))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement> {
        self.advance(); // consume 'do'
        let body = Box::new(self.parse_statement()?);
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        // The semicolon after do-while is always optional.
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }

        Ok(Statement::DoWhile(DoWhileStatement { body, test }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement> {
        self.advance(); // consume 'for'
        self.expect(&TokenKind::LeftParen)?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if self.check(&TokenKind::Var) {
            Some(ForInit::Declaration(self.parse_variable_declaration()?))
        } else {
            Some(ForInit::Expression(self.parse_expression()?))
        };
        if self.check(&TokenKind::In) {
            return Err(self.unsupported());
        }
        self.expect(&TokenKind::Semicolon)?;

        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        let body = Box::new(self.parse_statement()?);

        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
        }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement> {
        self.advance(); // consume 'return'
        let argument = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;

        Ok(Statement::Return(ReturnStatement { argument }))
    }

    fn parse_block_statement(&mut self) -> Result<Statement> {
        self.advance(); // consume '{'
        let mut body = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RightBrace)?;

        Ok(Statement::Block(BlockStatement { body }))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement> {
        let expression = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::Expression(ExpressionStatement { expression }))
    }

    /// Parses an expression, including comma sequences.
    pub fn parse_expression(&mut self) -> Result<Expression> {
        let first = self.parse_assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut expressions = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            expressions.push(self.parse_assignment()?);
        }
        Ok(Expression::Sequence(SequenceExpression { expressions }))
    }

    fn parse_assignment(&mut self) -> Result<Expression> {
        let expr = self.parse_conditional()?;

        let operator = match &self.current.kind {
            TokenKind::Equal => AssignmentOperator::Assign,
            TokenKind::PlusEqual => AssignmentOperator::AddAssign,
            TokenKind::MinusEqual => AssignmentOperator::SubtractAssign,
            TokenKind::StarEqual => AssignmentOperator::MultiplyAssign,
            TokenKind::SlashEqual => AssignmentOperator::DivideAssign,
            TokenKind::PercentEqual => AssignmentOperator::ModuloAssign,
            TokenKind::LeftShiftEqual => AssignmentOperator::LeftShiftAssign,
            TokenKind::RightShiftEqual => AssignmentOperator::RightShiftAssign,
            TokenKind::UnsignedRightShiftEqual => AssignmentOperator::UnsignedRightShiftAssign,
            TokenKind::AmpersandEqual => AssignmentOperator::BitwiseAndAssign,
            TokenKind::PipeEqual => AssignmentOperator::BitwiseOrAssign,
            TokenKind::CaretEqual => AssignmentOperator::BitwiseXorAssign,
            _ => return Ok(expr),
        };

        match &expr {
            Expression::Identifier(id) if id.name != "this" => {}
            Expression::Member(_) => {}
            _ => return Err(Error::SyntaxError("Invalid assignment target".into())),
        }

        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expression::Assignment(AssignmentExpression {
            operator,
            left: Box::new(expr),
            right: Box::new(value),
        }))
    }

    /// Parse conditional (ternary) expression: test ? consequent : alternate
    fn parse_conditional(&mut self) -> Result<Expression> {
        let test = self.parse_binary(0)?;

        if self.check(&TokenKind::Question) {
            self.advance(); // consume '?'
            let consequent = self.parse_assignment()?;
            self.expect(&TokenKind::Colon)?;
            let alternate = self.parse_assignment()?;

            return Ok(Expression::Conditional(ConditionalExpression {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            }));
        }

        Ok(test)
    }

    /// Precedence climbing over the left-associative binary operators.
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expression> {
        let mut left = self.parse_unary()?;

        while let Some((operator, precedence)) = binary_operator(&self.current.kind) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            left = Expression::Binary(BinaryExpression {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let update = match &self.current.kind {
            TokenKind::PlusPlus => Some(UpdateOperator::Increment),
            TokenKind::MinusMinus => Some(UpdateOperator::Decrement),
            _ => None,
        };
        if let Some(operator) = update {
            self.advance();
            let argument = self.parse_unary()?;
            ensure_update_target(&argument)?;
            return Ok(Expression::Update(UpdateExpression {
                operator,
                argument: Box::new(argument),
                prefix: true,
            }));
        }

        let operator = match &self.current.kind {
            TokenKind::Bang => Some(UnaryOperator::LogicalNot),
            TokenKind::Minus => Some(UnaryOperator::Minus),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Typeof => Some(UnaryOperator::Typeof),
            TokenKind::Void => Some(UnaryOperator::Void),
            TokenKind::Delete => Some(UnaryOperator::Delete),
            TokenKind::Tilde => Some(UnaryOperator::BitwiseNot),
            _ => None,
        };

        if let Some(op) = operator {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(Expression::Unary(UnaryExpression {
                operator: op,
                argument: Box::new(argument),
            }));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let expr = self.parse_call()?;

        // No line terminator is allowed before a postfix operator.
        if self.current.newline_before {
            return Ok(expr);
        }
        let operator = match &self.current.kind {
            TokenKind::PlusPlus => UpdateOperator::Increment,
            TokenKind::MinusMinus => UpdateOperator::Decrement,
            _ => return Ok(expr),
        };
        ensure_update_target(&expr)?;
        self.advance();
        Ok(Expression::Update(UpdateExpression {
            operator,
            argument: Box::new(expr),
            prefix: false,
        }))
    }

    fn parse_call(&mut self) -> Result<Expression> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };

        loop {
            if self.check(&TokenKind::LeftParen) {
                let arguments = self.parse_arguments()?;
                expr = Expression::Call(CallExpression {
                    callee: Box::new(expr),
                    arguments,
                });
            } else if let Some(member) = self.parse_member_suffix(&mut expr)? {
                expr = member;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parses a trailing `.name` or `[expr]`, taking the object out of `object`.
    fn parse_member_suffix(&mut self, object: &mut Expression) -> Result<Option<Expression>> {
        let property = if self.check(&TokenKind::Dot) {
            self.advance();
            MemberProperty::Identifier(self.expect_property_name()?)
        } else if self.check(&TokenKind::LeftBracket) {
            self.advance();
            let property = self.parse_expression()?;
            self.expect(&TokenKind::RightBracket)?;
            MemberProperty::Expression(Box::new(property))
        } else {
            return Ok(None);
        };

        let object = std::mem::replace(object, Expression::Literal(Literal::Undefined));
        Ok(Some(Expression::Member(MemberExpression {
            object: Box::new(object),
            property,
        })))
    }

    fn parse_new_expression(&mut self) -> Result<Expression> {
        self.advance(); // consume 'new'

        // The callee binds member accesses but not calls: `new a.B(1)`.
        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };
        while let Some(member) = self.parse_member_suffix(&mut callee)? {
            callee = member;
        }

        // Arguments are optional with 'new'
        let arguments = if self.check(&TokenKind::LeftParen) {
            self.parse_arguments()?
        } else {
            vec![]
        };

        Ok(Expression::New(NewExpression {
            callee: Box::new(callee),
            arguments,
        }))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut args = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        self.expect(&TokenKind::RightParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let literal = match &self.current.kind {
            TokenKind::Number(n) => Literal::Number(*n),
            TokenKind::String(s) => Literal::String(s.clone()),
            TokenKind::True => Literal::Boolean(true),
            TokenKind::False => Literal::Boolean(false),
            TokenKind::Null => Literal::Null,
            TokenKind::Identifier(name) if name == "undefined" => Literal::Undefined,
            TokenKind::Identifier(name) => {
                let id = Identifier { name: name.clone() };
                self.advance();
                return Ok(Expression::Identifier(id));
            }
            TokenKind::Function => return self.parse_function_expression(),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(expr);
            }
            TokenKind::LeftBracket => return self.parse_array_literal(),
            TokenKind::LeftBrace => return self.parse_object_literal(),
            // `this` reads the receiver binding of the current call
            TokenKind::This => {
                self.advance();
                return Ok(Expression::Identifier(Identifier::new("this")));
            }
            TokenKind::Invalid(text) => {
                return Err(Error::SyntaxError(format!("Invalid token: {}", text)));
            }
            _ => {
                return Err(Error::SyntaxError(format!(
                    "Unexpected token: {:?}",
                    self.current.kind
                )));
            }
        };
        self.advance();
        Ok(Expression::Literal(literal))
    }

    fn parse_function_expression(&mut self) -> Result<Expression> {
        self.advance(); // consume 'function'

        // Optional function name
        let id = if let TokenKind::Identifier(name) = &self.current.kind {
            let id = Identifier { name: name.clone() };
            self.advance();
            Some(id)
        } else {
            None
        };

        let (params, body) = self.parse_function_rest()?;
        Ok(Expression::Function(Function { id, params, body }))
    }

    fn parse_array_literal(&mut self) -> Result<Expression> {
        self.advance(); // consume '['
        let mut elements = Vec::new();
        // Set while an element expression has been consumed and its comma has not.
        let mut after_element = false;

        loop {
            match &self.current.kind {
                TokenKind::RightBracket => break,
                TokenKind::Comma => {
                    self.advance();
                    if !after_element {
                        elements.push(None);
                    }
                    after_element = false;
                }
                _ if after_element => {
                    return Err(Error::SyntaxError(format!(
                        "Expected Comma, found {:?}",
                        self.current.kind
                    )));
                }
                _ => {
                    elements.push(Some(self.parse_assignment()?));
                    after_element = true;
                }
            }
        }

        self.expect(&TokenKind::RightBracket)?;

        Ok(Expression::Array(ArrayExpression { elements }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression> {
        self.advance(); // consume '{'
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let key = match &self.current.kind {
                TokenKind::String(s) => {
                    let key = s.clone();
                    self.advance();
                    key
                }
                TokenKind::Number(n) => {
                    let key = number_to_string(*n);
                    self.advance();
                    key
                }
                _ => self.expect_property_name()?.name,
            };
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_assignment()?;

            properties.push(Property { key, value });

            if !self.check(&TokenKind::RightBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightBrace)?;

        Ok(Expression::Object(ObjectExpression { properties }))
    }

    // Helper methods

    fn advance(&mut self) {
        self.current = self.scanner.next_token();
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(Error::SyntaxError(format!(
                "Expected {:?}, found {:?}",
                kind, self.current.kind
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<Identifier> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let id = Identifier { name: name.clone() };
            self.advance();
            Ok(id)
        } else {
            Err(Error::SyntaxError(format!(
                "Expected identifier, found {:?}",
                self.current.kind
            )))
        }
    }

    /// Like `expect_identifier`, but reserved words are valid property names.
    fn expect_property_name(&mut self) -> Result<Identifier> {
        let reserved = self.current.kind.is_keyword()
            || matches!(
                self.current.kind,
                TokenKind::True | TokenKind::False | TokenKind::Null
            );
        if reserved {
            let span = self.current.span;
            let id = Identifier::new(&self.source[span.start..span.end]);
            self.advance();
            return Ok(id);
        }
        self.expect_identifier()
    }

    fn at_statement_end(&self) -> bool {
        self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.is_at_end()
            || self.current.newline_before
    }

    /// Consumes a statement terminator, inserting one before `}`, at end of
    /// input, or after a line break.
    fn consume_semicolon(&mut self) -> Result<()> {
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(());
        }
        if self.at_statement_end() {
            return Ok(());
        }
        Err(Error::SyntaxError(format!(
            "Expected Semicolon, found {:?}",
            self.current.kind
        )))
    }

    fn unsupported(&self) -> Error {
        let span = self.current.span;
        Error::SyntaxError(format!(
            "Unsupported syntax: '{}'",
            &self.source[span.start..span.end]
        ))
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }
}

fn ensure_update_target(expr: &Expression) -> Result<()> {
    match expr {
        Expression::Identifier(_) | Expression::Member(_) => Ok(()),
        _ => Err(Error::SyntaxError(
            "Invalid left-hand side in update expression".into(),
        )),
    }
}

/// Binding power of each binary operator token, loosest first.
fn binary_operator(kind: &TokenKind) -> Option<(BinaryOperator, u8)> {
    let entry = match kind {
        TokenKind::PipePipe => (BinaryOperator::LogicalOr, 1),
        TokenKind::AmpersandAmpersand => (BinaryOperator::LogicalAnd, 2),
        TokenKind::Pipe => (BinaryOperator::BitwiseOr, 3),
        TokenKind::Caret => (BinaryOperator::BitwiseXor, 4),
        TokenKind::Ampersand => (BinaryOperator::BitwiseAnd, 5),
        TokenKind::EqualEqual => (BinaryOperator::Equal, 6),
        TokenKind::NotEqual => (BinaryOperator::NotEqual, 6),
        TokenKind::StrictEqual => (BinaryOperator::StrictEqual, 6),
        TokenKind::StrictNotEqual => (BinaryOperator::StrictNotEqual, 6),
        TokenKind::LessThan => (BinaryOperator::LessThan, 7),
        TokenKind::LessThanEqual => (BinaryOperator::LessThanEqual, 7),
        TokenKind::GreaterThan => (BinaryOperator::GreaterThan, 7),
        TokenKind::GreaterThanEqual => (BinaryOperator::GreaterThanEqual, 7),
        TokenKind::In => (BinaryOperator::In, 7),
        TokenKind::Instanceof => (BinaryOperator::InstanceOf, 7),
        TokenKind::LeftShift => (BinaryOperator::LeftShift, 8),
        TokenKind::RightShift => (BinaryOperator::RightShift, 8),
        TokenKind::UnsignedRightShift => (BinaryOperator::UnsignedRightShift, 8),
        TokenKind::Plus => (BinaryOperator::Add, 9),
        TokenKind::Minus => (BinaryOperator::Subtract, 9),
        TokenKind::Star => (BinaryOperator::Multiply, 10),
        TokenKind::Slash => (BinaryOperator::Divide, 10),
        TokenKind::Percent => (BinaryOperator::Modulo, 10),
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to parse and get first statement
    fn parse_stmt(src: &str) -> Statement {
        let mut parser = Parser::new(src);
        let program = parser.parse_program().unwrap();
        program.body.into_iter().next().unwrap()
    }

    fn parse_expr(src: &str) -> Expression {
        match parse_stmt(src) {
            Statement::Expression(stmt) => stmt.expression,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    // Helper to parse and check it succeeds
    fn parse_ok(src: &str) -> Program {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap()
    }

    // Helper to parse and check it fails
    fn parse_err(src: &str) -> Error {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap_err()
    }

    #[test]
    fn test_parse_declarations_and_functions() {
        assert_eq!(parse_ok("var a = 1, b = 2, c;").body.len(), 1);
        assert_eq!(
            parse_ok("function add(a, b) { return a + b; }").body.len(),
            1
        );
    }

    #[test]
    fn test_parse_control_flow() {
        parse_ok("if (x > 0) { y = 1; } else y = 2;");
        parse_ok("while (x > 0) { x = x - 1; }");
        parse_ok("do { x = x + 1; } while (x < 10)");
        parse_ok("for (var i = 0; i < 10; i++) { }");
        parse_ok("for (;;) {}");
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("1 + 2 * 3");
        let Expression::Binary(add) = expr else {
            panic!("expected binary");
        };
        assert_eq!(add.operator, BinaryOperator::Add);
        assert!(matches!(
            *add.right,
            Expression::Binary(BinaryExpression {
                operator: BinaryOperator::Multiply,
                ..
            })
        ));
    }

    #[test]
    fn test_left_associativity() {
        let Expression::Binary(sub) = parse_expr("10 - 4 - 3") else {
            panic!("expected binary");
        };
        assert!(matches!(*sub.left, Expression::Binary(_)));
        assert_eq!(*sub.right, Expression::Literal(Literal::Number(3.0)));
    }

    #[test]
    fn test_automatic_semicolons() {
        assert_eq!(parse_ok("2+3").body.len(), 1);
        assert_eq!(parse_ok("var a = 1\nvar b = 2\na + b").body.len(), 3);
        assert_eq!(parse_ok("function f() { return 1 }").body.len(), 1);
        assert!(matches!(parse_err("a b"), Error::SyntaxError(_)));
    }

    #[test]
    fn test_return_before_newline_has_no_argument() {
        let Statement::FunctionDeclaration(function) = parse_stmt("function f() { return\n1 }")
        else {
            panic!("expected function");
        };
        assert_eq!(
            function.body[0],
            Statement::Return(ReturnStatement { argument: None })
        );
    }

    #[test]
    fn test_array_holes() {
        let Expression::Array(array) = parse_expr("[1,,2,]") else {
            panic!("expected array");
        };
        assert_eq!(array.elements.len(), 3);
        assert!(array.elements[0].is_some());
        assert!(array.elements[1].is_none());
        assert!(array.elements[2].is_some());

        let Expression::Array(array) = parse_expr("[,]") else {
            panic!("expected array");
        };
        assert_eq!(array.elements, vec![None]);
    }

    #[test]
    fn test_update_expressions() {
        assert!(matches!(
            parse_expr("a++"),
            Expression::Update(UpdateExpression { prefix: false, .. })
        ));
        assert!(matches!(
            parse_expr("--a.b"),
            Expression::Update(UpdateExpression { prefix: true, .. })
        ));
        assert!(matches!(parse_err("1++"), Error::SyntaxError(_)));
    }

    #[test]
    fn test_new_binds_member_not_call() {
        let Expression::New(new) = parse_expr("new a.B(1, 2)") else {
            panic!("expected new");
        };
        assert!(matches!(*new.callee, Expression::Member(_)));
        assert_eq!(new.arguments.len(), 2);
    }

    #[test]
    fn test_object_literal_keys() {
        let Expression::Object(object) = parse_expr("({a: 1, 'b c': 2, 3: 4, if: 5})") else {
            panic!("expected object");
        };
        let keys: Vec<_> = object.properties.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b c", "3", "if"]);
    }

    #[test]
    fn test_compound_assignment() {
        assert!(matches!(
            parse_expr("a += 2"),
            Expression::Assignment(AssignmentExpression {
                operator: AssignmentOperator::AddAssign,
                ..
            })
        ));
        assert!(matches!(parse_err("1 = 2"), Error::SyntaxError(_)));
    }

    #[test]
    fn test_undefined_is_a_literal() {
        assert_eq!(parse_expr("undefined"), Expression::Literal(Literal::Undefined));
    }

    #[test]
    fn test_unsupported_statements_are_rejected() {
        assert!(matches!(parse_err("switch (x) {}"), Error::SyntaxError(_)));
        assert!(matches!(parse_err("throw 1;"), Error::SyntaxError(_)));
        assert!(matches!(parse_err("let x = 1;"), Error::SyntaxError(_)));
    }
}
