//! Lowering from the syntax tree to three-address code.
//!
//! Every identifier read goes through a fresh temporary so that a later
//! write to the same variable cannot change a value that was already
//! evaluated. Copy propagation removes the temporaries again where that is
//! safe.

use super::{Address, Label, TacFunction, TacInstr};
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::compiler::codegen::binary_opcode;
use crate::compiler::{CompileContext, hoisted_functions, result_statement};
use crate::{Error, Result};

/// Lowers the top-level code and every function body it reaches.
///
/// The first entry is the top-level code; function bodies follow in the
/// order their templates were registered.
pub fn lower_program<'a>(
    program: &'a Program,
    context: &mut CompileContext<'a>,
) -> Result<Vec<TacFunction>> {
    let mut functions = Vec::new();

    let mut lowering = FunctionLowering::new(context);
    lowering.hoist(&program.body);
    let result_index = result_statement(&program.body);
    let mut result = Address::Const(Literal::Undefined);
    for (i, stmt) in program.body.iter().enumerate() {
        match stmt {
            Statement::Expression(expr) if Some(i) == result_index => {
                result = lowering.lower_expression(&expr.expression)?;
            }
            _ => lowering.lower_statement(stmt)?,
        }
    }
    lowering.push(TacInstr::Return(result));
    functions.push(lowering.finish(None));

    while let Some(pending) = context.next_pending() {
        let mut lowering = FunctionLowering::new(context);
        lowering.hoist(&pending.function.body);
        for stmt in &pending.function.body {
            lowering.lower_statement(stmt)?;
        }
        // Guard return
        lowering.push(TacInstr::Return(Address::Const(Literal::Undefined)));
        functions.push(lowering.finish(Some(pending.index)));
    }

    Ok(functions)
}

struct FunctionLowering<'c, 'a> {
    context: &'c mut CompileContext<'a>,
    body: Vec<TacInstr>,
    next_temp: u32,
    next_label: u32,
}

impl<'c, 'a> FunctionLowering<'c, 'a> {
    fn new(context: &'c mut CompileContext<'a>) -> Self {
        Self {
            context,
            body: Vec::new(),
            next_temp: 0,
            next_label: 0,
        }
    }

    fn finish(self, template: Option<u32>) -> TacFunction {
        TacFunction {
            template,
            body: self.body,
        }
    }

    fn push(&mut self, instr: TacInstr) {
        self.body.push(instr);
    }

    fn new_temp(&mut self) -> u32 {
        let temp = self.next_temp;
        self.next_temp += 1;
        temp
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn hoist(&mut self, body: &'a [Statement]) {
        for function in hoisted_functions(body) {
            let Some(id) = &function.id else { continue };
            let index = self.context.register_function(function, false);
            let temp = self.new_temp();
            self.push(TacInstr::Declare(id.name.clone()));
            self.push(TacInstr::Function { dest: temp, index });
            self.push(TacInstr::Copy {
                dest: Address::Var(id.name.clone()),
                src: Address::Temp(temp),
            });
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn lower_statement(&mut self, stmt: &'a Statement) -> Result<()> {
        match stmt {
            Statement::VariableDeclaration(decl) => self.lower_variable_declaration(decl)?,
            Statement::FunctionDeclaration(_) | Statement::Empty => {}
            Statement::Expression(expr) => {
                self.lower_expression(&expr.expression)?;
            }
            Statement::Block(block) => {
                for stmt in &block.body {
                    self.lower_statement(stmt)?;
                }
            }
            Statement::If(if_stmt) => {
                let test = self.lower_expression(&if_stmt.test)?;
                let else_label = self.new_label();
                self.push(TacInstr::JumpIfFalse(test, else_label));
                self.lower_statement(&if_stmt.consequent)?;
                match &if_stmt.alternate {
                    Some(alternate) => {
                        let end_label = self.new_label();
                        self.push(TacInstr::Jump(end_label));
                        self.push(TacInstr::Label(else_label));
                        self.lower_statement(alternate)?;
                        self.push(TacInstr::Label(end_label));
                    }
                    None => self.push(TacInstr::Label(else_label)),
                }
            }
            Statement::While(while_stmt) => {
                let start = self.new_label();
                let end = self.new_label();
                self.push(TacInstr::Label(start));
                let test = self.lower_expression(&while_stmt.test)?;
                self.push(TacInstr::JumpIfFalse(test, end));
                self.lower_statement(&while_stmt.body)?;
                self.push(TacInstr::Jump(start));
                self.push(TacInstr::Label(end));
            }
            Statement::DoWhile(do_while) => {
                let start = self.new_label();
                self.push(TacInstr::Label(start));
                self.lower_statement(&do_while.body)?;
                let test = self.lower_expression(&do_while.test)?;
                self.push(TacInstr::JumpIfTrue(test, start));
            }
            Statement::For(for_stmt) => {
                match &for_stmt.init {
                    Some(ForInit::Declaration(decl)) => self.lower_variable_declaration(decl)?,
                    Some(ForInit::Expression(expr)) => {
                        self.lower_expression(expr)?;
                    }
                    None => {}
                }
                let start = self.new_label();
                let end = self.new_label();
                self.push(TacInstr::Label(start));
                if let Some(test) = &for_stmt.test {
                    let test = self.lower_expression(test)?;
                    self.push(TacInstr::JumpIfFalse(test, end));
                }
                self.lower_statement(&for_stmt.body)?;
                if let Some(update) = &for_stmt.update {
                    self.lower_expression(update)?;
                }
                self.push(TacInstr::Jump(start));
                self.push(TacInstr::Label(end));
            }
            Statement::Return(ret) => {
                let value = match &ret.argument {
                    Some(arg) => self.lower_expression(arg)?,
                    None => Address::Const(Literal::Undefined),
                };
                self.push(TacInstr::Return(value));
            }
        }
        Ok(())
    }

    fn lower_variable_declaration(&mut self, decl: &'a VariableDeclaration) -> Result<()> {
        for declarator in &decl.declarations {
            self.push(TacInstr::Declare(declarator.id.name.clone()));
            if let Some(init) = &declarator.init {
                let value = self.lower_expression(init)?;
                self.push(TacInstr::Copy {
                    dest: Address::Var(declarator.id.name.clone()),
                    src: value,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn lower_expression(&mut self, expr: &'a Expression) -> Result<Address> {
        match expr {
            Expression::Literal(lit) => Ok(Address::Const(lit.clone())),
            Expression::Identifier(id) => Ok(self.load_var(&id.name)),
            Expression::Array(arr) => {
                let mut elements = Vec::with_capacity(arr.elements.len());
                for element in &arr.elements {
                    elements.push(match element {
                        Some(expr) => self.lower_expression(expr)?,
                        None => Address::Const(Literal::Undefined),
                    });
                }
                let dest = self.new_temp();
                self.push(TacInstr::NewArray { dest, elements });
                Ok(Address::Temp(dest))
            }
            Expression::Object(obj) => {
                let dest = self.new_temp();
                self.push(TacInstr::NewObject { dest });
                for prop in &obj.properties {
                    let value = self.lower_expression(&prop.value)?;
                    self.push(TacInstr::SetMember {
                        object: Address::Temp(dest),
                        key: Address::Const(Literal::String(prop.key.clone())),
                        value,
                    });
                }
                Ok(Address::Temp(dest))
            }
            Expression::Binary(bin) => match bin.operator {
                BinaryOperator::LogicalAnd => self.lower_logical(bin, false),
                BinaryOperator::LogicalOr => self.lower_logical(bin, true),
                op => {
                    let op = binary_opcode(op)?;
                    let left = self.lower_expression(&bin.left)?;
                    let right = self.lower_expression(&bin.right)?;
                    Ok(self.binary(op, left, right))
                }
            },
            Expression::Unary(unary) => self.lower_unary(unary),
            Expression::Assignment(assign) => self.lower_assignment(assign),
            Expression::Call(call) => self.lower_call(call),
            Expression::Member(member) => {
                let object = self.lower_expression(&member.object)?;
                let key = self.lower_key(&member.property)?;
                Ok(self.get_member(object, key))
            }
            Expression::Conditional(cond) => {
                let test = self.lower_expression(&cond.test)?;
                let result = self.new_temp();
                let else_label = self.new_label();
                let end_label = self.new_label();
                self.push(TacInstr::JumpIfFalse(test, else_label));
                let consequent = self.lower_expression(&cond.consequent)?;
                self.copy_to_temp(result, consequent);
                self.push(TacInstr::Jump(end_label));
                self.push(TacInstr::Label(else_label));
                let alternate = self.lower_expression(&cond.alternate)?;
                self.copy_to_temp(result, alternate);
                self.push(TacInstr::Label(end_label));
                Ok(Address::Temp(result))
            }
            Expression::Function(function) => {
                let index = self
                    .context
                    .register_function(function, function.id.is_some());
                let dest = self.new_temp();
                self.push(TacInstr::Function { dest, index });
                Ok(Address::Temp(dest))
            }
            Expression::New(new_expr) => {
                let args = self.lower_arguments(&new_expr.arguments)?;
                let callee = self.lower_expression(&new_expr.callee)?;
                let dest = self.new_temp();
                self.push(TacInstr::New {
                    dest: Some(dest),
                    callee,
                    args,
                });
                Ok(Address::Temp(dest))
            }
            Expression::Update(update) => self.lower_update(update),
            Expression::Sequence(seq) => {
                let mut last = Address::Const(Literal::Undefined);
                for expr in &seq.expressions {
                    last = self.lower_expression(expr)?;
                }
                Ok(last)
            }
        }
    }

    /// `a && b` keeps `a` when it is falsy; `a || b` keeps it when truthy.
    fn lower_logical(&mut self, bin: &'a BinaryExpression, is_or: bool) -> Result<Address> {
        let left = self.lower_expression(&bin.left)?;
        let result = self.new_temp();
        let end = self.new_label();
        self.copy_to_temp(result, left);
        if is_or {
            self.push(TacInstr::JumpIfTrue(Address::Temp(result), end));
        } else {
            self.push(TacInstr::JumpIfFalse(Address::Temp(result), end));
        }
        let right = self.lower_expression(&bin.right)?;
        self.copy_to_temp(result, right);
        self.push(TacInstr::Label(end));
        Ok(Address::Temp(result))
    }

    fn lower_unary(&mut self, unary: &'a UnaryExpression) -> Result<Address> {
        let arg = self.lower_expression(&unary.argument)?;
        let op = match unary.operator {
            UnaryOperator::Minus => OpCode::Neg,
            UnaryOperator::Plus => OpCode::ToNumber,
            UnaryOperator::LogicalNot => OpCode::Not,
            UnaryOperator::BitwiseNot => OpCode::BitNot,
            UnaryOperator::Typeof => OpCode::TypeOf,
            UnaryOperator::Void => return Ok(Address::Const(Literal::Undefined)),
            // Properties cannot be removed; the operand is still evaluated.
            UnaryOperator::Delete => return Ok(Address::Const(Literal::Boolean(false))),
        };
        Ok(self.unary(op, arg))
    }

    fn lower_assignment(&mut self, assign: &'a AssignmentExpression) -> Result<Address> {
        let compound = assign
            .operator
            .binary_operator()
            .map(binary_opcode)
            .transpose()?;

        match assign.left.as_ref() {
            Expression::Identifier(id) => {
                let value = match compound {
                    Some(op) => {
                        let current = self.load_var(&id.name);
                        let right = self.lower_expression(&assign.right)?;
                        self.binary(op, current, right)
                    }
                    None => self.lower_expression(&assign.right)?,
                };
                self.push(TacInstr::Copy {
                    dest: Address::Var(id.name.clone()),
                    src: value.clone(),
                });
                Ok(value)
            }
            Expression::Member(member) => {
                let object = self.lower_expression(&member.object)?;
                let key = self.lower_key(&member.property)?;
                let value = match compound {
                    Some(op) => {
                        let current = self.get_member(object.clone(), key.clone());
                        let right = self.lower_expression(&assign.right)?;
                        self.binary(op, current, right)
                    }
                    None => self.lower_expression(&assign.right)?,
                };
                self.push(TacInstr::SetMember {
                    object,
                    key,
                    value: value.clone(),
                });
                Ok(value)
            }
            _ => Err(Error::CompileError("Invalid assignment target".to_string())),
        }
    }

    fn lower_update(&mut self, update: &'a UpdateExpression) -> Result<Address> {
        let step = match update.operator {
            UpdateOperator::Increment => OpCode::Add,
            UpdateOperator::Decrement => OpCode::Sub,
        };
        let one = Address::Const(Literal::Number(1.0));

        match update.argument.as_ref() {
            Expression::Identifier(id) => {
                let current = self.load_var(&id.name);
                let old = self.unary(OpCode::ToNumber, current);
                let new = self.binary(step, old.clone(), one);
                self.push(TacInstr::Copy {
                    dest: Address::Var(id.name.clone()),
                    src: new.clone(),
                });
                Ok(if update.prefix { new } else { old })
            }
            Expression::Member(member) => {
                let object = self.lower_expression(&member.object)?;
                let key = self.lower_key(&member.property)?;
                let current = self.get_member(object.clone(), key.clone());
                let old = self.unary(OpCode::ToNumber, current);
                let new = self.binary(step, old.clone(), one);
                self.push(TacInstr::SetMember {
                    object,
                    key,
                    value: new.clone(),
                });
                Ok(if update.prefix { new } else { old })
            }
            _ => Err(Error::CompileError("Invalid update target".to_string())),
        }
    }

    fn lower_call(&mut self, call: &'a CallExpression) -> Result<Address> {
        let args = self.lower_arguments(&call.arguments)?;
        let (callee, receiver) = match call.callee.as_ref() {
            Expression::Member(member) => {
                let receiver = self.lower_expression(&member.object)?;
                let key = self.lower_key(&member.property)?;
                (self.get_member(receiver.clone(), key), Some(receiver))
            }
            callee => (self.lower_expression(callee)?, None),
        };
        let dest = self.new_temp();
        self.push(TacInstr::Call {
            dest: Some(dest),
            callee,
            receiver,
            args,
        });
        Ok(Address::Temp(dest))
    }

    fn lower_arguments(&mut self, arguments: &'a [Expression]) -> Result<Vec<Address>> {
        arguments
            .iter()
            .map(|arg| self.lower_expression(arg))
            .collect()
    }

    fn lower_key(&mut self, property: &'a MemberProperty) -> Result<Address> {
        match property {
            MemberProperty::Identifier(id) => Ok(Address::Const(Literal::String(id.name.clone()))),
            MemberProperty::Expression(expr) => self.lower_expression(expr),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn load_var(&mut self, name: &str) -> Address {
        let dest = self.new_temp();
        self.push(TacInstr::Copy {
            dest: Address::Temp(dest),
            src: Address::Var(name.to_string()),
        });
        Address::Temp(dest)
    }

    fn copy_to_temp(&mut self, dest: u32, src: Address) {
        self.push(TacInstr::Copy {
            dest: Address::Temp(dest),
            src,
        });
    }

    fn binary(&mut self, op: OpCode, left: Address, right: Address) -> Address {
        let dest = self.new_temp();
        self.push(TacInstr::Binary {
            dest,
            op,
            left,
            right,
        });
        Address::Temp(dest)
    }

    fn unary(&mut self, op: OpCode, arg: Address) -> Address {
        let dest = self.new_temp();
        self.push(TacInstr::Unary { dest, op, arg });
        Address::Temp(dest)
    }

    fn get_member(&mut self, object: Address, key: Address) -> Address {
        let dest = self.new_temp();
        self.push(TacInstr::GetMember { dest, object, key });
        Address::Temp(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn lower_listing(src: &str) -> Vec<String> {
        let program = Parser::new(src).parse_program().unwrap();
        let mut context = CompileContext::new();
        let functions = lower_program(&program, &mut context).unwrap();
        functions[0].body.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_identifier_reads_go_through_temporaries() {
        assert_eq!(
            lower_listing("a + 1"),
            vec!["t0 = a", "t1 = ADD t0, 1", "return t1"]
        );
    }

    #[test]
    fn test_while_loop_labels() {
        assert_eq!(
            lower_listing("while (x) { x = 0; }"),
            vec![
                "L0:",
                "t0 = x",
                "if !t0 goto L1",
                "x = 0",
                "goto L0",
                "L1:",
                "return undefined",
            ]
        );
    }

    #[test]
    fn test_postfix_update_returns_old_value() {
        assert_eq!(
            lower_listing("i++"),
            vec!["t0 = i", "t1 = TO_NUMBER t0", "t2 = ADD t1, 1", "i = t2", "return t1"]
        );
    }

    #[test]
    fn test_logical_or_uses_one_result_temporary() {
        assert_eq!(
            lower_listing("a || b"),
            vec![
                "t0 = a",
                "t1 = t0",
                "if t1 goto L0",
                "t2 = b",
                "t1 = t2",
                "L0:",
                "return t1",
            ]
        );
    }

    #[test]
    fn test_method_call_keeps_receiver() {
        assert_eq!(
            lower_listing("o.m(1)"),
            vec!["t0 = o", "t1 = t0[\"m\"]", "t2 = call t1 on t0(1)", "return t2"]
        );
    }

    #[test]
    fn test_unsupported_operator() {
        let program = Parser::new("a in b").parse_program().unwrap();
        let mut context = CompileContext::new();
        assert!(matches!(
            lower_program(&program, &mut context),
            Err(Error::CompileError(_))
        ));
    }
}
