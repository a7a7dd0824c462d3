//! Direct code generation from AST to bytecode.
//!
//! The generator walks the tree once and emits instructions as it goes.
//! Forward jumps are emitted with a placeholder operand and patched as soon
//! as the body they skip has been generated, so no separate fix-up pass is
//! needed.
//!
//! Function bodies are not generated where they appear. Each function is
//! registered with the [`CompileContext`] and laid out after the code that
//! encloses it, ending in a guard `RETURN` so control never falls from one
//! body into the next.

use crate::ast::*;
use crate::compiler::bytecode::{Bytecode, Instruction, OpCode, Operand};
use crate::compiler::{CompileContext, hoisted_functions, jump_delta, result_statement};
use crate::{Error, Result};

#[cfg(test)]
mod tests;

/// Name of the hidden binding that holds the old value of a postfix member update.
const UPDATE_SLOT: &str = "%update";

/// The direct bytecode generator.
pub struct CodeGenerator<'a> {
    context: CompileContext<'a>,
    instructions: Vec<Instruction>,
}

impl<'a> CodeGenerator<'a> {
    /// Creates a new generator.
    pub fn new() -> Self {
        Self {
            context: CompileContext::new(),
            instructions: Vec::new(),
        }
    }

    // ========================================================================
    // Main Compilation Entry Point
    // ========================================================================

    /// Compiles a program.
    ///
    /// The top-level code ends in `RETURN`, carrying the value of the last
    /// top-level expression statement (or `undefined`). Function bodies
    /// follow it.
    pub fn compile(mut self, program: &'a Program) -> Result<Bytecode> {
        self.compile_hoisted(&program.body);

        let result = result_statement(&program.body);
        for (i, stmt) in program.body.iter().enumerate() {
            match stmt {
                Statement::Expression(expr) if Some(i) == result => {
                    self.compile_expression(&expr.expression)?;
                }
                _ => self.compile_statement(stmt)?,
            }
        }
        if result.is_none() {
            self.emit_op(OpCode::PushUndefined);
        }
        self.emit_op(OpCode::Return);

        self.compile_pending()?;

        Ok(self.context.finish(self.instructions))
    }

    /// Lays out every registered function body, including bodies that are
    /// registered while earlier ones are being generated.
    fn compile_pending(&mut self) -> Result<()> {
        while let Some(pending) = self.context.next_pending() {
            let entry = self.instructions.len();
            self.context.set_entry(pending.index, entry);

            let function = pending.function;
            self.compile_hoisted(&function.body);
            for stmt in &function.body {
                self.compile_statement(stmt)?;
            }
            self.emit_op(OpCode::PushUndefined);
            self.emit_op(OpCode::Return);
        }
        Ok(())
    }

    /// Binds the function declarations of a body before its other statements run.
    fn compile_hoisted(&mut self, body: &'a [Statement]) {
        for function in hoisted_functions(body) {
            let Some(id) = &function.id else { continue };
            let name = self.context.intern(&id.name);
            let index = self.context.register_function(function, false);
            self.emit(Instruction::with_operand(OpCode::Declare, Operand::Str(name)));
            self.emit(Instruction::with_operand(
                OpCode::PushFunction,
                Operand::Function(index),
            ));
            self.emit(Instruction::with_operand(OpCode::Store, Operand::Str(name)));
        }
    }

    // ========================================================================
    // Statement Compilation
    // ========================================================================

    fn compile_statement(&mut self, stmt: &'a Statement) -> Result<()> {
        match stmt {
            Statement::VariableDeclaration(decl) => self.compile_variable_declaration(decl)?,
            Statement::FunctionDeclaration(_) | Statement::Empty => {}
            Statement::Expression(expr) => {
                self.compile_expression(&expr.expression)?;
                self.emit_op(OpCode::Pop);
            }
            Statement::Block(block) => {
                for stmt in &block.body {
                    self.compile_statement(stmt)?;
                }
            }
            Statement::If(if_stmt) => self.compile_if_statement(if_stmt)?,
            Statement::While(while_stmt) => self.compile_while_statement(while_stmt)?,
            Statement::DoWhile(do_while) => self.compile_do_while_statement(do_while)?,
            Statement::For(for_stmt) => self.compile_for_statement(for_stmt)?,
            Statement::Return(ret) => {
                match &ret.argument {
                    Some(arg) => self.compile_expression(arg)?,
                    None => {
                        self.emit_op(OpCode::PushUndefined);
                    }
                }
                self.emit_op(OpCode::Return);
            }
        }
        Ok(())
    }

    fn compile_variable_declaration(&mut self, decl: &'a VariableDeclaration) -> Result<()> {
        for declarator in &decl.declarations {
            let name = self.context.intern(&declarator.id.name);
            self.emit(Instruction::with_operand(OpCode::Declare, Operand::Str(name)));
            if let Some(init) = &declarator.init {
                self.compile_expression(init)?;
                self.emit(Instruction::with_operand(OpCode::Store, Operand::Str(name)));
            }
        }
        Ok(())
    }

    fn compile_if_statement(&mut self, if_stmt: &'a IfStatement) -> Result<()> {
        self.compile_expression(&if_stmt.test)?;
        let jump_to_else = self.emit_jump(OpCode::Jne);

        self.compile_statement(&if_stmt.consequent)?;

        if let Some(alternate) = &if_stmt.alternate {
            let jump_to_end = self.emit_jump(OpCode::Jmp);
            self.patch_jump(jump_to_else)?;
            self.compile_statement(alternate)?;
            self.patch_jump(jump_to_end)?;
        } else {
            self.patch_jump(jump_to_else)?;
        }
        Ok(())
    }

    fn compile_while_statement(&mut self, while_stmt: &'a WhileStatement) -> Result<()> {
        let loop_start = self.instructions.len();

        self.compile_expression(&while_stmt.test)?;
        let jump_to_end = self.emit_jump(OpCode::Jne);

        self.compile_statement(&while_stmt.body)?;
        self.emit_loop(loop_start)?;

        self.patch_jump(jump_to_end)
    }

    fn compile_do_while_statement(&mut self, do_while: &'a DoWhileStatement) -> Result<()> {
        let loop_start = self.instructions.len();

        self.compile_statement(&do_while.body)?;

        // Jump back while the test holds
        self.compile_expression(&do_while.test)?;
        self.emit_op(OpCode::Not);
        let at = self.instructions.len();
        let delta = jump_delta(at, loop_start)?;
        self.emit(Instruction::with_operand(OpCode::Jne, Operand::Jump(delta)));
        Ok(())
    }

    fn compile_for_statement(&mut self, for_stmt: &'a ForStatement) -> Result<()> {
        match &for_stmt.init {
            Some(ForInit::Declaration(decl)) => self.compile_variable_declaration(decl)?,
            Some(ForInit::Expression(expr)) => {
                self.compile_expression(expr)?;
                self.emit_op(OpCode::Pop);
            }
            None => {}
        }

        let loop_start = self.instructions.len();

        let jump_to_end = match &for_stmt.test {
            Some(test) => {
                self.compile_expression(test)?;
                Some(self.emit_jump(OpCode::Jne))
            }
            None => None,
        };

        self.compile_statement(&for_stmt.body)?;

        if let Some(update) = &for_stmt.update {
            self.compile_expression(update)?;
            self.emit_op(OpCode::Pop);
        }

        self.emit_loop(loop_start)?;

        if let Some(jump) = jump_to_end {
            self.patch_jump(jump)?;
        }
        Ok(())
    }

    // ========================================================================
    // Expression Compilation
    // ========================================================================

    fn compile_expression(&mut self, expr: &'a Expression) -> Result<()> {
        match expr {
            Expression::Literal(lit) => self.compile_literal(lit),
            Expression::Identifier(id) => {
                let name = self.context.intern(&id.name);
                self.emit(Instruction::with_operand(OpCode::Load, Operand::Str(name)));
            }
            Expression::Array(arr) => {
                for element in &arr.elements {
                    match element {
                        Some(expr) => self.compile_expression(expr)?,
                        None => {
                            self.emit_op(OpCode::PushUndefined);
                        }
                    }
                }
                self.emit(Instruction::with_operand(
                    OpCode::NewArray,
                    Operand::ArgCount(arr.elements.len() as u32),
                ));
            }
            Expression::Object(obj) => {
                self.emit_op(OpCode::NewObject);
                for prop in &obj.properties {
                    self.emit_op(OpCode::Dup);
                    self.emit_string(&prop.key);
                    self.compile_expression(&prop.value)?;
                    self.emit_op(OpCode::StoreMember);
                    self.emit_op(OpCode::Pop);
                }
            }
            Expression::Binary(bin) => self.compile_binary(bin)?,
            Expression::Unary(unary) => self.compile_unary(unary)?,
            Expression::Assignment(assign) => self.compile_assignment(assign)?,
            Expression::Call(call) => self.compile_call(call)?,
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                self.compile_property_key(&member.property)?;
                self.emit_op(OpCode::LoadMember);
            }
            Expression::Conditional(cond) => {
                self.compile_expression(&cond.test)?;
                let jump_to_else = self.emit_jump(OpCode::Jne);
                self.compile_expression(&cond.consequent)?;
                let jump_to_end = self.emit_jump(OpCode::Jmp);
                self.patch_jump(jump_to_else)?;
                self.compile_expression(&cond.alternate)?;
                self.patch_jump(jump_to_end)?;
            }
            Expression::Function(function) => {
                let index = self.context.register_function(function, function.id.is_some());
                self.emit(Instruction::with_operand(
                    OpCode::PushFunction,
                    Operand::Function(index),
                ));
            }
            Expression::New(new_expr) => {
                for arg in &new_expr.arguments {
                    self.compile_expression(arg)?;
                }
                self.compile_expression(&new_expr.callee)?;
                self.emit(Instruction::with_operand(
                    OpCode::New,
                    Operand::ArgCount(new_expr.arguments.len() as u32),
                ));
            }
            Expression::Update(update) => self.compile_update(update)?,
            Expression::Sequence(seq) => {
                for (i, expr) in seq.expressions.iter().enumerate() {
                    if i > 0 {
                        self.emit_op(OpCode::Pop);
                    }
                    self.compile_expression(expr)?;
                }
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Number(n) => {
                self.emit(Instruction::with_operand(OpCode::PushNumber, Operand::Number(*n)));
            }
            Literal::String(s) => self.emit_string(s),
            Literal::Boolean(true) => {
                self.emit_op(OpCode::PushTrue);
            }
            Literal::Boolean(false) => {
                self.emit_op(OpCode::PushFalse);
            }
            Literal::Null => {
                self.emit_op(OpCode::PushNull);
            }
            Literal::Undefined => {
                self.emit_op(OpCode::PushUndefined);
            }
        }
    }

    fn compile_binary(&mut self, bin: &'a BinaryExpression) -> Result<()> {
        match bin.operator {
            BinaryOperator::LogicalAnd => self.compile_logical(bin, false),
            BinaryOperator::LogicalOr => self.compile_logical(bin, true),
            op => {
                let opcode = binary_opcode(op)?;
                self.compile_expression(&bin.left)?;
                self.compile_expression(&bin.right)?;
                self.emit_op(opcode);
                Ok(())
            }
        }
    }

    /// `a && b` keeps `a` when it is falsy; `a || b` keeps it when truthy.
    fn compile_logical(&mut self, bin: &'a BinaryExpression, is_or: bool) -> Result<()> {
        self.compile_expression(&bin.left)?;
        self.emit_op(OpCode::Dup);
        if is_or {
            self.emit_op(OpCode::Not);
        }
        let short_circuit = self.emit_jump(OpCode::Jne);
        self.emit_op(OpCode::Pop);
        self.compile_expression(&bin.right)?;
        self.patch_jump(short_circuit)
    }

    fn compile_unary(&mut self, unary: &'a UnaryExpression) -> Result<()> {
        self.compile_expression(&unary.argument)?;
        match unary.operator {
            UnaryOperator::Minus => {
                self.emit_op(OpCode::Neg);
            }
            UnaryOperator::Plus => {
                self.emit_op(OpCode::ToNumber);
            }
            UnaryOperator::LogicalNot => {
                self.emit_op(OpCode::Not);
            }
            UnaryOperator::BitwiseNot => {
                self.emit_op(OpCode::BitNot);
            }
            UnaryOperator::Typeof => {
                self.emit_op(OpCode::TypeOf);
            }
            UnaryOperator::Void => {
                self.emit_op(OpCode::Pop);
                self.emit_op(OpCode::PushUndefined);
            }
            // Properties cannot be removed; the operand is still evaluated.
            UnaryOperator::Delete => {
                self.emit_op(OpCode::Pop);
                self.emit_op(OpCode::PushFalse);
            }
        }
        Ok(())
    }

    fn compile_assignment(&mut self, assign: &'a AssignmentExpression) -> Result<()> {
        let compound = assign
            .operator
            .binary_operator()
            .map(binary_opcode)
            .transpose()?;

        match assign.left.as_ref() {
            Expression::Identifier(id) => {
                let name = self.context.intern(&id.name);
                if let Some(opcode) = compound {
                    self.emit(Instruction::with_operand(OpCode::Load, Operand::Str(name)));
                    self.compile_expression(&assign.right)?;
                    self.emit_op(opcode);
                } else {
                    self.compile_expression(&assign.right)?;
                }
                self.emit_op(OpCode::Dup);
                self.emit(Instruction::with_operand(OpCode::Store, Operand::Str(name)));
            }
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                self.compile_property_key(&member.property)?;
                if let Some(opcode) = compound {
                    self.emit_op(OpCode::Dup2);
                    self.emit_op(OpCode::LoadMember);
                    self.compile_expression(&assign.right)?;
                    self.emit_op(opcode);
                } else {
                    self.compile_expression(&assign.right)?;
                }
                self.emit_op(OpCode::StoreMember);
            }
            _ => {
                return Err(Error::CompileError(
                    "Invalid assignment target".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn compile_update(&mut self, update: &'a UpdateExpression) -> Result<()> {
        let step = match update.operator {
            UpdateOperator::Increment => OpCode::Add,
            UpdateOperator::Decrement => OpCode::Sub,
        };

        match update.argument.as_ref() {
            Expression::Identifier(id) => {
                let name = self.context.intern(&id.name);
                self.emit(Instruction::with_operand(OpCode::Load, Operand::Str(name)));
                self.emit_op(OpCode::ToNumber);
                if update.prefix {
                    self.emit_one();
                    self.emit_op(step);
                    self.emit_op(OpCode::Dup);
                } else {
                    self.emit_op(OpCode::Dup);
                    self.emit_one();
                    self.emit_op(step);
                }
                self.emit(Instruction::with_operand(OpCode::Store, Operand::Str(name)));
            }
            Expression::Member(member) => {
                let slot = self.context.intern(UPDATE_SLOT);
                if !update.prefix {
                    self.emit(Instruction::with_operand(OpCode::Declare, Operand::Str(slot)));
                }
                self.compile_expression(&member.object)?;
                self.compile_property_key(&member.property)?;
                self.emit_op(OpCode::Dup2);
                self.emit_op(OpCode::LoadMember);
                self.emit_op(OpCode::ToNumber);
                if !update.prefix {
                    self.emit_op(OpCode::Dup);
                    self.emit(Instruction::with_operand(OpCode::Store, Operand::Str(slot)));
                }
                self.emit_one();
                self.emit_op(step);
                self.emit_op(OpCode::StoreMember);
                if !update.prefix {
                    self.emit_op(OpCode::Pop);
                    self.emit(Instruction::with_operand(OpCode::Load, Operand::Str(slot)));
                }
            }
            _ => {
                return Err(Error::CompileError(
                    "Invalid update target".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Arguments go first, then the callee. Method calls push the receiver
    /// before the callee and use `CALL_METHOD`.
    fn compile_call(&mut self, call: &'a CallExpression) -> Result<()> {
        for arg in &call.arguments {
            self.compile_expression(arg)?;
        }
        let argc = Operand::ArgCount(call.arguments.len() as u32);

        if let Expression::Member(member) = call.callee.as_ref() {
            self.compile_expression(&member.object)?;
            self.emit_op(OpCode::Dup);
            self.compile_property_key(&member.property)?;
            self.emit_op(OpCode::LoadMember);
            self.emit(Instruction::with_operand(OpCode::CallMethod, argc));
        } else {
            self.compile_expression(&call.callee)?;
            self.emit(Instruction::with_operand(OpCode::Call, argc));
        }
        Ok(())
    }

    fn compile_property_key(&mut self, property: &'a MemberProperty) -> Result<()> {
        match property {
            MemberProperty::Identifier(id) => {
                self.emit_string(&id.name);
                Ok(())
            }
            MemberProperty::Expression(expr) => self.compile_expression(expr),
        }
    }

    // ========================================================================
    // Emission Helpers
    // ========================================================================

    fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    fn emit_op(&mut self, opcode: OpCode) -> usize {
        self.emit(Instruction::simple(opcode))
    }

    fn emit_one(&mut self) {
        self.emit(Instruction::with_operand(OpCode::PushNumber, Operand::Number(1.0)));
    }

    fn emit_string(&mut self, s: &str) {
        let index = self.context.intern(s);
        self.emit(Instruction::with_operand(OpCode::PushString, Operand::Str(index)));
    }

    /// Emits a forward jump whose operand is patched later.
    fn emit_jump(&mut self, opcode: OpCode) -> usize {
        self.emit(Instruction::with_operand(opcode, Operand::Jump(0)))
    }

    /// Points a forward jump at the next instruction to be emitted.
    ///
    /// A conditional jump over nothing becomes a plain `POP`: a zero `JNE`
    /// offset is rejected by the VM.
    fn patch_jump(&mut self, at: usize) -> Result<()> {
        let delta = jump_delta(at, self.instructions.len())?;
        let instruction = &mut self.instructions[at];
        if delta == 0 && instruction.opcode == OpCode::Jne {
            *instruction = Instruction::simple(OpCode::Pop);
        } else {
            instruction.operand = Some(Operand::Jump(delta));
        }
        Ok(())
    }

    /// Emits a backward jump to `start`.
    fn emit_loop(&mut self, start: usize) -> Result<()> {
        let delta = jump_delta(self.instructions.len(), start)?;
        self.emit(Instruction::with_operand(OpCode::Jmp, Operand::Jump(delta)));
        Ok(())
    }
}

impl Default for CodeGenerator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a binary operator to its opcode.
///
/// `&&` and `||` have no single opcode and, like `in` and `instanceof`, are
/// rejected here.
pub(crate) fn binary_opcode(op: BinaryOperator) -> Result<OpCode> {
    Ok(match op {
        BinaryOperator::Add => OpCode::Add,
        BinaryOperator::Subtract => OpCode::Sub,
        BinaryOperator::Multiply => OpCode::Mul,
        BinaryOperator::Divide => OpCode::Div,
        BinaryOperator::Modulo => OpCode::Mod,
        BinaryOperator::Equal => OpCode::Eq,
        BinaryOperator::NotEqual => OpCode::Ne,
        BinaryOperator::StrictEqual => OpCode::StrictEq,
        BinaryOperator::StrictNotEqual => OpCode::StrictNe,
        BinaryOperator::LessThan => OpCode::Lt,
        BinaryOperator::LessThanEqual => OpCode::Le,
        BinaryOperator::GreaterThan => OpCode::Gt,
        BinaryOperator::GreaterThanEqual => OpCode::Ge,
        BinaryOperator::BitwiseAnd => OpCode::BitAnd,
        BinaryOperator::BitwiseOr => OpCode::BitOr,
        BinaryOperator::BitwiseXor => OpCode::BitXor,
        BinaryOperator::LeftShift => OpCode::Shl,
        BinaryOperator::RightShift => OpCode::Shr,
        BinaryOperator::UnsignedRightShift => OpCode::Ushr,
        BinaryOperator::LogicalAnd
        | BinaryOperator::LogicalOr
        | BinaryOperator::In
        | BinaryOperator::InstanceOf => {
            return Err(Error::CompileError(format!(
                "Unsupported binary operator '{}'",
                op.as_str()
            )));
        }
    })
}
