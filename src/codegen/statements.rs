//! Statement lowering. Each visit reports whether it terminated the current
//! block (`ret`, `br`, `unreachable`), so callers know when a merge edge or
//! fallthrough terminator is still needed.
use log::warn;

use crate::ast::{
    Assignment, Block, Conditional, Danger, Declaration, Expression, ForLoop, If, Location,
    Return, Statement, TupleDestructuring, WhileLoop,
};

use super::error::{CodegenError, CodegenResult};
use super::types::{IrType, Value};
use super::{Emitter, LoopContext};

impl Emitter {
    /// Lower one statement; `true` means the current block is terminated.
    pub(crate) fn emit_statement(&mut self, statement: &Statement) -> CodegenResult<bool> {
        match statement {
            Statement::If(if_statement) => self.emit_if(if_statement),
            Statement::While(while_loop) => self.emit_while(while_loop),
            Statement::For(for_loop) => self.emit_for(for_loop),
            Statement::Return(return_statement) => self.emit_return(return_statement),
            Statement::Break(break_statement) => {
                let context = self.loop_stack.last().cloned().ok_or_else(|| {
                    CodegenError::invalid("'break' outside of a loop", &break_statement.location)
                })?;
                self.line(format!("br label %{}", context.break_label));
                Ok(true)
            }
            Statement::Continue(continue_statement) => {
                let context = self.loop_stack.last().cloned().ok_or_else(|| {
                    CodegenError::invalid(
                        "'continue' outside of a loop",
                        &continue_statement.location,
                    )
                })?;
                self.line(format!("br label %{}", context.continue_label));
                Ok(true)
            }
            Statement::Block(block) => {
                self.symbols.push_frame();
                let terminated = self.emit_statements(&block.statements);
                self.symbols.pop_frame();
                terminated
            }
            Statement::Declaration(declaration) => self.emit_declaration(declaration),
            Statement::Assignment(assignment) => self.emit_assignment(assignment),
            Statement::Expression(statement) => {
                self.emit_expression(&statement.expression)?;
                Ok(false)
            }
            Statement::TupleDestructuring(destructuring) => {
                self.emit_destructuring(destructuring)
            }
            Statement::Viewing(access) => self.emit_viewing(access, false),
            Statement::Hijacking(access) => self.emit_viewing(access, true),
            Statement::Inspecting(access) => self.emit_locked_access(
                access,
                "razorforge_rwlock_read_lock",
                "razorforge_rwlock_read_unlock",
            ),
            Statement::Seizing(access) => self.emit_locked_access(
                access,
                "razorforge_mutex_lock",
                "razorforge_mutex_unlock",
            ),
            Statement::Danger(danger) => self.emit_danger(danger),
        }
    }

    /// Sequentially lower statements, dropping anything after a terminator.
    pub(crate) fn emit_statements(&mut self, statements: &[Statement]) -> CodegenResult<bool> {
        let mut terminated = false;
        for statement in statements {
            if terminated {
                break;
            }
            terminated = self.emit_statement(statement)?;
        }
        Ok(terminated)
    }

    /// Lower an `if` statement. The merge label only exists when at least one
    /// branch falls through; an `if` whose branches both return leaves no
    /// unreachable tail behind.
    fn emit_if(&mut self, if_statement: &If) -> CodegenResult<bool> {
        let condition = self.emit_expression(&if_statement.condition)?;
        let condition = self.unwrap_primitive(condition, &if_statement.location)?;

        let then_label = self.temps.next_label();
        match &if_statement.else_block {
            Some(else_block) => {
                let else_label = self.temps.next_label();
                let merge_label = self.temps.next_label();
                self.line(format!(
                    "br i1 {}, label %{then_label}, label %{else_label}",
                    condition.repr
                ));

                self.label(&then_label);
                self.symbols.push_frame();
                let then_terminated = self.emit_statements(&if_statement.then_block.statements)?;
                self.symbols.pop_frame();
                if !then_terminated {
                    self.line(format!("br label %{merge_label}"));
                }

                self.label(&else_label);
                self.symbols.push_frame();
                let else_terminated = self.emit_statements(&else_block.statements)?;
                self.symbols.pop_frame();
                if !else_terminated {
                    self.line(format!("br label %{merge_label}"));
                }

                if then_terminated && else_terminated {
                    return Ok(true);
                }
                self.label(&merge_label);
                Ok(false)
            }
            None => {
                let merge_label = self.temps.next_label();
                self.line(format!(
                    "br i1 {}, label %{then_label}, label %{merge_label}",
                    condition.repr
                ));

                self.label(&then_label);
                self.symbols.push_frame();
                let terminated = self.emit_statements(&if_statement.then_block.statements)?;
                self.symbols.pop_frame();
                if !terminated {
                    self.line(format!("br label %{merge_label}"));
                }

                self.label(&merge_label);
                Ok(false)
            }
        }
    }

    /// `if` in value position: both branches required, the merge block joins
    /// the branch values with a `phi`. Each branch hands back the label its
    /// value actually arrived from; inner control flow may have moved it past
    /// the branch's entry label.
    pub(crate) fn emit_conditional(&mut self, conditional: &Conditional) -> CodegenResult<Value> {
        let else_block = conditional.else_block.as_ref().ok_or_else(|| {
            CodegenError::invalid(
                "'if' in value position requires an else branch",
                &conditional.location,
            )
        })?;

        let condition = self.emit_expression(&conditional.condition)?;
        let condition = self.unwrap_primitive(condition, &conditional.location)?;

        let then_label = self.temps.next_label();
        let else_label = self.temps.next_label();
        let merge_label = self.temps.next_label();
        self.line(format!(
            "br i1 {}, label %{then_label}, label %{else_label}",
            condition.repr
        ));

        self.label(&then_label);
        let (then_value, then_end) =
            self.emit_branch_value(&conditional.then_block, &conditional.location)?;
        self.line(format!("br label %{merge_label}"));

        self.label(&else_label);
        let (else_value, else_end) =
            self.emit_branch_value(else_block, &conditional.location)?;
        self.line(format!("br label %{merge_label}"));

        self.label(&merge_label);
        let result = self.fresh_temp(&then_value.ty);
        self.line(format!(
            "{result} = phi {} [ {}, %{then_end} ], [ {}, %{else_end} ]",
            then_value.ty.text, then_value.repr, else_value.repr
        ));
        Ok(Value::new(result, then_value.ty))
    }

    /// Lower a conditional branch that must produce a value, returning the
    /// value and the label of the block it was produced in.
    fn emit_branch_value(
        &mut self,
        block: &Block,
        location: &Location,
    ) -> CodegenResult<(Value, String)> {
        self.symbols.push_frame();
        let result = (|| {
            let (tail, init) = block.statements.split_last().ok_or_else(|| {
                CodegenError::invalid("'if' branch in value position is empty", location)
            })?;
            self.emit_statements(init)?;
            let Statement::Expression(statement) = tail else {
                return Err(CodegenError::invalid(
                    "'if' branch in value position must end in an expression",
                    location,
                ));
            };
            self.emit_expression(&statement.expression)
        })();
        self.symbols.pop_frame();
        let value = result?;
        Ok((value, self.temps.current_label().to_owned()))
    }

    fn emit_while(&mut self, while_loop: &WhileLoop) -> CodegenResult<bool> {
        let cond_label = self.temps.next_label();
        let body_label = self.temps.next_label();
        let end_label = self.temps.next_label();

        self.line(format!("br label %{cond_label}"));
        self.label(&cond_label);
        let condition = self.emit_expression(&while_loop.condition)?;
        let condition = self.unwrap_primitive(condition, &while_loop.location)?;
        self.line(format!(
            "br i1 {}, label %{body_label}, label %{end_label}",
            condition.repr
        ));

        self.label(&body_label);
        self.loop_stack.push(LoopContext {
            continue_label: cond_label.clone(),
            break_label: end_label.clone(),
        });
        self.symbols.push_frame();
        let terminated = self.emit_statements(&while_loop.body);
        self.symbols.pop_frame();
        self.loop_stack.pop();
        if !terminated? {
            self.line(format!("br label %{cond_label}"));
        }

        self.label(&end_label);
        Ok(false)
    }

    /// Numeric-range `for`, laid out like `while`: cond block, body, step
    /// block feeding the back edge.
    fn emit_for(&mut self, for_loop: &ForLoop) -> CodegenResult<bool> {
        let start = self.emit_expression(&for_loop.start)?;
        let ty = match &for_loop.var_type {
            Some(name) => self.map_source(name, &for_loop.location)?,
            None => start.ty.clone(),
        };
        let start = self.convert(start, &ty, &for_loop.location)?;
        let variable = &for_loop.variable;
        self.comment(format!("for {variable}"));
        self.line(format!("%{variable} = alloca {}", ty.text));
        self.line(format!("store {} {}, ptr %{variable}", ty.text, start.repr));
        let end = self.emit_expression(&for_loop.end)?;

        let cond_label = self.temps.next_label();
        let body_label = self.temps.next_label();
        let step_label = self.temps.next_label();
        let end_label = self.temps.next_label();

        self.line(format!("br label %{cond_label}"));
        self.label(&cond_label);
        let current = self.fresh_temp(&ty);
        self.line(format!("{current} = load {}, ptr %{variable}", ty.text));
        let predicate = if ty.is_unsigned { "ult" } else { "slt" };
        let condition = self.fresh_temp(&IrType::bool());
        self.line(format!(
            "{condition} = icmp {predicate} {} {current}, {}",
            ty.text, end.repr
        ));
        self.line(format!(
            "br i1 {condition}, label %{body_label}, label %{end_label}"
        ));

        self.label(&body_label);
        self.loop_stack.push(LoopContext {
            continue_label: step_label.clone(),
            break_label: end_label.clone(),
        });
        self.symbols.push_frame();
        self.symbols.bind(variable, ty.clone());
        let terminated = self.emit_statements(&for_loop.body);
        self.symbols.pop_frame();
        self.loop_stack.pop();
        if !terminated? {
            self.line(format!("br label %{step_label}"));
        }

        self.label(&step_label);
        let counter = self.fresh_temp(&ty);
        self.line(format!("{counter} = load {}, ptr %{variable}", ty.text));
        let next = self.fresh_temp(&ty);
        self.line(format!("{next} = add {} {counter}, 1", ty.text));
        self.line(format!("store {} {next}, ptr %{variable}", ty.text));
        self.line(format!("br label %{cond_label}"));

        self.label(&end_label);
        Ok(false)
    }

    fn emit_return(&mut self, return_statement: &Return) -> CodegenResult<bool> {
        self.emit_stack_pop();

        let value = match &return_statement.value {
            Some(expression) => Some(self.emit_expression(expression)?),
            None => None,
        };

        // locks acquired by enclosing inspecting/seizing bodies release on
        // this exit edge too
        let releases = self.lock_stack.clone();
        for lock in releases.iter().rev() {
            self.line(format!(
                "call void @{}(ptr {})",
                lock.unlock_symbol, lock.source
            ));
        }

        match (value, self.current_return.clone()) {
            (None, _) => self.line("ret void"),
            (Some(_), None) => {
                warn!(
                    "value returned from a void function at {}",
                    return_statement.location
                );
                self.line("ret void");
            }
            (Some(value), Some(return_type)) => {
                // returning `self` from a by-value record method hands back
                // the pointee, not the pointer
                let value = if self.current_self.as_deref() == Some(value.repr.as_str())
                    && return_type.is_record()
                {
                    let temp = self.fresh_temp(&return_type);
                    self.line(format!(
                        "{temp} = load {}, ptr {}",
                        return_type.text, value.repr
                    ));
                    Value::new(temp, return_type.clone())
                } else {
                    value
                };
                let value = if value.ty.text == return_type.text {
                    value
                } else {
                    self.convert(value, &return_type, &return_statement.location)?
                };
                self.line(format!("ret {} {}", return_type.text, value.repr));
            }
        }
        Ok(true)
    }

    fn emit_declaration(&mut self, declaration: &Declaration) -> CodegenResult<bool> {
        self.comment(format!("{} = ...", declaration.name));
        let value = self.emit_expression(&declaration.value)?;
        let ty = match &declaration.declared_type {
            Some(name) => self.map_source(name, &declaration.location)?,
            None => value.ty.clone(),
        };
        let value = if value.ty.text == ty.text {
            value
        } else {
            self.convert(value, &ty, &declaration.location)?
        };
        let name = &declaration.name;
        self.line(format!("%{name} = alloca {}", ty.text));
        self.line(format!("store {} {}, ptr %{name}", ty.text, value.repr));
        self.symbols.bind(name, ty);
        Ok(false)
    }

    fn emit_assignment(&mut self, assignment: &Assignment) -> CodegenResult<bool> {
        let value = self.emit_expression(&assignment.value)?;

        match &assignment.target {
            Expression::Identifier(identifier) => {
                let name = &identifier.name;
                let ty = self.symbols.lookup(name).cloned().ok_or_else(|| {
                    CodegenError::unresolved(name, "assigning to an identifier", &assignment.location)
                })?;
                if self.symbols.is_parameter(name) {
                    return Err(CodegenError::invalid(
                        format!("cannot assign to parameter '{name}'"),
                        &assignment.location,
                    ));
                }
                self.comment(format!("{name} = ..."));
                let value = if value.ty.text == ty.text {
                    value
                } else {
                    self.convert(value, &ty, &assignment.location)?
                };
                self.line(format!("store {} {}, ptr %{name}", ty.text, value.repr));
                Ok(false)
            }
            Expression::Member(member) => {
                let (base, record) = self.emit_lvalue_base(&member.object, &assignment.location)?;
                let (index, field_source) = self
                    .symbols
                    .field_entry(&record, &member.field)
                    .map(|(index, source)| (index, source.to_owned()))
                    .ok_or_else(|| {
                        CodegenError::unresolved(
                            format!("{record}.{}", member.field),
                            "assigning to a member",
                            &assignment.location,
                        )
                    })?;
                let field_ty = self.map_source(&field_source, &assignment.location)?;
                let slot = self.fresh_temp(&IrType::new("ptr", false, false, field_source));
                self.line(format!(
                    "{slot} = getelementptr inbounds %{record}, ptr {base}, i32 0, i32 {index}"
                ));
                let value = if value.ty.text == field_ty.text {
                    value
                } else {
                    self.convert(value, &field_ty, &assignment.location)?
                };
                self.line(format!(
                    "store {} {}, ptr {slot}",
                    field_ty.text, value.repr
                ));
                Ok(false)
            }
            other => Err(CodegenError::invalid(
                "assignment target must be an identifier or member access",
                &other.location(),
            )),
        }
    }

    /// Address of an assignable object: the alloca slot of a local, or the
    /// pointer a parameter/entity already is.
    fn emit_lvalue_base(
        &mut self,
        object: &Expression,
        location: &Location,
    ) -> CodegenResult<(String, String)> {
        match object {
            Expression::Identifier(identifier) => {
                let name = &identifier.name;
                let ty = self.symbols.lookup(name).cloned().ok_or_else(|| {
                    CodegenError::unresolved(name, "taking an assignable address", location)
                })?;
                let record = record_table_name(&ty.source);
                if self.symbols.is_parameter(name) && !ty.is_pointer() {
                    return Err(CodegenError::invalid(
                        format!("cannot assign through parameter '{name}'"),
                        location,
                    ));
                }
                Ok((format!("%{name}"), record))
            }
            other => {
                let value = self.emit_expression(other)?;
                if !value.ty.is_pointer() {
                    return Err(CodegenError::invalid(
                        "assignment target base must be addressable",
                        location,
                    ));
                }
                let record = record_table_name(&value.ty.source);
                Ok((value.repr, record))
            }
        }
    }

    fn emit_destructuring(
        &mut self,
        destructuring: &TupleDestructuring,
    ) -> CodegenResult<bool> {
        let value = self.emit_expression(&destructuring.value)?;
        let element_types = self.aggregate_element_types(&value.ty, &destructuring.location)?;
        if element_types.len() < destructuring.names.len() {
            return Err(CodegenError::invalid(
                format!(
                    "cannot destructure {} elements out of '{}'",
                    destructuring.names.len(),
                    value.ty.source
                ),
                &destructuring.location,
            ));
        }

        for (index, name) in destructuring.names.iter().enumerate() {
            let element = element_types[index].clone();
            let temp = self.fresh_temp(&element);
            self.line(format!(
                "{temp} = extractvalue {} {}, {index}",
                value.ty.text, value.repr
            ));
            self.line(format!("%{name} = alloca {}", element.text));
            self.line(format!("store {} {temp}, ptr %{name}", element.text));
            self.symbols.bind(name, element);
        }
        Ok(false)
    }

    fn aggregate_element_types(
        &self,
        ty: &IrType,
        location: &Location,
    ) -> CodegenResult<Vec<IrType>> {
        if ty.is_record() {
            let fields = self.symbols.record_fields(&record_table_name(&ty.source)).ok_or_else(
                || CodegenError::unresolved(&ty.source, "destructuring a record", location),
            )?;
            return fields
                .clone()
                .into_iter()
                .map(|(_, source)| self.map_source(&source, location))
                .collect();
        }
        if ty.is_aggregate() {
            return Ok(split_aggregate(&ty.text)
                .into_iter()
                .map(|text| IrType::new(text.clone(), false, false, text))
                .collect());
        }
        Err(CodegenError::invalid(
            format!("cannot destructure non-aggregate '{}'", ty.source),
            location,
        ))
    }

    fn emit_danger(&mut self, danger: &Danger) -> CodegenResult<bool> {
        self.comment("danger {");
        let terminated = self.emit_statements(&danger.body)?;
        self.comment("} danger");
        Ok(terminated)
    }
}

/// Record-field table key for a source type: pointer suffixes drop and
/// generic forms flatten to their mangled name.
pub(crate) fn record_table_name(source: &str) -> String {
    let source = source.trim_end_matches('*');
    if source.contains('<') {
        super::types::mangle_type(source)
    } else {
        source.to_owned()
    }
}

/// Top-level element types of an aggregate like `{i64,i64}`.
fn split_aggregate(text: &str) -> Vec<String> {
    let inner = text.trim_start_matches('{').trim_end_matches('}');
    let mut elements = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in inner.chars() {
        match ch {
            '{' => {
                depth += 1;
                current.push(ch);
            }
            '}' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                elements.push(current.trim().to_owned());
                current = String::new();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        elements.push(current.trim().to_owned());
    }
    elements
}
