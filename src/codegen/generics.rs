//! Monomorphization of generic records, entities and functions. Each
//! `(base, type arguments)` pair is lowered once per module and cached under
//! its mangled name.
use std::collections::HashMap;

use log::debug;

use crate::ast::{
    Assignment, Block, Conditional, Danger, Declaration, Expression, ForLoop, FunctionDef,
    GenericMember, GenericMethodCall, If, IntrinsicCall, Lambda, Location, Member,
    MemoryOperation, Param, ResolvedType, Return, ScopedAccess, Statement, TupleDestructuring,
    TypeConversion, TypeExpression, UnaryExpr, WhileLoop,
};

use super::error::{CodegenError, CodegenResult};
use super::types::mangle_type;
use super::Emitter;

impl Emitter {
    /// Monomorphize a generic function for the given type arguments,
    /// returning its mangled name. The body lands on the pending queue; the
    /// cache guarantees one instantiation per mangling per module.
    pub(crate) fn instantiate_generic_function(
        &mut self,
        base: &str,
        type_args: &[String],
        location: &Location,
    ) -> CodegenResult<String> {
        let key = instantiation_key(base, type_args);
        if let Some(mangled) = self.symbols.cached_instantiation(&key) {
            return Ok(mangled.clone());
        }

        let template = self
            .symbols
            .generic_functions
            .get(base)
            .cloned()
            .ok_or_else(|| {
                CodegenError::unresolved(base, "instantiating a generic function", location)
            })?;
        let substitution = bind_type_args(&template.type_params, type_args, base, location)?;

        let mangled = mangle_type(&key);
        debug!("instantiating {key} as {mangled}");
        // cached before lowering so recursive generics terminate
        self.symbols.cache_instantiation(&key, &mangled);

        let instance = FunctionDef {
            name: mangled.clone(),
            type_params: vec![],
            params: template
                .params
                .iter()
                .map(|param| Param {
                    name: param.name.clone(),
                    type_name: substitute_type(&param.type_name, &substitution),
                    location: param.location.clone(),
                })
                .collect(),
            return_type: template
                .return_type
                .as_ref()
                .map(|name| substitute_type(name, &substitution)),
            body: template
                .body
                .iter()
                .map(|statement| substitute_statement(statement, &substitution))
                .collect(),
            location: template.location.clone(),
        };

        self.register_function(&instance)?;
        let mark = self.out.len();
        let result = self.emit_function(&instance);
        let definition = self.out.split_off(mark);
        result?;
        self.pending.push_back(definition);

        Ok(mangled)
    }

    /// Monomorphize a generic record or entity, declaring its struct type
    /// and registering its field table under the mangled name.
    pub(crate) fn instantiate_generic_record(
        &mut self,
        base: &str,
        type_args: &[String],
        location: &Location,
    ) -> CodegenResult<String> {
        let key = instantiation_key(base, type_args);
        if let Some(mangled) = self.symbols.cached_instantiation(&key) {
            return Ok(mangled.clone());
        }

        let (type_params, fields, entity) =
            if let Some(record) = self.symbols.generic_records.get(base) {
                (record.type_params.clone(), record.fields.clone(), false)
            } else if let Some(entity) = self.symbols.generic_entities.get(base) {
                (entity.type_params.clone(), entity.fields.clone(), true)
            } else {
                return Err(CodegenError::unresolved(
                    base,
                    "instantiating a generic record",
                    location,
                ));
            };
        let substitution = bind_type_args(&type_params, type_args, base, location)?;

        let mangled = mangle_type(&key);
        debug!("instantiating {key} as {mangled}");
        self.symbols.cache_instantiation(&key, &mangled);

        let mut table = Vec::with_capacity(fields.len());
        let mut ir_fields = Vec::with_capacity(fields.len());
        for field in &fields {
            let field_type = substitute_type(&field.type_name, &substitution);
            let mapped = self.map_source(&field_type, location)?;
            ir_fields.push(mapped.text);
            table.push((field.name.clone(), field_type));
        }
        self.push_struct(&format!("%{mangled} = type {{ {} }}", ir_fields.join(", ")));
        if entity {
            self.symbols.add_entity(&mangled, table);
        } else {
            self.symbols.add_record(&mangled, table);
        }

        Ok(mangled)
    }

    /// Reverse of the mangling: reconstruct the source-level generic form of
    /// an instantiated struct name (`Range_BackIndex_uaddr` →
    /// `Range<BackIndex<uaddr>>`).
    pub fn generic_source_form(&self, mangled: &str) -> String {
        let tokens: Vec<&str> = mangled.split('_').collect();
        self.rebuild_generic(&tokens)
    }

    fn rebuild_generic(&self, tokens: &[&str]) -> String {
        match tokens.split_first() {
            None => String::new(),
            Some((first, [])) => (*first).to_owned(),
            Some((first, rest)) if self.is_known_generic_base(first) => {
                format!("{first}<{}>", self.rebuild_generic(rest))
            }
            Some((first, rest)) => format!("{first}, {}", self.rebuild_generic(rest)),
        }
    }

    fn is_known_generic_base(&self, name: &str) -> bool {
        const BUILTIN_BASES: [&str; 4] = ["Range", "BackIndex", "Ptr", "Shared"];
        BUILTIN_BASES.contains(&name)
            || self.symbols.generic_records.contains_key(name)
            || self.symbols.generic_entities.contains_key(name)
            || self.symbols.generic_functions.contains_key(name)
    }
}

fn instantiation_key(base: &str, type_args: &[String]) -> String {
    format!("{base}<{}>", type_args.join(","))
}

fn bind_type_args(
    type_params: &[String],
    type_args: &[String],
    base: &str,
    location: &Location,
) -> CodegenResult<HashMap<String, String>> {
    if type_params.len() != type_args.len() {
        return Err(CodegenError::invalid(
            format!(
                "'{base}' takes {} type arguments, got {}",
                type_params.len(),
                type_args.len()
            ),
            location,
        ));
    }
    Ok(type_params
        .iter()
        .cloned()
        .zip(type_args.iter().cloned())
        .collect())
}

/// Replace type parameter tokens inside a (possibly nested) type name:
/// `List<T>` with `T → s64` becomes `List<s64>`.
fn substitute_type(name: &str, substitution: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(name.len());
    let mut token = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            token.push(ch);
        } else {
            flush_token(&mut result, &mut token, substitution);
            result.push(ch);
        }
    }
    flush_token(&mut result, &mut token, substitution);
    result
}

fn flush_token(result: &mut String, token: &mut String, substitution: &HashMap<String, String>) {
    if token.is_empty() {
        return;
    }
    match substitution.get(token.as_str()) {
        Some(replacement) => result.push_str(replacement),
        None => result.push_str(token),
    }
    token.clear();
}

fn substitute_info(
    info: &Option<ResolvedType>,
    substitution: &HashMap<String, String>,
) -> Option<ResolvedType> {
    info.as_ref().map(|info| ResolvedType {
        name: substitute_type(&info.name, substitution),
        is_unsigned: info.is_unsigned,
        is_float: info.is_float,
    })
}

fn substitute_statement(
    statement: &Statement,
    substitution: &HashMap<String, String>,
) -> Statement {
    let subst_block = |block: &Block| Block {
        statements: block
            .statements
            .iter()
            .map(|statement| substitute_statement(statement, substitution))
            .collect(),
        location: block.location.clone(),
    };
    let subst_body = |body: &[Statement]| {
        body.iter()
            .map(|statement| substitute_statement(statement, substitution))
            .collect::<Vec<_>>()
    };
    let subst_access = |access: &ScopedAccess| ScopedAccess {
        source: substitute_expression(&access.source, substitution),
        handle: access.handle.clone(),
        body: subst_body(&access.body),
        location: access.location.clone(),
    };

    match statement {
        Statement::If(if_statement) => Statement::If(If {
            condition: substitute_expression(&if_statement.condition, substitution),
            then_block: subst_block(&if_statement.then_block),
            else_block: if_statement.else_block.as_ref().map(subst_block),
            location: if_statement.location.clone(),
        }),
        Statement::While(while_loop) => Statement::While(WhileLoop {
            condition: substitute_expression(&while_loop.condition, substitution),
            body: subst_body(&while_loop.body),
            location: while_loop.location.clone(),
        }),
        Statement::For(for_loop) => Statement::For(ForLoop {
            variable: for_loop.variable.clone(),
            var_type: for_loop
                .var_type
                .as_ref()
                .map(|name| substitute_type(name, substitution)),
            start: substitute_expression(&for_loop.start, substitution),
            end: substitute_expression(&for_loop.end, substitution),
            body: subst_body(&for_loop.body),
            location: for_loop.location.clone(),
        }),
        Statement::Return(return_statement) => Statement::Return(Return {
            value: return_statement
                .value
                .as_ref()
                .map(|value| substitute_expression(value, substitution)),
            location: return_statement.location.clone(),
        }),
        Statement::Break(_) | Statement::Continue(_) => statement.clone(),
        Statement::Block(block) => Statement::Block(subst_block(block)),
        Statement::Declaration(declaration) => Statement::Declaration(Declaration {
            name: declaration.name.clone(),
            declared_type: declaration
                .declared_type
                .as_ref()
                .map(|name| substitute_type(name, substitution)),
            value: substitute_expression(&declaration.value, substitution),
            location: declaration.location.clone(),
        }),
        Statement::Assignment(assignment) => Statement::Assignment(Assignment {
            target: substitute_expression(&assignment.target, substitution),
            value: substitute_expression(&assignment.value, substitution),
            location: assignment.location.clone(),
        }),
        Statement::Expression(statement) => {
            Statement::Expression(crate::ast::ExpressionStatement {
                expression: substitute_expression(&statement.expression, substitution),
                location: statement.location.clone(),
            })
        }
        Statement::TupleDestructuring(destructuring) => {
            Statement::TupleDestructuring(TupleDestructuring {
                names: destructuring.names.clone(),
                value: substitute_expression(&destructuring.value, substitution),
                location: destructuring.location.clone(),
            })
        }
        Statement::Viewing(access) => Statement::Viewing(subst_access(access)),
        Statement::Hijacking(access) => Statement::Hijacking(subst_access(access)),
        Statement::Inspecting(access) => Statement::Inspecting(subst_access(access)),
        Statement::Seizing(access) => Statement::Seizing(subst_access(access)),
        Statement::Danger(danger) => Statement::Danger(Danger {
            body: subst_body(&danger.body),
            location: danger.location.clone(),
        }),
    }
}

fn substitute_expression(
    expression: &Expression,
    substitution: &HashMap<String, String>,
) -> Expression {
    let subst = |expression: &Expression| substitute_expression(expression, substitution);
    let subst_args = |args: &[Expression]| args.iter().map(subst).collect::<Vec<_>>();
    let subst_types =
        |names: &[String]| names.iter().map(|name| substitute_type(name, substitution)).collect::<Vec<_>>();

    match expression {
        Expression::Literal(_) => expression.clone(),
        Expression::Identifier(identifier) => Expression::Identifier(crate::ast::Identifier {
            name: identifier.name.clone(),
            location: identifier.location.clone(),
            info: substitute_info(&identifier.info, substitution),
        }),
        Expression::Binary(binary) => Expression::Binary(crate::ast::BinaryExpr {
            op: binary.op,
            lhs: Box::new(subst(&binary.lhs)),
            rhs: Box::new(subst(&binary.rhs)),
            location: binary.location.clone(),
            info: substitute_info(&binary.info, substitution),
        }),
        Expression::Unary(unary) => Expression::Unary(UnaryExpr {
            op: unary.op,
            operand: Box::new(subst(&unary.operand)),
            location: unary.location.clone(),
            info: substitute_info(&unary.info, substitution),
        }),
        Expression::Call(call) => Expression::Call(crate::ast::Call {
            callee: call.callee.clone(),
            args: subst_args(&call.args),
            location: call.location.clone(),
            info: substitute_info(&call.info, substitution),
        }),
        Expression::GenericMethodCall(call) => {
            Expression::GenericMethodCall(GenericMethodCall {
                target: call.target.as_ref().map(|target| Box::new(subst(target))),
                method: call.method.clone(),
                type_args: subst_types(&call.type_args),
                args: subst_args(&call.args),
                location: call.location.clone(),
                info: substitute_info(&call.info, substitution),
            })
        }
        Expression::Member(member) => Expression::Member(Member {
            object: Box::new(subst(&member.object)),
            field: member.field.clone(),
            location: member.location.clone(),
            info: substitute_info(&member.info, substitution),
        }),
        Expression::GenericMember(member) => Expression::GenericMember(GenericMember {
            object: Box::new(subst(&member.object)),
            field: member.field.clone(),
            type_args: subst_types(&member.type_args),
            location: member.location.clone(),
            info: substitute_info(&member.info, substitution),
        }),
        Expression::TypeConversion(conversion) => {
            Expression::TypeConversion(TypeConversion {
                value: Box::new(subst(&conversion.value)),
                target: substitute_type(&conversion.target, substitution),
                location: conversion.location.clone(),
                info: substitute_info(&conversion.info, substitution),
            })
        }
        Expression::Conditional(conditional) => Expression::Conditional(Conditional {
            condition: Box::new(subst(&conditional.condition)),
            then_block: Block {
                statements: conditional
                    .then_block
                    .statements
                    .iter()
                    .map(|statement| substitute_statement(statement, substitution))
                    .collect(),
                location: conditional.then_block.location.clone(),
            },
            else_block: conditional.else_block.as_ref().map(|block| Block {
                statements: block
                    .statements
                    .iter()
                    .map(|statement| substitute_statement(statement, substitution))
                    .collect(),
                location: block.location.clone(),
            }),
            location: conditional.location.clone(),
            info: substitute_info(&conditional.info, substitution),
        }),
        Expression::Lambda(lambda) => Expression::Lambda(Lambda {
            params: lambda
                .params
                .iter()
                .map(|param| Param {
                    name: param.name.clone(),
                    type_name: substitute_type(&param.type_name, substitution),
                    location: param.location.clone(),
                })
                .collect(),
            body: Box::new(substitute_statement(&lambda.body, substitution)),
            location: lambda.location.clone(),
            info: substitute_info(&lambda.info, substitution),
        }),
        Expression::IntrinsicCall(intrinsic) => Expression::IntrinsicCall(IntrinsicCall {
            name: intrinsic.name.clone(),
            type_args: subst_types(&intrinsic.type_args),
            args: subst_args(&intrinsic.args),
            location: intrinsic.location.clone(),
            info: substitute_info(&intrinsic.info, substitution),
        }),
        Expression::NativeCall(native) => Expression::NativeCall(crate::ast::NativeCall {
            name: native.name.clone(),
            args: subst_args(&native.args),
            location: native.location.clone(),
            info: substitute_info(&native.info, substitution),
        }),
        Expression::MemoryOperation(memory) => Expression::MemoryOperation(MemoryOperation {
            op: memory.op.clone(),
            type_arg: substitute_type(&memory.type_arg, substitution),
            args: subst_args(&memory.args),
            location: memory.location.clone(),
            info: substitute_info(&memory.info, substitution),
        }),
        Expression::TypeExpression(type_expression) => {
            Expression::TypeExpression(TypeExpression {
                name: substitute_type(&type_expression.name, substitution),
                location: type_expression.location.clone(),
                info: substitute_info(&type_expression.info, substitution),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{instantiation_key, substitute_type};

    #[test]
    fn test_substitute_type_replaces_whole_tokens_only() {
        let substitution = HashMap::from([("T".to_owned(), "s64".to_owned())]);
        assert_eq!(substitute_type("T", &substitution), "s64");
        assert_eq!(substitute_type("List<T>", &substitution), "List<s64>");
        assert_eq!(substitute_type("Text<letter8>", &substitution), "Text<letter8>");
        assert_eq!(substitute_type("Pair<T, T>", &substitution), "Pair<s64, s64>");
    }

    #[test]
    fn test_instantiation_key() {
        assert_eq!(
            instantiation_key("foo", &["s64".to_owned(), "bool".to_owned()]),
            "foo<s64,bool>"
        );
    }
}
