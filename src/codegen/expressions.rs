//! Expression lowering. Every visit returns the operand holding the result
//! (or a void value) and records the type of every temp it creates.
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::ast::{
    BinaryExpr, BinaryOperator, Call, Expression, GenericMember, GenericMethodCall, Identifier,
    Lambda, Literal, LiteralValue, Location, Member, MemoryOperation, NativeCall, Statement,
    TypeConversion, UnaryExpr, UnaryOperator,
};

use super::error::{CodegenError, CodegenResult};
use super::platform::Language;
use super::runtime::{MathFamily, MathRuntimeBinder};
use super::types::{mangle_type, IrType, Value};
use super::{symbol_name, Emitter};

/// Fixed signatures of the well-known C runtime entry points.
static NATIVE_SIGNATURES: Lazy<HashMap<&'static str, (&'static str, &'static str)>> =
    Lazy::new(|| {
        HashMap::from([
            ("printf", ("i32", "declare i32 @printf(ptr, ...)")),
            ("puts", ("i32", "declare i32 @puts(ptr)")),
            ("malloc", ("ptr", "declare ptr @malloc(i64)")),
            ("free", ("void", "declare void @free(ptr)")),
            ("strlen", ("i64", "declare i64 @strlen(ptr)")),
            ("memcpy", ("ptr", "declare ptr @memcpy(ptr, ptr, i64)")),
            ("memset", ("ptr", "declare ptr @memset(ptr, i32, i64)")),
            ("exit", ("void", "declare void @exit(i32)")),
        ])
    });

/// Free functions only callable inside `danger` blocks.
const DANGER_FUNCTIONS: [&str; 3] = ["read_as", "write_as", "invalidate"];

/// Return IR type of a native symbol that has no fixed signature.
fn native_return_ir(name: &str) -> &'static str {
    if name.starts_with("format_") {
        "ptr"
    } else if name.ends_with("_new") || name.ends_with("_copy") {
        "i8*"
    } else if name.ends_with("_cmp") || name.contains("_is_") {
        "i32"
    } else {
        "i64"
    }
}

impl Emitter {
    pub(crate) fn emit_expression(&mut self, expression: &Expression) -> CodegenResult<Value> {
        match expression {
            Expression::Literal(literal) => self.emit_literal(literal),
            Expression::Identifier(identifier) => self.emit_identifier(identifier),
            Expression::Binary(binary) => self.emit_binary(binary),
            Expression::Unary(unary) => self.emit_unary(unary),
            Expression::Call(call) => self.emit_call(call),
            Expression::GenericMethodCall(call) => self.emit_generic_method_call(call),
            Expression::Member(member) => self.emit_member(member),
            Expression::GenericMember(member) => self.emit_generic_member(member),
            Expression::TypeConversion(conversion) => self.emit_type_conversion(conversion),
            Expression::Conditional(conditional) => self.emit_conditional(conditional),
            Expression::Lambda(lambda) => self.emit_lambda(lambda),
            Expression::IntrinsicCall(intrinsic) => self.emit_intrinsic(intrinsic),
            Expression::NativeCall(native) => self.emit_native_call(native),
            Expression::MemoryOperation(memory) => self.emit_memory_operation(memory),
            Expression::TypeExpression(_) => Ok(Value::void()),
        }
    }

    fn emit_literal(&mut self, literal: &Literal) -> CodegenResult<Value> {
        match &literal.value {
            LiteralValue::Integer(value) => {
                if let Some(suffix) = &literal.suffix {
                    let ty = self.types.map(suffix, &literal.location)?;
                    return Ok(Value::new(value.to_string(), ty));
                }
                match self.language() {
                    Language::RazorForge => {
                        let ty = self.types.map("s64", &literal.location)?;
                        Ok(Value::new(value.to_string(), ty))
                    }
                    Language::Suslang => self.emit_bigint_literal(*value, &literal.location),
                }
            }
            LiteralValue::Decimal(value) => {
                if let Some(suffix) = &literal.suffix {
                    let ty = self.types.map(suffix, &literal.location)?;
                    return Ok(Value::new(float_repr(*value), ty));
                }
                match self.language() {
                    Language::RazorForge => {
                        let ty = self.types.map("f64", &literal.location)?;
                        Ok(Value::new(float_repr(*value), ty))
                    }
                    Language::Suslang => self.emit_decimal_literal(*value, &literal.location),
                }
            }
            LiteralValue::Boolean(value) => Ok(Value::new(value.to_string(), IrType::bool())),
            LiteralValue::Text(text) => {
                let global = self.intern_string(text);
                Ok(Value::new(global, IrType::new("ptr", false, false, "text")))
            }
        }
    }

    /// Unsuffixed Suslang integer: a fresh libbf handle set to the value.
    fn emit_bigint_literal(&mut self, value: i128, location: &Location) -> CodegenResult<Value> {
        let _ = location;
        self.declare_math("bf_alloc_number");
        self.declare_math("bf_set_si");
        let handle = IrType::new("i8*", false, false, "bigint");
        let temp = self.fresh_temp(&handle);
        self.line(format!("{temp} = call i8* @bf_alloc_number()"));
        self.line(format!("call void @bf_set_si(i8* {temp}, i64 {value})"));
        Ok(Value::new(temp, handle))
    }

    /// Unsuffixed Suslang decimal: a mafm handle parsed from the literal
    /// text.
    fn emit_decimal_literal(&mut self, value: f64, location: &Location) -> CodegenResult<Value> {
        let _ = location;
        self.declare_math("mafm_alloc_number");
        self.declare_math("mafm_set_str");
        let text = self.intern_string(&float_repr(value));
        let handle = IrType::new("i8*", false, true, "decimal");
        let temp = self.fresh_temp(&handle);
        self.line(format!("{temp} = call i8* @mafm_alloc_number()"));
        let status = self.fresh_temp(&IrType::new("i32", false, false, "s32"));
        self.line(format!(
            "{status} = call i32 @mafm_set_str(i8* {temp}, ptr {text})"
        ));
        Ok(Value::new(temp, handle))
    }

    fn emit_identifier(&mut self, identifier: &Identifier) -> CodegenResult<Value> {
        let name = &identifier.name;
        if let Some(ty) = self.symbols.lookup(name).cloned() {
            if self.symbols.is_parameter(name) {
                return Ok(Value::new(format!("%{name}"), ty));
            }
            let temp = self.fresh_temp(&ty);
            self.line(format!("{temp} = load {}, ptr %{name}", ty.text));
            return Ok(Value::new(temp, ty));
        }
        if self.symbols.function(name).is_some() {
            let symbol = symbol_name(name);
            return Ok(Value::new(
                format!("@{symbol}"),
                IrType::new("ptr", false, false, name),
            ));
        }
        Err(CodegenError::unresolved(
            name,
            "resolving an identifier",
            &identifier.location,
        ))
    }

    fn emit_binary(&mut self, binary: &BinaryExpr) -> CodegenResult<Value> {
        let lhs = self.emit_expression(&binary.lhs)?;
        let rhs = self.emit_expression(&binary.rhs)?;

        // math runtime families never touch native IR arithmetic
        if let Some(family) = MathFamily::of(&lhs.ty.source) {
            return self.emit_math_binary(family, binary.op, lhs, rhs, &binary.location);
        }

        let record_form = lhs.ty.is_record().then(|| lhs.ty.clone());
        let lhs = self.unwrap_primitive(lhs, &binary.location)?;
        let rhs = self.unwrap_primitive(rhs, &binary.location)?;

        if binary.op.is_comparison() {
            return self.emit_compare(binary.op, &lhs, &rhs);
        }

        let opcode = select_binary_opcode(binary.op, &lhs.ty)
            .ok_or_else(|| CodegenError::not_implemented(
                format!("operator '{}' on '{}'", binary.op, lhs.ty.source),
                &binary.location,
            ))?;
        let temp = self.fresh_temp(&lhs.ty);
        self.line(format!(
            "{temp} = {opcode} {} {}, {}",
            lhs.ty.text, lhs.repr, rhs.repr
        ));
        let result = Value::new(temp, lhs.ty.clone());

        // the surrounding context may expect the nominal record form back
        if let (Some(record), Some(info)) = (record_form, &binary.info) {
            if info.name == record.source {
                return Ok(self.rewrap_primitive(result, &record));
            }
        }
        Ok(result)
    }

    fn emit_compare(
        &mut self,
        op: BinaryOperator,
        lhs: &Value,
        rhs: &Value,
    ) -> CodegenResult<Value> {
        let (instruction, predicate) = comparison_predicate(op, &lhs.ty);
        let temp = self.fresh_temp(&IrType::bool());
        self.line(format!(
            "{temp} = {instruction} {predicate} {} {}, {}",
            lhs.ty.text, lhs.repr, rhs.repr
        ));
        Ok(Value::new(temp, IrType::bool()))
    }

    /// Binary operation on a libdfp/libbf/mafm type: one call into the math
    /// runtime, with a freshly allocated result handle where the family
    /// needs one.
    fn emit_math_binary(
        &mut self,
        family: MathFamily,
        op: BinaryOperator,
        lhs: Value,
        rhs: Value,
        location: &Location,
    ) -> CodegenResult<Value> {
        let symbol = MathRuntimeBinder::op_symbol(family, op).ok_or_else(|| {
            CodegenError::not_implemented(
                format!("operator '{op}' on '{}'", lhs.ty.source),
                location,
            )
        })?;
        self.declare_math(&symbol);
        let value_type = family.value_type();

        if op.is_comparison() {
            let ordering = self.fresh_temp(&IrType::new("i32", false, false, "s32"));
            self.line(format!(
                "{ordering} = call i32 @{symbol}({value_type} {}, {value_type} {})",
                lhs.repr, rhs.repr
            ));
            let (_, predicate) =
                comparison_predicate(op, &IrType::new("i32", false, false, "s32"));
            let temp = self.fresh_temp(&IrType::bool());
            self.line(format!("{temp} = icmp {predicate} i32 {ordering}, 0"));
            return Ok(Value::new(temp, IrType::bool()));
        }

        if family.is_handle() {
            self.declare_math(family.alloc_symbol());
            self.declare_math(family.init_symbol());
            let result = self.fresh_temp(&lhs.ty);
            self.line(format!("{result} = call i8* @{}()", family.alloc_symbol()));
            self.line(format!(
                "call void @{}(i8* {result})",
                family.init_symbol()
            ));
            let status = self.fresh_temp(&IrType::new("i32", false, false, "s32"));
            self.line(format!(
                "{status} = call i32 @{symbol}(i8* {result}, i8* {}, i8* {})",
                lhs.repr, rhs.repr
            ));
            return Ok(Value::new(result, lhs.ty));
        }

        let temp = self.fresh_temp(&lhs.ty);
        self.line(format!(
            "{temp} = call {value_type} @{symbol}({value_type} {}, {value_type} {})",
            lhs.repr, rhs.repr
        ));
        Ok(Value::new(temp, lhs.ty))
    }

    fn emit_unary(&mut self, unary: &UnaryExpr) -> CodegenResult<Value> {
        let operand = self.emit_expression(&unary.operand)?;
        let operand = self.unwrap_primitive(operand, &unary.location)?;
        let temp = self.fresh_temp(&operand.ty);
        match unary.op {
            UnaryOperator::Negate if operand.ty.is_float => {
                self.line(format!("{temp} = fneg {} {}", operand.ty.text, operand.repr));
            }
            UnaryOperator::Negate => {
                self.line(format!("{temp} = sub {} 0, {}", operand.ty.text, operand.repr));
            }
            UnaryOperator::Not if operand.ty.text == "i1" => {
                self.line(format!("{temp} = xor i1 {}, true", operand.repr));
            }
            UnaryOperator::Not => {
                self.line(format!("{temp} = xor {} {}, -1", operand.ty.text, operand.repr));
            }
        }
        Ok(Value::new(temp, operand.ty))
    }

    fn emit_call(&mut self, call: &Call) -> CodegenResult<Value> {
        self.comment(format!("CALL {}", call.callee));
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.emit_expression(arg)?);
        }

        if let Some(signature) = self.symbols.function(&call.callee).cloned() {
            let symbol = symbol_name(&call.callee);
            return self.emit_call_instruction(
                &format!("@{symbol}"),
                signature.return_type.as_ref(),
                &args,
                &call.location,
            );
        }

        // a binding holding a function pointer (lambda or passed-in)
        if self.symbols.lookup(&call.callee).is_some() {
            let callee = self.emit_identifier(&Identifier {
                name: call.callee.clone(),
                location: call.location.clone(),
                info: None,
            })?;
            let return_type = match call.info.as_ref() {
                Some(info) => self.map_source(&info.name, &call.location)?,
                None => self.types.map("s64", &call.location)?,
            };
            return self.emit_call_instruction(
                &callee.repr,
                Some(&return_type),
                &args,
                &call.location,
            );
        }

        Err(CodegenError::unresolved(
            &call.callee,
            "resolving a call target",
            &call.location,
        ))
    }

    /// Emit a direct or indirect call. A `None` return type means void.
    pub(crate) fn emit_call_instruction(
        &mut self,
        callee: &str,
        return_type: Option<&IrType>,
        args: &[Value],
        location: &Location,
    ) -> CodegenResult<Value> {
        // every temp consumed as an operand must have been recorded first
        for arg in args {
            if arg.repr.starts_with("%t") {
                self.temp_type(&arg.repr, location)?;
            }
        }
        let rendered = args
            .iter()
            .map(|arg| format!("{} {}", arg.ty.text, arg.repr))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(match return_type {
            None => {
                self.line(format!("call void {callee}({rendered})"));
                Value::void()
            }
            Some(ty) if ty.is_void() => {
                self.line(format!("call void {callee}({rendered})"));
                Value::void()
            }
            Some(ty) => {
                let temp = self.fresh_temp(ty);
                self.line(format!("{temp} = call {} {callee}({rendered})", ty.text));
                Value::new(temp, ty.clone())
            }
        })
    }

    /// Resolve a generic method call. The resolution order is fixed:
    /// danger-zone function, compiler-service intrinsic, user generic
    /// function, generic record/entity constructor, external generic type
    /// constructor, instance/static method.
    fn emit_generic_method_call(&mut self, call: &GenericMethodCall) -> CodegenResult<Value> {
        if call.target.is_none() && DANGER_FUNCTIONS.contains(&call.method.as_str()) {
            return self.emit_danger_function(call);
        }

        if call.target.is_none() && matches!(call.method.as_str(), "sizeof" | "alignof") {
            let type_arg = call.type_args.first().ok_or_else(|| {
                CodegenError::invalid(
                    format!("'{}' requires a type argument", call.method),
                    &call.location,
                )
            })?;
            return self.emit_type_info(&call.method, type_arg, &call.location);
        }

        if call.target.is_none() && self.symbols.generic_functions.contains_key(&call.method) {
            let mangled =
                self.instantiate_generic_function(&call.method, &call.type_args, &call.location)?;
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                args.push(self.emit_expression(arg)?);
            }
            let signature = self
                .symbols
                .function(&mangled)
                .cloned()
                .ok_or_else(|| {
                    CodegenError::unresolved(&mangled, "resolving an instantiation", &call.location)
                })?;
            self.comment(format!("CALL {mangled}"));
            return self.emit_call_instruction(
                &format!("@{mangled}"),
                signature.return_type.as_ref(),
                &args,
                &call.location,
            );
        }

        if call.target.is_none()
            && (self.symbols.generic_records.contains_key(&call.method)
                || self.symbols.generic_entities.contains_key(&call.method))
        {
            let mangled =
                self.instantiate_generic_record(&call.method, &call.type_args, &call.location)?;
            return self.emit_constructor(&mangled, &call.args, &call.location);
        }

        // a known concrete record/entity name used as constructor
        if call.target.is_none()
            && self.symbols.record_fields(&call.method).is_some()
        {
            let record = call.method.clone();
            return self.emit_constructor(&record, &call.args, &call.location);
        }

        // external generic type constructor: not ours, assume the runtime
        // provides it and hand back an opaque handle
        if call.target.is_none()
            && !call.type_args.is_empty()
            && call.method.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        {
            let symbol = mangle_type(&format!(
                "{}<{}>",
                call.method,
                call.type_args.join(",")
            ));
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                args.push(self.emit_expression(arg)?);
            }
            let params = args
                .iter()
                .map(|arg| arg.ty.text.clone())
                .collect::<Vec<_>>()
                .join(", ");
            self.declare(&symbol, &format!("declare ptr @{symbol}({params})"));
            let handle = IrType::new("ptr", false, false, call.method.clone());
            return self.emit_call_instruction(
                &format!("@{symbol}"),
                Some(&handle),
                &args,
                &call.location,
            );
        }

        if let Some(target) = &call.target {
            return self.emit_method_call(target, call);
        }

        Err(CodegenError::not_implemented(
            format!("method '{}'", call.method),
            &call.location,
        ))
    }

    fn emit_danger_function(&mut self, call: &GenericMethodCall) -> CodegenResult<Value> {
        let type_arg = call.type_args.first().cloned();
        match call.method.as_str() {
            "read_as" => {
                let type_arg = type_arg.ok_or_else(|| {
                    CodegenError::invalid("'read_as' requires a type argument", &call.location)
                })?;
                let ty = self.map_source(&type_arg, &call.location)?;
                let pointer = self.emit_expression(&call.args[0])?;
                let temp = self.fresh_temp(&ty);
                self.line(format!("{temp} = load {}, ptr {}", ty.text, pointer.repr));
                Ok(Value::new(temp, ty))
            }
            "write_as" => {
                let type_arg = type_arg.ok_or_else(|| {
                    CodegenError::invalid("'write_as' requires a type argument", &call.location)
                })?;
                let ty = self.map_source(&type_arg, &call.location)?;
                let pointer = self.emit_expression(&call.args[0])?;
                let value = self.emit_expression(&call.args[1])?;
                self.line(format!(
                    "store {} {}, ptr {}",
                    ty.text, value.repr, pointer.repr
                ));
                Ok(Value::void())
            }
            "invalidate" => {
                let pointer = self.emit_expression(&call.args[0])?;
                self.declare("free", "declare void @free(ptr)");
                self.line(format!("call void @free(ptr {})", pointer.repr));
                Ok(Value::void())
            }
            _ => unreachable!("danger function set and dispatch went out of sync"),
        }
    }

    /// Build a record value (insertvalue chain) or a heap entity (malloc +
    /// field stores).
    fn emit_constructor(
        &mut self,
        record: &str,
        args: &[Expression],
        location: &Location,
    ) -> CodegenResult<Value> {
        let fields = self
            .symbols
            .record_fields(record)
            .cloned()
            .ok_or_else(|| CodegenError::unresolved(record, "constructing a record", location))?;
        if fields.len() != args.len() {
            return Err(CodegenError::invalid(
                format!(
                    "constructor for '{record}' takes {} arguments, got {}",
                    fields.len(),
                    args.len()
                ),
                location,
            ));
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.emit_expression(arg)?);
        }

        let record_ty = IrType::new(format!("%{record}"), false, false, record);
        if self.symbols.is_entity(record) {
            self.declare("malloc", "declare ptr @malloc(i64)");
            let size = self.size_of(&record_ty, location)?;
            let handle = IrType::new("ptr", false, false, record);
            let pointer = self.fresh_temp(&handle);
            self.line(format!("{pointer} = call ptr @malloc(i64 {size})"));
            for (index, value) in values.iter().enumerate() {
                let slot = self.fresh_temp(&handle);
                self.line(format!(
                    "{slot} = getelementptr inbounds %{record}, ptr {pointer}, i32 0, i32 {index}"
                ));
                self.line(format!(
                    "store {} {}, ptr {slot}",
                    value.ty.text, value.repr
                ));
            }
            return Ok(Value::new(pointer, handle));
        }

        let mut current = "undef".to_owned();
        let mut result = Value::new("undef", record_ty.clone());
        for (index, value) in values.iter().enumerate() {
            let temp = self.fresh_temp(&record_ty);
            self.line(format!(
                "{temp} = insertvalue {} {current}, {} {}, {index}",
                record_ty.text, value.ty.text, value.repr
            ));
            current = temp.clone();
            result = Value::new(temp, record_ty.clone());
        }
        Ok(result)
    }

    /// Instance or static method. Static when the callee is a type
    /// expression; instance methods get the object pointer prepended.
    fn emit_method_call(
        &mut self,
        target: &Expression,
        call: &GenericMethodCall,
    ) -> CodegenResult<Value> {
        if let Expression::TypeExpression(type_expr) = target {
            let name = format!("{}.{}", type_expr.name, call.method);
            let signature = self.symbols.function(&name).cloned().ok_or_else(|| {
                CodegenError::unresolved(&name, "resolving a static method", &call.location)
            })?;
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                args.push(self.emit_expression(arg)?);
            }
            self.comment(format!("CALL {name} (static)"));
            return self.emit_call_instruction(
                &format!("@{}", symbol_name(&name)),
                signature.return_type.as_ref(),
                &args,
                &call.location,
            );
        }

        let object = self.emit_expression(target)?;
        let base = object
            .ty
            .source
            .trim_end_matches('*')
            .split('<')
            .next()
            .unwrap_or(&object.ty.source)
            .to_owned();
        let name = format!("{base}.{}", call.method);
        let signature = self.symbols.function(&name).cloned().ok_or_else(|| {
            CodegenError::not_implemented(
                format!("method '{}' on '{}'", call.method, object.ty.source),
                &call.location,
            )
        })?;

        let self_ptr = self.spill_to_pointer(&object, &call.location)?;
        let mut args = Vec::with_capacity(call.args.len() + 1);
        args.push(Value::new(
            self_ptr,
            IrType::new("ptr", false, false, object.ty.source.clone()),
        ));
        for arg in &call.args {
            args.push(self.emit_expression(arg)?);
        }
        self.comment(format!("CALL {name}"));
        self.emit_call_instruction(
            &format!("@{}", symbol_name(&name)),
            signature.return_type.as_ref(),
            &args,
            &call.location,
        )
    }

    fn emit_member(&mut self, member: &Member) -> CodegenResult<Value> {
        let object = self.emit_expression(&member.object)?;
        self.emit_field_access(&object, &member.field, &member.location)
    }

    fn emit_generic_member(&mut self, member: &GenericMember) -> CodegenResult<Value> {
        let object = self.emit_expression(&member.object)?;
        self.emit_field_access(&object, &member.field, &member.location)
    }

    pub(crate) fn emit_field_access(
        &mut self,
        object: &Value,
        field: &str,
        location: &Location,
    ) -> CodegenResult<Value> {
        let record = super::statements::record_table_name(&object.ty.source);
        let (index, field_source) = self
            .symbols
            .field_entry(&record, field)
            .map(|(index, source)| (index, source.to_owned()))
            .ok_or_else(|| {
                CodegenError::unresolved(
                    format!("{record}.{field}"),
                    "resolving a member",
                    location,
                )
            })?;
        let field_ty = self.map_source(&field_source, location)?;

        if object.ty.is_pointer() {
            let slot = self.fresh_temp(&IrType::new("ptr", false, false, field_source));
            self.line(format!(
                "{slot} = getelementptr inbounds %{record}, ptr {}, i32 0, i32 {index}",
                object.repr
            ));
            let temp = self.fresh_temp(&field_ty);
            self.line(format!("{temp} = load {}, ptr {slot}", field_ty.text));
            return Ok(Value::new(temp, field_ty));
        }

        let temp = self.fresh_temp(&field_ty);
        self.line(format!(
            "{temp} = extractvalue {} {}, {index}",
            object.ty.text, object.repr
        ));
        Ok(Value::new(temp, field_ty))
    }

    fn emit_type_conversion(&mut self, conversion: &TypeConversion) -> CodegenResult<Value> {
        let value = self.emit_expression(&conversion.value)?;
        let target = self.map_source(&conversion.target, &conversion.location)?;

        if target.is_record() {
            let record = target.source.clone();
            match self.symbols.wrapped_primitive(&record).map(str::to_owned) {
                Some(primitive) => {
                    let underlying = self.types.map(&primitive, &conversion.location)?;
                    let value = self.unwrap_primitive(value, &conversion.location)?;
                    let converted = self.convert(value, &underlying, &conversion.location)?;
                    return Ok(self.rewrap_primitive(converted, &target));
                }
                None if value.ty.is_pointer() => {
                    return Err(CodegenError::invalid(
                        format!("cannot convert a pointer to multi-field record '{record}'"),
                        &conversion.location,
                    ));
                }
                None => {
                    return Err(CodegenError::unresolved(
                        &record,
                        "converting to a record type",
                        &conversion.location,
                    ));
                }
            }
        }

        let value = self.unwrap_primitive(value, &conversion.location)?;
        self.convert(value, &target, &conversion.location)
    }

    fn emit_native_call(&mut self, native: &NativeCall) -> CodegenResult<Value> {
        self.comment(format!("CALL {} (native)", native.name));
        let mut args = Vec::with_capacity(native.args.len());
        for arg in &native.args {
            args.push(self.emit_expression(arg)?);
        }

        if let Some((return_ir, declaration)) = NATIVE_SIGNATURES.get(native.name.as_str()) {
            self.declare(&native.name, declaration);
            let return_type = (*return_ir != "void")
                .then(|| IrType::new(*return_ir, false, false, native.name.clone()));
            return self.emit_call_instruction(
                &format!("@{}", native.name),
                return_type.as_ref(),
                &args,
                &native.location,
            );
        }

        if self.declare_math_symbol_if_known(&native.name) {
            let return_ir = native_return_ir(&native.name);
            let return_type = IrType::new(return_ir, false, false, native.name.clone());
            return self.emit_call_instruction(
                &format!("@{}", native.name),
                Some(&return_type),
                &args,
                &native.location,
            );
        }

        let return_ir = native_return_ir(&native.name);
        let params = args
            .iter()
            .map(|arg| arg.ty.text.clone())
            .collect::<Vec<_>>()
            .join(", ");
        self.declare(
            &native.name,
            &format!("declare {return_ir} @{}({params})", native.name),
        );
        let return_type = IrType::new(return_ir, false, false, native.name.clone());
        self.emit_call_instruction(
            &format!("@{}", native.name),
            Some(&return_type),
            &args,
            &native.location,
        )
    }

    fn declare_math_symbol_if_known(&mut self, symbol: &str) -> bool {
        if MathRuntimeBinder::declaration(symbol).is_some() {
            self.declare_math(symbol);
            true
        } else {
            false
        }
    }

    /// Lower a lambda into a pending definition and yield a pointer to it.
    ///
    /// The body instructions are written into the main buffer and then split
    /// off again; the split happens before the body result is inspected so
    /// the buffer is restored on every path out of here.
    fn emit_lambda(&mut self, lambda: &Lambda) -> CodegenResult<Value> {
        let name = format!("__lambda_{}", self.lambda_count);
        self.lambda_count += 1;

        let snapshot = self.symbols.snapshot();
        self.symbols.push_frame();

        let mut params = Vec::with_capacity(lambda.params.len());
        let mut bind_error = None;
        for param in &lambda.params {
            match self.map_source(&param.type_name, &param.location) {
                Ok(ty) => {
                    params.push(format!("{} %{}", ty.text, param.name));
                    self.temp_types.insert(format!("%{}", param.name), ty.clone());
                    self.symbols.bind_parameter(&param.name, ty);
                }
                Err(error) => {
                    bind_error = Some(error);
                    break;
                }
            }
        }

        // inferred with the parameters in scope
        let return_type = match bind_error {
            Some(error) => {
                self.symbols.restore(snapshot);
                return Err(error);
            }
            None => match self.infer_lambda_return(&lambda.body) {
                Ok(ty) => ty,
                Err(error) => {
                    self.symbols.restore(snapshot);
                    return Err(error);
                }
            },
        };
        let saved_return = self.current_return.replace(return_type.clone());
        let saved_loops = std::mem::take(&mut self.loop_stack);
        let saved_locks = std::mem::take(&mut self.lock_stack);

        let mark = self.out.len();
        let body_result = self.emit_lambda_body(&lambda.body, &return_type);
        let body = self.out.split_off(mark);

        self.symbols.restore(snapshot);
        self.current_return = saved_return;
        self.loop_stack = saved_loops;
        self.lock_stack = saved_locks;
        let terminated = body_result?;

        let mut definition = format!(
            "define {} @{name}({}) {{\n",
            return_type.text,
            params.join(", ")
        );
        definition.push_str(&body);
        if !terminated {
            definition.push_str(&format!(
                "  ret {} {}\n",
                return_type.text,
                zero_value(&return_type)
            ));
        }
        definition.push_str("}\n\n");
        self.pending.push_back(definition);

        Ok(Value::new(
            format!("@{name}"),
            IrType::new("ptr", false, false, "fn"),
        ))
    }

    fn emit_lambda_body(
        &mut self,
        body: &Statement,
        return_type: &IrType,
    ) -> CodegenResult<bool> {
        match body {
            Statement::Expression(statement) => {
                let value = self.emit_expression(&statement.expression)?;
                self.line(format!("ret {} {}", return_type.text, value.repr));
                Ok(true)
            }
            Statement::Block(block) => {
                let mut terminated = false;
                for statement in &block.statements {
                    if terminated {
                        break;
                    }
                    terminated = self.emit_statement(statement)?;
                }
                Ok(terminated)
            }
            other => self.emit_statement(other),
        }
    }

    /// Return type of a lambda, inferred from its body.
    fn infer_lambda_return(&mut self, body: &Statement) -> CodegenResult<IrType> {
        self.infer_statement_type(body)
    }

    fn infer_statement_type(&mut self, statement: &Statement) -> CodegenResult<IrType> {
        match statement {
            Statement::Expression(expr) => self.infer_expression_type(&expr.expression),
            Statement::Return(ret) => match &ret.value {
                Some(value) => self.infer_expression_type(value),
                None => self.types.map("s32", &ret.location),
            },
            Statement::Block(block) => match block.statements.last() {
                Some(last) => self.infer_statement_type(last),
                None => self.types.map("s32", &block.location),
            },
            other => self.types.map("s32", &other.location()),
        }
    }

    fn infer_expression_type(&mut self, expression: &Expression) -> CodegenResult<IrType> {
        match expression {
            Expression::Binary(binary) if binary.op.is_comparison() => Ok(IrType::bool()),
            Expression::Binary(binary) => self.infer_expression_type(&binary.lhs),
            Expression::Unary(unary) => self.infer_expression_type(&unary.operand),
            Expression::Call(_)
            | Expression::GenericMethodCall(_)
            | Expression::NativeCall(_) => self.types.map("s32", &expression.location()),
            Expression::Literal(literal) => self.infer_literal_type(literal),
            Expression::Identifier(identifier) => self
                .symbols
                .lookup(&identifier.name)
                .cloned()
                .map(Ok)
                .unwrap_or_else(|| self.types.map("s32", &identifier.location)),
            Expression::Conditional(conditional) => {
                match conditional.then_block.statements.last() {
                    Some(last) => self.infer_statement_type(last),
                    None => self.types.map("s32", &conditional.location),
                }
            }
            Expression::TypeConversion(conversion) => {
                self.map_source(&conversion.target, &conversion.location)
            }
            _ => self.types.map("s32", &expression.location()),
        }
    }

    fn infer_literal_type(&mut self, literal: &Literal) -> CodegenResult<IrType> {
        if let Some(suffix) = &literal.suffix {
            return self.types.map(suffix, &literal.location);
        }
        match (&literal.value, self.language()) {
            (LiteralValue::Integer(_), Language::RazorForge) => {
                self.types.map("s64", &literal.location)
            }
            (LiteralValue::Integer(_), Language::Suslang) => {
                self.types.map("bigint", &literal.location)
            }
            (LiteralValue::Decimal(_), Language::RazorForge) => {
                self.types.map("f64", &literal.location)
            }
            (LiteralValue::Decimal(_), Language::Suslang) => {
                self.types.map("decimal", &literal.location)
            }
            (LiteralValue::Boolean(_), _) => Ok(IrType::bool()),
            (LiteralValue::Text(_), _) => self.types.map("text", &literal.location),
        }
    }

    fn emit_memory_operation(&mut self, memory: &MemoryOperation) -> CodegenResult<Value> {
        self.emit_memory_intrinsic(
            &memory.op,
            std::slice::from_ref(&memory.type_arg),
            &memory.args,
            &memory.location,
        )
    }
}

/// IR zero for default lambda returns.
fn zero_value(ty: &IrType) -> &'static str {
    if ty.is_float {
        "0.0"
    } else if ty.is_pointer() {
        "null"
    } else if ty.is_record() || ty.is_aggregate() {
        "zeroinitializer"
    } else {
        "0"
    }
}

fn float_repr(value: f64) -> String {
    let text = format!("{value:?}");
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{text}.0")
    }
}

/// Arithmetic and bitwise opcode for primitive operands.
fn select_binary_opcode(op: BinaryOperator, ty: &IrType) -> Option<&'static str> {
    Some(match op {
        BinaryOperator::Add if ty.is_float => "fadd",
        BinaryOperator::Sub if ty.is_float => "fsub",
        BinaryOperator::Mul if ty.is_float => "fmul",
        BinaryOperator::Div if ty.is_float => "fdiv",
        BinaryOperator::Rem if ty.is_float => "frem",
        BinaryOperator::Add => "add",
        BinaryOperator::Sub => "sub",
        BinaryOperator::Mul => "mul",
        BinaryOperator::Div if ty.is_unsigned => "udiv",
        BinaryOperator::Div => "sdiv",
        BinaryOperator::Rem if ty.is_unsigned => "urem",
        BinaryOperator::Rem => "srem",
        BinaryOperator::And | BinaryOperator::BitAnd => "and",
        BinaryOperator::Or | BinaryOperator::BitOr => "or",
        BinaryOperator::BitXor => "xor",
        BinaryOperator::ShiftLeft => "shl",
        BinaryOperator::ShiftRight if ty.is_unsigned => "lshr",
        BinaryOperator::ShiftRight => "ashr",
        _ => return None,
    })
}

/// Comparison instruction and predicate for primitive operands.
fn comparison_predicate(op: BinaryOperator, ty: &IrType) -> (&'static str, &'static str) {
    if ty.is_float {
        let predicate = match op {
            BinaryOperator::Equal => "oeq",
            BinaryOperator::NotEqual => "one",
            BinaryOperator::LessThan => "olt",
            BinaryOperator::LessEqual => "ole",
            BinaryOperator::GreaterThan => "ogt",
            _ => "oge",
        };
        ("fcmp", predicate)
    } else if ty.is_unsigned {
        let predicate = match op {
            BinaryOperator::Equal => "eq",
            BinaryOperator::NotEqual => "ne",
            BinaryOperator::LessThan => "ult",
            BinaryOperator::LessEqual => "ule",
            BinaryOperator::GreaterThan => "ugt",
            _ => "uge",
        };
        ("icmp", predicate)
    } else {
        let predicate = match op {
            BinaryOperator::Equal => "eq",
            BinaryOperator::NotEqual => "ne",
            BinaryOperator::LessThan => "slt",
            BinaryOperator::LessEqual => "sle",
            BinaryOperator::GreaterThan => "sgt",
            _ => "sge",
        };
        ("icmp", predicate)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::BinaryOperator;
    use crate::codegen::types::IrType;

    use super::{comparison_predicate, float_repr, select_binary_opcode, zero_value};

    fn i32_signed() -> IrType {
        IrType::new("i32", false, false, "s32")
    }

    fn i32_unsigned() -> IrType {
        IrType::new("i32", true, false, "u32")
    }

    fn f64_ty() -> IrType {
        IrType::new("double", false, true, "f64")
    }

    #[test]
    fn test_opcode_selection_follows_classification() {
        assert_eq!(select_binary_opcode(BinaryOperator::Add, &i32_signed()), Some("add"));
        assert_eq!(select_binary_opcode(BinaryOperator::Add, &f64_ty()), Some("fadd"));
        assert_eq!(select_binary_opcode(BinaryOperator::Div, &i32_signed()), Some("sdiv"));
        assert_eq!(select_binary_opcode(BinaryOperator::Div, &i32_unsigned()), Some("udiv"));
        assert_eq!(select_binary_opcode(BinaryOperator::Rem, &i32_unsigned()), Some("urem"));
        assert_eq!(
            select_binary_opcode(BinaryOperator::ShiftRight, &i32_signed()),
            Some("ashr")
        );
        assert_eq!(
            select_binary_opcode(BinaryOperator::ShiftRight, &i32_unsigned()),
            Some("lshr")
        );
    }

    #[test]
    fn test_comparison_predicates() {
        assert_eq!(
            comparison_predicate(BinaryOperator::LessThan, &i32_signed()),
            ("icmp", "slt")
        );
        assert_eq!(
            comparison_predicate(BinaryOperator::LessThan, &i32_unsigned()),
            ("icmp", "ult")
        );
        assert_eq!(
            comparison_predicate(BinaryOperator::Equal, &f64_ty()),
            ("fcmp", "oeq")
        );
    }

    #[test]
    fn test_float_repr_is_valid_ir() {
        assert_eq!(float_repr(1.5), "1.5");
        assert_eq!(float_repr(1.0), "1.0");
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(zero_value(&i32_signed()), "0");
        assert_eq!(zero_value(&f64_ty()), "0.0");
        assert_eq!(zero_value(&IrType::new("ptr", false, false, "text")), "null");
    }
}
