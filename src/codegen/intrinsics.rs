//! Lowering of `@intrinsic.*` pseudo-operations. Each group expands to a
//! precise IR sequence; every group except the comparisons takes a mandatory
//! leading type argument.
use crate::ast::{Expression, IntrinsicCall, Location};

use super::error::{CodegenError, CodegenResult};
use super::types::{float_suffix, IrType, Value};
use super::Emitter;

const CONVERSION_OPS: [&str; 9] = [
    "trunc", "zext", "sext", "fptrunc", "fpext", "fptoui", "fptosi", "uitofp", "sitofp",
];

const MATH_UNARY: [&str; 11] = [
    "sqrt", "fabs", "floor", "ceil", "round", "exp", "log", "log10", "sin", "cos", "trunc_float",
];

impl Emitter {
    pub(crate) fn emit_intrinsic(&mut self, call: &IntrinsicCall) -> CodegenResult<Value> {
        let name = call.name.as_str();

        match name {
            "load" | "store" | "volatile_load" | "volatile_store" | "bitcast" | "invalidate" => {
                return self.emit_memory_intrinsic(name, &call.type_args, &call.args, &call.location)
            }
            "sizeof" | "alignof" => {
                let type_arg = self.require_type_arg(call)?;
                return self.emit_type_info(name, &type_arg, &call.location);
            }
            _ => {}
        }

        if let Some(op) = name.strip_prefix("atomic.") {
            return self.emit_atomic_intrinsic(op, call);
        }
        if let Some(predicate) = name.strip_prefix("icmp.") {
            return self.emit_compare_intrinsic("icmp", predicate, call);
        }
        if let Some(predicate) = name.strip_prefix("fcmp.") {
            return self.emit_compare_intrinsic("fcmp", predicate, call);
        }
        if CONVERSION_OPS.contains(&name) {
            return self.emit_conversion_intrinsic(name, call);
        }
        if MATH_UNARY.contains(&name) || matches!(name, "abs" | "copysign" | "pow") {
            return self.emit_math_intrinsic(name, call);
        }
        if matches!(name, "and" | "or" | "xor" | "not" | "shl" | "lshr" | "ashr") {
            return self.emit_bitwise_intrinsic(name, call);
        }
        if matches!(name, "ctpop" | "bswap" | "bitreverse" | "ctlz" | "cttz") {
            return self.emit_bit_manipulation_intrinsic(name, call);
        }

        let (base, variant) = match name.split_once('.') {
            Some((base, variant)) => (base, Some(variant)),
            None => (name, None),
        };
        if matches!(base, "add" | "sub" | "mul" | "sdiv" | "udiv" | "srem" | "urem" | "neg") {
            return self.emit_arithmetic_intrinsic(base, variant, call);
        }

        Err(CodegenError::not_implemented(
            format!("intrinsic '{name}'"),
            &call.location,
        ))
    }

    fn require_type_arg(&self, call: &IntrinsicCall) -> CodegenResult<String> {
        call.type_args.first().cloned().ok_or_else(|| {
            CodegenError::invalid(
                format!("intrinsic '{}' requires a type argument", call.name),
                &call.location,
            )
        })
    }

    fn intrinsic_operands(&mut self, call: &IntrinsicCall) -> CodegenResult<Vec<Value>> {
        let mut operands = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let value = self.emit_expression(arg)?;
            operands.push(self.unwrap_primitive(value, &call.location)?);
        }
        Ok(operands)
    }

    pub(crate) fn emit_memory_intrinsic(
        &mut self,
        op: &str,
        type_args: &[String],
        args: &[Expression],
        location: &Location,
    ) -> CodegenResult<Value> {
        let type_arg = type_args.first().ok_or_else(|| {
            CodegenError::invalid(format!("intrinsic '{op}' requires a type argument"), location)
        })?;
        let ty = self.map_source(type_arg, location)?;

        match op {
            "load" | "volatile_load" => {
                let pointer = self.emit_expression(&args[0])?;
                let volatile = if op == "volatile_load" { "volatile " } else { "" };
                let temp = self.fresh_temp(&ty);
                self.line(format!(
                    "{temp} = load {volatile}{}, ptr {}",
                    ty.text, pointer.repr
                ));
                Ok(Value::new(temp, ty))
            }
            "store" | "volatile_store" => {
                let pointer = self.emit_expression(&args[0])?;
                let value = self.emit_expression(&args[1])?;
                let volatile = if op == "volatile_store" { "volatile " } else { "" };
                self.line(format!(
                    "store {volatile}{} {}, ptr {}",
                    ty.text, value.repr, pointer.repr
                ));
                Ok(Value::void())
            }
            "bitcast" => {
                let target_arg = type_args.last().ok_or_else(|| {
                    CodegenError::invalid("'bitcast' requires a target type argument", location)
                })?;
                let target = self.map_source(target_arg, location)?;
                let value = self.emit_expression(&args[0])?;
                let from_size = self.size_of(&value.ty, location)?;
                let to_size = self.size_of(&target, location)?;
                if from_size != to_size {
                    return Err(CodegenError::invalid(
                        format!(
                            "bitcast between types of different size ({} vs {} bytes)",
                            from_size, to_size
                        ),
                        location,
                    ));
                }
                // value-level round trip through a stack slot
                let slot = self.fresh_temp(&IrType::new("ptr", false, false, "ptr"));
                self.line(format!("{slot} = alloca {}", value.ty.text));
                self.line(format!(
                    "store {} {}, ptr {slot}",
                    value.ty.text, value.repr
                ));
                let temp = self.fresh_temp(&target);
                self.line(format!("{temp} = load {}, ptr {slot}", target.text));
                Ok(Value::new(temp, target))
            }
            "invalidate" => {
                let pointer = self.emit_expression(&args[0])?;
                self.declare("free", "declare void @free(ptr)");
                self.line(format!("call void @free(ptr {})", pointer.repr));
                Ok(Value::void())
            }
            _ => Err(CodegenError::not_implemented(
                format!("memory intrinsic '{op}'"),
                location,
            )),
        }
    }

    fn emit_arithmetic_intrinsic(
        &mut self,
        base: &str,
        variant: Option<&str>,
        call: &IntrinsicCall,
    ) -> CodegenResult<Value> {
        let type_arg = self.require_type_arg(call)?;
        let ty = self.map_source(&type_arg, &call.location)?;
        let ty = self.fold_wrapped(ty, &call.location)?;
        let operands = self.intrinsic_operands(call)?;

        if base == "neg" {
            let operand = &operands[0];
            let temp = self.fresh_temp(&ty);
            if ty.is_float {
                self.line(format!("{temp} = fneg {} {}", ty.text, operand.repr));
            } else {
                self.line(format!("{temp} = sub {} 0, {}", ty.text, operand.repr));
            }
            return Ok(Value::new(temp, ty));
        }

        let (lhs, rhs) = (&operands[0], &operands[1]);

        // floats have no overflow; every variant collapses to the plain op
        if ty.is_float {
            let opcode = match base {
                "add" => "fadd",
                "sub" => "fsub",
                "mul" => "fmul",
                "sdiv" | "udiv" => "fdiv",
                _ => "frem",
            };
            let temp = self.fresh_temp(&ty);
            self.line(format!(
                "{temp} = {opcode} {} {}, {}",
                ty.text, lhs.repr, rhs.repr
            ));
            return Ok(Value::new(temp, ty));
        }

        match (base, variant) {
            ("sdiv" | "udiv" | "srem" | "urem", _) => {
                let temp = self.fresh_temp(&ty);
                self.line(format!("{temp} = {base} {} {}, {}", ty.text, lhs.repr, rhs.repr));
                Ok(Value::new(temp, ty))
            }
            ("add" | "sub" | "mul", None) => self.emit_trapping_arithmetic(base, &ty, lhs, rhs),
            ("add" | "sub" | "mul", Some("wrapping")) => {
                let temp = self.fresh_temp(&ty);
                self.line(format!("{temp} = {base} {} {}, {}", ty.text, lhs.repr, rhs.repr));
                Ok(Value::new(temp, ty))
            }
            ("add" | "sub" | "mul", Some("overflow")) => {
                let pair = self.emit_overflow_call(base, &ty, lhs, rhs);
                let temp = self.fresh_temp(&ty);
                self.line(format!(
                    "{temp} = extractvalue {} {pair}, 0",
                    overflow_pair_type(&ty)
                ));
                Ok(Value::new(temp, ty))
            }
            ("add" | "sub", Some("saturating")) => {
                let sign = if ty.is_unsigned { 'u' } else { 's' };
                let symbol = format!("llvm.{sign}{base}.sat.{}", ty.text);
                self.declare(
                    &symbol,
                    &format!(
                        "declare {t} @{symbol}({t}, {t})",
                        t = ty.text
                    ),
                );
                let temp = self.fresh_temp(&ty);
                self.line(format!(
                    "{temp} = call {} @{symbol}({} {}, {} {})",
                    ty.text, ty.text, lhs.repr, ty.text, rhs.repr
                ));
                Ok(Value::new(temp, ty))
            }
            ("mul", Some("saturating")) => {
                // TODO: clamp to the type bounds instead of returning the
                // wrapped product when the multiplication overflows
                let pair = self.emit_overflow_call(base, &ty, lhs, rhs);
                let temp = self.fresh_temp(&ty);
                self.line(format!(
                    "{temp} = extractvalue {} {pair}, 0",
                    overflow_pair_type(&ty)
                ));
                Ok(Value::new(temp, ty))
            }
            _ => Err(CodegenError::not_implemented(
                format!("intrinsic '{}'", call.name),
                &call.location,
            )),
        }
    }

    /// `llvm.{s|u}{op}.with.overflow` call yielding the `{T, i1}` pair.
    fn emit_overflow_call(&mut self, base: &str, ty: &IrType, lhs: &Value, rhs: &Value) -> String {
        let sign = if ty.is_unsigned { 'u' } else { 's' };
        let symbol = format!("llvm.{sign}{base}.with.overflow.{}", ty.text);
        let pair = overflow_pair_type(ty);
        self.declare(
            &symbol,
            &format!("declare {pair} @{symbol}({t}, {t})", t = ty.text),
        );
        let result = self.fresh_temp(&IrType::new(pair.clone(), false, false, ty.source.clone()));
        self.line(format!(
            "{result} = call {pair} @{symbol}({} {}, {} {})",
            ty.text, lhs.repr, ty.text, rhs.repr
        ));
        result
    }

    /// Bare `add`/`sub`/`mul`: overflow aborts the program through
    /// `llvm.trap`.
    fn emit_trapping_arithmetic(
        &mut self,
        base: &str,
        ty: &IrType,
        lhs: &Value,
        rhs: &Value,
    ) -> CodegenResult<Value> {
        let pair = overflow_pair_type(ty);
        let pair_value = self.emit_overflow_call(base, ty, lhs, rhs);

        let value = self.fresh_temp(ty);
        self.line(format!("{value} = extractvalue {pair} {pair_value}, 0"));
        let overflowed = self.fresh_temp(&IrType::bool());
        self.line(format!("{overflowed} = extractvalue {pair} {pair_value}, 1"));

        let trap = self.temps.next_label();
        let resume = self.temps.next_label();
        self.line(format!(
            "br i1 {overflowed}, label %{trap}, label %{resume}"
        ));
        self.label(&trap);
        self.declare("llvm.trap", "declare void @llvm.trap()");
        self.line("call void @llvm.trap()");
        self.line("unreachable");
        self.label(&resume);

        Ok(Value::new(value, ty.clone()))
    }

    fn emit_compare_intrinsic(
        &mut self,
        instruction: &str,
        predicate: &str,
        call: &IntrinsicCall,
    ) -> CodegenResult<Value> {
        let type_arg = self.require_type_arg(call)?;
        let ty = self.map_source(&type_arg, &call.location)?;
        let ty = self.fold_wrapped(ty, &call.location)?;
        let operands = self.intrinsic_operands(call)?;
        let temp = self.fresh_temp(&IrType::bool());
        self.line(format!(
            "{temp} = {instruction} {predicate} {} {}, {}",
            ty.text, operands[0].repr, operands[1].repr
        ));
        Ok(Value::new(temp, IrType::bool()))
    }

    fn emit_conversion_intrinsic(
        &mut self,
        opcode: &str,
        call: &IntrinsicCall,
    ) -> CodegenResult<Value> {
        if call.type_args.len() < 2 {
            return Err(CodegenError::invalid(
                format!("intrinsic '{opcode}' requires source and target type arguments"),
                &call.location,
            ));
        }
        let from = self.map_source(&call.type_args[0], &call.location)?;
        let to = self.map_source(&call.type_args[1], &call.location)?;
        let value = self.emit_expression(&call.args[0])?;
        let temp = self.fresh_temp(&to);
        self.line(format!(
            "{temp} = {opcode} {} {} to {}",
            from.text, value.repr, to.text
        ));
        Ok(Value::new(temp, to))
    }

    fn emit_math_intrinsic(&mut self, name: &str, call: &IntrinsicCall) -> CodegenResult<Value> {
        let type_arg = self.require_type_arg(call)?;
        let ty = self.map_source(&type_arg, &call.location)?;
        let ty = self.fold_wrapped(ty, &call.location)?;
        let operands = self.intrinsic_operands(call)?;

        if name == "abs" {
            let symbol = format!("llvm.abs.{}", ty.text);
            self.declare(
                &symbol,
                &format!("declare {t} @{symbol}({t}, i1)", t = ty.text),
            );
            let temp = self.fresh_temp(&ty);
            self.line(format!(
                "{temp} = call {} @{symbol}({} {}, i1 false)",
                ty.text, ty.text, operands[0].repr
            ));
            return Ok(Value::new(temp, ty));
        }

        let suffix = float_suffix(&ty.text).ok_or_else(|| {
            CodegenError::invalid(
                format!("math intrinsic '{name}' requires a float type, got '{}'", ty.source),
                &call.location,
            )
        })?;
        let llvm_name = if name == "trunc_float" { "trunc" } else { name };
        let symbol = format!("llvm.{llvm_name}.{suffix}");

        if matches!(name, "copysign" | "pow") {
            self.declare(
                &symbol,
                &format!("declare {t} @{symbol}({t}, {t})", t = ty.text),
            );
            let temp = self.fresh_temp(&ty);
            self.line(format!(
                "{temp} = call {} @{symbol}({} {}, {} {})",
                ty.text, ty.text, operands[0].repr, ty.text, operands[1].repr
            ));
            return Ok(Value::new(temp, ty));
        }

        self.declare(&symbol, &format!("declare {t} @{symbol}({t})", t = ty.text));
        let temp = self.fresh_temp(&ty);
        self.line(format!(
            "{temp} = call {} @{symbol}({} {})",
            ty.text, ty.text, operands[0].repr
        ));
        Ok(Value::new(temp, ty))
    }

    fn emit_atomic_intrinsic(&mut self, op: &str, call: &IntrinsicCall) -> CodegenResult<Value> {
        let type_arg = self.require_type_arg(call)?;
        let ty = self.map_source(&type_arg, &call.location)?;
        let ty = self.fold_wrapped(ty, &call.location)?;

        match op {
            "load" => {
                let pointer = self.emit_expression(&call.args[0])?;
                let temp = self.fresh_temp(&ty);
                self.line(format!(
                    "{temp} = load atomic {}, ptr {} seq_cst, align 8",
                    ty.text, pointer.repr
                ));
                Ok(Value::new(temp, ty))
            }
            "store" => {
                let pointer = self.emit_expression(&call.args[0])?;
                let value = self.emit_expression(&call.args[1])?;
                self.line(format!(
                    "store atomic {} {}, ptr {} seq_cst, align 8",
                    ty.text, value.repr, pointer.repr
                ));
                Ok(Value::void())
            }
            "add" | "sub" | "xchg" => {
                let pointer = self.emit_expression(&call.args[0])?;
                let value = self.emit_expression(&call.args[1])?;
                let temp = self.fresh_temp(&ty);
                self.line(format!(
                    "{temp} = atomicrmw {op} ptr {}, {} {} seq_cst",
                    pointer.repr, ty.text, value.repr
                ));
                Ok(Value::new(temp, ty))
            }
            "cmpxchg" => {
                let pointer = self.emit_expression(&call.args[0])?;
                let expected = self.emit_expression(&call.args[1])?;
                let desired = self.emit_expression(&call.args[2])?;
                let pair_type = format!("{{ {}, i1 }}", ty.text);
                let pair =
                    self.fresh_temp(&IrType::new(pair_type.clone(), false, false, ty.source.clone()));
                self.line(format!(
                    "{pair} = cmpxchg ptr {}, {} {}, {} {} seq_cst seq_cst",
                    pointer.repr, ty.text, expected.repr, ty.text, desired.repr
                ));
                let temp = self.fresh_temp(&ty);
                self.line(format!("{temp} = extractvalue {pair_type} {pair}, 0"));
                Ok(Value::new(temp, ty))
            }
            _ => Err(CodegenError::not_implemented(
                format!("atomic intrinsic '{op}'"),
                &call.location,
            )),
        }
    }

    fn emit_bitwise_intrinsic(&mut self, name: &str, call: &IntrinsicCall) -> CodegenResult<Value> {
        let type_arg = self.require_type_arg(call)?;
        let ty = self.map_source(&type_arg, &call.location)?;
        let ty = self.fold_wrapped(ty, &call.location)?;
        let operands = self.intrinsic_operands(call)?;
        let temp = self.fresh_temp(&ty);
        if name == "not" {
            self.line(format!(
                "{temp} = xor {} {}, -1",
                ty.text, operands[0].repr
            ));
        } else {
            self.line(format!(
                "{temp} = {name} {} {}, {}",
                ty.text, operands[0].repr, operands[1].repr
            ));
        }
        Ok(Value::new(temp, ty))
    }

    fn emit_bit_manipulation_intrinsic(
        &mut self,
        name: &str,
        call: &IntrinsicCall,
    ) -> CodegenResult<Value> {
        let type_arg = self.require_type_arg(call)?;
        let ty = self.map_source(&type_arg, &call.location)?;
        let ty = self.fold_wrapped(ty, &call.location)?;
        let operands = self.intrinsic_operands(call)?;
        let symbol = format!("llvm.{name}.{}", ty.text);
        let temp = self.fresh_temp(&ty);

        if matches!(name, "ctlz" | "cttz") {
            self.declare(
                &symbol,
                &format!("declare {t} @{symbol}({t}, i1)", t = ty.text),
            );
            self.line(format!(
                "{temp} = call {} @{symbol}({} {}, i1 false)",
                ty.text, ty.text, operands[0].repr
            ));
        } else {
            self.declare(&symbol, &format!("declare {t} @{symbol}({t})", t = ty.text));
            self.line(format!(
                "{temp} = call {} @{symbol}({} {})",
                ty.text, ty.text, operands[0].repr
            ));
        }
        Ok(Value::new(temp, ty))
    }

    /// `sizeof`/`alignof`: a constant from the type tables, yielded as
    /// `uaddr`.
    pub(crate) fn emit_type_info(
        &mut self,
        which: &str,
        type_arg: &str,
        location: &Location,
    ) -> CodegenResult<Value> {
        let ty = self.map_source(type_arg, location)?;
        let constant = if which == "sizeof" {
            self.size_of(&ty, location)?
        } else {
            self.align_of(&ty, location)?
        };
        let uaddr = self.types.map("uaddr", location)?;
        let temp = self.fresh_temp(&uaddr);
        self.line(format!("{temp} = add {} 0, {constant}", uaddr.text));
        Ok(Value::new(temp, uaddr))
    }
}

/// The `{T, i1}` struct the overflow intrinsics return.
fn overflow_pair_type(ty: &IrType) -> String {
    format!("{{ {}, i1 }}", ty.text)
}
