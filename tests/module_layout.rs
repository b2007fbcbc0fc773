use std::collections::HashSet;

use razorforge::ast::*;
use razorforge::codegen::{Emitter, Language, Platform};
use test_utils::{assigned_temps, init_logging, ExpectedIr};

fn loc() -> Location {
    Location::default()
}

fn int(value: i128, suffix: &str) -> Expression {
    Expression::Literal(Literal {
        value: LiteralValue::Integer(value),
        suffix: Some(suffix.to_owned()),
        location: loc(),
        info: None,
    })
}

fn text(value: &str) -> Expression {
    Expression::Literal(Literal {
        value: LiteralValue::Text(value.to_owned()),
        suffix: None,
        location: loc(),
        info: None,
    })
}

fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier {
        name: name.to_owned(),
        location: loc(),
        info: None,
    })
}

fn binary(op: BinaryOperator, lhs: Expression, rhs: Expression) -> Expression {
    Expression::Binary(BinaryExpr {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        location: loc(),
        info: None,
    })
}

fn ret(value: Expression) -> Statement {
    Statement::Return(Return {
        value: Some(value),
        location: loc(),
    })
}

fn expr_stmt(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression,
        location: loc(),
    })
}

fn function(name: &str, params: Vec<Param>, return_type: Option<&str>, body: Vec<Statement>) -> Item {
    Item::Function(FunctionDef {
        name: name.to_owned(),
        type_params: vec![],
        params,
        return_type: return_type.map(str::to_owned),
        body,
        location: loc(),
    })
}

fn emit(items: Vec<Item>) -> String {
    init_logging();
    let mut emitter = Emitter::new(Platform::bits64(), Language::RazorForge);
    emitter
        .emit_module(&Module::from_items("layout", items))
        .expect("should lower")
}

#[test]
fn module_sections_come_in_declaration_order() {
    let point = Item::Record(RecordDef {
        name: "Point".to_owned(),
        type_params: vec![],
        fields: vec![Field::new("x", "s64"), Field::new("y", "s64")],
        location: loc(),
    });
    let main = function(
        "main",
        vec![],
        Some("s64"),
        vec![
            expr_stmt(Expression::NativeCall(NativeCall {
                name: "printf".to_owned(),
                args: vec![text("hello"), int(1, "s64")],
                location: loc(),
                info: None,
            })),
            ret(int(0, "s64")),
        ],
    );
    let ir = emit(vec![point, main]);

    ExpectedIr {
        in_order: &[
            "; module 'layout'",
            "declare i32 @printf(ptr, ...)",
            "@.str.0 = private unnamed_addr constant [6 x i8] c\"hello\\00\"",
            "%Point = type { i64, i64 }",
            "define i64 @main()",
            "call i32 @printf(ptr @.str.0, i64 1)",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn temps_are_unique_and_defined_before_use() {
    let sum = binary(
        BinaryOperator::Add,
        binary(BinaryOperator::Mul, ident("a"), ident("b")),
        binary(BinaryOperator::Sub, ident("a"), ident("b")),
    );
    let ir = emit(vec![function(
        "mix",
        vec![Param::new("a", "s64"), Param::new("b", "s64")],
        Some("s64"),
        vec![ret(sum)],
    )]);

    let temps = assigned_temps(&ir);
    let unique: HashSet<_> = temps.iter().collect();
    assert_eq!(temps.len(), unique.len(), "duplicate temp definitions:\n{ir}");

    for temp in &temps {
        let definition = format!("{temp} = ");
        let first_use = ir.find(temp.as_str()).expect("temp must appear");
        let defined_at = ir.find(&definition).expect("temp must be defined");
        assert_eq!(
            first_use, defined_at,
            "{temp} is used before its definition:\n{ir}"
        );
    }
}

#[test]
fn lambda_definitions_are_appended_after_the_main_stream() {
    let lambda = Expression::Lambda(Lambda {
        params: vec![Param::new("a", "s64")],
        body: Box::new(expr_stmt(ident("a"))),
        location: loc(),
        info: None,
    });
    let ir = emit(vec![function(
        "with_lambda",
        vec![Param::new("x", "s64")],
        Some("s64"),
        vec![
            Statement::Declaration(Declaration {
                name: "f".to_owned(),
                declared_type: None,
                value: lambda,
                location: loc(),
            }),
            ret(Expression::Call(Call {
                callee: "f".to_owned(),
                args: vec![ident("x")],
                location: loc(),
                info: Some(ResolvedType::named("s64")),
            })),
        ],
    )]);

    ExpectedIr {
        in_order: &[
            "define i64 @with_lambda(i64 %x)",
            "store ptr @__lambda_0, ptr %f",
            "define i64 @__lambda_0(i64 %a)",
            "ret i64 %a",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn native_call_declarations_are_idempotent() {
    let ir = emit(vec![function(
        "twice",
        vec![],
        None,
        vec![
            expr_stmt(Expression::NativeCall(NativeCall {
                name: "puts".to_owned(),
                args: vec![text("a")],
                location: loc(),
                info: None,
            })),
            expr_stmt(Expression::NativeCall(NativeCall {
                name: "puts".to_owned(),
                args: vec![text("b")],
                location: loc(),
                info: None,
            })),
        ],
    )]);
    assert_eq!(ir.matches("declare i32 @puts(ptr)").count(), 1);
    assert_eq!(ir.matches("call i32 @puts").count(), 2);
}

#[test]
fn unknown_native_symbols_default_to_i64() {
    let ir = emit(vec![function(
        "mystery",
        vec![Param::new("x", "s64")],
        Some("s64"),
        vec![ret(Expression::NativeCall(NativeCall {
            name: "frobnicate".to_owned(),
            args: vec![ident("x")],
            location: loc(),
            info: None,
        }))],
    )]);
    assert!(ir.contains("declare i64 @frobnicate(i64)"));
    assert!(ir.contains("call i64 @frobnicate(i64 %x)"));
}

#[test]
fn native_name_patterns_pick_return_types() {
    let ir = emit(vec![function(
        "patterns",
        vec![Param::new("p", "text")],
        None,
        vec![
            expr_stmt(Expression::NativeCall(NativeCall {
                name: "format_int".to_owned(),
                args: vec![ident("p")],
                location: loc(),
                info: None,
            })),
            expr_stmt(Expression::NativeCall(NativeCall {
                name: "bigdec_new".to_owned(),
                args: vec![],
                location: loc(),
                info: None,
            })),
            expr_stmt(Expression::NativeCall(NativeCall {
                name: "bigint_is_zero".to_owned(),
                args: vec![ident("p")],
                location: loc(),
                info: None,
            })),
        ],
    )]);
    assert!(ir.contains("declare ptr @format_int(ptr)"));
    assert!(ir.contains("declare i8* @bigdec_new()"));
    assert!(ir.contains("declare i32 @bigint_is_zero(ptr)"));
}

#[test]
fn void_function_value_return_warns_and_drops() {
    let ir = emit(vec![function(
        "oops",
        vec![],
        None,
        vec![ret(int(1, "s64"))],
    )]);
    assert!(ir.contains("ret void"));
    assert!(!ir.contains("ret i64"));
}

#[test]
fn suslang_decimal_literals_build_mafm_handles() {
    init_logging();
    let module = Module::from_items(
        "layout",
        vec![function(
            "pi",
            vec![],
            Some("decimal"),
            vec![ret(Expression::Literal(Literal {
                value: LiteralValue::Decimal(3.14),
                suffix: None,
                location: loc(),
                info: None,
            }))],
        )],
    );
    let mut emitter = Emitter::new(Platform::bits64(), Language::Suslang);
    let ir = emitter.emit_module(&module).expect("should lower");

    ExpectedIr {
        in_order: &[
            "%t0 = call i8* @mafm_alloc_number()",
            "call i32 @mafm_set_str(i8* %t0, ptr @.str.0)",
            "ret i8* %t0",
        ],
    }
    .assert_matches(&ir);
    assert!(ir.contains("c\"3.14\\00\""));
}
