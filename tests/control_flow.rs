use razorforge::ast::*;
use razorforge::codegen::{Emitter, Language, Platform};
use test_utils::{assert_absent, init_logging, ExpectedIr};

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

fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier {
        name: name.to_owned(),
        location: loc(),
        info: None,
    })
}

fn expr_stmt(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression,
        location: loc(),
    })
}

fn ret(value: Expression) -> Statement {
    Statement::Return(Return {
        value: Some(value),
        location: loc(),
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

fn block(statements: Vec<Statement>) -> Block {
    Block::from_statements(statements)
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
        .emit_module(&Module::from_items("flow", items))
        .expect("should lower")
}

#[test]
fn if_expression_joins_branches_with_phi() {
    let conditional = Expression::Conditional(Conditional {
        condition: Box::new(ident("c")),
        then_block: block(vec![expr_stmt(int(1, "s32"))]),
        else_block: Some(block(vec![expr_stmt(int(2, "s32"))])),
        location: loc(),
        info: Some(ResolvedType::named("s32")),
    });
    let ir = emit(vec![function(
        "pick",
        vec![Param::new("c", "bool")],
        Some("s32"),
        vec![
            Statement::Declaration(Declaration {
                name: "x".to_owned(),
                declared_type: None,
                value: conditional,
                location: loc(),
            }),
            ret(ident("x")),
        ],
    )]);

    ExpectedIr {
        in_order: &[
            "br i1 %c, label %L0, label %L1",
            "L0:",
            "br label %L2",
            "L1:",
            "br label %L2",
            "L2:",
            "%t0 = phi i32 [ 1, %L0 ], [ 2, %L1 ]",
            "%x = alloca i32",
            "store i32 %t0, ptr %x",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn if_expression_without_else_is_rejected() {
    init_logging();
    let conditional = Expression::Conditional(Conditional {
        condition: Box::new(ident("c")),
        then_block: block(vec![expr_stmt(int(1, "s32"))]),
        else_block: None,
        location: loc(),
        info: None,
    });
    let module = Module::from_items(
        "flow",
        vec![function(
            "bad",
            vec![Param::new("c", "bool")],
            Some("s32"),
            vec![ret(conditional)],
        )],
    );
    let mut emitter = Emitter::new(Platform::bits64(), Language::RazorForge);
    assert!(emitter.emit_module(&module).is_err());
}

#[test]
fn if_with_both_branches_returning_emits_no_merge_label() {
    let ir = emit(vec![function(
        "choose",
        vec![Param::new("c", "bool")],
        Some("s32"),
        vec![Statement::If(If {
            condition: ident("c"),
            then_block: block(vec![ret(int(1, "s32"))]),
            else_block: Some(block(vec![ret(int(2, "s32"))])),
            location: loc(),
        })],
    )]);

    // then L0, else L1; the merge label L2 must never materialize
    assert_absent(&ir, "L2:");
    assert_absent(&ir, "unreachable");
    ExpectedIr {
        in_order: &[
            "br i1 %c, label %L0, label %L1",
            "L0:",
            "ret i32 1",
            "L1:",
            "ret i32 2",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn if_without_else_branches_to_merge() {
    let ir = emit(vec![function(
        "maybe",
        vec![Param::new("c", "bool"), Param::new("p", "s64*")],
        None,
        vec![
            Statement::If(If {
                condition: ident("c"),
                then_block: block(vec![expr_stmt(Expression::IntrinsicCall(IntrinsicCall {
                    name: "store".to_owned(),
                    type_args: vec!["s64".to_owned()],
                    args: vec![ident("p"), int(1, "s64")],
                    location: loc(),
                    info: None,
                }))]),
                else_block: None,
                location: loc(),
            }),
            Statement::Return(Return {
                value: None,
                location: loc(),
            }),
        ],
    )]);

    ExpectedIr {
        in_order: &[
            "br i1 %c, label %L0, label %L1",
            "L0:",
            "store i64 1, ptr %p",
            "br label %L1",
            "L1:",
            "ret void",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn while_loop_layout() {
    let body = Statement::Assignment(Assignment {
        target: ident("i"),
        value: binary(BinaryOperator::Add, ident("i"), int(1, "s64")),
        location: loc(),
    });
    let ir = emit(vec![function(
        "count",
        vec![Param::new("n", "s64")],
        None,
        vec![
            Statement::Declaration(Declaration {
                name: "i".to_owned(),
                declared_type: Some("s64".to_owned()),
                value: int(0, "s64"),
                location: loc(),
            }),
            Statement::While(WhileLoop {
                condition: binary(BinaryOperator::LessThan, ident("i"), ident("n")),
                body: vec![body],
                location: loc(),
            }),
        ],
    )]);

    ExpectedIr {
        in_order: &[
            "%i = alloca i64",
            "br label %L0",
            "L0:",
            "icmp slt i64",
            "br i1 %t1, label %L1, label %L2",
            "L1:",
            "br label %L0",
            "L2:",
            "ret void",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn break_and_continue_target_the_loop_labels() {
    let body = vec![
        Statement::If(If {
            condition: ident("c"),
            then_block: block(vec![Statement::Break(Break { location: loc() })]),
            else_block: None,
            location: loc(),
        }),
        Statement::Continue(Continue { location: loc() }),
    ];
    let ir = emit(vec![function(
        "spin",
        vec![Param::new("c", "bool")],
        None,
        vec![Statement::While(WhileLoop {
            condition: ident("c"),
            body,
            location: loc(),
        })],
    )]);

    // cond L0, body L1, end L2; break jumps to L2, continue back to L0
    ExpectedIr {
        in_order: &["L1:", "br label %L2", "br label %L0", "L2:"],
    }
    .assert_matches(&ir);
}

#[test]
fn break_outside_loop_is_rejected() {
    init_logging();
    let module = Module::from_items(
        "flow",
        vec![function(
            "bad",
            vec![],
            None,
            vec![Statement::Break(Break { location: loc() })],
        )],
    );
    let mut emitter = Emitter::new(Platform::bits64(), Language::RazorForge);
    assert!(emitter.emit_module(&module).is_err());
}

#[test]
fn for_loop_desugars_to_while_layout_with_step_block() {
    let ir = emit(vec![function(
        "iota",
        vec![],
        None,
        vec![Statement::For(ForLoop {
            variable: "i".to_owned(),
            var_type: Some("s64".to_owned()),
            start: int(0, "s64"),
            end: int(10, "s64"),
            body: vec![],
            location: loc(),
        })],
    )]);

    ExpectedIr {
        in_order: &[
            "%i = alloca i64",
            "store i64 0, ptr %i",
            "br label %L0",
            "L0:",
            "%t0 = load i64, ptr %i",
            "icmp slt i64 %t0, 10",
            "br i1 %t1, label %L1, label %L3",
            "L1:",
            "br label %L2",
            "L2:",
            "add i64 %t2, 1",
            "br label %L0",
            "L3:",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn danger_blocks_are_transparent_with_markers() {
    let ir = emit(vec![function(
        "risky",
        vec![Param::new("p", "s64*")],
        Some("s64"),
        vec![Statement::Danger(Danger {
            body: vec![ret(Expression::MemoryOperation(MemoryOperation {
                op: "load".to_owned(),
                type_arg: "s64".to_owned(),
                args: vec![ident("p")],
                location: loc(),
                info: None,
            }))],
            location: loc(),
        })],
    )]);

    ExpectedIr {
        in_order: &[
            "; danger {",
            "%t0 = load i64, ptr %p",
            "ret i64 %t0",
            "; } danger",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn tuple_destructuring_extracts_each_element() {
    let pair = Item::Record(RecordDef {
        name: "Pair".to_owned(),
        type_params: vec![],
        fields: vec![Field::new("first", "s64"), Field::new("second", "bool")],
        location: loc(),
    });
    let ir = emit(vec![
        pair,
        function(
            "unpack",
            vec![Param::new("p", "Pair")],
            None,
            vec![Statement::TupleDestructuring(TupleDestructuring {
                names: vec!["a".to_owned(), "b".to_owned()],
                value: ident("p"),
                location: loc(),
            })],
        ),
    ]);

    ExpectedIr {
        in_order: &[
            "%t0 = extractvalue %Pair %p, 0",
            "%a = alloca i64",
            "store i64 %t0, ptr %a",
            "%t1 = extractvalue %Pair %p, 1",
            "%b = alloca i1",
            "store i1 %t1, ptr %b",
        ],
    }
    .assert_matches(&ir);
}
