use razorforge::ast::*;
use razorforge::codegen::{Emitter, Language, Platform};
use test_utils::{assert_absent, count_occurrences, init_logging, ExpectedIr};

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

fn access(source: &str, handle: &str, body: Vec<Statement>) -> ScopedAccess {
    ScopedAccess {
        source: ident(source),
        handle: handle.to_owned(),
        body,
        location: loc(),
    }
}

fn store_through(handle: &str) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression: Expression::IntrinsicCall(IntrinsicCall {
            name: "store".to_owned(),
            type_args: vec!["s64".to_owned()],
            args: vec![ident(handle), int(1, "s64")],
            location: loc(),
            info: None,
        }),
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
        .emit_module(&Module::from_items("access", items))
        .expect("should lower")
}

#[test]
fn inspecting_wraps_body_in_read_lock_pair() {
    let ir = emit(vec![function(
        "peek",
        vec![Param::new("s", "Shared<s64, MultiReadLock>")],
        None,
        vec![Statement::Inspecting(access("s", "h", vec![store_through("h")]))],
    )]);

    ExpectedIr {
        in_order: &[
            "%h = call ptr @razorforge_rwlock_read_lock(ptr %s)",
            "store i64 1, ptr %h",
            "call void @razorforge_rwlock_read_unlock(ptr %s)",
        ],
    }
    .assert_matches(&ir);
    assert_eq!(count_occurrences(&ir, "call ptr @razorforge_rwlock_read_lock"), 1);
    assert_eq!(count_occurrences(&ir, "call void @razorforge_rwlock_read_unlock"), 1);
    assert!(ir.contains("declare ptr @razorforge_rwlock_read_lock(ptr)"));
    assert!(ir.contains("declare void @razorforge_rwlock_read_unlock(ptr)"));
}

#[test]
fn seizing_uses_the_mutex_runtime() {
    let ir = emit(vec![function(
        "grab",
        vec![Param::new("s", "Shared<s64, WriteLock>")],
        None,
        vec![Statement::Seizing(access("s", "h", vec![store_through("h")]))],
    )]);

    ExpectedIr {
        in_order: &[
            "%h = call ptr @razorforge_mutex_lock(ptr %s)",
            "call void @razorforge_mutex_unlock(ptr %s)",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn viewing_and_hijacking_have_no_runtime_footprint() {
    let ir = emit(vec![
        function(
            "view",
            vec![Param::new("s", "Shared<s64, NoLock>")],
            None,
            vec![Statement::Viewing(access("s", "h", vec![store_through("h")]))],
        ),
        function(
            "hijack",
            vec![Param::new("s", "Shared<s64, NoLock>")],
            None,
            vec![Statement::Hijacking(access("s", "g", vec![store_through("g")]))],
        ),
    ]);

    assert!(ir.contains("%h = bitcast ptr %s to ptr"));
    assert!(ir.contains("%g = bitcast ptr %s to ptr"));
    assert_absent(&ir, "lock");
    assert_absent(&ir, "unlock");
}

#[test]
fn viewing_a_temporary_spills_it_to_a_stack_slot() {
    let point = Item::Record(RecordDef {
        name: "Point".to_owned(),
        type_params: vec![],
        fields: vec![Field::new("x", "s64"), Field::new("y", "s64")],
        location: loc(),
    });
    let ir = emit(vec![
        point,
        function(
            "view_value",
            vec![Param::new("p", "Point")],
            None,
            vec![Statement::Viewing(access("p", "h", vec![]))],
        ),
    ]);

    ExpectedIr {
        in_order: &[
            "%t0 = alloca %Point",
            "store %Point %p, ptr %t0",
            "%h = bitcast ptr %t0 to ptr",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn return_inside_locked_body_releases_on_the_exit_edge() {
    let ir = emit(vec![function(
        "bail",
        vec![Param::new("s", "Shared<s64, MultiReadLock>")],
        Some("s64"),
        vec![Statement::Inspecting(access(
            "s",
            "h",
            vec![Statement::Return(Return {
                value: Some(int(1, "s64")),
                location: loc(),
            })],
        ))],
    )]);

    ExpectedIr {
        in_order: &[
            "%h = call ptr @razorforge_rwlock_read_lock(ptr %s)",
            "call void @razorforge_rwlock_read_unlock(ptr %s)",
            "ret i64 1",
        ],
    }
    .assert_matches(&ir);
    // released exactly once: on the return edge, not again on fallthrough
    assert_eq!(count_occurrences(&ir, "razorforge_rwlock_read_unlock(ptr %s)"), 1);
}

#[test]
fn handle_is_scoped_to_the_body() {
    init_logging();
    let module = Module::from_items(
        "access",
        vec![function(
            "escape",
            vec![Param::new("s", "Shared<s64, NoLock>")],
            Some("s64"),
            vec![
                Statement::Viewing(access("s", "h", vec![])),
                Statement::Return(Return {
                    value: Some(ident("h")),
                    location: loc(),
                }),
            ],
        )],
    );
    let mut emitter = Emitter::new(Platform::bits64(), Language::RazorForge);
    assert!(emitter.emit_module(&module).is_err());
}
