use std::io;

use lox::ast::{Expr, Stmt};
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

fn parse(source: &str) -> Vec<Stmt> {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("scan failed");

    let mut parser = Parser::new(tokens);
    let (statements, errors) = parser.parse();

    assert!(
        errors.is_empty(),
        "unexpected parse errors: {:?}",
        errors.iter().map(ToString::to_string).collect::<Vec<_>>()
    );

    statements
}

fn resolve_errors(source: &str) -> Vec<String> {
    let statements = parse(source);
    let mut interpreter = Interpreter::with_output(Box::new(io::sink()));

    Resolver::new(&mut interpreter)
        .resolve(&statements)
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn top_level_return_is_rejected() {
    assert_eq!(
        resolve_errors("return 1;"),
        vec!["[line 1] Error at 'return': Cannot return from top-level code."]
    );
}

#[test]
fn returning_a_value_from_an_initializer_is_rejected() {
    assert_eq!(
        resolve_errors("class X { init() { return 1; } }"),
        vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
    );
}

#[test]
fn bare_return_in_initializer_is_allowed() {
    assert!(resolve_errors("class X { init() { return; } }").is_empty());
}

#[test]
fn returning_a_value_from_a_method_is_allowed() {
    assert!(resolve_errors("class X { m() { return 1; } }").is_empty());
}

#[test]
fn this_outside_a_class_is_rejected() {
    assert_eq!(
        resolve_errors("print this;"),
        vec!["[line 1] Error at 'this': Cannot use 'this' outside of a class."]
    );

    assert_eq!(
        resolve_errors("fun f() { return this; }"),
        vec!["[line 1] Error at 'this': Cannot use 'this' outside of a class."]
    );
}

#[test]
fn super_outside_a_class_is_rejected() {
    assert_eq!(
        resolve_errors("print super.x;"),
        vec!["[line 1] Error at 'super': Cannot use 'super' outside of a class."]
    );
}

#[test]
fn super_without_a_superclass_is_rejected() {
    assert_eq!(
        resolve_errors("class A { m() { super.m(); } }"),
        vec!["[line 1] Error at 'super': Cannot use 'super' in a class with no superclass."]
    );
}

#[test]
fn a_class_cannot_inherit_from_itself() {
    assert_eq!(
        resolve_errors("class A < A {}"),
        vec!["[line 1] Error at 'A': A class can't inherit from itself."]
    );
}

#[test]
fn duplicate_locals_in_one_scope_are_rejected() {
    assert_eq!(
        resolve_errors("{ var a = 1; var a = 2; }"),
        vec!["[line 1] Error at 'a': Variable already declared in this scope."]
    );
}

#[test]
fn duplicate_parameters_are_rejected() {
    assert_eq!(
        resolve_errors("fun f(a, a) {}"),
        vec!["[line 1] Error at 'a': Variable already declared in this scope."]
    );
}

#[test]
fn reading_a_local_in_its_own_initializer_is_rejected() {
    let messages = resolve_errors("{ var a = a; }");

    assert!(
        messages
            .iter()
            .any(|m| m.contains("Cannot read local variable in its own initializer.")),
        "got: {:?}",
        messages
    );
}

#[test]
fn global_redeclaration_is_tolerated() {
    assert!(resolve_errors("var a = 1; var a = 2;").is_empty());
}

#[test]
fn shadowing_in_an_inner_scope_is_allowed() {
    assert!(resolve_errors("var a = 1; { var a = 2; { var a = 3; } }").is_empty());
}

#[test]
fn all_errors_are_accumulated_in_one_pass() {
    let messages = resolve_errors("return 1; print this; { var a = 1; var a = 2; }");

    assert_eq!(messages.len(), 3, "got: {:?}", messages);
}

#[test]
fn local_reference_depth_is_recorded() {
    // `print a;` sits one block below the block declaring `a`.
    let statements = parse("{ var a = 1; { print a; } }");

    let id = match &statements[0] {
        Stmt::Block(outer) => match &outer[1] {
            Stmt::Block(inner) => match &inner[0] {
                Stmt::Print(Expr::Variable { id, .. }) => *id,
                other => panic!("expected print of a variable, got {:?}", other),
            },
            other => panic!("expected inner block, got {:?}", other),
        },
        other => panic!("expected outer block, got {:?}", other),
    };

    let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
    let errors = Resolver::new(&mut interpreter).resolve(&statements);
    assert!(errors.is_empty());

    assert_eq!(interpreter.locals().get(&id), Some(&1));
}

#[test]
fn global_references_stay_out_of_the_table() {
    let statements = parse("var a = 1; print a;");

    let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
    let errors = Resolver::new(&mut interpreter).resolve(&statements);
    assert!(errors.is_empty());

    assert!(interpreter.locals().is_empty());
}

#[test]
fn resolving_twice_produces_the_same_table() {
    let statements = parse(
        "fun outer() { var x = 1; fun inner() { return x; } return inner; } print outer()();",
    );

    let mut first = Interpreter::with_output(Box::new(io::sink()));
    assert!(Resolver::new(&mut first).resolve(&statements).is_empty());

    let mut second = Interpreter::with_output(Box::new(io::sink()));
    assert!(Resolver::new(&mut second).resolve(&statements).is_empty());

    assert_eq!(first.locals(), second.locals());
}
