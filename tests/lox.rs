use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use lox::interpreter::Interpreter;
use lox::lox::Lox;

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output was not UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn session() -> (Lox, SharedBuf) {
    let buffer = SharedBuf::default();
    let lox = Lox::with_interpreter(Interpreter::with_output(Box::new(buffer.clone())));

    (lox, buffer)
}

#[test]
fn a_clean_program_sets_no_flags() {
    let (mut lox, buffer) = session();

    lox.run("print 1 + 2;");

    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(buffer.contents(), "3\n");
}

#[test]
fn a_parse_error_sets_the_static_flag() {
    let (mut lox, buffer) = session();

    lox.run("print 1");

    assert!(lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(buffer.contents(), "");
}

#[test]
fn a_resolve_error_sets_the_static_flag() {
    let (mut lox, _) = session();

    lox.run("fun bad() { return 1; } class X { init() { return 1; } }");

    assert!(lox.had_error());
    assert!(!lox.had_runtime_error());
}

#[test]
fn static_errors_suppress_evaluation() {
    let (mut lox, buffer) = session();

    // The well-formed prefix must not run when a later statement is bad.
    lox.run("print 1; return 2;");

    assert!(lox.had_error());
    assert_eq!(buffer.contents(), "");
}

#[test]
fn a_runtime_error_sets_only_the_runtime_flag() {
    let (mut lox, buffer) = session();

    lox.run("print 1; print -\"a\";");

    assert!(!lox.had_error());
    assert!(lox.had_runtime_error());
    assert_eq!(buffer.contents(), "1\n");
}

#[test]
fn state_persists_across_runs_like_a_repl() {
    let (mut lox, buffer) = session();

    lox.run("var a = 1;");
    lox.run("a = a + 1;");
    lox.run("print a;");

    assert!(!lox.had_error());
    assert_eq!(buffer.contents(), "2\n");
}

#[test]
fn closures_survive_across_runs() {
    let (mut lox, buffer) = session();

    lox.run("fun make() { var n = 10; fun get() { return n; } return get; } var g = make();");
    lox.run("print g();");

    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(buffer.contents(), "10\n");
}
