#[test]
fn ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/event_basic.rs");
    t.pass("tests/ui/event_named_enum.rs");
    t.pass("tests/ui/command_basic.rs");
}
