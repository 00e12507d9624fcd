//! End-to-end scenarios exercising the full pipeline through the public
//! `merge` entry point, one per concrete case named for the engine's
//! testable properties.

use jmerge::{DisplaySettings, merge};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn merge_default(base: &str, left: &str, right: &str) -> jmerge::MergeResult {
    merge(base, left, right, &DisplaySettings::default())
}

#[rstest]
#[case("class A {\n    private int x;\n\n    void f(int a) {\n    }\n}\n")]
#[case("class A {\n}\n")]
#[case("import a.A;\n\nclass X {\n    void f() {\n    }\n}\n")]
fn identity_merge_has_no_conflicts(#[case] source: &str) {
    let result = merge_default(source, source, source);
    assert_eq!(result.conflict_count, 0);
    assert_eq!(result.contents, source);
}

#[test]
fn one_sided_edit_takes_the_changed_side() {
    let base = "class A {\n    void f(int a) {\n    }\n}\n";
    let left = "class A {\n    void f(int a, int b) {\n    }\n}\n";
    let result = merge_default(base, left, base);
    assert_eq!(result.conflict_count, 0);
    assert!(result.contents.contains("void f(int a, int b)"));
}

#[test]
fn identical_rename_on_both_sides_is_not_a_conflict() {
    let base = "class A {\n    void f() {\n    }\n}\n";
    let left = "class A {\n    void g() {\n    }\n}\n";
    let right = "class A {\n    void g() {\n    }\n}\n";
    let result = merge_default(base, left, right);
    assert_eq!(result.conflict_count, 0);
    assert!(result.contents.contains("void g()"));
    assert!(!result.contents.contains("void f()"));
}

#[test]
fn conflicting_visibility_change_is_flagged() {
    let base = "class A {\n    public int x;\n}\n";
    let left = "class A {\n    private int x;\n}\n";
    let right = "class A {\n    protected int x;\n}\n";
    let result = merge_default(base, left, right);
    assert!(result.has_conflicts());
    assert!(result.contents.contains("private") || result.contents.contains("protected"));
}

#[test]
fn conflicting_renames_of_the_same_field_are_flagged() {
    let base = "class A {\n    int foo;\n}\n";
    let left = "class A {\n    int bar;\n}\n";
    let right = "class A {\n    int baz;\n}\n";
    let result = merge_default(base, left, right);
    assert!(result.has_conflicts());
    assert!(result.contents.contains("bar"));
    assert!(result.contents.contains("baz"));
}

#[test]
fn identical_method_added_on_both_sides_appears_once() {
    let base = "class A {\n}\n";
    let left = "class A {\n    int sum(int a, int b) {\n        return a + b;\n    }\n}\n";
    let right = "class A {\n    int sum(int a, int b) {\n        return a + b;\n    }\n}\n";
    let result = merge_default(base, left, right);
    assert_eq!(result.conflict_count, 0);
    assert_eq!(result.contents.matches("int sum").count(), 1);
}

#[test]
fn disjoint_type_members_are_both_kept_left_then_right() {
    let base = "class A {\n}\n";
    let left = "class A {\n    void a() {\n    }\n}\n";
    let right = "class A {\n    void b() {\n    }\n}\n";
    let result = merge_default(base, left, right);
    assert_eq!(result.conflict_count, 0);
    let pos_a = result.contents.find("void a()").expect("void a() missing from merge");
    let pos_b = result.contents.find("void b()").expect("void b() missing from merge");
    assert!(pos_a < pos_b, "expected LEFT-then-RIGHT order, got: {}", result.contents);
}

#[test]
fn commutative_imports_from_both_sides_are_all_kept() {
    let base = "import a.A;\n\nclass X {\n}\n";
    let left = "import a.A;\nimport b.B;\n\nclass X {\n}\n";
    let right = "import a.A;\nimport c.C;\n\nclass X {\n}\n";
    let result = merge_default(base, left, right);
    assert_eq!(result.conflict_count, 0);
    assert!(result.contents.contains("import a.A;"));
    assert!(result.contents.contains("import b.B;"));
    assert!(result.contents.contains("import c.C;"));
}
