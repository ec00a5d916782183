//! End-to-end load, edit, merge and save cycles over realistic typemaps.

use typemap_core::{
    ConflictKind, MatchOptions, MergeOutcome, NewRule, Rule, Typemap, TypemapError,
    ValidationError, detect_conflicts, matches, merge_template, parse_indexed_record,
    parse_template, parse_typemap_text, render_spec, validate_rules,
};

const SERVER_SPEC: &str = "\
# Perforce File Type Mapping Specifications.
#
#  TypeMap:\ta list of filetype mappings; one per line.
#
# See 'p4 help typemap' for more information.

TypeMap:
\ttext //....txt
\tbinary+F //....zip ## already compressed
\tbinary+l //depot/art/....psd
\tbinary+S2 //depot/build/...
";

const GAME_TEMPLATE: &str = "\
# Name: Game assets
# Description: Large binaries with exclusive locking
TypeMap:
    binary+F //....zip
    binary+Fl //depot/art/....psd
    binary+l //....uasset ## editor assets
    text //....ini
";

fn typemap() -> Typemap {
    Typemap::from_rules(parse_typemap_text(SERVER_SPEC))
}

fn tuples(rules: &[Rule]) -> Vec<(&str, &str, Option<&str>)> {
    rules.iter().map(Rule::wire_tuple).collect()
}

#[test]
fn test_matcher_contract() {
    assert!(matches("//depot/foo.txt", "//....txt"));
    assert!(!matches("//depot/foo.bin", "//....txt"));
    assert!(matches("//depot/a/b/c", "//depot/..."));
    assert!(!matches("//depot/a/x", "//depot/*/y"));
    assert!(matches("//depot/a/y", "//depot/*/y"));
    assert!(matches("//depot/v1.c", "//depot/v?.c"));
    assert!(!matches("//depot/v10.c", "//depot/v?.c"));
    assert!(matches("//depot/lib+(x)[1].a", "//depot/lib+(x)[1].a"));
}

#[test]
fn test_text_and_record_forms_agree() {
    let from_text = parse_typemap_text(SERVER_SPEC);
    let from_record = parse_indexed_record([
        ("TypeMap0", "text //....txt"),
        ("TypeMap1", "binary+F //....zip"),
        ("TypeMapComment1", "## already compressed"),
        ("TypeMap2", "binary+l //depot/art/....psd"),
        ("TypeMap3", "binary+S2 //depot/build/..."),
    ]);
    assert_eq!(tuples(&from_text), tuples(&from_record));
}

#[test]
fn test_resolve_picks_highest_order() {
    let mut tm = typemap();
    let opts = MatchOptions::default();
    assert_eq!(tm.resolve("//depot/build/out.zip", &opts).unwrap().filetype, "binary+S2");
    assert_eq!(tm.resolve("//depot/readme.txt", &opts).unwrap().filetype, "text");
    assert!(tm.resolve("//depot/image.png", &opts).is_none());

    let build = tm.find_by_pattern("//depot/build/...").unwrap().id;
    let zip = tm.find_by_pattern("//....zip").unwrap().id;
    tm.swap_order(build, zip).unwrap();
    assert_eq!(tm.resolve("//depot/build/out.zip", &opts).unwrap().filetype, "binary+F");
}

#[test]
fn test_conflicts_follow_order_changes() {
    let mut tm = Typemap::from_rules(parse_typemap_text(
        "text //....txt\nbinary //special/....txt\n",
    ));
    let opts = MatchOptions::default();
    let general = tm.rules()[0].id;
    let special = tm.rules()[1].id;

    let report = detect_conflicts(tm.rules(), &opts);
    assert_eq!(report[&general][0].by_id, special);
    assert_eq!(report[&general][0].kind, ConflictKind::Overridden);
    assert!(!report.contains_key(&special));

    tm.move_down(general).unwrap();
    let report = detect_conflicts(tm.rules(), &opts);
    assert_eq!(report[&special][0].by_id, general);
    assert!(!report.contains_key(&general));
}

#[test]
fn test_template_merge_then_save() {
    let mut tm = typemap();
    let template = parse_template(Some(GAME_TEMPLATE)).unwrap();
    let before = tm.rules().to_vec();

    let report = merge_template(&mut tm, &template);
    assert_eq!((report.added(), report.skipped(), report.conflicts()), (2, 1, 1));
    assert_eq!(report.total(), template.len());

    // Existing rules are untouched, new ones go to the end.
    assert_eq!(&tm.rules()[..before.len()], &before[..]);
    let appended: Vec<_> = tm.rules()[before.len()..]
        .iter()
        .map(|rule| (rule.pattern.as_str(), rule.from_template))
        .collect();
    assert_eq!(
        appended,
        vec![
            ("//depot/art/....psd", true),
            ("//....uasset", true),
            ("//....ini", true),
        ]
    );

    let conflict = report
        .entries
        .iter()
        .find(|entry| matches!(entry.outcome, MergeOutcome::Conflict { .. }))
        .unwrap();
    assert_eq!(conflict.filetype, "binary+Fl");

    let spec = render_spec(tm.rules()).unwrap();
    let reloaded = parse_typemap_text(&spec);
    assert_eq!(tuples(&reloaded), tuples(tm.rules()));
}

#[test]
fn test_merging_twice_only_skips() {
    let mut tm = typemap();
    let template = parse_template(Some(GAME_TEMPLATE)).unwrap();
    merge_template(&mut tm, &template);
    let after_first = tm.len();

    let report = merge_template(&mut tm, &template);
    assert_eq!(report.skipped(), template.len());
    assert_eq!(tm.len(), after_first);
}

#[test]
fn test_editing_session() {
    let mut tm = typemap();
    let id = tm.create(NewRule::new("utf8", "//depot/docs/....md").with_comment("markdown")).id;
    tm.update_filetype(id, "utf8+F").unwrap();
    tm.move_up(id).unwrap();

    let rule = tm.get(id).unwrap();
    assert_eq!(rule.order, 4);
    assert_eq!(rule.wire_tuple(), ("utf8+F", "//depot/docs/....md", Some("markdown")));
    assert!(validate_rules(tm.rules()).iter().all(|err| !err.is_blocking()));

    tm.delete(id).unwrap();
    assert_eq!(tuples(tm.rules()), tuples(&parse_typemap_text(SERVER_SPEC)));
}

#[test]
fn test_save_refuses_unwritable_rule() {
    let mut tm = typemap();
    let id = tm.rules()[1].id;
    tm.update_pattern(id, "//depot/## not a pattern").unwrap();

    let err = render_spec(tm.rules()).unwrap_err();
    assert!(matches!(
        err,
        TypemapError::Invalid(ValidationError::PatternContainsCommentMarker { order: 2, .. })
    ));
}

#[test]
fn test_reload_replaces_state() {
    let mut tm = typemap();
    tm.create(NewRule::new("text", "//depot/....log"));
    tm.replace_all(parse_typemap_text(SERVER_SPEC));
    assert_eq!(tm.len(), 4);
    assert_eq!(
        tm.rules().iter().map(|rule| rule.order).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
}
