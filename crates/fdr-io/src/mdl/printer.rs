//! [`ObjectTree`] → MDL text.

use std::fmt::Write as _;

use fdr_core::{FdrError, FdrResult, ObjectTree, Record, RecordKind};

/// Longest `name`/`parent` value the simulator accepts.
pub const MAX_NAME_LEN: usize = 62;

/// Attributes printed first in a clock block.
const CLOCK_ORDER: [&str; 3] = ["timezone", "starttime", "stoptime"];

/// Print every top-level record in key order.
pub fn print(tree: &ObjectTree) -> FdrResult<String> {
    let mut out = String::new();
    for (_, record) in tree.iter() {
        print_record(&mut out, record, 0)?;
    }
    Ok(out)
}

fn print_record(out: &mut String, record: &Record, depth: usize) -> FdrResult<()> {
    let indent = "\t".repeat(depth);
    let header = match &record.kind {
        RecordKind::Directive { kind, argument } => {
            check_value(kind, argument)?;
            let sep = if argument.is_empty() { "" } else { " " };
            if kind.starts_with('#') {
                let _ = writeln!(out, "{indent}{kind}{sep}{argument}");
            } else {
                let _ = writeln!(out, "{indent}{kind}{sep}{argument};");
            }
            return Ok(());
        }
        RecordKind::Schedule { name, body } => {
            check_schedule_body(name, body)?;
            let _ = writeln!(out, "{indent}schedule {name} {{");
            for line in body.lines() {
                let _ = writeln!(out, "{indent}\t{line}");
            }
            let _ = writeln!(out, "{indent}}};");
            return Ok(());
        }
        RecordKind::Object { kind } => format!("object {kind}"),
        RecordKind::Module { name } => format!("module {name}"),
        RecordKind::Clock => "clock".to_string(),
        RecordKind::Class { name } => format!("class {name}"),
        RecordKind::Embedded { attribute, kind } => format!("{attribute} object {kind}"),
    };
    let _ = writeln!(out, "{indent}{header} {{");

    let inner = "\t".repeat(depth + 1);
    let mut attrs: Vec<(&str, &str)> = record.attributes().collect();
    if record.kind == RecordKind::Clock {
        attrs.sort_by_key(|(k, _)| CLOCK_ORDER.iter().position(|c| c == k).unwrap_or(CLOCK_ORDER.len()));
    }
    for (key, value) in attrs {
        check_value(key, value)?;
        print_attribute(out, &inner, key, value);
    }
    for (_, child) in &record.children {
        print_record(out, child, depth + 1)?;
    }
    let _ = writeln!(out, "{indent}}};");
    Ok(())
}

fn print_attribute(out: &mut String, indent: &str, key: &str, value: &str) {
    let long = (key == "name" || key == "parent") && value.chars().count() > MAX_NAME_LEN;
    if long {
        let short: String = value.chars().take(MAX_NAME_LEN).collect();
        let _ = writeln!(out, "{indent}{key} {short}; // truncated from {value}");
    } else if value.is_empty() {
        let _ = writeln!(out, "{indent}{key};");
    } else {
        let _ = writeln!(out, "{indent}{key} {value};");
    }
}

/// Schedule bodies are written verbatim; only unbalanced braces would end
/// the block early.
fn check_schedule_body(name: &str, body: &str) -> FdrResult<()> {
    let mut depth = 0i64;
    for c in body.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            break;
        }
    }
    if depth != 0 {
        return Err(FdrError::Validation(format!(
            "schedule '{name}' body has unbalanced braces"
        )));
    }
    Ok(())
}

/// Values that would change the record structure are refused.
fn check_value(key: &str, value: &str) -> FdrResult<()> {
    let plain = super::lexer::strip_macro_refs(value);
    if let Some(c) = key.chars().chain(plain.chars()).find(|c| matches!(c, ';' | '{' | '}')) {
        return Err(FdrError::Validation(format!(
            "attribute '{key}' value '{value}' contains '{c}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn prints_object_block() {
        let tree = parse("object node { name n1; phases ABCN; };").unwrap();
        assert_eq!(
            print(&tree).unwrap(),
            "object node {\n\tname n1;\n\tphases ABCN;\n};\n"
        );
    }

    #[test]
    fn clock_fields_come_first() {
        let mut clock = Record::new(RecordKind::Clock);
        clock.set("stoptime", "'2013-08-01 00:00:00'");
        clock.set("timezone", "PST+8PDT");
        let tree: ObjectTree = vec![clock].into_iter().collect();
        let text = print(&tree).unwrap();
        assert!(text.starts_with("clock {\n\ttimezone PST+8PDT;\n\tstoptime"));
    }

    #[test]
    fn macros_have_no_semicolon() {
        let tree: ObjectTree = vec![
            Record::directive("#include", "\"schedules.glm\""),
            Record::directive("module", "tape"),
        ]
        .into_iter()
        .collect();
        assert_eq!(print(&tree).unwrap(), "#include \"schedules.glm\"\nmodule tape;\n");
    }

    #[test]
    fn long_names_are_truncated_with_marker() {
        let long = "x".repeat(70);
        let tree: ObjectTree = vec![Record::object("node").with("name", long.as_str())]
            .into_iter()
            .collect();
        let text = print(&tree).unwrap();
        assert!(text.contains(&format!("\tname {}; // truncated from {}", "x".repeat(62), long)));
        // The marker is a comment, so the file still parses.
        let back = parse(&text).unwrap();
        assert_eq!(back.get(0).unwrap().name().map(str::len), Some(62));
    }

    #[test]
    fn schedule_bodies_round_trip() {
        let source = "schedule s1 {\n    * 0-5 * * * 0.5;\n    * 6-23 * * * 1.0;\n}\nobject node { name n1; };\n";
        let tree = parse(source).unwrap();
        let text = print(&tree).unwrap();
        assert!(text.starts_with("schedule s1 {\n\t* 0-5 * * * 0.5;\n\t* 6-23 * * * 1.0;\n};\n"));
        assert_eq!(parse(&text).unwrap(), tree);
    }

    #[test]
    fn refuses_unbalanced_schedule_body() {
        let tree: ObjectTree = vec![Record::new(RecordKind::Schedule {
            name: "s1".into(),
            body: "* * * * * 1.0; }".into(),
        })]
        .into_iter()
        .collect();
        assert!(matches!(print(&tree), Err(FdrError::Validation(_))));
    }

    #[test]
    fn refuses_structural_characters() {
        let tree: ObjectTree = vec![Record::object("node").with("name", "a;b")]
            .into_iter()
            .collect();
        assert!(matches!(print(&tree), Err(FdrError::Validation(_))));
    }
}
