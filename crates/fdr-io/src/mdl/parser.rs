//! Token stream → [`ObjectTree`].

use fdr_core::{FdrError, FdrResult, ObjectTree, Record, RecordKind};

use super::lexer::{tokenize, Token};

struct Open {
    key: u64,
    record: Record,
}

/// Parse MDL text into a tree. Nested records stay nested; see
/// [`super::deembed`] to flatten them.
pub fn parse(text: &str) -> FdrResult<ObjectTree> {
    let tokens = tokenize(text)?;
    let mut tree = ObjectTree::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut statement: Vec<String> = Vec::new();
    let mut next_key: u64 = 0;

    for (pos, token) in tokens.iter().enumerate() {
        match token {
            Token::Word(w) => statement.push(w.clone()),
            Token::Macro(line) => {
                if !stack.is_empty() || !statement.is_empty() {
                    return Err(FdrError::parse_at(pos, format!("misplaced '{line}'")));
                }
                let (kind, argument) = split_first_word(line);
                tree.insert_at(next_key, Record::directive(kind, argument));
                next_key += 1;
            }
            Token::Schedule { name, body } => {
                if !stack.is_empty() {
                    return Err(FdrError::parse_at(pos, "schedule inside a record"));
                }
                tree.insert_at(
                    next_key,
                    Record::new(RecordKind::Schedule {
                        name: name.clone(),
                        body: body.clone(),
                    }),
                );
                next_key += 1;
                statement.clear();
            }
            Token::Semi => {
                let words = std::mem::take(&mut statement);
                if words.is_empty() {
                    continue;
                }
                match stack.last_mut() {
                    None => {
                        tree.insert_at(next_key, Record::directive(&words[0], words[1..].join(" ")));
                        next_key += 1;
                    }
                    Some(open) => add_attribute(&mut open.record, &words, pos)?,
                }
            }
            Token::Open => {
                let words = std::mem::take(&mut statement);
                let kind = header_kind(&words, !stack.is_empty())
                    .ok_or_else(|| {
                        FdrError::parse_at(pos, format!("unrecognized record header '{}'", words.join(" ")))
                    })?;
                stack.push(Open {
                    key: next_key,
                    record: Record::new(kind),
                });
                next_key += 1;
            }
            Token::Close => {
                let words = std::mem::take(&mut statement);
                let Some(mut open) = stack.pop() else {
                    return Err(FdrError::parse_at(pos, "unmatched '}'"));
                };
                if !words.is_empty() {
                    add_attribute(&mut open.record, &words, pos)?;
                }
                match stack.last_mut() {
                    Some(outer) => outer.record.children.push((open.key, open.record)),
                    None => tree.insert_at(open.key, open.record),
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(FdrError::parse_at(tokens.len(), "unterminated record at end of input"));
    }
    if !statement.is_empty() {
        return Err(FdrError::parse_at(
            tokens.len(),
            format!("statement '{}' runs past end of input", statement.join(" ")),
        ));
    }
    Ok(tree)
}

fn split_first_word(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    }
}

fn add_attribute(record: &mut Record, words: &[String], pos: usize) -> FdrResult<()> {
    record
        .insert_new(words[0].as_str(), words[1..].join(" "))
        .map_err(|e| FdrError::parse_at(pos, e))
}

/// Decide what a `... {` header opens.
fn header_kind(words: &[String], nested: bool) -> Option<RecordKind> {
    let w: Vec<&str> = words.iter().map(String::as_str).collect();
    match (nested, w.as_slice()) {
        (_, ["object", kind]) => Some(RecordKind::object(object_kind(kind))),
        (true, [attribute, "object", kind]) => Some(RecordKind::Embedded {
            attribute: attribute.to_string(),
            kind: object_kind(kind).to_string(),
        }),
        (false, ["module", name]) => Some(RecordKind::Module {
            name: name.to_string(),
        }),
        (false, ["clock"]) => Some(RecordKind::Clock),
        (false, ["class", name]) => Some(RecordKind::Class {
            name: name.to_string(),
        }),
        _ => None,
    }
}

/// `house:12` names an instance id; only the kind is kept.
fn object_kind(word: &str) -> &str {
    word.split(':').next().unwrap_or(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object() {
        let tree = parse("object node { name n1; phases ABCN; };").unwrap();
        assert_eq!(tree.len(), 1);
        let rec = tree.get(0).unwrap();
        assert!(rec.is_object("node"));
        let attrs: Vec<_> = rec.attributes().collect();
        assert_eq!(attrs, vec![("name", "n1"), ("phases", "ABCN")]);
    }

    #[test]
    fn directives_modules_and_clock() {
        let text = "#set relax_naming_rules=1\nmodule tape;\nmodule powerflow {\n solver_method NR;\n}\nclock {\n timezone PST+8PDT;\n starttime '2013-07-31 00:00:00';\n}";
        let tree = parse(text).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(
            tree.get(0).unwrap().kind,
            RecordKind::Directive {
                kind: "#set".into(),
                argument: "relax_naming_rules=1".into()
            }
        );
        assert_eq!(
            tree.get(1).unwrap().kind,
            RecordKind::Directive {
                kind: "module".into(),
                argument: "tape".into()
            }
        );
        assert_eq!(tree.get(3).unwrap().get("starttime"), Some("'2013-07-31 00:00:00'"));
    }

    #[test]
    fn nested_and_embedded_records_keep_their_keys() {
        let text = "object transformer {\n name t1;\n configuration object transformer_configuration {\n  connect_type SINGLE_PHASE_CENTER_TAPPED;\n };\n object meter { phases AS; };\n};";
        let tree = parse(text).unwrap();
        let t1 = tree.get(0).unwrap();
        assert_eq!(t1.children.len(), 2);
        assert_eq!(t1.children[0].0, 1);
        assert_eq!(
            t1.children[0].1.kind,
            RecordKind::Embedded {
                attribute: "configuration".into(),
                kind: "transformer_configuration".into()
            }
        );
        assert!(t1.children[1].1.is_object("meter"));
    }

    #[test]
    fn trailing_attribute_before_close_is_kept() {
        let tree = parse("object node { name n1; phases AN }").unwrap();
        assert_eq!(tree.get(0).unwrap().get("phases"), Some("AN"));
    }

    #[test]
    fn errors_name_token_position() {
        let err = parse("object node { name n1; }; }").unwrap_err();
        assert!(err.to_string().contains("unmatched '}'"));
        assert!(err.to_string().contains("token 8"));

        let err = parse("object node { name n1;").unwrap_err();
        assert!(err.to_string().contains("unterminated record"));

        let err = parse("object node { name a; name b; };").unwrap_err();
        assert!(err.to_string().contains("duplicate attribute"));

        assert!(parse("wobble wobble {").is_err());
    }
}
