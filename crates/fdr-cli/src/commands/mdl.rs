use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fdr_cli::{MdlCommands, RunFormat};
use fdr_core::{ObjectTree, RecordKind};
use fdr_io::mdl;
use tabwriter::TabWriter;

pub fn handle(command: &MdlCommands) -> Result<()> {
    match command {
        MdlCommands::Fmt { input, out } => {
            let tree = parse_file(input)?;
            emit(&tree, out.as_deref())
        }
        MdlCommands::Deembed { input, out } => {
            let tree = mdl::read_file(input)?;
            emit(&tree, out.as_deref())
        }
        MdlCommands::Stats { input, format } => stats(input, *format),
    }
}

fn parse_file(path: &Path) -> Result<ObjectTree> {
    let text = fs::read_to_string(path).with_context(|| format!("reading MDL file {}", path.display()))?;
    mdl::parse(&text).with_context(|| format!("parsing {}", path.display()))
}

fn emit(tree: &ObjectTree, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            mdl::write_file(tree, path)?;
            println!("Wrote {} records to {}", tree.len(), path.display());
        }
        None => print!("{}", mdl::print(tree)?),
    }
    Ok(())
}

fn kind_label(kind: &RecordKind) -> String {
    match kind {
        RecordKind::Object { kind } => kind.clone(),
        RecordKind::Embedded { kind, .. } => format!("{kind} (embedded)"),
        RecordKind::Module { .. } => "module".into(),
        RecordKind::Clock => "clock".into(),
        RecordKind::Class { .. } => "class".into(),
        RecordKind::Schedule { .. } => "schedule".into(),
        RecordKind::Directive { kind, .. } => kind.clone(),
    }
}

fn stats(input: &Path, format: RunFormat) -> Result<()> {
    let tree = mdl::read_file(input)?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (_, record) in tree.iter() {
        *counts.entry(kind_label(&record.kind)).or_insert(0) += 1;
    }
    match format {
        RunFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), &counts)?;
            println!();
        }
        RunFormat::Plain => {
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "KIND\tCOUNT")?;
            for (kind, count) in &counts {
                writeln!(writer, "{kind}\t{count}")?;
            }
            writeln!(writer, "total\t{}", tree.len())?;
            writer.flush()?;
        }
    }
    Ok(())
}
