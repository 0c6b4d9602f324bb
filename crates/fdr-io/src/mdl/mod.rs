//! MDL (GridLAB-D model) reading and writing.
//!
//! ```
//! use fdr_io::mdl;
//!
//! let tree = mdl::parse("object node { name n1; phases ABCN; };").unwrap();
//! let text = mdl::print(&tree).unwrap();
//! assert_eq!(mdl::parse(&text).unwrap(), tree);
//! ```

mod deembed;
mod lexer;
mod parser;
mod printer;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use fdr_core::ObjectTree;

pub use deembed::deembed;
pub use lexer::{strip_comments, tokenize, Token};
pub use parser::parse;
pub use printer::{print, MAX_NAME_LEN};

/// Read, parse and flatten an MDL file.
pub fn read_file(path: &Path) -> Result<ObjectTree> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading MDL file {}", path.display()))?;
    let mut tree = parse(&text).with_context(|| format!("parsing {}", path.display()))?;
    deembed(&mut tree);
    Ok(tree)
}

/// Print a tree and write it to `path`, creating parent directories.
pub fn write_file(tree: &ObjectTree, path: &Path) -> Result<()> {
    let text = print(tree).with_context(|| format!("printing {}", path.display()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("writing MDL file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEEDER: &str = r#"
// header
#set minimum_timestep=60
#include "appliance_schedules.glm"
clock {
    timezone PST+8PDT;
    starttime '2013-07-31 00:00:00';
    stoptime '2013-08-02 00:00:00';
}
module powerflow {
    solver_method NR;
    NR_iteration_limit 50;
};
class player {
    double value;
};
schedule residential_skew {
    * * * * * 1.0
}
object meter {
    name network_node;
    bustype SWING;
    phases ABCN;
    nominal_voltage 7200;
};
object overhead_line {
    name l1;
    from network_node;
    to n2;
    length 120;
    configuration object line_configuration {
        conductor_A olc_a;
        spacing ls1;
    };
};
"#;

    #[test]
    fn round_trip_preserves_tree() {
        let first = parse(FEEDER).unwrap();
        let again = parse(&print(&first).unwrap()).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn file_helpers_flatten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/feeder.glm");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, FEEDER).unwrap();
        let tree = read_file(&path).unwrap();
        assert!(tree.is_flat());
        assert_eq!(
            tree.by_name("l1").and_then(|r| r.get("configuration")),
            Some("l1line_configuration8")
        );

        let out = dir.path().join("out/flat.glm");
        write_file(&tree, &out).unwrap();
        assert_eq!(read_file(&out).unwrap(), tree);
    }
}
