use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, warn};
use phylotree::tree::Tree;

use crate::error::{Error, Result};
use crate::rogue::RogueReport;

/// Strip BEAST annotations from Newick strings.
///
/// BEAST format includes annotations like :[&rate=0.123]2.45 where 2.45 is the actual branch length.
/// This function removes the [&...] annotations while preserving the branch lengths.
fn strip_beast_annotations(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut in_annotation = false;
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '[' && chars.peek() == Some(&'&') {
            in_annotation = true;
        } else if ch == ']' && in_annotation {
            in_annotation = false;
        } else if !in_annotation {
            result.push(ch);
        }
    }

    result
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a tree collection, either a NEXUS/BEAST `.trees` file or one Newick tree per line.
///
/// Burn-in drops the first `burnin_trees` trees, or keeps only trees with
/// `STATE_ > burnin_states` (NEXUS only); zero disables either filter. With
/// `use_real_taxa`, leaf ids of a NEXUS file are renamed through its TRANSLATE
/// block. Trees that fail to parse are skipped with a warning.
///
/// Returns `(tree name, tree)` pairs in file order.
pub fn read_trees<P: AsRef<Path>>(
    path: P,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> Result<Vec<(String, Tree)>> {
    let path = path.as_ref();
    let content = read_to_string(path)?;

    let base_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches(".trees"))
        .unwrap_or("unknown");

    let is_nexus = content.trim_start().to_ascii_uppercase().starts_with("#NEXUS");
    let blocks = if is_nexus {
        collect_tree_blocks(&content)
    } else {
        collect_newick_lines(&content)
    };
    let translate = if is_nexus && use_real_taxa {
        parse_taxon_block(&content)
    } else {
        HashMap::new()
    };
    debug!("{} tree blocks in {path:?}", blocks.len());

    let trees = blocks
        .into_iter()
        .enumerate()
        .map(|(idx, block)| {
            let state = extract_state(block.header);
            (idx, block, state)
        })
        .filter(|(idx, _block, state)| {
            (burnin_trees == 0 && burnin_states == 0)
                || (burnin_trees > 0 && *idx >= burnin_trees)
                || (burnin_states > 0 && *state > burnin_states)
        })
        .filter_map(|(idx, block, state)| {
            let newick = strip_beast_annotations(&block.body);
            let mut tree = match Tree::from_newick(newick.trim()) {
                Ok(t) => t,
                Err(e) => {
                    warn!("skipping tree {idx} of {path:?}: {e}");
                    return None;
                }
            };
            if !translate.is_empty() {
                rename_leaf_nodes(&mut tree, &translate);
            }
            let name = if is_nexus {
                format!("{base_name}_tree_STATE{state}")
            } else {
                format!("{base_name}_tree{idx}")
            };
            Some((name, tree))
        })
        .collect();

    Ok(trees)
}

/// Reads taxon names, one per line. Blank lines and `#` comments are ignored.
pub fn read_taxon_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = read_to_string(path.as_ref())?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn extract_state(header: &str) -> usize {
    if let Some(start) = header.to_ascii_uppercase().find("STATE_") {
        let rest = &header[start + "STATE_".len()..];
        let state = rest
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        if let Ok(num) = state.parse::<usize>() {
            return num;
        }
    }
    0
}

struct TreeBlock<'a> {
    header: &'a str,
    body: String,
}

fn collect_tree_blocks(content: &str) -> Vec<TreeBlock<'_>> {
    content
        .lines()
        .skip_while(|line| !line.trim_start().to_ascii_uppercase().starts_with("TREE "))
        .take_while(|line| !line.trim().to_ascii_uppercase().starts_with("END;"))
        .filter_map(|line| {
            let (header, body) = split_tree_line(line)?;
            Some(TreeBlock {
                header: header.trim(),
                body: body.trim().to_string(),
            })
        })
        .collect()
}

/// Splits `tree NAME [&...] = BODY` at the first `=` outside square brackets.
fn split_tree_line(line: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (pos, ch) in line.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return Some((&line[..pos], &line[pos + 1..])),
            _ => {}
        }
    }
    None
}

fn collect_newick_lines(content: &str) -> Vec<TreeBlock<'_>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| TreeBlock {
            header: "",
            body: line.to_string(),
        })
        .collect()
}

fn parse_taxon_block(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TRANSLATE"))
        .skip(1)
        .take_while(|line| !line.trim().starts_with(';'))
        // 1 '1959.M.CD.59.ZR59',
        .filter_map(|line| {
            let line = line.trim().trim_end_matches([',', ';']);
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let label = parts.next()?.trim_matches('\'').to_string();
            Some((id, label))
        })
        .collect()
}

fn rename_leaf_nodes(tree: &mut Tree, translate: &HashMap<String, String>) {
    for leaf_id in tree.get_leaves() {
        if let Ok(node) = tree.get_mut(&leaf_id) {
            if let Some(label) = node.name.as_ref().and_then(|n| translate.get(n)) {
                node.name = Some(label.clone());
            }
        }
    }
}

/// Write the rounds of a rogue search as TSV.
/// If `path` ends with `.gz`, the output is gzip-compressed.
pub fn write_rounds_tsv<P: AsRef<Path>>(path: P, report: &RogueReport) -> Result<()> {
    let path = path.as_ref();
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut out: Box<dyn Write> = if path.to_string_lossy().ends_with(".gz") {
        Box::new(BufWriter::new(GzEncoder::new(file, Compression::default())))
    } else {
        Box::new(BufWriter::new(file))
    };

    write_rounds(&mut out, report).map_err(io_err)?;
    out.flush().map_err(io_err)
}

fn write_rounds(out: &mut dyn Write, report: &RogueReport) -> std::io::Result<()> {
    writeln!(out, "round\ttaxa\timprovement\tscore")?;
    writeln!(out, "0\t-\t0\t{}", report.initial_score)?;
    for round in &report.rounds {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            round.round,
            round.names.join(","),
            round.improvement,
            round.score
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rogue::RoundResult;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::path::PathBuf;
    use test_log::test;

    fn scratch(name: &str, content: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("rogue-dropsets-{}-{name}", std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    fn leaf_names(tree: &Tree) -> Vec<String> {
        let mut names: Vec<String> = tree
            .get_leaves()
            .into_iter()
            .filter_map(|id| tree.get(&id).ok()?.name.clone())
            .collect();
        names.sort();
        names
    }

    const NEXUS: &str = "#NEXUS

Begin trees;
\tTranslate
\t\t1 'alpha',
\t\t2 'beta',
\t\t3 'gamma',
\t\t4 'delta'
\t\t;
tree STATE_0 = ((1:[&rate=0.5]1.0,2:1.0):1.0,(3:1.0,4:1.0):1.0);
tree STATE_1000 = ((1:1.0,3:1.0):1.0,(2:1.0,4:1.0):1.0);
tree STATE_2000 = ((1:1.0,4:1.0):1.0,(2:1.0,3:1.0):1.0);
End;
";

    #[test]
    fn test_strip_beast_annotations() {
        assert_eq!(
            strip_beast_annotations("(A:[&rate=0.1]1.0,B:2.0)[x];"),
            "(A:1.0,B:2.0)[x];"
        );
    }

    #[test]
    fn test_read_nexus_with_burnin_and_translation() {
        let path = scratch("in.trees", NEXUS);

        let all = read_trees(&path, 0, 0, false).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(leaf_names(&all[0].1), ["1", "2", "3", "4"]);

        let by_count = read_trees(&path, 1, 0, true).unwrap();
        assert_eq!(by_count.len(), 2);
        assert!(by_count[0].0.ends_with("_tree_STATE1000"));
        assert_eq!(leaf_names(&by_count[0].1), ["alpha", "beta", "delta", "gamma"]);

        let by_state = read_trees(&path, 0, 1000, true).unwrap();
        assert_eq!(by_state.len(), 1);
        assert!(by_state[0].0.ends_with("_tree_STATE2000"));

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_header_annotations_do_not_split_tree_line() {
        let line = "tree STATE_0 [&lnP=-1234.5,posterior=-1200.0] = [&R] ((A:1,B:1):1,(C:1,D:1):1);";
        let (header, body) = split_tree_line(line).unwrap();
        assert_eq!(header.trim(), "tree STATE_0 [&lnP=-1234.5,posterior=-1200.0]");
        assert_eq!(body.trim(), "[&R] ((A:1,B:1):1,(C:1,D:1):1);");

        let content = format!("#NEXUS\nBegin trees;\n{line}\nEnd;\n");
        let path = scratch("annotated.trees", &content);
        let trees = read_trees(&path, 0, 0, false).unwrap();
        assert_eq!(trees.len(), 1);
        assert!(trees[0].0.ends_with("_tree_STATE0"));
        assert_eq!(leaf_names(&trees[0].1), ["A", "B", "C", "D"]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_read_newick_lines() {
        let path = scratch("lines.nwk", "((A,B),(C,D));\n\n((A,C),(B,D));\n");
        let trees = read_trees(&path, 1, 0, false).unwrap();
        assert_eq!(trees.len(), 1);
        assert!(trees[0].0.ends_with("_tree1"));
        assert_eq!(leaf_names(&trees[0].1), ["A", "B", "C", "D"]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = read_trees("/nonexistent/rogue-dropsets.trees", 0, 0, false).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_read_taxon_list() {
        let path = scratch("taxa.txt", "# keep these\nA\n\n  B  \n");
        assert_eq!(read_taxon_list(&path).unwrap(), ["A", "B"]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_write_rounds_gz() {
        let report = RogueReport {
            taxa: vec!["A".into(), "X".into()],
            num_trees: 3,
            initial_score: 10,
            rounds: vec![RoundResult {
                round: 1,
                taxa: vec![1],
                names: vec!["X".into()],
                improvement: 2,
                score: 12,
            }],
        };
        let path = std::env::temp_dir()
            .join(format!("rogue-dropsets-{}-out.tsv.gz", std::process::id()));
        write_rounds_tsv(&path, &report).unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "round\ttaxa\timprovement\tscore\n0\t-\t0\t10\n1\tX\t2\t12\n");
        fs::remove_file(path).unwrap();
    }
}
