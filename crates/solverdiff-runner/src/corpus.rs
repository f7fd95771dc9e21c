use solverdiff_core::{CorpusSpec, HarnessError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists the corpus files, sorted by path. Only the top level of the
/// directory is scanned unless `recursive` is set.
pub fn discover_corpus(spec: &CorpusSpec) -> Result<Vec<PathBuf>, HarnessError> {
    let mut walker = WalkDir::new(&spec.dir).min_depth(1);
    if !spec.recursive {
        walker = walker.max_depth(1);
    }
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| HarnessError::CorpusUnreadable {
            path: spec.dir.clone(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == spec.extension);
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

pub fn input_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn corpus_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "solverdiff_corpus_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(dir.join("nested")).expect("corpus dir");
        for name in ["b.smt2", "a.smt2", "notes.txt", "c.SMT2", "nested/d.smt2"] {
            fs::write(dir.join(name), "(check-sat)\n").expect("write");
        }
        dir
    }

    #[test]
    fn lists_matching_files_sorted_top_level_only() {
        let dir = corpus_dir();
        let spec = CorpusSpec {
            dir: dir.clone(),
            extension: "smt2".to_string(),
            recursive: false,
        };
        let files = discover_corpus(&spec).expect("discover");
        let names: Vec<String> = files.iter().map(|p| input_id(p)).collect();
        assert_eq!(names, vec!["a.smt2", "b.smt2"]);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn recursive_scan_includes_nested_files() {
        let dir = corpus_dir();
        let spec = CorpusSpec {
            dir: dir.clone(),
            extension: "smt2".to_string(),
            recursive: true,
        };
        let files = discover_corpus(&spec).expect("discover");
        assert_eq!(files.len(), 3);
        assert!(files.contains(&dir.join("nested").join("d.smt2")));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_directory_is_a_setup_error() {
        let spec = CorpusSpec {
            dir: PathBuf::from("/definitely/not/a/corpus"),
            extension: "smt2".to_string(),
            recursive: false,
        };
        assert!(matches!(
            discover_corpus(&spec),
            Err(HarnessError::CorpusUnreadable { .. })
        ));
    }

    #[test]
    fn input_id_is_the_base_name() {
        assert_eq!(input_id(Path::new("/x/y/bench_01.smt2")), "bench_01.smt2");
    }
}
