//! Mapping file persistence
//!
//! The mapping file holds one note per line: `<note> <key1> [key2 ...]`,
//! whitespace separated. Malformed lines are skipped with a warning instead
//! of failing the whole load.

use super::{KeyCode, KeyCombo, MappingTable, Note, MAX_NOTE};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Error for a single mapping file line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("empty line")]
    Empty,

    #[error("note {0} has no keys")]
    MissingKeys(Note),

    #[error("invalid note number: {0}")]
    InvalidNote(String),

    #[error("invalid key code: {0}")]
    InvalidKey(String),
}

/// Error type for mapping file operations
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Failed to read mapping file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write mapping file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MappingError {
    /// True when the file simply does not exist yet
    pub fn is_not_found(&self) -> bool {
        match self {
            MappingError::Read { source, .. } | MappingError::Write { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
        }
    }
}

/// Outcome of a successful load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of notes in the loaded table
    pub entries: usize,
    /// Skipped lines as (1-based line number, reason)
    pub skipped: Vec<(usize, LineError)>,
}

/// Result of the last save, kept for the next status screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveResult {
    #[default]
    NotCalled,
    Ok,
    Nok,
}

/// Result of the startup load, shown on the mode menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded { entries: usize, skipped: usize },
    NotFound,
    Failed,
}

impl LoadStatus {
    pub fn from_result(result: &Result<LoadReport, MappingError>) -> Self {
        match result {
            Ok(report) => LoadStatus::Loaded {
                entries: report.entries,
                skipped: report.skipped.len(),
            },
            Err(e) if e.is_not_found() => LoadStatus::NotFound,
            Err(_) => LoadStatus::Failed,
        }
    }
}

/// In-memory mapping table bound to its file on disk
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
    table: MappingTable,
}

impl MappingStore {
    /// Create a store with an empty table. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: MappingTable::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Replace the whole table
    pub fn replace(&mut self, table: MappingTable) {
        self.table = table;
    }

    /// Load the mapping file, replacing the table on success.
    ///
    /// If the file cannot be read the table is left untouched.
    pub async fn load(&mut self) -> Result<LoadReport, MappingError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| MappingError::Read {
                path: self.path.clone(),
                source,
            })?;

        let (table, skipped) = parse_table(&text);
        for (line_no, err) in &skipped {
            warn!(
                "Skipping line {} of {}: {}",
                line_no,
                self.path.display(),
                err
            );
        }

        self.table = table;
        info!(
            "Loaded {} mappings from {}",
            self.table.len(),
            self.path.display()
        );

        Ok(LoadReport {
            entries: self.table.len(),
            skipped,
        })
    }

    /// Write the table to disk. Notes with empty combos are not written.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the target.
    pub async fn save(&self) -> Result<(), MappingError> {
        let contents = render_table(&self.table);
        let path = self.path.clone();

        let result = tokio::task::spawn_blocking(move || write_atomic(&path, &contents))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)));

        result.map_err(|source| MappingError::Write {
            path: self.path.clone(),
            source,
        })?;

        info!("Saved {} mappings to {}", self.table.len(), self.path.display());
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Parse a single mapping line
pub fn parse_line(line: &str) -> Result<(Note, KeyCombo), LineError> {
    let mut tokens = line.split_whitespace();

    let note_token = tokens.next().ok_or(LineError::Empty)?;
    let note = note_token
        .parse::<Note>()
        .ok()
        .filter(|note| *note <= MAX_NOTE)
        .ok_or_else(|| LineError::InvalidNote(note_token.to_string()))?;

    let mut combo = KeyCombo::new();
    for token in tokens {
        let key = token
            .parse::<KeyCode>()
            .map_err(|_| LineError::InvalidKey(token.to_string()))?;
        combo.push_unique(key);
    }

    if combo.is_empty() {
        return Err(LineError::MissingKeys(note));
    }

    Ok((note, combo))
}

/// Parse a whole mapping file.
///
/// Lines for a note that already appeared are merged into its combo.
pub fn parse_table(text: &str) -> (MappingTable, Vec<(usize, LineError)>) {
    let mut table = MappingTable::new();
    let mut skipped = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok((note, combo)) => {
                let existing = table.combo_mut(note);
                if !existing.is_empty() {
                    debug!("Merging repeated entry for note {}", note);
                }
                for key in combo.iter() {
                    existing.push_unique(key);
                }
            }
            Err(err) => skipped.push((idx + 1, err)),
        }
    }

    (table, skipped)
}

/// Render a table in mapping file format, one newline-terminated line per note
pub fn render_table(table: &MappingTable) -> String {
    let mut out = String::new();
    for (note, combo) in table.iter().filter(|(_, combo)| !combo.is_empty()) {
        out.push_str(&note.to_string());
        for key in combo.iter() {
            out.push(' ');
            out.push_str(&key.to_string());
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn combo(keys: &[KeyCode]) -> KeyCombo {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("60 65"), Ok((60, combo(&[65]))));
        assert_eq!(parse_line("  61\t66 67 "), Ok((61, combo(&[66, 67]))));
        assert_eq!(parse_line("62 65 65 66"), Ok((62, combo(&[65, 66]))));
    }

    #[test]
    fn test_parse_line_errors() {
        assert_eq!(parse_line(""), Err(LineError::Empty));
        assert_eq!(parse_line("   "), Err(LineError::Empty));
        assert_eq!(parse_line("60"), Err(LineError::MissingKeys(60)));
        assert_eq!(
            parse_line("abc 65"),
            Err(LineError::InvalidNote("abc".to_string()))
        );
        assert_eq!(
            parse_line("128 65"),
            Err(LineError::InvalidNote("128".to_string()))
        );
        assert_eq!(
            parse_line("60 x"),
            Err(LineError::InvalidKey("x".to_string()))
        );
        assert_eq!(
            parse_line("60 70000"),
            Err(LineError::InvalidKey("70000".to_string()))
        );
    }

    #[test]
    fn test_parse_table_skips_bad_lines() {
        let text = "60 65\nbogus\n61 66 67\n\n62 -1\n";
        let (table, skipped) = parse_table(text);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(61), Some(&combo(&[66, 67])));
        let lines: Vec<usize> = skipped.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![2, 4, 5]);
    }

    #[test]
    fn test_parse_table_merges_repeated_notes() {
        let (table, skipped) = parse_table("60 65\n60 66 65\n");
        assert!(skipped.is_empty());
        assert_eq!(table.get(60), Some(&combo(&[65, 66])));
    }

    #[test]
    fn test_render_skips_empty_combos() {
        let mut table = MappingTable::new();
        table.insert(61, combo(&[66, 67]));
        table.insert(60, combo(&[65]));
        table.insert(62, KeyCombo::new());

        assert_eq!(render_table(&table), "60 65\n61 66 67\n");
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mapping.txt");

        let mut store = MappingStore::new(&path);
        store.replace(
            [(60, combo(&[65])), (61, combo(&[66, 67]))]
                .into_iter()
                .collect(),
        );
        store.save().await.unwrap();
        assert_eq!(store.path(), path.as_path());

        let mut loaded = MappingStore::new(&path);
        let report = loaded.load().await.unwrap();

        assert_eq!(report.entries, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(loaded.table(), store.table());
    }

    #[tokio::test]
    async fn test_load_missing_file_keeps_table() {
        let dir = tempdir().unwrap();
        let mut store = MappingStore::new(dir.path().join("absent.txt"));
        store.replace([(60, combo(&[65]))].into_iter().collect());

        let result = store.load().await;
        assert!(result.as_ref().unwrap_err().is_not_found());
        assert_eq!(LoadStatus::from_result(&result), LoadStatus::NotFound);
        assert_eq!(store.table().len(), 1);
    }

    #[tokio::test]
    async fn test_load_replaces_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mapping.txt");
        std::fs::write(&path, "70 80\n").unwrap();

        let mut store = MappingStore::new(&path);
        store.replace([(60, combo(&[65]))].into_iter().collect());
        store.load().await.unwrap();

        assert!(store.table().get(60).is_none());
        assert_eq!(store.table().get(70), Some(&combo(&[80])));
    }

    #[tokio::test]
    async fn test_save_to_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let store = MappingStore::new(dir.path().join("nope").join("mapping.txt"));

        let err = store.save().await.unwrap_err();
        assert!(matches!(err, MappingError::Write { .. }));
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mapping.txt");
        std::fs::write(&path, "1 2\n3 4\n5 6\n").unwrap();

        let mut store = MappingStore::new(&path);
        store.replace([(60, combo(&[65]))].into_iter().collect());
        store.save().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "60 65\n");
    }

    fn arb_table() -> impl Strategy<Value = MappingTable> {
        prop::collection::btree_map(
            0u8..=MAX_NOTE,
            prop::collection::vec(any::<KeyCode>(), 1..6),
            0..20,
        )
        .prop_map(|entries| {
            entries
                .into_iter()
                .map(|(note, keys)| (note, keys.into_iter().collect::<KeyCombo>()))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_render_parse_roundtrip(table in arb_table()) {
            let (parsed, skipped) = parse_table(&render_table(&table));
            prop_assert!(skipped.is_empty());
            prop_assert_eq!(parsed, table);
        }
    }
}
