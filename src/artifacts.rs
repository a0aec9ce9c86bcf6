//! Training log and inspectable artifacts.
//!
//! Artifacts live under `artifacts/` and are the contract with downstream
//! clients: `00_meta.json`, `01_vocabulary.csv`, `02_model_weights.csv`,
//! `03_token_embeddings.csv` and the binary `04_model_weights.bin`.

use crate::checkpoint::write_checkpoint;
use crate::config::{
    CHECKPOINT_FILE, CONTEXT_SIZE, EMBEDDINGS_FILE, MODEL_KIND, ProjectPaths, REPO_NAME,
    TrainConfig, VOCAB_FILE, WEIGHTS_FILE,
};
use crate::error::{Result, ToyGptError};
use crate::model::SimpleNextTokenModel;
use crate::train::EpochMetrics;
use crate::vocab::Vocabulary;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// File names of the artifact set, as recorded in the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFiles {
    pub vocabulary: String,
    pub weights: String,
    pub embeddings: String,
    pub checkpoint: String,
}

impl Default for ArtifactFiles {
    fn default() -> Self {
        ArtifactFiles {
            vocabulary: VOCAB_FILE.into(),
            weights: WEIGHTS_FILE.into(),
            embeddings: EMBEDDINGS_FILE.into(),
            checkpoint: CHECKPOINT_FILE.into(),
        }
    }
}

/// Contents of `00_meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub repo_name: String,
    pub model_kind: String,
    pub context_size: usize,
    pub corpus_file: String,
    pub token_count: usize,
    pub vocab_size: usize,
    pub training_pairs: usize,
    pub learning_rate: f32,
    pub epochs: usize,
    /// Metrics of the last epoch; absent when nothing was trained
    pub final_avg_loss: Option<f64>,
    pub final_accuracy: Option<f64>,
    /// `[rows, cols]` of the flattened weight table
    pub weights_shape: [usize; 2],
    pub files: ArtifactFiles,
    pub generator: String,
}

impl ArtifactMeta {
    pub fn for_run(
        corpus: &Path,
        vocab: &Vocabulary,
        config: &TrainConfig,
        history: &[EpochMetrics],
        token_count: usize,
        training_pairs: usize,
    ) -> Self {
        let v = vocab.vocab_size();
        let last = history.last();
        ArtifactMeta {
            repo_name: REPO_NAME.into(),
            model_kind: MODEL_KIND.into(),
            context_size: CONTEXT_SIZE,
            corpus_file: corpus
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            token_count,
            vocab_size: v,
            training_pairs,
            learning_rate: config.learning_rate,
            epochs: config.epochs,
            final_avg_loss: last.map(|m| m.avg_loss),
            final_accuracy: last.map(|m| m.accuracy),
            weights_shape: [v * v, v],
            files: ArtifactFiles::default(),
            generator: format!("toy-gpt-rs {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Label for weight row `r`: `"prev|curr"`.
///
/// A `|` or `\` inside a token is backslash-escaped so the label splits
/// unambiguously on the one unescaped `|`.
pub fn row_labeler_context2(vocab: &Vocabulary) -> impl Fn(usize) -> String + '_ {
    let v = vocab.vocab_size();
    move |row| {
        let prev = escape_label_token(vocab.id_token(row / v).unwrap_or("?"));
        let curr = escape_label_token(vocab.id_token(row % v).unwrap_or("?"));
        format!("{prev}|{curr}")
    }
}

fn escape_label_token(token: &str) -> String {
    token.replace('\\', "\\\\").replace('|', "\\|")
}

/// Write `epoch,avg_loss,accuracy` rows.
pub fn write_training_log<P: AsRef<Path>>(path: P, history: &[EpochMetrics]) -> Result<()> {
    let mut out = String::from("epoch,avg_loss,accuracy\n");
    for m in history {
        let _ = writeln!(out, "{},{:.6},{:.6}", m.epoch, m.avg_loss, m.accuracy);
    }
    write_file(path.as_ref(), &out)?;
    tracing::info!("Wrote training log: {}", path.as_ref().display());
    Ok(())
}

/// Write the full artifact set under `paths.artifacts_dir`.
pub fn write_artifacts<F>(
    paths: &ProjectPaths,
    vocab: &Vocabulary,
    model: &SimpleNextTokenModel,
    meta: &ArtifactMeta,
    row_labeler: F,
) -> Result<()>
where
    F: Fn(usize) -> String + Sync,
{
    if vocab.vocab_size() != model.vocab_size() {
        return Err(ToyGptError::InvalidArtifact(format!(
            "vocabulary has {} tokens but model expects {}",
            vocab.vocab_size(),
            model.vocab_size()
        )));
    }

    write_file(&paths.meta_path(), &serde_json::to_string_pretty(meta)?)?;

    let mut out = String::from("token_id,token,frequency\n");
    for (id, tok, freq) in vocab.iter() {
        let _ = writeln!(out, "{},{},{}", id, quote_field(tok), freq);
    }
    write_file(&paths.vocab_path(), &out)?;

    write_file(&paths.weights_path(), &weights_csv(vocab, model, &row_labeler))?;

    let mut out = String::from("token_id,token,dim_0,dim_1\n");
    for (id, point) in model.token_projection().iter().enumerate() {
        let tok = vocab.id_token(id).unwrap_or_default();
        let _ = writeln!(out, "{},{},{},{}", id, quote_field(tok), point[0], point[1]);
    }
    write_file(&paths.embeddings_path(), &out)?;

    write_checkpoint(paths.checkpoint_path(), model)?;

    tracing::info!(
        "Wrote artifacts to {} ({} weight rows)",
        paths.artifacts_dir.display(),
        model.num_rows()
    );
    Ok(())
}

fn weights_csv<F>(vocab: &Vocabulary, model: &SimpleNextTokenModel, row_labeler: &F) -> String
where
    F: Fn(usize) -> String + Sync,
{
    let v = model.vocab_size();
    let mut out = String::from("context");
    for (_, tok, _) in vocab.iter() {
        out.push(',');
        out.push_str(&quote_field(tok));
    }
    out.push('\n');

    // Shortest round-trip float formatting keeps reloads exact.
    let rows: Vec<String> = (0..model.num_rows())
        .into_par_iter()
        .map(|r| {
            let mut line = quote_field(&row_labeler(r));
            for w in &model.weights()[r * v..(r + 1) * v] {
                let _ = write!(line, ",{w}");
            }
            line.push('\n');
            line
        })
        .collect();
    for row in rows {
        out.push_str(&row);
    }
    out
}

/// Fail with a hint for the first artifact that does not exist.
pub fn require_artifacts<P: AsRef<Path>>(paths: &[P], hint: &str) -> Result<()> {
    for path in paths {
        if !path.as_ref().is_file() {
            return Err(ToyGptError::MissingArtifact {
                path: path.as_ref().to_path_buf(),
                hint: hint.to_string(),
            });
        }
    }
    Ok(())
}

pub fn load_meta<P: AsRef<Path>>(path: P) -> Result<ArtifactMeta> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Rebuild the vocabulary from `01_vocabulary.csv`.
pub fn load_vocabulary_csv<P: AsRef<Path>>(path: P) -> Result<Vocabulary> {
    let records = parse_csv(&fs::read_to_string(path)?)?;
    let mut rows = records.into_iter();
    match rows.next() {
        Some(header) if header == ["token_id", "token", "frequency"] => {}
        _ => {
            return Err(ToyGptError::InvalidArtifact(
                "vocabulary header must be token_id,token,frequency".into(),
            ));
        }
    }

    let mut entries = Vec::new();
    for (line, row) in rows.enumerate() {
        let [id, tok, freq]: [String; 3] = row.try_into().map_err(|r: Vec<String>| {
            ToyGptError::InvalidArtifact(format!(
                "vocabulary row {} has {} fields, expected 3",
                line + 1,
                r.len()
            ))
        })?;
        entries.push((parse_number(&id, "token_id")?, tok, parse_number(&freq, "frequency")?));
    }
    Vocabulary::from_entries(entries)
}

/// Read the flattened weight table from `02_model_weights.csv`.
///
/// The header must be `context` followed by the vocabulary tokens in id order.
pub fn load_model_weights_csv<P: AsRef<Path>>(
    path: P,
    vocab: &Vocabulary,
    expected_rows: usize,
) -> Result<Vec<f32>> {
    let vocab_size = vocab.vocab_size();
    let records = parse_csv(&fs::read_to_string(path)?)?;
    let mut rows = records.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| ToyGptError::InvalidArtifact("weights file is empty".into()))?;
    if header.len() != vocab_size + 1 {
        return Err(ToyGptError::InvalidArtifact(format!(
            "weights header has {} columns, expected {}",
            header.len(),
            vocab_size + 1
        )));
    }
    if header[0] != "context" {
        return Err(ToyGptError::InvalidArtifact(format!(
            "weights header must start with \"context\", found {:?}",
            header[0]
        )));
    }
    for ((id, tok, _), column) in vocab.iter().zip(&header[1..]) {
        if tok != column.as_str() {
            return Err(ToyGptError::InvalidArtifact(format!(
                "weights column {} is {column:?}, vocabulary token {id} is {tok:?}",
                id + 1
            )));
        }
    }

    let mut weights = Vec::with_capacity(expected_rows.saturating_mul(vocab_size));
    let mut count = 0usize;
    for row in rows {
        count += 1;
        if row.len() != vocab_size + 1 {
            return Err(ToyGptError::InvalidArtifact(format!(
                "weights row {count} has {} columns, expected {}",
                row.len(),
                vocab_size + 1
            )));
        }
        for cell in &row[1..] {
            weights.push(parse_number::<f32>(cell, "weight")?);
        }
    }

    if count != expected_rows {
        return Err(ToyGptError::InvalidArtifact(format!(
            "weights file has {count} rows, expected {expected_rows}"
        )));
    }
    Ok(weights)
}

fn parse_number<T: std::str::FromStr>(field: &str, what: &str) -> Result<T> {
    field
        .trim()
        .parse()
        .map_err(|_| ToyGptError::InvalidArtifact(format!("invalid {what}: {field:?}")))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
pub fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parse CSV text into records, honouring quoted fields. Blank lines are skipped.
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                }
                record.clear();
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ToyGptError::InvalidArtifact(
            "unterminated quoted CSV field".into(),
        ));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_round_trips_through_parser() {
        let fields = ["plain", "a,b", "say \"hi\"", "line\nbreak"];
        let line: Vec<String> = fields.iter().map(|f| quote_field(f)).collect();
        let text = format!("{}\n", line.join(","));
        assert_eq!(parse_csv(&text).unwrap(), vec![fields.to_vec()]);
    }

    #[test]
    fn parser_skips_blank_lines_and_handles_missing_newline() {
        let records = parse_csv("a,b\r\n\r\n1,2").unwrap();
        assert_eq!(records, vec![vec!["a", "b"], vec!["1", "2"]]);
        assert!(parse_csv("\"open").is_err());
    }

    #[test]
    fn row_labels_follow_prev_curr_order() {
        let vocab = Vocabulary::new(&["cat", "dog"]);
        let label = row_labeler_context2(&vocab);
        assert_eq!(label(0), "cat|cat");
        assert_eq!(label(1), "cat|dog");
        assert_eq!(label(2), "dog|cat");
        assert_eq!(label(3), "dog|dog");
    }

    #[test]
    fn row_labels_escape_pipes_in_tokens() {
        let vocab = Vocabulary::new(&["a|b", "c\\d"]);
        let label = row_labeler_context2(&vocab);
        assert_eq!(label(0), "a\\|b|a\\|b");
        assert_eq!(label(1), "a\\|b|c\\\\d");
    }

    #[test]
    fn training_log_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs/train_log.csv");
        let history = [
            EpochMetrics {
                epoch: 1,
                avg_loss: 1.5,
                accuracy: 0.25,
            },
            EpochMetrics {
                epoch: 2,
                avg_loss: 0.75,
                accuracy: 0.5,
            },
        ];
        write_training_log(&path, &history).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "epoch,avg_loss,accuracy\n1,1.500000,0.250000\n2,0.750000,0.500000\n"
        );
    }

    #[test]
    fn require_artifacts_names_first_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("00_meta.json");
        fs::write(&present, "{}").unwrap();
        let missing = dir.path().join("01_vocabulary.csv");

        assert!(require_artifacts(&[&present], "toy-gpt train").is_ok());
        let err = require_artifacts(&[&present, &missing], "toy-gpt train").unwrap_err();
        match err {
            ToyGptError::MissingArtifact { path, hint } => {
                assert_eq!(path, missing);
                assert_eq!(hint, "toy-gpt train");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn vocabulary_csv_rejects_bad_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.csv");
        fs::write(&path, "id,tok\n0,cat\n").unwrap();
        assert!(matches!(
            load_vocabulary_csv(&path),
            Err(ToyGptError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn weights_csv_checks_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.csv");
        let one = Vocabulary::new(&["a"]);
        let two = Vocabulary::new(&["a", "b"]);
        fs::write(&path, "context,a\na|a,0.5\n").unwrap();
        assert_eq!(load_model_weights_csv(&path, &one, 1).unwrap(), vec![0.5]);
        assert!(load_model_weights_csv(&path, &one, 2).is_err());
        assert!(load_model_weights_csv(&path, &two, 1).is_err());

        fs::write(&path, "context,a\na|a,zero\n").unwrap();
        assert!(load_model_weights_csv(&path, &one, 1).is_err());
    }

    #[test]
    fn weights_csv_header_must_match_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.csv");
        let vocab = Vocabulary::new(&["a"]);

        fs::write(&path, "row,a\na|a,0.5\n").unwrap();
        assert!(matches!(
            load_model_weights_csv(&path, &vocab, 1),
            Err(ToyGptError::InvalidArtifact(_))
        ));

        fs::write(&path, "context,b\nb|b,0.5\n").unwrap();
        assert!(matches!(
            load_model_weights_csv(&path, &vocab, 1),
            Err(ToyGptError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn artifacts_reload_to_same_model() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let vocab = Vocabulary::new(&["b", "a", "b", "c"]);
        let mut model = SimpleNextTokenModel::new(3);
        model.row_mut(1, 2)[0] = 0.123_456_79;
        model.row_mut(0, 0)[2] = -3.5e-7;

        let history = [EpochMetrics {
            epoch: 1,
            avg_loss: 1.0,
            accuracy: 0.0,
        }];
        let meta = ArtifactMeta::for_run(
            Path::new("corpus/001_animals.txt"),
            &vocab,
            &TrainConfig::default(),
            &history,
            4,
            2,
        );
        write_artifacts(&paths, &vocab, &model, &meta, row_labeler_context2(&vocab)).unwrap();

        let loaded_meta = load_meta(paths.meta_path()).unwrap();
        assert_eq!(loaded_meta, meta);
        assert_eq!(loaded_meta.corpus_file, "001_animals.txt");
        assert_eq!(loaded_meta.weights_shape, [9, 3]);

        let loaded_vocab = load_vocabulary_csv(paths.vocab_path()).unwrap();
        assert_eq!(loaded_vocab, vocab);

        let weights = load_model_weights_csv(paths.weights_path(), &vocab, 9).unwrap();
        assert_eq!(weights, model.weights());

        let embeddings = fs::read_to_string(paths.embeddings_path()).unwrap();
        assert!(embeddings.starts_with("token_id,token,dim_0,dim_1\n0,a,"));
        assert_eq!(embeddings.lines().count(), 4);
        assert!(paths.checkpoint_path().is_file());
    }

    #[test]
    fn write_artifacts_rejects_mismatched_model() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let vocab = Vocabulary::new(&["a", "b"]);
        let model = SimpleNextTokenModel::new(3);
        let meta = ArtifactMeta::for_run(
            Path::new("c.txt"),
            &vocab,
            &TrainConfig::default(),
            &[],
            2,
            0,
        );
        assert!(write_artifacts(&paths, &vocab, &model, &meta, row_labeler_context2(&vocab)).is_err());
    }
}
