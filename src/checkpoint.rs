//! Binary weight checkpoint.
//!
//! Layout, all little-endian: magic `TGPT`, `u32` format version, `u32`
//! context size, `u32` vocab size, then `vocab_size^3` `f32` weights.

use crate::config::CONTEXT_SIZE;
use crate::error::{Result, ToyGptError};
use crate::model::SimpleNextTokenModel;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: [u8; 4] = *b"TGPT";
pub const FORMAT_VERSION: u32 = 1;

/// Write the model to a binary checkpoint file.
pub fn write_checkpoint<P: AsRef<Path>>(path: P, model: &SimpleNextTokenModel) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    save_model(&mut writer, model)?;
    writer.flush()?;
    Ok(())
}

/// Load a model from a binary checkpoint file.
pub fn read_checkpoint<P: AsRef<Path>>(path: P) -> Result<SimpleNextTokenModel> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    load_model(&mut reader)
}

pub fn save_model<W: Write>(writer: &mut W, model: &SimpleNextTokenModel) -> Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    writer.write_u32::<LittleEndian>(CONTEXT_SIZE as u32)?;
    writer.write_u32::<LittleEndian>(model.vocab_size() as u32)?;
    for &w in model.weights() {
        writer.write_f32::<LittleEndian>(w)?;
    }
    Ok(())
}

pub fn load_model<R: Read>(reader: &mut R) -> Result<SimpleNextTokenModel> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(ToyGptError::InvalidArtifact(
            "checkpoint has wrong magic bytes".into(),
        ));
    }

    let version = reader.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(ToyGptError::InvalidArtifact(format!(
            "unsupported checkpoint version {version}"
        )));
    }

    let context = reader.read_u32::<LittleEndian>()? as usize;
    if context != CONTEXT_SIZE {
        return Err(ToyGptError::InvalidArtifact(format!(
            "checkpoint context size {context}, expected {CONTEXT_SIZE}"
        )));
    }

    let vocab_size = reader.read_u32::<LittleEndian>()? as usize;
    let count = vocab_size
        .checked_mul(vocab_size)
        .and_then(|n| n.checked_mul(vocab_size))
        .ok_or_else(|| {
            ToyGptError::InvalidArtifact(format!(
                "checkpoint vocab size {vocab_size} is too large"
            ))
        })?;
    let weights = read_f32_vec(reader, count)?;
    SimpleNextTokenModel::from_weights(vocab_size, weights)
}

/// Read a vector of f32 values from the reader.
///
/// The buffer grows with the bytes actually present, so a header that
/// overstates the payload fails with `UnexpectedEof` instead of allocating.
fn read_f32_vec<R: Read>(reader: &mut R, count: usize) -> Result<Vec<f32>> {
    let len = count.checked_mul(4).ok_or_else(|| {
        ToyGptError::InvalidArtifact(format!("checkpoint payload of {count} weights is too large"))
    })?;
    let mut bytes = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("checkpoint holds {} of {len} weight bytes", bytes.len()),
        )
        .into());
    }
    let mut buf = vec![0f32; count];
    LittleEndian::read_f32_into(&bytes, &mut buf);
    Ok(buf)
}
