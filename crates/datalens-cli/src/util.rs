use std::{
    fs::File,
    io::{self, BufReader, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use datalens_analysis::{SourceError, manager::BatchSource};
use datalens_batch::RawBatch;

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    /// Writes `value` as one compact JSON line.
    pub fn write_json_line<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer(&mut *self, value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self)
            .with_context(|| format!("Failed to write newline to {}", self.display_path()))?;
        Ok(())
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Streams `RawBatch` records from a JSON Lines file.
///
/// The file is opened eagerly; records are decoded lazily, one per pull.
pub fn open_batch_file<P>(path: P) -> anyhow::Result<BatchSource>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open batch file: {}", path.display()))?;
    Ok(batches_from_reader(BufReader::new(file)))
}

pub fn batches_from_reader<R>(reader: R) -> BatchSource
where
    R: io::Read + 'static,
{
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<RawBatch>();
    Box::new(stream.map(|item| {
        item.map_err(|err| {
            if err.is_io() {
                SourceError::Io(err.into())
            } else {
                SourceError::Decode(err)
            }
        })
    }))
}

#[cfg(test)]
mod tests {
    use datalens_batch::{Image, LabelMask};

    use super::*;

    #[test]
    fn test_batches_from_reader() {
        let batch = RawBatch {
            images: vec![Image::filled(1, 1, 2, 3.0)],
            labels: vec![LabelMask::filled(1, 2, 1)],
        };
        let line = serde_json::to_string(&batch).unwrap();
        let text = format!("{line}\n{line}\n");

        let batches = batches_from_reader(io::Cursor::new(text.into_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(batches, [batch.clone(), batch]);
    }

    #[test]
    fn test_decode_error_is_reported() {
        let mut source = batches_from_reader(io::Cursor::new(b"{\"images\": 3}".to_vec()));
        assert!(matches!(source.next(), Some(Err(SourceError::Decode(_)))));
    }

    #[test]
    fn test_output_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batches.jsonl");
        let mut output = Output::open(path.clone()).unwrap();
        let batch = RawBatch {
            images: vec![],
            labels: vec![],
        };
        output.write_json_line(&batch).unwrap();
        output.finish().unwrap();

        let batches = open_batch_file(&path)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(batches, [batch]);
    }
}
