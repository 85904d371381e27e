use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use ::zip::ZipArchive;

#[allow(dead_code)]
pub struct RemoteFile {
    url: String,
    response: reqwest::blocking::Response,
    total_size: usize,
    current_size: usize,
    pbar: Option<ProgressBar>,
}
impl RemoteFile {
    pub fn with_pbar(url: &str) -> Result<Self> {
        Self::with_config(url, 3600, true)
    }
    pub fn with_config(url: &str, timeout: u64, pbar: bool) -> Result<Self> {
        let client = reqwest::blocking::Client::new();
        let response = client
            .get(url)
            .timeout(std::time::Duration::from_secs(timeout))
            .send()?
            .error_for_status()?;
        // some mirrors omit Content-Length; fall back to a spinner
        let total_size = response.content_length();

        let pbar = if pbar {
            let pbar = match total_size {
                Some(size) => {
                    let pbar = ProgressBar::new(size);
                    pbar.set_style(ProgressStyle::default_bar()
                        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
                        .progress_chars("#>-"));
                    pbar
                }
                None => ProgressBar::new_spinner(),
            };
            pbar.set_message(format!("Downloading {}", url));
            Some(pbar)
        } else {
            None
        };
        Ok(Self {
            url: url.to_owned(),
            response,
            current_size: 0,
            total_size: total_size.unwrap_or(0) as usize,
            pbar,
        })
    }
    fn update(&mut self, size: usize) {
        self.current_size += size;
        if let Some(pbar) = &self.pbar {
            pbar.set_position(self.current_size as u64);
            if size == 0 {
                pbar.finish();
            }
        }
    }
}

impl Read for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let size = self.response.read(buf)?;
        self.update(size);
        Ok(size)
    }
}

pub enum CompressionFormat {
    /// Archive extracted into the directory `path`.
    Zip,
    /// Single gzip member decompressed into the file `path`.
    Gz,
}

pub fn download_and_extract<P: AsRef<Path>>(
    url: &str,
    path: P,
    format: CompressionFormat,
) -> Result<()> {
    tracing::info!(url, dest = %path.as_ref().display(), "downloading");
    let mut remote_file = RemoteFile::with_pbar(url)?;
    let mut archive = tempfile::tempfile()?;
    std::io::copy(&mut remote_file, &mut archive)?;
    archive.seek(SeekFrom::Start(0))?;

    match format {
        CompressionFormat::Zip => {
            let mut archive = ZipArchive::new(&archive)?;
            archive.extract(path)?;
        }
        CompressionFormat::Gz => {
            let mut gz = GzDecoder::new(&archive);
            std::io::copy(&mut gz, &mut File::create(path)?)?;
        }
    }
    Ok(())
}

/// Reads a gzip-compressed CSV with every column as `Utf8`.
///
/// The file is decompressed into an anonymous temporary file that the OS
/// reclaims once the reader is dropped, so nothing is left next to `path`.
pub fn read_csv_gz<P: AsRef<Path>>(path: P, has_header: bool) -> Result<DataFrame> {
    let path = path.as_ref();
    let source = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let mut plain = tempfile::tempfile()?;
    std::io::copy(&mut GzDecoder::new(source), &mut plain)
        .with_context(|| format!("failed to decompress {}", path.display()))?;
    plain.seek(SeekFrom::Start(0))?;

    let df = CsvReader::new(plain)
        .has_header(has_header)
        .infer_schema(Some(0))
        .finish()
        .with_context(|| format!("failed to parse {}", path.display()))?;
    tracing::debug!(path = %path.display(), rows = df.height(), "read csv.gz");
    Ok(df)
}

/// Parses a string column into `u32`, failing on anything that is not a
/// non-negative integer.
pub fn parse_u32(series: &Series) -> Result<Series> {
    series
        .strict_cast(&DataType::UInt32)
        .with_context(|| format!("column '{}' is not a list of node indices", series.name()))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{fs::File, io::Write, path::Path};

    use flate2::{write::GzEncoder, Compression};

    pub fn write_gz<P: AsRef<Path>>(path: P, contents: &str) {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(contents.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::write_gz;
    use super::*;

    #[test]
    fn read_csv_gz_keeps_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.csv.gz");
        write_gz(&path, "node idx,paper id\n0,00123\n1,456\n");

        let df = read_csv_gz(&path, true).unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.get_column_names(), &["node idx", "paper id"]);
        // leading zeros survive because nothing is inferred as numeric
        assert_eq!(df["paper id"].utf8().unwrap().get(0), Some("00123"));

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn read_csv_gz_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv.gz");
        write_gz(&path, "3\n1\n4\n");

        let df = read_csv_gz(&path, false).unwrap();
        assert_eq!(df.height(), 3);
        let idx = parse_u32(&df[0]).unwrap();
        let idx: Vec<u32> = idx.u32().unwrap().into_no_null_iter().collect();
        assert_eq!(idx, vec![3, 1, 4]);
    }

    #[test]
    fn read_csv_gz_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_csv_gz(dir.path().join("absent.csv.gz"), true).is_err());
    }

    #[test]
    fn parse_u32_rejects_garbage() {
        let s = Series::new("node idx", &["0", "x"]);
        assert!(parse_u32(&s).is_err());
        let s = Series::new("node idx", &["0", "-1"]);
        assert!(parse_u32(&s).is_err());
    }
}
