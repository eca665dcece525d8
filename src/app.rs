use std::marker::Unpin;
use std::path::PathBuf;

use clap::Parser;
use log::info;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{self, AsyncRead, AsyncWrite},
};

use crate::{
    io::{SamIo, SamIoError, SamLine},
    markdups::{KeepMode, PositionGroups, RecordStatus},
    metrics::{Metrics, Status},
    record::RecordError,
    whitelist::UmiWhitelist,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Config {
    /// The input sam file, sorted by chromosome and position. sedup reads
    /// from stdin when omitted
    #[clap(short, long)]
    pub file: Option<PathBuf>,

    /// The output sam file. sedup writes to stdout when omitted
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// File with one valid UMI per line. Reads whose UMI is not listed are
    /// dropped
    #[clap(short, long)]
    pub umi: PathBuf,

    /// Which duplicate to keep: first, last or best (highest known mapping
    /// quality)
    #[clap(short, long, default_value_t)]
    pub mode: KeepMode,

    /// The deduplication metrics file, if missing metrics will be written to
    /// stderr
    #[clap(long)]
    pub metrics: Option<PathBuf>,

    /// Verbosity, repeat for more detail
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub struct App {
    config: Config,
    samio: SamIo<Box<dyn AsyncRead + Unpin>, Box<dyn AsyncWrite + Unpin>>,
    whitelist: UmiWhitelist,
    groups: PositionGroups,
    metrics: Metrics,
}

impl App {
    pub async fn new() -> Result<App, SedupError> {
        let config = Config::parse();

        env_logger::Builder::new()
            .filter_level(match config.verbose {
                0 => log::LevelFilter::Warn,
                1 => log::LevelFilter::Info,
                _ => log::LevelFilter::Debug,
            })
            .init();

        let whitelist = UmiWhitelist::from_path(&config.umi).await?;
        info!(
            "loaded {} UMIs from {}",
            whitelist.len(),
            config.umi.display()
        );

        let read: Box<dyn AsyncRead + Unpin> = if let Some(p) = config.file.as_ref() {
            Box::new(File::open(p).await?)
        } else {
            Box::new(io::stdin())
        };

        let write: Box<dyn AsyncWrite + Unpin> = if let Some(p) = config.output.as_ref() {
            Box::new(File::create(p).await?)
        } else {
            Box::new(io::stdout())
        };

        let samio = SamIo::new(read, write);
        let groups = PositionGroups::new(config.mode);

        Ok(App {
            config,
            samio,
            whitelist,
            groups,
            metrics: Metrics::default(),
        })
    }

    pub async fn run(&mut self) -> Result<(), SedupError> {
        dedup(
            &mut self.samio,
            &self.whitelist,
            &mut self.groups,
            &mut self.metrics,
        )
        .await?;
        self.samio.shutdown().await?;

        if let Some(path) = &self.config.metrics {
            use std::io::Write;
            let mut mout = std::fs::File::create(path)?;
            write!(mout, "{}", self.metrics)?;
        } else {
            eprintln!("{}", self.metrics);
        }

        Ok(())
    }
}

/// Stream records from `samio`, keeping one survivor per duplicate group.
///
/// Header lines pass through verbatim. Unmapped reads and reads with an
/// unlisted UMI are counted and dropped before they reach the classifier.
/// Valid records are normalized in-stream (records already carrying a saved
/// position are grouped as-is) and survivors are written with their original
/// position restored.
pub async fn dedup<R, W>(
    samio: &mut SamIo<R, W>,
    whitelist: &UmiWhitelist,
    groups: &mut PositionGroups,
    metrics: &mut Metrics,
) -> Result<(), SedupError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(line) = samio.read_line().await? {
        let mut record = match line {
            SamLine::Header(header) => {
                samio.write_header(&header).await?;
                continue;
            }
            SamLine::Record(record) => record,
        };

        if record.flags().is_unmapped() {
            metrics.count(Status::Unmapped);
            continue;
        }
        if !whitelist.contains(record.umi()) {
            metrics.count(Status::InvalidUmi);
            continue;
        }

        if !record.is_normalized() {
            record.normalize_position()?;
        }

        let (status, flushed) = groups.insert(record);
        metrics.count(match status {
            RecordStatus::Unique => Status::Unique,
            RecordStatus::Duplicate => Status::Duplicate,
        });

        for mut survivor in flushed {
            survivor.restore_position();
            samio.write_record(&survivor).await?;
        }
    }

    for mut survivor in groups.flush() {
        survivor.restore_position();
        samio.write_record(&survivor).await?;
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum SedupError {
    #[error("io error")]
    IoError(#[from] std::io::Error),
    #[error("error reading SAM stream")]
    ReaderError(#[from] SamIoError),
    #[error("error using SAM record")]
    RecordError(#[from] RecordError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "@HD\tVN:1.0\tSO:coordinate\n@SQ\tSN:chr1\tLN:248956422\n";

    fn line(name: &str, flag: u16, rname: &str, pos: i64, mapq: u8, cigar: &str) -> String {
        format!("{name}\t{flag}\t{rname}\t{pos}\t{mapq}\t{cigar}\t*\t0\t0\tACGTACGTAC\tFFFFFFFFFF\n")
    }

    async fn run_dedup(input: String, mode: KeepMode, umis: &str) -> (String, Metrics) {
        let whitelist: UmiWhitelist = umis.lines().collect();
        let mut samio = SamIo::new(std::io::Cursor::new(input.into_bytes()), Vec::new());
        let mut groups = PositionGroups::new(mode);
        let mut metrics = Metrics::default();

        dedup(&mut samio, &whitelist, &mut groups, &mut metrics)
            .await
            .unwrap();
        samio.shutdown().await.unwrap();

        (String::from_utf8(samio.into_write()).unwrap(), metrics)
    }

    #[tokio::test]
    async fn filters_and_collapses() {
        let mut input = String::from(HEADER);
        input.push_str(&line("r1:ACGT", 0, "chr1", 100, 30, "10M"));
        // same corrected position and key as r1 despite the clip
        input.push_str(&line("r2:ACGT", 0, "chr1", 102, 30, "2S8M"));
        input.push_str(&line("r3:TTTT", 0, "chr1", 100, 30, "10M"));
        // unmapped and unknown-UMI reads never reach the classifier
        input.push_str(&line("r4:ACGT", 4, "chr1", 100, 30, "10M"));
        input.push_str(&line("r5:GGGG", 0, "chr1", 100, 30, "10M"));
        input.push_str(&line("r6:ACGT", 0, "chr1", 300, 30, "10M"));

        let (out, metrics) = run_dedup(input, KeepMode::First, "ACGT\nTTTT").await;

        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "@HD\tVN:1.0\tSO:coordinate",
                "@SQ\tSN:chr1\tLN:248956422",
                line("r1:ACGT", 0, "chr1", 100, 30, "10M").trim_end(),
                line("r3:TTTT", 0, "chr1", 100, 30, "10M").trim_end(),
                line("r6:ACGT", 0, "chr1", 300, 30, "10M").trim_end(),
            ]
        );
        assert_eq!(metrics.total_reads(), 6);
    }

    #[tokio::test]
    async fn best_mode_survivor_has_highest_quality() {
        for swap in [false, true] {
            let (lo, hi) = (30, 40);
            let (first, second) = if swap { (hi, lo) } else { (lo, hi) };

            let mut input = String::new();
            input.push_str(&line("r1:ACGT", 0, "chr1", 100, first, "10M"));
            input.push_str(&line("r2:ACGT", 0, "chr1", 100, second, "10M"));

            let (out, _) = run_dedup(input, KeepMode::Best, "ACGT").await;
            assert!(out.contains(&format!("\t{}\t10M", hi)), "{out}");
            assert_eq!(out.lines().count(), 1);
        }
    }

    #[tokio::test]
    async fn idempotent_on_own_output() {
        let mut input = String::from(HEADER);
        input.push_str(&line("r1:ACGT", 0, "chr1", 100, 30, "5S10M"));
        input.push_str(&line("r2:ACGT", 16, "chr1", 100, 30, "10M"));
        input.push_str(&line("r3:ACGT", 0, "chr1", 200, 30, "10M"));

        let (out, first_metrics) = run_dedup(input, KeepMode::First, "ACGT").await;
        assert_eq!(first_metrics.total_reads(), 3);
        // no tags survive into the output
        assert!(!out.contains("OP:i:"));

        let (again, metrics) = run_dedup(out.clone(), KeepMode::First, "ACGT").await;
        assert_eq!(again, out);
        assert_eq!(metrics.total_reads(), 3);
        assert!((metrics.percent_duplication() - 0.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn empty_cigar_aborts_the_run() {
        let input = line("r1:ACGT", 0, "chr1", 100, 30, "*");
        let whitelist: UmiWhitelist = "ACGT".lines().collect();
        let mut samio = SamIo::new(std::io::Cursor::new(input.into_bytes()), Vec::new());
        let mut groups = PositionGroups::new(KeepMode::First);
        let mut metrics = Metrics::default();

        let result = dedup(&mut samio, &whitelist, &mut groups, &mut metrics).await;
        assert!(matches!(result, Err(SedupError::RecordError(_))));
    }
}
