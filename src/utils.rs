use crate::error::ExportError;
use crate::importer::Conversation;
use crate::renderer::{self, INDEX_FILE};
use crate::traversal::{self, TraversalError};
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub zip_path: PathBuf,
    pub output_dir: PathBuf,
    /// Worker threads; `None` means one per available core.
    pub jobs: Option<usize>,
    pub verbose: bool,
    pub quiet: bool,
}

impl ExportConfig {
    pub fn worker_count(&self, units: usize) -> usize {
        let wanted = self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(8)
        });
        wanted.min(units).max(1)
    }
}

/// Counts reported at the end of a run that produced an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub output_dir: PathBuf,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Why a single conversation produced no page.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Traversal(#[from] TraversalError),
    #[error("{0:#}")]
    Write(eyre::Report),
}

pub type PageOutcome = std::result::Result<String, PageError>;

pub fn prepare_output_dir(output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir).wrap_err_with(|| {
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    })
}

/// Assign every conversation a distinct page filename, in input order.
///
/// The first conversation with a given stem keeps `<stem>.html`, later ones get
/// `<stem>_2.html`, `<stem>_3.html`, ... Names are compared case-insensitively
/// and `index` is reserved for the table of contents.
pub fn allocate_filenames(conversations: &[Conversation]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(conversations.len() + 1);
    taken.insert(INDEX_FILE.to_lowercase());

    conversations
        .iter()
        .map(|conversation| {
            let stem = renderer::page_stem(conversation);
            let mut candidate = format!("{}.html", stem);
            let mut n = 2usize;
            while !taken.insert(candidate.to_lowercase()) {
                candidate = format!("{}_{}.html", stem, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Traverse and render one conversation. Stateless: safe to call from any worker.
pub fn export_conversation(
    conversation: &Conversation,
    file_name: &str,
    output_dir: &Path,
) -> PageOutcome {
    let lines = traversal::linearize(conversation)?;
    renderer::write_page(output_dir, file_name, conversation, &lines).map_err(PageError::Write)
}

/// Report a finished unit of work as soon as it comes back.
pub fn record_progress(config: &ExportConfig, pb: &ProgressBar, outcome: &PageOutcome) {
    if config.verbose
        && let Ok(file_name) = outcome
    {
        pb.println(format!("Wrote:    {}", file_name));
    }
    pb.inc(1);
}

pub fn make_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    bar.println(format!("Found {} conversations.", total));
    bar
}

/// Report per-conversation outcomes, write the index for the pages that exist,
/// and classify the run.
///
/// `outcomes[i]` belongs to `conversations[i]`; `None` means the unit of work
/// never reported back.
pub fn finish(
    config: &ExportConfig,
    conversations: &[Conversation],
    outcomes: Vec<Option<PageOutcome>>,
    pb: &ProgressBar,
) -> std::result::Result<ExportSummary, ExportError> {
    let mut listed: Vec<&Conversation> = Vec::with_capacity(conversations.len());
    let mut filenames: Vec<String> = Vec::with_capacity(conversations.len());
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for (conversation, outcome) in conversations.iter().zip(outcomes) {
        let title = renderer::display_title(conversation);
        match outcome {
            Some(Ok(file_name)) => {
                listed.push(conversation);
                filenames.push(file_name);
            }
            Some(Err(e @ PageError::Traversal(_))) => {
                skipped += 1;
                pb.suspend(|| {
                    log::warn!(
                        "Skipped {:?} [{}]: {}",
                        title,
                        conversation.display_id(),
                        e
                    )
                });
            }
            Some(Err(e @ PageError::Write(_))) => {
                failed += 1;
                pb.suspend(|| {
                    log::warn!(
                        "Failed {:?} [{}]: {}",
                        title,
                        conversation.display_id(),
                        e
                    )
                });
            }
            None => {
                failed += 1;
                pb.suspend(|| {
                    log::warn!(
                        "Failed {:?} [{}]: worker exited before finishing",
                        title,
                        conversation.display_id()
                    )
                });
            }
        }
    }

    pb.finish_and_clear();

    renderer::write_index(&config.output_dir, &listed, &filenames)
        .map_err(ExportError::Output)?;

    let summary = ExportSummary {
        output_dir: config.output_dir.clone(),
        written: filenames.len(),
        skipped,
        failed,
    };

    if !config.quiet {
        let mut line = format!(
            "Done. {} pages written to {}",
            summary.written,
            summary.output_dir.display()
        );
        if skipped + failed > 0 {
            line.push_str(&format!(" ({} skipped, {} failed)", skipped, failed));
        }
        eprintln!("{}", line);
    }

    if skipped > 0 {
        Err(ExportError::Traversal { skipped })
    } else if failed > 0 {
        Err(ExportError::PartialOutput { failed })
    } else {
        Ok(summary)
    }
}
