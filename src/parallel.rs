use crate::archive;
use crate::error::ExportError;
use crate::utils::{
    ExportConfig, ExportSummary, PageOutcome, allocate_filenames, export_conversation, finish,
    make_bar, prepare_output_dir, record_progress,
};
use crossbeam_channel::{bounded, unbounded};

/// Export every conversation of the archive on a pool of worker threads.
///
/// Workers pull input indices from a bounded queue and send `(index, outcome)`
/// back; outcomes land in one slot per input, so the index page follows input
/// order whatever the completion order was.
pub fn execute(config: &ExportConfig) -> Result<ExportSummary, ExportError> {
    let conversations = archive::load_archive(&config.zip_path)?;
    prepare_output_dir(&config.output_dir).map_err(ExportError::Output)?;

    let filenames = allocate_filenames(&conversations);
    let pb = make_bar(conversations.len() as u64, config.quiet);
    let mut outcomes: Vec<Option<PageOutcome>> =
        std::iter::repeat_with(|| None).take(conversations.len()).collect();

    let n_workers = config.worker_count(conversations.len());
    let (job_tx, job_rx) = bounded::<usize>(n_workers * 4);
    let (done_tx, done_rx) = unbounded::<(usize, PageOutcome)>();

    std::thread::scope(|s| {
        for _ in 0..n_workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let (conversations, filenames) = (&conversations, &filenames);

            s.spawn(move || {
                while let Ok(idx) = job_rx.recv() {
                    let outcome =
                        export_conversation(&conversations[idx], &filenames[idx], &config.output_dir);
                    if done_tx.send((idx, outcome)).is_err() {
                        break;
                    }
                }
            });
        }

        drop(job_rx);
        drop(done_tx);

        for idx in 0..conversations.len() {
            // Every worker gone means nothing is left to run the remaining jobs.
            if job_tx.send(idx).is_err() {
                break;
            }
            // Keep the bar moving while the queue is being fed.
            while let Ok((done, outcome)) = done_rx.try_recv() {
                record_progress(config, &pb, &outcome);
                outcomes[done] = Some(outcome);
            }
        }
        drop(job_tx);

        for (done, outcome) in done_rx.iter() {
            record_progress(config, &pb, &outcome);
            outcomes[done] = Some(outcome);
        }
    });

    finish(config, &conversations, outcomes, &pb)
}
