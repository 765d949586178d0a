use crate::archive;
use crate::error::ExportError;
use crate::utils::{
    ExportConfig, ExportSummary, allocate_filenames, export_conversation, finish, make_bar,
    prepare_output_dir, record_progress,
};

/// Single-threaded export: one conversation after the other, in input order.
pub fn execute(config: &ExportConfig) -> Result<ExportSummary, ExportError> {
    let conversations = archive::load_archive(&config.zip_path)?;
    prepare_output_dir(&config.output_dir).map_err(ExportError::Output)?;

    let filenames = allocate_filenames(&conversations);
    let pb = make_bar(conversations.len() as u64, config.quiet);

    let outcomes = conversations
        .iter()
        .zip(&filenames)
        .map(|(conversation, file_name)| {
            let outcome = export_conversation(conversation, file_name, &config.output_dir);
            record_progress(config, &pb, &outcome);
            Some(outcome)
        })
        .collect();

    finish(config, &conversations, outcomes, &pb)
}
