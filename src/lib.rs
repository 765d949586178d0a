//! # chat-export-html
//!
//! A CLI tool that turns a ChatGPT data export (the `.zip` you get from
//! *Settings → Data controls → Export*) into a folder of static HTML pages.
//!
//! ## What it does
//!
//! The export contains `conversations.json`, where every conversation stores its
//! messages as a tree of nodes. This tool unpacks the archive into a temporary
//! directory, walks each tree breadth-first, and writes one chat-bubble page per
//! conversation plus an `index.html` linking them all. Styling is inlined, so the
//! folder can be opened straight from disk or archived as-is.
//!
//! Conversations are rendered on a pool of worker threads. The index always
//! follows the order of the export. A conversation whose tree is broken (a
//! missing root or a child id that points nowhere) is skipped with a warning
//! instead of aborting the run.
//!
//! ## Usage
//!
//! ```sh
//! # Writes ./Conversations_HTML/
//! chat-export-html ~/Downloads/chatgpt-export.zip
//!
//! # Custom output directory, four workers
//! chat-export-html export.zip --output-dir ~/notes/chats --jobs 4
//! ```
//!
//! Preferences can be persisted in `~/.config/chat-export-html/config.toml`.
pub mod archive;
pub mod error;
pub mod importer;
pub mod parallel;
pub mod renderer;
#[cfg(feature = "sequential")]
pub mod sequential;
pub mod traversal;
pub mod utils;
