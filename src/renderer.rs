use crate::importer::Conversation;
use crate::traversal::RenderedLine;
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const INDEX_FILE: &str = "index.html";
/// Stem used for pages of conversations without a usable title.
pub const UNTITLED_STEM: &str = "Untitled_Conversation";
/// Link label used in the index for conversations without a title.
pub const UNTITLED_LABEL: &str = "Untitled Conversation";

const PAGE_STYLE: &str = r#"        body {
            font-family: Arial, sans-serif;
            background-color: #f5f5f5;
            padding: 20px;
        }
        .chat-container {
            max-width: 600px;
            margin: 0 auto;
            background: white;
            padding: 20px;
            border-radius: 10px;
            box-shadow: 0 0 10px rgba(0, 0, 0, 0.1);
        }
        .chat-bubble {
            padding: 10px 15px;
            border-radius: 20px;
            margin-bottom: 10px;
            display: inline-block;
            max-width: 80%;
            white-space: pre-wrap;
            overflow-wrap: anywhere;
        }
        .user {
            background-color: #daf8cb;
            margin-right: auto;
        }
        .assistant {
            background-color: #f1f0f0;
            margin-left: auto;
        }
        .timestamp {
            font-size: 0.8em;
            color: gray;
            margin-bottom: 5px;
        }
        .speaker {
            font-weight: bold;
            margin-bottom: 5px;
        }
        .back {
            display: block;
            margin-bottom: 15px;
            color: #1a73e8;
            text-decoration: none;
        }
"#;

const INDEX_STYLE: &str = r#"        body {
            font-family: Arial, sans-serif;
            background-color: #f5f5f5;
            padding: 20px;
        }
        ul {
            list-style-type: none;
            padding: 0;
        }
        li {
            margin: 5px 0;
        }
        a {
            text-decoration: none;
            color: #1a73e8;
        }
        a:hover {
            text-decoration: underline;
        }
"#;

/// Escape the HTML metacharacters `&`, `<`, `>` and `"`.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keep alphanumerics, spaces, periods and underscores; drop the rest and trim
/// trailing whitespace.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_'))
        .collect();
    kept.trim_end().to_string()
}

/// Stem (filename without `.html`) a conversation's page is named after.
pub fn page_stem(conversation: &Conversation) -> String {
    let stem = sanitize_filename(conversation.title.as_deref().unwrap_or(UNTITLED_STEM));
    if stem.is_empty() {
        UNTITLED_STEM.to_string()
    } else {
        stem
    }
}

/// Title shown to readers. Missing or blank titles read as `Untitled Conversation`.
pub fn display_title(conversation: &Conversation) -> &str {
    match conversation.title.as_deref() {
        Some(t) if !t.trim().is_empty() => t,
        _ => UNTITLED_LABEL,
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn write_head<W: Write>(writer: &mut W, title: &str, style: &str) -> std::io::Result<()> {
    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, "<html lang=\"en\">")?;
    writeln!(writer, "<head>")?;
    writeln!(writer, "    <meta charset=\"UTF-8\">")?;
    writeln!(
        writer,
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">"
    )?;
    writeln!(writer, "    <title>{}</title>", html_escape(title))?;
    writeln!(writer, "    <style>")?;
    write!(writer, "{}", style)?;
    writeln!(writer, "    </style>")?;
    writeln!(writer, "</head>")?;
    Ok(())
}

/// Render one conversation as a standalone bubble-chat document.
pub fn render_page<W: Write>(
    writer: &mut W,
    conversation: &Conversation,
    lines: &[RenderedLine],
) -> std::io::Result<()> {
    let title = display_title(conversation);

    write_head(writer, title, PAGE_STYLE)?;
    writeln!(writer, "<body>")?;
    writeln!(writer, "<div class=\"chat-container\">")?;
    writeln!(writer, "<a class=\"back\" href=\"{}\">&larr; All conversations</a>", INDEX_FILE)?;
    writeln!(writer, "<h1>{}</h1>", html_escape(title))?;
    if let Some(created) = conversation.created_at() {
        writeln!(
            writer,
            "<div class=\"timestamp\">Created {}</div>",
            format_timestamp(created)
        )?;
    }

    for line in lines {
        writeln!(writer, "<div class=\"speaker\">{}:</div>", line.speaker.label())?;
        if let Some(ts) = line.timestamp {
            writeln!(writer, "<div class=\"timestamp\">{}</div>", format_timestamp(ts))?;
        }
        writeln!(
            writer,
            "<div class=\"chat-bubble {}\">{}</div>",
            line.speaker.class(),
            html_escape(&line.text)
        )?;
    }

    writeln!(writer, "</div>")?;
    writeln!(writer, "</body>")?;
    writeln!(writer, "</html>")?;
    Ok(())
}

/// Write `<output_dir>/<file_name>` for one conversation, replacing any
/// existing file, and return the filename.
pub fn write_page(
    output_dir: &Path,
    file_name: &str,
    conversation: &Conversation,
    lines: &[RenderedLine],
) -> Result<String> {
    write_replacing(&output_dir.join(file_name), |w| render_page(w, conversation, lines))?;
    Ok(file_name.to_string())
}

/// Render the table of contents. Conversations and filenames are paired by
/// position; surplus entries on either side are dropped.
pub fn render_index<W: Write>(
    writer: &mut W,
    conversations: &[&Conversation],
    filenames: &[String],
) -> std::io::Result<()> {
    write_head(writer, "Table of Contents", INDEX_STYLE)?;
    writeln!(writer, "<body>")?;
    writeln!(writer, "<h1>Conversations Index</h1>")?;
    writeln!(writer, "<ul>")?;
    for (conversation, file_name) in conversations.iter().zip(filenames) {
        let title = display_title(conversation);
        writeln!(
            writer,
            "<li><a href=\"{}\">{}</a></li>",
            html_escape(file_name),
            html_escape(title)
        )?;
    }
    writeln!(writer, "</ul>")?;
    writeln!(writer, "</body>")?;
    writeln!(writer, "</html>")?;
    Ok(())
}

/// Write `<output_dir>/index.html`, replacing any existing file.
pub fn write_index(
    output_dir: &Path,
    conversations: &[&Conversation],
    filenames: &[String],
) -> Result<()> {
    write_replacing(&output_dir.join(INDEX_FILE), |w| {
        render_index(w, conversations, filenames)
    })
}

/// Render into a temporary file next to `path`, then move it into place.
/// A failed render leaves `path` untouched and no partial file behind.
fn write_replacing<F>(path: &Path, render: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<NamedTempFile>) -> std::io::Result<()>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut builder = tempfile::Builder::new();
    builder.prefix(".").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    let tmp = builder
        .tempfile_in(dir)
        .wrap_err_with(|| format!("Failed to create temporary file in: {}", dir.display()))?;
    let mut writer = BufWriter::new(tmp);
    render(&mut writer).wrap_err_with(|| format!("Failed to write: {}", path.display()))?;
    let tmp = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .wrap_err_with(|| format!("Failed to flush: {}", path.display()))?;
    tmp.persist(path)
        .wrap_err_with(|| format!("Failed to create: {}", path.display()))?;
    Ok(())
}
