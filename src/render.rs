use crate::session::History;
use comrak::plugins::syntect::SyntectAdapter;
use comrak::{ComrakOptions, ComrakPlugins, markdown_to_html_with_plugins};
use once_cell::sync::Lazy;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

const EXPORT_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:short] [day padding:zero], [year]");

const EXTERNAL_LINK: &str = r#"<a target="_blank" rel="noopener noreferrer" href"#;

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(|| {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options.extension.autolink = true;
    options.render.hardbreaks = true;
    options.render.unsafe_ = true;
    options
});

/// Renders message text as HTML. Links open in a new tab.
pub fn markdown_to_html(md: &str) -> String {
    let adapter = SyntectAdapter::new(Some("base16-ocean.dark"));
    let mut plugins = ComrakPlugins::default();
    plugins.render.codefence_syntax_highlighter = Some(&adapter);
    let html = markdown_to_html_with_plugins(md, &MARKDOWN_OPTIONS, &plugins);
    html.replace("<a href", EXTERNAL_LINK)
}

/// A standalone HTML page with every turn of the conversation.
pub fn transcript_html(history: &History) -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let exported = now.format(EXPORT_DATE_FORMAT).unwrap_or_default();

    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Chat transcript</title>\n</head>\n<body>\n",
    );
    page.push_str(&format!("<p class=\"export-date\">Exported {exported}</p>\n"));
    page.push_str("<div id=\"messages\">\n");
    for turn in history.iter() {
        page.push_str(&format!(
            "<div class=\"message {}\">\n<div class=\"message-content\">\n{}</div>\n</div>\n",
            turn.role,
            markdown_to_html(&turn.content)
        ));
    }
    page.push_str("</div>\n</body>\n</html>\n");
    page
}
