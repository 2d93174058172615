// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Markdown rendering for deposition descriptions.

use pulldown_cmark::{Options, Parser, html};

/// Render markdown to sanitized HTML, the format Zenodo expects in `description` and `notes`.
///
/// Tables, footnotes and strikethrough are enabled; scripts and other unsafe
/// markup are stripped by Ammonia.
pub fn markdown_to_html(body: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(body, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    ammonia::Builder::default()
        .clean(html_output.trim_end())
        .to_string()
}
