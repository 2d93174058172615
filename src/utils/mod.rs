// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Shared helper utilities reused by the archiver and the metadata builder.

pub mod hash;
pub mod markdown;
pub mod sanitize_component;

/// Compute the SHA-256 digest and size of a file.
pub use hash::digest_file;
/// Render markdown descriptions to sanitized HTML.
pub use markdown::markdown_to_html;
/// Sanitize user-provided strings into filesystem-safe file stems.
pub use sanitize_component::sanitize_component;
