// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Domain layer: deposit API shapes, release metadata and validation helpers.

pub mod deposition;
pub mod keywords;
pub mod metadata;
