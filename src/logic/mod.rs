// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Business logic: archive creation and the publishing pipeline.

pub mod archive;
pub mod publish;
