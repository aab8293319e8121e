// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod chunker;
pub mod extract;
pub mod tokenizer;

pub use chunker::{TextChunker, normalize, split};
pub use extract::{DocumentKind, ReportReader, TextExtractor};
pub use tokenizer::{Encoding, Tokenizer, pad_batch};
