//
//  bitbucket-collector
//  output/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Streaming output of archive items.
//!
//! Items are written as soon as they are produced and the writer is flushed
//! after each one, so a run that fails halfway still delivers everything it
//! collected before the failure.

mod json;

pub use json::*;

use std::io::Write;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One compact JSON object per line.
    #[default]
    JsonLines,
    /// A pretty-printed JSON array.
    Json,
}

/// Writes a sequence of items in the chosen format.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    written: u64,
    finished: bool,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            written: 0,
            finished: false,
        }
    }

    /// Number of items written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Writes one item and flushes.
    pub fn write_item<T: Serialize>(&mut self, item: &T) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::JsonLines => write_json_line_to(&mut self.writer, item)?,
            OutputFormat::Json => {
                let separator = if self.written == 0 { "[\n" } else { ",\n" };
                self.writer.write_all(separator.as_bytes())?;
                write_json_to(&mut self.writer, item)?;
            }
        }
        self.written += 1;
        self.writer.flush()?;
        Ok(())
    }

    /// Closes the output. For JSON arrays this writes the closing bracket,
    /// so a failed run still leaves a valid document.
    pub fn finish(&mut self) -> anyhow::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if self.format == OutputFormat::Json {
            let closing = if self.written == 0 { "[]\n" } else { "\n]\n" };
            self.writer.write_all(closing.as_bytes())?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
