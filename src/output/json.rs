//
//  bitbucket-collector
//  output/json.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! JSON encoders used by the [`OutputWriter`](super::OutputWriter).

use serde::Serialize;
use std::io::Write;

/// Writes `value` as one compact JSON line.
pub fn write_json_line_to<W: Write, T: Serialize>(writer: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

/// Writes `value` as pretty-printed JSON, without a trailing newline.
pub fn write_json_to<W: Write, T: Serialize>(writer: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_line_is_single_line() {
        let mut buffer = Vec::new();
        write_json_line_to(&mut buffer, &json!({"a": {"b": [1, 2]}})).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "{\"a\":{\"b\":[1,2]}}\n");
    }

    #[test]
    fn test_pretty_json() {
        let mut buffer = Vec::new();
        write_json_to(&mut buffer, &json!({"name": "test"})).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "{\n  \"name\": \"test\"\n}");
    }
}
