//! Minimal CSV line building.

use std::borrow::Cow;

/// Quote a field if it contains a separator, quote or line break.
pub fn field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Format a number, leaving the cell empty when there is no value.
pub fn number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => String::new(),
    }
}

/// Accumulates CSV lines.
#[derive(Debug, Default)]
pub struct CsvBuilder {
    out: String,
}

impl CsvBuilder {
    pub fn with_header<S: AsRef<str>>(header: impl IntoIterator<Item = S>) -> Self {
        let mut builder = Self::default();
        builder.row(header);
        builder
    }

    pub fn row<S: AsRef<str>>(&mut self, cells: impl IntoIterator<Item = S>) {
        let line: Vec<String> = cells
            .into_iter()
            .map(|c| field(c.as_ref()).into_owned())
            .collect();
        self.out.push_str(&line.join(","));
        self.out.push('\n');
    }

    pub fn finish(self) -> String {
        self.out
    }
}
