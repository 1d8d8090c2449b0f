//! Symbol universe helpers shared between the engine and the demo feed.

use std::collections::HashSet;
use std::io::BufRead;

use crate::error::ThrottleError;

/// Trait providing symbol list parsing.
pub trait SymbolParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Symbols may be separated by commas, whitespace or new lines. Blank entries are
    /// skipped, repeated symbols keep their first position. Returns an error if a
    /// symbol contains characters other than ASCII alphanumerics, `.`, `-` or `_`.
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<String>, ThrottleError>;
}

/// Plain-text symbol list parser.
pub struct SymbolList;

impl SymbolParser for SymbolList {
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<String>, ThrottleError> {
        let mut symbols = Vec::new();
        let mut seen = HashSet::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(ThrottleError::Io)?;
            for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
                if token.is_empty() {
                    continue;
                }
                if !token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
                {
                    return Err(ThrottleError::ParseSymbolsFile(format!(
                        "invalid symbol: {token}"
                    )));
                }
                if seen.insert(token.to_string()) {
                    symbols.push(token.to_string());
                }
            }
        }
        Ok(symbols)
    }
}

/// Generate `count` symbols named `<prefix>0 .. <prefix>{count-1}`.
pub fn generate_symbols(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}
