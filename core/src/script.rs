//! Script text accumulation

/// Batch separator line understood by SQL Server tooling
pub const BATCH_SEPARATOR: &str = "GO";

/// Ordered DDL text for one database.
///
/// A plain text accumulator: one line per statement, and a `GO` line plus a
/// blank line after each batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptBuffer {
    text: String,
    statements: usize,
}

impl ScriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line
    pub fn add(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.statements += 1;
    }

    /// Append each statement on its own line, then close the batch
    pub fn add_batch<S: AsRef<str>>(&mut self, statements: &[S]) {
        for statement in statements {
            self.add(statement.as_ref());
        }
        self.text.push_str(BATCH_SEPARATOR);
        self.text.push_str("\n\n");
    }

    pub fn to_text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Number of statements added so far
    pub fn statement_count(&self) -> usize {
        self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
