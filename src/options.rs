/// Options controlling how permissive the parser is.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Fail the whole parse on a timestamp that matches no accepted format
    /// (default: false; such timestamps are dropped and logged).
    pub strict_timestamps: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_timestamps: false,
        }
    }
}
