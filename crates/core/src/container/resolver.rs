use std::sync::Arc;

/// Chain of tokens currently under construction, outermost first
///
/// Every factory receives a container handle carrying the path that led to
/// it, so re-entering a token already on the path is reported instead of
/// recursing forever.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    tokens: Arc<Vec<String>>,
    /// Tokens on the path whose shared singleton cell this chain is filling
    cells: Arc<Vec<String>>,
}

impl ResolutionPath {
    /// Create a new, empty resolution path
    pub fn new() -> Self {
        Self::default()
    }

    /// Path extended with `token`
    pub fn with(&self, token: &str) -> Self {
        let mut tokens = Vec::with_capacity(self.tokens.len() + 1);
        tokens.extend(self.tokens.iter().cloned());
        tokens.push(token.to_string());
        Self {
            tokens: Arc::new(tokens),
            cells: self.cells.clone(),
        }
    }

    /// Path extended with `token`, whose singleton cell this chain now holds
    pub fn with_cell(&self, token: &str) -> Self {
        let mut extended = self.with(token);
        let mut cells = Vec::with_capacity(self.cells.len() + 1);
        cells.extend(self.cells.iter().cloned());
        cells.push(token.to_string());
        extended.cells = Arc::new(cells);
        extended
    }

    /// Check if the path contains a token (for cycle detection)
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Position of `token` on the path, outermost first
    pub fn position(&self, token: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t == token)
    }

    /// Singleton tokens this chain is constructing
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn depth(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Get the path as a string for error messages
    pub fn path_string(&self) -> String {
        self.tokens.join(" -> ")
    }
}
