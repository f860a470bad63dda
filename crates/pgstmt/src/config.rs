//! Build options and SQL logging.

use crate::dedup::EqualityMode;
use crate::param::BuiltQuery;
use tracing::Level;

/// Options applied when a query builder assembles its final SQL.
///
/// By default values are deduplicated in strict mode and built SQL is logged at
/// `DEBUG`, truncated to 200 bytes.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Equality used by deduplication.
    pub equality: EqualityMode,
    /// Whether the final query is deduplicated.
    pub dedupe: bool,
    /// Whether built SQL is emitted as a tracing event.
    pub log_sql: bool,
    /// Tracing event level.
    pub level: Level,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_log_length: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            equality: EqualityMode::Strict,
            dedupe: true,
            log_sql: true,
            level: Level::DEBUG,
            max_sql_log_length: Some(200),
        }
    }
}

impl BuildOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the equality mode used by deduplication.
    pub fn with_equality(mut self, mode: EqualityMode) -> Self {
        self.equality = mode;
        self
    }

    /// Use deep structural equality when deduplicating.
    pub fn deep(self) -> Self {
        self.with_equality(EqualityMode::Deep)
    }

    /// Skip deduplication of the final query.
    pub fn without_dedupe(mut self) -> Self {
        self.dedupe = false;
        self
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_log_length(mut self, len: usize) -> Self {
        self.max_sql_log_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_log_length = None;
        self
    }

    /// Disable SQL logging.
    pub fn quiet(mut self) -> Self {
        self.log_sql = false;
        self
    }

    /// Emit a tracing event for a built query.
    pub(crate) fn log(&self, kind: &'static str, built: &BuiltQuery) {
        if !self.log_sql {
            return;
        }

        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = truncate_sql(&built.sql, self.max_sql_log_length);
        emit_at_level!(
            self.level,
            target: "pgstmt.sql",
            kind,
            param_count = built.param_count(),
            sql = %sql,
        );
    }
}

/// Cut `sql` to at most `max` bytes on a char boundary, marking the cut with `...`.
pub(crate) fn truncate_sql(sql: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while end > 0 && !sql.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &sql[..end])
        }
        _ => sql.to_string(),
    }
}
