use scd::error::ScdError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type MergerResult<T> = Result<T, MergerError>;

/// Backtrace captured when an infrastructure error is wrapped.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the merger binary.
///
/// Merge failures keep their [`ScdError`]; everything around them is wrapped with a backtrace.
#[derive(Debug)]
pub enum MergerError {
    /// Parsing, history or store error raised while merging.
    Scd(ScdError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// Failure to connect to the database.
    Database(sqlx::Error, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl MergerError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            MergerError::Scd(_) => "merge error",
            MergerError::Config(_, _) => "configuration error",
            MergerError::Database(_, _) => "database error",
            MergerError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            MergerError::Scd(err) => err.backtrace(),
            MergerError::Config(_, backtrace)
            | MergerError::Database(_, backtrace)
            | MergerError::Io(_, backtrace) => Some(&backtrace.0),
        }
    }

    /// Creates a configuration error from any error type.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        MergerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a report for terminal output, with the cause chain and, if enabled, the backtrace.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("merger failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        // Aggregated errors already list every member in their display output.
        if !matches!(self, MergerError::Scd(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for MergerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergerError::Scd(err) => write!(f, "{err}"),
            MergerError::Config(source, _) => write!(f, "configuration error: {source}"),
            MergerError::Database(source, _) => write!(f, "database error: {source}"),
            MergerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for MergerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MergerError::Scd(err) => err.source(),
            MergerError::Config(source, _) => Some(source.as_ref()),
            MergerError::Database(source, _) => Some(source),
            MergerError::Io(source, _) => Some(source),
        }
    }
}

impl From<ScdError> for MergerError {
    fn from(err: ScdError) -> Self {
        MergerError::Scd(err)
    }
}

impl From<sqlx::Error> for MergerError {
    fn from(err: sqlx::Error) -> Self {
        MergerError::Database(err, CapturedBacktrace::capture())
    }
}

impl From<std::io::Error> for MergerError {
    fn from(err: std::io::Error) -> Self {
        MergerError::Io(err, CapturedBacktrace::capture())
    }
}
