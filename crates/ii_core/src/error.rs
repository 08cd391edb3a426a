use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed URL or page range. Fatal to the single call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network failure, timeout or non-2xx status for one page or article.
    #[error("Fetch error for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Expected HTML structure is missing.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The external recognizer or classifier is unreachable or answered with garbage.
    #[error("Inference unavailable: {0}")]
    InferenceUnavailable(String),

    /// A classification call failed or exceeded its time bound.
    #[error("Classification unavailable: {0}")]
    ClassificationUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message() {
        let err = Error::fetch("https://example.com/30", "status 404");
        assert_eq!(err.to_string(), "Fetch error for https://example.com/30: status 404");
    }
}
