use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    /// The target handed to `enumerate` is not a syntactically valid domain.
    /// This is the only failure surfaced to callers before network work.
    InvalidDomain(String),

    CliUsage(String),

    /// A passive source answered with something we could not use.
    InvalidHttpResponse(String),

    /// A passive source failed or timed out; caught at the fan-out boundary.
    SourceUnavailable(String),

    #[from]
    Io(std::io::Error),

    #[from]
    Fmt(std::fmt::Error),

    #[from]
    SystemTime(std::time::SystemTimeError),

    #[from]
    Reqwest(reqwest::Error),

    #[from]
    Json(serde_json::Error),
}

// region:    --- Error Boilerplate

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate
