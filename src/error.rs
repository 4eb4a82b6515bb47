use thiserror::Error;

/// Errors produced while compiling a stylesheet or running a transformation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    Parse(String),

    #[error("Quick-XML error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    #[error("stylesheet compilation error: {0}")]
    Compile(String),

    #[error("XPath parse error in '{expr}': {message}")]
    XPathParse { expr: String, message: String },

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("transformation terminated: {0}")]
    Terminated(String),

    #[error("transformation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Error::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
