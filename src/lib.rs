//! # stilo
//!
//! An XSLT 1.0 processor: a stylesheet compiler and tree-walking
//! interpreter, with its own XML document tree and XPath 1.0 engine.
//!
//! ```no_run
//! use stilo::{dom, Stylesheet, StylesheetOptions};
//!
//! # fn main() -> stilo::Result<()> {
//! let style_doc = dom::parse_str(r#"<xsl:stylesheet version="1.0"
//!     xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
//!     <xsl:template match="/"><hi/></xsl:template>
//! </xsl:stylesheet>"#, None)?;
//! let stylesheet = Stylesheet::parse(style_doc, "inline.xsl")?;
//!
//! let input = dom::parse_str("<doc/>", None)?;
//! let output = stylesheet.process(&input, &StylesheetOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod dom;
pub mod error;
pub mod xpath;
pub mod xslt;

pub use error::{Error, Result};
pub use xslt::{Stylesheet, StylesheetOptions};
