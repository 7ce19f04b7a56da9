//! Document provider backed by Pdfium.

mod geometry;
mod location;
#[cfg(feature = "pdf")]
mod pdfium;

pub use geometry::normalize_rect;
pub use location::resolve_location;
#[cfg(feature = "pdf")]
pub use pdfium::PdfiumProvider;
