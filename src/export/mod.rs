//! Result exporters.
//!
//! Each submodule serializes the final record list into one target format:
//! flat CSV for spreadsheets, BibTeX for LaTeX workflows, and Zotero items
//! (local JSON or pushed straight into a library via the write API).

pub mod bibtex;
pub mod csv;
pub mod zotero;
