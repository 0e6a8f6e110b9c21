// Error taxonomy for the screen storage engine.
//
// Mirrors the teacher's pattern of one `thiserror`-derived enum per concern,
// aggregated behind a crate-level `Result<T>` alias, but scoped to the two
// failure classes the engine actually has: allocation failure and integrity
// violation (see spec.md "ERROR HANDLING DESIGN").

use thiserror::Error;

/// Violations detected by [`crate::page::Page::verify_integrity`].
///
/// Returned as a closed, tagged variant (rather than a string) so tests can
/// pin the exact violation kind.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityViolation {
    #[error("page has zero rows")]
    ZeroRowCount,
    #[error("page has zero columns")]
    ZeroColCount,
    #[error("row has a grapheme cell but row.grapheme is false")]
    UnmarkedGraphemeRow,
    #[error("cell tagged codepoint_grapheme has no grapheme map entry")]
    MissingGraphemeData,
    #[error("grapheme slice length is not a positive multiple of the chunk size")]
    InvalidGraphemeCount,
    #[error("cell references a style id with no live entry in the style set")]
    MissingStyle,
    #[error("row has a styled cell but row.styled is false")]
    UnmarkedStyleRow,
    #[error("style ref count does not match the number of cells referencing it")]
    MismatchedStyleRef,
    #[error("style set ref-count bookkeeping is internally inconsistent")]
    InvalidStyleCount,
    #[error("spacer_tail cell does not immediately follow a wide cell")]
    InvalidSpacerTailLocation,
    #[error("spacer_head cell is not the last column of a wrapped row")]
    InvalidSpacerHeadLocation,
    #[error("spacer_head present on a row with wrap = false")]
    UnwrappedSpacerHead,
}

/// Errors raised by [`crate::page::Page`] operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageError {
    /// The grapheme arena, style set, or row/cell capacity is full and the
    /// operation cannot proceed without a larger page.
    #[error("page out of memory")]
    OutOfMemory,

    /// A requested capacity could not be laid out at all (e.g. a column
    /// count wide enough that zero rows fit in the byte budget).
    #[error("requested capacity cannot be laid out")]
    LayoutInfeasible,

    /// Raised only from `verify_integrity`.
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),
}

/// Errors raised by [`crate::pagelist::PageList`] operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageListError {
    #[error(transparent)]
    Page(#[from] PageError),

    /// `resize` was asked for a column count that leaves no feasible page
    /// layout; propagated from `Capacity::adjust`.
    #[error("resize is infeasible at the requested column count")]
    ResizeInfeasible,
}

impl From<IntegrityViolation> for PageListError {
    fn from(v: IntegrityViolation) -> Self {
        PageListError::Page(PageError::Integrity(v))
    }
}

pub type Result<T> = std::result::Result<T, PageListError>;
pub type PageResult<T> = std::result::Result<T, PageError>;
