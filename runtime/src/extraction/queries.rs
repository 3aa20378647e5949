//! Page queries evaluated inside the rendered listing.
//!
//! [`super::replay::ReplayPage`] recognises these exact strings and answers
//! them from captured HTML, so any change here must be mirrored there.

/// Row selector shared by the live query and its offline counterpart.
pub const ROW_SELECTOR: &str = r#".table-wrap tr, [data-testid="pair-table"] tr, .token-list > div"#;

/// Cell selector inside a row.
pub const CELL_SELECTOR: &str = r#"td, div[role="cell"]"#;

/// Every listing row as `{ href, cells: [text, ...] }`.
pub const ROWS_QUERY_JS: &str = r#"(() => Array.from(document.querySelectorAll('.table-wrap tr, [data-testid="pair-table"] tr, .token-list > div')).map(row => {
  const link = row.querySelector('a');
  return {
    href: link ? (link.href || '') : '',
    cells: Array.from(row.querySelectorAll('td, div[role="cell"]')).map(c => (c.textContent || '').trim())
  };
}))()"#;

/// Text of every `<script>` element.
pub const SCRIPT_TEXTS_JS: &str =
    r#"Array.from(document.querySelectorAll('script')).map(s => s.textContent || '')"#;

/// Visible body text, used for challenge-page detection.
pub const BODY_TEXT_JS: &str = r#"document.body ? (document.body.textContent || '') : ''"#;
