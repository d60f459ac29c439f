//! Tab-width column correction
//!
//! The tool reports columns with tabs expanded to a width of 8; editor
//! buffers count a tab as one column. Shifting right adds 7 per tab
//! before the position, unshifting walks the line to invert it exactly.

use crate::types::Point;

const TAB_EXTRA: u32 = 7;

/// Editor column → tool column for one line
pub fn tab_shift_column(line: &str, column: u32) -> u32 {
    let tabs = line
        .chars()
        .take(column as usize)
        .filter(|&c| c == '\t')
        .count() as u32;
    column + TAB_EXTRA * tabs
}

/// Tool column → editor column for one line; exact inverse of
/// [`tab_shift_column`] for any column on the line
pub fn tab_unshift_column(line: &str, column: u32) -> u32 {
    let mut shifted = 0u32;
    let mut editor_column = 0u32;
    for c in line.chars() {
        if shifted >= column {
            return editor_column;
        }
        shifted += if c == '\t' { TAB_EXTRA + 1 } else { 1 };
        editor_column += 1;
    }
    // past end of line: remaining columns are untabbed
    editor_column + column.saturating_sub(shifted)
}

/// Editor point → tool point against the buffer's text
pub fn tab_shift_point(text: &str, point: Point) -> Point {
    let line = text.split('\n').nth(point.row as usize).unwrap_or("");
    Point::new(point.row, tab_shift_column(line, point.column))
}

/// Tool point → editor point against the buffer's text
pub fn tab_unshift_point(text: &str, point: Point) -> Point {
    let line = text.split('\n').nth(point.row as usize).unwrap_or("");
    Point::new(point.row, tab_unshift_column(line, point.column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_tabs_is_identity() {
        assert_eq!(tab_shift_column("plain line", 4), 4);
        assert_eq!(tab_unshift_column("plain line", 4), 4);
    }

    #[test]
    fn test_leading_tab_shifts_by_seven() {
        assert_eq!(tab_shift_column("\tfoo", 0), 0);
        assert_eq!(tab_shift_column("\tfoo", 1), 8);
        assert_eq!(tab_shift_column("\tfoo", 2), 9);
    }

    #[test]
    fn test_unshift_inverts_leading_tab() {
        assert_eq!(tab_unshift_column("\tfoo", 8), 1);
        assert_eq!(tab_unshift_column("\tfoo", 9), 2);
        assert_eq!(tab_unshift_column("\tfoo", 0), 0);
    }

    #[test]
    fn test_point_helpers_pick_the_right_row() {
        let text = "no tabs\n\tindented";
        assert_eq!(tab_shift_point(text, Point::new(0, 3)), Point::new(0, 3));
        assert_eq!(tab_shift_point(text, Point::new(1, 2)), Point::new(1, 9));
        assert_eq!(tab_unshift_point(text, Point::new(1, 9)), Point::new(1, 2));
    }

    proptest! {
        /// unshift(shift(p)) == p for any column on any tabbed line
        #[test]
        fn prop_unshift_inverts_shift(
            segments in prop::collection::vec("[a-z]{0,4}", 0..6),
            column in 0u32..24,
        ) {
            let line = segments.join("\t");
            let column = column.min(line.chars().count() as u32);
            let shifted = tab_shift_column(&line, column);
            prop_assert_eq!(tab_unshift_column(&line, shifted), column);
        }
    }
}
