//! Tape layout engine.
//!
//! All tickers are laid end-to-end, `ticker_box_width` pixels each, on a tape
//! that repeats forever. Every screen is a window onto that tape, shifted
//! right by its global offset (the widths of the screens to its left). Given
//! the shared scroll position, these functions decide which tickers a screen
//! must draw and at which pixel offset.
//!
//! ```text
//!  tape:    [ 1 ][ 2 ][ 3 ][ 4 ][ 1 ][ 2 ][ 3 ][ 4 ] ...
//!  screens:   [ screen 1 ][ screen 2 ]
//!             ^ global offset 0      ^ global offset = width of screen 1
//! ```
//!
//! Everything is integer pixel math with `rem_euclid`, so an ever-growing
//! scroll position never drifts and never needs to be reset. The ticker slice
//! must already be sorted and indexed (see [`crate::model::sort_and_index`]).

use uuid::Uuid;

use crate::model::{ScreenCluster, Ticker};

/// A ticker to draw and the x position (relative to the screen's left edge)
/// of its box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement<'a> {
    pub ticker: &'a Ticker,
    pub offset: i64,
}

/// Layout parameters for one screen, captured from the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapeLayout {
    box_width: i64,
    ticker_count: i64,
    screen_offset: i64,
}

impl TapeLayout {
    /// A screen that has not appeared in the cluster yet lays out as if it
    /// were the leftmost screen.
    pub fn new(cluster: &ScreenCluster, ticker_count: usize, screen: Uuid) -> Self {
        Self {
            box_width: i64::from(cluster.settings.ticker_box_width),
            ticker_count: ticker_count as i64,
            screen_offset: cluster.screen_offset(screen).unwrap_or(0),
        }
    }

    /// One period of the tape.
    pub fn tape_width(&self) -> i64 {
        self.ticker_count * self.box_width
    }

    /// Nothing can be laid out (no tickers, or a degenerate box width).
    pub fn is_empty(&self) -> bool {
        self.ticker_count <= 0 || self.box_width <= 0
    }

    /// Scroll position folded into one tape period, plus this screen's offset.
    pub fn local_offset(&self, global_offset: i64) -> i64 {
        global_offset.rem_euclid(self.tape_width()) + self.screen_offset
    }

    /// Number of tape slots any window of `viewport_width` pixels can touch.
    pub fn window_len(&self, viewport_width: i64) -> usize {
        let v = viewport_width.max(0);
        ((v + self.box_width - 1) / self.box_width + 1) as usize
    }

    /// `(position in the ticker slice, pixel offset)` for each slot of the
    /// window, left to right.
    ///
    /// The window starts at the slot under the screen's left edge and covers
    /// `ceil(viewport / box) + 1` slots; slot numbers wrap modulo the ticker
    /// count, which covers running off either end of the tape.
    pub fn window(&self, global_offset: i64, viewport_width: i64) -> Vec<(usize, i64)> {
        if self.is_empty() {
            return Vec::new();
        }
        let local = self.local_offset(global_offset);
        let first = local.div_euclid(self.box_width);

        (0..self.window_len(viewport_width) as i64)
            .map(|k| {
                let slot = first + k;
                let position = slot.rem_euclid(self.ticker_count) as usize;
                (position, slot * self.box_width - local)
            })
            .collect()
    }

    /// Pixel offset of the ticker with rank `index` on this screen.
    ///
    /// A box that lands more than one full box left of the screen edge is
    /// actually on the next lap of the tape, so it moves one period right.
    pub fn offset_of(&self, global_offset: i64, index: i32) -> i64 {
        if self.is_empty() {
            return 0;
        }
        let tape = self.tape_width();
        let raw = i64::from(index) * self.box_width - global_offset.rem_euclid(tape) - self.screen_offset;
        if raw < -self.box_width { raw + tape } else { raw }
    }
}

/// Tickers visible on `screen`, in left-to-right draw order.
pub fn visible_tickers<'a>(
    global_offset: i64,
    cluster: &ScreenCluster,
    tickers: &'a [Ticker],
    screen: Uuid,
    viewport_width: i64,
) -> Vec<&'a Ticker> {
    TapeLayout::new(cluster, tickers.len(), screen)
        .window(global_offset, viewport_width)
        .into_iter()
        .map(|(pos, _)| &tickers[pos])
        .collect()
}

/// Visible tickers together with their pixel offsets.
pub fn placements<'a>(
    global_offset: i64,
    cluster: &ScreenCluster,
    tickers: &'a [Ticker],
    screen: Uuid,
    viewport_width: i64,
) -> Vec<Placement<'a>> {
    TapeLayout::new(cluster, tickers.len(), screen)
        .window(global_offset, viewport_width)
        .into_iter()
        .map(|(pos, offset)| Placement { ticker: &tickers[pos], offset })
        .collect()
}

/// Pixel offset of `ticker` on `screen` for the given scroll position.
pub fn offset_of(
    global_offset: i64,
    cluster: &ScreenCluster,
    tickers: &[Ticker],
    ticker: &Ticker,
    screen: Uuid,
) -> i64 {
    TapeLayout::new(cluster, tickers.len(), screen).offset_of(global_offset, ticker.index)
}

/// Shared scroll position derived from wall-clock time.
///
/// Every follower computes this independently; with synchronized clocks the
/// whole wall scrolls in lockstep without per-frame messages.
pub fn scroll_offset(now_ms: i64, scroll_speed: i32) -> i64 {
    if scroll_speed <= 0 {
        return 0;
    }
    now_ms / i64::from(scroll_speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PresentationSettings, Screen, sort_and_index};

    /// Four tickers "1".."4", 500px boxes, screens of 1000px each.
    fn fixture(screen_count: usize) -> (ScreenCluster, Vec<Ticker>, Vec<Uuid>) {
        let settings = PresentationSettings { ticker_box_width: 500, ..Default::default() };
        let mut cluster = ScreenCluster::new(settings);
        let mut ids = Vec::new();
        for i in 0..screen_count {
            let s = Screen::new(1000, 100, i as i32 + 1);
            ids.push(s.uuid);
            cluster.insert(s);
        }
        let mut tickers: Vec<Ticker> = ["1", "2", "3", "4"].into_iter().map(Ticker::new).collect();
        sort_and_index(&mut tickers);
        (cluster, tickers, ids)
    }

    fn layout_of(
        g: i64,
        cluster: &ScreenCluster,
        tickers: &[Ticker],
        screen: Uuid,
    ) -> Vec<(String, i64)> {
        visible_tickers(g, cluster, tickers, screen, 1000)
            .into_iter()
            .map(|t| (t.symbol.clone(), offset_of(g, cluster, tickers, t, screen)))
            .collect()
    }

    fn expect(pairs: &[(&str, i64)]) -> Vec<(String, i64)> {
        pairs.iter().map(|(s, o)| (s.to_string(), *o)).collect()
    }

    /*  [ 1 ][ 2 ][ 3 ][ 4 ]
     *    [ screen ]          */
    #[test]
    fn first_screen_simple() {
        let (c, t, ids) = fixture(1);
        assert_eq!(layout_of(200, &c, &t, ids[0]), expect(&[("1", -200), ("2", 300), ("3", 800)]));
    }

    /*  [ 1 ][ 2 ][ 3 ][ 4 ]
     *       [ screen ]       */
    #[test]
    fn first_screen_box_aligned() {
        let (c, t, ids) = fixture(1);
        assert_eq!(layout_of(500, &c, &t, ids[0]), expect(&[("2", 0), ("3", 500), ("4", 1000)]));
    }

    /*  [ 1 ][ 2 ][ 3 ][ 4 ][ 1 ]
     *              [ screen ]    */
    #[test]
    fn first_screen_wrapping_forward() {
        let (c, t, ids) = fixture(1);
        assert_eq!(layout_of(1200, &c, &t, ids[0]), expect(&[("3", -200), ("4", 300), ("1", 800)]));
        assert_eq!(layout_of(1900, &c, &t, ids[0]), expect(&[("4", -400), ("1", 100), ("2", 600)]));
    }

    /*  [ 1 ][ 2 ][ 3 ][ 4 ][ 1 ]
     *    [ xxxxxx ][ screen ]    */
    #[test]
    fn second_screen() {
        let (c, t, ids) = fixture(2);
        assert_eq!(layout_of(200, &c, &t, ids[1]), expect(&[("3", -200), ("4", 300), ("1", 800)]));
    }

    #[test]
    fn negative_scroll_wraps_past_start() {
        let (c, t, ids) = fixture(1);
        // Same as scrolling to 1800.
        assert_eq!(layout_of(-200, &c, &t, ids[0]), expect(&[("4", -300), ("1", 200), ("2", 700)]));
    }

    #[test]
    fn unbounded_scroll_uses_modular_math() {
        let (c, t, ids) = fixture(1);
        let far = 2000 * 1_000_000_000 + 200;
        assert_eq!(layout_of(far, &c, &t, ids[0]), layout_of(200, &c, &t, ids[0]));
    }

    #[test]
    fn empty_ticker_set() {
        let (c, _, ids) = fixture(1);
        assert!(visible_tickers(12345, &c, &[], ids[0], 1000).is_empty());
        let layout = TapeLayout::new(&c, 0, ids[0]);
        assert_eq!(layout.offset_of(12345, 0), 0);
    }

    #[test]
    fn degenerate_box_width() {
        let (mut c, t, ids) = fixture(1);
        c.settings.ticker_box_width = 0;
        assert!(placements(10, &c, &t, ids[0], 1000).is_empty());
    }

    #[test]
    fn window_length_is_fixed() {
        let (c, t, ids) = fixture(2);
        for viewport in [1, 499, 500, 501, 700, 1000, 1999, 3000] {
            let want = (viewport as f64 / 500.0).ceil() as usize + 1;
            for g in (0..4000).step_by(37) {
                for id in &ids {
                    assert_eq!(
                        visible_tickers(g, &c, &t, *id, viewport).len(),
                        want,
                        "g={g} viewport={viewport}"
                    );
                }
            }
        }
    }

    #[test]
    fn window_is_contiguous_on_the_tape() {
        let (c, t, ids) = fixture(2);
        for g in (0..4000).step_by(53) {
            let window = visible_tickers(g, &c, &t, ids[1], 1000);
            for pair in window.windows(2) {
                assert_eq!((pair[0].index + 1) % 4, pair[1].index, "g={g}");
            }
        }
    }

    #[test]
    fn all_screens_cover_every_ticker_over_one_period() {
        let (c, t, ids) = fixture(2);
        let mut seen = std::collections::BTreeSet::new();
        for g in (0..2000).step_by(100) {
            for id in &ids {
                for tk in visible_tickers(g, &c, &t, *id, 1000) {
                    seen.insert(tk.symbol.clone());
                }
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn offset_is_periodic() {
        let (c, t, ids) = fixture(2);
        let tape = 2000;
        for g in (-5000..5000).step_by(61) {
            for tk in &t {
                for id in &ids {
                    assert_eq!(offset_of(g, &c, &t, tk, *id), offset_of(g + tape, &c, &t, tk, *id));
                }
            }
        }
    }

    #[test]
    fn placement_offsets_match_offset_of() {
        let (c, t, ids) = fixture(1);
        for g in (0..4000).step_by(7) {
            for p in placements(g, &c, &t, ids[0], 1000) {
                assert_eq!(p.offset, offset_of(g, &c, &t, p.ticker, ids[0]), "g={g}");
            }
        }
    }

    #[test]
    fn screen_far_along_the_wall() {
        // Third screen starts at 2000px, exactly one tape period.
        let (c, t, ids) = fixture(3);
        let got: Vec<(String, i64)> = placements(200, &c, &t, ids[2], 1000)
            .into_iter()
            .map(|p| (p.ticker.symbol.clone(), p.offset))
            .collect();
        assert_eq!(got, expect(&[("1", -200), ("2", 300), ("3", 800)]));
    }

    #[test]
    fn narrow_tape_repeats_tickers() {
        let (c, t, ids) = fixture(1);
        let two = &t[..2];
        let got: Vec<i64> = placements(0, &c, two, ids[0], 1000).iter().map(|p| p.offset).collect();
        assert_eq!(got, vec![0, 500, 1000]);
    }

    #[test]
    fn scroll_offset_from_clock() {
        assert_eq!(scroll_offset(16_000, 16), 1000);
        assert_eq!(scroll_offset(16_000, 0), 0);
    }
}
