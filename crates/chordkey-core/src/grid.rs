use crate::types::{KeyCoord, Point, Rect, Side};
use serde::{Deserialize, Serialize};

/// Grid dimensions of both panes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dimensions {
    pub left_cols: u8,
    pub right_cols: u8,
    pub rows: u8,
    /// Width of a single key in pixels.
    pub key_width: f64,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            left_cols: 5,
            right_cols: 5,
            rows: 2,
            key_width: 50.0,
        }
    }
}

impl Dimensions {
    pub fn cols(&self, side: Side) -> u8 {
        match side {
            Side::Left => self.left_cols,
            Side::Right => self.right_cols,
        }
    }

    /// Whether `key` names a cell that exists in these dimensions.
    pub fn contains(&self, key: KeyCoord) -> bool {
        key.col < self.cols(key.side) && key.row < self.rows
    }
}

/// One hand zone, a rectangle split into `cols` x `rows` equal cells.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pane {
    pub rect: Rect,
    pub cols: u8,
    pub rows: u8,
    key_width: f64,
    key_height: f64,
}

impl Pane {
    pub fn new(rect: Rect, cols: u8, rows: u8) -> Self {
        let mut pane = Self::default();
        pane.update_layout(rect, cols, rows);
        pane
    }

    pub fn update_layout(&mut self, rect: Rect, cols: u8, rows: u8) {
        self.rect = rect;
        self.cols = cols.max(1);
        self.rows = rows.max(1);
        self.key_width = rect.w / f64::from(self.cols);
        self.key_height = rect.h / f64::from(self.rows);
    }

    pub fn key_rect(&self, col: u8, row: u8) -> Rect {
        Rect::new(
            self.rect.x + self.key_width * f64::from(col),
            self.rect.y + self.key_height * f64::from(row),
            self.key_width,
            self.key_height,
        )
    }

    /// Cell under `p`, clamped into the grid.
    pub fn find_key(&self, p: Point) -> (u8, u8) {
        (
            clamp_cell((p.x - self.rect.x) / self.key_width, self.cols),
            clamp_cell((p.y - self.rect.y) / self.key_height, self.rows),
        )
    }
}

fn clamp_cell(v: f64, count: u8) -> u8 {
    if !v.is_finite() || v < 0.0 {
        return 0;
    }
    // Truncation toward zero, then clamp to the last cell.
    (v as u64).min(u64::from(count - 1)) as u8
}

/// Maps continuous coordinates to key coordinates over both panes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpatialGrid {
    panes: [Pane; 2],
    mid_rect: Rect,
}

impl SpatialGrid {
    pub fn pane(&self, side: Side) -> &Pane {
        &self.panes[side.index()]
    }

    /// Gap between the two panes.
    pub fn mid_rect(&self) -> Rect {
        self.mid_rect
    }

    /// Lays the panes out against the left and right edges of `rect`,
    /// each `key_width` wide per column and spanning the full height.
    pub fn calculate_layout(&mut self, rect: Rect, dim: &Dimensions) {
        let left_len = f64::from(dim.left_cols) * dim.key_width;
        let right_len = f64::from(dim.right_cols) * dim.key_width;

        self.panes[Side::Left.index()].update_layout(
            Rect::new(rect.x, rect.y, left_len, rect.h),
            dim.left_cols,
            dim.rows,
        );

        let rpos = rect.x + rect.w - right_len;
        self.panes[Side::Right.index()].update_layout(
            Rect::new(rpos, rect.y, right_len, rect.h),
            dim.right_cols,
            dim.rows,
        );

        self.mid_rect = Rect::new(rect.x + left_len, rect.y, rpos - left_len - rect.x, rect.h);
    }

    /// Key under `p`, or `None` when the point is outside both panes.
    pub fn find_key(&self, p: Point) -> Option<KeyCoord> {
        Side::ALL.into_iter().find_map(|side| {
            let pane = self.pane(side);
            if pane.rect.contains(p) {
                let (col, row) = pane.find_key(p);
                Some(KeyCoord::new(side, col, row))
            } else {
                None
            }
        })
    }

    pub fn key_rect(&self, key: KeyCoord) -> Rect {
        self.pane(key.side).key_rect(key.col, key.row)
    }

    pub fn key_center(&self, key: KeyCoord) -> Point {
        let r = self.key_rect(key);
        Point::new(r.x + r.w / 2.0, r.y + r.h / 2.0)
    }

    /// All keys whose cells intersect `area`, for partial redraws.
    pub fn keys_in(&self, area: &Rect) -> Vec<KeyCoord> {
        let mut keys = Vec::new();
        for side in Side::ALL {
            let pane = self.pane(side);
            if !pane.rect.intersects(area) {
                continue;
            }
            let (c0, r0) = pane.find_key(Point::new(area.x, area.y));
            let (c1, r1) = pane.find_key(Point::new(area.x + area.w, area.y + area.h));
            for col in c0..=c1 {
                for row in r0..=r1 {
                    keys.push(KeyCoord::new(side, col, row));
                }
            }
        }
        keys
    }
}
