//! Auto-layout policies for containers.
//!
//! A container with an [`AutoLayout`] owns the positions of its children:
//! `arrange` turns the children's sizes into offsets inside the container.
//! Stacks run along one axis; grids wrap after a fixed column count.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    #[default]
    Column,
    Row,
    Grid {
        cols: u32,
    },
}

/// Cross-axis placement for stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutAlign {
    #[default]
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AutoLayout {
    #[serde(default)]
    pub direction: LayoutDirection,
    #[serde(default)]
    pub gap: f64,
    #[serde(default)]
    pub padding: f64,
    #[serde(default)]
    pub align: LayoutAlign,
    /// Grow or shrink the container to hug its content.
    #[serde(default)]
    pub hug_contents: bool,
}

/// Result of [`AutoLayout::arrange`].
#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    /// Top-left offset of each child, in input order.
    pub positions: Vec<(f64, f64)>,
    /// Size that exactly fits the content plus padding.
    pub content_size: (f64, f64),
}

impl AutoLayout {
    pub fn column(gap: f64, padding: f64) -> Self {
        Self {
            direction: LayoutDirection::Column,
            gap,
            padding,
            ..Default::default()
        }
    }

    pub fn row(gap: f64, padding: f64) -> Self {
        Self {
            direction: LayoutDirection::Row,
            gap,
            padding,
            ..Default::default()
        }
    }

    pub fn grid(cols: u32, gap: f64, padding: f64) -> Self {
        Self {
            direction: LayoutDirection::Grid { cols },
            gap,
            padding,
            ..Default::default()
        }
    }

    /// Lay out children of the given `sizes`. `container` is the current
    /// container size, used for cross-axis alignment; `None` aligns within
    /// the content box.
    pub fn arrange(&self, sizes: &[(f64, f64)], container: Option<(f64, f64)>) -> Arrangement {
        let pad = self.padding;
        let mut positions = Vec::with_capacity(sizes.len());

        match self.direction {
            LayoutDirection::Column | LayoutDirection::Row => {
                let column = self.direction == LayoutDirection::Column;
                let cross_content = sizes
                    .iter()
                    .map(|&(w, h)| if column { w } else { h })
                    .fold(0.0_f64, f64::max);
                let cross_avail = match container {
                    Some((w, h)) => (if column { w } else { h }) - pad * 2.0,
                    None => cross_content,
                };
                let mut main = pad;
                for &(w, h) in sizes {
                    let (along, across) = if column { (h, w) } else { (w, h) };
                    let offset = match self.align {
                        LayoutAlign::Start => 0.0,
                        LayoutAlign::Center => (cross_avail - across) / 2.0,
                        LayoutAlign::End => cross_avail - across,
                    };
                    positions.push(if column {
                        (pad + offset, main)
                    } else {
                        (main, pad + offset)
                    });
                    main += along + self.gap;
                }
                let main_len = if sizes.is_empty() {
                    pad * 2.0
                } else {
                    main - self.gap + pad
                };
                let cross_len = cross_content + pad * 2.0;
                let content_size = if column {
                    (cross_len, main_len)
                } else {
                    (main_len, cross_len)
                };
                Arrangement {
                    positions,
                    content_size,
                }
            }
            LayoutDirection::Grid { cols } => {
                let cols = cols.max(1) as usize;
                let mut x = pad;
                let mut y = pad;
                let mut row_height = 0.0_f64;
                let mut max_x = pad;
                for (i, &(w, h)) in sizes.iter().enumerate() {
                    positions.push((x, y));
                    max_x = max_x.max(x + w);
                    row_height = row_height.max(h);
                    if (i + 1) % cols == 0 {
                        x = pad;
                        y += row_height + self.gap;
                        row_height = 0.0;
                    } else {
                        x += w + self.gap;
                    }
                }
                let bottom = if sizes.len() % cols == 0 && !sizes.is_empty() {
                    y - self.gap
                } else {
                    y + row_height
                };
                Arrangement {
                    positions,
                    content_size: (max_x + pad, bottom + pad),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_stacks_with_gap_and_padding() {
        let layout = AutoLayout::column(10.0, 5.0);
        let out = layout.arrange(&[(50.0, 20.0), (30.0, 40.0)], None);
        assert_eq!(out.positions, vec![(5.0, 5.0), (5.0, 35.0)]);
        assert_eq!(out.content_size, (60.0, 80.0));
    }

    #[test]
    fn row_centers_on_cross_axis() {
        let layout = AutoLayout {
            align: LayoutAlign::Center,
            ..AutoLayout::row(4.0, 0.0)
        };
        let out = layout.arrange(&[(10.0, 10.0), (10.0, 30.0)], None);
        assert_eq!(out.positions, vec![(0.0, 10.0), (14.0, 0.0)]);
        assert_eq!(out.content_size, (24.0, 30.0));
    }

    #[test]
    fn end_alignment_uses_container_size() {
        let layout = AutoLayout {
            align: LayoutAlign::End,
            ..AutoLayout::column(0.0, 10.0)
        };
        let out = layout.arrange(&[(20.0, 20.0)], Some((100.0, 100.0)));
        assert_eq!(out.positions, vec![(70.0, 10.0)]);
    }

    #[test]
    fn grid_wraps_rows() {
        let layout = AutoLayout::grid(2, 5.0, 0.0);
        let out = layout.arrange(&[(10.0, 10.0), (10.0, 20.0), (10.0, 10.0)], None);
        assert_eq!(out.positions, vec![(0.0, 0.0), (15.0, 0.0), (0.0, 25.0)]);
        assert_eq!(out.content_size, (25.0, 35.0));
    }

    #[test]
    fn empty_container_is_just_padding() {
        let out = AutoLayout::column(8.0, 6.0).arrange(&[], None);
        assert!(out.positions.is_empty());
        assert_eq!(out.content_size, (12.0, 12.0));
    }
}
