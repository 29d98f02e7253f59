use crate::geometry::{Dimensions, Rect};
use crate::tree::{BoxTree, NodeIndex};

/// Left/right envelope of a subtree as a function of Y.
///
/// The envelope is a sorted list of disjoint vertical bands, each carrying
/// the outermost left and right X seen over its span. Strategies consult the
/// envelope instead of raw rectangles, which keeps sibling packing linear in
/// the number of placed branches per level.
#[derive(Debug, Clone, Default)]
pub struct Boundary {
    bands: Vec<Band>,
    /// Extra vertical clearance applied around every merged rectangle.
    margin: f64,
}

#[derive(Debug, Clone, Copy)]
struct Band {
    from: f64,
    to: f64,
    left: f64,
    right: f64,
}

impl Boundary {
    pub fn new(margin: f64) -> Self {
        Self {
            bands: Vec::new(),
            margin,
        }
    }

    pub fn clear(&mut self) {
        self.bands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Extends the envelope with a rectangle, widening its band vertically by
    /// the configured margin.
    pub fn merge(&mut self, rect: Rect) {
        self.merge_span(
            rect.top() - self.margin,
            rect.bottom() + self.margin,
            rect.left(),
            rect.right(),
        );
    }

    /// Union with another boundary. The other boundary's bands already carry
    /// their margin, so none is re-applied.
    pub fn merge_from(&mut self, other: &Boundary) {
        for band in other.bands.clone() {
            self.merge_span(band.from, band.to, band.left, band.right);
        }
    }

    fn merge_span(&mut self, from: f64, to: f64, left: f64, right: f64) {
        if to <= from {
            return;
        }
        let mut out: Vec<Band> = Vec::with_capacity(self.bands.len() + 2);
        let mut cursor = from;
        for mut band in self.bands.drain(..) {
            if cursor < to && cursor < band.from {
                let piece_to = to.min(band.from);
                out.push(Band {
                    from: cursor,
                    to: piece_to,
                    left,
                    right,
                });
                cursor = piece_to;
            }
            if to <= band.from || cursor >= band.to {
                out.push(band);
                continue;
            }
            if band.from < cursor {
                out.push(Band { to: cursor, ..band });
                band.from = cursor;
            }
            if band.to > to {
                out.push(Band {
                    from: band.from,
                    to,
                    left: band.left.min(left),
                    right: band.right.max(right),
                });
                out.push(Band { from: to, ..band });
                cursor = to;
            } else {
                out.push(Band {
                    left: band.left.min(left),
                    right: band.right.max(right),
                    ..band
                });
                cursor = band.to;
            }
        }
        if cursor < to {
            out.push(Band {
                from: cursor,
                to,
                left,
                right,
            });
        }
        self.bands = out;
    }

    /// Minimum rightward shift of `other` so that, wherever the two envelopes
    /// share a vertical span, `other` clears this one by at least `spacing`.
    pub fn compute_overlap(&self, other: &Boundary, spacing: f64) -> f64 {
        let mut offset = 0.0_f64;
        let (mut i, mut j) = (0, 0);
        while i < self.bands.len() && j < other.bands.len() {
            let a = self.bands[i];
            let b = other.bands[j];
            let lo = a.from.max(b.from);
            let hi = a.to.min(b.to);
            if hi - lo > f64::EPSILON {
                offset = offset.max(a.right + spacing - b.left);
            }
            if a.to <= b.to {
                i += 1;
            } else {
                j += 1;
            }
        }
        offset.max(0.0)
    }

    /// Shifts the whole envelope horizontally.
    pub fn translate_h(&mut self, dx: f64) {
        for band in &mut self.bands {
            band.left += dx;
            band.right += dx;
        }
    }

    /// Enclosing rectangle of the envelope; zero when empty.
    pub fn bounding_rect(&self) -> Rect {
        let mut h = Dimensions::min_max();
        let mut v = Dimensions::min_max();
        for band in &self.bands {
            h = h + Dimensions::new(band.left, band.right);
            v = v + Dimensions::new(band.from, band.to);
        }
        if h.is_empty() || v.is_empty() {
            return Rect::default();
        }
        Rect::from_coords(h.from, v.from, h.len(), v.len())
    }

    /// Clears the envelope and re-merges the rect of every layout-affecting,
    /// non-special node in the branch.
    pub fn reload_from_branch(&mut self, tree: &BoxTree, root: NodeIndex) {
        self.clear();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let node = tree.node(idx);
            if node.element.affects_layout && !node.element.is_special {
                self.merge(node.state.rect());
            }
            if let Some(assistants_root) = node.assistants_root {
                stack.push(assistants_root);
            }
            stack.extend(node.children.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band_count(boundary: &Boundary) -> usize {
        boundary.bands.len()
    }

    #[test]
    fn merge_single_rect() {
        let mut b = Boundary::new(0.0);
        b.merge(Rect::from_coords(10.0, 0.0, 30.0, 20.0));
        assert_eq!(b.bounding_rect(), Rect::from_coords(10.0, 0.0, 30.0, 20.0));
        assert_eq!(band_count(&b), 1);
    }

    #[test]
    fn overlapping_merge_splits_bands() {
        let mut b = Boundary::new(0.0);
        b.merge(Rect::from_coords(0.0, 0.0, 10.0, 20.0));
        b.merge(Rect::from_coords(20.0, 10.0, 10.0, 20.0));
        // 0..10 left band, 10..20 merged, 20..30 tail
        assert_eq!(band_count(&b), 3);
        assert_eq!(b.bounding_rect(), Rect::from_coords(0.0, 0.0, 30.0, 30.0));
    }

    #[test]
    fn compute_overlap_requires_shared_span() {
        let mut a = Boundary::new(0.0);
        a.merge(Rect::from_coords(0.0, 0.0, 40.0, 20.0));
        let mut b = Boundary::new(0.0);
        b.merge(Rect::from_coords(0.0, 30.0, 40.0, 20.0));
        assert_eq!(a.compute_overlap(&b, 5.0), 0.0);

        let mut c = Boundary::new(0.0);
        c.merge(Rect::from_coords(10.0, 10.0, 40.0, 20.0));
        // bands overlap over 10..20; c must clear a.right=40 by 5
        assert_eq!(a.compute_overlap(&c, 5.0), 35.0);
    }

    #[test]
    fn margin_widens_bands_vertically() {
        let mut a = Boundary::new(4.0);
        a.merge(Rect::from_coords(0.0, 0.0, 10.0, 10.0));
        let mut b = Boundary::new(4.0);
        b.merge(Rect::from_coords(0.0, 12.0, 10.0, 10.0));
        // 10+4 overlaps 12-4, so the margin forces a separation offset
        assert!(a.compute_overlap(&b, 0.0) > 0.0);
    }

    #[test]
    fn translate_shifts_every_band() {
        let mut b = Boundary::new(0.0);
        b.merge(Rect::from_coords(0.0, 0.0, 10.0, 10.0));
        b.translate_h(15.0);
        assert_eq!(b.bounding_rect(), Rect::from_coords(15.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn merge_from_unions_envelopes() {
        let mut a = Boundary::new(0.0);
        a.merge(Rect::from_coords(0.0, 0.0, 10.0, 10.0));
        let mut b = Boundary::new(0.0);
        b.merge(Rect::from_coords(-5.0, 5.0, 10.0, 10.0));
        a.merge_from(&b);
        assert_eq!(a.bounding_rect(), Rect::from_coords(-5.0, 0.0, 15.0, 15.0));
    }
}
