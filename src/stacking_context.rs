/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use api::LayoutTransform;
use crate::util::MatrixHelpers;

/// Tracks what the enclosing stacking contexts do to content painted
/// inside them, so cached rasters are produced at the resolution they
/// will be composited at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StackingContextHelper {
    inherited_scale: (f32, f32),
}

impl StackingContextHelper {
    pub fn root() -> StackingContextHelper {
        StackingContextHelper {
            inherited_scale: (1.0, 1.0),
        }
    }

    /// The helper for a stacking context established with `transform`.
    /// Non-2D transforms stop scale propagation; their content is
    /// rasterized at the scale of the parent.
    pub fn child(&self, transform: Option<&LayoutTransform>) -> StackingContextHelper {
        match transform {
            Some(t) if t.is_2d() => {
                let t2d = t.to_2d();
                let (sx, sy) = t2d.scale_factors();
                let scale = |s: f32, parent: f32| if s > 0.0 && s.is_finite() { s * parent } else { parent };
                StackingContextHelper {
                    inherited_scale: (scale(sx, self.inherited_scale.0), scale(sy, self.inherited_scale.1)),
                }
            }
            Some(_) | None => *self,
        }
    }

    pub fn inherited_scale(&self) -> (f32, f32) {
        self.inherited_scale
    }

    /// A single scale good enough for both axes.
    pub fn uniform_scale(&self) -> f32 {
        self.inherited_scale.0.max(self.inherited_scale.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_accumulate() {
        let root = StackingContextHelper::root();
        let twice = LayoutTransform::scale(2.0, 2.0, 1.0);
        let helper = root.child(Some(&twice)).child(Some(&LayoutTransform::scale(1.5, 3.0, 1.0)));
        assert_eq!(helper.inherited_scale(), (3.0, 6.0));
        assert_eq!(helper.uniform_scale(), 6.0);
    }

    #[test]
    fn perspective_keeps_parent_scale() {
        let helper = StackingContextHelper::root().child(Some(&LayoutTransform::scale(2.0, 2.0, 1.0)));
        let child = helper.child(Some(&LayoutTransform::perspective(100.0)));
        assert_eq!(child.inherited_scale(), (2.0, 2.0));
        assert_eq!(helper.child(None), helper);
    }
}
