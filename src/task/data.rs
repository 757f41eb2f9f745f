use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::host::{Graphic, Progress};
use crate::view::PropertyKind;

/// How many samples are emitted between two cancellation polls.
const POLL_EVERY: usize = 256;

/// One series produced by a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSet {
    /// Sample positions, the sample index is used when empty.
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Per-sample colour values, used by multicolor graphics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Overrides the task's graphic type code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphic_type: Option<u8>,
    /// Value range of this series alone, see `limits` on the task for the
    /// range of a whole view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<[f64; 2]>,
}

impl DataSet {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Vec<f64>) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_graphic_type(mut self, code: u8) -> Self {
        self.graphic_type = Some(code);
        self
    }

    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.limits = Some([min, max]);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Index of the first sample whose position or value is not a finite
    /// number. Samples past the end of a non-empty `x` are never drawn and
    /// aren't checked.
    pub fn first_invalid(&self) -> Option<usize> {
        (0..self.y.len())
            .map_while(|i| self.x_at(i).map(|x| (i, x, self.y[i])))
            .find(|&(_, x, y)| !x.is_finite() || !y.is_finite())
            .map(|(i, ..)| i)
    }

    fn x_at(&self, i: usize) -> Option<f64> {
        if i >= self.y.len() {
            None
        } else if self.x.is_empty() {
            Some(i as f64)
        } else {
            self.x.get(i).copied()
        }
    }
}

/// Drawing style after the secondary meaning of the type code was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Style {
    pub code: u8,
    pub kind: PropertyKind,
    pub step: bool,
}

impl Style {
    /// Rewrites the special type codes: `3` forces background styling, `4`
    /// switches to multicolor, `8` and `9` draw as steps with line and point
    /// type respectively. Each of them resets the code it carried.
    pub fn resolve(code: u8, background: bool, multicolor: bool) -> Self {
        let (code, background, multicolor, step) = match code {
            3 => (0, true, multicolor, false),
            4 => (0, background, true, false),
            8 => (0, background, multicolor, true),
            9 => (1, background, multicolor, true),
            other => (other, background, multicolor, false),
        };

        let kind = if background {
            PropertyKind::Area
        } else if multicolor {
            PropertyKind::Graphic
        } else {
            PropertyKind::GraphicEx
        };

        Self { code, kind, step }
    }

    pub fn is_multicolor(&self) -> bool {
        self.kind == PropertyKind::Graphic
    }
}

/// Adds the samples of `set` to `graphic`. Stops at the first sample that
/// is not a finite number and reports its index. Returns the number of
/// points added.
pub(crate) fn emit_points(
    graphic: &mut dyn Graphic,
    set: &DataSet,
    set_index: usize,
    style: &Style,
    progress: &dyn Progress,
) -> Result<usize, ValidationError> {
    let colors = set.color.as_deref().filter(|_| style.is_multicolor());
    let mut put = |x: f64, y: f64, i: usize| match colors {
        Some(colors) => graphic.add_color_point(x, y, colors.get(i).copied().unwrap_or(0.0)),
        None => graphic.add_point(x, y),
    };

    let invalid = |index| ValidationError::InvalidSample {
        set: set_index,
        index,
    };

    let mut added = 0;
    for (i, &y) in set.y.iter().enumerate() {
        if i % POLL_EVERY == 0 && !progress.can_continue() {
            return Err(ValidationError::Cancelled);
        }

        let Some(x) = set.x_at(i) else { break };
        if !x.is_finite() || !y.is_finite() {
            return Err(invalid(i));
        }

        put(x, y, i);
        added += 1;

        if style.step
            && let Some(next) = set.x_at(i + 1)
        {
            if !next.is_finite() {
                return Err(invalid(i + 1));
            }
            put(next, y, i);
            added += 1;
        }
    }

    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CancelToken, Quiet, Recorder, Visualization};

    fn emit(set: &DataSet, style: Style) -> (Result<usize, ValidationError>, Vec<(f64, f64)>) {
        let mut recorder = Recorder::new();
        let mut graphic = recorder.create_graphic("g", "", 0).unwrap();
        let result = emit_points(graphic.as_mut(), set, 0, &style, &Quiet::default());
        (result, recorder.graphic("g").unwrap().points)
    }

    #[test]
    fn test_resolve_special_codes() {
        assert_eq!(
            Style::resolve(3, false, false),
            Style {
                code: 0,
                kind: PropertyKind::Area,
                step: false
            }
        );
        assert_eq!(Style::resolve(4, false, false).kind, PropertyKind::Graphic);
        assert_eq!(Style::resolve(4, false, false).code, 0);
        assert_eq!(Style::resolve(4, true, false).kind, PropertyKind::Area);
        assert!(Style::resolve(8, false, false).step);
        assert_eq!(Style::resolve(9, false, false).code, 1);
        assert_eq!(
            Style::resolve(7, false, false),
            Style {
                code: 7,
                kind: PropertyKind::GraphicEx,
                step: false
            }
        );
    }

    #[test]
    fn test_invalid_sample_stops_emission() {
        let set = DataSet::new(vec![0.0, 1.0, 2.0], vec![1.0, f64::NAN, 3.0]);
        let (result, points) = emit(&set, Style::resolve(0, false, false));

        assert_eq!(result, Err(ValidationError::InvalidSample { set: 0, index: 1 }));
        assert_eq!(points, vec![(0.0, 1.0)]);
    }

    #[test]
    fn test_infinite_x_is_invalid() {
        let set = DataSet::new(vec![0.0, f64::INFINITY], vec![1.0, 2.0]);
        let (result, _) = emit(&set, Style::resolve(0, false, false));
        assert_eq!(result, Err(ValidationError::InvalidSample { set: 0, index: 1 }));
    }

    #[test]
    fn test_first_invalid_matches_emission() {
        let nan = DataSet::new(vec![], vec![1.0, f64::NAN, 3.0]);
        assert_eq!(nan.first_invalid(), Some(1));
        let (result, _) = emit(&nan, Style::resolve(0, false, false));
        assert_eq!(result, Err(ValidationError::InvalidSample { set: 0, index: 1 }));

        let bad_x = DataSet::new(vec![0.0, 1.0, f64::NEG_INFINITY], vec![1.0, 2.0, 3.0]);
        assert_eq!(bad_x.first_invalid(), Some(2));

        // Positions run out before the bad value, it is never drawn.
        let short = DataSet::new(vec![0.0], vec![1.0, f64::NAN]);
        assert_eq!(short.first_invalid(), None);

        assert_eq!(DataSet::new(vec![], vec![1.0, 2.0]).first_invalid(), None);
    }

    #[test]
    fn test_step_rendering() {
        let set = DataSet::new(vec![0.0, 1.0, 2.0], vec![5.0, 6.0, 7.0]);
        let (result, points) = emit(&set, Style::resolve(8, false, false));

        assert_eq!(result, Ok(5));
        assert_eq!(
            points,
            vec![(0.0, 5.0), (1.0, 5.0), (1.0, 6.0), (2.0, 6.0), (2.0, 7.0)]
        );
    }

    #[test]
    fn test_missing_x_uses_index() {
        let set = DataSet::new(vec![], vec![4.0, 5.0]);
        let (_, points) = emit(&set, Style::resolve(0, false, false));
        assert_eq!(points, vec![(0.0, 4.0), (1.0, 5.0)]);
    }

    #[test]
    fn test_multicolor_uses_point_colors() {
        let mut recorder = Recorder::new();
        let mut graphic = recorder.create_graphic("g", "", 0).unwrap();
        let set = DataSet::new(vec![0.0, 1.0], vec![1.0, 2.0]).with_color(vec![0.5]);
        let style = Style::resolve(4, false, false);

        emit_points(graphic.as_mut(), &set, 0, &style, &Quiet::default()).unwrap();
        assert_eq!(recorder.graphic("g").unwrap().point_colors, vec![0.5, 0.0]);
    }

    #[test]
    fn test_cancelled_before_first_sample() {
        let token = CancelToken::new();
        token.cancel();

        let mut recorder = Recorder::new();
        let mut graphic = recorder.create_graphic("g", "", 0).unwrap();
        let set = DataSet::new(vec![0.0], vec![1.0]);
        let result = emit_points(
            graphic.as_mut(),
            &set,
            0,
            &Style::resolve(0, false, false),
            &Quiet::new(token),
        );

        assert_eq!(result, Err(ValidationError::Cancelled));
        assert!(recorder.graphic("g").unwrap().points.is_empty());
    }
}
