use tracing::debug;

use crate::error::ValidationError;
use crate::params::{ParamField, ParameterPatch, ViewportParameters, ZoomFactor};

/// The most recently produced image, as referenced by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Filename under the service's static image path.
    pub filename: String,
    pub width_px: u32,
    pub height_px: u32,
    /// Service-reported duration, verbatim (e.g. `"0.412 sec"`).
    pub elapsed: Option<String>,
}

/// Display-only state kept alongside the viewport parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub image: Option<ImageInfo>,
    pub active_palette: Option<String>,
}

/// Single source of truth for the current view.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    current: ViewportParameters,
    display: DisplayState,
}

impl ParameterStore {
    pub fn new(initial: ViewportParameters) -> Self {
        Self {
            current: initial,
            display: DisplayState::default(),
        }
    }

    /// Snapshot of the current parameters.
    pub fn read(&self) -> ViewportParameters {
        self.current
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Merge a partial edit.
    ///
    /// Every field that parses is applied; the rest keep their previous
    /// value and are reported together in the returned error.
    pub fn write(&mut self, patch: &ParameterPatch) -> Result<(), ValidationError> {
        let mut rejected = Vec::new();
        for (field, raw) in patch.iter() {
            if let Err(e) = self.current.set_from_str(field, raw) {
                debug!(field = %field, input = raw, reason = e.reason, "Rejected parameter edit");
                rejected.push(e);
            }
        }
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { fields: rejected })
        }
    }

    /// Replace all six fields with values echoed by the service.
    ///
    /// The echo is checked first; an invalid echo changes nothing.
    pub fn apply_server_defaults(&mut self, params: ViewportParameters) -> Result<(), ValidationError> {
        params.validate()?;
        if params != self.current {
            debug!(?params, "Reconciled parameters with service");
        }
        self.current = params;
        Ok(())
    }

    /// Divide `pixel_division` by the zoom factor. Returns the new value.
    pub fn zoom(&mut self, factor: ZoomFactor) -> Result<f64, ValidationError> {
        let next = self.current.pixel_division / factor.divisor();
        if next <= 0.0 || !next.is_finite() {
            return Err(ValidationError::single(
                ParamField::PixelDivision,
                next.to_string(),
                "zoom would underflow",
            ));
        }
        self.current.pixel_division = next;
        Ok(next)
    }

    pub(crate) fn set_image(&mut self, image: ImageInfo) {
        self.display.image = Some(image);
    }

    /// Override the displayed image size. Ignored until an image exists.
    pub(crate) fn set_image_dimensions(&mut self, width_px: u32, height_px: u32) -> bool {
        match self.display.image.as_mut() {
            Some(image) => {
                image.width_px = width_px;
                image.height_px = height_px;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_active_palette(&mut self, name: String) {
        self.display.active_palette = Some(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ParameterStore {
        ParameterStore::new(ViewportParameters::new(400, 400, 0.0, 0.0, 0.005, 100).unwrap())
    }

    #[test]
    fn write_applies_good_fields_and_reports_bad_ones() {
        let mut s = store();
        let patch = ParameterPatch::new()
            .with(ParamField::Cols, "640")
            .with(ParamField::MaxIterations, "lots")
            .with(ParamField::CenterRe, "-0.75");
        let err = s.write(&patch).unwrap_err();

        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.fields[0].field, ParamField::MaxIterations);
        let p = s.read();
        assert_eq!(p.cols, 640);
        assert_eq!(p.center_re, -0.75);
        assert_eq!(p.max_iterations, 100, "rejected field must keep its value");
    }

    #[test]
    fn server_defaults_replace_everything() {
        let mut s = store();
        let echoed = ViewportParameters::new(200, 300, 1.0, -1.0, 0.02, 500).unwrap();
        s.apply_server_defaults(echoed).unwrap();
        assert_eq!(s.read(), echoed);
    }

    #[test]
    fn invalid_server_defaults_change_nothing() {
        let mut s = store();
        let before = s.read();
        let mut bad = before;
        bad.rows = 0;
        bad.center_re = 3.0;
        assert!(s.apply_server_defaults(bad).is_err());
        assert_eq!(s.read(), before);
    }

    #[test]
    fn zoom_divides_exactly() {
        for factor in ZoomFactor::ALL {
            let mut s = store();
            let before = s.read().pixel_division;
            let after = s.zoom(factor).unwrap();
            assert_eq!(after, before / factor.divisor());
            assert_eq!(s.read().pixel_division, after);
        }
    }

    #[test]
    fn repeated_zoom_decays_geometrically() {
        let mut s = store();
        let mut expected = s.read().pixel_division;
        for _ in 0..5 {
            expected /= 3.0;
            assert_eq!(s.zoom(ZoomFactor::X3).unwrap(), expected);
        }
    }

    #[test]
    fn zoom_refuses_to_underflow_to_zero() {
        let mut s = ParameterStore::new(
            ViewportParameters::new(10, 10, 0.0, 0.0, f64::from_bits(1), 10).unwrap(),
        );
        assert!(s.zoom(ZoomFactor::X10).is_err());
        assert_eq!(s.read().pixel_division, f64::from_bits(1));
    }

    #[test]
    fn image_dimensions_need_an_image() {
        let mut s = store();
        assert!(!s.set_image_dimensions(10, 10));
        s.set_image(ImageInfo {
            filename: "fractal.png".into(),
            width_px: 400,
            height_px: 400,
            elapsed: None,
        });
        assert!(s.set_image_dimensions(800, 600));
        let image = s.display().image.as_ref().unwrap();
        assert_eq!((image.width_px, image.height_px), (800, 600));
    }
}
