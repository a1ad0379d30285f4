use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, ValidationError};

/// The six values defining which region of the complex plane is rendered
/// and at what fidelity.
///
/// Serialized with the generation service's camelCase field names. The
/// service's snake_case and positional (`value1`..`value6`) spellings are
/// accepted on input as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportParameters {
    /// Image height in pixels.
    #[serde(alias = "value1")]
    pub rows: u32,

    /// Image width in pixels.
    #[serde(alias = "value2")]
    pub cols: u32,

    #[serde(alias = "centre_re", alias = "center_re", alias = "value3")]
    pub center_re: f64,

    #[serde(alias = "centre_im", alias = "center_im", alias = "value4")]
    pub center_im: f64,

    /// Complex-plane distance covered by one pixel. Smaller is deeper.
    #[serde(alias = "pt_div", alias = "pixel_division", alias = "value5")]
    pub pixel_division: f64,

    #[serde(alias = "max_its", alias = "max_iterations", alias = "value6")]
    pub max_iterations: u32,
}

impl ViewportParameters {
    pub const DEFAULT_ROWS: u32 = 600;
    pub const DEFAULT_COLS: u32 = 800;
    pub const DEFAULT_CENTER_RE: f64 = -0.5;
    pub const DEFAULT_CENTER_IM: f64 = 0.0;
    pub const DEFAULT_PIXEL_DIVISION: f64 = 0.004;
    pub const DEFAULT_MAX_ITERATIONS: u32 = 256;

    /// Build a parameter set, rejecting values that break the invariants.
    pub fn new(
        rows: u32,
        cols: u32,
        center_re: f64,
        center_im: f64,
        pixel_division: f64,
        max_iterations: u32,
    ) -> crate::Result<Self> {
        let params = Self {
            rows,
            cols,
            center_re,
            center_im,
            pixel_division,
            max_iterations,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every invariant, collecting all violations.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut fields = Vec::new();
        let mut reject = |field: ParamField, value: String, reason: &'static str| {
            fields.push(FieldError {
                field,
                input: value,
                reason,
            });
        };

        if self.rows == 0 {
            reject(ParamField::Rows, "0".into(), MUST_BE_POSITIVE);
        }
        if self.cols == 0 {
            reject(ParamField::Cols, "0".into(), MUST_BE_POSITIVE);
        }
        if !self.center_re.is_finite() {
            reject(ParamField::CenterRe, self.center_re.to_string(), MUST_BE_FINITE);
        }
        if !self.center_im.is_finite() {
            reject(ParamField::CenterIm, self.center_im.to_string(), MUST_BE_FINITE);
        }
        if !self.pixel_division.is_finite() {
            reject(
                ParamField::PixelDivision,
                self.pixel_division.to_string(),
                MUST_BE_FINITE,
            );
        } else if self.pixel_division <= 0.0 {
            reject(
                ParamField::PixelDivision,
                self.pixel_division.to_string(),
                MUST_BE_POSITIVE,
            );
        }
        if self.max_iterations == 0 {
            reject(ParamField::MaxIterations, "0".into(), MUST_BE_POSITIVE);
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { fields })
        }
    }

    /// Parse `raw` as a value for `field` and store it on success.
    ///
    /// On failure `self` is left exactly as it was.
    pub fn set_from_str(&mut self, field: ParamField, raw: &str) -> Result<(), FieldError> {
        match field {
            ParamField::Rows => self.rows = parse_count(field, raw)?,
            ParamField::Cols => self.cols = parse_count(field, raw)?,
            ParamField::CenterRe => self.center_re = parse_coordinate(field, raw)?,
            ParamField::CenterIm => self.center_im = parse_coordinate(field, raw)?,
            ParamField::PixelDivision => self.pixel_division = parse_division(field, raw)?,
            ParamField::MaxIterations => self.max_iterations = parse_count(field, raw)?,
        }
        Ok(())
    }

    /// Horizontal and vertical extent of the rendered region in plane units.
    pub fn plane_extent(&self) -> (f64, f64) {
        (
            self.cols as f64 * self.pixel_division,
            self.rows as f64 * self.pixel_division,
        )
    }
}

impl Default for ViewportParameters {
    fn default() -> Self {
        Self {
            rows: Self::DEFAULT_ROWS,
            cols: Self::DEFAULT_COLS,
            center_re: Self::DEFAULT_CENTER_RE,
            center_im: Self::DEFAULT_CENTER_IM,
            pixel_division: Self::DEFAULT_PIXEL_DIVISION,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}

const MUST_BE_POSITIVE: &str = "must be > 0";
const MUST_BE_FINITE: &str = "must be a finite number";

fn parse_count(field: ParamField, raw: &str) -> Result<u32, FieldError> {
    let value = raw.trim().parse::<u32>().map_err(|_| FieldError {
        field,
        input: raw.to_string(),
        reason: "not a whole number",
    })?;
    if value == 0 {
        return Err(FieldError {
            field,
            input: raw.to_string(),
            reason: MUST_BE_POSITIVE,
        });
    }
    Ok(value)
}

fn parse_coordinate(field: ParamField, raw: &str) -> Result<f64, FieldError> {
    let value = raw.trim().parse::<f64>().map_err(|_| FieldError {
        field,
        input: raw.to_string(),
        reason: "not a number",
    })?;
    if !value.is_finite() {
        return Err(FieldError {
            field,
            input: raw.to_string(),
            reason: MUST_BE_FINITE,
        });
    }
    Ok(value)
}

fn parse_division(field: ParamField, raw: &str) -> Result<f64, FieldError> {
    let value = parse_coordinate(field, raw)?;
    if value <= 0.0 {
        return Err(FieldError {
            field,
            input: raw.to_string(),
            reason: MUST_BE_POSITIVE,
        });
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// One of the six editable viewport fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamField {
    Rows,
    Cols,
    CenterRe,
    CenterIm,
    PixelDivision,
    MaxIterations,
}

impl ParamField {
    pub const ALL: [ParamField; 6] = [
        Self::Rows,
        Self::Cols,
        Self::CenterRe,
        Self::CenterIm,
        Self::PixelDivision,
        Self::MaxIterations,
    ];

    /// Name used on the wire and in status messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Rows => "rows",
            Self::Cols => "cols",
            Self::CenterRe => "centerRe",
            Self::CenterIm => "centerIm",
            Self::PixelDivision => "pixelDivision",
            Self::MaxIterations => "maxIterations",
        }
    }

    /// Current value of this field in `params`, formatted for display.
    pub fn format(self, params: &ViewportParameters) -> String {
        match self {
            Self::Rows => params.rows.to_string(),
            Self::Cols => params.cols.to_string(),
            Self::CenterRe => params.center_re.to_string(),
            Self::CenterIm => params.center_im.to_string(),
            Self::PixelDivision => params.pixel_division.to_string(),
            Self::MaxIterations => params.max_iterations.to_string(),
        }
    }
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown field name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown parameter field: {0:?}")]
pub struct UnknownField(pub String);

impl FromStr for ParamField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "").as_str() {
            "rows" | "height" => Ok(Self::Rows),
            "cols" | "width" => Ok(Self::Cols),
            "centerre" | "centrere" | "re" => Ok(Self::CenterRe),
            "centerim" | "centreim" | "im" => Ok(Self::CenterIm),
            "pixeldivision" | "ptdiv" | "div" => Ok(Self::PixelDivision),
            "maxiterations" | "maxits" | "its" => Ok(Self::MaxIterations),
            _ => Err(UnknownField(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Partial edits
// ---------------------------------------------------------------------------

/// A partial, unparsed edit of the viewport fields as typed by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterPatch {
    entries: Vec<(ParamField, String)>,
}

impl ParameterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, field: ParamField, raw: impl Into<String>) -> Self {
        self.set(field, raw);
        self
    }

    /// Record raw input for `field`, replacing any earlier entry for it.
    pub fn set(&mut self, field: ParamField, raw: impl Into<String>) {
        let raw = raw.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = raw,
            None => self.entries.push((field, raw)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamField, &str)> {
        self.entries.iter().map(|(f, raw)| (*f, raw.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Zoom
// ---------------------------------------------------------------------------

/// The discrete zoom-in steps offered by the zoom buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomFactor {
    X2,
    X3,
    X5,
    X10,
}

impl ZoomFactor {
    pub const ALL: [ZoomFactor; 4] = [Self::X2, Self::X3, Self::X5, Self::X10];

    /// Amount `pixel_division` is divided by.
    pub fn divisor(self) -> f64 {
        match self {
            Self::X2 => 2.0,
            Self::X3 => 3.0,
            Self::X5 => 5.0,
            Self::X10 => 10.0,
        }
    }
}

impl TryFrom<u32> for ZoomFactor {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::X2),
            3 => Ok(Self::X3),
            5 => Ok(Self::X5),
            10 => Ok(Self::X10),
            other => Err(other),
        }
    }
}

impl fmt::Display for ZoomFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "×{}", self.divisor())
    }
}
