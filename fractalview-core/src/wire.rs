//! Request and reply bodies exchanged with the generation service.
//!
//! The service signals success with string flags (`"True"` / `"False"`),
//! independent of HTTP status. Flags are decoded into `bool` here and
//! replies are turned into typed outcomes before any session logic sees
//! them.

use serde::{Deserialize, Deserializer, Serialize};

use crate::params::ViewportParameters;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /recentre`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentreRequest {
    pub click_row: u32,
    pub click_col: u32,
    pub new_center_re: f64,
    pub new_center_im: f64,
}

/// A palette file picked by the user, sent as a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Success flag
// ---------------------------------------------------------------------------

/// A `"True"` / `"False"` flag. Absent flags decode as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flag(pub bool);

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "True" => Ok(Flag(true)),
            "False" => Ok(Flag(false)),
            other => Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(other),
                &"\"True\" or \"False\"",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Reply to generate, recentre and render. Each keys its flag differently.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageReply {
    #[serde(rename = "generation", alias = "recentred", alias = "rendered", default)]
    pub success: Flag,
    /// Kept raw so a malformed echo on a failed reply cannot hide the
    /// service's error message.
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reply to `GET /histogram`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistogramReply {
    #[serde(rename = "histogram", default)]
    pub success: Flag,
    #[serde(default)]
    pub chart: Option<serde_json::Value>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reply to `POST /palette`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaletteReply {
    #[serde(rename = "palette", default)]
    pub success: Flag,
    #[serde(default)]
    pub palette_file: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Why a decoded reply could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// The service said no, with this message.
    Refused(String),
    /// The service said yes but the reply is unusable.
    Malformed(String),
}

/// A successful image-producing reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOutcome {
    /// Echoed parameters, when the service sent them.
    pub params: Option<ViewportParameters>,
    pub image: String,
    pub elapsed: Option<String>,
}

/// A successful histogram reply. The chart is passed on untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramOutcome {
    pub chart: serde_json::Value,
    pub elapsed: Option<String>,
}

fn refusal(error: Option<String>) -> ReplyError {
    ReplyError::Refused(
        error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "service reported failure".to_string()),
    )
}

impl ImageReply {
    pub fn into_outcome(self) -> Result<ImageOutcome, ReplyError> {
        if !self.success.0 {
            return Err(refusal(self.error));
        }
        let image = self
            .image
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ReplyError::Malformed("reply carried no image".into()))?;
        let params = match self.params {
            Some(serde_json::Value::Null) | None => None,
            Some(raw) => Some(
                serde_json::from_value::<ViewportParameters>(raw)
                    .map_err(|e| ReplyError::Malformed(format!("bad params echo: {e}")))?,
            ),
        };
        Ok(ImageOutcome {
            params,
            image,
            elapsed: self.time,
        })
    }
}

impl HistogramReply {
    pub fn into_outcome(self) -> Result<HistogramOutcome, ReplyError> {
        if !self.success.0 {
            return Err(refusal(self.error));
        }
        let chart = match self.chart {
            // The service may send the chart pre-encoded as a string.
            Some(serde_json::Value::String(encoded)) => serde_json::from_str(&encoded)
                .map_err(|e| ReplyError::Malformed(format!("chart is not valid JSON: {e}")))?,
            Some(serde_json::Value::Null) | None => {
                return Err(ReplyError::Malformed("reply carried no chart".into()))
            }
            Some(chart) => chart,
        };
        Ok(HistogramOutcome {
            chart,
            elapsed: self.time,
        })
    }
}

impl PaletteReply {
    /// Name of the now-active palette. Falls back to the uploaded name.
    pub fn into_outcome(self, uploaded: &str) -> Result<String, ReplyError> {
        if !self.success.0 {
            return Err(refusal(self.error));
        }
        Ok(self
            .palette_file
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| uploaded.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recentre_request_uses_wire_names() {
        let body = serde_json::to_value(RecentreRequest {
            click_row: 150,
            click_col: 200,
            new_center_re: -0.5,
            new_center_im: 0.25,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "clickRow": 150,
                "clickCol": 200,
                "newCenterRe": -0.5,
                "newCenterIm": 0.25,
            })
        );
    }

    #[test]
    fn generate_success_decodes() {
        let reply: ImageReply = serde_json::from_str(
            r#"{"generation":"True","time":"0.412 sec","error":"Success",
                "params":{"rows":400,"cols":400,"centerRe":0.0,"centerIm":0.0,
                          "pixelDivision":0.005,"maxIterations":100},
                "image":"fractal-003.png"}"#,
        )
        .unwrap();
        let outcome = reply.into_outcome().unwrap();
        assert_eq!(outcome.image, "fractal-003.png");
        assert_eq!(outcome.elapsed.as_deref(), Some("0.412 sec"));
        assert_eq!(outcome.params.unwrap().max_iterations, 100);
    }

    #[test]
    fn false_flag_carries_server_message() {
        let reply: ImageReply = serde_json::from_str(
            r#"{"generation":"False","error":"Failed to generate fractal image."}"#,
        )
        .unwrap();
        assert_eq!(
            reply.into_outcome(),
            Err(ReplyError::Refused("Failed to generate fractal image.".into()))
        );
    }

    #[test]
    fn failed_reply_with_odd_params_still_reports_message() {
        let reply: ImageReply = serde_json::from_str(
            r#"{"generation":"False","error":"boom","params":{"unexpected":1}}"#,
        )
        .unwrap();
        assert_eq!(reply.into_outcome(), Err(ReplyError::Refused("boom".into())));
    }

    #[test]
    fn bad_params_echo_on_success_is_malformed() {
        let reply: ImageReply = serde_json::from_str(
            r#"{"generation":"True","image":"a.png","params":{"rows":"many"}}"#,
        )
        .unwrap();
        assert!(matches!(reply.into_outcome(), Err(ReplyError::Malformed(_))));
    }

    #[test]
    fn missing_flag_is_a_failure() {
        let reply: ImageReply = serde_json::from_str(r#"{"image":"x.png"}"#).unwrap();
        assert!(matches!(reply.into_outcome(), Err(ReplyError::Refused(_))));
    }

    #[test]
    fn recentred_key_is_accepted() {
        let reply: ImageReply =
            serde_json::from_str(r#"{"recentred":"True","image":"r.png"}"#).unwrap();
        assert!(reply.success.0);
        assert_eq!(reply.params, None);
    }

    #[test]
    fn unexpected_flag_text_is_rejected() {
        assert!(serde_json::from_str::<ImageReply>(r#"{"generation":"true"}"#).is_err());
    }

    #[test]
    fn string_encoded_chart_is_unwrapped() {
        let reply: HistogramReply = serde_json::from_str(
            r#"{"histogram":"True","time":"0.010 sec","chart":"{\"bins\":[1,2],\"counts\":[5,7]}"}"#,
        )
        .unwrap();
        let outcome = reply.into_outcome().unwrap();
        assert_eq!(outcome.chart["counts"][1], 7);
    }

    #[test]
    fn object_chart_passes_through() {
        let reply: HistogramReply =
            serde_json::from_str(r#"{"histogram":"True","chart":{"bins":[],"counts":[]}}"#)
                .unwrap();
        assert!(reply.into_outcome().unwrap().chart.get("bins").is_some());
    }

    #[test]
    fn empty_chart_string_is_malformed() {
        let reply: HistogramReply =
            serde_json::from_str(r#"{"histogram":"True","chart":""}"#).unwrap();
        assert!(matches!(reply.into_outcome(), Err(ReplyError::Malformed(_))));
    }

    #[test]
    fn palette_name_falls_back_to_upload() {
        let reply: PaletteReply = serde_json::from_str(r#"{"palette":"True"}"#).unwrap();
        assert_eq!(reply.into_outcome("ocean.palette").unwrap(), "ocean.palette");

        let reply: PaletteReply =
            serde_json::from_str(r#"{"palette":"True","palette_file":"fire.palette"}"#).unwrap();
        assert_eq!(reply.into_outcome("ocean.palette").unwrap(), "fire.palette");
    }
}
