//! Text rendering of session state for the terminal.

use fractalview_core::{
    DisplayState, InteractionMode, OperationKind, ParamField, RequestState, SessionEvent,
    ViewportParameters,
};

/// One line per event worth showing. Returns `None` for events that carry
/// nothing new to a reader, such as a request settling back to idle.
pub(crate) fn describe(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::ParametersChanged(p) => Some(format!("params  {}", params_line(p))),
        SessionEvent::RequestStateChanged { kind, state } => match state {
            RequestState::Idle => None,
            RequestState::Pending => Some(format!("[{kind}] {}", state.status_text())),
            RequestState::Succeeded(text) => Some(format!("[{kind}] {text}")),
            RequestState::Failed(text) => Some(format!("[{kind}] failed: {text}")),
        },
        SessionEvent::ModeChanged(mode) => Some(match mode {
            InteractionMode::Browsing => "mode    browsing".to_string(),
            InteractionMode::RecentreArmed => {
                "mode    recentre armed: next click picks the new centre".to_string()
            }
        }),
        SessionEvent::ImageReady { image, .. } => Some(format!(
            "image   {} ({}×{})",
            image.filename, image.width_px, image.height_px
        )),
        SessionEvent::HistogramReady { chart, .. } => {
            Some(format!("chart   {}", chart_summary(chart)))
        }
        SessionEvent::PaletteChanged(name) => Some(format!("palette {name}")),
        SessionEvent::ValidationFailed(e) => Some(e.to_string()),
    }
}

pub(crate) fn params_line(p: &ViewportParameters) -> String {
    ParamField::ALL
        .iter()
        .map(|f| format!("{f}={}", f.format(p)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Short description of a chart document: its series count when it has the
/// usual `data` array, otherwise its size.
fn chart_summary(chart: &serde_json::Value) -> String {
    match chart.get("data").and_then(|d| d.as_array()) {
        Some(series) => format!("{} series", series.len()),
        None => format!("{} bytes of chart data", chart.to_string().len()),
    }
}

/// Multi-line snapshot for the `show` command.
pub(crate) fn snapshot(
    params: &ViewportParameters,
    display: &DisplayState,
    mode: InteractionMode,
    requests: &[(OperationKind, RequestState)],
    image_url: Option<String>,
) -> String {
    let mut lines = vec![format!("params  {}", params_line(params))];
    let (re_span, im_span) = params.plane_extent();
    lines.push(format!("extent  {re_span:.6} × {im_span:.6}"));
    lines.push(format!("mode    {mode}"));
    match &display.image {
        Some(image) => lines.push(format!(
            "image   {} ({}×{})",
            image_url.unwrap_or_else(|| image.filename.clone()),
            image.width_px,
            image.height_px
        )),
        None => lines.push("image   none yet".to_string()),
    }
    if let Some(palette) = &display.active_palette {
        lines.push(format!("palette {palette}"));
    }
    for (kind, state) in requests {
        if *state != RequestState::Idle {
            lines.push(format!("[{kind}] {}", state.status_text()));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractalview_core::{ImageInfo, ValidationError};

    #[test]
    fn idle_transitions_are_silent() {
        let event = SessionEvent::RequestStateChanged {
            kind: OperationKind::Generate,
            state: RequestState::Idle,
        };
        assert_eq!(describe(&event), None);
    }

    #[test]
    fn failures_carry_the_message() {
        let event = SessionEvent::RequestStateChanged {
            kind: OperationKind::Histogram,
            state: RequestState::Failed("no histogram yet".into()),
        };
        let line = describe(&event).unwrap();
        assert!(line.contains("failed"));
        assert!(line.ends_with("no histogram yet"));
    }

    #[test]
    fn parameters_use_field_names() {
        let line = params_line(&ViewportParameters::default());
        for field in ParamField::ALL {
            assert!(line.contains(&format!("{field}=")), "{line}");
        }
    }

    #[test]
    fn validation_failures_are_shown() {
        let event = SessionEvent::ValidationFailed(ValidationError::single(
            ParamField::Rows,
            "-3",
            "must be a positive integer",
        ));
        let line = describe(&event).unwrap();
        assert!(line.starts_with("invalid parameters"));
        assert!(line.contains("\"-3\""));
    }

    #[test]
    fn chart_series_are_counted() {
        let chart = serde_json::json!({"data": [{"x": [1, 2]}, {"x": [3]}], "layout": {}});
        assert_eq!(chart_summary(&chart), "2 series");
    }

    #[test]
    fn snapshot_lists_only_active_requests() {
        let display = DisplayState {
            image: Some(ImageInfo {
                filename: "f.png".into(),
                width_px: 800,
                height_px: 600,
                elapsed: None,
            }),
            active_palette: Some("fire.palette".into()),
        };
        let text = snapshot(
            &ViewportParameters::default(),
            &display,
            InteractionMode::Browsing,
            &[
                (OperationKind::Generate, RequestState::Pending),
                (OperationKind::Render, RequestState::Idle),
            ],
            Some("http://127.0.0.1:8080/fractals/f.png".into()),
        );
        assert!(text.contains("http://127.0.0.1:8080/fractals/f.png (800×600)"));
        assert!(text.contains("palette fire.palette"));
        assert!(text.contains("[generate]"));
        assert!(!text.contains("[render]"));
    }
}
