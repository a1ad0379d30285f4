use std::cell::RefCell;
use std::future::Future;
use std::io::Cursor;
use std::path::Path;
use std::rc::Rc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fractalview_core::{
    ClickPoint, ImageDimensions, ImageInfo, OperationKind, PaletteUpload, ParameterPatch,
    RequestState, SessionController, SessionError, SessionEvent, Transport, TransportError,
};
use fractalview_net::{HttpTransport, NetError};

use crate::command::{self, Command, USAGE};
use crate::config::AppConfig;
use crate::console;

/// How often pending session events are drained to the terminal.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Net(#[from] NetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where generated images are published.
pub(crate) trait ImageSource {
    fn image_location(&self, image_path: &str, filename: &str) -> Option<String>;

    fn download_image(
        &self,
        image_path: &str,
        filename: &str,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>>;
}

impl ImageSource for HttpTransport {
    fn image_location(&self, image_path: &str, filename: &str) -> Option<String> {
        self.image_url(image_path, filename)
            .ok()
            .map(|url| url.to_string())
    }

    async fn download_image(
        &self,
        image_path: &str,
        filename: &str,
    ) -> Result<Vec<u8>, TransportError> {
        self.fetch_image(image_path, filename).await
    }
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let transport = HttpTransport::new(&config.server_url)?;
    info!(server = %transport.base_url(), "Session started");
    let session = Rc::new(SessionController::new(transport, config.initial));
    let app = App::new(session, &config.image_path);

    println!("{}", console::params_line(&app.session.parameters()));
    println!("type `help` for commands");

    app.run(BufReader::new(tokio::io::stdin())).await?;
    info!("Session ended");
    Ok(())
}

/// Terminal front end: feeds commands to the session and prints what it
/// reports back. Must run inside a `LocalSet`.
struct App<T> {
    session: Rc<SessionController<T>>,
    events: Receiver<SessionEvent>,
    image_path: Rc<str>,
    /// Every task spawned for a command or an image download.
    tasks: RefCell<Vec<JoinHandle<()>>>,
}

impl<T: Transport + ImageSource + 'static> App<T> {
    fn new(session: Rc<SessionController<T>>, image_path: &str) -> Self {
        Self {
            events: session.subscribe(),
            session,
            image_path: image_path.into(),
            tasks: RefCell::new(Vec::new()),
        }
    }

    /// Handle input lines until `quit` or end of input, then wait for every
    /// issued command to finish.
    async fn run<R: AsyncBufRead + Unpin>(&self, input: R) -> std::io::Result<()> {
        let mut lines = input.lines();
        let mut tick = tokio::time::interval(EVENT_POLL_INTERVAL);
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if !self.handle_line(&line) {
                        break;
                    }
                }
                _ = tick.tick() => self.pump_events(),
            }
        }
        self.settle().await;
        Ok(())
    }

    fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        let mut tasks = self.tasks.borrow_mut();
        tasks.retain(|t| !t.is_finished());
        tasks.push(tokio::task::spawn_local(task));
    }

    /// Await spawned tasks, including downloads they trigger, printing
    /// events as they complete.
    async fn settle(&self) {
        loop {
            self.pump_events();
            let pending = std::mem::take(&mut *self.tasks.borrow_mut());
            if pending.is_empty() {
                break;
            }
            for task in pending {
                if let Err(e) = task.await {
                    warn!("Task ended abnormally: {e}");
                }
                self.pump_events();
            }
        }
    }

    /// Returns `false` once the user asked to quit.
    fn handle_line(&self, line: &str) -> bool {
        let command = match command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return true,
            Err(e) => {
                println!("error   {e}");
                return true;
            }
        };
        debug!(?command, "Command");

        match command {
            Command::Set { field, value } => {
                // Rejections are reported through the event stream.
                if let Err(e) = self.session.edit(&ParameterPatch::new().with(field, value)) {
                    debug!("Edit rejected: {e}");
                }
            }
            Command::Generate => {
                let session = Rc::clone(&self.session);
                self.spawn(async move {
                    report_outcome(OperationKind::Generate, session.generate().await);
                });
            }
            Command::Arm => {
                self.session.toggle_recentre();
            }
            Command::Click { x, y } => {
                let session = Rc::clone(&self.session);
                self.spawn(async move {
                    match session.click(ClickPoint::new(x, y)).await {
                        Ok(None) => println!("click   ignored: recentre is not armed (`arm`)"),
                        outcome => report_outcome(OperationKind::Recentre, outcome),
                    }
                });
            }
            Command::Zoom(factor) => {
                if let Err(e) = self.session.zoom(factor) {
                    println!("zoom    {e}");
                }
            }
            Command::Histogram => {
                let session = Rc::clone(&self.session);
                self.spawn(async move {
                    report_outcome(OperationKind::Histogram, session.histogram().await);
                });
            }
            Command::Palette(path) => {
                let session = Rc::clone(&self.session);
                self.spawn(async move {
                    match read_palette(&path).await {
                        Ok(upload) => report_outcome(
                            OperationKind::Palette,
                            session.upload_palette(upload).await,
                        ),
                        Err(e) => println!("palette cannot read {}: {e}", path.display()),
                    }
                });
            }
            Command::Render => {
                let session = Rc::clone(&self.session);
                self.spawn(async move {
                    report_outcome(OperationKind::Render, session.render().await);
                });
            }
            Command::Show => println!("{}", self.status_report()),
            Command::Help => println!("{USAGE}"),
            Command::Quit => return false,
        }
        true
    }

    fn pump_events(&self) {
        let events: Vec<SessionEvent> = self.events.try_iter().collect();
        for event in events {
            if let Some(line) = console::describe(&event) {
                println!("{line}");
            }
            if let SessionEvent::ImageReady { image, .. } = event {
                self.record_image_size(image);
            }
        }
    }

    /// Download a new image and record the size it really has.
    fn record_image_size(&self, image: ImageInfo) {
        let session = Rc::clone(&self.session);
        let image_path = Rc::clone(&self.image_path);
        self.spawn(async move {
            let bytes = match session
                .transport()
                .download_image(&image_path, &image.filename)
                .await
            {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(file = %image.filename, "Could not fetch image: {e}");
                    return;
                }
            };
            let dims = match decoded_dimensions(&bytes) {
                Ok(dims) => dims,
                Err(e) => {
                    warn!(file = %image.filename, "Could not read image size: {e}");
                    return;
                }
            };
            // A newer image may have arrived while this one downloaded.
            let still_current = session
                .display()
                .image
                .is_some_and(|current| current.filename == image.filename);
            if still_current && dims != ImageDimensions::from(&image) {
                if let Err(e) = session.set_image_dimensions(dims) {
                    warn!("Could not record image size: {e}");
                }
            }
        });
    }

    /// Snapshot for `show`. Settled statuses appear in one report and are
    /// then acknowledged back to idle.
    fn status_report(&self) -> String {
        let display = self.session.display();
        let image_url = display.image.as_ref().and_then(|image| {
            self.session
                .transport()
                .image_location(&self.image_path, &image.filename)
        });
        let requests: Vec<_> = OperationKind::ALL
            .iter()
            .map(|kind| (*kind, self.session.request_state(*kind)))
            .collect();
        let report = console::snapshot(
            &self.session.parameters(),
            &display,
            self.session.mode(),
            &requests,
            image_url,
        );
        for (kind, state) in &requests {
            if matches!(state, RequestState::Succeeded(_) | RequestState::Failed(_)) {
                self.session.acknowledge(*kind);
            }
        }
        report
    }
}

/// Outcomes already visible as request state need no extra output; local
/// precondition failures never reach the request state, so print those.
fn report_outcome<T>(kind: OperationKind, outcome: fractalview_core::Result<T>) {
    match outcome {
        Ok(_) => {}
        Err(SessionError::Precondition(e)) => println!("[{kind}] cannot start: {e}"),
        Err(SessionError::Superseded { .. }) => debug!(%kind, "Reply superseded"),
        Err(e) => debug!(%kind, "Request failed: {e}"),
    }
}

async fn read_palette(path: &Path) -> std::io::Result<PaletteUpload> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "palette".to_string());
    Ok(PaletteUpload { file_name, bytes })
}

fn decoded_dimensions(bytes: &[u8]) -> image::ImageResult<ImageDimensions> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(ImageDimensions::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use fractalview_core::wire::{HistogramReply, ImageReply, PaletteReply};
    use fractalview_core::{RecentreRequest, ViewportParameters};
    use image::{ImageBuffer, Rgb};
    use serde_json::json;
    use tokio::task::LocalSet;

    /// Answers generate and histogram at once; anything else is refused.
    #[derive(Default)]
    struct InstantTransport {
        calls: Cell<usize>,
    }

    impl InstantTransport {
        fn count(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    impl Transport for InstantTransport {
        async fn generate(&self, params: ViewportParameters) -> Result<ImageReply, TransportError> {
            self.count();
            Ok(serde_json::from_value(json!({
                "generation": "True",
                "time": "0.100 sec",
                "params": params,
                "image": "f.png",
            }))
            .unwrap())
        }

        async fn recentre(&self, _: RecentreRequest) -> Result<ImageReply, TransportError> {
            self.count();
            Err(TransportError::new("not scripted"))
        }

        async fn render(&self) -> Result<ImageReply, TransportError> {
            self.count();
            Err(TransportError::new("not scripted"))
        }

        async fn histogram(&self) -> Result<HistogramReply, TransportError> {
            self.count();
            Ok(serde_json::from_value(json!({
                "histogram": "True",
                "chart": { "bins": [0, 1], "counts": [4, 2] },
            }))
            .unwrap())
        }

        async fn upload_palette(&self, _: PaletteUpload) -> Result<PaletteReply, TransportError> {
            self.count();
            Err(TransportError::new("not scripted"))
        }
    }

    impl ImageSource for InstantTransport {
        fn image_location(&self, image_path: &str, filename: &str) -> Option<String> {
            Some(format!("http://test{image_path}/{filename}"))
        }

        async fn download_image(&self, _: &str, _: &str) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::new("no images here"))
        }
    }

    fn app() -> App<InstantTransport> {
        let session = Rc::new(SessionController::new(
            InstantTransport::default(),
            ViewportParameters::default(),
        ));
        App::new(session, "/fractals")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn quit_waits_for_commands_already_issued() {
        let app = app();
        LocalSet::new()
            .run_until(app.run(&b"generate\nhistogram\nquit\n"[..]))
            .await
            .unwrap();

        assert_eq!(app.session.transport().calls.get(), 2);
        assert!(matches!(
            app.session.request_state(OperationKind::Generate),
            RequestState::Succeeded(_)
        ));
        assert!(matches!(
            app.session.request_state(OperationKind::Histogram),
            RequestState::Succeeded(_)
        ));
        assert_eq!(app.session.display().image.unwrap().filename, "f.png");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn end_of_input_also_waits() {
        let app = app();
        LocalSet::new()
            .run_until(app.run(&b"generate"[..]))
            .await
            .unwrap();
        assert_eq!(app.session.transport().calls.get(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn show_reports_settled_status_once() {
        let app = app();
        LocalSet::new()
            .run_until(app.run(&b"generate\nquit\n"[..]))
            .await
            .unwrap();

        let report = app.status_report();
        assert!(
            report.contains("[generate] Fractal generated in 0.100 sec"),
            "{report}"
        );
        assert!(report.contains("http://test/fractals/f.png"), "{report}");
        assert_eq!(
            app.session.request_state(OperationKind::Generate),
            RequestState::Idle
        );
        assert!(!app.status_report().contains("[generate]"));
    }

    #[test]
    fn dimensions_come_from_the_png_header() {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(40, 30);
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(
            decoded_dimensions(&png).unwrap(),
            ImageDimensions::new(40, 30)
        );
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(decoded_dimensions(b"<html>not found</html>").is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn palette_file_name_is_kept() {
        let path = std::env::temp_dir().join(format!(
            "fractalview-palette-test-{}.palette",
            std::process::id()
        ));
        std::fs::write(&path, b"0 0 0\n255 255 255\n").unwrap();
        let upload = read_palette(&path).await;
        let _ = std::fs::remove_file(&path);
        let upload = upload.unwrap();
        assert_eq!(upload.bytes, b"0 0 0\n255 255 255\n");
        assert!(upload.file_name.starts_with("fractalview-palette-test-"));
        assert!(upload.file_name.ends_with(".palette"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_palette_file_is_an_error() {
        let path = std::env::temp_dir().join("fractalview-no-such-palette.palette");
        assert!(read_palette(&path).await.is_err());
    }
}
