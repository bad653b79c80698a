use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{Event, KeyCode, KeyEventKind};
use tracing::Level;

use shell_wm::drivers::console::{ConsoleInputDriver, ConsoleOutputDriver};
use shell_wm::drivers::mouse::pointer_event;
use shell_wm::drivers::OutputDriver;
use shell_wm::event_loop::{ControlFlow, EventLoop, LoopEvent};
use shell_wm::geometry::{Geometry, Size};
use shell_wm::host::{HeadlessHandles, HostCapabilities};
use shell_wm::{Desktop, DesktopConfig, tracing_sub, ui};

#[derive(Parser, Debug)]
#[command(
    name = "shell-wm",
    version = env!("CARGO_PKG_VERSION"),
    about = "Drag and resize simulated application windows in the terminal"
)]
struct Cli {
    /// Minimum window width, in cells.
    #[arg(long, default_value_t = 20.0)]
    min_width: f64,

    /// Minimum window height, in cells.
    #[arg(long, default_value_t = 6.0)]
    min_height: f64,

    /// Width of the resize hit-targets along each edge.
    #[arg(long, default_value_t = 1.0)]
    handle_thickness: f64,

    /// Rows at the top of a window that start a drag.
    #[arg(long, default_value_t = 1.0)]
    title_bar_height: f64,

    /// Windows to open at startup.
    #[arg(short = 'w', long, default_value_t = 3)]
    windows: usize,

    /// Write logs here; nothing is logged without it.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Input poll interval in milliseconds. Pending frames run once per poll.
    #[arg(long, value_name = "MS", default_value_t = 16)]
    poll_ms: u64,
}

impl TryFrom<&Cli> for DesktopConfig {
    type Error = String;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        if cli.windows > 16 {
            return Err("at most 16 windows can be opened at startup".to_string());
        }
        if !(1..=1000).contains(&cli.poll_ms) {
            return Err("poll interval must be between 1 and 1000 ms".to_string());
        }
        let config = DesktopConfig {
            min_width: cli.min_width,
            min_height: cli.min_height,
            handle_thickness: cli.handle_thickness,
            title_bar_height: cli.title_bar_height,
            ..DesktopConfig::default()
        };
        config.validate().map_err(|err| err.to_string())?;
        Ok(config)
    }
}

fn invalid_input(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.into())
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let mut config = DesktopConfig::try_from(&cli).map_err(invalid_input)?;
    if let Some(path) = cli.log_file.as_deref() {
        tracing_sub::init(Level::DEBUG, Some(path))?;
    }

    let mut output = ConsoleOutputDriver::new()?;
    let (cols, rows) = output.size()?;
    config.workspace = Size::new(
        f64::from(cols).max(config.min_width),
        f64::from(rows.saturating_sub(1)).max(config.min_height),
    );

    let (host, handles) = HostCapabilities::headless();
    let desktop = Desktop::new(config, host).map_err(|err| invalid_input(err.to_string()))?;
    let mut app = App::new(desktop, handles);
    for _ in 0..cli.windows {
        app.open_next();
    }

    output.enter()?;
    let mut event_loop = EventLoop::new(ConsoleInputDriver::new(), Duration::from_millis(cli.poll_ms));
    let result = event_loop.run(|_, event| app.step(&mut output, event));
    app.desktop.teardown();
    output.exit()?;
    result
}

struct App {
    desktop: Desktop,
    handles: HeadlessHandles,
    opened: usize,
    status: String,
    dirty: bool,
}

impl App {
    fn new(desktop: Desktop, handles: HeadlessHandles) -> Self {
        Self {
            desktop,
            handles,
            opened: 0,
            status: String::new(),
            dirty: true,
        }
    }

    fn open_next(&mut self) {
        let config = self.desktop.config();
        let offset = (self.opened % 8) as f64 * 3.0;
        let geometry = Geometry::new(
            2.0 + offset,
            1.0 + offset,
            (config.min_width * 1.5).round(),
            (config.min_height * 1.5).round(),
        );
        self.opened += 1;
        let spec = self
            .desktop
            .spec("app", geometry)
            .with_title(format!("window {}", self.opened));
        match self.desktop.open_window(spec) {
            Ok(id) => self.status = format!("opened {id}"),
            Err(err) => self.status = err.to_string(),
        }
    }

    fn step(&mut self, output: &mut ConsoleOutputDriver, event: LoopEvent) -> io::Result<ControlFlow> {
        match event {
            LoopEvent::Tick => {
                if self.handles.frames.take_pending().is_some() && self.desktop.run_frame() > 0 {
                    self.dirty = true;
                }
                if self.dirty {
                    let stats = self.desktop.resize_stats();
                    let status = format!(
                        "{}  | frames {} dropped {} avg {:?}  | {}",
                        self.status,
                        stats.frames,
                        stats.dropped_samples,
                        stats.average_frame_latency,
                        ui::HELP.lines().nth(1).unwrap_or_default()
                    );
                    output.draw(|frame| ui::render_desktop(frame, &self.desktop, &status))?;
                    self.dirty = false;
                }
                Ok(ControlFlow::Continue)
            }
            LoopEvent::Input(event) => {
                self.dirty = true;
                Ok(self.handle_input(event))
            }
        }
    }

    fn handle_input(&mut self, event: Event) -> ControlFlow {
        match event {
            Event::Mouse(mouse) => {
                if let Some(pointer) = pointer_event(&mouse) {
                    self.desktop.handle_pointer(pointer);
                }
            }
            Event::FocusLost => {
                let ended = self.desktop.visibility_lost();
                if ended > 0 {
                    self.status = format!("focus lost; ended {ended} operation(s)");
                }
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => return self.handle_key(key.code),
            _ => {}
        }
        ControlFlow::Continue
    }

    fn handle_key(&mut self, code: KeyCode) -> ControlFlow {
        let focused = self.desktop.focused().cloned();
        let result = match (code, focused) {
            (KeyCode::Char('q'), _) => return ControlFlow::Quit,
            (KeyCode::Char('n'), _) => {
                self.open_next();
                Ok(())
            }
            (KeyCode::Char('r'), _) => {
                let minimized = self.desktop.z_order().iter().rev().find(|id| {
                    self.desktop.state(id) == Some(shell_wm::fsm::WindowState::Minimized)
                });
                match minimized.cloned() {
                    Some(id) => self.desktop.restore_window(&id),
                    None => Ok(()),
                }
            }
            (KeyCode::Char('w'), Some(id)) => self.desktop.close_window(&id),
            (KeyCode::Char('m'), Some(id)) => self.desktop.minimize_window(&id),
            (KeyCode::Char('x'), Some(id)) => self.desktop.toggle_maximize(&id),
            (KeyCode::Char(c @ ('+' | '-')), Some(id)) => {
                let step = if c == '+' { 2.0 } else { -2.0 };
                if let Some(record) = self.desktop.window(&id) {
                    let g = record.geometry;
                    self.desktop.on_size_observed(&id, g.width + step * 2.0, g.height + step);
                }
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.status = err.to_string();
        }
        ControlFlow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_make_a_valid_config() {
        let cli = Cli::parse_from(["shell-wm"]);
        let config = DesktopConfig::try_from(&cli).unwrap();
        assert_eq!(config.min_width, 20.0);
        assert_eq!(config.handle_thickness, 1.0);
    }

    #[test]
    fn cli_rejects_bad_values() {
        let cli = Cli::parse_from(["shell-wm", "--min-width", "0"]);
        assert!(DesktopConfig::try_from(&cli).is_err());
        let cli = Cli::parse_from(["shell-wm", "--poll-ms", "0"]);
        assert!(DesktopConfig::try_from(&cli).is_err());
    }
}
