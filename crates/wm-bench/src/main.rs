use std::io;
use std::time::{Duration, Instant};

use clap::Parser;

use shell_wm::geometry::{Geometry, Point};
use shell_wm::host::{HeadlessHandles, HostCapabilities, PointerEvent};
use shell_wm::resize::ResizeStats;
use shell_wm::{Desktop, DesktopConfig};

#[derive(Parser, Debug)]
#[command(
    name = "wm-bench",
    version = env!("CARGO_PKG_VERSION"),
    about = "Headless drag and resize throughput benchmark"
)]
struct BenchCli {
    /// Windows to open before gesturing.
    #[arg(short = 'w', long = "windows", default_value_t = 8)]
    windows: usize,

    /// Gestures (one drag and one resize each) per window.
    #[arg(short = 'g', long = "gestures", default_value_t = 50)]
    gestures: usize,

    /// Pointer samples per gesture.
    #[arg(short = 's', long = "samples", default_value_t = 120)]
    samples: usize,

    /// Pointer samples delivered between animation frames.
    #[arg(short = 'f', long = "frames-every", value_name = "SAMPLES", default_value_t = 4)]
    frames_every: usize,
}

struct BenchConfig {
    windows: usize,
    gestures: usize,
    samples: usize,
    frames_every: usize,
}

impl TryFrom<&BenchCli> for BenchConfig {
    type Error = String;

    fn try_from(cli: &BenchCli) -> Result<Self, Self::Error> {
        if !(1..=256).contains(&cli.windows) {
            return Err("windows must be between 1 and 256".to_string());
        }
        if !(1..=10_000).contains(&cli.gestures) {
            return Err("gestures must be between 1 and 10000".to_string());
        }
        if !(1..=100_000).contains(&cli.samples) {
            return Err("samples must be between 1 and 100000".to_string());
        }
        if cli.frames_every == 0 {
            return Err("frames-every must be at least 1".to_string());
        }
        Ok(Self {
            windows: cli.windows,
            gestures: cli.gestures,
            samples: cli.samples,
            frames_every: cli.frames_every,
        })
    }
}

#[derive(Debug, Default)]
struct BenchReport {
    drags: usize,
    resizes: usize,
    samples: usize,
    elapsed: Duration,
    stats: ResizeStats,
}

impl BenchReport {
    fn final_report(&self) -> String {
        let secs = self.elapsed.as_secs_f64().max(f64::EPSILON);
        format!(
            "drags {} resizes {} samples {} in {:.3}s ({:.0} samples/s)\n\
             frames applied {} dropped samples {} avg frame {:?}",
            self.drags,
            self.resizes,
            self.samples,
            secs,
            self.samples as f64 / secs,
            self.stats.frames,
            self.stats.dropped_samples,
            self.stats.average_frame_latency,
        )
    }
}

fn main() -> io::Result<()> {
    let args = BenchCli::parse();
    let config = BenchConfig::try_from(&args)
        .map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))?;
    let report = run_benchmark(&config).map_err(|err| io::Error::other(err.to_string()))?;
    println!("{}", report.final_report());
    Ok(())
}

fn run_benchmark(config: &BenchConfig) -> Result<BenchReport, shell_wm::DesktopError> {
    let (host, handles) = HostCapabilities::headless();
    let mut desktop = Desktop::new(DesktopConfig::default(), host)?;
    let mut ids = Vec::with_capacity(config.windows);
    for i in 0..config.windows {
        // Staggered so each window's title bar and corner stay uncovered.
        let offset = i as f64 * 40.0;
        let spec = desktop.spec("bench", Geometry::new(offset, offset, 400.0, 300.0));
        ids.push(desktop.open_window(spec)?);
    }

    let mut report = BenchReport::default();
    let started = Instant::now();
    for _ in 0..config.gestures {
        for id in &ids {
            desktop.focus_window(id)?;
            let Some(g) = desktop.window(id).map(|record| record.geometry) else {
                continue;
            };

            let grab = Point::new(g.x + g.width / 2.0, g.y + 10.0);
            if desktop.handle_pointer(PointerEvent::down(grab.x, grab.y)) && desktop.dragging().is_some() {
                report.samples += sweep(&mut desktop, &handles, config, grab, 1.0);
                desktop.handle_pointer(PointerEvent::up(grab.x, grab.y));
                report.drags += 1;
            }

            let Some(g) = desktop.window(id).map(|record| record.geometry) else {
                continue;
            };
            let corner = Point::new(g.right() - 1.0, g.bottom() - 1.0);
            if desktop.handle_pointer(PointerEvent::down(corner.x, corner.y)) && desktop.is_resizing(id) {
                report.samples += sweep(&mut desktop, &handles, config, corner, 0.5);
                desktop.handle_pointer(PointerEvent::up(corner.x, corner.y));
                report.resizes += 1;
            }
        }
    }
    report.elapsed = started.elapsed();
    report.stats = desktop.resize_stats();
    desktop.teardown();
    Ok(report)
}

/// Move the pointer out and back along a diagonal, firing a frame every
/// `frames_every` samples.
fn sweep(
    desktop: &mut Desktop,
    handles: &HeadlessHandles,
    config: &BenchConfig,
    from: Point,
    step: f64,
) -> usize {
    let half = config.samples / 2;
    for i in 0..config.samples {
        let t = if i < half { i } else { config.samples - i } as f64;
        desktop.handle_pointer(PointerEvent::moved(from.x + t * step, from.y + t * step));
        if (i + 1) % config.frames_every == 0 && handles.frames.take_pending().is_some() {
            desktop.run_frame();
        }
    }
    if handles.frames.take_pending().is_some() {
        desktop.run_frame();
    }
    config.samples
}
