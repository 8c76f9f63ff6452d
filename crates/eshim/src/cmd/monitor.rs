use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::cmd::{parse_duration, MonitorArgs};
use crate::exit::{device_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_snapshot, OutputFormat};

const TICK: Duration = Duration::from_millis(50);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = args.connect.open_connected()?;
    let interval = match &args.interval {
        Some(interval) => parse_duration(interval)?,
        None => session.config().poll_interval(),
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    session
        .start_polling(Some(interval))
        .map_err(|err| device_error("monitor start failed", err))?;

    let mut printed = 0usize;
    let mut next = Instant::now() + session.config().initial_poll_delay() + interval;
    while running.load(Ordering::SeqCst) {
        if Instant::now() < next {
            thread::sleep(TICK);
            continue;
        }
        next += interval;

        let device = session.device();
        print_snapshot(&device.snapshot(), format);
        printed = printed.saturating_add(1);

        if !device.is_connected() {
            break;
        }
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    session.close();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
