use std::thread;

use eshim_device::Session;
use tracing::info;

use crate::cmd::{parse_duration, StatusArgs};
use crate::exit::{device_error, CliResult, CONFIG, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_snapshot, OutputFormat};

/// Print the snapshot in every case; the exit code tells whether it is live.
pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let settle = parse_duration(&args.settle)?;
    let session = Session::open(args.connect.device_config());
    let device = session.device();

    let code = if !device.is_enabled() {
        CONFIG
    } else if !device.is_connected() {
        TRANSPORT_ERROR
    } else {
        info!("polling device");
        device
            .query_limits()
            .and_then(|()| device.query_all())
            .map_err(|err| device_error("status poll failed", err))?;
        thread::sleep(settle);
        SUCCESS
    };

    print_snapshot(&device.snapshot(), format);
    Ok(code)
}
