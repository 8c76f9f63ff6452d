use tracing::info;

use crate::cmd::{command_error, PowerArgs, PowerState};
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: PowerArgs) -> CliResult<i32> {
    let session = args.connect.open();
    let device = session.device();
    let result = match args.state {
        PowerState::On => device.set_boot(),
        PowerState::Off => device.set_shut(),
    };
    result.map_err(|err| command_error(&session, "power failed", err))?;
    info!(state = ?args.state, "output switched");
    Ok(SUCCESS)
}
