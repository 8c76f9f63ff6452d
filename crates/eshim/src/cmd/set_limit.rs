use tracing::info;

use crate::cmd::{command_error, LimitKind, SetLimitArgs};
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: SetLimitArgs) -> CliResult<i32> {
    let session = args.connect.open();
    let device = session.device();
    let result = match args.kind {
        LimitKind::OutVoltage => device.set_max_out_voltage(args.value),
        LimitKind::OutPower => device.set_max_out_power(args.value),
        LimitKind::TotalPower => device.set_max_total_power(args.value),
    };
    result.map_err(|err| command_error(&session, "set-limit failed", err))?;
    info!(kind = ?args.kind, value = args.value, "limit set");
    Ok(SUCCESS)
}
