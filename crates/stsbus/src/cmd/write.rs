//! Fire-and-forget verbs. Success means the frame went out; the servo's
//! acknowledgement, if any, only shows up in the debug log.

use stsbus_servo::{Result as ServoResult, ServoBus};

use crate::cmd::{IdArgs, MoveArgs, SetIdArgs, SetMaxTorqueArgs, SetResponseLevelArgs};
use crate::exit::{servo_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat, Record};

pub fn move_to(bus: &ServoBus, args: MoveArgs, format: OutputFormat) -> CliResult<i32> {
    let result = bus.move_to(args.id, args.position);
    finish(result, Record::new(args.id, "move").target(args.position), format)
}

pub fn set_id(bus: &ServoBus, args: SetIdArgs, format: OutputFormat) -> CliResult<i32> {
    let result = bus.set_id(args.id, args.new_id);
    finish(
        result,
        Record::new(args.id, "set-id").target(args.new_id.into()),
        format,
    )
}

pub fn set_response_level(
    bus: &ServoBus,
    args: SetResponseLevelArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let result = bus.set_response_level(args.id, args.level);
    finish(
        result,
        Record::new(args.id, "set-response-level").target(args.level.into()),
        format,
    )
}

pub fn set_max_torque(
    bus: &ServoBus,
    args: SetMaxTorqueArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let result = bus.set_max_torque(args.id, args.torque);
    finish(
        result,
        Record::new(args.id, "set-max-torque").target(args.torque),
        format,
    )
}

pub fn reset(bus: &ServoBus, args: IdArgs, format: OutputFormat) -> CliResult<i32> {
    let result = bus.reset(args.id);
    finish(result, Record::new(args.id, "reset"), format)
}

fn finish(result: ServoResult<()>, record: Record, format: OutputFormat) -> CliResult<i32> {
    result.map_err(|err| servo_error(&format!("{} failed", record.verb), err))?;
    print_record(&record, format);
    Ok(SUCCESS)
}
