mod count;
mod helpers;
mod run;
mod verify;

pub(crate) use count::cmd_count;
pub(crate) use run::{RunArgs, cmd_run};
pub(crate) use verify::cmd_verify;
