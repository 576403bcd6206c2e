mod common;
mod debug;
mod root;
mod serve;

pub(crate) use root::get_args;
