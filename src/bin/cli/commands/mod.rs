pub mod configure;
pub mod remote;
pub mod status;
pub mod sync;
pub mod watch;
