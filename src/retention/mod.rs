pub(crate) mod local;
pub(crate) mod remote;

pub use local::sweep_local;
pub use remote::sweep_remote;
